use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValetBotError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid credentials or token")]
    Auth,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, ValetBotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_detail() {
        let err = ValetBotError::Validation("username is required".to_string());
        assert!(format!("{err}").contains("username is required"));
        let err = ValetBotError::Conflict("username taken".to_string());
        assert!(format!("{err}").starts_with("conflict"));
    }

    #[test]
    fn auth_error_has_a_single_message() {
        // Unknown user and wrong password must be indistinguishable.
        assert_eq!(
            format!("{}", ValetBotError::Auth),
            "invalid credentials or token"
        );
    }
}
