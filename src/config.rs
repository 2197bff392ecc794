use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, ValetBotError};

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 3600;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<String>,
    pub bot_name: Option<String>,
    pub token_ttl_seconds: Option<i64>,
    pub knowledge: Option<KnowledgeConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ValetBotError::Validation(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ValetBotError::Validation(e.to_string()))?;
        Ok(config)
    }

    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds.unwrap_or(DEFAULT_TOKEN_TTL_SECONDS)
    }

    pub fn bot_name(&self) -> &str {
        self.bot_name.as_deref().unwrap_or("Valet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9090, "bot_name": "Jeeves"}}"#).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, Some(9090));
        assert_eq!(config.bot_name(), "Jeeves");
        assert_eq!(config.token_ttl_seconds(), DEFAULT_TOKEN_TTL_SECONDS);
    }

    #[test]
    fn rejects_malformed_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
