use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, ValetBotError};
use crate::memory::{MemoryDocument, MemoryStore};

mod schema;
use schema::{sessions, users};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MasterAdmin,
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::MasterAdmin => "master_admin",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValetBotError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "master_admin" => Ok(Role::MasterAdmin),
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(ValetBotError::Runtime(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Queryable)]
struct UserRow {
    username: String,
    password_hash: String,
    role: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    username: &'a str,
    password_hash: &'a str,
    role: &'a str,
    created_at: i64,
}

#[derive(Queryable)]
struct SessionRow {
    _token: String,
    username: String,
    role: String,
    _created_at: i64,
    expires_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
struct NewSession<'a> {
    token: &'a str,
    username: &'a str,
    role: &'a str,
    created_at: i64,
    expires_at: i64,
}

/// A user record as exposed over the admin listing. The password hash never
/// leaves this module.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub role: Role,
    pub created_at: i64,
}

/// The identity bound to a validated token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub role: Role,
}

/// Credential store and auth service: registration, login, token
/// validation, role checks, and the single role transition (user -> admin).
pub struct AccountService {
    pool: SqlitePool,
    memory: Arc<MemoryStore>,
    register_gate: Mutex<()>,
    token_ttl_seconds: i64,
}

impl AccountService {
    pub async fn new(
        sqlite_path: impl AsRef<str>,
        memory: Arc<MemoryStore>,
        token_ttl_seconds: i64,
    ) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        Ok(Self {
            pool,
            memory,
            register_gate: Mutex::new(()),
            token_ttl_seconds,
        })
    }

    /// Creates a user plus their empty memory document. The first user ever
    /// registered becomes master_admin; everyone after that starts as user.
    pub async fn register(&self, username: &str, password: &str) -> Result<Role> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValetBotError::Validation("username is required".to_string()));
        }
        if password.is_empty() {
            return Err(ValetBotError::Validation("password is required".to_string()));
        }

        // The is-this-the-first-user check must not interleave with another
        // registration's insert, or two callers could both claim master_admin.
        let _gate = self.register_gate.lock().await;

        let mut conn = self.conn().await?;
        let existing: Option<String> = users::table
            .filter(users::username.eq(username))
            .select(users::username)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        if existing.is_some() {
            return Err(ValetBotError::Conflict(format!(
                "username {username} is already registered"
            )));
        }

        let count: i64 = users::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        let role = if count == 0 {
            Role::MasterAdmin
        } else {
            Role::User
        };

        let password_hash = hash_password(password)?;
        let new = NewUser {
            username,
            password_hash: &password_hash,
            role: role.as_str(),
            created_at: now_ts(),
        };
        diesel::insert_into(users::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        drop(conn);

        self.memory.save(username, &MemoryDocument::default()).await?;
        tracing::info!(username, role = role.as_str(), "registered user");
        Ok(role)
    }

    /// Issues a session token. Unknown username and wrong password fail the
    /// same way; nothing here lets a caller probe which usernames exist.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginGrant> {
        let mut conn = self.conn().await?;
        let row: Option<UserRow> = users::table
            .filter(users::username.eq(username.trim()))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        let Some(row) = row else {
            return Err(ValetBotError::Auth);
        };
        if !verify_password(password, &row.password_hash) {
            return Err(ValetBotError::Auth);
        }

        let role: Role = row.role.parse()?;
        let token = generate_token();
        let now = now_ts();
        let new = NewSession {
            token: &token,
            username: &row.username,
            role: role.as_str(),
            created_at: now,
            expires_at: now + self.token_ttl_seconds,
        };
        diesel::insert_into(sessions::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        Ok(LoginGrant { token, role })
    }

    pub async fn authorize(&self, token: &str, required_roles: &[Role]) -> Result<AuthSession> {
        if token.is_empty() {
            return Err(ValetBotError::Auth);
        }
        let mut conn = self.conn().await?;
        let row: Option<SessionRow> = sessions::table
            .filter(sessions::token.eq(token))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        let Some(row) = row else {
            return Err(ValetBotError::Auth);
        };
        if row.expires_at <= now_ts() {
            return Err(ValetBotError::Auth);
        }
        let role: Role = row.role.parse()?;
        if !required_roles.contains(&role) {
            return Err(ValetBotError::Forbidden(
                "insufficient role for this operation".to_string(),
            ));
        }
        Ok(AuthSession {
            username: row.username,
            role,
        })
    }

    /// The one role transition in the model: a master_admin promotes a user
    /// to admin. Promoting an admin again is an idempotent success; a
    /// master_admin target is left untouched.
    pub async fn elevate(&self, caller: &AuthSession, target_username: &str) -> Result<Role> {
        if caller.role != Role::MasterAdmin {
            return Err(ValetBotError::Forbidden(
                "only a master admin can grant admin".to_string(),
            ));
        }
        let mut conn = self.conn().await?;
        let row: Option<UserRow> = users::table
            .filter(users::username.eq(target_username))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        let Some(row) = row else {
            return Err(ValetBotError::NotFound(format!(
                "no user named {target_username}"
            )));
        };

        let current: Role = row.role.parse()?;
        match current {
            Role::User => {
                diesel::update(users::table.filter(users::username.eq(target_username)))
                    .set(users::role.eq(Role::Admin.as_str()))
                    .execute(&mut conn)
                    .await
                    .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
                tracing::info!(username = target_username, "elevated user to admin");
                Ok(Role::Admin)
            }
            other => Ok(other),
        }
    }

    pub async fn list_users(&self) -> Result<BTreeMap<String, UserRecord>> {
        let mut conn = self.conn().await?;
        let rows: Vec<UserRow> = users::table
            .order(users::created_at.asc())
            .load(&mut conn)
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        let mut out = BTreeMap::new();
        for row in rows {
            let role: Role = row.role.parse()?;
            out.insert(
                row.username,
                UserRecord {
                    role,
                    created_at: row.created_at,
                },
            );
        }
        Ok(out)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ValetBotError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        Ok::<_, ValetBotError>(())
    })
    .await
    .map_err(|e| ValetBotError::Runtime(e.to_string()))??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::MasterAdmin, Role::Admin, Role::User] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("overlord".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(Role::MasterAdmin).unwrap(),
            serde_json::json!("master_admin")
        );
    }

    #[test]
    fn password_hashes_verify_and_reject() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn tokens_are_distinct_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.len() >= 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
