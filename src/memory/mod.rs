use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Result, ValetBotError};

mod schema;
use schema::memory_documents;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

/// Bound on `last_queries`; the oldest entry is evicted first.
pub const QUERY_HISTORY_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub text: String,
    pub due_time: i64,
    pub notified: bool,
}

/// Everything the assistant knows about one user. Owned exclusively by that
/// username; persisted as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub facts: Vec<Fact>,
    #[serde(default)]
    pub last_queries: Vec<QueryRecord>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl MemoryDocument {
    pub fn record_query(&mut self, query: &str, time: i64) {
        self.last_queries.push(QueryRecord {
            query: query.to_string(),
            time,
        });
        while self.last_queries.len() > QUERY_HISTORY_LIMIT {
            self.last_queries.remove(0);
        }
    }

    /// Stores a fact under the next free `fact_N` key and returns the key.
    /// Facts are never deleted, so the count alone yields a strictly
    /// increasing key sequence, including across restarts.
    pub fn remember_fact(&mut self, text: &str) -> String {
        let key = format!("fact_{}", self.facts.len() + 1);
        self.facts.push(Fact {
            key: key.clone(),
            text: text.to_string(),
        });
        key
    }

    pub fn recall_facts(&self) -> Option<String> {
        if self.facts.is_empty() {
            return None;
        }
        Some(
            self.facts
                .iter()
                .map(|fact| fact.text.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Queryable)]
struct DocumentRow {
    _username: String,
    document: String,
    _updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = memory_documents)]
struct NewDocument<'a> {
    username: &'a str,
    document: &'a str,
    updated_at: i64,
}

/// Key-value store of memory documents, one row per username.
///
/// Mutating callers must hold the per-username lock for their whole
/// read-modify-write cycle; two unserialized cycles on the same username
/// would silently drop the first write.
pub struct MemoryStore {
    pool: SqlitePool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
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
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub async fn lock_user(&self, username: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(username.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Loads the document for `username`, or a fresh empty document if none
    /// has been written yet. A read never fails for a known user.
    pub async fn load(&self, username: &str) -> Result<MemoryDocument> {
        let mut conn = self.conn().await?;
        let row: Option<DocumentRow> = memory_documents::table
            .filter(memory_documents::username.eq(username))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        match row {
            Some(row) => serde_json::from_str(&row.document)
                .map_err(|e| ValetBotError::Serialization(e.to_string())),
            None => Ok(MemoryDocument::default()),
        }
    }

    /// Replaces the persisted document in one write.
    pub async fn save(&self, username: &str, document: &MemoryDocument) -> Result<()> {
        let raw = serde_json::to_string(document)
            .map_err(|e| ValetBotError::Serialization(e.to_string()))?;
        let row = NewDocument {
            username,
            document: &raw,
            updated_at: now_ts(),
        };
        let mut conn = self.conn().await?;
        diesel::replace_into(memory_documents::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
        Ok(())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| ValetBotError::Runtime(e.to_string()))
    }
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
    fn history_is_bounded_to_five() {
        let mut doc = MemoryDocument::default();
        for n in 0..8 {
            doc.record_query(&format!("query {n}"), n);
        }
        assert_eq!(doc.last_queries.len(), QUERY_HISTORY_LIMIT);
        assert_eq!(doc.last_queries[0].query, "query 3");
        assert_eq!(doc.last_queries[4].query, "query 7");
    }

    #[test]
    fn history_keeps_fewer_than_five() {
        let mut doc = MemoryDocument::default();
        doc.record_query("only one", 1);
        assert_eq!(doc.last_queries.len(), 1);
    }

    #[test]
    fn fact_keys_follow_insertion_order() {
        let mut doc = MemoryDocument::default();
        assert_eq!(doc.remember_fact("tea"), "fact_1");
        assert_eq!(doc.remember_fact("rainy mornings"), "fact_2");
        assert_eq!(doc.remember_fact("jazz"), "fact_3");
        let keys: Vec<_> = doc.facts.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["fact_1", "fact_2", "fact_3"]);
    }

    #[test]
    fn recall_joins_values_in_order() {
        let mut doc = MemoryDocument::default();
        assert_eq!(doc.recall_facts(), None);
        doc.remember_fact("tea");
        doc.remember_fact("jazz");
        assert_eq!(doc.recall_facts().as_deref(), Some("tea; jazz"));
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut doc = MemoryDocument::default();
        doc.name = Some("Alice".to_string());
        doc.remember_fact("tea");
        doc.record_query("hello", 10);
        doc.reminders.push(Reminder {
            text: "stretch".to_string(),
            due_time: 600,
            notified: false,
        });
        let raw = serde_json::to_string(&doc).unwrap();
        let parsed: MemoryDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn empty_fields_are_defaulted_on_load() {
        let parsed: MemoryDocument = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, MemoryDocument::default());
    }
}
