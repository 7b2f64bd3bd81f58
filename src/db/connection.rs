use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::debug;

pub type Db = Surreal<Any>;

/// URL selecting the in-process kv-mem engine.
///
/// Nothing written there outlives the process, so users created against it
/// are gone on the next run.
pub const MEMORY_URL: &str = "memory";

/// Where the user table lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::with_url(env::var("SURREALDB_URL").unwrap_or_else(|_| MEMORY_URL.to_string()))
    }
}

impl DatabaseConfig {
    /// Config for `url`, with namespace, database and credentials taken from
    /// the `SURREALDB_*` environment.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "mcp".to_string()),
            database: env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "sandbox".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }

    /// Whether users stored here survive a restart.
    pub fn is_persistent(&self) -> bool {
        self.url != MEMORY_URL && !self.url.starts_with("mem://")
    }
}

/// Open the user database and select its namespace.
pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url.as_str())
        .await
        .with_context(|| format!("Failed to connect to database at {}", config.url))?;

    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await
        .context("Database sign-in failed")?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;
    debug!(url = %config.url, "Connected to user database");

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Users that may open sandbox sessions
        "DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS user_id ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS username ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS username_lower ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS api_key ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS is_active ON TABLE user TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user TYPE datetime DEFAULT time::now();
         DEFINE FIELD IF NOT EXISTS updated_at ON TABLE user TYPE datetime VALUE time::now();",

        "DEFINE INDEX IF NOT EXISTS user_user_id ON TABLE user COLUMNS user_id UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_username ON TABLE user COLUMNS username_lower UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_api_key ON TABLE user COLUMNS api_key UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
