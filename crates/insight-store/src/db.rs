use anyhow::{Context, Result};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

/// Connection pool for the relational cache. Postgres in production, SQLite in tests.
#[derive(Clone)]
pub struct CacheDb {
    pool: AnyPool,
}

impl CacheDb {
    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("connecting to {}", redact(database_url)))?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::info!("Cache database ready at {}", redact(database_url));

        Ok(db)
    }

    /// Single-connection in-memory SQLite database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");

        // sqlx runs one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt)
                    .execute(&self.pool)
                    .await
                    .context("applying cache schema")?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Strip credentials from a connection string before it is logged.
fn redact(database_url: &str) -> String {
    match (database_url.find("://"), database_url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &database_url[..scheme_end], &database_url[at..])
        }
        _ => database_url.to_string(),
    }
}
