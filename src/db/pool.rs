//! Connection pools
//!
//! Zinnia stores its weblog in SQLite by default and in MySQL when
//! configured. Repositories hold a `DynDatabasePool`, branch on `driver()`
//! and borrow the concrete sqlx pool for that branch.

use anyhow::{Context, Result};
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::path::Path;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Storage backend behind the repositories
pub trait DatabasePool: Send + Sync {
    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

impl dyn DatabasePool {
    /// SQLite pool, or an error on a MySQL-backed weblog
    pub fn sqlite(&self) -> Result<&SqlitePool> {
        self.as_sqlite()
            .with_context(|| format!("Weblog storage is {:?}, not SQLite", self.driver()))
    }

    /// MySQL pool, or an error on a SQLite-backed weblog
    pub fn mysql(&self) -> Result<&MySqlPool> {
        self.as_mysql()
            .with_context(|| format!("Weblog storage is {:?}, not MySQL", self.driver()))
    }

    /// Run an unparameterized statement (schema setup) and return the affected rows
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let affected = match self.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql).execute(self.sqlite()?).await.map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql).execute(self.mysql()?).await.map(|r| r.rows_affected()),
        };
        affected.context("Schema statement failed")
    }
}

pub struct SqliteBackend(SqlitePool);

impl DatabasePool for SqliteBackend {
    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.0)
    }
}

pub struct MysqlBackend(MySqlPool);

impl DatabasePool for MysqlBackend {
    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        Some(&self.0)
    }
}

/// sqlx URL for a configured SQLite location.
///
/// Accepts `:memory:`, a bare file path or a full `sqlite:` URL. File
/// databases are opened in `rwc` mode so a fresh install creates its file.
fn sqlite_url(location: &str) -> String {
    match location {
        ":memory:" | "sqlite::memory:" => "sqlite::memory:".to_string(),
        url if url.starts_with("sqlite:") && url.contains('?') => url.to_string(),
        url if url.starts_with("sqlite:") => format!("{}?mode=rwc", url),
        path => format!("sqlite:{}?mode=rwc", path),
    }
}

/// Database file named by a SQLite location, if it is not in memory
fn sqlite_file(location: &str) -> Option<&Path> {
    let path = location.strip_prefix("sqlite:").unwrap_or(location);
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != ":memory:").then(|| Path::new(path))
}

async fn open_sqlite(location: &str) -> Result<SqliteBackend> {
    if let Some(dir) = sqlite_file(location).and_then(Path::parent) {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create weblog data directory {:?}", dir))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .connect(&sqlite_url(location))
        .await
        .with_context(|| format!("Cannot open weblog database {}", location))?;

    // Relation tables rely on ON DELETE CASCADE
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .context("Cannot enable SQLite foreign keys")?;

    Ok(SqliteBackend(pool))
}

async fn open_mysql(location: &str) -> Result<MysqlBackend> {
    let url = if location.starts_with("mysql://") {
        location.to_string()
    } else {
        format!("mysql://{}", location)
    };

    let pool = MySqlPoolOptions::new()
        .max_connections(30)
        .connect(&url)
        .await
        .with_context(|| format!("Cannot connect to weblog database {}", location))?;

    Ok(MysqlBackend(pool))
}

/// Open the configured weblog database
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    Ok(match config.driver {
        DatabaseDriver::Sqlite => Arc::new(open_sqlite(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(open_mysql(&config.url).await?),
    })
}

/// Private in-memory SQLite database
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    Ok(Arc::new(open_sqlite(":memory:").await?))
}
