//! Database layer
//!
//! SQLite (default, single file) and MySQL behind the `DatabasePool` trait.
//! Repositories dispatch on `pool.driver()` and keep one query function per
//! backend.
//!
//! ```ignore
//! use zinnia::config::DatabaseConfig;
//! use zinnia::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlBackend, SqliteBackend,
};
