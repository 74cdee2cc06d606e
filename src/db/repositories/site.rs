//! Site repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Site;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Site repository trait
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// Get site by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Site>>;

    /// List all sites ordered by ID
    async fn list(&self) -> Result<Vec<Site>>;
}

/// SQLx-based site repository implementation
pub struct SqlxSiteRepository {
    pool: DynDatabasePool,
}

impl SqlxSiteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SiteRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SiteRepository for SqlxSiteRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Site>> {
        Ok(self.list().await?.into_iter().find(|site| site.id == id))
    }

    async fn list(&self) -> Result<Vec<Site>> {
        let sql = "SELECT id, domain, name FROM sites ORDER BY id";
        let sites: Vec<Site> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list sites")?
                .iter()
                .map(|row| Site {
                    id: row.get("id"),
                    domain: row.get("domain"),
                    name: row.get("name"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list sites")?
                .iter()
                .map(|row| Site {
                    id: row.get("id"),
                    domain: row.get("domain"),
                    name: row.get("name"),
                })
                .collect(),
        };
        Ok(sites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_default_site() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxSiteRepository::new(pool);

        let sites = repo.list().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].domain, "example.com");
        assert!(repo.get_by_id(1).await.unwrap().is_some());
        assert!(repo.get_by_id(2).await.unwrap().is_none());
    }
}
