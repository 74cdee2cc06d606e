//! Entry repository
//!
//! Database operations for weblog entries, their authors and their sites.
//!
//! `EntryQuery` values are translated into a `WHERE` clause plus a list of
//! bind values, so the same filter runs unchanged on SQLite and MySQL.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Author, CreateEntryInput, Entry, EntryQuery, EntryStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// Entry repository trait
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Entries matching the query, newest publication first
    async fn list(&self, query: &EntryQuery) -> Result<Vec<Entry>>;

    /// Count entries matching the query (pagination is ignored)
    async fn count(&self, query: &EntryQuery) -> Result<i64>;

    /// Get entry by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Entry>>;

    /// Entry matching the query, published on `date` with the given slug
    async fn get_by_date_and_slug(
        &self,
        query: &EntryQuery,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Entry>>;

    /// Check whether a slug is already used on a publication day
    async fn slug_exists_on_date(&self, slug: &str, date: NaiveDate) -> Result<bool>;

    /// Insert an entry with its authors and sites
    async fn create(&self, input: &CreateEntryInput, publication_date: DateTime<Utc>) -> Result<Entry>;

    /// Persist the editable fields and the site set of an entry.
    /// Slug, authors and dates other than `last_update` are left untouched.
    async fn update(&self, entry: &Entry) -> Result<Entry>;

    /// Replace the author set
    async fn set_authors(&self, entry_id: i64, user_ids: &[i64]) -> Result<()>;

    /// Add one author, ignoring duplicates
    async fn add_author(&self, entry_id: i64, user_id: i64) -> Result<()>;

    /// Change only the status
    async fn set_status(&self, entry_id: i64, status: EntryStatus) -> Result<()>;
}

/// SQLx-based entry repository implementation
pub struct SqlxEntryRepository {
    pool: DynDatabasePool,
}

impl SqlxEntryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EntryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EntryRepository for SqlxEntryRepository {
    async fn list(&self, query: &EntryQuery) -> Result<Vec<Entry>> {
        let filter = SqlFilter::from_query(query);
        let (sql, binds) = filter.select(query);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_entries_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_entries_mysql(self.pool.mysql()?, &sql, &binds).await,
        }
    }

    async fn count(&self, query: &EntryQuery) -> Result<i64> {
        let filter = SqlFilter::from_query(query);
        let sql = format!("SELECT COUNT(*) as count FROM entries e WHERE {}", filter.where_clause());
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &filter.binds)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count entries")?
                .get("count"),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &filter.binds)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count entries")?
                .get("count"),
        };
        Ok(count)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Entry>> {
        let mut filter = SqlFilter::default();
        filter.push("e.id = ?", vec![BindValue::Int(id)]);
        let (sql, binds) = filter.select(&EntryQuery::all());
        let entries = match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_entries_sqlite(self.pool.sqlite()?, &sql, &binds).await?,
            DatabaseDriver::Mysql => fetch_entries_mysql(self.pool.mysql()?, &sql, &binds).await?,
        };
        Ok(entries.into_iter().next())
    }

    async fn get_by_date_and_slug(
        &self,
        query: &EntryQuery,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Entry>> {
        let mut filter = SqlFilter::from_query(query);
        filter.push_day(date);
        filter.push("e.slug = ?", vec![BindValue::Text(slug.to_string())]);
        let (sql, binds) = filter.select(&EntryQuery::all().limit(1));
        let entries = match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_entries_sqlite(self.pool.sqlite()?, &sql, &binds).await?,
            DatabaseDriver::Mysql => fetch_entries_mysql(self.pool.mysql()?, &sql, &binds).await?,
        };
        Ok(entries.into_iter().next())
    }

    async fn slug_exists_on_date(&self, slug: &str, date: NaiveDate) -> Result<bool> {
        let mut filter = SqlFilter::default();
        filter.push_day(date);
        filter.push("e.slug = ?", vec![BindValue::Text(slug.to_string())]);
        let sql = format!("SELECT COUNT(*) as count FROM entries e WHERE {}", filter.where_clause());
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &filter.binds)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check entry slug")?
                .get("count"),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &filter.binds)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check entry slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn create(&self, input: &CreateEntryInput, publication_date: DateTime<Utc>) -> Result<Entry> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_entry_sqlite(self.pool.sqlite()?, input, publication_date).await?,
            DatabaseDriver::Mysql => create_entry_mysql(self.pool.mysql()?, input, publication_date).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Entry not found after insert"))
    }

    async fn update(&self, entry: &Entry) -> Result<Entry> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_entry_sqlite(self.pool.sqlite()?, entry).await?,
            DatabaseDriver::Mysql => update_entry_mysql(self.pool.mysql()?, entry).await?,
        }
        self.get_by_id(entry.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Entry not found after update"))
    }

    async fn set_authors(&self, entry_id: i64, user_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                sqlx::query("DELETE FROM entry_authors WHERE entry_id = ?")
                    .bind(entry_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear entry authors")?;
                for user_id in dedup(user_ids) {
                    sqlx::query("INSERT INTO entry_authors (entry_id, user_id) VALUES (?, ?)")
                        .bind(entry_id)
                        .bind(user_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to add entry author")?;
                }
                tx.commit().await?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                sqlx::query("DELETE FROM entry_authors WHERE entry_id = ?")
                    .bind(entry_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear entry authors")?;
                for user_id in dedup(user_ids) {
                    sqlx::query("INSERT INTO entry_authors (entry_id, user_id) VALUES (?, ?)")
                        .bind(entry_id)
                        .bind(user_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to add entry author")?;
                }
                tx.commit().await?;
            }
        }
        Ok(())
    }

    async fn add_author(&self, entry_id: i64, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO entry_authors (entry_id, user_id) VALUES (?, ?)")
                    .bind(entry_id)
                    .bind(user_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to add entry author")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO entry_authors (entry_id, user_id) VALUES (?, ?)")
                    .bind(entry_id)
                    .bind(user_id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to add entry author")?;
            }
        }
        Ok(())
    }

    async fn set_status(&self, entry_id: i64, status: EntryStatus) -> Result<()> {
        let sql = "UPDATE entries SET status = ?, last_update = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(status.as_str())
                    .bind(now)
                    .bind(entry_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to set entry status")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(status.as_str())
                    .bind(now)
                    .bind(entry_id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to set entry status")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Query translation
// ============================================================================

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

/// `WHERE` clauses joined with `AND`, plus their bind values in order
#[derive(Debug, Default)]
struct SqlFilter {
    clauses: Vec<String>,
    binds: Vec<BindValue>,
}

const ENTRY_COLUMNS: &str = "e.id, e.title, e.slug, e.lead_text, e.excerpt, e.content, e.status, \
     e.comment_enabled, e.publication_date, e.creation_date, e.last_update";

impl SqlFilter {
    fn from_query(query: &EntryQuery) -> Self {
        let mut filter = Self::default();

        if let Some(statuses) = query.statuses() {
            if statuses.is_empty() {
                filter.push("1 = 0", Vec::new());
            } else {
                let placeholders = vec!["?"; statuses.len()].join(", ");
                filter.push(
                    &format!("e.status IN ({})", placeholders),
                    statuses.iter().map(|s| BindValue::Text(s.as_str().to_string())).collect(),
                );
            }
        }
        for site_id in query.site_ids() {
            filter.push(
                "EXISTS (SELECT 1 FROM entry_sites es WHERE es.entry_id = e.id AND es.site_id = ?)",
                vec![BindValue::Int(*site_id)],
            );
        }
        for author_id in query.author_ids() {
            filter.push(
                "EXISTS (SELECT 1 FROM entry_authors ea WHERE ea.entry_id = e.id AND ea.user_id = ?)",
                vec![BindValue::Int(*author_id)],
            );
        }

        filter
    }

    fn push(&mut self, clause: &str, binds: Vec<BindValue>) {
        self.clauses.push(clause.to_string());
        self.binds.extend(binds);
    }

    /// Restrict to entries published on a calendar day (UTC)
    fn push_day(&mut self, date: NaiveDate) {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1);
        self.push(
            "e.publication_date >= ? AND e.publication_date < ?",
            vec![BindValue::Time(start), BindValue::Time(end)],
        );
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }

    /// Full `SELECT` with ordering and the query's pagination
    fn select(&self, query: &EntryQuery) -> (String, Vec<BindValue>) {
        let mut sql = format!(
            "SELECT {} FROM entries e WHERE {} ORDER BY e.publication_date DESC, e.id DESC",
            ENTRY_COLUMNS,
            self.where_clause()
        );
        let mut binds = self.binds.clone();
        if query.limit_value().is_some() || query.offset_value() > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
            binds.push(BindValue::Int(query.limit_value().unwrap_or(i64::MAX)));
            binds.push(BindValue::Int(query.offset_value()));
        }
        (sql, binds)
    }
}

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &'q [BindValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.as_str()),
            BindValue::Time(v) => query.bind(*v),
        };
    }
    query
}

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    binds: &'q [BindValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.as_str()),
            BindValue::Time(v) => query.bind(*v),
        };
    }
    query
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

/// Attach authors and sites fetched for a batch of entries
fn attach_relations(
    entries: &mut [Entry],
    mut authors: HashMap<i64, Vec<Author>>,
    mut sites: HashMap<i64, Vec<i64>>,
) {
    for entry in entries.iter_mut() {
        entry.authors = authors.remove(&entry.id).unwrap_or_default();
        entry.sites = sites.remove(&entry.id).unwrap_or_default();
    }
}

fn in_placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn fetch_entries_sqlite(pool: &SqlitePool, sql: &str, binds: &[BindValue]) -> Result<Vec<Entry>> {
    let rows = bind_sqlite(sqlx::query(sql), binds)
        .fetch_all(pool)
        .await
        .context("Failed to query entries")?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        entries.push(row_to_entry_sqlite(row)?);
    }
    if entries.is_empty() {
        return Ok(entries);
    }

    let ids: Vec<BindValue> = entries.iter().map(|e| BindValue::Int(e.id)).collect();
    let placeholders = in_placeholders(ids.len());

    let author_sql = format!(
        "SELECT ea.entry_id, u.id AS user_id, u.username FROM entry_authors ea \
         INNER JOIN users u ON u.id = ea.user_id WHERE ea.entry_id IN ({}) ORDER BY u.username",
        placeholders
    );
    let mut authors: HashMap<i64, Vec<Author>> = HashMap::new();
    for row in bind_sqlite(sqlx::query(&author_sql), &ids)
        .fetch_all(pool)
        .await
        .context("Failed to load entry authors")?
    {
        authors.entry(row.get("entry_id")).or_default().push(Author {
            id: row.get("user_id"),
            username: row.get("username"),
        });
    }

    let site_sql = format!(
        "SELECT entry_id, site_id FROM entry_sites WHERE entry_id IN ({}) ORDER BY site_id",
        placeholders
    );
    let mut sites: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in bind_sqlite(sqlx::query(&site_sql), &ids)
        .fetch_all(pool)
        .await
        .context("Failed to load entry sites")?
    {
        sites.entry(row.get("entry_id")).or_default().push(row.get("site_id"));
    }

    attach_relations(&mut entries, authors, sites);
    Ok(entries)
}

async fn create_entry_sqlite(
    pool: &SqlitePool,
    input: &CreateEntryInput,
    publication_date: DateTime<Utc>,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO entries (title, slug, lead_text, excerpt, content, status, comment_enabled,
                             publication_date, creation_date, last_update)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.lead)
    .bind(&input.excerpt)
    .bind(&input.content)
    .bind(input.status.as_str())
    .bind(input.comment_enabled)
    .bind(publication_date)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create entry")?;
    let id = result.last_insert_rowid();

    for user_id in dedup(&input.author_ids) {
        sqlx::query("INSERT INTO entry_authors (entry_id, user_id) VALUES (?, ?)")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add entry author")?;
    }
    for site_id in dedup(&input.sites) {
        sqlx::query("INSERT INTO entry_sites (entry_id, site_id) VALUES (?, ?)")
            .bind(id)
            .bind(site_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add entry site")?;
    }

    tx.commit().await?;
    Ok(id)
}

async fn update_entry_sqlite(pool: &SqlitePool, entry: &Entry) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE entries
        SET title = ?, lead_text = ?, excerpt = ?, content = ?, status = ?, comment_enabled = ?, last_update = ?
        WHERE id = ?
        "#,
    )
    .bind(&entry.title)
    .bind(&entry.lead)
    .bind(&entry.excerpt)
    .bind(&entry.content)
    .bind(entry.status.as_str())
    .bind(entry.comment_enabled)
    .bind(Utc::now())
    .bind(entry.id)
    .execute(&mut *tx)
    .await
    .context("Failed to update entry")?;

    sqlx::query("DELETE FROM entry_sites WHERE entry_id = ?")
        .bind(entry.id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear entry sites")?;
    for site_id in dedup(&entry.sites) {
        sqlx::query("INSERT INTO entry_sites (entry_id, site_id) VALUES (?, ?)")
            .bind(entry.id)
            .bind(site_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add entry site")?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_entry_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Entry> {
    let status: String = row.get("status");
    Ok(Entry {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        lead: row.get("lead_text"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        status: status
            .parse()
            .with_context(|| format!("Invalid status in database: {}", status))?,
        comment_enabled: row.get("comment_enabled"),
        authors: Vec::new(),
        sites: Vec::new(),
        publication_date: row.get("publication_date"),
        creation_date: row.get("creation_date"),
        last_update: row.get("last_update"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn fetch_entries_mysql(pool: &MySqlPool, sql: &str, binds: &[BindValue]) -> Result<Vec<Entry>> {
    let rows = bind_mysql(sqlx::query(sql), binds)
        .fetch_all(pool)
        .await
        .context("Failed to query entries")?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        entries.push(row_to_entry_mysql(row)?);
    }
    if entries.is_empty() {
        return Ok(entries);
    }

    let ids: Vec<BindValue> = entries.iter().map(|e| BindValue::Int(e.id)).collect();
    let placeholders = in_placeholders(ids.len());

    let author_sql = format!(
        "SELECT ea.entry_id, u.id AS user_id, u.username FROM entry_authors ea \
         INNER JOIN users u ON u.id = ea.user_id WHERE ea.entry_id IN ({}) ORDER BY u.username",
        placeholders
    );
    let mut authors: HashMap<i64, Vec<Author>> = HashMap::new();
    for row in bind_mysql(sqlx::query(&author_sql), &ids)
        .fetch_all(pool)
        .await
        .context("Failed to load entry authors")?
    {
        authors.entry(row.get("entry_id")).or_default().push(Author {
            id: row.get("user_id"),
            username: row.get("username"),
        });
    }

    let site_sql = format!(
        "SELECT entry_id, site_id FROM entry_sites WHERE entry_id IN ({}) ORDER BY site_id",
        placeholders
    );
    let mut sites: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in bind_mysql(sqlx::query(&site_sql), &ids)
        .fetch_all(pool)
        .await
        .context("Failed to load entry sites")?
    {
        sites.entry(row.get("entry_id")).or_default().push(row.get("site_id"));
    }

    attach_relations(&mut entries, authors, sites);
    Ok(entries)
}

async fn create_entry_mysql(
    pool: &MySqlPool,
    input: &CreateEntryInput,
    publication_date: DateTime<Utc>,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO entries (title, slug, lead_text, excerpt, content, status, comment_enabled,
                             publication_date, creation_date, last_update)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.lead)
    .bind(&input.excerpt)
    .bind(&input.content)
    .bind(input.status.as_str())
    .bind(input.comment_enabled)
    .bind(publication_date)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create entry")?;
    let id = result.last_insert_id() as i64;

    for user_id in dedup(&input.author_ids) {
        sqlx::query("INSERT INTO entry_authors (entry_id, user_id) VALUES (?, ?)")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add entry author")?;
    }
    for site_id in dedup(&input.sites) {
        sqlx::query("INSERT INTO entry_sites (entry_id, site_id) VALUES (?, ?)")
            .bind(id)
            .bind(site_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add entry site")?;
    }

    tx.commit().await?;
    Ok(id)
}

async fn update_entry_mysql(pool: &MySqlPool, entry: &Entry) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE entries
        SET title = ?, lead_text = ?, excerpt = ?, content = ?, status = ?, comment_enabled = ?, last_update = ?
        WHERE id = ?
        "#,
    )
    .bind(&entry.title)
    .bind(&entry.lead)
    .bind(&entry.excerpt)
    .bind(&entry.content)
    .bind(entry.status.as_str())
    .bind(entry.comment_enabled)
    .bind(Utc::now())
    .bind(entry.id)
    .execute(&mut *tx)
    .await
    .context("Failed to update entry")?;

    sqlx::query("DELETE FROM entry_sites WHERE entry_id = ?")
        .bind(entry.id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear entry sites")?;
    for site_id in dedup(&entry.sites) {
        sqlx::query("INSERT INTO entry_sites (entry_id, site_id) VALUES (?, ?)")
            .bind(entry.id)
            .bind(site_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add entry site")?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_entry_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Entry> {
    let status: String = row.get("status");
    Ok(Entry {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        lead: row.get("lead_text"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        status: status
            .parse()
            .with_context(|| format!("Invalid status in database: {}", status))?,
        comment_enabled: row.get("comment_enabled"),
        authors: Vec::new(),
        sites: Vec::new(),
        publication_date: row.get("publication_date"),
        creation_date: row.get("creation_date"),
        last_update: row.get("last_update"),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    /// Migrated in-memory pool with users `alice` (1) and `bob` (2) and a
    /// second site (2)
    pub async fn seeded_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = pool.sqlite().unwrap();
        for name in ["alice", "bob"] {
            sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'x')")
                .bind(name)
                .bind(format!("{}@example.com", name))
                .execute(sqlite)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO sites (id, domain, name) VALUES (2, 'other.example.com', 'Other')")
            .execute(sqlite)
            .await
            .unwrap();
        pool
    }

    pub fn input(title: &str, slug: &str, status: EntryStatus, authors: &[i64], sites: &[i64]) -> CreateEntryInput {
        CreateEntryInput {
            title: title.to_string(),
            slug: slug.to_string(),
            lead: String::new(),
            excerpt: String::new(),
            content: format!("Body of {}", title),
            status,
            comment_enabled: false,
            sites: sites.to_vec(),
            author_ids: authors.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    async fn setup() -> SqlxEntryRepository {
        SqlxEntryRepository::new(seeded_pool().await)
    }

    #[tokio::test]
    async fn test_create_loads_relations() {
        let repo = setup().await;
        let entry = repo
            .create(&input("Hello", "hello", EntryStatus::Draft, &[2, 1, 1], &[1]), day(2024, 3, 9))
            .await
            .unwrap();

        assert!(entry.id > 0);
        assert_eq!(entry.slug, "hello");
        assert_eq!(entry.content, "Body of Hello");
        assert_eq!(entry.status, EntryStatus::Draft);
        let names: Vec<&str> = entry.authors.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(entry.sites, vec![1]);
        assert_eq!(entry.get_absolute_url(), "/weblog/2024/03/09/hello/");
    }

    #[tokio::test]
    async fn test_get_by_id_missing() {
        let repo = setup().await;
        assert!(repo.get_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_status_site_and_author() {
        let repo = setup().await;
        repo.create(&input("A", "a", EntryStatus::Published, &[1], &[1]), day(2024, 1, 1))
            .await
            .unwrap();
        repo.create(&input("B", "b", EntryStatus::Draft, &[1], &[1]), day(2024, 1, 2))
            .await
            .unwrap();
        repo.create(&input("C", "c", EntryStatus::Published, &[2], &[2]), day(2024, 1, 3))
            .await
            .unwrap();

        let all = repo.list(&EntryQuery::all()).await.unwrap();
        let slugs: Vec<&str> = all.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c", "b", "a"]);

        let published = repo
            .list(&EntryQuery::all().filter_status(EntryStatus::Published))
            .await
            .unwrap();
        assert_eq!(published.len(), 2);

        let site_one = repo
            .list(&EntryQuery::all().on_site(1).filter_status(EntryStatus::Published))
            .await
            .unwrap();
        assert_eq!(site_one.len(), 1);
        assert_eq!(site_one[0].slug, "a");

        let by_bob = repo.list(&EntryQuery::all().by_author(2)).await.unwrap();
        assert_eq!(by_bob.len(), 1);
        assert_eq!(by_bob[0].slug, "c");

        // Chained site and author filters narrow, they never replace
        assert_eq!(repo.count(&EntryQuery::all().on_site(2).on_site(1)).await.unwrap(), 0);
        assert_eq!(repo.count(&EntryQuery::all().by_author(1).by_author(2)).await.unwrap(), 0);
        assert_eq!(repo.count(&EntryQuery::all().on_site(1).on_site(1)).await.unwrap(), 2);

        let none = EntryQuery::all()
            .filter_status(EntryStatus::Published)
            .filter_status(EntryStatus::Draft);
        assert!(repo.list(&none).await.unwrap().is_empty());
        assert_eq!(repo.count(&none).await.unwrap(), 0);
        assert_eq!(repo.count(&EntryQuery::all()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = setup().await;
        for (i, slug) in ["one", "two", "three"].iter().enumerate() {
            repo.create(&input(slug, slug, EntryStatus::Published, &[1], &[1]), day(2024, 2, 1 + i as u32))
                .await
                .unwrap();
        }

        let page = repo.list(&EntryQuery::all().limit(2)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].slug, "three");

        let rest = repo.list(&EntryQuery::all().offset(2)).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].slug, "one");
    }

    #[tokio::test]
    async fn test_get_by_date_and_slug() {
        let repo = setup().await;
        repo.create(&input("Hello", "hello", EntryStatus::Published, &[1], &[1]), day(2024, 3, 9))
            .await
            .unwrap();
        repo.create(&input("Hidden", "hidden", EntryStatus::Hidden, &[1], &[1]), day(2024, 3, 9))
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let found = repo
            .get_by_date_and_slug(&EntryQuery::all().on_site(1), date, "hello")
            .await
            .unwrap();
        assert!(found.is_some());

        let other_day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(repo
            .get_by_date_and_slug(&EntryQuery::all(), other_day, "hello")
            .await
            .unwrap()
            .is_none());

        let published_only = EntryQuery::all().filter_status(EntryStatus::Published);
        assert!(repo
            .get_by_date_and_slug(&published_only, date, "hidden")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_slug_exists_on_date() {
        let repo = setup().await;
        repo.create(&input("Hello", "hello", EntryStatus::Draft, &[1], &[1]), day(2024, 3, 9))
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert!(repo.slug_exists_on_date("hello", date).await.unwrap());
        assert!(!repo.slug_exists_on_date("hello-2", date).await.unwrap());
        let next = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(!repo.slug_exists_on_date("hello", next).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_keeps_slug_and_replaces_sites() {
        let repo = setup().await;
        let mut entry = repo
            .create(&input("Hello", "hello", EntryStatus::Draft, &[1], &[1]), day(2024, 3, 9))
            .await
            .unwrap();

        entry.title = "Renamed".to_string();
        entry.slug = "ignored".to_string();
        entry.status = EntryStatus::Published;
        entry.comment_enabled = true;
        entry.sites = vec![2];

        let updated = repo.update(&entry).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.slug, "hello");
        assert_eq!(updated.status, EntryStatus::Published);
        assert!(updated.comment_enabled);
        assert_eq!(updated.sites, vec![2]);
        assert!(updated.last_update >= updated.creation_date);
    }

    #[tokio::test]
    async fn test_authors() {
        let repo = setup().await;
        let entry = repo
            .create(&input("Hello", "hello", EntryStatus::Draft, &[1], &[1]), day(2024, 3, 9))
            .await
            .unwrap();

        repo.add_author(entry.id, 1).await.unwrap();
        repo.add_author(entry.id, 2).await.unwrap();
        let reloaded = repo.get_by_id(entry.id).await.unwrap().unwrap();
        assert!(reloaded.has_author(1) && reloaded.has_author(2));
        assert_eq!(reloaded.authors.len(), 2);

        repo.set_authors(entry.id, &[2]).await.unwrap();
        let reloaded = repo.get_by_id(entry.id).await.unwrap().unwrap();
        assert!(!reloaded.has_author(1));
        assert!(reloaded.has_author(2));
    }

    #[tokio::test]
    async fn test_set_status() {
        let repo = setup().await;
        let entry = repo
            .create(&input("Hello", "hello", EntryStatus::Draft, &[1], &[1]), day(2024, 3, 9))
            .await
            .unwrap();

        repo.set_status(entry.id, EntryStatus::Hidden).await.unwrap();
        let reloaded = repo.get_by_id(entry.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, EntryStatus::Hidden);
    }

    #[test]
    fn test_filter_translation() {
        let query = EntryQuery::all()
            .filter_status(EntryStatus::Published)
            .on_site(1)
            .limit(10)
            .offset(5);
        let (sql, binds) = SqlFilter::from_query(&query).select(&query);
        assert!(sql.contains("e.status IN (?)"));
        assert!(sql.contains("es.site_id = ?"));
        assert!(sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(
            binds,
            vec![
                BindValue::Text("published".to_string()),
                BindValue::Int(1),
                BindValue::Int(10),
                BindValue::Int(5),
            ]
        );

        let (sql, binds) = SqlFilter::from_query(&EntryQuery::all()).select(&EntryQuery::all());
        assert!(sql.contains("WHERE 1 = 1"));
        assert!(!sql.contains("LIMIT"));
        assert!(binds.is_empty());
    }
}
