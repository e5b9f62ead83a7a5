//! libsql implementation of the stores

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Row, Rows, params};
use tracing::{debug, instrument};

use super::schema;
use super::{DbError, Opportunity, OpportunityStore};
use crate::domain::{ConfigStore, CrawlerKind, DomainConfig};
use crate::extraction::VolunteerOpportunity;

const OPPORTUNITY_COLUMNS: &str = "id, title, organization, tags, location, description, activity_type, \
     time_slot, slot_availability, date_start, date_end, url, contact_email, contact_phone, \
     created_at, updated_at";

const CONFIG_COLUMNS: &str = "domain, crawler, include_selectors, exclude_selectors, wait_for, updated_at";

/// Database manager for opportunities and site configurations
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database manager
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, DbError> {
        schema::initialize_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Create a new database manager from a path
    pub async fn new_from_path(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let db = libsql::Builder::new_local(path.as_ref())
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Execute a custom query with parameters
    pub async fn execute_query<P>(&self, sql: &str, params: P) -> Result<Rows, DbError>
    where
        P: libsql::params::IntoParams,
    {
        self.conn
            .query(sql, params)
            .await
            .map_err(|e| DbError::Query(format!("Failed to execute query: {}", e)))
    }

    async fn query_opportunities<P>(&self, sql: &str, params: P) -> Result<Vec<Opportunity>, DbError>
    where
        P: libsql::params::IntoParams,
    {
        let mut rows = self.execute_query(sql, params).await?;
        let mut opportunities = Vec::new();
        while let Some(row) = rows.next().await? {
            opportunities.push(row_to_opportunity(&row)?);
        }
        Ok(opportunities)
    }

    async fn query_configs<P>(&self, sql: &str, params: P) -> Result<Vec<DomainConfig>, DbError>
    where
        P: libsql::params::IntoParams,
    {
        let mut rows = self.execute_query(sql, params).await?;
        let mut configs = Vec::new();
        while let Some(row) = rows.next().await? {
            configs.push(row_to_config(&row)?);
        }
        Ok(configs)
    }
}

#[async_trait]
impl OpportunityStore for Database {
    #[instrument(skip(self, record), fields(url = %record.url))]
    async fn create(&self, record: &VolunteerOpportunity) -> Result<Opportunity, DbError> {
        let now = timestamp(Utc::now());
        let sql = format!(
            "INSERT INTO opportunities (title, organization, tags, location, description,
             activity_type, time_slot, slot_availability, date_start, date_end, url,
             contact_email, contact_phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(url) DO NOTHING
             RETURNING {OPPORTUNITY_COLUMNS}"
        );

        let inserted = self
            .query_opportunities(
                &sql,
                params![
                    record.title.clone(),
                    record.organization.clone(),
                    to_json(&record.tags)?,
                    record.location.clone(),
                    record.description.clone(),
                    record.activity_type.clone(),
                    record.time_slot.clone(),
                    to_json(&record.slot_availability)?,
                    record.date_start.clone(),
                    record.date_end.clone(),
                    record.url.clone(),
                    record.contact_email.clone(),
                    record.contact_phone.clone(),
                    now.clone(),
                    now,
                ],
            )
            .await?
            .pop();

        if let Some(created) = inserted {
            debug!(id = created.id, "Created opportunity");
            return Ok(created);
        }

        // The url is already stored
        debug!("Opportunity already exists");
        self.find_by_url(&record.url)
            .await?
            .ok_or_else(|| DbError::Data(format!("Opportunity for {} vanished after insert", record.url)))
    }

    async fn get(&self, id: i64) -> Result<Option<Opportunity>, DbError> {
        let sql = format!("SELECT {OPPORTUNITY_COLUMNS} FROM opportunities WHERE id = ?");
        Ok(self.query_opportunities(&sql, params![id]).await?.pop())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Opportunity>, DbError> {
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities WHERE url = ? ORDER BY id DESC LIMIT 1"
        );
        Ok(self
            .query_opportunities(&sql, params![url.to_string()])
            .await?
            .pop())
    }

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Opportunity>, DbError> {
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities ORDER BY id DESC LIMIT ? OFFSET ?"
        );
        self.query_opportunities(&sql, params![i64::from(limit), i64::from(offset)])
            .await
    }

    #[instrument(skip(self, record))]
    async fn update(
        &self,
        id: i64,
        record: &VolunteerOpportunity,
    ) -> Result<Option<Opportunity>, DbError> {
        let changed = self
            .conn
            .execute(
                "UPDATE opportunities SET title = ?, organization = ?, tags = ?, location = ?,
                 description = ?, activity_type = ?, time_slot = ?, slot_availability = ?,
                 date_start = ?, date_end = ?, url = ?, contact_email = ?, contact_phone = ?,
                 updated_at = ?
                 WHERE id = ?",
                params![
                    record.title.clone(),
                    record.organization.clone(),
                    to_json(&record.tags)?,
                    record.location.clone(),
                    record.description.clone(),
                    record.activity_type.clone(),
                    record.time_slot.clone(),
                    to_json(&record.slot_availability)?,
                    record.date_start.clone(),
                    record.date_end.clone(),
                    record.url.clone(),
                    record.contact_email.clone(),
                    record.contact_phone.clone(),
                    timestamp(Utc::now()),
                    id,
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to update opportunity: {}", e)))?;

        if changed == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM opportunities WHERE id = ?", params![id])
            .await
            .map_err(|e| DbError::Query(format!("Failed to delete opportunity: {}", e)))?;
        Ok(changed > 0)
    }
}

#[async_trait]
impl ConfigStore for Database {
    async fn find_config(&self, domain: &str) -> Result<Option<DomainConfig>, DbError> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM site_configs WHERE domain = ?");
        Ok(self
            .query_configs(&sql, params![domain.to_string()])
            .await?
            .pop())
    }

    #[instrument(skip(self, config), fields(domain = %config.domain))]
    async fn upsert_config(&self, config: &DomainConfig) -> Result<DomainConfig, DbError> {
        let updated_at = timestamp(config.updated_at.unwrap_or_else(Utc::now));

        self.conn
            .execute(
                "INSERT INTO site_configs (domain, crawler, include_selectors, exclude_selectors, wait_for, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(domain) DO UPDATE SET
                 crawler = excluded.crawler,
                 include_selectors = excluded.include_selectors,
                 exclude_selectors = excluded.exclude_selectors,
                 wait_for = excluded.wait_for,
                 updated_at = excluded.updated_at",
                params![
                    config.domain.clone(),
                    config.crawler.as_str().to_string(),
                    to_json(&config.include)?,
                    to_json(&config.exclude)?,
                    config.wait_for.clone().unwrap_or_default(),
                    updated_at,
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to save site config: {}", e)))?;

        self.find_config(&config.domain)
            .await?
            .ok_or_else(|| DbError::Data(format!("Config for {} vanished after upsert", config.domain)))
    }

    async fn list_configs(&self) -> Result<Vec<DomainConfig>, DbError> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM site_configs ORDER BY domain");
        self.query_configs(&sql, params![]).await
    }

    async fn delete_config(&self, domain: &str) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM site_configs WHERE domain = ?",
                params![domain.to_string()],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to delete site config: {}", e)))?;
        Ok(changed > 0)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Data(format!("Failed to parse {}: {}", column, e)))
}

fn to_json(values: &[String]) -> Result<String, DbError> {
    serde_json::to_string(values).map_err(|e| DbError::Data(format!("Failed to encode list: {}", e)))
}

fn from_json(raw: &str, column: &str) -> Result<Vec<String>, DbError> {
    serde_json::from_str(raw).map_err(|e| DbError::Data(format!("Failed to decode {}: {}", column, e)))
}

fn data_err(column: &str) -> impl Fn(libsql::Error) -> DbError + '_ {
    move |e| DbError::Data(format!("Failed to get {}: {}", column, e))
}

/// Convert a database row to an Opportunity
fn row_to_opportunity(row: &Row) -> Result<Opportunity, DbError> {
    let tags: String = row.get(3).map_err(data_err("tags"))?;
    let slots: String = row.get(8).map_err(data_err("slot_availability"))?;
    let created_at: String = row.get(14).map_err(data_err("created_at"))?;
    let updated_at: String = row.get(15).map_err(data_err("updated_at"))?;

    Ok(Opportunity {
        id: row.get(0).map_err(data_err("id"))?,
        record: VolunteerOpportunity {
            title: row.get(1).map_err(data_err("title"))?,
            organization: row.get(2).map_err(data_err("organization"))?,
            tags: from_json(&tags, "tags")?,
            location: row.get(4).map_err(data_err("location"))?,
            description: row.get(5).map_err(data_err("description"))?,
            activity_type: row.get(6).map_err(data_err("activity_type"))?,
            time_slot: row.get(7).map_err(data_err("time_slot"))?,
            slot_availability: from_json(&slots, "slot_availability")?,
            date_start: row.get(9).map_err(data_err("date_start"))?,
            date_end: row.get(10).map_err(data_err("date_end"))?,
            url: row.get(11).map_err(data_err("url"))?,
            contact_email: row.get(12).map_err(data_err("contact_email"))?,
            contact_phone: row.get(13).map_err(data_err("contact_phone"))?,
        },
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Convert a database row to a DomainConfig
fn row_to_config(row: &Row) -> Result<DomainConfig, DbError> {
    let crawler: String = row.get(1).map_err(data_err("crawler"))?;
    let include: String = row.get(2).map_err(data_err("include_selectors"))?;
    let exclude: String = row.get(3).map_err(data_err("exclude_selectors"))?;
    let wait_for: String = row.get(4).map_err(data_err("wait_for"))?;
    let updated_at: String = row.get(5).map_err(data_err("updated_at"))?;

    Ok(DomainConfig {
        domain: row.get(0).map_err(data_err("domain"))?,
        crawler: crawler
            .parse::<CrawlerKind>()
            .map_err(DbError::Data)?,
        include: from_json(&include, "include_selectors")?,
        exclude: from_json(&exclude, "exclude_selectors")?,
        wait_for: Some(wait_for).filter(|w| !w.is_empty()),
        updated_at: Some(parse_timestamp(&updated_at, "updated_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    async fn setup_test_db() -> Result<(Database, tempfile::TempDir), DbError> {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new_from_path(&db_path).await?;

        Ok((db, temp_dir))
    }

    fn record(url: &str) -> VolunteerOpportunity {
        VolunteerOpportunity {
            title: "Beach Cleanup".to_string(),
            organization: "Green Earth".to_string(),
            tags: vec!["eco".to_string(), "family".to_string()],
            slot_availability: vec!["individual drop-in welcome".to_string()],
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let mut result = db
            .execute_query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('site_configs', 'opportunities')",
                params![],
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            let table_name: String = row.get(0).unwrap();
            tables.push(table_name);
        }

        assert_eq!(tables.len(), 2);
        assert!(tables.contains(&"site_configs".to_string()));
        assert!(tables.contains(&"opportunities".to_string()));
    }

    #[tokio::test]
    async fn test_create_and_get_opportunity() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let created = db.create(&record("https://greenearth.org/beach")).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = db.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.record.tags, vec!["eco", "family"]);
        assert!(db.get(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_url_and_list() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let first = db.create(&record("https://a.org/1")).await.unwrap();
        let second = db.create(&record("https://a.org/2")).await.unwrap();

        let found = db.find_by_url("https://a.org/1").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert!(db.find_by_url("https://a.org/3").await.unwrap().is_none());

        let page = db.list(0, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, second.id);

        let rest = db.list(1, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, first.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_creates_return_their_own_rows() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let url = format!("https://a.org/event/{i}");
                let saved = db.create(&record(&url)).await.unwrap();
                (url, saved)
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            let (url, saved) = handle.await.unwrap();
            assert_eq!(saved.record.url, url);
            assert_eq!(db.get(saved.id).await.unwrap().unwrap().record.url, url);
            ids.push(saved.id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn test_create_same_url_returns_existing_row() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let first = db.create(&record("https://a.org/1")).await.unwrap();
        let mut other = record("https://a.org/1");
        other.title = "Different Title".to_string();
        let second = db.create(&other).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.record.title, "Beach Cleanup");
        assert_eq!(db.list(0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_opportunity() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        let created = db.create(&record("https://a.org/1")).await.unwrap();

        let mut changed = created.record.clone();
        changed.location = "Pier 3, Santa Monica, CA".to_string();
        let updated = db.update(created.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.record.location, "Pier 3, Santa Monica, CA");
        assert_eq!(updated.created_at, created.created_at);

        assert!(db.update(9999, &changed).await.unwrap().is_none());
        assert!(db.delete(created.id).await.unwrap());
        assert!(!db.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_config_upsert_roundtrip() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let mut config = DomainConfig::fallback("example.org").with_crawler(CrawlerKind::Js);
        config.include = vec!["main".to_string(), ".listing".to_string()];
        config.exclude = vec!["nav".to_string()];
        config.wait_for = Some("main".to_string());
        config.updated_at = Some(Utc::now());

        let saved = db.upsert_config(&config).await.unwrap();
        assert_eq!(saved.crawler, CrawlerKind::Js);
        assert_eq!(saved.include, config.include);
        assert_eq!(saved.wait_for.as_deref(), Some("main"));

        config.crawler = CrawlerKind::Get;
        config.wait_for = None;
        let saved = db.upsert_config(&config).await.unwrap();
        assert_eq!(saved.crawler, CrawlerKind::Get);
        assert!(saved.wait_for.is_none());

        assert_eq!(db.list_configs().await.unwrap().len(), 1);
        assert!(db.find_config("other.org").await.unwrap().is_none());
        assert!(db.delete_config("example.org").await.unwrap());
        assert!(db.find_config("example.org").await.unwrap().is_none());
    }
}
