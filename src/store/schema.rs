//! # Database Schema Module
//!
//! Creates the two tables the store needs:
//! 1. `site_configs` - one selector configuration per normalized domain
//! 2. `opportunities` - extracted records, unique per url; list fields are JSON arrays in TEXT
//!    columns and timestamps are RFC 3339 strings

use libsql::{Connection, params};

use super::DbError;

/// Initialize the database schema
pub async fn initialize_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS site_configs (
            domain TEXT PRIMARY KEY,
            crawler TEXT NOT NULL DEFAULT 'get',
            include_selectors TEXT NOT NULL DEFAULT '[]',
            exclude_selectors TEXT NOT NULL DEFAULT '[]',
            wait_for TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create site_configs table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS opportunities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            organization TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            location TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            activity_type TEXT NOT NULL DEFAULT '',
            time_slot TEXT NOT NULL DEFAULT '',
            slot_availability TEXT NOT NULL DEFAULT '[]',
            date_start TEXT NOT NULL DEFAULT '',
            date_end TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL,
            contact_email TEXT NOT NULL DEFAULT '',
            contact_phone TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create opportunities table: {}", e)))?;

    // One record per page url
    conn.execute("DROP INDEX IF EXISTS idx_opportunities_url", params![])
        .await
        .map_err(|e| DbError::Schema(format!("Failed to drop old url index: {}", e)))?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_opportunities_url_unique ON opportunities(url)",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create index on opportunities: {}", e)))?;

    Ok(())
}
