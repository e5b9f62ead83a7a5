//! Persistence for opportunities and domain configurations
//!
//! The pipeline consumes storage through two traits, [`OpportunityStore`] and
//! [`ConfigStore`](crate::domain::ConfigStore); [`Database`] implements both
//! on a local libsql file.

mod database;
pub mod error;
mod schema;

pub use database::Database;
pub use error::DbError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extraction::VolunteerOpportunity;

/// A persisted opportunity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Store-assigned identifier
    pub id: i64,

    #[serde(flatten)]
    pub record: VolunteerOpportunity,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Create/read/update/delete for opportunities
#[async_trait]
pub trait OpportunityStore: Send + Sync {
    /// Persist `record`, or return the stored record when its url is already saved
    async fn create(&self, record: &VolunteerOpportunity) -> Result<Opportunity, DbError>;

    async fn get(&self, id: i64) -> Result<Option<Opportunity>, DbError>;

    /// Opportunity extracted from `url`
    async fn find_by_url(&self, url: &str) -> Result<Option<Opportunity>, DbError>;

    /// Newest first
    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Opportunity>, DbError>;

    async fn update(
        &self,
        id: i64,
        record: &VolunteerOpportunity,
    ) -> Result<Option<Opportunity>, DbError>;

    async fn delete(&self, id: i64) -> Result<bool, DbError>;
}
