//! # oppcrawl - Volunteer Opportunity Extraction for Rust
//!
//! This crate turns arbitrary web pages into structured volunteer opportunity
//! records. Each page goes through the same steps:
//!
//! 1. resolve the per-domain selector configuration ([`domain`])
//! 2. fetch it statically or render it headlessly ([`crawler`])
//! 3. reduce the markup to bounded, relevant text ([`reducer`])
//! 4. extract a schema-bound record with provider failover ([`extraction`], [`model`])
//! 5. persist it ([`store`])
//!
//! [`pipeline::Pipeline`] composes the steps and also proposes selectors for
//! new domains.
//!
//! ## Example
//!
//! ```rust,no_run
//! use oppcrawl::model::ModelChoice;
//! use oppcrawl::pipeline::Pipeline;
//! use oppcrawl::Settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let pipeline = Pipeline::from_settings(&settings).await?;
//!
//!     let saved = pipeline
//!         .scrape_and_save("https://example.org/volunteer/beach-cleanup", ModelChoice::Gemini)
//!         .await?;
//!
//!     println!("{} by {}", saved.record.title, saved.record.organization);
//!     Ok(())
//! }
//! ```

mod config;
mod error;

pub mod crawler;
pub mod domain;
pub mod extraction;
pub mod model;
pub mod pipeline;
pub mod reducer;
pub mod store;

pub use config::{ConfigError, Settings, SettingsBuilder};
pub use error::{Error, ErrorPayload, Result};

/// Re-export of commonly used types
pub mod prelude {
    pub use crate::domain::{CrawlerKind, DomainConfig};
    pub use crate::error::{Error, Result};
    pub use crate::extraction::VolunteerOpportunity;
    pub use crate::model::ModelChoice;
    pub use crate::pipeline::Pipeline;
    pub use crate::store::Opportunity;
}
