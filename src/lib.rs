//! Bulk generation and maintenance of AI-written service-area pages.
//!
//! The crate is wired together by the `geopages` binary: reference data
//! (regions, sub-regions, service keywords) drives the publish orchestrator,
//! which runs every topic through the content pipeline and persists the
//! result in the page store. All network access to the text-generation API
//! lives behind `gateway`.

pub mod clock;
pub mod config;
pub mod gateway;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod refdata;
pub mod schema;
pub mod store;

pub use model::{ContentSections, PublishOutcome, RunSummary, Topic};
