//! Narrow repository interface the orchestrator consumes. The core never
//! depends on a concrete content-management system; the shipped adapter is
//! the SQLite store in `sqlite`.

use anyhow::Result;
use async_trait::async_trait;

use model::{NewPage, PageUpdate, StoredPage};

pub mod model;
pub mod sqlite;

#[async_trait]
pub trait PageStore: Send + Sync {
    /// Exact-key lookup: `(region, None)` matches only the region page.
    async fn find(&self, region: &str, subregion: Option<&str>) -> Result<Option<StoredPage>>;

    async fn create(&self, page: &NewPage<'_>) -> Result<i64>;

    async fn update(&self, id: i64, update: &PageUpdate<'_>) -> Result<()>;

    /// Attach or replace the structured-data blob of a page.
    async fn set_schema(&self, id: i64, schema_json: &str) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<StoredPage>>;

    /// `(region, Some(sub))` returns the exact page; `(region, None)` returns
    /// the region page and every sub-region page sharing the region key, for
    /// bulk deletes.
    async fn list_by(&self, region: &str, subregion: Option<&str>) -> Result<Vec<StoredPage>>;
}
