//! View models crossing the page-store seam.

use chrono::{DateTime, Utc};

use crate::model::ContentSections;

/// A persisted page as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub id: i64,
    pub region: String,
    pub subregion: Option<String>,
    pub parent_id: Option<i64>,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub meta_description: String,
    pub schema_json: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a page that does not exist yet. Sub-region pages carry the
/// region page's id as parent when that page exists.
#[derive(Debug, Clone)]
pub struct NewPage<'a> {
    pub region: &'a str,
    pub subregion: Option<&'a str>,
    pub parent_id: Option<i64>,
    pub slug: &'a str,
    pub sections: &'a ContentSections,
    pub generated_at: DateTime<Utc>,
}

/// Refreshed sections for an existing page; SEO fields are rewritten along
/// with the body.
#[derive(Debug, Clone)]
pub struct PageUpdate<'a> {
    pub sections: &'a ContentSections,
    pub generated_at: DateTime<Utc>,
}
