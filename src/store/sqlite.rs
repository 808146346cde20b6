//! SQLite adapter for the page store.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

use super::model::{NewPage, PageUpdate, StoredPage};
use super::PageStore;

const PAGE_COLUMNS: &str = "id, region, subregion, parent_id, slug, title, body, excerpt, \
                            meta_description, schema_json, generated_at, created_at, updated_at";

#[derive(Clone)]
pub struct SqlitePageStore {
    pool: SqlitePool,
}

impl SqlitePageStore {
    /// Connect, apply PRAGMAs and run migrations. Accepts `sqlite::memory:`
    /// for tests and file-backed URLs with `~` expansion.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let normalized = prepare_sqlite_url(database_url);
        // foreign_keys is per-connection in SQLite, so it has to be part of
        // the connect options rather than a one-off PRAGMA query.
        let options = SqliteConnectOptions::from_str(&normalized)
            .with_context(|| format!("invalid page store URL {normalized}"))?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .create_if_missing(true);
        // Publishing is strictly sequential; one connection keeps in-memory
        // stores coherent as well.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open page store at {normalized}"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match path_part.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

fn map_page(row: &SqliteRow) -> Result<StoredPage> {
    Ok(StoredPage {
        id: row.try_get("id")?,
        region: row.try_get("region")?,
        subregion: row.try_get("subregion")?,
        parent_id: row.try_get("parent_id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        excerpt: row.try_get("excerpt")?,
        meta_description: row.try_get("meta_description")?,
        schema_json: row.try_get("schema_json")?,
        generated_at: row.try_get("generated_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PageStore for SqlitePageStore {
    #[instrument(skip_all)]
    async fn find(&self, region: &str, subregion: Option<&str>) -> Result<Option<StoredPage>> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE region = ? AND ifnull(subregion, '') = ?"
        );
        let row = sqlx::query(&sql)
            .bind(region)
            .bind(subregion.unwrap_or(""))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_page).transpose()
    }

    #[instrument(skip_all)]
    async fn create(&self, page: &NewPage<'_>) -> Result<i64> {
        let now = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO pages (region, subregion, parent_id, slug, title, body, excerpt, \
             meta_description, generated_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(page.region)
        .bind(page.subregion)
        .bind(page.parent_id)
        .bind(page.slug)
        .bind(&page.sections.title)
        .bind(&page.sections.body)
        .bind(&page.sections.excerpt)
        .bind(&page.sections.meta_description)
        .bind(page.generated_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert page")?;
        Ok(rec.get::<i64, _>("id"))
    }

    #[instrument(skip_all)]
    async fn update(&self, id: i64, update: &PageUpdate<'_>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE pages SET title = ?, body = ?, excerpt = ?, meta_description = ?, \
             generated_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&update.sections.title)
        .bind(&update.sections.body)
        .bind(&update.sections.excerpt)
        .bind(&update.sections.meta_description)
        .bind(update.generated_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to update page")?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("page {} not found", id));
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn set_schema(&self, id: i64, schema_json: &str) -> Result<()> {
        let result = sqlx::query("UPDATE pages SET schema_json = ?, updated_at = ? WHERE id = ?")
            .bind(schema_json)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to persist structured data")?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("page {} not found", id));
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("page {} not found", id));
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn list_all(&self) -> Result<Vec<StoredPage>> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages \
             ORDER BY region, subregion IS NOT NULL, subregion"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(map_page).collect()
    }

    #[instrument(skip_all)]
    async fn list_by(&self, region: &str, subregion: Option<&str>) -> Result<Vec<StoredPage>> {
        let rows = match subregion {
            Some(sub) => {
                let sql = format!(
                    "SELECT {PAGE_COLUMNS} FROM pages \
                     WHERE region = ? AND ifnull(subregion, '') = ?"
                );
                sqlx::query(&sql)
                    .bind(region)
                    .bind(sub)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {PAGE_COLUMNS} FROM pages WHERE region = ? \
                     ORDER BY subregion IS NOT NULL, subregion"
                );
                sqlx::query(&sql).bind(region).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(map_page).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentSections;

    async fn setup_store() -> SqlitePageStore {
        SqlitePageStore::connect("sqlite::memory:").await.unwrap()
    }

    fn sample_sections(title: &str) -> ContentSections {
        ContentSections {
            title: title.to_string(),
            meta_description: "A meta description.".to_string(),
            excerpt: "A short excerpt.".to_string(),
            body: "<h2>Title</h2>\n\n<p>Body text.</p>".to_string(),
        }
    }

    async fn insert(
        store: &SqlitePageStore,
        region: &str,
        subregion: Option<&str>,
        parent_id: Option<i64>,
    ) -> i64 {
        let sections = sample_sections(subregion.unwrap_or(region));
        store
            .create(&NewPage {
                region,
                subregion,
                parent_id,
                slug: "slug",
                sections: &sections,
                generated_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn find_matches_exact_key_only() {
        let store = setup_store().await;
        let region_id = insert(&store, "California", None, None).await;
        let sub_id = insert(&store, "California", Some("Fresno"), Some(region_id)).await;

        let region_page = store.find("California", None).await.unwrap().unwrap();
        assert_eq!(region_page.id, region_id);
        assert_eq!(region_page.subregion, None);

        let sub_page = store.find("California", Some("Fresno")).await.unwrap().unwrap();
        assert_eq!(sub_page.id, sub_id);
        assert_eq!(sub_page.parent_id, Some(region_id));

        assert!(store.find("Texas", None).await.unwrap().is_none());
        assert!(store
            .find("California", Some("Houston"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_topic_key_is_rejected() {
        let store = setup_store().await;
        insert(&store, "California", None, None).await;
        let sections = sample_sections("dup");
        let err = store
            .create(&NewPage {
                region: "California",
                subregion: None,
                parent_id: None,
                slug: "california",
                sections: &sections,
                generated_at: Utc::now(),
            })
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn update_refreshes_sections() {
        let store = setup_store().await;
        let id = insert(&store, "Texas", None, None).await;

        let sections = ContentSections {
            title: "New Title".to_string(),
            meta_description: "New meta.".to_string(),
            excerpt: "New excerpt.".to_string(),
            body: "<p>New body.</p>".to_string(),
        };
        store
            .update(
                id,
                &PageUpdate {
                    sections: &sections,
                    generated_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let page = store.find("Texas", None).await.unwrap().unwrap();
        assert_eq!(page.title, "New Title");
        assert_eq!(page.body, "<p>New body.</p>");

        let missing = store
            .update(
                9999,
                &PageUpdate {
                    sections: &sections,
                    generated_at: Utc::now(),
                },
            )
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn schema_blob_round_trips() {
        let store = setup_store().await;
        let id = insert(&store, "Nevada", None, None).await;
        store.set_schema(id, r#"{"@type":"LocalBusiness"}"#).await.unwrap();
        let page = store.find("Nevada", None).await.unwrap().unwrap();
        assert_eq!(page.schema_json.as_deref(), Some(r#"{"@type":"LocalBusiness"}"#));
    }

    #[tokio::test]
    async fn list_by_region_includes_subregion_pages() {
        let store = setup_store().await;
        let region_id = insert(&store, "Arizona", None, None).await;
        insert(&store, "Arizona", Some("Phoenix"), Some(region_id)).await;
        insert(&store, "Arizona", Some("Tucson"), Some(region_id)).await;
        insert(&store, "Nevada", None, None).await;

        let pages = store.list_by("Arizona", None).await.unwrap();
        assert_eq!(pages.len(), 3);
        // Region page sorts first.
        assert_eq!(pages[0].subregion, None);

        let exact = store.list_by("Arizona", Some("Phoenix")).await.unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].subregion.as_deref(), Some("Phoenix"));

        assert_eq!(store.list_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn delete_clears_parent_references() {
        let store = setup_store().await;
        let region_id = insert(&store, "Georgia", None, None).await;
        insert(&store, "Georgia", Some("Atlanta"), Some(region_id)).await;

        store.delete(region_id).await.unwrap();
        let orphan = store.find("Georgia", Some("Atlanta")).await.unwrap().unwrap();
        assert_eq!(orphan.parent_id, None);

        assert!(store.delete(region_id).await.is_err());
    }

    #[test]
    fn sqlite_url_normalisation() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://host/db"),
            "postgres://host/db"
        );
        assert_eq!(
            prepare_sqlite_url("sqlite:///tmp/geopages/pages.db"),
            "sqlite:///tmp/geopages/pages.db"
        );
    }
}
