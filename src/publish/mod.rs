//! Publish orchestrator: drives topics through lookup, generation and
//! persistence, paces requests between topics and accounts per-topic
//! outcomes. A single failed topic never aborts a batch; it is counted,
//! logged and the loop moves on.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::model::{generation_timestamp, slugify, PublishOutcome, RunSummary, Topic};
use crate::pipeline::ContentPipeline;
use crate::refdata::RefData;
use crate::schema::SchemaGenerator;
use crate::store::model::{NewPage, PageUpdate};
use crate::store::PageStore;

pub mod pacing;

use pacing::Pacer;

/// Page selection for structured-data regeneration.
#[derive(Debug, Clone, Default)]
pub struct SchemaFilter {
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub region_only: bool,
}

pub struct Publisher {
    store: Arc<dyn PageStore>,
    pipeline: ContentPipeline,
    schema: Arc<dyn SchemaGenerator>,
    refdata: Arc<RefData>,
    pacer: Pacer,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn PageStore>,
        pipeline: ContentPipeline,
        schema: Arc<dyn SchemaGenerator>,
        refdata: Arc<RefData>,
        pacer: Pacer,
    ) -> Self {
        Self {
            store,
            pipeline,
            schema,
            refdata,
            pacer,
        }
    }

    /// Publish one topic: exact-key lookup decides create vs update.
    pub async fn publish_topic(&self, topic: &Topic) -> Result<PublishOutcome> {
        match self
            .store
            .find(&topic.region, topic.subregion.as_deref())
            .await?
        {
            Some(existing) => {
                let id = self.update_existing(topic, existing.id, false).await?;
                Ok(PublishOutcome::Updated(id))
            }
            None => {
                let id = self.create_new(topic).await?;
                Ok(PublishOutcome::Created(id))
            }
        }
    }

    async fn create_new(&self, topic: &Topic) -> Result<i64> {
        let generated = self.pipeline.generate(topic).await?;

        // A sub-region page declares the region page as parent when it
        // exists; otherwise the hierarchy can be filled in by a later run.
        let parent_id = match &topic.subregion {
            Some(_) => self
                .store
                .find(&topic.region, None)
                .await?
                .map(|page| page.id),
            None => None,
        };

        let slug = slugify(topic.subregion.as_deref().unwrap_or(&topic.region));
        let id = self
            .store
            .create(&NewPage {
                region: &topic.region,
                subregion: topic.subregion.as_deref(),
                parent_id,
                slug: &slug,
                sections: &generated.sections,
                generated_at: generation_timestamp(),
            })
            .await
            .with_context(|| format!("failed to create page for {topic}"))?;

        self.refresh_schema(topic).await?;
        Ok(id)
    }

    async fn update_existing(&self, topic: &Topic, id: i64, from_store: bool) -> Result<i64> {
        let generated = if from_store {
            self.pipeline.generate_existing(topic).await?
        } else {
            self.pipeline.generate(topic).await?
        };
        self.store
            .update(
                id,
                &PageUpdate {
                    sections: &generated.sections,
                    generated_at: generation_timestamp(),
                },
            )
            .await
            .with_context(|| format!("failed to update page for {topic}"))?;

        self.refresh_schema(topic).await?;
        Ok(id)
    }

    async fn refresh_schema(&self, topic: &Topic) -> Result<()> {
        if let Some(page) = self
            .store
            .find(&topic.region, topic.subregion.as_deref())
            .await?
        {
            let blob = self.schema.generate(&page);
            self.store.set_schema(page.id, &blob).await?;
        }
        Ok(())
    }

    /// One batch item: outcome goes into the summary, then the pacer runs.
    async fn process_topic(&self, topic: &Topic, summary: &mut RunSummary) {
        info!(%topic, "processing topic");
        match self.publish_topic(topic).await {
            Ok(PublishOutcome::Created(id)) => {
                info!(%topic, id, "page created");
                summary.record_created(topic);
            }
            Ok(PublishOutcome::Updated(id)) => {
                info!(%topic, id, "page updated");
                summary.record_updated(topic);
            }
            Err(err) => {
                warn!(%topic, ?err, "topic failed; continuing batch");
                summary.record_failed(topic);
            }
        }
        self.pacer.pause().await;
    }

    /// Every region and sub-region page, in declared reference order.
    pub async fn publish_all(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for entry in self.refdata.regions.entries() {
            self.process_topic(&Topic::region(entry.name.as_str()), &mut summary)
                .await;
            for subregion in &entry.subregions {
                self.process_topic(
                    &Topic::subregion(entry.name.as_str(), subregion.as_str()),
                    &mut summary,
                )
                .await;
            }
        }
        info!(%summary, "publish run complete");
        Ok(summary)
    }

    pub async fn publish_region(&self, region: &str) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        self.process_topic(&Topic::region(region), &mut summary).await;
        Ok(summary)
    }

    pub async fn publish_subregion(&self, region: &str, subregion: &str) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        self.process_topic(&Topic::subregion(region, subregion), &mut summary)
            .await;
        Ok(summary)
    }

    /// Every sub-region of one region, optionally refreshing the region page
    /// first.
    pub async fn publish_region_subregions(
        &self,
        region: &str,
        include_region: bool,
    ) -> Result<RunSummary> {
        let subregions = self
            .refdata
            .regions
            .subregions(region)
            .ok_or_else(|| anyhow!("unknown region '{region}'"))?
            .to_vec();

        let mut summary = RunSummary::default();
        if include_region {
            self.process_topic(&Topic::region(region), &mut summary).await;
        }
        for subregion in &subregions {
            self.process_topic(&Topic::subregion(region, subregion.as_str()), &mut summary)
                .await;
        }
        Ok(summary)
    }

    /// Update branch for every stored page, enumerated straight from the
    /// store; the reference topic lists are ignored here.
    pub async fn refresh_all(&self) -> Result<RunSummary> {
        let pages = self.store.list_all().await?;
        let mut summary = RunSummary::default();
        for page in pages {
            let topic = Topic {
                region: page.region.clone(),
                subregion: page.subregion.clone(),
            };
            info!(%topic, id = page.id, "refreshing stored page");
            match self.update_existing(&topic, page.id, true).await {
                Ok(_) => summary.record_updated(&topic),
                Err(err) => {
                    warn!(%topic, ?err, "refresh failed; continuing batch");
                    summary.record_failed(&topic);
                }
            }
            self.pacer.pause().await;
        }
        info!(%summary, "refresh run complete");
        Ok(summary)
    }

    /// Remove one sub-region page. Unconditional; returns the number of
    /// pages deleted.
    pub async fn delete_subregion(&self, region: &str, subregion: &str) -> Result<usize> {
        let pages = self.store.list_by(region, Some(subregion)).await?;
        for page in &pages {
            self.store.delete(page.id).await?;
            info!(id = page.id, region, subregion, "page deleted");
        }
        Ok(pages.len())
    }

    /// Remove a region page together with every sub-region page sharing the
    /// region key.
    pub async fn delete_region(&self, region: &str) -> Result<usize> {
        let pages = self.store.list_by(region, None).await?;
        for page in &pages {
            self.store.delete(page.id).await?;
            info!(id = page.id, region, subregion = ?page.subregion, "page deleted");
        }
        Ok(pages.len())
    }

    /// Rebuild the structured-data blob for existing pages matching the
    /// filter. No generation calls are made.
    pub async fn regenerate_schema(&self, filter: &SchemaFilter) -> Result<usize> {
        let pages = match &filter.region {
            Some(region) => self.store.list_by(region, filter.subregion.as_deref()).await?,
            None => self.store.list_all().await?,
        };

        let mut count = 0;
        for page in pages {
            if filter.region_only && page.subregion.is_some() {
                continue;
            }
            if let Some(subregion) = &filter.subregion {
                if page.subregion.as_deref() != Some(subregion.as_str()) {
                    continue;
                }
            }
            let blob = self.schema.generate(&page);
            self.store.set_schema(page.id, &blob).await?;
            info!(id = page.id, region = %page.region, "structured data regenerated");
            count += 1;
        }
        Ok(count)
    }
}
