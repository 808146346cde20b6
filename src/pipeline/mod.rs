//! Content pipeline: topic validation, prompt construction, one generation
//! call through the gateway, then the fixed post-processing chain that turns
//! raw text into validated, link-enriched page sections.

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::config::Site;
use crate::gateway::{GatewayError, TextGenerator};
use crate::model::{GeneratedPage, Topic};
use crate::refdata::RefData;

pub mod prompt;
pub mod text;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
    #[error("unknown sub-region '{1}' for region '{0}'")]
    UnknownSubregion(String, String),
    #[error("generator returned empty content")]
    EmptyContent,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct ContentPipeline {
    generator: Arc<dyn TextGenerator>,
    refdata: Arc<RefData>,
    site: Site,
}

impl ContentPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, refdata: Arc<RefData>, site: Site) -> Self {
        Self {
            generator,
            refdata,
            site,
        }
    }

    /// Check the topic against the reference tables. Fails before any
    /// network call is made.
    pub fn validate(&self, topic: &Topic) -> Result<(), PipelineError> {
        if !self.refdata.regions.has(&topic.region) {
            return Err(PipelineError::UnknownRegion(topic.region.clone()));
        }
        if let Some(subregion) = &topic.subregion {
            if !self.refdata.regions.has_subregion(&topic.region, subregion) {
                return Err(PipelineError::UnknownSubregion(
                    topic.region.clone(),
                    subregion.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Generate a page for a topic from the reference tables.
    pub async fn generate(&self, topic: &Topic) -> Result<GeneratedPage, PipelineError> {
        self.validate(topic)?;
        self.generate_unchecked(topic).await
    }

    /// Generate for a topic whose key comes from the page store rather than
    /// the reference tables (the refresh-everything mode ignores them).
    pub async fn generate_existing(&self, topic: &Topic) -> Result<GeneratedPage, PipelineError> {
        self.generate_unchecked(topic).await
    }

    async fn generate_unchecked(&self, topic: &Topic) -> Result<GeneratedPage, PipelineError> {
        let prompt = match &topic.subregion {
            Some(subregion) => prompt::build_subregion_prompt(
                &topic.region,
                subregion,
                &self.site,
                &self.refdata.keywords,
            ),
            None => prompt::build_region_prompt(&topic.region, &self.site, &self.refdata.keywords),
        };

        // All retrying lives inside the gateway.
        let raw = self.generator.generate(&prompt).await?;
        if raw.trim().is_empty() {
            return Err(PipelineError::EmptyContent);
        }

        let mut content = text::clean_content(&raw);
        content = text::inject_service_links(&content, &self.refdata.keywords);
        if topic.subregion.is_some() {
            content = text::inject_location_link(
                &content,
                &topic.region,
                &self.site.region_path(&topic.region),
            );
        }
        content = text::normalize_headings(&content);
        content = text::wrap_blocks(&content);

        let sections = text::extract_sections(&content, topic);
        let report = text::assess_content(&sections.body);
        if !report.passes {
            for issue in &report.issues {
                warn!(%topic, %issue, "content quality issue (publishing anyway)");
            }
        }

        Ok(GeneratedPage { sections, report })
    }
}
