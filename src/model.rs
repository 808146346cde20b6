use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of generation work: a region, optionally narrowed to one of its
/// sub-regions. Immutable once constructed; batch drivers build a fresh
/// topic per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub region: String,
    pub subregion: Option<String>,
}

impl Topic {
    pub fn region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            subregion: None,
        }
    }

    pub fn subregion(region: impl Into<String>, subregion: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            subregion: Some(subregion.into()),
        }
    }

    pub fn is_subregion(&self) -> bool {
        self.subregion.is_some()
    }

    /// "Los Angeles, California" for sub-region topics, "California" otherwise.
    pub fn location_label(&self) -> String {
        match &self.subregion {
            Some(sub) => format!("{}, {}", sub, self.region),
            None => self.region.clone(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subregion {
            Some(sub) => write!(f, "{}/{}", self.region, sub),
            None => write!(f, "{}", self.region),
        }
    }
}

/// Structured sections extracted from processed content. Derived once,
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSections {
    pub title: String,
    /// Plain text, at most 155 characters.
    pub meta_description: String,
    /// Roughly the first 30 words of the lead paragraph.
    pub excerpt: String,
    /// Full block-structured markup.
    pub body: String,
}

/// Advisory quality report computed from a page body. Issues are logged as
/// warnings; they never block publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub passes: bool,
    pub issues: Vec<String>,
    pub word_count: usize,
}

/// Pipeline output: the sections to persist plus the advisory report.
#[derive(Debug, Clone)]
pub struct GeneratedPage {
    pub sections: ContentSections,
    pub report: ValidationReport,
}

/// Outcome of publishing a single topic, carrying the page id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created(i64),
    Updated(i64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub created: u32,
    pub updated: u32,
    pub failed: u32,
}

impl Counters {
    pub fn total(&self) -> u32 {
        self.created + self.updated + self.failed
    }
}

/// Per-run accounting, bucketed by topic category. Accumulated across a
/// batch and printed once at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub regions: Counters,
    pub subregions: Counters,
}

impl RunSummary {
    fn bucket(&mut self, topic: &Topic) -> &mut Counters {
        if topic.is_subregion() {
            &mut self.subregions
        } else {
            &mut self.regions
        }
    }

    pub fn record_created(&mut self, topic: &Topic) {
        self.bucket(topic).created += 1;
    }

    pub fn record_updated(&mut self, topic: &Topic) {
        self.bucket(topic).updated += 1;
    }

    pub fn record_failed(&mut self, topic: &Topic) {
        self.bucket(topic).failed += 1;
    }

    pub fn created(&self) -> u32 {
        self.regions.created + self.subregions.created
    }

    pub fn updated(&self) -> u32 {
        self.regions.updated + self.subregions.updated
    }

    pub fn failed(&self) -> u32 {
        self.regions.failed + self.subregions.failed
    }

    pub fn total(&self) -> u32 {
        self.regions.total() + self.subregions.total()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages processed: {} created, {} updated, {} failed \
             (regions: {}/{}/{}, sub-regions: {}/{}/{})",
            self.total(),
            self.created(),
            self.updated(),
            self.failed(),
            self.regions.created,
            self.regions.updated,
            self.regions.failed,
            self.subregions.created,
            self.subregions.updated,
            self.subregions.failed,
        )
    }
}

/// Timestamp attached to freshly generated content.
pub fn generation_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Lowercase URL slug: alphanumeric runs joined by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
