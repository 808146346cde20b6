//! Read-only reference data: the region/sub-region hierarchy that drives
//! topic enumeration, and the service-phrase link table used for keyword
//! injection.
//!
//! Both tables are loaded once at startup and never mutated. Iteration order
//! is the declared order of the YAML document: batches walk regions and
//! sub-regions exactly as listed, and keyword injection processes phrases in
//! list order, which decides which phrase wins a shared URL.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefDataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid reference data: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
struct RawRefData {
    regions: Vec<RawRegion>,
    keywords: Vec<RawKeyword>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRegion {
    name: String,
    #[serde(default)]
    subregions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawKeyword {
    phrase: String,
    url: String,
}

/// A region with its sub-regions, both in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    pub name: String,
    pub subregions: Vec<String>,
}

/// Declared-order region lookup table.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    entries: Vec<RegionEntry>,
}

impl RegionIndex {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[RegionEntry] {
        &self.entries
    }

    pub fn has(&self, region: &str) -> bool {
        self.entries.iter().any(|e| e.name == region)
    }

    pub fn subregions(&self, region: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.name == region)
            .map(|e| e.subregions.as_slice())
    }

    pub fn has_subregion(&self, region: &str, subregion: &str) -> bool {
        self.subregions(region)
            .map(|subs| subs.iter().any(|s| s == subregion))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Insertion-ordered phrase -> URL table for service-link injection.
#[derive(Debug, Clone, Default)]
pub struct KeywordLinks {
    entries: Vec<(String, String)>,
}

impl KeywordLinks {
    /// Pairs in insertion order; the first phrase to claim a URL wins.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn has(&self, phrase: &str) -> bool {
        self.entries.iter().any(|(p, _)| p == phrase)
    }

    pub fn get(&self, phrase: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == phrase)
            .map(|(_, u)| u.as_str())
    }

    pub fn phrases(&self) -> Vec<&str> {
        self.entries.iter().map(|(p, _)| p.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The full reference pack handed to the pipeline and orchestrator.
#[derive(Debug, Clone, Default)]
pub struct RefData {
    pub regions: RegionIndex,
    pub keywords: KeywordLinks,
}

/// Load reference data from a YAML file, or the built-in tables when `path`
/// is None.
pub fn load(path: Option<&Path>) -> Result<RefData, RefDataError> {
    match path {
        Some(p) => from_str(&fs::read_to_string(p)?),
        None => from_str(example()),
    }
}

/// Parse and validate reference data from a YAML document.
pub fn from_str(yaml: &str) -> Result<RefData, RefDataError> {
    build(serde_yaml::from_str(yaml)?)
}

fn build(raw: RawRefData) -> Result<RefData, RefDataError> {
    if raw.regions.is_empty() {
        return Err(RefDataError::Invalid("no regions declared".into()));
    }

    let mut entries = Vec::with_capacity(raw.regions.len());
    for region in raw.regions {
        let name = region.name.trim().to_string();
        if name.is_empty() {
            return Err(RefDataError::Invalid("region with empty name".into()));
        }
        if entries.iter().any(|e: &RegionEntry| e.name == name) {
            return Err(RefDataError::Invalid(format!("duplicate region '{name}'")));
        }
        let mut subregions = Vec::with_capacity(region.subregions.len());
        for sub in region.subregions {
            let sub = sub.trim().to_string();
            if sub.is_empty() {
                return Err(RefDataError::Invalid(format!(
                    "empty sub-region under '{name}'"
                )));
            }
            if subregions.contains(&sub) {
                return Err(RefDataError::Invalid(format!(
                    "duplicate sub-region '{sub}' under '{name}'"
                )));
            }
            subregions.push(sub);
        }
        entries.push(RegionEntry { name, subregions });
    }

    let mut keywords = Vec::with_capacity(raw.keywords.len());
    for kw in raw.keywords {
        let phrase = kw.phrase.trim().to_string();
        let url = kw.url.trim().to_string();
        if phrase.is_empty() || url.is_empty() {
            return Err(RefDataError::Invalid(
                "keyword with empty phrase or url".into(),
            ));
        }
        if keywords.iter().any(|(p, _): &(String, String)| *p == phrase) {
            return Err(RefDataError::Invalid(format!(
                "duplicate keyword phrase '{phrase}'"
            )));
        }
        keywords.push((phrase, url));
    }

    Ok(RefData {
        regions: RegionIndex { entries },
        keywords: KeywordLinks { entries: keywords },
    })
}

/// Built-in reference tables: the served states with their major cities, and
/// the service phrases that get linked on first occurrence. "SEO services"
/// and "local SEO" intentionally share a URL; list order decides which of
/// them claims the link in any given page.
pub fn example() -> &'static str {
    r#"regions:
  - name: "California"
    subregions: ["Los Angeles", "San Diego", "San Jose", "Sacramento", "Fresno", "Long Beach", "Oakland"]
  - name: "Texas"
    subregions: ["Houston", "San Antonio", "Dallas", "Austin", "Fort Worth", "El Paso"]
  - name: "Florida"
    subregions: ["Jacksonville", "Miami", "Tampa", "Orlando", "St. Petersburg"]
  - name: "New York"
    subregions: ["New York City", "Buffalo", "Rochester", "Syracuse", "Albany"]
  - name: "Arizona"
    subregions: ["Phoenix", "Tucson", "Mesa", "Chandler", "Scottsdale"]
  - name: "Nevada"
    subregions: ["Las Vegas", "Henderson", "Reno", "North Las Vegas"]
  - name: "Washington"
    subregions: ["Seattle", "Spokane", "Tacoma", "Vancouver", "Bellevue"]
  - name: "Colorado"
    subregions: ["Denver", "Colorado Springs", "Aurora", "Fort Collins"]
  - name: "Georgia"
    subregions: ["Atlanta", "Columbus", "Augusta", "Savannah"]
  - name: "North Carolina"
    subregions: ["Charlotte", "Raleigh", "Greensboro", "Durham", "Winston-Salem"]

keywords:
  - phrase: "digital marketing"
    url: "/services/digital-marketing/"
  - phrase: "SEO services"
    url: "/services/seo/"
  - phrase: "local SEO"
    url: "/services/seo/"
  - phrase: "web design"
    url: "/services/web-design/"
  - phrase: "PPC management"
    url: "/services/ppc/"
  - phrase: "social media marketing"
    url: "/services/social-media/"
  - phrase: "content marketing"
    url: "/services/content-marketing/"
  - phrase: "email marketing"
    url: "/services/email-marketing/"
"#
}
