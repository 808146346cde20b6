//! Configuration loader and validator for the page generator.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub site: Site,
    pub anthropic: Anthropic,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Unconditional delay inserted after every processed topic, in seconds.
    pub pacing_seconds: u64,
    /// Optional path to a reference-data YAML file; empty uses the built-in
    /// region and keyword tables.
    #[serde(default)]
    pub refdata_file: String,
}

/// Site identity used in prompts, page paths and structured data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub business_name: String,
    pub base_url: String,
    /// Path prefix for area pages, e.g. `/areas/` -> `/areas/california/`.
    pub area_path: String,
    /// Target of the contextual call-to-action links.
    pub contact_path: String,
}

/// Text-generation API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Anthropic {
    /// May be empty; the gateway then refuses every call as not configured.
    /// The `ANTHROPIC_API_KEY` environment variable takes precedence when set.
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub version: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

impl Site {
    /// Site-relative path of a region page, e.g. `/areas/california/`.
    pub fn region_path(&self, region: &str) -> String {
        format!("{}{}/", self.area_path, crate::model::slugify(region))
    }

    /// Site-relative path of a sub-region page, nested under its region.
    pub fn subregion_path(&self, region: &str, subregion: &str) -> String {
        format!(
            "{}{}/{}/",
            self.area_path,
            crate::model::slugify(region),
            crate::model::slugify(subregion)
        )
    }

    /// Absolute URL for a site-relative path.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Anthropic {
    /// Resolve the credential: environment variable first, config key second.
    /// `None` means the gateway is not configured.
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        let key = self.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.site.business_name.trim().is_empty() {
        return Err(ConfigError::Invalid("site.business_name must be non-empty"));
    }
    if cfg.site.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("site.base_url must be non-empty"));
    }
    if !cfg.site.area_path.starts_with('/') || !cfg.site.area_path.ends_with('/') {
        return Err(ConfigError::Invalid(
            "site.area_path must start and end with '/'",
        ));
    }
    if !cfg.site.contact_path.starts_with('/') {
        return Err(ConfigError::Invalid("site.contact_path must start with '/'"));
    }

    // anthropic.api_key may be empty; the gateway reports NotConfigured per call.
    if cfg.anthropic.model.trim().is_empty() {
        return Err(ConfigError::Invalid("anthropic.model must be non-empty"));
    }
    if cfg.anthropic.version.trim().is_empty() {
        return Err(ConfigError::Invalid("anthropic.version must be non-empty"));
    }
    if cfg.anthropic.max_tokens == 0 {
        return Err(ConfigError::Invalid("anthropic.max_tokens must be > 0"));
    }
    if cfg.anthropic.timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "anthropic.timeout_seconds must be > 0",
        ));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the tool.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  pacing_seconds: 2
  refdata_file: ""

site:
  business_name: "Summit Reach Digital"
  base_url: "https://example.com"
  area_path: "/areas/"
  contact_path: "/contact/"

anthropic:
  api_key: "YOUR_API_KEY"
  model: "claude-3-5-sonnet-20241022"
  version: "2023-06-01"
  max_tokens: 4096
  timeout_seconds: 600
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_business_name() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.site.business_name = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("site.business_name")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_paths() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.site.area_path = "areas/".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.site.contact_path = "contact".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_generator_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.anthropic.model = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("anthropic.model")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.anthropic.max_tokens = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.anthropic.timeout_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_api_key_is_allowed() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.anthropic.api_key = "".into();
        validate(&cfg).unwrap();
    }

    #[test]
    fn page_paths_use_slugs() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        assert_eq!(cfg.site.region_path("California"), "/areas/california/");
        assert_eq!(
            cfg.site.subregion_path("California", "Los Angeles"),
            "/areas/california/los-angeles/"
        );
        assert_eq!(
            cfg.site.absolute_url("/areas/california/"),
            "https://example.com/areas/california/"
        );
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(example().as_bytes()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.app.pacing_seconds, 2);
        assert_eq!(cfg.anthropic.timeout_seconds, 600);
    }
}
