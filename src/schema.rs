//! Structured-data (JSON-LD) generation for stored pages.

use serde_json::json;

use crate::config::Site;
use crate::store::model::StoredPage;

/// Collaborator seam for structured-data markup; the orchestrator regenerates
/// the blob whenever a page is created or refreshed.
pub trait SchemaGenerator: Send + Sync {
    fn generate(&self, page: &StoredPage) -> String;
}

/// JSON-LD `ProfessionalService` markup fed from the site identity.
pub struct LocalBusinessSchema {
    site: Site,
}

impl LocalBusinessSchema {
    pub fn new(site: Site) -> Self {
        Self { site }
    }
}

impl SchemaGenerator for LocalBusinessSchema {
    fn generate(&self, page: &StoredPage) -> String {
        let path = match &page.subregion {
            Some(subregion) => self.site.subregion_path(&page.region, subregion),
            None => self.site.region_path(&page.region),
        };
        let area = match &page.subregion {
            Some(subregion) => format!("{}, {}", subregion, page.region),
            None => page.region.clone(),
        };
        json!({
            "@context": "https://schema.org",
            "@type": "ProfessionalService",
            "name": self.site.business_name,
            "url": self.site.absolute_url(&path),
            "description": page.meta_description,
            "areaServed": {
                "@type": "AdministrativeArea",
                "name": area,
            },
        })
        .to_string()
    }
}
