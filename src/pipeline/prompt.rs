//! Prompt templates for region and sub-region pages.

use crate::config::Site;
use crate::refdata::KeywordLinks;

/// Fixed decorative call-to-action block the copy must carry immediately
/// before every section heading.
pub fn cta_banner(contact_path: &str) -> String {
    format!(
        "<div class=\"cta-banner\"><strong>Ready to grow your business?</strong> \
         <a href=\"{contact_path}\">Book a free strategy call today.</a></div>"
    )
}

pub fn build_region_prompt(region: &str, site: &Site, keywords: &KeywordLinks) -> String {
    format!(
        "Write a marketing page for {business}, a digital marketing agency serving \
         businesses across the state of {region}.\n\n\
         Cover the challenges {region} businesses face online and how a dedicated \
         agency partner addresses them, touching on the state's major markets.\n\n\
         {rules}",
        business = site.business_name,
        region = region,
        rules = shared_rules(region, site, keywords),
    )
}

pub fn build_subregion_prompt(
    region: &str,
    subregion: &str,
    site: &Site,
    keywords: &KeywordLinks,
) -> String {
    format!(
        "Write a marketing page for {business}, a digital marketing agency serving \
         businesses in {subregion}, {region}.\n\n\
         Make the copy specific to {subregion}: its local economy, the kinds of \
         businesses that operate there and what they need from online marketing. \
         Mention once that {subregion} is part of our wider {region} service area.\n\n\
         {rules}",
        business = site.business_name,
        subregion = subregion,
        region = region,
        rules = shared_rules(&format!("{subregion}, {region}"), site, keywords),
    )
}

fn shared_rules(location: &str, site: &Site, keywords: &KeywordLinks) -> String {
    format!(
        "Follow these rules exactly:\n\
         - Write between 600 and 800 words.\n\
         - We are a fully remote agency. Never claim a physical office, storefront, \
         staff on the ground or any other on-site presence in {location}.\n\
         - Structure the page as plain paragraphs separated by blank lines. Use an \
         <h2> tag for the page heading and <h3> tags for section headings; no other \
         markup.\n\
         - Immediately before every <h3> section heading, insert exactly this block \
         on its own line:\n{banner}\n\
         - Weave 2-3 contextual calls to action into the copy, each linking to \
         {contact} with natural anchor text.\n\
         - Where it fits naturally, mention some of these services: {services}.",
        location = location,
        banner = cta_banner(&site.contact_path),
        contact = site.contact_path,
        services = keywords.phrases().join(", "),
    )
}
