//! Pure text stages applied to raw generated copy, in the fixed order the
//! pipeline runs them: clean, link injection, heading normalization, block
//! wrapping, section extraction, quality assessment.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{ContentSections, Topic, ValidationReport};
use crate::refdata::KeywordLinks;

static HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static HEADING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<h[1-6][^>]*>(.*?)</h[1-6]>").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static BLOCK_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<(h[1-6]|p|div|ul|ol|blockquote)[ >]").expect("valid regex"));

/// Normalize line endings, collapse horizontal whitespace runs, trim every
/// line and collapse runs of blank lines to a single blank line.
pub fn clean_content(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<String> = unified
        .lines()
        .map(|line| HSPACE.replace_all(line.trim(), " ").into_owned())
        .collect();
    BLANK_RUNS
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Link the first case-insensitive whole-word occurrence of each service
/// phrase, in the reference data's insertion order. A phrase is skipped
/// entirely when the content already links to its URL, so re-running this
/// stage never adds a second link to the same target.
pub fn inject_service_links(content: &str, keywords: &KeywordLinks) -> String {
    let mut out = content.to_string();
    for (phrase, url) in keywords.iter() {
        if has_link_to(&out, url) {
            continue;
        }
        out = link_first_occurrence(&out, phrase, url);
    }
    out
}

/// For sub-region pages: link the first whole-word occurrence of the region
/// name to the region page, unless that page is already linked.
pub fn inject_location_link(content: &str, region: &str, region_path: &str) -> String {
    if has_link_to(content, region_path) {
        return content.to_string();
    }
    link_first_occurrence(content, region, region_path)
}

fn has_link_to(content: &str, url: &str) -> bool {
    content.contains(&format!("href=\"{url}\""))
}

fn link_first_occurrence(content: &str, phrase: &str, url: &str) -> String {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
    let Ok(re) = Regex::new(&pattern) else {
        return content.to_string();
    };
    re.replace(content, |caps: &regex::Captures<'_>| {
        format!("<a href=\"{url}\">{}</a>", &caps[0])
    })
    .into_owned()
}

/// Rewrite markdown heading lines to heading markup (`#` -> h2, `##` -> h3,
/// `###` -> h4), give heading lines blank-line spacing and re-collapse any
/// excess blank lines.
pub fn normalize_headings(content: &str) -> String {
    let mut lines = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(text) = trimmed.strip_prefix("### ") {
            lines.push(format!("\n<h4>{}</h4>\n", text.trim()));
        } else if let Some(text) = trimmed.strip_prefix("## ") {
            lines.push(format!("\n<h3>{}</h3>\n", text.trim()));
        } else if let Some(text) = trimmed.strip_prefix("# ") {
            lines.push(format!("\n<h2>{}</h2>\n", text.trim()));
        } else {
            lines.push(line.to_string());
        }
    }
    BLANK_RUNS
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Split on blank-line-delimited units; recognised block markup passes
/// through, everything else becomes a paragraph. Blocks end up separated by
/// exactly one blank line.
pub fn wrap_blocks(content: &str) -> String {
    let mut blocks = Vec::new();
    for unit in content.split("\n\n") {
        let unit = unit.trim();
        if unit.is_empty() {
            continue;
        }
        if BLOCK_START.is_match(unit) {
            blocks.push(unit.to_string());
        } else {
            blocks.push(format!("<p>{}</p>", unit.replace('\n', " ")));
        }
    }
    blocks.join("\n\n")
}

/// Extract the persistable sections from fully processed content.
///
/// Title comes from the first heading, with a deterministic fallback naming
/// the topic's location. Meta description and excerpt come from the first
/// paragraph whose tag-stripped text exceeds 50 characters; the meta is
/// word-trimmed to at most 155 characters, the excerpt to 30 words.
pub fn extract_sections(content: &str, topic: &Topic) -> ContentSections {
    let title = HEADING_TAG
        .captures(content)
        .map(|caps| strip_tags(&caps[1]).trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| format!("Digital Marketing Services in {}", topic.location_label()));

    let lead = content
        .split("\n\n")
        .map(str::trim)
        .filter(|block| block.starts_with("<p"))
        .map(|block| strip_tags(block).trim().to_string())
        .find(|text| text.chars().count() > 50)
        .unwrap_or_default();

    ContentSections {
        title,
        meta_description: trim_to_chars(&lead, 155),
        excerpt: first_words(&lead, 30),
        body: content.to_string(),
    }
}

/// Advisory quality check: word count, heading presence, paragraph count.
/// Failures never block publication.
pub fn assess_content(body: &str) -> ValidationReport {
    let word_count = strip_tags(body).split_whitespace().count();
    let headings = HEADING_TAG.find_iter(body).count();
    let paragraphs = body.matches("<p>").count();

    let mut issues = Vec::new();
    if word_count < 300 {
        issues.push(format!("only {word_count} words, expected at least 300"));
    }
    if headings == 0 {
        issues.push("no headings".to_string());
    }
    if paragraphs < 3 {
        issues.push(format!("only {paragraphs} paragraphs, expected at least 3"));
    }

    ValidationReport {
        passes: issues.is_empty(),
        issues,
        word_count,
    }
}

pub fn strip_tags(content: &str) -> String {
    TAG.replace_all(content, "").into_owned()
}

/// Cut to a whole-word prefix of at most `limit` characters, appending an
/// ellipsis when anything was dropped.
fn trim_to_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let budget = limit.saturating_sub(3);
    let mut out = String::new();
    for word in text.split_whitespace() {
        let needed = word.chars().count() + if out.is_empty() { 0 } else { 1 };
        if out.chars().count() + needed > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.push_str("...");
    out
}

fn first_words(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}
