//! Keyword, title and slug derivation from a raw topic.

use std::sync::LazyLock;

use chrono::Datelike;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;

use articlesmith_shared::{ArticlesmithError, Result};

use crate::outline::strip_list_marker;

/// Prefixes prepended to titles that don't already read as a guide.
pub const TITLE_PREFIXES: &[&str] = &[
    "The Ultimate Guide to",
    "Complete Guide to",
    "Everything You Need to Know About",
    "Comprehensive Overview of",
    "Understanding",
];

/// Phrases that suppress the title prefix.
const PREFIX_SUPPRESSORS: &[&str] = &["how to", "guide to", "everything"];

/// Phrases that earn the title a trailing year.
const YEAR_TRIGGERS: &[&str] = &["guide", "tips"];

const MAX_KEYWORDS: usize = 5;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\b").expect("valid regex"));

/// Any run of four digits counts as a year in a slug.
static SLUG_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("valid regex"));

/// Everything derived from a topic before any model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTitle {
    pub primary_keyword: String,
    pub title: String,
    pub slug: String,
    /// The raw topic first.
    pub keywords: Vec<String>,
}

/// Derive keyword, title and slug for `topic`.
///
/// `year` and `rng` are parameters so callers can pin both.
pub fn derive<R: Rng + ?Sized>(topic: &str, year: i32, rng: &mut R) -> Result<DerivedTitle> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ArticlesmithError::validation("topic must not be blank"));
    }

    let lowered = topic.to_lowercase();
    let display = title_case(&topic.replace('-', " "));

    let mut title = display.clone();
    if YEAR_TRIGGERS.iter().any(|t| lowered.contains(t)) && !YEAR_RE.is_match(topic) {
        title = format!("{title} {year}");
    }
    if !PREFIX_SUPPRESSORS.iter().any(|p| lowered.contains(p)) {
        if let Some(prefix) = TITLE_PREFIXES.choose(rng) {
            title = format!("{prefix} {title}");
        }
    }

    Ok(DerivedTitle {
        primary_keyword: display,
        title,
        slug: slugify(topic, year),
        keywords: vec![topic.to_string()],
    })
}

/// [`derive`] with the current year and a thread-local RNG.
pub fn derive_now(topic: &str) -> Result<DerivedTitle> {
    derive(topic, chrono::Utc::now().year(), &mut rand::thread_rng())
}

/// Lowercase ASCII-alphanumeric runs joined by hyphens, with `-<year>`
/// appended unless the slug already holds four consecutive digits.
pub fn slugify(text: &str, year: i32) -> String {
    let base = text
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if SLUG_YEAR_RE.is_match(&base) {
        base
    } else if base.is_empty() {
        year.to_string()
    } else {
        format!("{base}-{year}")
    }
}

/// Uppercase the first letter of every word; the rest is left alone.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a model-produced keyword list.
///
/// Accepts a JSON string array or one keyword per line (numbered, bulleted
/// or quoted). At most five keywords are kept; an unusable reply yields
/// `[topic]`.
pub fn parse_keyword_list(raw: &str, topic: &str) -> Vec<String> {
    let raw = raw.trim();

    let mut keywords: Vec<String> = match serde_json::from_str::<Vec<String>>(raw) {
        Ok(list) => list.into_iter().map(|k| k.trim().to_string()).collect(),
        Err(_) => raw
            .lines()
            .map(|line| {
                strip_list_marker(line)
                    .trim_matches(|c: char| c == '"' || c == '\'' || c == ',')
                    .trim()
                    .to_string()
            })
            .collect(),
    };

    keywords.retain(|k| !k.is_empty());
    keywords.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    keywords.truncate(MAX_KEYWORDS);

    if keywords.is_empty() {
        vec![topic.trim().to_string()]
    } else {
        keywords
    }
}
