//! Internal and external link injection.
//!
//! The internal pass links mentions of recently published works. The external
//! pass resolves `[LINK: description]` placeholders left by the model into
//! authority-domain URLs.
//!
//! The regex engine has no lookaround, so "not already linked" is checked by
//! locating anchor elements, tags and pending placeholders first and skipping
//! matches that overlap them.

use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};
use tracing::debug;
use url::{Url, form_urlencoded};

use articlesmith_shared::{LinkCandidate, LinkKind, PublishedWork};

use crate::escape_html;

/// Words ignored when picking a keyword out of a work's title.
pub const TITLE_STOPWORDS: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "how", "what",
    "why", "when", "where", "who", "guide", "ultimate", "complete", "best",
];

const MIN_CANDIDATE_CHARS: usize = 3;
const MIN_KEYWORD_CHARS: usize = 4;

/// Output of a link pass.
#[derive(Debug, Clone)]
pub struct LinkPass {
    pub content: String,
    /// Links produced by this pass, in document order of insertion.
    pub links: Vec<LinkCandidate>,
}

impl LinkPass {
    /// Number of anchors actually inserted.
    pub fn inserted(&self) -> usize {
        self.links.iter().filter(|l| l.resolved).count()
    }
}

// ---------------------------------------------------------------------------
// Internal pass
// ---------------------------------------------------------------------------

/// Link up to `max` published works mentioned in `content`.
///
/// Each work contributes at most one link: its full title is tried first,
/// then its longest meaningful title word. A work whose URL is already linked
/// counts toward `max` and is not linked again, so repeated runs are no-ops.
pub fn inject_internal_links(content: &str, works: &[PublishedWork], max: usize) -> LinkPass {
    let mut content = content.to_string();
    let mut links = Vec::new();
    let mut linked = 0usize;

    if max == 0 {
        return LinkPass { content, links };
    }

    for work in works {
        if linked >= max {
            break;
        }

        let href = escape_html(&work.url);
        if content.contains(&format!("href=\"{href}\"")) {
            linked += 1;
            continue;
        }

        let candidates = [work.title.trim().to_string(), title_keyword(&work.title)];
        for candidate in candidates {
            if candidate.chars().count() < MIN_CANDIDATE_CHARS {
                continue;
            }
            let Some((start, end)) = find_unlinked(&content, &candidate) else {
                continue;
            };

            let matched = content[start..end].to_string();
            content.replace_range(start..end, &format!("<a href=\"{href}\">{matched}</a>"));
            links.push(LinkCandidate {
                anchor_text: matched,
                url: work.url.clone(),
                kind: LinkKind::Internal,
                resolved: true,
            });
            linked += 1;
            break;
        }
    }

    debug!(
        works = works.len(),
        inserted = links.len(),
        "internal link pass complete"
    );
    LinkPass { content, links }
}

/// Longest non-stopword of at least four characters in a title, lowercased.
/// Empty when the title has none.
pub fn title_keyword(title: &str) -> String {
    let lower = title.to_lowercase();
    let mut longest = "";
    for word in lower.split_whitespace() {
        if TITLE_STOPWORDS.contains(&word) {
            continue;
        }
        let len = word.chars().count();
        if len >= MIN_KEYWORD_CHARS && len > longest.chars().count() {
            longest = word;
        }
    }
    longest.to_string()
}

/// First case-insensitive occurrence of `needle` outside tags and anchors.
fn find_unlinked(content: &str, needle: &str) -> Option<(usize, usize)> {
    let re = RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .ok()?;
    let protected = protected_spans(content);

    re.find_iter(content)
        .map(|m| (m.start(), m.end()))
        .find(|&(s, e)| !protected.iter().any(|&(ps, pe)| s < pe && ps < e))
}

/// Byte ranges of whole anchor elements, every tag and every `[LINK: …]`
/// placeholder. Placeholders belong to the external pass.
fn protected_spans(content: &str) -> Vec<(usize, usize)> {
    static ANCHOR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>.*?</a\s*>").expect("valid regex"));
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
    static PLACEHOLDER_SPAN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\[LINK:[^\]]*\]").expect("valid regex"));

    ANCHOR_RE
        .find_iter(content)
        .chain(TAG_RE.find_iter(content))
        .chain(PLACEHOLDER_SPAN_RE.find_iter(content))
        .map(|m| (m.start(), m.end()))
        .collect()
}

// ---------------------------------------------------------------------------
// External pass
// ---------------------------------------------------------------------------

/// Replace `[LINK: description]` placeholders with outbound anchors.
///
/// The first `max` placeholders become anchors; the rest are replaced by their
/// bare description. No placeholder survives the pass.
pub fn inject_external_links(content: &str, max: usize) -> LinkPass {
    static PLACEHOLDER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\[LINK:\s*([^\]]+)\]").expect("valid regex"));

    let mut links: Vec<LinkCandidate> = Vec::new();
    let mut inserted = 0usize;

    let content = PLACEHOLDER_RE
        .replace_all(content, |caps: &Captures| {
            let description = caps[1].trim();
            if description.is_empty() {
                return String::new();
            }
            let text = escape_html(description);

            if inserted >= max {
                links.push(LinkCandidate {
                    anchor_text: description.to_string(),
                    url: String::new(),
                    kind: LinkKind::External,
                    resolved: false,
                });
                return text;
            }

            let url = resolve_external_url(description);
            inserted += 1;
            let anchor = format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{text}</a>",
                escape_html(&url)
            );
            links.push(LinkCandidate {
                anchor_text: description.to_string(),
                url,
                kind: LinkKind::External,
                resolved: true,
            });
            anchor
        })
        .into_owned();

    debug!(
        placeholders = links.len(),
        inserted, "external link pass complete"
    );
    LinkPass { content, links }
}

#[derive(Debug, Clone, Copy)]
enum Authority {
    Encyclopedia,
    CodeHosting,
    WebStandards,
    Tutorials,
}

/// Ordered authority rules; the first keyword hit wins.
const AUTHORITY_RULES: &[(Authority, &[&str])] = &[
    (
        Authority::Encyclopedia,
        &["definition", "history", "overview", "about", "what is"],
    ),
    (
        Authority::CodeHosting,
        &["code", "repository", "github", "source", "development"],
    ),
    (
        Authority::WebStandards,
        &["javascript", "css", "html", "web", "browser"],
    ),
    (
        Authority::Tutorials,
        &["tutorial", "learn", "programming", "web development"],
    ),
];

/// Topic keywords mapped to search or reference pages. The flag marks pages
/// that take the description as a query.
const DOMAIN_MAP: &[(&str, &str, bool)] = &[
    ("research", "https://scholar.google.com/scholar?q=", true),
    ("news", "https://news.google.com/search?q=", true),
    ("health", "https://www.who.int/news-room/fact-sheets", false),
    ("technology", "https://techcrunch.com/search/", true),
    ("business", "https://www.businessinsider.com/search?q=", true),
    ("education", "https://www.edx.org/search?q=", true),
];

/// Pick an outbound URL for a link description.
pub fn resolve_external_url(description: &str) -> String {
    let lower = description.to_lowercase();

    for (authority, keywords) in AUTHORITY_RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return authority_url(*authority, description);
        }
    }

    for (topic, base, with_query) in DOMAIN_MAP {
        if lower.contains(topic) {
            return if *with_query {
                format!("{base}{}", encode_query(description))
            } else {
                (*base).to_string()
            };
        }
    }

    encyclopedia_url(description)
}

fn authority_url(authority: Authority, description: &str) -> String {
    let lower = description.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    match authority {
        Authority::Encyclopedia => encyclopedia_url(description),
        Authority::CodeHosting => {
            format!("https://github.com/search?q={}", encode_query(description))
        }
        Authority::WebStandards => normalize_url(&format!(
            "https://developer.mozilla.org/en-US/docs/{}",
            words.join("/")
        )),
        Authority::Tutorials => normalize_url(&format!(
            "https://www.w3schools.com/{}.asp",
            words.join("_")
        )),
    }
}

fn encyclopedia_url(description: &str) -> String {
    let title = description
        .split_whitespace()
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join("_");
    normalize_url(&format!("https://en.wikipedia.org/wiki/{title}"))
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn encode_query(s: &str) -> String {
    form_urlencoded::byte_serialize(s.trim().as_bytes()).collect()
}

/// Percent-encode whatever the URL parser would; keep the raw string if it
/// does not parse.
fn normalize_url(raw: &str) -> String {
    Url::parse(raw)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| raw.to_string())
}
