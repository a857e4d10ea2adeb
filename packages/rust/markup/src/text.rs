//! Plain-text views of generated HTML.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node};

const EXCERPT_MAX_CHARS: usize = 150;
const EXCERPT_KEYWORD_ROOM: usize = 120;

/// Elements whose boundaries separate words.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "section",
    "article", "header", "footer", "blockquote", "figure", "figcaption", "table", "tr", "td",
    "th", "pre",
];

/// Elements whose text is never shown.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Remove `<figure>` blocks, captions included.
pub fn strip_figures(html: &str) -> String {
    static FIGURE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<figure\b.*?</figure\s*>").expect("valid regex"));

    FIGURE_RE.replace_all(html, "").to_string()
}

/// Visible text of an HTML fragment with whitespace collapsed.
pub fn strip_tags(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => text.push(' '),
            Node::Text(t) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                });
                if !hidden {
                    text.push_str(t);
                }
            }
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Word count of the visible text.
pub fn word_count(html: &str) -> usize {
    strip_tags(html).split_whitespace().count()
}

/// Short summary built from the leading sentences of the body.
///
/// Sentences are added while the running text stays under 150 characters.
/// If the result does not mention `keyword` and is short, a pointer sentence
/// naming it is appended.
pub fn build_excerpt(content: &str, keyword: &str) -> String {
    let plain = strip_tags(&strip_figures(content));
    let mut excerpt = String::new();

    for sentence in plain.split('.') {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if excerpt.chars().count() + sentence.chars().count() < EXCERPT_MAX_CHARS {
            excerpt.push_str(sentence);
            excerpt.push_str(". ");
        } else {
            break;
        }
    }

    let keyword = keyword.replace('-', " ");
    let keyword = keyword.trim();
    if !excerpt.is_empty()
        && !keyword.is_empty()
        && !excerpt.to_lowercase().contains(&keyword.to_lowercase())
    {
        let trimmed = excerpt.trim_end().to_string();
        if trimmed.chars().count() < EXCERPT_KEYWORD_ROOM {
            excerpt = format!("{trimmed} Learn more about {keyword}.");
        }
    }

    excerpt.trim().to_string()
}
