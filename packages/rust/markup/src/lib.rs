//! HTML transforms applied to generated article bodies.
//!
//! Everything here is pure `&str -> String` work: artifact cleanup of model
//! output, internal and external link injection, figure placement under
//! section headings, and plain-text helpers (tag stripping, excerpts, word
//! counts).

mod cleanup;
mod figures;
mod links;
mod text;

pub use cleanup::clean_generated_html;
pub use figures::{Figure, figure_html, insert_figures};
pub use links::{
    LinkPass, TITLE_STOPWORDS, inject_external_links, inject_internal_links, resolve_external_url,
    title_keyword,
};
pub use text::{build_excerpt, strip_figures, strip_tags, word_count};

/// Escape text for use in HTML element content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
