//! Figure markup and section-aware placement.

use std::sync::LazyLock;

use regex::Regex;

use crate::escape_html;

/// An image ready to be placed in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    pub src: String,
    pub alt: String,
    /// Attribution line. Omitted from the markup when empty.
    pub caption: String,
}

/// Render a figure block, padded with blank lines on both sides.
pub fn figure_html(figure: &Figure) -> String {
    let caption = if figure.caption.is_empty() {
        String::new()
    } else {
        format!("<figcaption>{}</figcaption>", escape_html(&figure.caption))
    };
    format!(
        "\n\n<figure class=\"article-figure\"><img src=\"{}\" alt=\"{}\"/>{caption}</figure>\n\n",
        escape_html(&figure.src),
        escape_html(&figure.alt)
    )
}

/// Place figures after the body of successive `<h2>` sections.
///
/// The first figure goes after the first section, the second after the
/// second, and so on. Content without `<h2>` headings is returned unchanged;
/// figures beyond the number of headings are not placed.
pub fn insert_figures(content: &str, figures: &[Figure]) -> String {
    static H2_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<h2[^>]*>.*?</h2\s*>").expect("valid regex"));

    let headings: Vec<(usize, usize)> = H2_RE
        .find_iter(content)
        .map(|m| (m.start(), m.end()))
        .collect();

    if headings.is_empty() || figures.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len() + figures.len() * 200);
    out.push_str(&content[..headings[0].0]);

    let mut remaining = figures.iter();
    for (i, &(start, end)) in headings.iter().enumerate() {
        let section_end = headings.get(i + 1).map_or(content.len(), |next| next.0);
        out.push_str(&content[start..end]);
        out.push_str(&content[end..section_end]);
        if let Some(figure) = remaining.next() {
            out.push_str(&figure_html(figure));
        }
    }

    out
}
