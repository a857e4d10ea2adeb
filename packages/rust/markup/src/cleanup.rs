//! Cleanup pipeline for raw model output.
//!
//! Models wrap HTML in Markdown code fences or sprinkle backticks through it.
//! Each pass is a function `&str -> String` applied in sequence. Only these
//! known artifacts are removed; the HTML itself is not validated.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on generated HTML.
pub fn clean_generated_html(raw: &str) -> String {
    let mut result = raw.to_string();

    result = strip_fence_openers(&result);
    result = strip_fences(&result);
    result = strip_backticks(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Language-tagged fence openers
// ---------------------------------------------------------------------------

fn strip_fence_openers(s: &str) -> String {
    static OPENER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)```[ \t]*html[ \t]*\r?\n?").expect("valid regex"));

    OPENER_RE.replace_all(s, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Bare fences
// ---------------------------------------------------------------------------

fn strip_fences(s: &str) -> String {
    s.replace("```", "")
}

// ---------------------------------------------------------------------------
// Pass 3: Stray backticks
// ---------------------------------------------------------------------------

fn strip_backticks(s: &str) -> String {
    s.replace('`', "")
}
