//! Outline generation: one model call, parsed into headings, with a
//! templated fallback.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use articlesmith_providers::TextGenerator;
use articlesmith_shared::{ArticlesmithError, OutlineItem, Result};

const OUTLINE_MAX_TOKENS: u32 = 1000;
const OUTLINE_TEMPERATURE: f32 = 0.6;

static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#{1,6}\s*)?(?:\d+\s*[.):]|[-*•+])\s*").expect("valid regex")
});

/// Strip a leading ordinal or bullet (`1.`, `2)`, `-`, `## 3.`) from a line.
pub(crate) fn strip_list_marker(line: &str) -> &str {
    match LIST_MARKER_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line.trim_start(),
    }
}

fn outline_prompt(topic: &str) -> String {
    format!(
        "Create a detailed blog post outline for the topic: '{topic}'

The outline should include:
- An engaging introduction about {topic}
- 4-6 main section headings that would work as H2 tags, all directly related to {topic}
- A strong conclusion about {topic}

IMPORTANT: Every section must be directly related to '{topic}'. Stay focused on this exact topic.

Format as a simple numbered list:
1. Introduction
2. [Main section 1 about {topic}]
3. [Main section 2 about {topic}]
4. [Main section 3 about {topic}]
5. [Main section 4 about {topic}]
6. Conclusion

Write only the outline headings about '{topic}', no explanations or additional text."
    )
}

/// Parse a numbered outline reply into headings.
///
/// Fails with a parse error when nothing usable remains, or when the reply is
/// a single unnumbered sentence (a refusal or prose instead of a list).
pub fn parse_outline(raw: &str) -> Result<Vec<String>> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let [only] = lines.as_slice() {
        let unnumbered = !LIST_MARKER_RE.is_match(only);
        if unnumbered && only.ends_with(['.', '!', '?']) {
            return Err(ArticlesmithError::parse(format!(
                "outline reply is a single sentence: {only:?}"
            )));
        }
    }

    let headings: Vec<String> = lines
        .into_iter()
        .map(|line| {
            strip_list_marker(line)
                .trim_matches(|c: char| c == '[' || c == ']' || c == '*')
                .trim()
                .to_string()
        })
        .filter(|h| !h.is_empty())
        .collect();

    if headings.is_empty() {
        return Err(ArticlesmithError::parse("outline reply contained no headings"));
    }
    Ok(headings)
}

/// Six templated headings about `topic`.
pub fn fallback_outline(topic: &str) -> Vec<String> {
    let topic = topic.replace('-', " ");
    vec![
        format!("Introduction to {topic}"),
        format!("Understanding the Basics of {topic}"),
        format!("Key Benefits and Applications of {topic}"),
        format!("Best Practices and Implementation of {topic}"),
        format!("Common Challenges and Solutions in {topic}"),
        format!("Future Outlook and Conclusion for {topic}"),
    ]
}

/// Generate the outline for an article.
///
/// The first keyword is the topic the outline is about. Call failures are
/// returned; an unparseable reply is replaced by [`fallback_outline`], so the
/// result is never empty.
#[instrument(skip_all, fields(title = %title))]
pub async fn generate_outline(
    text: &dyn TextGenerator,
    title: &str,
    keywords: &[String],
) -> Result<Vec<OutlineItem>> {
    let topic = keywords.first().map_or(title, String::as_str);

    let raw = text
        .generate_text(&outline_prompt(topic), OUTLINE_MAX_TOKENS, OUTLINE_TEMPERATURE)
        .await?;
    debug!(reply = %raw, "outline reply");

    let headings = match parse_outline(&raw) {
        Ok(headings) => headings,
        Err(e) => {
            warn!(error = %e, "outline unusable, using fallback");
            fallback_outline(topic)
        }
    };

    info!(sections = headings.len(), "outline ready");
    Ok(OutlineItem::numbered(headings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate_text(&self, prompt: &str, max_tokens: u32, _t: f32) -> Result<String> {
            assert!(prompt.contains("'electric cars'"));
            assert_eq!(max_tokens, OUTLINE_MAX_TOKENS);
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate_text(&self, _p: &str, _m: u32, _t: f32) -> Result<String> {
            Err(ArticlesmithError::transport("connection reset"))
        }
    }

    fn keywords() -> Vec<String> {
        vec!["electric cars".to_string()]
    }

    #[test]
    fn parses_numbered_lines() {
        let raw = "1. Introduction\n2) [Battery Technology]\n\n3. **Charging at Home**\n## 4. Conclusion";
        assert_eq!(
            parse_outline(raw).unwrap(),
            vec!["Introduction", "Battery Technology", "Charging at Home", "Conclusion"]
        );
    }

    #[test]
    fn unnumbered_lines_are_kept() {
        let raw = "Introduction\nWhy range matters\nConclusion";
        assert_eq!(parse_outline(raw).unwrap().len(), 3);
    }

    #[test]
    fn single_sentence_is_a_parse_error() {
        let err = parse_outline("I'm sorry, I can't help with that.").unwrap_err();
        assert_eq!(err.kind(), "parse");
        // A lone numbered heading is fine.
        assert_eq!(parse_outline("1. Introduction.").unwrap(), vec!["Introduction."]);
    }

    #[test]
    fn blank_reply_is_a_parse_error() {
        assert!(parse_outline(" \n [] \n").is_err());
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back_to_template() {
        let items = generate_outline(
            &Canned("Electric cars are a broad topic."),
            "Understanding Electric Cars",
            &keywords(),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 6);
        assert!(items.iter().all(|i| i.heading.contains("electric cars")));
        assert_eq!(items[0].position, 1);
        assert_eq!(items[0].heading, "Introduction to electric cars");
    }

    #[tokio::test]
    async fn parsed_reply_is_numbered() {
        let items = generate_outline(
            &Canned("1. Introduction\n2. Range\n3. Conclusion"),
            "Understanding Electric Cars",
            &keywords(),
        )
        .await
        .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].position, 3);
        assert_eq!(items[2].heading, "Conclusion");
    }

    #[tokio::test]
    async fn call_failure_is_returned() {
        let err = generate_outline(&Failing, "T", &keywords()).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[test]
    fn fallback_replaces_hyphens() {
        let outline = fallback_outline("solar-panels");
        assert_eq!(outline.len(), 6);
        assert_eq!(outline[5], "Future Outlook and Conclusion for solar panels");
    }
}
