//! Content composition: research context, image hints, prompt assembly and
//! the body-generation call.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, info, instrument, warn};

use articlesmith_markup::clean_generated_html;
use articlesmith_providers::{ImageHit, ImageSearch, Researcher, TextGenerator};
use articlesmith_shared::{ArticlesmithError, Result};

const CONTENT_MAX_TOKENS: u32 = 3000;
const CONTENT_TEMPERATURE: f32 = 0.7;
const EXPLORATORY_IMAGE_COUNT: usize = 3;

/// Built-in body template. Placeholders are written `{name}` or `{$name}`.
pub const DEFAULT_PROMPT: &str = "You are an experienced web writer and SEO editor. \
Write a complete, original blog post about \"{primary_keyword}\".

Follow this outline, one <h2> section per item, in order:
{outline}
Guidelines:
- Open with a short introduction that states what the reader will learn.
- Use <h2> for the outline sections and <h3> for sub-points where they help.
- Keep paragraphs short and concrete. Prefer facts, figures and examples over filler.
- Use <ul>/<li> lists for steps, comparisons and key takeaways.
- Where an authoritative outside reference would help the reader, write a placeholder of the \
form [LINK: short description] instead of a URL. Use at most three placeholders.
- Do not include an <h1>; the title is rendered separately.
- Finish with a conclusion section that summarizes the main points.
{research_context}
### Available Images
{formatted_images}";

/// Output constraints appended after every template, custom or built-in.
pub const FORMATTING_REQUIREMENTS: &str = "

FORMATTING REQUIREMENTS - VERY IMPORTANT:
- Use ONLY clean HTML tags: <h2>, <h3>, <p>, <ul>, <li>, <strong>, <em>, <a>, <img>
- DO NOT use markdown syntax like ```html or ```
- DO NOT use code blocks or backticks
- DO NOT wrap the content in any formatting
- End with the last </p> tag
- Return only raw HTML content
- **CRITICAL:** Never use <code> tags in your response - use <strong> for emphasis instead


Return ONLY the clean HTML content. Start immediately with HTML tags, no markdown formatting. \
And make sure it looks like a complete modern blog post.";

/// Inputs for one body generation.
#[derive(Debug, Clone)]
pub struct ComposeRequest<'a> {
    pub primary_keyword: &'a str,
    pub outline: &'a [String],
    /// Replaces [`DEFAULT_PROMPT`] when non-blank.
    pub custom_prompt: Option<&'a str>,
}

/// Generated body plus problems that did not stop generation.
#[derive(Debug)]
pub struct Composition {
    pub html: String,
    pub warnings: Vec<ArticlesmithError>,
}

/// Substitute `{name}` and `{$name}` placeholders in one pass over the
/// template. Substituted values are never rescanned; unknown names are kept.
pub fn render_prompt(template: &str, vars: &[(&str, &str)]) -> String {
    static PLACEHOLDER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{\$?(\w+)\}").expect("valid regex"));

    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            vars.iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

/// Describe image hits for the prompt.
pub fn format_image_list(hits: &[ImageHit]) -> String {
    if hits.is_empty() {
        return "No images available".to_string();
    }

    let mut out = String::from("Available images:\n");
    for (i, hit) in hits.iter().enumerate() {
        let description = non_blank(&hit.description, "Image");
        let photographer = non_blank(&hit.photographer, "Unknown");
        out.push_str(&format!(
            "{}. URL: {}\n   Description: {description}\n   Photographer: {photographer}\n\n",
            i + 1,
            hit.remote_url
        ));
    }
    out
}

/// Render headings as `N. heading` lines.
pub fn outline_block(outline: &[String]) -> String {
    outline
        .iter()
        .enumerate()
        .map(|(i, heading)| format!("{}. {heading}\n", i + 1))
        .collect()
}

fn non_blank<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

fn research_query(keyword: &str) -> String {
    format!(
        "Research comprehensive information about '{keyword}'. Include current trends, \
         statistics, best practices, expert opinions, and recent developments. Focus on \
         factual, up-to-date information that would be valuable for a blog post."
    )
}

/// Compose the article body.
///
/// A failed research call becomes a warning and an empty research context;
/// a failed image search is logged and described as "No images available".
/// Generation failures and an empty cleaned reply are returned as errors.
#[instrument(skip_all, fields(keyword = %request.primary_keyword))]
pub async fn compose_content(
    text: &dyn TextGenerator,
    images: &dyn ImageSearch,
    researcher: Option<&dyn Researcher>,
    request: &ComposeRequest<'_>,
) -> Result<Composition> {
    let keyword = request.primary_keyword;
    let mut warnings = Vec::new();

    let research_context = match researcher {
        Some(researcher) => match researcher.research(&research_query(keyword)).await {
            Ok(data) => {
                info!(chars = data.len(), "research context gathered");
                format!("\n\nBased on current research:\n{data}\n\n")
            }
            Err(e) => {
                warn!(error = %e, "research failed, continuing without context");
                warnings.push(e);
                String::new()
            }
        },
        None => {
            debug!("research not configured");
            String::new()
        }
    };

    let hits = match images.search_images(keyword, EXPLORATORY_IMAGE_COUNT).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "exploratory image search failed");
            Vec::new()
        }
    };
    let formatted_images = format_image_list(&hits);
    let outline = outline_block(request.outline);

    let template = request
        .custom_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_PROMPT);
    let mut prompt = render_prompt(
        template,
        &[
            ("primary_keyword", keyword),
            ("research_context", &research_context),
            ("formatted_images", &formatted_images),
            ("outline", &outline),
        ],
    );
    prompt.push_str(FORMATTING_REQUIREMENTS);
    debug!(prompt_chars = prompt.len(), "content prompt assembled");

    let raw = text
        .generate_text(&prompt, CONTENT_MAX_TOKENS, CONTENT_TEMPERATURE)
        .await?;
    let html = clean_generated_html(&raw);
    if html.is_empty() {
        return Err(ArticlesmithError::provider(
            "content generation returned nothing after cleanup",
        ));
    }

    info!(chars = html.len(), "content composed");
    Ok(Composition { html, warnings })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use articlesmith_providers::ImageProvider;
    use async_trait::async_trait;

    /// Records the last prompt and replies with a fixed body.
    struct Recorder {
        reply: &'static str,
        prompt: Mutex<String>,
    }

    impl Recorder {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                prompt: Mutex::new(String::new()),
            }
        }

        fn prompt(&self) -> String {
            self.prompt.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        async fn generate_text(
            &self,
            prompt: &str,
            max_tokens: u32,
            temperature: f32,
        ) -> Result<String> {
            assert_eq!(max_tokens, CONTENT_MAX_TOKENS);
            assert!((temperature - CONTENT_TEMPERATURE).abs() < f32::EPSILON);
            *self.prompt.lock().unwrap() = prompt.to_string();
            Ok(self.reply.to_string())
        }
    }

    struct Hits(Vec<ImageHit>);

    #[async_trait]
    impl ImageSearch for Hits {
        async fn search_images(&self, _query: &str, count: usize) -> Result<Vec<ImageHit>> {
            Ok(self.0.iter().take(count).cloned().collect())
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl ImageSearch for BrokenSearch {
        async fn search_images(&self, _query: &str, _count: usize) -> Result<Vec<ImageHit>> {
            Err(ArticlesmithError::transport("pexels: HTTP 503"))
        }
    }

    struct Research(Result<String>);

    #[async_trait]
    impl Researcher for Research {
        async fn research(&self, query: &str) -> Result<String> {
            assert!(query.contains("'Electric Cars'"));
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(ArticlesmithError::transport(e.to_string())),
            }
        }
    }

    fn hit(n: usize) -> ImageHit {
        ImageHit {
            provider: ImageProvider::Pexels,
            remote_url: format!("https://images.example/{n}.jpg"),
            description: if n == 1 { "A car charging".into() } else { String::new() },
            photographer: if n == 1 { "Ann".into() } else { String::new() },
        }
    }

    fn outline() -> Vec<String> {
        vec!["Introduction".into(), "Charging".into()]
    }

    fn request<'a>(outline: &'a [String], custom: Option<&'a str>) -> ComposeRequest<'a> {
        ComposeRequest {
            primary_keyword: "Electric Cars",
            outline,
            custom_prompt: custom,
        }
    }

    #[test]
    fn renders_both_placeholder_forms() {
        let out = render_prompt("{a} and {$a} but not {b}", &[("a", "x")]);
        assert_eq!(out, "x and x but not {b}");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let out = render_prompt(
            "{research_context}|{outline}",
            &[("research_context", "use {outline} syntax"), ("outline", "1. Intro")],
        );
        assert_eq!(out, "use {outline} syntax|1. Intro");
    }

    #[test]
    fn image_list_format() {
        assert_eq!(format_image_list(&[]), "No images available");
        let list = format_image_list(&[hit(1), hit(2)]);
        assert!(list.starts_with("Available images:\n1. URL: https://images.example/1.jpg\n"));
        assert!(list.contains("   Description: A car charging\n   Photographer: Ann\n\n"));
        assert!(list.contains(
            "2. URL: https://images.example/2.jpg\n   Description: Image\n   Photographer: Unknown\n\n"
        ));
    }

    #[test]
    fn outline_block_is_numbered() {
        assert_eq!(outline_block(&outline()), "1. Introduction\n2. Charging\n");
    }

    #[tokio::test]
    async fn default_prompt_without_research() {
        let text = Recorder::new("```html\n<h2>Intro</h2><p>Body</p>\n```");
        let outline = outline();
        let out = compose_content(&text, &Hits(vec![hit(1)]), None, &request(&outline, None))
            .await
            .unwrap();

        assert_eq!(out.html, "<h2>Intro</h2><p>Body</p>");
        assert!(out.warnings.is_empty());

        let prompt = text.prompt();
        assert!(prompt.contains("\"Electric Cars\""));
        assert!(prompt.contains("1. Introduction\n2. Charging\n"));
        assert!(!prompt.contains("Based on current research"));
        assert!(prompt.contains("1. URL: https://images.example/1.jpg"));
        assert!(prompt.ends_with(FORMATTING_REQUIREMENTS));
        assert!(!prompt.contains("{primary_keyword}"));
    }

    #[tokio::test]
    async fn custom_prompt_gets_research_and_formatting_block() {
        let text = Recorder::new("<p>Body</p>");
        let outline = outline();
        let research = Research(Ok("Sales doubled.".into()));
        let custom = "Write about {$primary_keyword}.{research_context}Images: {formatted_images}";

        compose_content(&text, &BrokenSearch, Some(&research), &request(&outline, Some(custom)))
            .await
            .unwrap();

        let prompt = text.prompt();
        assert!(prompt.starts_with(
            "Write about Electric Cars.\n\nBased on current research:\nSales doubled.\n\nImages: No images available"
        ));
        assert!(prompt.ends_with(FORMATTING_REQUIREMENTS));
    }

    #[tokio::test]
    async fn blank_custom_prompt_uses_default() {
        let text = Recorder::new("<p>Body</p>");
        let outline = outline();
        compose_content(&text, &Hits(vec![]), None, &request(&outline, Some("   ")))
            .await
            .unwrap();
        assert!(text.prompt().contains("Follow this outline"));
    }

    #[tokio::test]
    async fn research_failure_is_a_warning() {
        let text = Recorder::new("<p>Body</p>");
        let outline = outline();
        let research = Research(Err(ArticlesmithError::transport("timeout")));

        let out = compose_content(&text, &Hits(vec![]), Some(&research), &request(&outline, None))
            .await
            .unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind(), "transport");
        assert!(!text.prompt().contains("Based on current research"));
    }

    #[tokio::test]
    async fn empty_reply_is_a_provider_error() {
        let text = Recorder::new("```html\n```");
        let outline = outline();
        let err = compose_content(&text, &Hits(vec![]), None, &request(&outline, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "provider");
    }
}
