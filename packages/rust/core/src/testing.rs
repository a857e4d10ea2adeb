//! In-memory capabilities shared by the pipeline and service tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use articlesmith_providers::{ImageHit, ImageProvider, ImageSearch, TextGenerator};
use articlesmith_shared::{ArticlesmithError, PublishedWork, Result};

use crate::assets::AssetStore;
use crate::pipeline::Capabilities;

pub(crate) const OUTLINE_REPLY: &str =
    "1. Introduction\n2. Battery Basics\n3. Charging at Home\n4. Conclusion";

pub(crate) const ARTICLE_REPLY: &str = "```html\n\
<p>Electric cars are reshaping how people commute.</p>\n\
<h2>Battery Basics</h2>\n\
<p>Battery recycling keeps costs down. Read the [LINK: history of electric vehicles].</p>\n\
<h2>Charging at Home</h2>\n\
<p>Most owners charge overnight.</p>\n\
<h2>Conclusion</h2>\n\
<p>The switch is underway.</p>\n```";

/// Answers outline prompts and content prompts with canned replies.
pub(crate) struct ScriptedText {
    content: Option<&'static str>,
}

impl ScriptedText {
    pub(crate) fn article() -> Self {
        Self {
            content: Some(ARTICLE_REPLY),
        }
    }

    /// Outline succeeds, content generation fails.
    pub(crate) fn failing_content() -> Self {
        Self { content: None }
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_text(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String> {
        if prompt.contains("Create a detailed blog post outline") {
            return Ok(OUTLINE_REPLY.to_string());
        }
        self.content
            .map(str::to_string)
            .ok_or_else(|| ArticlesmithError::transport("gemini: HTTP 503 Service Unavailable"))
    }
}

/// Returns one hit per query, or nothing.
pub(crate) struct FixedSearch {
    base: Option<String>,
}

impl FixedSearch {
    pub(crate) fn hits(base: &str) -> Self {
        Self {
            base: Some(base.to_string()),
        }
    }

    pub(crate) fn empty() -> Self {
        Self { base: None }
    }
}

#[async_trait]
impl ImageSearch for FixedSearch {
    async fn search_images(&self, query: &str, count: usize) -> Result<Vec<ImageHit>> {
        let Some(base) = &self.base else {
            return Ok(Vec::new());
        };
        Ok((0..count)
            .map(|i| ImageHit {
                provider: ImageProvider::Pexels,
                remote_url: format!("{base}/img/{}-{i}.jpg", query.replace(' ', "-")),
                description: query.to_string(),
                photographer: "Ann".into(),
            })
            .collect())
    }
}

/// Keeps stored bytes in memory and hands out sequential handles.
#[derive(Default)]
pub(crate) struct MemoryAssets {
    stored: Mutex<Vec<Vec<u8>>>,
}

impl MemoryAssets {
    pub(crate) fn count(&self) -> usize {
        self.stored.lock().unwrap().len()
    }
}

#[async_trait]
impl AssetStore for MemoryAssets {
    async fn store(&self, bytes: &[u8], _content_type: Option<&str>) -> Result<String> {
        let mut stored = self.stored.lock().unwrap();
        stored.push(bytes.to_vec());
        Ok(format!("assets/{}.jpg", stored.len()))
    }
}

/// Serves image bytes for any GET.
pub(crate) async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(b"jpeg-bytes".to_vec()),
        )
        .mount(&server)
        .await;
    server
}

pub(crate) fn capabilities(
    text: ScriptedText,
    images: FixedSearch,
    works: Vec<PublishedWork>,
) -> Capabilities {
    Capabilities {
        text: Arc::new(text),
        images: Arc::new(images),
        researcher: None,
        assets: Arc::new(MemoryAssets::default()),
        works: Arc::new(works),
        http: Client::new(),
    }
}
