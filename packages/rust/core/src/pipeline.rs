//! End-to-end generation pipeline: topic → outline → content → links → media.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use tracing::{info, instrument, warn};

use articlesmith_markup::{
    Figure, build_excerpt, inject_external_links, inject_internal_links, insert_figures,
};
use articlesmith_providers::{
    GeminiClient, ImageSearch, Researcher, TextGenerator, build_client,
    image_search_from_settings, researcher_from_settings,
};
use articlesmith_shared::{ArticlesmithError, GenerationJob, GenerationSettings, JobStage, Result};

use crate::assets::AssetStore;
use crate::catalog::{RECENT_WORKS_LIMIT, WorkCatalog};
use crate::composer::{ComposeRequest, compose_content};
use crate::keyword;
use crate::media::{DOWNLOAD_TIMEOUT_SECS, MediaSourcer};
use crate::outline::generate_outline;

/// External collaborators of a generation job.
#[derive(Clone)]
pub struct Capabilities {
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageSearch>,
    pub researcher: Option<Arc<dyn Researcher>>,
    pub assets: Arc<dyn AssetStore>,
    pub works: Arc<dyn WorkCatalog>,
    /// Client used for image downloads.
    pub http: Client,
}

impl Capabilities {
    /// Build the HTTP-backed capabilities described by `settings`.
    pub fn from_settings(
        settings: &GenerationSettings,
        works: Arc<dyn WorkCatalog>,
        assets: Arc<dyn AssetStore>,
    ) -> Result<Self> {
        Ok(Self {
            text: Arc::new(GeminiClient::from_settings(settings)?),
            images: image_search_from_settings(settings)?,
            researcher: researcher_from_settings(settings)?,
            assets,
            works,
            http: build_client(DOWNLOAD_TIMEOUT_SECS)?,
        })
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when the job enters a new stage.
    fn stage(&self, stage: JobStage);
    /// Called once the job reaches `success` or `failed`.
    fn done(&self, job: &GenerationJob);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: JobStage) {}
    fn done(&self, _job: &GenerationJob) {}
}

/// Run one generation job to completion.
///
/// Never returns an error: the outcome is carried by the job's status and
/// error list. Outline and content failures fail the job; link and media
/// problems are recorded and the job carries on.
///
/// 1. Derive keyword, title, slug
/// 2. Outline
/// 3. Content
/// 4. Internal and external links
/// 5. Featured and content images
/// 6. Excerpt
#[instrument(skip_all, fields(topic = %topic))]
pub async fn run_pipeline(
    topic: &str,
    caps: &Capabilities,
    settings: &GenerationSettings,
    progress: &dyn ProgressReporter,
) -> GenerationJob {
    let start = Instant::now();
    let mut job = GenerationJob::new(topic.trim());
    info!(job_id = %job.id, "starting generation pipeline");

    if let Err(e) = run_stages(&mut job, caps, settings, progress).await {
        warn!(job_id = %job.id, stage = %job.stage, error = %e, "generation failed");
        job.fail(&e);
    }

    info!(
        job_id = %job.id,
        status = ?job.status,
        errors = job.errors.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generation pipeline finished"
    );
    progress.done(&job);
    job
}

/// Returns only the errors that fail the job.
async fn run_stages(
    job: &mut GenerationJob,
    caps: &Capabilities,
    settings: &GenerationSettings,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let derived = keyword::derive_now(&job.topic)?;
    job.primary_keyword = derived.primary_keyword;
    job.title = derived.title;
    job.slug = derived.slug;
    job.keywords = derived.keywords;
    info!(title = %job.title, slug = %job.slug, "title derived");

    // --- Outline ---
    enter(job, JobStage::ComposingOutline, progress)?;
    let outline = generate_outline(caps.text.as_ref(), &job.title, &job.keywords).await?;
    job.outline = outline.into_iter().map(|item| item.heading).collect();

    // --- Content ---
    enter(job, JobStage::ComposingContent, progress)?;
    let request = ComposeRequest {
        primary_keyword: &job.primary_keyword,
        outline: &job.outline,
        custom_prompt: settings.custom_prompt.as_deref(),
    };
    let composition = compose_content(
        caps.text.as_ref(),
        caps.images.as_ref(),
        caps.researcher.as_deref(),
        &request,
    )
    .await?;
    for warning in &composition.warnings {
        job.record_error(warning);
    }
    job.content = composition.html;

    // --- Links ---
    enter(job, JobStage::InjectingLinks, progress)?;
    let works = match caps.works.recent_works(RECENT_WORKS_LIMIT).await {
        Ok(works) => works,
        Err(e) => {
            warn!(error = %e, "published works unavailable, skipping internal links");
            job.record_error(&e);
            Vec::new()
        }
    };
    let internal = inject_internal_links(&job.content, &works, settings.max_internal_links);
    let external = inject_external_links(&internal.content, settings.max_external_links);
    info!(
        internal = internal.inserted(),
        external = external.inserted(),
        bare = external.links.len() - external.inserted(),
        "links injected"
    );
    job.content = external.content;

    // --- Media ---
    enter(job, JobStage::SourcingMedia, progress)?;
    let sourcer = MediaSourcer {
        images: caps.images.as_ref(),
        assets: caps.assets.as_ref(),
        http: &caps.http,
    };

    match sourcer.featured_image(&job.primary_keyword, &job.title).await {
        Ok(asset) => job.featured_image = Some(asset),
        Err(e) => {
            warn!(error = %e, "featured image unavailable");
            job.record_error(&e);
        }
    }

    let cap = settings.max_content_images;
    job.content_images = sourcer.content_images(&job.outline, cap).await;
    if cap > 0 && job.content_images.is_empty() {
        job.record_error(&ArticlesmithError::provider(format!(
            "no content images could be sourced for {} headings",
            job.outline.len()
        )));
    }

    let figures: Vec<Figure> = job
        .content_images
        .iter()
        .map(|image| Figure {
            src: image.local_ref.clone(),
            alt: image.alt_text.clone(),
            caption: image.attribution.clone(),
        })
        .collect();
    job.content = insert_figures(&job.content, &figures);

    // --- Finish ---
    job.excerpt = build_excerpt(&job.content, &job.primary_keyword);
    enter(job, JobStage::Success, progress)?;
    Ok(())
}

fn enter(job: &mut GenerationJob, stage: JobStage, progress: &dyn ProgressReporter) -> Result<()> {
    job.advance(stage)?;
    progress.stage(stage);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::testing::{self, FixedSearch, MemoryAssets, ScriptedText};
    use articlesmith_shared::{JobStatus, PublishedWork};
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every stage it is told about.
    #[derive(Default)]
    struct RecordingProgress {
        stages: Mutex<Vec<JobStage>>,
        finished: Mutex<Option<JobStatus>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage(&self, stage: JobStage) {
            self.stages.lock().unwrap().push(stage);
        }
        fn done(&self, job: &GenerationJob) {
            *self.finished.lock().unwrap() = Some(job.status);
        }
    }

    #[tokio::test]
    async fn stages_advance_in_order() {
        let server = testing::image_server().await;
        let caps = testing::capabilities(
            ScriptedText::article(),
            FixedSearch::hits(&server.uri()),
            Vec::new(),
        );
        let progress = RecordingProgress::default();

        let job = run_pipeline(
            "electric cars",
            &caps,
            &GenerationSettings::default(),
            &progress,
        )
        .await;

        assert!(job.is_success(), "errors: {:?}", job.errors);
        assert_eq!(
            *progress.stages.lock().unwrap(),
            vec![
                JobStage::ComposingOutline,
                JobStage::ComposingContent,
                JobStage::InjectingLinks,
                JobStage::SourcingMedia,
                JobStage::Success,
            ]
        );
        assert_eq!(*progress.finished.lock().unwrap(), Some(JobStatus::Success));
    }

    #[tokio::test]
    async fn successful_job_without_research() {
        let server = testing::image_server().await;
        let caps = testing::capabilities(
            ScriptedText::article(),
            FixedSearch::hits(&server.uri()),
            Vec::new(),
        );

        let job = run_pipeline(
            "electric cars",
            &caps,
            &GenerationSettings::default(),
            &SilentProgress,
        )
        .await;

        assert!(job.is_success());
        assert!(job.errors.is_empty(), "errors: {:?}", job.errors);
        assert_eq!(job.keywords, vec!["electric cars".to_string()]);
        assert_eq!(job.outline.len(), 4);
        assert!(!job.content.is_empty());
        assert!(!job.content.contains("[LINK:"));
        assert!(job.content.contains("https://en.wikipedia.org/wiki/"));

        let featured = job.featured_image.as_ref().expect("featured image");
        assert!(featured.is_featured());
        assert_eq!(featured.alt_text, job.title);
        assert_eq!(job.content_images.len(), 2);
        assert_eq!(job.content.matches("<figure").count(), 2);
        assert!(!job.excerpt.is_empty());
        assert!(job.excerpt.to_lowercase().contains("electric cars"));
    }

    #[tokio::test]
    async fn empty_image_search_records_two_errors() {
        let caps = testing::capabilities(ScriptedText::article(), FixedSearch::empty(), Vec::new());

        let job = run_pipeline(
            "electric cars",
            &caps,
            &GenerationSettings::default(),
            &SilentProgress,
        )
        .await;

        assert!(job.is_success());
        assert!(job.featured_image.is_none());
        assert!(job.content_images.is_empty());
        assert_eq!(job.errors.len(), 2, "errors: {:?}", job.errors);
        assert!(!job.content.contains("<figure"));
    }

    #[tokio::test]
    async fn content_image_cap_is_respected() {
        let server = testing::image_server().await;
        let caps = testing::capabilities(
            ScriptedText::article(),
            FixedSearch::hits(&server.uri()),
            Vec::new(),
        );
        let settings = GenerationSettings {
            max_content_images: 1,
            ..GenerationSettings::default()
        };

        let job = run_pipeline("electric cars", &caps, &settings, &SilentProgress).await;
        assert_eq!(job.content_images.len(), 1);
        assert!(job.featured_image.is_some());

        let settings = GenerationSettings {
            max_content_images: 0,
            ..GenerationSettings::default()
        };
        let job = run_pipeline("electric cars", &caps, &settings, &SilentProgress).await;
        assert!(job.content_images.is_empty());
        assert!(job.errors.is_empty(), "errors: {:?}", job.errors);
    }

    #[tokio::test]
    async fn published_works_are_linked() {
        let server = testing::image_server().await;
        let works = vec![PublishedWork {
            id: "w1".into(),
            title: "Battery Recycling".into(),
            url: "/battery-recycling/".into(),
            published_at: Utc::now(),
        }];
        let caps = testing::capabilities(
            ScriptedText::article(),
            FixedSearch::hits(&server.uri()),
            works,
        );

        let job = run_pipeline(
            "electric cars",
            &caps,
            &GenerationSettings::default(),
            &SilentProgress,
        )
        .await;
        assert!(job.content.contains("<a href=\"/battery-recycling/\">Battery recycling</a>"));
    }

    #[tokio::test]
    async fn work_title_inside_placeholder_stays_external() {
        let server = testing::image_server().await;
        let works = vec![PublishedWork {
            id: "w2".into(),
            title: "Electric Vehicles".into(),
            url: "/electric-vehicles/".into(),
            published_at: Utc::now(),
        }];
        let caps = testing::capabilities(
            ScriptedText::article(),
            FixedSearch::hits(&server.uri()),
            works,
        );

        let job = run_pipeline(
            "electric cars",
            &caps,
            &GenerationSettings::default(),
            &SilentProgress,
        )
        .await;

        assert!(job.is_success(), "errors: {:?}", job.errors);
        assert!(!job.content.contains("&lt;a"));
        assert!(job.content.contains(">history of electric vehicles</a>"));
        // The full title only occurs in the placeholder, so the keyword
        // fallback links the first plain mention instead.
        assert!(
            job.content
                .contains("<a href=\"/electric-vehicles/\">Electric</a> cars are reshaping")
        );
        assert!(!job.content.contains("[LINK:"));
    }

    #[tokio::test]
    async fn content_failure_fails_the_job() {
        let caps = testing::capabilities(
            ScriptedText::failing_content(),
            FixedSearch::empty(),
            Vec::new(),
        );

        let job = run_pipeline(
            "electric cars",
            &caps,
            &GenerationSettings::default(),
            &SilentProgress,
        )
        .await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stage, JobStage::Failed);
        assert!(job.content.is_empty());
        assert_eq!(job.outline.len(), 4);
        assert_eq!(job.errors.len(), 1);
        assert!(job.errors[0].starts_with("transport error"));
    }

    #[tokio::test]
    async fn blank_topic_fails_before_any_call() {
        let caps = testing::capabilities(ScriptedText::article(), FixedSearch::empty(), Vec::new());
        let job = run_pipeline("   ", &caps, &GenerationSettings::default(), &SilentProgress).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.errors[0].starts_with("validation error"));
    }

    /// Full HTTP path: Gemini and Pexels served by one mock server.
    #[tokio::test]
    async fn end_to_end_against_mock_services() {
        let server = MockServer::start().await;
        let reply = |text: &str| {
            ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": text}]}}]
            }))
        };

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(body_string_contains("Create a detailed blog post outline"))
            .respond_with(reply("1. Introduction\n2. Charging Networks\n3. Conclusion"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(body_string_contains("FORMATTING REQUIREMENTS"))
            .respond_with(reply(
                "```html\n<p>Electric cars are changing transport.</p>\
                 <h2>Charging Networks</h2><p>See [LINK: history of charging].</p>\
                 <h2>Conclusion</h2><p>Done.</p>\n```",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "photos": [{
                    "src": {"large": format!("{}/photo.jpg", server.uri())},
                    "alt": "A charging car",
                    "photographer": "Ann"
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/photo.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(b"jpeg".to_vec()),
            )
            .mount(&server)
            .await;

        let settings = GenerationSettings {
            text_api_key: Some("gk".into()),
            text_base_url: server.uri(),
            pexels_api_key: Some("pk".into()),
            pexels_base_url: server.uri(),
            ..GenerationSettings::default()
        };
        let assets = Arc::new(MemoryAssets::default());
        let caps = Capabilities::from_settings(
            &settings,
            Arc::new(Vec::<PublishedWork>::new()),
            assets.clone(),
        )
        .unwrap();

        let job = run_pipeline("electric cars", &caps, &settings, &SilentProgress).await;

        assert!(job.is_success(), "errors: {:?}", job.errors);
        assert!(job.errors.is_empty(), "errors: {:?}", job.errors);
        assert_eq!(job.outline, vec!["Introduction", "Charging Networks", "Conclusion"]);
        assert!(job.content.starts_with("<p>Electric cars are changing transport.</p>"));
        assert!(!job.content.contains("```"));
        assert!(job.content.contains("target=\"_blank\""));
        assert_eq!(job.featured_image.as_ref().unwrap().attribution, "Photo by Ann from Pexels");
        assert_eq!(job.content_images.len(), 2);
        assert_eq!(assets.count(), 3);
        // Headings are part of the visible text the excerpt is cut from.
        assert_eq!(
            job.excerpt,
            "Electric cars are changing transport. Charging Networks See history of charging. Conclusion Done."
        );
    }
}
