//! The recipe generation orchestrator.
//!
//! `generate` is the synchronous entry point: it settles the job row
//! (dedup / retry / race-safe create) and returns immediately; the
//! fetch → extract → persist pipeline runs as a detached task. The task
//! owns its error boundary — any failure becomes `status = failed` on the
//! job, observable by polling, and never reaches the original caller.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use chefclip_core::PromptConfig;
use chefclip_db::{
    activate_pending_recipe, complete_recipe, delete_recipe, fail_recipe, get_recipe_by_id,
    get_recipe_by_video_id, insert_processing_recipe, retry_failed_recipe, touch_recipe_request,
    CompletedRecipeFields, DbError, RecipeRow, RecipeStatus,
};
use chefclip_gemini::{
    format_transcript_lines, ExtractedRecipe, ExtractionRequest, GeminiClient, GeminiError,
};
use chefclip_youtube::{extract_video_id, TranscriptSegment};

use crate::videos::{decode_transcript_segments, VideoDataError, VideoDataService};

/// Errors surfaced by the synchronous orchestrator calls.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("recipe not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Errors inside the detached pipeline. Never propagated to callers — the
/// display string becomes the job's `error_message`.
#[derive(Debug, Error)]
enum PipelineError {
    #[error("transcript not available for this video")]
    MissingTranscript,
    #[error(transparent)]
    VideoData(#[from] VideoDataError),
    #[error("recipe extraction failed: {0}")]
    Extraction(#[from] GeminiError),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Clone)]
pub struct RecipeGenerator {
    pool: PgPool,
    videos: Arc<VideoDataService>,
    gemini: Arc<GeminiClient>,
    prompt: Arc<PromptConfig>,
}

impl RecipeGenerator {
    pub fn new(
        pool: PgPool,
        videos: Arc<VideoDataService>,
        gemini: Arc<GeminiClient>,
        prompt: Arc<PromptConfig>,
    ) -> Self {
        Self {
            pool,
            videos,
            gemini,
            prompt,
        }
    }

    /// Settles the job for a video and returns its current state without
    /// waiting for extraction.
    ///
    /// - `processing` / `completed` jobs are returned unchanged: at most one
    ///   pipeline per video, and completed is terminal.
    /// - `failed` jobs re-enter `processing` with the error cleared and a
    ///   fresh pipeline run.
    /// - Unknown videos get a new `processing` job; the unique constraint on
    ///   the video id arbitrates concurrent creation, and the loser adopts
    ///   the winner's row without starting a second pipeline.
    ///
    /// When `user_id` is present the request is recorded in the history
    /// tracker (touch semantics).
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Db`] on persistence failures in the
    /// synchronous portion.
    pub async fn generate(
        &self,
        video_ref: &str,
        user_id: Option<i64>,
    ) -> Result<RecipeRow, GeneratorError> {
        let video_id = extract_video_id(video_ref);

        let job = match get_recipe_by_video_id(&self.pool, &video_id).await? {
            Some(existing) => match existing.status() {
                RecipeStatus::Processing | RecipeStatus::Completed => existing,
                RecipeStatus::Failed => match retry_failed_recipe(&self.pool, existing.id).await {
                    Ok(row) => {
                        self.spawn_pipeline(row.id, video_ref.to_owned());
                        row
                    }
                    Err(DbError::InvalidRecipeTransition { .. }) => {
                        // A concurrent retry won the guarded update; adopt its state.
                        self.reread(&video_id).await?
                    }
                    Err(err) => return Err(err.into()),
                },
                RecipeStatus::Pending => match activate_pending_recipe(&self.pool, existing.id)
                    .await
                {
                    Ok(row) => {
                        self.spawn_pipeline(row.id, video_ref.to_owned());
                        row
                    }
                    Err(DbError::InvalidRecipeTransition { .. }) => self.reread(&video_id).await?,
                    Err(err) => return Err(err.into()),
                },
            },
            None => match insert_processing_recipe(&self.pool, &video_id).await? {
                Some(row) => {
                    self.spawn_pipeline(row.id, video_ref.to_owned());
                    row
                }
                // Lost the first-insert race: use the winner's row as-is.
                None => self.reread(&video_id).await?,
            },
        };

        if let Some(user_id) = user_id {
            // History is bookkeeping; a bad user id must not fail generation.
            if let Err(err) = touch_recipe_request(&self.pool, user_id, job.id).await {
                tracing::warn!(user_id, recipe_id = %job.id, error = %err, "failed to record request history");
            }
        }

        Ok(job)
    }

    /// Pure lookup by video reference. Never triggers generation.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::NotFound`] if no job exists for the video.
    pub async fn get_recipe(&self, video_ref: &str) -> Result<RecipeRow, GeneratorError> {
        let video_id = extract_video_id(video_ref);
        get_recipe_by_video_id(&self.pool, &video_id)
            .await?
            .ok_or(GeneratorError::NotFound(video_id))
    }

    /// Pure lookup by job id. Never triggers generation.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::NotFound`] if no job exists with the id.
    pub async fn get_recipe_by_id(&self, id: Uuid) -> Result<RecipeRow, GeneratorError> {
        get_recipe_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| GeneratorError::NotFound(id.to_string()))
    }

    /// Unconditional delete. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Db`] if the delete fails.
    pub async fn delete_recipe(&self, id: Uuid) -> Result<bool, GeneratorError> {
        Ok(delete_recipe(&self.pool, id).await?)
    }

    async fn reread(&self, video_id: &str) -> Result<RecipeRow, GeneratorError> {
        get_recipe_by_video_id(&self.pool, video_id)
            .await?
            .ok_or_else(|| GeneratorError::NotFound(video_id.to_owned()))
    }

    /// Launches the pipeline as a detached task. The task outlives the
    /// originating request; its only coupling back is the job row.
    fn spawn_pipeline(&self, recipe_id: Uuid, video_ref: String) {
        let this = self.clone();
        tokio::spawn(async move {
            match this.run_pipeline(recipe_id, &video_ref).await {
                Ok(()) => {
                    tracing::info!(recipe_id = %recipe_id, "recipe generation completed");
                }
                Err(err) => {
                    tracing::error!(recipe_id = %recipe_id, error = %err, "recipe generation failed");
                    if let Err(db_err) =
                        fail_recipe(&this.pool, recipe_id, &err.to_string()).await
                    {
                        tracing::error!(
                            recipe_id = %recipe_id,
                            error = %db_err,
                            "failed to record pipeline failure"
                        );
                    }
                }
            }
        });
    }

    async fn run_pipeline(&self, recipe_id: Uuid, video_ref: &str) -> Result<(), PipelineError> {
        let record = self
            .videos
            .get_comprehensive_video_data(video_ref, None, None)
            .await?;

        let has_transcript = record
            .transcript_full_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_transcript {
            return Err(PipelineError::MissingTranscript);
        }

        let segments = decode_transcript_segments(&record);
        let transcript = format_transcript_prompt(&segments);

        let request = ExtractionRequest {
            transcript: &transcript,
            system_instruction: &self.prompt.system_instruction,
            response_schema: &self.prompt.response_schema,
            generation_config: &self.prompt.generation_config,
        };
        let extracted = self.gemini.generate_recipe(&request).await?;

        complete_recipe(&self.pool, recipe_id, &completed_fields(&extracted)).await?;
        Ok(())
    }
}

/// Renders stored transcript segments as the extraction engine's prompt.
fn format_transcript_prompt(segments: &[TranscriptSegment]) -> String {
    format_transcript_lines(segments.iter().map(|segment| {
        #[allow(clippy::cast_precision_loss)]
        let seconds = segment.start_ms as f64 / 1000.0;
        (seconds, segment.text.as_str())
    }))
}

/// Maps the extraction payload onto the single completing update.
fn completed_fields(extracted: &ExtractedRecipe) -> CompletedRecipeFields {
    CompletedRecipeFields {
        title: extracted.basic_info.title.clone(),
        description: extracted.basic_info.description.clone(),
        steps: serde_json::to_value(&extracted.steps).unwrap_or_else(|_| serde_json::json!([])),
        ingredients: serde_json::to_value(&extracted.ingredients)
            .unwrap_or_else(|_| serde_json::json!([])),
        nutrition: extracted
            .nutrition
            .as_ref()
            .and_then(|n| serde_json::to_value(n).ok()),
        categories: serde_json::to_value(&extracted.metadata.categories)
            .unwrap_or_else(|_| serde_json::json!([])),
        tags: serde_json::to_value(&extracted.metadata.tags)
            .unwrap_or_else(|_| serde_json::json!([])),
        difficulty: extracted.basic_info.difficulty.clone(),
        estimated_time_minutes: extracted.basic_info.estimated_time,
        servings: extracted.basic_info.servings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use chefclip_youtube::YoutubeClient;

    fn prompt_config() -> Arc<PromptConfig> {
        Arc::new(PromptConfig {
            system_instruction: "Extract a structured recipe.".to_owned(),
            response_schema: serde_json::json!({ "type": "object" }),
            generation_config: serde_json::json!({ "temperature": 0.2 }),
        })
    }

    fn generator(
        pool: sqlx::PgPool,
        youtube_uri: &str,
        gemini_uri: &str,
    ) -> Arc<RecipeGenerator> {
        let youtube = YoutubeClient::with_base_url(30, "chefclip-test", youtube_uri)
            .expect("youtube client")
            .with_retry_policy(0, 0);
        let videos = Arc::new(VideoDataService::new(
            pool.clone(),
            Arc::new(youtube),
            100,
            "ko".to_owned(),
        ));
        let gemini = GeminiClient::with_base_url("test-key", "gemini-2.5-flash", 30, gemini_uri)
            .expect("gemini client");
        Arc::new(RecipeGenerator::new(
            pool,
            videos,
            Arc::new(gemini),
            prompt_config(),
        ))
    }

    async fn mount_video_source(server: &MockServer) {
        let player = serde_json::json!({
            "videoDetails": {
                "videoId": "abc123",
                "title": "Kimchi Stew",
                "lengthSeconds": "600",
                "viewCount": "5000",
                "author": "Chef Min",
                "channelId": "UC1"
            },
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": [{
                        "baseUrl": format!("{}/api/timedtext?v=abc123&lang=ko", server.uri()),
                        "languageCode": "ko"
                    }]
                }
            }
        });
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(player))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/browse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": { "channelMetadataRenderer": { "externalId": "UC1", "title": "Chef Min" } }
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "frameworkUpdates": { "entityBatchUpdate": { "mutations": [{
                    "payload": { "commentEntityPayload": {
                        "properties": { "commentId": "c1", "content": { "content": "nice" } }
                    }}
                }]}}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [
                    { "tStartMs": 0, "dDurationMs": 5000, "segs": [{ "utf8": "Hello" }] },
                    { "tStartMs": 5000, "dDurationMs": 5000, "segs": [{ "utf8": "world" }] }
                ]
            })))
            .mount(server)
            .await;
    }

    fn extraction_payload() -> serde_json::Value {
        serde_json::json!({
            "basic_info": {
                "title": "T",
                "description": "D",
                "difficulty": "easy",
                "estimated_time": 10,
                "servings": 2
            },
            "metadata": { "categories": ["korean"], "tags": ["soup"] },
            "ingredients": [{ "name": "salt" }],
            "steps": [{
                "step_number": 1,
                "summary": "boil",
                "start_time_seconds": 0,
                "end_time_seconds": 5
            }],
            "nutrition": { "calories": 100 }
        })
    }

    fn gemini_success_body() -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": extraction_payload().to_string() }] }
            }]
        })
    }

    async fn wait_for_terminal_state(
        pool: &sqlx::PgPool,
        id: Uuid,
        timeout: Duration,
    ) -> RecipeRow {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let row = chefclip_db::get_recipe_by_id(pool, id)
                .await
                .expect("poll job")
                .expect("job must exist");
            match row.status() {
                RecipeStatus::Completed | RecipeStatus::Failed => return row,
                _ if tokio::time::Instant::now() > deadline => {
                    panic!("pipeline did not reach a terminal state in time")
                }
                _ => tokio::time::sleep(Duration::from_millis(25)).await,
            }
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn generate_runs_pipeline_to_completed(pool: sqlx::PgPool) {
        let youtube = MockServer::start().await;
        let gemini = MockServer::start().await;
        mount_video_source(&youtube).await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_success_body()))
            .mount(&gemini)
            .await;

        let generator = generator(pool.clone(), &youtube.uri(), &gemini.uri());
        let job = generator.generate("abc123", None).await.expect("generate");
        assert_eq!(job.status(), RecipeStatus::Processing);
        assert_eq!(job.video_id, "abc123");

        let done = wait_for_terminal_state(&pool, job.id, Duration::from_secs(5)).await;
        assert_eq!(done.status(), RecipeStatus::Completed);
        assert_eq!(done.title.as_deref(), Some("T"));
        assert_eq!(done.description.as_deref(), Some("D"));
        assert_eq!(done.difficulty.as_deref(), Some("easy"));
        assert_eq!(done.estimated_time_minutes, Some(10));
        assert_eq!(done.servings, Some(2));
        assert_eq!(done.category_list(), vec!["korean"]);
        let ingredients = done.ingredients.expect("ingredients");
        assert_eq!(ingredients[0]["name"].as_str(), Some("salt"));
        let steps = done.steps.expect("steps");
        assert_eq!(steps.as_array().map(Vec::len), Some(1));
        assert_eq!(steps[0]["step_number"].as_i64(), Some(1));
        assert!(done.error_message.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn extraction_failure_marks_job_failed(pool: sqlx::PgPool) {
        let youtube = MockServer::start().await;
        let gemini = MockServer::start().await;
        mount_video_source(&youtube).await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal error" }
            })))
            .mount(&gemini)
            .await;

        let generator = generator(pool.clone(), &youtube.uri(), &gemini.uri());
        let job = generator.generate("abc123", None).await.expect("generate");

        let done = wait_for_terminal_state(&pool, job.id, Duration::from_secs(5)).await;
        assert_eq!(done.status(), RecipeStatus::Failed);
        let message = done.error_message.expect("error message must be set");
        assert!(!message.is_empty());
        assert!(done.title.is_none(), "no extracted fields on failure");
        assert!(done.ingredients.is_none());
        assert!(done.steps.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn missing_transcript_is_a_fatal_precondition(pool: sqlx::PgPool) {
        let youtube = MockServer::start().await;
        let gemini = MockServer::start().await;
        // Player response without caption tracks → empty transcript.
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "videoDetails": {
                    "videoId": "abc123",
                    "title": "No Captions",
                    "viewCount": "10",
                    "author": "Chef Min",
                    "channelId": "UC1"
                }
            })))
            .mount(&youtube)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/browse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&youtube)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&youtube)
            .await;
        // The extraction engine must never be called.
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_success_body()))
            .expect(0)
            .mount(&gemini)
            .await;

        let generator = generator(pool.clone(), &youtube.uri(), &gemini.uri());
        let job = generator.generate("abc123", None).await.expect("generate");

        let done = wait_for_terminal_state(&pool, job.id, Duration::from_secs(5)).await;
        assert_eq!(done.status(), RecipeStatus::Failed);
        assert!(done
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("transcript"));

        gemini.verify().await;
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn duplicate_generate_never_runs_two_extractions(pool: sqlx::PgPool) {
        let youtube = MockServer::start().await;
        let gemini = MockServer::start().await;
        mount_video_source(&youtube).await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_success_body())
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&gemini)
            .await;

        let generator = generator(pool.clone(), &youtube.uri(), &gemini.uri());
        let first = generator.generate("abc123", None).await.expect("first");
        let second = generator.generate("abc123", None).await.expect("second");

        assert_eq!(first.id, second.id, "same job for the same video");

        let done = wait_for_terminal_state(&pool, first.id, Duration::from_secs(5)).await;
        assert_eq!(done.status(), RecipeStatus::Completed);

        // Exactly one extraction call despite two generate requests.
        gemini.verify().await;
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn failed_job_retries_with_cleared_error(pool: sqlx::PgPool) {
        let youtube = MockServer::start().await;
        let gemini = MockServer::start().await;
        mount_video_source(&youtube).await;

        // First extraction attempt fails...
        let failing = Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "boom" }
            })))
            .mount_as_scoped(&gemini)
            .await;

        let generator = generator(pool.clone(), &youtube.uri(), &gemini.uri());
        let job = generator.generate("abc123", None).await.expect("generate");
        let failed = wait_for_terminal_state(&pool, job.id, Duration::from_secs(5)).await;
        assert_eq!(failed.status(), RecipeStatus::Failed);
        assert!(failed.error_message.is_some());
        drop(failing);

        // ...then succeeds on explicit re-request.
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_success_body()))
            .mount(&gemini)
            .await;

        let retried = generator.generate("abc123", None).await.expect("retry");
        assert_eq!(retried.id, job.id);
        assert_eq!(retried.status(), RecipeStatus::Processing);
        assert!(
            retried.error_message.is_none(),
            "retry must clear the previous error"
        );

        let done = wait_for_terminal_state(&pool, job.id, Duration::from_secs(5)).await;
        assert_eq!(done.status(), RecipeStatus::Completed);
        assert_eq!(done.title.as_deref(), Some("T"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn generate_records_request_history_with_touch_semantics(pool: sqlx::PgPool) {
        let youtube = MockServer::start().await;
        let gemini = MockServer::start().await;
        mount_video_source(&youtube).await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_success_body()))
            .mount(&gemini)
            .await;

        let user_id = chefclip_db::create_user(&pool, "gen@example.com", None)
            .await
            .expect("user")
            .id;

        let generator = generator(pool.clone(), &youtube.uri(), &gemini.uri());
        let job = generator
            .generate("abc123", Some(user_id))
            .await
            .expect("first");
        let first = chefclip_db::get_recipe_request(&pool, user_id, job.id)
            .await
            .unwrap()
            .expect("history row recorded");

        generator
            .generate("abc123", Some(user_id))
            .await
            .expect("second");
        let second = chefclip_db::get_recipe_request(&pool, user_id, job.id)
            .await
            .unwrap()
            .expect("history row still present");

        assert_eq!(first.id, second.id, "no duplicate history rows");
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);

        wait_for_terminal_state(&pool, job.id, Duration::from_secs(5)).await;
    }

    #[test]
    fn transcript_prompt_formats_second_timestamps() {
        let segments = vec![
            TranscriptSegment {
                text: "Hello".to_owned(),
                start_ms: 0,
                end_ms: 5000,
                duration_ms: 5000,
            },
            TranscriptSegment {
                text: "world".to_owned(),
                start_ms: 5000,
                end_ms: 9300,
                duration_ms: 4300,
            },
            TranscriptSegment {
                text: "done".to_owned(),
                start_ms: 12340,
                end_ms: 13000,
                duration_ms: 660,
            },
        ];

        assert_eq!(
            format_transcript_prompt(&segments),
            "[0.00s] Hello\n[5.00s] world\n[12.34s] done"
        );
    }

    #[test]
    fn transcript_prompt_is_empty_for_no_segments() {
        assert_eq!(format_transcript_prompt(&[]), "");
    }
}
