//! Synchronous recipe generation from the CLI.
//!
//! The server runs extraction as a detached task; this command runs the same
//! fetch → extract → persist steps inline and waits for the result, which is
//! what an operator wants when debugging a single video.

use chefclip_db::{
    complete_recipe, fail_recipe, get_recipe_by_video_id, get_video_record,
    insert_processing_recipe, retry_failed_recipe, update_video_record, CompletedRecipeFields,
    DbError, RecipeRow, RecipeStatus, VideoRecordRow,
};
use chefclip_gemini::{
    format_transcript_lines, ExtractedRecipe, ExtractionRequest, GeminiClient,
};
use chefclip_youtube::{extract_video_id, TranscriptSegment};

/// Settle the job row, run extraction inline, and print the outcome.
///
/// # Errors
///
/// Returns an error when configuration is incomplete, the job is already
/// owned by another worker, or persistence fails. An extraction failure is
/// recorded on the job (status `failed`) and also returned.
pub(crate) async fn run_generate(
    pool: &sqlx::PgPool,
    config: &chefclip_core::AppConfig,
    video_ref: &str,
) -> anyhow::Result<()> {
    let video_id = extract_video_id(video_ref);

    let job = match settle_job(pool, &video_id).await? {
        Settled::Run(job) => job,
        Settled::AlreadyCompleted(job) => {
            println!(
                "{video_id}: already completed (recipe {})\ntitle: {}",
                job.id,
                job.title.as_deref().unwrap_or("<none>")
            );
            return Ok(());
        }
        Settled::InFlight(job) => {
            anyhow::bail!(
                "{video_id}: recipe {} is already processing; poll the API or retry after it settles",
                job.id
            );
        }
    };

    println!("{video_id}: running extraction for recipe {}", job.id);

    match run_extraction(pool, config, video_ref, &video_id).await {
        Ok(extracted) => {
            complete_recipe(pool, job.id, &completed_fields(&extracted)).await?;
            println!(
                "{video_id}: completed — \"{}\" ({} ingredients, {} steps)",
                extracted.basic_info.title,
                extracted.ingredients.len(),
                extracted.steps.len()
            );
            Ok(())
        }
        Err(e) => {
            fail_recipe(pool, job.id, &e.to_string()).await?;
            Err(e.context(format!("{video_id}: extraction failed; job marked failed")))
        }
    }
}

enum Settled {
    Run(RecipeRow),
    AlreadyCompleted(RecipeRow),
    InFlight(RecipeRow),
}

async fn settle_job(pool: &sqlx::PgPool, video_id: &str) -> anyhow::Result<Settled> {
    if let Some(existing) = get_recipe_by_video_id(pool, video_id).await? {
        return Ok(match existing.status() {
            RecipeStatus::Completed => Settled::AlreadyCompleted(existing),
            RecipeStatus::Processing => Settled::InFlight(existing),
            RecipeStatus::Failed => Settled::Run(retry_failed_recipe(pool, existing.id).await?),
            RecipeStatus::Pending => {
                Settled::Run(chefclip_db::activate_pending_recipe(pool, existing.id).await?)
            }
        });
    }

    match insert_processing_recipe(pool, video_id).await? {
        Some(job) => Ok(Settled::Run(job)),
        None => {
            // Lost a creation race with another worker.
            let existing = get_recipe_by_video_id(pool, video_id)
                .await?
                .ok_or(DbError::NotFound)?;
            Ok(Settled::InFlight(existing))
        }
    }
}

async fn run_extraction(
    pool: &sqlx::PgPool,
    config: &chefclip_core::AppConfig,
    video_ref: &str,
    video_id: &str,
) -> anyhow::Result<ExtractedRecipe> {
    let record = ensure_video_data(pool, config, video_ref, video_id).await?;

    let has_transcript = record
        .transcript_full_text
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    if !has_transcript {
        anyhow::bail!("transcript not available for this video");
    }

    let segments: Vec<TranscriptSegment> = record
        .transcript_segments
        .clone()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    let transcript = format_transcript_lines(segments.iter().map(|segment| {
        #[allow(clippy::cast_precision_loss)]
        let seconds = segment.start_ms as f64 / 1000.0;
        (seconds, segment.text.as_str())
    }));

    let prompt = chefclip_core::load_prompt_config(&config.prompt_path)?;
    let api_key = config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is required for generate"))?;
    let gemini = GeminiClient::new(
        api_key,
        &config.gemini_model,
        config.gemini_request_timeout_secs,
    )
    .map_err(|e| anyhow::anyhow!("failed to build Gemini client: {e}"))?;

    let request = ExtractionRequest {
        transcript: &transcript,
        system_instruction: &prompt.system_instruction,
        response_schema: &prompt.response_schema,
        generation_config: &prompt.generation_config,
    };
    Ok(gemini.generate_recipe(&request).await?)
}

/// Loads the cached record, collecting it first when absent or incomplete.
async fn ensure_video_data(
    pool: &sqlx::PgPool,
    config: &chefclip_core::AppConfig,
    video_ref: &str,
    video_id: &str,
) -> anyhow::Result<VideoRecordRow> {
    if let Some(record) = get_video_record(pool, video_id).await? {
        if record.is_complete() {
            return Ok(record);
        }
    }

    let client = crate::collect::build_client(config)?;
    let draft = crate::collect::collect_one(
        &client,
        video_ref,
        video_id,
        config.youtube_max_comments,
        &config.transcript_language,
    )
    .await?;

    let record = match get_video_record(pool, video_id).await? {
        Some(mut existing) => {
            existing.total_comments = draft.total_comments;
            existing.comments = draft.comments.clone();
            existing.transcript_language = draft.transcript_language.clone();
            existing.transcript_segments = draft.transcript_segments.clone();
            existing.transcript_full_text = draft.transcript_full_text.clone();
            existing.title = draft.title.clone();
            existing.view_count = draft.view_count;
            existing.channel_id = draft.channel_id.clone();
            existing.channel_name = draft.channel_name.clone();
            update_video_record(pool, &existing).await?
        }
        None => chefclip_db::insert_video_record(pool, &draft).await?,
    };

    Ok(record)
}

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
