//! Collection command handler for the CLI.
//!
//! Unlike the server's fill pass, `collect` is a full re-collection: every
//! category is fetched fresh and the stored record is overwritten. Per-video
//! failures are logged and skipped rather than propagated so one bad
//! reference does not abort the full run.

use chefclip_db::{
    get_video_record, insert_video_record, update_video_record, VideoRecordDraft, VideoRecordRow,
};
use chefclip_youtube::{extract_video_id, is_shorts_url, YoutubeClient};

/// Collect data for each reference and print a per-video summary line.
///
/// # Errors
///
/// Returns an error if no references were given, the client cannot be
/// constructed, or persistence fails. Source failures are per-video and
/// logged, not propagated.
pub(crate) async fn run_collect(
    pool: &sqlx::PgPool,
    config: &chefclip_core::AppConfig,
    video_refs: &[String],
    max_comments: Option<usize>,
    language: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    if video_refs.is_empty() {
        anyhow::bail!("at least one video id or URL is required");
    }

    let client = build_client(config)?;
    let max_comments = max_comments.unwrap_or(config.youtube_max_comments);
    let language = language.unwrap_or(&config.transcript_language);

    for video_ref in video_refs {
        let video_id = extract_video_id(video_ref);
        let existing = get_video_record(pool, &video_id).await?;

        if let Some(record) = &existing {
            if record.is_complete() && !force {
                println!("{video_id}: already complete, skipping (use --force to re-collect)");
                continue;
            }
        }

        let draft = match collect_one(&client, video_ref, &video_id, max_comments, language).await {
            Ok(draft) => draft,
            Err(e) => {
                eprintln!("error: failed to collect {video_id}: {e}");
                continue;
            }
        };

        let record = match existing {
            Some(current) => {
                let merged = overwrite_row(current, draft);
                update_video_record(pool, &merged).await?
            }
            None => insert_video_record(pool, &draft).await?,
        };

        print_summary(&record);
    }

    Ok(())
}

pub(crate) fn build_client(config: &chefclip_core::AppConfig) -> anyhow::Result<YoutubeClient> {
    let client = YoutubeClient::new(
        config.youtube_request_timeout_secs,
        &config.youtube_user_agent,
    )
    .map_err(|e| anyhow::anyhow!("failed to build YouTube client: {e}"))?
    .with_retry_policy(
        config.youtube_max_retries,
        config.youtube_retry_backoff_base_ms,
    );
    Ok(client)
}

/// Fetch all four categories fresh. Basic info is mandatory; the other
/// categories default to empty on failure.
pub(crate) async fn collect_one(
    client: &YoutubeClient,
    video_ref: &str,
    video_id: &str,
    max_comments: usize,
    language: &str,
) -> anyhow::Result<VideoRecordDraft> {
    let info = client
        .get_video_info(video_id, is_shorts_url(video_ref))
        .await?;

    let mut draft = VideoRecordDraft {
        video_id: video_id.to_owned(),
        video_url: Some(format!("https://www.youtube.com/watch?v={video_id}")),
        status: "active".to_owned(),
        title: info.title,
        description: info.description,
        duration_secs: info.duration_secs,
        view_count: info.view_count,
        like_count: info.like_count,
        upload_date: info.upload_date,
        category: info.category,
        tags: Some(serde_json::to_value(&info.tags).unwrap_or_default()),
        thumbnails: Some(serde_json::to_value(&info.thumbnails).unwrap_or_default()),
        is_live: info.is_live,
        is_shorts: info.is_shorts,
        channel_id: info.channel.id.clone(),
        channel_name: info.channel.name,
        channel_url: info.channel.url,
        ..VideoRecordDraft::default()
    };

    if let Some(channel_id) = &info.channel.id {
        match client.get_channel_info(channel_id).await {
            Ok(channel) => {
                draft.channel_description = channel.description;
                draft.channel_subscriber_count = channel.subscriber_count;
                draft.channel_video_count = channel.video_count;
                draft.channel_thumbnails =
                    Some(serde_json::to_value(&channel.thumbnails).unwrap_or_default());
                draft.channel_keywords =
                    Some(serde_json::to_value(&channel.keywords).unwrap_or_default());
            }
            Err(e) => tracing::warn!(video_id, error = %e, "channel info fetch failed"),
        }
    }

    match client.get_comments(video_id, max_comments).await {
        Ok(page) => {
            draft.total_comments = Some(i32::try_from(page.total_comments).unwrap_or(0));
            draft.comments = Some(serde_json::to_value(&page.comments).unwrap_or_default());
        }
        Err(e) => {
            tracing::warn!(video_id, error = %e, "comments fetch failed");
            draft.total_comments = Some(0);
            draft.comments = Some(serde_json::json!([]));
        }
    }

    match client.get_transcript(video_id, language).await {
        Ok(transcript) => {
            draft.transcript_language = transcript.language;
            draft.transcript_segments =
                Some(serde_json::to_value(&transcript.segments).unwrap_or_default());
            draft.transcript_full_text = transcript.full_text;
        }
        Err(e) => {
            tracing::warn!(video_id, error = %e, "transcript fetch failed");
            draft.transcript_segments = Some(serde_json::json!([]));
            draft.transcript_full_text = None;
        }
    }

    Ok(draft)
}

/// Applies a fresh draft over an existing row, keeping identity and
/// `collected_at`.
fn overwrite_row(mut row: VideoRecordRow, draft: VideoRecordDraft) -> VideoRecordRow {
    row.video_url = draft.video_url;
    row.title = draft.title;
    row.description = draft.description;
    row.duration_secs = draft.duration_secs;
    row.view_count = draft.view_count;
    row.like_count = draft.like_count;
    row.upload_date = draft.upload_date;
    row.category = draft.category;
    row.tags = draft.tags;
    row.thumbnails = draft.thumbnails;
    row.is_live = draft.is_live;
    row.is_shorts = draft.is_shorts;
    row.channel_id = draft.channel_id;
    row.channel_name = draft.channel_name;
    row.channel_url = draft.channel_url;
    row.channel_description = draft.channel_description;
    row.channel_subscriber_count = draft.channel_subscriber_count;
    row.channel_video_count = draft.channel_video_count;
    row.channel_thumbnails = draft.channel_thumbnails;
    row.channel_keywords = draft.channel_keywords;
    row.total_comments = draft.total_comments;
    row.comments = draft.comments;
    row.transcript_language = draft.transcript_language;
    row.transcript_segments = draft.transcript_segments;
    row.transcript_full_text = draft.transcript_full_text;
    row.status = draft.status;
    row.error_message = draft.error_message;
    row
}

fn print_summary(record: &VideoRecordRow) {
    println!(
        "{}: title={:?} views={} comments={} transcript_segments={} complete={}",
        record.video_id,
        record.title.as_deref().unwrap_or("<none>"),
        record
            .view_count
            .map_or_else(|| "<none>".to_owned(), |v| v.to_string()),
        record
            .total_comments
            .map_or_else(|| "<none>".to_owned(), |c| c.to_string()),
        record
            .transcript_segments
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len),
        record.is_complete(),
    );
}
