//! The video data cache: fetch-and-fill over the `video_records` table.
//!
//! Every lookup goes through [`VideoDataService::get_comprehensive_video_data`]:
//! a complete cached record short-circuits with zero source calls; an
//! incomplete record gets a fill pass that re-attempts only the missing
//! categories; a never-seen video gets a full four-category collection.
//!
//! Failure policy: basic video info is mandatory — its failure on first
//! collection persists an `error`-status record and propagates. The other
//! three categories (channel, comments, transcript) fail soft, defaulting
//! to empty so one dead category never blocks the rest.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use chefclip_db::{
    get_video_record, insert_video_record, is_unique_violation, update_video_record, DbError,
    VideoRecordDraft, VideoRecordRow,
};
use chefclip_youtube::{
    extract_video_id, is_shorts_url, TranscriptSegment, YoutubeClient, YoutubeError,
};

/// Errors surfaced by the synchronous portion of the cache service.
#[derive(Debug, Error)]
pub enum VideoDataError {
    #[error("video data source error: {0}")]
    Source(#[from] YoutubeError),
    #[error(transparent)]
    Db(#[from] DbError),
}

pub struct VideoDataService {
    pool: PgPool,
    client: Arc<YoutubeClient>,
    default_max_comments: usize,
    default_language: String,
}

impl VideoDataService {
    pub fn new(
        pool: PgPool,
        client: Arc<YoutubeClient>,
        default_max_comments: usize,
        default_language: String,
    ) -> Self {
        Self {
            pool,
            client,
            default_max_comments,
            default_language,
        }
    }

    /// Returns the aggregated record for a video reference, fetching or
    /// filling whatever the cache is missing.
    ///
    /// # Errors
    ///
    /// Returns [`VideoDataError::Source`] when the mandatory basic-info
    /// fetch fails during first collection (the error record is persisted
    /// before propagating), or [`VideoDataError::Db`] on persistence
    /// failures. Fill passes never fail on source errors.
    pub async fn get_comprehensive_video_data(
        &self,
        video_ref: &str,
        max_comments: Option<usize>,
        language: Option<&str>,
    ) -> Result<VideoRecordRow, VideoDataError> {
        let video_id = extract_video_id(video_ref);
        let max_comments = max_comments.unwrap_or(self.default_max_comments);
        let language = language.unwrap_or(&self.default_language);

        if let Some(mut existing) = get_video_record(&self.pool, &video_id).await? {
            if existing.is_complete() {
                return Ok(existing);
            }

            let changed = self
                .fill_missing_data(&mut existing, max_comments, language)
                .await;
            if changed {
                return Ok(update_video_record(&self.pool, &existing).await?);
            }
            return Ok(existing);
        }

        let is_shorts = is_shorts_url(video_ref);
        let draft = self
            .collect_from_source(&video_id, is_shorts, max_comments, language)
            .await?;

        match insert_video_record(&self.pool, &draft).await {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => {
                // A concurrent first collection won the insert; use its row.
                get_video_record(&self.pool, &video_id)
                    .await?
                    .ok_or(VideoDataError::Db(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetches records for many references concurrently. Each reference is
    /// an isolated call: one failure never poisons the others, and results
    /// come back in input order.
    pub async fn get_bulk_comprehensive_video_data(
        &self,
        video_refs: &[String],
        max_comments: Option<usize>,
        language: Option<&str>,
    ) -> Vec<Result<VideoRecordRow, VideoDataError>> {
        let fetches = video_refs
            .iter()
            .map(|video_ref| self.get_comprehensive_video_data(video_ref, max_comments, language));

        futures::future::join_all(fetches).await
    }

    /// Full four-category collection for a never-seen video.
    ///
    /// Basic info is fatal: on failure the partial record is persisted with
    /// status `error` and the source error propagates. Channel, comments,
    /// and transcript fail soft.
    async fn collect_from_source(
        &self,
        video_id: &str,
        is_shorts: bool,
        max_comments: usize,
        language: &str,
    ) -> Result<VideoRecordDraft, VideoDataError> {
        let mut draft = VideoRecordDraft {
            video_id: video_id.to_owned(),
            video_url: Some(format!("https://www.youtube.com/watch?v={video_id}")),
            status: "active".to_owned(),
            ..VideoRecordDraft::default()
        };

        let info = match self.client.get_video_info(video_id, is_shorts).await {
            Ok(info) => info,
            Err(err) => {
                tracing::error!(video_id, error = %err, "mandatory video info fetch failed");
                draft.status = "error".to_owned();
                draft.error_message = Some(err.to_string());
                self.persist_error_record(draft).await?;
                return Err(err.into());
            }
        };

        draft.title = info.title;
        draft.description = info.description;
        draft.duration_secs = info.duration_secs;
        draft.view_count = info.view_count;
        draft.like_count = info.like_count;
        draft.upload_date = info.upload_date;
        draft.category = info.category;
        draft.tags = Some(serde_json::to_value(&info.tags).unwrap_or_default());
        draft.thumbnails = Some(serde_json::to_value(&info.thumbnails).unwrap_or_default());
        draft.is_live = info.is_live;
        draft.is_shorts = info.is_shorts;
        draft.channel_id = info.channel.id.clone();
        draft.channel_name = info.channel.name;
        draft.channel_url = info.channel.url;

        if let Some(channel_id) = &info.channel.id {
            match self.client.get_channel_info(channel_id).await {
                Ok(channel) => {
                    draft.channel_description = channel.description;
                    draft.channel_subscriber_count = channel.subscriber_count;
                    draft.channel_video_count = channel.video_count;
                    draft.channel_thumbnails =
                        Some(serde_json::to_value(&channel.thumbnails).unwrap_or_default());
                    draft.channel_keywords =
                        Some(serde_json::to_value(&channel.keywords).unwrap_or_default());
                }
                Err(err) => {
                    tracing::debug!(video_id, error = %err, "channel info fetch failed; leaving unset");
                }
            }
        }

        match self.client.get_comments(video_id, max_comments).await {
            Ok(page) => {
                draft.total_comments = Some(i32::try_from(page.total_comments).unwrap_or(0));
                draft.comments = Some(serde_json::to_value(&page.comments).unwrap_or_default());
            }
            Err(err) => {
                tracing::debug!(video_id, error = %err, "comments fetch failed; defaulting to empty");
                draft.total_comments = Some(0);
                draft.comments = Some(serde_json::json!([]));
            }
        }

        match self.client.get_transcript(video_id, language).await {
            Ok(transcript) => {
                draft.transcript_language = transcript.language;
                draft.transcript_segments =
                    Some(serde_json::to_value(&transcript.segments).unwrap_or_default());
                draft.transcript_full_text = transcript.full_text;
            }
            Err(err) => {
                tracing::debug!(video_id, error = %err, "transcript fetch failed; defaulting to empty");
                draft.transcript_segments = Some(serde_json::json!([]));
                draft.transcript_full_text = None;
            }
        }

        Ok(draft)
    }

    /// Persists the error-status record from a failed first collection so
    /// callers can inspect the failure later. A concurrent insert of the
    /// same video is not an error here.
    async fn persist_error_record(&self, draft: VideoRecordDraft) -> Result<(), VideoDataError> {
        match insert_video_record(&self.pool, &draft).await {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-attempts only the categories still failing the completeness
    /// predicate, merging successes into the row. Returns whether anything
    /// changed; the caller persists (and bumps `updated_at`) only then.
    async fn fill_missing_data(
        &self,
        row: &mut VideoRecordRow,
        max_comments: usize,
        language: &str,
    ) -> bool {
        let mut updated = false;
        let video_id = row.video_id.clone();

        if row.title.is_none() || row.view_count.is_none() {
            match self.client.get_video_info(&video_id, row.is_shorts).await {
                Ok(info) => {
                    row.title = info.title;
                    row.description = info.description;
                    row.duration_secs = info.duration_secs;
                    row.view_count = info.view_count;
                    row.like_count = info.like_count;
                    row.upload_date = info.upload_date;
                    row.category = info.category;
                    row.tags = Some(serde_json::to_value(&info.tags).unwrap_or_default());
                    row.thumbnails =
                        Some(serde_json::to_value(&info.thumbnails).unwrap_or_default());
                    row.is_live = info.is_live;
                    row.channel_id = info.channel.id;
                    row.channel_name = info.channel.name;
                    row.channel_url = info.channel.url;
                    updated = true;
                }
                Err(err) => {
                    tracing::debug!(video_id, error = %err, "fill: video info still unavailable");
                }
            }
        }

        if row.channel_description.is_none() {
            if let Some(channel_id) = row.channel_id.clone() {
                match self.client.get_channel_info(&channel_id).await {
                    Ok(channel) => {
                        row.channel_description = channel.description;
                        row.channel_subscriber_count = channel.subscriber_count;
                        row.channel_video_count = channel.video_count;
                        row.channel_thumbnails =
                            Some(serde_json::to_value(&channel.thumbnails).unwrap_or_default());
                        row.channel_keywords =
                            Some(serde_json::to_value(&channel.keywords).unwrap_or_default());
                        updated = true;
                    }
                    Err(err) => {
                        tracing::debug!(video_id, error = %err, "fill: channel info still unavailable");
                    }
                }
            }
        }

        // Re-attempt while NULL (never tried) or 0 (tried and empty/failed):
        // completeness needs at least one comment, so 0 is still missing.
        if row.total_comments.is_none() || row.total_comments == Some(0) {
            match self.client.get_comments(&video_id, max_comments).await {
                Ok(page) => {
                    let total = i32::try_from(page.total_comments).unwrap_or(0);
                    if row.total_comments != Some(total) {
                        row.total_comments = Some(total);
                        row.comments =
                            Some(serde_json::to_value(&page.comments).unwrap_or_default());
                        updated = true;
                    }
                }
                Err(err) => {
                    tracing::debug!(video_id, error = %err, "fill: comments still unavailable");
                    if row.total_comments.is_none() {
                        row.total_comments = Some(0);
                        row.comments = Some(serde_json::json!([]));
                        updated = true;
                    }
                }
            }
        }

        let has_segments = row
            .transcript_segments
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .is_some_and(|segments| !segments.is_empty());
        if !has_segments {
            match self.client.get_transcript(&video_id, language).await {
                Ok(transcript) => {
                    if transcript.segments.is_empty() {
                        if row.transcript_segments.is_none() {
                            row.transcript_segments = Some(serde_json::json!([]));
                            row.transcript_full_text = None;
                            updated = true;
                        }
                    } else {
                        row.transcript_language = transcript.language;
                        row.transcript_segments =
                            Some(serde_json::to_value(&transcript.segments).unwrap_or_default());
                        row.transcript_full_text = transcript.full_text;
                        updated = true;
                    }
                }
                Err(err) => {
                    tracing::debug!(video_id, error = %err, "fill: transcript still unavailable");
                    if row.transcript_segments.is_none() {
                        row.transcript_segments = Some(serde_json::json!([]));
                        row.transcript_full_text = None;
                        updated = true;
                    }
                }
            }
        }

        updated
    }
}

/// Decodes the stored transcript segments column back into typed segments.
/// Absent or malformed data reads as no transcript.
#[must_use]
pub fn decode_transcript_segments(row: &VideoRecordRow) -> Vec<TranscriptSegment> {
    row.transcript_segments
        .clone()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(pool: sqlx::PgPool, server_uri: &str) -> VideoDataService {
        let client = YoutubeClient::with_base_url(30, "chefclip-test", server_uri)
            .expect("client")
            .with_retry_policy(0, 0);
        VideoDataService::new(pool, Arc::new(client), 100, "ko".to_owned())
    }

    fn player_body(server_uri: &str) -> serde_json::Value {
        serde_json::json!({
            "videoDetails": {
                "videoId": "abc123",
                "title": "Kimchi Stew",
                "shortDescription": "stew",
                "lengthSeconds": "600",
                "viewCount": "5000",
                "author": "Chef Min",
                "channelId": "UC1"
            },
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": [{
                        "baseUrl": format!("{server_uri}/api/timedtext?v=abc123&lang=ko"),
                        "languageCode": "ko"
                    }]
                }
            }
        })
    }

    fn browse_body() -> serde_json::Value {
        serde_json::json!({
            "metadata": {
                "channelMetadataRenderer": {
                    "externalId": "UC1",
                    "title": "Chef Min",
                    "description": "Korean home cooking"
                }
            }
        })
    }

    fn next_body() -> serde_json::Value {
        serde_json::json!({
            "frameworkUpdates": {
                "entityBatchUpdate": {
                    "mutations": [{
                        "payload": {
                            "commentEntityPayload": {
                                "properties": { "commentId": "c1", "content": { "content": "nice" } }
                            }
                        }
                    }]
                }
            }
        })
    }

    fn timedtext_body() -> serde_json::Value {
        serde_json::json!({
            "events": [
                { "tStartMs": 0, "dDurationMs": 5000, "segs": [{ "utf8": "Hello" }] },
                { "tStartMs": 5000, "dDurationMs": 5000, "segs": [{ "utf8": "world" }] }
            ]
        })
    }

    async fn mount_happy_path(server: &MockServer, expected_player_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_body(&server.uri())))
            .expect(expected_player_calls)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/browse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(browse_body()))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(next_body()))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .and(query_param("fmt", "json3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timedtext_body()))
            .expect(1)
            .mount(server)
            .await;
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn first_collection_persists_complete_record(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        // info + transcript both hit the player endpoint
        mount_happy_path(&server, 2).await;

        let service = service(pool, &server.uri());
        let record = service
            .get_comprehensive_video_data("https://www.youtube.com/watch?v=abc123", None, None)
            .await
            .expect("collection should succeed");

        assert_eq!(record.video_id, "abc123");
        assert_eq!(record.title.as_deref(), Some("Kimchi Stew"));
        assert_eq!(record.view_count, Some(5000));
        assert_eq!(record.channel_description.as_deref(), Some("Korean home cooking"));
        assert_eq!(record.total_comments, Some(1));
        assert_eq!(record.transcript_full_text.as_deref(), Some("Hello world"));
        assert!(record.is_complete());
        assert_eq!(record.status, "active");

        server.verify().await;
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn complete_record_triggers_zero_source_calls(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        // Mock expectations cover the FIRST call only; the second call must
        // be served entirely from the cache.
        mount_happy_path(&server, 2).await;

        let service = service(pool, &server.uri());
        let first = service
            .get_comprehensive_video_data("abc123", None, None)
            .await
            .expect("first call");
        let second = service
            .get_comprehensive_video_data("abc123", None, None)
            .await
            .expect("second call");

        assert_eq!(first.id, second.id);
        assert_eq!(first.updated_at, second.updated_at, "no write on cache hit");
        assert_eq!(first.title, second.title);

        server.verify().await;
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn comments_failure_defaults_to_zero_and_is_refilled_later(pool: sqlx::PgPool) {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_body(&server.uri())))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/browse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(browse_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timedtext_body()))
            .mount(&server)
            .await;
        // Comments fail on the first pass...
        let failing = Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount_as_scoped(&server)
            .await;

        let service = service(pool, &server.uri());
        let record = service
            .get_comprehensive_video_data("abc123", None, None)
            .await
            .expect("partial failure must not abort collection");

        assert_eq!(record.total_comments, Some(0), "failed category defaults");
        assert!(!record.is_complete(), "zero comments keeps record incomplete");
        drop(failing);

        // ...and only the comments category is re-attempted on the next call.
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(next_body()))
            .expect(1)
            .mount(&server)
            .await;

        let refilled = service
            .get_comprehensive_video_data("abc123", None, None)
            .await
            .expect("fill pass");

        assert_eq!(refilled.total_comments, Some(1));
        assert!(refilled.is_complete());
        assert!(refilled.updated_at > record.updated_at);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn failed_fill_pass_does_not_touch_updated_at(pool: sqlx::PgPool) {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_body(&server.uri())))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/browse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(browse_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timedtext_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let service = service(pool, &server.uri());
        let first = service
            .get_comprehensive_video_data("abc123", None, None)
            .await
            .expect("first call");
        // Comments failed and defaulted to 0; the retry also fails, so the
        // fill pass changes nothing.
        let second = service
            .get_comprehensive_video_data("abc123", None, None)
            .await
            .expect("second call");

        assert_eq!(second.total_comments, Some(0));
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn basic_info_failure_persists_error_record_and_propagates(pool: sqlx::PgPool) {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "playabilityStatus": { "status": "ERROR" }
            })))
            .mount(&server)
            .await;

        let service = service(pool.clone(), &server.uri());
        let result = service
            .get_comprehensive_video_data("deadvideo", None, None)
            .await;
        assert!(matches!(result, Err(VideoDataError::Source(_))));

        let record = chefclip_db::get_video_record(&pool, "deadvideo")
            .await
            .unwrap()
            .expect("error record must be persisted");
        assert_eq!(record.status, "error");
        assert!(record.error_message.is_some());
        assert!(record.title.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn bulk_fetch_isolates_failures(pool: sqlx::PgPool) {
        let server = MockServer::start().await;

        // "abc123" resolves normally; "deadvideo" has no videoDetails.
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .and(body_partial_json(serde_json::json!({"videoId": "abc123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_body(&server.uri())))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .and(body_partial_json(serde_json::json!({"videoId": "deadvideo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/browse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(browse_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(next_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timedtext_body()))
            .mount(&server)
            .await;

        let service = service(pool, &server.uri());
        let results = service
            .get_bulk_comprehensive_video_data(
                &["abc123".to_owned(), "deadvideo".to_owned()],
                None,
                None,
            )
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok(), "healthy ref must succeed");
        assert!(results[1].is_err(), "poisoned ref fails alone");
    }

    #[test]
    fn decode_transcript_segments_tolerates_malformed_column() {
        let mut row_value = serde_json::json!([
            { "text": "hi", "start_ms": 0, "end_ms": 1000, "duration_ms": 1000 }
        ]);

        let mut row = sample_row();
        row.transcript_segments = Some(row_value.clone());
        assert_eq!(decode_transcript_segments(&row).len(), 1);

        row_value = serde_json::json!("garbage");
        row.transcript_segments = Some(row_value);
        assert!(decode_transcript_segments(&row).is_empty());

        row.transcript_segments = None;
        assert!(decode_transcript_segments(&row).is_empty());
    }

    fn sample_row() -> VideoRecordRow {
        VideoRecordRow {
            id: 1,
            video_id: "abc".to_owned(),
            video_url: None,
            title: None,
            description: None,
            duration_secs: None,
            view_count: None,
            like_count: None,
            upload_date: None,
            category: None,
            tags: None,
            thumbnails: None,
            is_live: false,
            is_shorts: false,
            channel_id: None,
            channel_name: None,
            channel_url: None,
            channel_description: None,
            channel_subscriber_count: None,
            channel_video_count: None,
            channel_thumbnails: None,
            channel_keywords: None,
            total_comments: None,
            comments: None,
            transcript_language: None,
            transcript_segments: None,
            transcript_full_text: None,
            collected_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            status: "active".to_owned(),
            error_message: None,
        }
    }
}
