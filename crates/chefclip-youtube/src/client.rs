//! HTTP client for the YouTube Innertube JSON API.
//!
//! Wraps `reqwest` with Innertube-specific request assembly, defensive
//! response parsing, and retry with back-off. All endpoints degrade rather
//! than fail where the payload allows it: a video with comments disabled
//! yields an empty page, a video with no caption tracks yields an empty
//! transcript. Only the player call treats a missing payload as an error,
//! because nothing can be built without `videoDetails`.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::YoutubeError;
use crate::retry::retry_with_backoff;
use crate::types::{
    BrowseResponse, ChannelInfo, ChannelRef, Comment, CommentAuthor, CommentsPage, NextResponse,
    PlayerResponse, TimedtextResponse, Transcript, TranscriptSegment, VideoInfo,
};

const DEFAULT_BASE_URL: &str = "https://www.youtube.com/";
const INNERTUBE_CLIENT_NAME: &str = "WEB";
const INNERTUBE_CLIENT_VERSION: &str = "2.20250110.01.00";

/// Client for the YouTube Innertube API.
///
/// Use [`YoutubeClient::new`] for production or
/// [`YoutubeClient::with_base_url`] to point at a mock server in tests.
pub struct YoutubeClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl YoutubeClient {
    /// Creates a new client pointed at youtube.com.
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, YoutubeError> {
        Self::with_base_url(timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`YoutubeError::Unavailable`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, YoutubeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent.to_owned())
            .build()?;

        // Normalise: a single trailing slash so join() appends rather than
        // replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| YoutubeError::Unavailable(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            base_url,
            max_retries: 3,
            backoff_base_ms: 1_000,
        })
    }

    /// Overrides the retry policy (defaults: 3 retries, 1 s base back-off).
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Fetches basic video metadata via the player endpoint.
    ///
    /// # Errors
    ///
    /// - [`YoutubeError::Unavailable`] if the response has no `videoDetails`.
    /// - [`YoutubeError::Http`] on network failure or non-2xx HTTP status.
    /// - [`YoutubeError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn get_video_info(
        &self,
        video_id: &str,
        is_shorts: bool,
    ) -> Result<VideoInfo, YoutubeError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.fetch_video_info(video_id, is_shorts)
        })
        .await
    }

    /// Fetches channel metadata via the browse endpoint.
    ///
    /// # Errors
    ///
    /// - [`YoutubeError::Unavailable`] if the response carries no channel
    ///   metadata renderer.
    /// - [`YoutubeError::Http`] / [`YoutubeError::Deserialize`] as above.
    pub async fn get_channel_info(&self, channel_id: &str) -> Result<ChannelInfo, YoutubeError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.fetch_channel_info(channel_id)
        })
        .await
    }

    /// Fetches up to `max_comments` top comments via the next endpoint.
    ///
    /// A video with comments disabled (no comment entities in the response)
    /// yields an empty page, not an error.
    ///
    /// # Errors
    ///
    /// [`YoutubeError::Http`] / [`YoutubeError::Deserialize`] as above.
    pub async fn get_comments(
        &self,
        video_id: &str,
        max_comments: usize,
    ) -> Result<CommentsPage, YoutubeError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.fetch_comments(video_id, max_comments)
        })
        .await
    }

    /// Fetches the transcript, preferring the caption track matching
    /// `language` and falling back to the first available track.
    ///
    /// A video with no caption tracks yields an empty transcript, not an
    /// error.
    ///
    /// # Errors
    ///
    /// [`YoutubeError::Http`] / [`YoutubeError::Deserialize`] as above.
    pub async fn get_transcript(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Transcript, YoutubeError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.fetch_transcript(video_id, language)
        })
        .await
    }

    async fn fetch_video_info(
        &self,
        video_id: &str,
        is_shorts: bool,
    ) -> Result<VideoInfo, YoutubeError> {
        let body = serde_json::json!({
            "context": innertube_context(),
            "videoId": video_id,
            "contentCheckOk": true,
            "racyCheckOk": true,
        });
        let raw = self.post_json("youtubei/v1/player", &body).await?;
        let parsed: PlayerResponse = parse_value(raw, &format!("player(videoId={video_id})"))?;

        let details = parsed.video_details.ok_or_else(|| {
            YoutubeError::Unavailable(format!("player response has no videoDetails ({video_id})"))
        })?;
        let micro = parsed
            .microformat
            .and_then(|m| m.player_microformat_renderer);

        let channel_url = details
            .channel_id
            .as_ref()
            .map(|id| format!("https://www.youtube.com/channel/{id}"));

        Ok(VideoInfo {
            id: details.video_id.unwrap_or_else(|| video_id.to_owned()),
            title: details.title,
            description: details.short_description,
            duration_secs: details.length_seconds.as_deref().and_then(parse_count),
            view_count: details.view_count.as_deref().and_then(parse_count),
            like_count: micro
                .as_ref()
                .and_then(|m| m.like_count.as_deref())
                .and_then(parse_count),
            upload_date: micro.as_ref().and_then(|m| m.upload_date.clone()),
            category: micro.as_ref().and_then(|m| m.category.clone()),
            tags: details.keywords,
            thumbnails: details.thumbnail.unwrap_or_default().thumbnails,
            is_live: details.is_live_content,
            is_shorts,
            channel: ChannelRef {
                id: details.channel_id,
                name: details.author,
                url: channel_url,
            },
        })
    }

    async fn fetch_channel_info(&self, channel_id: &str) -> Result<ChannelInfo, YoutubeError> {
        let body = serde_json::json!({
            "context": innertube_context(),
            "browseId": channel_id,
        });
        let raw = self.post_json("youtubei/v1/browse", &body).await?;
        let parsed: BrowseResponse = parse_value(raw, &format!("browse(browseId={channel_id})"))?;

        let metadata = parsed
            .metadata
            .and_then(|m| m.channel_metadata_renderer)
            .ok_or_else(|| {
                YoutubeError::Unavailable(format!(
                    "browse response has no channel metadata ({channel_id})"
                ))
            })?;
        let header = parsed.header.and_then(|h| h.c4_tabbed_header_renderer);

        let url = metadata.vanity_channel_url.clone().or_else(|| {
            metadata
                .external_id
                .as_ref()
                .map(|id| format!("https://www.youtube.com/channel/{id}"))
        });

        Ok(ChannelInfo {
            id: metadata.external_id,
            name: metadata.title,
            description: metadata.description,
            subscriber_count: header
                .as_ref()
                .and_then(|h| h.subscriber_count_text.as_ref())
                .and_then(|t| t.text()),
            video_count: header
                .as_ref()
                .and_then(|h| h.videos_count_text.as_ref())
                .and_then(|t| t.text()),
            url,
            thumbnails: metadata.avatar.unwrap_or_default().thumbnails,
            keywords: metadata
                .keywords
                .map(|k| k.split_whitespace().map(ToOwned::to_owned).collect())
                .unwrap_or_default(),
        })
    }

    async fn fetch_comments(
        &self,
        video_id: &str,
        max_comments: usize,
    ) -> Result<CommentsPage, YoutubeError> {
        let body = serde_json::json!({
            "context": innertube_context(),
            "videoId": video_id,
        });
        let raw = self.post_json("youtubei/v1/next", &body).await?;
        let parsed: NextResponse = parse_value(raw, &format!("next(videoId={video_id})"))?;

        let mutations = parsed
            .framework_updates
            .and_then(|f| f.entity_batch_update)
            .unwrap_or_default()
            .mutations;

        let mut comments = Vec::new();
        for mutation in mutations {
            let Some(entity) = mutation.payload.and_then(|p| p.comment_entity_payload) else {
                continue;
            };
            let Some(properties) = entity.properties else {
                continue;
            };
            let Some(id) = properties.comment_id else {
                continue;
            };

            let author = entity.author.map_or_else(CommentAuthor::default, |a| {
                CommentAuthor {
                    name: a.display_name.unwrap_or_default(),
                    channel_id: a.channel_id,
                    thumbnail_url: a.avatar_thumbnail_url,
                }
            });
            let toolbar = entity.toolbar;

            comments.push(Comment {
                id,
                author,
                content: properties
                    .content
                    .and_then(|c| c.content)
                    .unwrap_or_default(),
                published_time: properties.published_time,
                like_count: toolbar
                    .as_ref()
                    .and_then(|t| t.like_count_notliked.as_deref())
                    .and_then(parse_count)
                    .unwrap_or(0),
                reply_count: toolbar
                    .as_ref()
                    .and_then(|t| t.reply_count.as_deref())
                    .and_then(parse_count)
                    .unwrap_or(0),
                is_pinned: properties.pinned_text.is_some(),
                is_hearted: toolbar
                    .as_ref()
                    .and_then(|t| t.heart_state.as_deref())
                    .is_some_and(|s| s == "TOOLBAR_HEART_STATE_HEARTED"),
            });

            if comments.len() >= max_comments {
                break;
            }
        }

        let total_comments = i64::try_from(comments.len()).unwrap_or(i64::MAX);
        Ok(CommentsPage {
            video_id: video_id.to_owned(),
            total_comments,
            comments,
        })
    }

    async fn fetch_transcript(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Transcript, YoutubeError> {
        let body = serde_json::json!({
            "context": innertube_context(),
            "videoId": video_id,
        });
        let raw = self.post_json("youtubei/v1/player", &body).await?;
        let parsed: PlayerResponse =
            parse_value(raw, &format!("player/captions(videoId={video_id})"))?;

        let tracks = parsed
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .unwrap_or_default()
            .caption_tracks;

        let track = tracks
            .iter()
            .find(|t| t.language_code.as_deref() == Some(language))
            .or_else(|| tracks.first());

        let Some(track) = track else {
            return Ok(empty_transcript(video_id));
        };
        let Some(base_url) = &track.base_url else {
            return Ok(empty_transcript(video_id));
        };

        let separator = if base_url.contains('?') { '&' } else { '?' };
        let timedtext_url = format!("{base_url}{separator}fmt=json3");

        let raw = self
            .client
            .get(&timedtext_url)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;
        let timedtext: TimedtextResponse =
            parse_value(raw, &format!("timedtext(videoId={video_id})"))?;

        let mut segments = Vec::new();
        for event in timedtext.events {
            let text: String = event
                .segs
                .iter()
                .filter_map(|s| s.utf8.as_deref())
                .collect::<String>()
                .trim()
                .to_owned();
            if text.is_empty() {
                continue;
            }
            let start_ms = event.t_start_ms.unwrap_or(0);
            let duration_ms = event.d_duration_ms.unwrap_or(0);
            segments.push(TranscriptSegment {
                text,
                start_ms,
                end_ms: start_ms + duration_ms,
                duration_ms,
            });
        }

        if segments.is_empty() {
            return Ok(empty_transcript(video_id));
        }

        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Transcript {
            video_id: video_id.to_owned(),
            language: track
                .language_code
                .clone()
                .or_else(|| Some(language.to_owned())),
            segments,
            full_text: Some(full_text),
        })
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, YoutubeError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| YoutubeError::Unavailable(format!("invalid endpoint '{path}': {e}")))?;

        let response = self
            .client
            .post(url)
            .query(&[("prettyPrint", "false")])
            .json(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<serde_json::Value>().await?)
    }
}

fn innertube_context() -> serde_json::Value {
    serde_json::json!({
        "client": {
            "clientName": INNERTUBE_CLIENT_NAME,
            "clientVersion": INNERTUBE_CLIENT_VERSION,
        }
    })
}

fn empty_transcript(video_id: &str) -> Transcript {
    Transcript {
        video_id: video_id.to_owned(),
        language: None,
        segments: Vec::new(),
        full_text: None,
    }
}

fn parse_value<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    context: &str,
) -> Result<T, YoutubeError> {
    serde_json::from_value(value).map_err(|e| YoutubeError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

/// Parses a numeric string that may carry grouping separators ("1,234,567").
fn parse_count(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok()
}
