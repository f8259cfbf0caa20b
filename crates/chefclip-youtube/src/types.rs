//! Domain types returned by the client, plus the defensive wire shapes the
//! Innertube responses are parsed through.
//!
//! Innertube payloads are large and only loosely stable; everything beyond
//! the fields chefclip consumes is ignored, and every consumed field is an
//! `Option` (or defaulted collection) so a missing section degrades to an
//! absent value instead of a parse failure. Access past these validated
//! shapes never happens — callers only see the domain types below.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Channel identity as carried on a video.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
}

/// Basic video metadata from the player endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_secs: Option<i64>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub upload_date: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub thumbnails: Vec<Thumbnail>,
    pub is_live: bool,
    pub is_shorts: bool,
    pub channel: ChannelRef,
}

/// Channel metadata from the browse endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub subscriber_count: Option<String>,
    pub video_count: Option<String>,
    pub url: Option<String>,
    pub thumbnails: Vec<Thumbnail>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommentAuthor {
    pub name: String,
    pub channel_id: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: CommentAuthor,
    pub content: String,
    pub published_time: Option<String>,
    pub like_count: i64,
    pub reply_count: i64,
    pub is_pinned: bool,
    pub is_hearted: bool,
}

/// One page of top comments. `total_comments` is the collected count, not the
/// video's global counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsPage {
    pub video_id: String,
    pub total_comments: i64,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    pub full_text: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire shapes — player endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayerResponse {
    #[serde(default)]
    pub video_details: Option<WireVideoDetails>,
    #[serde(default)]
    pub microformat: Option<WireMicroformat>,
    #[serde(default)]
    pub captions: Option<WireCaptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVideoDetails {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub length_seconds: Option<String>,
    #[serde(default)]
    pub view_count: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub thumbnail: Option<WireThumbnailList>,
    #[serde(default)]
    pub is_live_content: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireThumbnailList {
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMicroformat {
    #[serde(default)]
    pub player_microformat_renderer: Option<WirePlayerMicroformat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WirePlayerMicroformat {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub like_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCaptions {
    #[serde(default)]
    pub player_captions_tracklist_renderer: Option<WireTracklist>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTracklist {
    #[serde(default)]
    pub caption_tracks: Vec<WireCaptionTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCaptionTrack {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire shapes — browse (channel) endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BrowseResponse {
    #[serde(default)]
    pub metadata: Option<WireChannelMetadata>,
    #[serde(default)]
    pub header: Option<WireChannelHeader>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireChannelMetadata {
    #[serde(default)]
    pub channel_metadata_renderer: Option<WireChannelMetadataRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireChannelMetadataRenderer {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub vanity_channel_url: Option<String>,
    /// Innertube serializes channel keywords as one space-separated string.
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub avatar: Option<WireThumbnailList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireChannelHeader {
    #[serde(default)]
    pub c4_tabbed_header_renderer: Option<WireC4Header>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireC4Header {
    #[serde(default)]
    pub subscriber_count_text: Option<WireText>,
    #[serde(default)]
    pub videos_count_text: Option<WireText>,
}

/// Innertube text node: either `simpleText` or a list of `runs`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireText {
    #[serde(default)]
    pub simple_text: Option<String>,
    #[serde(default)]
    pub runs: Vec<WireRun>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRun {
    #[serde(default)]
    pub text: Option<String>,
}

impl WireText {
    pub(crate) fn text(&self) -> Option<String> {
        if let Some(simple) = &self.simple_text {
            return Some(simple.clone());
        }
        let joined: String = self
            .runs
            .iter()
            .filter_map(|r| r.text.as_deref())
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

// ---------------------------------------------------------------------------
// Wire shapes — next (comments) endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NextResponse {
    #[serde(default)]
    pub framework_updates: Option<WireFrameworkUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireFrameworkUpdates {
    #[serde(default)]
    pub entity_batch_update: Option<WireEntityBatchUpdate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireEntityBatchUpdate {
    #[serde(default)]
    pub mutations: Vec<WireMutation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMutation {
    #[serde(default)]
    pub payload: Option<WireMutationPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMutationPayload {
    #[serde(default)]
    pub comment_entity_payload: Option<WireCommentEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCommentEntity {
    #[serde(default)]
    pub properties: Option<WireCommentProperties>,
    #[serde(default)]
    pub author: Option<WireCommentAuthor>,
    #[serde(default)]
    pub toolbar: Option<WireCommentToolbar>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCommentProperties {
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub content: Option<WireCommentContent>,
    #[serde(default)]
    pub published_time: Option<String>,
    #[serde(default)]
    pub pinned_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCommentContent {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCommentAuthor {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCommentToolbar {
    #[serde(default)]
    pub like_count_notliked: Option<String>,
    #[serde(default)]
    pub reply_count: Option<String>,
    #[serde(default)]
    pub heart_state: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire shapes — timedtext (transcript) endpoint, `fmt=json3`
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct TimedtextResponse {
    #[serde(default)]
    pub events: Vec<WireTimedtextEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTimedtextEvent {
    #[serde(default, rename = "tStartMs")]
    pub t_start_ms: Option<i64>,
    #[serde(default, rename = "dDurationMs")]
    pub d_duration_ms: Option<i64>,
    #[serde(default)]
    pub segs: Vec<WireTimedtextSeg>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTimedtextSeg {
    #[serde(default)]
    pub utf8: Option<String>,
}
