//! Client for the YouTube Innertube JSON API.
//!
//! chefclip treats YouTube as an opaque data source with four independent
//! categories — video info, channel info, comments, transcript. Each fetch
//! is an isolated call; the caching/fill policy on top of them lives in the
//! server crate, not here.

mod client;
mod error;
mod retry;
mod types;
mod video_id;

pub use client::YoutubeClient;
pub use error::YoutubeError;
pub use types::{
    ChannelInfo, ChannelRef, Comment, CommentAuthor, CommentsPage, Thumbnail, Transcript,
    TranscriptSegment, VideoInfo,
};
pub use video_id::{extract_video_id, is_shorts_url};
