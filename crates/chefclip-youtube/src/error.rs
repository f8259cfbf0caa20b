use thiserror::Error;

/// Errors returned by the YouTube Innertube client.
#[derive(Debug, Error)]
pub enum YoutubeError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response parsed but is missing the section the call depends on
    /// (e.g. a player response with no `videoDetails`).
    #[error("YouTube response unavailable: {0}")]
    Unavailable(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
