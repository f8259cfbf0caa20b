use thiserror::Error;

/// Errors returned by the Gemini extraction client.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status with an error payload.
    #[error("Gemini API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response carried no usable candidate text.
    #[error("Gemini response contained no candidate text")]
    EmptyResponse,

    /// The candidate text or envelope could not be parsed as expected.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
