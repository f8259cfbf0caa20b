//! HTTP client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::GeminiError;
use crate::types::{ExtractedRecipe, GenerateContentResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

/// Renders `(start-time seconds, text)` pairs as the prompt the extraction
/// engine expects: one `[<seconds, 2dp>s] <text>` line per segment.
pub fn format_transcript_lines<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = (f64, &'a str)>,
{
    segments
        .into_iter()
        .map(|(seconds, text)| format!("[{seconds:.2}s] {text}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One extraction call's inputs: the transcript prompt plus the fixed
/// prompt/schema configuration loaded at startup.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Timestamped transcript text (`[12.34s] ...` lines).
    pub transcript: &'a str,
    pub system_instruction: &'a str,
    pub response_schema: &'a serde_json::Value,
    /// Model sampling parameters; may be JSON null when unconfigured.
    pub generation_config: &'a serde_json::Value,
}

/// Client for the Gemini REST API.
///
/// Use [`GeminiClient::new`] for production or
/// [`GeminiClient::with_base_url`] to point at a mock server in tests.
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Creates a new client pointed at the production Gemini API.
    ///
    /// # Errors
    ///
    /// Returns [`GeminiError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, GeminiError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`GeminiError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`GeminiError::Api`] if `base_url` is not a
    /// valid URL.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| GeminiError::Api {
            status: 0,
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        })
    }

    /// Runs one structured extraction and parses the candidate text into an
    /// [`ExtractedRecipe`].
    ///
    /// # Errors
    ///
    /// - [`GeminiError::Api`] if the API returns a non-success status.
    /// - [`GeminiError::Http`] on network failure.
    /// - [`GeminiError::EmptyResponse`] if no candidate text is present.
    /// - [`GeminiError::Deserialize`] if the envelope or the candidate JSON
    ///   does not match the expected shape.
    pub async fn generate_recipe(
        &self,
        request: &ExtractionRequest<'_>,
    ) -> Result<ExtractedRecipe, GeminiError> {
        let path = format!("v1beta/models/{}:generateContent", self.model);
        let url = self.base_url.join(&path).map_err(|e| GeminiError::Api {
            status: 0,
            message: format!("invalid endpoint '{path}': {e}"),
        })?;

        let mut generation_config = if request.generation_config.is_object() {
            request.generation_config.clone()
        } else {
            serde_json::json!({})
        };
        generation_config["responseMimeType"] = serde_json::json!("application/json");
        generation_config["responseSchema"] = request.response_schema.clone();

        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.transcript }] }],
            "systemInstruction": {
                "role": "system",
                "parts": [{ "text": request.system_instruction }],
            },
            "generationConfig": generation_config,
        });

        tracing::debug!(
            model = %self.model,
            transcript_chars = request.transcript.len(),
            "requesting recipe extraction"
        );

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let value = response.json::<serde_json::Value>().await?;

        if !status.is_success() {
            let message = value
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_owned();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: GenerateContentResponse =
            serde_json::from_value(value).map_err(|e| GeminiError::Deserialize {
                context: format!("generateContent(model={})", self.model),
                source: e,
            })?;

        let text = envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or(GeminiError::EmptyResponse)?;

        serde_json::from_str(&text).map_err(|e| GeminiError::Deserialize {
            context: "extracted recipe payload".to_owned(),
            source: e,
        })
    }
}
