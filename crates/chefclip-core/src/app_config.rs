use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub prompt_path: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_request_timeout_secs: u64,
    pub youtube_request_timeout_secs: u64,
    pub youtube_user_agent: String,
    pub youtube_max_comments: usize,
    pub youtube_max_retries: u32,
    pub youtube_retry_backoff_base_ms: u64,
    pub transcript_language: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("prompt_path", &self.prompt_path)
            .field("database_url", &"[redacted]")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("gemini_model", &self.gemini_model)
            .field(
                "gemini_request_timeout_secs",
                &self.gemini_request_timeout_secs,
            )
            .field(
                "youtube_request_timeout_secs",
                &self.youtube_request_timeout_secs,
            )
            .field("youtube_user_agent", &self.youtube_user_agent)
            .field("youtube_max_comments", &self.youtube_max_comments)
            .field("youtube_max_retries", &self.youtube_max_retries)
            .field(
                "youtube_retry_backoff_base_ms",
                &self.youtube_retry_backoff_base_ms,
            )
            .field("transcript_language", &self.transcript_language)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
