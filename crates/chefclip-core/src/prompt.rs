//! Extraction prompt configuration.
//!
//! The recipe-extraction prompt — system instruction, JSON response schema,
//! and model generation parameters — lives in a YAML file loaded once at
//! startup. The loaded value is immutable for the life of the process and is
//! shared with the orchestrator behind an `Arc`.

use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// Immutable prompt/schema configuration for the extraction engine.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    /// System instruction sent with every extraction request.
    pub system_instruction: String,
    /// JSON schema the model is constrained to; forwarded verbatim as
    /// `generationConfig.responseSchema`.
    pub response_schema: serde_json::Value,
    /// Model sampling parameters (temperature, top-p, ...); forwarded
    /// verbatim into `generationConfig`.
    #[serde(default)]
    pub generation_config: serde_json::Value,
}

/// Loads the prompt configuration from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError::PromptIo`] if the file cannot be read, or
/// [`ConfigError::PromptParse`] if it is not valid YAML of the expected shape.
pub fn load_prompt_config(path: &Path) -> Result<PromptConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::PromptIo {
        path: path.display().to_string(),
        source: e,
    })?;

    serde_yaml::from_str(&raw).map_err(|e| ConfigError::PromptParse {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
system_instruction: |
  You are a culinary analyst. Extract a structured recipe from the transcript.
response_schema:
  type: object
  properties:
    basic_info:
      type: object
generation_config:
  temperature: 0.2
  top_p: 0.9
"#;

    #[test]
    fn parses_sample_yaml() {
        let cfg: PromptConfig = serde_yaml::from_str(SAMPLE).expect("parse sample");
        assert!(cfg.system_instruction.contains("culinary analyst"));
        assert_eq!(cfg.response_schema["type"], "object");
        assert!((cfg.generation_config["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn generation_config_defaults_to_null_when_absent() {
        let yaml = "system_instruction: hi\nresponse_schema:\n  type: object\n";
        let cfg: PromptConfig = serde_yaml::from_str(yaml).expect("parse");
        assert!(cfg.generation_config.is_null());
    }

    #[test]
    fn load_fails_for_missing_file() {
        let result = load_prompt_config(Path::new("/nonexistent/prompt.yaml"));
        assert!(matches!(result, Err(ConfigError::PromptIo { .. })));
    }
}
