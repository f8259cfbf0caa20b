//! Wire types for the `generateContent` response envelope and the strict
//! shape of the extracted recipe payload.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Extracted recipe — the model's structured output
// ---------------------------------------------------------------------------

/// The structured recipe extracted from a transcript.
///
/// Field names follow the response schema the model is constrained to
/// (`basic_info`, `step_number`, ...). `title` is the one hard requirement;
/// everything else degrades to empty/absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecipe {
    pub basic_info: ExtractedBasicInfo,
    #[serde(default)]
    pub metadata: ExtractedMetadata,
    #[serde(default)]
    pub ingredients: Vec<ExtractedIngredient>,
    #[serde(default)]
    pub steps: Vec<ExtractedStep>,
    #[serde(default)]
    pub nutrition: Option<ExtractedNutrition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedBasicInfo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Estimated cooking time in minutes.
    #[serde(default)]
    pub estimated_time: Option<i32>,
    #[serde(default)]
    pub servings: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedIngredient {
    pub name: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedStep {
    pub step_number: i32,
    pub summary: String,
    #[serde(default)]
    pub start_time_seconds: Option<f64>,
    #[serde(default)]
    pub end_time_seconds: Option<f64>,
    #[serde(default)]
    pub techniques: Option<Vec<String>>,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedNutrition {
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbohydrates: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub fiber: Option<f64>,
    #[serde(default)]
    pub sodium: Option<f64>,
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}
