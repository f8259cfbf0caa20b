//! Client for the Gemini `generateContent` API.
//!
//! chefclip uses Gemini as a structured-extraction engine: the request
//! carries a timestamped transcript plus a fixed system instruction and JSON
//! response schema, and the response is parsed strictly into
//! [`ExtractedRecipe`]. A payload that does not match the schema is an
//! error, never a partially-populated value.

mod client;
mod error;
mod types;

pub use client::{format_transcript_lines, ExtractionRequest, GeminiClient};
pub use error::GeminiError;
pub use types::{
    ExtractedBasicInfo, ExtractedIngredient, ExtractedMetadata, ExtractedNutrition,
    ExtractedRecipe, ExtractedStep,
};
