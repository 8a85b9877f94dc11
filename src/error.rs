//! Error types for the grader boundary.
//!
//! Scoring itself degrades to sentinel values instead of failing; these errors
//! only come from option validation and from decoding caller-supplied data.

use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, ScoringError>;

#[derive(Error, Debug)]
pub enum ScoringError {
    /// An option value is out of its valid range
    #[error("Invalid scoring config: {0}")]
    InvalidConfig(String),

    /// A JS value could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON option bag or payload could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ScoringError> for JsValue {
    fn from(err: ScoringError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
