use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

mod error;
pub mod scoring;

pub use error::{Result, ScoringError};

use scoring::aggregate::{default_duration_label, Labeler, DEFAULT_LINE_LABEL};
use scoring::config::{AggregateOptions, ScoringConfig, Visibility};
use scoring::take::{TakeInput, TakeScorer};
use scoring::types::{FrameTiming, Note, PitchSample, RhythmEvent, TakeScore};

fn decode<T: DeserializeOwned>(value: JsValue, what: &str) -> Result<T> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| ScoringError::Decode(format!("{}: {}", what, e)))
}

/// Decodes `value`, treating null/undefined as absent.
fn decode_optional<T: DeserializeOwned>(value: JsValue, what: &str) -> Result<Option<T>> {
    if value.is_null() || value.is_undefined() {
        Ok(None)
    } else {
        decode(value, what).map(Some)
    }
}

/// Encodes as plain JS objects and arrays; maps must not become `Map`s or they
/// vanish under `JSON.stringify` when the payload is persisted.
fn encode<T: Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Score one take. `line_onsets` and `options` may be null; the rhythm line
/// is only evaluated when onsets are given.
#[wasm_bindgen]
pub fn compute_take_score(
    phrase_js: JsValue,
    frame_timing_js: JsValue,
    samples_js: JsValue,
    gestures_js: JsValue,
    melody_onsets_js: JsValue,
    line_onsets_js: JsValue,
    options_js: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    let phrase: Vec<Note> = decode(phrase_js, "phrase")?;
    let timing: FrameTiming = decode_optional(frame_timing_js, "frame timing")?.unwrap_or_default();
    let samples: Vec<PitchSample> = decode(samples_js, "pitch samples")?;
    let gestures: Vec<f64> = decode_optional(gestures_js, "gesture events")?.unwrap_or_default();
    let melody_onsets: Vec<f64> = decode_optional(melody_onsets_js, "melody onsets")?.unwrap_or_default();
    let line_onsets: Option<Vec<f64>> = decode_optional(line_onsets_js, "rhythm line onsets")?;
    let config: ScoringConfig = decode_optional(options_js, "options")?.unwrap_or_default();

    let scorer = TakeScorer::new(config)?;
    let take = scorer.score(&TakeInput {
        phrase: &phrase,
        timing,
        samples: &samples,
        gesture_events: &gestures,
        melody_onsets: &melody_onsets,
        line_onsets: line_onsets.as_deref(),
    });
    encode(&take)
}

/// Harmonic-mean combination of component percentages.
#[wasm_bindgen]
pub fn finalize_score(percents: &[f64]) -> f64 {
    scoring::finalize::finalize_score_n(percents)
}

/// Display score of a take under the given visibility flags.
#[wasm_bindgen]
pub fn finalize_visible(take_js: JsValue, visibility_js: JsValue) -> std::result::Result<JsValue, JsValue> {
    let take: TakeScore = decode(take_js, "take score")?;
    let visibility: Visibility = decode_optional(visibility_js, "visibility")?.unwrap_or_default();
    encode(&scoring::finalize::finalize_visible(&take, &visibility))
}

#[wasm_bindgen]
pub fn letter_for_percent(percent: f64) -> String {
    scoring::finalize::letter_for_percent(percent).as_str().to_string()
}

/// Labeling callbacks supplied from JS. A callback that throws or returns
/// something other than a string is treated as absent for that row.
struct JsLabeler {
    duration: Option<js_sys::Function>,
    line: Option<js_sys::Function>,
}

impl Labeler for JsLabeler {
    fn duration_label(&self, dur_sec: f64) -> String {
        let Some(callback) = &self.duration else {
            return default_duration_label(dur_sec);
        };
        match callback.call1(&JsValue::NULL, &JsValue::from_f64(dur_sec)) {
            Ok(value) => value.as_string().unwrap_or_else(|| {
                warn!("Duration labeler returned a non-string for {:.3}s", dur_sec);
                default_duration_label(dur_sec)
            }),
            Err(err) => {
                warn!("Duration labeler threw for {:.3}s: {:?}", dur_sec, err);
                default_duration_label(dur_sec)
            }
        }
    }

    fn line_label(&self, event: &RhythmEvent) -> Option<String> {
        let Some(callback) = &self.line else {
            return Some(DEFAULT_LINE_LABEL.to_string());
        };
        let arg = match encode(event) {
            Ok(arg) => arg,
            Err(err) => {
                warn!("Could not encode rhythm event {}: {:?}", event.idx, err);
                return None;
            }
        };
        match callback.call1(&JsValue::NULL, &arg) {
            Ok(value) if value.is_null() || value.is_undefined() => None,
            Ok(value) => {
                let label = value.as_string();
                if label.is_none() {
                    warn!("Line labeler returned a non-string for event {}", event.idx);
                }
                label
            }
            Err(err) => {
                warn!("Line labeler threw for event {}: {:?}", event.idx, err);
                None
            }
        }
    }
}

/// Roll a session's takes into one submission payload.
#[wasm_bindgen]
pub fn aggregate_for_submission(
    takes_js: JsValue,
    visibility_js: JsValue,
    duration_label: Option<js_sys::Function>,
    line_label: Option<js_sys::Function>,
    options_js: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    let takes: Vec<TakeScore> = decode(takes_js, "take scores")?;
    let visibility: Visibility = decode_optional(visibility_js, "visibility")?.unwrap_or_default();
    let options: AggregateOptions = decode_optional(options_js, "aggregate options")?.unwrap_or_default();
    let labeler = JsLabeler {
        duration: duration_label,
        line: line_label,
    };
    let aggregate = scoring::aggregate::aggregate_for_submission(&takes, &visibility, &labeler, &options);
    encode(&aggregate)
}
