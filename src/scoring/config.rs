use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};
use crate::scoring::helpers::CENTS_CEILING;

/// Options shared by every scorer for one take. Missing fields in a decoded
/// option bag take their defaults.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub confidence_min: f64,
    pub cents_ok: f64,
    pub onset_grace_ms: f64,
    pub max_align_ms: f64,
    pub good_align_ms: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            confidence_min: 0.0,
            cents_ok: 50.0,
            onset_grace_ms: 120.0,
            max_align_ms: 250.0,
            good_align_ms: 120.0,
        }
    }
}

impl ScoringConfig {
    /// Decode a JSON option bag and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ScoringConfig = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self> {
        let fields = [
            ("confidence_min", self.confidence_min),
            ("cents_ok", self.cents_ok),
            ("onset_grace_ms", self.onset_grace_ms),
            ("max_align_ms", self.max_align_ms),
            ("good_align_ms", self.good_align_ms),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidConfig(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.max_align_ms <= 0.0 {
            return Err(ScoringError::InvalidConfig(
                "max_align_ms must be positive".to_string(),
            ));
        }
        if self.good_align_ms > self.max_align_ms {
            return Err(ScoringError::InvalidConfig(format!(
                "good_align_ms ({}) exceeds max_align_ms ({})",
                self.good_align_ms, self.max_align_ms
            )));
        }
        if self.cents_ok >= CENTS_CEILING {
            return Err(ScoringError::InvalidConfig(format!(
                "cents_ok must be below {} cents",
                CENTS_CEILING
            )));
        }
        Ok(self)
    }

    pub fn onset_grace_sec(&self) -> f64 {
        self.onset_grace_ms / 1000.0
    }
}

fn visible() -> bool {
    true
}

/// Which tracks a learner is shown. Hidden tracks are still computed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Visibility {
    #[serde(default = "visible")]
    pub show_pitch: bool,
    #[serde(default = "visible")]
    pub show_melody_rhythm: bool,
    #[serde(default = "visible")]
    pub show_rhythm_line: bool,
    #[serde(default = "visible")]
    pub show_intervals: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility {
            show_pitch: true,
            show_melody_rhythm: true,
            show_rhythm_line: true,
            show_intervals: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct AggregateOptions {
    /// Fallback grace for takes that did not record their own.
    pub onset_grace_ms: f64,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            onset_grace_ms: 120.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ScoringConfig::default().validate().unwrap();
        assert_eq!(config.cents_ok, 50.0);
        assert_eq!(config.max_align_ms, 250.0);
        assert!((config.onset_grace_sec() - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = ScoringConfig::from_json(r#"{"cents_ok": 35.0}"#).unwrap();
        assert_eq!(config.cents_ok, 35.0);
        assert_eq!(config.onset_grace_ms, 120.0);
        assert_eq!(config.good_align_ms, 120.0);
    }

    #[test]
    fn test_rejects_inverted_alignment_windows() {
        let config = ScoringConfig {
            good_align_ms: 300.0,
            ..ScoringConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScoringError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite_and_ceiling() {
        let nan = ScoringConfig {
            confidence_min: f64::NAN,
            ..ScoringConfig::default()
        };
        assert!(nan.validate().is_err());
        let wide = ScoringConfig {
            cents_ok: 240.0,
            ..ScoringConfig::default()
        };
        assert!(wide.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            ScoringConfig::from_json("{not json"),
            Err(ScoringError::Json(_))
        ));
    }

    #[test]
    fn test_visibility_defaults_visible() {
        let vis: Visibility = serde_json::from_str(r#"{"show_rhythm_line": false}"#).unwrap();
        assert!(vis.show_pitch);
        assert!(vis.show_melody_rhythm);
        assert!(!vis.show_rhythm_line);
        assert!(vis.show_intervals);
    }
}
