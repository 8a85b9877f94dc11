//! Statistics primitives and credit curves shared by the scorers.

use std::f64::consts::PI;

use crate::scoring::types::{FrameTiming, PitchSample};

/// Cents error at which pitch credit reaches zero.
pub const CENTS_CEILING: f64 = 240.0;

/// Reported MAE when a note has no usable voiced frames.
pub const NO_DATA_CENTS: f64 = 120.0;

/// Consecutive-sample gaps longer than this are detector dropouts, not frames.
const MAX_FRAME_GAP_SEC: f64 = 0.25;

const FALLBACK_FRAME_SEC: f64 = 1.0 / 60.0;

pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        return lo;
    }
    x.max(lo).min(hi)
}

pub fn clamp_percent(x: f64) -> f64 {
    clamp(x, 0.0, 100.0)
}

pub fn clamp_ratio(x: f64) -> f64 {
    clamp(x, 0.0, 1.0)
}

pub fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Numerator over denominator, or `fallback` when the denominator is not positive.
pub fn ratio_or(num: f64, den: f64, fallback: f64) -> f64 {
    if den > 0.0 && den.is_finite() {
        num / den
    } else {
        fallback
    }
}

pub fn hz_to_midi(hz: f64) -> f64 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

pub fn cents_between(sung_midi: f64, target_midi: f64) -> f64 {
    (sung_midi - target_midi) * 100.0
}

/// Fractional MIDI pitch of a sample, or None when it is unvoiced or below
/// the confidence floor.
pub fn voiced_midi(sample: &PitchSample, confidence_min: f64) -> Option<f64> {
    match sample.hz {
        Some(hz) if hz > 0.0 && hz.is_finite() && sample.confidence >= confidence_min => {
            Some(hz_to_midi(hz))
        }
        _ => None,
    }
}

/// 1 at or below `full`, 0 at or beyond `zero`, raised-cosine in between.
pub fn cosine_falloff(err: f64, full: f64, zero: f64) -> f64 {
    let err = err.abs();
    if err <= full {
        return 1.0;
    }
    if err >= zero {
        return 0.0;
    }
    let t = (err - full) / (zero - full);
    0.5 * (1.0 + (PI * t).cos())
}

pub fn cents_credit(cents_err: f64, cents_ok: f64) -> f64 {
    cosine_falloff(cents_err, cents_ok, CENTS_CEILING)
}

pub fn timing_credit(err_ms: f64, good_align_ms: f64, max_align_ms: f64) -> f64 {
    cosine_falloff(err_ms, good_align_ms, max_align_ms)
}

/// Shapes a coverage ratio so partial coverage earns more than linear credit.
pub fn shape_concave(r: f64) -> f64 {
    let r = clamp_ratio(r);
    1.0 - (1.0 - r) * (1.0 - r)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean after discarding the upper quartile of values.
pub fn trimmed_mean_upper(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let keep = sorted.len() - sorted.len() / 4;
    mean(&sorted[..keep])
}

/// Sorted-array median; NaN for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Average spacing between consecutive samples, ignoring dropout gaps.
/// Falls back to the detector's nominal frame interval.
pub fn estimate_avg_dt(samples: &[PitchSample], timing: &FrameTiming) -> f64 {
    mean_frame_gap(samples.iter()).unwrap_or_else(|| timing.nominal_frame_sec())
}

/// Mean positive gap between consecutive samples, skipping dropouts. None
/// when no usable gap exists.
pub fn mean_frame_gap<'a>(samples: impl IntoIterator<Item = &'a PitchSample>) -> Option<f64> {
    let mut prev: Option<f64> = None;
    let mut gaps: Vec<f64> = Vec::new();
    for sample in samples {
        if let Some(p) = prev {
            let dt = sample.time_sec - p;
            if dt > 0.0 && dt <= MAX_FRAME_GAP_SEC {
                gaps.push(dt);
            }
        }
        prev = Some(sample.time_sec);
    }
    mean(&gaps)
}

impl FrameTiming {
    pub fn nominal_frame_sec(&self) -> f64 {
        let dt = self.hop_size as f64 / self.sample_rate;
        if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            FALLBACK_FRAME_SEC
        }
    }
}

/// Samples with `lo <= time_sec <= hi`.
pub fn samples_within(samples: &[PitchSample], lo: f64, hi: f64) -> impl Iterator<Item = &PitchSample> {
    samples
        .iter()
        .filter(move |s| s.time_sec >= lo && s.time_sec <= hi)
}

/// Samples with `lo <= time_sec < hi`, so adjacent spans never share a sample.
pub fn samples_in_span(samples: &[PitchSample], lo: f64, hi: f64) -> impl Iterator<Item = &PitchSample> {
    samples
        .iter()
        .filter(move |s| s.time_sec >= lo && s.time_sec < hi)
}
