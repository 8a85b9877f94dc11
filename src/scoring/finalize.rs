use crate::scoring::config::Visibility;
use crate::scoring::helpers::clamp_percent;
use crate::scoring::types::{FinalScore, Letter, TakeScore};

/// Every component at or above this snaps the combined score to 100.
const SNAP_THRESHOLD: f64 = 98.0;

const LETTER_FLOORS: [(f64, Letter); 12] = [
    (97.0, Letter::APlus),
    (93.0, Letter::A),
    (90.0, Letter::AMinus),
    (87.0, Letter::BPlus),
    (83.0, Letter::B),
    (80.0, Letter::BMinus),
    (77.0, Letter::CPlus),
    (73.0, Letter::C),
    (70.0, Letter::CMinus),
    (67.0, Letter::DPlus),
    (63.0, Letter::D),
    (60.0, Letter::DMinus),
];

pub fn letter_for_percent(percent: f64) -> Letter {
    LETTER_FLOORS
        .iter()
        .find(|(floor, _)| percent >= *floor)
        .map(|(_, letter)| *letter)
        .unwrap_or(Letter::F)
}

pub fn final_score(percent: f64) -> FinalScore {
    let percent = clamp_percent(percent);
    FinalScore {
        percent,
        letter: letter_for_percent(percent),
    }
}

/// Harmonic mean of the positive components. Non-positive and NaN parts are
/// dropped rather than zeroing the result.
pub fn finalize_score_n(percents: &[f64]) -> f64 {
    let parts: Vec<f64> = percents
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();
    if parts.is_empty() {
        return 0.0;
    }
    if parts.iter().all(|p| *p >= SNAP_THRESHOLD) {
        return 100.0;
    }
    let inverse_sum: f64 = parts.iter().map(|p| 1.0 / p).sum();
    clamp_percent(parts.len() as f64 / inverse_sum)
}

/// Components shown to the learner under `visibility`.
pub fn visible_components(take: &TakeScore, visibility: &Visibility) -> Vec<f64> {
    let mut parts = Vec::with_capacity(3);
    if visibility.show_pitch {
        parts.push(take.pitch.percent);
    }
    if visibility.show_melody_rhythm {
        parts.push(take.rhythm.melody.percent);
    }
    if visibility.show_rhythm_line {
        if let Some(line) = &take.rhythm.line {
            parts.push(line.percent);
        }
    }
    parts
}

/// Display score for one take: a fresh harmonic mean over the visible tracks.
pub fn finalize_visible(take: &TakeScore, visibility: &Visibility) -> FinalScore {
    final_score(finalize_score_n(&visible_components(take, visibility)))
}
