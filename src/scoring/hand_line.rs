//! Hand-line rhythm scoring.
//!
//! Detected taps are aligned to the expected rhythm-line onsets with a
//! dynamic program that allows each onset and each tap to be used at most
//! once and never lets two matches cross in time. A greedy nearest-tap
//! matcher cannot guarantee either when onsets are close together.

use crate::scoring::config::ScoringConfig;
use crate::scoring::helpers::{clamp_percent, clamp_ratio, mean, ratio_or, round_to, timing_credit};
use crate::scoring::types::{LineRhythmScore, RhythmEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Start,
    Match,
    SkipEvent,
    SkipExpected,
}

/// Pairs of (expected index, tap index) on the best monotonic alignment.
fn align(expected: &[f64], taps: &[f64], config: &ScoringConfig) -> Vec<(usize, usize, f64)> {
    let n = expected.len();
    let m = taps.len();
    let width = m + 1;
    let mut score = vec![0.0f64; (n + 1) * width];
    let mut step = vec![Step::Start; (n + 1) * width];

    for j in 1..=m {
        step[j] = Step::SkipEvent;
    }
    for i in 1..=n {
        step[i * width] = Step::SkipExpected;
    }

    for i in 1..=n {
        for j in 1..=m {
            let err_ms = (taps[j - 1] - expected[i - 1]).abs() * 1000.0;
            let matched = if err_ms <= config.max_align_ms {
                score[(i - 1) * width + j - 1]
                    + timing_credit(err_ms, config.good_align_ms, config.max_align_ms)
            } else {
                f64::NEG_INFINITY
            };
            let skip_event = score[i * width + j - 1];
            let skip_expected = score[(i - 1) * width + j];

            // Ties prefer match, then skipping the tap, then skipping the onset.
            let (best, choice) = if matched >= skip_event && matched >= skip_expected {
                (matched, Step::Match)
            } else if skip_event >= skip_expected {
                (skip_event, Step::SkipEvent)
            } else {
                (skip_expected, Step::SkipExpected)
            };
            score[i * width + j] = best;
            step[i * width + j] = choice;
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        match step[i * width + j] {
            Step::Match => {
                let err_ms = (taps[j - 1] - expected[i - 1]) * 1000.0;
                pairs.push((i - 1, j - 1, err_ms));
                i -= 1;
                j -= 1;
            }
            Step::SkipEvent => j -= 1,
            Step::SkipExpected => i -= 1,
            Step::Start => break,
        }
    }
    pairs.reverse();
    pairs
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Score detected taps against the expected rhythm-line onsets. Every
/// expected onset yields exactly one row; unmatched onsets have no tap.
/// Non-finite onsets cannot be aligned and come last as unmatched rows.
pub fn score_hand_line(
    expected_onsets: &[f64],
    gesture_events: &[f64],
    config: &ScoringConfig,
) -> LineRhythmScore {
    let expected = sorted(expected_onsets);
    let taps = sorted(gesture_events);
    let unusable = expected_onsets.iter().copied().filter(|v| !v.is_finite());

    let mut events: Vec<RhythmEvent> = expected
        .iter()
        .copied()
        .chain(unusable)
        .enumerate()
        .map(|(idx, expected_sec)| RhythmEvent {
            idx,
            expected_sec,
            tapped_sec: None,
            err_ms: None,
            credit: 0.0,
            hit: false,
        })
        .collect();

    for (ei, ti, err_ms) in align(&expected, &taps, config) {
        let row = &mut events[ei];
        row.tapped_sec = Some(taps[ti]);
        row.err_ms = Some(err_ms);
        row.credit = clamp_ratio(timing_credit(err_ms, config.good_align_ms, config.max_align_ms));
        row.hit = err_ms.abs() <= config.max_align_ms;
    }

    let attempts = events.len() as u32;
    let hit_errs: Vec<f64> = events
        .iter()
        .filter(|e| e.hit)
        .filter_map(|e| e.err_ms.map(f64::abs))
        .collect();
    let hits = hit_errs.len() as u32;
    let credits: Vec<f64> = events.iter().map(|e| e.credit).collect();

    LineRhythmScore {
        percent: clamp_percent(round_to(mean(&credits).unwrap_or(0.0) * 100.0, 1)),
        attempts,
        hits,
        hit_rate: clamp_ratio(ratio_or(hits as f64, attempts as f64, 0.0)),
        mean_abs_err_ms: mean(&hit_errs).unwrap_or(config.max_align_ms),
        events,
    }
}
