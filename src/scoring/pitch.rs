use crate::scoring::config::ScoringConfig;
use crate::scoring::helpers::{
    cents_between, cents_credit, clamp_percent, clamp_ratio, estimate_avg_dt, mean, ratio_or,
    round_to, samples_within, shape_concave, trimmed_mean_upper, voiced_midi, NO_DATA_CENTS,
};
use crate::scoring::types::{FrameTiming, Note, PerNotePitch, PitchSample, PitchScore};

/// Trimmed from the end of each note so release wobble is not penalized.
const TAIL_GRACE_SEC: f64 = 0.08;

/// Frames at or above this credit count toward a landing streak.
const LANDING_CREDIT: f64 = 0.85;
const LANDING_MIN_SEC: f64 = 0.3;
const LANDING_BONUS: f64 = 0.85;

struct NoteTally {
    row: PerNotePitch,
    had_voiced: bool,
}

fn score_note(
    idx: usize,
    note: &Note,
    samples: &[PitchSample],
    config: &ScoringConfig,
    dt: f64,
) -> NoteTally {
    let lo = note.start_sec + config.onset_grace_sec();
    let hi = note.end_sec() - TAIL_GRACE_SEC;
    let evaluated = hi - lo;

    if !(evaluated > 0.0) {
        return NoteTally {
            row: PerNotePitch {
                idx,
                midi: note.midi,
                time_on_pitch_sec: 0.0,
                evaluated_dur_sec: 0.0,
                coverage_ratio: 0.0,
                ratio: 0.0,
                landing_streak_sec: 0.0,
                cents_mae: NO_DATA_CENTS,
            },
            had_voiced: false,
        };
    }

    let mut good_sec = 0.0;
    let mut run = 0usize;
    let mut best_run = 0usize;
    let mut abs_cents: Vec<f64> = Vec::new();

    // Unvoiced frames stay in the loop with zero credit; silence inside a
    // note must cost coverage.
    for sample in samples_within(samples, lo, hi) {
        let credit = match voiced_midi(sample, config.confidence_min) {
            Some(midi) => {
                let err = cents_between(midi, note.midi).abs();
                abs_cents.push(err);
                cents_credit(err, config.cents_ok)
            }
            None => 0.0,
        };
        good_sec += credit * dt;

        if credit >= LANDING_CREDIT {
            run += 1;
            best_run = best_run.max(run);
        } else {
            run = 0;
        }
    }

    let good_sec = good_sec.min(evaluated);
    let coverage_ratio = clamp_ratio(good_sec / evaluated);
    let landing_streak_sec = best_run as f64 * dt;
    let landing_bonus = if landing_streak_sec + 1e-9 >= LANDING_MIN_SEC {
        LANDING_BONUS
    } else {
        0.0
    };
    let ratio = clamp_ratio(shape_concave(coverage_ratio).max(landing_bonus));

    NoteTally {
        row: PerNotePitch {
            idx,
            midi: note.midi,
            time_on_pitch_sec: good_sec,
            evaluated_dur_sec: evaluated,
            coverage_ratio,
            ratio,
            landing_streak_sec,
            cents_mae: trimmed_mean_upper(&abs_cents).unwrap_or(NO_DATA_CENTS),
        },
        had_voiced: !abs_cents.is_empty(),
    }
}

/// Credit-integrated pitch accuracy for every note of the phrase.
pub fn score_pitch(
    phrase: &[Note],
    samples: &[PitchSample],
    config: &ScoringConfig,
    timing: &FrameTiming,
) -> PitchScore {
    let dt = estimate_avg_dt(samples, timing);
    let tallies: Vec<NoteTally> = phrase
        .iter()
        .enumerate()
        .map(|(idx, note)| score_note(idx, note, samples, config, dt))
        .collect();

    let total_eval: f64 = tallies.iter().map(|t| t.row.evaluated_dur_sec).sum();
    let weighted: f64 = tallies
        .iter()
        .map(|t| t.row.ratio * t.row.evaluated_dur_sec)
        .sum();
    let percent = clamp_percent(round_to(ratio_or(weighted, total_eval, 0.0) * 100.0, 1));

    let voiced_maes: Vec<f64> = tallies
        .iter()
        .filter(|t| t.had_voiced)
        .map(|t| t.row.cents_mae)
        .collect();

    PitchScore {
        percent,
        time_on_pitch_sec: tallies.iter().map(|t| t.row.time_on_pitch_sec).sum(),
        cents_mae: mean(&voiced_maes).unwrap_or(NO_DATA_CENTS),
        per_note: tallies.into_iter().map(|t| t.row).collect(),
    }
}
