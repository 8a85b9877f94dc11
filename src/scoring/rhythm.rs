//! Coverage-based rhythm scoring for the melodic line.
//!
//! A note is "on time" when any voicing shows up inside its window; pitch is
//! ignored here. This is a weaker signal than the hand-line alignment in
//! `hand_line`, and the two are not cross-checked.

use crate::scoring::config::ScoringConfig;
use crate::scoring::helpers::{
    clamp_percent, clamp_ratio, estimate_avg_dt, mean, mean_frame_gap, ratio_or, round_to,
    samples_within, voiced_midi,
};
use crate::scoring::types::{FrameTiming, MelodyRhythmScore, Note, PerNoteRhythm, PitchSample};

/// Fewer samples than this in a window and the global frame interval is used.
const MIN_LOCAL_SAMPLES: usize = 3;

fn score_note(
    idx: usize,
    note: &Note,
    onset_ref: f64,
    samples: &[PitchSample],
    config: &ScoringConfig,
    global_dt: f64,
) -> PerNoteRhythm {
    let lo = note.start_sec + config.onset_grace_sec();
    let hi = note.end_sec();
    let evaluated = hi - lo;
    if !(evaluated > 0.0) {
        return PerNoteRhythm {
            idx,
            evaluated_dur_sec: 0.0,
            window_sec: Some(evaluated),
            voiced_sec: 0.0,
            coverage: 0.0,
            onset_err_ms: None,
        };
    }

    let window: Vec<&PitchSample> = samples_within(samples, lo, hi).collect();
    let mut voiced = 0usize;
    let mut first_voiced: Option<f64> = None;
    for sample in &window {
        if voiced_midi(sample, config.confidence_min).is_some() {
            voiced += 1;
            first_voiced.get_or_insert(sample.time_sec);
        }
    }

    // Spacing of the frames actually inside the window, so stretches with no
    // frames never count as voiced.
    let local_dt = if window.len() >= MIN_LOCAL_SAMPLES {
        mean_frame_gap(window.iter().copied()).unwrap_or(global_dt)
    } else {
        global_dt
    };
    let voiced_sec = (voiced as f64 * local_dt).min(evaluated);

    PerNoteRhythm {
        idx,
        evaluated_dur_sec: evaluated,
        window_sec: Some(evaluated),
        voiced_sec,
        coverage: clamp_ratio(voiced_sec / evaluated),
        onset_err_ms: first_voiced.map(|t| (t - onset_ref) * 1000.0),
    }
}

/// Melody onset coverage. `melody_onsets`, when it has one entry per note,
/// replaces the notated starts as the reference for onset error.
pub fn score_melody_rhythm(
    phrase: &[Note],
    samples: &[PitchSample],
    melody_onsets: &[f64],
    config: &ScoringConfig,
    timing: &FrameTiming,
) -> MelodyRhythmScore {
    let global_dt = estimate_avg_dt(samples, timing);
    let use_onsets = !melody_onsets.is_empty() && melody_onsets.len() == phrase.len();

    let per_note: Vec<PerNoteRhythm> = phrase
        .iter()
        .enumerate()
        .map(|(idx, note)| {
            let onset_ref = if use_onsets {
                melody_onsets[idx]
            } else {
                note.start_sec
            };
            score_note(idx, note, onset_ref, samples, config, global_dt)
        })
        .collect();

    let total_eval: f64 = per_note.iter().map(|r| r.evaluated_dur_sec).sum();
    let total_voiced: f64 = per_note.iter().map(|r| r.voiced_sec).sum();
    let hits = per_note.iter().filter(|r| r.is_hit()).count() as u32;
    let attempts = per_note.len() as u32;
    let abs_errs: Vec<f64> = per_note
        .iter()
        .filter_map(|r| r.onset_err_ms.map(f64::abs))
        .collect();

    MelodyRhythmScore {
        percent: clamp_percent(round_to(ratio_or(total_voiced, total_eval, 0.0) * 100.0, 1)),
        attempts,
        hits,
        hit_rate: clamp_ratio(ratio_or(hits as f64, attempts as f64, 0.0)),
        mean_abs_err_ms: mean(&abs_errs).unwrap_or(config.max_align_ms),
        per_note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(start: f64, dur: f64) -> Note {
        Note {
            start_sec: start,
            dur_sec: dur,
            midi: 60.0,
        }
    }

    fn frames(from: f64, to: f64, voiced: bool) -> Vec<PitchSample> {
        let n = ((to - from) / 0.02).round() as usize;
        (0..n)
            .map(|i| {
                let t = from + i as f64 * 0.02;
                if voiced {
                    PitchSample::voiced(t, 220.0, 1.0)
                } else {
                    PitchSample::unvoiced(t)
                }
            })
            .collect()
    }

    #[test]
    fn test_fully_voiced_note() {
        let phrase = vec![note(0.0, 1.0)];
        let samples = frames(0.0, 1.0, true);
        let result = score_melody_rhythm(&phrase, &samples, &[], &ScoringConfig::default(), &FrameTiming::default());
        assert!(result.percent > 99.0);
        assert_eq!(result.hits, 1);
        assert_eq!(result.hit_rate, 1.0);
        let err = result.per_note[0].onset_err_ms.unwrap();
        assert!((err - 120.0).abs() < 1.0, "first voiced frame sits at the grace edge, got {}", err);
    }

    #[test]
    fn test_silent_note_is_miss_with_sentinel_error() {
        let phrase = vec![note(0.0, 1.0)];
        let samples = frames(0.0, 1.0, false);
        let result = score_melody_rhythm(&phrase, &samples, &[], &ScoringConfig::default(), &FrameTiming::default());
        assert_eq!(result.percent, 0.0);
        assert_eq!(result.hits, 0);
        assert_eq!(result.per_note[0].onset_err_ms, None);
        assert_eq!(result.mean_abs_err_ms, 250.0);
    }

    #[test]
    fn test_late_entry_partial_coverage() {
        let phrase = vec![note(0.0, 1.0)];
        let mut samples = frames(0.0, 0.5, false);
        samples.extend(frames(0.5, 1.0, true));
        let result = score_melody_rhythm(&phrase, &samples, &[], &ScoringConfig::default(), &FrameTiming::default());
        let row = &result.per_note[0];
        assert!(row.coverage > 0.5 && row.coverage < 0.7, "got {}", row.coverage);
        assert!((row.onset_err_ms.unwrap() - 500.0).abs() < 1.0);
    }

    #[test]
    fn test_coverage_monotone_when_adding_voiced_frames() {
        let phrase = vec![note(0.0, 1.0)];
        let mut samples = frames(0.0, 0.6, false);
        samples.extend(frames(0.6, 1.0, true));
        let config = ScoringConfig::default();
        let before = score_melody_rhythm(&phrase, &samples, &[], &config, &FrameTiming::default());

        let mut denser = samples.clone();
        for i in 0..10 {
            denser.push(PitchSample::voiced(0.71 + i as f64 * 0.02, 220.0, 1.0));
        }
        denser.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec));
        let after = score_melody_rhythm(&phrase, &denser, &[], &config, &FrameTiming::default());
        assert!(after.per_note[0].coverage >= before.per_note[0].coverage);
    }

    #[test]
    fn test_sparse_window_uses_global_interval() {
        let phrase = vec![note(0.0, 1.0)];
        let samples = vec![
            PitchSample::voiced(0.5, 220.0, 1.0),
            PitchSample::voiced(0.6, 220.0, 1.0),
        ];
        let result = score_melody_rhythm(&phrase, &samples, &[], &ScoringConfig::default(), &FrameTiming::default());
        let row = &result.per_note[0];
        assert!((row.voiced_sec - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_few_late_frames_give_low_coverage() {
        let phrase = vec![note(0.0, 1.0)];
        let samples: Vec<PitchSample> = [0.90, 0.92, 0.94]
            .iter()
            .map(|&t| PitchSample::voiced(t, 220.0, 1.0))
            .collect();
        let result = score_melody_rhythm(&phrase, &samples, &[], &ScoringConfig::default(), &FrameTiming::default());
        let row = &result.per_note[0];
        assert!((row.voiced_sec - 0.06).abs() < 1e-9, "got {}", row.voiced_sec);
        assert!(row.coverage < 0.1, "got {}", row.coverage);
        assert!(result.percent < 10.0);
        assert!(row.is_hit());
    }

    #[test]
    fn test_short_note_keeps_negative_window() {
        let phrase = vec![note(0.0, 0.05)];
        let result = score_melody_rhythm(&phrase, &[], &[], &ScoringConfig::default(), &FrameTiming::default());
        let row = &result.per_note[0];
        assert_eq!(row.evaluated_dur_sec, 0.0);
        assert!((row.window_sec.unwrap() + 0.07).abs() < 1e-9);
        assert!((row.graced_dur_sec(0.12) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_melody_onsets_replace_notated_starts() {
        let phrase = vec![note(0.0, 1.0), note(1.0, 1.0)];
        let samples = frames(0.0, 2.0, true);
        let onsets = [0.05, 1.05];
        let result = score_melody_rhythm(&phrase, &samples, &onsets, &ScoringConfig::default(), &FrameTiming::default());
        let err = result.per_note[1].onset_err_ms.unwrap();
        assert!((err - 70.0).abs() < 1.0, "got {}", err);

        // A mismatched onset list is ignored.
        let ignored = score_melody_rhythm(&phrase, &samples, &[0.05], &ScoringConfig::default(), &FrameTiming::default());
        assert!((ignored.per_note[1].onset_err_ms.unwrap() - 120.0).abs() < 1.0);
    }

    #[test]
    fn test_zero_window_is_not_a_hit() {
        let phrase = vec![note(0.0, 0.1)];
        let samples = frames(0.0, 0.1, true);
        let result = score_melody_rhythm(&phrase, &samples, &[], &ScoringConfig::default(), &FrameTiming::default());
        assert_eq!(result.per_note[0].coverage, 0.0);
        assert_eq!(result.hits, 0);
        assert_eq!(result.percent, 0.0);
    }
}
