use crate::scoring::config::ScoringConfig;
use crate::scoring::helpers::{clamp_percent, clamp_ratio, median, ratio_or, samples_in_span, voiced_midi};
use crate::scoring::types::{IntervalClass, IntervalScore, Note, PitchSample};

pub const INTERVAL_CLASS_COUNT: usize = 13;

/// Sung interval error allowed for a correct interval.
const INTERVAL_TOLERANCE_CENTS: f64 = 50.0;

const INTERVAL_LABELS: [&str; INTERVAL_CLASS_COUNT] = [
    "Unison", "m2", "M2", "m3", "M3", "P4", "Tritone", "P5", "m6", "M6", "m7", "M7", "Octave",
];

pub fn interval_label(semitones: u8) -> &'static str {
    INTERVAL_LABELS[(semitones as usize).min(INTERVAL_CLASS_COUNT - 1)]
}

/// Bucket for an expected interval: rounded absolute semitones, capped at an octave.
pub fn interval_bucket(expected_semitones: f64) -> u8 {
    expected_semitones.abs().round().min(12.0) as u8
}

/// Running totals for one semitone class.
#[derive(Clone, Debug, Default)]
pub struct ClassTally {
    pub attempts: u32,
    pub correct: u32,
    pub abs_err_sum: f64,
}

impl ClassTally {
    pub fn record(&mut self, err_cents: f64) {
        self.attempts += 1;
        if err_cents.abs() <= INTERVAL_TOLERANCE_CENTS {
            self.correct += 1;
        }
        self.abs_err_sum += err_cents.abs();
    }

    pub fn merge(&mut self, class: &IntervalClass) {
        self.attempts += class.attempts;
        self.correct += class.correct;
        self.abs_err_sum += class.mean_abs_err_cents * class.attempts as f64;
    }

    pub fn to_class(&self, semitones: u8) -> IntervalClass {
        IntervalClass {
            semitones,
            label: interval_label(semitones).to_string(),
            attempts: self.attempts,
            correct: self.correct,
            percent: clamp_percent(ratio_or(self.correct as f64, self.attempts as f64, 0.0) * 100.0),
            mean_abs_err_cents: ratio_or(self.abs_err_sum, self.attempts as f64, 0.0),
        }
    }
}

/// Turns 13 class tallies into a score. No attempts counts as all correct.
pub fn interval_score_from(tallies: &[ClassTally; INTERVAL_CLASS_COUNT]) -> IntervalScore {
    let total: u32 = tallies.iter().map(|t| t.attempts).sum();
    let correct: u32 = tallies.iter().map(|t| t.correct).sum();
    IntervalScore {
        total,
        correct,
        correct_ratio: clamp_ratio(ratio_or(correct as f64, total as f64, 1.0)),
        classes: tallies
            .iter()
            .enumerate()
            .map(|(semitones, t)| t.to_class(semitones as u8))
            .collect(),
    }
}

fn median_midi(note: &Note, samples: &[PitchSample], confidence_min: f64) -> f64 {
    let midis: Vec<f64> = samples_in_span(samples, note.start_sec, note.end_sec())
        .filter_map(|s| voiced_midi(s, confidence_min))
        .collect();
    median(&midis)
}

/// Sung-vs-notated interval accuracy for each adjacent note pair.
pub fn score_intervals(phrase: &[Note], samples: &[PitchSample], config: &ScoringConfig) -> IntervalScore {
    let mut tallies: [ClassTally; INTERVAL_CLASS_COUNT] = Default::default();
    let medians: Vec<f64> = phrase
        .iter()
        .map(|note| median_midi(note, samples, config.confidence_min))
        .collect();

    for i in 1..phrase.len() {
        let (prev, curr) = (medians[i - 1], medians[i]);
        if prev.is_nan() || curr.is_nan() {
            continue;
        }
        let expected = phrase[i].midi - phrase[i - 1].midi;
        let sung = curr - prev;
        let err_cents = 100.0 * (sung - expected);
        tallies[interval_bucket(expected) as usize].record(err_cents);
    }

    interval_score_from(&tallies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(start: f64, midi: f64) -> Note {
        Note {
            start_sec: start,
            dur_sec: 0.5,
            midi,
        }
    }

    fn hold(start: f64, midi: f64) -> Vec<PitchSample> {
        let hz = 440.0 * 2f64.powf((midi - 69.0) / 12.0);
        (0..20)
            .map(|i| PitchSample::voiced(start + 0.01 + i as f64 * 0.02, hz, 1.0))
            .collect()
    }

    #[test]
    fn test_boundary_sample_belongs_to_next_note() {
        let at = |t: f64, midi: f64| PitchSample::voiced(t, 440.0 * 2f64.powf((midi - 69.0) / 12.0), 1.0);
        let samples = vec![at(0.25, 60.0), at(0.5, 62.0), at(0.75, 62.0)];
        let result = score_intervals(&[note(0.0, 60.0), note(0.5, 62.0)], &samples, &ScoringConfig::default());
        assert_eq!(result.total, 1);
        assert_eq!(result.correct, 1);
        assert!(result.classes[2].mean_abs_err_cents < 1.0);
    }

    #[test]
    fn test_single_note_is_vacuously_perfect() {
        let result = score_intervals(&[note(0.0, 60.0)], &hold(0.0, 60.0), &ScoringConfig::default());
        assert_eq!(result.total, 0);
        assert_eq!(result.correct_ratio, 1.0);
        assert_eq!(result.classes.len(), 13);
        assert!(result.classes.iter().all(|c| c.attempts == 0));

        let empty = score_intervals(&[], &[], &ScoringConfig::default());
        assert_eq!(empty.total, 0);
        assert_eq!(empty.correct_ratio, 1.0);
    }

    #[test]
    fn test_transposed_but_correct_interval() {
        // Sung a whole tone low throughout: intervals still correct.
        let phrase = vec![note(0.0, 60.0), note(0.5, 64.0), note(1.0, 67.0)];
        let mut samples = hold(0.0, 58.0);
        samples.extend(hold(0.5, 62.0));
        samples.extend(hold(1.0, 65.0));
        let result = score_intervals(&phrase, &samples, &ScoringConfig::default());
        assert_eq!(result.total, 2);
        assert_eq!(result.correct, 2);
        assert_eq!(result.classes[4].attempts, 1); // M3
        assert_eq!(result.classes[3].attempts, 1); // m3
        assert_eq!(result.classes[4].label, "M3");
    }

    #[test]
    fn test_wrong_interval_counts_attempt() {
        let phrase = vec![note(0.0, 60.0), note(0.5, 67.0)];
        let mut samples = hold(0.0, 60.0);
        samples.extend(hold(0.5, 66.0));
        let result = score_intervals(&phrase, &samples, &ScoringConfig::default());
        assert_eq!(result.total, 1);
        assert_eq!(result.correct, 0);
        assert_eq!(result.correct_ratio, 0.0);
        let p5 = &result.classes[7];
        assert_eq!(p5.attempts, 1);
        assert!((p5.mean_abs_err_cents - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_unvoiced_note_skips_pair() {
        let phrase = vec![note(0.0, 60.0), note(0.5, 62.0), note(1.0, 64.0)];
        let mut samples = hold(0.0, 60.0);
        samples.extend(hold(1.0, 64.0));
        let result = score_intervals(&phrase, &samples, &ScoringConfig::default());
        assert_eq!(result.total, 0);
        assert_eq!(result.correct_ratio, 1.0);
    }

    #[test]
    fn test_wide_leaps_cap_at_octave() {
        assert_eq!(interval_bucket(19.0), 12);
        assert_eq!(interval_bucket(-7.2), 7);
        assert_eq!(interval_label(12), "Octave");
        assert_eq!(interval_label(0), "Unison");
    }
}
