//! Session rollup of every take into one submission payload.
//!
//! Counters are summed across takes before rates are derived, so a take with
//! many notes weighs more than a short one. Label tables only ever contain
//! labels that received at least one attempt; the interval class table always
//! carries all 13 classes.

use std::collections::BTreeMap;

use log::debug;

use crate::error::Result;
use crate::scoring::config::{AggregateOptions, Visibility};
use crate::scoring::finalize::{final_score, finalize_visible};
use crate::scoring::helpers::{clamp_percent, clamp_ratio, mean, ratio_or, round_to};
use crate::scoring::intervals::{interval_score_from, ClassTally, INTERVAL_CLASS_COUNT};
use crate::scoring::types::{
    IntervalClass, LabelRollup, MidiPitchStats, PerNoteRhythm, RhythmEvent, SubmissionAggregate,
    SubmissionIntervals, SubmissionPitch, SubmissionRhythm, TakeScore,
};

const PERCENT_DECIMALS: i32 = 2;
const RATIO_DECIMALS: i32 = 5;

fn round_percent(x: f64) -> f64 {
    round_to(clamp_percent(x), PERCENT_DECIMALS)
}

fn round_ratio(x: f64) -> f64 {
    round_to(clamp_ratio(x), RATIO_DECIMALS)
}

/// Maps rows to the labels they are grouped under.
pub trait Labeler {
    /// Label for a note of the given nominal duration in seconds.
    fn duration_label(&self, dur_sec: f64) -> String;

    /// Label for a rhythm-line event, or None to leave it out of the rollup.
    fn line_label(&self, event: &RhythmEvent) -> Option<String>;
}

/// Labels durations by their rounded length and puts every line event under
/// one label.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLabeler;

pub const DEFAULT_LINE_LABEL: &str = "Line";

pub fn default_duration_label(dur_sec: f64) -> String {
    format!("{:.2}s", dur_sec)
}

impl Labeler for DefaultLabeler {
    fn duration_label(&self, dur_sec: f64) -> String {
        default_duration_label(dur_sec)
    }

    fn line_label(&self, _event: &RhythmEvent) -> Option<String> {
        Some(DEFAULT_LINE_LABEL.to_string())
    }
}

/// Labeler built from a pair of closures.
pub struct FnLabeler<D, L> {
    pub duration: D,
    pub line: L,
}

impl<D, L> Labeler for FnLabeler<D, L>
where
    D: Fn(f64) -> String,
    L: Fn(&RhythmEvent) -> Option<String>,
{
    fn duration_label(&self, dur_sec: f64) -> String {
        (self.duration)(dur_sec)
    }

    fn line_label(&self, event: &RhythmEvent) -> Option<String> {
        (self.line)(event)
    }
}

/// Where a take's per-duration melody rows come from.
#[derive(Clone, Copy, Debug)]
pub enum RollupSource<'a> {
    /// Rows grouped upstream, merged as-is.
    Aggregated(&'a [LabelRollup]),
    /// Per-note rows, labeled here.
    PerNote(&'a [PerNoteRhythm]),
}

impl<'a> RollupSource<'a> {
    pub fn for_take(take: &'a TakeScore) -> Self {
        match &take.melody_rollup {
            Some(rows) => RollupSource::Aggregated(rows),
            None => RollupSource::PerNote(&take.rhythm.melody.per_note),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct RollupTally {
    attempts: u32,
    hits: u32,
    credit_sum: f64,
}

impl RollupTally {
    fn record(&mut self, hit: bool, credit: f64) {
        self.attempts += 1;
        if hit {
            self.hits += 1;
        }
        self.credit_sum += clamp_ratio(credit);
    }

    fn merge(&mut self, row: &LabelRollup) {
        self.attempts += row.attempts;
        self.hits += row.hits;
        self.credit_sum += clamp_percent(row.percent) / 100.0 * row.attempts as f64;
    }

    fn to_rollup(&self, label: &str) -> LabelRollup {
        let attempts = self.attempts as f64;
        LabelRollup {
            label: label.to_string(),
            attempts: self.attempts,
            hits: self.hits,
            hit_rate: round_ratio(ratio_or(self.hits as f64, attempts, 0.0)),
            percent: round_percent(ratio_or(self.credit_sum, attempts, 0.0) * 100.0),
        }
    }
}

fn finish_table(tallies: BTreeMap<String, RollupTally>) -> BTreeMap<String, LabelRollup> {
    tallies
        .into_iter()
        .filter(|(_, t)| t.attempts > 0)
        .map(|(label, t)| {
            let row = t.to_rollup(&label);
            (label, row)
        })
        .collect()
}

fn add_melody_rows(
    table: &mut BTreeMap<String, RollupTally>,
    source: RollupSource,
    grace_sec: f64,
    labeler: &dyn Labeler,
) {
    match source {
        RollupSource::Aggregated(rows) => {
            for row in rows.iter().filter(|r| r.attempts > 0) {
                table.entry(row.label.clone()).or_default().merge(row);
            }
        }
        RollupSource::PerNote(rows) => {
            for row in rows {
                let label = labeler.duration_label(row.graced_dur_sec(grace_sec));
                table.entry(label).or_default().record(row.is_hit(), row.coverage);
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
struct MidiTally {
    attempts: u32,
    ratio: f64,
    cents_mae: f64,
}

impl MidiTally {
    // Incremental mean, one note at a time.
    fn push(&mut self, ratio: f64, cents_mae: f64) {
        self.attempts += 1;
        let n = self.attempts as f64;
        self.ratio += (ratio - self.ratio) / n;
        self.cents_mae += (cents_mae - self.cents_mae) / n;
    }
}

fn aggregate_pitch(takes: &[TakeScore]) -> SubmissionPitch {
    let mut by_midi: BTreeMap<i32, MidiTally> = BTreeMap::new();
    for take in takes {
        for row in &take.pitch.per_note {
            by_midi
                .entry(row.midi.round() as i32)
                .or_default()
                .push(row.ratio, row.cents_mae);
        }
    }

    let percents: Vec<f64> = takes.iter().map(|t| t.pitch.percent).collect();
    let maes: Vec<f64> = takes.iter().map(|t| t.pitch.cents_mae).collect();
    let seconds: Vec<f64> = takes.iter().map(|t| t.pitch.time_on_pitch_sec).collect();

    SubmissionPitch {
        percent: round_percent(mean(&percents).unwrap_or(0.0)),
        cents_mae: round_to(mean(&maes).unwrap_or(0.0), PERCENT_DECIMALS),
        time_on_pitch_sec: round_to(mean(&seconds).unwrap_or(0.0), PERCENT_DECIMALS),
        by_midi: by_midi
            .into_iter()
            .map(|(midi, t)| {
                let stats = MidiPitchStats {
                    midi,
                    attempts: t.attempts,
                    ratio: round_ratio(t.ratio),
                    cents_mae: round_to(t.cents_mae, PERCENT_DECIMALS),
                };
                (midi, stats)
            })
            .collect(),
    }
}

fn aggregate_rhythm(
    takes: &[TakeScore],
    labeler: &dyn Labeler,
    options: &AggregateOptions,
) -> SubmissionRhythm {
    let mut melody_table: BTreeMap<String, RollupTally> = BTreeMap::new();
    let mut line_table: BTreeMap<String, RollupTally> = BTreeMap::new();
    let (mut melody_attempts, mut melody_hits) = (0u32, 0u32);
    let (mut line_attempts, mut line_hits) = (0u32, 0u32);
    let mut line_percents: Vec<f64> = Vec::new();

    for take in takes {
        let melody = &take.rhythm.melody;
        melody_attempts += melody.attempts;
        melody_hits += melody.hits;
        let grace_sec = take.onset_grace_ms.unwrap_or(options.onset_grace_ms) / 1000.0;
        add_melody_rows(&mut melody_table, RollupSource::for_take(take), grace_sec, labeler);

        if let Some(line) = &take.rhythm.line {
            line_attempts += line.attempts;
            line_hits += line.hits;
            line_percents.push(line.percent);
            for event in &line.events {
                if let Some(label) = labeler.line_label(event) {
                    line_table.entry(label).or_default().record(event.hit, event.credit);
                }
            }
        }
    }

    let melody_percents: Vec<f64> = takes.iter().map(|t| t.rhythm.melody.percent).collect();

    SubmissionRhythm {
        melody_percent: round_percent(mean(&melody_percents).unwrap_or(0.0)),
        melody_attempts,
        melody_hits,
        melody_hit_rate: round_ratio(ratio_or(melody_hits as f64, melody_attempts as f64, 0.0)),
        line_evaluated: !line_percents.is_empty(),
        line_percent: round_percent(mean(&line_percents).unwrap_or(0.0)),
        line_attempts,
        line_hits,
        line_hit_rate: round_ratio(ratio_or(line_hits as f64, line_attempts as f64, 0.0)),
        melody_by_duration: finish_table(melody_table),
        line_by_label: finish_table(line_table),
    }
}

fn aggregate_intervals(takes: &[TakeScore]) -> SubmissionIntervals {
    let mut tallies: [ClassTally; INTERVAL_CLASS_COUNT] = Default::default();
    for take in takes {
        for class in &take.intervals.classes {
            let slot = (class.semitones as usize).min(INTERVAL_CLASS_COUNT - 1);
            tallies[slot].merge(class);
        }
    }
    let score = interval_score_from(&tallies);
    let classes: Vec<IntervalClass> = score
        .classes
        .into_iter()
        .map(|c| IntervalClass {
            percent: round_percent(c.percent),
            mean_abs_err_cents: round_to(c.mean_abs_err_cents, PERCENT_DECIMALS),
            ..c
        })
        .collect();
    let by_label = classes
        .iter()
        .filter(|c| c.attempts > 0)
        .map(|c| (c.label.clone(), c.clone()))
        .collect();

    SubmissionIntervals {
        total: score.total,
        correct: score.correct,
        correct_ratio: round_ratio(score.correct_ratio),
        classes,
        by_label,
    }
}

/// Roll every take of a session into one submission.
pub fn aggregate_for_submission(
    takes: &[TakeScore],
    visibility: &Visibility,
    labeler: &dyn Labeler,
    options: &AggregateOptions,
) -> SubmissionAggregate {
    // Mean of each take's display score, not a harmonic mean over the session.
    let finals: Vec<f64> = takes
        .iter()
        .map(|t| finalize_visible(t, visibility).percent)
        .collect();
    let final_score = final_score(round_percent(mean(&finals).unwrap_or(0.0)));

    let aggregate = SubmissionAggregate {
        take_count: takes.len() as u32,
        pitch: aggregate_pitch(takes),
        rhythm: aggregate_rhythm(takes, labeler, options),
        intervals: aggregate_intervals(takes),
        final_score,
        visibility: *visibility,
    };

    debug!(
        "Submission aggregated: takes={} final={:.2} ({}) melody_hits={}/{} line_hits={}/{}",
        aggregate.take_count,
        aggregate.final_score.percent,
        aggregate.final_score.letter.as_str(),
        aggregate.rhythm.melody_hits,
        aggregate.rhythm.melody_attempts,
        aggregate.rhythm.line_hits,
        aggregate.rhythm.line_attempts
    );
    aggregate
}

impl SubmissionAggregate {
    /// JSON payload for the persistence layer.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
