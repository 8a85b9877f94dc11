use log::{debug, warn};

use crate::error::Result;
use crate::scoring::config::ScoringConfig;
use crate::scoring::finalize::final_score;
use crate::scoring::hand_line::score_hand_line;
use crate::scoring::helpers::{mean, round_to};
use crate::scoring::intervals::score_intervals;
use crate::scoring::pitch::score_pitch;
use crate::scoring::rhythm::score_melody_rhythm;
use crate::scoring::types::{FrameTiming, Note, PitchSample, RhythmScore, TakeScore};

/// Everything captured for one take.
#[derive(Clone, Copy, Debug)]
pub struct TakeInput<'a> {
    pub phrase: &'a [Note],
    pub timing: FrameTiming,
    pub samples: &'a [PitchSample],
    pub gesture_events: &'a [f64],
    pub melody_onsets: &'a [f64],
    /// Rhythm-line onsets; the line track is only evaluated when present and non-empty.
    pub line_onsets: Option<&'a [f64]>,
}

/// Scores takes under one validated configuration.
#[derive(Clone, Copy, Debug)]
pub struct TakeScorer {
    config: ScoringConfig,
}

impl TakeScorer {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        Ok(TakeScorer {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, input: &TakeInput) -> TakeScore {
        let config = &self.config;
        if input.phrase.is_empty() {
            warn!("Scoring a take against an empty phrase");
        }

        let pitch = score_pitch(input.phrase, input.samples, config, &input.timing);
        let melody = score_melody_rhythm(
            input.phrase,
            input.samples,
            input.melody_onsets,
            config,
            &input.timing,
        );
        let line = input
            .line_onsets
            .filter(|onsets| !onsets.is_empty())
            .map(|onsets| score_hand_line(onsets, input.gesture_events, config));
        let intervals = score_intervals(input.phrase, input.samples, config);

        // Plain mean of whichever tracks were evaluated; display scoring with
        // hidden tracks goes through `finalize_visible` instead.
        let mut parts = vec![pitch.percent, melody.percent];
        if let Some(line) = &line {
            parts.push(line.percent);
        }
        let final_score = final_score(round_to(mean(&parts).unwrap_or(0.0), 1));

        debug!(
            "Take scored: pitch={:.1} melody={:.1} line={:?} intervals={}/{} final={:.1} ({})",
            pitch.percent,
            melody.percent,
            line.as_ref().map(|l| l.percent),
            intervals.correct,
            intervals.total,
            final_score.percent,
            final_score.letter.as_str()
        );

        TakeScore {
            pitch,
            rhythm: RhythmScore { melody, line },
            intervals,
            final_score,
            onset_grace_ms: Some(config.onset_grace_ms),
            melody_rollup: None,
        }
    }
}

/// One-shot scoring with an optional option bag.
pub fn compute_take_score(input: &TakeInput, options: Option<ScoringConfig>) -> Result<TakeScore> {
    let scorer = TakeScorer::new(options.unwrap_or_default())?;
    Ok(scorer.score(input))
}
