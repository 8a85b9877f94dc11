use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Input types

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PitchSample {
    pub time_sec: f64,
    pub hz: Option<f64>, // None or <= 0 means unvoiced
    #[serde(default = "full_confidence")]
    pub confidence: f64,
}

fn full_confidence() -> f64 {
    1.0
}

impl PitchSample {
    pub fn voiced(time_sec: f64, hz: f64, confidence: f64) -> Self {
        PitchSample {
            time_sec,
            hz: Some(hz),
            confidence,
        }
    }

    pub fn unvoiced(time_sec: f64) -> Self {
        PitchSample {
            time_sec,
            hz: None,
            confidence: 0.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub start_sec: f64,
    pub dur_sec: f64,
    pub midi: f64,
}

impl Note {
    pub fn end_sec(&self) -> f64 {
        self.start_sec + self.dur_sec
    }
}

/// Detector frame timing, used when the samples themselves are too sparse to
/// estimate a frame interval.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct FrameTiming {
    pub sample_rate: f64,
    pub hop_size: u32,
}

impl Default for FrameTiming {
    fn default() -> Self {
        FrameTiming {
            sample_rate: 48_000.0,
            hop_size: 1024,
        }
    }
}

// Per-note and per-event rows

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PerNotePitch {
    pub idx: usize,
    pub midi: f64,
    pub time_on_pitch_sec: f64,
    pub evaluated_dur_sec: f64,
    pub coverage_ratio: f64, // unshaped, for analytics
    pub ratio: f64,          // shaped and bonus-adjusted, used in the score
    pub landing_streak_sec: f64,
    pub cents_mae: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PerNoteRhythm {
    pub idx: usize,
    pub evaluated_dur_sec: f64,
    /// Window length before clamping; negative when the grace outlasts the note.
    #[serde(default)]
    pub window_sec: Option<f64>,
    pub voiced_sec: f64,
    pub coverage: f64,
    pub onset_err_ms: Option<f64>,
}

impl PerNoteRhythm {
    pub fn is_hit(&self) -> bool {
        self.onset_err_ms.is_some()
    }

    /// Notated length recovered by adding the onset grace back to the window.
    pub fn graced_dur_sec(&self, grace_sec: f64) -> f64 {
        self.window_sec.unwrap_or(self.evaluated_dur_sec) + grace_sec
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RhythmEvent {
    pub idx: usize,
    pub expected_sec: f64,
    pub tapped_sec: Option<f64>,
    pub err_ms: Option<f64>,
    pub credit: f64,
    pub hit: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IntervalClass {
    pub semitones: u8,
    pub label: String,
    pub attempts: u32,
    pub correct: u32,
    pub percent: f64,
    pub mean_abs_err_cents: f64,
}

// Per-track scores

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PitchScore {
    pub percent: f64,
    pub time_on_pitch_sec: f64,
    pub cents_mae: f64,
    pub per_note: Vec<PerNotePitch>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MelodyRhythmScore {
    pub percent: f64,
    pub attempts: u32,
    pub hits: u32,
    pub hit_rate: f64,
    pub mean_abs_err_ms: f64,
    pub per_note: Vec<PerNoteRhythm>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LineRhythmScore {
    pub percent: f64,
    pub attempts: u32,
    pub hits: u32,
    pub hit_rate: f64,
    pub mean_abs_err_ms: f64,
    pub events: Vec<RhythmEvent>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RhythmScore {
    pub melody: MelodyRhythmScore,
    pub line: Option<LineRhythmScore>, // None when no rhythm line was evaluated
}

impl RhythmScore {
    pub fn melody_percent(&self) -> f64 {
        self.melody.percent
    }

    pub fn line_percent(&self) -> Option<f64> {
        self.line.as_ref().map(|l| l.percent)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IntervalScore {
    pub total: u32,
    pub correct: u32,
    pub correct_ratio: f64,
    pub classes: Vec<IntervalClass>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Letter {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    D,
    #[serde(rename = "D-")]
    DMinus,
    F,
}

impl Letter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Letter::APlus => "A+",
            Letter::A => "A",
            Letter::AMinus => "A-",
            Letter::BPlus => "B+",
            Letter::B => "B",
            Letter::BMinus => "B-",
            Letter::CPlus => "C+",
            Letter::C => "C",
            Letter::CMinus => "C-",
            Letter::DPlus => "D+",
            Letter::D => "D",
            Letter::DMinus => "D-",
            Letter::F => "F",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FinalScore {
    pub percent: f64,
    pub letter: Letter,
}

/// A label-keyed rollup row: melody notes grouped by duration class, or
/// rhythm-line events grouped by beat label.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LabelRollup {
    pub label: String,
    pub attempts: u32,
    pub hits: u32,
    pub hit_rate: f64,
    pub percent: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TakeScore {
    pub pitch: PitchScore,
    pub rhythm: RhythmScore,
    pub intervals: IntervalScore,
    #[serde(rename = "final")]
    pub final_score: FinalScore,
    /// Grace applied to note starts when this take was scored.
    #[serde(default)]
    pub onset_grace_ms: Option<f64>,
    /// Duration rows already grouped by an upstream producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub melody_rollup: Option<Vec<LabelRollup>>,
}

// Submission types

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MidiPitchStats {
    pub midi: i32,
    pub attempts: u32,
    pub ratio: f64,
    pub cents_mae: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmissionPitch {
    pub percent: f64,
    pub cents_mae: f64,
    pub time_on_pitch_sec: f64,
    #[serde(with = "midi_keys")]
    pub by_midi: BTreeMap<i32, MidiPitchStats>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmissionRhythm {
    pub melody_percent: f64,
    pub melody_attempts: u32,
    pub melody_hits: u32,
    pub melody_hit_rate: f64,
    pub line_evaluated: bool,
    pub line_percent: f64,
    pub line_attempts: u32,
    pub line_hits: u32,
    pub line_hit_rate: f64,
    pub melody_by_duration: BTreeMap<String, LabelRollup>,
    pub line_by_label: BTreeMap<String, LabelRollup>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmissionIntervals {
    pub total: u32,
    pub correct: u32,
    pub correct_ratio: f64,
    pub classes: Vec<IntervalClass>,
    pub by_label: BTreeMap<String, IntervalClass>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmissionAggregate {
    pub take_count: u32,
    pub pitch: SubmissionPitch,
    pub rhythm: SubmissionRhythm,
    pub intervals: SubmissionIntervals,
    #[serde(rename = "final")]
    pub final_score: FinalScore,
    pub visibility: crate::scoring::config::Visibility,
}

/// Integer-keyed tables travel with string keys so they arrive in JS as plain
/// objects, the same shape `serde_json` gives them.
mod midi_keys {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(
        map: &BTreeMap<i32, T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(midi, v)| (midi.to_string(), v)))
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<i32, T>, D::Error> {
        BTreeMap::<String, T>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, v)| key.parse::<i32>().map(|midi| (midi, v)).map_err(D::Error::custom))
            .collect()
    }
}
