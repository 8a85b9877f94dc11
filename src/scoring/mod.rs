pub mod aggregate;
pub mod config;
pub mod finalize;
pub mod hand_line;
pub mod helpers;
pub mod intervals;
pub mod pitch;
pub mod rhythm;
pub mod take;
pub mod types;

pub use aggregate::{aggregate_for_submission, DefaultLabeler, FnLabeler, Labeler, RollupSource};
pub use config::{AggregateOptions, ScoringConfig, Visibility};
pub use finalize::{finalize_score_n, finalize_visible, letter_for_percent};
pub use take::{compute_take_score, TakeInput, TakeScorer};
