//! Evolution decision engine: trigger rules, proposal scoring, the safety
//! gate, and announcement text.
//!
//! Everything here is pure. Thresholds are passed in on every call.

pub mod announce;
pub mod effects;
pub mod rules;
pub mod safety;
pub mod scoring;

pub use announce::{format_metrics_post, generate_announcement};
pub use effects::apply_effect;
pub use rules::{evaluate, next_molt_milestone};
pub use safety::{is_action_safe, BlockReason, SafetyVerdict};
pub use scoring::{score_breakdown, score_proposal, ScoreBreakdown};
