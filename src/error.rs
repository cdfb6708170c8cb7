//! Input errors raised by the decision engine.
//!
//! Safety rejections are not errors (see `evolution::safety`), and executor or
//! persistence failures travel as `anyhow::Error` through the runtime layers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A metrics field was negative, NaN or infinite.
    #[error("invalid metric `{field}`: {value}")]
    InvalidMetric { field: &'static str, value: f64 },

    #[error("invalid proposal `{id}`: {reason}")]
    InvalidProposal { id: String, reason: String },

    #[error("duplicate proposal id `{0}`")]
    DuplicateProposal(String),

    /// A configured threshold cannot be used for evaluation.
    #[error("invalid threshold `{name}`: {reason}")]
    InvalidThreshold { name: &'static str, reason: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
