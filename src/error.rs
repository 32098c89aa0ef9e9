//! Error type shared by every module of the crate.

use crate::pattern::PatternId;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors raised while processing, combining or loading patterns.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Two grids that have to be combined share no part of their x domain.
    #[error("the background range does not overlap with the pattern range for {pattern_name}")]
    RangeOverlap { pattern_name: String },

    /// Input data cannot be read as two equal-length numeric columns.
    #[error("malformed pattern data in {source_name}: {reason}")]
    MalformedInput { source_name: String, reason: String },

    /// Setting the reference background would make a pattern depend on itself.
    #[error("reference background cycle detected at pattern {pattern_name}")]
    CyclicReference { pattern_name: String },

    /// A handle that is not registered in the engine.
    #[error("unknown pattern {0}")]
    UnknownPattern(PatternId),

    /// A pattern cannot be removed while others use it as reference background.
    #[error("pattern {pattern_name} is still used as a reference background")]
    StillReferenced { pattern_name: String },

    #[error("interpolation failed: {0}")]
    Interpolation(String),

    /// Failure reported by a background extractor, passed on unchanged.
    #[error("background extraction failed: {0}")]
    Extraction(String),

    #[error("no background extractor registered under the name {0}")]
    UnknownExtractor(String),

    #[error("data shape {data:?} and background shape {background:?} are different")]
    ShapeMismatch {
        data: Vec<usize>,
        background: Vec<usize>,
    },

    #[error("background has not been extracted yet")]
    MissingBackground,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PatternError {
    pub(crate) fn range_overlap(pattern_name: &str) -> Self {
        PatternError::RangeOverlap {
            pattern_name: pattern_name.to_string(),
        }
    }

    pub(crate) fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        PatternError::MalformedInput {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}
