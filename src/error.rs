use thiserror::Error;

use crate::models::{SignalLabel, Status};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("cannot apply {label} to a job in state {from}")]
    InvalidTransition { from: Status, label: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn invalid_transition(from: Status, label: SignalLabel) -> Self {
        Self::InvalidTransition {
            from,
            label: label.to_string(),
        }
    }
}
