//! Typed errors for the engine's public surface.
//!
//! Internal numeric degeneracy (all-zero matrices, empty groups, failed
//! convergence) is never raised as an [`EngineError`] — callers see a
//! best-effort result plus a `stale` flag on [`crate::state::ConversationState`].
//! Only genuinely invalid input reaches this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown row name: {0}")]
    UnknownRow(String),

    #[error("unknown column name: {0}")]
    UnknownColumn(String),

    #[error("vote event references participant/comment with an empty name")]
    EmptyName,

    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
