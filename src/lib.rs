//! Incremental opinion-analysis engine.
//!
//! Ingests a stream of participant votes on comments, maintains a sparse
//! named vote matrix, and on demand recomputes a PCA projection,
//! warm-started k-means clustering of participants into opinion groups,
//! and statistical representativeness scores for which comments best
//! characterise each group. See [`state::ConversationState`] for the
//! entry point.

pub mod clustering;
pub mod config;
pub mod error;
pub mod moderation;
pub mod named_matrix;
pub mod pca;
pub mod repness;
pub mod state;
pub mod vote;

pub use error::{EngineError, Result};
pub use state::{ConversationState, VoteEvent, VoteStats};
