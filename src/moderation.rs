//! Derives the effective vote matrix that every downstream computation
//! (PCA, clustering, representativeness) actually sees, from the raw
//! matrix plus the moderator's decisions.
//!
//! The effective matrix is always rebuilt from scratch from `raw_mat` and
//! the current moderation sets — it is never patched in place — so a
//! moderator un-hiding a comment just means recomputing once more, not
//! threading an undo through accumulated edits.

use crate::named_matrix::NamedMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModerationSets {
    /// Comments hidden from every computation entirely.
    pub mod_out_tids: BTreeSet<String>,
    /// Comments explicitly un-hidden; a hint to the UI layer, not a filter
    /// — a comment here still appears unless it's *also* in `mod_out_tids`.
    pub mod_in_tids: BTreeSet<String>,
    /// Meta comments (e.g. "no more comments, please"): kept addressable
    /// but zero-filled so they never contribute votes.
    pub meta_tids: BTreeSet<String>,
    /// Participants excluded from every computation entirely.
    pub mod_out_ptpts: BTreeSet<String>,
}

/// Rebuild the effective matrix: drop moderated-out comments and
/// participants, zero-fill meta comments. `mod_in_tids` never changes the
/// shape of the result on its own.
pub fn derive_effective_matrix(raw: &NamedMatrix, sets: &ModerationSets) -> NamedMatrix {
    let keep_cols: Vec<String> = raw
        .colnames()
        .into_iter()
        .filter(|c| !sets.mod_out_tids.contains(c))
        .collect();
    let meta: Vec<String> = sets.meta_tids.iter().cloned().collect();
    let excluded_ptpts: Vec<String> = sets.mod_out_ptpts.iter().cloned().collect();

    raw.col_subset(&keep_cols)
        .zero_columns(&meta)
        .inv_row_subset(&excluded_ptpts)
}
