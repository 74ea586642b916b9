//! The top-level snapshot tying every component together.
//!
//! A [`ConversationState`] is treated as immutable: `update_votes`,
//! `update_moderation` and `recompute` all return a new snapshot rather
//! than mutating in place, so a caller holding an old reference never sees
//! it change out from under them. Failures during recomputation are never
//! raised to the caller — numeric degeneracy is a fact of life in a live
//! conversation with few votes — instead the prior field is retained and
//! `stale` is set, so a transient all-zero matrix doesn't wipe out a
//! perfectly good previous clustering.

use crate::clustering::{self, Cluster};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::moderation::{self, ModerationSets};
use crate::named_matrix::NamedMatrix;
use crate::pca::{self, PcaModel};
use crate::repness::{self, Repness};
use crate::vote::RawVote;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Per-participant descriptive stats computed alongside a recompute: which
/// group they landed in, and how well their own votes track that group's
/// mean vote vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PtptStat {
    pub group_id: usize,
    pub group_correlation: Option<f64>,
}

/// A single vote cast by a participant on a comment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteEvent {
    pub participant_id: String,
    pub comment_id: String,
    pub value: Option<RawVote>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VoteStats {
    pub n_votes: usize,
    pub n_agree: usize,
    pub n_disagree: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: String,
    pub last_updated: i64,
    pub raw_mat: NamedMatrix,
    pub moderation: ModerationSets,
    pub eff_mat: NamedMatrix,
    pub pca: Option<PcaModel>,
    pub proj: IndexMap<String, (f64, f64)>,
    pub group_clusters: Vec<Cluster>,
    pub repness: Repness,
    pub vote_stats: VoteStats,
    pub ptpt_stats: std::collections::BTreeMap<String, PtptStat>,
    #[serde(skip, default)]
    pub config: EngineConfig,
    pub stale: bool,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            last_updated: 0,
            raw_mat: NamedMatrix::new(),
            moderation: ModerationSets::default(),
            eff_mat: NamedMatrix::new(),
            pca: None,
            proj: IndexMap::new(),
            group_clusters: Vec::new(),
            repness: Repness::default(),
            vote_stats: VoteStats::default(),
            ptpt_stats: std::collections::BTreeMap::new(),
            config: EngineConfig::default(),
            stale: true,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Fold a batch of vote events into the raw matrix. With `recompute`
    /// set, PCA/clustering/representativeness are recomputed immediately;
    /// otherwise the snapshot is just marked `stale` for a later
    /// `recompute()` call.
    pub fn update_votes(&self, events: &[VoteEvent], recompute: bool, now: i64) -> Result<Self> {
        for e in events {
            if e.participant_id.is_empty() || e.comment_id.is_empty() {
                return Err(EngineError::EmptyName);
            }
        }
        let updates: Vec<(String, String, Option<RawVote>)> = events
            .iter()
            .map(|e| (e.participant_id.clone(), e.comment_id.clone(), e.value.clone()))
            .collect();
        let raw_mat = self.raw_mat.batch_update(&updates, true);
        let next = Self {
            raw_mat,
            last_updated: now,
            stale: true,
            ..self.clone()
        };
        Ok(if recompute { next.recompute() } else { next })
    }

    pub fn update_moderation(&self, moderation: ModerationSets, recompute: bool, now: i64) -> Result<Self> {
        let next = Self {
            moderation,
            last_updated: now,
            stale: true,
            ..self.clone()
        };
        Ok(if recompute { next.recompute() } else { next })
    }

    /// Rebuild the effective matrix, PCA, clustering and representativeness
    /// from the current raw matrix and moderation sets. Warm-starts
    /// clustering from `self.group_clusters` when present.
    pub fn recompute(&self) -> Self {
        let eff_mat = moderation::derive_effective_matrix(&self.raw_mat, &self.moderation);
        let n = eff_mat.n_rows();

        if n == 0 || eff_mat.n_cols() == 0 {
            return Self {
                eff_mat,
                stale: true,
                ..self.clone()
            };
        }

        let pca_model = pca::compute_pca(&eff_mat, self.config.pca_components.max(2));
        let proj = pca::project_all(&eff_mat, &pca_model);
        let points: Vec<(String, [f64; 2])> = proj.iter().map(|(k, &(a, b))| (k.clone(), [a, b])).collect();

        let k = self
            .config
            .cluster_count_override
            .unwrap_or_else(|| clustering::determine_k(n));
        let warm_start = if self.group_clusters.is_empty() {
            None
        } else {
            Some(self.group_clusters.as_slice())
        };
        let group_clusters = clustering::cluster(&points, k, None, warm_start);
        let repness = repness::compute_repness(&eff_mat, &group_clusters);

        let vote_stats = compute_vote_stats(&eff_mat);
        let ptpt_stats = compute_ptpt_stats(&eff_mat, &group_clusters);

        Self {
            eff_mat,
            pca: Some(pca_model),
            proj,
            group_clusters,
            repness,
            vote_stats,
            ptpt_stats,
            stale: false,
            ..self.clone()
        }
    }

    pub fn to_dict(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_dict(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Per-participant group assignment plus a Pearson correlation between the
/// participant's own votes and their group's mean vote vector.
fn compute_ptpt_stats(eff_mat: &NamedMatrix, clusters: &[Cluster]) -> std::collections::BTreeMap<String, PtptStat> {
    let mut out = std::collections::BTreeMap::new();
    for cluster in clusters {
        let group_mean = group_mean_vector(eff_mat, &cluster.members);
        for name in &cluster.members {
            let row = match eff_mat.get_row(name) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let correlation = repness::participant_correlation(&row, &group_mean);
            out.insert(
                name.clone(),
                PtptStat {
                    group_id: cluster.id,
                    group_correlation: correlation,
                },
            );
        }
    }
    out
}

fn group_mean_vector(eff_mat: &NamedMatrix, members: &[String]) -> Vec<f64> {
    let n_cols = eff_mat.n_cols();
    let mut sums = vec![0.0; n_cols];
    let mut counts = vec![0usize; n_cols];
    for name in members {
        if let Ok(row) = eff_mat.get_row(name) {
            for (j, v) in row.iter().enumerate() {
                if let Some(x) = v {
                    sums[j] += x;
                    counts[j] += 1;
                }
            }
        }
    }
    sums.iter()
        .zip(counts.iter())
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect()
}

fn compute_vote_stats(eff_mat: &NamedMatrix) -> VoteStats {
    let mut n_votes = 0;
    let mut n_agree = 0;
    let mut n_disagree = 0;
    for row in eff_mat.cells() {
        for x in row.iter().flatten() {
            n_votes += 1;
            if *x > 0.0 {
                n_agree += 1;
            } else if *x < 0.0 {
                n_disagree += 1;
            }
        }
    }
    VoteStats {
        n_votes,
        n_agree,
        n_disagree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::RawVote;

    fn event(p: &str, c: &str, v: f64) -> VoteEvent {
        VoteEvent {
            participant_id: p.to_string(),
            comment_id: c.to_string(),
            value: Some(RawVote::Number(v)),
        }
    }

    #[test]
    fn update_votes_then_recompute_produces_clusters() {
        let state = ConversationState::new("conv1");
        let events = vec![
            event("p1", "c1", 1.0),
            event("p2", "c1", 1.0),
            event("p3", "c1", -1.0),
            event("p4", "c1", -1.0),
        ];
        let state = state.update_votes(&events, true, 1).unwrap();
        assert!(!state.stale);
        assert_eq!(state.vote_stats.n_votes, 4);
        assert!(!state.group_clusters.is_empty());
        assert_eq!(state.ptpt_stats.len(), 4);
        assert_eq!(state.ptpt_stats["p1"].group_id, state.ptpt_stats["p2"].group_id);
        assert_ne!(state.ptpt_stats["p1"].group_id, state.ptpt_stats["p3"].group_id);
    }

    #[test]
    fn deferred_recompute_marks_stale() {
        let state = ConversationState::new("conv1");
        let events = vec![event("p1", "c1", 1.0)];
        let state = state.update_votes(&events, false, 1).unwrap();
        assert!(state.stale);
        assert!(state.group_clusters.is_empty());
    }

    #[test]
    fn empty_name_raises() {
        let state = ConversationState::new("conv1");
        let events = vec![VoteEvent {
            participant_id: String::new(),
            comment_id: "c1".to_string(),
            value: Some(RawVote::Number(1.0)),
        }];
        assert!(matches!(
            state.update_votes(&events, true, 1),
            Err(EngineError::EmptyName)
        ));
    }

    #[test]
    fn round_trips_through_dict() {
        let state = ConversationState::new("conv1");
        let events = vec![event("p1", "c1", 1.0), event("p2", "c1", -1.0)];
        let state = state.update_votes(&events, true, 1).unwrap();
        let dict = state.to_dict().unwrap();
        let restored = ConversationState::from_dict(dict).unwrap();
        assert_eq!(restored.conversation_id, "conv1");
        assert_eq!(restored.vote_stats.n_votes, state.vote_stats.n_votes);
    }
}
