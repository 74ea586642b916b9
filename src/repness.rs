//! Statistical representativeness scoring.
//!
//! For every (comment, group) pair we ask: does this group agree or
//! disagree with this comment more than the rest of the conversation does,
//! and is that difference big enough to not be noise? The two questions
//! are answered by a one-proportion z-test (is this group's agreement
//! rate distinguishable from chance) and a two-proportion z-test (is it
//! distinguishable from the rest of the conversation), both computed on
//! Bayesian-smoothed proportions so that small groups don't produce wild
//! swings from a handful of votes.

use crate::named_matrix::NamedMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 90% one- and two-tailed critical value, used throughout as the
/// significance bar for "worth surfacing to a reader".
pub const Z_90: f64 = 1.645;
/// Bayesian smoothing constant, split evenly between the two outcomes.
pub const PSEUDO_COUNT: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repful {
    Agree,
    Disagree,
    Consensus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommentStats {
    pub comment_id: String,
    pub na: f64,
    pub nd: f64,
    pub ns: f64,
    pub pa: f64,
    pub pd: f64,
    pub pat: f64,
    pub pdt: f64,
    pub ra: f64,
    pub rd: f64,
    pub rat: f64,
    pub rdt: f64,
    pub agree_metric: f64,
    pub disagree_metric: f64,
    pub repful: Repful,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Repness {
    pub group_repness: BTreeMap<usize, Vec<CommentStats>>,
    pub consensus: Vec<CommentStats>,
}

fn counts(eff_mat: &NamedMatrix, members: &[String], comment: &str) -> (f64, f64, f64) {
    let col = match eff_mat.get_col(comment) {
        Ok(c) => c,
        Err(_) => return (0.0, 0.0, 0.0),
    };
    let mut na = 0.0;
    let mut nd = 0.0;
    for name in members {
        if let Some(i) = eff_mat.row_index_of(name) {
            match col[i] {
                Some(v) if v > 0.0 => na += 1.0,
                Some(v) if v < 0.0 => nd += 1.0,
                _ => {}
            }
        }
    }
    (na, nd, na + nd)
}

/// Bayesian-smoothed probability: pseudocount `α` split evenly between hit
/// and total.
fn smoothed(n_hit: f64, n_total: f64) -> f64 {
    (n_hit + PSEUDO_COUNT / 2.0) / (n_total + PSEUDO_COUNT)
}

/// One-proportion z-test of `p` against the null of 0.5.
fn one_prop_z(p: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    (p - 0.5) / (0.25 / n).sqrt()
}

/// Two-proportion z-test comparing `(p1, n1)` against `(p2, n2)`.
fn two_prop_z(p1: f64, n1: f64, p2: f64, n2: f64) -> f64 {
    if n1 <= 0.0 || n2 <= 0.0 {
        return 0.0;
    }
    let pooled = (p1 * n1 + p2 * n2) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 {
        0.0
    } else {
        (p1 - p2) / se
    }
}

fn comment_stats(eff_mat: &NamedMatrix, group: &[String], rest: &[String], comment: &str) -> CommentStats {
    let (na, nd, ns) = counts(eff_mat, group, comment);
    let (na_r, nd_r, ns_r) = counts(eff_mat, rest, comment);

    let pa = smoothed(na, ns);
    let pd = smoothed(nd, ns);
    let pa_rest = smoothed(na_r, ns_r);
    let pd_rest = smoothed(nd_r, ns_r);

    let ra = if pa_rest == 0.0 { 1.0 } else { pa / pa_rest };
    let rd = if pd_rest == 0.0 { 1.0 } else { pd / pd_rest };

    let pat = one_prop_z(pa, ns);
    let pdt = one_prop_z(pd, ns);
    let rat = two_prop_z(pa, ns, pa_rest, ns_r);
    let rdt = two_prop_z(pd, ns, pd_rest, ns_r);

    let agree_metric = pa * (pat.abs() + rat.abs());
    let disagree_metric = (1.0 - pd) * (pdt.abs() + rdt.abs());

    let repful = if pa > 0.5 && ra > 1.0 {
        Repful::Agree
    } else if pd > 0.5 && rd > 1.0 {
        Repful::Disagree
    } else if agree_metric >= disagree_metric {
        Repful::Agree
    } else {
        Repful::Disagree
    };

    CommentStats {
        comment_id: comment.to_string(),
        na,
        nd,
        ns,
        pa,
        pd,
        pat,
        pdt,
        ra,
        rd,
        rat,
        rdt,
        agree_metric,
        disagree_metric,
        repful,
    }
}

/// A comment "passes" in `direction` if its probability is at or above
/// 0.5 and both the one- and two-proportion z-scores clear the 90% bar.
fn passes_significance(s: &CommentStats, direction: Repful) -> bool {
    match direction {
        Repful::Agree => s.pa >= 0.5 && s.pat.abs() >= Z_90 && s.rat.abs() >= Z_90,
        Repful::Disagree => s.pd >= 0.5 && s.pdt.abs() >= Z_90 && s.rdt.abs() >= Z_90,
        Repful::Consensus => false,
    }
}

/// Select up to `n` comments in `direction` (comments with `pa > pd` for
/// agreement, `pd > pa` for disagreement), preferring those that pass
/// significance and falling back to the highest-scoring remainder when too
/// few qualify.
fn select_direction(stats: &[CommentStats], n: usize, direction: Repful) -> Vec<CommentStats> {
    let metric = |s: &CommentStats| match direction {
        Repful::Agree => s.agree_metric,
        Repful::Disagree => s.disagree_metric,
        Repful::Consensus => 0.0,
    };
    let candidates: Vec<&CommentStats> = stats
        .iter()
        .filter(|s| match direction {
            Repful::Agree => s.pa > s.pd,
            Repful::Disagree => s.pd > s.pa,
            Repful::Consensus => false,
        })
        .collect();
    let (mut passing, mut rest): (Vec<&CommentStats>, Vec<&CommentStats>) =
        candidates.into_iter().partition(|s| passes_significance(s, direction));
    passing.sort_by(|a, b| metric(b).partial_cmp(&metric(a)).unwrap());
    rest.sort_by(|a, b| metric(b).partial_cmp(&metric(a)).unwrap());
    passing.into_iter().chain(rest).take(n).cloned().collect()
}

/// Compute per-group representative comments and cross-group consensus
/// comments for a clustering.
pub fn compute_repness(eff_mat: &NamedMatrix, clusters: &[crate::clustering::Cluster]) -> Repness {
    let comments = eff_mat.colnames();
    let mut group_repness = BTreeMap::new();
    let mut per_group_stats: Vec<(usize, Vec<CommentStats>)> = Vec::new();

    for cluster in clusters {
        let rest: Vec<String> = clusters
            .iter()
            .filter(|c| c.id != cluster.id)
            .flat_map(|c| c.members.clone())
            .collect();
        let stats: Vec<CommentStats> = comments
            .iter()
            .map(|c| comment_stats(eff_mat, &cluster.members, &rest, c))
            .collect();

        let mut selected = select_direction(&stats, 3, Repful::Agree);
        selected.extend(select_direction(&stats, 2, Repful::Disagree));
        per_group_stats.push((cluster.id, stats));
        group_repness.insert(cluster.id, selected);
    }

    // consensus: pa > 0.6 in every group, ranked by mean pa
    let mut consensus: Vec<CommentStats> = Vec::new();
    for comment in &comments {
        let mut pas = Vec::new();
        let mut all_above = true;
        for (_, stats) in &per_group_stats {
            match stats.iter().find(|s| &s.comment_id == comment) {
                Some(s) if s.pa > 0.6 => pas.push(s.pa),
                _ => {
                    all_above = false;
                    break;
                }
            }
        }
        if all_above && !pas.is_empty() {
            let mean_pa = pas.iter().sum::<f64>() / pas.len() as f64;
            if let Some((_, stats)) = per_group_stats.first() {
                if let Some(rep) = stats.iter().find(|s| &s.comment_id == comment) {
                    let mut rep = rep.clone();
                    rep.pa = mean_pa;
                    rep.repful = Repful::Consensus;
                    consensus.push(rep);
                }
            }
        }
    }
    consensus.sort_by(|a, b| b.pa.partial_cmp(&a.pa).unwrap());
    consensus.truncate(2);

    Repness { group_repness, consensus }
}

/// Pearson correlation between a participant's own votes and their group's
/// mean vote vector, computed pairwise over comments the participant
/// actually voted on. Surfaces how well a participant's individual votes
/// track their assigned group's overall tendency.
pub fn participant_correlation(row: &[Option<f64>], group_mean: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = row
        .iter()
        .zip(group_mean.iter())
        .filter_map(|(v, m)| v.map(|x| (x, *m)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        None
    } else {
        Some(cov / (var_x.sqrt() * var_y.sqrt()))
    }
}
