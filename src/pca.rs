//! Principal component analysis by power iteration with deflation.
//!
//! Components are extracted one at a time: find the dominant eigenvector
//! of the (mean-centered, missing-as-zero) data via power iteration, then
//! remove that direction's contribution from the data and repeat. This
//! avoids ever materialising a dense covariance matrix, which matters
//! once the comment count gets large and the vote matrix stays sparse.
//!
//! The RNG seed is fixed at 42 so that a given vote history always
//! produces the same components, deterministic sign included — the first
//! nonzero entry of every returned component is forced positive.
//!
//! This implementation does not reproduce dataset-specific axis alignment
//! adjustments that the conversation-math ecosystem this was distilled
//! from applies for cross-run plot stability; those are a presentation
//! concern, not a property of the PCA itself.

use crate::named_matrix::NamedMatrix;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const PCA_SEED: u64 = 42;
const MAX_ITER: usize = 100;
const CONVERGENCE_EPS: f64 = 1e-10;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PcaModel {
    pub center: Vec<f64>,
    pub components: Vec<Vec<f64>>,
}

fn vector_length(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn normalize_vector(v: &[f64]) -> Vec<f64> {
    let len = vector_length(v);
    if len == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / len).collect()
}

/// Force the first nonzero entry of `v` to be positive.
fn sign_normalize(mut v: Vec<f64>) -> Vec<f64> {
    if let Some(first_nonzero) = v.iter().find(|x| x.abs() > f64::EPSILON) {
        if *first_nonzero < 0.0 {
            for x in v.iter_mut() {
                *x = -*x;
            }
        }
    }
    v
}

fn one_hot(dim: usize, i: usize) -> Vec<f64> {
    let mut v = vec![0.0; dim];
    if i < dim {
        v[i] = 1.0;
    }
    v
}

/// X^T (X r), computed without forming X^T X.
fn xtxr(centered: &[Vec<f64>], r: &[f64]) -> Vec<f64> {
    let n_cols = r.len();
    let xr: Vec<f64> = centered
        .iter()
        .map(|row| row.iter().zip(r).map(|(x, y)| x * y).sum())
        .collect();
    let mut out = vec![0.0; n_cols];
    for (row, &s) in centered.iter().zip(xr.iter()) {
        for (o, x) in out.iter_mut().zip(row.iter()) {
            *o += x * s;
        }
    }
    out
}

fn power_iteration(centered: &[Vec<f64>], dim: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut r: Vec<f64> = normalize_vector(&(0..dim).map(|_| rng.random::<f64>() - 0.5).collect::<Vec<_>>());
    let mut best_vector = r.clone();
    let mut best_magnitude = 0.0_f64;

    for _ in 0..MAX_ITER {
        let next = xtxr(centered, &r);
        let magnitude = vector_length(&next);
        if magnitude == 0.0 {
            return sign_normalize(best_vector);
        }
        let next = normalize_vector(&next);
        if magnitude > best_magnitude {
            best_magnitude = magnitude;
            best_vector = next.clone();
        }
        let similarity: f64 = next.iter().zip(r.iter()).map(|(a, b)| a * b).sum();
        if similarity.abs() > 1.0 - CONVERGENCE_EPS {
            return sign_normalize(next);
        }
        r = next;
    }
    sign_normalize(best_vector)
}

fn deflate(centered: &mut [Vec<f64>], component: &[f64]) {
    for row in centered.iter_mut() {
        let score: f64 = row.iter().zip(component).map(|(x, c)| x * c).sum();
        for (x, c) in row.iter_mut().zip(component) {
            *x -= score * c;
        }
    }
}

fn column_means(data: &[Vec<Option<f64>>], n_cols: usize) -> Vec<f64> {
    let mut sums = vec![0.0; n_cols];
    let mut counts = vec![0usize; n_cols];
    for row in data {
        for (j, v) in row.iter().enumerate() {
            if let Some(x) = v {
                sums[j] += x;
                counts[j] += 1;
            }
        }
    }
    sums.iter()
        .zip(counts.iter())
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect()
}

fn center_matrix(data: &[Vec<Option<f64>>], means: &[f64]) -> Vec<Vec<f64>> {
    data.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(j, v)| v.map(|x| x - means[j]).unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// Compute a `requested_k`-component PCA model over `data`'s effective vote
/// matrix.
///
/// Degenerate shapes are handled explicitly rather than left to numeric
/// luck: an all-zero matrix, a single participant, or a single comment
/// each have a well-defined (if uninformative) decomposition. Requests for
/// more components than `min(rows, cols)` admits are clipped to that bound
/// for extraction, then padded back up to `requested_k` — the clip is an
/// extraction-rank bound, not the output component count.
pub fn compute_pca(data: &NamedMatrix, requested_k: usize) -> PcaModel {
    let n_rows = data.n_rows();
    let n_cols = data.n_cols();
    if n_cols == 0 {
        return PcaModel {
            center: Vec::new(),
            components: Vec::new(),
        };
    }

    let raw = data.cells();
    let means = column_means(raw, n_cols);
    let rank_bound = requested_k.min(n_rows.max(1)).min(n_cols);

    let mut components: Vec<Vec<f64>> = Vec::new();

    if n_rows == 0 {
        // no data at all: identity axes
    } else if n_cols == 1 {
        components.push(vec![1.0]);
    } else if n_rows == 1 {
        let only = normalize_vector(&center_matrix(raw, &means)[0]);
        components.push(if vector_length(&only) == 0.0 {
            one_hot(n_cols, 0)
        } else {
            sign_normalize(only)
        });
        // Single row: the rest are zero vectors, not one-hot axes.
        while components.len() < requested_k {
            components.push(vec![0.0; n_cols]);
        }
    } else {
        let mut centered = center_matrix(raw, &means);
        let all_zero = centered.iter().all(|row| row.iter().all(|&x| x == 0.0));
        if all_zero {
            // fall through to one-hot padding below
        } else {
            let mut rng = StdRng::seed_from_u64(PCA_SEED);
            for _ in 0..rank_bound {
                let residual_energy: f64 = centered.iter().flatten().map(|x| x * x).sum();
                if residual_energy < 1e-18 {
                    // Rank exhausted: further power iteration would just
                    // chase numerical noise. Fall through to one-hot padding.
                    break;
                }
                let comp = power_iteration(&centered, n_cols, &mut rng);
                if vector_length(&comp) == 0.0 {
                    break;
                }
                deflate(&mut centered, &comp);
                components.push(comp);
            }
        }
    }

    // pad with one-hot axes (skipping directions already spanned) up to
    // requested_k
    let mut next_axis = 0;
    while components.len() < requested_k {
        while components
            .iter()
            .any(|c| (c[next_axis].abs() - 1.0).abs() < 1e-9 && c.iter().filter(|x| x.abs() > 1e-9).count() == 1)
        {
            next_axis += 1;
            if next_axis >= n_cols {
                break;
            }
        }
        if next_axis >= n_cols {
            break;
        }
        components.push(one_hot(n_cols, next_axis));
        next_axis += 1;
    }

    PcaModel { center: means, components }
}

/// Sparsity-aware projection of one participant's votes onto the first two
/// components. The `sqrt(n_cols / present)` scale keeps participants who
/// voted on very few comments from collapsing toward the origin purely as
/// an artifact of having fewer terms in the dot product.
pub fn project_row(row: &[Option<f64>], model: &PcaModel) -> (f64, f64) {
    let present = row.iter().filter(|v| v.is_some()).count();
    let scale = ((model.center.len() as f64) / (present.max(1) as f64)).sqrt();
    let mut coords = [0.0f64; 2];
    for (dim, slot) in coords.iter_mut().enumerate().take(2.min(model.components.len())) {
        let comp = &model.components[dim];
        let mut acc = 0.0;
        for (j, v) in row.iter().enumerate() {
            if let Some(x) = v {
                acc += (x - model.center[j]) * comp[j];
            }
        }
        *slot = acc * scale;
    }
    (coords[0], coords[1])
}

/// Project every participant currently in `data` onto `model`.
pub fn project_all(data: &NamedMatrix, model: &PcaModel) -> IndexMap<String, (f64, f64)> {
    let mut out = IndexMap::new();
    for (name, row) in data.rownames().into_iter().zip(data.cells().iter()) {
        out.insert(name, project_row(row, model));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::RawVote;

    fn num(n: f64) -> Option<RawVote> {
        Some(RawVote::Number(n))
    }

    #[test]
    fn all_zero_matrix_yields_one_hot_components() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(0.0).as_ref(), false)
            .update("p1", "c2", num(0.0).as_ref(), false)
            .update("p2", "c1", num(0.0).as_ref(), false)
            .update("p2", "c2", num(0.0).as_ref(), false);
        let model = compute_pca(&m, 2);
        assert_eq!(model.components.len(), 2);
        for c in &model.components {
            assert_eq!(c.iter().filter(|x| x.abs() > 1e-9).count(), 1);
        }
    }

    #[test]
    fn single_column_is_trivial() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(1.0).as_ref(), false)
            .update("p2", "c1", num(-1.0).as_ref(), false);
        let model = compute_pca(&m, 2);
        assert_eq!(model.components[0], vec![1.0]);
    }

    #[test]
    fn components_are_sign_normalized() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(1.0).as_ref(), false)
            .update("p1", "c2", num(1.0).as_ref(), false)
            .update("p2", "c1", num(-1.0).as_ref(), false)
            .update("p2", "c2", num(-1.0).as_ref(), false)
            .update("p3", "c1", num(1.0).as_ref(), false)
            .update("p3", "c2", num(-1.0).as_ref(), false);
        let model = compute_pca(&m, 2);
        for c in &model.components {
            if let Some(first) = c.iter().find(|x| x.abs() > 1e-9) {
                assert!(*first > 0.0);
            }
        }
    }

    #[test]
    fn single_row_pads_with_zeros_not_one_hot() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(1.0).as_ref(), false)
            .update("p1", "c2", num(-1.0).as_ref(), false)
            .update("p1", "c3", num(1.0).as_ref(), false);
        let model = compute_pca(&m, 3);
        assert_eq!(model.components.len(), 3);
        assert_ne!(model.components[0], vec![0.0, 0.0, 0.0]);
        assert_eq!(model.components[1], vec![0.0, 0.0, 0.0]);
        assert_eq!(model.components[2], vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn requests_above_rank_bound_still_pad_to_requested_k() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(1.0).as_ref(), false)
            .update("p1", "c2", num(1.0).as_ref(), false)
            .update("p1", "c3", num(-1.0).as_ref(), false)
            .update("p1", "c4", num(-1.0).as_ref(), false)
            .update("p2", "c1", num(-1.0).as_ref(), false)
            .update("p2", "c2", num(-1.0).as_ref(), false)
            .update("p2", "c3", num(1.0).as_ref(), false)
            .update("p2", "c4", num(1.0).as_ref(), false);
        // min(rows, cols) = 2, but 4 components are requested.
        let model = compute_pca(&m, 4);
        assert_eq!(model.components.len(), 4);
    }

    #[test]
    fn projection_scales_by_sparsity() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(1.0).as_ref(), false)
            .update("p1", "c2", num(1.0).as_ref(), false)
            .update("p2", "c1", num(-1.0).as_ref(), false)
            .update("p2", "c2", num(-1.0).as_ref(), false);
        let model = compute_pca(&m, 2);
        let proj = project_all(&m, &model);
        assert_eq!(proj.len(), 2);
    }
}
