//! Warm-started weighted k-means over 2-D PCA projections.
//!
//! Re-running full k-means++ every recompute would make cluster identity
//! flicker for no reason — if the groups haven't meaningfully changed, a
//! participant assigned to "group 2" a moment ago should probably still be
//! in "group 2". So when a previous clustering is available we splay or
//! merge it to the target `k` and iterate from there instead of reseeding
//! from scratch; k-means++ seeding with the fixed RNG is only used cold.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CLUSTER_SEED: u64 = 42;
const MAX_ITER: usize = 20;
const CONVERGENCE_TOLERANCE: f64 = 0.01;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub center: [f64; 2],
    pub members: Vec<String>,
}

fn euclidean(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Automatic group-count selection: conservative for small conversations,
/// logarithmically generous for large ones, floored at 2 groups always.
pub fn determine_k(n: usize) -> usize {
    let k = if n < 10 {
        2.0
    } else if n < 500 {
        2.0 + (2.0_f64).min((n as f64).log2() / 5.0)
    } else {
        2.0 + (1.0_f64).min((n as f64).log2() / 10.0)
    };
    (k.floor() as usize).max(2)
}

fn weight_of(weights: Option<&HashMap<String, f64>>, name: &str) -> f64 {
    weights.and_then(|w| w.get(name)).copied().unwrap_or(1.0)
}

fn kmeans_plus_plus(points: &[(String, [f64; 2])], k: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
    let mut centers = Vec::with_capacity(k);
    let first = rng.random_range(0..points.len());
    centers.push(points[first].1);
    while centers.len() < k {
        let dists: Vec<f64> = points
            .iter()
            .map(|(_, p)| {
                centers
                    .iter()
                    .map(|c| euclidean(*p, *c))
                    .fold(f64::INFINITY, f64::min)
                    .powi(2)
            })
            .collect();
        let total: f64 = dists.iter().sum();
        if total == 0.0 {
            centers.push(points[rng.random_range(0..points.len())].1);
            continue;
        }
        let mut target = rng.random::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, d) in dists.iter().enumerate() {
            if target <= *d {
                chosen = i;
                break;
            }
            target -= d;
        }
        centers.push(points[chosen].1);
    }
    centers
}

fn assign(points: &[(String, [f64; 2])], centers: &[[f64; 2]]) -> Vec<usize> {
    points
        .iter()
        .map(|(_, p)| {
            centers
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| euclidean(*p, **a).partial_cmp(&euclidean(*p, **b)).unwrap())
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
        .collect()
}

fn weighted_centers(
    points: &[(String, [f64; 2])],
    assignment: &[usize],
    k: usize,
    weights: Option<&HashMap<String, f64>>,
    fallback: &[[f64; 2]],
) -> Vec<[f64; 2]> {
    let mut sums = vec![[0.0; 2]; k];
    let mut totals = vec![0.0; k];
    for ((name, p), &cluster) in points.iter().zip(assignment.iter()) {
        let w = weight_of(weights, name);
        sums[cluster][0] += p[0] * w;
        sums[cluster][1] += p[1] * w;
        totals[cluster] += w;
    }
    (0..k)
        .map(|i| {
            if totals[i] > 0.0 {
                [sums[i][0] / totals[i], sums[i][1] / totals[i]]
            } else {
                fallback.get(i).copied().unwrap_or([0.0, 0.0])
            }
        })
        .collect()
}

fn same_clustering(a: &[[f64; 2]], b: &[[f64; 2]]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x[0].partial_cmp(&y[0]).unwrap());
    b.sort_by(|x, y| x[0].partial_cmp(&y[0]).unwrap());
    a.iter().zip(b.iter()).all(|(x, y)| euclidean(*x, *y) < CONVERGENCE_TOLERANCE)
}

/// Reconcile a previous clustering's centers to the target count `k`:
/// split the largest cluster (reseeding from its farthest member) when
/// there are too few, merge the closest pair of centers when there are
/// too many.
fn clean_start_centers(mut centers: Vec<[f64; 2]>, points: &[(String, [f64; 2])], k: usize) -> Vec<[f64; 2]> {
    while centers.len() < k {
        let assignment = assign(points, &centers);
        let mut counts = vec![0usize; centers.len()];
        for &c in &assignment {
            counts[c] += 1;
        }
        let (largest, _) = counts.iter().enumerate().max_by_key(|(_, &c)| c).unwrap();
        let farthest = points
            .iter()
            .zip(assignment.iter())
            .filter(|(_, &c)| c == largest)
            .max_by(|((_, p1), _), ((_, p2), _)| {
                euclidean(*p1, centers[largest])
                    .partial_cmp(&euclidean(*p2, centers[largest]))
                    .unwrap()
            })
            .map(|((_, p), _)| *p);
        centers.push(farthest.unwrap_or(centers[largest]));
    }
    while centers.len() > k {
        let mut best = (0, 1, f64::INFINITY);
        for i in 0..centers.len() {
            for j in (i + 1)..centers.len() {
                let d = euclidean(centers[i], centers[j]);
                if d < best.2 {
                    best = (i, j, d);
                }
            }
        }
        let merged = [
            (centers[best.0][0] + centers[best.1][0]) / 2.0,
            (centers[best.0][1] + centers[best.1][1]) / 2.0,
        ];
        centers.remove(best.1);
        centers[best.0] = merged;
    }
    centers
}

/// Run weighted k-means to convergence (or `MAX_ITER` steps). With a warm
/// start, `k` is reconciled against the prior clustering via splay/merge
/// before iterating; without one, centers are seeded with k-means++ under
/// the fixed RNG seed.
pub fn cluster(
    points: &[(String, [f64; 2])],
    k: usize,
    weights: Option<&HashMap<String, f64>>,
    warm_start: Option<&[Cluster]>,
) -> Vec<Cluster> {
    if points.is_empty() {
        return Vec::new();
    }
    let k = k.min(points.len()).max(1);

    let mut centers = match warm_start {
        Some(prior) if !prior.is_empty() => {
            let seed: Vec<[f64; 2]> = prior.iter().map(|c| c.center).collect();
            clean_start_centers(seed, points, k)
        }
        _ => {
            let mut rng = StdRng::seed_from_u64(CLUSTER_SEED);
            kmeans_plus_plus(points, k, &mut rng)
        }
    };

    for _ in 0..MAX_ITER {
        let assignment = assign(points, &centers);
        let next = weighted_centers(points, &assignment, centers.len(), weights, &centers);
        if same_clustering(&centers, &next) {
            centers = next;
            break;
        }
        centers = next;
    }

    let assignment = assign(points, &centers);
    let mut clusters: Vec<Cluster> = (0..centers.len())
        .map(|i| Cluster {
            id: i,
            center: centers[i],
            members: Vec::new(),
        })
        .collect();
    for ((name, _), &c) in points.iter().zip(assignment.iter()) {
        clusters[c].members.push(name.clone());
    }
    clusters.retain(|c| !c.members.is_empty());

    // Presentation order: largest group first, renumbered densely. This is
    // the policy chosen for the id-stability-vs-readability tradeoff; see
    // DESIGN.md.
    clusters.sort_by_key(|c| std::cmp::Reverse(c.members.len()));
    for (i, c) in clusters.iter_mut().enumerate() {
        c.id = i;
    }
    clusters
}

/// Mean silhouette coefficient across all points; `0.0` for degenerate
/// clusterings (fewer than two non-empty clusters).
pub fn silhouette(points: &[(String, [f64; 2])], clusters: &[Cluster]) -> f64 {
    if clusters.len() < 2 {
        return 0.0;
    }
    let index: HashMap<&str, [f64; 2]> = points.iter().map(|(n, p)| (n.as_str(), *p)).collect();
    let mut total = 0.0;
    let mut count = 0;
    for (ci, cluster) in clusters.iter().enumerate() {
        for name in &cluster.members {
            let p = index[name.as_str()];
            let a = if cluster.members.len() > 1 {
                cluster
                    .members
                    .iter()
                    .filter(|m| *m != name)
                    .map(|m| euclidean(p, index[m.as_str()]))
                    .sum::<f64>()
                    / (cluster.members.len() - 1) as f64
            } else {
                0.0
            };
            let b = clusters
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != ci)
                .map(|(_, other)| {
                    other.members.iter().map(|m| euclidean(p, index[m.as_str()])).sum::<f64>()
                        / other.members.len() as f64
                })
                .fold(f64::INFINITY, f64::min);
            let s = if a == 0.0 && b == 0.0 {
                0.0
            } else {
                (b - a) / a.max(b)
            };
            total += s;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determine_k_floors_at_two() {
        assert_eq!(determine_k(0), 2);
        assert_eq!(determine_k(9), 2);
        assert_eq!(determine_k(500), 2);
    }

    #[test]
    fn determine_k_grows_with_size() {
        assert!(determine_k(100_000) >= determine_k(1_000));
    }

    #[test]
    fn two_separated_blobs_cluster_cleanly() {
        let points = vec![
            ("a".to_string(), [0.0, 0.0]),
            ("b".to_string(), [0.1, 0.0]),
            ("c".to_string(), [0.0, 0.1]),
            ("d".to_string(), [10.0, 10.0]),
            ("e".to_string(), [10.1, 10.0]),
            ("f".to_string(), [10.0, 10.1]),
        ];
        let clusters = cluster(&points, 2, None, None);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members.len() + clusters[1].members.len(), 6);
        for name in ["a", "b", "c"] {
            assert!(clusters.iter().any(|c| c.members.iter().any(|m| m == name)));
        }
    }

    #[test]
    fn clusters_sorted_by_descending_size() {
        let points = vec![
            ("a".to_string(), [0.0, 0.0]),
            ("b".to_string(), [0.0, 0.1]),
            ("c".to_string(), [0.1, 0.0]),
            ("d".to_string(), [10.0, 10.0]),
        ];
        let clusters = cluster(&points, 2, None, None);
        for w in clusters.windows(2) {
            assert!(w[0].members.len() >= w[1].members.len());
        }
        for (i, c) in clusters.iter().enumerate() {
            assert_eq!(c.id, i);
        }
    }

    #[test]
    fn silhouette_degenerate_is_zero() {
        let points = vec![("a".to_string(), [0.0, 0.0])];
        let clusters = cluster(&points, 1, None, None);
        assert_eq!(silhouette(&points, &clusters), 0.0);
    }
}
