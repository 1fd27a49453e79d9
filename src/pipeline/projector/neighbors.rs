//! Nearest-neighbour search and the fuzzy neighbour graph built on it

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::super::matrix::{squared_distance, FeatureMatrix};

/// Binary-search iterations when fitting each row's bandwidth
const SMOOTH_K_ITERATIONS: usize = 64;

/// Bandwidth search stops once the membership sum is this close to target
const SMOOTH_K_TOLERANCE: f64 = 1e-5;

/// Lower bound on a bandwidth, relative to the mean neighbour distance
const MIN_K_DIST_SCALE: f64 = 1e-3;

/// The `k` nearest reference rows of every query row, ascending by distance
#[derive(Debug, Clone, PartialEq)]
pub struct KnnGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f64>>,
}

/// Exact Euclidean k-nearest neighbours of each `queries` row among `reference` rows.
///
/// Ties are broken by reference row index so the result is deterministic. When
/// `queries` and `reference` are the same matrix each row is its own first
/// neighbour.
pub fn nearest_neighbors(queries: &FeatureMatrix, reference: &FeatureMatrix, k: usize) -> KnnGraph {
    let k = k.min(reference.nrows());

    let rows: Vec<(Vec<usize>, Vec<f64>)> = (0..queries.nrows())
        .into_par_iter()
        .map(|i| {
            let query = queries.row(i);
            let mut candidates: Vec<(f64, usize)> = reference
                .rows()
                .enumerate()
                .map(|(j, row)| (squared_distance(query, row), j))
                .collect();

            let by_distance =
                |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
            if k > 0 && k < candidates.len() {
                candidates.select_nth_unstable_by(k - 1, by_distance);
            }
            candidates.truncate(k);
            candidates.sort_by(by_distance);

            candidates
                .into_iter()
                .map(|(d, j)| (j, d.sqrt()))
                .unzip()
        })
        .collect();

    let (indices, distances) = rows.into_iter().unzip();
    KnnGraph { indices, distances }
}

/// Per-row bandwidth (`sigma`) and local offset (`rho`) of the fuzzy graph.
///
/// `rho` is the distance to the `local_connectivity`-th nearest non-identical
/// neighbour; `sigma` is chosen so that the memberships of neighbours after
/// the first sum to `log2(k)`.
pub fn smooth_knn_dist(distances: &[Vec<f64>], k: f64, local_connectivity: f64) -> (Vec<f64>, Vec<f64>) {
    let target = k.log2();
    let total: f64 = distances.iter().flatten().sum();
    let count: usize = distances.iter().map(Vec::len).sum();
    let mean_distances = if count > 0 { total / count as f64 } else { 0.0 };

    let mut sigmas = Vec::with_capacity(distances.len());
    let mut rhos = Vec::with_capacity(distances.len());

    for row in distances {
        let non_zero: Vec<f64> = row.iter().copied().filter(|d| *d > 0.0).collect();

        let mut rho = 0.0;
        if non_zero.len() as f64 >= local_connectivity {
            let index = local_connectivity.floor() as usize;
            let interpolation = local_connectivity - index as f64;
            if index > 0 {
                rho = non_zero[index - 1];
                if interpolation > SMOOTH_K_TOLERANCE {
                    rho += interpolation * (non_zero[index] - non_zero[index - 1]);
                }
            } else if let Some(first) = non_zero.first() {
                rho = interpolation * first;
            }
        } else if let Some(max) = non_zero.iter().copied().reduce(f64::max) {
            rho = max;
        }

        let mut lo = 0.0;
        let mut hi = f64::INFINITY;
        let mut mid = 1.0;
        for _ in 0..SMOOTH_K_ITERATIONS {
            let psum: f64 = row
                .iter()
                .skip(1)
                .map(|d| {
                    let shifted = d - rho;
                    if shifted > 0.0 {
                        (-shifted / mid).exp()
                    } else {
                        1.0
                    }
                })
                .sum();

            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }
            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                if hi == f64::INFINITY {
                    mid *= 2.0;
                } else {
                    mid = (lo + hi) / 2.0;
                }
            }
        }

        let floor = if rho > 0.0 {
            let mean_row = if row.is_empty() {
                0.0
            } else {
                row.iter().sum::<f64>() / row.len() as f64
            };
            MIN_K_DIST_SCALE * mean_row
        } else {
            MIN_K_DIST_SCALE * mean_distances
        };

        sigmas.push(mid.max(floor));
        rhos.push(rho);
    }

    (sigmas, rhos)
}

/// Membership strength of a neighbour at distance `d` from a row with `rho`/`sigma`
#[inline]
fn membership(d: f64, rho: f64, sigma: f64) -> f64 {
    if d - rho <= 0.0 || sigma == 0.0 {
        1.0
    } else {
        (-(d - rho) / sigma).exp()
    }
}

/// One weighted, directed edge of the neighbour graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub head: usize,
    pub tail: usize,
    pub weight: f64,
}

/// Symmetric fuzzy neighbour graph of the fit set.
///
/// Directed memberships `P` are combined by fuzzy union `P + Pᵀ - P∘Pᵀ`.
/// Edges are returned in (head, tail) order with zero weights removed.
pub fn fuzzy_simplicial_set(knn: &KnnGraph, sigmas: &[f64], rhos: &[f64]) -> Vec<Edge> {
    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, (indices, distances)) in knn.indices.iter().zip(&knn.distances).enumerate() {
        for (&j, &d) in indices.iter().zip(distances) {
            if j == i {
                continue;
            }
            let w = membership(d, rhos[i], sigmas[i]);
            if w > 0.0 {
                directed.insert((i, j), w);
            }
        }
    }

    let mut union: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let transpose = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let combined = w + transpose - w * transpose;
        union.insert((i, j), combined);
        union.insert((j, i), combined);
    }

    union
        .into_iter()
        .filter(|(_, w)| *w > 0.0)
        .map(|((head, tail), weight)| Edge { head, tail, weight })
        .collect()
}

/// Bipartite edges from new rows (heads) to fit-set rows (tails)
pub fn bipartite_edges(knn: &KnnGraph, sigmas: &[f64], rhos: &[f64]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for (i, (indices, distances)) in knn.indices.iter().zip(&knn.distances).enumerate() {
        for (&j, &d) in indices.iter().zip(distances) {
            let weight = membership(d, rhos[i], sigmas[i]);
            if weight > 0.0 {
                edges.push(Edge {
                    head: i,
                    tail: j,
                    weight,
                });
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> FeatureMatrix {
        FeatureMatrix::from_rows(&[vec![0.0], vec![1.0], vec![3.0], vec![6.0]])
    }

    #[test]
    fn test_nearest_neighbors_includes_self_first() {
        let m = line();
        let knn = nearest_neighbors(&m, &m, 3);
        assert_eq!(knn.indices[0], vec![0, 1, 2]);
        assert_eq!(knn.distances[0], vec![0.0, 1.0, 3.0]);
        assert_eq!(knn.indices[3], vec![3, 2, 1]);
    }

    #[test]
    fn test_nearest_neighbors_breaks_ties_by_index() {
        let m = FeatureMatrix::from_rows(&[vec![0.0], vec![1.0], vec![-1.0]]);
        let knn = nearest_neighbors(&m, &m, 3);
        assert_eq!(knn.indices[0], vec![0, 1, 2]);
    }

    #[test]
    fn test_k_is_capped_at_reference_size() {
        let m = line();
        let knn = nearest_neighbors(&m, &m, 15);
        assert!(knn.indices.iter().all(|row| row.len() == 4));
    }

    #[test]
    fn test_smooth_knn_dist_hits_target_sum() {
        let m = line();
        let knn = nearest_neighbors(&m, &m, 4);
        let (sigmas, rhos) = smooth_knn_dist(&knn.distances, 4.0, 1.0);

        // rho is the nearest non-zero distance
        assert_eq!(rhos[0], 1.0);
        for (row, (&sigma, &rho)) in knn.distances.iter().zip(sigmas.iter().zip(&rhos)) {
            let psum: f64 = row.iter().skip(1).map(|d| membership(*d, rho, sigma)).sum();
            assert!((psum - 2.0).abs() < 1e-3, "psum {} for sigma {}", psum, sigma);
        }
    }

    #[test]
    fn test_fuzzy_union_is_symmetric() {
        let m = line();
        let knn = nearest_neighbors(&m, &m, 2);
        let (sigmas, rhos) = smooth_knn_dist(&knn.distances, 2.0, 1.0);
        let edges = fuzzy_simplicial_set(&knn, &sigmas, &rhos);

        for e in &edges {
            let back = edges
                .iter()
                .find(|o| o.head == e.tail && o.tail == e.head)
                .expect("missing reverse edge");
            assert_eq!(back.weight, e.weight);
            assert!(e.weight > 0.0 && e.weight <= 1.0);
            assert_ne!(e.head, e.tail);
        }
    }
}
