//! Low-dimensional layout: curve parameters, initialization and the SGD optimizer

use faer::{Mat, Side};
use rand::Rng;
use rand_pcg::Pcg32;

use super::neighbors::Edge;
use super::Point2;
use crate::pipeline::matrix::FeatureMatrix;

/// Samples of the target curve used to fit `a` and `b`
const CURVE_SAMPLES: usize = 300;

/// Levenberg-Marquardt iteration cap for the curve fit
const CURVE_FIT_ITERATIONS: usize = 200;

/// Gradient components are clipped to this magnitude
const GRADIENT_CLIP: f64 = 4.0;

/// Coordinates of the initial layout span `[0, INIT_EXTENT]` on each axis
const INIT_EXTENT: f64 = 10.0;

/// Magnitude of the uniform jitter added to the spectral initialization
const INIT_JITTER: f64 = 1e-4;

/// Eigenvalues at or below this carry no variance worth projecting onto
const MIN_EIGENVALUE: f64 = 1e-12;

#[inline]
fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn curve(x: f64, a: f64, b: f64) -> f64 {
    1.0 / (1.0 + a * x.powf(2.0 * b))
}

/// Fit `a`, `b` so that `1 / (1 + a·x^(2b))` approximates the membership curve
/// implied by `spread` and `min_dist`: flat at 1 until `min_dist`, then
/// `exp(-(x - min_dist) / spread)`.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..CURVE_SAMPLES)
        .map(|i| 3.0 * spread * i as f64 / (CURVE_SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| (curve(x, a, b) - y).powi(2))
            .sum()
    };

    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    let mut lambda = 1e-3;
    let mut current = sse(a, b);

    for _ in 0..CURVE_FIT_ITERATIONS {
        // Normal equations J^T J and J^T r for the two parameters
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            if x == 0.0 {
                // f(0) = 1 regardless of a and b
                continue;
            }
            let p = x.powf(2.0 * b);
            let denom = (1.0 + a * p).powi(2);
            let da = -p / denom;
            let db = -a * p * 2.0 * x.ln() / denom;
            let r = curve(x, a, b) - y;
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }

        let mut accepted = false;
        while lambda < 1e12 {
            let m00 = jaa * (1.0 + lambda);
            let m11 = jbb * (1.0 + lambda);
            let det = m00 * m11 - jab * jab;
            if det.abs() < f64::MIN_POSITIVE {
                lambda *= 10.0;
                continue;
            }
            let step_a = -(m11 * ga - jab * gb) / det;
            let step_b = -(m00 * gb - jab * ga) / det;
            let (na, nb) = (a + step_a, b + step_b);

            if na > 0.0 && nb > 0.0 {
                let candidate = sse(na, nb);
                if candidate < current {
                    let converged = (step_a.abs() + step_b.abs()) < 1e-12;
                    a = na;
                    b = nb;
                    current = candidate;
                    lambda = (lambda / 10.0).max(1e-12);
                    accepted = !converged;
                    break;
                }
            }
            lambda *= 10.0;
        }

        if !accepted {
            break;
        }
    }

    (a, b)
}

/// Default epoch count for a graph with `n_vertices` head vertices
pub fn default_fit_epochs(n_vertices: usize) -> usize {
    if n_vertices <= 10_000 {
        500
    } else {
        200
    }
}

/// Default epoch count when placing `n_new` rows into an existing layout
pub fn default_transform_epochs(n_new: usize) -> usize {
    if n_new <= 10_000 {
        100
    } else {
        30
    }
}

/// Drop edges too weak to be sampled at least once in `n_epochs`
pub fn prune_edges(edges: Vec<Edge>, n_epochs: usize) -> Vec<Edge> {
    let max = edges.iter().map(|e| e.weight).fold(0.0, f64::max);
    let threshold = max / n_epochs as f64;
    edges.into_iter().filter(|e| e.weight >= threshold && e.weight > 0.0).collect()
}

/// How many epochs pass between samples of each edge; the strongest edge is
/// sampled every epoch.
pub fn epochs_per_sample(edges: &[Edge], n_epochs: usize) -> Vec<f64> {
    let max = edges.iter().map(|e| e.weight).fold(0.0, f64::max);
    edges
        .iter()
        .map(|e| {
            let n_samples = n_epochs as f64 * (e.weight / max);
            if n_samples > 0.0 {
                n_epochs as f64 / n_samples
            } else {
                -1.0
            }
        })
        .collect()
}

/// Initial fit layout from the top two principal components of `data`,
/// rescaled to `[0, 10]` per axis with a little seeded jitter.
///
/// Axes with no variance are filled uniformly at random instead.
pub fn spectral_init(data: &FeatureMatrix, rng: &mut Pcg32) -> Vec<Point2> {
    let n = data.nrows();
    let d = data.ncols();
    let mut layout = vec![[0.0; 2]; n];
    if n == 0 {
        return layout;
    }

    let means: Vec<f64> = (0..d)
        .map(|j| data.rows().map(|row| row[j]).sum::<f64>() / n as f64)
        .collect();

    let mut centered = Mat::<f64>::zeros(n, d);
    for (i, row) in data.rows().enumerate() {
        for j in 0..d {
            centered[(i, j)] = row[j] - means[j];
        }
    }

    let axes = if d == 0 {
        Vec::new()
    } else {
        let scatter = centered.transpose() * &centered;
        principal_axes(&scatter, 2)
    };

    for component in 0..2 {
        let coords: Vec<f64> = match axes.get(component) {
            Some(axis) => (0..n)
                .map(|i| (0..d).map(|j| centered[(i, j)] * axis[j]).sum())
                .collect(),
            None => vec![0.0; n],
        };

        let min = coords.iter().copied().fold(f64::INFINITY, f64::min);
        let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        for (point, value) in layout.iter_mut().zip(&coords) {
            point[component] = if range > 1e-12 {
                INIT_EXTENT * (value - min) / range + rng.gen_range(-INIT_JITTER..INIT_JITTER)
            } else {
                rng.gen_range(0.0..INIT_EXTENT)
            };
        }
    }

    layout
}

/// Eigenvectors of the `count` largest positive eigenvalues of a symmetric
/// scatter matrix, largest first.
///
/// Each vector is signed so its largest-magnitude entry is positive.
fn principal_axes(scatter: &Mat<f64>, count: usize) -> Vec<Vec<f64>> {
    let evd = scatter.selfadjoint_eigendecomposition(Side::Lower);
    let eigenvalues = evd.s().column_vector();
    let vectors = evd.u();
    let d = scatter.nrows();

    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&i, &j| {
        eigenvalues
            .read(j)
            .total_cmp(&eigenvalues.read(i))
            .then(i.cmp(&j))
    });

    order
        .into_iter()
        .take(count)
        .filter(|&c| eigenvalues.read(c) > MIN_EIGENVALUE)
        .map(|c| {
            let mut axis: Vec<f64> = (0..d).map(|j| vectors.read(j, c)).collect();
            let pivot = axis
                .iter()
                .copied()
                .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
            if pivot < 0.0 {
                axis.iter_mut().for_each(|x| *x = -*x);
            }
            axis
        })
        .collect()
}

/// Settings shared by fit and transform runs of the optimizer
#[derive(Debug, Clone, Copy)]
pub struct OptimizeSettings {
    pub a: f64,
    pub b: f64,
    pub n_epochs: usize,
    pub initial_alpha: f64,
    pub repulsion_strength: f64,
    pub negative_sample_rate: usize,
}

/// Stochastic gradient descent over the cross-entropy between the graph and
/// the layout.
///
/// Edges run from `head` points to tail points. With `tail == None` both ends
/// live in `head` and are pulled towards each other (fitting). With a fixed
/// `tail` only the head points move (placing new rows into an existing layout).
pub fn optimize_layout(
    head: &mut [Point2],
    tail: Option<&[Point2]>,
    edges: &[Edge],
    epochs_per_sample: &[f64],
    settings: &OptimizeSettings,
    rng: &mut Pcg32,
) {
    let OptimizeSettings {
        a,
        b,
        n_epochs,
        initial_alpha,
        repulsion_strength: gamma,
        negative_sample_rate,
    } = *settings;

    let n_vertices = tail.map_or(head.len(), |t| t.len());
    if n_vertices == 0 || edges.is_empty() {
        return;
    }

    let epochs_per_negative_sample: Vec<f64> = epochs_per_sample
        .iter()
        .map(|e| e / negative_sample_rate as f64)
        .collect();
    let mut next_sample: Vec<f64> = epochs_per_sample.to_vec();
    let mut next_negative_sample = epochs_per_negative_sample.clone();
    let mut alpha = initial_alpha;

    let tail_point = |head: &[Point2], k: usize| -> Point2 {
        match tail {
            Some(t) => t[k],
            None => head[k],
        }
    };

    for epoch in 0..n_epochs {
        let n = epoch as f64;
        for (i, edge) in edges.iter().enumerate() {
            if epochs_per_sample[i] <= 0.0 || next_sample[i] > n {
                continue;
            }

            let j = edge.head;
            let k = edge.tail;
            let current = head[j];
            let other = tail_point(head, k);

            let dist_squared = squared(current, other);
            let coeff = if dist_squared > 0.0 {
                -2.0 * a * b * dist_squared.powf(b - 1.0) / (a * dist_squared.powf(b) + 1.0)
            } else {
                0.0
            };

            for d in 0..2 {
                let grad = clip(coeff * (current[d] - other[d]));
                head[j][d] += grad * alpha;
                if tail.is_none() {
                    head[k][d] -= grad * alpha;
                }
            }

            next_sample[i] += epochs_per_sample[i];

            let n_negative = ((n - next_negative_sample[i]) / epochs_per_negative_sample[i]).max(0.0) as usize;
            for _ in 0..n_negative {
                let k = rng.gen_range(0..n_vertices);
                let current = head[j];
                let other = tail_point(head, k);

                let dist_squared = squared(current, other);
                let coeff = if dist_squared > 0.0 {
                    2.0 * gamma * b / ((0.001 + dist_squared) * (a * dist_squared.powf(b) + 1.0))
                } else {
                    continue;
                };

                for d in 0..2 {
                    let grad = if coeff > 0.0 {
                        clip(coeff * (current[d] - other[d]))
                    } else {
                        0.0
                    };
                    head[j][d] += grad * alpha;
                }
            }

            next_negative_sample[i] += n_negative as f64 * epochs_per_negative_sample[i];
        }

        alpha = initial_alpha * (1.0 - n / n_epochs as f64);
    }
}

#[inline]
fn squared(p: Point2, q: Point2) -> f64 {
    (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)
}
