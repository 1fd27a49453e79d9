//! Neighbour-graph projection of encoded features onto a 2-D plane
//!
//! Fitting builds a fuzzy k-nearest-neighbour graph of the fit set, starts
//! from its two principal components and refines the layout with negative
//! sampling SGD. The fitted projector keeps the fit set and its layout so
//! rows encoded later can be placed against them without moving any fitted
//! point.

pub mod layout;
pub mod neighbors;

use std::path::Path;

use anyhow::Result;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::artifact::{load_artifact, save_artifact, ArtifactKind};
use super::error::PipelineError;
use super::matrix::FeatureMatrix;
use layout::{
    default_fit_epochs, default_transform_epochs, epochs_per_sample, find_ab_params,
    optimize_layout, prune_edges, spectral_init, OptimizeSettings,
};
use neighbors::{bipartite_edges, fuzzy_simplicial_set, nearest_neighbors, smooth_knn_dist};

/// One point of a 2-D layout
pub type Point2 = [f64; 2];

/// Tuning of the projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectorParams {
    /// Neighbourhood size of the graph
    pub n_neighbors: usize,
    /// Minimum spacing of points in the layout
    pub min_dist: f64,
    /// Scale of the layout
    pub spread: f64,
    /// Seed of every random draw; equal seeds and inputs give equal layouts
    pub random_state: u64,
    /// Optimizer epochs for fitting; `None` chooses by data size
    pub n_epochs: Option<usize>,
    pub learning_rate: f64,
    pub repulsion_strength: f64,
    pub negative_sample_rate: usize,
    /// Number of nearest neighbours assumed to be fully connected
    pub local_connectivity: f64,
}

impl Default for ProjectorParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            random_state: 42,
            n_epochs: None,
            learning_rate: 1.0,
            repulsion_strength: 1.0,
            negative_sample_rate: 5,
            local_connectivity: 1.0,
        }
    }
}

/// An unfitted projector
#[derive(Debug, Clone, Default)]
pub struct Projector {
    params: ProjectorParams,
}

impl Projector {
    pub fn new(params: ProjectorParams) -> Self {
        Self { params }
    }

    /// Fit on `data` and return the fitted projector with the layout of every row.
    pub fn fit_transform(&self, data: &FeatureMatrix) -> Result<(FittedProjector, Vec<Point2>)> {
        let n = data.nrows();
        if n == 0 {
            anyhow::bail!("Cannot fit the projector on an empty feature matrix");
        }
        if self.params.n_neighbors < 2 {
            anyhow::bail!(
                "n_neighbors must be at least 2, got {}",
                self.params.n_neighbors
            );
        }

        let (a, b) = find_ab_params(self.params.spread, self.params.min_dist);
        let mut rng = Pcg32::seed_from_u64(self.params.random_state);

        let embedding = if n == 1 {
            vec![[0.0, 0.0]]
        } else {
            // Small fit sets shrink the neighbourhood to every other row
            let k = self.params.n_neighbors.min(n - 1).max(2).min(n);
            let knn = nearest_neighbors(data, data, k);
            let (sigmas, rhos) =
                smooth_knn_dist(&knn.distances, k as f64, self.params.local_connectivity);
            let edges = fuzzy_simplicial_set(&knn, &sigmas, &rhos);

            let n_epochs = self.params.n_epochs.unwrap_or_else(|| default_fit_epochs(n));
            let edges = prune_edges(edges, n_epochs);
            let schedule = epochs_per_sample(&edges, n_epochs);

            let mut layout = spectral_init(data, &mut rng);
            let settings = OptimizeSettings {
                a,
                b,
                n_epochs,
                initial_alpha: self.params.learning_rate,
                repulsion_strength: self.params.repulsion_strength,
                negative_sample_rate: self.params.negative_sample_rate,
            };
            optimize_layout(&mut layout, None, &edges, &schedule, &settings, &mut rng);
            layout
        };

        let fitted = FittedProjector {
            params: self.params.clone(),
            a,
            b,
            training: data.clone(),
            embedding: embedding.clone(),
        };
        Ok((fitted, embedding))
    }
}

/// A projector fitted on a set of encoded rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedProjector {
    params: ProjectorParams,
    a: f64,
    b: f64,
    /// Encoded rows the projector was fitted on
    training: FeatureMatrix,
    /// Layout of the fit rows, one point per row of `training`
    embedding: Vec<Point2>,
}

impl FittedProjector {
    /// Width of the encoded rows the projector was fitted on
    pub fn n_features(&self) -> usize {
        self.training.ncols()
    }

    /// Layout of the fit rows
    pub fn embedding(&self) -> &[Point2] {
        &self.embedding
    }

    /// Place new rows into the fitted layout.
    ///
    /// Each row starts at the membership-weighted mean of its nearest fit
    /// rows and is refined against the fixed fit layout. Fit points never
    /// move, and the result depends only on the fitted state and `data`.
    pub fn transform(&self, data: &FeatureMatrix) -> Result<Vec<Point2>> {
        if data.ncols() != self.n_features() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features(),
                actual: data.ncols(),
            }
            .into());
        }
        if data.nrows() == 0 {
            return Ok(Vec::new());
        }

        let n_fit = self.training.nrows();
        let k = self.params.n_neighbors.min(n_fit);
        let knn = nearest_neighbors(data, &self.training, k);

        // New rows are never their own neighbour, so no neighbour is assumed connected
        let local_connectivity = (self.params.local_connectivity - 1.0).max(0.0);
        let (sigmas, rhos) = smooth_knn_dist(&knn.distances, k as f64, local_connectivity);
        let edges = bipartite_edges(&knn, &sigmas, &rhos);

        let mut layout = self.initial_placement(&knn.indices, &edges, data.nrows());

        let n_epochs = default_transform_epochs(data.nrows());
        let edges = prune_edges(edges, n_epochs);
        let schedule = epochs_per_sample(&edges, n_epochs);
        let settings = OptimizeSettings {
            a: self.a,
            b: self.b,
            n_epochs,
            initial_alpha: self.params.learning_rate / 4.0,
            repulsion_strength: self.params.repulsion_strength,
            negative_sample_rate: self.params.negative_sample_rate,
        };
        let mut rng = Pcg32::seed_from_u64(self.params.random_state);
        optimize_layout(
            &mut layout,
            Some(&self.embedding),
            &edges,
            &schedule,
            &settings,
            &mut rng,
        );

        Ok(layout)
    }

    /// Membership-weighted mean of each row's neighbours in the fit layout;
    /// the nearest neighbour's position when every membership underflows.
    fn initial_placement(
        &self,
        neighbors: &[Vec<usize>],
        edges: &[neighbors::Edge],
        n_rows: usize,
    ) -> Vec<Point2> {
        let mut sums = vec![[0.0; 2]; n_rows];
        let mut totals = vec![0.0; n_rows];
        for edge in edges {
            let anchor = self.embedding[edge.tail];
            sums[edge.head][0] += edge.weight * anchor[0];
            sums[edge.head][1] += edge.weight * anchor[1];
            totals[edge.head] += edge.weight;
        }

        sums.into_iter()
            .zip(totals)
            .enumerate()
            .map(|(i, (sum, total))| {
                if total > 0.0 {
                    [sum[0] / total, sum[1] / total]
                } else {
                    neighbors[i]
                        .first()
                        .map_or([0.0, 0.0], |&nearest| self.embedding[nearest])
                }
            })
            .collect()
    }

    /// Persist as a versioned model artifact tagged with the encoder layout
    pub fn save(&self, path: &Path, feature_names: Vec<String>) -> Result<()> {
        save_artifact(path, ArtifactKind::Projector, feature_names, self)
    }

    /// Load a projector written by [`Self::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = load_artifact::<Self>(path, ArtifactKind::Projector)?;
        Ok(artifact.payload)
    }
}
