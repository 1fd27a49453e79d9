//! credit-embed: reconcile credit records and project them into a 2-D map
//!
//! Training, counterfactual and user-submitted records are merged into one
//! canonical table, encoded into a fixed-width feature matrix and laid out
//! with a neighbour-graph embedding. The fitted encoder and projector are
//! persisted so new records can later be placed into the same map.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
