//! Pipeline module - reconcile, encode, project and map credit records

pub mod artifact;
pub mod columns;
pub mod config;
pub mod encoder;
pub mod error;
pub mod loader;
pub mod mapping;
pub mod matrix;
pub mod orchestrate;
pub mod projector;
pub mod reconcile;
pub mod schema;

pub use config::*;
pub use encoder::{group_purpose, group_saving_accounts, FeatureEncoder};
pub use error::{AlignmentIssue, PipelineError, SchemaAlignmentWarning};
pub use loader::{load_dataset, save_dataset};
pub use mapping::{load_models, map_frame, map_new_records, MappingOutcome};
pub use matrix::FeatureMatrix;
pub use orchestrate::*;
pub use projector::{FittedProjector, Point2, Projector, ProjectorParams};
pub use reconcile::*;
pub use schema::Provenance;
