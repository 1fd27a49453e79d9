//! Report module - embedding export and run summaries

pub mod embedding_export;
pub mod summary;

pub use embedding_export::*;
pub use summary::*;
