//! Article generation pipeline and boundary operations for articlesmith.
//!
//! This crate ties together the capability clients, the HTML transforms and
//! the storage layer into end-to-end workflows (`start_generation`,
//! `apply_generation`).

pub mod assets;
pub mod catalog;
pub mod composer;
pub mod keyword;
pub mod media;
pub mod outline;
pub mod pipeline;
pub mod service;

#[cfg(test)]
mod testing;

pub use assets::{AssetStore, FsAssetStore};
pub use catalog::WorkCatalog;
pub use pipeline::{Capabilities, ProgressReporter, SilentProgress, run_pipeline};
pub use service::{GenerationService, GenerationSummary, generation_token};
