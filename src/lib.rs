//! birdmedia: resolve species names against a media catalog, download
//! images and songs under bounded concurrency, and serve them from a local
//! cache with non-repeating selection and probabilistic rotation.
//!
//! [`pipeline::MediaPipeline`] is the entry point; the modules below it can
//! also be used on their own.

#![warn(clippy::all)]

pub mod cache;
pub mod catalog;
pub mod download;
pub mod error;
pub mod filter;
pub mod http;
pub mod pipeline;
pub mod postprocess;
pub mod resolver;
pub mod retry;
pub mod types;

#[cfg(test)]
mod testutil;

pub use error::MediaError;
pub use filter::FilterVariant;
pub use pipeline::{MediaPipeline, PipelineConfig};
pub use types::MediaKind;
