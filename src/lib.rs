//! osmclip - regional OSM extract clipping and POI derivation.
//!
//! This library provides the pipeline stages used by the osmclip
//! binary: boundary loading, extract fetching, layer synthesis,
//! clipping, export, and point classification.

pub mod boundary;
pub mod classify;
pub mod clip;
pub mod config;
pub mod export;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod transform;

pub use models::{LayerFeature, LayerKind};
