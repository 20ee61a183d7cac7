//! Core data models for layer synthesis.

pub mod feature;
pub mod layer;

pub use feature::{LayerFeature, OsmType};
pub use layer::{build_other_tags, has_significant_tags, is_area_way, is_ignored_key, LayerKind};
