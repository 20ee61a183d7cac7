//! Extract acquisition and layer synthesis.

mod fetch;
mod layers;
mod resolver;

pub use fetch::{extract_filename, fetch_extract};
pub use layers::{build_layers, build_layers_from_objects, LayerSet};
pub use resolver::GeometryResolver;
