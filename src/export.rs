//! Writes layer features to GeoJSON files.

use anyhow::{bail, Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{LayerFeature, LayerKind};

/// Output file for one layer.
pub fn layer_path(dir: &Path, kind: LayerKind) -> PathBuf {
    dir.join(format!("{}.geojson", kind.name()))
}

/// The exported coordinates are in the national grid, not the GeoJSON
/// default of WGS 84. The collection carries a legacy `crs` member so
/// that GIS tools pick the right interpretation up.
fn puwg92_crs() -> JsonObject {
    let mut members = JsonObject::new();
    members.insert(
        "crs".to_string(),
        json!({
            "type": "name",
            "properties": { "name": "urn:ogc:def:crs:EPSG::2180" }
        }),
    );
    members
}

/// Serialize features into a GeoJSON feature collection at `path`.
pub fn write_features(path: &Path, features: Vec<Feature>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(puwg92_crs()),
    };
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &collection)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write one layer's features to its file under `dir`.
pub fn write_layer(dir: &Path, kind: LayerKind, features: &[LayerFeature]) -> Result<PathBuf> {
    let path = layer_path(dir, kind);
    let converted: Vec<Feature> = features.iter().map(LayerFeature::to_geojson).collect();
    let count = converted.len();
    write_features(&path, converted)?;
    info!("Wrote {} features to {}", count, path.display());
    Ok(path)
}

/// Read a feature collection written by an earlier run.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: GeoJson = text
        .parse()
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match parsed {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => bail!("{} is not a feature collection", path.display()),
    }
}
