//! The run pipeline: boundary, extract, layer export, classification.
//!
//! Every output file doubles as a cache entry. A stage whose output
//! already exists is skipped, so rerunning after a failure resumes
//! where the previous run stopped.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::boundary::load_boundary;
use crate::classify::{classify_points, ClassifySummary};
use crate::clip::BoundaryClipper;
use crate::export::{layer_path, write_layer};
use crate::extract::{build_layers, extract_filename, fetch_extract, LayerSet};
use crate::models::{LayerFeature, LayerKind};
use crate::transform;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub boundary: PathBuf,
    pub extract_url: String,
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
}

#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub extract_path: PathBuf,
    pub extract_downloaded: bool,
    pub layers_exported: Vec<LayerKind>,
    pub layers_skipped: Vec<LayerKind>,
    pub classify: ClassifySummary,
}

/// Run the whole pipeline once.
pub async fn run(options: &PipelineOptions) -> Result<RunSummary> {
    let started_at = Utc::now();

    let boundary = load_boundary(&options.boundary)?;

    let extract_name = extract_filename(&options.extract_url)?;
    let extract_path = options.data_dir.join(extract_name);
    let extract_downloaded = fetch_extract(&options.extract_url, &extract_path).await?;

    let layers_dir = options.out_dir.join("layers");
    let poi_dir = options.out_dir.join("poi");

    let mut layers_exported = Vec::new();
    let mut layers_skipped = Vec::new();
    let mut missing = Vec::new();
    for kind in LayerKind::ALL {
        if layer_path(&layers_dir, kind).exists() {
            info!("Layer {} already exported, skipping", kind.name());
            layers_skipped.push(kind);
        } else {
            missing.push(kind);
        }
    }

    if !missing.is_empty() {
        let set = build_layers(&extract_path)?;
        let clipper = BoundaryClipper::new(boundary.clone());
        for kind in missing {
            export_clipped_layer(&set, &clipper, &layers_dir, kind)?;
            layers_exported.push(kind);
        }
    }

    // The classifier depends on the points layer, so its presence is
    // checked once more before classification starts.
    let points_path = layer_path(&layers_dir, LayerKind::Points);
    if !points_path.exists() {
        let set = build_layers(&extract_path)?;
        let clipper = BoundaryClipper::new(boundary.clone());
        export_clipped_layer(&set, &clipper, &layers_dir, LayerKind::Points)?;
        layers_exported.push(LayerKind::Points);
    }

    let classify = classify_points(&points_path, &poi_dir)?;

    let summary = RunSummary {
        started_at,
        extract_path,
        extract_downloaded,
        layers_exported,
        layers_skipped,
        classify,
    };
    log_summary(&summary);
    Ok(summary)
}

fn export_clipped_layer(
    set: &LayerSet,
    clipper: &BoundaryClipper,
    layers_dir: &Path,
    kind: LayerKind,
) -> Result<()> {
    let features = set.layer(kind);
    let mut inside: Vec<LayerFeature> = Vec::new();
    for feature in features {
        if let Some(clipped) = clipper.clip(&feature.geometry) {
            let mut kept = feature.clone();
            kept.geometry = transform::geometry_to_puwg92(&clipped);
            inside.push(kept);
        }
    }
    info!(
        "Layer {}: {} of {} features inside the boundary",
        kind.name(),
        inside.len(),
        features.len()
    );
    write_layer(layers_dir, kind, &inside)?;
    Ok(())
}

fn names(kinds: &[LayerKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn counts(pairs: &[(String, usize)]) -> String {
    if pairs.is_empty() {
        return "none".to_string();
    }
    pairs
        .iter()
        .map(|(name, count)| format!("{} {}", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_summary(summary: &RunSummary) {
    let elapsed = (Utc::now() - summary.started_at).num_seconds();
    info!("Pipeline finished in {}s", elapsed);
    info!(
        "Extract {}: {}",
        summary.extract_path.display(),
        if summary.extract_downloaded {
            "downloaded"
        } else {
            "cached"
        }
    );
    info!("Layers exported: {}", names(&summary.layers_exported));
    info!("Layers skipped: {}", names(&summary.layers_skipped));
    info!("POI subsets: {}", counts(&summary.classify.subset_counts));
    info!("POI outputs reused: {}", summary.classify.skipped.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = r#"{
        "type": "Polygon",
        "coordinates": [[[19.0, 51.5], [20.0, 51.5], [20.0, 52.0], [19.0, 52.0], [19.0, 51.5]]]
    }"#;

    #[tokio::test]
    async fn test_rerun_with_outputs_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let boundary_path = dir.path().join("boundary.geojson");
        std::fs::write(&boundary_path, BOUNDARY).unwrap();

        // The extract is garbage bytes. With every output present it
        // must never be parsed.
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(data_dir.join("region.osm.pbf"), b"not a real extract").unwrap();

        let out_dir = dir.path().join("out");
        let layers_dir = out_dir.join("layers");
        std::fs::create_dir_all(&layers_dir).unwrap();
        for kind in LayerKind::ALL {
            std::fs::write(layer_path(&layers_dir, kind), "sentinel").unwrap();
        }
        let poi_dir = out_dir.join("poi");
        std::fs::create_dir_all(&poi_dir).unwrap();
        std::fs::write(poi_dir.join("other_tags.csv"), "other_tags\n").unwrap();
        for name in ["shops", "schools", "kindergartens", "offices"] {
            std::fs::write(poi_dir.join(format!("{}.geojson", name)), "sentinel").unwrap();
        }

        let options = PipelineOptions {
            boundary: boundary_path,
            // Unroutable; reaching the network would fail the run.
            extract_url: "http://127.0.0.1:1/region.osm.pbf".to_string(),
            data_dir,
            out_dir: out_dir.clone(),
        };
        let summary = run(&options).await.unwrap();

        assert!(!summary.extract_downloaded);
        assert!(summary.layers_exported.is_empty());
        assert_eq!(summary.layers_skipped.len(), 5);
        for kind in LayerKind::ALL {
            let content = std::fs::read_to_string(layer_path(&layers_dir, kind)).unwrap();
            assert_eq!(content, "sentinel");
        }
        assert_eq!(
            std::fs::read_to_string(poi_dir.join("shops.geojson")).unwrap(),
            "sentinel"
        );
    }

    #[test]
    fn test_layer_name_join() {
        assert_eq!(names(&[]), "none");
        assert_eq!(
            names(&[LayerKind::Points, LayerKind::Lines]),
            "points, lines"
        );
    }

    #[test]
    fn test_subset_count_join() {
        assert_eq!(counts(&[]), "none");
        assert_eq!(
            counts(&[("shops".to_string(), 12), ("schools".to_string(), 3)]),
            "shops 12, schools 3"
        );
    }
}
