//! Derives POI files from the exported points layer.
//!
//! Classification is purely textual: a point belongs to a subset when
//! its raw tag text contains that subset's marker. The markers match
//! the serialized `other_tags` form, so `"shop"=>` hits keys only while
//! `"school"` also hits values like `building=school`. A point may land
//! in several subsets, or in none.

use anyhow::{Context, Result};
use geojson::Feature;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::export::{read_feature_collection, write_features};

/// Subset output names and the tag-text markers that select them.
pub const MARKERS: [(&str, &str); 4] = [
    ("shops", "\"shop\"=>"),
    ("schools", "\"school\""),
    ("kindergartens", "\"kindergarten\""),
    ("offices", "\"office\""),
];

/// Stand-in tag text for points with no unpromoted tags at all.
pub const MISSING_TAG_TEXT: &str = "none";

/// What the classification stage did, for the run summary.
#[derive(Debug, Default)]
pub struct ClassifySummary {
    pub points: usize,
    pub distinct_tag_texts: usize,
    pub subset_counts: Vec<(String, usize)>,
    pub skipped: Vec<PathBuf>,
}

fn tag_text(feature: &Feature) -> &str {
    feature
        .properties
        .as_ref()
        .and_then(|properties| properties.get("other_tags"))
        .and_then(|value| value.as_str())
        .unwrap_or(MISSING_TAG_TEXT)
}

/// Classify the exported points into the tag-text CSV and the four
/// subset files under `poi_dir`. Outputs that already exist are left
/// untouched. When every output exists the points file is not even
/// read.
pub fn classify_points(points_path: &Path, poi_dir: &Path) -> Result<ClassifySummary> {
    std::fs::create_dir_all(poi_dir)
        .with_context(|| format!("Failed to create {}", poi_dir.display()))?;

    let csv_path = poi_dir.join("other_tags.csv");
    let subset_paths: Vec<(&str, &str, PathBuf)> = MARKERS
        .iter()
        .map(|(name, marker)| (*name, *marker, poi_dir.join(format!("{}.geojson", name))))
        .collect();

    let mut summary = ClassifySummary::default();

    let all_present = csv_path.exists() && subset_paths.iter().all(|(_, _, path)| path.exists());
    if all_present {
        info!("All POI outputs already present, skipping classification");
        summary.skipped.push(csv_path);
        for (_, _, path) in subset_paths {
            summary.skipped.push(path);
        }
        return Ok(summary);
    }

    let collection = read_feature_collection(points_path)
        .with_context(|| format!("Failed to load points from {}", points_path.display()))?;
    summary.points = collection.features.len();
    info!("Classifying {} points", summary.points);

    if csv_path.exists() {
        info!("{} already present, skipping", csv_path.display());
        summary.skipped.push(csv_path);
    } else {
        summary.distinct_tag_texts = write_distinct_tag_texts(&csv_path, &collection.features)?;
    }

    for (name, marker, path) in subset_paths {
        if path.exists() {
            info!("{} already present, skipping", path.display());
            summary.skipped.push(path);
            continue;
        }
        let members: Vec<Feature> = collection
            .features
            .iter()
            .filter(|feature| tag_text(feature).contains(marker))
            .cloned()
            .collect();
        let count = members.len();
        write_features(&path, members)?;
        info!("Subset {}: {} points", name, count);
        summary.subset_counts.push((name.to_string(), count));
    }

    Ok(summary)
}

/// One CSV column of the distinct raw tag texts, in first-seen order.
fn write_distinct_tag_texts(path: &Path, features: &[Feature]) -> Result<usize> {
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for feature in features {
        let text = feature
            .properties
            .as_ref()
            .and_then(|properties| properties.get("other_tags"))
            .and_then(|value| value.as_str());
        if let Some(text) = text {
            if seen.insert(text.to_string()) {
                distinct.push(text.to_string());
            }
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["other_tags"])?;
    for text in &distinct {
        writer.write_record([text.as_str()])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} distinct tag texts to {}", distinct.len(), path.display());
    Ok(distinct.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Geometry, Point};
    use osmpbfreader::Tags;

    use crate::export::write_layer;
    use crate::models::{LayerFeature, LayerKind, OsmType};

    fn point(id: i64, pairs: &[(&str, &str)]) -> LayerFeature {
        let mut tags = Tags::new();
        for (key, value) in pairs {
            tags.insert((*key).into(), (*value).into());
        }
        LayerFeature::new(
            LayerKind::Points,
            OsmType::Node,
            id,
            Geometry::Point(Point::new(0.0, 0.0)),
            &tags,
        )
    }

    fn write_points(dir: &Path, features: &[LayerFeature]) -> PathBuf {
        write_layer(dir, LayerKind::Points, features).unwrap()
    }

    fn subset_ids(poi_dir: &Path, name: &str) -> Vec<i64> {
        let collection =
            read_feature_collection(&poi_dir.join(format!("{}.geojson", name))).unwrap();
        collection
            .features
            .iter()
            .map(|feature| {
                feature
                    .properties
                    .as_ref()
                    .unwrap()
                    .get("osm_id")
                    .unwrap()
                    .as_i64()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_bakery_only_in_shops() {
        let dir = tempfile::tempdir().unwrap();
        let points_path = write_points(dir.path(), &[point(1, &[("shop", "bakery")])]);
        let poi_dir = dir.path().join("poi");

        classify_points(&points_path, &poi_dir).unwrap();

        assert_eq!(subset_ids(&poi_dir, "shops"), vec![1]);
        assert!(subset_ids(&poi_dir, "schools").is_empty());
        assert!(subset_ids(&poi_dir, "kindergartens").is_empty());
        assert!(subset_ids(&poi_dir, "offices").is_empty());
    }

    #[test]
    fn test_multi_subset_membership() {
        let dir = tempfile::tempdir().unwrap();
        let points_path = write_points(
            dir.path(),
            &[point(5, &[("shop", "books"), ("building", "office")])],
        );
        let poi_dir = dir.path().join("poi");

        classify_points(&points_path, &poi_dir).unwrap();

        assert_eq!(subset_ids(&poi_dir, "shops"), vec![5]);
        assert_eq!(subset_ids(&poi_dir, "offices"), vec![5]);
    }

    #[test]
    fn test_school_marker_matches_values() {
        let dir = tempfile::tempdir().unwrap();
        let points_path = write_points(
            dir.path(),
            &[
                point(1, &[("building", "school")]),
                point(2, &[("amenity", "school")]),
                point(3, &[("shop", "bakery")]),
            ],
        );
        let poi_dir = dir.path().join("poi");

        classify_points(&points_path, &poi_dir).unwrap();

        assert_eq!(subset_ids(&poi_dir, "schools"), vec![1, 2]);
    }

    #[test]
    fn test_existing_subset_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let points_path = write_points(dir.path(), &[point(1, &[("shop", "bakery")])]);
        let poi_dir = dir.path().join("poi");
        std::fs::create_dir_all(&poi_dir).unwrap();
        let sentinel = poi_dir.join("shops.geojson");
        std::fs::write(&sentinel, "sentinel").unwrap();

        let summary = classify_points(&points_path, &poi_dir).unwrap();

        assert_eq!(std::fs::read_to_string(&sentinel).unwrap(), "sentinel");
        assert!(summary.skipped.contains(&sentinel));
        assert!(poi_dir.join("offices.geojson").exists());
    }

    #[test]
    fn test_complete_outputs_skip_load() {
        let dir = tempfile::tempdir().unwrap();
        let poi_dir = dir.path().join("poi");
        std::fs::create_dir_all(&poi_dir).unwrap();
        std::fs::write(poi_dir.join("other_tags.csv"), "other_tags\n").unwrap();
        for (name, _) in MARKERS {
            std::fs::write(poi_dir.join(format!("{}.geojson", name)), "sentinel").unwrap();
        }

        // The points path does not exist; reading it would fail.
        let missing = dir.path().join("missing.geojson");
        let summary = classify_points(&missing, &poi_dir).unwrap();
        assert_eq!(summary.skipped.len(), 5);
        assert_eq!(summary.points, 0);
    }

    #[test]
    fn test_distinct_tag_texts() {
        let dir = tempfile::tempdir().unwrap();
        let points_path = write_points(
            dir.path(),
            &[
                point(1, &[("shop", "bakery")]),
                point(2, &[("shop", "bakery")]),
                point(3, &[("shop", "butcher")]),
                point(4, &[]),
            ],
        );
        let poi_dir = dir.path().join("poi");

        let summary = classify_points(&points_path, &poi_dir).unwrap();
        assert_eq!(summary.distinct_tag_texts, 2);

        let mut reader = csv::Reader::from_path(poi_dir.join("other_tags.csv")).unwrap();
        let values: Vec<String> = reader
            .records()
            .map(|record| record.unwrap()[0].to_string())
            .collect();
        assert_eq!(
            values,
            vec!["\"shop\"=>\"bakery\"", "\"shop\"=>\"butcher\""]
        );
    }
}
