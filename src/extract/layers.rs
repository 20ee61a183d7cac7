//! Turns a raw extract into the five thematic layers.

use anyhow::{Context, Result};
use geo_types::{Geometry, MultiPolygon, Point};
use indicatif::{ProgressBar, ProgressStyle};
use osmpbfreader::{OsmObj, OsmPbfReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use super::resolver::GeometryResolver;
use crate::models::{has_significant_tags, is_area_way, LayerFeature, LayerKind, OsmType};

/// The five layers synthesized from one extract scan.
pub struct LayerSet {
    layers: [Vec<LayerFeature>; 5],
}

impl LayerSet {
    fn new() -> Self {
        Self {
            layers: Default::default(),
        }
    }

    pub fn layer(&self, kind: LayerKind) -> &[LayerFeature] {
        &self.layers[kind.index()]
    }

    fn push(&mut self, feature: LayerFeature) {
        self.layers[feature.layer.index()].push(feature);
    }
}

/// Read the extract and synthesize all five layers.
pub fn build_layers(path: &Path) -> Result<LayerSet> {
    info!("Building layers from {}", path.display());
    let file = File::open(path)
        .with_context(|| format!("Failed to open extract {}", path.display()))?;
    let mut reader = OsmPbfReader::new(BufReader::new(file));

    let resolver = GeometryResolver::build(&mut reader)?;

    info!("Synthesizing layer features...");
    reader.rewind()?;
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} objects ({per_sec})")?,
    );

    let mut set = LayerSet::new();
    for obj in reader.iter() {
        emit_feature(&obj?, &resolver, &mut set);
        progress.inc(1);
    }
    progress.finish_and_clear();

    log_layer_counts(&set);
    Ok(set)
}

/// Synthesize layers from already-decoded objects. Used by tests.
pub fn build_layers_from_objects(objects: &[OsmObj]) -> Result<LayerSet> {
    let resolver = GeometryResolver::from_objects(objects)?;
    let mut set = LayerSet::new();
    for obj in objects {
        emit_feature(obj, &resolver, &mut set);
    }
    Ok(set)
}

fn log_layer_counts(set: &LayerSet) {
    for kind in LayerKind::ALL {
        info!("Layer {}: {} features", kind.name(), set.layer(kind).len());
    }
}

fn emit_feature(obj: &OsmObj, resolver: &GeometryResolver, set: &mut LayerSet) {
    match obj {
        OsmObj::Node(node) => {
            if !has_significant_tags(&node.tags) {
                return;
            }
            set.push(LayerFeature::new(
                LayerKind::Points,
                OsmType::Node,
                node.id.0,
                Geometry::Point(Point::new(node.lon(), node.lat())),
                &node.tags,
            ));
        }
        OsmObj::Way(way) => {
            if !has_significant_tags(&way.tags) {
                return;
            }
            if is_area_way(way) {
                match resolver.resolve_area(way.id) {
                    Some(polygon) => set.push(LayerFeature::new(
                        LayerKind::Multipolygons,
                        OsmType::Way,
                        way.id.0,
                        Geometry::MultiPolygon(MultiPolygon::new(vec![polygon])),
                        &way.tags,
                    )),
                    None => debug!("Dropping area way {} with unresolved nodes", way.id.0),
                }
            } else {
                match resolver.resolve_line(way.id) {
                    Some(line) => set.push(LayerFeature::new(
                        LayerKind::Lines,
                        OsmType::Way,
                        way.id.0,
                        Geometry::LineString(line),
                        &way.tags,
                    )),
                    None => debug!("Dropping way {} with unresolved nodes", way.id.0),
                }
            }
        }
        OsmObj::Relation(rel) => {
            if !has_significant_tags(&rel.tags) {
                return;
            }
            let relation_type = rel.tags.get("type").map(|v| v.as_str()).unwrap_or("");
            match relation_type {
                "route" => match resolver.resolve_route(rel.id) {
                    Some(lines) => set.push(LayerFeature::new(
                        LayerKind::Multilinestrings,
                        OsmType::Relation,
                        rel.id.0,
                        Geometry::MultiLineString(lines),
                        &rel.tags,
                    )),
                    None => debug!("Dropping route relation {} with no members", rel.id.0),
                },
                "multipolygon" | "boundary" => match resolver.resolve_multipolygon(rel.id) {
                    Some(polygons) => set.push(LayerFeature::new(
                        LayerKind::Multipolygons,
                        OsmType::Relation,
                        rel.id.0,
                        Geometry::MultiPolygon(polygons),
                        &rel.tags,
                    )),
                    None => debug!(
                        "Dropping multipolygon relation {} with no closed rings",
                        rel.id.0
                    ),
                },
                _ => match resolver.resolve_collection(rel.id) {
                    Some(collection) => set.push(LayerFeature::new(
                        LayerKind::OtherRelations,
                        OsmType::Relation,
                        rel.id.0,
                        Geometry::GeometryCollection(collection),
                        &rel.tags,
                    )),
                    None => debug!("Dropping relation {} with no members", rel.id.0),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osmpbfreader::{Node, NodeId, OsmId, Ref, Relation, RelationId, Tags, Way, WayId};

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        let mut tags = Tags::new();
        for (key, value) in pairs {
            tags.insert((*key).into(), (*value).into());
        }
        tags
    }

    fn node(id: i64, lon: f64, lat: f64, pairs: &[(&str, &str)]) -> OsmObj {
        OsmObj::Node(Node {
            id: NodeId(id),
            decimicro_lat: (lat * 1e7) as i32,
            decimicro_lon: (lon * 1e7) as i32,
            tags: tags(pairs),
        })
    }

    fn way(id: i64, nodes: &[i64], pairs: &[(&str, &str)]) -> OsmObj {
        OsmObj::Way(Way {
            id: WayId(id),
            nodes: nodes.iter().map(|n| NodeId(*n)).collect(),
            tags: tags(pairs),
        })
    }

    fn relation(id: i64, pairs: &[(&str, &str)], members: &[(i64, &str)]) -> OsmObj {
        OsmObj::Relation(Relation {
            id: RelationId(id),
            refs: members
                .iter()
                .map(|(way_id, role)| Ref {
                    member: OsmId::Way(WayId(*way_id)),
                    role: (*role).into(),
                })
                .collect(),
            tags: tags(pairs),
        })
    }

    #[test]
    fn test_tagged_node_is_point() {
        let objects = vec![node(1, 19.5, 51.7, &[("shop", "bakery")])];
        let set = build_layers_from_objects(&objects).unwrap();
        assert_eq!(set.layer(LayerKind::Points).len(), 1);
        assert_eq!(set.layer(LayerKind::Lines).len(), 0);
    }

    #[test]
    fn test_untagged_node_skipped() {
        let objects = vec![
            node(1, 19.5, 51.7, &[]),
            node(2, 19.5, 51.7, &[("created_by", "iD")]),
        ];
        let set = build_layers_from_objects(&objects).unwrap();
        for kind in LayerKind::ALL {
            assert_eq!(set.layer(kind).len(), 0);
        }
    }

    #[test]
    fn test_open_highway_is_line() {
        let objects = vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 1.0, 0.0, &[]),
            way(10, &[1, 2], &[("highway", "residential")]),
        ];
        let set = build_layers_from_objects(&objects).unwrap();
        assert_eq!(set.layer(LayerKind::Lines).len(), 1);
        assert_eq!(set.layer(LayerKind::Multipolygons).len(), 0);
    }

    #[test]
    fn test_closed_building_is_multipolygon() {
        let objects = vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 1.0, 0.0, &[]),
            node(3, 1.0, 1.0, &[]),
            way(10, &[1, 2, 3, 1], &[("building", "yes")]),
        ];
        let set = build_layers_from_objects(&objects).unwrap();
        let features = set.layer(LayerKind::Multipolygons);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id_field(), "osm_way_id");
    }

    #[test]
    fn test_route_relation_layer() {
        let objects = vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 1.0, 0.0, &[]),
            way(10, &[1, 2], &[]),
            relation(20, &[("type", "route"), ("route", "bus")], &[(10, "")]),
        ];
        let set = build_layers_from_objects(&objects).unwrap();
        assert_eq!(set.layer(LayerKind::Multilinestrings).len(), 1);
    }

    #[test]
    fn test_unknown_relation_layer() {
        let objects = vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 1.0, 0.0, &[]),
            way(10, &[1, 2], &[]),
            relation(
                20,
                &[("type", "site"), ("name", "Campus")],
                &[(10, "")],
            ),
        ];
        let set = build_layers_from_objects(&objects).unwrap();
        assert_eq!(set.layer(LayerKind::OtherRelations).len(), 1);
    }
}
