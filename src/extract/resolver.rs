//! Way and relation geometry resolution.
//!
//! Ways and relations carry node references only; turning them into
//! geometries needs the coordinates of every referenced node. The
//! resolver scans the extract in three passes (relations, ways, nodes)
//! and keeps node coordinates in an on-disk store so large extracts do
//! not need the whole node table in memory.

use anyhow::Result;
use geo::Contains;
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPolygon, Point,
    Polygon,
};
use hashbrown::{HashMap, HashSet};
use osmpbfreader::{NodeId, OsmId, OsmObj, OsmPbfReader, RelationId, WayId};
use sled::Db;
use std::io::{Read, Seek};
use tempfile::{Builder, TempDir};
use tracing::info;

use crate::models::has_significant_tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberRole {
    Outer,
    Inner,
    Other,
}

fn member_role(role: &str) -> MemberRole {
    match role {
        "inner" => MemberRole::Inner,
        "outer" | "" => MemberRole::Outer,
        _ => MemberRole::Other,
    }
}

#[derive(Debug, Default, Clone)]
struct RelationMembers {
    ways: Vec<(WayId, MemberRole)>,
    nodes: Vec<NodeId>,
}

/// Resolves way and relation geometries against stored node coordinates.
pub struct GeometryResolver {
    node_store: Db,
    way_nodes: HashMap<WayId, Vec<NodeId>>,
    relation_members: HashMap<RelationId, RelationMembers>,
    needed_ways: HashSet<WayId>,
    needed_nodes: HashSet<NodeId>,
    // Keeps the sled directory alive as long as the resolver is.
    _store_dir: TempDir,
}

impl GeometryResolver {
    /// Build the resolver by scanning the extract. Three passes:
    /// relations, ways, then node coordinates.
    pub fn build<R: Read + Seek>(reader: &mut OsmPbfReader<R>) -> Result<Self> {
        let mut resolver = Self::empty()?;

        info!("Pass 1/3: scanning relations...");
        reader.rewind()?;
        for obj in reader.iter() {
            resolver.note_relation(&obj?);
        }
        info!("Tracking {} relations", resolver.relation_members.len());

        info!("Pass 2/3: scanning ways...");
        reader.rewind()?;
        for obj in reader.iter() {
            resolver.note_way(&obj?);
        }
        info!(
            "Tracking {} ways referencing {} nodes",
            resolver.way_nodes.len(),
            resolver.needed_nodes.len()
        );

        info!("Pass 3/3: storing node coordinates...");
        reader.rewind()?;
        let mut stored = 0u64;
        for obj in reader.iter() {
            if resolver.note_node(&obj?)? {
                stored += 1;
            }
        }
        resolver.node_store.flush()?;
        info!("Stored {} node coordinates", stored);

        Ok(resolver)
    }

    /// Build from already-decoded objects held in memory.
    pub fn from_objects(objects: &[OsmObj]) -> Result<Self> {
        let mut resolver = Self::empty()?;
        for obj in objects {
            resolver.note_relation(obj);
        }
        for obj in objects {
            resolver.note_way(obj);
        }
        for obj in objects {
            resolver.note_node(obj)?;
        }
        resolver.node_store.flush()?;
        Ok(resolver)
    }

    fn empty() -> Result<Self> {
        let store_dir = Builder::new().prefix("osmclip-nodes-").tempdir()?;
        let node_store = sled::open(store_dir.path())?;
        Ok(Self {
            node_store,
            way_nodes: HashMap::new(),
            relation_members: HashMap::new(),
            needed_ways: HashSet::new(),
            needed_nodes: HashSet::new(),
            _store_dir: store_dir,
        })
    }

    fn note_relation(&mut self, obj: &OsmObj) {
        let rel = match obj {
            OsmObj::Relation(rel) => rel,
            _ => return,
        };
        if !has_significant_tags(&rel.tags) {
            return;
        }
        let mut members = RelationMembers::default();
        for member in &rel.refs {
            match member.member {
                OsmId::Way(way_id) => {
                    members.ways.push((way_id, member_role(member.role.as_str())));
                    self.needed_ways.insert(way_id);
                }
                OsmId::Node(node_id) => {
                    members.nodes.push(node_id);
                    self.needed_nodes.insert(node_id);
                }
                // Nested relations are not resolved
                OsmId::Relation(_) => {}
            }
        }
        self.relation_members.insert(rel.id, members);
    }

    fn note_way(&mut self, obj: &OsmObj) {
        let way = match obj {
            OsmObj::Way(way) => way,
            _ => return,
        };
        if !self.needed_ways.contains(&way.id) && !has_significant_tags(&way.tags) {
            return;
        }
        for node in &way.nodes {
            self.needed_nodes.insert(*node);
        }
        self.way_nodes.insert(way.id, way.nodes.clone());
    }

    fn note_node(&mut self, obj: &OsmObj) -> Result<bool> {
        let node = match obj {
            OsmObj::Node(node) => node,
            _ => return Ok(false),
        };
        if !self.needed_nodes.contains(&node.id) {
            return Ok(false);
        }
        let key = node.id.0.to_be_bytes();
        let mut value = [0u8; 16];
        value[0..8].copy_from_slice(&node.lon().to_be_bytes());
        value[8..16].copy_from_slice(&node.lat().to_be_bytes());
        self.node_store.insert(key, &value)?;
        Ok(true)
    }

    /// Stored coordinate of a node.
    pub fn node_coord(&self, id: NodeId) -> Option<Coord<f64>> {
        let key = id.0.to_be_bytes();
        match self.node_store.get(key) {
            Ok(Some(bytes)) if bytes.len() == 16 => {
                let lon = f64::from_be_bytes(bytes[0..8].try_into().ok()?);
                let lat = f64::from_be_bytes(bytes[8..16].try_into().ok()?);
                Some(Coord { x: lon, y: lat })
            }
            _ => None,
        }
    }

    fn way_coords(&self, id: WayId) -> Option<Vec<Coord<f64>>> {
        let nodes = self.way_nodes.get(&id)?;
        let coords: Vec<Coord<f64>> = nodes
            .iter()
            .filter_map(|node| self.node_coord(*node))
            .collect();
        if coords.len() < 2 {
            return None;
        }
        Some(coords)
    }

    /// Way as an open linestring.
    pub fn resolve_line(&self, id: WayId) -> Option<LineString<f64>> {
        self.way_coords(id).map(LineString::new)
    }

    /// Closed way as a single-ring polygon.
    pub fn resolve_area(&self, id: WayId) -> Option<Polygon<f64>> {
        let mut ring = self.way_coords(id)?;
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        if ring.len() < 4 {
            return None;
        }
        Some(Polygon::new(LineString::new(ring), vec![]))
    }

    /// Route relation as one linestring per member way.
    pub fn resolve_route(&self, id: RelationId) -> Option<MultiLineString<f64>> {
        let members = self.relation_members.get(&id)?;
        let lines: Vec<LineString<f64>> = members
            .ways
            .iter()
            .filter_map(|(way_id, _)| self.resolve_line(*way_id))
            .collect();
        if lines.is_empty() {
            return None;
        }
        Some(MultiLineString::new(lines))
    }

    /// Multipolygon relation: outer member ways merged into shells,
    /// inner member ways merged into rings and attached as holes of the
    /// shell containing them. Missing members are skipped.
    pub fn resolve_multipolygon(&self, id: RelationId) -> Option<MultiPolygon<f64>> {
        let members = self.relation_members.get(&id)?;

        let mut outer: Vec<Vec<Coord<f64>>> = Vec::new();
        let mut inner: Vec<Vec<Coord<f64>>> = Vec::new();
        for (way_id, role) in &members.ways {
            let coords = match self.way_coords(*way_id) {
                Some(coords) => coords,
                None => continue,
            };
            match role {
                MemberRole::Outer => outer.push(coords),
                MemberRole::Inner => inner.push(coords),
                MemberRole::Other => {}
            }
        }

        let shells = merge_rings(outer);
        if shells.is_empty() {
            return None;
        }
        let mut polygons: Vec<Polygon<f64>> = shells
            .into_iter()
            .map(|ring| Polygon::new(ring, vec![]))
            .collect();

        for hole in merge_rings(inner) {
            // A vertex shared with the shell lies on its boundary and
            // fails strict containment; the anchor is the first vertex
            // strictly inside a shell.
            let shell = hole.0.iter().find_map(|coord| {
                let anchor = Point::from(*coord);
                polygons.iter().position(|polygon| polygon.contains(&anchor))
            });
            if let Some(index) = shell {
                polygons[index].interiors_push(hole);
            }
        }

        Some(MultiPolygon::new(polygons))
    }

    /// Any other relation: member nodes as points and member ways as
    /// lines, gathered into a geometry collection.
    pub fn resolve_collection(&self, id: RelationId) -> Option<GeometryCollection<f64>> {
        let members = self.relation_members.get(&id)?;
        let mut parts: Vec<Geometry<f64>> = Vec::new();
        for node_id in &members.nodes {
            if let Some(coord) = self.node_coord(*node_id) {
                parts.push(Geometry::Point(Point::from(coord)));
            }
        }
        for (way_id, _) in &members.ways {
            if let Some(line) = self.resolve_line(*way_id) {
                parts.push(Geometry::LineString(line));
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(GeometryCollection(parts))
    }
}

/// Merge way segments end-to-end into closed rings. Segments that
/// cannot be chained into a closable ring are dropped.
pub fn merge_rings(segments: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut result = Vec::new();
    let mut remaining = segments;

    while !remaining.is_empty() {
        let mut current = remaining.remove(0);

        // Already closed
        if current.first() == current.last() && current.len() >= 4 {
            result.push(LineString::new(current));
            continue;
        }

        let mut merged = true;
        while merged && !remaining.is_empty() {
            merged = false;

            let current_start = current.first().cloned();
            let current_end = current.last().cloned();

            for i in 0..remaining.len() {
                let segment = &remaining[i];
                let segment_start = segment.first().cloned();
                let segment_end = segment.last().cloned();

                if current_end == segment_start {
                    let mut segment = remaining.remove(i);
                    segment.remove(0); // drop the shared point
                    current.extend(segment);
                    merged = true;
                    break;
                } else if current_end == segment_end {
                    let mut segment = remaining.remove(i);
                    segment.reverse();
                    segment.remove(0);
                    current.extend(segment);
                    merged = true;
                    break;
                } else if current_start == segment_end {
                    let mut segment = remaining.remove(i);
                    segment.pop();
                    segment.extend(current);
                    current = segment;
                    merged = true;
                    break;
                } else if current_start == segment_start {
                    let mut segment = remaining.remove(i);
                    segment.reverse();
                    segment.pop();
                    segment.extend(current);
                    current = segment;
                    merged = true;
                    break;
                }
            }
        }

        // A chain that never returned to its start is not a ring
        if current.first() == current.last() && current.len() >= 4 {
            result.push(LineString::new(current));
        }
    }

    result
}
