//! Clips layer geometries to the boundary.
//!
//! The boundary polygons are indexed in an R-tree so that features far
//! outside the region are rejected on their bounding box alone, without
//! running a boolean overlay.

use geo::{BooleanOps, BoundingRect, Contains};
use geo_types::{
    Geometry, GeometryCollection, MultiLineString, MultiPolygon, Point, Polygon,
};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

struct IndexedPolygon {
    polygon: Polygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl IndexedPolygon {
    fn new(polygon: Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        Some(Self {
            polygon,
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
        })
    }
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial clipper for one boundary.
pub struct BoundaryClipper {
    tree: RTree<IndexedPolygon>,
    boundary: MultiPolygon<f64>,
}

impl BoundaryClipper {
    pub fn new(boundary: MultiPolygon<f64>) -> Self {
        let indexed: Vec<IndexedPolygon> = boundary
            .0
            .iter()
            .cloned()
            .filter_map(IndexedPolygon::new)
            .collect();
        info!("Indexed {} boundary polygons", indexed.len());
        Self {
            tree: RTree::bulk_load(indexed),
            boundary,
        }
    }

    /// The part of `geometry` inside the boundary, or `None` when
    /// nothing is left.
    pub fn clip(&self, geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
        match geometry {
            Geometry::Point(point) => self.clip_point(point).map(Geometry::Point),
            Geometry::LineString(line) => {
                let lines = MultiLineString::new(vec![line.clone()]);
                self.clip_lines(&lines).map(Geometry::MultiLineString)
            }
            Geometry::MultiLineString(lines) => {
                self.clip_lines(lines).map(Geometry::MultiLineString)
            }
            Geometry::Polygon(polygon) => {
                let polygons = MultiPolygon::new(vec![polygon.clone()]);
                self.clip_polygons(&polygons).map(Geometry::MultiPolygon)
            }
            Geometry::MultiPolygon(polygons) => {
                self.clip_polygons(polygons).map(Geometry::MultiPolygon)
            }
            Geometry::GeometryCollection(collection) => {
                let parts: Vec<Geometry<f64>> = collection
                    .0
                    .iter()
                    .filter_map(|part| self.clip(part))
                    .collect();
                if parts.is_empty() {
                    return None;
                }
                Some(Geometry::GeometryCollection(GeometryCollection(parts)))
            }
            // Layers never produce Line, Rect or Triangle geometries
            _ => None,
        }
    }

    fn clip_point(&self, point: &Point<f64>) -> Option<Point<f64>> {
        let query = AABB::from_point([point.x(), point.y()]);
        let inside = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .any(|candidate| candidate.polygon.contains(point));
        if inside {
            Some(*point)
        } else {
            None
        }
    }

    fn clip_lines(&self, lines: &MultiLineString<f64>) -> Option<MultiLineString<f64>> {
        if !self.overlaps_boundary(lines) {
            return None;
        }
        let mut clipped = self.boundary.clip(lines, false);
        clipped.0.retain(|line| line.0.len() >= 2);
        if clipped.0.is_empty() {
            return None;
        }
        Some(clipped)
    }

    fn clip_polygons(&self, polygons: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
        if !self.overlaps_boundary(polygons) {
            return None;
        }
        let clipped = self.boundary.intersection(polygons);
        if clipped.0.is_empty() {
            return None;
        }
        Some(clipped)
    }

    fn overlaps_boundary<G: BoundingRect<f64, Output = Option<geo_types::Rect<f64>>>>(
        &self,
        geometry: &G,
    ) -> bool {
        let rect = match geometry.bounding_rect() {
            Some(rect) => rect,
            None => return false,
        };
        let query = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );
        self.tree
            .locate_in_envelope_intersecting(&query)
            .next()
            .is_some()
    }
}
