//! Clip boundary loading.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use geo::MapCoords;
use geo_types::{Geometry, MultiPolygon, Polygon};
use geojson::GeoJson;
use thiserror::Error;
use tracing::info;

use crate::transform;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("failed to read boundary file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse boundary file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },
    #[error("boundary file {} contains no polygonal geometry", .path.display())]
    NoPolygon { path: PathBuf },
    #[error("boundary file {} declares unsupported CRS {crs}", .path.display())]
    UnsupportedCrs { path: PathBuf, crs: String },
}

/// Load the clip boundary as a multi-polygon in EPSG:4326.
///
/// Accepts a GeoJSON geometry, feature, or feature collection, plain or
/// gzip-compressed. A legacy `crs` member naming EPSG:2180 triggers
/// reprojection back to EPSG:4326; any other named CRS is rejected.
pub fn load_boundary(path: &Path) -> Result<MultiPolygon<f64>, BoundaryError> {
    info!("Loading boundary from {}", path.display());

    let text = read_boundary_text(path)?;
    let geojson: GeoJson = text.parse().map_err(|source| BoundaryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let projected = match declared_crs(&geojson) {
        None => false,
        Some(name) if crs_is_wgs84(&name) => false,
        Some(name) if crs_is_puwg92(&name) => true,
        Some(name) => {
            return Err(BoundaryError::UnsupportedCrs {
                path: path.to_path_buf(),
                crs: name,
            })
        }
    };

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for value in geometry_values(geojson) {
        let geometry =
            Geometry::<f64>::try_from(value).map_err(|source| BoundaryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        collect_polygons(geometry, &mut polygons);
    }

    if polygons.is_empty() {
        return Err(BoundaryError::NoPolygon {
            path: path.to_path_buf(),
        });
    }

    let mut boundary = MultiPolygon::new(polygons);
    if projected {
        boundary = boundary.map_coords(transform::unproject);
    }

    info!("Boundary has {} polygons", boundary.0.len());
    Ok(boundary)
}

fn read_boundary_text(path: &Path) -> Result<String, BoundaryError> {
    let io_error = |source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let mut reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(io_error)?;
    Ok(text)
}

/// The geometry values held by a GeoJSON document, whatever its shape.
fn geometry_values(geojson: GeoJson) -> Vec<geojson::Value> {
    match geojson {
        GeoJson::Geometry(geometry) => vec![geometry.value],
        GeoJson::Feature(feature) => feature.geometry.map(|g| g.value).into_iter().collect(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry.map(|g| g.value))
            .collect(),
    }
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(polygons) => out.extend(polygons.0),
        Geometry::GeometryCollection(collection) => {
            for member in collection.0 {
                collect_polygons(member, out);
            }
        }
        _ => {}
    }
}

/// Name in the legacy `crs` member, if the document carries one.
fn declared_crs(geojson: &GeoJson) -> Option<String> {
    let members = match geojson {
        GeoJson::Geometry(geometry) => geometry.foreign_members.as_ref(),
        GeoJson::Feature(feature) => feature.foreign_members.as_ref(),
        GeoJson::FeatureCollection(collection) => collection.foreign_members.as_ref(),
    }?;
    members
        .get("crs")?
        .pointer("/properties/name")?
        .as_str()
        .map(|name| name.to_string())
}

fn crs_is_puwg92(name: &str) -> bool {
    name == "urn:ogc:def:crs:EPSG::2180" || name.eq_ignore_ascii_case("epsg:2180")
}

fn crs_is_wgs84(name: &str) -> bool {
    name == "urn:ogc:def:crs:OGC:1.3:CRS84"
        || name == "urn:ogc:def:crs:EPSG::4326"
        || name.eq_ignore_ascii_case("epsg:4326")
        || name.eq_ignore_ascii_case("crs84")
}
