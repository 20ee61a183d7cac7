//! The fixed five-layer model synthesized from an extract.
//!
//! Every OSM object is routed to at most one layer by its type and
//! tags. Tags a layer promotes to named attributes are excluded from
//! the serialized `other_tags` field.

use osmpbfreader::{Tags, Way};

/// Boilerplate keys that never make an object significant and never
/// enter `other_tags`.
const IGNORED_KEYS: [&str; 5] = ["created_by", "source", "note", "fixme", "odbl"];

/// The five layers, in their enumeration (and export) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Points,
    Lines,
    Multilinestrings,
    Multipolygons,
    OtherRelations,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Points,
        LayerKind::Lines,
        LayerKind::Multilinestrings,
        LayerKind::Multipolygons,
        LayerKind::OtherRelations,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Points => "points",
            LayerKind::Lines => "lines",
            LayerKind::Multilinestrings => "multilinestrings",
            LayerKind::Multipolygons => "multipolygons",
            LayerKind::OtherRelations => "other_relations",
        }
    }

    /// Tag keys promoted to named attributes on this layer.
    pub fn promoted_keys(&self) -> &'static [&'static str] {
        match self {
            LayerKind::Points => &[
                "name", "barrier", "highway", "ref", "address", "is_in", "place", "man_made",
            ],
            LayerKind::Lines => &[
                "name", "highway", "waterway", "aerialway", "barrier", "man_made", "railway",
                "z_order",
            ],
            LayerKind::Multilinestrings => &["name", "type"],
            LayerKind::Multipolygons => &[
                "name",
                "type",
                "aeroway",
                "amenity",
                "admin_level",
                "barrier",
                "boundary",
                "building",
                "craft",
                "landuse",
                "leisure",
                "natural",
                "office",
                "place",
                "shop",
                "sport",
                "tourism",
            ],
            LayerKind::OtherRelations => &["name", "type"],
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

pub fn is_ignored_key(key: &str) -> bool {
    IGNORED_KEYS.contains(&key)
}

/// True if the tag set carries at least one non-boilerplate key.
pub fn has_significant_tags(tags: &Tags) -> bool {
    tags.iter().any(|(key, _)| !is_ignored_key(key.as_str()))
}

/// True if a closed way should become a polygon rather than a line.
///
/// A way is an area when it is closed and either carries `area=yes`,
/// or has at least four node entries and none of `area=no`, `highway`
/// or `barrier`.
pub fn is_area_way(way: &Way) -> bool {
    let closed = way.nodes.len() >= 2 && way.nodes.first() == way.nodes.last();
    if !closed {
        return false;
    }
    if way.tags.contains("area", "yes") {
        return true;
    }
    way.nodes.len() >= 4
        && !way.tags.contains("area", "no")
        && !way.tags.contains_key("highway")
        && !way.tags.contains_key("barrier")
}

/// Serialize leftover tags as `"key"=>"value"` pairs joined by commas,
/// keys in lexicographic order, embedded quotes and backslashes
/// escaped. None when no tag is left over.
pub fn build_other_tags(kind: LayerKind, tags: &Tags) -> Option<String> {
    let promoted = kind.promoted_keys();
    let mut leftover: Vec<(&str, &str)> = tags
        .iter()
        .filter(|(key, _)| !is_ignored_key(key.as_str()) && !promoted.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    if leftover.is_empty() {
        return None;
    }

    leftover.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (i, (key, value)) in leftover.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_quoted(&mut out, key);
        out.push_str("=>");
        push_quoted(&mut out, value);
    }
    Some(out)
}

fn push_quoted(out: &mut String, raw: &str) {
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}
