use geo_types::Geometry;
use geojson::Feature;
use osmpbfreader::Tags;
use serde_json::{Map, Value as JsonValue};

use super::layer::{build_other_tags, LayerKind};

/// Which kind of OSM object a feature came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

/// One feature of a synthesized layer: a geometry plus the attributes
/// written to the layer's output file.
#[derive(Debug, Clone)]
pub struct LayerFeature {
    pub layer: LayerKind,
    pub osm_type: OsmType,
    pub osm_id: i64,
    pub geometry: Geometry<f64>,
    /// Promoted tag attributes, in the layer's promoted-key order.
    pub fields: Vec<(&'static str, String)>,
    pub other_tags: Option<String>,
}

impl LayerFeature {
    pub fn new(
        layer: LayerKind,
        osm_type: OsmType,
        osm_id: i64,
        geometry: Geometry<f64>,
        tags: &Tags,
    ) -> Self {
        let mut fields = Vec::new();
        for key in layer.promoted_keys() {
            if let Some(value) = tags.get(*key) {
                fields.push((*key, value.to_string()));
            }
        }
        let other_tags = build_other_tags(layer, tags);
        Self {
            layer,
            osm_type,
            osm_id,
            geometry,
            fields,
            other_tags,
        }
    }

    /// Name of the id attribute. Way-derived multipolygon features keep
    /// their id under `osm_way_id` so they cannot collide with
    /// relation-derived ones.
    pub fn id_field(&self) -> &'static str {
        if self.layer == LayerKind::Multipolygons && self.osm_type == OsmType::Way {
            "osm_way_id"
        } else {
            "osm_id"
        }
    }

    pub fn to_geojson(&self) -> Feature {
        let mut properties = Map::new();
        properties.insert(self.id_field().to_string(), JsonValue::from(self.osm_id));
        for (key, value) in &self.fields {
            properties.insert((*key).to_string(), JsonValue::String(value.clone()));
        }
        if let Some(text) = &self.other_tags {
            properties.insert("other_tags".to_string(), JsonValue::String(text.clone()));
        }
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &self.geometry,
            ))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        let mut tags = Tags::new();
        for (key, value) in pairs {
            tags.insert((*key).into(), (*value).into());
        }
        tags
    }

    fn point_feature(pairs: &[(&str, &str)]) -> LayerFeature {
        LayerFeature::new(
            LayerKind::Points,
            OsmType::Node,
            42,
            Geometry::Point(Point::new(19.455, 51.759)),
            &tags(pairs),
        )
    }

    #[test]
    fn test_promoted_tags_become_fields() {
        let feature = point_feature(&[("name", "Piekarnia"), ("shop", "bakery")]);
        assert_eq!(
            feature.fields,
            vec![("name", "Piekarnia".to_string())]
        );
        assert_eq!(feature.other_tags.as_deref(), Some("\"shop\"=>\"bakery\""));
    }

    #[test]
    fn test_way_multipolygon_id_field() {
        let tags = tags(&[("building", "yes")]);
        let from_way = LayerFeature::new(
            LayerKind::Multipolygons,
            OsmType::Way,
            7,
            Geometry::Point(Point::new(0.0, 0.0)),
            &tags,
        );
        let from_relation = LayerFeature::new(
            LayerKind::Multipolygons,
            OsmType::Relation,
            7,
            Geometry::Point(Point::new(0.0, 0.0)),
            &tags,
        );
        assert_eq!(from_way.id_field(), "osm_way_id");
        assert_eq!(from_relation.id_field(), "osm_id");
        assert_eq!(point_feature(&[]).id_field(), "osm_id");
    }

    #[test]
    fn test_geojson_properties() {
        let feature = point_feature(&[("shop", "bakery")]).to_geojson();
        let properties = feature.properties.expect("properties");
        assert_eq!(properties.get("osm_id"), Some(&JsonValue::from(42)));
        assert_eq!(
            properties.get("other_tags").and_then(|v| v.as_str()),
            Some("\"shop\"=>\"bakery\"")
        );
        assert!(feature.geometry.is_some());
    }
}
