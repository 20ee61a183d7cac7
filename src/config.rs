use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Region presets loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub regions: Vec<RegionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub extract_url: String,
    pub boundary: PathBuf,
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn region(&self, name: &str) -> Option<&RegionConfig> {
        self.regions.iter().find(|region| region.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[regions]]
        name = "lodzkie"
        extract_url = "https://download.geofabrik.de/europe/poland/lodzkie-latest.osm.pbf"
        boundary = "data/lodzkie.geojson"

        [[regions]]
        name = "mazowieckie"
        extract_url = "https://download.geofabrik.de/europe/poland/mazowieckie-latest.osm.pbf"
        boundary = "data/mazowieckie.geojson"
    "#;

    #[test]
    fn test_parse_presets() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.regions.len(), 2);

        let region = config.region("lodzkie").unwrap();
        assert_eq!(region.boundary, PathBuf::from("data/lodzkie.geojson"));
    }

    #[test]
    fn test_unknown_region() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert!(config.region("pomorskie").is_none());
    }
}
