//! Region dataset loading: parses the packed GeoJSON feature collection
//! (`properties.alpha2`, `properties.radius`) described in spec §6, either
//! from a gzip file on disk (production path) or from an embedded literal
//! (used by tests and as a fallback when no dataset file is configured).
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use geo::MultiPolygon;
use geojson::{GeoJson, Geometry, Value as GeoValue};

/// A handful of real, very coarsely simplified country polygons, enough to
/// exercise the scenarios in spec §8 (GB, BT) without shipping a multi-MB
/// production shapefile conversion in the repo.
pub const EMBEDDED_TEST_REGIONS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {"alpha2": "GB", "radius": 540000},
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-8.6, 49.8], [1.8, 49.8], [1.8, 60.9], [-8.6, 60.9], [-8.6, 49.8]]]
      }
    },
    {
      "type": "Feature",
      "properties": {"alpha2": "BT", "radius": 130000},
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[88.7, 26.7], [92.1, 26.7], [92.1, 28.4], [88.7, 28.4], [88.7, 26.7]]]
      }
    },
    {
      "type": "Feature",
      "properties": {"alpha2": "FR", "radius": 780000},
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-4.8, 42.3], [8.2, 42.3], [8.2, 51.1], [-4.8, 51.1], [-4.8, 42.3]]]
      }
    }
  ]
}"#;

/// `region_code -> (shape, radius_meters)`.
pub type RegionTable = HashMap<String, (MultiPolygon<f64>, f64)>;

pub fn load_from_geojson_str(json: &str, valid_regions: Option<&std::collections::HashSet<String>>) -> Result<RegionTable> {
    let parsed: GeoJson = json.parse().context("parsing region GeoJSON")?;
    let mut table = RegionTable::new();
    let GeoJson::FeatureCollection(fc) = parsed else {
        anyhow::bail!("region dataset must be a FeatureCollection");
    };
    for feature in fc.features {
        let Some(properties) = feature.properties.as_ref() else { continue };
        let Some(alpha2) = properties.get("alpha2").and_then(|v| v.as_str()) else { continue };
        if let Some(valid) = valid_regions {
            if !valid.contains(alpha2) {
                continue;
            }
        }
        let Some(radius) = properties.get("radius").and_then(|v| v.as_f64()) else { continue };
        let Some(geometry) = feature.geometry else { continue };
        let Some(shape) = geometry_to_multipolygon(&geometry) else { continue };
        table.insert(alpha2.to_string(), (shape, radius));
    }
    Ok(table)
}

fn geometry_to_multipolygon(geometry: &Geometry) -> Option<MultiPolygon<f64>> {
    match &geometry.value {
        GeoValue::Polygon(_) | GeoValue::MultiPolygon(_) => {
            let geom: geo_types::Geometry<f64> = geometry.value.clone().try_into().ok()?;
            match geom {
                geo_types::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
                geo_types::Geometry::MultiPolygon(mp) => Some(mp),
                _ => None,
            }
        }
        _ => None,
    }
}

pub fn load_from_gzip_file(path: &Path, valid_regions: Option<&std::collections::HashSet<String>>) -> Result<RegionTable> {
    let file = File::open(path).with_context(|| format!("opening region dataset {}", path.display()))?;
    let mut decoder = GzDecoder::new(file);
    let mut json = String::new();
    decoder.read_to_string(&mut json).context("decompressing region dataset")?;
    load_from_geojson_str(&json, valid_regions)
}
