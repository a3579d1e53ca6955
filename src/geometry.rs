//! Drawn geometries and their GeoJSON export.
//!
//! Annotations drawn on the map (markers, transect lines, region polygons)
//! accumulate in a [`GeometrySet`] and can be written out as a GeoJSON
//! FeatureCollection in geographic coordinates.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::viewport::wrap_longitude;

/// A drawn shape in geographic (lon, lat) coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point { lon: f64, lat: f64 },
    LineString { coordinates: Vec<(f64, f64)> },
    /// Exterior ring only; first and last coordinates need not repeat,
    /// the exporter closes the ring
    Polygon { ring: Vec<(f64, f64)> },
}

impl Geometry {
    fn geojson(&self) -> Value {
        match self {
            Geometry::Point { lon, lat } => json!({
                "type": "Point",
                "coordinates": [wrap_longitude(*lon), lat],
            }),
            Geometry::LineString { coordinates } => json!({
                "type": "LineString",
                "coordinates": coords_json(coordinates),
            }),
            Geometry::Polygon { ring } => {
                let mut closed = ring.clone();
                if closed.first() != closed.last() {
                    if let Some(&first) = closed.first() {
                        closed.push(first);
                    }
                }
                json!({
                    "type": "Polygon",
                    "coordinates": [coords_json(&closed)],
                })
            }
        }
    }
}

fn coords_json(coordinates: &[(f64, f64)]) -> Value {
    Value::Array(
        coordinates
            .iter()
            .map(|(lon, lat)| json!([wrap_longitude(*lon), lat]))
            .collect(),
    )
}

/// One annotation with optional properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// The set of annotations currently drawn on the map.
#[derive(Debug, Clone, Default)]
pub struct GeometrySet {
    features: Vec<Feature>,
}

impl GeometrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a drawn feature; returns its index.
    pub fn append(&mut self, feature: Feature) -> usize {
        self.features.push(feature);
        self.features.len() - 1
    }

    /// Remove a feature by index; out-of-range indices are a no-op.
    pub fn remove(&mut self, index: usize) -> Option<Feature> {
        if index < self.features.len() {
            Some(self.features.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.features.clear();
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// GeoJSON FeatureCollection in EPSG:4326.
    pub fn to_geojson_value(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "geometry": f.geometry.geojson(),
                    "properties": Value::Object(
                        f.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                    ),
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "crs": {
                "type": "name",
                "properties": { "name": "urn:ogc:def:crs:EPSG::4326" },
            },
            "features": features,
        })
    }

    /// Write the collection to a GeoJSON file.
    pub fn write_geojson(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &self.to_geojson_value())?;
        info!(path = %path.display(), features = self.features.len(), "Wrote annotations");
        Ok(())
    }
}

/// Cursor readout text for a geographic position.
pub fn cursor_label(lat: f64, lon: f64) -> String {
    format!(
        "Latitude: {:8.4}\u{00b0}, Longitude: {:8.4}\u{00b0}",
        lat,
        wrap_longitude(lon)
    )
}
