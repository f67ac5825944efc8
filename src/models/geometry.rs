// GeoJSON-compatible geometry models
use serde::{Deserialize, Serialize};
use std::fmt;

/// A GeoJSON position: x, y and an optional z
pub type Position = Vec<f64>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl Geometry {
    pub fn polygon(exterior: Vec<Position>) -> Self {
        Geometry::Polygon {
            coordinates: vec![exterior],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Polygon { coordinates } => coordinates.iter().all(|ring| ring.is_empty()),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .all(|polygon| polygon.iter().all(|ring| ring.is_empty())),
        }
    }

    /// Checks the shape a user-drawn analysis zone must have: a single polygon
    /// whose rings are closed and carry at least four positions.
    pub fn validate_zone(&self) -> Result<(), String> {
        let rings = match self {
            Geometry::Polygon { coordinates } => coordinates,
            Geometry::MultiPolygon { .. } => {
                return Err("Must be GeoJSON Polygon geometry.".to_string())
            }
        };

        if rings.is_empty() {
            return Err("Polygon has no rings".to_string());
        }

        for ring in rings {
            if ring.len() < 4 {
                return Err(format!("Ring has {} positions, need at least 4", ring.len()));
            }
            if ring.iter().any(|p| p.len() < 2 || p.iter().any(|c| !c.is_finite())) {
                return Err("Ring contains an invalid position".to_string());
            }
            if ring.first().map(|p| &p[..2]) != ring.last().map(|p| &p[..2]) {
                return Err("Ring is not closed".to_string());
            }
        }
        Ok(())
    }
}

/// Coordinate reference system identified by EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub const fn epsg(epsg: u32) -> Self {
        Self { epsg }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// A vector layer read from disk. The CRS is absent when the producing tool stripped it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorLayer {
    pub crs: Option<Crs>,
    pub geometries: Vec<Geometry>,
}

/// The analysis boundary in both working representations
#[derive(Debug, Clone)]
pub struct Perimeter {
    pub projected: Geometry,
    pub geographic: Geometry,
    pub crs: Crs,
}

/// A delineated sub-watershed in the projected working CRS
#[derive(Debug, Clone)]
pub struct Basin {
    pub geometry: Geometry,
    pub area_km2: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::polygon(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 0.0],
        ])
    }

    #[test]
    fn test_geojson_shape() {
        let json = serde_json::to_value(square()).unwrap();
        assert_eq!(json["type"], "Polygon");
        assert_eq!(json["coordinates"][0][2][1], 1.0);

        let parsed: Geometry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, square());
    }

    #[test]
    fn test_zone_validation() {
        assert!(square().validate_zone().is_ok());

        let open = Geometry::polygon(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
        ]);
        assert!(open.validate_zone().is_err());

        let multi = Geometry::MultiPolygon {
            coordinates: vec![vec![vec![vec![0.0, 0.0]]]],
        };
        assert!(multi.validate_zone().unwrap_err().contains("Polygon"));
    }

    #[test]
    fn test_non_polygon_rejected_at_parse() {
        let point = serde_json::json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert!(serde_json::from_value::<Geometry>(point).is_err());
    }

    #[test]
    fn test_empty_geometry() {
        assert!(Geometry::Polygon { coordinates: vec![] }.is_empty());
        assert!(!square().is_empty());
    }
}
