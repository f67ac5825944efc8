// Hazard result data models
use super::geometry::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terrain and fire statistics for one basin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasinStats {
    pub slope_rad: f64,
    pub burn_ratio: f64,
    pub high_severity_ratio: f64,
}

impl BasinStats {
    /// Substituted when a basin's rasters cannot be read at all
    pub const CONSERVATIVE_DEFAULT: BasinStats = BasinStats {
        slope_rad: 0.26,
        burn_ratio: 0.85,
        high_severity_ratio: 0.40,
    };
}

/// Ordinal hazard tier, 0 (Very Low) to 3 (High)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum HazardClass {
    VeryLow = 0,
    Low = 1,
    Moderate = 2,
    High = 3,
}

impl From<HazardClass> for u8 {
    fn from(class: HazardClass) -> u8 {
        class as u8
    }
}

impl TryFrom<u8> for HazardClass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HazardClass::VeryLow),
            1 => Ok(HazardClass::Low),
            2 => Ok(HazardClass::Moderate),
            3 => Ok(HazardClass::High),
            other => Err(format!("Hazard class out of range: {}", other)),
        }
    }
}

/// Model output for one rainfall intensity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardEstimate {
    pub i15_mm_hr: f64,
    pub probability: f64,
    pub volume_m3: f64,
    pub hazard: HazardClass,
}

/// One basin with its model results, in geographic coordinates
#[derive(Debug, Clone)]
pub struct HazardRecord {
    pub geometry: Geometry,
    pub area_km2: f64,
    pub stats: BasinStats,
    pub estimates: Vec<HazardEstimate>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

impl HazardRecord {
    pub fn to_feature(&self) -> Feature {
        let mut properties = Map::new();
        properties.insert("Area_km2".to_string(), Value::from(round_to(self.area_km2, 4)));
        properties.insert("BurnRatio".to_string(), Value::from(round_to(self.stats.burn_ratio, 4)));
        properties.insert("Slope".to_string(), Value::from(round_to(self.stats.slope_rad, 4)));

        // Keyed by schedule position, not by intensity value
        for (i, estimate) in self.estimates.iter().enumerate() {
            properties.insert(format!("P_{}", i), Value::from(estimate.probability));
            properties.insert(format!("V_{}", i), Value::from(estimate.volume_m3));
            properties.insert(format!("H_{}", i), Value::from(estimate.hazard as u8));
        }

        Feature::new(self.geometry.clone(), properties)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry,
            properties,
        }
    }

    pub fn property_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
