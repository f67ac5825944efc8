// Aggregate statistics over a set of hazard features
use crate::models::FeatureCollection;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AreaSummary {
    pub basin_count: usize,
    pub total_area_km2: f64,
    pub hazard_distribution: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_probability: Option<f64>,
    /// Property the distribution was computed on, e.g. `P_3`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_key: Option<String>,
}

fn probability_band(p: f64) -> &'static str {
    if p >= 0.7 {
        "High"
    } else if p >= 0.4 {
        "Moderate"
    } else if p >= 0.2 {
        "Low"
    } else {
        "Very Low"
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Summarizes basins by likelihood at the highest-intensity rainfall entry
/// (the last schedule position).
pub fn summarize(collection: &FeatureCollection, schedule_len: usize) -> AreaSummary {
    let features = &collection.features;
    if features.is_empty() || schedule_len == 0 {
        return AreaSummary {
            basin_count: features.len(),
            total_area_km2: 0.0,
            hazard_distribution: BTreeMap::new(),
            average_probability: None,
            probability_key: None,
        };
    }

    let key = format!("P_{}", schedule_len - 1);
    let mut distribution: BTreeMap<String, usize> = ["High", "Moderate", "Low", "Very Low"]
        .iter()
        .map(|band| (band.to_string(), 0))
        .collect();

    let mut total_area = 0.0;
    let mut probability_sum = 0.0;
    for feature in features {
        total_area += feature.property_f64("Area_km2").unwrap_or(0.0);
        let p = feature.property_f64(&key).unwrap_or(0.0);
        probability_sum += p;
        *distribution.entry(probability_band(p).to_string()).or_insert(0) += 1;
    }

    AreaSummary {
        basin_count: features.len(),
        total_area_km2: round4(total_area),
        hazard_distribution: distribution,
        average_probability: Some(round4(probability_sum / features.len() as f64)),
        probability_key: Some(key),
    }
}
