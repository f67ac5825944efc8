//! Debris-flow likelihood, volume and combined hazard class.
//!
//! Likelihood follows the Staley et al. (2017) M1 logistic form, volume the
//! Gartner et al. (2014) log-linear regression, and the combined class the
//! Cannon et al. (2010) style threshold table.

use crate::models::{BasinStats, HazardClass, HazardEstimate};
use serde::Serialize;

pub const STALEY_B0: f64 = -3.63;
pub const STALEY_B1: f64 = 0.41;
pub const STALEY_B2: f64 = 0.67;
pub const STALEY_B3: f64 = 0.07;

pub const GARTNER_A0: f64 = -1.87;
pub const GARTNER_A1: f64 = 0.56;
pub const GARTNER_A2: f64 = 0.97;
pub const GARTNER_A3: f64 = 0.61;

/// Area floor keeping the log term defined for degenerate basins
pub const MIN_MODEL_AREA_KM2: f64 = 0.01;

#[derive(Debug, Clone, Serialize)]
pub struct ModelCoefficients {
    pub staley: [f64; 4],
    pub gartner: [f64; 4],
}

pub fn coefficients() -> ModelCoefficients {
    ModelCoefficients {
        staley: [STALEY_B0, STALEY_B1, STALEY_B2, STALEY_B3],
        gartner: [GARTNER_A0, GARTNER_A1, GARTNER_A2, GARTNER_A3],
    }
}

/// Logistic likelihood of a debris flow at 15-minute intensity `i15` (mm/hr).
pub fn probability(stats: &BasinStats, i15: f64) -> f64 {
    let terrain = STALEY_B1 * (2.0 * stats.slope_rad).sin();
    let fire = STALEY_B2 * stats.high_severity_ratio;
    let rainfall = STALEY_B3 * (i15 * stats.burn_ratio).max(0.0).sqrt();
    let x = STALEY_B0 + terrain + fire + rainfall;
    1.0 / (1.0 + (-x).exp())
}

/// Expected debris-flow volume in m³.
pub fn volume(stats: &BasinStats, area_km2: f64, i15: f64) -> f64 {
    let log_v = GARTNER_A0
        + GARTNER_A1 * i15.max(1.0).log10()
        + GARTNER_A2 * area_km2.max(MIN_MODEL_AREA_KM2).log10()
        + GARTNER_A3 * stats.high_severity_ratio;
    10f64.powf(log_v)
}

/// High needs both conditions; the lower tiers trigger on either one.
pub fn classify(probability: f64, volume_m3: f64) -> HazardClass {
    if probability >= 0.60 && volume_m3 >= 1000.0 {
        HazardClass::High
    } else if probability >= 0.40 || volume_m3 >= 500.0 {
        HazardClass::Moderate
    } else if probability >= 0.20 || volume_m3 >= 100.0 {
        HazardClass::Low
    } else {
        HazardClass::VeryLow
    }
}

/// One estimate per schedule entry, in schedule order.
pub fn evaluate(stats: &BasinStats, area_km2: f64, schedule: &[f64]) -> Vec<HazardEstimate> {
    schedule
        .iter()
        .map(|&i15| {
            let probability = probability(stats, i15);
            let volume_m3 = volume(stats, area_km2, i15);
            HazardEstimate {
                i15_mm_hr: i15,
                probability,
                volume_m3,
                hazard: classify(probability, volume_m3),
            }
        })
        .collect()
}
