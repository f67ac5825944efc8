//! Local recovery for degenerate geometry.
//!
//! Stages that can meet degenerate input return `Result<T, Fallback>` and the
//! caller applies the recovery documented on each variant:
//!
//! | Stage | Condition | Recovery |
//! |-------|-----------|----------|
//! | 7 | delineated layer unreadable, or no polygon survives filtering | the perimeter is the single basin |
//! | 8 | masking a basin fails | `BasinStats::CONSERVATIVE_DEFAULT` |
//! | 8 | no valid slope cells under a basin | `DEFAULT_SLOPE_DEG` |
//! | 8 | no valid burn-severity cells under a basin | default burn ratios |

use log::warn;
use std::fmt;

/// Mean slope assumed for a basin with no slope coverage
pub const DEFAULT_SLOPE_DEG: f64 = 15.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    PerimeterAsBasin { reason: String },
    DefaultStats { reason: String },
    DefaultSlope,
    DefaultBurnRatios,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::PerimeterAsBasin { reason } => write!(f, "using perimeter as the only basin: {}", reason),
            Fallback::DefaultStats { reason } => write!(f, "using default basin statistics: {}", reason),
            Fallback::DefaultSlope => write!(f, "no slope coverage, using {} degrees", DEFAULT_SLOPE_DEG),
            Fallback::DefaultBurnRatios => write!(f, "no burn severity coverage, using default ratios"),
        }
    }
}

/// Unwraps a stage result, logging and applying `recover` on fallback.
pub fn recover<T>(job_id: &str, result: Result<T, Fallback>, recover: impl FnOnce(&Fallback) -> T) -> T {
    match result {
        Ok(value) => value,
        Err(fallback) => {
            warn!("Job {}: {}", job_id, fallback);
            recover(&fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recover_passes_through_ok() {
        let value = recover("j", Ok::<_, Fallback>(3), |_| 0);
        assert_eq!(value, 3);
    }

    #[test]
    fn test_recover_applies_fallback() {
        let value = recover("j", Err(Fallback::DefaultSlope), |f| {
            assert_eq!(*f, Fallback::DefaultSlope);
            DEFAULT_SLOPE_DEG
        });
        assert_eq!(value, 15.0);
    }
}
