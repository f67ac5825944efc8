// Stage 8: per-basin slope and burn severity

use super::fallback::{recover, DEFAULT_SLOPE_DEG};
use super::{Fallback, Pipeline, Stage, Workspace};
use crate::error::{GatewayError, PipelineError};
use crate::models::{AnalysisSettings, Basin, BasinStats};
use log::debug;
use std::path::Path;

/// Mean slope in radians from cell values in degrees
pub fn mean_slope_rad(slope_deg: &[f64]) -> Result<f64, Fallback> {
    let valid: Vec<f64> = slope_deg.iter().copied().filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        return Err(Fallback::DefaultSlope);
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    Ok(mean.to_radians())
}

/// Fractions of valid dNBR cells above the moderate and high severity thresholds.
///
/// Cells at or below the floor are sentinel noise and excluded from both
/// numerator and denominator.
pub fn burn_ratios(dnbr: &[f64], settings: &AnalysisSettings) -> Result<(f64, f64), Fallback> {
    let valid: Vec<f64> = dnbr
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > settings.dnbr_floor)
        .collect();
    if valid.is_empty() {
        return Err(Fallback::DefaultBurnRatios);
    }

    let total = valid.len() as f64;
    let burned = valid.iter().filter(|v| **v > settings.moderate_dnbr_threshold).count() as f64;
    let high = valid.iter().filter(|v| **v > settings.high_dnbr_threshold).count() as f64;
    Ok((burned / total, high / total))
}

impl Pipeline {
    pub(super) async fn basin_statistics(
        &self,
        job_id: &str,
        filled_dem: &Path,
        basins: &[Basin],
        workspace: &Workspace,
    ) -> Result<Vec<BasinStats>, PipelineError> {
        let at = || PipelineError::at(Stage::BasinStatistics);
        let slope = self
            .watershed
            .slope(filled_dem, &workspace.artifact("slope.tif"))
            .await
            .map_err(at())?;
        let dnbr = self
            .geo
            .reproject_raster(&self.settings.dnbr_path, self.projected_crs(), &workspace.artifact("dnbr_utm.tif"))
            .await
            .map_err(at())?;

        let mut stats = Vec::with_capacity(basins.len());
        for basin in basins {
            let sampled = self.sample_basin(job_id, &slope, &dnbr, basin).await;
            stats.push(recover(job_id, sampled, |_| BasinStats::CONSERVATIVE_DEFAULT));
        }
        Ok(stats)
    }

    async fn sample_basin(
        &self,
        job_id: &str,
        slope: &Path,
        dnbr: &Path,
        basin: &Basin,
    ) -> Result<BasinStats, Fallback> {
        let unreadable = |e: GatewayError| Fallback::DefaultStats { reason: e.to_string() };
        let slope_deg = self.geo.mask_values(slope, &basin.geometry).await.map_err(unreadable)?;
        let dnbr_values = self.geo.mask_values(dnbr, &basin.geometry).await.map_err(unreadable)?;

        let slope_rad = recover(job_id, mean_slope_rad(&slope_deg), |_| DEFAULT_SLOPE_DEG.to_radians());
        let default = BasinStats::CONSERVATIVE_DEFAULT;
        let (burn_ratio, high_severity_ratio) = recover(job_id, burn_ratios(&dnbr_values, &self.settings), |_| {
            (default.burn_ratio, default.high_severity_ratio)
        });

        debug!(
            "Basin {:.4} km2: slope {:.4} rad, burn {:.3}, high {:.3}",
            basin.area_km2, slope_rad, burn_ratio, high_severity_ratio
        );
        Ok(BasinStats {
            slope_rad,
            burn_ratio,
            high_severity_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_slope_converts_to_radians() {
        let rad = mean_slope_rad(&[10.0, 30.0, f64::NAN]).unwrap();
        assert!((rad - 20f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_slope_requests_default() {
        assert_eq!(mean_slope_rad(&[]), Err(Fallback::DefaultSlope));
    }

    #[test]
    fn test_burn_ratios_exclude_sentinel_cells() {
        let settings = AnalysisSettings::default();
        let (burn, high) = burn_ratios(&[-9999.0, 50.0, 150.0, 600.0, 700.0], &settings).unwrap();
        assert_eq!(burn, 0.75);
        assert_eq!(high, 0.5);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let settings = AnalysisSettings::default();
        let (burn, high) = burn_ratios(&[100.0, 500.0], &settings).unwrap();
        assert_eq!(burn, 0.5);
        assert_eq!(high, 0.0);
    }

    #[test]
    fn test_no_valid_dnbr_requests_defaults() {
        let settings = AnalysisSettings::default();
        assert_eq!(burn_ratios(&[-6000.0], &settings), Err(Fallback::DefaultBurnRatios));
    }
}
