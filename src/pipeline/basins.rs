// Stage 7: sub-basin delineation and filtering

use super::fallback::recover;
use super::{Fallback, Pipeline, Stage, Workspace};
use crate::error::PipelineError;
use crate::models::{Basin, Perimeter};
use log::{debug, info};
use std::path::Path;

/// Basin areas are kept when they fall inside the inclusive window.
pub fn within_area_window(area_km2: f64, min_km2: f64, max_km2: f64) -> bool {
    area_km2 >= min_km2 && area_km2 <= max_km2
}

impl Pipeline {
    pub(super) async fn delineate_basins(
        &self,
        job_id: &str,
        direction: &Path,
        streams: &Path,
        perimeter: &Perimeter,
        workspace: &Workspace,
    ) -> Result<Vec<Basin>, PipelineError> {
        let at = || PipelineError::at(Stage::DelineateBasins);
        let vector = self
            .watershed
            .delineate_subbasins(
                direction,
                streams,
                &workspace.artifact("basins.tif"),
                &workspace.artifact("basins_vec.shp"),
            )
            .await
            .map_err(at())?;

        let perimeter_area = self.geo.area_km2(&perimeter.projected).await.map_err(at())?;
        let selected = self.select_basins(&vector, perimeter).await?;

        let basins = recover(job_id, selected, |_| {
            vec![Basin {
                geometry: perimeter.projected.clone(),
                area_km2: perimeter_area,
            }]
        });
        info!("Job {}: {} sub-basins selected", job_id, basins.len());
        Ok(basins)
    }

    /// Repairs, filters and clips the delineated polygons. The outer error aborts
    /// the run; the inner one asks for the perimeter fallback.
    async fn select_basins(
        &self,
        vector: &Path,
        perimeter: &Perimeter,
    ) -> Result<Result<Vec<Basin>, Fallback>, PipelineError> {
        let at = || PipelineError::at(Stage::DelineateBasins);
        let layer = match self.geo.read_polygons(vector).await {
            Ok(layer) => layer,
            Err(e) => {
                return Ok(Err(Fallback::PerimeterAsBasin {
                    reason: format!("delineated layer unreadable: {}", e),
                }))
            }
        };

        // Raster-to-vector conversion can drop the CRS
        let projected_crs = self.projected_crs();
        let layer_crs = layer.crs.unwrap_or(projected_crs);

        let settings = &self.settings;
        let near = self
            .geo
            .buffer(&perimeter.projected, settings.basin_intersect_buffer_m)
            .await
            .map_err(at())?;
        let grown = self
            .geo
            .buffer(&perimeter.projected, settings.basin_clip_buffer_m)
            .await
            .map_err(at())?;
        let clip_to = self.geo.buffer(&grown, 0.0).await.map_err(at())?;

        let candidates = layer.geometries.len();
        let mut basins = Vec::new();
        for geometry in &layer.geometries {
            let geometry = self
                .geo
                .transform(geometry, layer_crs, projected_crs)
                .await
                .map_err(at())?;
            let repaired = self.geo.buffer(&geometry, 0.0).await.map_err(at())?;
            if repaired.is_empty() || !self.geo.intersects(&repaired, &near).await.map_err(at())? {
                continue;
            }

            let clipped = match self.geo.intersection(&repaired, &clip_to).await.map_err(at())? {
                Some(clipped) if !clipped.is_empty() => clipped,
                _ => continue,
            };
            let clipped = self.geo.buffer(&clipped, 0.0).await.map_err(at())?;

            let area_km2 = self.geo.area_km2(&clipped).await.map_err(at())?;
            if within_area_window(area_km2, settings.min_basin_area_km2, settings.max_basin_area_km2) {
                basins.push(Basin {
                    geometry: clipped,
                    area_km2,
                });
            }
        }

        debug!("{} of {} delineated polygons kept", basins.len(), candidates);
        if basins.is_empty() {
            return Ok(Err(Fallback::PerimeterAsBasin {
                reason: format!("none of {} delineated polygons survived filtering", candidates),
            }));
        }
        Ok(Ok(basins))
    }
}
