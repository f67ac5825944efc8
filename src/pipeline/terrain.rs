// Stages 1-6: inputs, clipping and hydrologic conditioning

use super::{Pipeline, RunMode, Stage, Workspace};
use crate::error::PipelineError;
use crate::models::{Crs, Perimeter};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Converts a contributing-area threshold into a cell count for the given cell size.
pub fn stream_threshold_cells(threshold_km2: f64, cell_size_m: f64) -> u64 {
    let cell_area_m2 = cell_size_m * cell_size_m;
    if !(cell_area_m2 > 0.0) {
        return 1;
    }
    ((threshold_km2 * 1.0e6) / cell_area_m2).round().max(1.0) as u64
}

impl Pipeline {
    /// Stage 1
    pub(super) fn check_inputs(&self) -> Result<(), PipelineError> {
        for path in [
            &self.settings.perimeter_path,
            &self.settings.dem_path,
            &self.settings.dnbr_path,
        ] {
            if !path.exists() {
                return Err(PipelineError::InputMissing(path.clone()));
            }
        }
        Ok(())
    }

    /// Reads the fire perimeter, dissolves it to one polygon and expresses it in
    /// both the working projected CRS and WGS84.
    pub async fn load_perimeter(&self) -> Result<Perimeter, PipelineError> {
        let at = || PipelineError::at(Stage::ReprojectClip);
        let layer = self
            .geo
            .read_polygons(&self.settings.perimeter_path)
            .await
            .map_err(at())?;

        let source_crs = layer.crs.ok_or_else(|| {
            PipelineError::InvalidInput(format!(
                "perimeter {:?} has no coordinate reference system",
                self.settings.perimeter_path
            ))
        })?;
        if layer.geometries.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "perimeter {:?} contains no polygons",
                self.settings.perimeter_path
            )));
        }

        let dissolved = self.geo.dissolve(&layer.geometries).await.map_err(at())?;
        let projected_crs = self.projected_crs();
        let projected = self
            .geo
            .transform(&dissolved, source_crs, projected_crs)
            .await
            .map_err(at())?;
        let geographic = self
            .geo
            .transform(&dissolved, source_crs, Crs::WGS84)
            .await
            .map_err(at())?;

        Ok(Perimeter {
            projected,
            geographic,
            crs: projected_crs,
        })
    }

    /// Stage 2: resolves the analysis boundary and clips the elevation raster to it.
    pub(super) async fn reproject_and_clip(
        &self,
        mode: &RunMode,
        workspace: &Workspace,
    ) -> Result<(PathBuf, Perimeter), PipelineError> {
        let at = || PipelineError::at(Stage::ReprojectClip);
        let projected_crs = self.projected_crs();

        let (perimeter, buffer_m) = match mode {
            RunMode::Default => (self.load_perimeter().await?, self.settings.perimeter_buffer_m),
            RunMode::Zone { polygon } => {
                let projected = self
                    .geo
                    .transform(polygon, Crs::WGS84, projected_crs)
                    .await
                    .map_err(at())?;
                let perimeter = Perimeter {
                    projected,
                    geographic: polygon.clone(),
                    crs: projected_crs,
                };
                (perimeter, self.settings.zone_buffer_m)
            }
        };

        let reprojected = self
            .geo
            .reproject_raster(&self.settings.dem_path, projected_crs, &workspace.artifact("dem_utm.tif"))
            .await
            .map_err(at())?;
        let clipped = self
            .geo
            .clip_raster(&reprojected, &perimeter.projected, buffer_m, &workspace.artifact("dem_clipped.tif"))
            .await
            .map_err(at())?;

        info!("DEM clipped to {} with {} m buffer", projected_crs, buffer_m);
        Ok((clipped, perimeter))
    }

    /// Stage 3
    pub(super) async fn fill_depressions(&self, dem: &Path, workspace: &Workspace) -> Result<PathBuf, PipelineError> {
        self.watershed
            .fill_depressions(dem, &workspace.artifact("dem_filled.tif"))
            .await
            .map_err(PipelineError::at(Stage::FillDepressions))
    }

    /// Stage 4
    pub(super) async fn flow_direction(&self, filled: &Path, workspace: &Workspace) -> Result<PathBuf, PipelineError> {
        self.watershed
            .flow_direction(filled, &workspace.artifact("flow_dir.tif"))
            .await
            .map_err(PipelineError::at(Stage::FlowDirection))
    }

    /// Stage 5
    pub(super) async fn flow_accumulation(
        &self,
        direction: &Path,
        workspace: &Workspace,
    ) -> Result<PathBuf, PipelineError> {
        self.watershed
            .flow_accumulation(direction, &workspace.artifact("flow_acc.tif"))
            .await
            .map_err(PipelineError::at(Stage::FlowAccumulation))
    }

    /// Stage 6: the area threshold is converted with the clipped DEM's cell size.
    pub(super) async fn extract_streams(
        &self,
        dem: &Path,
        accumulation: &Path,
        workspace: &Workspace,
    ) -> Result<PathBuf, PipelineError> {
        let at = || PipelineError::at(Stage::ExtractStreams);
        let cell_size = self.geo.cell_size_m(dem).await.map_err(at())?;
        let threshold = stream_threshold_cells(self.settings.stream_threshold_km2, cell_size);
        debug!(
            "Stream threshold {} km2 = {} cells at {} m",
            self.settings.stream_threshold_km2, threshold, cell_size
        );

        self.watershed
            .extract_streams(accumulation, threshold, &workspace.artifact("streams.tif"))
            .await
            .map_err(at())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_at_ten_meters() {
        assert_eq!(stream_threshold_cells(0.025, 10.0), 250);
    }

    #[test]
    fn test_threshold_scales_with_cell_size() {
        assert_eq!(stream_threshold_cells(0.025, 30.0), 28);
        assert_eq!(stream_threshold_cells(0.025, 5.0), 1000);
    }

    #[test]
    fn test_threshold_never_below_one_cell() {
        assert_eq!(stream_threshold_cells(0.0, 10.0), 1);
        assert_eq!(stream_threshold_cells(0.025, 0.0), 1);
        assert_eq!(stream_threshold_cells(0.025, f64::NAN), 1);
    }
}
