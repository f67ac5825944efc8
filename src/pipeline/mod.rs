//! The ten-stage analysis pipeline.
//!
//! Stages run strictly in order and each consumes the previous stage's
//! artifacts from the run's [`Workspace`]. Any stage error aborts the run;
//! degenerate geometry in stages 7 and 8 is recovered locally (see
//! [`fallback`]).

pub mod basins;
pub mod fallback;
pub mod stage;
pub mod statistics;
pub mod terrain;
pub mod workspace;

pub use fallback::Fallback;
pub use stage::Stage;
pub use workspace::{sweep_stale_workspaces, Workspace};

use crate::cache::ResultCache;
use crate::error::PipelineError;
use crate::gateway::{GeometryGateway, WatershedGateway};
use crate::hazard;
use crate::jobs::JobReporter;
use crate::models::{
    AnalysisSettings, Basin, BasinStats, Crs, Feature, FeatureCollection, Geometry, HazardRecord, Perimeter,
};
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum RunMode {
    /// Bounded by the configured fire perimeter, cached in the shared slot
    Default,
    /// Bounded by a user polygon (geographic CRS), cached under the job id
    Zone { polygon: Geometry },
}

#[derive(Clone)]
pub struct Pipeline {
    settings: Arc<AnalysisSettings>,
    geo: Arc<dyn GeometryGateway>,
    watershed: Arc<dyn WatershedGateway>,
    cache: ResultCache,
}

impl Pipeline {
    pub fn new(
        settings: Arc<AnalysisSettings>,
        geo: Arc<dyn GeometryGateway>,
        watershed: Arc<dyn WatershedGateway>,
        cache: ResultCache,
    ) -> Self {
        Self {
            settings,
            geo,
            watershed,
            cache,
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    fn projected_crs(&self) -> Crs {
        Crs::epsg(self.settings.projected_epsg)
    }

    /// Runs all stages and returns the number of basins written.
    pub async fn run(&self, mode: &RunMode, reporter: &JobReporter) -> Result<usize, PipelineError> {
        let job_id = reporter.job_id();

        reporter.advance(Stage::LoadInputs);
        self.check_inputs()?;
        let workspace = Workspace::create(&self.settings.scratch_dir(), job_id)?;

        reporter.advance(Stage::ReprojectClip);
        let (dem, perimeter) = self.reproject_and_clip(mode, &workspace).await?;

        reporter.advance(Stage::FillDepressions);
        let filled = self.fill_depressions(&dem, &workspace).await?;

        reporter.advance(Stage::FlowDirection);
        let direction = self.flow_direction(&filled, &workspace).await?;

        reporter.advance(Stage::FlowAccumulation);
        let accumulation = self.flow_accumulation(&direction, &workspace).await?;

        reporter.advance(Stage::ExtractStreams);
        let streams = self.extract_streams(&dem, &accumulation, &workspace).await?;

        reporter.advance(Stage::DelineateBasins);
        let basins = self
            .delineate_basins(job_id, &direction, &streams, &perimeter, &workspace)
            .await?;

        reporter.advance(Stage::BasinStatistics);
        let stats = self.basin_statistics(job_id, &filled, &basins, &workspace).await?;

        reporter.advance(Stage::RunModel);
        let records = self.run_model(&basins, &stats).await?;

        reporter.advance(Stage::Export);
        self.export(mode, job_id, &records, &perimeter)?;

        Ok(records.len())
    }

    /// Stage 9: evaluates the hazard model for every basin over the rainfall schedule.
    async fn run_model(&self, basins: &[Basin], stats: &[BasinStats]) -> Result<Vec<HazardRecord>, PipelineError> {
        let projected = self.projected_crs();
        let mut records = Vec::with_capacity(basins.len());

        for (basin, stats) in basins.iter().zip(stats) {
            let geometry = self
                .geo
                .transform(&basin.geometry, projected, Crs::WGS84)
                .await
                .map_err(PipelineError::at(Stage::RunModel))?;
            records.push(HazardRecord {
                geometry,
                area_km2: basin.area_km2,
                stats: *stats,
                estimates: hazard::evaluate(stats, basin.area_km2, &self.settings.rainfall_schedule),
            });
        }

        debug!("Evaluated {} basins over {} rainfall intensities", records.len(), self.settings.rainfall_schedule.len());
        Ok(records)
    }

    /// Stage 10: persists results. Only reached after every earlier stage succeeded.
    fn export(
        &self,
        mode: &RunMode,
        job_id: &str,
        records: &[HazardRecord],
        perimeter: &Perimeter,
    ) -> Result<(), PipelineError> {
        let results = FeatureCollection::new(records.iter().map(HazardRecord::to_feature).collect());

        match mode {
            RunMode::Default => {
                let outline = FeatureCollection::new(vec![Feature::new(perimeter.geographic.clone(), Default::default())]);
                self.cache.write_default(&results, &outline)?;
            }
            RunMode::Zone { .. } => self.cache.write_zone(job_id, &results)?,
        }
        Ok(())
    }
}
