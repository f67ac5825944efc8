use crate::cache::ResultCache;
use crate::error::{AnalysisError, FileError, PipelineError};
use crate::gateway::python_worker::PythonWorker;
use crate::gateway::{GeometryGateway, PythonGeoGateway, WatershedGateway, WhiteboxTools};
use crate::hazard::{self, AreaSummary, ModelCoefficients};
use crate::jobs::{JobReporter, JobTable};
use crate::models::{
    Ack, AnalysisSettings, Feature, FeatureCollection, Geometry, Job, JobStatus, StartResponse, ZoneStartResponse,
};
use crate::pipeline::{Pipeline, RunMode};
use log::{debug, error, info};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tokio::runtime::Handle;

const NO_RESULTS: &str = "No results yet. Run analysis first.";

/// Parameters a client needs to interpret the P_i, V_i and H_i properties
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInfo {
    pub rainfall_schedule: Vec<f64>,
    pub coefficients: ModelCoefficients,
    pub stream_threshold_km2: f64,
    pub min_basin_area_km2: f64,
    pub max_basin_area_km2: f64,
}

/// The job polling surface. Cheap to share behind an `Arc`; every run executes
/// on its own tokio task.
pub struct AnalysisService {
    settings: Arc<AnalysisSettings>,
    jobs: Arc<JobTable>,
    cache: ResultCache,
    geo: Arc<dyn GeometryGateway>,
    pipeline: Pipeline,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle of the tokio runtime the caller is on. Runs are spawned onto it.
fn runtime_handle() -> Result<Handle, AnalysisError> {
    Handle::try_current().map_err(|e| AnalysisError::Runtime(e.to_string()))
}

fn not_found_as(message: &str) -> impl FnOnce(FileError) -> AnalysisError + '_ {
    move |e| match e {
        FileError::NotFound(_) => AnalysisError::NotFound(message.to_string()),
        other => AnalysisError::File(other),
    }
}

impl AnalysisService {
    pub fn new(
        settings: AnalysisSettings,
        geo: Arc<dyn GeometryGateway>,
        watershed: Arc<dyn WatershedGateway>,
    ) -> Self {
        let settings = Arc::new(settings);
        let cache = ResultCache::new(settings.cache_dir());
        let pipeline = Pipeline::new(settings.clone(), geo.clone(), watershed, cache.clone());
        Self {
            settings,
            jobs: Arc::new(JobTable::new()),
            cache,
            geo,
            pipeline,
        }
    }

    /// Wires the default gateways: WhiteboxTools for terrain routing and the
    /// python geo worker for raster and vector math.
    pub fn from_settings(settings: AnalysisSettings) -> Self {
        let watershed = Arc::new(WhiteboxTools::new(settings.whitebox_path.clone()));
        let geo = Arc::new(PythonGeoGateway::new(PythonWorker::from_settings(&settings)));
        Self::new(settings, geo, watershed)
    }

    /// Starts a default run, or answers from the cache unless `force` is set.
    ///
    /// A fresh run is spawned on the current tokio runtime. Outside a runtime
    /// this returns `AnalysisError::Runtime` before the cache or the job table
    /// is touched; a cache hit needs no runtime.
    pub fn start_analysis(&self, force: bool) -> Result<StartResponse, AnalysisError> {
        self.jobs.evict_expired(self.settings.job_retention());

        if !force && self.cache.has_default() {
            let job_id = format!("cached_{}", &uuid::Uuid::new_v4().simple().to_string()[..6]);
            let basin_count = self.cache.count_default_features();
            self.jobs.insert(Job::cached(job_id.clone(), basin_count));
            info!("Cache hit, job {} reports {} basins", job_id, basin_count);
            return Ok(StartResponse { job_id, cached: true });
        }

        let runtime = runtime_handle()?;
        if force {
            self.cache.clear_default()?;
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        self.launch(&runtime, job_id.clone(), RunMode::Default);
        Ok(StartResponse { job_id, cached: false })
    }

    /// Starts a zone run on the current tokio runtime. Fails with
    /// `AnalysisError::Runtime` when called outside one.
    pub fn start_zone_analysis(&self, polygon: Geometry) -> Result<ZoneStartResponse, AnalysisError> {
        polygon.validate_zone().map_err(AnalysisError::InvalidInput)?;
        let runtime = runtime_handle()?;
        self.jobs.evict_expired(self.settings.job_retention());

        let job_id = uuid::Uuid::new_v4().to_string();
        self.launch(&runtime, job_id.clone(), RunMode::Zone { polygon });
        Ok(ZoneStartResponse {
            job_id,
            status: JobStatus::Running,
        })
    }

    /// Inserts the job and runs the pipeline on a separate task. A panic in the
    /// run is caught at the join handle and recorded as an error.
    fn launch(&self, runtime: &Handle, job_id: String, mode: RunMode) {
        let zone = matches!(mode, RunMode::Zone { .. });
        self.jobs.insert(Job::running(job_id.clone(), zone));
        debug!("Launching job {} (zone: {})", job_id, zone);

        let pipeline = self.pipeline.clone();
        let worker = JobReporter::new(self.jobs.clone(), job_id.clone(), zone);
        let supervisor = JobReporter::new(self.jobs.clone(), job_id, zone);

        runtime.spawn(async move {
            let run = tokio::spawn(async move {
                match pipeline.run(&mode, &worker).await {
                    Ok(basin_count) => worker.complete(basin_count),
                    Err(e) => worker.fail(&e),
                }
            });

            if let Err(join_error) = run.await {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                error!("Job {} worker stopped abnormally: {}", supervisor.job_id(), message);
                supervisor.fail(&PipelineError::Panicked(message));
            }
        });
    }

    pub fn get_status(&self, job_id: &str) -> Job {
        self.jobs.status(job_id)
    }

    pub fn get_results(&self) -> Result<FeatureCollection, AnalysisError> {
        self.cache.read_default().map_err(not_found_as(NO_RESULTS))
    }

    pub fn get_zone_results(&self, job_id: &str) -> Result<FeatureCollection, AnalysisError> {
        let message = format!("No results for zone job {}", job_id);
        self.cache.read_zone(job_id).map_err(not_found_as(&message))
    }

    pub fn has_results(&self) -> bool {
        self.cache.has_default()
    }

    pub fn clear_cache(&self) -> Result<Ack, AnalysisError> {
        self.cache.clear_default()?;
        info!("Cache cleared");
        Ok(Ack {
            status: "ok".to_string(),
            message: "Cache cleared".to_string(),
        })
    }

    /// The analysis boundary in WGS84, from the cache or derived from the source layer.
    pub async fn get_perimeter(&self) -> Result<FeatureCollection, AnalysisError> {
        match self.cache.read_perimeter() {
            Ok(perimeter) => return Ok(perimeter),
            Err(FileError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        if !self.settings.perimeter_path.exists() {
            return Err(AnalysisError::NotFound("Perimeter not available".to_string()));
        }
        let perimeter = self.pipeline.load_perimeter().await?;
        Ok(FeatureCollection::new(vec![Feature::new(
            perimeter.geographic,
            Default::default(),
        )]))
    }

    /// Cached default basins whose geometry intersects `polygon` (WGS84), unclipped.
    pub async fn filter_basins_by_polygon(&self, polygon: &Geometry) -> Result<FeatureCollection, AnalysisError> {
        polygon.validate_zone().map_err(AnalysisError::InvalidInput)?;
        let results = self.get_results()?;

        let mut kept = Vec::new();
        for feature in results.features {
            if self.geo.intersects(&feature.geometry, polygon).await? {
                kept.push(feature);
            }
        }
        Ok(FeatureCollection::new(kept))
    }

    pub async fn polygon_statistics(&self, polygon: &Geometry) -> Result<AreaSummary, AnalysisError> {
        let basins = self.filter_basins_by_polygon(polygon).await?;
        Ok(hazard::summarize(&basins, self.settings.rainfall_schedule.len()))
    }

    pub fn analysis_info(&self) -> AnalysisInfo {
        AnalysisInfo {
            rainfall_schedule: self.settings.rainfall_schedule.clone(),
            coefficients: hazard::coefficients(),
            stream_threshold_km2: self.settings.stream_threshold_km2,
            min_basin_area_km2: self.settings.min_basin_area_km2,
            max_basin_area_km2: self.settings.max_basin_area_km2,
        }
    }
}
