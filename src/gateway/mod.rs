//! Contracts for the external tools the pipeline delegates spatial work to.
//!
//! Both gateways are path-in, path-or-value-out. Implementations may shell out,
//! link a library or call a service; the pipeline only sees these traits.

pub mod python_worker;
pub mod raster;
pub mod whitebox;

#[cfg(test)]
pub mod testing;

use crate::error::GatewayError;
use crate::models::{Crs, Geometry, VectorLayer};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use raster::PythonGeoGateway;
pub use whitebox::WhiteboxTools;

/// Raster reprojection/masking and polygon math.
///
/// Geometry arguments to `clip_raster`, `mask_values`, `buffer` and `area_km2`
/// are in the working projected CRS (meters).
#[async_trait]
pub trait GeometryGateway: Send + Sync {
    /// Reprojects a raster from its own CRS into `dst_crs`, bilinear resampling.
    async fn reproject_raster(&self, raster: &Path, dst_crs: Crs, output: &Path) -> Result<PathBuf, GatewayError>;

    /// Crops a raster to `polygon` grown by `buffer_m`; cells outside become nodata.
    async fn clip_raster(
        &self,
        raster: &Path,
        polygon: &Geometry,
        buffer_m: f64,
        output: &Path,
    ) -> Result<PathBuf, GatewayError>;

    /// Values of the valid (non-nodata, finite) cells under `polygon`.
    async fn mask_values(&self, raster: &Path, polygon: &Geometry) -> Result<Vec<f64>, GatewayError>;

    /// Ground size of one cell edge in meters.
    async fn cell_size_m(&self, raster: &Path) -> Result<f64, GatewayError>;

    async fn read_polygons(&self, vector: &Path) -> Result<VectorLayer, GatewayError>;

    async fn transform(&self, geometry: &Geometry, src: Crs, dst: Crs) -> Result<Geometry, GatewayError>;

    /// Grows a polygon; a zero distance repairs self-intersections.
    async fn buffer(&self, geometry: &Geometry, distance_m: f64) -> Result<Geometry, GatewayError>;

    async fn intersects(&self, a: &Geometry, b: &Geometry) -> Result<bool, GatewayError>;

    /// `None` when the overlap is empty.
    async fn intersection(&self, a: &Geometry, b: &Geometry) -> Result<Option<Geometry>, GatewayError>;

    async fn area_km2(&self, polygon: &Geometry) -> Result<f64, GatewayError>;

    /// Unions all geometries into one.
    async fn dissolve(&self, geometries: &[Geometry]) -> Result<Geometry, GatewayError>;
}

/// Terrain-routing primitives. Every call reads and writes file-backed artifacts.
#[async_trait]
pub trait WatershedGateway: Send + Sync {
    /// Fills sinks and corrects flat areas.
    async fn fill_depressions(&self, dem: &Path, output: &Path) -> Result<PathBuf, GatewayError>;

    /// D8 flow pointer raster.
    async fn flow_direction(&self, dem: &Path, output: &Path) -> Result<PathBuf, GatewayError>;

    /// Upslope contributing cell counts from a D8 pointer raster.
    async fn flow_accumulation(&self, direction: &Path, output: &Path) -> Result<PathBuf, GatewayError>;

    async fn extract_streams(
        &self,
        accumulation: &Path,
        cell_threshold: u64,
        output: &Path,
    ) -> Result<PathBuf, GatewayError>;

    /// Rasterizes sub-basins bounded by the stream network, then vectorizes
    /// them. Returns the polygon layer.
    async fn delineate_subbasins(
        &self,
        direction: &Path,
        streams: &Path,
        raster_output: &Path,
        vector_output: &Path,
    ) -> Result<PathBuf, GatewayError>;

    /// Slope in degrees.
    async fn slope(&self, dem: &Path, output: &Path) -> Result<PathBuf, GatewayError>;
}
