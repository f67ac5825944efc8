// Raster and vector math backed by the Python geo worker
use super::python_worker::PythonWorker;
use super::GeometryGateway;
use crate::error::GatewayError;
use crate::models::{Crs, Geometry, VectorLayer};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PythonGeoGateway {
    worker: PythonWorker,
}

impl PythonGeoGateway {
    pub fn new(worker: PythonWorker) -> Self {
        Self { worker }
    }

    async fn call<T: DeserializeOwned>(&self, op: &str, args: serde_json::Value) -> Result<T, GatewayError> {
        let data = self.worker.call(op, args).await?;
        serde_json::from_value(data)
            .map_err(|e| GatewayError::Protocol(format!("Unexpected {} result: {}", op, e)))
    }

    async fn call_path(&self, op: &str, args: serde_json::Value, output: &Path) -> Result<PathBuf, GatewayError> {
        let written: PathBuf = self.call(op, args).await?;
        if written != output {
            return Err(GatewayError::Protocol(format!(
                "{} wrote {:?}, expected {:?}",
                op, written, output
            )));
        }
        Ok(written)
    }
}

#[async_trait]
impl GeometryGateway for PythonGeoGateway {
    async fn reproject_raster(&self, raster: &Path, dst_crs: Crs, output: &Path) -> Result<PathBuf, GatewayError> {
        self.call_path(
            "reproject_raster",
            json!({ "raster": raster, "dst_epsg": dst_crs.epsg, "output": output }),
            output,
        )
        .await
    }

    async fn clip_raster(
        &self,
        raster: &Path,
        polygon: &Geometry,
        buffer_m: f64,
        output: &Path,
    ) -> Result<PathBuf, GatewayError> {
        self.call_path(
            "clip_raster",
            json!({ "raster": raster, "polygon": polygon, "buffer": buffer_m, "output": output }),
            output,
        )
        .await
    }

    async fn mask_values(&self, raster: &Path, polygon: &Geometry) -> Result<Vec<f64>, GatewayError> {
        self.call("mask_values", json!({ "raster": raster, "polygon": polygon })).await
    }

    async fn cell_size_m(&self, raster: &Path) -> Result<f64, GatewayError> {
        self.call("cell_size", json!({ "raster": raster })).await
    }

    async fn read_polygons(&self, vector: &Path) -> Result<VectorLayer, GatewayError> {
        self.call("read_polygons", json!({ "vector": vector })).await
    }

    async fn transform(&self, geometry: &Geometry, src: Crs, dst: Crs) -> Result<Geometry, GatewayError> {
        if src == dst {
            return Ok(geometry.clone());
        }
        self.call(
            "transform",
            json!({ "geometry": geometry, "src_epsg": src.epsg, "dst_epsg": dst.epsg }),
        )
        .await
    }

    async fn buffer(&self, geometry: &Geometry, distance_m: f64) -> Result<Geometry, GatewayError> {
        self.call("buffer", json!({ "geometry": geometry, "distance": distance_m })).await
    }

    async fn intersects(&self, a: &Geometry, b: &Geometry) -> Result<bool, GatewayError> {
        self.call("intersects", json!({ "a": a, "b": b })).await
    }

    async fn intersection(&self, a: &Geometry, b: &Geometry) -> Result<Option<Geometry>, GatewayError> {
        self.call("intersection", json!({ "a": a, "b": b })).await
    }

    async fn area_km2(&self, polygon: &Geometry) -> Result<f64, GatewayError> {
        self.call("area_km2", json!({ "geometry": polygon })).await
    }

    async fn dissolve(&self, geometries: &[Geometry]) -> Result<Geometry, GatewayError> {
        if let [single] = geometries {
            return Ok(single.clone());
        }
        self.call("dissolve", json!({ "geometries": geometries })).await
    }
}
