//! Scripted in-memory gateway for pipeline tests.
//!
//! Geometries are treated as planar polygons in meters: area is the shoelace
//! area, `intersects` compares bounding boxes, and buffering or reprojection
//! return the input unchanged. Raster outputs are small placeholder files.
//! Thresholds and buffer distances are logged as `name=value` entries.

use super::{GeometryGateway, WatershedGateway};
use crate::error::GatewayError;
use crate::models::{Crs, Geometry, VectorLayer};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

pub fn rect(x0: f64, y0: f64, width_m: f64, height_m: f64) -> Geometry {
    Geometry::polygon(vec![
        vec![x0, y0],
        vec![x0 + width_m, y0],
        vec![x0 + width_m, y0 + height_m],
        vec![x0, y0 + height_m],
        vec![x0, y0],
    ])
}

pub fn square(x0: f64, y0: f64, side_m: f64) -> Geometry {
    rect(x0, y0, side_m, side_m)
}

/// A square whose planar area is `km2`
pub fn square_km2(x0: f64, y0: f64, km2: f64) -> Geometry {
    square(x0, y0, (km2 * 1.0e6).sqrt())
}

fn rings(geometry: &Geometry) -> Vec<&Vec<Vec<f64>>> {
    match geometry {
        Geometry::Polygon { coordinates } => coordinates.iter().take(1).collect(),
        Geometry::MultiPolygon { coordinates } => coordinates.iter().filter_map(|p| p.first()).collect(),
    }
}

pub fn planar_area_m2(geometry: &Geometry) -> f64 {
    rings(geometry)
        .into_iter()
        .map(|ring| {
            let twice: f64 = ring
                .windows(2)
                .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
                .sum();
            twice.abs() / 2.0
        })
        .sum()
}

fn bbox(geometry: &Geometry) -> Option<(f64, f64, f64, f64)> {
    let mut points = rings(geometry).into_iter().flatten();
    let first = points.next()?;
    let init = (first[0], first[1], first[0], first[1]);
    Some(points.fold(init, |(x0, y0, x1, y1), p| {
        (x0.min(p[0]), y0.min(p[1]), x1.max(p[0]), y1.max(p[1]))
    }))
}

pub struct FakeGateway {
    pub perimeter: Geometry,
    /// `None` makes the delineated vector layer unreadable
    pub basins: Option<VectorLayer>,
    pub slope_deg: Vec<f64>,
    pub dnbr: Vec<f64>,
    /// Polygons whose raster masking fails
    pub unreadable: Vec<Geometry>,
    /// Operation name that raises a tool error
    pub fail_op: Option<&'static str>,
    /// Operation name that panics mid-call
    pub panic_op: Option<&'static str>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new(perimeter: Geometry) -> Self {
        Self {
            perimeter,
            basins: Some(VectorLayer { crs: None, geometries: vec![] }),
            slope_deg: vec![20.0; 10],
            dnbr: vec![50.0, 150.0, 150.0, 150.0, 150.0, 600.0, 600.0, 600.0, 600.0, 600.0],
            unreadable: vec![],
            fail_op: None,
            panic_op: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_basins(mut self, geometries: Vec<Geometry>) -> Self {
        self.basins = Some(VectorLayer { crs: None, geometries });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn called(&self, op: &str) -> bool {
        self.calls.lock().iter().any(|c| c == op)
    }

    fn record(&self, op: &str) -> Result<(), GatewayError> {
        self.calls.lock().push(op.to_string());
        if self.panic_op == Some(op) {
            panic!("{} hit an unexpected state", op);
        }
        match self.fail_op {
            Some(failing) if failing == op => Err(GatewayError::tool(op, format!("{} exploded", op))),
            _ => Ok(()),
        }
    }

    fn write(&self, op: &str, output: &Path) -> Result<PathBuf, GatewayError> {
        self.record(op)?;
        std::fs::write(output, op.as_bytes()).map_err(|e| GatewayError::tool(op, e.to_string()))?;
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl GeometryGateway for FakeGateway {
    async fn reproject_raster(&self, _raster: &Path, _dst_crs: Crs, output: &Path) -> Result<PathBuf, GatewayError> {
        self.write("reproject_raster", output)
    }

    async fn clip_raster(
        &self,
        _raster: &Path,
        _polygon: &Geometry,
        buffer_m: f64,
        output: &Path,
    ) -> Result<PathBuf, GatewayError> {
        self.calls.lock().push(format!("clip_buffer={}", buffer_m));
        self.write("clip_raster", output)
    }

    async fn mask_values(&self, raster: &Path, polygon: &Geometry) -> Result<Vec<f64>, GatewayError> {
        self.record("mask_values")?;
        if self.unreadable.contains(polygon) {
            return Err(GatewayError::tool("mask_values", "no overlap with raster"));
        }
        let name = raster.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.contains("slope") {
            Ok(self.slope_deg.clone())
        } else {
            Ok(self.dnbr.clone())
        }
    }

    async fn cell_size_m(&self, _raster: &Path) -> Result<f64, GatewayError> {
        self.record("cell_size_m")?;
        Ok(10.0)
    }

    async fn read_polygons(&self, vector: &Path) -> Result<VectorLayer, GatewayError> {
        self.record("read_polygons")?;
        let name = vector.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with("basins") {
            self.basins
                .clone()
                .ok_or_else(|| GatewayError::tool("read_polygons", "unreadable vector layer"))
        } else {
            Ok(VectorLayer {
                crs: Some(Crs::WGS84),
                geometries: vec![self.perimeter.clone()],
            })
        }
    }

    async fn transform(&self, geometry: &Geometry, _src: Crs, _dst: Crs) -> Result<Geometry, GatewayError> {
        self.record("transform")?;
        Ok(geometry.clone())
    }

    async fn buffer(&self, geometry: &Geometry, distance_m: f64) -> Result<Geometry, GatewayError> {
        self.calls.lock().push(format!("buffer={}", distance_m));
        self.record("buffer")?;
        Ok(geometry.clone())
    }

    async fn intersects(&self, a: &Geometry, b: &Geometry) -> Result<bool, GatewayError> {
        self.record("intersects")?;
        Ok(match (bbox(a), bbox(b)) {
            (Some(a), Some(b)) => a.0 <= b.2 && b.0 <= a.2 && a.1 <= b.3 && b.1 <= a.3,
            _ => false,
        })
    }

    async fn intersection(&self, a: &Geometry, b: &Geometry) -> Result<Option<Geometry>, GatewayError> {
        let overlaps = self.intersects(a, b).await?;
        Ok(overlaps.then(|| a.clone()))
    }

    async fn area_km2(&self, polygon: &Geometry) -> Result<f64, GatewayError> {
        self.record("area_km2")?;
        Ok(planar_area_m2(polygon) / 1.0e6)
    }

    async fn dissolve(&self, geometries: &[Geometry]) -> Result<Geometry, GatewayError> {
        self.record("dissolve")?;
        geometries
            .first()
            .cloned()
            .ok_or_else(|| GatewayError::tool("dissolve", "empty layer"))
    }
}

#[async_trait]
impl WatershedGateway for FakeGateway {
    async fn fill_depressions(&self, _dem: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.write("fill_depressions", output)
    }

    async fn flow_direction(&self, _dem: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.write("flow_direction", output)
    }

    async fn flow_accumulation(&self, _direction: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.write("flow_accumulation", output)
    }

    async fn extract_streams(
        &self,
        _accumulation: &Path,
        cell_threshold: u64,
        output: &Path,
    ) -> Result<PathBuf, GatewayError> {
        self.calls.lock().push(format!("threshold={}", cell_threshold));
        self.write("extract_streams", output)
    }

    async fn delineate_subbasins(
        &self,
        _direction: &Path,
        _streams: &Path,
        raster_output: &Path,
        vector_output: &Path,
    ) -> Result<PathBuf, GatewayError> {
        self.write("delineate_subbasins", raster_output)?;
        std::fs::write(vector_output, b"vector").map_err(|e| GatewayError::tool("delineate_subbasins", e.to_string()))?;
        Ok(vector_output.to_path_buf())
    }

    async fn slope(&self, _dem: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.write("slope", output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_km2_area() {
        let area = planar_area_m2(&square_km2(100.0, 100.0, 0.5)) / 1.0e6;
        assert!((area - 0.5).abs() < 1e-9);
    }
}
