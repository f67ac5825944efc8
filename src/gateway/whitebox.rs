// WhiteboxTools command-line gateway
// Each watershed primitive is one `whitebox_tools --run=<Tool>` invocation

use super::WatershedGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

#[derive(Debug, Clone)]
pub struct WhiteboxTools {
    exe_path: PathBuf,
}

fn arg(name: &str, path: &Path) -> String {
    format!("--{}={}", name, path.display())
}

impl WhiteboxTools {
    pub fn new(exe_path: impl Into<PathBuf>) -> Self {
        Self {
            exe_path: exe_path.into(),
        }
    }

    async fn run(&self, tool: &str, args: Vec<String>) -> Result<(), GatewayError> {
        debug!("Running WhiteboxTools {} {:?}", tool, args);

        let mut cmd = Command::new(&self.exe_path);
        cmd.arg(format!("--run={}", tool))
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let output = cmd.output().await.map_err(|source| GatewayError::Spawn {
            program: self.exe_path.display().to_string(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        let message = if message.is_empty() {
            format!("exited with code {}", output.status.code().unwrap_or(-1))
        } else {
            message
        };
        Err(GatewayError::tool(tool, message))
    }
}

#[async_trait]
impl WatershedGateway for WhiteboxTools {
    async fn fill_depressions(&self, dem: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.run(
            "FillDepressions",
            vec![arg("dem", dem), arg("output", output), "--fix_flats".to_string()],
        )
        .await?;
        Ok(output.to_path_buf())
    }

    async fn flow_direction(&self, dem: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.run("D8Pointer", vec![arg("dem", dem), arg("output", output)]).await?;
        Ok(output.to_path_buf())
    }

    async fn flow_accumulation(&self, direction: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.run(
            "D8FlowAccumulation",
            vec![
                arg("input", direction),
                arg("output", output),
                "--out_type=cells".to_string(),
                "--pntr".to_string(),
            ],
        )
        .await?;
        Ok(output.to_path_buf())
    }

    async fn extract_streams(
        &self,
        accumulation: &Path,
        cell_threshold: u64,
        output: &Path,
    ) -> Result<PathBuf, GatewayError> {
        self.run(
            "ExtractStreams",
            vec![
                arg("flow_accum", accumulation),
                arg("output", output),
                format!("--threshold={}", cell_threshold),
            ],
        )
        .await?;
        Ok(output.to_path_buf())
    }

    async fn delineate_subbasins(
        &self,
        direction: &Path,
        streams: &Path,
        raster_output: &Path,
        vector_output: &Path,
    ) -> Result<PathBuf, GatewayError> {
        self.run(
            "Subbasins",
            vec![arg("d8_pntr", direction), arg("streams", streams), arg("output", raster_output)],
        )
        .await?;
        self.run(
            "RasterToVectorPolygons",
            vec![arg("input", raster_output), arg("output", vector_output)],
        )
        .await?;
        Ok(vector_output.to_path_buf())
    }

    async fn slope(&self, dem: &Path, output: &Path) -> Result<PathBuf, GatewayError> {
        self.run(
            "Slope",
            vec![
                arg("dem", dem),
                arg("output", output),
                "--units=degrees".to_string(),
                "--zfactor=1.0".to_string(),
            ],
        )
        .await?;
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let wbt = WhiteboxTools::new("/nonexistent/whitebox_tools_binary");
        let dir = tempfile::tempdir().unwrap();
        let result = wbt
            .fill_depressions(&dir.path().join("dem.tif"), &dir.path().join("filled.tif"))
            .await;
        assert!(matches!(result, Err(GatewayError::Spawn { .. })));
    }

    #[test]
    fn test_path_argument_format() {
        assert_eq!(arg("dem", Path::new("/tmp/a b/dem.tif")), "--dem=/tmp/a b/dem.tif");
    }
}
