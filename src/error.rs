// Error types for each layer of the analysis stack

use crate::pipeline::Stage;
use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// JSON file storage failures
#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to {action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize data: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Failures raised by the external geometry/raster and watershed tools
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker script not found: {0:?}")]
    WorkerMissing(PathBuf),

    #[error("Worker protocol error: {0}")]
    Protocol(String),
}

impl GatewayError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Failures that abort a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input file not found: {0:?}")]
    InputMissing(PathBuf),

    #[error("{stage}: {source}")]
    Gateway {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to create workspace under {root:?}: {source}")]
    Workspace {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write results: {0}")]
    Cache(#[from] FileError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Analysis worker panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    pub fn at(stage: Stage) -> impl FnOnce(GatewayError) -> PipelineError {
        move |source| PipelineError::Gateway { stage, source }
    }
}

/// Errors returned across the public command surface
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid polygon: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("No async runtime: {0}")]
    Runtime(String),
}

/// Renders an error and every `source()` below it, one cause per line.
pub fn error_trace(err: &dyn StdError) -> String {
    let mut trace = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        trace.push_str("\ncaused by: ");
        trace.push_str(&cause.to_string());
        current = cause.source();
    }
    trace
}
