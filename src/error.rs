use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the detector wrapper.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Model file not found: {0}")]
    MissingWeights(PathBuf),

    #[error("No loss graph configured, forward() needs `loss_graph_path`")]
    LossGraphUnavailable,

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

impl DetectorError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}
