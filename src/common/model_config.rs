use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::common::InferenceDevice;
use crate::detection_runners::model_loader::ProjectLayout;
use crate::error::DetectorError;

pub const DEFAULT_IMAGE_SIZE: u32 = 640;
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.25;
pub const DEFAULT_PAD_VALUE: u8 = 114;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 16;

/// Everything the detector needs at construction. Nothing is derived from the location of
/// the calling code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Detection graph (evaluation mode, NMS folded in).
    pub weights_path: PathBuf,
    /// Loss graph (training mode + loss + input gradient). `forward` is unavailable without it.
    pub loss_graph_path: Option<PathBuf>,
    /// Shared ONNX Runtime library loaded at runtime. `None` uses the default search path.
    pub ort_lib_path: Option<PathBuf>,
    pub device: InferenceDevice,
    /// Side of the square working resolution.
    pub image_size: u32,
    pub conf_threshold: f32,
    pub pad_value: u8,
    /// Largest batch a graph with a dynamic batch axis is built for. Bounds the TensorRT
    /// optimization profile; larger `detect` batches are split into chunks of this size.
    pub max_batch_size: usize,
    /// Class labels. Parsed from the graph metadata when absent.
    pub names: Option<Vec<String>>,
    pub loss_output: String,
    pub loss_items_output: Option<String>,
    pub grad_output: Option<String>,
    pub trt_fp16: bool,
    pub profile: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::new(),
            loss_graph_path: None,
            ort_lib_path: None,
            device: InferenceDevice::Auto,
            image_size: DEFAULT_IMAGE_SIZE,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            pad_value: DEFAULT_PAD_VALUE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            names: None,
            loss_output: "loss".to_string(),
            loss_items_output: Some("loss_items".to_string()),
            grad_output: Some("images_grad".to_string()),
            trt_fp16: false,
            profile: false,
        }
    }
}

impl DetectorConfig {
    pub fn new<P: AsRef<Path>>(weights_path: P) -> Self {
        Self {
            weights_path: weights_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Config pointing at the pretrained plate detector inside an installation root.
    pub fn from_project_root<P: AsRef<Path>>(root: P) -> Self {
        let layout = ProjectLayout::new(root);
        Self {
            weights_path: layout.detector_path(),
            loss_graph_path: Some(layout.loss_graph_path()),
            ..Default::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DetectorError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.image_size == 0 || self.image_size % 32 != 0 {
            return Err(DetectorError::Config(format!(
                "image_size must be a positive multiple of 32, got {}",
                self.image_size
            )));
        }
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(DetectorError::Config(format!(
                "conf_threshold must be within [0, 1], got {}",
                self.conf_threshold
            )));
        }
        if self.max_batch_size == 0 {
            return Err(DetectorError::Config("max_batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_loss_graph<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loss_graph_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_ort_lib_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ort_lib_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    pub fn with_max_batch_size(mut self, n: usize) -> Self {
        self.max_batch_size = n;
        self
    }

    pub fn with_conf_threshold(mut self, conf: f32) -> Self {
        self.conf_threshold = conf;
        self
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = Some(names.iter().map(|x| x.to_string()).collect());
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }
}

impl std::fmt::Display for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Weights File Path: {}\n\
        Loss Graph Path: {}\n\
        OnnxRuntime Lib Path: {}\n\
        Inference Device: {}\n\
        Model Input Resolution: {}x{}\n\
        Detection Threshold: {}",
               self.weights_path.display(),
               self.loss_graph_path.as_ref().map(|p| p.display().to_string()).unwrap_or("-".to_string()),
               self.ort_lib_path.as_ref().map(|p| p.display().to_string()).unwrap_or("-".to_string()),
               self.device, self.image_size, self.image_size, self.conf_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DetectorConfig = serde_json::from_str(
            r#"{ "weights_path": "m/LP_detector.onnx", "device": { "CUDA": 1 } }"#,
        ).unwrap();
        assert_eq!(config.device, InferenceDevice::CUDA(1));
        assert_eq!(config.image_size, 640);
        assert_eq!(config.loss_output, "loss");
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unaligned_image_size() {
        let config = DetectorConfig::new("m.onnx").with_image_size(600);
        assert!(matches!(config.validate(), Err(DetectorError::Config(_))));
    }

    #[test]
    fn rejects_zero_max_batch() {
        let config = DetectorConfig::new("m.onnx").with_max_batch_size(0);
        assert!(matches!(config.validate(), Err(DetectorError::Config(_))));
    }

    #[test]
    fn project_root_layout() {
        let config = DetectorConfig::from_project_root("/opt/lpr");
        assert_eq!(
            config.weights_path,
            PathBuf::from("/opt/lpr/assets/pretrained/License-Plate-Recognition/model/LP_detector.onnx")
        );
        assert!(config.loss_graph_path.is_some());
    }
}
