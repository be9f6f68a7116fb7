//! Options for building an ONNX Runtime engine.

use std::path::{Path, PathBuf};
use crate::common::{DetectorConfig, InferenceDevice};

#[derive(Debug, Clone)]
pub struct ConfigOrt {
    pub onnx_path: PathBuf,
    pub ort_lib_path: Option<PathBuf>,
    pub device: InferenceDevice,
    /// Upper bound of a dynamic batch axis.
    pub batch_size: usize,
    pub model_width: u32,
    pub model_height: u32,
    pub profile: bool,

    // trt related
    pub trt_engine_cache_enable: bool,
    pub trt_fp16_enable: bool,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            onnx_path: PathBuf::new(),
            ort_lib_path: None,
            device: InferenceDevice::Auto,
            profile: false,
            batch_size: 1,
            model_height: 640,
            model_width: 640,

            // every load reads the graph from disk again
            trt_engine_cache_enable: false,
            trt_fp16_enable: false,
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    /// Engine options for one graph of a detector config.
    pub fn from_detector_config(config: &DetectorConfig, onnx_path: &Path) -> Self {
        Self::new()
            .with_model(onnx_path)
            .with_ort_lib_path(config.ort_lib_path.as_deref())
            .with_device(config.device)
            .with_batch_size(config.max_batch_size)
            .with_model_width(config.image_size)
            .with_model_height(config.image_size)
            .with_trt_fp16(config.trt_fp16)
            .with_profile(config.profile)
    }

    pub fn with_model<P: AsRef<Path>>(mut self, onnx_path: P) -> Self {
        self.onnx_path = onnx_path.as_ref().to_path_buf();
        self
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: Option<&Path>) -> Self {
        self.ort_lib_path = ort_lib_path.map(Path::to_path_buf);
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_model_width(mut self, n: u32) -> Self {
        self.model_width = n;
        self
    }

    pub fn with_model_height(mut self, n: u32) -> Self {
        self.model_height = n;
        self
    }

    pub fn with_device(mut self, device_type: InferenceDevice) -> Self {
        self.device = device_type;
        self
    }

    pub fn with_trt_fp16(mut self, x: bool) -> Self {
        self.trt_fp16_enable = x;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_config_carries_max_batch() {
        let detector = DetectorConfig::new("m/LP_detector.onnx")
            .with_max_batch_size(32)
            .with_image_size(512)
            .with_device(InferenceDevice::TensorRT(1));
        let config = ConfigOrt::from_detector_config(&detector, Path::new("m/LP_detector_loss.onnx"));
        assert_eq!(config.batch_size, 32);
        assert_eq!((config.model_width, config.model_height), (512, 512));
        assert_eq!(config.device, InferenceDevice::TensorRT(1));
        assert!(config.onnx_path.ends_with("LP_detector_loss.onnx"));
        assert!(!config.trt_engine_cache_enable);
    }
}
