use serde::{Deserialize, Serialize};

/// Compute device the sessions are pinned to.
///
/// `Auto` picks the first accelerator that registers and falls back to the CPU.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceDevice {
    #[default] Auto,
    CPU,
    CUDA(usize),
    TensorRT(usize),
    CoreML(usize),
}

// Display spellings; parsing is case-insensitive.
const AUTO: &str = "Auto";
const CPU: &str = "CPU";
const CUDA: &str = "CUDA";
const TENSOR_RT: &str = "TensorRT";
const CORE_ML: &str = "CoreML";

impl InferenceDevice {
    pub fn from_str(device: &str, device_id: usize) -> Option<Self> {
        match device.to_lowercase().as_str() {
            "auto" => Some(InferenceDevice::Auto),
            "cpu" => Some(InferenceDevice::CPU),
            "cuda" | "gpu" => Some(InferenceDevice::CUDA(device_id)),
            "tensorrt" => Some(InferenceDevice::TensorRT(device_id)),
            "coreml" => Some(InferenceDevice::CoreML(device_id)),
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            InferenceDevice::Auto => AUTO,
            InferenceDevice::CPU => CPU,
            InferenceDevice::CUDA(_) => CUDA,
            InferenceDevice::TensorRT(_) => TENSOR_RT,
            InferenceDevice::CoreML(_) => CORE_ML,
        }
    }

    pub fn device_id(&self) -> usize {
        match self {
            InferenceDevice::Auto | InferenceDevice::CPU => 0,
            InferenceDevice::CUDA(id)
            | InferenceDevice::TensorRT(id)
            | InferenceDevice::CoreML(id) => *id,
        }
    }

    pub fn is_valid_inference_device(inference_device: &str) -> bool {
        InferenceDevice::from_str(inference_device, 0).is_some()
    }
}

impl std::fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceDevice::Auto | InferenceDevice::CPU => write!(f, "{}", self.str()),
            _ => write!(f, "{}:{}", self.str(), self.device_id()),
        }
    }
}
