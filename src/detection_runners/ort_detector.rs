mod onnx;
mod ort_engine;
mod model_handle;
pub mod outputs;
mod yolov5_detector;
pub mod image_ops;
pub mod input_wrapper;
pub mod targets;
pub mod xs;

pub use model_handle::ModelHandle;
pub use ort_engine::*;
pub use yolov5_detector::YoloV5Detector;
