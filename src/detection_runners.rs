pub mod inference_process;
pub mod model_loader;
pub mod ort_detector;

pub use model_loader::{load_engines, LoadedEngines, ModelPaths, ProjectLayout};
pub use ort_detector::*;
