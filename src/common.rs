mod bbox;
mod detection;
mod inference_device;
mod loss_output;
mod model_config;
mod model_mode;
mod target;

pub use bbox::*;
pub use detection::*;
pub use inference_device::*;
pub use loss_output::*;
pub use model_config::*;
pub use model_mode::*;
pub use target::*;
