mod config_ort;
mod letterbox_info;
mod min_opt_max;
mod time_calc;

pub use config_ort::ConfigOrt;
pub use letterbox_info::LetterboxInfo;
pub use min_opt_max::MinOptMax;
pub use time_calc::TimeCalc;

pub use crate::detection_runners::ort_detector::input_wrapper::X;
pub use crate::detection_runners::ort_detector::xs::Xs;

pub(crate) const CROSS_MARK: &str = "❌";
