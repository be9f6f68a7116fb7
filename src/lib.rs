mod utils;
pub mod common;
pub mod data;
pub mod detection_runners;
pub mod error;

use std::time::Instant;
use image::{Rgb, RgbImage};
use crate::common::DetectorConfig;
use crate::detection_runners::YoloV5Detector;

pub use crate::common::{BBox, Detection, InferenceDevice, LossOutput, ModelMode, PredictionRow, Target, Targets};
pub use crate::error::DetectorError;

pub type Result<T, E = DetectorError> = std::result::Result<T, E>;

/// Builds the detector and runs one blank frame through the detection graph so the first real
/// call does not pay for session warm-up.
pub fn init_detector(config: DetectorConfig) -> Result<YoloV5Detector> {
    log::info!("Initializing detector: {}", config);
    let detector = YoloV5Detector::new(config)?;

    let now = Instant::now();
    let size = detector.image_size();
    let blank = RgbImage::from_pixel(size, size, Rgb([detector.config().pad_value; 3]));
    detector.detect_images(&[blank])?;
    log::debug!("Warm-up run on {} took {:?}", detector.device(), now.elapsed());

    Ok(detector)
}
