use image::RgbImage;
use ndarray::{Array3, Array4, ArrayView, ArrayViewD, IxDyn};
use regex::Regex;

use crate::common::{Detection, DetectorConfig, InferenceDevice, LossOutput, ModelMode, PredictionRow, Targets};
use crate::data::{LetterboxInfo, Xs, X};
use crate::detection_runners::inference_process::InferenceProcess;
use crate::detection_runners::model_loader::load_engines;
use crate::detection_runners::ort_detector::{image_ops, outputs, targets, ModelHandle, OrtEngine};
use crate::error::DetectorError;
use crate::Result;

const INPUT_IMAGES: &str = "images";
const INPUT_TARGETS: &str = "targets";

/// Frozen YOLOv5 plate detector exposing the pre/post-processing, detection and loss hooks an
/// attack loop needs.
pub struct YoloV5Detector {
    model: ModelHandle<OrtEngine>,
    config: DetectorConfig,
    names: Vec<String>,
    device: InferenceDevice,
    image_size: u32,
    batch_dyn: bool,
}

impl YoloV5Detector {
    /// Loads both graphs from disk and places them on the configured device.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        let engines = load_engines(&config)?;
        let device = engines.detector.device();
        let batch_dyn = engines.detector.is_batch_dyn();

        let image_size = match engines.detector.in_dimss().first().map(|d| d.as_slice()) {
            Some([_, _, h, w]) if *h != 0 && *w != 0 => {
                if *h != *w {
                    return Err(DetectorError::shape(format!(
                        "detection graph expects a {w}x{h} input, only square inputs are supported"
                    )));
                }
                if *h as u32 != config.image_size {
                    log::warn!(
                        "Configured image size {} differs from the graph's fixed input {}, using {}",
                        config.image_size, h, h
                    );
                }
                *h as u32
            }
            _ => config.image_size,
        };

        let names_parsed = Self::fetch_names(&engines.detector);
        let names = match (config.names.clone(), names_parsed) {
            (Some(names), Some(parsed)) => {
                if names.len() != parsed.len() {
                    log::warn!(
                        "{} configured class names but the graph declares {}, keeping the configured ones",
                        names.len(),
                        parsed.len()
                    );
                }
                names
            }
            (Some(names), None) => names,
            (None, Some(parsed)) => parsed,
            (None, None) => vec![],
        };

        Self::check_io_names(&engines.detector, engines.loss.as_ref(), &config);

        log::info!(
            "YOLOv5 detector on {} | input {}x{} | batch {} | classes {:?} | loss graph {}",
            device,
            image_size,
            image_size,
            if batch_dyn { format!("dynamic (max {})", config.max_batch_size) } else { "fixed".to_string() },
            names,
            engines.loss.as_ref().map_or("-", |l| l.name()),
        );

        Ok(Self {
            model: ModelHandle::new(engines.detector, engines.loss),
            config,
            names,
            device,
            image_size,
            batch_dyn,
        })
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    pub fn mode(&self) -> ModelMode {
        self.model.mode()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    pub fn has_loss_graph(&self) -> bool {
        self.model.has_loss_graph()
    }

    /// `(detection graph, loss graph)` opset versions.
    pub fn opset_versions(&self) -> (usize, Option<usize>) {
        self.model.inspect(|detector, loss| (detector.opset_version(), loss.map(OrtEngine::opset_version)))
    }

    pub fn label(&self, class_id: usize) -> String {
        outputs::label_for(&self.names, class_id)
    }

    /// Letterboxes one image into the working resolution.
    pub fn letterbox(&self, image: &RgbImage) -> Result<(RgbImage, LetterboxInfo)> {
        image_ops::letterbox(image, self.image_size, self.config.pad_value)
    }

    /// Letterboxes every image and stacks them into `[N, S, S, 3]`, channel order unchanged.
    pub fn preprocess(&self, images: &[RgbImage]) -> Result<Array4<u8>> {
        Ok(self.preprocess_with_info(images)?.0)
    }

    pub fn preprocess_with_info(&self, images: &[RgbImage]) -> Result<(Array4<u8>, Vec<LetterboxInfo>)> {
        image_ops::letterbox_batch(images, self.image_size, self.config.pad_value)
    }

    /// `[N, 3, H, W]` (or `[3, H, W]`) in `[0, 1]` to `N` arrays of `[H, W, 3]` in `[0, 255]`.
    pub fn postprocess(&self, adv_images: ArrayViewD<f32>) -> Result<Vec<Array3<f32>>> {
        let batch = image_ops::ensure_batched(adv_images)?;
        Ok(image_ops::nchw_to_hwc_255(batch))
    }

    /// Like [`Self::postprocess`], rounded and clamped into saveable images.
    pub fn to_rgb_images(&self, adv_images: ArrayViewD<f32>) -> Result<Vec<RgbImage>> {
        self.postprocess(adv_images)?
            .iter()
            .map(|hwc| image_ops::hwc_255_to_rgb(hwc.view()))
            .collect()
    }

    /// Runs the loss graph on `[N, 3, H, W]` images in training mode. The model is back in
    /// evaluation mode when this returns, whether it succeeded or not.
    pub fn forward(&self, adv_images: ArrayViewD<f32>, targets: &Targets) -> Result<LossOutput> {
        let images = image_ops::ensure_batched(adv_images)?;
        let (n, c, _, _) = images.dim();
        if c != 3 {
            return Err(DetectorError::shape(format!("expected [N, 3, H, W] images, got {:?}", images.shape())));
        }
        if let Some(i) = targets.iter().map(|t| t.image_index).find(|&i| i >= n) {
            return Err(DetectorError::shape(format!("target refers to image {i} of a batch of {n}")));
        }
        // the TensorRT profile only covers batches up to the configured maximum
        if matches!(self.device, InferenceDevice::TensorRT(_)) && n > self.config.max_batch_size {
            return Err(DetectorError::shape(format!(
                "batch of {n} exceeds max_batch_size {} on {}",
                self.config.max_batch_size, self.device
            )));
        }

        let mut xs = Xs::new();
        xs.push_kv(INPUT_IMAGES, X::from(images.as_standard_layout().into_owned().into_dyn()))?;
        xs.push_kv(INPUT_TARGETS, X::from(targets.to_array().into_dyn()))?;

        let ys = self.model.with_training_mode(|engine| Ok(engine.engine_run(xs)?))?;
        outputs::read_loss(
            ys,
            &self.config.loss_output,
            self.config.loss_items_output.as_deref(),
            self.config.grad_output.as_deref(),
        )
    }

    /// Detects plates in `[N, H, W, 3]` (or `[H, W, 3]`) u8 images.
    pub fn detect(&self, images: ArrayViewD<u8>) -> Result<Vec<Vec<Detection>>> {
        let batch = image_ops::ensure_batched(images)?;
        let images = image_ops::batch_to_rgb(batch)?;
        self.detect_images(&images)
    }

    pub fn detect_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<Detection>>> {
        if images.is_empty() {
            return Ok(vec![]);
        }
        self.run(images)
    }

    /// Loss targets for a batch of `[N, H, W, 3]` images; every image of the batch shares the
    /// same size. See [`Self::make_targets_for_images`] for mixed sizes.
    pub fn make_targets<R: PredictionRow, A>(&self, predictions: &[Vec<R>], images: ArrayView<A, IxDyn>) -> Result<Targets> {
        let batch = image_ops::ensure_batched(images)?;
        let (n, h, w, _) = batch.dim();
        targets::make_targets(predictions, &vec![(w as u32, h as u32); n])
    }

    /// Loss targets normalized by each image's own size.
    pub fn make_targets_for_images<R: PredictionRow>(&self, predictions: &[Vec<R>], images: &[RgbImage]) -> Result<Targets> {
        targets::make_targets_for_images(predictions, images)
    }

    pub fn get_bboxes<R: PredictionRow>(&self, predictions: &[Vec<R>]) -> Result<Vec<Vec<[i32; 4]>>> {
        targets::get_bboxes(predictions)
    }

    fn check_io_names(detector: &OrtEngine, loss: Option<&OrtEngine>, config: &DetectorConfig) {
        if !detector.in_names().iter().any(|n| n == INPUT_IMAGES) {
            log::warn!(
                "Detection graph {} has no `{}` input, feeding images by position ({:?})",
                detector.name(), INPUT_IMAGES, detector.in_names()
            );
        }
        if let Some(loss) = loss {
            let expected = std::iter::once(config.loss_output.as_str())
                .chain(config.loss_items_output.as_deref())
                .chain(config.grad_output.as_deref());
            for name in expected {
                if !loss.out_names().iter().any(|n| n == name) {
                    log::warn!("Loss graph {} has no `{}` output ({:?})", loss.name(), name, loss.out_names());
                }
            }
        }
    }

    fn fetch_names(engine: &OrtEngine) -> Option<Vec<String>> {
        // `{0: 'plate', 1: "square plate"}`
        let names = engine.try_fetch("names")?;
        let re = match Regex::new(r#"(['"])([-()\w '"]+)(['"])"#) {
            Ok(re) => re,
            Err(e) => {
                log::warn!("Cannot parse class names: {e}");
                return None;
            }
        };
        let names = re
            .captures_iter(&names)
            .map(|c| c.extract())
            .map(|(_, [_, name, _])| name.to_string())
            .collect::<Vec<_>>();
        (!names.is_empty()).then_some(names)
    }
}

impl InferenceProcess for YoloV5Detector {
    type Input = RgbImage;
    type Output = Vec<Detection>;

    fn prepare_inputs(&self, xs: &[Self::Input]) -> Result<(Xs, Vec<LetterboxInfo>)> {
        let (batch, infos) = self.preprocess_with_info(xs)?;
        let nchw = image_ops::nhwc_to_nchw_normalized(batch.view());
        let mut ys = Xs::new();
        ys.push_kv(INPUT_IMAGES, X::from(nchw.into_dyn()))?;
        Ok((ys, infos))
    }

    fn inference(&self, xs: Xs) -> Result<Xs> {
        let chunk = if self.batch_dyn { self.config.max_batch_size.max(1) } else { 1 };
        let n = xs.get(INPUT_IMAGES).map_or(0, |x| x.shape()[0]);
        self.model.with_evaluation_mode(|engine| {
            if n <= chunk {
                return Ok(engine.engine_run(xs)?);
            }
            let parts = outputs::split_batch(xs, INPUT_IMAGES, chunk)?
                .into_iter()
                .map(|part| Ok(engine.engine_run(part)?))
                .collect::<Result<Vec<_>>>()?;
            outputs::concat_batches(parts)
        })
    }

    fn decode_outputs(&self, ys: Xs, infos: &[LetterboxInfo]) -> Result<Vec<Self::Output>> {
        outputs::decode_detections(&ys, infos, self.config.conf_threshold, &self.names)
    }

    fn profile(&self) -> bool {
        self.config.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn detector_is_shareable() {
        assert_send_sync::<YoloV5Detector>();
    }
}
