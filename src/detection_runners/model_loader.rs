//! Locates the exported graphs and builds their engines.

use std::path::{Path, PathBuf};
use crate::common::DetectorConfig;
use crate::data::ConfigOrt;
use crate::detection_runners::ort_detector::OrtEngine;
use crate::error::DetectorError;
use crate::Result;

const PRETRAINED_DIR: [&str; 4] = ["assets", "pretrained", "License-Plate-Recognition", "model"];
const DETECTOR_FILE: &str = "LP_detector.onnx";
const LOSS_GRAPH_FILE: &str = "LP_detector_loss.onnx";

/// Fixed layout of an installation: `<root>/assets/pretrained/License-Plate-Recognition/model/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root found by walking `levels` directories up from `start`.
    pub fn from_ancestor<P: AsRef<Path>>(start: P, levels: usize) -> Option<Self> {
        start.as_ref().ancestors().nth(levels).map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_dir(&self) -> PathBuf {
        PRETRAINED_DIR.iter().fold(self.root.clone(), |p, sub| p.join(sub))
    }

    pub fn detector_path(&self) -> PathBuf {
        self.model_dir().join(DETECTOR_FILE)
    }

    pub fn loss_graph_path(&self) -> PathBuf {
        self.model_dir().join(LOSS_GRAPH_FILE)
    }
}

/// Graph files checked to exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub loss_graph: Option<PathBuf>,
}

impl ModelPaths {
    pub fn resolve(config: &DetectorConfig) -> Result<Self> {
        let detector = Self::existing(&config.weights_path)?;
        let loss_graph = match &config.loss_graph_path {
            Some(path) => Some(Self::existing(path)?),
            None => {
                log::warn!("No loss graph configured, forward() will be unavailable");
                None
            }
        };
        Ok(Self {
            detector,
            loss_graph,
        })
    }

    fn existing(path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() || !path.is_file() {
            return Err(DetectorError::MissingWeights(path.to_path_buf()));
        }
        Ok(path.to_path_buf())
    }
}

/// Engines of one detector: evaluation graph and optional loss graph.
#[derive(Debug)]
pub struct LoadedEngines {
    pub detector: OrtEngine,
    pub loss: Option<OrtEngine>,
}

/// Builds every engine from disk. Nothing is cached between calls.
pub fn load_engines(config: &DetectorConfig) -> Result<LoadedEngines> {
    config.validate()?;
    let paths = ModelPaths::resolve(config)?;

    log::info!("Loading detector graph {}", paths.detector.display());
    let detector = OrtEngine::new(&ConfigOrt::from_detector_config(config, &paths.detector))
        .map_err(|e| load_error(&paths.detector, e))?;

    let loss = match &paths.loss_graph {
        Some(path) => {
            log::info!("Loading loss graph {}", path.display());
            // same device as the detector, so both paths agree on placement
            let ort_config = ConfigOrt::from_detector_config(config, path).with_device(detector.device());
            let engine = OrtEngine::new(&ort_config).map_err(|e| load_error(path, e))?;
            Some(engine)
        }
        None => None,
    };

    Ok(LoadedEngines { detector, loss })
}

fn load_error(path: &Path, err: anyhow::Error) -> DetectorError {
    match err.downcast::<DetectorError>() {
        Ok(e) => e,
        Err(e) => DetectorError::ModelLoad(format!("{}: {e:#}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_from_two_levels_up() {
        let layout = ProjectLayout::from_ancestor("/opt/lpr/_models/detection", 2).unwrap();
        assert_eq!(layout.root(), Path::new("/opt/lpr"));
        assert_eq!(
            layout.loss_graph_path(),
            PathBuf::from("/opt/lpr/assets/pretrained/License-Plate-Recognition/model/LP_detector_loss.onnx")
        );
    }

    #[test]
    fn missing_detector_is_reported() {
        let config = DetectorConfig::new("/nonexistent/LP_detector.onnx");
        match ModelPaths::resolve(&config) {
            Err(DetectorError::MissingWeights(p)) => assert!(p.ends_with("LP_detector.onnx")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
