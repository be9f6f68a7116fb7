use serde::{Deserialize, Serialize};
use crate::common::BBox;

/// One detected object in source-image pixel coordinates.
#[derive(Default, Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: usize,
    pub label: Option<String>,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32, class_id: usize, label: Option<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            label,
        }
    }

    /// Sets the bounding box's coordinates using `(x1, y1, x2, y2)`.
    ///
    /// # Arguments
    ///
    /// * `x1` - The x-coordinate of the top-left corner.
    /// * `y1` - The y-coordinate of the top-left corner.
    /// * `x2` - The x-coordinate of the bottom-right corner.
    /// * `y2` - The y-coordinate of the bottom-right corner.
    ///
    /// # Returns
    ///
    /// A `Detection` instance with updated coordinates.
    pub fn with_x1y1_x2y2(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = BBox::default().with_x1y1_x2y2(x1, y1, x2, y2);
        self
    }

    /// Sets the confidence score of the detection.
    pub fn with_confidence(mut self, conf: f32) -> Self {
        self.confidence = conf;
        self
    }

    /// Sets the class index of the detection.
    pub fn with_class_id(mut self, class_id: usize) -> Self {
        self.class_id = class_id;
        self
    }

    /// Sets the optional class label of the detection.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or("Unknown".to_string())
    }

    /// The detection as a `(xmin, ymin, xmax, ymax, confidence, class)` row.
    pub fn to_row(&self) -> [f32; 6] {
        [
            self.bbox.x1,
            self.bbox.y1,
            self.bbox.x2,
            self.bbox.y2,
            self.confidence,
            self.class_id as f32,
        ]
    }
}

/// A per-object prediction row laid out `(xmin, ymin, xmax, ymax, confidence, class, ...)`.
///
/// Implemented for [`Detection`] and for raw float rows so detections coming from other
/// decoders can be fed to the target/bbox conversions unchanged.
pub trait PredictionRow {
    /// `(xmin, ymin, xmax, ymax)`, or `None` when the row is too short.
    fn corners(&self) -> Option<[f32; 4]>;

    /// Class index, or `None` when the row has no class field.
    fn class_index(&self) -> Option<f32>;
}

impl PredictionRow for Detection {
    fn corners(&self) -> Option<[f32; 4]> {
        Some([self.bbox.x1, self.bbox.y1, self.bbox.x2, self.bbox.y2])
    }

    fn class_index(&self) -> Option<f32> {
        Some(self.class_id as f32)
    }
}

impl PredictionRow for [f32] {
    fn corners(&self) -> Option<[f32; 4]> {
        match self {
            [x1, y1, x2, y2, ..] => Some([*x1, *y1, *x2, *y2]),
            _ => None,
        }
    }

    fn class_index(&self) -> Option<f32> {
        self.get(5).copied()
    }
}

impl PredictionRow for Vec<f32> {
    fn corners(&self) -> Option<[f32; 4]> {
        self.as_slice().corners()
    }

    fn class_index(&self) -> Option<f32> {
        self.as_slice().class_index()
    }
}

impl<const N: usize> PredictionRow for [f32; N] {
    fn corners(&self) -> Option<[f32; 4]> {
        self.as_slice().corners()
    }

    fn class_index(&self) -> Option<f32> {
        self.as_slice().class_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rows_expose_corners_and_class() {
        let row = vec![1.0, 2.0, 3.0, 4.0, 0.9, 0.0];
        assert_eq!(row.corners(), Some([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(row.class_index(), Some(0.0));

        let short = [1.0f32, 2.0, 3.0];
        assert_eq!(short.corners(), None);
        assert_eq!(short.class_index(), None);
    }

    #[test]
    fn detection_row_round_trips_fields() {
        let det = Detection::default()
            .with_x1y1_x2y2(5., 6., 7., 8.)
            .with_confidence(0.5)
            .with_class_id(2)
            .with_label("plate");
        assert_eq!(det.to_row(), [5., 6., 7., 8., 0.5, 2.]);
        assert_eq!(det.get_label(), "plate");
    }
}
