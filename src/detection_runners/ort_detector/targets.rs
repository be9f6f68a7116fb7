//! Conversions from per-image detections into loss targets and plain boxes.

use image::RgbImage;
use crate::common::{BBox, PredictionRow, Target, Targets};
use crate::error::DetectorError;
use crate::Result;

/// Margin kept from the right/bottom image border when clipping boxes before normalizing.
pub const XYWHN_EPS: f32 = 1e-3;

/// Flattens per-image detections into `(image_index, class, cx, cy, w, h)` targets.
///
/// `image_sizes[i]` is the `(width, height)` of image `i` and normalizes its boxes. Images
/// without detections contribute no rows; indices of later images are unaffected.
pub fn make_targets<R: PredictionRow>(predictions: &[Vec<R>], image_sizes: &[(u32, u32)]) -> Result<Targets> {
    if predictions.len() != image_sizes.len() {
        return Err(DetectorError::shape(format!(
            "{} prediction lists for {} images",
            predictions.len(),
            image_sizes.len()
        )));
    }

    let mut targets = Vec::with_capacity(predictions.iter().map(Vec::len).sum());
    for (image_index, (preds, &(w, h))) in predictions.iter().zip(image_sizes).enumerate() {
        if preds.is_empty() {
            continue;
        }
        if w == 0 || h == 0 {
            return Err(DetectorError::shape(format!("image {image_index} has size {w}x{h}")));
        }
        for (row_index, row) in preds.iter().enumerate() {
            let (corners, class) = match (row.corners(), row.class_index()) {
                (Some(corners), Some(class)) => (corners, class),
                _ => {
                    return Err(DetectorError::shape(format!(
                        "row {row_index} of image {image_index} has no class field"
                    )))
                }
            };
            let [x1, y1, x2, y2] = corners;
            let (cx, cy, bw, bh) = BBox::new(x1, y1, x2, y2).to_xywhn(w as f32, h as f32, true, XYWHN_EPS);
            targets.push(Target {
                image_index,
                class,
                cx,
                cy,
                w: bw,
                h: bh,
            });
        }
    }

    Ok(Targets::from(targets))
}

/// [`make_targets`] for images of any sizes, each normalizing its own boxes.
pub fn make_targets_for_images<R: PredictionRow>(predictions: &[Vec<R>], images: &[RgbImage]) -> Result<Targets> {
    let sizes = images.iter().map(RgbImage::dimensions).collect::<Vec<_>>();
    make_targets(predictions, &sizes)
}

/// Keeps the four corner fields of every row, truncated to integers, order preserved.
pub fn get_bboxes<R: PredictionRow>(predictions: &[Vec<R>]) -> Result<Vec<Vec<[i32; 4]>>> {
    predictions
        .iter()
        .enumerate()
        .map(|(image_index, preds)| {
            preds
                .iter()
                .map(|row| {
                    row.corners()
                        .map(|[x1, y1, x2, y2]| BBox::new(x1, y1, x2, y2).as_x1y1_x2y2_i32())
                        .ok_or_else(|| {
                            DetectorError::shape(format!("row of image {image_index} has fewer than 4 fields"))
                        })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_are_rejected() {
        let preds = vec![vec![vec![1.0f32, 2.0, 3.0, 4.0]]];
        assert!(matches!(make_targets(&preds, &[(10, 10)]), Err(DetectorError::ShapeMismatch(_))));
        assert!(get_bboxes(&preds).is_ok());

        let shorter = vec![vec![vec![1.0f32, 2.0]]];
        assert!(get_bboxes(&shorter).is_err());
    }

    #[test]
    fn batch_length_mismatch_is_rejected() {
        let preds: Vec<Vec<[f32; 6]>> = vec![vec![], vec![]];
        assert!(make_targets(&preds, &[(640, 640)]).is_err());
    }
}
