//! Graph outputs -> detections and losses, plus batch splitting for graphs that cannot take a
//! whole batch at once.

use ndarray::{concatenate, Axis, Ix3, Ix4};
use crate::common::{BBox, Detection, LossOutput};
use crate::data::{LetterboxInfo, Xs, X};
use crate::error::DetectorError;
use crate::Result;

/// `x1, y1, x2, y2, conf, cls`
pub const DETECTION_FIELDS: usize = 6;

/// Class label, or `# <id>` when the class has no name.
pub fn label_for(names: &[String], class_id: usize) -> String {
    names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("# {}", class_id))
}

/// Turns the first output of the detection graph, `[N, max_det, 6]` (or `[max_det, 6]` for a
/// single image) in letterbox pixels, into per-image detections in source pixels.
///
/// Rows with zero confidence are padding and are always dropped.
pub fn decode_detections(ys: &Xs, infos: &[LetterboxInfo], conf_threshold: f32, names: &[String]) -> Result<Vec<Vec<Detection>>> {
    if ys.is_empty() {
        return Err(DetectorError::Inference("detection graph produced no outputs".to_string()));
    }
    let preds = ys[0].view();
    let preds = match preds.ndim() {
        2 => preds.insert_axis(Axis(0)),
        3 => preds,
        n => return Err(DetectorError::shape(format!("detection output has {n} dimensions"))),
    };
    let preds = preds.into_dimensionality::<Ix3>()?;
    let (n, _, fields) = preds.dim();
    if n != infos.len() {
        return Err(DetectorError::shape(format!("{n} detection groups for {} images", infos.len())));
    }
    if fields < DETECTION_FIELDS {
        return Err(DetectorError::shape(format!("detection rows have {fields} fields, need {DETECTION_FIELDS}")));
    }

    let ys = preds
        .axis_iter(Axis(0))
        .zip(infos)
        .map(|(rows, info)| {
            rows.axis_iter(Axis(0))
                .filter_map(|row| {
                    let conf = row[4];
                    if !(conf > 0. && conf >= conf_threshold) {
                        return None;
                    }
                    let class_id = row[5].max(0.) as usize;
                    let (x1, y1) = info.to_source(row[0], row[1]);
                    let (x2, y2) = info.to_source(row[2], row[3]);
                    Some(Detection::new(BBox::new(x1, y1, x2, y2), conf, class_id, Some(label_for(names, class_id))))
                })
                .collect::<Vec<_>>()
        })
        .collect();
    Ok(ys)
}

/// Reads the loss graph outputs. The loss falls back to the first output when `loss_name`
/// is absent; malformed optional outputs are dropped with a warning.
pub fn read_loss(mut ys: Xs, loss_name: &str, loss_items_name: Option<&str>, grad_name: Option<&str>) -> Result<LossOutput> {
    let loss = match ys.take(loss_name) {
        Some(x) => x,
        None => {
            let first = ys.names().first().cloned().ok_or_else(|| {
                DetectorError::Inference("loss graph produced no outputs".to_string())
            })?;
            log::debug!("No `{}` output, reading the loss from `{}`", loss_name, first);
            ys.take(&first).ok_or_else(|| DetectorError::Inference(format!("missing output `{first}`")))?
        }
    };
    let loss = loss
        .scalar()
        .ok_or_else(|| DetectorError::Inference("loss output is empty".to_string()))?;

    let loss_items = match loss_items_name.and_then(|name| ys.take(name)) {
        Some(x) => match x.as_slice() {
            Some(&[lbox, lobj, lcls]) => Some([lbox, lobj, lcls]),
            _ => {
                log::warn!("Loss items output has shape {:?}, expected 3 values", x.shape());
                None
            }
        },
        None => None,
    };

    let grad = match grad_name.and_then(|name| ys.take(name)) {
        Some(x) => Some(x.into_inner().into_dimensionality::<Ix4>()?),
        None => None,
    };

    Ok(LossOutput { loss, loss_items, grad })
}

/// Splits the `key` tensor along the batch axis into runs of at most `chunk` items. Other
/// tensors are not carried over.
pub fn split_batch(mut xs: Xs, key: &str, chunk: usize) -> Result<Vec<Xs>> {
    let x = xs
        .take(key)
        .ok_or_else(|| DetectorError::Inference(format!("missing input `{key}`")))?;
    if x.ndim() == 0 {
        return Err(DetectorError::shape(format!("input `{key}` has no batch axis")));
    }
    x.axis_chunks_iter(Axis(0), chunk.max(1))
        .map(|part| {
            let mut ys = Xs::new();
            ys.push_kv(key, X::from(part.to_owned()))?;
            Ok(ys)
        })
        .collect()
}

/// Joins per-run outputs back into one batch. Outputs without a batch axis (`[max_det, 6]`)
/// count as a batch of one.
pub fn concat_batches(parts: Vec<Xs>) -> Result<Xs> {
    if parts.len() == 1 {
        return Ok(parts.into_iter().next().unwrap_or_default());
    }
    let mut ys = Xs::new();
    let Some(first) = parts.first() else {
        return Ok(ys);
    };
    for name in first.names().to_vec() {
        let views = parts
            .iter()
            .map(|y| {
                let x = y.get(&name).ok_or_else(|| {
                    DetectorError::Inference(format!("output `{name}` missing from a partial run"))
                })?;
                let v = x.view();
                Ok(if v.ndim() == 2 { v.insert_axis(Axis(0)) } else { v })
            })
            .collect::<Result<Vec<_>>>()?;
        ys.push_kv(&name, X::from(concatenate(Axis(0), &views)?))?;
    }
    Ok(ys)
}
