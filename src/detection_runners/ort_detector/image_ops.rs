//! Image <-> tensor conversions around the wrapped model: letterboxing, layout changes and
//! value scaling.

use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::{Array3, Array4, ArrayView3, ArrayView4, ArrayViewD, Axis, Ix4, Zip};
use rayon::prelude::*;
use crate::data::LetterboxInfo;
use crate::error::DetectorError;
use crate::Result;

/// Resizes `img` to fit a `size`x`size` square preserving the aspect ratio, upscaling allowed,
/// and pads the remainder with `pad_value` split evenly on both sides.
pub fn letterbox(img: &RgbImage, size: u32, pad_value: u8) -> Result<(RgbImage, LetterboxInfo)> {
    let (w0, h0) = img.dimensions();
    if w0 == 0 || h0 == 0 || size == 0 {
        return Err(DetectorError::shape(format!(
            "cannot letterbox a {w0}x{h0} image into {size}x{size}"
        )));
    }

    let ratio = (size as f32 / h0 as f32).min(size as f32 / w0 as f32);
    // halves round to even, as YOLOv5's `int(round(x))` does
    let new_w = ((w0 as f32 * ratio).round_ties_even() as u32).clamp(1, size);
    let new_h = ((h0 as f32 * ratio).round_ties_even() as u32).clamp(1, size);

    let dw = (size - new_w) as f32 / 2.;
    let dh = (size - new_h) as f32 / 2.;
    let left = (dw - 0.1).round_ties_even().max(0.) as u32;
    let top = (dh - 0.1).round_ties_even().max(0.) as u32;

    let mut padded = FirImage::from_vec_u8(
        size,
        size,
        vec![pad_value; rgb_buffer_len(size, size)],
        PixelType::U8x3,
    ).map_err(|e| DetectorError::shape(e.to_string()))?;

    if (new_w, new_h) == (w0, h0) {
        // no resampling, copy rows into place
        let row_len = w0 as usize * 3;
        let dst = padded.buffer_mut();
        for (y, row) in img.as_raw().chunks_exact(row_len).enumerate() {
            let offset = (((top as usize + y) * size as usize) + left as usize) * 3;
            dst[offset..offset + row_len].copy_from_slice(row);
        }
    } else {
        let src = FirImage::from_vec_u8(w0, h0, img.as_raw().clone(), PixelType::U8x3)
            .map_err(|e| DetectorError::shape(e.to_string()))?;
        let options = ResizeOptions::new()
            .resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
        let mut resizer = Resizer::new();
        let mut cropped = CroppedImageMut::new(&mut padded, left, top, new_w, new_h)
            .map_err(|e| DetectorError::shape(e.to_string()))?;
        resizer
            .resize(&src, &mut cropped, &options)
            .map_err(|e| DetectorError::Inference(format!("resize failed: {e}")))?;
    }

    let out = RgbImage::from_raw(size, size, padded.buffer().to_vec())
        .ok_or_else(|| DetectorError::shape("letterbox buffer size"))?;

    let info = LetterboxInfo {
        width_src: w0,
        height_src: h0,
        width_dst: size,
        height_dst: size,
        ratio,
        pad_left: left,
        pad_top: top,
    };
    Ok((out, info))
}

/// Byte length of a packed RGB buffer, computed in `usize`.
fn rgb_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Letterboxes every image in parallel and stacks the results into `[N, size, size, 3]`.
pub fn letterbox_batch(images: &[RgbImage], size: u32, pad_value: u8) -> Result<(Array4<u8>, Vec<LetterboxInfo>)> {
    let boxed = images
        .par_iter()
        .map(|img| letterbox(img, size, pad_value))
        .collect::<Result<Vec<_>>>()?;

    let s = size as usize;
    let mut batch = Array4::<u8>::zeros((boxed.len(), s, s, 3));
    let mut infos = Vec::with_capacity(boxed.len());
    for (mut dst, (img, info)) in batch.axis_iter_mut(Axis(0)).zip(boxed) {
        dst.assign(&rgb_to_array(&img)?.view());
        infos.push(info);
    }
    Ok((batch, infos))
}

/// Promotes a single unbatched `[A, B, C]` array to `[1, A, B, C]`. Batched input passes through.
pub fn ensure_batched<A>(x: ArrayViewD<'_, A>) -> Result<ArrayView4<'_, A>> {
    let x = match x.ndim() {
        3 => x.insert_axis(Axis(0)),
        4 => x,
        n => return Err(DetectorError::shape(format!("expected a 3 or 4 dimensional array, got {n}"))),
    };
    Ok(x.into_dimensionality::<Ix4>()?)
}

/// `[H, W, 3]` view of an RGB image.
pub fn rgb_to_array(img: &RgbImage) -> Result<Array3<u8>> {
    let (w, h) = img.dimensions();
    Ok(Array3::from_shape_vec((h as usize, w as usize, 3), img.as_raw().clone())?)
}

/// RGB image from a `[H, W, 3]` u8 array.
pub fn array_to_rgb(array: ArrayView3<u8>) -> Result<RgbImage> {
    let (h, w, c) = array.dim();
    if c != 3 {
        return Err(DetectorError::shape(format!("expected 3 channels, got {c}")));
    }
    let raw = array.iter().copied().collect::<Vec<u8>>();
    RgbImage::from_raw(w as u32, h as u32, raw)
        .ok_or_else(|| DetectorError::shape("image buffer size"))
}

/// Splits an `[N, H, W, 3]` batch into images.
pub fn batch_to_rgb(batch: ArrayView4<u8>) -> Result<Vec<RgbImage>> {
    batch.axis_iter(Axis(0)).map(array_to_rgb).collect()
}

/// `[N, H, W, 3]` u8 -> `[N, 3, H, W]` f32 in `[0, 1]`.
pub fn nhwc_to_nchw_normalized(batch: ArrayView4<u8>) -> Array4<f32> {
    let (n, h, w, c) = batch.dim();
    let mut out = Array4::<f32>::zeros((n, c, h, w));
    Zip::from(&mut out)
        .and(&batch.permuted_axes([0, 3, 1, 2]))
        .for_each(|dst, &src| *dst = src as f32 / 255.0);
    out
}

/// `[N, 3, H, W]` f32 in `[0, 1]` -> `N` arrays of `[H, W, 3]` scaled by 255.
pub fn nchw_to_hwc_255(batch: ArrayView4<f32>) -> Vec<Array3<f32>> {
    batch
        .axis_iter(Axis(0))
        .map(|chw| {
            let (c, h, w) = chw.dim();
            let mut hwc = Array3::<f32>::zeros((h, w, c));
            Zip::from(&mut hwc)
                .and(&chw.permuted_axes([1, 2, 0]))
                .for_each(|dst, &src| *dst = src * 255.0);
            hwc
        })
        .collect()
}

/// Rounds and clamps a `[H, W, 3]` 0-255 float array into an RGB image.
pub fn hwc_255_to_rgb(hwc: ArrayView3<f32>) -> Result<RgbImage> {
    let mut out = Array3::<u8>::zeros(hwc.raw_dim());
    Zip::from(&mut out)
        .and(&hwc)
        .for_each(|dst, &src| *dst = src.round().clamp(0., 255.) as u8);
    array_to_rgb(out.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn letterbox_pads_short_side_evenly() {
        let img = RgbImage::from_pixel(1920, 1080, Rgb([10, 20, 30]));
        let (out, info) = letterbox(&img, 640, 114).unwrap();
        assert_eq!(out.dimensions(), (640, 640));
        assert_eq!(info.pad_left, 0);
        assert_eq!(info.pad_top, 140);
        assert_eq!(out.get_pixel(320, 0), &Rgb([114, 114, 114]));
        assert_eq!(out.get_pixel(320, 320), &Rgb([10, 20, 30]));
        assert_eq!(out.get_pixel(320, 639), &Rgb([114, 114, 114]));
    }

    #[test]
    fn letterbox_without_resize_copies_pixels() {
        let mut img = RgbImage::from_pixel(640, 480, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 1, 2]));
        let (out, info) = letterbox(&img, 640, 114).unwrap();
        assert_eq!(info.ratio, 1.0);
        assert_eq!(out.get_pixel(0, info.pad_top), &Rgb([255, 1, 2]));
    }

    #[test]
    fn layout_round_trip_keeps_pixel_values() {
        let img = RgbImage::from_fn(4, 2, |x, y| Rgb([x as u8 * 50, y as u8 * 100, 7]));
        let batch = rgb_to_array(&img).unwrap().insert_axis(Axis(0));
        let nchw = nhwc_to_nchw_normalized(batch.view());
        assert_eq!(nchw.shape(), &[1, 3, 2, 4]);
        let hwc = nchw_to_hwc_255(nchw.view());
        let back = hwc_255_to_rgb(hwc[0].view()).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn half_pixel_sizes_round_to_even() {
        // 721 * 0.5 = 360.5 -> 360, leaving 140 rows of padding on each side
        let img = RgbImage::from_pixel(1280, 721, Rgb([0, 0, 0]));
        let (out, info) = letterbox(&img, 640, 114).unwrap();
        assert_eq!(out.dimensions(), (640, 640));
        assert_eq!(info.pad_top, 140);
        assert_eq!(out.get_pixel(320, 139), &Rgb([114, 114, 114]));
        assert_eq!(out.get_pixel(320, 140), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(320, 499), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(320, 500), &Rgb([114, 114, 114]));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn buffer_len_does_not_wrap_for_large_squares() {
        assert_eq!(rgb_buffer_len(40_000, 40_000), 4_800_000_000);
        assert_eq!(rgb_buffer_len(640, 640), 1_228_800);
    }

    #[test]
    fn rejects_empty_images() {
        let img = RgbImage::new(0, 10);
        assert!(matches!(letterbox(&img, 640, 114), Err(DetectorError::ShapeMismatch(_))));
    }
}
