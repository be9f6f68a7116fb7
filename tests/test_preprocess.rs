extern crate lpr_adv_detect;

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};
use ndarray::{Array4, Axis};
use rand::Rng;
use lpr_adv_detect::detection_runners::ort_detector::image_ops;


#[test]
fn full_hd_frame_letterboxes_to_640() {
    plates::init_logger();
    let img = plates::synthetic_plate(1920, 1080, (800, 600, 300, 90));
    let (batch, infos) = image_ops::letterbox_batch(&[img], 640, 114).unwrap();

    assert_eq!(batch.shape(), &[1, 640, 640, 3]);
    assert_relative_eq!(infos[0].ratio, 1. / 3., epsilon = 1e-6);
    assert_eq!((infos[0].pad_left, infos[0].pad_top), (0, 140));
    // padding band above and below the resized frame
    assert_eq!(batch[[0, 10, 320, 0]], 114);
    assert_eq!(batch[[0, 630, 320, 2]], 114);
    assert_eq!(batch[[0, 320, 5, 1]], plates::BACKGROUND[1]);
}

#[test]
fn small_frame_is_upscaled() {
    let img = plates::synthetic_plate(320, 240, (100, 60, 120, 60));
    let (out, info) = image_ops::letterbox(&img, 640, 114).unwrap();

    assert_eq!(out.dimensions(), (640, 640));
    assert_relative_eq!(info.ratio, 2.0);
    assert_eq!((info.pad_left, info.pad_top), (0, 80));
    // plate centre lands at (160 * 2, 90 * 2 + 80)
    assert_eq!(out.get_pixel(320, 260), &plates::PLATE);

    let (x, y) = info.to_letterbox(100., 60.);
    assert_relative_eq!(x, 200.);
    assert_relative_eq!(y, 200.);
    let (sx, sy) = info.to_source(x, y);
    assert_relative_eq!(sx, 100.);
    assert_relative_eq!(sy, 60.);
}

#[test]
fn random_sizes_always_fit_the_square() {
    let mut rng = rand::thread_rng();
    let images = (0..8)
        .map(|_| RgbImage::from_pixel(rng.gen_range(1..2000), rng.gen_range(1..2000), Rgb([1, 2, 3])))
        .collect::<Vec<_>>();
    let (batch, infos) = image_ops::letterbox_batch(&images, 640, 114).unwrap();

    assert_eq!(batch.shape(), &[8, 640, 640, 3]);
    for (img, info) in images.iter().zip(&infos) {
        let (w, h) = img.dimensions();
        assert_eq!((info.width_src, info.height_src), (w, h));
        let new_w = (w as f32 * info.ratio).round_ties_even() as u32;
        let new_h = (h as f32 * info.ratio).round_ties_even() as u32;
        assert!(new_w == 640 || new_h == 640, "{w}x{h} -> {new_w}x{new_h}");
        assert!(info.pad_left + new_w <= 640);
        assert!(info.pad_top + new_h <= 640);
    }
}

#[test]
fn normalized_layout_matches_source_pixels() {
    let img = RgbImage::from_fn(8, 4, |x, y| Rgb([x as u8 * 30, y as u8 * 60, 255]));
    let batch = image_ops::rgb_to_array(&img).unwrap().insert_axis(Axis(0));
    let nchw = image_ops::nhwc_to_nchw_normalized(batch.view());

    assert_eq!(nchw.shape(), &[1, 3, 4, 8]);
    assert!(nchw.is_standard_layout());
    assert_relative_eq!(nchw[[0, 0, 2, 5]], 150. / 255.);
    assert_relative_eq!(nchw[[0, 1, 3, 0]], 180. / 255.);
    assert_relative_eq!(nchw[[0, 2, 1, 1]], 1.0);
}

#[test]
fn postprocess_returns_one_hwc_array_per_image() {
    let mut adv = Array4::<f32>::from_elem((2, 3, 4, 5), 0.5);
    adv[[1, 2, 3, 4]] = 1.0;

    let out = image_ops::nchw_to_hwc_255(adv.view());
    assert_eq!(out.len(), 2);
    for hwc in &out {
        assert_eq!(hwc.shape(), &[4, 5, 3]);
    }
    assert_relative_eq!(out[0][[0, 0, 0]], 127.5);
    assert_relative_eq!(out[1][[3, 4, 2]], 255.0);

    let rgb = image_ops::hwc_255_to_rgb(out[1].view()).unwrap();
    assert_eq!(rgb.dimensions(), (5, 4));
    assert_eq!(rgb.get_pixel(4, 3), &Rgb([128, 128, 255]));
}

#[test]
fn single_images_are_promoted_to_a_batch() {
    let chw = ndarray::Array3::<f32>::zeros((3, 16, 16)).into_dyn();
    let batched = image_ops::ensure_batched(chw.view()).unwrap();
    assert_eq!(batched.shape(), &[1, 3, 16, 16]);
    assert_eq!(image_ops::nchw_to_hwc_255(batched).len(), 1);

    let flat = ndarray::Array2::<f32>::zeros((3, 16)).into_dyn();
    assert!(image_ops::ensure_batched(flat.view()).is_err());
}
