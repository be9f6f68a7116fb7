extern crate lpr_adv_detect;

use approx::assert_relative_eq;
use lpr_adv_detect::common::{BBox, Detection};
use image::RgbImage;
use lpr_adv_detect::detection_runners::ort_detector::targets::{get_bboxes, make_targets, make_targets_for_images};
use lpr_adv_detect::DetectorError;

fn plate(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32) -> Detection {
    Detection::new(BBox::new(x1, y1, x2, y2), conf, 0, Some("plate".to_string()))
}

#[test]
fn image_indices_follow_batch_order() {
    let predictions = vec![
        vec![plate(10., 10., 50., 30., 0.9), plate(60., 10., 90., 30., 0.7)],
        vec![],
        vec![plate(0., 0., 20., 10., 0.5)],
    ];
    let sizes = [(200, 100), (640, 480), (100, 100)];

    let targets = make_targets(&predictions, &sizes).unwrap();
    assert_eq!(targets.image_indices(), vec![0, 0, 2]);
    assert_eq!(targets.for_image(1).count(), 0);

    let array = targets.to_array();
    assert_eq!(array.shape(), &[3, 6]);
    assert_relative_eq!(array[[2, 0]], 2.0);
    assert_relative_eq!(array[[0, 1]], 0.0);
}

#[test]
fn corners_are_normalized_by_each_image_size() {
    let predictions = vec![vec![vec![10.0f32, 20.0, 110.0, 70.0, 0.8, 0.0]]];
    let targets = make_targets(&predictions, &[(200, 100)]).unwrap();

    let t = targets[0];
    assert_eq!(t.image_index, 0);
    assert_relative_eq!(t.class, 0.0);
    assert_relative_eq!(t.cx, 0.3, epsilon = 1e-6);
    assert_relative_eq!(t.cy, 0.45, epsilon = 1e-6);
    assert_relative_eq!(t.w, 0.5, epsilon = 1e-6);
    assert_relative_eq!(t.h, 0.5, epsilon = 1e-6);
}

#[test]
fn boxes_outside_the_image_are_clipped() {
    let predictions = vec![vec![[-10.0f32, -5.0, 250.0, 120.0, 0.6, 0.0]]];
    let t = make_targets(&predictions, &[(200, 100)]).unwrap()[0];

    assert_relative_eq!(t.cx, 0.5, epsilon = 1e-4);
    assert_relative_eq!(t.cy, 0.5, epsilon = 1e-4);
    assert_relative_eq!(t.w, 1.0, epsilon = 1e-4);
    assert_relative_eq!(t.h, 1.0, epsilon = 1e-4);
    assert!(t.w < 1.0 && t.h < 1.0);
}

#[test]
fn mixed_size_images_use_their_own_sizes() {
    let images = [RgbImage::new(200, 100), RgbImage::new(400, 400)];
    let predictions = vec![
        vec![[10.0f32, 20.0, 110.0, 70.0, 0.9, 0.0]],
        vec![[100.0f32, 100.0, 300.0, 200.0, 0.8, 0.0]],
    ];
    let targets = make_targets_for_images(&predictions, &images).unwrap();

    assert_eq!(targets.image_indices(), vec![0, 1]);
    assert_relative_eq!(targets[0].cx, 0.3, epsilon = 1e-6);
    assert_relative_eq!(targets[0].w, 0.5, epsilon = 1e-6);
    assert_relative_eq!(targets[1].cx, 0.5, epsilon = 1e-6);
    assert_relative_eq!(targets[1].cy, 0.375, epsilon = 1e-6);
    assert_relative_eq!(targets[1].h, 0.25, epsilon = 1e-6);
}

#[test]
fn empty_batch_yields_no_targets() {
    let predictions: Vec<Vec<Detection>> = vec![vec![], vec![]];
    let targets = make_targets(&predictions, &[(640, 640), (640, 640)]).unwrap();
    assert!(targets.is_empty());
    assert_eq!(targets.to_array().shape(), &[0, 6]);
}

#[test]
fn mismatched_batches_are_rejected() {
    let predictions = vec![vec![plate(1., 1., 2., 2., 0.9)]];
    let res = make_targets(&predictions, &[(10, 10), (10, 10)]);
    assert!(matches!(res, Err(DetectorError::ShapeMismatch(_))));
}

#[test]
fn bboxes_are_truncated_corners() {
    let predictions = vec![
        vec![
            vec![12.9f32, 3.2, 40.7, 20.99, 0.8, 0.0],
            vec![-1.5f32, 0.4, 7.999, 8.0, 0.3, 0.0],
        ],
        vec![],
    ];
    let bboxes = get_bboxes(&predictions).unwrap();
    assert_eq!(bboxes, vec![vec![[12, 3, 40, 20], [-1, 0, 7, 8]], vec![]]);
}

#[test]
fn bboxes_from_detections_keep_order() {
    let predictions = vec![vec![plate(5.5, 6.5, 7.5, 8.5, 0.9), plate(1.1, 2.2, 3.3, 4.4, 0.4)]];
    assert_eq!(get_bboxes(&predictions).unwrap(), vec![vec![[5, 6, 7, 8], [1, 2, 3, 4]]]);
}
