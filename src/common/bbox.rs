use serde::{Deserialize, Serialize};

/// Axis-aligned box in corner format, pixel coordinates.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, PartialOrd)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Returns the center x-coordinate of the bounding box.
    pub fn cx(&self) -> f32 {
        (self.x1 + self.x2) / 2.
    }

    /// Returns the center y-coordinate of the bounding box.
    pub fn cy(&self) -> f32 {
        (self.y1 + self.y2) / 2.
    }

    /// Corners truncated toward zero, the same way a float-to-int cast does.
    pub fn as_x1y1_x2y2_i32(&self) -> [i32; 4] {
        [self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32]
    }

    /// Clamps the box into `[0, max_x] x [0, max_y]`.
    pub fn clip(mut self, max_x: f32, max_y: f32) -> Self {
        self.x1 = self.x1.clamp(0., max_x);
        self.x2 = self.x2.clamp(0., max_x);
        self.y1 = self.y1.clamp(0., max_y);
        self.y2 = self.y2.clamp(0., max_y);
        self
    }

    /// Converts to `(cx, cy, w, h)` normalized by the image size.
    ///
    /// With `clip` set, the corners are first clamped to `[0, w - eps] x [0, h - eps]` so the
    /// normalized values stay strictly below 1.
    ///
    /// # Arguments
    ///
    /// * `img_w` - Width of the image the box lives in.
    /// * `img_h` - Height of the image the box lives in.
    /// * `clip` - Clamp the box into the image before converting.
    /// * `eps` - Margin kept from the right/bottom border when clipping.
    pub fn to_xywhn(&self, img_w: f32, img_h: f32, clip: bool, eps: f32) -> (f32, f32, f32, f32) {
        let b = if clip {
            self.clip(img_w - eps, img_h - eps)
        } else {
            *self
        };
        (
            b.cx() / img_w,
            b.cy() / img_h,
            b.width() / img_w,
            b.height() / img_h,
        )
    }

    /// Sets the bounding box's coordinates using `(x1, y1, x2, y2)`.
    pub fn with_x1y1_x2y2(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn xywhn_of_inner_box() {
        let (cx, cy, w, h) = BBox::new(10., 20., 110., 70.).to_xywhn(200., 100., true, 1e-3);
        assert_abs_diff_eq!(cx, 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(cy, 0.45, epsilon = 1e-6);
        assert_abs_diff_eq!(w, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(h, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn xywhn_clips_overflowing_box() {
        let (cx, _, w, _) = BBox::new(-20., 0., 250., 50.).to_xywhn(200., 100., true, 1e-3);
        assert!(w < 1.0);
        assert_abs_diff_eq!(cx, (200. - 1e-3) / 2. / 200., epsilon = 1e-6);
    }

    #[test]
    fn truncates_toward_zero() {
        assert_eq!(BBox::new(10.9, 20.1, 110.5, 70.99).as_x1y1_x2y2_i32(), [10, 20, 110, 70]);
    }
}
