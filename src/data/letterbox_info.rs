use serde::{Deserialize, Serialize};

/// How one source image was mapped into the square working resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LetterboxInfo {
    pub width_src: u32,
    pub height_src: u32,
    pub width_dst: u32,
    pub height_dst: u32,
    /// Scale applied to both axes.
    pub ratio: f32,
    /// Left padding in destination pixels.
    pub pad_left: u32,
    /// Top padding in destination pixels.
    pub pad_top: u32,
}

impl LetterboxInfo {
    /// Maps a point from letterboxed space back to source-image pixels, clamped to the image.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = (x - self.pad_left as f32) / self.ratio;
        let sy = (y - self.pad_top as f32) / self.ratio;
        (
            sx.clamp(0., self.width_src as f32),
            sy.clamp(0., self.height_src as f32),
        )
    }

    /// Maps a point from source-image pixels into letterboxed space.
    pub fn to_letterbox(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.ratio + self.pad_left as f32,
            y * self.ratio + self.pad_top as f32,
        )
    }
}
