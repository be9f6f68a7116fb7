use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Training-style label row: `(image_index, class, cx, cy, w, h)` with the box normalized
/// to `[0, 1]` by the source image size.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub image_index: usize,
    pub class: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl Target {
    pub fn to_row(&self) -> [f32; 6] {
        [self.image_index as f32, self.class, self.cx, self.cy, self.w, self.h]
    }
}

/// Flattened targets for a whole batch, ordered by image index.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets(pub Vec<Target>);

impl std::ops::Deref for Targets {
    type Target = Vec<Target>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Target>> for Targets {
    fn from(targets: Vec<Target>) -> Self {
        Self(targets)
    }
}

impl Targets {
    /// The `[T, 6]` array layout consumed by the loss graph.
    pub fn to_array(&self) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((self.0.len(), 6));
        for (mut row, target) in out.rows_mut().into_iter().zip(self.0.iter()) {
            for (dst, src) in row.iter_mut().zip(target.to_row()) {
                *dst = src;
            }
        }
        out
    }

    pub fn image_indices(&self) -> Vec<usize> {
        self.0.iter().map(|t| t.image_index).collect()
    }

    /// Rows belonging to one image of the batch.
    pub fn for_image(&self, image_index: usize) -> impl Iterator<Item = &Target> {
        self.0.iter().filter(move |t| t.image_index == image_index)
    }
}
