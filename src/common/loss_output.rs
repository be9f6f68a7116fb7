use ndarray::Array4;

/// Result of a forward pass through the loss graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LossOutput {
    /// Scalar loss of the whole batch.
    pub loss: f32,
    /// `(box, objectness, class)` components when the graph exports them.
    pub loss_items: Option<[f32; 3]>,
    /// d(loss)/d(images), `[N, 3, H, W]`, when the graph exports it.
    pub grad: Option<Array4<f32>>,
}

impl LossOutput {
    pub fn box_loss(&self) -> Option<f32> {
        self.loss_items.map(|l| l[0])
    }

    pub fn obj_loss(&self) -> Option<f32> {
        self.loss_items.map(|l| l[1])
    }

    pub fn cls_loss(&self) -> Option<f32> {
        self.loss_items.map(|l| l[2])
    }
}
