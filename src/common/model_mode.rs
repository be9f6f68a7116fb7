/// Operating mode of the wrapped network.
///
/// Evaluation runs the detection graph. Training runs the loss graph, and is only ever
/// entered through a scoped guard around `forward`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ModelMode {
    #[default] Evaluation,
    Training,
}

impl ModelMode {
    pub fn name(&self) -> &'static str {
        match self {
            ModelMode::Evaluation => "eval",
            ModelMode::Training => "train",
        }
    }
}
