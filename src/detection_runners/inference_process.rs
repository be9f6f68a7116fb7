use std::time::Instant;
use crate::data::{LetterboxInfo, Xs};
use crate::utils;
use crate::Result;

pub trait InferenceProcess {
    type Input;
    type Output;

    /// Turns raw inputs into model inputs, remembering how each was mapped.
    fn prepare_inputs(&self, xs: &[Self::Input]) -> Result<(Xs, Vec<LetterboxInfo>)>;

    /// Executes the model on the prepared inputs.
    fn inference(&self, xs: Xs) -> Result<Xs>;

    /// Decodes the model's outputs back into source-image space.
    fn decode_outputs(&self, ys: Xs, infos: &[LetterboxInfo]) -> Result<Vec<Self::Output>>;

    fn profile(&self) -> bool {
        false
    }

    /// Executes the full pipeline.
    fn run(&self, xs: &[Self::Input]) -> Result<Vec<Self::Output>> {
        let started = Instant::now();
        let mut elapsed = started.elapsed();

        let (ys, infos) = self.prepare_inputs(xs)?;
        elapsed = utils::trace(self.profile(), "TIME", "Preprocessing input", started, elapsed);

        let ys = self.inference(ys)?;
        elapsed = utils::trace(self.profile(), "TIME", "Detection run", started, elapsed);

        let ys = self.decode_outputs(ys, &infos)?;
        utils::trace(self.profile(), "TIME", "Postprocessing", started, elapsed);

        Ok(ys)
    }
}
