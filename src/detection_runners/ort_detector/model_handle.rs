use parking_lot::Mutex;
use crate::common::ModelMode;
use crate::error::DetectorError;
use crate::Result;

struct ModelState<E> {
    detector: E,
    loss: Option<E>,
    mode: ModelMode,
}

/// Shared model behind a lock. The mode is only changed inside the scoped helpers, and
/// evaluation mode is restored on every exit path, panics included.
pub struct ModelHandle<E> {
    inner: Mutex<ModelState<E>>,
}

/// Puts the mode back to evaluation when dropped.
struct ModeGuard<'a> {
    mode: &'a mut ModelMode,
}

impl<'a> ModeGuard<'a> {
    fn enter(mode: &'a mut ModelMode, next: ModelMode) -> Self {
        log::trace!("model mode {} -> {}", mode.name(), next.name());
        *mode = next;
        Self { mode }
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        log::trace!("model mode {} -> {}", self.mode.name(), ModelMode::Evaluation.name());
        *self.mode = ModelMode::Evaluation;
    }
}

impl<E> ModelHandle<E> {
    pub fn new(detector: E, loss: Option<E>) -> Self {
        Self {
            inner: Mutex::new(ModelState {
                detector,
                loss,
                mode: ModelMode::Evaluation,
            }),
        }
    }

    pub fn mode(&self) -> ModelMode {
        self.inner.lock().mode
    }

    pub fn has_loss_graph(&self) -> bool {
        self.inner.lock().loss.is_some()
    }

    /// Runs `f` on the evaluation graph while holding the model.
    pub fn with_evaluation_mode<R>(&self, f: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        let mut state = self.inner.lock();
        let state = &mut *state;
        state.mode = ModelMode::Evaluation;
        f(&mut state.detector)
    }

    /// Runs `f` on the loss graph in training mode while holding the model.
    pub fn with_training_mode<R>(&self, f: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        let mut state = self.inner.lock();
        let state = &mut *state;
        let loss = state.loss.as_mut().ok_or(DetectorError::LossGraphUnavailable)?;
        let _guard = ModeGuard::enter(&mut state.mode, ModelMode::Training);
        f(loss)
    }

    /// Read access to both graphs, e.g. for metadata.
    pub fn inspect<R>(&self, f: impl FnOnce(&E, Option<&E>) -> R) -> R {
        let state = self.inner.lock();
        f(&state.detector, state.loss.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        calls: usize,
    }

    #[test]
    fn training_mode_is_scoped() {
        let handle = Arc::new(ModelHandle::new(Counter::default(), Some(Counter::default())));
        let seen = handle.with_training_mode(|c| {
            c.calls += 1;
            Ok(c.calls)
        }).unwrap();
        assert_eq!(seen, 1);
        assert_eq!(handle.mode(), ModelMode::Evaluation);
    }

    #[test]
    fn failing_training_call_restores_evaluation() {
        let handle = ModelHandle::new(Counter::default(), Some(Counter::default()));
        let res: Result<()> = handle.with_training_mode(|_| Err(DetectorError::Inference("boom".into())));
        assert!(res.is_err());
        assert_eq!(handle.mode(), ModelMode::Evaluation);
    }

    #[test]
    fn panicking_training_call_restores_evaluation() {
        let handle = Arc::new(ModelHandle::new(Counter::default(), Some(Counter::default())));
        let h = handle.clone();
        let joined = std::thread::spawn(move || {
            let _ = h.with_training_mode(|_| -> Result<()> { panic!("inside forward") });
        }).join();
        assert!(joined.is_err());
        assert_eq!(handle.mode(), ModelMode::Evaluation);
    }

    #[test]
    fn training_without_loss_graph_fails() {
        let handle = ModelHandle::new(Counter::default(), None);
        let res = handle.with_training_mode(|_| Ok(()));
        assert!(matches!(res, Err(DetectorError::LossGraphUnavailable)));
        assert!(!handle.has_loss_graph());
    }

    #[test]
    fn concurrent_callers_are_serialized() {
        let handle = Arc::new(ModelHandle::new(Counter::default(), Some(Counter::default())));
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let h = handle.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        h.with_training_mode(|c| {
                            c.calls += 1;
                            Ok(())
                        })
                    } else {
                        h.with_evaluation_mode(|c| {
                            c.calls += 1;
                            Ok(())
                        })
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap().unwrap();
        }
        let (eval_calls, train_calls) = handle.inspect(|d, l| (d.calls, l.map(|l| l.calls)));
        assert_eq!(eval_calls, 4);
        assert_eq!(train_calls, Some(4));
        assert_eq!(handle.mode(), ModelMode::Evaluation);
    }
}
