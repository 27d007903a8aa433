use crate::common::*;

#[derive(Debug, TensorLike)]
pub struct TrainingMessage {
    pub epoch: usize,
    pub batch_index: usize,
    pub image_batch: Tensor,
}

#[derive(Debug)]
pub enum LogMessage {
    Loss {
        step: usize,
        epoch: usize,
        learning_rate: f64,
        log: LossLog,
    },
    Image {
        step: usize,
        samples: Tensor,
    },
}

#[derive(Debug)]
pub struct LossLog {
    pub discriminator_loss: f64,
    pub generator_loss: f64,
    /// Mean sigmoid score on the real batch.
    pub score_real: f64,
    /// Mean sigmoid score on the fake batch before the generator update.
    pub score_fake_before: f64,
    /// Mean sigmoid score on the fake batch after re-scoring in the generator step.
    pub score_fake_after: f64,
}
