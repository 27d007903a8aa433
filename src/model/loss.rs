use crate::{common::*, config::GanLoss};

/// Critic loss for a batch of real and detached fake scores.
pub fn discriminator_loss(kind: GanLoss, real_score: &Tensor, fake_score: &Tensor) -> Tensor {
    match kind {
        GanLoss::Standard => {
            let real_loss = real_score.binary_cross_entropy_with_logits::<Tensor>(
                &real_score.ones_like(),
                None,
                None,
                Reduction::Mean,
            );
            let fake_loss = fake_score.binary_cross_entropy_with_logits::<Tensor>(
                &fake_score.zeros_like(),
                None,
                None,
                Reduction::Mean,
            );
            real_loss + fake_loss
        }
        GanLoss::Relativistic => {
            // each side is judged relative to the mean score of the other side
            let real_loss = (real_score - fake_score.mean(Kind::Float))
                .binary_cross_entropy_with_logits::<Tensor>(
                    &real_score.ones_like(),
                    None,
                    None,
                    Reduction::Mean,
                );
            let fake_loss = (fake_score - real_score.mean(Kind::Float))
                .binary_cross_entropy_with_logits::<Tensor>(
                    &fake_score.zeros_like(),
                    None,
                    None,
                    Reduction::Mean,
                );
            (real_loss + fake_loss) / 2.0
        }
    }
}

/// Generator loss, the mirrored counterpart of the critic loss. `real_score`
/// must be detached so no critic gradient flows from it.
pub fn generator_loss(kind: GanLoss, real_score: &Tensor, fake_score: &Tensor) -> Tensor {
    match kind {
        GanLoss::Standard => fake_score.binary_cross_entropy_with_logits::<Tensor>(
            &fake_score.ones_like(),
            None,
            None,
            Reduction::Mean,
        ),
        GanLoss::Relativistic => {
            let real_loss = (real_score - fake_score.mean(Kind::Float))
                .binary_cross_entropy_with_logits::<Tensor>(
                    &real_score.zeros_like(),
                    None,
                    None,
                    Reduction::Mean,
                );
            let fake_loss = (fake_score - real_score.mean(Kind::Float))
                .binary_cross_entropy_with_logits::<Tensor>(
                    &fake_score.ones_like(),
                    None,
                    None,
                    Reduction::Mean,
                );
            (real_loss + fake_loss) / 2.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradientPenaltyKind {
    Real,
    Fake,
    Mixed,
}

#[derive(Debug, Clone)]
pub struct GradientPenaltyInit {
    pub kind: GradientPenaltyKind,
    pub constant: f64,
    pub lambda: f64,
}

impl GradientPenaltyInit {
    pub fn build(self) -> Result<GradientPenalty> {
        let Self {
            kind,
            constant,
            lambda,
        } = self;

        ensure!(lambda > 0.0);

        Ok(GradientPenalty {
            kind,
            constant,
            lambda,
        })
    }
}

impl Default for GradientPenaltyInit {
    fn default() -> Self {
        Self {
            kind: GradientPenaltyKind::Mixed,
            constant: 1.0,
            lambda: 10.0,
        }
    }
}

/// Penalizes the critic when the norm of its input-gradient deviates from
/// `constant`, evaluated at points interpolated between real and fake samples.
#[derive(Debug)]
pub struct GradientPenalty {
    kind: GradientPenaltyKind,
    constant: f64,
    lambda: f64,
}

impl GradientPenalty {
    pub fn forward(
        &self,
        real: &Tensor,
        fake: &Tensor,
        discriminator: impl FnOnce(&Tensor, bool) -> Result<Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        ensure!(fake.size() == real.size());
        ensure!(fake.kind() == real.kind());
        ensure!(fake.device() == real.device());
        ensure!(fake.dim() > 0);

        let Self {
            kind,
            constant,
            lambda,
        } = *self;
        let batch_size = fake.size()[0];

        let mix = match kind {
            GradientPenaltyKind::Real => real.detach(),
            GradientPenaltyKind::Fake => fake.detach(),
            GradientPenaltyKind::Mixed => {
                let ratio = Tensor::rand(&[batch_size, 1], (fake.kind(), fake.device()))
                    .expand(&[batch_size, fake.numel() as i64 / batch_size], false)
                    .contiguous()
                    .view(&*fake.size());

                &ratio * real.detach() + (-&ratio + 1.0) * fake.detach()
            }
        }
        .set_requires_grad(true);

        let score = discriminator(&mix, train)?;
        // the penalty participates in the critic loss, so its own gradient
        // must stay differentiable
        let grad = &Tensor::run_backward(
            &[&score], // outputs
            &[&mix],   // inputs
            true,      // keep_graph
            true,      // create_graph
        )[0];
        let penalty = (Tensor::norm_except_dim(&(grad + 1e-16), 2, 1) - constant)
            .pow_tensor_scalar(2)
            .mean(Kind::Float)
            * lambda;
        debug_assert!(bool::from(penalty.isfinite().all()));

        Ok(penalty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscriminatorInit, NormKind};
    use approx::abs_diff_eq;

    #[test]
    fn standard_loss_test() -> Result<()> {
        let real_score = Tensor::of_slice(&[2.0f32, 3.0]);
        let fake_score = Tensor::of_slice(&[-2.0f32, -3.0]);

        let dis_loss = discriminator_loss(GanLoss::Standard, &real_score, &fake_score);
        let gen_loss = generator_loss(GanLoss::Standard, &real_score, &fake_score);

        ensure!(f64::from(&dis_loss) >= 0.0);
        ensure!(f64::from(&gen_loss) >= 0.0);
        ensure!(dis_loss.size().is_empty(), "loss must be a scalar");

        Ok(())
    }

    #[test]
    fn relativistic_loss_symmetry_test() -> Result<()> {
        // with interchangeable score groups both sides see the same loss
        let real_score = Tensor::of_slice(&[1.0f32, -1.0]);
        let fake_score = Tensor::of_slice(&[-1.0f32, 1.0]);

        let dis_loss = discriminator_loss(GanLoss::Relativistic, &real_score, &fake_score);
        let gen_loss = generator_loss(GanLoss::Relativistic, &real_score, &fake_score);

        ensure!(abs_diff_eq!(
            f64::from(&dis_loss),
            f64::from(&gen_loss),
            epsilon = 1e-6
        ));

        Ok(())
    }

    #[test]
    fn gradient_penalty_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let discriminator = DiscriminatorInit {
            image_dim: 3,
            image_size: 16,
            channels: 4,
            norm_kind: NormKind::InstanceNorm,
        }
        .build(&root)?;

        let gp = GradientPenaltyInit::default().build()?;
        let real = Tensor::rand(&[2, 3, 16, 16], FLOAT_CPU);
        let fake = Tensor::rand(&[2, 3, 16, 16], FLOAT_CPU);

        let penalty = gp.forward(&real, &fake, |xs, train| discriminator.forward_t(xs, train), true)?;

        ensure!(penalty.size().is_empty(), "penalty must be a scalar");
        ensure!(f64::from(&penalty) >= 0.0, "penalty must be non-negative");

        Ok(())
    }

    #[test]
    fn gradient_penalty_rejects_bad_lambda_test() {
        let result = GradientPenaltyInit {
            lambda: 0.0,
            ..Default::default()
        }
        .build();
        assert!(result.is_err());
    }
}
