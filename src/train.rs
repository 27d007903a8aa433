use crate::{
    common::*,
    config,
    message as msg,
    model::{
        self, Discriminator, DiscriminatorInit, Generator, GeneratorInit, GradientPenalty,
        GradientPenaltyInit, NormKind,
    },
    utils::{self, RateCounter},
};

const MONITOR_SAMPLES: i64 = 16;
const MONITOR_GRID_COLS: i64 = 4;

#[derive(Debug, Clone)]
pub struct GanTrainerInit {
    pub latent_dim: usize,
    pub image_dim: usize,
    pub image_size: usize,
    pub generator_channels: usize,
    pub discriminator_channels: usize,
    pub learning_rate: f64,
    pub adam_beta1: f64,
    pub critic_steps: usize,
    pub loss: config::GanLoss,
    pub gradient_penalty: Option<f64>,
    pub device: Device,
}

impl GanTrainerInit {
    pub fn build(self) -> Result<GanTrainer> {
        let Self {
            latent_dim,
            image_dim,
            image_size,
            generator_channels,
            discriminator_channels,
            learning_rate,
            adam_beta1,
            critic_steps,
            loss,
            gradient_penalty,
            device,
        } = self;

        ensure!(critic_steps > 0, "critic_steps must be positive");

        let generator_vs = nn::VarStore::new(device);
        let generator = GeneratorInit {
            latent_dim,
            image_dim,
            image_size,
            channels: generator_channels,
            norm_kind: NormKind::BatchNorm,
        }
        .build(&generator_vs.root() / "generator")?;
        let generator_opt = nn::adam(adam_beta1, 0.999, 0.).build(&generator_vs, learning_rate)?;

        let discriminator_vs = nn::VarStore::new(device);
        let discriminator = DiscriminatorInit {
            image_dim,
            image_size,
            channels: discriminator_channels,
            norm_kind: NormKind::InstanceNorm,
        }
        .build(&discriminator_vs.root() / "discriminator")?;
        let discriminator_opt =
            nn::adam(adam_beta1, 0.999, 0.).build(&discriminator_vs, learning_rate)?;

        let gradient_penalty = gradient_penalty
            .map(|lambda| {
                GradientPenaltyInit {
                    lambda,
                    ..Default::default()
                }
                .build()
            })
            .transpose()?;

        // one fixed noise batch for consistent visual monitoring across epochs
        let fixed_noise = Tensor::rand(
            &[MONITOR_SAMPLES, latent_dim as i64, 1, 1],
            (Kind::Float, device),
        );

        Ok(GanTrainer {
            device,
            latent_dim: latent_dim as i64,
            critic_steps,
            loss,
            gradient_penalty,
            generator_vs,
            generator,
            generator_opt,
            discriminator_vs,
            discriminator,
            discriminator_opt,
            fixed_noise,
            generator_steps: 0,
            discriminator_steps: 0,
        })
    }
}

pub struct GanTrainer {
    device: Device,
    latent_dim: i64,
    critic_steps: usize,
    loss: config::GanLoss,
    gradient_penalty: Option<GradientPenalty>,
    generator_vs: nn::VarStore,
    generator: Generator,
    generator_opt: nn::Optimizer,
    discriminator_vs: nn::VarStore,
    discriminator: Discriminator,
    discriminator_opt: nn::Optimizer,
    fixed_noise: Tensor,
    generator_steps: usize,
    discriminator_steps: usize,
}

struct CriticStep {
    fake: Tensor,
    real_score: Tensor,
    loss: f64,
    score_real: f64,
    score_fake: f64,
}

impl GanTrainer {
    /// One critic update: score a real batch and a freshly generated,
    /// detached fake batch, backpropagate the selected critic loss. The
    /// generator stays trainable here so the fake batch keeps a live graph
    /// for the following generator step; only its detached copy is scored.
    fn critic_step(&mut self, real: &Tensor) -> Result<CriticStep> {
        self.discriminator_vs.unfreeze();

        let batch_size = real.size()[0];

        let real_score = self.discriminator.forward_t(real, true)?;
        let noise = Tensor::randn(
            &[batch_size, self.latent_dim, 1, 1],
            (Kind::Float, self.device),
        );
        let fake = self.generator.forward_t(&noise, true)?;
        let fake_score = self.discriminator.forward_t(&fake.detach().copy(), true)?;

        let mut loss = model::discriminator_loss(self.loss, &real_score, &fake_score);
        if let Some(gp) = &self.gradient_penalty {
            let penalty = gp.forward(
                real,
                &fake,
                |xs, train| self.discriminator.forward_t(xs, train),
                true,
            )?;
            loss = loss + penalty;
        }

        self.discriminator_opt.backward_step(&loss);
        self.discriminator_steps += 1;

        Ok(CriticStep {
            score_real: f64::from(&real_score.sigmoid().mean(Kind::Float)),
            score_fake: f64::from(&fake_score.sigmoid().mean(Kind::Float)),
            loss: f64::from(&loss),
            fake,
            real_score,
        })
    }

    /// One generator update: re-score the non-detached fake batch and
    /// backpropagate the mirrored loss. `real_score` is detached here so the
    /// critic's parameters are never touched by this step.
    fn generator_step(&mut self, fake: &Tensor, real_score: &Tensor) -> Result<(f64, f64)> {
        self.discriminator_vs.freeze();

        let fake_score = self.discriminator.forward_t(fake, true)?;
        let loss = model::generator_loss(self.loss, &real_score.detach(), &fake_score);

        self.generator_opt.backward_step(&loss);
        self.generator_steps += 1;
        self.discriminator_vs.unfreeze();

        Ok((
            f64::from(&loss),
            f64::from(&fake_score.sigmoid().mean(Kind::Float)),
        ))
    }

    /// `critic_steps` critic updates followed by exactly one generator update.
    pub fn train_step(&mut self, real: &Tensor) -> Result<msg::LossLog> {
        let mut last = None;
        for _ in 0..self.critic_steps {
            last = Some(self.critic_step(real)?);
        }
        let CriticStep {
            fake,
            real_score,
            loss: discriminator_loss,
            score_real,
            score_fake: score_fake_before,
        } = last.unwrap();

        let (generator_loss, score_fake_after) = self.generator_step(&fake, &real_score)?;

        Ok(msg::LossLog {
            discriminator_loss,
            generator_loss,
            score_real,
            score_fake_before,
            score_fake_after,
        })
    }

    /// Renders the fixed-noise monitoring batch to a `u8` grid image.
    pub fn render_fixed_samples(&self) -> Result<Tensor> {
        let samples = tch::no_grad(|| self.generator.forward_t(&self.fixed_noise, false))?;
        let grid = utils::make_grid(&samples.to_device(Device::Cpu), MONITOR_GRID_COLS)?;
        Ok(utils::denormalize(&grid))
    }

    /// Persists both parameter sets keyed by epoch number. The directory is
    /// created on demand.
    pub fn save_checkpoint(&self, checkpoint_dir: impl AsRef<Path>, epoch: usize) -> Result<()> {
        let checkpoint_dir = checkpoint_dir.as_ref();
        fs::create_dir_all(checkpoint_dir)?;

        self.generator_vs
            .save(checkpoint_dir.join(format!("generator_{:04}.ckpt", epoch)))?;
        self.discriminator_vs
            .save(checkpoint_dir.join(format!("discriminator_{:04}.ckpt", epoch)))?;

        Ok(())
    }

    pub fn generator_steps(&self) -> usize {
        self.generator_steps
    }

    pub fn discriminator_steps(&self) -> usize {
        self.discriminator_steps
    }

    pub fn generator_vs(&self) -> &nn::VarStore {
        &self.generator_vs
    }

    pub fn discriminator_vs(&self) -> &nn::VarStore {
        &self.discriminator_vs
    }
}

pub fn training_worker(
    config: ArcRef<config::Config>,
    checkpoint_dir: impl AsRef<Path>,
    sample_dir: impl AsRef<Path>,
    mut train_rx: mpsc::Receiver<msg::TrainingMessage>,
    log_tx: mpsc::Sender<msg::LogMessage>,
) -> Result<()> {
    let checkpoint_dir = checkpoint_dir.as_ref();
    let sample_dir = sample_dir.as_ref();
    let device = config.train.device;
    let learning_rate = config.train.learning_rate.raw();
    let epochs = config.train.epochs.get();
    let log_steps = config.logging.log_steps.get();
    let save_checkpoint_epochs = config.logging.save_checkpoint_epochs.get();
    let save_image_steps = config.logging.save_image_steps.map(NonZeroUsize::get);

    let mut trainer = GanTrainerInit {
        latent_dim: config.model.latent_dim.get(),
        image_dim: config.dataset.image_dim.get(),
        image_size: config.dataset.image_size.get(),
        generator_channels: config.model.generator_channels.get(),
        discriminator_channels: config.model.discriminator_channels.get(),
        learning_rate,
        adam_beta1: config.train.adam_beta1.raw(),
        critic_steps: config.train.critic_steps.get(),
        loss: config.train.loss,
        gradient_penalty: config.train.gradient_penalty.map(R64::raw),
        device,
    }
    .build()?;

    let save_epoch_artifacts = |trainer: &GanTrainer, epoch: usize| -> Result<()> {
        trainer.save_checkpoint(checkpoint_dir, epoch)?;

        fs::create_dir_all(sample_dir)?;
        let grid = trainer.render_fixed_samples()?;
        vision::image::save(&grid, sample_dir.join(format!("samples_epoch_{:04}.png", epoch)))?;

        info!("saved checkpoint and sample grid for epoch {}", epoch);
        Ok(())
    };

    let mut rate_counter = RateCounter::with_second_interval();
    let mut train_step = 0;
    let mut current_epoch = 0;

    while let Some(msg) = train_rx.blocking_recv() {
        let msg::TrainingMessage {
            epoch,
            batch_index,
            image_batch,
        } = msg.to_device(device);
        let batch_size = image_batch.size()[0];

        // the previous epoch completed once the first batch of a new one arrives
        if epoch != current_epoch {
            if current_epoch % save_checkpoint_epochs == 0 {
                save_epoch_artifacts(&trainer, current_epoch)?;
            }
            current_epoch = epoch;
        }

        let log = trainer.train_step(&image_batch)?;

        if train_step % log_steps == 0 {
            info!(
                "epoch: {}/{}\tbatch: {}\tdis_loss: {:.5}\tgen_loss: {:.5}\tD(x): {:.4}\tD(G(z)): {:.4} / {:.4}",
                epoch,
                epochs,
                batch_index,
                log.discriminator_loss,
                log.generator_loss,
                log.score_real,
                log.score_fake_before,
                log.score_fake_after
            );

            let msg = msg::LogMessage::Loss {
                step: train_step,
                epoch,
                learning_rate,
                log,
            };
            if log_tx.blocking_send(msg).is_err() {
                break;
            }
        }

        if let Some(save_image_steps) = save_image_steps {
            if train_step % save_image_steps == 0 {
                let samples = trainer.render_fixed_samples()?;
                let msg = msg::LogMessage::Image {
                    step: train_step,
                    samples,
                };
                if log_tx.blocking_send(msg).is_err() {
                    break;
                }
            }
        }

        rate_counter.add(1.0);
        if let Some(batch_rate) = rate_counter.rate() {
            let record_rate = batch_rate * batch_size as f64;
            info!(
                "step: {}\t{:.2} batch/s\t{:.2} sample/s",
                train_step, batch_rate, record_rate
            );
        }

        train_step += 1;
    }

    // final parameters are always persisted when the epoch loop completes
    save_epoch_artifacts(&trainer, current_epoch)?;

    Ok(())
}
