use crate::{
    common::*,
    config,
    model::{GeneratorInit, NormKind},
    utils,
};

#[derive(Debug, Clone)]
pub struct EvaluationInit<P1, P2>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    pub checkpoint_dir: P1,
    pub epoch: usize,
    pub count: usize,
    pub output_dir: P2,
}

impl<P1, P2> EvaluationInit<P1, P2>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    /// Loads the generator checkpoint for the given epoch and writes `count`
    /// freshly sampled images to individually numbered files.
    pub fn run(self, config: &config::Config) -> Result<()> {
        let Self {
            checkpoint_dir,
            epoch,
            count,
            output_dir,
        } = self;
        let output_dir = output_dir.as_ref();
        let device = config.train.device;
        let latent_dim = config.model.latent_dim.get() as i64;
        let image_dim = config.dataset.image_dim.get() as i64;
        let image_size = config.dataset.image_size.get() as i64;

        let checkpoint_file = checkpoint_dir
            .as_ref()
            .join(format!("generator_{:04}.ckpt", epoch));
        ensure!(
            checkpoint_file.is_file(),
            "checkpoint '{}' does not exist",
            checkpoint_file.display()
        );

        let mut vs = nn::VarStore::new(device);
        let generator = GeneratorInit {
            latent_dim: latent_dim as usize,
            image_dim: image_dim as usize,
            image_size: image_size as usize,
            channels: config.model.generator_channels.get(),
            norm_kind: NormKind::BatchNorm,
        }
        .build(&vs.root() / "generator")?;
        vs.load(&checkpoint_file)
            .with_context(|| format!("unable to load '{}'", checkpoint_file.display()))?;

        fs::create_dir_all(output_dir)?;

        for index in 0..count {
            let noise = Tensor::rand(&[1, latent_dim, 1, 1], (Kind::Float, device));
            let sample = tch::no_grad(|| generator.forward_t(&noise, false))?;
            let image = utils::denormalize(
                &sample
                    .to_device(Device::Cpu)
                    .view([image_dim, image_size, image_size]),
            );

            let path = output_dir.join(format!("sample_{:04}.png", index));
            vision::image::save(&image, &path)?;
        }

        info!("wrote {} samples to '{}'", count, output_dir.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path) -> config::Config {
        json5::from_str(&format!(
            r#"
            {{
                dataset: {{
                    dataset_dir: "{dir}",
                    image_size: 16,
                    image_dim: 3,
                }},
                model: {{
                    latent_dim: 8,
                    generator_channels: 4,
                    discriminator_channels: 4,
                }},
                train: {{
                    batch_size: 2,
                    epochs: 1,
                    critic_steps: 1,
                    learning_rate: 0.0002,
                    adam_beta1: 0.5,
                    loss: "standard",
                    device: "cpu",
                }},
                logging: {{
                    log_dir: "{dir}",
                }},
            }}
            "#,
            dir = dir.display()
        ))
        .unwrap()
    }

    #[test]
    fn evaluation_test() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("image-flow-eval-{}", std::process::id()));
        let checkpoint_dir = dir.join("checkpoints");
        let output_dir = dir.join("outputs");
        fs::create_dir_all(&checkpoint_dir)?;

        let config = test_config(&dir);

        // persist a generator checkpoint for epoch 0
        {
            let vs = nn::VarStore::new(Device::Cpu);
            let _generator = GeneratorInit {
                latent_dim: 8,
                image_dim: 3,
                image_size: 16,
                channels: 4,
                norm_kind: NormKind::BatchNorm,
            }
            .build(&vs.root() / "generator")?;
            vs.save(checkpoint_dir.join("generator_0000.ckpt"))?;
        }

        EvaluationInit {
            checkpoint_dir: &checkpoint_dir,
            epoch: 0,
            count: 3,
            output_dir: &output_dir,
        }
        .run(&config)?;

        for index in 0..3 {
            let path = output_dir.join(format!("sample_{:04}.png", index));
            ensure!(path.is_file(), "missing sample file '{}'", path.display());

            let image = vision::image::load(&path)?;
            ensure!(
                image.size() == vec![3, 16, 16],
                "incorrect sample shape {:?}",
                image.size()
            );
        }

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn evaluation_missing_checkpoint_test() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("image-flow-eval-miss-{}", std::process::id()));
        fs::create_dir_all(&dir)?;

        let config = test_config(&dir);
        let result = EvaluationInit {
            checkpoint_dir: dir.join("nowhere"),
            epoch: 42,
            count: 1,
            output_dir: dir.join("outputs"),
        }
        .run(&config);
        ensure!(result.is_err(), "missing checkpoint must be fatal");

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
