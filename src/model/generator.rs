use super::misc::{Norm, NormKind};
use crate::common::*;

#[derive(Debug, Clone)]
pub struct GeneratorInit {
    pub latent_dim: usize,
    pub image_dim: usize,
    pub image_size: usize,
    pub channels: usize,
    pub norm_kind: NormKind,
}

impl GeneratorInit {
    pub fn build<'a>(self, path: impl Borrow<nn::Path<'a>>) -> Result<Generator> {
        let path = path.borrow();
        let Self {
            latent_dim,
            image_dim,
            image_size,
            channels,
            norm_kind,
        } = self;

        ensure!(latent_dim > 0, "zero latent_dim is not allowed");
        ensure!(channels > 0, "zero base channels is not allowed");
        ensure!(
            image_size.is_power_of_two() && image_size >= 8,
            "image_size must be a power of two and at least 8, but get image_size = {}",
            image_size
        );

        // the first block maps the 1x1 latent to a 4x4 map, every later
        // block doubles the spatial size
        let num_blocks = image_size.trailing_zeros() as usize - 1;

        let blocks: Vec<_> = (0..num_blocks)
            .map(|index| {
                let in_c = if index == 0 {
                    latent_dim
                } else {
                    channels << (num_blocks - 1 - index)
                };
                let out_c = if index == num_blocks - 1 {
                    image_dim
                } else {
                    channels << (num_blocks - 2 - index)
                };
                let (stride, padding) = if index == 0 { (1, 0) } else { (2, 1) };

                let conv = nn::conv_transpose2d(
                    path / format!("up_conv_{}", index),
                    in_c as i64,
                    out_c as i64,
                    4,
                    nn::ConvTransposeConfig {
                        stride,
                        padding,
                        bias: false,
                        ..Default::default()
                    },
                );
                let norm = if index == num_blocks - 1 {
                    NormKind::None.build(path / format!("norm_{}", index), out_c as i64)
                } else {
                    norm_kind.build(path / format!("norm_{}", index), out_c as i64)
                };

                (conv, norm)
            })
            .collect();

        let (convs, norms) = blocks.into_iter().unzip();

        Ok(Generator {
            latent_dim: latent_dim as i64,
            image_dim: image_dim as i64,
            image_size: image_size as i64,
            convs,
            norms,
        })
    }
}

#[derive(Debug)]
pub struct Generator {
    latent_dim: i64,
    image_dim: i64,
    image_size: i64,
    convs: Vec<nn::ConvTranspose2D>,
    norms: Vec<Norm>,
}

impl Generator {
    /// Maps a batch of latent vectors to a batch of images in `[-1, 1]`.
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        let Self {
            latent_dim,
            ref convs,
            ref norms,
            ..
        } = *self;

        let (_b, in_c, in_h, in_w) = input.size4()?;
        ensure!(
            in_c == latent_dim && in_h == 1 && in_w == 1,
            "expect latent input shape [batch, {}, 1, 1], but get {:?}",
            latent_dim,
            input.size()
        );

        let num_blocks = convs.len();
        let xs = izip!(convs, norms).enumerate().fold(
            input.shallow_clone(),
            |xs, (index, (conv, norm))| {
                let xs = xs.apply(conv);
                if index == num_blocks - 1 {
                    xs.tanh()
                } else {
                    norm.forward_t(&xs, train).relu()
                }
            },
        );

        debug_assert_eq!(
            xs.size()[1..],
            [self.image_dim, self.image_size, self.image_size]
        );

        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_test() -> Result<()> {
        let bs = 2;
        let latent_dim = 8;
        let image_size = 32;

        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let generator = GeneratorInit {
            latent_dim,
            image_dim: 3,
            image_size,
            channels: 4,
            norm_kind: NormKind::BatchNorm,
        }
        .build(&root)?;

        let input = Tensor::randn(&[bs, latent_dim as i64, 1, 1], FLOAT_CPU);
        let output = generator.forward_t(&input, true)?;

        ensure!(
            output.size() == vec![bs, 3, image_size as i64, image_size as i64],
            "incorrect output shape {:?}",
            output.size()
        );
        ensure!(
            bool::from(output.abs().le(1.0).all()),
            "output values must lie in [-1, 1]"
        );

        Ok(())
    }

    #[test]
    fn generator_rejects_bad_shape_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let generator = GeneratorInit {
            latent_dim: 8,
            image_dim: 3,
            image_size: 16,
            channels: 4,
            norm_kind: NormKind::BatchNorm,
        }
        .build(&root)?;

        let input = Tensor::randn(&[2, 4, 1, 1], FLOAT_CPU);
        ensure!(generator.forward_t(&input, true).is_err());

        Ok(())
    }
}
