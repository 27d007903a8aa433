use super::misc::{leaky_relu, Norm, NormKind};
use crate::common::*;

#[derive(Debug, Clone)]
pub struct DiscriminatorInit {
    pub image_dim: usize,
    pub image_size: usize,
    pub channels: usize,
    pub norm_kind: NormKind,
}

impl DiscriminatorInit {
    pub fn build<'a>(self, path: impl Borrow<nn::Path<'a>>) -> Result<Discriminator> {
        let path = path.borrow();
        let Self {
            image_dim,
            image_size,
            channels,
            norm_kind,
        } = self;

        ensure!(channels > 0, "zero base channels is not allowed");
        ensure!(
            image_size.is_power_of_two() && image_size >= 8,
            "image_size must be a power of two and at least 8, but get image_size = {}",
            image_size
        );

        // stride-2 blocks shrink the input down to a 4x4 map, the final
        // convolution collapses it to one score per sample
        let num_blocks = image_size.trailing_zeros() as usize - 2;

        let blocks: Vec<_> = (0..num_blocks)
            .map(|index| {
                let in_c = if index == 0 {
                    image_dim
                } else {
                    channels << (index - 1)
                };
                let out_c = channels << index;

                let conv = nn::conv2d(
                    path / format!("down_conv_{}", index),
                    in_c as i64,
                    out_c as i64,
                    4,
                    nn::ConvConfig {
                        stride: 2,
                        padding: 1,
                        bias: false,
                        ..Default::default()
                    },
                );
                // the first block feeds raw pixels and skips normalization
                let norm = if index == 0 {
                    NormKind::None.build(path / format!("norm_{}", index), out_c as i64)
                } else {
                    norm_kind.build(path / format!("norm_{}", index), out_c as i64)
                };

                (conv, norm)
            })
            .collect();

        let (convs, norms) = blocks.into_iter().unzip();

        let score_conv = nn::conv2d(
            path / "score_conv",
            (channels << (num_blocks - 1)) as i64,
            1,
            4,
            nn::ConvConfig {
                stride: 1,
                padding: 0,
                ..Default::default()
            },
        );

        Ok(Discriminator {
            image_dim: image_dim as i64,
            image_size: image_size as i64,
            convs,
            norms,
            score_conv,
        })
    }
}

#[derive(Debug)]
pub struct Discriminator {
    image_dim: i64,
    image_size: i64,
    convs: Vec<nn::Conv2D>,
    norms: Vec<Norm>,
    score_conv: nn::Conv2D,
}

impl Discriminator {
    /// Produces one raw realism score (logit) per input image.
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        let Self {
            image_dim,
            image_size,
            ref convs,
            ref norms,
            ref score_conv,
        } = *self;

        let (batch_size, in_c, in_h, in_w) = input.size4()?;
        ensure!(
            in_c == image_dim && in_h == image_size && in_w == image_size,
            "expect image input shape [batch, {}, {}, {}], but get {:?}",
            image_dim,
            image_size,
            image_size,
            input.size()
        );

        let xs = izip!(convs, norms).fold(input.shallow_clone(), |xs, (conv, norm)| {
            leaky_relu(&norm.forward_t(&xs.apply(conv), train))
        });
        let xs = xs.apply(score_conv).view([batch_size]);

        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_test() -> Result<()> {
        let bs = 2;
        let image_size = 32;

        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let discriminator = DiscriminatorInit {
            image_dim: 3,
            image_size,
            channels: 4,
            norm_kind: NormKind::InstanceNorm,
        }
        .build(&root)?;

        let input = Tensor::rand(&[bs, 3, image_size as i64, image_size as i64], FLOAT_CPU);
        let output = discriminator.forward_t(&input, true)?;

        ensure!(
            output.size() == vec![bs],
            "expect one score per image, but get shape {:?}",
            output.size()
        );
        ensure!(
            bool::from(output.sigmoid().ge(0.0).all())
                && bool::from(output.sigmoid().le(1.0).all()),
            "sigmoid scores must lie in [0, 1]"
        );

        Ok(())
    }
}
