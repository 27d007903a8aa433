use crate::common::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormKind {
    BatchNorm,
    InstanceNorm,
    None,
}

impl NormKind {
    pub fn build<'a>(self, path: impl Borrow<nn::Path<'a>>, out_dim: i64) -> Norm {
        let path = path.borrow();

        match self {
            Self::BatchNorm => {
                let norm = nn::batch_norm2d(path, out_dim, Default::default());
                Norm::BatchNorm(norm)
            }
            Self::InstanceNorm => {
                let norm = InstanceNorm::new(path, out_dim);
                Norm::InstanceNorm(norm)
            }
            Self::None => Norm::None,
        }
    }
}

#[derive(Debug)]
pub enum Norm {
    BatchNorm(nn::BatchNorm),
    InstanceNorm(InstanceNorm),
    None,
}

impl nn::ModuleT for Norm {
    fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        match self {
            Self::BatchNorm(norm) => norm.forward_t(input, train),
            Self::InstanceNorm(norm) => norm.forward_t(input, train),
            Self::None => input.shallow_clone(),
        }
    }
}

/// Affine instance normalization without running statistics.
#[derive(Debug)]
pub struct InstanceNorm {
    ws: Tensor,
    bs: Tensor,
    momentum: f64,
    eps: f64,
}

impl InstanceNorm {
    pub fn new<'a>(path: impl Borrow<nn::Path<'a>>, out_dim: i64) -> Self {
        let path = path.borrow();

        Self {
            ws: path.var("weight", &[out_dim], nn::Init::Const(1.0)),
            bs: path.var("bias", &[out_dim], nn::Init::Const(0.0)),
            momentum: 0.1,
            eps: 1e-5,
        }
    }
}

impl nn::ModuleT for InstanceNorm {
    fn forward_t(&self, input: &Tensor, _train: bool) -> Tensor {
        input.instance_norm(
            Some(&self.ws),
            Some(&self.bs),
            None,
            None,
            true,
            self.momentum,
            self.eps,
            false,
        )
    }
}

pub fn leaky_relu(xs: &Tensor) -> Tensor {
    const NEGATIVE_SLOPE: f64 = 0.2;
    xs.maximum(&(xs * NEGATIVE_SLOPE))
}
