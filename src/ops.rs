//! Shared network building blocks.
//!
//! Both networks use the same 5x5 kernels, the same 0.02-stddev normal
//! initialization, and (in their conditional variants) the same label
//! broadcasting trick, so those primitives live here.

use tch::{nn, Tensor};

use crate::shape::{KERNEL_SIZE, PADDING, STRIDE};

/// Leaky ReLU with the fixed 0.2 negative slope used by the discriminator.
pub fn lrelu(xs: &Tensor) -> Tensor {
    xs.maximum(&(xs * 0.2))
}

/// Broadcasts a `[batch, y_dim]` label tensor over the spatial dimensions of
/// `xs` and concatenates it on the channel axis.
pub fn conv_cond_concat(xs: &Tensor, y: &Tensor) -> Tensor {
    let (batch, _, height, width) = xs.size4().unwrap();
    let (_, y_dim) = y.size2().unwrap();
    let yb = y.view([batch, y_dim, 1, 1]).expand([batch, y_dim, height, width], true);
    Tensor::cat(&[xs, &yb], 1)
}

/// 5x5 stride-2 convolution under the SAME-padding convention, so the output
/// spatial size is `ceil(in / 2)`.
pub fn conv2d(p: nn::Path, c_in: i64, c_out: i64) -> nn::Conv2D {
    let cfg = nn::ConvConfig {
        stride: STRIDE,
        padding: PADDING,
        ws_init: nn::Init::Randn { mean: 0., stdev: 0.02 },
        bs_init: nn::Init::Const(0.),
        ..Default::default()
    };
    nn::conv2d(p, c_in, c_out, KERNEL_SIZE, cfg)
}

/// Linear layer with the 0.02-stddev normal weight initialization.
pub fn linear(p: nn::Path, in_dim: i64, out_dim: i64) -> nn::Linear {
    let cfg = nn::LinearConfig {
        ws_init: nn::Init::Randn { mean: 0., stdev: 0.02 },
        bs_init: Some(nn::Init::Const(0.)),
        ..Default::default()
    };
    nn::linear(p, in_dim, out_dim, cfg)
}

/// Batch normalization over feature maps, with the DCGAN gamma initialization.
pub fn batch_norm2d(p: nn::Path, dim: i64) -> nn::BatchNorm {
    let cfg = nn::BatchNormConfig {
        ws_init: nn::Init::Randn { mean: 1., stdev: 0.02 },
        bs_init: nn::Init::Const(0.),
        ..Default::default()
    };
    nn::batch_norm2d(p, dim, cfg)
}

/// Batch normalization over flat activations.
pub fn batch_norm1d(p: nn::Path, dim: i64) -> nn::BatchNorm {
    let cfg = nn::BatchNormConfig {
        ws_init: nn::Init::Randn { mean: 1., stdev: 0.02 },
        bs_init: nn::Init::Const(0.),
        ..Default::default()
    };
    nn::batch_norm1d(p, dim, cfg)
}

/// 5x5 stride-2 transposed convolution with per-dimension `output_padding`.
///
/// `nn::conv_transpose2d` only takes a single square `output_padding`, but the
/// ceil-division ladder needs the height and width corrections independently,
/// so this module carries its own weights (`[c_in, c_out, 5, 5]`).
#[derive(Debug)]
pub struct Deconv2d {
    ws: Tensor,
    bs: Tensor,
    output_padding: (i64, i64),
}

impl Deconv2d {
    pub fn new(p: &nn::Path, c_in: i64, c_out: i64, output_padding: (i64, i64)) -> Self {
        let ws = p.randn("weight", &[c_in, c_out, KERNEL_SIZE, KERNEL_SIZE], 0., 0.02);
        let bs = p.zeros("bias", &[c_out]);
        Self { ws, bs, output_padding }
    }

    pub fn forward(&self, xs: &Tensor) -> Tensor {
        xs.conv_transpose2d(
            &self.ws,
            Some(&self.bs),
            [STRIDE, STRIDE],
            [PADDING, PADDING],
            [self.output_padding.0, self.output_padding.1],
            1,
            [1, 1],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn lrelu_slope() {
        let xs = Tensor::from_slice(&[-1.0f32, 0.0, 2.0]);
        let ys = lrelu(&xs);
        let expected = Tensor::from_slice(&[-0.2f32, 0.0, 2.0]);
        assert!(f64::try_from((ys - expected).abs().max()).unwrap() < 1e-6);
    }

    #[test]
    fn cond_concat_shapes() {
        let xs = Tensor::zeros([2, 3, 4, 4], (Kind::Float, Device::Cpu));
        let y = Tensor::ones([2, 10], (Kind::Float, Device::Cpu));
        let out = conv_cond_concat(&xs, &y);
        assert_eq!(out.size(), &[2, 13, 4, 4]);
        // The label planes are constant over the spatial dimensions.
        let planes = out.narrow(1, 3, 10);
        assert_eq!(f64::try_from(planes.min()).unwrap(), 1.0);
        assert_eq!(f64::try_from(planes.max()).unwrap(), 1.0);
    }

    #[test]
    fn deconv_doubles_spatial_size() {
        let vs = tch::nn::VarStore::new(Device::Cpu);
        let root = vs.root();
        let deconv = Deconv2d::new(&(&root / "tr"), 8, 4, (1, 1));
        let xs = Tensor::zeros([2, 8, 16, 16], (Kind::Float, Device::Cpu));
        assert_eq!(deconv.forward(&xs).size(), &[2, 4, 32, 32]);
    }
}
