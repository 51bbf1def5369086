//! Discriminator network, conditional and unconditional variants.
//!
//! Both variants return the pre-activation logit next to the sigmoid
//! probability; every loss in the crate is computed from the logit. Scoring
//! the real and the generated batch goes through the same instance, so the
//! two invocations share parameters by construction.

use tch::{nn, Tensor};

use crate::config::ModelConfig;
use crate::ops::{self, lrelu};
use crate::shape::{conv_out_size_same, GeneratorShapes, STRIDE};

/// Four stride-2 convolutions with doubling channel width, then a linear
/// projection of the flattened features to a single logit.
#[derive(Debug)]
pub struct UnconditionalDiscriminator {
    conv0: nn::Conv2D,
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
    conv3: nn::Conv2D,
    bn3: nn::BatchNorm,
    lin: nn::Linear,
}

impl UnconditionalDiscriminator {
    pub fn new(p: &nn::Path, cfg: &ModelConfig) -> Self {
        let df = cfg.df_dim;
        let (c, h, w) = cfg.image_dims();
        // The forward ladder must mirror the generator's shape sequence; the
        // flattened width below is where a mismatch would surface.
        let shapes = GeneratorShapes::new(h, w);
        let conv0 = ops::conv2d(p / "d_h0_conv", c, df);
        let conv1 = ops::conv2d(p / "d_h1_conv", df, df * 2);
        let bn1 = ops::batch_norm2d(p / "d_bn1", df * 2);
        let conv2 = ops::conv2d(p / "d_h2_conv", df * 2, df * 4);
        let bn2 = ops::batch_norm2d(p / "d_bn2", df * 4);
        let conv3 = ops::conv2d(p / "d_h3_conv", df * 4, df * 8);
        let bn3 = ops::batch_norm2d(p / "d_bn3", df * 8);
        let lin = ops::linear(p / "d_h3_lin", df * 8 * shapes.s16.0 * shapes.s16.1, 1);
        Self { conv0, conv1, bn1, conv2, bn2, conv3, bn3, lin }
    }

    /// Returns `(probability, logit)`.
    pub fn forward_t(&self, images: &Tensor, train: bool) -> (Tensor, Tensor) {
        let h0 = lrelu(&images.apply(&self.conv0));
        let h1 = lrelu(&h0.apply(&self.conv1).apply_t(&self.bn1, train));
        let h2 = lrelu(&h1.apply(&self.conv2).apply_t(&self.bn2, train));
        let h3 = lrelu(&h2.apply(&self.conv3).apply_t(&self.bn3, train));
        let logits = h3.flatten(1, -1).apply(&self.lin);
        (logits.sigmoid(), logits)
    }
}

/// Label-conditioned discriminator: the one-hot label rides along as extra
/// channel planes through two convolutions, then as plain features through
/// two linear stages.
#[derive(Debug)]
pub struct ConditionalDiscriminator {
    conv0: nn::Conv2D,
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    lin1: nn::Linear,
    bn2: nn::BatchNorm,
    lin2: nn::Linear,
}

impl ConditionalDiscriminator {
    pub fn new(p: &nn::Path, cfg: &ModelConfig) -> Self {
        let y_dim = cfg.y_dim.unwrap();
        let df = cfg.df_dim;
        let (c, h, w) = cfg.image_dims();
        let s2 = (conv_out_size_same(h, STRIDE), conv_out_size_same(w, STRIDE));
        let s4 = (conv_out_size_same(s2.0, STRIDE), conv_out_size_same(s2.1, STRIDE));
        let conv0 = ops::conv2d(p / "d_h0_conv", c + y_dim, c + y_dim);
        let conv1 = ops::conv2d(p / "d_h1_conv", c + 2 * y_dim, df + y_dim);
        let bn1 = ops::batch_norm2d(p / "d_bn1", df + y_dim);
        let lin1 = ops::linear(p / "d_h2_lin", (df + y_dim) * s4.0 * s4.1 + y_dim, cfg.dfc_dim);
        let bn2 = ops::batch_norm1d(p / "d_bn2", cfg.dfc_dim);
        let lin2 = ops::linear(p / "d_h3_lin", cfg.dfc_dim + y_dim, 1);
        Self { conv0, conv1, bn1, lin1, bn2, lin2 }
    }

    /// Returns `(probability, logit)`.
    pub fn forward_t(&self, images: &Tensor, y: &Tensor, train: bool) -> (Tensor, Tensor) {
        let x = ops::conv_cond_concat(images, y);
        let h0 = lrelu(&x.apply(&self.conv0));
        let h0 = ops::conv_cond_concat(&h0, y);
        let h1 = lrelu(&h0.apply(&self.conv1).apply_t(&self.bn1, train));
        let h1 = Tensor::cat(&[&h1.flatten(1, -1), y], 1);
        let h2 = lrelu(&h1.apply(&self.lin1).apply_t(&self.bn2, train));
        let h2 = Tensor::cat(&[&h2, y], 1);
        let logits = h2.apply(&self.lin2);
        (logits.sigmoid(), logits)
    }
}

/// Topology decided once at construction, like the generator's.
#[derive(Debug)]
pub enum Discriminator {
    Unconditional(UnconditionalDiscriminator),
    Conditional(ConditionalDiscriminator),
}

impl Discriminator {
    pub fn new(p: &nn::Path, cfg: &ModelConfig) -> Self {
        match cfg.y_dim {
            None => Discriminator::Unconditional(UnconditionalDiscriminator::new(p, cfg)),
            Some(_) => Discriminator::Conditional(ConditionalDiscriminator::new(p, cfg)),
        }
    }

    /// Returns `(probability, logit)`.
    pub fn forward_t(&self, images: &Tensor, y: Option<&Tensor>, train: bool) -> (Tensor, Tensor) {
        match self {
            Discriminator::Unconditional(d) => d.forward_t(images, train),
            Discriminator::Conditional(d) => {
                let y = y.expect("conditional discriminator invoked without labels");
                d.forward_t(images, y, train)
            }
        }
    }
}
