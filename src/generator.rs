//! Generator network, conditional and unconditional variants.
//!
//! The sampler is not a separate network: it is the very same
//! parameter-owning object evaluated with `train = false`, so
//! batch normalization reads its accumulated population statistics instead of
//! per-batch ones. [`Generator::sample`] is that evaluation mode.

use tch::{nn, Tensor};

use crate::config::ModelConfig;
use crate::ops::{self, Deconv2d};
use crate::shape::GeneratorShapes;

/// Per-layer results of a generator forward pass, so intermediate activations
/// stay addressable without any dynamic attribute tricks.
#[derive(Debug)]
pub struct GeneratorActivations {
    /// Activations right after the latent projection, already spatial.
    pub projected: Tensor,
    /// Output of each upsampling stage, in order.
    pub upsampled: Vec<Tensor>,
    /// Final image batch.
    pub output: Tensor,
}

/// DCGAN generator: a linear latent projection followed by four stride-2
/// transposed convolutions, tanh output in [-1, 1].
#[derive(Debug)]
pub struct UnconditionalGenerator {
    lin: nn::Linear,
    bn0: nn::BatchNorm,
    tr1: Deconv2d,
    bn1: nn::BatchNorm,
    tr2: Deconv2d,
    bn2: nn::BatchNorm,
    tr3: Deconv2d,
    bn3: nn::BatchNorm,
    tr4: Deconv2d,
    shapes: GeneratorShapes,
    gf_dim: i64,
}

impl UnconditionalGenerator {
    pub fn new(p: &nn::Path, cfg: &ModelConfig) -> Self {
        let shapes = GeneratorShapes::new(cfg.output_height, cfg.output_width);
        let gf = cfg.gf_dim;
        let lin = ops::linear(p / "g_h0_lin", cfg.z_dim(), gf * 8 * shapes.s16.0 * shapes.s16.1);
        let bn0 = ops::batch_norm2d(p / "g_bn0", gf * 8);
        let tr1 = Deconv2d::new(&(p / "g_h1"), gf * 8, gf * 4, GeneratorShapes::output_padding(shapes.s16, shapes.s8));
        let bn1 = ops::batch_norm2d(p / "g_bn1", gf * 4);
        let tr2 = Deconv2d::new(&(p / "g_h2"), gf * 4, gf * 2, GeneratorShapes::output_padding(shapes.s8, shapes.s4));
        let bn2 = ops::batch_norm2d(p / "g_bn2", gf * 2);
        let tr3 = Deconv2d::new(&(p / "g_h3"), gf * 2, gf, GeneratorShapes::output_padding(shapes.s4, shapes.s2));
        let bn3 = ops::batch_norm2d(p / "g_bn3", gf);
        let tr4 = Deconv2d::new(&(p / "g_h4"), gf, cfg.c_dim, GeneratorShapes::output_padding(shapes.s2, shapes.s));
        Self { lin, bn0, tr1, bn1, tr2, bn2, tr3, bn3, tr4, shapes, gf_dim: gf }
    }

    /// Forward pass keeping every intermediate stage.
    pub fn forward_detailed(&self, z: &Tensor, train: bool) -> GeneratorActivations {
        let (s16h, s16w) = self.shapes.s16;
        let projected = z
            .apply(&self.lin)
            .view([-1, self.gf_dim * 8, s16h, s16w])
            .apply_t(&self.bn0, train)
            .relu();
        let h1 = self.tr1.forward(&projected).apply_t(&self.bn1, train).relu();
        let h2 = self.tr2.forward(&h1).apply_t(&self.bn2, train).relu();
        let h3 = self.tr3.forward(&h2).apply_t(&self.bn3, train).relu();
        let output = self.tr4.forward(&h3).tanh();
        GeneratorActivations { projected, upsampled: vec![h1, h2, h3], output }
    }

    pub fn forward_t(&self, z: &Tensor, train: bool) -> Tensor {
        self.forward_detailed(z, train).output
    }
}

/// Label-conditioned generator: two fully connected stages and two transposed
/// convolutions, with the one-hot label concatenated at every stage. Sigmoid
/// output in [0, 1].
#[derive(Debug)]
pub struct ConditionalGenerator {
    lin0: nn::Linear,
    bn0: nn::BatchNorm,
    lin1: nn::Linear,
    bn1: nn::BatchNorm,
    tr2: Deconv2d,
    bn2: nn::BatchNorm,
    tr3: Deconv2d,
    s4: (i64, i64),
    gf_dim: i64,
}

impl ConditionalGenerator {
    pub fn new(p: &nn::Path, cfg: &ModelConfig) -> Self {
        let y_dim = cfg.y_dim.unwrap();
        let gf = cfg.gf_dim;
        // The conditional ladder only has two upsampling stages and assumes
        // exact integer halving, as for the 28x28 digit benchmark.
        let s = (cfg.output_height, cfg.output_width);
        let s2 = (s.0 / 2, s.1 / 2);
        let s4 = (s2.0 / 2, s2.1 / 2);
        let lin0 = ops::linear(p / "g_h0_lin", cfg.z_dim() + y_dim, cfg.gfc_dim);
        let bn0 = ops::batch_norm1d(p / "g_bn0", cfg.gfc_dim);
        let lin1 = ops::linear(p / "g_h1_lin", cfg.gfc_dim + y_dim, gf * 2 * s4.0 * s4.1);
        let bn1 = ops::batch_norm1d(p / "g_bn1", gf * 2 * s4.0 * s4.1);
        let tr2 = Deconv2d::new(&(p / "g_h2"), gf * 2 + y_dim, gf * 2, GeneratorShapes::output_padding(s4, s2));
        let bn2 = ops::batch_norm2d(p / "g_bn2", gf * 2);
        let tr3 = Deconv2d::new(&(p / "g_h3"), gf * 2 + y_dim, cfg.c_dim, GeneratorShapes::output_padding(s2, s));
        Self { lin0, bn0, lin1, bn1, tr2, bn2, tr3, s4, gf_dim: gf }
    }

    pub fn forward_detailed(&self, z: &Tensor, y: &Tensor, train: bool) -> GeneratorActivations {
        let h0 = Tensor::cat(&[z, y], 1).apply(&self.lin0).apply_t(&self.bn0, train).relu();
        let h1 = Tensor::cat(&[&h0, y], 1)
            .apply(&self.lin1)
            .apply_t(&self.bn1, train)
            .relu()
            .view([-1, self.gf_dim * 2, self.s4.0, self.s4.1]);
        let projected = ops::conv_cond_concat(&h1, y);
        let h2 = self.tr2.forward(&projected).apply_t(&self.bn2, train).relu();
        let h2 = ops::conv_cond_concat(&h2, y);
        let output = self.tr3.forward(&h2).sigmoid();
        GeneratorActivations { projected, upsampled: vec![h2], output }
    }

    pub fn forward_t(&self, z: &Tensor, y: &Tensor, train: bool) -> Tensor {
        self.forward_detailed(z, y, train).output
    }
}

/// The topology is decided once, at construction; it is never branched on per
/// forward pass.
#[derive(Debug)]
pub enum Generator {
    Unconditional(UnconditionalGenerator),
    Conditional(ConditionalGenerator),
}

impl Generator {
    pub fn new(p: &nn::Path, cfg: &ModelConfig) -> Self {
        match cfg.y_dim {
            None => Generator::Unconditional(UnconditionalGenerator::new(p, cfg)),
            Some(_) => Generator::Conditional(ConditionalGenerator::new(p, cfg)),
        }
    }

    pub fn forward_t(&self, z: &Tensor, y: Option<&Tensor>, train: bool) -> Tensor {
        match self {
            Generator::Unconditional(g) => g.forward_t(z, train),
            Generator::Conditional(g) => {
                let y = y.expect("conditional generator invoked without labels");
                g.forward_t(z, y, train)
            }
        }
    }

    pub fn forward_detailed(&self, z: &Tensor, y: Option<&Tensor>, train: bool) -> GeneratorActivations {
        match self {
            Generator::Unconditional(g) => g.forward_detailed(z, train),
            Generator::Conditional(g) => {
                let y = y.expect("conditional generator invoked without labels");
                g.forward_detailed(z, y, train)
            }
        }
    }

    /// Inference-mode evaluation: identical parameters, population batch-norm
    /// statistics. This is the sampler of the adversarial pair.
    pub fn sample(&self, z: &Tensor, y: Option<&Tensor>) -> Tensor {
        self.forward_t(z, y, false)
    }

    /// Whether the final activation produces values in [0, 1] (sigmoid)
    /// rather than [-1, 1] (tanh).
    pub fn unit_range_output(&self) -> bool {
        matches!(self, Generator::Conditional(_))
    }
}
