//! Model and training configuration.

use std::path::PathBuf;

/// Structural hyper-parameters of the generator/discriminator pair.
///
/// Everything here is fixed at model construction time. In particular `y_dim`
/// decides between the unconditional and the conditional topology once and for
/// all; it is never consulted again per forward pass.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Height of the raw input images (before the optional center crop).
    pub input_height: i64,
    /// Width of the raw input images.
    pub input_width: i64,
    /// Center-crop inputs to (input_height, input_width) before resizing.
    pub crop: bool,
    /// Height of the generated images.
    pub output_height: i64,
    /// Width of the generated images.
    pub output_width: i64,
    pub batch_size: i64,
    /// Number of images in the fixed sample grid rendered during training.
    pub sample_num: i64,
    /// Dimension of the one-hot conditioning labels, `None` for the
    /// unconditional topology.
    pub y_dim: Option<i64>,
    /// Base channel width of the generator.
    pub gf_dim: i64,
    /// Base channel width of the discriminator.
    pub df_dim: i64,
    /// Width of the conditional generator's fully connected stage.
    pub gfc_dim: i64,
    /// Width of the conditional discriminator's fully connected stage.
    pub dfc_dim: i64,
    /// Number of image channels.
    pub c_dim: i64,
    /// Weight of the perceptual term in the inpainting objective.
    pub lambda: f64,
    /// Dataset name, part of the checkpoint directory key.
    pub dataset: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_height: 108,
            input_width: 108,
            crop: true,
            output_height: 64,
            output_width: 64,
            batch_size: 64,
            sample_num: 64,
            y_dim: None,
            gf_dim: 64,
            df_dim: 64,
            gfc_dim: 1024,
            dfc_dim: 1024,
            c_dim: 3,
            lambda: 0.08,
            dataset: "celebA".to_string(),
        }
    }
}

impl ModelConfig {
    /// Length of the latent vector. Equal to the flattened output pixel count
    /// (with a hard-coded three channels) so that images of a secondary
    /// dataset can be flattened straight into latent vectors.
    pub fn z_dim(&self) -> i64 {
        self.output_height * self.output_width * 3
    }

    /// (channels, height, width) of the images fed to the discriminator.
    pub fn image_dims(&self) -> (i64, i64, i64) {
        if self.crop {
            (self.c_dim, self.output_height, self.output_width)
        } else {
            (self.c_dim, self.input_height, self.input_width)
        }
    }

    /// Composite key identifying a trained model on disk.
    pub fn model_dir(&self) -> String {
        format!("{}_{}_{}_{}", self.dataset, self.batch_size, self.output_height, self.output_width)
    }
}

/// Knobs of the training loop itself.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: i64,
    pub learning_rate: f64,
    /// Adam beta1, 0.5 as in the DCGAN paper.
    pub beta1: f64,
    /// Upper bound on the number of images used per epoch.
    pub train_size: i64,
    pub checkpoint_dir: PathBuf,
    pub sample_dir: PathBuf,
    /// Render the fixed sample grid when `counter % sample_every == 1`.
    pub sample_every: i64,
    /// Persist a checkpoint when `counter % checkpoint_every == 2`.
    pub checkpoint_every: i64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 25,
            learning_rate: 2e-4,
            beta1: 0.5,
            train_size: i64::MAX,
            checkpoint_dir: PathBuf::from("checkpoint"),
            sample_dir: PathBuf::from("samples"),
            sample_every: 100,
            checkpoint_every: 500,
        }
    }
}
