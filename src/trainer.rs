//! The alternating adversarial training loop.
//!
//! The generator and the discriminator each live in their own `nn::VarStore`
//! with their own Adam optimizer, so the two parameter sets cannot overlap
//! and neither update can touch the other network. While one side is being
//! updated the other store is frozen, mirroring the per-network `var_list`
//! restriction of the usual DCGAN formulation.

use std::time::Instant;

use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use tch::nn::OptimizerConfig;
use tch::{nn, Device, Reduction, Tensor};

use crate::checkpoint;
use crate::config::{ModelConfig, TrainConfig};
use crate::data::{self, DatasetSource, LatentSource};
use crate::discriminator::Discriminator;
use crate::generator::Generator;
use crate::grid;

/// Mean sigmoid cross-entropy of `logits` against a constant 0/1 target,
/// computed from the logits for numerical stability.
pub fn bce_with_logits(logits: &Tensor, target: f64) -> Tensor {
    logits.binary_cross_entropy_with_logits::<Tensor>(
        &logits.full_like(target),
        None,
        None,
        Reduction::Mean,
    )
}

/// Losses recorded for one training step.
#[derive(Debug, Clone, Copy)]
pub struct StepRecord {
    pub epoch: i64,
    pub idx: i64,
    pub d_loss: f64,
    pub g_loss: f64,
}

pub struct Trainer {
    model_cfg: ModelConfig,
    train_cfg: TrainConfig,
    vs_g: nn::VarStore,
    vs_d: nn::VarStore,
    generator: Generator,
    discriminator: Discriminator,
    opt_g: nn::Optimizer,
    opt_d: nn::Optimizer,
}

impl Trainer {
    pub fn new(model_cfg: ModelConfig, train_cfg: TrainConfig, device: Device) -> Result<Self> {
        let vs_g = nn::VarStore::new(device);
        let generator = Generator::new(&vs_g.root(), &model_cfg);
        let opt_g = nn::adam(train_cfg.beta1, 0.999, 0.)
            .build(&vs_g, train_cfg.learning_rate)
            .context("building generator optimizer")?;

        let vs_d = nn::VarStore::new(device);
        let discriminator = Discriminator::new(&vs_d.root(), &model_cfg);
        let opt_d = nn::adam(train_cfg.beta1, 0.999, 0.)
            .build(&vs_d, train_cfg.learning_rate)
            .context("building discriminator optimizer")?;

        Ok(Self { model_cfg, train_cfg, vs_g, vs_d, generator, discriminator, opt_g, opt_d })
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    pub fn model_cfg(&self) -> &ModelConfig {
        &self.model_cfg
    }

    pub fn device(&self) -> Device {
        self.vs_g.device()
    }

    /// Restores the newest checkpoint for this model key, if any.
    pub fn load_checkpoint(&mut self) -> Result<Option<i64>> {
        checkpoint::load(
            &self.train_cfg.checkpoint_dir,
            &self.model_cfg.model_dir(),
            &mut self.vs_g,
            &mut self.vs_d,
        )
    }

    /// Persists both parameter sets under the model's checkpoint key.
    pub fn save_checkpoint(&self, step: i64) -> Result<()> {
        checkpoint::save(
            &self.train_cfg.checkpoint_dir,
            &self.model_cfg.model_dir(),
            step,
            &self.vs_g,
            &self.vs_d,
        )
    }

    /// Freezes both parameter sets, e.g. before inpainting.
    pub fn freeze(&mut self) {
        self.vs_g.freeze();
        self.vs_d.freeze();
    }

    /// Runs the full training loop and returns the per-step loss history.
    pub fn train(
        &mut self,
        dataset: &DatasetSource,
        latent_source: Option<&LatentSource>,
        rng: &mut StdRng,
    ) -> Result<Vec<StepRecord>> {
        let device = self.vs_g.device();
        let batch_size = self.model_cfg.batch_size;
        let z_dim = self.model_cfg.z_dim();
        std::fs::create_dir_all(&self.train_cfg.sample_dir)?;

        let n = dataset.len().min(self.train_cfg.train_size);
        let batch_idxs = n / batch_size;
        ensure!(batch_idxs > 0, "dataset holds {n} images, fewer than one batch of {batch_size}");

        // Held-out inputs and latents for the periodic sample grid. When a
        // secondary dataset is given its flattened images are the latents.
        let sample_count = self.model_cfg.sample_num.min(n);
        let sample_z = match latent_source {
            Some(source) => {
                let count = sample_count.min(source.latents.size()[0]);
                source.latents.narrow(0, 0, count).to_device(device)
            }
            None => data::uniform_latents(rng, sample_count, z_dim, device),
        };
        let (sample_inputs, sample_labels) = dataset.batch(0, sample_count);
        let sample_inputs = sample_inputs.to_device(device);
        let sample_labels = sample_labels.map(|labels| labels.to_device(device));

        // A missing or unreadable checkpoint is not fatal here: training just
        // starts from the fresh initialization.
        let mut counter: i64 = 1;
        match self.load_checkpoint() {
            Ok(Some(step)) => {
                counter = step;
                println!(" [*] Load SUCCESS, resuming from step {step}");
            }
            Ok(None) => println!(" [!] No checkpoint found, starting fresh"),
            Err(err) => println!(" [!] Load failed ({err:#}), starting fresh"),
        }

        let mut records = Vec::new();
        let start = Instant::now();
        for epoch in 0..self.train_cfg.epochs {
            for idx in 0..batch_idxs {
                let (batch_images, batch_labels) = dataset.batch(idx, batch_size);
                let batch_images = batch_images.to_device(device);
                let batch_labels = batch_labels.map(|labels| labels.to_device(device));
                let y = batch_labels.as_ref();
                let batch_z = data::uniform_latents(rng, batch_size, z_dim, device);

                // Discriminator step: real toward 1, generated toward 0. The
                // generated batch is detached so only the discriminator
                // receives gradients.
                self.vs_d.unfreeze();
                self.vs_g.freeze();
                let (_, real_logits) = self.discriminator.forward_t(&batch_images, y, true);
                let fake = self.generator.forward_t(&batch_z, y, true).detach();
                let (_, fake_logits) = self.discriminator.forward_t(&fake, y, true);
                let d_loss_real = bce_with_logits(&real_logits, 1.);
                let d_loss_fake = bce_with_logits(&fake_logits, 0.);
                let d_loss = &d_loss_real + &d_loss_fake;
                self.opt_d.backward_step(&d_loss);
                let err_d = d_loss.double_value(&[]);

                // Generator step, run twice so the discriminator loss does
                // not collapse to zero.
                self.vs_d.freeze();
                self.vs_g.unfreeze();
                let mut err_g = 0.;
                for _ in 0..2 {
                    let fake = self.generator.forward_t(&batch_z, y, true);
                    let (_, fake_logits) = self.discriminator.forward_t(&fake, y, true);
                    let g_loss = bce_with_logits(&fake_logits, 1.);
                    self.opt_g.backward_step(&g_loss);
                    err_g = g_loss.double_value(&[]);
                }
                self.vs_d.unfreeze();

                counter += 1;
                println!(
                    "Epoch: [{epoch:2}] [{idx:4}/{batch_idxs:4}] time: {:8.4}, d_loss: {err_d:.8}, g_loss: {err_g:.8}",
                    start.elapsed().as_secs_f64()
                );
                records.push(StepRecord { epoch, idx, d_loss: err_d, g_loss: err_g });

                if counter % self.train_cfg.sample_every == 1 {
                    // A bad sample render must not kill the training run.
                    if let Err(err) = self.render_samples(
                        &sample_z,
                        &sample_inputs,
                        sample_labels.as_ref(),
                        latent_source,
                        epoch,
                        idx,
                    ) {
                        println!("one pic error! {err:#}");
                    }
                }
                if counter % self.train_cfg.checkpoint_every == 2 {
                    self.save_checkpoint(counter).context("saving checkpoint")?;
                }
            }
        }
        Ok(records)
    }

    /// Renders the fixed sample grid through the sampler (population
    /// batch-norm statistics) and reports its losses.
    fn render_samples(
        &self,
        sample_z: &Tensor,
        sample_inputs: &Tensor,
        sample_labels: Option<&Tensor>,
        latent_source: Option<&LatentSource>,
        epoch: i64,
        idx: i64,
    ) -> Result<()> {
        let (samples, d_loss, g_loss) = tch::no_grad(|| {
            let samples = self.generator.sample(sample_z, sample_labels);
            let (_, fake_logits) = self.discriminator.forward_t(&samples, sample_labels, false);
            let (_, real_logits) = self.discriminator.forward_t(sample_inputs, sample_labels, false);
            let d_loss = bce_with_logits(&real_logits, 1.) + bce_with_logits(&fake_logits, 0.);
            let g_loss = bce_with_logits(&fake_logits, 1.);
            (samples, d_loss.double_value(&[]), g_loss.double_value(&[]))
        });

        let count = samples.size()[0];
        let (rows, cols) = grid::manifold(count);
        let unit = if self.generator.unit_range_output() {
            samples.shallow_clone()
        } else {
            grid::from_symmetric(&samples)
        };
        let path = self.train_cfg.sample_dir.join(format!("train_{epoch:02}_{idx:04}.png"));
        grid::save_grid(&unit, rows, cols, path)?;

        if let Some(source) = latent_source {
            let count = count.min(source.images.size()[0]);
            let noisy = source.images.narrow(0, 0, count);
            let path = self.train_cfg.sample_dir.join(format!("noisy_{epoch:02}_{idx:04}.png"));
            grid::save_grid(&grid::from_symmetric(&noisy), rows, cols, path)?;
        }

        println!("[Sample] d_loss: {d_loss:.8}, g_loss: {g_loss:.8}");
        Ok(())
    }
}
