//! Semantic inpainting: gradient descent over the generator's latent input.
//!
//! The networks are frozen and evaluated in inference mode; the only thing
//! the optimizer moves is the latent batch. The objective combines a
//! contextual term (absolute pixel error over the known region) with the
//! generator's adversarial loss as a small realism pressure.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use tch::{Kind, Tensor};

use crate::config::ModelConfig;
use crate::data;
use crate::discriminator::Discriminator;
use crate::generator::Generator;
use crate::grid;
use crate::masks::{self, MaskType};
use crate::trainer::bce_with_logits;

#[derive(Debug, Clone)]
pub struct InpaintConfig {
    pub n_iter: i64,
    pub learning_rate: f64,
    pub momentum: f64,
    pub mask_type: MaskType,
    pub out_dir: PathBuf,
    /// Report and render every this many iterations.
    pub log_every: i64,
}

impl Default for InpaintConfig {
    fn default() -> Self {
        Self {
            n_iter: 1000,
            learning_rate: 0.01,
            momentum: 0.9,
            mask_type: MaskType::Center,
            out_dir: PathBuf::from("complete"),
            log_every: 50,
        }
    }
}

/// Final state of one inpainted batch, sliced back to the real samples.
#[derive(Debug)]
pub struct InpaintResult {
    /// Known pixels from the input, the hole filled from the generator.
    pub completed: Tensor,
    /// Raw generator output for the final latent estimate.
    pub generated: Tensor,
    /// Final latent estimate, components in [-1, 1].
    pub latents: Tensor,
    /// (iteration, mean combined loss) records, one per logged iteration.
    pub losses: Vec<(i64, f64)>,
}

pub struct Inpainter<'a> {
    generator: &'a Generator,
    discriminator: &'a Discriminator,
    model_cfg: &'a ModelConfig,
    cfg: InpaintConfig,
}

impl<'a> Inpainter<'a> {
    pub fn new(
        generator: &'a Generator,
        discriminator: &'a Discriminator,
        model_cfg: &'a ModelConfig,
        cfg: InpaintConfig,
    ) -> Self {
        Self { generator, discriminator, model_cfg, cfg }
    }

    /// Completes every image in `images`, batch by batch, writing snapshot
    /// grids and the loss log under the output directory. The final batch is
    /// zero-padded up to the configured batch size; padding never reaches any
    /// reported statistic or rendered grid.
    pub fn run(&self, images: &Tensor, y: Option<&Tensor>, rng: &mut StdRng) -> Result<Vec<InpaintResult>> {
        let (c, h, w) = self.model_cfg.image_dims();
        let mask = masks::build_mask(self.cfg.mask_type, c, h, w, rng).to_device(images.device());

        let n = images.size()[0];
        let batch_size = self.model_cfg.batch_size;
        let batch_idxs = (n + batch_size - 1) / batch_size;
        let mut results = Vec::new();
        for idx in 0..batch_idxs {
            let lo = idx * batch_size;
            let batch_sz = batch_size.min(n - lo);
            let batch = images.narrow(0, lo, batch_sz);
            let labels = y.map(|y| y.narrow(0, lo, batch_sz));
            let padded = pad_batch(&batch, batch_size);
            let padded_labels = labels.as_ref().map(|labels| pad_batch(labels, batch_size));
            results.push(self.complete_batch(&padded, batch_sz, padded_labels.as_ref(), &mask, rng)?);
        }

        let mut log = String::new();
        for result in &results {
            for (iter, loss) in &result.losses {
                log.push_str(&format!("{iter}\t{loss}\n"));
            }
        }
        fs::create_dir_all(&self.cfg.out_dir)?;
        fs::write(self.cfg.out_dir.join("Inpaint_Results.txt"), log).context("writing inpainting results")?;
        Ok(results)
    }

    /// Inpaints one full-size batch of which only the first `batch_sz`
    /// entries are real samples.
    pub fn complete_batch(
        &self,
        images: &Tensor,
        batch_sz: i64,
        y: Option<&Tensor>,
        mask: &Tensor,
        rng: &mut StdRng,
    ) -> Result<InpaintResult> {
        let batch_size = self.model_cfg.batch_size;
        let batch_mask = mask.unsqueeze(0);
        let masked_images = images * &batch_mask;

        let (rows, cols) = grid::inpaint_manifold(batch_sz);
        let out_dir = &self.cfg.out_dir;
        fs::create_dir_all(out_dir.join("hats_imgs"))?;
        fs::create_dir_all(out_dir.join("inpainted"))?;
        grid::save_grid(&self.to_unit(&images.narrow(0, 0, batch_sz)), rows, cols, out_dir.join("before.png"))?;
        grid::save_grid(
            &self.to_unit(&masked_images.narrow(0, 0, batch_sz)),
            rows,
            cols,
            out_dir.join("masked.png"),
        )?;

        let mut zhats = data::uniform_latents(rng, batch_size, self.model_cfg.z_dim(), images.device())
            .set_requires_grad(true);
        let mut velocity = zhats.zeros_like();
        let mut losses = Vec::new();

        for iter in 0..self.cfg.n_iter {
            let g_imgs = self.generator.forward_t(&zhats, y, false);
            let (_, fake_logits) = self.discriminator.forward_t(&g_imgs, y, false);
            // Realism pressure: the generator's adversarial loss on the
            // current output.
            let perceptual = bce_with_logits(&fake_logits, 1.);
            // Pixel fidelity over the known region, one value per sample.
            let contextual = (&batch_mask * &g_imgs - &batch_mask * images)
                .abs()
                .sum_dim_intlist([1i64, 2, 3], false, Kind::Float);
            let complete = &contextual + self.model_cfg.lambda * &perceptual;

            let grads = Tensor::run_backward(&[complete.sum(Kind::Float)], &[&zhats], false, false);
            let grad = &grads[0];

            tch::no_grad(|| {
                let v_prev = velocity.copy();
                velocity = self.cfg.momentum * &velocity - self.cfg.learning_rate * grad;
                zhats += -self.cfg.momentum * &v_prev + (1. + self.cfg.momentum) * &velocity;
                let _ = zhats.clamp_(-1., 1.);
            });

            if iter % self.cfg.log_every == 0 {
                let mean_loss = complete.narrow(0, 0, batch_sz).mean(Kind::Float).double_value(&[]);
                println!("Inpainting iteration: {iter:4}  loss: {mean_loss:.6}");
                losses.push((iter, mean_loss));

                grid::save_grid(
                    &self.to_unit(&g_imgs.narrow(0, 0, batch_sz)),
                    rows,
                    cols,
                    out_dir.join(format!("hats_imgs/{iter:04}.png")),
                )?;
                let completed = &masked_images + (1.0 - &batch_mask) * &g_imgs;
                grid::save_grid(
                    &self.to_unit(&completed.narrow(0, 0, batch_sz)),
                    rows,
                    cols,
                    out_dir.join(format!("inpainted/{iter:04}.png")),
                )?;
            }
        }

        let (generated, completed) = tch::no_grad(|| {
            let g_imgs = self.generator.forward_t(&zhats, y, false);
            let completed = &masked_images + (1.0 - &batch_mask) * &g_imgs;
            (g_imgs.narrow(0, 0, batch_sz), completed.narrow(0, 0, batch_sz))
        });
        let latents = zhats.narrow(0, 0, batch_sz).detach();
        Ok(InpaintResult { completed, generated, latents, losses })
    }

    fn to_unit(&self, images: &Tensor) -> Tensor {
        if self.generator.unit_range_output() {
            images.shallow_clone()
        } else {
            grid::from_symmetric(images)
        }
    }
}

/// Zero-pads a batch along the first dimension up to `batch_size`.
fn pad_batch(batch: &Tensor, batch_size: i64) -> Tensor {
    let mut size = batch.size();
    let short = batch_size - size[0];
    if short <= 0 {
        return batch.shallow_clone();
    }
    size[0] = short;
    let pad = Tensor::zeros(size, (batch.kind(), batch.device()));
    Tensor::cat(&[batch, &pad], 0)
}
