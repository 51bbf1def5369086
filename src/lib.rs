//! DCGAN-style adversarial image generation with semantic inpainting.
//!
//! The crate trains a generator/discriminator pair with the usual alternating
//! updates, then reuses the trained pair to complete masked images by gradient
//! descent over the generator's latent input. All tensor work is delegated to
//! libtorch through the `tch` crate; the two networks keep their parameters in
//! separate `nn::VarStore`s so each optimizer can only ever touch its own set.
//!
//! Training example:
//!
//! ```no_run
//! use rand::{rngs::StdRng, SeedableRng};
//! use tch::Device;
//! use xgan::{config::{ModelConfig, TrainConfig}, data, trainer::Trainer};
//!
//! let model_cfg = ModelConfig::default();
//! let train_cfg = TrainConfig::default();
//! let mut rng = StdRng::seed_from_u64(42);
//! let dataset = data::load_image_folder("data/celebA", "*.jpg", &model_cfg)?;
//! let mut trainer = Trainer::new(model_cfg, train_cfg, Device::cuda_if_available())?;
//! trainer.train(&dataset, None, &mut rng)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod discriminator;
pub mod generator;
pub mod grid;
pub mod inpaint;
pub mod masks;
pub mod ops;
pub mod shape;
pub mod trainer;
