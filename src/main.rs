use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::Device;
use xgan::config::{ModelConfig, TrainConfig};
use xgan::data;
use xgan::inpaint::{InpaintConfig, Inpainter};
use xgan::masks::MaskType;
use xgan::trainer::Trainer;

/// DCGAN-style image generation with semantic inpainting.
///
/// Train with `--train`, then complete masked images with `--imgs DIR`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Train a model; otherwise images are inpainted with an existing checkpoint
    #[arg(long)]
    train: bool,

    /// Number of training epochs
    #[arg(long, default_value_t = 25)]
    epoch: i64,
    /// Learning rate of both Adam optimizers
    #[arg(long, default_value_t = 2e-4)]
    learning_rate: f64,
    /// Adam beta1
    #[arg(long, default_value_t = 0.5)]
    beta1: f64,
    /// Cap on the number of images used per epoch
    #[arg(long)]
    train_size: Option<i64>,
    #[arg(long, default_value_t = 64)]
    batch_size: i64,
    /// Height of the raw input images (center-cropped to this size)
    #[arg(long, default_value_t = 108)]
    input_height: i64,
    /// Width of the raw input images, defaults to the height
    #[arg(long)]
    input_width: Option<i64>,
    /// Height of the generated images
    #[arg(long, default_value_t = 64)]
    output_height: i64,
    /// Width of the generated images, defaults to the height
    #[arg(long)]
    output_width: Option<i64>,
    /// Dataset name; "mnist" selects the conditional digit model
    #[arg(long, default_value = "celebA")]
    dataset: String,
    /// Secondary dataset whose flattened images seed the sample latents
    #[arg(long)]
    dataset2: Option<String>,
    /// Filename pattern of the dataset images
    #[arg(long, default_value = "*.jpg")]
    input_fname_pattern: String,
    /// Directory holding the datasets
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Skip the center crop
    #[arg(long)]
    no_crop: bool,
    #[arg(long, default_value = "checkpoint")]
    checkpoint_dir: PathBuf,
    /// Directory for the training sample grids
    #[arg(long, default_value = "samples")]
    sample_dir: PathBuf,
    /// Seed for latent sampling, masks and parameter initialization
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Directory of images to inpaint
    #[arg(long)]
    imgs: Option<PathBuf>,
    /// Mask policy: random, center, left or full
    #[arg(long, default_value = "center")]
    mask_type: String,
    /// Inpainting iterations per batch
    #[arg(long, default_value_t = 1000)]
    n_iter: i64,
    /// Momentum of the latent updates
    #[arg(long, default_value_t = 0.9)]
    momentum: f64,
    /// Learning rate of the latent updates
    #[arg(long, default_value_t = 0.01)]
    lr: f64,
    /// Weight of the perceptual term in the inpainting objective
    #[arg(long, default_value_t = 0.08)]
    lambda: f64,
    /// Output directory for the inpainting results
    #[arg(long, default_value = "complete")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mnist = args.dataset == "mnist";

    let model_cfg = if mnist {
        ModelConfig {
            input_height: 28,
            input_width: 28,
            crop: false,
            output_height: 28,
            output_width: 28,
            batch_size: args.batch_size,
            sample_num: args.batch_size,
            y_dim: Some(10),
            c_dim: 1,
            lambda: args.lambda,
            dataset: args.dataset.clone(),
            ..ModelConfig::default()
        }
    } else {
        ModelConfig {
            input_height: args.input_height,
            input_width: args.input_width.unwrap_or(args.input_height),
            crop: !args.no_crop,
            output_height: args.output_height,
            output_width: args.output_width.unwrap_or(args.output_height),
            batch_size: args.batch_size,
            sample_num: args.batch_size,
            lambda: args.lambda,
            dataset: args.dataset.clone(),
            ..ModelConfig::default()
        }
    };
    let train_cfg = TrainConfig {
        epochs: args.epoch,
        learning_rate: args.learning_rate,
        beta1: args.beta1,
        train_size: args.train_size.unwrap_or(i64::MAX),
        checkpoint_dir: args.checkpoint_dir.clone(),
        sample_dir: args.sample_dir.clone(),
        ..TrainConfig::default()
    };

    tch::manual_seed(args.seed as i64);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let device = Device::cuda_if_available();
    let mut trainer = Trainer::new(model_cfg.clone(), train_cfg, device)?;

    if args.train {
        let dataset = if mnist {
            data::load_mnist(args.data_dir.join("mnist"))?
        } else {
            data::load_image_folder(
                args.data_dir.join(&args.dataset),
                &args.input_fname_pattern,
                &model_cfg,
            )?
        };
        let latent_source = match &args.dataset2 {
            Some(name) => Some(data::load_latent_folder(
                args.data_dir.join(name),
                &args.input_fname_pattern,
                &model_cfg,
            )?),
            None => None,
        };
        println!("loaded {} training images", dataset.len());
        trainer.train(&dataset, latent_source.as_ref(), &mut rng)?;
    } else {
        // Inpainting needs a trained pair; a missing checkpoint is fatal here.
        let mask_type: MaskType = args.mask_type.parse()?;
        let imgs = match &args.imgs {
            Some(dir) => dir,
            None => bail!("--imgs DIR is required when inpainting (or pass --train)"),
        };
        match trainer.load_checkpoint()? {
            Some(step) => println!(" [*] Load SUCCESS, checkpoint step {step}"),
            None => bail!(
                "no checkpoint for model {:?} under {:?}; train one first",
                model_cfg.model_dir(),
                args.checkpoint_dir
            ),
        }
        trainer.freeze();

        let images = data::load_image_folder(imgs, &args.input_fname_pattern, &model_cfg)?;
        println!("inpainting {} images", images.len());
        let inpaint_cfg = InpaintConfig {
            n_iter: args.n_iter,
            learning_rate: args.lr,
            momentum: args.momentum,
            mask_type,
            out_dir: args.out_dir.clone(),
            ..InpaintConfig::default()
        };
        let inpainter =
            Inpainter::new(trainer.generator(), trainer.discriminator(), trainer.model_cfg(), inpaint_cfg);
        let images = images.images().to_device(device);
        inpainter.run(&images, None, &mut rng)?;
    }
    Ok(())
}
