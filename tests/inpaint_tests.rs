use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tch::{nn, Device, Tensor};
use xgan::config::ModelConfig;
use xgan::discriminator::Discriminator;
use xgan::generator::Generator;
use xgan::inpaint::{InpaintConfig, Inpainter};
use xgan::masks::{build_mask, MaskType};

fn tiny_model_cfg() -> ModelConfig {
    ModelConfig {
        input_height: 64,
        input_width: 64,
        crop: false,
        output_height: 64,
        output_width: 64,
        batch_size: 4,
        sample_num: 4,
        y_dim: None,
        gf_dim: 8,
        df_dim: 8,
        gfc_dim: 64,
        dfc_dim: 64,
        c_dim: 3,
        lambda: 0.08,
        dataset: "synthetic".to_string(),
    }
}

fn synthetic_images(rng: &mut StdRng, n: i64) -> Tensor {
    let data: Vec<f32> = (0..n * 3 * 64 * 64).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    Tensor::from_slice(&data).view([n, 3, 64, 64])
}

fn max_abs(t: &Tensor) -> f64 {
    f64::try_from(t.abs().max()).unwrap()
}

struct Pair {
    _vs_g: nn::VarStore,
    _vs_d: nn::VarStore,
    generator: Generator,
    discriminator: Discriminator,
}

fn fresh_pair(cfg: &ModelConfig) -> Pair {
    let mut vs_g = nn::VarStore::new(Device::Cpu);
    let generator = Generator::new(&vs_g.root(), cfg);
    let mut vs_d = nn::VarStore::new(Device::Cpu);
    let discriminator = Discriminator::new(&vs_d.root(), cfg);
    vs_g.freeze();
    vs_d.freeze();
    Pair { _vs_g: vs_g, _vs_d: vs_d, generator, discriminator }
}

#[test]
fn latents_stay_clipped_after_every_update() {
    let base = std::env::temp_dir().join(format!("xgan-clip-{}", std::process::id()));
    let cfg = tiny_model_cfg();
    let pair = fresh_pair(&cfg);
    // An oversized learning rate would push latents far outside the valid
    // input domain without the clipping step.
    let inpaint_cfg = InpaintConfig {
        n_iter: 5,
        learning_rate: 1.0,
        mask_type: MaskType::Random,
        out_dir: base.clone(),
        ..InpaintConfig::default()
    };
    let inpainter = Inpainter::new(&pair.generator, &pair.discriminator, &cfg, inpaint_cfg);

    let mut rng = StdRng::seed_from_u64(21);
    let images = synthetic_images(&mut rng, 4);
    let results = inpainter.run(&images, None, &mut rng).unwrap();
    assert_eq!(results.len(), 1);
    assert!(max_abs(&results[0].latents) <= 1.0);

    let _ = std::fs::remove_dir_all(base);
}

#[test]
fn padding_content_never_reaches_reported_statistics() {
    let base = std::env::temp_dir().join(format!("xgan-pad-{}", std::process::id()));
    let cfg = ModelConfig { lambda: 0.0, ..tiny_model_cfg() };
    let pair = fresh_pair(&cfg);
    let inpaint_cfg = InpaintConfig {
        n_iter: 3,
        log_every: 1,
        mask_type: MaskType::Center,
        out_dir: base.clone(),
        ..InpaintConfig::default()
    };
    let inpainter = Inpainter::new(&pair.generator, &pair.discriminator, &cfg, inpaint_cfg);

    let mut rng = StdRng::seed_from_u64(22);
    let real = synthetic_images(&mut rng, 2);
    let mask = build_mask(MaskType::Center, 3, 64, 64, &mut rng);

    // Same two real samples, two very different paddings.
    let zeros = Tensor::zeros([2, 3, 64, 64], tch::kind::FLOAT_CPU);
    let sevens = zeros.full_like(0.7);
    let padded_a = Tensor::cat(&[&real, &zeros], 0);
    let padded_b = Tensor::cat(&[&real, &sevens], 0);

    let mut rng_a = StdRng::seed_from_u64(23);
    let mut rng_b = StdRng::seed_from_u64(23);
    let result_a = inpainter.complete_batch(&padded_a, 2, None, &mask, &mut rng_a).unwrap();
    let result_b = inpainter.complete_batch(&padded_b, 2, None, &mask, &mut rng_b).unwrap();

    assert_eq!(result_a.completed.size(), &[2, 3, 64, 64]);
    assert_eq!(result_a.losses.len(), 3);
    assert_eq!(result_a.losses, result_b.losses);
    assert_eq!(max_abs(&(&result_a.completed - &result_b.completed)), 0.0);
    assert_eq!(max_abs(&(&result_a.latents - &result_b.latents)), 0.0);

    let _ = std::fs::remove_dir_all(base);
}

#[test]
fn center_inpainting_reconstructs_outside_the_hole_exactly() {
    let base = std::env::temp_dir().join(format!("xgan-center-{}", std::process::id()));
    let cfg = tiny_model_cfg();
    let pair = fresh_pair(&cfg);
    let inpaint_cfg = InpaintConfig {
        n_iter: 100,
        learning_rate: 0.01,
        momentum: 0.9,
        mask_type: MaskType::Center,
        out_dir: base.clone(),
        ..InpaintConfig::default()
    };
    let inpainter = Inpainter::new(&pair.generator, &pair.discriminator, &cfg, inpaint_cfg);

    let mut rng = StdRng::seed_from_u64(24);
    let image = synthetic_images(&mut rng, 1);
    let results = inpainter.run(&image, None, &mut rng).unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];

    // Loss records at iterations 0 and 50, all finite.
    assert_eq!(result.losses.len(), 2);
    assert_eq!(result.losses[0].0, 0);
    assert_eq!(result.losses[1].0, 50);
    assert!(result.losses.iter().all(|(_, loss)| loss.is_finite()));

    // The composite takes known pixels straight from the input, so outside
    // the hole it matches the original bit for bit.
    let mask = build_mask(MaskType::Center, 3, 64, 64, &mut rng);
    let diff = (&result.completed - &image) * mask.unsqueeze(0);
    assert_eq!(max_abs(&diff), 0.0);

    // Snapshot grids and the loss log land in the output directory.
    assert!(base.join("before.png").exists());
    assert!(base.join("masked.png").exists());
    assert!(base.join("hats_imgs").join("0000.png").exists());
    assert!(base.join("inpainted").join("0050.png").exists());
    assert!(base.join("Inpaint_Results.txt").exists());

    let _ = std::fs::remove_dir_all(base);
}
