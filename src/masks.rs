//! Binary masks for the inpainting objective.
//!
//! A mask matches the image shape; 1 marks known pixels (the context), 0
//! marks the region to be completed.

use std::str::FromStr;

use anyhow::bail;
use rand::rngs::StdRng;
use rand::Rng;
use tch::{kind::FLOAT_CPU, Tensor};

/// Fraction of pixels dropped by the random mask.
const RANDOM_FRACTION: f64 = 0.2;
/// The center mask removes the `[scale, 1 - scale]` band in both dimensions.
const CENTER_SCALE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskType {
    /// Per-pixel corruption at a fixed fraction.
    Random,
    /// Centered square removal.
    Center,
    /// Left half removal.
    Left,
    /// No removal, for regression runs.
    Full,
}

impl FromStr for MaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(MaskType::Random),
            "center" => Ok(MaskType::Center),
            "left" => Ok(MaskType::Left),
            "full" => Ok(MaskType::Full),
            _ => bail!("unknown mask type {s:?} (expected random, center, left or full)"),
        }
    }
}

/// Builds a `[c, h, w]` mask. The random policy draws one value per pixel and
/// drops it across every channel.
pub fn build_mask(mask_type: MaskType, c: i64, h: i64, w: i64, rng: &mut StdRng) -> Tensor {
    match mask_type {
        MaskType::Random => {
            let plane: Vec<f32> = (0..h * w)
                .map(|_| if rng.gen::<f64>() < RANDOM_FRACTION { 0. } else { 1. })
                .collect();
            Tensor::from_slice(&plane).view([1, h, w]).repeat([c, 1, 1])
        }
        MaskType::Center => {
            let mask = Tensor::ones([c, h, w], FLOAT_CPU);
            let (lh, uh) = ((h as f64 * CENTER_SCALE) as i64, (h as f64 * (1. - CENTER_SCALE)) as i64);
            let (lw, uw) = ((w as f64 * CENTER_SCALE) as i64, (w as f64 * (1. - CENTER_SCALE)) as i64);
            let _ = mask.narrow(1, lh, uh - lh).narrow(2, lw, uw - lw).fill_(0.);
            mask
        }
        MaskType::Left => {
            let mask = Tensor::ones([c, h, w], FLOAT_CPU);
            let _ = mask.narrow(2, 0, w / 2).fill_(0.);
            mask
        }
        MaskType::Full => Tensor::ones([c, h, w], FLOAT_CPU),
    }
}
