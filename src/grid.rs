//! Tiled image grids for training samples and inpainting snapshots.

use std::path::Path;

use anyhow::{ensure, Result};
use tch::{Device, Kind, Tensor};

/// (rows, cols) of the training sample grid: a square-ish manifold.
pub fn manifold(n: i64) -> (i64, i64) {
    let root = (n as f64).sqrt();
    (root.ceil() as i64, root.floor() as i64)
}

/// (rows, cols) of the inpainting grids: always eight columns.
pub fn inpaint_manifold(n: i64) -> (i64, i64) {
    ((n + 7) / 8, 8)
}

/// Maps tanh-range images in [-1, 1] to the unit range.
pub fn from_symmetric(images: &Tensor) -> Tensor {
    (images + 1.) / 2.
}

/// Tiles a `[n, c, h, w]` batch of unit-range images into a single
/// `[c, rows*h, cols*w]` byte image. Unused cells stay black; images beyond
/// `rows * cols` are dropped.
pub fn tile(images: &Tensor, rows: i64, cols: i64) -> Result<Tensor> {
    ensure!(rows > 0 && cols > 0, "grid must have at least one cell");
    let (n, c, h, w) = images.size4()?;
    let bytes = (images.clamp(0., 1.) * 255.).to_kind(Kind::Uint8).to_device(Device::Cpu);
    let canvas = Tensor::zeros([c, rows * h, cols * w], (Kind::Uint8, Device::Cpu));
    for i in 0..n.min(rows * cols) {
        let (row, col) = (i / cols, i % cols);
        canvas.narrow(1, row * h, h).narrow(2, col * w, w).copy_(&bytes.get(i));
    }
    Ok(canvas)
}

/// Tiles and writes a batch of unit-range images.
pub fn save_grid<P: AsRef<Path>>(images: &Tensor, rows: i64, cols: i64, path: P) -> Result<()> {
    tch::vision::image::save(&tile(images, rows, cols)?, path)?;
    Ok(())
}
