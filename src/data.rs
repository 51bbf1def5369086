//! Dataset loading: a generic image folder and the MNIST digit benchmark,
//! plus latent sampling helpers.

use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tch::vision::image;
use tch::{Device, Kind, Tensor};

use crate::config::ModelConfig;

/// Fixed shuffle seed of the digit benchmark, so runs see the images in the
/// same order.
const MNIST_SHUFFLE_SEED: u64 = 547;

/// An in-memory training dataset.
#[derive(Debug)]
pub enum DatasetSource {
    /// `[n, c, h, w]` images in [-1, 1], unconditional training.
    Images(Tensor),
    /// `[n, 1, 28, 28]` images in [0, 1] with `[n, 10]` one-hot labels,
    /// conditional training.
    Labeled { images: Tensor, labels: Tensor },
}

impl DatasetSource {
    pub fn len(&self) -> i64 {
        self.images().size()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn images(&self) -> &Tensor {
        match self {
            DatasetSource::Images(images) => images,
            DatasetSource::Labeled { images, .. } => images,
        }
    }

    pub fn labels(&self) -> Option<&Tensor> {
        match self {
            DatasetSource::Images(_) => None,
            DatasetSource::Labeled { labels, .. } => Some(labels),
        }
    }

    /// The `index`-th contiguous batch of `batch_size` samples.
    pub fn batch(&self, index: i64, batch_size: i64) -> (Tensor, Option<Tensor>) {
        let images = self.images().narrow(0, index * batch_size, batch_size);
        let labels = self.labels().map(|labels| labels.narrow(0, index * batch_size, batch_size));
        (images, labels)
    }
}

/// Images of a secondary dataset used verbatim as latent vectors; the raw
/// images are kept around so they can be rendered next to the sample grids.
#[derive(Debug)]
pub struct LatentSource {
    /// `[n, z_dim]` flattened normalized images.
    pub latents: Tensor,
    /// `[n, 3, h, w]` source images in [-1, 1].
    pub images: Tensor,
}

/// Uniform latent batch in [-1, 1], drawn from the explicit generator.
pub fn uniform_latents(rng: &mut StdRng, n: i64, z_dim: i64, device: Device) -> Tensor {
    let data: Vec<f32> = (0..n * z_dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    Tensor::from_slice(&data).view([n, z_dim]).to_device(device)
}

fn list_images(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let suffix = pattern.trim_start_matches('*');
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading image dir {dir:?}"))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name().and_then(|name| name.to_str()).map_or(false, |name| name.ends_with(suffix))
        })
        .collect();
    ensure!(!files.is_empty(), "no image matching {pattern:?} in {dir:?}");
    files.sort();
    Ok(files)
}

fn center_crop(img: &Tensor, crop_h: i64, crop_w: i64) -> Tensor {
    let (_, h, w) = img.size3().unwrap();
    if h <= crop_h && w <= crop_w {
        return img.shallow_clone();
    }
    let crop_h = crop_h.min(h);
    let crop_w = crop_w.min(w);
    img.narrow(1, (h - crop_h) / 2, crop_h).narrow(2, (w - crop_w) / 2, crop_w)
}

/// Loads one image: optional center crop to the input size, resize to the
/// output size, channels adjusted to `c_dim`, values scaled to [-1, 1].
fn load_and_transform(path: &Path, cfg: &ModelConfig) -> Result<Tensor> {
    let img = image::load(path).with_context(|| format!("loading {path:?}"))?;
    let img = if cfg.crop { center_crop(&img, cfg.input_height, cfg.input_width) } else { img };
    let img = image::resize(&img, cfg.output_width, cfg.output_height)?;
    let channels = img.size()[0];
    let img = match (channels, cfg.c_dim) {
        (have, want) if have == want => img.to_kind(Kind::Float),
        (_, 1) => img.to_kind(Kind::Float).mean_dim([0i64], true, Kind::Float),
        (1, 3) => img.to_kind(Kind::Float).repeat([3, 1, 1]),
        (have, want) => bail!("cannot convert {have}-channel image {path:?} to {want} channels"),
    };
    Ok(img / 127.5 - 1.)
}

/// Loads a whole image folder into a `[n, c, h, w]` tensor in [-1, 1].
pub fn load_image_folder<P: AsRef<Path>>(dir: P, pattern: &str, cfg: &ModelConfig) -> Result<DatasetSource> {
    let files = list_images(dir.as_ref(), pattern)?;
    let images: Vec<Tensor> =
        files.iter().map(|path| load_and_transform(path, cfg)).collect::<Result<_>>()?;
    Ok(DatasetSource::Images(Tensor::stack(&images, 0)))
}

/// Loads the digit benchmark: train and test sets concatenated (70k images),
/// shuffled with the fixed seed, labels one-hot encoded.
pub fn load_mnist<P: AsRef<Path>>(dir: P) -> Result<DatasetSource> {
    let m = tch::vision::mnist::load_dir(dir.as_ref())
        .with_context(|| format!("loading mnist from {:?}", dir.as_ref()))?;
    let images = Tensor::cat(&[&m.train_images, &m.test_images], 0);
    let labels = Tensor::cat(&[&m.train_labels, &m.test_labels], 0);
    let n = images.size()[0];

    let mut perm: Vec<i64> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(MNIST_SHUFFLE_SEED);
    perm.shuffle(&mut rng);
    let perm = Tensor::from_slice(&perm);

    let images = images.index_select(0, &perm).view([n, 1, 28, 28]);
    let labels = labels.index_select(0, &perm).one_hot(10).to_kind(Kind::Float);
    Ok(DatasetSource::Labeled { images, labels })
}

/// Loads a secondary image folder as latent vectors: each image is flattened
/// into one `z` row. Requires three channels, since the latent length is the
/// three-channel pixel count.
pub fn load_latent_folder<P: AsRef<Path>>(dir: P, pattern: &str, cfg: &ModelConfig) -> Result<LatentSource> {
    ensure!(cfg.c_dim == 3, "a latent dataset needs 3-channel images");
    let source = load_image_folder(dir, pattern, cfg)?;
    let images = match source {
        DatasetSource::Images(images) => images,
        DatasetSource::Labeled { .. } => unreachable!(),
    };
    let n = images.size()[0];
    let latents = images.view([n, -1]);
    Ok(LatentSource { latents, images })
}
