//! Checkpoint persistence for the generator/discriminator pair.
//!
//! Checkpoints live under `<root>/<dataset>_<batch>_<outh>_<outw>/` as one
//! weight file per network with the step number as a trailing suffix. Loading
//! picks the newest step by parsing the trailing digits of the filenames.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tch::nn::VarStore;

const GEN_PREFIX: &str = "generator-";
const DISC_PREFIX: &str = "discriminator-";
const EXTENSION: &str = ".ot";

/// Blocking save of both parameter sets; returns once the files are written.
pub fn save(root: &Path, model_dir: &str, step: i64, vs_g: &VarStore, vs_d: &VarStore) -> Result<()> {
    let dir = root.join(model_dir);
    fs::create_dir_all(&dir).with_context(|| format!("creating checkpoint dir {dir:?}"))?;
    vs_g.save(dir.join(format!("{GEN_PREFIX}{step}{EXTENSION}")))?;
    vs_d.save(dir.join(format!("{DISC_PREFIX}{step}{EXTENSION}")))?;
    Ok(())
}

/// Restores the newest checkpoint into the two stores.
///
/// Returns `Ok(None)` when the directory is missing or holds no checkpoint;
/// actual read/parse failures surface as errors so the caller can decide
/// whether they are fatal.
pub fn load(root: &Path, model_dir: &str, vs_g: &mut VarStore, vs_d: &mut VarStore) -> Result<Option<i64>> {
    let dir = root.join(model_dir);
    let step = match latest_step(&dir) {
        Some(step) => step,
        None => return Ok(None),
    };
    vs_g.load(dir.join(format!("{GEN_PREFIX}{step}{EXTENSION}")))
        .with_context(|| format!("loading generator checkpoint at step {step}"))?;
    vs_d.load(dir.join(format!("{DISC_PREFIX}{step}{EXTENSION}")))
        .with_context(|| format!("loading discriminator checkpoint at step {step}"))?;
    Ok(Some(step))
}

fn latest_step(dir: &Path) -> Option<i64> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(GEN_PREFIX))
        .filter_map(|name| trailing_step(&name))
        .max()
}

/// Parses the trailing digits of a checkpoint filename stem.
fn trailing_step(name: &str) -> Option<i64> {
    let stem = name.strip_suffix(EXTENSION)?;
    let digits: String = stem.chars().rev().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.chars().rev().collect::<String>().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_digits() {
        assert_eq!(trailing_step("generator-1500.ot"), Some(1500));
        assert_eq!(trailing_step("generator-2.ot"), Some(2));
        assert_eq!(trailing_step("generator-.ot"), None);
        assert_eq!(trailing_step("generator-12a.ot"), None);
        assert_eq!(trailing_step("generator-7.bin"), None);
    }
}
