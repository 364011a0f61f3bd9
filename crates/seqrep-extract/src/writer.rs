//! Serialization of per-sequence representations.
//!
//! One file per sequence, named by its FASTA label. Labels containing `/`
//! map to subdirectories, which are created on demand; labels are not
//! otherwise sanitized.
use crate::represent::SequenceRepresentations;
use anyhow::{anyhow, Context, Result};
use candle_core::Tensor;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

fn prepare_path(output_dir: &Path, label: &str, extension: &str) -> Result<PathBuf> {
    let path = output_dir.join(format!("{label}.{extension}"));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    Ok(path)
}

/// Write a `<label>.safetensors` bundle holding every selected representation,
/// with the label recorded in the file metadata.
pub fn write_bundle(output_dir: &Path, reprs: &SequenceRepresentations) -> Result<PathBuf> {
    let path = prepare_path(output_dir, &reprs.label, "safetensors")?;
    let mut tensors: Vec<(String, Tensor)> = Vec::new();
    for (layer, tensor) in &reprs.per_tok {
        tensors.push((format!("representations.{layer}"), tensor.clone()));
    }
    for (layer, tensor) in &reprs.mean {
        tensors.push((format!("mean_representations.{layer}"), tensor.clone()));
    }
    for (layer, tensor) in &reprs.bos {
        tensors.push((format!("bos_representations.{layer}"), tensor.clone()));
    }
    let metadata = HashMap::from([("label".to_string(), reprs.label.clone())]);
    safetensors::serialize_to_file(tensors, &Some(metadata), &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Write the single selected representation as a raw `<label>.npy` array.
pub fn write_npy_array(output_dir: &Path, reprs: &SequenceRepresentations) -> Result<PathBuf> {
    let path = prepare_path(output_dir, &reprs.label, "npy")?;
    let tensor = reprs
        .single()
        .ok_or_else(|| anyhow!("no representation selected for {}", reprs.label))?;
    tensor
        .write_npy(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
