use crate::commands;
use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which representations to write for each sequence.
///
/// `npy_array` switches the output format from a safetensors bundle to a
/// single raw `.npy` array and must be combined with exactly one other kind
/// and exactly one layer.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum Include {
    PerTok,
    Mean,
    Bos,
    NpyArray,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Extract per-residue protein language model representations from FASTA files",
    long_about = None,
    rename_all = "snake_case"
)]
pub struct Cli {
    /// Checkpoint shorthand (120M, 350M), HF Hub repo id, or local checkpoint directory
    pub model_location: String,

    /// FASTA file, or a folder of .fa/.fasta files
    pub fasta_path: PathBuf,

    /// Output directory for extracted representations
    pub output_dir: PathBuf,

    /// Maximum number of tokens per inference batch
    #[arg(long, default_value_t = 4096)]
    pub toks_per_batch: usize,

    /// Layer indices to extract; negative values count back from the last layer
    #[arg(long, num_args = 1.., allow_negative_numbers = true, default_values_t = [-1_i64])]
    pub repr_layers: Vec<i64>,

    /// Which representations to write
    #[arg(long, required = true, num_args = 1.., value_enum)]
    pub include: Vec<Include>,

    /// Do not use an accelerator even if one is available
    #[arg(long)]
    pub nogpu: bool,
}

impl Cli {
    /// The representation kinds to compute, excluding the format selector.
    pub fn kinds(&self) -> Vec<Include> {
        self.include
            .iter()
            .copied()
            .filter(|kind| *kind != Include::NpyArray)
            .collect()
    }

    pub fn npy_array(&self) -> bool {
        self.include.contains(&Include::NpyArray)
    }

    /// Raw-array mode holds a single array per sequence, so it admits exactly
    /// one kind and one layer. Anything else would silently discard data.
    pub fn validate(&self) -> Result<()> {
        if self.npy_array() {
            if self.kinds().len() != 1 {
                bail!("--include npy_array requires exactly one of per_tok, mean or bos");
            }
            if self.repr_layers.len() != 1 {
                bail!("--include npy_array requires exactly one --repr_layers value");
            }
        }
        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        commands::extract::run(self)
    }
}
