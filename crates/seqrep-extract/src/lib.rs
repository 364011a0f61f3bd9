//! seqrep-extract
//!
//! CLI to run a pretrained protein language model over FASTA files and write
//! per-sequence representations to disk: per-token, mean-pooled, and BOS
//! vectors for any set of layers, as safetensors bundles or raw `.npy`
//! arrays.
pub mod cli;
pub mod commands;
pub mod dataset;
pub mod layers;
pub mod represent;
pub mod writer;
