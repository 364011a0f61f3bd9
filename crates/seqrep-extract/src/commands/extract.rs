//! The extraction driver: load the model once, then per FASTA file batch,
//! infer, slice, and write.
use crate::cli::Cli;
use crate::dataset::FastaDataset;
use crate::layers::normalize_repr_layers;
use crate::represent::extract_sequence;
use crate::writer;
use anyhow::{bail, Context, Result};
use candle_core::Device;
use seqrep_plm::{device, load_model_and_tokenizer, Amplify, ProteinTokenizer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// every sequence is wrapped in BOS and EOS
const EXTRA_TOKS_PER_SEQ: usize = 2;

pub fn run(cli: &Cli) -> Result<()> {
    cli.validate()?;
    let device = device(cli.nogpu)?;
    let (model, tokenizer, _config) = load_model_and_tokenizer(&cli.model_location, &device)?;
    if !matches!(device, Device::Cpu) {
        println!("Transferred model to GPU");
    }
    let repr_layers = normalize_repr_layers(&cli.repr_layers, model.num_layers())?;

    for path in collect_fasta_files(&cli.fasta_path)? {
        extract_file(cli, &model, &tokenizer, &repr_layers, &device, &path)?;
    }
    Ok(())
}

fn collect_fasta_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|ext| ext.to_str()),
                Some("fa") | Some("fasta")
            )
        })
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no .fa or .fasta files found in {}", path.display());
    }
    Ok(files)
}

fn extract_file(
    cli: &Cli,
    model: &Amplify,
    tokenizer: &ProteinTokenizer,
    repr_layers: &[usize],
    device: &Device,
    path: &Path,
) -> Result<()> {
    let dataset = FastaDataset::from_file(path)?;
    println!("Read {} with {} sequences", path.display(), dataset.len());
    let batches = dataset.get_batch_indices(cli.toks_per_batch, EXTRA_TOKS_PER_SEQ);
    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {}", cli.output_dir.display()))?;
    let kinds = cli.kinds();

    for (batch_idx, batch) in batches.iter().enumerate() {
        println!(
            "Processing {} of {} batches ({} sequences)",
            batch_idx + 1,
            batches.len(),
            batch.len()
        );
        let seqs: Vec<&str> = batch
            .iter()
            .map(|&i| dataset.sequences()[i].as_str())
            .collect();
        let (tokens, pad_mask) = tokenizer.encode_batch(&seqs, device)?;
        let output = model.forward(&tokens, pad_mask.as_ref(), true)?;
        let Some(hidden_states) = output.hidden_states else {
            bail!("model returned no hidden states");
        };

        // move only the requested layers back to the host; the rest of the
        // batch output is dropped here
        let mut layer_representations: BTreeMap<usize, candle_core::Tensor> = BTreeMap::new();
        for &layer in repr_layers {
            layer_representations.insert(layer, hidden_states[layer].to_device(&Device::Cpu)?);
        }

        for (i, &seq_idx) in batch.iter().enumerate() {
            let label = &dataset.labels()[seq_idx];
            let residue_count = dataset.sequences()[seq_idx].chars().count();
            let reprs =
                extract_sequence(label, i, residue_count, &layer_representations, &kinds)?;
            if cli.npy_array() {
                writer::write_npy_array(&cli.output_dir, &reprs)?;
            } else {
                writer::write_bundle(&cli.output_dir, &reprs)?;
            }
        }
    }
    Ok(())
}
