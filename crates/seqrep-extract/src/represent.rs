//! Per-sequence representation extraction from batched layer tensors.
use crate::cli::Include;
use anyhow::Result;
use candle_core::{IndexOp, Tensor};
use std::collections::BTreeMap;

/// The representations selected for one sequence, keyed by canonical layer
/// index. A fresh value is built per sequence; nothing is shared across
/// iterations.
pub struct SequenceRepresentations {
    pub label: String,
    pub per_tok: BTreeMap<usize, Tensor>,
    pub mean: BTreeMap<usize, Tensor>,
    pub bos: BTreeMap<usize, Tensor>,
}

impl SequenceRepresentations {
    /// The one tensor held in raw-array mode. CLI validation guarantees a
    /// single kind and a single layer before extraction runs.
    pub fn single(&self) -> Option<&Tensor> {
        self.per_tok
            .values()
            .chain(self.mean.values())
            .chain(self.bos.values())
            .next()
    }
}

/// Slice the requested representations for the sequence at `batch_index`.
///
/// Each layer tensor has shape `(batch, seq_len_with_special_tokens, hidden)`:
/// position 0 is the BOS token, positions `1..=residue_count` are the real
/// residues, and anything beyond is EOS or padding.
pub fn extract_sequence(
    label: &str,
    batch_index: usize,
    residue_count: usize,
    layer_representations: &BTreeMap<usize, Tensor>,
    kinds: &[Include],
) -> Result<SequenceRepresentations> {
    let mut out = SequenceRepresentations {
        label: label.to_string(),
        per_tok: BTreeMap::new(),
        mean: BTreeMap::new(),
        bos: BTreeMap::new(),
    };
    for (&layer, tensor) in layer_representations {
        let row = tensor.i(batch_index)?;
        let residues = row.narrow(0, 1, residue_count)?;
        if kinds.contains(&Include::PerTok) {
            out.per_tok.insert(layer, residues.contiguous()?);
        }
        if kinds.contains(&Include::Mean) {
            out.mean.insert(layer, residues.mean(0)?);
        }
        if kinds.contains(&Include::Bos) {
            out.bos.insert(layer, row.i(0)?.contiguous()?);
        }
    }
    Ok(out)
}
