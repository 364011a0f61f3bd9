//! Layer-index validation and canonicalization.
use anyhow::{bail, Result};

/// Map user-supplied layer indices onto canonical indices in `[0, L]`.
///
/// Valid input is `[-(L + 1), L]`: non-negative indices address the embedding
/// output (0) through the last transformer layer (L) directly, negative ones
/// count back from the end (-1 is the last layer). Out-of-range input is an
/// error; duplicates after normalization are preserved.
pub fn normalize_repr_layers(repr_layers: &[i64], num_layers: usize) -> Result<Vec<usize>> {
    let bound = num_layers as i64;
    for &layer in repr_layers {
        if layer < -(bound + 1) || layer > bound {
            bail!(
                "layer index {} out of range for a {}-layer model (valid range: {} to {})",
                layer,
                num_layers,
                -(bound + 1),
                bound
            );
        }
    }
    Ok(repr_layers
        .iter()
        .map(|&layer| ((layer + bound + 1) % (bound + 1)) as usize)
        .collect())
}
