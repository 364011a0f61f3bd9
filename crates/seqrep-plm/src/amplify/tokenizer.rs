//! Residue-level tokenization for AMPLIFY checkpoints.
//!
//! Wraps a `tokenizers::Tokenizer` loaded from the checkpoint's
//! `tokenizer.json`, resolving the special-token ids up front. Sequences are
//! encoded one residue per token, wrapped in `<bos>` / `<eos>`.
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use std::path::Path;
use tokenizers::Tokenizer;

pub struct ProteinTokenizer {
    tokenizer: Tokenizer,
    pad_token_id: u32,
    bos_token_id: u32,
    eos_token_id: u32,
    unk_token_id: u32,
}

impl ProteinTokenizer {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let tokenizer =
            Tokenizer::from_file(path).map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        Self::new(tokenizer)
    }

    pub fn new(tokenizer: Tokenizer) -> Result<Self> {
        let special = |token: &str| {
            tokenizer
                .token_to_id(token)
                .ok_or_else(|| anyhow!("tokenizer vocabulary is missing {}", token))
        };
        let pad_token_id = special("<pad>")?;
        let bos_token_id = special("<bos>")?;
        let eos_token_id = special("<eos>")?;
        let unk_token_id = special("<unk>")?;
        Ok(Self {
            tokenizer,
            pad_token_id,
            bos_token_id,
            eos_token_id,
            unk_token_id,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    /// Token ids for one sequence: `<bos>`, one id per residue, `<eos>`.
    /// Unknown residues map to `<unk>`.
    pub fn encode(&self, sequence: &str) -> Vec<u32> {
        let mut ids = Vec::with_capacity(sequence.len() + 2);
        ids.push(self.bos_token_id);
        let mut buf = [0u8; 4];
        for residue in sequence.chars() {
            let token = residue.encode_utf8(&mut buf);
            ids.push(self.tokenizer.token_to_id(token).unwrap_or(self.unk_token_id));
        }
        ids.push(self.eos_token_id);
        ids
    }

    /// Encode a batch of sequences, padded to the longest member.
    ///
    /// Returns the `(batch, max_len)` token tensor and, when any padding was
    /// added, an additive float mask with `-inf` at padded positions.
    pub fn encode_batch(
        &self,
        sequences: &[&str],
        device: &Device,
    ) -> Result<(Tensor, Option<Tensor>)> {
        let encoded: Vec<Vec<u32>> = sequences.iter().map(|s| self.encode(s)).collect();
        let max_len = encoded.iter().map(|ids| ids.len()).max().unwrap_or(0);
        let needs_mask = encoded.iter().any(|ids| ids.len() < max_len);

        let mut tokens = Vec::with_capacity(encoded.len() * max_len);
        let mut mask = Vec::with_capacity(encoded.len() * max_len);
        for ids in &encoded {
            tokens.extend_from_slice(ids);
            tokens.extend(std::iter::repeat(self.pad_token_id).take(max_len - ids.len()));
            mask.extend(std::iter::repeat(0f32).take(ids.len()));
            mask.extend(std::iter::repeat(f32::NEG_INFINITY).take(max_len - ids.len()));
        }

        let tokens = Tensor::from_vec(tokens, (encoded.len(), max_len), device)?;
        let mask = if needs_mask {
            Some(Tensor::from_vec(mask, (encoded.len(), max_len), device)?)
        } else {
            None
        };
        Ok((tokens, mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;

    fn test_tokenizer() -> ProteinTokenizer {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        for (i, token) in ["<unk>", "<pad>", "<mask>", "<bos>", "<eos>"]
            .iter()
            .enumerate()
        {
            vocab.insert(token.to_string(), i as u32);
        }
        for (i, residue) in "LAGVSERTIDPKQNFYMHWC".chars().enumerate() {
            vocab.insert(residue.to_string(), 5 + i as u32);
        }
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("<unk>".to_string())
            .build()
            .unwrap();
        ProteinTokenizer::new(Tokenizer::new(model)).unwrap()
    }

    #[test]
    fn test_encode_wraps_with_special_tokens() {
        let tokenizer = test_tokenizer();
        let ids = tokenizer.encode("MKV");
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], 3); // <bos>
        assert_eq!(*ids.last().unwrap(), 4); // <eos>
    }

    #[test]
    fn test_unknown_residue_maps_to_unk() {
        let tokenizer = test_tokenizer();
        let ids = tokenizer.encode("MXK");
        assert_eq!(ids[2], 0); // <unk>
    }

    #[test]
    fn test_encode_batch_pads_to_longest() -> Result<()> {
        let tokenizer = test_tokenizer();
        let (tokens, mask) = tokenizer.encode_batch(&["MK", "MKVL"], &Device::Cpu)?;
        assert_eq!(tokens.dims(), &[2, 6]);
        let rows = tokens.to_vec2::<u32>()?;
        assert_eq!(rows[0][4], tokenizer.pad_token_id());
        assert_eq!(rows[0][5], tokenizer.pad_token_id());

        let mask = mask.expect("shorter sequence requires padding");
        let mask = mask.to_vec2::<f32>()?;
        assert_eq!(mask[0][0], 0.0);
        assert!(mask[0][4].is_infinite());
        assert_eq!(mask[1][5], 0.0);
        Ok(())
    }

    #[test]
    fn test_encode_batch_equal_lengths_has_no_mask() -> Result<()> {
        let tokenizer = test_tokenizer();
        let (tokens, mask) = tokenizer.encode_batch(&["MK", "VL"], &Device::Cpu)?;
        assert_eq!(tokens.dims(), &[2, 4]);
        assert!(mask.is_none());
        Ok(())
    }
}
