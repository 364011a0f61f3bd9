//! FASTA parsing and token-budgeted batching.
use anyhow::{Context, Result};
use std::path::Path;

/// Sequence records read from one FASTA file, in file order.
pub struct FastaDataset {
    labels: Vec<String>,
    sequences: Vec<String>,
}

impl FastaDataset {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read FASTA file {}", path.display()))?;
        Ok(Self::parse(&contents))
    }

    /// Header lines start with `>`; the label is the first whitespace-delimited
    /// word, or a generated `seqnum` name for empty headers. Sequence lines
    /// are concatenated. Residue lines before the first header are dropped.
    pub fn parse(contents: &str) -> Self {
        let mut labels = Vec::new();
        let mut sequences = Vec::new();
        let mut cur_label: Option<String> = None;
        let mut buf = String::new();

        for (line_idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if let Some(header) = line.strip_prefix('>') {
                if let Some(label) = cur_label.take() {
                    labels.push(label);
                    sequences.push(std::mem::take(&mut buf));
                }
                buf.clear();
                cur_label = Some(match header.split_whitespace().next() {
                    Some(name) => name.to_string(),
                    None => format!("seqnum{:09}", line_idx),
                });
            } else if !line.is_empty() {
                buf.push_str(line);
            }
        }
        if let Some(label) = cur_label {
            labels.push(label);
            sequences.push(buf);
        }

        Self { labels, sequences }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn sequences(&self) -> &[String] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Group sequence indices into batches whose padded token count stays
    /// within `toks_per_batch`.
    ///
    /// Indices are sorted by sequence length and packed greedily; a batch
    /// costs `max_len * count` tokens since shorter members are padded. A
    /// sequence is never split, so one longer than the whole budget still
    /// forms a singleton batch.
    pub fn get_batch_indices(
        &self,
        toks_per_batch: usize,
        extra_toks_per_seq: usize,
    ) -> Vec<Vec<usize>> {
        let mut sizes: Vec<(usize, usize)> = self
            .sequences
            .iter()
            .enumerate()
            .map(|(i, s)| (s.chars().count() + extra_toks_per_seq, i))
            .collect();
        sizes.sort();

        let mut batches = Vec::new();
        let mut buf: Vec<usize> = Vec::new();
        let mut max_len = 0usize;
        for &(size, index) in &sizes {
            if size.max(max_len) * (buf.len() + 1) > toks_per_batch && !buf.is_empty() {
                batches.push(std::mem::take(&mut buf));
                max_len = 0;
            }
            max_len = max_len.max(size);
            buf.push(index);
        }
        if !buf.is_empty() {
            batches.push(buf);
        }
        batches
    }
}
