//! End-to-end CLI tests against a small locally generated checkpoint.
use assert_cmd::Command;
use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::Tokenizer;

const HIDDEN: usize = 16;
const LAYERS: usize = 2;
const VOCAB: usize = 25;
// swiglu width for intermediate_size 24: (2 * 24 / 3) rounded to a multiple of 8
const FFN_HIDDEN: usize = 16;

fn write_tokenizer(path: &Path) {
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
    Tokenizer::new(model).save(path, false).unwrap();
}

fn write_weights(path: &Path) {
    let dev = Device::Cpu;
    let mut tensors: HashMap<String, Tensor> = HashMap::new();
    let mut randn = |name: &str, shape: Vec<usize>| {
        tensors.insert(
            name.to_string(),
            Tensor::randn(0f32, 0.02, shape, &dev).unwrap(),
        );
    };
    randn("encoder.weight", vec![VOCAB, HIDDEN]);
    for layer in 0..LAYERS {
        let pfx = format!("transformer_encoder.{layer}");
        for proj in ["q", "k", "v", "wo"] {
            randn(&format!("{pfx}.{proj}.weight"), vec![HIDDEN, HIDDEN]);
        }
        randn(&format!("{pfx}.ffn.w12.weight"), vec![FFN_HIDDEN * 2, HIDDEN]);
        randn(&format!("{pfx}.ffn.w3.weight"), vec![HIDDEN, FFN_HIDDEN]);
        randn(&format!("{pfx}.attention_norm.weight"), vec![HIDDEN]);
        randn(&format!("{pfx}.ffn_norm.weight"), vec![HIDDEN]);
    }
    randn("layer_norm_2.weight", vec![HIDDEN]);
    randn("decoder.weight", vec![VOCAB, HIDDEN]);
    randn("decoder.bias", vec![VOCAB]);
    candle_core::safetensors::save(&tensors, path).unwrap();
}

/// A checkpoint directory with a randomly initialized 2-layer model.
fn checkpoint_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{
            "hidden_size": 16,
            "num_hidden_layers": 2,
            "num_attention_heads": 2,
            "intermediate_size": 24,
            "dropout_prob": 0.0,
            "norm_eps": 1e-5,
            "hidden_act": "swiglu",
            "layer_norm_before_last_layer": true,
            "vocab_size": 25,
            "pad_token_id": 1,
            "max_length": 64
        }"#,
    )
    .unwrap();
    write_tokenizer(&dir.path().join("tokenizer.json"));
    write_weights(&dir.path().join("model.safetensors"));
    dir
}

fn write_fasta(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn extract_cmd(model_dir: &Path, fasta: &Path, out_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("seqrep-extract").unwrap();
    cmd.arg(model_dir)
        .arg(fasta)
        .arg(out_dir)
        .arg("--nogpu");
    cmd
}

#[test]
fn test_per_tok_lengths_match_residue_counts() {
    let model = checkpoint_dir();
    let work = tempfile::tempdir().unwrap();
    let fasta = write_fasta(work.path(), "seqs.fa", ">seq1\nMK\n>seq2\nMKV\n");
    let out = work.path().join("out");

    extract_cmd(model.path(), &fasta, &out)
        .args(["--include", "per_tok", "--repr_layers", "0", "1", "2"])
        .assert()
        .success();

    let expectations = [("seq1", 2usize), ("seq2", 3usize)];
    for (label, residues) in expectations {
        let path = out.join(format!("{label}.safetensors"));
        let loaded = candle_core::safetensors::load(&path, &Device::Cpu).unwrap();
        assert_eq!(loaded.len(), 3);
        for layer in 0..=2 {
            let tensor = &loaded[&format!("representations.{layer}")];
            assert_eq!(tensor.dims(), &[residues, HIDDEN]);
        }
    }
}

#[test]
fn test_mean_and_bos_bundle_with_default_last_layer() {
    let model = checkpoint_dir();
    let work = tempfile::tempdir().unwrap();
    let fasta = write_fasta(work.path(), "seqs.fa", ">seq1\nMKVLAG\n");
    let out = work.path().join("out");

    extract_cmd(model.path(), &fasta, &out)
        .args(["--include", "mean", "bos"])
        .assert()
        .success();

    let path = out.join("seq1.safetensors");
    let loaded = candle_core::safetensors::load(&path, &Device::Cpu).unwrap();
    // default --repr_layers -1 resolves to the last layer
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[&format!("mean_representations.{LAYERS}")].dims(), &[HIDDEN]);
    assert_eq!(loaded[&format!("bos_representations.{LAYERS}")].dims(), &[HIDDEN]);

    let bytes = fs::read(&path).unwrap();
    let (_, header) = safetensors_metadata(&bytes);
    assert_eq!(header["label"], "seq1");
}

fn safetensors_metadata(bytes: &[u8]) -> (usize, HashMap<String, String>) {
    let (n, metadata) = safetensors::SafeTensors::read_metadata(bytes).unwrap();
    (n, metadata.metadata().clone().unwrap_or_default())
}

#[test]
fn test_npy_array_mode_writes_raw_array() {
    let model = checkpoint_dir();
    let work = tempfile::tempdir().unwrap();
    let fasta = write_fasta(work.path(), "seqs.fa", ">seq2\nMKV\n");
    let out = work.path().join("out");

    extract_cmd(model.path(), &fasta, &out)
        .args(["--include", "per_tok", "npy_array", "--repr_layers", "1"])
        .assert()
        .success();

    let loaded = Tensor::read_npy(out.join("seq2.npy")).unwrap();
    assert_eq!(loaded.dims(), &[3, HIDDEN]);
}

#[test]
fn test_npy_array_rejects_multiple_kinds() {
    let model = checkpoint_dir();
    let work = tempfile::tempdir().unwrap();
    let fasta = write_fasta(work.path(), "seqs.fa", ">seq1\nMK\n");
    let out = work.path().join("out");

    extract_cmd(model.path(), &fasta, &out)
        .args(["--include", "per_tok", "mean", "npy_array", "--repr_layers", "1"])
        .assert()
        .failure();
}

#[test]
fn test_out_of_range_layer_aborts_before_any_output() {
    let model = checkpoint_dir();
    let work = tempfile::tempdir().unwrap();
    let fasta = write_fasta(work.path(), "seqs.fa", ">seq1\nMK\n");
    let out = work.path().join("out");

    extract_cmd(model.path(), &fasta, &out)
        .args(["--include", "per_tok", "--repr_layers", "7"])
        .assert()
        .failure();

    assert!(!out.join("seq1.safetensors").exists());
}

#[test]
fn test_folder_input_processes_every_fasta_file() {
    let model = checkpoint_dir();
    let work = tempfile::tempdir().unwrap();
    let fasta_dir = work.path().join("fastas");
    fs::create_dir_all(&fasta_dir).unwrap();
    write_fasta(&fasta_dir, "a.fa", ">a1\nMKV\n");
    write_fasta(&fasta_dir, "b.fasta", ">b1\nLAGV\n");
    write_fasta(&fasta_dir, "notes.txt", "ignored");
    let out = work.path().join("out");

    extract_cmd(model.path(), &fasta_dir, &out)
        .args(["--include", "mean"])
        .assert()
        .success();

    assert!(out.join("a1.safetensors").is_file());
    assert!(out.join("b1.safetensors").is_file());
}
