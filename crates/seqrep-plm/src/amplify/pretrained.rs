//! Checkpoint resolution and loading.
//!
//! A model location is either a shorthand (`120M`, `350M`), a Hugging Face
//! Hub repository id, or a local directory holding `config.json`,
//! `tokenizer.json` and `model.safetensors`.
use super::amplify::Amplify;
use super::config::AmplifyConfig;
use super::tokenizer::ProteinTokenizer;
use anyhow::{Context, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};

pub const DTYPE: DType = DType::F32;

/// The published AMPLIFY checkpoints.
pub enum AmplifyModels {
    Amp120m,
    Amp350m,
}

impl AmplifyModels {
    pub fn from_shorthand(name: &str) -> Option<Self> {
        match name {
            "120M" => Some(Self::Amp120m),
            "350M" => Some(Self::Amp350m),
            _ => None,
        }
    }

    pub fn repo_id(&self) -> (&'static str, &'static str) {
        match self {
            Self::Amp120m => ("chandar-lab/AMPLIFY_120M", "main"),
            Self::Amp350m => ("chandar-lab/AMPLIFY_350M", "main"),
        }
    }
}

/// Resolved on-disk paths for one checkpoint.
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Fetch a checkpoint from the Hub, reusing the local cache.
    pub fn from_hub(model_id: &str, revision: &str) -> Result<Self> {
        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
        let api = Api::new()?;
        let api = api.repo(repo);
        Ok(Self {
            config: api.get("config.json")?,
            tokenizer: api.get("tokenizer.json")?,
            weights: api.get("model.safetensors")?,
        })
    }

    /// Use a checkpoint directory on the local filesystem.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let files = Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.is_file() {
                anyhow::bail!(
                    "checkpoint directory {} is missing {}",
                    dir.display(),
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
            }
        }
        Ok(files)
    }

    pub fn resolve(model_location: &str) -> Result<Self> {
        if Path::new(model_location).is_dir() {
            Self::from_dir(model_location)
        } else if let Some(model) = AmplifyModels::from_shorthand(model_location) {
            let (model_id, revision) = model.repo_id();
            Self::from_hub(model_id, revision)
        } else {
            Self::from_hub(model_location, "main")
        }
    }
}

/// Load a model and its tokenizer from a shorthand, Hub repo id, or local
/// checkpoint directory.
pub fn load_model_and_tokenizer(
    model_location: &str,
    device: &Device,
) -> Result<(Amplify, ProteinTokenizer, AmplifyConfig)> {
    let files = ModelFiles::resolve(model_location)
        .with_context(|| format!("failed to resolve model location {model_location}"))?;

    let config_str = std::fs::read_to_string(&files.config)
        .with_context(|| format!("failed to read {}", files.config.display()))?;
    // upstream configs spell the activation a few different ways
    let config_str = config_str
        .replace("SwiGLU", "swiglu")
        .replace("Swiglu", "swiglu");
    let config: AmplifyConfig = serde_json::from_str(&config_str)?;

    let tokenizer = ProteinTokenizer::from_file(&files.tokenizer)?;
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&files.weights], DTYPE, device)? };
    let model = Amplify::load(vb, &config)?;
    Ok((model, tokenizer, config))
}
