use candle_nn::Activation;
use serde::Deserialize;

/// Model hyperparameters, deserializable from a checkpoint's `config.json`.
///
/// Missing fields fall back to the 350M configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmplifyConfig {
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub dropout_prob: f64,
    pub norm_eps: f64,
    pub hidden_act: Activation,
    pub layer_norm_before_last_layer: bool,
    pub vocab_size: usize,
    pub pad_token_id: usize,
    pub max_length: usize,
}

impl Default for AmplifyConfig {
    fn default() -> Self {
        Self::amp_350m()
    }
}

impl AmplifyConfig {
    pub fn amp_120m() -> Self {
        Self {
            hidden_size: 640,
            num_hidden_layers: 24,
            num_attention_heads: 10,
            intermediate_size: 2560,
            dropout_prob: 0.0,
            norm_eps: 1e-5,
            hidden_act: Activation::Swiglu,
            layer_norm_before_last_layer: true,
            vocab_size: 27,
            pad_token_id: 0,
            max_length: 2048,
        }
    }

    pub fn amp_350m() -> Self {
        Self {
            hidden_size: 960,
            num_hidden_layers: 32,
            num_attention_heads: 15,
            intermediate_size: 3840,
            dropout_prob: 0.0,
            norm_eps: 1e-5,
            hidden_act: Activation::Swiglu,
            layer_norm_before_last_layer: true,
            vocab_size: 27,
            pad_token_id: 0,
            max_length: 2048,
        }
    }
}
