use super::config::AmplifyConfig;
use super::encoder::EncoderBlock;
use super::rotary::precompute_freqs_cis;
use candle_core::{Device, Module, Result, Tensor};
use candle_nn::{embedding, linear, rms_norm, Embedding, Linear, RmsNorm, VarBuilder};

/// The AMPLIFY encoder.
///
/// - [GH PythonModel](https://github.com/chandar-lab/AMPLIFY/blob/rc-0.1/src/amplify/model/amplify.py)
/// - [paper](https://www.biorxiv.org/content/10.1101/2024.09.23.614603v1)
#[derive(Debug)]
pub struct Amplify {
    encoder: Embedding,
    transformer_encoder: Vec<EncoderBlock>,
    layer_norm_2: RmsNorm,
    decoder: Linear,
    freqs_cis: Tensor,
    config: AmplifyConfig,
}

/// Forward-pass output: logits plus, when requested, the hidden states for
/// the embedding output (index 0) and every transformer layer (1..=L).
#[derive(Debug)]
pub struct ModelOutput {
    pub logits: Tensor,
    pub hidden_states: Option<Vec<Tensor>>,
}

impl Amplify {
    pub fn load(vb: VarBuilder, cfg: &AmplifyConfig) -> Result<Self> {
        let mut transformer_encoder = Vec::with_capacity(cfg.num_hidden_layers);
        for i in 0..cfg.num_hidden_layers {
            transformer_encoder.push(EncoderBlock::load(vb.pp("transformer_encoder"), cfg, i)?);
        }
        let encoder = embedding(cfg.vocab_size, cfg.hidden_size, vb.pp("encoder"))?;
        let layer_norm_2 = rms_norm(cfg.hidden_size, cfg.norm_eps, vb.pp("layer_norm_2"))?;
        let decoder = linear(cfg.hidden_size, cfg.vocab_size, vb.pp("decoder"))?;
        let head_dim = cfg.hidden_size / cfg.num_attention_heads;
        let freqs_cis = precompute_freqs_cis(head_dim, cfg.max_length)?.to_device(vb.device())?;

        Ok(Self {
            encoder,
            transformer_encoder,
            layer_norm_2,
            decoder,
            freqs_cis,
            config: cfg.clone(),
        })
    }

    /// Run the model over a `(batch, seq_len)` tensor of token ids.
    ///
    /// `pad_mask` is an optional `(batch, seq_len)` additive float mask with
    /// `-inf` at padded positions and `0` elsewhere.
    pub fn forward(
        &self,
        src: &Tensor,
        pad_mask: Option<&Tensor>,
        output_hidden_states: bool,
    ) -> Result<ModelOutput> {
        // broadcast the pad mask over heads and query positions
        let attention_mask = match pad_mask {
            Some(mask) => Some(mask.unsqueeze(1)?.unsqueeze(1)?),
            None => None,
        };
        let freqs_cis = self.freqs_cis.narrow(0, 0, src.dim(1)?)?;

        let mut x = self.encoder.forward(src)?.contiguous()?;
        let mut hidden_states = vec![];
        if output_hidden_states {
            hidden_states.push(x.clone());
        }
        for layer in self.transformer_encoder.iter() {
            x = layer.forward(&x, attention_mask.as_ref(), &freqs_cis)?;
            if output_hidden_states {
                hidden_states.push(x.clone());
            }
        }

        let logits = if self.config.layer_norm_before_last_layer {
            self.decoder.forward(&self.layer_norm_2.forward(&x)?)?
        } else {
            self.decoder.forward(&x)?
        };

        Ok(ModelOutput {
            logits,
            hidden_states: output_hidden_states.then_some(hidden_states),
        })
    }

    /// Number of transformer layers (excluding the embedding output).
    pub fn num_layers(&self) -> usize {
        self.transformer_encoder.len()
    }

    pub fn config(&self) -> &AmplifyConfig {
        &self.config
    }

    pub fn get_device(&self) -> &Device {
        self.freqs_cis.device()
    }
}
