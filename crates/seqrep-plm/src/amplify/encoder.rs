use super::config::AmplifyConfig;
use super::rotary::apply_rotary_emb;
use candle_core::{Module, Result, Tensor, D};
use candle_nn::{linear_no_bias, ops::softmax_last_dim, rms_norm, Linear, RmsNorm, VarBuilder};

/// One pre-norm transformer block: rotary self-attention followed by a
/// SwiGLU feed-forward, both with residual connections.
#[derive(Debug)]
pub struct EncoderBlock {
    q: Linear,
    k: Linear,
    v: Linear,
    wo: Linear,
    w12: Linear,
    w3: Linear,
    attention_norm: RmsNorm,
    ffn_norm: RmsNorm,
    d_head: usize,
    n_heads: usize,
}

impl EncoderBlock {
    pub fn load(vb: VarBuilder, config: &AmplifyConfig, layer: usize) -> Result<Self> {
        // SwiGLU keeps the parameter count constant by shrinking the hidden
        // width to 2/3, rounded up to a multiple of 8
        // (https://arxiv.org/pdf/2002.05202.pdf)
        let multiple_of = 8;
        let intermediate_size = (config.intermediate_size * 2) / 3;
        let intermediate_size = intermediate_size.div_ceil(multiple_of) * multiple_of;
        let vb = vb.pp(layer);
        let q = linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("q"))?;
        let k = linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("k"))?;
        let v = linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("v"))?;
        let wo = linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("wo"))?;
        let w12 = linear_no_bias(config.hidden_size, intermediate_size * 2, vb.pp("ffn.w12"))?;
        let w3 = linear_no_bias(intermediate_size, config.hidden_size, vb.pp("ffn.w3"))?;
        let attention_norm =
            rms_norm(config.hidden_size, config.norm_eps, vb.pp("attention_norm"))?;
        let ffn_norm = rms_norm(config.hidden_size, config.norm_eps, vb.pp("ffn_norm"))?;

        Ok(Self {
            q,
            k,
            v,
            wo,
            w12,
            w3,
            attention_norm,
            ffn_norm,
            d_head: config.hidden_size / config.num_attention_heads,
            n_heads: config.num_attention_heads,
        })
    }

    /// `attn_mask` is an additive float mask of shape `(batch, 1, 1, seq_len)`
    /// with `-inf` at padded key positions.
    pub fn forward(
        &self,
        x: &Tensor,
        attn_mask: Option<&Tensor>,
        freqs_cis: &Tensor,
    ) -> Result<Tensor> {
        let normed = self.attention_norm.forward(x)?;
        let attn = self.attention_block(&normed, attn_mask, freqs_cis)?;
        let x = x.add(&attn)?;
        let normed = self.ffn_norm.forward(&x)?;
        let ff = self.ffn_block(&normed)?;
        x.add(&ff)
    }

    fn attention_block(
        &self,
        x: &Tensor,
        attn_mask: Option<&Tensor>,
        freqs_cis: &Tensor,
    ) -> Result<Tensor> {
        let (batch_size, seq_len, _) = x.dims3()?;
        let shape = (batch_size, seq_len, self.n_heads, self.d_head);
        let xq = self.q.forward(x)?.reshape(shape)?;
        let xk = self.k.forward(x)?.reshape(shape)?;
        let xv = self.v.forward(x)?.reshape(shape)?;
        let (xq, xk) = apply_rotary_emb(&xq, &xk, freqs_cis)?;

        // (batch, heads, seq, d_head)
        let xq = xq.permute((0, 2, 1, 3))?.contiguous()?;
        let xk = xk.permute((0, 2, 1, 3))?.contiguous()?;
        let xv = xv.permute((0, 2, 1, 3))?.contiguous()?;

        let scaling = 1.0 / (self.d_head as f64).sqrt();
        let mut scores = (xq.matmul(&xk.transpose(D::Minus2, D::Minus1)?)? * scaling)?;
        if let Some(mask) = attn_mask {
            scores = scores.broadcast_add(mask)?;
        }
        let probs = softmax_last_dim(&scores)?;
        let attn = probs.matmul(&xv)?;

        let attn = attn.permute((0, 2, 1, 3))?.contiguous()?.reshape((
            batch_size,
            seq_len,
            self.n_heads * self.d_head,
        ))?;
        self.wo.forward(&attn)
    }

    // SwiGLU: the packed w12 projection is split in two, silu(x1) * x2
    fn ffn_block(&self, x: &Tensor) -> Result<Tensor> {
        let w12_out = self.w12.forward(x)?;
        let chunks = w12_out.chunk(2, D::Minus1)?;
        let hidden = chunks[0].silu()?.mul(&chunks[1])?;
        self.w3.forward(&hidden)
    }
}
