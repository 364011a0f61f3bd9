use candle_core::{Device, Result, Tensor, D};

/// Precompute the rotary position table as interleaved (cos, sin) pairs,
/// shape `(seq_len, head_dim / 2, 2)`.
pub fn precompute_freqs_cis(head_dim: usize, seq_len: usize) -> Result<Tensor> {
    let theta: f32 = 10000.0;
    let freqs = (0..head_dim / 2).map(|i| 1.0 / theta.powf((2 * i) as f32 / head_dim as f32));
    let freqs = Tensor::from_iter(freqs, &Device::Cpu)?;
    let t = Tensor::from_iter((0..seq_len).map(|x| x as f32), &Device::Cpu)?;
    // outer product: (seq_len, head_dim / 2)
    let freqs = t.unsqueeze(1)?.matmul(&freqs.unsqueeze(0)?)?;
    Tensor::stack(&[freqs.cos()?, freqs.sin()?], D::Minus1)
}

/// Rotate query and key tensors of shape `(batch, seq_len, heads, head_dim)`.
///
/// `freqs_cis` must already be narrowed to the current sequence length.
pub fn apply_rotary_emb(xq: &Tensor, xk: &Tensor, freqs_cis: &Tensor) -> Result<(Tensor, Tensor)> {
    let (b_sz, seq_len, n_heads, head_dim) = xq.dims4()?;
    let half = head_dim / 2;

    // (seq_len, half, 2) -> (1, seq_len, 1, half) cos/sin tables
    let freqs = freqs_cis
        .narrow(0, 0, seq_len)?
        .reshape((seq_len, half, 2))?
        .unsqueeze(0)?
        .unsqueeze(2)?;
    let cos = freqs.narrow(D::Minus1, 0, 1)?.squeeze(D::Minus1)?;
    let sin = freqs.narrow(D::Minus1, 1, 1)?.squeeze(D::Minus1)?;

    let rotate = |x: &Tensor| -> Result<Tensor> {
        // view the last dim as (half, 2) complex pairs
        let x = x.reshape((b_sz, seq_len, n_heads, half, 2))?;
        let x_re = x.narrow(D::Minus1, 0, 1)?.squeeze(D::Minus1)?;
        let x_im = x.narrow(D::Minus1, 1, 1)?.squeeze(D::Minus1)?;
        let out_re = x_re
            .broadcast_mul(&cos)?
            .sub(&x_im.broadcast_mul(&sin)?)?;
        let out_im = x_re
            .broadcast_mul(&sin)?
            .add(&x_im.broadcast_mul(&cos)?)?;
        Tensor::stack(&[out_re, out_im], D::Minus1)?.reshape((b_sz, seq_len, n_heads, head_dim))
    };

    Ok((rotate(xq)?, rotate(xk)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freqs_cis_shape() -> Result<()> {
        let freqs = precompute_freqs_cis(8, 32)?;
        assert_eq!(freqs.dims(), &[32, 4, 2]);
        Ok(())
    }

    #[test]
    fn test_rotation_at_position_zero_is_identity() -> Result<()> {
        // cos(0) = 1, sin(0) = 0 so position 0 must pass through unchanged
        let freqs = precompute_freqs_cis(8, 4)?;
        let xq = Tensor::randn(0f32, 1.0, (1, 1, 2, 8), &Device::Cpu)?;
        let xk = Tensor::randn(0f32, 1.0, (1, 1, 2, 8), &Device::Cpu)?;
        let (rq, _rk) = apply_rotary_emb(&xq, &xk, &freqs)?;
        let orig = xq.flatten_all()?.to_vec1::<f32>()?;
        let rotated = rq.flatten_all()?.to_vec1::<f32>()?;
        for (a, b) in orig.iter().zip(rotated.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_rotation_preserves_norm() -> Result<()> {
        let freqs = precompute_freqs_cis(8, 16)?;
        let xq = Tensor::randn(0f32, 1.0, (1, 16, 2, 8), &Device::Cpu)?;
        let xk = Tensor::randn(0f32, 1.0, (1, 16, 2, 8), &Device::Cpu)?;
        let (rq, _) = apply_rotary_emb(&xq, &xk, &freqs)?;
        let before = xq.sqr()?.sum_all()?.to_scalar::<f32>()?;
        let after = rq.sqr()?.sum_all()?.to_scalar::<f32>()?;
        assert!((before - after).abs() / before < 1e-4);
        Ok(())
    }
}
