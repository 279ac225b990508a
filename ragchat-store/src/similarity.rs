//! Vector helpers shared by the passage and cache tables

use anyhow::{Result, bail};
use half::f16;

/// Cosine similarity of two f16 vectors, accumulated in f32.
///
/// Returns `None` when the dimensions differ, and `Some(0.0)` when either
/// vector has zero norm.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        let x = x.to_f32();
        let y = y.to_f32();
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        Some(0.0)
    } else {
        Some(dot_product / (norm_a * norm_b))
    }
}

/// Raw native-endian bytes for the BLOB column
pub fn encode_embedding(embedding: &[f16]) -> &[u8] {
    bytemuck::cast_slice::<f16, u8>(embedding)
}

/// Inverse of [`encode_embedding`]. Copies, since BLOB buffers carry no
/// alignment guarantee.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f16>> {
    if bytes.len() % std::mem::size_of::<f16>() != 0 {
        bail!("embedding blob has odd length {}", bytes.len());
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| f16::from_ne_bytes([pair[0], pair[1]]))
        .collect())
}
