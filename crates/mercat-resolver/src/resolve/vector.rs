use crate::{ResolverError, ResolverResult};

/// Cosine similarity between two vectors: dot(u, v) / (‖u‖·‖v‖).
///
/// Returns 0.0 for empty, zero-magnitude, or dimension-mismatched inputs
/// rather than failing; all stored embeddings come from one model so a
/// mismatch indicates stale data, not a caller bug.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut magnitude_a = 0.0f64;
    let mut magnitude_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        magnitude_a += x * x;
        magnitude_b += y * y;
    }

    let magnitude_a = magnitude_a.sqrt();
    let magnitude_b = magnitude_b.sqrt();
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot / (magnitude_a * magnitude_b)
}

/// Encode an embedding as a little-endian f32 byte blob for storage.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a stored embedding blob back into f32 values.
pub fn decode_embedding(bytes: &[u8]) -> ResolverResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(ResolverError::InvalidArgument(format!(
            "Embedding blob length {} is not a multiple of 4.",
            bytes.len()
        )));
    }

    let mut vector = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(vector)
}
