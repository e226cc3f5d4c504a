use crate::config::Number;
use crate::error::{RagError, Result};
use wide::f32x8;

fn lanes(chunk: &[Number]) -> f32x8 {
    let mut buf = [0.0; 8];
    buf.copy_from_slice(chunk);
    f32x8::new(buf)
}

/// Dot product of two equal-length vectors using SIMD lanes of eight.
pub fn dot_simd(a: &[Number], b: &[Number]) -> Number {
    debug_assert_eq!(a.len(), b.len());

    let mut acc = f32x8::splat(0.0);
    let simd_len = a.len() - (a.len() % 8);

    for (ca, cb) in a[..simd_len]
        .chunks_exact(8)
        .zip(b[..simd_len].chunks_exact(8))
    {
        acc += lanes(ca) * lanes(cb);
    }

    let mut dot = acc.reduce_add();
    for i in simd_len..a.len() {
        dot += a[i] * b[i];
    }
    dot
}

pub fn magnitude(vector: &[Number]) -> Number {
    dot_simd(vector, vector).sqrt()
}

/// Cosine similarity clamped to [-1, 1].
///
/// Unlike a plain dot product this does not assume pre-normalized input. A
/// zero-magnitude operand has no direction, so it is an error rather than NaN.
pub fn cosine_similarity(a: &[Number], b: &[Number]) -> Result<Number> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (mag_a, mag_b) = (magnitude(a), magnitude(b));
    if is_degenerate(mag_a) || is_degenerate(mag_b) {
        return Err(RagError::DegenerateVector);
    }

    Ok(similarity_from_parts(dot_simd(a, b), mag_a, mag_b))
}

/// True when a magnitude gives no direction: zero, NaN or infinite.
///
/// Tiny but non-zero vectors still have a direction and score normally.
pub fn is_degenerate(magnitude: Number) -> bool {
    !(magnitude > 0.0 && magnitude.is_finite())
}

/// Score for a precomputed dot product and two non-degenerate magnitudes.
///
/// Divides by each magnitude in a fixed order instead of by their product,
/// so small norms do not underflow and the result is symmetric.
pub(crate) fn similarity_from_parts(dot: Number, mag_a: Number, mag_b: Number) -> Number {
    let (larger, smaller) = if mag_a >= mag_b {
        (mag_a, mag_b)
    } else {
        (mag_b, mag_a)
    };
    (dot / larger / smaller).clamp(-1.0, 1.0)
}

pub fn normalize_vector(vector: &mut [Number]) {
    let magnitude = magnitude(vector);
    if !is_degenerate(magnitude) {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}
