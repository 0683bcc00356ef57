//! Quantized vector storage.
//!
//! Stored vectors keep one of three encodings: native f32, IEEE-754
//! binary16, or per-vector affine int8. The int8 map computes `min`/`max`
//! over the source vector, `scale = (max - min) / 255`, `offset = min`,
//! and encodes `q = round((x - offset) / scale) - 128` clamped to
//! `[-128, 127]`. Decoding is deterministic for every encoding.
//!
//! The wire format is base64. Non-float32 payloads prepend a 2-byte
//! little-endian length prefix and a JSON metadata blob
//! (`{"type", "scale", "offset"}`) before the raw bytes; float32 payloads
//! are the raw little-endian component bytes.

use crate::error::{Result, SearchError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use half::f16;
use serde::{Deserialize, Serialize};

/// Storage encoding of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    /// Native f32, 4 bytes per dimension. Lossless.
    Float32,
    /// IEEE-754 binary16, 2 bytes per dimension. Loss well under 0.1%.
    Float16,
    /// Affine per-vector int8, 1 byte per dimension plus scale/offset.
    Int8,
}

impl Quantization {
    fn tag(self) -> &'static str {
        match self {
            Quantization::Float32 => "float32",
            Quantization::Float16 => "float16",
            Quantization::Int8 => "int8",
        }
    }
}

/// Metadata blob embedded in non-float32 base64 payloads.
#[derive(Serialize, Deserialize)]
struct WireHeader {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offset: Option<f32>,
}

/// A vector held in one of the supported encodings.
///
/// `scale` and `offset` are meaningful only for [`Quantization::Int8`];
/// they are zero otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVector {
    quantization: Quantization,
    data: Vec<u8>,
    scale: f32,
    offset: f32,
}

impl StoredVector {
    /// Encodes an f32 vector into the requested storage encoding.
    pub fn encode(vector: &[f32], quantization: Quantization) -> Self {
        match quantization {
            Quantization::Float32 => {
                let mut data = Vec::with_capacity(vector.len() * 4);
                for &v in vector {
                    data.extend_from_slice(&v.to_le_bytes());
                }
                Self {
                    quantization,
                    data,
                    scale: 0.0,
                    offset: 0.0,
                }
            }
            Quantization::Float16 => {
                let mut data = Vec::with_capacity(vector.len() * 2);
                for &v in vector {
                    data.extend_from_slice(&f16::from_f32(v).to_le_bytes());
                }
                Self {
                    quantization,
                    data,
                    scale: 0.0,
                    offset: 0.0,
                }
            }
            Quantization::Int8 => {
                let mut min = f32::MAX;
                let mut max = f32::MIN;
                for &v in vector {
                    if v < min {
                        min = v;
                    }
                    if v > max {
                        max = v;
                    }
                }
                if vector.is_empty() {
                    min = 0.0;
                    max = 0.0;
                }
                let range = max - min;
                let (data, scale) = if range < f32::EPSILON {
                    (vec![0u8; vector.len()], 0.0)
                } else {
                    let scale = range / 255.0;
                    let data = vector
                        .iter()
                        .map(|&v| {
                            let q = ((v - min) / scale).round() - 128.0;
                            q.clamp(-128.0, 127.0) as i8 as u8
                        })
                        .collect();
                    (data, scale)
                };
                Self {
                    quantization,
                    data,
                    scale,
                    offset: min,
                }
            }
        }
    }

    /// Decodes back to a working f32 buffer. Lossy for f16/int8.
    pub fn decode(&self) -> Vec<f32> {
        match self.quantization {
            Quantization::Float32 => self
                .data
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            Quantization::Float16 => self
                .data
                .chunks_exact(2)
                .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
            Quantization::Int8 => self
                .data
                .iter()
                .map(|&b| (b as i8 as f32 + 128.0) * self.scale + self.offset)
                .collect(),
        }
    }

    /// Storage encoding of this vector.
    pub fn quantization(&self) -> Quantization {
        self.quantization
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        match self.quantization {
            Quantization::Float32 => self.data.len() / 4,
            Quantization::Float16 => self.data.len() / 2,
            Quantization::Int8 => self.data.len(),
        }
    }

    /// Inner product of two stored vectors.
    ///
    /// Both vectors must share an encoding. Float32 operates on the raw
    /// buffers; int8 uses scaled integer accumulation; everything else
    /// (including mixed encodings) decodes to f32 first.
    pub fn dot(&self, other: &Self) -> Result<f32> {
        if self.dim() != other.dim() {
            return Err(SearchError::DimensionMismatch {
                expected: self.dim(),
                got: other.dim(),
            });
        }
        debug_assert_eq!(self.quantization, other.quantization);
        if self.quantization != other.quantization {
            let a = self.decode();
            let b = other.decode();
            return Ok(crate::similarity::cosine(&a, &b));
        }
        match self.quantization {
            Quantization::Float32 => {
                let sum = self
                    .data
                    .chunks_exact(4)
                    .zip(other.data.chunks_exact(4))
                    .map(|(x, y)| {
                        f32::from_le_bytes([x[0], x[1], x[2], x[3]])
                            * f32::from_le_bytes([y[0], y[1], y[2], y[3]])
                    })
                    .sum();
                Ok(sum)
            }
            Quantization::Int8 => Ok(dot_int8(self, other)),
            Quantization::Float16 => {
                let a = self.decode();
                let b = other.decode();
                Ok(crate::similarity::cosine(&a, &b))
            }
        }
    }

    /// Serializes to the base64 wire form.
    pub fn to_base64(&self) -> String {
        match self.quantization {
            Quantization::Float32 => BASE64.encode(&self.data),
            Quantization::Float16 | Quantization::Int8 => {
                let header = WireHeader {
                    kind: self.quantization.tag().to_string(),
                    scale: (self.quantization == Quantization::Int8).then_some(self.scale),
                    offset: (self.quantization == Quantization::Int8).then_some(self.offset),
                };
                let header_bytes =
                    serde_json::to_vec(&header).expect("wire header serialization is infallible");
                let mut out = Vec::with_capacity(2 + header_bytes.len() + self.data.len());
                out.extend_from_slice(&(header_bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(&header_bytes);
                out.extend_from_slice(&self.data);
                BASE64.encode(&out)
            }
        }
    }

    /// Parses the base64 wire form produced by [`to_base64`](Self::to_base64).
    ///
    /// `quantization` selects the expected layout: float32 payloads are
    /// headerless, everything else carries the length-prefixed JSON
    /// header, which must agree with the expected encoding.
    pub fn from_base64(encoded: &str, quantization: Quantization) -> Result<Self> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| SearchError::Snapshot(format!("invalid base64 vector: {e}")))?;

        match quantization {
            Quantization::Float32 => {
                if raw.len() % 4 != 0 {
                    return Err(SearchError::Snapshot(format!(
                        "float32 payload length {} not divisible by 4",
                        raw.len()
                    )));
                }
                Ok(Self {
                    quantization,
                    data: raw,
                    scale: 0.0,
                    offset: 0.0,
                })
            }
            Quantization::Float16 | Quantization::Int8 => {
                if raw.len() < 2 {
                    return Err(SearchError::Snapshot(
                        "quantized payload missing header length".into(),
                    ));
                }
                let header_len = u16::from_le_bytes([raw[0], raw[1]]) as usize;
                if raw.len() < 2 + header_len {
                    return Err(SearchError::Snapshot(
                        "quantized payload truncated before header end".into(),
                    ));
                }
                let header: WireHeader = serde_json::from_slice(&raw[2..2 + header_len])
                    .map_err(|e| SearchError::Snapshot(format!("invalid vector header: {e}")))?;
                if header.kind != quantization.tag() {
                    return Err(SearchError::Snapshot(format!(
                        "vector header type '{}' does not match expected '{}'",
                        header.kind,
                        quantization.tag()
                    )));
                }
                let data = raw[2 + header_len..].to_vec();
                if quantization == Quantization::Float16 && data.len() % 2 != 0 {
                    return Err(SearchError::Snapshot(format!(
                        "float16 payload length {} not divisible by 2",
                        data.len()
                    )));
                }
                Ok(Self {
                    quantization,
                    data,
                    scale: header.scale.unwrap_or(0.0),
                    offset: header.offset.unwrap_or(0.0),
                })
            }
        }
    }
}

/// Int8 inner product via integer accumulation.
///
/// With `u = q + 128` the reconstruction is `x = u*scale + offset`, so
/// `dot = sa*sb*Σ(ua*ub) + sa*ob*Σua + sb*oa*Σub + n*oa*ob`; the three
/// sums stay integral and exact.
fn dot_int8(a: &StoredVector, b: &StoredVector) -> f32 {
    let mut sum_ab = 0i64;
    let mut sum_a = 0i64;
    let mut sum_b = 0i64;
    for (&xa, &xb) in a.data.iter().zip(b.data.iter()) {
        let ua = (xa as i8 as i32 + 128) as i64;
        let ub = (xb as i8 as i32 + 128) as i64;
        sum_ab += ua * ub;
        sum_a += ua;
        sum_b += ub;
    }
    let n = a.data.len() as f64;
    let (sa, oa) = (a.scale as f64, a.offset as f64);
    let (sb, ob) = (b.scale as f64, b.offset as f64);
    (sa * sb * sum_ab as f64 + sa * ob * sum_a as f64 + sb * oa * sum_b as f64 + n * oa * ob) as f32
}

/// Encodes a raw f32 slice as headerless base64 (little-endian bytes).
pub(crate) fn f32_slice_to_base64(vector: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    BASE64.encode(&bytes)
}

/// Decodes headerless base64 back to an f32 vector.
pub(crate) fn f32_slice_from_base64(encoded: &str) -> Result<Vec<f32>> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| SearchError::Snapshot(format!("invalid base64 vector: {e}")))?;
    if raw.len() % 4 != 0 {
        return Err(SearchError::Snapshot(format!(
            "vector payload length {} not divisible by 4",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine;

    fn unit(vector: Vec<f32>) -> Vec<f32> {
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.iter().map(|v| v / norm).collect()
    }

    fn sample_unit(dim: usize, seed: u64) -> Vec<f32> {
        // Deterministic pseudo-random components in [-1, 1)
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).max(1);
        let v: Vec<f32> = (0..dim)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 40) as f32 / (1u64 << 23) as f32 - 1.0
            })
            .collect();
        unit(v)
    }

    #[test]
    fn test_float32_roundtrip_exact() {
        let v = sample_unit(64, 3);
        let stored = StoredVector::encode(&v, Quantization::Float32);
        assert_eq!(stored.decode(), v);
        assert_eq!(stored.dim(), 64);
    }

    #[test]
    fn test_float16_roundtrip_cosine() {
        let v = sample_unit(128, 7);
        let stored = StoredVector::encode(&v, Quantization::Float16);
        let back = unit(stored.decode());
        assert!(cosine(&v, &back) >= 1.0 - 1e-3);
    }

    #[test]
    fn test_int8_roundtrip_cosine() {
        let v = sample_unit(128, 11);
        let stored = StoredVector::encode(&v, Quantization::Int8);
        let back = unit(stored.decode());
        assert!(cosine(&v, &back) >= 1.0 - 5e-2);
    }

    #[test]
    fn test_int8_constant_vector() {
        let v = vec![0.5; 16];
        let stored = StoredVector::encode(&v, Quantization::Int8);
        let back = stored.decode();
        for x in back {
            assert!((x - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_int8_dot_matches_decoded_dot() {
        let a = sample_unit(96, 5);
        let b = sample_unit(96, 17);
        let qa = StoredVector::encode(&a, Quantization::Int8);
        let qb = StoredVector::encode(&b, Quantization::Int8);
        let fast = qa.dot(&qb).unwrap();
        let slow = cosine(&qa.decode(), &qb.decode());
        assert!((fast - slow).abs() < 1e-4, "fast={fast} slow={slow}");
    }

    #[test]
    fn test_dot_dimension_mismatch() {
        let a = StoredVector::encode(&[1.0, 0.0], Quantization::Float32);
        let b = StoredVector::encode(&[1.0, 0.0, 0.0], Quantization::Float32);
        assert!(matches!(
            a.dot(&b),
            Err(SearchError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_base64_roundtrip_all_encodings() {
        let v = sample_unit(32, 23);
        for q in [Quantization::Float32, Quantization::Float16, Quantization::Int8] {
            let stored = StoredVector::encode(&v, q);
            let wire = stored.to_base64();
            let back = StoredVector::from_base64(&wire, q).unwrap();
            let a = unit(stored.decode());
            let b = unit(back.decode());
            assert!(cosine(&a, &b) > 0.9999, "{q:?} wire roundtrip drifted");
        }
    }

    #[test]
    fn test_base64_wrong_type_header_rejected() {
        let v = sample_unit(8, 29);
        let wire = StoredVector::encode(&v, Quantization::Int8).to_base64();
        let err = StoredVector::from_base64(&wire, Quantization::Float16).unwrap_err();
        assert!(matches!(err, SearchError::Snapshot(_)));
    }

    #[test]
    fn test_base64_truncated_float32_rejected() {
        let wire = BASE64.encode([0u8, 1, 2]);
        let err = StoredVector::from_base64(&wire, Quantization::Float32).unwrap_err();
        assert!(matches!(err, SearchError::Snapshot(_)));
    }

    #[test]
    fn test_f32_slice_base64_helpers() {
        let v = vec![0.25f32, -1.5, 3.0];
        let wire = f32_slice_to_base64(&v);
        assert_eq!(f32_slice_from_base64(&wire).unwrap(), v);
    }
}
