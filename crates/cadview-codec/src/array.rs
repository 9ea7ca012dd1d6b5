// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire-format numeric arrays.
//!
//! Two encodings are recognized inside arbitrary JSON:
//!
//! - compressed triple `["_f32" | "_i32", [outer, dims...], base64(zlib(bytes))]`
//! - plain object `{"dtype": "float32" | "int32" | "uint32", "buffer": "...", "codec": "b64" | "hex", "shape": [...]}`
//!
//! Element bytes are always little-endian 4-byte values.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cadview_port::{ArrayData, DType, NumericArray};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};
use thiserror::Error;

const TAG_F32: &str = "_f32";
const TAG_I32: &str = "_i32";

/// Output layout of a decoded array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Layout {
    /// Reshape to the declared dimensions.
    #[default]
    Nested,
    /// Keep the flat typed sequence (GPU-buffer paths).
    Flat,
}

/// Errors raised while decoding or encoding wire arrays.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    /// Payload is not valid hex.
    #[error("invalid hex payload: {0}")]
    Hex(String),
    /// Payload is neither zlib nor raw deflate.
    #[error("inflate failed: {0}")]
    Inflate(String),
    /// Compression failed while encoding.
    #[error("deflate failed: {0}")]
    Deflate(String),
    /// `dtype` is not one of the supported element types.
    #[error("unknown dtype `{0}`")]
    UnknownDtype(String),
    /// `codec` is neither `b64` nor `hex`.
    #[error("unknown buffer codec `{0}`")]
    UnknownCodec(String),
    /// Byte length is not a multiple of the element size.
    #[error("buffer of {len} bytes is not a multiple of 4")]
    Misaligned {
        /// Decoded byte length.
        len: usize,
    },
    /// The declared shape does not cover the decoded elements.
    #[error("wrong shape provided: {shape:?} for {elements} elements")]
    ShapeMismatch {
        /// Declared shape.
        shape: Vec<usize>,
        /// Number of decoded elements.
        elements: usize,
    },
    /// The record is recognizable but structurally broken.
    #[error("malformed array record: {0}")]
    Malformed(String),
}

/// How the payload bytes are transported.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Payload {
    /// base64 of zlib-compressed bytes.
    Compressed(String),
    /// base64 of raw bytes.
    Base64(String),
    /// hex of raw bytes.
    Hex(String),
}

/// A recognized but not yet decoded wire array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireArray {
    dtype: DType,
    shape: Option<Vec<usize>>,
    payload: Payload,
}

impl WireArray {
    /// Recognize a wire array.
    ///
    /// Returns `Ok(None)` for any value that is not an array record, including
    /// triples with an unknown tag, so mixed documents pass through.
    pub fn detect(value: &Value) -> Result<Option<Self>, CodecError> {
        match value {
            Value::Array(items) => detect_compressed(items),
            Value::Object(map) => detect_plain(map),
            _ => Ok(None),
        }
    }

    /// Element type of the record.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Declared shape, if any.
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    /// Decode the payload into a typed array.
    pub fn decode(&self, layout: Layout) -> Result<NumericArray, CodecError> {
        let bytes = match &self.payload {
            Payload::Compressed(b64) => inflate(&decode_base64(b64)?)?,
            Payload::Base64(b64) => decode_base64(b64)?,
            Payload::Hex(text) => hex::decode(text).map_err(|e| CodecError::Hex(e.to_string()))?,
        };
        let data = reinterpret(self.dtype, &bytes)?;
        match (&self.shape, layout) {
            (Some(shape), Layout::Nested) => {
                let elements = data.len();
                NumericArray::new(shape.clone(), data).ok_or_else(|| CodecError::ShapeMismatch {
                    shape: shape.clone(),
                    elements,
                })
            }
            _ => Ok(NumericArray::flat(data)),
        }
    }
}

fn detect_compressed(items: &[Value]) -> Result<Option<WireArray>, CodecError> {
    let [tag, shape, payload] = items else {
        return Ok(None);
    };
    let dtype = match tag.as_str() {
        Some(TAG_F32) => DType::F32,
        Some(TAG_I32) => DType::I32,
        _ => return Ok(None),
    };
    let shape = parse_shape(shape)?;
    if shape.is_empty() {
        return Err(CodecError::Malformed("empty shape".into()));
    }
    let payload = payload
        .as_str()
        .ok_or_else(|| CodecError::Malformed("payload must be a base64 string".into()))?;
    Ok(Some(WireArray {
        dtype,
        shape: Some(shape),
        payload: Payload::Compressed(payload.to_owned()),
    }))
}

fn detect_plain(map: &Map<String, Value>) -> Result<Option<WireArray>, CodecError> {
    let (Some(Value::String(dtype)), Some(Value::String(buffer))) =
        (map.get("dtype"), map.get("buffer"))
    else {
        return Ok(None);
    };
    let dtype = match dtype.as_str() {
        "float32" => DType::F32,
        "int32" => DType::I32,
        "uint32" => DType::U32,
        other => return Err(CodecError::UnknownDtype(other.to_owned())),
    };
    let payload = match map.get("codec").and_then(Value::as_str).unwrap_or("b64") {
        "b64" | "base64" => Payload::Base64(buffer.clone()),
        "hex" => Payload::Hex(buffer.clone()),
        other => return Err(CodecError::UnknownCodec(other.to_owned())),
    };
    let shape = match map.get("shape") {
        None | Some(Value::Null) => None,
        Some(shape) => Some(parse_shape(shape)?),
    };
    Ok(Some(WireArray {
        dtype,
        shape,
        payload,
    }))
}

fn parse_shape(value: &Value) -> Result<Vec<usize>, CodecError> {
    value
        .as_array()
        .ok_or_else(|| CodecError::Malformed("shape must be a list".into()))?
        .iter()
        .map(|dim| {
            dim.as_u64()
                .and_then(|d| usize::try_from(d).ok())
                .ok_or_else(|| CodecError::Malformed(format!("bad dimension {dim}")))
        })
        .collect()
}

fn decode_base64(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(text)
        .map_err(|e| CodecError::Base64(e.to_string()))
}

/// Inflate zlib data, falling back to raw deflate streams.
fn inflate(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    if ZlibDecoder::new(bytes).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    DeflateDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Inflate(e.to_string()))?;
    Ok(out)
}

fn reinterpret(dtype: DType, bytes: &[u8]) -> Result<ArrayData, CodecError> {
    if bytes.len() % 4 != 0 {
        return Err(CodecError::Misaligned { len: bytes.len() });
    }
    let words = bytes
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]]);
    Ok(match dtype {
        DType::F32 => ArrayData::F32(words.map(f32::from_le_bytes).collect()),
        DType::I32 => ArrayData::I32(words.map(i32::from_le_bytes).collect()),
        DType::U32 => ArrayData::U32(words.map(u32::from_le_bytes).collect()),
    })
}

/// Decode a JSON value if it is a wire array.
///
/// `Ok(None)` means "not an array record"; the caller keeps the value as is.
pub fn decode_array(value: &Value, layout: Layout) -> Result<Option<NumericArray>, CodecError> {
    WireArray::detect(value)?
        .map(|wire| wire.decode(layout))
        .transpose()
}

fn encode_words(tag: &str, shape: &[usize], count: usize, bytes: &[u8]) -> Result<Value, CodecError> {
    let total = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
    if shape.is_empty() || total != Some(count) {
        return Err(CodecError::ShapeMismatch {
            shape: shape.to_vec(),
            elements: count,
        });
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CodecError::Deflate(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CodecError::Deflate(e.to_string()))?;
    Ok(json!([tag, shape, STANDARD.encode(compressed)]))
}

/// Encode floats as a compressed `_f32` record.
pub fn encode_f32(values: &[f32], shape: &[usize]) -> Result<Value, CodecError> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_words(TAG_F32, shape, values.len(), &bytes)
}

/// Encode signed integers as a compressed `_i32` record.
pub fn encode_i32(values: &[i32], shape: &[usize]) -> Result<Value, CodecError> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_words(TAG_I32, shape, values.len(), &bytes)
}

/// Replace every wire array inside `value` by its decoded JSON lists.
///
/// A record that fails to decode becomes `null`; the rest of the tree is kept.
pub fn revive(value: Value, layout: Layout) -> Value {
    match WireArray::detect(&value) {
        Ok(Some(wire)) => match wire.decode(layout) {
            Ok(array) => array.to_value(),
            Err(err) => {
                tracing::error!(error = %err, "dropping undecodable array record");
                Value::Null
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "dropping malformed array record");
            Value::Null
        }
        Ok(None) => match value {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| revive(v, layout)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, revive(v, layout)))
                    .collect(),
            ),
            other => other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_compressed_triangle() {
        let record = encode_f32(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[3, 3]).unwrap();
        let array = decode_array(&record, Layout::Nested).unwrap().unwrap();
        assert_eq!(array.shape(), &[3, 3]);
        assert_eq!(
            array.to_value(),
            json!([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
        );
    }

    #[test]
    fn flat_layout_skips_reshape() {
        let record = encode_i32(&[1, 2, 3, 4, 5, 6], &[3, 2]).unwrap();
        let array = decode_array(&record, Layout::Flat).unwrap().unwrap();
        assert_eq!(array.shape(), &[6]);
        assert_eq!(array.as_i32(), Some(&[1, 2, 3, 4, 5, 6][..]));
    }

    #[test]
    fn shape_mismatch_is_an_error_not_a_truncation() {
        let record = encode_i32(&[1, 2, 3, 4, 5, 6], &[6]).unwrap();
        let Value::Array(mut items) = record else {
            unreachable!("encoder returns a triple");
        };
        items[1] = json!([4, 2]);
        let err = decode_array(&Value::Array(items), Layout::Nested).unwrap_err();
        assert_eq!(
            err,
            CodecError::ShapeMismatch {
                shape: vec![4, 2],
                elements: 6
            }
        );
    }

    #[test]
    fn unknown_tags_pass_through() {
        assert_eq!(
            decode_array(&json!(["_f64", [1], "AAAA"]), Layout::Nested),
            Ok(None)
        );
        assert_eq!(decode_array(&json!([1, 2, 3]), Layout::Nested), Ok(None));
        assert_eq!(decode_array(&json!({"name": "x"}), Layout::Nested), Ok(None));
    }

    #[test]
    fn plain_hex_and_base64_buffers() {
        // 1u32, 2u32 little-endian
        let hex_record = json!({"dtype": "uint32", "buffer": "0100000002000000", "codec": "hex"});
        let array = decode_array(&hex_record, Layout::Nested).unwrap().unwrap();
        assert_eq!(array.as_u32(), Some(&[1, 2][..]));

        let b64 = STANDARD.encode(1.5f32.to_le_bytes());
        let b64_record = json!({"dtype": "float32", "buffer": b64, "shape": [1, 1]});
        let array = decode_array(&b64_record, Layout::Nested).unwrap().unwrap();
        assert_eq!(array.to_value(), json!([[1.5]]));
    }

    #[test]
    fn plain_unknown_dtype_is_rejected() {
        let record = json!({"dtype": "float64", "buffer": ""});
        assert_eq!(
            decode_array(&record, Layout::Nested),
            Err(CodecError::UnknownDtype("float64".into()))
        );
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let record = json!({"dtype": "int32", "buffer": "010203", "codec": "hex"});
        assert_eq!(
            decode_array(&record, Layout::Nested),
            Err(CodecError::Misaligned { len: 3 })
        );
    }

    #[test]
    fn revive_replaces_records_and_nulls_failures() {
        let good = encode_i32(&[7, 8], &[2]).unwrap();
        let doc = json!({
            "tracks": [["/a", "rx", good, "keep"]],
            "bad": ["_i32", [5], "not base64!"],
        });
        let revived = revive(doc, Layout::Nested);
        assert_eq!(revived["tracks"], json!([["/a", "rx", [7, 8], "keep"]]));
        assert_eq!(revived["bad"], Value::Null);
    }

    proptest! {
        #[test]
        fn f32_records_round_trip(rows in 1usize..16, values in prop::collection::vec(-1.0e6f32..1.0e6, 48)) {
            let data = &values[..rows * 3];
            let record = encode_f32(data, &[rows, 3]).unwrap();
            let array = decode_array(&record, Layout::Nested).unwrap().unwrap();
            prop_assert_eq!(array.shape(), &[rows, 3][..]);
            prop_assert_eq!(array.as_f32().unwrap(), data);
        }
    }
}
