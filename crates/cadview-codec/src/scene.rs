// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene document decoding.
//!
//! A document is either a bare part tree or `{"instances": [...], "shapes": tree}`.
//! Instances are decoded once, up front; parts whose shape is `{"ref": n}`
//! share the decoded instance instead of decoding it again.

use std::sync::Arc;

use cadview_port::{
    ArrayData, BufferField, Group, NumericArray, Part, SceneDocument, SceneNode, Shape,
    Tessellation,
};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::array::{decode_array, CodecError, Layout};

/// Errors raised while decoding a scene document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// The document is not a JSON object.
    #[error("scene document must be an object")]
    NotAnObject,
    /// Neither `shapes` nor a top-level `parts` list is present.
    #[error("scene document has no part tree")]
    MissingRoot,
    /// An entry of `instances` is not a tessellation.
    #[error("instance {index} is invalid: {reason}")]
    BadInstance {
        /// Position in `instances`.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },
    /// A `{"ref": n}` shape points past the end of `instances`.
    #[error("reference {index} is out of range ({available} instances)")]
    DanglingReference {
        /// Referenced index.
        index: u64,
        /// Number of decoded instances.
        available: usize,
    },
    /// The `ref` value is not a non-negative integer.
    #[error("invalid instance reference {0}")]
    BadReference(String),
    /// The payload string is not JSON.
    #[error("invalid scene json: {0}")]
    Json(String),
}

/// Decoder for scene documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneCodec {
    layout: Layout,
}

impl SceneCodec {
    /// A codec producing nested buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec producing buffers in the given layout.
    pub fn with_layout(layout: Layout) -> Self {
        Self { layout }
    }

    /// Decode a document held as a JSON string.
    pub fn decode_str(&self, text: &str) -> Result<SceneDocument, SceneError> {
        let value: Value = serde_json::from_str(text).map_err(|e| SceneError::Json(e.to_string()))?;
        self.decode(&value)
    }

    /// Decode a model payload: either the document itself or its JSON text.
    pub fn decode_payload(&self, payload: &Value) -> Result<SceneDocument, SceneError> {
        match payload {
            Value::String(text) => self.decode_str(text),
            other => self.decode(other),
        }
    }

    /// Decode a document.
    pub fn decode(&self, document: &Value) -> Result<SceneDocument, SceneError> {
        let map = document.as_object().ok_or(SceneError::NotAnObject)?;
        if map.contains_key("parts") {
            return Ok(SceneDocument {
                instances: Vec::new(),
                root: self.decode_node(document, &[])?,
            });
        }
        let instances = match map.get("instances") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| self.decode_instance(index, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(SceneError::BadInstance {
                    index: 0,
                    reason: "instances must be a list".into(),
                })
            }
        };
        let root = map.get("shapes").ok_or(SceneError::MissingRoot)?;
        let root = self.decode_node(root, &instances)?;
        tracing::debug!(instances = instances.len(), "scene decoded");
        Ok(SceneDocument { instances, root })
    }

    fn decode_instance(&self, index: usize, value: &Value) -> Result<Arc<Tessellation>, SceneError> {
        let map = value.as_object().ok_or_else(|| SceneError::BadInstance {
            index,
            reason: "expected an object".into(),
        })?;
        Ok(Arc::new(self.decode_tessellation(map)))
    }

    fn decode_node(
        &self,
        value: &Value,
        instances: &[Arc<Tessellation>],
    ) -> Result<SceneNode, SceneError> {
        let Some(map) = value.as_object() else {
            return Ok(SceneNode::Opaque(value.clone()));
        };
        if let Some(Value::Array(children)) = map.get("parts") {
            let children = children
                .iter()
                .map(|child| self.decode_node(child, instances))
                .collect::<Result<Vec<_>, _>>()?;
            let mut extra = map.clone();
            extra.remove("parts");
            return Ok(SceneNode::Group(Group {
                name: take_string(&mut extra, "name").unwrap_or_default(),
                id: take_string(&mut extra, "id").unwrap_or_default(),
                loc: extra.remove("loc").filter(|loc| !loc.is_null()),
                children,
                extra,
            }));
        }
        if map.contains_key("shape") {
            let mut extra = map.clone();
            let shape = match extra.remove("shape") {
                Some(raw) => self.decode_shape(&raw, instances)?,
                None => None,
            };
            return Ok(SceneNode::Part(Part {
                name: take_string(&mut extra, "name").unwrap_or_default(),
                id: take_string(&mut extra, "id").unwrap_or_default(),
                kind: take_string(&mut extra, "type"),
                color: take_string(&mut extra, "color"),
                shape,
                extra,
            }));
        }
        Ok(SceneNode::Opaque(value.clone()))
    }

    fn decode_shape(
        &self,
        value: &Value,
        instances: &[Arc<Tessellation>],
    ) -> Result<Option<Shape>, SceneError> {
        match value {
            Value::Null => Ok(None),
            Value::Object(map) if map.contains_key("ref") => {
                let index = map["ref"]
                    .as_u64()
                    .ok_or_else(|| SceneError::BadReference(map["ref"].to_string()))?;
                let instance = usize::try_from(index)
                    .ok()
                    .and_then(|i| instances.get(i))
                    .ok_or(SceneError::DanglingReference {
                        index,
                        available: instances.len(),
                    })?;
                Ok(Some(Shape::Mesh(Arc::clone(instance))))
            }
            Value::Object(map) if map.keys().any(|k| BufferField::from_key(k).is_some()) => {
                Ok(Some(Shape::Mesh(Arc::new(self.decode_tessellation(map)))))
            }
            other => match decode_array(other, self.layout) {
                Ok(Some(array)) => Ok(Some(Shape::Array(array))),
                Ok(None) => Ok(Some(Shape::Opaque(other.clone()))),
                Err(err) => {
                    tracing::error!(error = %err, "part shape dropped");
                    Ok(None)
                }
            },
        }
    }

    fn decode_tessellation(&self, map: &Map<String, Value>) -> Tessellation {
        let mut tess = Tessellation::default();
        for (key, value) in map {
            let Some(field) = BufferField::from_key(key) else {
                tess.extra.insert(key.clone(), value.clone());
                continue;
            };
            match self.decode_buffer(field, value) {
                Ok(Some(array)) => {
                    tess.buffers.insert(field, array);
                }
                Ok(None) => {
                    tracing::warn!(field = field.key(), "unrecognized buffer encoding, kept verbatim");
                    tess.extra.insert(key.clone(), value.clone());
                }
                Err(err) => {
                    tracing::error!(field = field.key(), error = %err, "buffer dropped");
                }
            }
        }
        tess
    }

    fn decode_buffer(
        &self,
        field: BufferField,
        value: &Value,
    ) -> Result<Option<NumericArray>, CodecError> {
        if let Some(array) = decode_array(value, self.layout)? {
            return Ok(Some(array));
        }
        Ok(array_from_lists(value, is_index_buffer(field), self.layout))
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => {
            map.insert(key.to_owned(), other);
            None
        }
    }
}

fn is_index_buffer(field: BufferField) -> bool {
    matches!(
        field,
        BufferField::Triangles
            | BufferField::FaceTypes
            | BufferField::EdgeTypes
            | BufferField::TrianglesPerFace
            | BufferField::SegmentsPerEdge
    )
}

/// Build an array from already-decoded (nested) JSON number lists.
///
/// Returns `None` unless the lists are rectangular and every leaf is a number.
fn array_from_lists(value: &Value, integral: bool, layout: Layout) -> Option<NumericArray> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }
    if shape.is_empty() {
        return None;
    }
    let mut leaves = Vec::new();
    collect_leaves(value, &shape, &mut leaves)?;
    let data = if integral {
        ArrayData::I32(
            leaves
                .iter()
                .map(|v| v.as_i64().and_then(|n| i32::try_from(n).ok()))
                .collect::<Option<Vec<_>>>()?,
        )
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let floats = leaves
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<_>>>()?;
        ArrayData::F32(floats)
    };
    match layout {
        Layout::Nested => NumericArray::new(shape, data),
        Layout::Flat => Some(NumericArray::flat(data)),
    }
}

fn collect_leaves<'a>(value: &'a Value, shape: &[usize], out: &mut Vec<&'a Value>) -> Option<()> {
    match shape.split_first() {
        None => {
            value.is_number().then_some(())?;
            out.push(value);
        }
        Some((&len, rest)) => {
            let items = value.as_array()?;
            if items.len() != len {
                return None;
            }
            for item in items {
                collect_leaves(item, rest, out)?;
            }
        }
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{encode_f32, encode_i32};
    use serde_json::json;

    fn triangle() -> Value {
        encode_f32(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[3, 3]).unwrap()
    }

    #[test]
    fn reference_resolves_to_identical_instance() {
        let doc = json!({
            "instances": [{"vertices": triangle()}],
            "shapes": {
                "type": "shapes",
                "name": "Group",
                "parts": [
                    {"name": "a", "shape": {"ref": 0}},
                    {"name": "b", "shape": {"ref": 0}}
                ]
            }
        });
        let scene = SceneCodec::new().decode(&doc).unwrap();
        let parts: Vec<_> = scene.parts().collect();
        assert_eq!(parts.len(), 2);

        let mesh_a = parts[0].shape.as_ref().and_then(Shape::mesh).unwrap();
        let mesh_b = parts[1].shape.as_ref().and_then(Shape::mesh).unwrap();
        assert!(Arc::ptr_eq(mesh_a, &scene.instances[0]));
        assert!(Arc::ptr_eq(mesh_a, mesh_b));
        assert_eq!(
            mesh_a.buffer(BufferField::Vertices).unwrap().to_value(),
            json!([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
        );
    }

    #[test]
    fn out_of_range_reference_fails() {
        let doc = json!({
            "instances": [{"vertices": triangle()}],
            "shapes": {"parts": [{"shape": {"ref": 3}}]}
        });
        assert_eq!(
            SceneCodec::new().decode(&doc),
            Err(SceneError::DanglingReference {
                index: 3,
                available: 1
            })
        );
    }

    #[test]
    fn inline_buffers_decode_and_bad_buffers_leave_a_hole() {
        let doc = json!({
            "name": "root",
            "id": "/root",
            "parts": [{
                "name": "box",
                "id": "/root/box",
                "type": "shapes",
                "color": "#e8b024",
                "shape": {
                    "vertices": triangle(),
                    "triangles": encode_i32(&[0, 1, 2], &[1, 3]).unwrap(),
                    "normals": ["_f32", [5, 3], "AAAA"],
                    "bb": {"xmin": 0}
                }
            }]
        });
        let scene = SceneCodec::new().decode(&doc).unwrap();
        let part = scene.parts().next().unwrap();
        assert_eq!(part.kind.as_deref(), Some("shapes"));
        assert_eq!(part.color.as_deref(), Some("#e8b024"));
        let mesh = part.shape.as_ref().and_then(Shape::mesh).unwrap();
        assert!(mesh.buffer(BufferField::Vertices).is_some());
        assert_eq!(
            mesh.buffer(BufferField::Triangles).unwrap().as_i32(),
            Some(&[0, 1, 2][..])
        );
        assert!(mesh.buffer(BufferField::Normals).is_none());
        assert_eq!(mesh.extra["bb"], json!({"xmin": 0}));
    }

    #[test]
    fn plain_lists_and_bare_arrays_are_accepted() {
        let doc = json!({
            "parts": [
                {"name": "m", "shape": {"vertices": [[0, 0, 0], [1, 1, 1]], "triangles": [[0, 1, 1]]}},
                {"name": "e", "type": "edges", "shape": encode_f32(&[0.0; 6], &[1, 2, 3]).unwrap()}
            ]
        });
        let scene = SceneCodec::new().decode(&doc).unwrap();
        let parts: Vec<_> = scene.parts().collect();
        let mesh = parts[0].shape.as_ref().and_then(Shape::mesh).unwrap();
        assert_eq!(mesh.buffer(BufferField::Vertices).unwrap().shape(), &[2, 3]);
        assert!(mesh.buffer(BufferField::Vertices).unwrap().as_f32().is_some());
        assert!(mesh.buffer(BufferField::Triangles).unwrap().as_i32().is_some());
        match &parts[1].shape {
            Some(Shape::Array(array)) => assert_eq!(array.shape(), &[1, 2, 3]),
            other => panic!("expected a bare array, got {other:?}"),
        }
    }

    #[test]
    fn unknown_nodes_are_kept_verbatim() {
        let doc = json!({"parts": [{"kind": "light", "power": 3}, 42]});
        let scene = SceneCodec::new().decode(&doc).unwrap();
        let SceneNode::Group(group) = &scene.root else {
            panic!("root must be a group");
        };
        assert_eq!(
            group.children,
            vec![
                SceneNode::Opaque(json!({"kind": "light", "power": 3})),
                SceneNode::Opaque(json!(42))
            ]
        );
        assert_eq!(scene.part_count(), 0);
    }

    #[test]
    fn string_payloads_are_parsed() {
        let text = json!({"parts": [{"shape": null}]}).to_string();
        let scene = SceneCodec::new()
            .decode_payload(&Value::String(text))
            .unwrap();
        assert_eq!(scene.part_count(), 1);
        assert!(matches!(
            SceneCodec::new().decode_str("{"),
            Err(SceneError::Json(_))
        ));
    }
}
