// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Decoded scene model: numeric arrays, tessellations and the part tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Element type of a numeric array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit IEEE float.
    F32,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
}

impl DType {
    /// Canonical dtype name (`float32`, `int32`, `uint32`).
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::I32 => "int32",
            DType::U32 => "uint32",
        }
    }

    /// Parse a dtype name, accepting the short wire tags too.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "float32" | "_f32" | "f32" => Some(DType::F32),
            "int32" | "_i32" | "i32" => Some(DType::I32),
            "uint32" | "_u32" | "u32" => Some(DType::U32),
            _ => None,
        }
    }
}

/// Flat element storage of a [`NumericArray`].
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    /// Float elements.
    F32(Vec<f32>),
    /// Signed integer elements.
    I32(Vec<i32>),
    /// Unsigned integer elements.
    U32(Vec<u32>),
}

impl ArrayData {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::U32(v) => v.len(),
        }
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::F32(_) => DType::F32,
            ArrayData::I32(_) => DType::I32,
            ArrayData::U32(_) => DType::U32,
        }
    }

    fn element(&self, index: usize) -> Value {
        match self {
            ArrayData::F32(v) => Value::from(f64::from(v[index])),
            ArrayData::I32(v) => Value::from(v[index]),
            ArrayData::U32(v) => Value::from(v[index]),
        }
    }
}

/// Typed numeric array with a shape.
///
/// The element count always equals the product of the shape.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NumericArray {
    /// Build an array, returning `None` when `shape` does not cover `data`.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Option<Self> {
        if shape.is_empty() {
            return Some(Self::flat(data));
        }
        let total = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))?;
        (total == data.len()).then_some(Self { shape, data })
    }

    /// A one-dimensional array.
    pub fn flat(data: ArrayData) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Shape, outermost dimension first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element storage in row-major order.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Float elements, if this is a float array.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ArrayData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Signed elements, if this is an int32 array.
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            ArrayData::I32(v) => Some(v),
            _ => None,
        }
    }

    /// Unsigned elements, if this is a uint32 array.
    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.data {
            ArrayData::U32(v) => Some(v),
            _ => None,
        }
    }

    /// Render as (nested) JSON lists following the shape.
    pub fn to_value(&self) -> Value {
        if self.shape.len() <= 1 {
            return Value::Array((0..self.len()).map(|i| self.data.element(i)).collect());
        }
        self.nest(0, 0)
    }

    fn nest(&self, depth: usize, offset: usize) -> Value {
        let dims = &self.shape[depth..];
        if dims.len() == 1 {
            return Value::Array(
                (offset..offset + dims[0])
                    .map(|i| self.data.element(i))
                    .collect(),
            );
        }
        let stride: usize = dims[1..].iter().product();
        Value::Array(
            (0..dims[0])
                .map(|i| self.nest(depth + 1, offset + i * stride))
                .collect(),
        )
    }
}

/// Named numeric buffers of a tessellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferField {
    /// Triangle vertex positions.
    Vertices,
    /// Vertex normals.
    Normals,
    /// Triangle vertex indices.
    Triangles,
    /// Edge polylines.
    Edges,
    /// Vertices of the BRep object (for picking).
    ObjVertices,
    /// Per-face surface type.
    FaceTypes,
    /// Per-edge curve type.
    EdgeTypes,
    /// Triangle count of every face.
    TrianglesPerFace,
    /// Segment count of every edge.
    SegmentsPerEdge,
}

impl BufferField {
    /// Every buffer field.
    pub const ALL: [BufferField; 9] = [
        BufferField::Vertices,
        BufferField::Normals,
        BufferField::Triangles,
        BufferField::Edges,
        BufferField::ObjVertices,
        BufferField::FaceTypes,
        BufferField::EdgeTypes,
        BufferField::TrianglesPerFace,
        BufferField::SegmentsPerEdge,
    ];

    /// JSON key of the buffer.
    pub fn key(self) -> &'static str {
        match self {
            BufferField::Vertices => "vertices",
            BufferField::Normals => "normals",
            BufferField::Triangles => "triangles",
            BufferField::Edges => "edges",
            BufferField::ObjVertices => "obj_vertices",
            BufferField::FaceTypes => "face_types",
            BufferField::EdgeTypes => "edge_types",
            BufferField::TrianglesPerFace => "triangles_per_face",
            BufferField::SegmentsPerEdge => "segments_per_edge",
        }
    }

    /// Look up a buffer field by JSON key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// Mesh data of one shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tessellation {
    /// Decoded numeric buffers.
    pub buffers: BTreeMap<BufferField, NumericArray>,
    /// Non-buffer attributes, passed through untouched.
    pub extra: Map<String, Value>,
}

impl Tessellation {
    /// A buffer by field.
    pub fn buffer(&self, field: BufferField) -> Option<&NumericArray> {
        self.buffers.get(&field)
    }
}

/// Geometry attached to a part.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// A tessellated mesh, possibly shared with other parts.
    Mesh(Arc<Tessellation>),
    /// A bare numeric array (e.g. edge or vertex lists).
    Array(NumericArray),
    /// Anything else, passed through.
    Opaque(Value),
}

impl Shape {
    /// The mesh, if this is a tessellation.
    pub fn mesh(&self) -> Option<&Arc<Tessellation>> {
        match self {
            Shape::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// Assembly node.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    /// Display name.
    pub name: String,
    /// Object path.
    pub id: String,
    /// Placement `[position, quaternion]`, if any.
    pub loc: Option<Value>,
    /// Child nodes in display order.
    pub children: Vec<SceneNode>,
    /// Remaining attributes.
    pub extra: Map<String, Value>,
}

/// Leaf node carrying geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    /// Display name.
    pub name: String,
    /// Object path.
    pub id: String,
    /// Part type (`shapes`, `edges`, `vertices`).
    pub kind: Option<String>,
    /// Web color.
    pub color: Option<String>,
    /// Geometry; `None` when the part has none.
    pub shape: Option<Shape>,
    /// Remaining attributes.
    pub extra: Map<String, Value>,
}

/// Node of the part tree.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode {
    /// Assembly with children.
    Group(Group),
    /// Leaf with geometry.
    Part(Part),
    /// Unrecognized value, passed through.
    Opaque(Value),
}

/// Fully decoded scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneDocument {
    /// Shared tessellations; parts referencing the same index hold the same `Arc`.
    pub instances: Vec<Arc<Tessellation>>,
    /// Root of the part tree.
    pub root: SceneNode,
}

impl SceneDocument {
    /// Depth-first iterator over every part.
    pub fn parts(&self) -> Parts<'_> {
        Parts {
            stack: vec![&self.root],
        }
    }

    /// Number of parts in the tree.
    pub fn part_count(&self) -> usize {
        self.parts().count()
    }
}

/// Depth-first part iterator returned by [`SceneDocument::parts`].
#[derive(Debug)]
pub struct Parts<'a> {
    stack: Vec<&'a SceneNode>,
}

impl<'a> Iterator for Parts<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                SceneNode::Part(part) => return Some(part),
                SceneNode::Group(group) => self.stack.extend(group.children.iter().rev()),
                SceneNode::Opaque(_) => {}
            }
        }
        None
    }
}
