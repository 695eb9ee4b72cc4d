//! Geometry library definitions.

use super::source::{SharedInput, UnsharedInput, ValueSource};
use serde::Deserialize;

/// One geometry: value sources, a vertex group and primitive blocks.
#[derive(Debug, Clone, Deserialize)]
pub struct GeometryDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sources: Vec<ValueSource>,
    pub vertices: VertexGroup,
    #[serde(default)]
    pub primitives: Vec<PrimitiveBlock>,
}

/// The vertex-group indirection: an alias for a stack of unshared inputs
/// all read at the same index (position, and anything else declared
/// per-control-point).
#[derive(Debug, Clone, Deserialize)]
pub struct VertexGroup {
    pub id: String,
    pub inputs: Vec<UnsharedInput>,
}

/// Primitive topologies as declared by the source document. Only
/// triangles and polygon lists compile; fans and strips are recognized
/// so they can be rejected with a descriptive error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Triangles,
    Polylist,
    Trifans,
    Tristrips,
}

/// One primitive block: an index table read through shared inputs,
/// optionally tagged with a material symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct PrimitiveBlock {
    #[serde(rename = "type")]
    pub kind: PrimitiveKind,
    /// Mesh-local material symbol; absent means the unassigned soup.
    #[serde(default)]
    pub material: Option<String>,
    pub inputs: Vec<SharedInput>,
    pub indices: Vec<u32>,
    /// Per-polygon vertex counts (polygon lists only).
    #[serde(default)]
    pub vcount: Option<Vec<u32>>,
}
