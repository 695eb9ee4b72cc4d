//! Compiled model types.
//!
//! During generation the graph uses arena indices (`Vec` positions) for
//! all cross-references; finalization assigns the same indices to the
//! dense binary layout, so no renumbering pass is needed beyond the
//! optimizer's remaps.

use crate::types::Color;
use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};

/// Material symbol used for triangle soups whose primitive block
/// declared no material. Bound to the lazily-created default material.
pub const UNASSIGNED_SYMBOL: &str = "_default";

bitflags! {
    /// Which optional fields of a [`Vertex`] were actually populated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VertexFlags: u16 {
        const NORMAL = 1 << 0;
        const COLOR = 1 << 1;
        const TEXCOORD0 = 1 << 2;
        const TEXCOORD1 = 1 << 3;
        const SKIN = 1 << 4;
    }
}

bitflags! {
    /// Per-mesh channel layout and skinning scheme.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MeshFlags: u16 {
        const NORMALS = 1 << 0;
        const COLORS = 1 << 1;
        const TEXCOORDS0 = 1 << 2;
        const TEXCOORDS1 = 1 << 3;
        const SKIN_1 = 1 << 4;
        const SKIN_2 = 1 << 5;
        const SKIN_4 = 1 << 6;
        /// Legacy flat layout: vertices unwelded, indices sequential.
        const UNINDEXED = 1 << 7;
    }
}

bitflags! {
    /// Material capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaterialFlags: u16 {
        const DIFFUSE_TEXTURE = 1 << 0;
        const BUMP_TEXTURE = 1 << 1;
    }
}

impl MeshFlags {
    /// Channel bits corresponding to a vertex's populated-field set.
    pub fn from_vertex_channels(flags: VertexFlags) -> MeshFlags {
        let mut out = MeshFlags::empty();
        if flags.contains(VertexFlags::NORMAL) {
            out |= MeshFlags::NORMALS;
        }
        if flags.contains(VertexFlags::COLOR) {
            out |= MeshFlags::COLORS;
        }
        if flags.contains(VertexFlags::TEXCOORD0) {
            out |= MeshFlags::TEXCOORDS0;
        }
        if flags.contains(VertexFlags::TEXCOORD1) {
            out |= MeshFlags::TEXCOORDS1;
        }
        out
    }

    /// Bones per vertex implied by the skinning-scheme bits.
    pub fn bone_count(self) -> usize {
        if self.contains(MeshFlags::SKIN_4) {
            4
        } else if self.contains(MeshFlags::SKIN_2) {
            2
        } else if self.contains(MeshFlags::SKIN_1) {
            1
        } else {
            0
        }
    }

    pub fn skin_scheme(bones: usize) -> MeshFlags {
        match bones {
            1 => MeshFlags::SKIN_1,
            2 => MeshFlags::SKIN_2,
            4 => MeshFlags::SKIN_4,
            _ => MeshFlags::empty(),
        }
    }
}

/// A fully-extracted vertex.
///
/// Equality is structural over the populated fields with exact
/// floating-point comparison (welding relies on it); the transient
/// `source_vertex` identity is excluded.
#[derive(Debug, Clone, Default)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub texcoords: [[f32; 2]; 2],
    pub bone_indices: Vec<u16>,
    pub bone_weights: Vec<f32>,
    pub flags: VertexFlags,
    /// Index of the source-document vertex this was sampled from.
    /// Only meaningful before finalization; skin binding keys off it.
    pub source_vertex: u32,
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        if self.flags != other.flags || self.position != other.position {
            return false;
        }
        if self.flags.contains(VertexFlags::NORMAL) && self.normal != other.normal {
            return false;
        }
        if self.flags.contains(VertexFlags::COLOR) && self.color != other.color {
            return false;
        }
        if self.flags.contains(VertexFlags::TEXCOORD0) && self.texcoords[0] != other.texcoords[0] {
            return false;
        }
        if self.flags.contains(VertexFlags::TEXCOORD1) && self.texcoords[1] != other.texcoords[1] {
            return false;
        }
        if self.flags.contains(VertexFlags::SKIN)
            && (self.bone_indices != other.bone_indices || self.bone_weights != other.bone_weights)
        {
            return false;
        }
        true
    }
}

/// One material-tagged run of unwelded triangles.
#[derive(Debug, Clone)]
pub struct TriangleSoup {
    pub symbol: String,
    pub triangles: Vec<[Vertex; 3]>,
}

/// An index range over the welded buffers, tagged with its symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshPart {
    pub index_start: u16,
    pub index_count: u16,
    pub symbol: String,
}

/// A bounding sphere grown to contain a vertex set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 0.0,
        }
    }
}

impl BoundingSphere {
    /// Grow a sphere from the first point (radius 0) to contain every
    /// subsequent point.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        let mut sphere = Self {
            center: first,
            radius: 0.0,
        };
        for p in iter {
            sphere.grow(p);
        }
        sphere
    }

    fn grow(&mut self, p: Vec3) {
        let d = self.center.distance(p);
        if d > self.radius {
            let new_radius = (self.radius + d) / 2.0;
            self.center += (p - self.center) * ((new_radius - self.radius) / d);
            self.radius = new_radius;
        }
    }

    pub fn contains(&self, p: Vec3, epsilon: f32) -> bool {
        self.center.distance(p) <= self.radius + epsilon
    }
}

/// A compiled mesh. Holds per-symbol triangle soups during compilation;
/// finalization replaces them with the welded vertex/index buffers.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub id: String,
    pub flags: MeshFlags,
    pub soups: Vec<TriangleSoup>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
    pub parts: Vec<MeshPart>,
    pub bounds: BoundingSphere,
}

impl Mesh {
    pub fn new(id: String) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// The soup for a material symbol, created on first use.
    pub fn soup_mut(&mut self, symbol: &str) -> &mut TriangleSoup {
        if let Some(at) = self.soups.iter().position(|s| s.symbol == symbol) {
            return &mut self.soups[at];
        }
        self.soups.push(TriangleSoup {
            symbol: symbol.to_string(),
            triangles: Vec::new(),
        });
        self.soups.last_mut().unwrap()
    }

    /// Distinct part symbols in part order.
    pub fn part_symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = Vec::new();
        for part in &self.parts {
            if !symbols.contains(&part.symbol.as_str()) {
                symbols.push(&part.symbol);
            }
        }
        symbols
    }
}

/// A compiled scene node.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub sid: Option<String>,
    pub name: String,
    /// Local pose transform, relative to the parent.
    pub pose: Mat4,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Working flag for the unused-node optimization pass.
    pub in_use: bool,
}

/// A compiled material with all channel values resolved.
#[derive(Debug, Clone)]
pub struct Material {
    pub id: String,
    pub flags: MaterialFlags,
    pub emissive: Color,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub shininess: f32,
    pub diffuse_texture: Option<String>,
    pub bump_texture: Option<String>,
}

/// Binds a mesh-local material symbol to a compiled material index.
#[derive(Debug, Clone)]
pub struct MaterialBinding {
    pub symbol: String,
    pub material: usize,
}

/// An ordered joint: the compiled node playing the joint, plus its
/// inverse bind pose.
#[derive(Debug, Clone)]
pub struct JointLink {
    pub node: usize,
    pub inv_bind: Mat4,
}

/// A (node, mesh) pair plus its material bindings and, for skinned
/// meshes, the ordered joint mapping.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub node: usize,
    pub mesh: usize,
    pub bindings: Vec<MaterialBinding>,
    pub joints: Vec<JointLink>,
}

/// One decomposed keyframe. The matrix is split into scale, rotation and
/// translation in that order, matching the engine's composition order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub scale: Vec3,
    pub rotation: Quat,
    pub translation: Vec3,
}

/// Keyframes for one targeted node.
#[derive(Debug, Clone)]
pub struct AnimationChannel {
    pub node: usize,
    pub keyframes: Vec<Keyframe>,
}

/// A compiled animation (one per source animation, groups included).
#[derive(Debug, Clone)]
pub struct Animation {
    pub id: String,
    pub channels: Vec<AnimationChannel>,
}

/// A clip referencing compiled animations by index.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub id: String,
    pub start: f32,
    pub end: f32,
    pub animations: Vec<usize>,
}

/// The root aggregate owning everything the binary model serialises.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub nodes: Vec<Node>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub instances: Vec<MeshInstance>,
    pub animations: Vec<Animation>,
    pub clips: Vec<AnimationClip>,
}

impl Model {
    /// Index of the synthetic root node.
    pub const ROOT: usize = 0;
}
