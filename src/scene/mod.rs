//! Scene interchange document model.
//!
//! An in-memory object graph for the parsed scene-interchange document:
//! libraries of geometries, materials, effects, images, controllers,
//! animations and clips, plus a scene graph of visual scenes. Pure data
//! and lookup; all transformation logic lives in [`crate::model`].
//!
//! Cross-references between libraries use `#id` URLs resolved through an
//! index owned by the document (built once after parse, never a global).

pub mod animation;
pub mod controller;
pub mod geometry;
pub mod material;
pub mod node;
pub mod sampler;
pub mod source;

pub use animation::{AnimChannelDef, AnimationDef, ClipDef};
pub use controller::{ControllerDef, SkinDef};
pub use geometry::{GeometryDef, PrimitiveBlock, PrimitiveKind, VertexGroup};
pub use material::{ChannelDef, EffectDef, EffectParam, ImageDef, MaterialDef, ParamValueDef, ShadingDef, ShadingModel};
pub use node::{InstanceDef, SceneNodeDef, SymbolBinding, TransformOp, VisualSceneDef};
pub use source::{Scalar, Semantic, SharedInput, SourceData, UnsharedInput, ValueSource};

use crate::error::{CompilerError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Document-level metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetInfo {
    /// Which axis the source tool treats as "up".
    #[serde(default)]
    pub up_axis: UpAxis,
    /// Meters per document unit (1.0 = meters).
    #[serde(default = "default_unit_scale")]
    pub unit_scale: f32,
}

fn default_unit_scale() -> f32 {
    1.0
}

impl Default for AssetInfo {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::YUp,
            unit_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum UpAxis {
    #[serde(rename = "X_UP")]
    XUp,
    #[default]
    #[serde(rename = "Y_UP")]
    YUp,
    #[serde(rename = "Z_UP")]
    ZUp,
}

/// Where a value source lives inside the document.
#[derive(Debug, Clone)]
enum SourceLoc {
    Geometry { geometry: usize, source: usize },
    Controller { controller: usize, source: usize },
    /// Path of child indices from the animation library root, then the
    /// source index within that animation.
    Animation { path: Vec<usize>, source: usize },
}

/// Global id → object index, owned by the document.
#[derive(Debug, Default)]
struct DocumentIndex {
    geometries: HashMap<String, usize>,
    materials: HashMap<String, usize>,
    effects: HashMap<String, usize>,
    images: HashMap<String, usize>,
    controllers: HashMap<String, usize>,
    visual_scenes: HashMap<String, usize>,
    library_nodes: HashMap<String, usize>,
    /// Vertex-group id → owning geometry index.
    vertex_groups: HashMap<String, usize>,
    sources: HashMap<String, SourceLoc>,
}

/// The parsed scene-interchange document. Read-only after parse.
#[derive(Debug, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub asset: AssetInfo,
    #[serde(default)]
    pub geometries: Vec<GeometryDef>,
    #[serde(default)]
    pub materials: Vec<MaterialDef>,
    #[serde(default)]
    pub effects: Vec<EffectDef>,
    #[serde(default)]
    pub images: Vec<ImageDef>,
    #[serde(default)]
    pub controllers: Vec<ControllerDef>,
    #[serde(default)]
    pub animations: Vec<AnimationDef>,
    #[serde(default)]
    pub clips: Vec<ClipDef>,
    /// Reusable node subtrees referenced by node instances.
    #[serde(default)]
    pub library_nodes: Vec<SceneNodeDef>,
    #[serde(default)]
    pub visual_scenes: Vec<VisualSceneDef>,
    /// URL of the root visual scene.
    #[serde(default)]
    pub scene: Option<String>,

    #[serde(skip)]
    index: DocumentIndex,
}

/// Strip the leading `#` of a URL fragment.
pub fn fragment(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}

impl SceneDocument {
    /// Parse a document from JSON text and build its id index.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut doc: SceneDocument = serde_json::from_str(text)?;
        doc.build_index();
        Ok(doc)
    }

    /// Parse a document from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn build_index(&mut self) {
        let mut index = DocumentIndex::default();

        fn insert(map: &mut HashMap<String, usize>, id: &str, at: usize, what: &str) {
            if map.insert(id.to_string(), at).is_some() {
                log::warn!("duplicate {what} id '{id}', keeping the later declaration");
            }
        }

        for (gi, geometry) in self.geometries.iter().enumerate() {
            insert(&mut index.geometries, &geometry.id, gi, "geometry");
            insert(&mut index.vertex_groups, &geometry.vertices.id, gi, "vertex group");
            for (si, source) in geometry.sources.iter().enumerate() {
                index
                    .sources
                    .insert(source.id.clone(), SourceLoc::Geometry { geometry: gi, source: si });
            }
        }
        for (mi, material) in self.materials.iter().enumerate() {
            insert(&mut index.materials, &material.id, mi, "material");
        }
        for (ei, effect) in self.effects.iter().enumerate() {
            insert(&mut index.effects, &effect.id, ei, "effect");
        }
        for (ii, image) in self.images.iter().enumerate() {
            insert(&mut index.images, &image.id, ii, "image");
        }
        for (ci, controller) in self.controllers.iter().enumerate() {
            insert(&mut index.controllers, &controller.id, ci, "controller");
            for (si, source) in controller.skin.sources.iter().enumerate() {
                index
                    .sources
                    .insert(source.id.clone(), SourceLoc::Controller { controller: ci, source: si });
            }
        }
        for (vi, scene) in self.visual_scenes.iter().enumerate() {
            insert(&mut index.visual_scenes, &scene.id, vi, "visual scene");
        }
        for (ni, node) in self.library_nodes.iter().enumerate() {
            insert(&mut index.library_nodes, &node.id, ni, "library node");
        }

        fn index_animation(index: &mut DocumentIndex, animation: &AnimationDef, path: &[usize]) {
            for (si, source) in animation.sources.iter().enumerate() {
                index.sources.insert(
                    source.id.clone(),
                    SourceLoc::Animation { path: path.to_vec(), source: si },
                );
            }
            for (ci, child) in animation.children.iter().enumerate() {
                let mut child_path = path.to_vec();
                child_path.push(ci);
                index_animation(index, child, &child_path);
            }
        }
        for (ai, animation) in self.animations.iter().enumerate() {
            index_animation(&mut index, animation, &[ai]);
        }

        self.index = index;
    }

    fn unresolved(url: &str, what: &str) -> CompilerError {
        CompilerError::UnresolvedReference(format!("{what} '{url}' not found in document"))
    }

    pub fn resolve_geometry(&self, url: &str) -> Result<&GeometryDef> {
        self.index
            .geometries
            .get(fragment(url))
            .map(|&i| &self.geometries[i])
            .ok_or_else(|| Self::unresolved(url, "geometry"))
    }

    pub fn resolve_material(&self, url: &str) -> Result<(usize, &MaterialDef)> {
        self.index
            .materials
            .get(fragment(url))
            .map(|&i| (i, &self.materials[i]))
            .ok_or_else(|| Self::unresolved(url, "material"))
    }

    pub fn resolve_effect(&self, url: &str) -> Result<&EffectDef> {
        self.index
            .effects
            .get(fragment(url))
            .map(|&i| &self.effects[i])
            .ok_or_else(|| Self::unresolved(url, "effect"))
    }

    pub fn resolve_image(&self, url: &str) -> Result<&ImageDef> {
        self.index
            .images
            .get(fragment(url))
            .map(|&i| &self.images[i])
            .ok_or_else(|| Self::unresolved(url, "image"))
    }

    pub fn resolve_controller(&self, url: &str) -> Result<&ControllerDef> {
        self.index
            .controllers
            .get(fragment(url))
            .map(|&i| &self.controllers[i])
            .ok_or_else(|| Self::unresolved(url, "controller"))
    }

    pub fn resolve_visual_scene(&self, url: &str) -> Result<&VisualSceneDef> {
        self.index
            .visual_scenes
            .get(fragment(url))
            .map(|&i| &self.visual_scenes[i])
            .ok_or_else(|| Self::unresolved(url, "visual scene"))
    }

    pub fn resolve_library_node(&self, url: &str) -> Result<&SceneNodeDef> {
        self.index
            .library_nodes
            .get(fragment(url))
            .map(|&i| &self.library_nodes[i])
            .ok_or_else(|| Self::unresolved(url, "library node"))
    }

    /// Resolve a vertex-group URL to the group and its owning geometry.
    pub fn resolve_vertex_group(&self, url: &str) -> Result<&VertexGroup> {
        self.index
            .vertex_groups
            .get(fragment(url))
            .map(|&gi| &self.geometries[gi].vertices)
            .ok_or_else(|| Self::unresolved(url, "vertex group"))
    }

    /// Resolve a value-source URL anywhere in the document.
    pub fn resolve_source(&self, url: &str) -> Result<&ValueSource> {
        let loc = self
            .index
            .sources
            .get(fragment(url))
            .ok_or_else(|| Self::unresolved(url, "source"))?;
        Ok(match loc {
            SourceLoc::Geometry { geometry, source } => &self.geometries[*geometry].sources[*source],
            SourceLoc::Controller { controller, source } => {
                &self.controllers[*controller].skin.sources[*source]
            }
            SourceLoc::Animation { path, source } => {
                let mut animation = &self.animations[path[0]];
                for &child in &path[1..] {
                    animation = &animation.children[child];
                }
                &animation.sources[*source]
            }
        })
    }

    /// The root visual scene named by the `scene` field.
    pub fn root_scene(&self) -> Result<&VisualSceneDef> {
        let url = self.scene.as_deref().ok_or_else(|| {
            CompilerError::UnresolvedReference("document declares no root scene".into())
        })?;
        self.resolve_visual_scene(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let doc = SceneDocument::from_json(
            r##"{
                "asset": { "up_axis": "Z_UP", "unit_scale": 0.01 },
                "visual_scenes": [ { "id": "scene", "nodes": [] } ],
                "scene": "#scene"
            }"##,
        )
        .unwrap();

        assert_eq!(doc.asset.up_axis, UpAxis::ZUp);
        assert_eq!(doc.asset.unit_scale, 0.01);
        assert_eq!(doc.root_scene().unwrap().id, "scene");
    }

    #[test]
    fn test_unresolved_reference_fails() {
        let doc = SceneDocument::from_json(r##"{ "scene": "#missing" }"##).unwrap();
        assert!(matches!(
            doc.root_scene(),
            Err(CompilerError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_source_index_spans_libraries() {
        let doc = SceneDocument::from_json(
            r##"{
                "geometries": [ {
                    "id": "g",
                    "sources": [ { "id": "pos", "data": { "values": [0, 0, 0] }, "stride": 3, "params": ["X", "Y", "Z"] } ],
                    "vertices": { "id": "g-verts", "inputs": [ { "semantic": "POSITION", "source": "#pos" } ] },
                    "primitives": []
                } ],
                "animations": [ {
                    "id": "a",
                    "sources": [ { "id": "times", "data": { "values": [0.0, 1.0] }, "stride": 1, "params": ["TIME"] } ],
                    "children": [ {
                        "id": "a-child",
                        "sources": [ { "id": "nested", "data": { "values": [1.0] }, "stride": 1, "params": ["TIME"] } ]
                    } ]
                } ]
            }"##,
        )
        .unwrap();

        assert_eq!(doc.resolve_source("#pos").unwrap().id, "pos");
        assert_eq!(doc.resolve_source("#times").unwrap().id, "times");
        assert_eq!(doc.resolve_source("#nested").unwrap().id, "nested");
        assert_eq!(doc.resolve_vertex_group("#g-verts").unwrap().id, "g-verts");
        assert!(doc.resolve_source("#absent").is_err());
    }
}
