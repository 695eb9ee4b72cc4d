//! The 3D scene/model compiler.
//!
//! Consumes a [`SceneDocument`] and emits a single self-contained binary
//! model. The pipeline is strictly sequential:
//! `Generation -> Optimization -> Finalization -> DependencyProcessing
//! -> Write`; any stage failure aborts the whole asset build.

pub mod geometry;
pub mod material;
pub mod optimize;
pub mod finalize;
pub mod skin;
pub mod types;
pub mod writer;

pub use types::{
    Animation, AnimationChannel, AnimationClip, BoundingSphere, JointLink, Keyframe, Material,
    MaterialBinding, MaterialFlags, Mesh, MeshFlags, MeshInstance, MeshPart, Model, Node,
    TriangleSoup, Vertex, VertexFlags, UNASSIGNED_SYMBOL,
};

use crate::build::{BuildContext, CancelToken, ParameterBag};
use crate::error::{CompilerError, Result};
use crate::scene::{
    fragment, AnimChannelDef, AnimationDef, InstanceDef, SceneDocument, SceneNodeDef, Semantic,
    SymbolBinding, UpAxis,
};
use crate::types::Color;
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

/// Which binary mesh layout to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Welded vertex/index buffers (the current runtime format).
    Indexed,
    /// Legacy flat layout: unwelded vertices, sequential indices.
    Flat,
}

/// Model-compiler configuration, read from the build parameter bag.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub format: ModelFormat,
    pub scale: f32,
    /// Rotation around X, Y, Z in degrees.
    pub rotate: Vec3,
    pub pre_translate: Vec3,
    pub post_translate: Vec3,
    pub remove_unused_meshes: bool,
    pub remove_unused_materials: bool,
    pub remove_unused_nodes: bool,
    pub max_bones: usize,
    pub default_diffuse: Color,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            format: ModelFormat::Indexed,
            scale: 1.0,
            rotate: Vec3::ZERO,
            pre_translate: Vec3::ZERO,
            post_translate: Vec3::ZERO,
            remove_unused_meshes: true,
            remove_unused_materials: true,
            remove_unused_nodes: true,
            max_bones: 4,
            default_diffuse: Color::MAGENTA,
        }
    }
}

impl ModelConfig {
    /// Read the configuration from build parameters, substituting the
    /// documented default for every absent key.
    pub fn from_params(params: &ParameterBag) -> Result<Self> {
        let defaults = Self::default();

        let format = match params.get_str("Model Format", "indexed") {
            "indexed" => ModelFormat::Indexed,
            "flat" => ModelFormat::Flat,
            other => {
                return Err(CompilerError::InvalidScalar(format!(
                    "unknown Model Format '{other}' (expected 'indexed' or 'flat')"
                )))
            }
        };

        let max_bones = params.get_int("Max Bones Per Vertex", 4);
        if !matches!(max_bones, 1 | 2 | 4) {
            return Err(CompilerError::InvalidScalar(format!(
                "Max Bones Per Vertex must be 1, 2 or 4, got {max_bones}"
            )));
        }

        let default_diffuse = {
            let text = params.get_str("Default Diffuse Color", "255,0,255,255");
            Color::parse(text).ok_or_else(|| {
                CompilerError::InvalidScalar(format!(
                    "Default Diffuse Color '{text}' is not 'r,g,b,a'"
                ))
            })?
        };

        Ok(Self {
            format,
            scale: params.get_float("Scale", defaults.scale),
            rotate: Vec3::new(
                params.get_float("Rotate X", 0.0),
                params.get_float("Rotate Y", 0.0),
                params.get_float("Rotate Z", 0.0),
            ),
            pre_translate: Vec3::new(
                params.get_float("Pre-Translate X", 0.0),
                params.get_float("Pre-Translate Y", 0.0),
                params.get_float("Pre-Translate Z", 0.0),
            ),
            post_translate: Vec3::new(
                params.get_float("Post-Translate X", 0.0),
                params.get_float("Post-Translate Y", 0.0),
                params.get_float("Post-Translate Z", 0.0),
            ),
            remove_unused_meshes: params.get_bool("Remove Unused Meshes", true),
            remove_unused_materials: params.get_bool("Remove Unused Materials", true),
            remove_unused_nodes: params.get_bool("Remove Unused Nodes", true),
            max_bones: max_bones as usize,
            default_diffuse,
        })
    }
}

/// The model compiler entry point.
pub struct ModelCompiler;

impl ModelCompiler {
    /// Process one scene document into a binary model file.
    pub fn process(ctx: &mut BuildContext) -> Result<()> {
        let config = ModelConfig::from_params(&ctx.params)?;
        let doc = SceneDocument::from_path(ctx.input_path())?;
        let model = Self::compile(&doc, &config, &ctx.cancel)?;

        // DependencyProcessing: queue referenced textures for their own
        // builds before the model itself is written.
        for m in &model.materials {
            for texture in [&m.diffuse_texture, &m.bump_texture].into_iter().flatten() {
                ctx.registrar.register(&ctx.content_root.join(texture));
            }
        }

        let bytes = writer::write_model(&model, &config)?;
        ctx.cancel.check()?;
        ctx.write_output(&ctx.output_path("model"), &bytes)
    }

    /// Run generation, optimization and finalization without touching
    /// the filesystem.
    pub fn compile(doc: &SceneDocument, config: &ModelConfig, cancel: &CancelToken) -> Result<Model> {
        cancel.check()?;
        let mut model = generate(doc, config, cancel)?;
        cancel.check()?;
        optimize::run(&mut model, config);
        cancel.check()?;
        finalize::run(&mut model, config)?;
        Ok(model)
    }
}

/// Interpret 16 floats as a row-major 4x4 matrix.
pub(crate) fn mat4_from_row_major(values: &[f32]) -> Mat4 {
    let mut m = [0.0f32; 16];
    for (i, v) in values.iter().take(16).enumerate() {
        m[i] = *v;
    }
    Mat4::from_cols_array(&m).transpose()
}

/// The root transform: up-axis correction x unit-scale correction x the
/// user transform parameters composed in fixed order (pre-translate,
/// scale, rotate X, rotate Y, rotate Z, post-translate).
fn root_transform(doc: &SceneDocument, config: &ModelConfig) -> Mat4 {
    let up = match doc.asset.up_axis {
        UpAxis::YUp => Mat4::IDENTITY,
        UpAxis::ZUp => Mat4::from_rotation_x(-FRAC_PI_2),
        UpAxis::XUp => Mat4::from_rotation_z(FRAC_PI_2),
    };

    let unit = if (doc.asset.unit_scale - 1.0).abs() > f32::EPSILON {
        Mat4::from_scale(Vec3::splat(doc.asset.unit_scale))
    } else {
        Mat4::IDENTITY
    };

    let user = Mat4::from_translation(config.post_translate)
        * Mat4::from_rotation_z(config.rotate.z.to_radians())
        * Mat4::from_rotation_y(config.rotate.y.to_radians())
        * Mat4::from_rotation_x(config.rotate.x.to_radians())
        * Mat4::from_scale(Vec3::splat(config.scale))
        * Mat4::from_translation(config.pre_translate);

    up * unit * user
}

/// A skinned instance whose joint mapping is resolved once the whole
/// node set exists.
struct PendingSkin {
    instance: usize,
    controller: String,
    skeleton: Option<String>,
}

struct Generator<'a> {
    doc: &'a SceneDocument,
    config: &'a ModelConfig,
    model: Model,
    /// Geometry/controller id -> compiled mesh index.
    mesh_ids: HashMap<String, usize>,
    /// Scene node id -> compiled node index.
    node_ids: HashMap<String, usize>,
    /// Animation id -> compiled animation index.
    anim_ids: HashMap<String, usize>,
    skin_meta: HashMap<String, skin::SkinMeta>,
    default_material: Option<usize>,
    pending_skins: Vec<PendingSkin>,
}

fn generate(doc: &SceneDocument, config: &ModelConfig, cancel: &CancelToken) -> Result<Model> {
    let mut generator = Generator {
        doc,
        config,
        model: Model::default(),
        mesh_ids: HashMap::new(),
        node_ids: HashMap::new(),
        anim_ids: HashMap::new(),
        skin_meta: HashMap::new(),
        default_material: None,
        pending_skins: Vec::new(),
    };

    // Synthetic root node carrying the global transform parameters.
    generator.model.nodes.push(Node {
        id: "_root".to_string(),
        sid: None,
        name: "_root".to_string(),
        pose: root_transform(doc, config),
        parent: None,
        children: Vec::new(),
        in_use: false,
    });

    // Materials before geometry, geometry before controllers: skins
    // clone already-built meshes.
    generator.model.materials = material::compile_materials(doc)?;
    cancel.check()?;

    for def in &doc.geometries {
        let mesh = geometry::compile_geometry(doc, def)?;
        generator.register_mesh(&def.id, mesh);
    }
    cancel.check()?;

    for def in &doc.controllers {
        let source = doc.resolve_geometry(&def.skin.source)?;
        let source_mesh = *generator.mesh_ids.get(&source.id).ok_or_else(|| {
            CompilerError::UnresolvedReference(format!(
                "controller '{}' references uncompiled geometry '{}'",
                def.id, source.id
            ))
        })?;
        let (mesh, meta) =
            skin::compile_controller(doc, def, &generator.model.meshes[source_mesh], config.max_bones)?;
        generator.register_mesh(&def.id, mesh);
        generator.skin_meta.insert(def.id.clone(), meta);
    }
    cancel.check()?;

    if doc.scene.is_some() {
        let scene = doc.root_scene()?;
        for node in &scene.nodes {
            generator.compile_node(node, Model::ROOT)?;
        }
    } else {
        log::warn!("document declares no root scene; compiling libraries only");
    }
    generator.resolve_pending_skins()?;
    cancel.check()?;

    for def in &doc.animations {
        generator.compile_animation(def)?;
    }
    for def in &doc.clips {
        let animations = def
            .animations
            .iter()
            .map(|url| {
                generator.anim_ids.get(fragment(url)).copied().ok_or_else(|| {
                    CompilerError::UnresolvedReference(format!(
                        "clip '{}' references unknown animation '{url}'",
                        def.id
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        generator.model.clips.push(AnimationClip {
            id: def.id.clone(),
            start: def.start,
            end: def.end,
            animations,
        });
    }

    Ok(generator.model)
}

impl<'a> Generator<'a> {
    fn register_mesh(&mut self, id: &str, mesh: Mesh) {
        let at = self.model.meshes.len();
        self.model.meshes.push(mesh);
        if self.mesh_ids.insert(id.to_string(), at).is_some() {
            log::warn!("duplicate mesh id '{id}', keeping the later one");
        }
    }

    fn compile_node(&mut self, def: &SceneNodeDef, parent: usize) -> Result<()> {
        let at = self.model.nodes.len();
        self.model.nodes.push(Node {
            id: def.id.clone(),
            sid: def.sid.clone(),
            name: def.name.clone().unwrap_or_else(|| def.id.clone()),
            pose: def.local_transform(),
            parent: Some(parent),
            children: Vec::new(),
            in_use: false,
        });
        self.model.nodes[parent].children.push(at);
        self.node_ids.insert(def.id.clone(), at);

        for instance in &def.instances {
            match instance {
                InstanceDef::Geometry { url, materials } => {
                    let mesh = self.resolve_mesh(url)?;
                    let bindings = self.build_bindings(mesh, materials)?;
                    self.model.instances.push(MeshInstance {
                        node: at,
                        mesh,
                        bindings,
                        joints: Vec::new(),
                    });
                }
                InstanceDef::Controller { url, skeleton, materials } => {
                    let controller = fragment(url).to_string();
                    if !self.skin_meta.contains_key(&controller) {
                        return Err(CompilerError::UnresolvedReference(format!(
                            "instance references unknown controller '{url}'"
                        )));
                    }
                    let mesh = self.resolve_mesh(url)?;
                    let bindings = self.build_bindings(mesh, materials)?;
                    let instance = self.model.instances.len();
                    self.model.instances.push(MeshInstance {
                        node: at,
                        mesh,
                        bindings,
                        joints: Vec::new(),
                    });
                    self.pending_skins.push(PendingSkin {
                        instance,
                        controller,
                        skeleton: skeleton.clone(),
                    });
                }
                InstanceDef::Node { url } => {
                    let referenced = self.doc.resolve_library_node(url)?.clone();
                    self.compile_node(&referenced, at)?;
                }
            }
        }

        for child in &def.children {
            self.compile_node(child, at)?;
        }
        Ok(())
    }

    fn resolve_mesh(&self, url: &str) -> Result<usize> {
        self.mesh_ids.get(fragment(url)).copied().ok_or_else(|| {
            CompilerError::UnresolvedReference(format!("instance references unknown mesh '{url}'"))
        })
    }

    fn build_bindings(&mut self, mesh: usize, materials: &[SymbolBinding]) -> Result<Vec<MaterialBinding>> {
        let mut bindings = Vec::with_capacity(materials.len());
        for binding in materials {
            let (material, _) = self.doc.resolve_material(&binding.target)?;
            bindings.push(MaterialBinding {
                symbol: binding.symbol.clone(),
                material,
            });
        }

        // Soups from untagged primitive blocks bind the default material.
        let has_unassigned = self.model.meshes[mesh]
            .soups
            .iter()
            .any(|s| s.symbol == UNASSIGNED_SYMBOL);
        if has_unassigned && !bindings.iter().any(|b| b.symbol == UNASSIGNED_SYMBOL) {
            let material = self.default_material_index();
            bindings.push(MaterialBinding {
                symbol: UNASSIGNED_SYMBOL.to_string(),
                material,
            });
        }
        Ok(bindings)
    }

    /// The default material, created on first use.
    fn default_material_index(&mut self) -> usize {
        if let Some(at) = self.default_material {
            return at;
        }
        let at = self.model.materials.len();
        self.model
            .materials
            .push(material::default_material(self.config.default_diffuse));
        self.default_material = Some(at);
        at
    }

    fn resolve_pending_skins(&mut self) -> Result<()> {
        for pending in std::mem::take(&mut self.pending_skins) {
            let meta = &self.skin_meta[&pending.controller];
            let search_root = match &pending.skeleton {
                Some(url) => Some(*self.node_ids.get(fragment(url)).ok_or_else(|| {
                    CompilerError::UnresolvedReference(format!(
                        "skeleton root '{url}' not found in compiled scene"
                    ))
                })?),
                None => None,
            };

            let mut joints = Vec::with_capacity(meta.joint_names.len());
            for (at, name) in meta.joint_names.iter().enumerate() {
                let node = self.find_joint(search_root, name).ok_or_else(|| {
                    CompilerError::UnresolvedReference(format!(
                        "joint '{name}' of controller '{}' not found in skeleton",
                        pending.controller
                    ))
                })?;
                joints.push(JointLink {
                    node,
                    inv_bind: meta.inv_binds.get(at).copied().unwrap_or(Mat4::IDENTITY),
                });
            }
            self.model.instances[pending.instance].joints = joints;
        }
        Ok(())
    }

    fn find_joint(&self, root: Option<usize>, sid: &str) -> Option<usize> {
        match root {
            Some(root) => self.find_in_subtree(root, sid),
            None => self
                .model
                .nodes
                .iter()
                .position(|n| n.sid.as_deref() == Some(sid)),
        }
    }

    fn find_in_subtree(&self, node: usize, sid: &str) -> Option<usize> {
        if self.model.nodes[node].sid.as_deref() == Some(sid) {
            return Some(node);
        }
        self.model.nodes[node]
            .children
            .iter()
            .find_map(|&child| self.find_in_subtree(child, sid))
    }

    fn compile_animation(&mut self, def: &AnimationDef) -> Result<()> {
        let mut channels = Vec::with_capacity(def.channels.len());
        for channel in &def.channels {
            channels.push(self.compile_channel(def, channel)?);
        }

        let at = self.model.animations.len();
        self.model.animations.push(Animation {
            id: def.id.clone(),
            channels,
        });
        self.anim_ids.insert(def.id.clone(), at);

        for child in &def.children {
            self.compile_animation(child)?;
        }
        Ok(())
    }

    /// Sample a channel's keyframe times and pose matrices, decomposing
    /// each matrix into scale, rotation and translation. The
    /// decomposition order matches the engine's composition order.
    fn compile_channel(&self, owner: &AnimationDef, def: &AnimChannelDef) -> Result<AnimationChannel> {
        let node = *self.node_ids.get(fragment(&def.target)).ok_or_else(|| {
            CompilerError::UnresolvedReference(format!(
                "animation '{}' targets unknown node '{}'",
                owner.id, def.target
            ))
        })?;

        let mut times = None;
        let mut outputs = None;
        for input in &def.inputs {
            match input.semantic {
                Semantic::Input => times = Some(self.doc.resolve_source(&input.source)?),
                Semantic::Output => outputs = Some(self.doc.resolve_source(&input.source)?),
                Semantic::Interpolation => {}
                other => log::warn!(
                    "animation '{}': ignoring channel input with semantic {other:?}",
                    owner.id
                ),
            }
        }
        let times = times.ok_or_else(|| {
            CompilerError::UnresolvedReference(format!(
                "animation '{}' channel has no INPUT source",
                owner.id
            ))
        })?;
        let outputs = outputs.ok_or_else(|| {
            CompilerError::UnresolvedReference(format!(
                "animation '{}' channel has no OUTPUT source",
                owner.id
            ))
        })?;
        if outputs.stride != 16 {
            return Err(CompilerError::InvalidScalar(format!(
                "animation '{}': output source '{}' must hold 4x4 matrices (stride 16)",
                owner.id, outputs.id
            )));
        }

        let mut keyframes = Vec::with_capacity(times.count());
        for k in 0..times.count() {
            let time = times.float(k, 0)?;
            let pose = mat4_from_row_major(&outputs.element(k)?);
            let (scale, rotation, translation) = pose.to_scale_rotation_translation();
            keyframes.push(Keyframe {
                time,
                scale,
                rotation,
                translation,
            });
        }

        Ok(AnimationChannel { node, keyframes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::ParameterBag;

    #[test]
    fn test_config_defaults() {
        let config = ModelConfig::from_params(&ParameterBag::new()).unwrap();
        assert_eq!(config.format, ModelFormat::Indexed);
        assert_eq!(config.scale, 1.0);
        assert_eq!(config.max_bones, 4);
        assert!(config.remove_unused_nodes);
        assert_eq!(config.default_diffuse, Color::MAGENTA);
    }

    #[test]
    fn test_config_rejects_bad_bone_count() {
        let mut params = ParameterBag::new();
        params.set("Max Bones Per Vertex", crate::build::ParamValue::Int(3));
        assert!(ModelConfig::from_params(&params).is_err());
    }

    #[test]
    fn test_root_transform_z_up() {
        let doc = SceneDocument::from_json(r##"{ "asset": { "up_axis": "Z_UP" } }"##).unwrap();
        let m = root_transform(&doc, &ModelConfig::default());
        // The document's up axis (Z) must land on engine up (Y).
        let up = m.transform_vector3(Vec3::Z);
        assert!((up - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_root_transform_user_order() {
        let doc = SceneDocument::from_json("{}").unwrap();
        let config = ModelConfig {
            scale: 2.0,
            pre_translate: Vec3::new(1.0, 0.0, 0.0),
            post_translate: Vec3::new(0.0, 5.0, 0.0),
            ..ModelConfig::default()
        };
        let m = root_transform(&doc, &config);
        // Pre-translate applies before the scale, post-translate after.
        let p = m.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(2.0, 5.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_generate_builds_synthetic_root() {
        let doc = SceneDocument::from_json(
            r##"{
                "visual_scenes": [ { "id": "s", "nodes": [
                    { "id": "a", "children": [ { "id": "b" } ] }
                ] } ],
                "scene": "#s"
            }"##,
        )
        .unwrap();
        let model = generate(&doc, &ModelConfig::default(), &CancelToken::new()).unwrap();

        assert_eq!(model.nodes.len(), 3);
        assert_eq!(model.nodes[0].id, "_root");
        assert_eq!(model.nodes[1].parent, Some(0));
        assert_eq!(model.nodes[2].parent, Some(1));
        assert_eq!(model.nodes[0].children, vec![1]);
    }

    #[test]
    fn test_cancellation_aborts_compile() {
        let doc = SceneDocument::from_json("{}").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            ModelCompiler::compile(&doc, &ModelConfig::default(), &cancel),
            Err(CompilerError::Cancelled)
        ));
    }
}
