//! Binary model serialisation.
//!
//! Little-endian, explicit counts, length-prefixed strings. Layout:
//! header, nodes, materials, meshes, mesh instances, then (when the
//! header flag is set) animations and clips. Skinned instances carry
//! their joint table inline, announced by the mesh's skinning flags.

use crate::binio::{
    count_u16, write_color, write_f32, write_mat4, write_str, write_u16, write_vec2, write_vec3,
    NO_PARENT,
};
use crate::error::{CompilerError, Result};
use bitflags::bitflags;

use super::types::{MaterialFlags, Mesh, MeshFlags, Model, Vertex, VertexFlags};
use super::{ModelConfig, ModelFormat};

/// Version tag of the binary model layout.
pub const MODEL_VERSION: u16 = 1;

bitflags! {
    /// Header flags of the binary model file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModelFileFlags: u16 {
        /// Welded vertex/index buffers (unset = legacy flat layout).
        const INDEXED = 1 << 0;
        /// An animation/clip section follows the mesh instances.
        const ANIMATIONS = 1 << 1;
    }
}

/// Serialise a finalized model. The returned buffer is the complete
/// file; callers write it in one step so no partial output can exist.
pub fn write_model(model: &Model, config: &ModelConfig) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    let mut flags = ModelFileFlags::empty();
    if config.format == ModelFormat::Indexed {
        flags |= ModelFileFlags::INDEXED;
    }
    if !model.animations.is_empty() || !model.clips.is_empty() {
        flags |= ModelFileFlags::ANIMATIONS;
    }

    write_u16(&mut out, MODEL_VERSION)?;
    write_u16(&mut out, flags.bits())?;
    write_u16(&mut out, count_u16(model.nodes.len(), "node")?)?;
    write_u16(&mut out, count_u16(model.materials.len(), "material")?)?;
    write_u16(&mut out, count_u16(model.meshes.len(), "mesh")?)?;
    write_u16(&mut out, count_u16(model.instances.len(), "mesh instance")?)?;

    for node in &model.nodes {
        write_str(&mut out, &node.id)?;
        write_u16(&mut out, node.parent.map_or(NO_PARENT, |p| p as u16))?;
        write_mat4(&mut out, &node.pose)?;
    }

    for material in &model.materials {
        write_str(&mut out, &material.id)?;
        write_u16(&mut out, material.flags.bits())?;
        write_color(&mut out, material.emissive)?;
        write_color(&mut out, material.ambient)?;
        write_color(&mut out, material.diffuse)?;
        write_color(&mut out, material.specular)?;
        write_f32(&mut out, material.shininess)?;
        if material.flags.contains(MaterialFlags::DIFFUSE_TEXTURE) {
            write_str(&mut out, material.diffuse_texture.as_deref().unwrap_or(""))?;
        }
        if material.flags.contains(MaterialFlags::BUMP_TEXTURE) {
            write_str(&mut out, material.bump_texture.as_deref().unwrap_or(""))?;
        }
    }

    for mesh in &model.meshes {
        write_mesh(&mut out, mesh)?;
    }

    for instance in &model.instances {
        let mesh = &model.meshes[instance.mesh];
        write_u16(&mut out, instance.node as u16)?;
        write_u16(&mut out, instance.mesh as u16)?;
        for part in &mesh.parts {
            let binding = instance
                .bindings
                .iter()
                .find(|b| b.symbol == part.symbol)
                .ok_or_else(|| {
                    CompilerError::MaterialBinding(format!(
                        "mesh '{}': symbol '{}' unbound at write time",
                        mesh.id, part.symbol
                    ))
                })?;
            write_u16(&mut out, binding.material as u16)?;
        }
        if mesh.flags.bone_count() > 0 {
            write_u16(&mut out, count_u16(instance.joints.len(), "joint")?)?;
            for joint in &instance.joints {
                write_u16(&mut out, joint.node as u16)?;
                write_mat4(&mut out, &joint.inv_bind)?;
            }
        }
    }

    if flags.contains(ModelFileFlags::ANIMATIONS) {
        write_u16(&mut out, count_u16(model.animations.len(), "animation")?)?;
        for animation in &model.animations {
            write_str(&mut out, &animation.id)?;
            write_u16(&mut out, count_u16(animation.channels.len(), "channel")?)?;
            for channel in &animation.channels {
                write_u16(&mut out, channel.node as u16)?;
                write_u16(&mut out, count_u16(channel.keyframes.len(), "keyframe")?)?;
                for key in &channel.keyframes {
                    write_f32(&mut out, key.time)?;
                    write_vec3(&mut out, key.scale.to_array())?;
                    let q = key.rotation;
                    write_f32(&mut out, q.x)?;
                    write_f32(&mut out, q.y)?;
                    write_f32(&mut out, q.z)?;
                    write_f32(&mut out, q.w)?;
                    write_vec3(&mut out, key.translation.to_array())?;
                }
            }
        }

        write_u16(&mut out, count_u16(model.clips.len(), "clip")?)?;
        for clip in &model.clips {
            write_str(&mut out, &clip.id)?;
            write_f32(&mut out, clip.start)?;
            write_f32(&mut out, clip.end)?;
            write_u16(&mut out, count_u16(clip.animations.len(), "clip animation")?)?;
            for &animation in &clip.animations {
                write_u16(&mut out, animation as u16)?;
            }
        }
    }

    Ok(out)
}

fn write_mesh(out: &mut Vec<u8>, mesh: &Mesh) -> Result<()> {
    write_str(out, &mesh.id)?;
    write_u16(out, mesh.flags.bits())?;
    write_u16(out, count_u16(mesh.vertices.len(), "vertex")?)?;
    write_u16(out, count_u16(mesh.indices.len(), "index")?)?;
    write_u16(out, count_u16(mesh.parts.len(), "mesh part")?)?;
    write_vec3(out, mesh.bounds.center.to_array())?;
    write_f32(out, mesh.bounds.radius)?;

    for vertex in &mesh.vertices {
        write_vertex(out, vertex, mesh.flags)?;
    }
    for &index in &mesh.indices {
        write_u16(out, index)?;
    }
    for part in &mesh.parts {
        write_u16(out, part.index_start)?;
        write_u16(out, part.index_count)?;
        write_str(out, &part.symbol)?;
    }
    Ok(())
}

/// Vertex fields are written in a fixed order, gated by the mesh flags
/// so every vertex of a mesh has the same byte size.
fn write_vertex(out: &mut Vec<u8>, vertex: &Vertex, flags: MeshFlags) -> Result<()> {
    write_vec3(out, vertex.position)?;
    if flags.contains(MeshFlags::NORMALS) {
        write_vec3(out, vertex.normal)?;
    }
    if flags.contains(MeshFlags::COLORS) {
        out.extend_from_slice(&vertex.color);
    }
    if flags.contains(MeshFlags::TEXCOORDS0) {
        write_vec2(out, vertex.texcoords[0])?;
    }
    if flags.contains(MeshFlags::TEXCOORDS1) {
        write_vec2(out, vertex.texcoords[1])?;
    }

    let bones = flags.bone_count();
    if bones > 0 {
        debug_assert!(vertex.flags.contains(VertexFlags::SKIN));
        for b in 0..bones {
            write_u16(out, vertex.bone_indices.get(b).copied().unwrap_or(0))?;
        }
        for b in 0..bones {
            write_f32(out, vertex.bone_weights.get(b).copied().unwrap_or(0.0))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::finalize;
    use super::super::types::*;
    use super::*;
    use byteorder::{LittleEndian, ReadBytesExt};
    use glam::Mat4;
    use std::io::Cursor;

    fn triangle_model() -> Model {
        let mut model = Model::default();
        model.nodes.push(Node {
            id: "_root".into(),
            sid: None,
            name: "_root".into(),
            pose: Mat4::IDENTITY,
            parent: None,
            children: vec![],
            in_use: false,
        });

        let mut mesh = Mesh::new("tri".into());
        let vertex = |p: [f32; 3]| Vertex {
            position: p,
            normal: [0.0, 0.0, 1.0],
            flags: VertexFlags::NORMAL,
            ..Vertex::default()
        };
        mesh.flags = MeshFlags::NORMALS;
        mesh.soups.push(TriangleSoup {
            symbol: "mat0".into(),
            triangles: vec![[
                vertex([0.0, 0.0, 0.0]),
                vertex([1.0, 0.0, 0.0]),
                vertex([0.0, 1.0, 0.0]),
            ]],
        });
        finalize::finalize_mesh(&mut mesh, ModelFormat::Indexed).unwrap();
        model.meshes.push(mesh);

        model.materials.push(Material {
            id: "red".into(),
            flags: MaterialFlags::empty(),
            emissive: crate::types::Color::BLACK,
            ambient: crate::types::Color::BLACK,
            diffuse: crate::types::Color::new(255, 0, 0, 255),
            specular: crate::types::Color::BLACK,
            shininess: 0.0,
            diffuse_texture: None,
            bump_texture: None,
        });
        model.instances.push(MeshInstance {
            node: 0,
            mesh: 0,
            bindings: vec![MaterialBinding {
                symbol: "mat0".into(),
                material: 0,
            }],
            joints: vec![],
        });
        model
    }

    #[test]
    fn test_header_counts() {
        let model = triangle_model();
        let bytes = write_model(&model, &ModelConfig::default()).unwrap();

        let mut r = Cursor::new(&bytes);
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), MODEL_VERSION);
        let flags = ModelFileFlags::from_bits_truncate(r.read_u16::<LittleEndian>().unwrap());
        assert!(flags.contains(ModelFileFlags::INDEXED));
        assert!(!flags.contains(ModelFileFlags::ANIMATIONS));
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // nodes
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // materials
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // meshes
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // instances
    }

    #[test]
    fn test_root_node_record() {
        let model = triangle_model();
        let bytes = write_model(&model, &ModelConfig::default()).unwrap();

        // Skip the 12-byte header; the first node record follows.
        let mut r = Cursor::new(&bytes[12..]);
        let len = r.read_u16::<LittleEndian>().unwrap() as usize;
        assert_eq!(&bytes[14..14 + len], b"_root");
        r.set_position(2 + len as u64);
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), NO_PARENT);
    }

    #[test]
    fn test_animation_flag_set_when_animated() {
        let mut model = triangle_model();
        model.animations.push(Animation {
            id: "spin".into(),
            channels: vec![],
        });
        let bytes = write_model(&model, &ModelConfig::default()).unwrap();
        let flags = ModelFileFlags::from_bits_truncate(u16::from_le_bytes([bytes[2], bytes[3]]));
        assert!(flags.contains(ModelFileFlags::ANIMATIONS));
    }

    #[test]
    fn test_flat_format_clears_indexed_flag() {
        let model = triangle_model();
        let config = ModelConfig {
            format: ModelFormat::Flat,
            ..ModelConfig::default()
        };
        let bytes = write_model(&model, &config).unwrap();
        let flags = ModelFileFlags::from_bits_truncate(u16::from_le_bytes([bytes[2], bytes[3]]));
        assert!(!flags.contains(ModelFileFlags::INDEXED));
    }
}
