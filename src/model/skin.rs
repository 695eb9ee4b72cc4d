//! Skin controller compilation.
//!
//! A skin deep-clones its source geometry's un-finalized triangle soups
//! and overwrites the per-vertex bone fields: every source vertex's
//! influence list is forced to the target bone count, weight-normalized,
//! and copied onto every triangle vertex sharing that source identity.

use crate::error::{CompilerError, Result};
use crate::scene::sampler::{sample_shared, InfluenceSample};
use crate::scene::{ControllerDef, SceneDocument, Semantic};
use glam::Mat4;

use super::mat4_from_row_major;
use super::types::{Mesh, MeshFlags, VertexFlags};

/// Joint metadata carried from the controller to its instances.
#[derive(Debug, Clone, Default)]
pub struct SkinMeta {
    /// Ordered joint names, matched against node SIDs at instance time.
    pub joint_names: Vec<String>,
    /// Inverse bind pose per joint, identity when undeclared.
    pub inv_binds: Vec<Mat4>,
}

/// Compile a skin controller against its already-built source mesh.
pub fn compile_controller(
    doc: &SceneDocument,
    def: &ControllerDef,
    source_mesh: &Mesh,
    target_bones: usize,
) -> Result<(Mesh, SkinMeta)> {
    let skin = &def.skin;
    let meta = read_joints(doc, def)?;
    let influences = read_influences(doc, def, target_bones)?;

    let mut mesh = source_mesh.clone();
    mesh.id = def.id.clone();
    mesh.flags |= MeshFlags::skin_scheme(target_bones);

    let bind_shape = skin
        .bind_shape_matrix
        .as_ref()
        .map(|values| mat4_from_row_major(values))
        .unwrap_or(Mat4::IDENTITY);
    let apply_bind_shape = bind_shape != Mat4::IDENTITY;

    for soup in &mut mesh.soups {
        for triangle in &mut soup.triangles {
            for vertex in triangle.iter_mut() {
                let source_vertex = vertex.source_vertex as usize;
                let (indices, weights) = influences.get(source_vertex).ok_or_else(|| {
                    CompilerError::IndexOutOfRange(format!(
                        "skin '{}': source vertex {source_vertex} has no influence entry \
                         (controller declares {})",
                        def.id,
                        influences.len()
                    ))
                })?;
                vertex.bone_indices = indices.clone();
                vertex.bone_weights = weights.clone();
                vertex.flags |= VertexFlags::SKIN;

                if apply_bind_shape {
                    let p = bind_shape.transform_point3(vertex.position.into());
                    vertex.position = p.to_array();
                    if vertex.normal != [0.0; 3] {
                        let n = bind_shape.transform_vector3(vertex.normal.into());
                        vertex.normal = n.normalize_or_zero().to_array();
                    }
                }
            }
        }
    }

    Ok((mesh, meta))
}

fn read_joints(doc: &SceneDocument, def: &ControllerDef) -> Result<SkinMeta> {
    let mut meta = SkinMeta::default();
    for input in &def.skin.joints.inputs {
        match input.semantic {
            Semantic::Joint => {
                let source = doc.resolve_source(&input.source)?;
                meta.joint_names = (0..source.count())
                    .map(|i| source.name(i).map(str::to_string))
                    .collect::<Result<_>>()?;
            }
            Semantic::InvBindMatrix => {
                let source = doc.resolve_source(&input.source)?;
                meta.inv_binds = (0..source.count())
                    .map(|i| source.element(i).map(|m| mat4_from_row_major(&m)))
                    .collect::<Result<_>>()?;
            }
            other => log::warn!(
                "skin '{}': ignoring joints input with semantic {other:?}",
                def.id
            ),
        }
    }
    if meta.joint_names.is_empty() {
        return Err(CompilerError::InvalidGeometry(format!(
            "skin '{}' declares no joints",
            def.id
        )));
    }
    Ok(meta)
}

fn read_influences(
    doc: &SceneDocument,
    def: &ControllerDef,
    target_bones: usize,
) -> Result<Vec<(Vec<u16>, Vec<f32>)>> {
    let weights_table = &def.skin.vertex_weights;
    if weights_table.vcount.len() != weights_table.count {
        return Err(CompilerError::InvalidGeometry(format!(
            "skin '{}': vcount length {} does not match declared vertex count {}",
            def.id,
            weights_table.vcount.len(),
            weights_table.count
        )));
    }

    let indices: Vec<u32> = weights_table
        .v
        .iter()
        .map(|&i| {
            u32::try_from(i).map_err(|_| {
                CompilerError::InvalidGeometry(format!(
                    "skin '{}': negative bone index {i} is unsupported",
                    def.id
                ))
            })
        })
        .collect::<Result<_>>()?;

    let mut influences = Vec::with_capacity(weights_table.count);
    let mut cursor = 0;
    for &declared in &weights_table.vcount {
        let mut bones: Vec<(u16, f32)> = Vec::with_capacity(declared as usize);
        for _ in 0..declared {
            let mut sample = InfluenceSample::default();
            cursor += sample_shared(doc, &indices, cursor, &weights_table.inputs, &mut sample)?;

            let joint = sample.joint_index.ok_or_else(|| {
                CompilerError::InvalidGeometry(format!(
                    "skin '{}': influence is missing a joint binding",
                    def.id
                ))
            })?;
            let weight = sample.weight.ok_or_else(|| {
                CompilerError::InvalidGeometry(format!(
                    "skin '{}': influence is missing a weight binding",
                    def.id
                ))
            })?;
            bones.push((joint as u16, weight));
        }

        force_bone_count(&mut bones, target_bones);
        normalize_weights(&mut bones);
        influences.push(bones.into_iter().unzip());
    }
    Ok(influences)
}

/// Force an influence list to exactly `target` entries: iteratively drop
/// the single lowest-weight bone while over capacity (ties keep the
/// first encountered), and pad with (index 0, weight 0) while under.
pub fn force_bone_count(bones: &mut Vec<(u16, f32)>, target: usize) {
    while bones.len() > target {
        let mut lowest = 0;
        for i in 1..bones.len() {
            if bones[i].1 < bones[lowest].1 {
                lowest = i;
            }
        }
        bones.remove(lowest);
    }
    while bones.len() < target {
        bones.push((0, 0.0));
    }
}

/// Normalize weights to sum to 1. A vertex whose total weight is exactly
/// zero is left unnormalized.
pub fn normalize_weights(bones: &mut [(u16, f32)]) {
    let total: f32 = bones.iter().map(|b| b.1).sum();
    if total != 0.0 {
        for bone in bones {
            bone.1 /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::geometry::compile_geometry;

    fn skinned_document(vcount: &str, v: &str) -> SceneDocument {
        SceneDocument::from_json(&format!(
            r##"{{
                "geometries": [ {{
                    "id": "g",
                    "sources": [
                        {{ "id": "pos", "data": {{ "values": [0,0,0, 1,0,0, 0,1,0] }}, "stride": 3, "params": ["X","Y","Z"] }}
                    ],
                    "vertices": {{ "id": "gv", "inputs": [ {{ "semantic": "POSITION", "source": "#pos" }} ] }},
                    "primitives": [ {{
                        "type": "triangles",
                        "inputs": [ {{ "semantic": "VERTEX", "source": "#gv", "offset": 0 }} ],
                        "indices": [0, 1, 2]
                    }} ]
                }} ],
                "controllers": [ {{
                    "id": "skin0",
                    "skin": {{
                        "source": "#g",
                        "sources": [
                            {{ "id": "jn", "data": {{ "names": ["a", "b", "c", "d", "e"] }} }},
                            {{ "id": "w", "data": {{ "values": [0.1, 0.2, 0.3, 0.4, 0.05] }}, "params": ["WEIGHT"] }}
                        ],
                        "joints": {{ "inputs": [ {{ "semantic": "JOINT", "source": "#jn" }} ] }},
                        "vertex_weights": {{
                            "count": 3,
                            "inputs": [
                                {{ "semantic": "JOINT", "source": "#jn", "offset": 0 }},
                                {{ "semantic": "WEIGHT", "source": "#w", "offset": 1 }}
                            ],
                            "vcount": {vcount},
                            "v": {v}
                        }}
                    }}
                }} ]
            }}"##
        ))
        .unwrap()
    }

    fn compile(doc: &SceneDocument, target_bones: usize) -> Result<(Mesh, SkinMeta)> {
        let mesh = compile_geometry(doc, &doc.geometries[0]).unwrap();
        compile_controller(doc, &doc.controllers[0], &mesh, target_bones)
    }

    #[test]
    fn test_bone_count_forced_to_target() {
        // Vertex 0: five bones, vertex 1: one bone, vertex 2: two bones.
        let doc = skinned_document(
            "[5, 1, 2]",
            "[0,0, 1,1, 2,2, 3,3, 4,4,  0,3,  1,1, 2,2]",
        );
        let (mesh, _) = compile(&doc, 4).unwrap();

        for soup in &mesh.soups {
            for triangle in &soup.triangles {
                for vertex in triangle {
                    assert_eq!(vertex.bone_indices.len(), 4);
                    assert_eq!(vertex.bone_weights.len(), 4);
                    assert!(vertex.flags.contains(VertexFlags::SKIN));
                }
            }
        }

        // Vertex 0 had weights .1 .2 .3 .4 .05; the .05 entry (bone 4)
        // is dropped as the lowest.
        let v0 = &mesh.soups[0].triangles[0][0];
        assert!(!v0.bone_indices.contains(&4));
        let total: f32 = v0.bone_weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_weights_normalized_and_padded() {
        let doc = skinned_document("[1, 1, 1]", "[0,0, 1,1, 2,2]");
        let (mesh, _) = compile(&doc, 4).unwrap();

        let v1 = &mesh.soups[0].triangles[0][1];
        // One real bone (weight normalized to 1) plus three zero pads.
        assert_eq!(v1.bone_indices, vec![1, 0, 0, 0]);
        assert!((v1.bone_weights[0] - 1.0).abs() < 1e-6);
        assert_eq!(&v1.bone_weights[1..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_negative_bone_index_is_fatal() {
        let doc = skinned_document("[1, 1, 1]", "[-1,0, 1,1, 2,2]");
        assert!(matches!(
            compile(&doc, 4),
            Err(CompilerError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_zero_total_weight_left_unnormalized() {
        let mut bones = vec![(0u16, 0.0f32), (1, 0.0)];
        normalize_weights(&mut bones);
        assert_eq!(bones[0].1, 0.0);
        assert_eq!(bones[1].1, 0.0);
    }

    #[test]
    fn test_lowest_weight_tie_drops_first() {
        let mut bones = vec![(7u16, 0.5f32), (8, 0.25), (9, 0.25)];
        force_bone_count(&mut bones, 2);
        assert_eq!(bones, vec![(7, 0.5), (9, 0.25)]);
    }

    #[test]
    fn test_joint_names_read_in_order() {
        let doc = skinned_document("[1, 1, 1]", "[0,0, 1,1, 2,2]");
        let (_, meta) = compile(&doc, 4).unwrap();
        assert_eq!(meta.joint_names, vec!["a", "b", "c", "d", "e"]);
    }
}
