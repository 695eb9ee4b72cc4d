//! Mesh finalization: normal synthesis, vertex welding, bounds and
//! instance-binding validation.

use crate::error::{CompilerError, Result};
use glam::Vec3;

use super::types::{BoundingSphere, MeshPart, Model, VertexFlags};
use super::{Mesh, MeshFlags, ModelConfig, ModelFormat};

/// Largest vertex/index count the 16-bit binary layout can address.
const MAX_BUFFER_LEN: usize = u16::MAX as usize;

pub fn run(model: &mut Model, config: &ModelConfig) -> Result<()> {
    for mesh in &mut model.meshes {
        finalize_mesh(mesh, config.format)?;
    }
    validate_bindings(model)
}

/// Finalize one mesh: synthesize missing normals, weld the triangle
/// soups into indexed buffers (one part per soup), then grow the
/// bounding sphere over the final vertex set.
pub fn finalize_mesh(mesh: &mut Mesh, format: ModelFormat) -> Result<()> {
    synthesize_normals(mesh);
    weld(mesh, format)?;
    mesh.bounds = BoundingSphere::enclosing(mesh.vertices.iter().map(|v| Vec3::from(v.position)));
    Ok(())
}

/// Replace zero normals with flat face normals. A triangle either fully
/// has normals or fully lacks them by construction, so checking the
/// first vertex suffices.
fn synthesize_normals(mesh: &mut Mesh) {
    for soup in &mut mesh.soups {
        for triangle in &mut soup.triangles {
            if triangle[0].normal != [0.0; 3] {
                continue;
            }
            let a = Vec3::from(triangle[0].position);
            let b = Vec3::from(triangle[1].position);
            let c = Vec3::from(triangle[2].position);
            let normal = (b - a).cross(c - a).normalize_or_zero().to_array();
            for vertex in triangle.iter_mut() {
                vertex.normal = normal;
                vertex.flags |= VertexFlags::NORMAL;
            }
        }
    }
    mesh.flags |= MeshFlags::NORMALS;
}

/// Weld duplicate vertices into a single indexed buffer.
///
/// Each vertex does a linear structural-equality scan of the accepted
/// list. That is O(n^2) per mesh — acceptable at current mesh sizes,
/// and the first place to optimize (hash on a canonical field encoding)
/// if they grow.
fn weld(mesh: &mut Mesh, format: ModelFormat) -> Result<()> {
    let mut vertices = Vec::new();
    let mut indices: Vec<u16> = Vec::new();
    let mut parts = Vec::new();

    for soup in &mesh.soups {
        let start = indices.len();
        for triangle in &soup.triangles {
            for vertex in triangle {
                let found = match format {
                    ModelFormat::Indexed => vertices.iter().position(|v| v == vertex),
                    ModelFormat::Flat => None,
                };
                let at = match found {
                    Some(at) => at,
                    None => {
                        vertices.push(vertex.clone());
                        vertices.len() - 1
                    }
                };
                if vertices.len() > MAX_BUFFER_LEN {
                    return Err(CompilerError::MeshTooLarge(format!(
                        "mesh '{}' exceeds {MAX_BUFFER_LEN} vertices",
                        mesh.id
                    )));
                }
                indices.push(at as u16);
                if indices.len() > MAX_BUFFER_LEN {
                    return Err(CompilerError::MeshTooLarge(format!(
                        "mesh '{}' exceeds {MAX_BUFFER_LEN} indices",
                        mesh.id
                    )));
                }
            }
        }
        parts.push(MeshPart {
            index_start: start as u16,
            index_count: (indices.len() - start) as u16,
            symbol: soup.symbol.clone(),
        });
    }

    mesh.vertices = vertices;
    mesh.indices = indices;
    mesh.parts = parts;
    mesh.soups.clear();
    if format == ModelFormat::Flat {
        mesh.flags |= MeshFlags::UNINDEXED;
    }
    Ok(())
}

/// Enforce the binding-map invariant on every instance: exactly one
/// binding per distinct material symbol used by the mesh's parts.
/// Bindings naming a symbol no part uses are warned about and dropped.
fn validate_bindings(model: &mut Model) -> Result<()> {
    let meshes = &model.meshes;
    for instance in &mut model.instances {
        let mesh = &meshes[instance.mesh];
        let symbols = mesh.part_symbols();

        for symbol in &symbols {
            let bound = instance
                .bindings
                .iter()
                .filter(|b| b.symbol == *symbol)
                .count();
            if bound == 0 {
                return Err(CompilerError::MaterialBinding(format!(
                    "mesh '{}': no material bound for symbol '{symbol}'",
                    mesh.id
                )));
            }
            if bound > 1 {
                return Err(CompilerError::MaterialBinding(format!(
                    "mesh '{}': symbol '{symbol}' bound {bound} times",
                    mesh.id
                )));
            }
        }

        instance.bindings.retain(|binding| {
            let used = symbols.contains(&binding.symbol.as_str());
            if !used {
                log::warn!(
                    "mesh '{}': binding for unused symbol '{}' ignored",
                    mesh.id,
                    binding.symbol
                );
            }
            used
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::types::{TriangleSoup, Vertex};
    use super::*;

    fn vertex(position: [f32; 3]) -> Vertex {
        Vertex {
            position,
            normal: [0.0, 0.0, 1.0],
            flags: VertexFlags::NORMAL,
            ..Vertex::default()
        }
    }

    fn quad_mesh() -> Mesh {
        // A unit quad as two triangles sharing the diagonal.
        let v = [
            vertex([0.0, 0.0, 0.0]),
            vertex([1.0, 0.0, 0.0]),
            vertex([1.0, 1.0, 0.0]),
            vertex([0.0, 1.0, 0.0]),
        ];
        let mut mesh = Mesh::new("quad".into());
        mesh.flags = MeshFlags::NORMALS;
        mesh.soups.push(TriangleSoup {
            symbol: "s".into(),
            triangles: vec![
                [v[0].clone(), v[1].clone(), v[2].clone()],
                [v[0].clone(), v[2].clone(), v[3].clone()],
            ],
        });
        mesh
    }

    #[test]
    fn test_quad_welds_to_four_vertices() {
        let mut mesh = quad_mesh();
        finalize_mesh(&mut mesh, ModelFormat::Indexed).unwrap();

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.parts.len(), 1);
        assert_eq!(mesh.parts[0].index_start, 0);
        assert_eq!(mesh.parts[0].index_count, 6);
        assert!(mesh.soups.is_empty());
    }

    #[test]
    fn test_welding_is_idempotent() {
        let mut mesh = quad_mesh();
        finalize_mesh(&mut mesh, ModelFormat::Indexed).unwrap();
        let (vertices, indices) = (mesh.vertices.clone(), mesh.indices.clone());

        // Feed the welded output back through as a soup.
        let mut again = Mesh::new("quad".into());
        again.flags = MeshFlags::NORMALS;
        let triangles = indices
            .chunks(3)
            .map(|tri| {
                [
                    vertices[tri[0] as usize].clone(),
                    vertices[tri[1] as usize].clone(),
                    vertices[tri[2] as usize].clone(),
                ]
            })
            .collect();
        again.soups.push(TriangleSoup {
            symbol: "s".into(),
            triangles,
        });
        finalize_mesh(&mut again, ModelFormat::Indexed).unwrap();

        assert_eq!(again.vertices.len(), vertices.len());
        assert_eq!(again.indices, indices);
    }

    #[test]
    fn test_flat_format_skips_welding() {
        let mut mesh = quad_mesh();
        finalize_mesh(&mut mesh, ModelFormat::Flat).unwrap();

        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert!(mesh.flags.contains(MeshFlags::UNINDEXED));
    }

    #[test]
    fn test_zero_normals_get_face_normal() {
        let mut mesh = Mesh::new("m".into());
        let mut v0 = vertex([0.0, 0.0, 0.0]);
        let mut v1 = vertex([1.0, 0.0, 0.0]);
        let mut v2 = vertex([0.0, 1.0, 0.0]);
        for v in [&mut v0, &mut v1, &mut v2] {
            v.normal = [0.0; 3];
        }
        mesh.soups.push(TriangleSoup {
            symbol: "s".into(),
            triangles: vec![[v0, v1, v2]],
        });
        finalize_mesh(&mut mesh, ModelFormat::Indexed).unwrap();

        for v in &mesh.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_bounding_sphere_contains_every_vertex() {
        let mut mesh = quad_mesh();
        finalize_mesh(&mut mesh, ModelFormat::Indexed).unwrap();
        for v in &mesh.vertices {
            assert!(mesh.bounds.contains(Vec3::from(v.position), 1e-4));
        }
    }

    #[test]
    fn test_single_triangle_scenario() {
        // Scenario: 3 unique vertices, one block, one symbol.
        let mut mesh = Mesh::new("tri".into());
        mesh.soups.push(TriangleSoup {
            symbol: "mat0".into(),
            triangles: vec![[
                vertex([0.0, 0.0, 0.0]),
                vertex([2.0, 0.0, 0.0]),
                vertex([0.0, 2.0, 0.0]),
            ]],
        });
        finalize_mesh(&mut mesh, ModelFormat::Indexed).unwrap();

        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
        assert_eq!(mesh.parts.len(), 1);
        assert_eq!(mesh.parts[0].symbol, "mat0");
        assert!(mesh.bounds.radius > 0.0);
    }

    mod bindings {
        use super::super::super::types::{MaterialBinding, MeshInstance, Node};
        use super::*;
        use glam::Mat4;

        fn model_with_bindings(bindings: Vec<MaterialBinding>) -> Model {
            let mut model = Model::default();
            model.nodes.push(Node {
                id: "_root".into(),
                sid: None,
                name: "_root".into(),
                pose: Mat4::IDENTITY,
                parent: None,
                children: Vec::new(),
                in_use: false,
            });
            let mut mesh = quad_mesh();
            finalize_mesh(&mut mesh, ModelFormat::Indexed).unwrap();
            model.meshes.push(mesh);
            model.instances.push(MeshInstance {
                node: 0,
                mesh: 0,
                bindings,
                joints: Vec::new(),
            });
            model
        }

        #[test]
        fn test_missing_binding_is_fatal() {
            let mut model = model_with_bindings(vec![]);
            assert!(matches!(
                validate_bindings(&mut model),
                Err(CompilerError::MaterialBinding(_))
            ));
        }

        #[test]
        fn test_duplicate_binding_is_fatal() {
            let mut model = model_with_bindings(vec![
                MaterialBinding { symbol: "s".into(), material: 0 },
                MaterialBinding { symbol: "s".into(), material: 1 },
            ]);
            assert!(matches!(
                validate_bindings(&mut model),
                Err(CompilerError::MaterialBinding(_))
            ));
        }

        #[test]
        fn test_binding_for_unknown_symbol_dropped_with_warning() {
            let mut model = model_with_bindings(vec![
                MaterialBinding { symbol: "s".into(), material: 0 },
                MaterialBinding { symbol: "ghost".into(), material: 0 },
            ]);
            validate_bindings(&mut model).unwrap();
            assert_eq!(model.instances[0].bindings.len(), 1);
            assert_eq!(model.instances[0].bindings[0].symbol, "s");
        }
    }
}
