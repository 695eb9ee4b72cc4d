//! Geometry compilation: primitive blocks into per-symbol triangle soups.

use crate::error::{CompilerError, Result};
use crate::scene::sampler::{sample_shared, VertexSample};
use crate::scene::{GeometryDef, PrimitiveBlock, PrimitiveKind, SceneDocument};
use crate::types::Color;

use super::types::{Mesh, MeshFlags, Vertex, VertexFlags, UNASSIGNED_SYMBOL};

/// Compile one geometry into an un-finalized mesh of triangle soups.
pub fn compile_geometry(doc: &SceneDocument, def: &GeometryDef) -> Result<Mesh> {
    let mut mesh = Mesh::new(def.id.clone());
    for block in &def.primitives {
        match block.kind {
            PrimitiveKind::Triangles => compile_triangles(doc, def, block, &mut mesh)?,
            PrimitiveKind::Polylist => compile_polylist(doc, def, block, &mut mesh)?,
            PrimitiveKind::Trifans | PrimitiveKind::Tristrips => {
                return Err(CompilerError::InvalidGeometry(format!(
                    "geometry '{}': unsupported primitive topology {:?}",
                    def.id, block.kind
                )))
            }
        }
    }
    Ok(mesh)
}

fn compile_triangles(
    doc: &SceneDocument,
    def: &GeometryDef,
    block: &PrimitiveBlock,
    mesh: &mut Mesh,
) -> Result<()> {
    let symbol = block.material.as_deref().unwrap_or(UNASSIGNED_SYMBOL);
    let mut cursor = 0;
    let mut triangle: Vec<Vertex> = Vec::with_capacity(3);

    while cursor < block.indices.len() {
        let (vertex, consumed) = sample_vertex(doc, def, block, cursor)?;
        cursor += consumed;
        triangle.push(vertex);
        if triangle.len() == 3 {
            let v2 = triangle.pop().unwrap();
            let v1 = triangle.pop().unwrap();
            let v0 = triangle.pop().unwrap();
            add_triangle(mesh, &def.id, symbol, [v0, v1, v2])?;
        }
    }

    if !triangle.is_empty() {
        return Err(CompilerError::InvalidGeometry(format!(
            "geometry '{}': triangle block index table is not a whole number of triangles",
            def.id
        )));
    }
    Ok(())
}

/// Fan-triangulate each N-gon around its first vertex: the first vertex
/// is held, and each new sample closes a triangle against the previous
/// one.
fn compile_polylist(
    doc: &SceneDocument,
    def: &GeometryDef,
    block: &PrimitiveBlock,
    mesh: &mut Mesh,
) -> Result<()> {
    let symbol = block.material.as_deref().unwrap_or(UNASSIGNED_SYMBOL);
    let vcounts = block.vcount.as_ref().ok_or_else(|| {
        CompilerError::InvalidGeometry(format!(
            "geometry '{}': polygon list without vertex counts",
            def.id
        ))
    })?;

    let mut cursor = 0;
    for &n in vcounts {
        if n < 3 {
            return Err(CompilerError::InvalidGeometry(format!(
                "geometry '{}': polygon with {n} vertices",
                def.id
            )));
        }

        let (first, consumed) = sample_vertex(doc, def, block, cursor)?;
        cursor += consumed;
        let (mut previous, consumed) = sample_vertex(doc, def, block, cursor)?;
        cursor += consumed;

        for _ in 2..n {
            let (current, consumed) = sample_vertex(doc, def, block, cursor)?;
            cursor += consumed;
            add_triangle(mesh, &def.id, symbol, [first.clone(), previous, current.clone()])?;
            previous = current;
        }
    }
    Ok(())
}

fn sample_vertex(
    doc: &SceneDocument,
    def: &GeometryDef,
    block: &PrimitiveBlock,
    cursor: usize,
) -> Result<(Vertex, usize)> {
    let mut sample = VertexSample::new();
    let consumed = sample_shared(doc, &block.indices, cursor, &block.inputs, &mut sample)?;
    Ok((vertex_from_sample(&def.id, &sample)?, consumed))
}

/// Map sampled named values onto vertex fields.
///
/// Texture coordinate V is flipped (source convention is bottom-left
/// origin, runtime is top-left); colors are clamped to [0, 1] and scaled
/// to bytes. Normals are always carried: vertices sampled without one
/// hold a zero normal that finalization replaces with a face normal.
fn vertex_from_sample(geometry: &str, sample: &VertexSample) -> Result<Vertex> {
    if !sample.has_position {
        return Err(CompilerError::InvalidGeometry(format!(
            "geometry '{geometry}': sampled vertex has no position"
        )));
    }

    let mut flags = VertexFlags::NORMAL;
    let mut vertex = Vertex {
        position: sample.position,
        normal: if sample.has_normal { sample.normal } else { [0.0; 3] },
        source_vertex: sample.source_vertex,
        ..Vertex::default()
    };

    if sample.has_color {
        let c = Color::from_f32(sample.color);
        vertex.color = [c.r, c.g, c.b, c.a];
        flags |= VertexFlags::COLOR;
    }
    for set in 0..2 {
        if sample.has_texcoord[set] {
            let [s, t] = sample.texcoords[set];
            vertex.texcoords[set] = [s, 1.0 - t];
            flags |= if set == 0 {
                VertexFlags::TEXCOORD0
            } else {
                VertexFlags::TEXCOORD1
            };
        }
    }

    vertex.flags = flags;
    Ok(vertex)
}

/// Append a triangle to the mesh's soup for `symbol`, enforcing that
/// every vertex in the mesh carries the same optional-channel set.
fn add_triangle(mesh: &mut Mesh, geometry: &str, symbol: &str, triangle: [Vertex; 3]) -> Result<()> {
    for vertex in &triangle {
        let channels = MeshFlags::from_vertex_channels(vertex.flags);
        if mesh.soups.iter().all(|s| s.triangles.is_empty()) {
            mesh.flags |= channels;
        } else if mesh.flags & channel_mask() != channels {
            return Err(CompilerError::MixedVertexFormat(geometry.to_string()));
        }
    }
    mesh.soup_mut(symbol).triangles.push(triangle);
    Ok(())
}

fn channel_mask() -> MeshFlags {
    MeshFlags::NORMALS | MeshFlags::COLORS | MeshFlags::TEXCOORDS0 | MeshFlags::TEXCOORDS1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(primitives: &str) -> SceneDocument {
        SceneDocument::from_json(&format!(
            r##"{{
                "geometries": [ {{
                    "id": "g",
                    "sources": [
                        {{ "id": "pos", "data": {{ "values": [0,0,0, 1,0,0, 1,1,0, 0,1,0, 2,0,0] }}, "stride": 3, "params": ["X","Y","Z"] }},
                        {{ "id": "uv", "data": {{ "values": [0,0, 1,0, 1,1, 0,1] }}, "stride": 2, "params": ["S","T"] }}
                    ],
                    "vertices": {{ "id": "gv", "inputs": [ {{ "semantic": "POSITION", "source": "#pos" }} ] }},
                    "primitives": [ {primitives} ]
                }} ]
            }}"##
        ))
        .unwrap()
    }

    #[test]
    fn test_triangles_block() {
        let doc = document(
            r##"{ "type": "triangles", "material": "skin",
                 "inputs": [ { "semantic": "VERTEX", "source": "#gv", "offset": 0 } ],
                 "indices": [0, 1, 2] }"##,
        );
        let mesh = compile_geometry(&doc, &doc.geometries[0]).unwrap();

        assert_eq!(mesh.soups.len(), 1);
        assert_eq!(mesh.soups[0].symbol, "skin");
        assert_eq!(mesh.soups[0].triangles.len(), 1);
        assert_eq!(mesh.soups[0].triangles[0][1].position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pentagon_fans_into_three_triangles() {
        let doc = document(
            r##"{ "type": "polylist",
                 "inputs": [ { "semantic": "VERTEX", "source": "#gv", "offset": 0 } ],
                 "vcount": [5],
                 "indices": [0, 1, 2, 3, 4] }"##,
        );
        let mesh = compile_geometry(&doc, &doc.geometries[0]).unwrap();

        let triangles = &mesh.soups[0].triangles;
        assert_eq!(triangles.len(), 3);
        // Every fan triangle shares the polygon's first vertex.
        for triangle in triangles {
            assert_eq!(triangle[0].position, [0.0, 0.0, 0.0]);
        }
        assert_eq!(triangles[1][1].position, triangles[0][2].position);
    }

    #[test]
    fn test_degenerate_polygon_is_fatal() {
        let doc = document(
            r##"{ "type": "polylist",
                 "inputs": [ { "semantic": "VERTEX", "source": "#gv", "offset": 0 } ],
                 "vcount": [2],
                 "indices": [0, 1] }"##,
        );
        assert!(matches!(
            compile_geometry(&doc, &doc.geometries[0]),
            Err(CompilerError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_strip_topology_is_fatal() {
        let doc = document(
            r##"{ "type": "tristrips",
                 "inputs": [ { "semantic": "VERTEX", "source": "#gv", "offset": 0 } ],
                 "indices": [0, 1, 2] }"##,
        );
        assert!(matches!(
            compile_geometry(&doc, &doc.geometries[0]),
            Err(CompilerError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_texcoord_v_is_flipped() {
        let doc = document(
            r##"{ "type": "triangles",
                 "inputs": [
                    { "semantic": "VERTEX", "source": "#gv", "offset": 0 },
                    { "semantic": "TEXCOORD", "source": "#uv", "offset": 1 }
                 ],
                 "indices": [0,0, 1,1, 2,2] }"##,
        );
        let mesh = compile_geometry(&doc, &doc.geometries[0]).unwrap();
        let triangle = &mesh.soups[0].triangles[0];
        // Source (1, 1) lands as (1, 0) after the vertical flip.
        assert_eq!(triangle[2].texcoords[0], [1.0, 0.0]);
        assert!(mesh.flags.contains(MeshFlags::TEXCOORDS0));
    }

    #[test]
    fn test_mixed_channel_sets_rejected() {
        let doc = document(
            r##"{ "type": "triangles",
                 "inputs": [ { "semantic": "VERTEX", "source": "#gv", "offset": 0 } ],
                 "indices": [0, 1, 2] },
               { "type": "triangles",
                 "inputs": [
                    { "semantic": "VERTEX", "source": "#gv", "offset": 0 },
                    { "semantic": "TEXCOORD", "source": "#uv", "offset": 1 }
                 ],
                 "indices": [0,0, 1,1, 2,2] }"##,
        );
        assert!(matches!(
            compile_geometry(&doc, &doc.geometries[0]),
            Err(CompilerError::MixedVertexFormat(_))
        ));
    }

    #[test]
    fn test_unassigned_symbol_for_untagged_block() {
        let doc = document(
            r##"{ "type": "triangles",
                 "inputs": [ { "semantic": "VERTEX", "source": "#gv", "offset": 0 } ],
                 "indices": [0, 1, 2] }"##,
        );
        let mesh = compile_geometry(&doc, &doc.geometries[0]).unwrap();
        assert_eq!(mesh.soups[0].symbol, UNASSIGNED_SYMBOL);
    }
}
