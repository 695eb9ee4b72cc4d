//! Skin controller definitions.

use super::source::{SharedInput, UnsharedInput, ValueSource};
use serde::Deserialize;

/// A controller library entry. Only skin controllers exist in this
/// pipeline; morph targets were never part of the runtime format.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub skin: SkinDef,
}

/// A skin: binds an already-declared geometry's vertices to a skeleton
/// via per-vertex joint/weight lists and per-joint inverse bind poses.
#[derive(Debug, Clone, Deserialize)]
pub struct SkinDef {
    /// URL of the source geometry.
    pub source: String,
    /// Optional bind-shape matrix (16 floats, row-major).
    #[serde(default)]
    pub bind_shape_matrix: Option<Vec<f32>>,
    #[serde(default)]
    pub sources: Vec<ValueSource>,
    pub joints: JointsDef,
    pub vertex_weights: VertexWeightsDef,
}

/// Joint bindings: JOINT (name array) and INV_BIND_MATRIX (16-float
/// stride) inputs read in lockstep.
#[derive(Debug, Clone, Deserialize)]
pub struct JointsDef {
    pub inputs: Vec<UnsharedInput>,
}

/// Per-vertex influence table. `vcount[i]` influences for source vertex
/// `i`, each influence consuming one run of the shared-input index table
/// `v`.
#[derive(Debug, Clone, Deserialize)]
pub struct VertexWeightsDef {
    pub count: usize,
    pub inputs: Vec<SharedInput>,
    pub vcount: Vec<u32>,
    /// Raw index table. Kept signed so negative bone indices can be
    /// detected and rejected instead of wrapping.
    pub v: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skin_controller() {
        let json = r##"{
            "id": "skin0",
            "skin": {
                "source": "#mesh0",
                "sources": [
                    { "id": "jointNames", "data": { "names": ["hip", "knee"] } },
                    { "id": "weights", "data": { "values": [0.75, 0.25] }, "params": ["WEIGHT"] }
                ],
                "joints": {
                    "inputs": [ { "semantic": "JOINT", "source": "#jointNames" } ]
                },
                "vertex_weights": {
                    "count": 1,
                    "inputs": [
                        { "semantic": "JOINT", "source": "#jointNames", "offset": 0 },
                        { "semantic": "WEIGHT", "source": "#weights", "offset": 1 }
                    ],
                    "vcount": [2],
                    "v": [0, 0, 1, 1]
                }
            }
        }"##;

        let controller: ControllerDef = serde_json::from_str(json).unwrap();
        assert_eq!(controller.skin.source, "#mesh0");
        assert_eq!(controller.skin.vertex_weights.vcount, vec![2]);
        assert_eq!(controller.skin.vertex_weights.v.len(), 4);
    }
}
