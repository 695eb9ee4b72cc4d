//! Visual scene graph definitions.

use glam::{Mat4, Vec3};
use serde::Deserialize;

/// A visual scene: a list of root nodes.
#[derive(Debug, Clone, Deserialize)]
pub struct VisualSceneDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<SceneNodeDef>,
}

/// A scene-graph node: identity, transform stack, children, instances.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneNodeDef {
    pub id: String,
    /// Symbolic name used by skeleton joint lookup.
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub transforms: Vec<TransformOp>,
    #[serde(default)]
    pub children: Vec<SceneNodeDef>,
    #[serde(default)]
    pub instances: Vec<InstanceDef>,
}

impl SceneNodeDef {
    /// Compose the node's transform stack into one local pose matrix,
    /// applying the operations in declaration order.
    pub fn local_transform(&self) -> Mat4 {
        let mut pose = Mat4::IDENTITY;
        for op in &self.transforms {
            pose *= op.to_matrix();
        }
        pose
    }
}

/// One entry of a node's transform stack.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOp {
    /// 16 floats, row-major.
    Matrix(Vec<f32>),
    Translate([f32; 3]),
    /// Axis (xyz) + angle in degrees.
    Rotate([f32; 4]),
    Scale([f32; 3]),
}

impl TransformOp {
    pub fn to_matrix(&self) -> Mat4 {
        match self {
            TransformOp::Matrix(values) => {
                let mut m = [0.0f32; 16];
                for (i, v) in values.iter().take(16).enumerate() {
                    m[i] = *v;
                }
                // Row-major in the document, column-major in glam.
                Mat4::from_cols_array(&m).transpose()
            }
            TransformOp::Translate(t) => Mat4::from_translation(Vec3::from_array(*t)),
            TransformOp::Rotate([x, y, z, degrees]) => {
                let axis = Vec3::new(*x, *y, *z);
                if axis.length_squared() <= f32::EPSILON {
                    Mat4::IDENTITY
                } else {
                    Mat4::from_axis_angle(axis.normalize(), degrees.to_radians())
                }
            }
            TransformOp::Scale(s) => Mat4::from_scale(Vec3::from_array(*s)),
        }
    }
}

/// Instanced content under a node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceDef {
    Geometry {
        url: String,
        #[serde(default)]
        materials: Vec<SymbolBinding>,
    },
    Controller {
        url: String,
        /// URL of the skeleton root node for joint lookup. Absent means
        /// the whole compiled node set is searched.
        #[serde(default)]
        skeleton: Option<String>,
        #[serde(default)]
        materials: Vec<SymbolBinding>,
    },
    /// Instance of a reusable library node subtree.
    Node { url: String },
}

/// Binds a mesh-local material symbol to a concrete material.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolBinding {
    pub symbol: String,
    /// URL of the bound material.
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_stack_composition() {
        let node: SceneNodeDef = serde_json::from_str(
            r##"{
                "id": "n",
                "transforms": [
                    { "translate": [1, 2, 3] },
                    { "scale": [2, 2, 2] }
                ]
            }"##,
        )
        .unwrap();

        let pose = node.local_transform();
        let p = pose.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        // Scale applies first, then the translation.
        assert!((p - Vec3::new(3.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_matrix_transform_is_row_major() {
        let op = TransformOp::Matrix(vec![
            1.0, 0.0, 0.0, 5.0, //
            0.0, 1.0, 0.0, 6.0, //
            0.0, 0.0, 1.0, 7.0, //
            0.0, 0.0, 0.0, 1.0,
        ]);
        let m = op.to_matrix();
        let p = m.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(5.0, 6.0, 7.0)).length() < 1e-6);
    }

    #[test]
    fn test_parse_instances() {
        let node: SceneNodeDef = serde_json::from_str(
            r##"{
                "id": "n",
                "instances": [
                    { "geometry": { "url": "#g", "materials": [ { "symbol": "mat0", "target": "#red" } ] } },
                    { "controller": { "url": "#skin0", "skeleton": "#hip" } },
                    { "node": { "url": "#shared" } }
                ]
            }"##,
        )
        .unwrap();

        assert_eq!(node.instances.len(), 3);
        assert!(matches!(node.instances[0], InstanceDef::Geometry { .. }));
        assert!(matches!(node.instances[2], InstanceDef::Node { .. }));
    }
}
