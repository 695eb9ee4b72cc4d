//! Dead-content elimination.
//!
//! Three independently toggleable passes that must run in dependency
//! order: unused meshes, then unused materials, then unused nodes.
//! With all three disabled the model is left untouched, so an
//! unoptimized build is byte-for-byte identical to a build that never
//! ran this module.

use std::collections::HashSet;

use super::{Model, ModelConfig};

pub fn run(model: &mut Model, config: &ModelConfig) {
    if config.remove_unused_meshes {
        remove_unused_meshes(model);
    }
    if config.remove_unused_materials {
        remove_unused_materials(model);
    }
    if config.remove_unused_nodes {
        remove_unused_nodes(model);
    }
}

/// Build the old-index -> new-index map for the kept entries, preserving
/// their relative order. `None` marks a removed entry.
fn remap_table(count: usize, keep: impl Fn(usize) -> bool) -> Vec<Option<usize>> {
    let mut table = vec![None; count];
    let mut next = 0;
    for (old, slot) in table.iter_mut().enumerate() {
        if keep(old) {
            *slot = Some(next);
            next += 1;
        }
    }
    table
}

fn remove_unused_meshes(model: &mut Model) {
    let used: HashSet<usize> = model.instances.iter().map(|i| i.mesh).collect();
    let table = remap_table(model.meshes.len(), |at| used.contains(&at));

    let mut at = 0;
    model.meshes.retain(|mesh| {
        let keep = table[at].is_some();
        if !keep {
            log::debug!("removing unused mesh '{}'", mesh.id);
        }
        at += 1;
        keep
    });
    for instance in &mut model.instances {
        instance.mesh = table[instance.mesh].expect("instanced mesh kept");
    }
}

fn remove_unused_materials(model: &mut Model) {
    let used: HashSet<usize> = model
        .instances
        .iter()
        .flat_map(|i| i.bindings.iter().map(|b| b.material))
        .collect();
    let table = remap_table(model.materials.len(), |at| used.contains(&at));

    let mut at = 0;
    model.materials.retain(|material| {
        let keep = table[at].is_some();
        if !keep {
            log::debug!("removing unused material '{}'", material.id);
        }
        at += 1;
        keep
    });
    for instance in &mut model.instances {
        for binding in &mut instance.bindings {
            binding.material = table[binding.material].expect("bound material kept");
        }
    }
}

/// Propagate an in-use flag up from every node directly carrying an
/// instance (and from skinned instances' joints, which the runtime
/// skeleton needs), then prune everything still unused. An ancestor is
/// in use whenever any descendant is.
fn remove_unused_nodes(model: &mut Model) {
    for node in &mut model.nodes {
        node.in_use = false;
    }
    for instance in &model.instances {
        let at = instance.node;
        model.nodes[at].in_use = true;
        for joint in &instance.joints {
            model.nodes[joint.node].in_use = true;
        }
    }

    propagate(model, Model::ROOT);
    model.nodes[Model::ROOT].in_use = true;

    let table = remap_table(model.nodes.len(), |at| model.nodes[at].in_use);

    let mut at = 0;
    model.nodes.retain(|node| {
        let keep = table[at].is_some();
        if !keep {
            log::debug!("removing unused node '{}'", node.id);
        }
        at += 1;
        keep
    });

    for node in &mut model.nodes {
        // A kept node's parent is always kept: in-use propagates upward.
        node.parent = node.parent.map(|p| table[p].expect("parent kept"));
        node.children = node
            .children
            .iter()
            .filter_map(|&child| table[child])
            .collect();
    }
    for instance in &mut model.instances {
        instance.node = table[instance.node].expect("instanced node kept");
        for joint in &mut instance.joints {
            joint.node = table[joint.node].expect("joint node kept");
        }
    }
    for animation in &mut model.animations {
        animation.channels.retain_mut(|channel| match table[channel.node] {
            Some(new) => {
                channel.node = new;
                true
            }
            None => {
                log::warn!(
                    "animation '{}' targeted a pruned node; dropping its channel",
                    animation.id
                );
                false
            }
        });
    }
}

/// Post-order traversal returning the subtree's in-use state up the
/// call stack.
fn propagate(model: &mut Model, at: usize) -> bool {
    let children = model.nodes[at].children.clone();
    let mut any = model.nodes[at].in_use;
    for child in children {
        any |= propagate(model, child);
    }
    model.nodes[at].in_use = any;
    any
}

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use super::*;
    use glam::Mat4;

    fn node(id: &str, parent: Option<usize>) -> Node {
        Node {
            id: id.to_string(),
            sid: None,
            name: id.to_string(),
            pose: Mat4::IDENTITY,
            parent,
            children: Vec::new(),
            in_use: false,
        }
    }

    fn material(id: &str) -> Material {
        Material {
            id: id.to_string(),
            flags: MaterialFlags::empty(),
            emissive: crate::types::Color::BLACK,
            ambient: crate::types::Color::BLACK,
            diffuse: crate::types::Color::WHITE,
            specular: crate::types::Color::BLACK,
            shininess: 0.0,
            diffuse_texture: None,
            bump_texture: None,
        }
    }

    /// root -> a -> b (instance), root -> c (nothing).
    fn test_model() -> Model {
        let mut model = Model::default();
        model.nodes.push(node("_root", None));
        model.nodes.push(node("a", Some(0)));
        model.nodes.push(node("b", Some(1)));
        model.nodes.push(node("c", Some(0)));
        model.nodes[0].children = vec![1, 3];
        model.nodes[1].children = vec![2];

        model.meshes.push(Mesh::new("used".into()));
        model.meshes.push(Mesh::new("unused".into()));
        model.materials.push(material("used"));
        model.materials.push(material("unused"));

        model.instances.push(MeshInstance {
            node: 2,
            mesh: 0,
            bindings: vec![MaterialBinding {
                symbol: "s".into(),
                material: 0,
            }],
            joints: Vec::new(),
        });
        model
    }

    #[test]
    fn test_unused_mesh_and_material_removed() {
        let mut model = test_model();
        run(&mut model, &ModelConfig::default());

        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].id, "used");
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.instances[0].mesh, 0);
        assert_eq!(model.instances[0].bindings[0].material, 0);
    }

    #[test]
    fn test_unused_node_pruned_and_detached() {
        let mut model = test_model();
        run(&mut model, &ModelConfig::default());

        // "c" carried nothing and goes away; the chain to the instance stays.
        assert_eq!(model.nodes.len(), 3);
        assert!(model.nodes.iter().all(|n| n.id != "c"));
        assert_eq!(model.nodes[0].children, vec![1]);
        assert_eq!(model.instances[0].node, 2);
        assert_eq!(model.nodes[2].parent, Some(1));
    }

    #[test]
    fn test_disabled_passes_leave_model_unchanged() {
        let mut model = test_model();
        let config = ModelConfig {
            remove_unused_meshes: false,
            remove_unused_materials: false,
            remove_unused_nodes: false,
            ..ModelConfig::default()
        };
        run(&mut model, &config);

        assert_eq!(model.nodes.len(), 4);
        assert_eq!(model.meshes.len(), 2);
        assert_eq!(model.materials.len(), 2);
    }

    #[test]
    fn test_joint_nodes_survive_pruning() {
        let mut model = test_model();
        // Make "c" a joint of the skinned instance.
        model.instances[0].joints = vec![JointLink {
            node: 3,
            inv_bind: Mat4::IDENTITY,
        }];
        run(&mut model, &ModelConfig::default());

        assert!(model.nodes.iter().any(|n| n.id == "c"));
        let joint = model.instances[0].joints[0].node;
        assert_eq!(model.nodes[joint].id, "c");
    }
}
