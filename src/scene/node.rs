use glam::{Mat4, Vec3};

use crate::resources::{MaterialHandle, Mesh};

/// A renderable scene-graph node.
///
/// Only the data the renderer needs during traversal is kept here: world
/// transforms for this and the previous frame (for motion vectors), the
/// local-space bounds, and owned children.
///
/// # Hierarchy
///
/// The tree is owned top-down. Scene code is expected to refresh
/// `world_transform` (and roll the previous value into
/// `prev_world_transform`) before pushing the root, see
/// [`SceneNode::update_transforms`].
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub mesh: Option<Mesh>,
    pub material: Option<MaterialHandle>,

    /// Local transform relative to the parent.
    pub transform: Mat4,
    pub world_transform: Mat4,
    pub prev_world_transform: Mat4,

    /// Local-space bounds of `mesh`.
    pub box_min: Vec3,
    pub box_max: Vec3,

    pub children: Vec<SceneNode>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneNode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mesh: None,
            material: None,
            transform: Mat4::IDENTITY,
            world_transform: Mat4::IDENTITY,
            prev_world_transform: Mat4::IDENTITY,
            box_min: Vec3::splat(-1.0),
            box_max: Vec3::splat(1.0),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mesh(mesh: Mesh, material: MaterialHandle) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
            ..Self::new()
        }
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Recomputes world transforms for the whole subtree, keeping the
    /// previous values for motion vectors.
    pub fn update_transforms(&mut self, parent: Mat4) {
        self.prev_world_transform = self.world_transform;
        self.world_transform = parent * self.transform;
        let world = self.world_transform;
        for child in &mut self.children {
            child.update_transforms(world);
        }
    }

    /// World-space AABB enclosing the transformed local bounds.
    #[must_use]
    pub fn world_bounds(&self) -> (Vec3, Vec3) {
        transform_aabb(&self.world_transform, self.box_min, self.box_max)
    }
}

/// Transforms all eight corners of an AABB and returns the enclosing box.
#[must_use]
pub fn transform_aabb(m: &Mat4, min: Vec3, max: Vec3) -> (Vec3, Vec3) {
    let mut out_min = Vec3::splat(f32::MAX);
    let mut out_max = Vec3::splat(f32::MIN);
    for i in 0..8 {
        let corner = Vec3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        );
        let p = m.transform_point3(corner);
        out_min = out_min.min(p);
        out_max = out_max.max(p);
    }
    (out_min, out_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_bounds_follow_translation() {
        let mut node = SceneNode::new();
        node.transform = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        node.update_transforms(Mat4::IDENTITY);
        let (min, max) = node.world_bounds();
        assert_eq!(min, Vec3::new(9.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn previous_transform_rolls_over() {
        let mut root = SceneNode::new();
        root.add_child(SceneNode::new());
        root.transform = Mat4::from_translation(Vec3::X);
        root.update_transforms(Mat4::IDENTITY);
        root.transform = Mat4::from_translation(Vec3::Y);
        root.update_transforms(Mat4::IDENTITY);

        let child = &root.children[0];
        assert_eq!(child.prev_world_transform, Mat4::from_translation(Vec3::X));
        assert_eq!(child.world_transform, Mat4::from_translation(Vec3::Y));
    }
}
