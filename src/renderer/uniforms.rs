//! Global per-frame uniform block.
//!
//! Layout mirrors the `Global` block declared by every lighting and forward
//! shader: camera matrices first, then fixed-capacity light arrays. All
//! vectors are `vec4` so the layout is identical under std140 and std430.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::scene::camera::Camera;
use crate::scene::light::{DirectionalLight, PointLight};

/// Directional light slots in the global block.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
/// Point light slots in the global block.
pub const MAX_POINT_LIGHTS: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub view_projection: Mat4,
    pub prev_view_projection: Mat4,
    pub projection: Mat4,
    pub view: Mat4,
    pub inverse_view: Mat4,
    /// xyz = camera world position
    pub camera_position: Vec4,

    /// xyz = direction
    pub dir_light_direction: [Vec4; MAX_DIRECTIONAL_LIGHTS],
    /// xyz = color * intensity
    pub dir_light_color: [Vec4; MAX_DIRECTIONAL_LIGHTS],
    /// xyz = position, w = radius
    pub point_light_position: [Vec4; MAX_POINT_LIGHTS],
    /// xyz = color * intensity
    pub point_light_color: [Vec4; MAX_POINT_LIGHTS],

    pub dir_light_count: u32,
    pub point_light_count: u32,
    pub(crate) __pad: [u32; 2],
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        let mut u = Self::zeroed();
        u.view_projection = Mat4::IDENTITY;
        u.prev_view_projection = Mat4::IDENTITY;
        u.projection = Mat4::IDENTITY;
        u.view = Mat4::IDENTITY;
        u.inverse_view = Mat4::IDENTITY;
        u
    }
}

impl GlobalUniforms {
    /// Builds the block for one frame. Lights past the slot capacity are not
    /// represented; the return value's counts say how many were written.
    #[must_use]
    pub fn build(
        camera: &Camera,
        prev_view_projection: Mat4,
        directional: &[DirectionalLight],
        point: &[PointLight],
    ) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();

        let mut u = Self {
            view_projection: projection * view,
            prev_view_projection,
            projection,
            view,
            inverse_view: view.inverse(),
            camera_position: camera.position.extend(1.0),
            ..Self::default()
        };

        for (i, light) in directional.iter().take(MAX_DIRECTIONAL_LIGHTS).enumerate() {
            u.dir_light_direction[i] = light.direction.extend(0.0);
            u.dir_light_color[i] = light.radiance().extend(1.0);
            u.dir_light_count += 1;
        }

        for (i, light) in point.iter().take(MAX_POINT_LIGHTS).enumerate() {
            u.point_light_position[i] = light.position.extend(light.radius);
            u.point_light_color[i] = light.radiance().extend(1.0);
            u.point_light_count += 1;
        }

        u
    }

    /// Directions of the directional lights written into the block.
    #[must_use]
    pub fn directional_directions(&self) -> Vec<Vec3> {
        self.dir_light_direction[..self.dir_light_count as usize]
            .iter()
            .map(|v| v.truncate())
            .collect()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<GlobalUniforms>() % 16, 0);
    }

    #[test]
    fn point_lights_truncate_to_capacity() {
        let camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        let lights: Vec<PointLight> = (0..10)
            .map(|i| PointLight::new(Vec3::splat(i as f32), Vec3::ONE, 1.0, 2.0))
            .collect();
        let u = GlobalUniforms::build(&camera, Mat4::IDENTITY, &[], &lights);
        assert_eq!(u.point_light_count, MAX_POINT_LIGHTS as u32);
        assert_eq!(u.point_light_position[7], Vec4::new(7.0, 7.0, 7.0, 2.0));
    }
}
