//! Directional shadow maps.
//!
//! A fixed pool of depth-only targets, one per shadow-casting directional
//! light. The light-space projection covers a fixed box around the origin,
//! so shadows clip for scenes larger than about 40 units.

use glam::{Mat4, Vec3};

use crate::errors::Result;
use crate::renderer::backend::GraphicsBackend;
use crate::resources::{RenderTarget, RenderTargetDesc, TargetView};

pub const SHADOW_MAP_SIZE: u32 = 2048;
/// Directional lights that can cast shadows in the same frame.
pub const MAX_SHADOW_CASTERS: usize = 4;

const ORTHO_HALF_EXTENT: f32 = 20.0;
const ORTHO_NEAR: f32 = -15.0;
const ORTHO_FAR: f32 = 20.0;
const LIGHT_DISTANCE: f32 = 10.0;

/// View-projection of a directional light looking at the origin.
#[must_use]
pub fn light_space_matrix(direction: Vec3) -> Mat4 {
    let direction = direction.normalize_or(Vec3::NEG_Y);
    let up = if direction.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };

    let projection = Mat4::orthographic_rh(
        -ORTHO_HALF_EXTENT,
        ORTHO_HALF_EXTENT,
        -ORTHO_HALF_EXTENT,
        ORTHO_HALF_EXTENT,
        ORTHO_NEAR,
        ORTHO_FAR,
    );
    let view = Mat4::look_at_rh(-direction * LIGHT_DISTANCE, Vec3::ZERO, up);
    projection * view
}

#[derive(Debug)]
pub struct ShadowPool {
    targets: Vec<RenderTarget>,
}

impl ShadowPool {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Result<Self> {
        let targets = (0..MAX_SHADOW_CASTERS)
            .map(|_| {
                RenderTarget::new(
                    backend,
                    RenderTargetDesc::new("Shadow Map", SHADOW_MAP_SIZE, SHADOW_MAP_SIZE).with_color_attachments(0),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { targets })
    }

    /// Target for the `slot`-th shadow caster of the frame.
    #[must_use]
    pub fn target(&self, slot: usize) -> Option<TargetView> {
        self.targets.get(slot).map(RenderTarget::view)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_centre() {
        let m = light_space_matrix(Vec3::new(-0.3, -1.0, -0.2));
        let p = m.project_point3(Vec3::ZERO);
        assert!(p.x.abs() < 1e-5 && p.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&p.z));
    }

    #[test]
    fn straight_down_light_is_well_formed() {
        let m = light_space_matrix(Vec3::NEG_Y);
        assert!(m.is_finite());
        let p = m.project_point3(Vec3::new(19.0, 0.0, 0.0));
        assert!(p.x.abs() <= 1.0 && p.y.abs() <= 1.0);
    }
}
