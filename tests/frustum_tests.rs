//! Camera, Frustum and Culling Tests
//!
//! Tests for:
//! - View/projection matrices and cached frustum refresh
//! - Frustum-sphere and frustum-AABB intersection
//! - Conservative culling through the command buffer
//! - World-space bounds of transformed nodes

use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use umbra::renderer::backend::FramebufferId;
use umbra::resources::{Material, MaterialHandle, MaterialType, Mesh, MeshId, ShaderId, Topology};
use umbra::scene::transform_aabb;
use umbra::{Camera, CommandBucket, CommandBuffer};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Camera at the origin looking down -Z, near 0.1, far 100.
fn camera() -> Camera {
    Camera::new_perspective(60.0, 1.0, 0.1, 100.0)
}

fn mesh() -> Mesh {
    Mesh { id: MeshId(1), topology: Topology::Triangles, element_count: 36, indexed: true }
}

fn push_box(
    buffer: &mut CommandBuffer,
    handles: &mut SlotMap<MaterialHandle, ()>,
    material: &Material,
    min: Vec3,
    max: Vec3,
    target: Option<FramebufferId>,
) -> CommandBucket {
    buffer.push(Some(mesh()), handles.insert(()), material, Mat4::IDENTITY, Mat4::IDENTITY, min, max, target)
}

// ============================================================================
// Camera
// ============================================================================

#[test]
fn view_projection_maps_forward_point_inside_ndc() {
    let cam = camera();
    let p = cam.view_projection().project_point3(Vec3::new(0.0, 0.0, -10.0));
    assert!(approx(p.x, 0.0) && approx(p.y, 0.0));
    assert!((0.0..=1.0).contains(&p.z), "depth outside [0, 1]: {}", p.z);
}

#[test]
fn look_to_refreshes_frustum() {
    let mut cam = camera();
    assert!(cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 0.5));

    cam.look_to(Vec3::ZERO, Vec3::Z, Vec3::Y);
    assert!(!cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 0.5));
    assert!(cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 0.5));
}

#[test]
fn with_aspect_keeps_pose() {
    let mut cam = camera();
    cam.look_to(Vec3::new(1.0, 2.0, 3.0), Vec3::NEG_X, Vec3::Y);
    let wide = cam.with_aspect(2.0);
    assert_eq!(wide.position, cam.position);
    assert_eq!(wide.view_matrix(), cam.view_matrix());
    assert!(approx(wide.aspect, 2.0));
    assert_ne!(wide.projection_matrix(), cam.projection_matrix());
}

// ============================================================================
// Frustum Intersection
// ============================================================================

#[test]
fn sphere_beyond_far_plane_is_rejected() {
    let cam = camera();
    assert!(!cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, -110.0), 1.0));
    assert!(cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, -100.5), 1.0));
}

#[test]
fn box_straddling_side_plane_is_kept() {
    let cam = camera();
    // 60 degree fov: the left plane crosses x = -5.77 at z = -10
    let min = Vec3::new(-8.0, -1.0, -11.0);
    let max = Vec3::new(-5.0, 1.0, -9.0);
    assert!(cam.frustum().intersects_box(min, max));
}

#[test]
fn box_fully_outside_is_rejected() {
    let cam = camera();
    assert!(!cam.frustum().intersects_box(Vec3::new(20.0, -1.0, -11.0), Vec3::new(22.0, 1.0, -9.0)));
    assert!(!cam.frustum().intersects_box(Vec3::new(-1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, 3.0)));
}

#[test]
fn box_containing_camera_is_kept() {
    let cam = camera();
    assert!(cam.frustum().intersects_box(Vec3::splat(-50.0), Vec3::splat(50.0)));
}

// ============================================================================
// Command Buffer Culling
// ============================================================================

#[test]
fn culling_never_drops_visible_commands() {
    let cam = camera();
    let mut handles = SlotMap::with_key();
    let mut buffer = CommandBuffer::new();
    let material = Material::new(ShaderId(1), MaterialType::Default);

    // Visible, straddling, outside
    push_box(&mut buffer, &mut handles, &material, Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0), None);
    push_box(&mut buffer, &mut handles, &material, Vec3::new(-8.0, -1.0, -11.0), Vec3::new(-5.0, 1.0, -9.0), None);
    push_box(&mut buffer, &mut handles, &material, Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 7.0), None);

    assert_eq!(buffer.deferred_render_commands(None).len(), 3);
    assert_eq!(buffer.deferred_render_commands(Some(cam.frustum())).len(), 2);
    assert_eq!(buffer.shadow_cast_render_commands().len(), 3);
}

#[test]
fn user_target_commands_are_not_culled() {
    let cam = camera();
    let mut handles = SlotMap::with_key();
    let mut buffer = CommandBuffer::new();
    let material = Material::new(ShaderId(1), MaterialType::Custom);
    let behind = (Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 7.0));
    let mirror = Some(FramebufferId(42));

    assert_eq!(
        push_box(&mut buffer, &mut handles, &material, behind.0, behind.1, mirror),
        CommandBucket::Custom(mirror)
    );
    push_box(&mut buffer, &mut handles, &material, behind.0, behind.1, None);

    assert_eq!(buffer.custom_render_commands(mirror, Some(cam.frustum())).len(), 1);
    assert!(buffer.custom_render_commands(None, Some(cam.frustum())).is_empty());
    assert!(buffer.custom_render_commands(Some(FramebufferId(7)), None).is_empty());
}

#[test]
fn alpha_commands_are_culled() {
    let cam = camera();
    let mut handles = SlotMap::with_key();
    let mut buffer = CommandBuffer::new();
    let mut material = Material::new(ShaderId(1), MaterialType::Custom);
    material.state.blend = true;

    push_box(&mut buffer, &mut handles, &material, Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 7.0), None);
    assert_eq!(buffer.alpha_render_commands(None).len(), 1);
    assert!(buffer.alpha_render_commands(Some(cam.frustum())).is_empty());
}

// ============================================================================
// Bounds
// ============================================================================

#[test]
fn rotated_bounds_enclose_all_corners() {
    let m = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
    let (min, max) = transform_aabb(&m, Vec3::splat(-1.0), Vec3::splat(1.0));
    let half_diagonal = 2f32.sqrt();
    assert!(approx(max.x, half_diagonal) && approx(min.x, -half_diagonal));
    assert!(approx(max.y, 1.0) && approx(min.y, -1.0));
}
