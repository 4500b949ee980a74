//! Image-Based Lighting Tests
//!
//! Tests for:
//! - BRDF LUT and default sky capture at construction
//! - Equirectangular and cube processing (allocation and cleanup)
//! - Irradiance probe queries and clearing
//! - Cube-face cameras and prefilter roughness

use glam::Vec3;

use umbra::renderer::backend::GraphicsBackend;
use umbra::renderer::headless::BackendCall;
use umbra::renderer::pbr::{
    cube_face_camera, prefilter_roughness, BRDF_LUT_SIZE, IRRADIANCE_SIZE, PREFILTER_MIP_LEVELS, PREFILTER_SIZE,
};
use umbra::resources::{primitives, CubeFace, TextureDesc, TextureKind};
use umbra::{HeadlessBackend, PBR};

const EPSILON: f32 = 1e-5;

fn setup() -> (HeadlessBackend, PBR) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut backend = HeadlessBackend::new();
    let quad = backend.create_mesh(&primitives::screen_quad()).expect("quad");
    let cube = backend.create_mesh(&primitives::unit_cube()).expect("cube");
    let sphere = backend.create_mesh(&primitives::uv_sphere(32, 32)).expect("sphere");
    let pbr = PBR::new(&mut backend, quad, cube, sphere).expect("pbr");
    (backend, pbr)
}

fn source_cube(backend: &mut HeadlessBackend) -> umbra::resources::TextureId {
    backend.create_texture(&TextureDesc::new_cube("Source", 64, wgpu::TextureFormat::Rgba16Float))
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn brdf_lut_is_two_channel_float() {
    let (backend, pbr) = setup();
    let lut = backend.texture(pbr.brdf_lut()).expect("live lut");
    assert_eq!(lut.format, wgpu::TextureFormat::Rg16Float);
    assert_eq!((lut.width, lut.height), (BRDF_LUT_SIZE, BRDF_LUT_SIZE));
}

#[test]
fn default_sky_is_baked_with_prefilter() {
    let (backend, pbr) = setup();
    let sky = pbr.sky_capture();
    assert!(sky.radius.is_infinite());

    let irradiance = backend.texture(sky.irradiance).expect("live irradiance");
    assert_eq!(irradiance.kind, TextureKind::Cube);
    assert_eq!(irradiance.width, IRRADIANCE_SIZE);

    let prefiltered = backend.texture(sky.prefiltered.expect("prefiltered")).expect("live prefilter");
    assert_eq!(prefiltered.width, PREFILTER_SIZE);
    assert_eq!(prefiltered.mip_level_count, PREFILTER_MIP_LEVELS);
}

// ============================================================================
// Processing
// ============================================================================

#[test]
fn process_cube_without_prefilter_allocates_irradiance_only() {
    let (mut backend, mut pbr) = setup();
    let source = source_cube(&mut backend);
    let before = backend.live_texture_count();

    let capture = pbr.process_cube(&mut backend, source, false);
    assert_eq!(capture.prefiltered, None);
    assert_eq!(backend.live_texture_count(), before + 1);
}

#[test]
fn prefilter_renders_every_mip_face() {
    let (mut backend, mut pbr) = setup();
    let source = source_cube(&mut backend);
    backend.take_calls();

    let capture = pbr.process_cube(&mut backend, source, true);
    let prefiltered = capture.prefiltered.expect("prefiltered");

    let mips: Vec<u32> = backend
        .calls()
        .iter()
        .filter_map(|c| match c {
            BackendCall::AttachCubeFace { cubemap, mip, .. } if *cubemap == prefiltered => Some(*mip),
            _ => None,
        })
        .collect();
    assert_eq!(mips.len(), 6 * PREFILTER_MIP_LEVELS as usize);
    assert_eq!(mips.iter().copied().max(), Some(PREFILTER_MIP_LEVELS - 1));
}

#[test]
fn equirectangular_frees_intermediate_cube() {
    let (mut backend, mut pbr) = setup();
    let equirect = backend.create_texture(&TextureDesc::new_2d("HDR", 512, 256, wgpu::TextureFormat::Rgba32Float));
    let before = backend.live_texture_count();

    let capture = pbr.process_equirectangular(&mut backend, equirect);
    assert!(capture.prefiltered.is_some());
    // irradiance + prefiltered; the environment cube is gone
    assert_eq!(backend.live_texture_count(), before + 2);
}

#[test]
fn replacing_sky_frees_previous_capture() {
    let (mut backend, mut pbr) = setup();
    let old = pbr.sky_capture();
    let source = source_cube(&mut backend);
    let capture = pbr.process_cube(&mut backend, source, true);

    pbr.set_sky_capture(&mut backend, capture);
    assert_eq!(pbr.sky_capture().irradiance, capture.irradiance);
    assert!(backend.texture(old.irradiance).is_none());
}

// ============================================================================
// Probes
// ============================================================================

#[test]
fn probe_query_falls_back_to_sky() {
    let (mut backend, mut pbr) = setup();
    let source = source_cube(&mut backend);
    let capture = pbr.process_cube(&mut backend, source, true);
    pbr.add_irradiance_probe(capture, Vec3::new(4.0, 0.0, 0.0), 2.0);

    let near = pbr.get_irradiance_probes(Vec3::ZERO, 5.0);
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].position, Vec3::new(4.0, 0.0, 0.0));

    // Strictly within the radius
    let boundary = pbr.get_irradiance_probes(Vec3::ZERO, 4.0);
    assert_eq!(boundary, vec![pbr.sky_capture()]);
}

#[test]
fn clearing_probes_frees_their_cubemaps() {
    let (mut backend, mut pbr) = setup();
    let before = backend.live_texture_count();
    for x in 0..3 {
        let source = source_cube(&mut backend);
        let capture = pbr.process_cube(&mut backend, source, true);
        backend.destroy_texture(source);
        pbr.add_irradiance_probe(capture, Vec3::new(x as f32, 0.0, 0.0), 1.0);
    }
    assert_eq!(backend.live_texture_count(), before + 6);

    pbr.clear_irradiance_probes(&mut backend);
    assert!(pbr.probes().is_empty());
    assert_eq!(backend.live_texture_count(), before);
}

#[test]
fn probe_debug_draws_one_sphere_per_probe() {
    let (mut backend, mut pbr) = setup();
    let source = source_cube(&mut backend);
    let capture = pbr.process_cube(&mut backend, source, true);
    pbr.add_irradiance_probe(capture, Vec3::ZERO, 1.0);
    backend.take_calls();

    assert_eq!(pbr.render_probes(&mut backend), 1);
    assert_eq!(backend.draw_count(), 1);
}

// ============================================================================
// Cube Faces & Roughness
// ============================================================================

#[test]
fn cube_face_cameras_look_along_face_axis() {
    let position = Vec3::new(1.0, 2.0, 3.0);
    for face in CubeFace::ALL {
        let camera = cube_face_camera(position, face);
        let (forward, _) = face.orientation();
        assert!((camera.forward - forward).length() < EPSILON);
        assert_eq!(camera.position, position);
        assert!((camera.aspect - 1.0).abs() < EPSILON);
        assert!((camera.fov - 90f32.to_radians()).abs() < EPSILON);
    }
}

#[test]
fn prefilter_roughness_spans_unit_range() {
    assert_eq!(prefilter_roughness(0), 0.0);
    assert!((prefilter_roughness(2) - 0.5).abs() < EPSILON);
    assert!((prefilter_roughness(PREFILTER_MIP_LEVELS - 1) - 1.0).abs() < EPSILON);
}
