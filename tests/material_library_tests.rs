//! Material Library Tests
//!
//! Tests for:
//! - Built-in templates and their render state
//! - Deep-copy semantics of template instantiation
//! - Handle lifetime (release, stale handles)
//! - Internal lighting materials

use umbra::renderer::backend::GraphicsBackend;
use umbra::resources::{MaterialType, ShaderDesc, UniformValue};
use umbra::{HeadlessBackend, MaterialLibrary, UmbraError};

fn setup() -> (HeadlessBackend, MaterialLibrary) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut backend = HeadlessBackend::new();
    let library = MaterialLibrary::new(&mut backend).expect("material library");
    (backend, library)
}

// ============================================================================
// Templates
// ============================================================================

#[test]
fn builtin_templates_are_registered() {
    let (_, library) = setup();
    let mut names: Vec<_> = library.template_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["alpha blend", "alpha discard", "default", "glass"]);
}

#[test]
fn template_types_and_state() {
    let (_, library) = setup();

    let default = library.template("default").expect("default");
    assert_eq!(default.material_type(), MaterialType::Default);
    assert!(!default.is_blended());
    assert!(default.sampler("TexAlbedo").is_some());

    let glass = library.template("glass").expect("glass");
    assert_eq!(glass.material_type(), MaterialType::Custom);
    assert!(glass.is_blended());
    assert!(!glass.state.shadow_cast);

    let discard = library.template("alpha discard").expect("alpha discard");
    assert!(!discard.state.cull);
    assert!(!discard.is_blended());
}

#[test]
fn unknown_template_is_an_error() {
    let (_, mut library) = setup();
    let result = library.create_material("marble");
    assert!(matches!(result, Err(UmbraError::MaterialTemplateNotFound(ref name)) if name == "marble"));
    assert!(library.is_empty());
}

#[test]
fn instances_are_independent_of_template() -> anyhow::Result<()> {
    let (_, mut library) = setup();
    let a = library.create_material("default")?;
    let b = library.create_material("default")?;

    library.get_mut(a).expect("live").set_float("roughness", 0.9);
    library.get_mut(a).expect("live").state.cull = false;

    assert_eq!(library.get(a).and_then(|m| m.uniform("roughness")), Some(&UniformValue::Float(0.9)));
    assert_eq!(library.get(b).and_then(|m| m.uniform("roughness")), None);
    assert!(library.get(b).expect("live").state.cull);
    assert!(library.template("default").expect("template").state.cull);
    Ok(())
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn released_handles_go_stale() -> anyhow::Result<()> {
    let (_, mut library) = setup();
    let handle = library.create_material("glass")?;
    assert!(library.contains(handle));

    library.release(handle)?;
    assert!(!library.contains(handle));
    assert!(library.get(handle).is_none());
    assert!(matches!(library.release(handle), Err(UmbraError::InvalidMaterialHandle)));

    // A new material does not resurrect the old handle
    let fresh = library.create_material("glass")?;
    assert_ne!(fresh, handle);
    assert!(library.get(handle).is_none());
    Ok(())
}

#[test]
fn factory_materials_have_expected_types() -> anyhow::Result<()> {
    let (mut backend, mut library) = setup();
    let shader = backend.create_shader(&ShaderDesc::new("tint", "shaders/screen_quad.vs", "shaders/tint.fs"))?;

    let custom = library.create_custom_material(shader);
    let post = library.create_post_processing_material(shader);

    assert_eq!(library.get(custom).map(|m| m.material_type()), Some(MaterialType::Custom));
    let post = library.get(post).expect("live");
    assert_eq!(post.material_type(), MaterialType::PostProcess);
    assert!(!post.state.depth_test);
    assert_eq!(library.len(), 2);
    Ok(())
}

// ============================================================================
// Internal Materials
// ============================================================================

#[test]
fn lighting_materials_accumulate_additively() {
    let (_, library) = setup();
    let internal = library.internal();
    for material in [&internal.ambient, &internal.irradiance, &internal.directional, &internal.point] {
        assert!(material.state.blend);
        assert_eq!(material.state.blend_src, wgpu::BlendFactor::One);
        assert_eq!(material.state.blend_dst, wgpu::BlendFactor::One);
        assert_eq!(material.state.blend_equation, wgpu::BlendOperation::Add);
    }
    assert_eq!(internal.point.state.cull_face, wgpu::Face::Front);
    assert!(!internal.blit.state.blend);
}

#[test]
fn shader_failure_aborts_library() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut backend = HeadlessBackend::new();
    backend.fail_shader("g_buffer");
    let result = MaterialLibrary::new(&mut backend);
    assert!(matches!(result, Err(UmbraError::ShaderCompilation { .. })));
}
