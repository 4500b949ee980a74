//! Post Processor Tests
//!
//! Tests for:
//! - Tier sizing and resize
//! - Separable blur preconditions and target alternation
//! - Post-lighting pass counts with and without bloom
//! - SSAO kernel generation, clamping and regeneration
//! - Frame-rate adaptive motion blur scale

use umbra::renderer::backend::GraphicsBackend;
use umbra::renderer::post_processor::{
    generate_ssao_kernel, generate_ssao_noise, motion_blur_scale, ssao_kernel_size, tier_size, BLOOM_BLUR_PASSES,
    MAX_SSAO_KERNEL_SIZE,
};
use umbra::resources::{primitives, RenderTarget, RenderTargetDesc, UniformValue};
use umbra::{HeadlessBackend, PostProcessSettings, PostProcessor, UmbraError};

const EPSILON: f32 = 1e-5;

fn setup(settings: &PostProcessSettings) -> (HeadlessBackend, PostProcessor) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut backend = HeadlessBackend::new();
    let quad = backend.create_mesh(&primitives::screen_quad()).expect("quad");
    let post = PostProcessor::new(&mut backend, quad, 1000, 500, settings).expect("post processor");
    backend.take_calls();
    (backend, post)
}

fn hdr_source(backend: &mut HeadlessBackend) -> RenderTarget {
    RenderTarget::new(backend, RenderTargetDesc::new("HDR", 1000, 500)).expect("hdr target")
}

fn gbuffer(backend: &mut HeadlessBackend) -> RenderTarget {
    RenderTarget::new(backend, RenderTargetDesc::new("GBuffer", 1000, 500).with_color_attachments(4)).expect("gbuffer")
}

// ============================================================================
// Sizing
// ============================================================================

#[test]
fn tiers_follow_scale_constants() {
    let (_, post) = setup(&PostProcessSettings::default());
    let widths: Vec<u32> = post.downsample_targets().iter().map(|t| t.width).collect();
    assert_eq!(widths, vec![500, 250, 125, 67]);
    assert_eq!(post.ssao_target().width, 500);
    assert_eq!(post.bloom_bright_target().height, 250);
}

#[test]
fn tier_size_never_reaches_zero() {
    assert_eq!(tier_size(4, 4, 0.0675), (1, 1));
    assert_eq!(tier_size(1000, 500, 0.5), (500, 250));
}

#[test]
fn resize_updates_every_tier() -> anyhow::Result<()> {
    let (mut backend, mut post) = setup(&PostProcessSettings::default());
    post.update_render_size(&mut backend, 200, 100)?;

    assert_eq!(post.size(), (200, 100));
    assert_eq!(post.downsample_targets()[1].width, 50);
    assert_eq!(post.bloom_targets()[0].width, 100);
    assert_eq!(post.blur_scratch_targets()[2].width, 25);
    assert!(matches!(
        post.update_render_size(&mut backend, 0, 100),
        Err(UmbraError::InvalidRenderSize { .. })
    ));
    Ok(())
}

// ============================================================================
// Blur
// ============================================================================

#[test]
fn blur_rejects_odd_and_zero_counts() {
    let (mut backend, mut post) = setup(&PostProcessSettings::default());
    let [src, dst, ..] = post.bloom_targets();

    assert!(matches!(post.blur(&mut backend, src, dst, 3), Err(UmbraError::InvalidBlurPassCount(3))));
    assert!(matches!(post.blur(&mut backend, src, dst, 0), Err(UmbraError::InvalidBlurPassCount(0))));
    assert_eq!(backend.draw_count(), 0);
}

#[test]
fn blur_alternates_scratch_and_destination() -> anyhow::Result<()> {
    let (mut backend, mut post) = setup(&PostProcessSettings::default());
    let bloom = post.bloom_targets();
    let scratch = post.blur_scratch_targets()[1];
    let (src, dst) = (bloom[0], bloom[1]);

    post.blur(&mut backend, src, dst, 4)?;

    let draws: Vec<_> = backend.draws().collect();
    assert_eq!(draws.len(), 4);
    let targets: Vec<_> = draws.iter().map(|d| d.target).collect();
    assert_eq!(
        targets,
        vec![Some(scratch.framebuffer), Some(dst.framebuffer), Some(scratch.framebuffer), Some(dst.framebuffer)]
    );

    let inputs: Vec<_> = draws.iter().map(|d| d.material.sampler("TexSrc").map(|s| s.texture)).collect();
    assert_eq!(
        inputs,
        vec![Some(src.texture), Some(scratch.texture), Some(dst.texture), Some(scratch.texture)]
    );
    Ok(())
}

// ============================================================================
// Pass Counts
// ============================================================================

#[test]
fn post_lighting_without_bloom() -> anyhow::Result<()> {
    let settings = PostProcessSettings { bloom: false, ..PostProcessSettings::default() };
    let (mut backend, mut post) = setup(&settings);
    let source = hdr_source(&mut backend);

    post.process_post_lighting(&mut backend, &settings, source.view())?;
    // 4 downsamples, 8 + 16 blur passes
    assert_eq!(backend.draw_count(), 28);
    Ok(())
}

#[test]
fn post_lighting_with_bloom() -> anyhow::Result<()> {
    let settings = PostProcessSettings::default();
    let (mut backend, mut post) = setup(&settings);
    let source = hdr_source(&mut backend);

    post.process_post_lighting(&mut backend, &settings, source.view())?;
    let bloom_passes = 1 + 4 * BLOOM_BLUR_PASSES as usize;
    assert_eq!(backend.draw_count(), 28 + bloom_passes);
    Ok(())
}

#[test]
fn ssao_disabled_draws_nothing() {
    let mut settings = PostProcessSettings { ssao: false, ..PostProcessSettings::default() };
    let (mut backend, mut post) = setup(&settings);
    let gbuffer = gbuffer(&mut backend);
    backend.take_calls();

    assert!(!post.process_pre_lighting(&mut backend, &settings, &gbuffer));
    assert_eq!(backend.draw_count(), 0);

    settings.ssao = true;
    assert!(post.process_pre_lighting(&mut backend, &settings, &gbuffer));
    let draw = backend.draws().next().expect("ssao pass");
    assert_eq!(draw.target, Some(post.ssao_target().framebuffer));
}

#[test]
fn composite_carries_effect_toggles() {
    let settings = PostProcessSettings { sepia: true, motion_blur: false, ..PostProcessSettings::default() };
    let (mut backend, mut post) = setup(&settings);
    let gbuffer = gbuffer(&mut backend);
    let source = hdr_source(&mut backend);

    post.blit(&mut backend, &settings, source.view().texture, &gbuffer, None, 30.0);

    let draw = backend.draws().last().expect("composite");
    assert_eq!(draw.target, None);
    assert_eq!(draw.material.uniform("Sepia"), Some(&UniformValue::Bool(true)));
    assert_eq!(draw.material.uniform("MotionBlur"), Some(&UniformValue::Bool(false)));
    assert_eq!(
        draw.material.sampler("gMotion").map(|s| s.texture),
        Some(gbuffer.color_texture(3))
    );
}

// ============================================================================
// SSAO Kernel & Motion Blur
// ============================================================================

#[test]
fn ssao_kernel_is_deterministic_and_hemispherical() {
    let a = generate_ssao_kernel(32);
    let b = generate_ssao_kernel(32);
    assert_eq!(a, b);
    assert_eq!(a.len(), 32);
    for sample in &a {
        assert!(sample.z >= 0.0, "sample below the hemisphere: {sample}");
        assert!(sample.length() <= 1.0 + EPSILON);
    }
}

#[test]
fn ssao_noise_rotates_around_z() {
    let noise = generate_ssao_noise();
    assert_eq!(noise.len(), 16);
    assert!(noise.iter().all(|v| v.z == 0.0));
}

#[test]
fn motion_blur_scale_tracks_frame_rate() {
    assert!((motion_blur_scale(60.0, 60.0) - 0.8).abs() < EPSILON);
    assert!((motion_blur_scale(30.0, 60.0) - 0.4).abs() < EPSILON);
    assert_eq!(motion_blur_scale(60.0, 0.0), 0.0);
}

#[test]
fn kernel_size_is_clamped_to_shader_range() {
    assert_eq!(ssao_kernel_size(0), 1);
    assert_eq!(ssao_kernel_size(65), MAX_SSAO_KERNEL_SIZE);
    assert_eq!(ssao_kernel_size(32), 32);

    let (_, post) = setup(&PostProcessSettings { ssao_kernel_size: 0, ..PostProcessSettings::default() });
    assert_eq!(post.ssao_kernel().len(), 1);
    let (_, post) = setup(&PostProcessSettings { ssao_kernel_size: 65, ..PostProcessSettings::default() });
    assert_eq!(post.ssao_kernel().len(), MAX_SSAO_KERNEL_SIZE as usize);
}

#[test]
fn shrinking_kernel_drops_stale_samples() {
    let mut settings = PostProcessSettings { ssao_kernel_size: 64, ..PostProcessSettings::default() };
    let (mut backend, mut post) = setup(&settings);
    let gbuffer = gbuffer(&mut backend);
    backend.take_calls();

    settings.ssao_kernel_size = 8;
    assert!(post.process_pre_lighting(&mut backend, &settings, &gbuffer));
    assert_eq!(post.ssao_kernel().len(), 8);

    let draw = backend.draws().next().expect("ssao pass");
    assert_eq!(draw.material.uniform("SampleCount"), Some(&UniformValue::Int(8)));
    assert!(draw.material.uniform("kernel[7]").is_some());
    assert!(draw.material.uniform("kernel[8]").is_none());
    assert!(draw.material.uniform("kernel[63]").is_none());
}
