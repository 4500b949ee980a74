//! Post Processor
//!
//! Screen-space effects run around the lighting pass:
//!
//! 1. [`PostProcessor::process_pre_lighting`]: SSAO from the G-Buffer.
//! 2. [`PostProcessor::process_post_lighting`]: downsample chain of the lit
//!    HDR image, blurred low-resolution tiers, and bloom.
//! 3. [`PostProcessor::blit`]: final composite to the output target.
//!
//! Every internal target is owned here and sized as a fraction of the render
//! size; [`PostProcessor::update_render_size`] must be called on resize.
//! Effect toggles are not stored: each pass reads the caller's
//! [`PostProcessSettings`], so runtime changes apply on the next frame.
//!
//! # Resolution tiers
//!
//! | Tier | Scale    | Used by                                   |
//! |------|----------|-------------------------------------------|
//! | 0    | 1/2      | downsample, bloom bright pass, bloom 0    |
//! | 1    | 1/4      | downsample, bloom 1                       |
//! | 2    | 1/8      | downsample + 8-pass blur, bloom 2         |
//! | 3    | 0.0675   | downsample + 16-pass blur, bloom 3        |
//!
//! The last tier is slightly larger than 1/16; the factor is kept as is so
//! the blurred tiers line up with existing shader tuning.

use glam::{Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::errors::{Result, UmbraError};
use crate::renderer::backend::{ClearFlags, GraphicsBackend};
use crate::renderer::settings::PostProcessSettings;
use crate::resources::{
    Material, MaterialType, Mesh, RenderTarget, RenderTargetDesc, ShaderDesc, TargetView, TextureDesc, TextureId,
};

/// Scale of each resolution tier relative to the render size.
pub const TIER_SCALES: [f32; 4] = [0.5, 0.25, 0.125, 0.0675];

/// Blur passes applied to each bloom tier.
pub const BLOOM_BLUR_PASSES: u32 = 8;

/// Largest SSAO kernel the shader accepts.
pub const MAX_SSAO_KERNEL_SIZE: u32 = 64;
const SSAO_NOISE_SIZE: u32 = 4;

/// G-Buffer attachment holding per-pixel motion vectors.
pub const GBUFFER_MOTION_ATTACHMENT: usize = 3;

// Final composite texture units
pub const UNIT_SOURCE: u32 = 0;
pub const UNIT_SSAO: u32 = 1;
pub const UNIT_BLOOM_FIRST: u32 = 2;
pub const UNIT_MOTION: u32 = 6;

/// Motion blur strength for the current frame rate: `current / target * 0.8`.
/// Lower frame rates get less blur per frame.
#[inline]
#[must_use]
pub fn motion_blur_scale(current_fps: f32, target_fps: f32) -> f32 {
    if target_fps <= 0.0 {
        return 0.0;
    }
    current_fps / target_fps * 0.8
}

/// Size of a tier, never smaller than one pixel.
#[inline]
#[must_use]
pub fn tier_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

/// Clamps a configured kernel size into `1..=MAX_SSAO_KERNEL_SIZE`, warning
/// when the value had to change.
#[must_use]
pub fn ssao_kernel_size(requested: u32) -> u32 {
    let size = requested.clamp(1, MAX_SSAO_KERNEL_SIZE);
    if size != requested {
        log::warn!("SSAO kernel size {requested} is outside 1..={MAX_SSAO_KERNEL_SIZE}; using {size}");
    }
    size
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + f * (b - a)
}

/// Hemisphere sample kernel, biased towards the origin by
/// `lerp(0.1, 1.0, (i / n)^2)`. Seeded, so identical across runs.
#[must_use]
pub fn generate_ssao_kernel(samples: u32) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut kernel = Vec::with_capacity(samples as usize);

    for i in 0..samples {
        let mut sample = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(0.0..1.0),
        )
        .normalize_or(Vec3::Z);
        sample *= rng.random_range(0.0..1.0f32);

        let scale = i as f32 / samples as f32;
        sample *= lerp(0.1, 1.0, scale * scale);

        kernel.push(sample);
    }
    kernel
}

/// 4x4 tangent-space rotation vectors (z = 0), as RGBA16F-ready floats.
#[must_use]
pub fn generate_ssao_noise() -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..SSAO_NOISE_SIZE * SSAO_NOISE_SIZE)
        .map(|_| {
            Vec4::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                0.0,
                0.0,
            )
        })
        .collect()
}

fn noise_bytes(noise: &[Vec4]) -> Vec<u8> {
    noise
        .iter()
        .flat_map(|v| v.to_array())
        .flat_map(f32::to_le_bytes)
        .collect()
}

fn screen_material(shader: crate::resources::ShaderId) -> Material {
    let mut material = Material::new(shader, MaterialType::PostProcess);
    material.state.depth_test = false;
    material.state.depth_write = false;
    material.state.cull = false;
    material.state.shadow_cast = false;
    material
}

struct PostTargets {
    ssao: RenderTarget,
    downsample: [RenderTarget; 4],
    /// Blurred copies of tiers 2 and 3.
    blurred: [RenderTarget; 2],
    bloom_bright: RenderTarget,
    bloom: [RenderTarget; 4],
    /// Horizontal-pass scratch, one per tier.
    blur_h: [RenderTarget; 4],
}

impl PostTargets {
    fn new<B: GraphicsBackend>(backend: &mut B, width: u32, height: u32) -> Result<Self> {
        let mut tier = |label: &'static str, scale: f32| {
            let (w, h) = tier_size(width, height, scale);
            RenderTarget::new(
                backend,
                RenderTargetDesc::new(label, w, h).with_depth_stencil(false),
            )
        };

        Ok(Self {
            ssao: tier("SSAO", 0.5)?,
            downsample: [
                tier("Downsample 2x", TIER_SCALES[0])?,
                tier("Downsample 4x", TIER_SCALES[1])?,
                tier("Downsample 8x", TIER_SCALES[2])?,
                tier("Downsample 16x", TIER_SCALES[3])?,
            ],
            blurred: [
                tier("Downsample 8x Blurred", TIER_SCALES[2])?,
                tier("Downsample 16x Blurred", TIER_SCALES[3])?,
            ],
            bloom_bright: tier("Bloom Bright", 0.5)?,
            bloom: [
                tier("Bloom 0", TIER_SCALES[0])?,
                tier("Bloom 1", TIER_SCALES[1])?,
                tier("Bloom 2", TIER_SCALES[2])?,
                tier("Bloom 3", TIER_SCALES[3])?,
            ],
            blur_h: [
                tier("Blur H 0", TIER_SCALES[0])?,
                tier("Blur H 1", TIER_SCALES[1])?,
                tier("Blur H 2", TIER_SCALES[2])?,
                tier("Blur H 3", TIER_SCALES[3])?,
            ],
        })
    }

    fn all_mut(&mut self) -> impl Iterator<Item = (&mut RenderTarget, f32)> {
        std::iter::once((&mut self.ssao, 0.5))
            .chain(self.downsample.iter_mut().zip(TIER_SCALES))
            .chain(self.blurred.iter_mut().zip([TIER_SCALES[2], TIER_SCALES[3]]))
            .chain(std::iter::once((&mut self.bloom_bright, 0.5)))
            .chain(self.bloom.iter_mut().zip(TIER_SCALES))
            .chain(self.blur_h.iter_mut().zip(TIER_SCALES))
    }
}

pub struct PostProcessor {
    width: u32,
    height: u32,
    quad: Mesh,
    targets: PostTargets,

    ssao_kernel: Vec<Vec3>,
    /// Kernel size as configured, before clamping.
    requested_kernel_size: u32,
    ssao_noise: TextureId,

    ssao_material: Material,
    blur_material: Material,
    downsample_material: Material,
    bloom_material: Material,
    composite_material: Material,
}

impl std::fmt::Debug for PostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessor")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("ssao_kernel_size", &self.ssao_kernel.len())
            .finish_non_exhaustive()
    }
}

impl PostProcessor {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        quad: Mesh,
        width: u32,
        height: u32,
        settings: &PostProcessSettings,
    ) -> Result<Self> {
        let mut load = |name: &'static str, fs: &'static str| -> Result<Material> {
            let shader = backend.create_shader(&ShaderDesc::new(name, "shaders/screen_quad.vs", fs))?;
            Ok(screen_material(shader))
        };

        let ssao_material = load("ssao", "shaders/post/ssao.fs")?;
        let blur_material = load("blur", "shaders/post/blur_gaussian.fs")?;
        let downsample_material = load("downsample", "shaders/post/downsample.fs")?;
        let bloom_material = load("bloom", "shaders/post/bloom.fs")?;
        let composite_material = load("post_process", "shaders/post/post_process.fs")?;

        let ssao_kernel = generate_ssao_kernel(ssao_kernel_size(settings.ssao_kernel_size));
        let ssao_noise = backend.create_texture(
            &TextureDesc::new_2d("SSAO Noise", SSAO_NOISE_SIZE, SSAO_NOISE_SIZE, wgpu::TextureFormat::Rgba32Float)
                .with_data(noise_bytes(&generate_ssao_noise())),
        );

        let targets = PostTargets::new(backend, width, height)?;

        let mut post = Self {
            width,
            height,
            quad,
            targets,
            ssao_kernel: Vec::new(),
            requested_kernel_size: settings.ssao_kernel_size,
            ssao_noise,
            ssao_material,
            blur_material,
            downsample_material,
            bloom_material,
            composite_material,
        };
        post.upload_ssao_kernel(ssao_kernel);
        Ok(post)
    }

    /// Replaces the kernel uniforms, dropping samples past the new length.
    fn upload_ssao_kernel(&mut self, kernel: Vec<Vec3>) {
        for i in kernel.len()..self.ssao_kernel.len() {
            self.ssao_material.remove_uniform(&format!("kernel[{i}]"));
        }
        for (i, sample) in kernel.iter().enumerate() {
            self.ssao_material.set_vec3(format!("kernel[{i}]"), *sample);
        }
        self.ssao_material.set_int("SampleCount", kernel.len() as i32);
        self.ssao_kernel = kernel;
    }

    /// Resizes every internal target to its tier of the new render size.
    pub fn update_render_size<B: GraphicsBackend>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(UmbraError::InvalidRenderSize { width, height });
        }
        self.width = width;
        self.height = height;
        for (target, scale) in self.targets.all_mut() {
            let (w, h) = tier_size(width, height, scale);
            target.resize(backend, w, h)?;
        }
        log::debug!("Post processor resized to {width}x{height}");
        Ok(())
    }

    // === Pre-lighting ===

    /// Renders SSAO from G-Buffer position and normal attachments. Returns
    /// `false` when SSAO is disabled. A changed kernel size regenerates the
    /// kernel first.
    pub fn process_pre_lighting<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        settings: &PostProcessSettings,
        gbuffer: &RenderTarget,
    ) -> bool {
        if !settings.ssao {
            return false;
        }

        if settings.ssao_kernel_size != self.requested_kernel_size {
            self.requested_kernel_size = settings.ssao_kernel_size;
            let kernel = generate_ssao_kernel(ssao_kernel_size(settings.ssao_kernel_size));
            self.upload_ssao_kernel(kernel);
        }

        let target = self.targets.ssao.view();
        self.ssao_material.set_texture("gPositionMetallic", gbuffer.color_texture(0), 0);
        self.ssao_material.set_texture("gNormalRoughness", gbuffer.color_texture(1), 1);
        self.ssao_material.set_texture("texNoise", self.ssao_noise, 2);
        self.ssao_material.set_vec2("renderSize", Vec2::new(target.width as f32, target.height as f32));

        backend.bind_framebuffer(Some(target.framebuffer), target.width, target.height);
        backend.clear(ClearFlags::COLOR, wgpu::Color::WHITE);
        backend.draw_fullscreen(&self.quad, &self.ssao_material);
        true
    }

    // === Post-lighting ===

    /// Downsamples the lit image through every tier, blurs the two smallest,
    /// and builds the bloom tiers when bloom is enabled.
    pub fn process_post_lighting<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        settings: &PostProcessSettings,
        source: TargetView,
    ) -> Result<()> {
        let tiers = self.targets.downsample.each_ref().map(RenderTarget::view);
        let mut input = source.texture;
        for tier in tiers {
            self.downsample_material.set_texture("TexSrc", input, 0);
            backend.bind_framebuffer(Some(tier.framebuffer), tier.width, tier.height);
            backend.draw_fullscreen(&self.quad, &self.downsample_material);
            input = tier.texture;
        }

        let blurred = self.targets.blurred.each_ref().map(RenderTarget::view);
        self.blur(backend, tiers[2], blurred[0], 8)?;
        self.blur(backend, tiers[3], blurred[1], 16)?;

        if settings.bloom {
            let bright = self.targets.bloom_bright.view();
            self.bloom_material.set_texture("HDRScene", source.texture, 0);
            backend.bind_framebuffer(Some(bright.framebuffer), bright.width, bright.height);
            backend.draw_fullscreen(&self.quad, &self.bloom_material);

            let bloom = self.targets.bloom.each_ref().map(RenderTarget::view);
            self.blur(backend, bright, bloom[0], BLOOM_BLUR_PASSES)?;
            self.blur(backend, bloom[0], bloom[1], BLOOM_BLUR_PASSES)?;
            self.blur(backend, bloom[1], bloom[2], BLOOM_BLUR_PASSES)?;
            self.blur(backend, bloom[2], bloom[3], BLOOM_BLUR_PASSES)?;
        }

        Ok(())
    }

    /// Separable Gaussian blur of `src` into `dst`, alternating horizontal
    /// and vertical passes. Horizontal passes write to the scratch target of
    /// `dst`'s tier, vertical passes to `dst`, so `count` must be even and
    /// at least 2.
    pub fn blur<B: GraphicsBackend>(&mut self, backend: &mut B, src: TargetView, dst: TargetView, count: u32) -> Result<()> {
        if count < 2 || count % 2 != 0 {
            return Err(UmbraError::InvalidBlurPassCount(count));
        }

        let scratch = self.scratch_for(dst);
        for i in 0..count {
            let horizontal = i % 2 == 0;
            let input = match (i, horizontal) {
                (0, _) => src.texture,
                (_, true) => dst.texture,
                (_, false) => scratch.texture,
            };
            let output = if horizontal { scratch } else { dst };

            self.blur_material.set_texture("TexSrc", input, 0);
            self.blur_material.set_bool("horizontal", horizontal);
            backend.bind_framebuffer(Some(output.framebuffer), output.width, output.height);
            backend.draw_fullscreen(&self.quad, &self.blur_material);
        }
        Ok(())
    }

    /// Scratch target of the tier whose width is closest to `dst`.
    fn scratch_for(&self, dst: TargetView) -> TargetView {
        self.targets
            .blur_h
            .iter()
            .map(RenderTarget::view)
            .min_by_key(|t| t.width.abs_diff(dst.width))
            .unwrap_or(dst)
    }

    // === Composite ===

    /// Final composite of `source` into `dst` (`None` = default framebuffer).
    pub fn blit<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        settings: &PostProcessSettings,
        source: TextureId,
        gbuffer: &RenderTarget,
        dst: Option<TargetView>,
        current_fps: f32,
    ) {
        let s = settings;
        let m = &mut self.composite_material;
        m.set_bool("SSAO", s.ssao);
        m.set_bool("Sepia", s.sepia);
        m.set_bool("Vignette", s.vignette);
        m.set_bool("Bloom", s.bloom);
        m.set_bool("MotionBlur", s.motion_blur);
        m.set_float("MotionScale", motion_blur_scale(current_fps, s.target_fps));

        m.set_texture("TexSrc", source, UNIT_SOURCE);
        m.set_texture("TexSSAO", self.targets.ssao.color_texture(0), UNIT_SSAO);
        for (i, tier) in self.targets.bloom.iter().enumerate() {
            m.set_texture(format!("TexBloom{}", i + 1), tier.color_texture(0), UNIT_BLOOM_FIRST + i as u32);
        }
        m.set_texture("gMotion", gbuffer.color_texture(GBUFFER_MOTION_ATTACHMENT), UNIT_MOTION);

        match dst {
            Some(view) => backend.bind_framebuffer(Some(view.framebuffer), view.width, view.height),
            None => backend.bind_framebuffer(None, self.width, self.height),
        }
        backend.draw_fullscreen(&self.quad, &self.composite_material);
    }

    // === Accessors ===

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn ssao_kernel(&self) -> &[Vec3] {
        &self.ssao_kernel
    }

    #[must_use]
    pub fn ssao_noise_texture(&self) -> TextureId {
        self.ssao_noise
    }

    #[must_use]
    pub fn ssao_target(&self) -> TargetView {
        self.targets.ssao.view()
    }

    #[must_use]
    pub fn downsample_targets(&self) -> [TargetView; 4] {
        self.targets.downsample.each_ref().map(RenderTarget::view)
    }

    /// Blurred 1/8 and 0.0675 tiers, for refraction lookups.
    #[must_use]
    pub fn blurred_targets(&self) -> [TargetView; 2] {
        self.targets.blurred.each_ref().map(RenderTarget::view)
    }

    #[must_use]
    pub fn bloom_targets(&self) -> [TargetView; 4] {
        self.targets.bloom.each_ref().map(RenderTarget::view)
    }

    #[must_use]
    pub fn bloom_bright_target(&self) -> TargetView {
        self.targets.bloom_bright.view()
    }

    #[must_use]
    pub fn blur_scratch_targets(&self) -> [TargetView; 4] {
        self.targets.blur_h.each_ref().map(RenderTarget::view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_deterministic_and_in_hemisphere() {
        let a = generate_ssao_kernel(32);
        let b = generate_ssao_kernel(32);
        assert_eq!(a, b);
        for s in &a {
            assert!(s.z >= 0.0);
            assert!(s.length() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn kernel_falloff_bounds_sample_length() {
        let n = 16;
        let kernel = generate_ssao_kernel(n);
        for (i, s) in kernel.iter().enumerate() {
            let t = i as f32 / n as f32;
            assert!(s.length() <= lerp(0.1, 1.0, t * t) + 1e-5);
        }
    }

    #[test]
    fn noise_is_planar() {
        let noise = generate_ssao_noise();
        assert_eq!(noise.len(), 16);
        assert!(noise.iter().all(|v| v.z == 0.0));
        assert_eq!(noise_bytes(&noise).len(), 16 * 16);
    }

    #[test]
    fn tier_sizes_keep_the_odd_last_factor() {
        assert_eq!(tier_size(1000, 500, TIER_SCALES[3]), (67, 33));
        assert_eq!(tier_size(4, 4, TIER_SCALES[3]), (1, 1));
    }

    #[test]
    fn motion_scale_tracks_frame_rate() {
        assert!((motion_blur_scale(60.0, 60.0) - 0.8).abs() < 1e-6);
        assert!((motion_blur_scale(30.0, 60.0) - 0.4).abs() < 1e-6);
        assert_eq!(motion_blur_scale(30.0, 0.0), 0.0);
    }
}
