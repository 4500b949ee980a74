//! Image-Based Lighting Precompute
//!
//! Bakes environment captures into the two cubemaps the split-sum ambient
//! term needs:
//!
//! - a 32x32 irradiance map (cosine convolution, diffuse)
//! - a 128x128 prefiltered map over 5 mips (GGX convolution, specular),
//!   mip `i` baked at roughness `i / 4`
//!
//! plus a 128x128 BRDF integration LUT baked once at construction.
//!
//! One sky capture always exists. Spatial irradiance probes are kept in a
//! flat list and looked up by a linear distance scan; probe counts are
//! expected to stay in the tens.

use glam::{Mat4, Vec3};

use crate::errors::Result;
use crate::renderer::backend::{ClearFlags, DrawCall, GraphicsBackend};
use crate::resources::texture::mip_size;
use crate::resources::{
    CubeFace, Material, MaterialType, Mesh, RenderTarget, RenderTargetDesc, ShaderDesc, ShaderId, TargetView,
    TextureDesc, TextureId,
};
use crate::scene::camera::Camera;

pub const IRRADIANCE_SIZE: u32 = 32;
pub const PREFILTER_SIZE: u32 = 128;
pub const PREFILTER_MIP_LEVELS: u32 = 5;
pub const ENVIRONMENT_SIZE: u32 = 128;
pub const BRDF_LUT_SIZE: u32 = 128;

const CUBE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const PROBE_DEBUG_SCALE: f32 = 0.5;

/// Prefilter roughness baked into `mip`.
#[inline]
#[must_use]
pub fn prefilter_roughness(mip: u32) -> f32 {
    mip as f32 / (PREFILTER_MIP_LEVELS - 1) as f32
}

/// 90 degree camera looking through `face` from `position`.
#[must_use]
pub fn cube_face_camera(position: Vec3, face: CubeFace) -> Camera {
    let (forward, up) = face.orientation();
    let mut camera = Camera::new_perspective(90.0, 1.0, 0.1, 100.0);
    camera.look_to(position, forward, up);
    camera
}

/// Baked IBL maps for one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PBRCapture {
    pub irradiance: TextureId,
    /// Absent when the capture was processed without prefiltering.
    pub prefiltered: Option<TextureId>,
    pub position: Vec3,
    /// Influence radius around `position`.
    pub radius: f32,
}

impl PBRCapture {
    fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_texture(self.irradiance);
        if let Some(prefiltered) = self.prefiltered {
            backend.destroy_texture(prefiltered);
        }
    }
}

fn cube_pass_material(shader: ShaderId) -> Material {
    let mut material = Material::new(shader, MaterialType::Custom);
    material.state.depth_test = false;
    material.state.depth_write = false;
    material.state.cull = false;
    material.state.shadow_cast = false;
    material
}

#[derive(Debug)]
pub struct PBR {
    quad: Mesh,
    cube: Mesh,
    sphere: Mesh,

    capture_target: RenderTarget,
    brdf_lut: RenderTarget,

    sky: PBRCapture,
    probes: Vec<PBRCapture>,

    equirect_material: Material,
    irradiance_material: Material,
    prefilter_material: Material,
    probe_debug_material: Material,
}

impl PBR {
    /// Compiles the convolution programs, bakes the BRDF LUT and a black
    /// default sky capture.
    pub fn new<B: GraphicsBackend>(backend: &mut B, quad: Mesh, cube: Mesh, sphere: Mesh) -> Result<Self> {
        let mut load = |name: &'static str, vs: &'static str, fs: &'static str| {
            backend.create_shader(&ShaderDesc::new(name, vs, fs))
        };
        let equirect = load("equirect_to_cube", "shaders/pbr/cube_sample.vs", "shaders/pbr/equirect_to_cube.fs")?;
        let irradiance = load("irradiance_capture", "shaders/pbr/cube_sample.vs", "shaders/pbr/irradiance_capture.fs")?;
        let prefilter = load("prefilter_capture", "shaders/pbr/cube_sample.vs", "shaders/pbr/prefilter_capture.fs")?;
        let brdf = load("brdf_integrate", "shaders/screen_quad.vs", "shaders/pbr/brdf_integrate.fs")?;
        let probe_debug = load("probe_render", "shaders/pbr/probe_render.vs", "shaders/pbr/probe_render.fs")?;

        let capture_target = RenderTarget::new(
            backend,
            RenderTargetDesc::new("PBR Capture", ENVIRONMENT_SIZE, ENVIRONMENT_SIZE).with_color_attachments(0),
        )?;

        let brdf_lut = RenderTarget::new(
            backend,
            RenderTargetDesc::new("BRDF LUT", BRDF_LUT_SIZE, BRDF_LUT_SIZE)
                .with_format(wgpu::TextureFormat::Rg16Float)
                .with_depth_stencil(false),
        )?;
        let brdf_material = cube_pass_material(brdf);
        backend.bind_framebuffer(Some(brdf_lut.framebuffer()), BRDF_LUT_SIZE, BRDF_LUT_SIZE);
        backend.clear(ClearFlags::COLOR, wgpu::Color::BLACK);
        backend.draw_fullscreen(&quad, &brdf_material);

        let mut probe_debug_material = Material::new(probe_debug, MaterialType::Custom);
        probe_debug_material.state.shadow_cast = false;

        let mut pbr = Self {
            quad,
            cube,
            sphere,
            capture_target,
            brdf_lut,
            // Placeholder until the black capture below is baked
            sky: PBRCapture {
                irradiance: TextureId(0),
                prefiltered: None,
                position: Vec3::ZERO,
                radius: f32::INFINITY,
            },
            probes: Vec::new(),
            equirect_material: cube_pass_material(equirect),
            irradiance_material: cube_pass_material(irradiance),
            prefilter_material: cube_pass_material(prefilter),
            probe_debug_material,
        };

        let black_size = IRRADIANCE_SIZE;
        let black = backend.create_texture(
            &TextureDesc::new_cube("Black Sky", black_size, wgpu::TextureFormat::Rgba8Unorm)
                .with_data(vec![0; (black_size * black_size * 4 * 6) as usize]),
        );
        let sky = pbr.process_cube(backend, black, true);
        backend.destroy_texture(black);
        pbr.sky = PBRCapture { radius: f32::INFINITY, ..sky };

        log::debug!("PBR ready: BRDF LUT {BRDF_LUT_SIZE}x{BRDF_LUT_SIZE}, default sky capture baked");
        Ok(pbr)
    }

    /// Draws `material` over the unit cube into every face of `cubemap` at
    /// `mip`, with a 90 degree camera at the origin.
    fn render_cube_faces<B: GraphicsBackend>(backend: &mut B, target: TargetView, cube: &Mesh, material: &mut Material, cubemap: TextureId, size: u32, mip: u32) {
        material.set_mat4("projection", cube_face_camera(Vec3::ZERO, CubeFace::PositiveX).projection_matrix());
        for face in CubeFace::ALL {
            let camera = cube_face_camera(Vec3::ZERO, face);
            material.set_mat4("view", camera.view_matrix());

            backend.attach_cube_face(target.framebuffer, cubemap, face, mip);
            backend.bind_framebuffer(Some(target.framebuffer), size, size);
            backend.clear(ClearFlags::COLOR | ClearFlags::DEPTH, wgpu::Color::BLACK);
            backend.apply_state(&material.state);
            backend.draw(&DrawCall {
                mesh: cube,
                material: &*material,
                model: Mat4::IDENTITY,
                prev_model: Mat4::IDENTITY,
            });
        }
    }

    /// Converts an equirectangular HDR map into a 128x128 environment cube
    /// and processes it with prefiltering. The intermediate cube is freed.
    pub fn process_equirectangular<B: GraphicsBackend>(&mut self, backend: &mut B, env_map: TextureId) -> PBRCapture {
        let environment = backend.create_texture(&TextureDesc::new_cube("Environment", ENVIRONMENT_SIZE, CUBE_FORMAT));
        let target = self.capture_target.view();

        self.equirect_material.set_texture("equirectangularMap", env_map, 0);
        Self::render_cube_faces(backend, target, &self.cube, &mut self.equirect_material, environment, ENVIRONMENT_SIZE, 0);
        backend.generate_mipmaps(environment);

        let capture = self.process_cube(backend, environment, true);
        backend.destroy_texture(environment);
        capture
    }

    /// Convolves `source` into a 32x32 irradiance cube and, if `prefilter`,
    /// a 128x128 5-mip prefiltered cube.
    pub fn process_cube<B: GraphicsBackend>(&mut self, backend: &mut B, source: TextureId, prefilter: bool) -> PBRCapture {
        let target = self.capture_target.view();

        let irradiance = backend.create_texture(&TextureDesc::new_cube("Irradiance", IRRADIANCE_SIZE, CUBE_FORMAT));
        self.irradiance_material.set_texture_cube("environment", source, 0);
        Self::render_cube_faces(backend, target, &self.cube, &mut self.irradiance_material, irradiance, IRRADIANCE_SIZE, 0);

        let prefiltered = prefilter.then(|| {
            let prefiltered = backend.create_texture(
                &TextureDesc::new_cube("Prefiltered", PREFILTER_SIZE, CUBE_FORMAT).with_mips(PREFILTER_MIP_LEVELS),
            );
            self.prefilter_material.set_texture_cube("environment", source, 0);
            for mip in 0..PREFILTER_MIP_LEVELS {
                self.prefilter_material.set_float("roughness", prefilter_roughness(mip));
                let size = mip_size(PREFILTER_SIZE, mip);
                Self::render_cube_faces(backend, target, &self.cube, &mut self.prefilter_material, prefiltered, size, mip);
            }
            prefiltered
        });

        PBRCapture {
            irradiance,
            prefiltered,
            position: Vec3::ZERO,
            radius: 0.0,
        }
    }

    // === Probes ===

    pub fn add_irradiance_probe(&mut self, capture: PBRCapture, position: Vec3, radius: f32) {
        self.probes.push(PBRCapture { position, radius, ..capture });
    }

    /// Drops every spatial probe and frees its cubemaps. The sky capture is
    /// kept.
    pub fn clear_irradiance_probes<B: GraphicsBackend>(&mut self, backend: &mut B) {
        for probe in self.probes.drain(..) {
            probe.destroy(backend);
        }
    }

    /// Probes whose position lies strictly within `radius` of `position`,
    /// or just the sky capture when none do.
    #[must_use]
    pub fn get_irradiance_probes(&self, position: Vec3, radius: f32) -> Vec<PBRCapture> {
        let radius_sq = radius * radius;
        let found: Vec<PBRCapture> = self
            .probes
            .iter()
            .filter(|p| p.position.distance_squared(position) < radius_sq)
            .copied()
            .collect();
        if found.is_empty() {
            vec![self.sky]
        } else {
            found
        }
    }

    #[must_use]
    pub fn probes(&self) -> &[PBRCapture] {
        &self.probes
    }

    // === Sky ===

    #[must_use]
    pub fn sky_capture(&self) -> PBRCapture {
        self.sky
    }

    /// Replaces the sky capture, freeing the previous one.
    pub fn set_sky_capture<B: GraphicsBackend>(&mut self, backend: &mut B, capture: PBRCapture) {
        let old = std::mem::replace(&mut self.sky, PBRCapture { radius: f32::INFINITY, ..capture });
        if old.irradiance != capture.irradiance {
            old.destroy(backend);
        }
    }

    #[must_use]
    pub fn brdf_lut(&self) -> TextureId {
        self.brdf_lut.color_texture(0)
    }

    pub(crate) fn capture_target(&self) -> TargetView {
        self.capture_target.view()
    }

    // === Debug ===

    /// Draws a small sphere at every probe, textured with its prefiltered
    /// map. Expects the output target to be bound.
    pub fn render_probes<B: GraphicsBackend>(&mut self, backend: &mut B) -> usize {
        let mut drawn = 0;
        for probe in &self.probes {
            let Some(prefiltered) = probe.prefiltered else {
                continue;
            };
            self.probe_debug_material.set_texture_cube("PrefilterMap", prefiltered, 0);
            let model = Mat4::from_translation(probe.position) * Mat4::from_scale(Vec3::splat(PROBE_DEBUG_SCALE));
            backend.apply_state(&self.probe_debug_material.state);
            backend.draw(&DrawCall {
                mesh: &self.sphere,
                material: &self.probe_debug_material,
                model,
                prev_model: model,
            });
            drawn += 1;
        }
        drawn
    }

    #[must_use]
    pub fn quad(&self) -> Mesh {
        self.quad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roughness_spans_zero_to_one() {
        assert_eq!(prefilter_roughness(0), 0.0);
        assert_eq!(prefilter_roughness(2), 0.5);
        assert_eq!(prefilter_roughness(PREFILTER_MIP_LEVELS - 1), 1.0);
    }

    #[test]
    fn face_camera_looks_along_face() {
        let camera = cube_face_camera(Vec3::new(1.0, 2.0, 3.0), CubeFace::NegativeZ);
        let p = camera.view_matrix().transform_point3(Vec3::new(1.0, 2.0, -7.0));
        // Right-handed view space looks down -Z
        assert!(p.z < 0.0);
        assert!(p.x.abs() < 1e-4 && p.y.abs() < 1e-4);
    }
}
