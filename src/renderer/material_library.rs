//! Material Library
//!
//! Owns every material the renderer hands out. Materials live in a slot-map
//! arena; callers only ever hold [`MaterialHandle`]s, so a material cannot be
//! freed behind the library's back and stale handles are detected.
//!
//! # Templates
//!
//! | Name            | Type      | Notes                                     |
//! |-----------------|-----------|-------------------------------------------|
//! | `default`       | `Default` | G-Buffer material, fallback PBR textures  |
//! | `glass`         | `Custom`  | blended; the G-Buffer cannot store alpha  |
//! | `alpha blend`   | `Custom`  | blended                                   |
//! | `alpha discard` | `Custom`  | alpha-tested, double sided                |
//!
//! Templates are keyed by the xxh3 hash of their name and are never handed
//! out directly; [`MaterialLibrary::create_material`] returns a deep copy.
//!
//! # Internal materials
//!
//! The lighting, shadow, blit and debug passes use fixed materials created
//! alongside the templates. They are exposed through [`InternalMaterials`].

use slotmap::SlotMap;
use xxhash_rust::xxh3::xxh3_64;

use rustc_hash::FxHashMap;

use crate::errors::{Result, UmbraError};
use crate::renderer::backend::GraphicsBackend;
use crate::resources::{Material, MaterialHandle, MaterialType, ShaderDesc, ShaderId, TextureDesc, TextureId};

// G-Buffer sampler units shared by every deferred lighting material
pub const UNIT_GPOSITION_METALLIC: u32 = 0;
pub const UNIT_GNORMAL_ROUGHNESS: u32 = 1;
pub const UNIT_GALBEDO_AO: u32 = 2;
pub const UNIT_ENV_IRRADIANCE: u32 = 3;
pub const UNIT_ENV_PREFILTER: u32 = 4;
pub const UNIT_BRDF_LUT: u32 = 5;
pub const UNIT_SSAO: u32 = 6;
/// Directional lights sample their shadow map here instead of irradiance.
pub const UNIT_SHADOW_MAP: u32 = 3;

/// Fixed materials used by the renderer's own passes.
#[derive(Debug, Clone)]
pub struct InternalMaterials {
    /// Full-screen textured copy.
    pub blit: Material,
    /// Sky IBL ambient, full-screen.
    pub ambient: Material,
    /// Per-probe IBL ambient, drawn as a sphere volume.
    pub irradiance: Material,
    pub directional: Material,
    pub point: Material,
    /// Depth-only shadow caster.
    pub dir_shadow: Material,
    pub debug_light: Material,
    /// Forward shading used when rendering the scene into probe cubemaps.
    pub capture: Material,
}

/// 1x1 textures bound by the default template until the user overrides them.
#[derive(Debug, Clone, Copy)]
pub struct FallbackTextures {
    pub albedo: TextureId,
    pub normal: TextureId,
    pub metallic: TextureId,
    pub roughness: TextureId,
}

#[derive(Debug)]
pub struct MaterialLibrary {
    materials: SlotMap<MaterialHandle, Material>,
    templates: FxHashMap<u64, Material>,
    template_names: Vec<&'static str>,
    internal: InternalMaterials,
    fallback: FallbackTextures,
}

fn template_key(name: &str) -> u64 {
    xxh3_64(name.as_bytes())
}

fn load_shader<B: GraphicsBackend>(backend: &mut B, name: &'static str, vs: &'static str, fs: &'static str) -> Result<ShaderId> {
    backend.create_shader(&ShaderDesc::new(name, vs, fs)).inspect_err(|e| {
        log::error!("Failed to load shader '{name}': {e}");
    })
}

fn fallback_texture<B: GraphicsBackend>(backend: &mut B, label: &'static str, rgba: [u8; 4]) -> TextureId {
    backend.create_texture(
        &TextureDesc::new_2d(label, 1, 1, wgpu::TextureFormat::Rgba8Unorm).with_data(rgba.to_vec()),
    )
}

impl MaterialLibrary {
    /// Compiles the template and internal shader programs. Any compilation
    /// failure aborts construction.
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Result<Self> {
        let fallback = FallbackTextures {
            albedo: fallback_texture(backend, "Fallback Albedo", [255, 255, 255, 255]),
            normal: fallback_texture(backend, "Fallback Normal", [128, 128, 255, 255]),
            metallic: fallback_texture(backend, "Fallback Metallic", [0, 0, 0, 255]),
            roughness: fallback_texture(backend, "Fallback Roughness", [255, 255, 255, 255]),
        };

        let mut library = Self {
            materials: SlotMap::with_key(),
            templates: FxHashMap::default(),
            template_names: Vec::new(),
            internal: Self::generate_internal_materials(backend)?,
            fallback,
        };
        library.generate_default_materials(backend)?;

        log::debug!("Material library ready: {} templates", library.templates.len());
        Ok(library)
    }

    fn generate_default_materials<B: GraphicsBackend>(&mut self, backend: &mut B) -> Result<()> {
        // default: deferred PBR
        let shader = load_shader(backend, "g_buffer", "shaders/deferred/g_buffer.vs", "shaders/deferred/g_buffer.fs")?;
        let mut default = Material::new(shader, MaterialType::Default);
        default.set_texture("TexAlbedo", self.fallback.albedo, 3);
        default.set_texture("TexNormal", self.fallback.normal, 4);
        default.set_texture("TexMetallic", self.fallback.metallic, 5);
        default.set_texture("TexRoughness", self.fallback.roughness, 6);
        self.register_template("default", default);

        // glass
        let shader = load_shader(backend, "glass", "shaders/forward/glass.vs", "shaders/forward/glass.fs")?;
        let mut glass = Material::new(shader, MaterialType::Custom);
        glass.state.blend = true;
        glass.state.shadow_cast = false;
        self.register_template("glass", glass);

        // alpha blend
        let shader = load_shader(
            backend,
            "alpha_blend",
            "shaders/forward/alpha_blend.vs",
            "shaders/forward/alpha_blend.fs",
        )?;
        let mut alpha_blend = Material::new(shader, MaterialType::Custom);
        alpha_blend.set_texture("TexAlbedo", self.fallback.albedo, 0);
        alpha_blend.state.blend = true;
        alpha_blend.state.shadow_cast = false;
        self.register_template("alpha blend", alpha_blend);

        // alpha discard
        let shader = load_shader(
            backend,
            "alpha_discard",
            "shaders/forward/alpha_discard.vs",
            "shaders/forward/alpha_discard.fs",
        )?;
        let mut alpha_discard = Material::new(shader, MaterialType::Custom);
        alpha_discard.set_texture("TexAlbedo", self.fallback.albedo, 0);
        alpha_discard.state.cull = false;
        self.register_template("alpha discard", alpha_discard);

        Ok(())
    }

    fn generate_internal_materials<B: GraphicsBackend>(backend: &mut B) -> Result<InternalMaterials> {
        let screen_pass = |material: &mut Material| {
            material.state.depth_test = false;
            material.state.depth_write = false;
            material.state.cull = false;
            material.state.shadow_cast = false;
        };
        // Lighting accumulates with ONE, ONE
        let additive = |material: &mut Material| {
            material.state.blend = true;
            material.state.blend_src = wgpu::BlendFactor::One;
            material.state.blend_dst = wgpu::BlendFactor::One;
            material.state.blend_equation = wgpu::BlendOperation::Add;
        };
        // Light volumes are drawn from the inside
        let volume_pass = |material: &mut Material| {
            material.state.depth_test = false;
            material.state.depth_write = false;
            material.state.cull_face = wgpu::Face::Front;
            material.state.shadow_cast = false;
        };
        let gbuffer_samplers = |material: &mut Material| {
            material.set_int("gPositionMetallic", UNIT_GPOSITION_METALLIC as i32);
            material.set_int("gNormalRoughness", UNIT_GNORMAL_ROUGHNESS as i32);
            material.set_int("gAlbedoAO", UNIT_GALBEDO_AO as i32);
        };
        let ibl_samplers = |material: &mut Material| {
            material.set_int("envIrradiance", UNIT_ENV_IRRADIANCE as i32);
            material.set_int("envPrefilter", UNIT_ENV_PREFILTER as i32);
            material.set_int("BRDFLUT", UNIT_BRDF_LUT as i32);
            material.set_int("TexSSAO", UNIT_SSAO as i32);
        };

        let shader = load_shader(backend, "blit", "shaders/screen_quad.vs", "shaders/default_blit.fs")?;
        let mut blit = Material::new(shader, MaterialType::Custom);
        screen_pass(&mut blit);

        let shader = load_shader(backend, "deferred_ambient", "shaders/screen_quad.vs", "shaders/deferred/screen_ambient.fs")?;
        let mut ambient = Material::new(shader, MaterialType::Custom);
        screen_pass(&mut ambient);
        additive(&mut ambient);
        gbuffer_samplers(&mut ambient);
        ibl_samplers(&mut ambient);

        let shader = load_shader(
            backend,
            "deferred_irradiance",
            "shaders/deferred/ambient_irradiance.vs",
            "shaders/deferred/ambient_irradiance.fs",
        )?;
        let mut irradiance = Material::new(shader, MaterialType::Custom);
        volume_pass(&mut irradiance);
        additive(&mut irradiance);
        gbuffer_samplers(&mut irradiance);
        ibl_samplers(&mut irradiance);

        let shader = load_shader(
            backend,
            "deferred_directional",
            "shaders/screen_quad.vs",
            "shaders/deferred/screen_directional.fs",
        )?;
        let mut directional = Material::new(shader, MaterialType::Custom);
        screen_pass(&mut directional);
        additive(&mut directional);
        gbuffer_samplers(&mut directional);
        directional.set_int("lightShadowMap", UNIT_SHADOW_MAP as i32);

        let shader = load_shader(backend, "deferred_point", "shaders/deferred/point.vs", "shaders/deferred/point.fs")?;
        let mut point = Material::new(shader, MaterialType::Custom);
        volume_pass(&mut point);
        additive(&mut point);
        gbuffer_samplers(&mut point);

        let shader = load_shader(backend, "shadow_directional", "shaders/shadow_cast.vs", "shaders/shadow_cast.fs")?;
        let dir_shadow = Material::new(shader, MaterialType::Custom);

        let shader = load_shader(backend, "debug_light", "shaders/light.vs", "shaders/light.fs")?;
        let mut debug_light = Material::new(shader, MaterialType::Custom);
        debug_light.state.shadow_cast = false;

        let shader = load_shader(backend, "capture", "shaders/capture.vs", "shaders/capture.fs")?;
        let capture = Material::new(shader, MaterialType::Custom);

        Ok(InternalMaterials {
            blit,
            ambient,
            irradiance,
            directional,
            point,
            dir_shadow,
            debug_light,
            capture,
        })
    }

    fn register_template(&mut self, name: &'static str, material: Material) {
        self.templates.insert(template_key(name), material);
        self.template_names.push(name);
    }

    // === Factories ===

    /// Deep-copies the template `base` into a new library-owned material.
    pub fn create_material(&mut self, base: &str) -> Result<MaterialHandle> {
        let Some(template) = self.templates.get(&template_key(base)) else {
            log::error!("Material of template: {base} requested, but template did not exist.");
            return Err(UmbraError::MaterialTemplateNotFound(base.to_string()));
        };
        let material = template.clone();
        Ok(self.materials.insert(material))
    }

    /// A new forward material around `shader`.
    pub fn create_custom_material(&mut self, shader: ShaderId) -> MaterialHandle {
        self.materials.insert(Material::new(shader, MaterialType::Custom))
    }

    /// A new full-screen post-process material around `shader`.
    pub fn create_post_processing_material(&mut self, shader: ShaderId) -> MaterialHandle {
        let mut material = Material::new(shader, MaterialType::PostProcess);
        material.state.depth_test = false;
        material.state.depth_write = false;
        material.state.cull = false;
        material.state.shadow_cast = false;
        self.materials.insert(material)
    }

    /// Frees a material. Commands still referring to it are skipped at draw
    /// time.
    pub fn release(&mut self, handle: MaterialHandle) -> Result<Material> {
        self.materials.remove(handle).ok_or(UmbraError::InvalidMaterialHandle)
    }

    // === Access ===

    #[must_use]
    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle)
    }

    #[must_use]
    pub fn contains(&self, handle: MaterialHandle) -> bool {
        self.materials.contains_key(handle)
    }

    /// Number of live materials handed out (templates excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Material> {
        self.templates.get(&template_key(name))
    }

    pub fn template_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.template_names.iter().copied()
    }

    #[must_use]
    pub fn internal(&self) -> &InternalMaterials {
        &self.internal
    }

    #[must_use]
    pub fn internal_mut(&mut self) -> &mut InternalMaterials {
        &mut self.internal
    }

    #[must_use]
    pub fn fallback_textures(&self) -> FallbackTextures {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::headless::HeadlessBackend;

    #[test]
    fn template_keys_are_name_sensitive() {
        assert_ne!(template_key("alpha blend"), template_key("alpha discard"));
        assert_eq!(template_key("glass"), template_key("glass"));
    }

    #[test]
    fn released_handle_is_stale() {
        let mut backend = HeadlessBackend::new();
        let mut library = MaterialLibrary::new(&mut backend).unwrap();
        let handle = library.create_material("default").unwrap();
        assert!(library.release(handle).is_ok());
        assert!(library.get(handle).is_none());
        assert!(matches!(library.release(handle), Err(UmbraError::InvalidMaterialHandle)));
    }
}
