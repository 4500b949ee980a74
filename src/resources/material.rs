//! Material definitions.
//!
//! A [`Material`] pairs a shader program with its uniform values, sampler
//! bindings and fixed-function render state. Its [`MaterialType`] decides
//! which command-buffer bucket it is filed into and is fixed at creation;
//! cloning is the only way to obtain a material of a different lineage.

use std::borrow::Cow;

use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use slotmap::new_key_type;

use super::shader::ShaderId;
use super::texture::{TextureId, TextureKind};

new_key_type! {
    /// Stable handle to a material owned by the
    /// [`MaterialLibrary`](crate::renderer::MaterialLibrary).
    pub struct MaterialHandle;
}

/// Pipeline a material is rendered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialType {
    /// Opaque geometry written to the G-Buffer.
    Default,
    /// Forward-rendered geometry, optionally into a user render target.
    Custom,
    /// Full-screen pass applied after lighting.
    PostProcess,
}

/// A single uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// A texture bound to a fixed texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub unit: u32,
    pub texture: TextureId,
    pub kind: TextureKind,
}

/// Fixed-function state applied before a material's draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,

    pub cull: bool,
    pub cull_face: wgpu::Face,

    pub blend: bool,
    pub blend_src: wgpu::BlendFactor,
    pub blend_dst: wgpu::BlendFactor,
    pub blend_equation: wgpu::BlendOperation,

    pub shadow_cast: bool,
    pub shadow_receive: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            cull: true,
            cull_face: wgpu::Face::Back,
            blend: false,
            blend_src: wgpu::BlendFactor::SrcAlpha,
            blend_dst: wgpu::BlendFactor::OneMinusSrcAlpha,
            blend_equation: wgpu::BlendOperation::Add,
            shadow_cast: true,
            shadow_receive: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    shader: ShaderId,
    material_type: MaterialType,
    uniforms: FxHashMap<Cow<'static, str>, UniformValue>,
    samplers: FxHashMap<Cow<'static, str>, SamplerBinding>,
    pub state: RenderState,
}

impl Material {
    #[must_use]
    pub fn new(shader: ShaderId, material_type: MaterialType) -> Self {
        Self {
            shader,
            material_type,
            uniforms: FxHashMap::default(),
            samplers: FxHashMap::default(),
            state: RenderState::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    #[inline]
    #[must_use]
    pub fn material_type(&self) -> MaterialType {
        self.material_type
    }

    /// Clones the material with a different program, keeping uniforms,
    /// samplers and state. Used to re-render scene geometry through a
    /// pass-specific shader.
    #[must_use]
    pub fn with_shader(&self, shader: ShaderId) -> Self {
        Self { shader, ..self.clone() }
    }

    /// Whether this material is alpha blended. Blended materials always take
    /// the forward alpha path regardless of their declared type.
    #[inline]
    #[must_use]
    pub fn is_blended(&self) -> bool {
        self.state.blend
    }

    // === Uniforms ===

    pub fn set_uniform(&mut self, name: impl Into<Cow<'static, str>>, value: UniformValue) {
        self.uniforms.insert(name.into(), value);
    }

    pub fn set_bool(&mut self, name: impl Into<Cow<'static, str>>, value: bool) {
        self.set_uniform(name, UniformValue::Bool(value));
    }

    pub fn set_int(&mut self, name: impl Into<Cow<'static, str>>, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    pub fn set_float(&mut self, name: impl Into<Cow<'static, str>>, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    pub fn set_vec2(&mut self, name: impl Into<Cow<'static, str>>, value: Vec2) {
        self.set_uniform(name, UniformValue::Vec2(value));
    }

    pub fn set_vec3(&mut self, name: impl Into<Cow<'static, str>>, value: Vec3) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    pub fn set_vec4(&mut self, name: impl Into<Cow<'static, str>>, value: Vec4) {
        self.set_uniform(name, UniformValue::Vec4(value));
    }

    pub fn set_mat4(&mut self, name: impl Into<Cow<'static, str>>, value: Mat4) {
        self.set_uniform(name, UniformValue::Mat4(value));
    }

    pub fn remove_uniform(&mut self, name: &str) -> Option<UniformValue> {
        self.uniforms.remove(name)
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(k, v)| (k.as_ref(), v))
    }

    // === Samplers ===

    pub fn set_texture(&mut self, name: impl Into<Cow<'static, str>>, texture: TextureId, unit: u32) {
        self.samplers.insert(
            name.into(),
            SamplerBinding { unit, texture, kind: TextureKind::D2 },
        );
    }

    pub fn set_texture_cube(&mut self, name: impl Into<Cow<'static, str>>, texture: TextureId, unit: u32) {
        self.samplers.insert(
            name.into(),
            SamplerBinding { unit, texture, kind: TextureKind::Cube },
        );
    }

    #[must_use]
    pub fn sampler(&self, name: &str) -> Option<&SamplerBinding> {
        self.samplers.get(name)
    }

    pub fn samplers(&self) -> impl Iterator<Item = (&str, &SamplerBinding)> {
        self.samplers.iter().map(|(k, v)| (k.as_ref(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_deep() {
        let mut template = Material::new(ShaderId(3), MaterialType::Default);
        template.set_float("roughness", 0.5);
        template.set_texture("TexAlbedo", TextureId(9), 3);

        let mut copy = template.clone();
        copy.set_float("roughness", 0.9);
        copy.state.cull = false;

        assert_eq!(template.uniform("roughness"), Some(&UniformValue::Float(0.5)));
        assert!(template.state.cull);
        assert_eq!(copy.shader(), template.shader());
        assert_eq!(copy.sampler("TexAlbedo").map(|s| s.unit), Some(3));
    }
}
