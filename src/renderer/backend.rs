//! Graphics Backend Abstraction
//!
//! Every GPU call the render core makes goes through [`GraphicsBackend`].
//! The renderer and its subsystems are generic over the backend, so draw
//! submission is statically dispatched.
//!
//! # Capabilities
//!
//! Backends describe what they can do through [`BackendCapabilities`]. The
//! renderer checks these once at construction and refuses to start on a
//! backend that cannot host the pipeline, instead of failing at first draw.

use bitflags::bitflags;
use glam::Mat4;

use crate::errors::Result;
use crate::renderer::uniforms::GlobalUniforms;
use crate::resources::{CubeFace, Material, Mesh, MeshData, RenderState, ShaderDesc, ShaderId, TextureDesc, TextureId};

/// Opaque handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FramebufferId(pub u32);

bitflags! {
    /// Buffers cleared by [`GraphicsBackend::clear`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Features a backend must expose to run the hybrid pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub max_color_attachments: u32,
    pub cubemap_render_targets: bool,
    pub framebuffer_depth_blit: bool,
}

impl BackendCapabilities {
    /// Minimum capability set: a 4-attachment G-Buffer, render-to-cubemap for
    /// IBL baking and depth blits before the forward pass.
    pub const REQUIRED: Self = Self {
        max_color_attachments: 4,
        cubemap_render_targets: true,
        framebuffer_depth_blit: true,
    };

    /// Returns the name of the first missing capability, if any.
    #[must_use]
    pub fn missing(&self, required: &Self) -> Option<&'static str> {
        if self.max_color_attachments < required.max_color_attachments {
            return Some("color attachments");
        }
        if required.cubemap_render_targets && !self.cubemap_render_targets {
            return Some("cubemap render targets");
        }
        if required.framebuffer_depth_blit && !self.framebuffer_depth_blit {
            return Some("framebuffer depth blit");
        }
        None
    }
}

/// A single draw submission.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub mesh: &'a Mesh,
    /// Program, uniforms and sampler bindings to use.
    pub material: &'a Material,
    pub model: Mat4,
    pub prev_model: Mat4,
}

pub trait GraphicsBackend {
    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    // === Resource creation ===

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId>;

    fn create_mesh(&mut self, data: &MeshData) -> Result<Mesh>;

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;

    fn destroy_texture(&mut self, texture: TextureId);

    fn generate_mipmaps(&mut self, texture: TextureId);

    /// Assembles a framebuffer. Zero colour attachments yields a depth-only
    /// target.
    fn create_framebuffer(&mut self, colors: &[TextureId], depth_stencil: Option<TextureId>) -> Result<FramebufferId>;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Redirects colour attachment 0 of `framebuffer` to one face/mip of a
    /// cubemap.
    fn attach_cube_face(&mut self, framebuffer: FramebufferId, cubemap: TextureId, face: CubeFace, mip: u32);

    // === Pass state ===

    /// Binds `target` (or the default framebuffer for `None`) and sets the
    /// viewport.
    fn bind_framebuffer(&mut self, target: Option<FramebufferId>, width: u32, height: u32);

    /// Limits colour writes to the first `count` attachments.
    fn set_draw_buffers(&mut self, count: u32);

    fn clear(&mut self, flags: ClearFlags, color: wgpu::Color);

    fn apply_state(&mut self, state: &RenderState);

    /// Overrides the culled face without touching the rest of the state.
    fn set_cull_face(&mut self, face: wgpu::Face);

    fn set_wireframe(&mut self, enabled: bool);

    // === Submission ===

    fn upload_globals(&mut self, globals: &GlobalUniforms);

    fn draw(&mut self, call: &DrawCall<'_>);

    /// Copies the depth buffer of `src` into `dst` (nearest filtering).
    fn blit_depth(&mut self, src: FramebufferId, dst: Option<FramebufferId>, width: u32, height: u32);

    // === Helpers ===

    /// Applies `material`'s state and draws `mesh` with identity transforms.
    /// Used for full-screen passes over the NDC quad.
    fn draw_fullscreen(&mut self, quad: &Mesh, material: &Material) {
        self.apply_state(&material.state);
        self.draw(&DrawCall {
            mesh: quad,
            material,
            model: Mat4::IDENTITY,
            prev_model: Mat4::IDENTITY,
        });
    }
}
