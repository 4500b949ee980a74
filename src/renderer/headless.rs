//! Headless Backend
//!
//! A [`GraphicsBackend`] that performs no GPU work. It hands out handles,
//! tracks which resources are alive and records every call in submission
//! order. It is used for tests and for running the pipeline on machines
//! without a GPU (tooling, CI captures).
//!
//! # Example
//!
//! ```rust,ignore
//! let mut renderer = Renderer::new(HeadlessBackend::new(), RendererSettings::default(), 1280, 720)?;
//! renderer.render_pushed_commands()?;
//! assert!(renderer.backend().draw_count() > 0);
//! ```

use glam::Mat4;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{Result, UmbraError};
use crate::renderer::backend::{BackendCapabilities, ClearFlags, DrawCall, FramebufferId, GraphicsBackend};
use crate::renderer::uniforms::GlobalUniforms;
use crate::resources::{CubeFace, Material, Mesh, MeshData, MeshId, RenderState, ShaderDesc, ShaderId, TextureDesc, TextureId};

/// A recorded draw submission.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub mesh: MeshId,
    pub shader: ShaderId,
    pub model: Mat4,
    pub prev_model: Mat4,
    /// Snapshot of the material at submission time.
    pub material: Material,
    /// Framebuffer bound when the draw was issued (`None` = default).
    pub target: Option<FramebufferId>,
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub enum BackendCall {
    CreateShader { id: ShaderId, name: String },
    CreateMesh { id: MeshId, label: &'static str },
    CreateTexture { id: TextureId, desc: TextureDesc },
    DestroyTexture(TextureId),
    GenerateMipmaps(TextureId),
    CreateFramebuffer { id: FramebufferId, color_attachments: usize, depth_stencil: bool },
    DestroyFramebuffer(FramebufferId),
    AttachCubeFace { framebuffer: FramebufferId, cubemap: TextureId, face: CubeFace, mip: u32 },
    BindFramebuffer { target: Option<FramebufferId>, width: u32, height: u32 },
    SetDrawBuffers(u32),
    Clear(ClearFlags),
    ApplyState(RenderState),
    SetCullFace(wgpu::Face),
    SetWireframe(bool),
    UploadGlobals,
    Draw(Box<DrawRecord>),
    BlitDepth { src: FramebufferId, dst: Option<FramebufferId> },
}

#[derive(Debug)]
pub struct HeadlessBackend {
    capabilities: BackendCapabilities,
    next_id: u32,
    calls: Vec<BackendCall>,
    textures: FxHashMap<TextureId, TextureDesc>,
    framebuffers: FxHashSet<FramebufferId>,
    failing_shaders: FxHashSet<String>,
    bound: Option<FramebufferId>,
    globals: Option<GlobalUniforms>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(BackendCapabilities::REQUIRED)
    }

    #[must_use]
    pub fn with_capabilities(capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            next_id: 1,
            calls: Vec::with_capacity(1024),
            textures: FxHashMap::default(),
            framebuffers: FxHashSet::default(),
            failing_shaders: FxHashSet::default(),
            bound: None,
            globals: None,
        }
    }

    /// Makes every later `create_shader` for `name` fail, to exercise
    /// configuration error paths.
    pub fn fail_shader(&mut self, name: impl Into<String>) {
        self.failing_shaders.insert(name.into());
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // === Inspection ===

    #[must_use]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Drains the call log, keeping resource bookkeeping intact.
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.calls.iter().filter_map(|call| match call {
            BackendCall::Draw(record) => Some(record.as_ref()),
            _ => None,
        })
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    /// The most recently uploaded global uniform block.
    #[must_use]
    pub fn last_globals(&self) -> Option<&GlobalUniforms> {
        self.globals.as_ref()
    }

    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&id)
    }

    #[must_use]
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId> {
        if desc.vertex_path.is_empty() || desc.fragment_path.is_empty() {
            return Err(UmbraError::ShaderCompilation {
                name: desc.name.to_string(),
                reason: "missing stage source".to_string(),
            });
        }
        if self.failing_shaders.contains(desc.name.as_ref()) {
            return Err(UmbraError::ShaderCompilation {
                name: desc.name.to_string(),
                reason: "compilation rejected".to_string(),
            });
        }
        let id = ShaderId(self.next());
        self.calls.push(BackendCall::CreateShader { id, name: desc.name.to_string() });
        Ok(id)
    }

    fn create_mesh(&mut self, data: &MeshData) -> Result<Mesh> {
        let id = MeshId(self.next());
        self.calls.push(BackendCall::CreateMesh { id, label: data.label });
        Ok(Mesh {
            id,
            topology: data.topology,
            element_count: data.element_count(),
            indexed: data.indices.is_some(),
        })
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let id = TextureId(self.next());
        // Texel payloads are not kept.
        let mut stored = desc.clone();
        stored.data = None;
        self.textures.insert(id, stored.clone());
        self.calls.push(BackendCall::CreateTexture { id, desc: stored });
        id
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.calls.push(BackendCall::DestroyTexture(texture));
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        self.calls.push(BackendCall::GenerateMipmaps(texture));
    }

    fn create_framebuffer(&mut self, colors: &[TextureId], depth_stencil: Option<TextureId>) -> Result<FramebufferId> {
        if colors.len() as u32 > self.capabilities.max_color_attachments {
            return Err(UmbraError::IncompleteFramebuffer(format!(
                "{} color attachments requested, backend supports {}",
                colors.len(),
                self.capabilities.max_color_attachments
            )));
        }
        if colors.is_empty() && depth_stencil.is_none() {
            return Err(UmbraError::IncompleteFramebuffer("no attachments".to_string()));
        }
        let id = FramebufferId(self.next());
        self.framebuffers.insert(id);
        self.calls.push(BackendCall::CreateFramebuffer {
            id,
            color_attachments: colors.len(),
            depth_stencil: depth_stencil.is_some(),
        });
        Ok(id)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        self.calls.push(BackendCall::DestroyFramebuffer(framebuffer));
    }

    fn attach_cube_face(&mut self, framebuffer: FramebufferId, cubemap: TextureId, face: CubeFace, mip: u32) {
        self.calls.push(BackendCall::AttachCubeFace { framebuffer, cubemap, face, mip });
    }

    fn bind_framebuffer(&mut self, target: Option<FramebufferId>, width: u32, height: u32) {
        self.bound = target;
        self.calls.push(BackendCall::BindFramebuffer { target, width, height });
    }

    fn set_draw_buffers(&mut self, count: u32) {
        self.calls.push(BackendCall::SetDrawBuffers(count));
    }

    fn clear(&mut self, flags: ClearFlags, _color: wgpu::Color) {
        self.calls.push(BackendCall::Clear(flags));
    }

    fn apply_state(&mut self, state: &RenderState) {
        self.calls.push(BackendCall::ApplyState(*state));
    }

    fn set_cull_face(&mut self, face: wgpu::Face) {
        self.calls.push(BackendCall::SetCullFace(face));
    }

    fn set_wireframe(&mut self, enabled: bool) {
        self.calls.push(BackendCall::SetWireframe(enabled));
    }

    fn upload_globals(&mut self, globals: &GlobalUniforms) {
        self.globals = Some(*globals);
        self.calls.push(BackendCall::UploadGlobals);
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        self.calls.push(BackendCall::Draw(Box::new(DrawRecord {
            mesh: call.mesh.id,
            shader: call.material.shader(),
            model: call.model,
            prev_model: call.prev_model,
            material: call.material.clone(),
            target: self.bound,
        })));
    }

    fn blit_depth(&mut self, src: FramebufferId, dst: Option<FramebufferId>, _width: u32, _height: u32) {
        self.calls.push(BackendCall::BlitDepth { src, dst });
    }
}
