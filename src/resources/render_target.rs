//! Off-screen render targets.
//!
//! A [`RenderTarget`] owns its framebuffer and attachments. It is created and
//! destroyed through a [`GraphicsBackend`]; resizing destroys the old
//! attachments and regenerates them at the new size. Subsystems that do not
//! own a target refer to it through its [`FramebufferId`].

use smallvec::SmallVec;

use crate::errors::{Result, UmbraError};
use crate::renderer::backend::{FramebufferId, GraphicsBackend};
use crate::resources::texture::{TextureDesc, TextureId};

/// Creation parameters for a [`RenderTarget`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub color_format: wgpu::TextureFormat,
    pub color_attachments: u32,
    pub depth_stencil: bool,
}

impl RenderTargetDesc {
    #[must_use]
    pub fn new(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            label,
            width,
            height,
            color_format: wgpu::TextureFormat::Rgba16Float,
            color_attachments: 1,
            depth_stencil: true,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.color_format = format;
        self
    }

    #[must_use]
    pub fn with_color_attachments(mut self, count: u32) -> Self {
        self.color_attachments = count;
        self
    }

    #[must_use]
    pub fn with_depth_stencil(mut self, enabled: bool) -> Self {
        self.depth_stencil = enabled;
        self
    }
}

/// Non-owning, copyable view of a target: what a pass needs to render into
/// it or sample from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetView {
    pub framebuffer: FramebufferId,
    /// Colour attachment 0, or the depth attachment of depth-only targets.
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct RenderTarget {
    desc: RenderTargetDesc,
    framebuffer: FramebufferId,
    colors: SmallVec<[TextureId; 4]>,
    depth_stencil: Option<TextureId>,
}

impl RenderTarget {
    pub fn new<B: GraphicsBackend>(backend: &mut B, desc: RenderTargetDesc) -> Result<Self> {
        let (framebuffer, colors, depth_stencil) = Self::allocate(backend, &desc)?;
        log::debug!(
            "Created render target '{}' ({}x{}, {} color)",
            desc.label,
            desc.width,
            desc.height,
            colors.len()
        );
        Ok(Self { desc, framebuffer, colors, depth_stencil })
    }

    fn allocate<B: GraphicsBackend>(
        backend: &mut B,
        desc: &RenderTargetDesc,
    ) -> Result<(FramebufferId, SmallVec<[TextureId; 4]>, Option<TextureId>)> {
        let colors: SmallVec<[TextureId; 4]> = (0..desc.color_attachments)
            .map(|_| {
                backend.create_texture(&TextureDesc::new_2d(
                    desc.label,
                    desc.width,
                    desc.height,
                    desc.color_format,
                ))
            })
            .collect();

        let depth_stencil = desc.depth_stencil.then(|| {
            backend.create_texture(&TextureDesc::new_2d(
                desc.label,
                desc.width,
                desc.height,
                wgpu::TextureFormat::Depth24PlusStencil8,
            ))
        });

        if colors.is_empty() && depth_stencil.is_none() {
            return Err(UmbraError::IncompleteFramebuffer(format!("'{}' has no attachments", desc.label)));
        }

        let framebuffer = backend.create_framebuffer(&colors, depth_stencil)?;
        Ok((framebuffer, colors, depth_stencil))
    }

    /// Regenerates every attachment at the new size. A no-op when the size
    /// is unchanged.
    pub fn resize<B: GraphicsBackend>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()> {
        if self.desc.width == width && self.desc.height == height {
            return Ok(());
        }
        self.release(backend);
        self.desc.width = width;
        self.desc.height = height;
        let (framebuffer, colors, depth_stencil) = Self::allocate(backend, &self.desc)?;
        self.framebuffer = framebuffer;
        self.colors = colors;
        self.depth_stencil = depth_stencil;
        Ok(())
    }

    /// Frees the GPU objects. The target must not be used afterwards.
    pub fn destroy<B: GraphicsBackend>(mut self, backend: &mut B) {
        self.release(backend);
    }

    fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        backend.destroy_framebuffer(self.framebuffer);
        for texture in self.colors.drain(..) {
            backend.destroy_texture(texture);
        }
        if let Some(depth) = self.depth_stencil.take() {
            backend.destroy_texture(depth);
        }
    }

    #[inline]
    #[must_use]
    pub fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    #[must_use]
    pub fn view(&self) -> TargetView {
        // allocate() rejects targets without attachments
        TargetView {
            framebuffer: self.framebuffer,
            texture: self.colors.first().copied().or(self.depth_stencil).unwrap_or(TextureId(0)),
            width: self.desc.width,
            height: self.desc.height,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    #[inline]
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.desc.width as f32 / self.desc.height.max(1) as f32
    }

    /// Colour attachment `index`.
    ///
    /// # Panics
    ///
    /// Panics if the target has fewer attachments.
    #[inline]
    #[must_use]
    pub fn color_texture(&self, index: usize) -> TextureId {
        self.colors[index]
    }

    #[inline]
    #[must_use]
    pub fn color_textures(&self) -> &[TextureId] {
        &self.colors
    }

    #[inline]
    #[must_use]
    pub fn depth_stencil_texture(&self) -> Option<TextureId> {
        self.depth_stencil
    }

    #[inline]
    #[must_use]
    pub fn has_depth_stencil(&self) -> bool {
        self.depth_stencil.is_some()
    }
}
