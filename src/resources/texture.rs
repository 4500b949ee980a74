//! Texture handles and descriptors.
//!
//! GPU images are owned by whichever subsystem requested them from the
//! backend. Everything else refers to them through the copyable
//! [`TextureId`].

use glam::Vec3;

/// Opaque handle to a GPU image (2D or cube).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

/// Dimensionality of a texture binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

/// Creation parameters for a backend texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub mip_level_count: u32,
    /// Initial texel data, tightly packed. `None` leaves the image undefined.
    pub data: Option<Vec<u8>>,
}

impl TextureDesc {
    #[must_use]
    pub fn new_2d(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            kind: TextureKind::D2,
            width,
            height,
            format,
            mip_level_count: 1,
            data: None,
        }
    }

    #[must_use]
    pub fn new_cube(label: &'static str, size: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            kind: TextureKind::Cube,
            width: size,
            height: size,
            format,
            mip_level_count: 1,
            data: None,
        }
    }

    #[must_use]
    pub fn with_mips(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count.max(1);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

/// One face of a cubemap, in the conventional +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Viewing direction and up vector used when rendering into this face.
    #[must_use]
    pub fn orientation(self) -> (Vec3, Vec3) {
        match self {
            CubeFace::PositiveX => (Vec3::X, Vec3::NEG_Y),
            CubeFace::NegativeX => (Vec3::NEG_X, Vec3::NEG_Y),
            CubeFace::PositiveY => (Vec3::Y, Vec3::Z),
            CubeFace::NegativeY => (Vec3::NEG_Y, Vec3::NEG_Z),
            CubeFace::PositiveZ => (Vec3::Z, Vec3::NEG_Y),
            CubeFace::NegativeZ => (Vec3::NEG_Z, Vec3::NEG_Y),
        }
    }
}

/// Size of a mip level, never smaller than one texel.
#[inline]
#[must_use]
pub fn mip_size(base: u32, mip: u32) -> u32 {
    (base >> mip).max(1)
}
