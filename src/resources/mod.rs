//! Resource descriptions consumed by the render core.
//!
//! These types do not touch the GPU themselves:
//! - Mesh: handle to uploaded geometry
//! - Shader: handle to a compiled program
//! - Texture: handle to a GPU image
//! - Material: shader + uniforms + render state
//! - RenderTarget: owning framebuffer wrapper (allocated via a backend)

pub mod material;
pub mod mesh;
pub mod primitives;
pub mod render_target;
pub mod shader;
pub mod texture;

pub use material::{Material, MaterialHandle, MaterialType, RenderState, SamplerBinding, UniformValue};
pub use mesh::{Mesh, MeshData, MeshId, Topology};
pub use render_target::{RenderTarget, RenderTargetDesc, TargetView};
pub use shader::{ShaderDesc, ShaderId};
pub use texture::{CubeFace, TextureDesc, TextureId, TextureKind};
