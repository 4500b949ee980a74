//! Umbra: a hybrid deferred/forward render core.
//!
//! Scene code pushes render commands each frame; the [`Renderer`] sorts them
//! into pipeline buckets and runs the G-Buffer, shadow, lighting, forward,
//! alpha and post-processing stages over a [`GraphicsBackend`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use errors::{Result, UmbraError};
pub use renderer::{
    CommandBucket, CommandBuffer, FrameReport, FrameStage, GraphicsBackend, HeadlessBackend, LightAdmission,
    MaterialLibrary, PBRCapture, PostProcessSettings, PostProcessor, RenderCommand, Renderer, RendererSettings, PBR,
};
pub use resources::{Material, MaterialHandle, MaterialType, Mesh, RenderState, RenderTarget, RenderTargetDesc};
pub use scene::{Camera, DirectionalLight, Frustum, PointLight, SceneNode};
