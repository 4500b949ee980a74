//! Renderer Settings
//!
//! Runtime feature toggles for the frame pipeline and the post-processing
//! chain. Both structs are plain data and can be loaded from JSON.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use umbra::renderer::{RendererSettings, PostProcessSettings};
//!
//! let settings = RendererSettings {
//!     shadows: false,
//!     ..Default::default()
//! };
//!
//! let settings = RendererSettings::from_json(r#"{ "light_volumes": true }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;

// ---------------------------------------------------------------------------
// PostProcessSettings
// ---------------------------------------------------------------------------

/// Toggles and parameters of the screen-space effect chain.
///
/// | Field              | Description                                   | Default |
/// |--------------------|-----------------------------------------------|---------|
/// | `ssao`             | Screen-space ambient occlusion before lighting | `true`  |
/// | `sepia`            | Sepia tint in the final composite             | `false` |
/// | `vignette`         | Vignette in the final composite               | `false` |
/// | `bloom`            | Bright-pass + 4-tier blurred bloom            | `true`  |
/// | `motion_blur`      | Velocity-buffer motion blur                   | `true`  |
/// | `ssao_kernel_size` | Hemisphere samples per pixel                  | `32`    |
/// | `target_fps`       | Frame rate at which motion blur scale is 0.8  | `60.0`  |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessSettings {
    pub ssao: bool,
    pub sepia: bool,
    pub vignette: bool,
    pub bloom: bool,
    pub motion_blur: bool,
    pub ssao_kernel_size: u32,
    pub target_fps: f32,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            ssao: true,
            sepia: false,
            vignette: false,
            bloom: true,
            motion_blur: true,
            ssao_kernel_size: 32,
            target_fps: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Frame pipeline configuration.
///
/// | Field            | Description                                        | Default |
/// |------------------|----------------------------------------------------|---------|
/// | `shadows`        | Directional shadow map pass                        | `true`  |
/// | `lights`         | Deferred lighting accumulation                     | `true`  |
/// | `render_lights`  | Debug meshes at visible point lights               | `true`  |
/// | `light_volumes`  | Wireframe point light volumes                      | `false` |
/// | `render_probes`  | Debug spheres at irradiance probes                 | `false` |
/// | `irradiance_gi`  | Per-probe ambient volumes instead of the sky probe | `true`  |
/// | `wireframe`      | Wireframe geometry pass                            | `false` |
/// | `clear_color`    | Clear colour for G-Buffer and HDR targets          | black   |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub shadows: bool,
    pub lights: bool,
    pub render_lights: bool,
    pub light_volumes: bool,
    pub render_probes: bool,
    pub irradiance_gi: bool,
    pub wireframe: bool,
    pub clear_color: [f64; 4],
    pub post: PostProcessSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            shadows: true,
            lights: true,
            render_lights: true,
            light_volumes: false,
            render_probes: false,
            irradiance_gi: true,
            wireframe: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            post: PostProcessSettings::default(),
        }
    }
}

impl RendererSettings {
    /// Parses settings from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }
}
