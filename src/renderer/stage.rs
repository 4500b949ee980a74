//! Frame Stage Definitions
//!
//! `FrameStage` is the ordered list of passes [`Renderer::render_pushed_commands`]
//! drives every frame, together with the data dependencies between them.
//! The renderer records each stage as it executes and validates the record
//! against these declarations.
//!
//! [`Renderer::render_pushed_commands`]: crate::renderer::Renderer::render_pushed_commands
//!
//! # Stage Overview
//!
//! | Stage | Purpose | Reads |
//! |-------|---------|-------|
//! | `SortCommands` | Group commands by shader / blend | - |
//! | `UpdateGlobals` | Camera matrices + light arrays | - |
//! | `Geometry` | Fill the G-Buffer | globals |
//! | `Shadow` | Directional shadow maps (optional) | sorted commands |
//! | `PreLightingPost` | SSAO | G-Buffer |
//! | `Lighting` | Additive ambient + light accumulation | G-Buffer, shadows, SSAO |
//! | `DepthBlit` | Copy G-Buffer depth into the HDR target | G-Buffer |
//! | `Forward` | Custom materials per render target | HDR depth |
//! | `Alpha` | Blended materials | forward output |
//! | `LightDebug` | Light meshes and volumes (optional) | HDR target |
//! | `PostLightingPost` | Downsample chain, blur, bloom | lit HDR |
//! | `CustomPostProcess` | User post-process materials, ping-pong | lit HDR |
//! | `FinalBlit` | Composite to the default framebuffer | everything |
//! | `EndFrame` | Roll view-projection, clear per-frame state | - |

use crate::errors::{Result, UmbraError};

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[repr(u8)]
pub enum FrameStage {
    SortCommands = 0,
    UpdateGlobals = 1,
    Geometry = 2,
    Shadow = 3,
    PreLightingPost = 4,
    Lighting = 5,
    DepthBlit = 6,
    Forward = 7,
    Alpha = 8,
    LightDebug = 9,
    PostLightingPost = 10,
    CustomPostProcess = 11,
    FinalBlit = 12,
    EndFrame = 13,
}

impl FrameStage {
    pub const ALL: [FrameStage; 14] = [
        Self::SortCommands,
        Self::UpdateGlobals,
        Self::Geometry,
        Self::Shadow,
        Self::PreLightingPost,
        Self::Lighting,
        Self::DepthBlit,
        Self::Forward,
        Self::Alpha,
        Self::LightDebug,
        Self::PostLightingPost,
        Self::CustomPostProcess,
        Self::FinalBlit,
        Self::EndFrame,
    ];

    #[inline]
    #[must_use]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SortCommands => "SortCommands",
            Self::UpdateGlobals => "UpdateGlobals",
            Self::Geometry => "Geometry",
            Self::Shadow => "Shadow",
            Self::PreLightingPost => "PreLightingPost",
            Self::Lighting => "Lighting",
            Self::DepthBlit => "DepthBlit",
            Self::Forward => "Forward",
            Self::Alpha => "Alpha",
            Self::LightDebug => "LightDebug",
            Self::PostLightingPost => "PostLightingPost",
            Self::CustomPostProcess => "CustomPostProcess",
            Self::FinalBlit => "FinalBlit",
            Self::EndFrame => "EndFrame",
        }
    }

    /// Stages that may be skipped by configuration.
    #[inline]
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Shadow | Self::LightDebug)
    }

    /// Stages whose output this stage consumes. All of them must have run
    /// earlier in the same frame.
    #[must_use]
    pub const fn dependencies(self) -> &'static [FrameStage] {
        match self {
            Self::SortCommands | Self::UpdateGlobals => &[],
            Self::Geometry => &[Self::SortCommands, Self::UpdateGlobals],
            Self::Shadow => &[Self::SortCommands],
            Self::PreLightingPost | Self::DepthBlit => &[Self::Geometry],
            Self::Lighting => &[Self::Geometry, Self::PreLightingPost],
            Self::Forward => &[Self::Lighting, Self::DepthBlit],
            Self::Alpha => &[Self::Forward],
            Self::LightDebug => &[Self::Lighting],
            Self::PostLightingPost => &[Self::Alpha],
            Self::CustomPostProcess => &[Self::PostLightingPost],
            Self::FinalBlit => &[Self::CustomPostProcess],
            Self::EndFrame => &[Self::FinalBlit],
        }
    }
}

/// Checks an executed stage sequence: strictly increasing order, every
/// required stage present, and every dependency satisfied before use.
pub fn validate_stage_order(executed: &[FrameStage]) -> Result<()> {
    for (i, stage) in executed.iter().enumerate() {
        let before = &executed[..i];
        if let Some(prev) = before.last()
            && prev >= stage
        {
            return Err(UmbraError::StageOrder { stage: stage.name(), missing: prev.name() });
        }
        if let Some(missing) = stage.dependencies().iter().find(|dep| !before.contains(dep)) {
            return Err(UmbraError::StageOrder { stage: stage.name(), missing: missing.name() });
        }
    }

    if let Some(missing) = FrameStage::ALL
        .iter()
        .find(|s| !s.is_optional() && !executed.contains(s))
    {
        return Err(UmbraError::StageOrder { stage: "frame", missing: missing.name() });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        for pair in FrameStage::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].order() + 1, pair[1].order());
        }
    }

    #[test]
    fn dependencies_point_backwards() {
        for stage in FrameStage::ALL {
            for dep in stage.dependencies() {
                assert!(*dep < stage, "{} depends on later {}", stage.name(), dep.name());
            }
        }
    }

    #[test]
    fn full_sequence_is_valid() {
        assert!(validate_stage_order(&FrameStage::ALL).is_ok());
    }

    #[test]
    fn optional_stages_may_be_skipped() {
        let executed: Vec<_> = FrameStage::ALL.into_iter().filter(|s| !s.is_optional()).collect();
        assert!(validate_stage_order(&executed).is_ok());
    }

    #[test]
    fn lighting_before_geometry_is_rejected() {
        let executed = [FrameStage::SortCommands, FrameStage::UpdateGlobals, FrameStage::Lighting];
        assert!(matches!(
            validate_stage_order(&executed),
            Err(UmbraError::StageOrder { stage: "Lighting", missing: "Geometry" })
        ));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let executed = &FrameStage::ALL[..12];
        assert!(matches!(
            validate_stage_order(executed),
            Err(UmbraError::StageOrder { stage: "frame", missing: "FinalBlit" })
        ));
    }
}
