//! Render Command Buffer
//!
//! Decouples scene traversal from draw submission. Commands are filed into
//! buckets when pushed, sorted once per frame to minimise state changes, and
//! read back per pipeline stage with optional frustum culling.
//!
//! # Buckets
//!
//! | Bucket        | Filed when                                  | Sort key            |
//! |---------------|---------------------------------------------|---------------------|
//! | deferred      | `type == Default`, not blended              | shader              |
//! | custom[target]| `type == Custom`, not blended               | shader              |
//! | post-process  | `type == PostProcess`, not blended          | submission order    |
//! | alpha         | blended, regardless of type                 | none                |
//!
//! The buffer is not double-buffered: it is cleared after every frame and
//! must be fully re-pushed.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::renderer::backend::FramebufferId;
use crate::resources::{Material, MaterialHandle, MaterialType, Mesh, ShaderId};
use crate::scene::camera::Frustum;

/// One pending draw request. Lives for a single frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderCommand {
    pub transform: Mat4,
    pub prev_transform: Mat4,
    /// `None` for full-screen post-process materials; the renderer substitutes
    /// its screen quad.
    pub mesh: Option<Mesh>,
    pub material: MaterialHandle,
    /// World-space bounds.
    pub box_min: Vec3,
    pub box_max: Vec3,

    // Material properties captured at push time for sorting and filtering
    pub(crate) shader: ShaderId,
    pub(crate) blend: bool,
    pub(crate) shadow_cast: bool,
}

impl RenderCommand {
    #[inline]
    #[must_use]
    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    #[inline]
    #[must_use]
    pub fn is_blended(&self) -> bool {
        self.blend
    }

    #[inline]
    #[must_use]
    pub fn casts_shadow(&self) -> bool {
        self.shadow_cast
    }

    #[inline]
    fn visible_in(&self, frustum: &Frustum) -> bool {
        frustum.intersects_box(self.box_min, self.box_max)
    }
}

/// Where a pushed command was filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBucket {
    Deferred,
    Custom(Option<FramebufferId>),
    PostProcess,
    Alpha,
}

#[derive(Debug, Default)]
pub struct CommandBuffer {
    deferred: Vec<RenderCommand>,
    custom: FxHashMap<Option<FramebufferId>, Vec<RenderCommand>>,
    post_process: Vec<RenderCommand>,
    alpha: Vec<RenderCommand>,
}

impl CommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a command by its material. Blending takes precedence over the
    /// declared type; custom commands go to the bucket of `target`, which is
    /// created on first use.
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        mesh: Option<Mesh>,
        material_handle: MaterialHandle,
        material: &Material,
        transform: Mat4,
        prev_transform: Mat4,
        box_min: Vec3,
        box_max: Vec3,
        target: Option<FramebufferId>,
    ) -> CommandBucket {
        let command = RenderCommand {
            transform,
            prev_transform,
            mesh,
            material: material_handle,
            box_min,
            box_max,
            shader: material.shader(),
            blend: material.is_blended(),
            shadow_cast: material.state.shadow_cast,
        };

        if command.blend {
            self.alpha.push(command);
            return CommandBucket::Alpha;
        }

        match material.material_type() {
            MaterialType::Default => {
                self.deferred.push(command);
                CommandBucket::Deferred
            }
            MaterialType::Custom => {
                self.custom.entry(target).or_default().push(command);
                CommandBucket::Custom(target)
            }
            MaterialType::PostProcess => {
                self.post_process.push(command);
                CommandBucket::PostProcess
            }
        }
    }

    /// Groups deferred commands and each target's custom commands by shader.
    /// Blended commands never reach these buckets.
    pub fn sort(&mut self) {
        self.deferred.sort_unstable_by_key(|c| c.shader);
        for commands in self.custom.values_mut() {
            commands.sort_unstable_by_key(|c| c.shader);
        }
    }

    pub fn clear(&mut self) {
        self.deferred.clear();
        self.custom.clear();
        self.post_process.clear();
        self.alpha.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deferred.len()
            + self.custom.values().map(Vec::len).sum::<usize>()
            + self.post_process.len()
            + self.alpha.len()
    }

    // === Retrieval ===

    /// Deferred commands, culled against `frustum` when given.
    #[must_use]
    pub fn deferred_render_commands(&self, frustum: Option<&Frustum>) -> Vec<RenderCommand> {
        filter_visible(&self.deferred, frustum)
    }

    /// Custom commands for `target`. Culling only applies to the default
    /// target; user targets render from their own viewpoint.
    #[must_use]
    pub fn custom_render_commands(&self, target: Option<FramebufferId>, frustum: Option<&Frustum>) -> Vec<RenderCommand> {
        let Some(commands) = self.custom.get(&target) else {
            return Vec::new();
        };
        let frustum = if target.is_none() { frustum } else { None };
        filter_visible(commands, frustum)
    }

    #[must_use]
    pub fn alpha_render_commands(&self, frustum: Option<&Frustum>) -> Vec<RenderCommand> {
        filter_visible(&self.alpha, frustum)
    }

    /// Post-process commands in submission order.
    #[must_use]
    pub fn post_processing_render_commands(&self) -> Vec<RenderCommand> {
        self.post_process.clone()
    }

    /// Shadow casters among the deferred and default-target custom commands.
    /// Blended and post-process commands never cast shadows.
    #[must_use]
    pub fn shadow_cast_render_commands(&self) -> Vec<RenderCommand> {
        let custom = self.custom.get(&None).map(Vec::as_slice).unwrap_or_default();
        self.deferred
            .iter()
            .chain(custom)
            .filter(|c| c.shadow_cast)
            .copied()
            .collect()
    }

    /// Render targets that currently own a custom bucket.
    pub fn custom_targets(&self) -> impl Iterator<Item = Option<FramebufferId>> + '_ {
        self.custom.keys().copied()
    }
}

fn filter_visible(commands: &[RenderCommand], frustum: Option<&Frustum>) -> Vec<RenderCommand> {
    match frustum {
        Some(frustum) => commands.iter().filter(|c| c.visible_in(frustum)).copied().collect(),
        None => commands.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;
    use crate::resources::{MeshId, Topology};

    fn mesh() -> Mesh {
        Mesh { id: MeshId(1), topology: Topology::Triangles, element_count: 36, indexed: true }
    }

    fn material(shader: u32, material_type: MaterialType) -> Material {
        Material::new(ShaderId(shader), material_type)
    }

    fn push(buffer: &mut CommandBuffer, handle: MaterialHandle, material: &Material) -> CommandBucket {
        buffer.push(
            Some(mesh()),
            handle,
            material,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
            None,
        )
    }

    #[test]
    fn blend_overrides_declared_type() {
        let mut handles = SlotMap::<MaterialHandle, ()>::with_key();
        let mut buffer = CommandBuffer::new();

        let mut glass = material(1, MaterialType::Default);
        glass.state.blend = true;
        assert_eq!(push(&mut buffer, handles.insert(()), &glass), CommandBucket::Alpha);

        let mut blended_post = material(2, MaterialType::PostProcess);
        blended_post.state.blend = true;
        assert_eq!(push(&mut buffer, handles.insert(()), &blended_post), CommandBucket::Alpha);

        assert_eq!(buffer.alpha_render_commands(None).len(), 2);
        assert!(buffer.deferred_render_commands(None).is_empty());
        assert!(buffer.post_processing_render_commands().is_empty());
    }

    #[test]
    fn deferred_sorted_by_shader() {
        let mut handles = SlotMap::<MaterialHandle, ()>::with_key();
        let mut buffer = CommandBuffer::new();
        for shader in [7, 3, 5, 3] {
            push(&mut buffer, handles.insert(()), &material(shader, MaterialType::Default));
        }
        buffer.sort();

        let shaders: Vec<u32> = buffer.deferred_render_commands(None).iter().map(|c| c.shader().0).collect();
        assert_eq!(shaders, vec![3, 3, 5, 7]);
    }

    #[test]
    fn custom_sorted_by_shader_per_target() {
        let mut handles = SlotMap::<MaterialHandle, ()>::with_key();
        let mut buffer = CommandBuffer::new();
        let mirror = Some(FramebufferId(4));
        for (shader, target) in [(8, None), (2, mirror), (4, None), (6, mirror), (1, None)] {
            buffer.push(
                Some(mesh()),
                handles.insert(()),
                &material(shader, MaterialType::Custom),
                Mat4::IDENTITY,
                Mat4::IDENTITY,
                Vec3::splat(-1.0),
                Vec3::splat(1.0),
                target,
            );
        }
        buffer.sort();

        let shaders = |target| -> Vec<u32> {
            buffer.custom_render_commands(target, None).iter().map(|c| c.shader().0).collect()
        };
        assert_eq!(shaders(None), vec![1, 4, 8]);
        assert_eq!(shaders(mirror), vec![2, 6]);
    }

    #[test]
    fn post_process_keeps_submission_order() {
        let mut handles = SlotMap::<MaterialHandle, ()>::with_key();
        let mut buffer = CommandBuffer::new();
        let first = handles.insert(());
        let second = handles.insert(());
        push(&mut buffer, first, &material(9, MaterialType::PostProcess));
        push(&mut buffer, second, &material(1, MaterialType::PostProcess));
        buffer.sort();

        let order: Vec<MaterialHandle> =
            buffer.post_processing_render_commands().iter().map(|c| c.material).collect();
        assert_eq!(order, vec![first, second]);
    }

    #[test]
    fn clear_empties_every_bucket() {
        let mut handles = SlotMap::<MaterialHandle, ()>::with_key();
        let mut buffer = CommandBuffer::new();
        push(&mut buffer, handles.insert(()), &material(1, MaterialType::Default));
        push(&mut buffer, handles.insert(()), &material(2, MaterialType::Custom));
        push(&mut buffer, handles.insert(()), &material(3, MaterialType::PostProcess));
        assert_eq!(buffer.len(), 3);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.custom_targets().count(), 0);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn non_casters_excluded_from_shadow_list() {
        let mut handles = SlotMap::<MaterialHandle, ()>::with_key();
        let mut buffer = CommandBuffer::new();
        let mut no_shadow = material(1, MaterialType::Default);
        no_shadow.state.shadow_cast = false;
        push(&mut buffer, handles.insert(()), &no_shadow);
        push(&mut buffer, handles.insert(()), &material(2, MaterialType::Custom));

        let casters = buffer.shadow_cast_render_commands();
        assert_eq!(casters.len(), 1);
        assert_eq!(casters[0].shader(), ShaderId(2));
    }
}
