//! Renderer
//!
//! [`Renderer`] owns the G-Buffer, the lit HDR target, the shadow pool and
//! the three render subsystems ([`MaterialLibrary`], [`PostProcessor`],
//! [`PBR`]), and drives the hybrid deferred/forward frame.
//!
//! # Frame protocol
//!
//! Scene code pushes render commands, lights and post-process materials
//! during the frame, then calls [`Renderer::render_pushed_commands`] once.
//! That call runs the [`FrameStage`]s in order and clears every per-frame
//! list (commands, lights, registered custom targets) at the end.
//!
//! ```rust,ignore
//! let mut renderer = Renderer::new(backend, RendererSettings::default(), 1280, 720)?;
//! let material = renderer.create_material("default")?;
//!
//! renderer.set_camera(camera.clone());
//! renderer.add_directional_light(DirectionalLight::default());
//! renderer.push_node(&scene_root)?;
//! let report = renderer.render_pushed_commands()?;
//! ```

pub mod backend;
pub mod command_buffer;
pub mod headless;
pub mod material_library;
pub mod pbr;
pub mod post_processor;
pub mod settings;
pub mod shadow;
pub mod stage;
pub mod uniforms;

use glam::{Mat4, Vec3};

use crate::errors::{Result, UmbraError};
use crate::resources::{
    primitives, CubeFace, Material, MaterialHandle, Mesh, RenderState, RenderTarget, RenderTargetDesc, ShaderDesc,
    ShaderId, TargetView, TextureDesc, TextureId,
};
use crate::scene::{Camera, DirectionalLight, Frustum, PointLight, SceneNode};
use crate::utils::FpsCounter;

pub use backend::{BackendCapabilities, ClearFlags, DrawCall, FramebufferId, GraphicsBackend};
pub use command_buffer::{CommandBucket, CommandBuffer, RenderCommand};
pub use headless::{BackendCall, DrawRecord, HeadlessBackend};
pub use material_library::{InternalMaterials, MaterialLibrary};
pub use pbr::{PBRCapture, PBR};
pub use post_processor::PostProcessor;
pub use settings::{PostProcessSettings, RendererSettings};
pub use stage::FrameStage;
pub use uniforms::{GlobalUniforms, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS};

use material_library::{
    UNIT_BRDF_LUT, UNIT_ENV_IRRADIANCE, UNIT_ENV_PREFILTER, UNIT_GALBEDO_AO, UNIT_GNORMAL_ROUGHNESS,
    UNIT_GPOSITION_METALLIC, UNIT_SHADOW_MAP, UNIT_SSAO,
};
use shadow::{light_space_matrix, ShadowPool, MAX_SHADOW_CASTERS};

/// Size of the cubemaps the scene is rendered into when baking probes.
pub const PROBE_CAPTURE_SIZE: u32 = 32;

const GBUFFER_ATTACHMENTS: u32 = 4;
const DEBUG_LIGHT_SCALE: f32 = 0.25;
/// Bounds used for commands pushed without an AABB; never culled.
const UNBOUNDED: f32 = 1.0e9;

/// Outcome of adding a light to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAdmission {
    /// Written into the global uniform block at this slot.
    Uniform(usize),
    /// Past the uniform block capacity. The light still gets its own
    /// deferred lighting pass but shaders reading the block won't see it.
    BeyondUniformCap(usize),
}

/// What one call to [`Renderer::render_pushed_commands`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Executed stages in execution order.
    pub stages: Vec<FrameStage>,
    pub deferred_draws: usize,
    /// Deferred and alpha commands rejected by frustum culling.
    pub culled_commands: usize,
    pub shadow_casters: usize,
    pub shadow_maps: usize,
    /// Probe volumes drawn for ambient, `0` when the sky was used.
    pub ambient_volumes: usize,
    pub lights_drawn: usize,
    /// Lights that did not fit in the global uniform block.
    pub lights_beyond_uniform_cap: usize,
    pub custom_targets: usize,
    pub forward_draws: usize,
    pub alpha_draws: usize,
    pub post_process_materials: usize,
    pub ssao: bool,
}

#[derive(Debug, Clone, Copy)]
struct BuiltinMeshes {
    quad: Mesh,
    cube: Mesh,
    light_sphere: Mesh,
    probe_sphere: Mesh,
}

impl BuiltinMeshes {
    fn new<B: GraphicsBackend>(backend: &mut B) -> Result<Self> {
        Ok(Self {
            quad: backend.create_mesh(&primitives::screen_quad())?,
            cube: backend.create_mesh(&primitives::unit_cube())?,
            light_sphere: backend.create_mesh(&primitives::uv_sphere(16, 16))?,
            probe_sphere: backend.create_mesh(&primitives::uv_sphere(32, 32))?,
        })
    }
}

/// Draws a command with its own material. Commands without geometry or with
/// a released material are skipped.
fn draw_command<B: GraphicsBackend>(
    backend: &mut B,
    library: &MaterialLibrary,
    command: &RenderCommand,
    apply_state: bool,
) -> bool {
    let (Some(mesh), Some(material)) = (command.mesh.as_ref(), library.get(command.material)) else {
        log::debug!("Skipping render command without mesh or with a released material");
        return false;
    };
    if apply_state {
        backend.apply_state(&material.state);
    }
    backend.draw(&DrawCall {
        mesh,
        material,
        model: command.transform,
        prev_model: command.prev_transform,
    });
    true
}

fn bind_gbuffer(material: &mut Material, gbuffer: &RenderTarget) {
    material.set_texture("gPositionMetallic", gbuffer.color_texture(0), UNIT_GPOSITION_METALLIC);
    material.set_texture("gNormalRoughness", gbuffer.color_texture(1), UNIT_GNORMAL_ROUGHNESS);
    material.set_texture("gAlbedoAO", gbuffer.color_texture(2), UNIT_GALBEDO_AO);
}

fn bind_capture(material: &mut Material, capture: &PBRCapture, brdf_lut: TextureId, ssao: TextureId) {
    material.set_texture_cube("envIrradiance", capture.irradiance, UNIT_ENV_IRRADIANCE);
    if let Some(prefiltered) = capture.prefiltered {
        material.set_texture_cube("envPrefilter", prefiltered, UNIT_ENV_PREFILTER);
    }
    material.set_texture("BRDFLUT", brdf_lut, UNIT_BRDF_LUT);
    material.set_texture("TexSSAO", ssao, UNIT_SSAO);
}

/// Slot for the light at `index`, warning once per frame per light kind when
/// the uniform block is full.
fn admit(index: usize, cap: usize, kind: &str, warned: &mut bool) -> LightAdmission {
    if index < cap {
        return LightAdmission::Uniform(index);
    }
    if !*warned {
        log::warn!("More than {cap} {kind} lights this frame; extra lights are lit but absent from the global uniform block");
        *warned = true;
    }
    LightAdmission::BeyondUniformCap(index)
}

fn collect_node(
    library: &MaterialLibrary,
    buffer: &mut CommandBuffer,
    node: &SceneNode,
    target: Option<FramebufferId>,
) -> Result<usize> {
    let mut pushed = 0;
    if let (Some(mesh), Some(handle)) = (node.mesh, node.material) {
        let material = library.get(handle).ok_or(UmbraError::InvalidMaterialHandle)?;
        let (box_min, box_max) = node.world_bounds();
        buffer.push(
            Some(mesh),
            handle,
            material,
            node.world_transform,
            node.prev_world_transform,
            box_min,
            box_max,
            target,
        );
        pushed += 1;
    }
    for child in &node.children {
        pushed += collect_node(library, buffer, child, target)?;
    }
    Ok(pushed)
}

/// Deferred and default-target custom commands, the set captured into
/// cubemaps.
fn capture_commands(buffer: &CommandBuffer) -> Vec<RenderCommand> {
    let mut commands = buffer.deferred_render_commands(None);
    commands.extend(buffer.custom_render_commands(None, None));
    commands
}

fn sphere_model(position: Vec3, radius: f32) -> Mat4 {
    Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(radius))
}

pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    pub settings: RendererSettings,

    width: u32,
    height: u32,

    camera: Option<Camera>,
    prev_view_projection: Mat4,

    // === Per-frame state ===
    command_buffer: CommandBuffer,
    current_target: Option<FramebufferId>,
    custom_targets: Vec<TargetView>,
    directional_lights: Vec<DirectionalLight>,
    point_lights: Vec<PointLight>,
    warned_directional_cap: bool,
    warned_point_cap: bool,

    // === Owned GPU resources ===
    meshes: BuiltinMeshes,
    gbuffer: RenderTarget,
    custom_target: RenderTarget,
    post_process_target: RenderTarget,
    shadows: ShadowPool,

    // === Subsystems ===
    material_library: MaterialLibrary,
    post_processor: PostProcessor,
    pbr: PBR,

    probe_spatials: Vec<(Vec3, f32)>,
    fps: FpsCounter,
    frame_index: u64,
}

impl<B: GraphicsBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("backend", &self.backend.name())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_index", &self.frame_index)
            .field("pending_commands", &self.command_buffer.len())
            .finish_non_exhaustive()
    }
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Builds every owned resource in dependency order: meshes, G-Buffer and
    /// HDR targets, shadow pool, then the material library, post processor
    /// and PBR (which bakes its BRDF LUT and default sky).
    ///
    /// Fails on a backend that lacks a required capability, on a zero render
    /// size, or when any built-in shader fails to compile.
    pub fn new(mut backend: B, settings: RendererSettings, width: u32, height: u32) -> Result<Self> {
        if let Some(missing) = backend.capabilities().missing(&BackendCapabilities::REQUIRED) {
            log::error!("Backend '{}' cannot run the renderer: missing {missing}", backend.name());
            return Err(UmbraError::UnsupportedBackend(format!("{}: missing {missing}", backend.name())));
        }
        if width == 0 || height == 0 {
            return Err(UmbraError::InvalidRenderSize { width, height });
        }

        let meshes = BuiltinMeshes::new(&mut backend)?;

        let gbuffer = RenderTarget::new(
            &mut backend,
            RenderTargetDesc::new("GBuffer", width, height).with_color_attachments(GBUFFER_ATTACHMENTS),
        )?;
        let custom_target = RenderTarget::new(&mut backend, RenderTargetDesc::new("Custom HDR", width, height))?;
        let post_process_target = RenderTarget::new(
            &mut backend,
            RenderTargetDesc::new("Post Process", width, height).with_depth_stencil(false),
        )?;
        let shadows = ShadowPool::new(&mut backend)?;

        let material_library = MaterialLibrary::new(&mut backend)?;
        let post_processor = PostProcessor::new(&mut backend, meshes.quad, width, height, &settings.post)?;
        let pbr = PBR::new(&mut backend, meshes.quad, meshes.cube, meshes.probe_sphere)?;

        log::info!("Renderer initialised on '{}' backend at {width}x{height}", backend.name());

        Ok(Self {
            backend,
            settings,
            width,
            height,
            camera: None,
            prev_view_projection: Mat4::IDENTITY,
            command_buffer: CommandBuffer::new(),
            current_target: None,
            custom_targets: Vec::new(),
            directional_lights: Vec::new(),
            point_lights: Vec::new(),
            warned_directional_cap: false,
            warned_point_cap: false,
            meshes,
            gbuffer,
            custom_target,
            post_process_target,
            shadows,
            material_library,
            post_processor,
            pbr,
            probe_spatials: Vec::new(),
            fps: FpsCounter::new(),
            frame_index: 0,
        })
    }

    // ========================================================================
    // Frame setup
    // ========================================================================

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = Some(camera);
    }

    #[must_use]
    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// Makes `target` current for subsequent pushes. Custom targets are
    /// registered once per frame and rendered in registration order before
    /// the default target.
    pub fn set_target(&mut self, target: Option<&RenderTarget>) {
        self.current_target = target.map(RenderTarget::framebuffer);
        if let Some(target) = target {
            let view = target.view();
            if !self.custom_targets.iter().any(|t| t.framebuffer == view.framebuffer) {
                self.custom_targets.push(view);
            }
        }
    }

    /// Resizes the G-Buffer and HDR targets and every post-process tier.
    pub fn set_render_size(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(UmbraError::InvalidRenderSize { width, height });
        }
        self.width = width;
        self.height = height;
        self.gbuffer.resize(&mut self.backend, width, height)?;
        self.custom_target.resize(&mut self.backend, width, height)?;
        self.post_process_target.resize(&mut self.backend, width, height)?;
        self.post_processor.update_render_size(&mut self.backend, width, height)
    }

    #[must_use]
    pub fn render_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    // ========================================================================
    // Command submission
    // ========================================================================

    /// Pushes a draw with no bounds; it is never frustum culled.
    pub fn push_render(
        &mut self,
        mesh: Mesh,
        material: MaterialHandle,
        transform: Mat4,
        prev_transform: Mat4,
    ) -> Result<CommandBucket> {
        self.push_render_bounded(
            mesh,
            material,
            transform,
            prev_transform,
            Vec3::splat(-UNBOUNDED),
            Vec3::splat(UNBOUNDED),
        )
    }

    /// Pushes a draw with a world-space AABB used for culling.
    pub fn push_render_bounded(
        &mut self,
        mesh: Mesh,
        material: MaterialHandle,
        transform: Mat4,
        prev_transform: Mat4,
        box_min: Vec3,
        box_max: Vec3,
    ) -> Result<CommandBucket> {
        let resolved = self.material_library.get(material).ok_or(UmbraError::InvalidMaterialHandle)?;
        Ok(self.command_buffer.push(
            Some(mesh),
            material,
            resolved,
            transform,
            prev_transform,
            box_min,
            box_max,
            self.current_target,
        ))
    }

    /// Pushes every node of the tree that has both a mesh and a material,
    /// depth first. Returns the number of commands pushed.
    pub fn push_node(&mut self, node: &SceneNode) -> Result<usize> {
        collect_node(&self.material_library, &mut self.command_buffer, node, self.current_target)
    }

    /// Queues a full-screen material for the custom post-process stage.
    pub fn push_post_processor(&mut self, material: MaterialHandle) -> Result<CommandBucket> {
        let resolved = self.material_library.get(material).ok_or(UmbraError::InvalidMaterialHandle)?;
        Ok(self.command_buffer.push(
            None,
            material,
            resolved,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Vec3::splat(-UNBOUNDED),
            Vec3::splat(UNBOUNDED),
            None,
        ))
    }

    pub fn add_directional_light(&mut self, light: DirectionalLight) -> LightAdmission {
        let index = self.directional_lights.len();
        self.directional_lights.push(light);
        admit(index, MAX_DIRECTIONAL_LIGHTS, "directional", &mut self.warned_directional_cap)
    }

    pub fn add_point_light(&mut self, light: PointLight) -> LightAdmission {
        let index = self.point_lights.len();
        self.point_lights.push(light);
        admit(index, MAX_POINT_LIGHTS, "point", &mut self.warned_point_cap)
    }

    /// Whether the directional and point light caps have been exceeded (and
    /// warned about) this frame.
    #[must_use]
    pub fn light_cap_warnings(&self) -> (bool, bool) {
        (self.warned_directional_cap, self.warned_point_cap)
    }

    // ========================================================================
    // Resources
    // ========================================================================

    pub fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId> {
        self.backend.create_shader(desc).inspect_err(|e| log::error!("{e}"))
    }

    pub fn create_render_target(&mut self, desc: RenderTargetDesc) -> Result<RenderTarget> {
        RenderTarget::new(&mut self.backend, desc)
    }

    pub fn destroy_render_target(&mut self, target: RenderTarget) {
        let framebuffer = target.framebuffer();
        self.custom_targets.retain(|t| t.framebuffer != framebuffer);
        if self.current_target == Some(framebuffer) {
            self.current_target = None;
        }
        target.destroy(&mut self.backend);
    }

    pub fn create_material(&mut self, base: &str) -> Result<MaterialHandle> {
        self.material_library.create_material(base)
    }

    pub fn create_custom_material(&mut self, shader: ShaderId) -> MaterialHandle {
        self.material_library.create_custom_material(shader)
    }

    pub fn create_post_processing_material(&mut self, shader: ShaderId) -> MaterialHandle {
        self.material_library.create_post_processing_material(shader)
    }

    pub fn release_material(&mut self, handle: MaterialHandle) -> Result<()> {
        self.material_library.release(handle).map(drop)
    }

    #[must_use]
    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.material_library.get(handle)
    }

    #[must_use]
    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.material_library.get_mut(handle)
    }

    // ========================================================================
    // Probes
    // ========================================================================

    /// Registers a probe location for the next bake. Each bake consumes the
    /// locations registered since the previous one.
    pub fn add_irradiance_probe(&mut self, position: Vec3, radius: f32) {
        self.probe_spatials.push((position, radius));
    }

    /// Drops all baked probes and frees their cubemaps. Locations registered
    /// since the last bake are kept for the next one.
    pub fn clear_irradiance_probes(&mut self) {
        self.pbr.clear_irradiance_probes(&mut self.backend);
    }

    /// Locations waiting for the next bake.
    #[must_use]
    pub fn pending_probe_locations(&self) -> &[(Vec3, f32)] {
        &self.probe_spatials
    }

    /// Replaces all baked probes with captures of the currently pushed
    /// deferred and default-target custom commands, one per pending location.
    /// The pushed commands are not consumed and still render next frame.
    /// Blocks until every probe is processed.
    pub fn bake_probes(&mut self) -> usize {
        if self.command_buffer.is_empty() && !self.probe_spatials.is_empty() {
            log::warn!(
                "Baking {} irradiance probes with no pushed commands; captures hold only the clear color",
                self.probe_spatials.len()
            );
        }
        let commands = capture_commands(&self.command_buffer);
        self.bake(&commands)
    }

    /// Like [`Renderer::bake_probes`], but captures `scene` instead of the
    /// pushed commands. The frame's command buffer is left untouched.
    pub fn bake_probes_from(&mut self, scene: &SceneNode) -> Result<usize> {
        let mut buffer = CommandBuffer::new();
        if collect_node(&self.material_library, &mut buffer, scene, None)? == 0 {
            log::warn!("Baking irradiance probes from a scene with nothing to draw");
        }
        Ok(self.bake(&capture_commands(&buffer)))
    }

    fn bake(&mut self, commands: &[RenderCommand]) -> usize {
        self.pbr.clear_irradiance_probes(&mut self.backend);

        let spatials = std::mem::take(&mut self.probe_spatials);
        for &(position, radius) in &spatials {
            let cubemap = self.backend.create_texture(&TextureDesc::new_cube(
                "Probe Capture",
                PROBE_CAPTURE_SIZE,
                wgpu::TextureFormat::Rgba16Float,
            ));
            self.capture_cube(commands, position, cubemap, PROBE_CAPTURE_SIZE, 0);
            let capture = self.pbr.process_cube(&mut self.backend, cubemap, true);
            self.backend.destroy_texture(cubemap);
            self.pbr.add_irradiance_probe(capture, position, radius);
        }

        log::info!("Baked {} irradiance probes", spatials.len());
        spatials.len()
    }

    /// Renders the pushed deferred and default-target custom commands into
    /// all six faces of `cubemap` from `position`.
    pub fn render_to_cubemap(&mut self, position: Vec3, cubemap: TextureId, size: u32, mip: u32) {
        let commands = capture_commands(&self.command_buffer);
        self.capture_cube(&commands, position, cubemap, size, mip);
    }

    fn capture_cube(&mut self, commands: &[RenderCommand], position: Vec3, cubemap: TextureId, size: u32, mip: u32) {
        let capture_shader = self.material_library.internal().capture.shader();
        let target = self.pbr.capture_target();

        for face in CubeFace::ALL {
            let camera = pbr::cube_face_camera(position, face);
            let globals = GlobalUniforms::build(
                &camera,
                camera.view_projection(),
                &self.directional_lights,
                &self.point_lights,
            );
            self.backend.upload_globals(&globals);

            self.backend.attach_cube_face(target.framebuffer, cubemap, face, mip);
            self.backend.bind_framebuffer(Some(target.framebuffer), size, size);
            self.backend.clear(ClearFlags::COLOR | ClearFlags::DEPTH, self.settings.clear_color());
            self.backend.apply_state(&RenderState::default());

            for command in commands {
                let (Some(mesh), Some(material)) = (command.mesh.as_ref(), self.material_library.get(command.material))
                else {
                    continue;
                };
                let material = material.with_shader(capture_shader);
                self.backend.draw(&DrawCall {
                    mesh,
                    material: &material,
                    model: command.transform,
                    prev_model: command.prev_transform,
                });
            }
        }
        self.backend.generate_mipmaps(cubemap);
    }

    // ========================================================================
    // Screen passes
    // ========================================================================

    /// Draws `src` over a full-screen quad into `dst` (`None` = default
    /// framebuffer), through `material` or the built-in blit material.
    pub fn blit(&mut self, src: TextureId, dst: Option<TargetView>, material: Option<MaterialHandle>) -> Result<()> {
        let mut material = match material {
            Some(handle) => self.material_library.get(handle).ok_or(UmbraError::InvalidMaterialHandle)?.clone(),
            None => self.material_library.internal().blit.clone(),
        };
        material.set_texture("TexSrc", src, 0);

        match dst {
            Some(view) => self.backend.bind_framebuffer(Some(view.framebuffer), view.width, view.height),
            None => self.backend.bind_framebuffer(None, self.width, self.height),
        }
        self.backend.draw_fullscreen(&self.meshes.quad, &material);
        Ok(())
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Runs every frame stage over the pushed commands and presents to the
    /// default framebuffer. Per-frame state is cleared afterwards, also when
    /// the frame is rejected.
    pub fn render_pushed_commands(&mut self) -> Result<FrameReport> {
        let Some(camera) = self.camera.clone() else {
            log::error!("render_pushed_commands called without a camera");
            self.end_frame_state();
            return Err(UmbraError::MissingCamera);
        };
        let frustum = *camera.frustum();
        let mut report = FrameReport::default();

        // 1.
        self.command_buffer.sort();
        report.stages.push(FrameStage::SortCommands);

        // 2.
        let globals = GlobalUniforms::build(
            &camera,
            self.prev_view_projection,
            &self.directional_lights,
            &self.point_lights,
        );
        self.backend.upload_globals(&globals);
        report.lights_beyond_uniform_cap = self.directional_lights.len().saturating_sub(MAX_DIRECTIONAL_LIGHTS)
            + self.point_lights.len().saturating_sub(MAX_POINT_LIGHTS);
        report.stages.push(FrameStage::UpdateGlobals);

        // 3.
        self.geometry_pass(&frustum, &mut report);
        report.stages.push(FrameStage::Geometry);

        // 4.
        let shadow_maps = if self.settings.shadows {
            let maps = self.shadow_pass(&mut report);
            report.stages.push(FrameStage::Shadow);
            maps
        } else {
            Vec::new()
        };

        // 5.
        report.ssao = self.post_processor.process_pre_lighting(&mut self.backend, &self.settings.post, &self.gbuffer);
        report.stages.push(FrameStage::PreLightingPost);

        // 6.
        self.lighting_pass(&frustum, &shadow_maps, &mut report);
        report.stages.push(FrameStage::Lighting);

        // 7.
        self.backend.blit_depth(
            self.gbuffer.framebuffer(),
            Some(self.custom_target.framebuffer()),
            self.width,
            self.height,
        );
        report.stages.push(FrameStage::DepthBlit);

        // 8.
        self.forward_pass(&camera, &globals, &mut report);
        report.stages.push(FrameStage::Forward);

        // 9.
        self.alpha_pass(&frustum, &mut report);
        report.stages.push(FrameStage::Alpha);

        // 10.
        if self.settings.render_lights || self.settings.light_volumes || self.settings.render_probes {
            self.light_debug_pass(&frustum);
            report.stages.push(FrameStage::LightDebug);
        }

        // 11.
        let hdr = self.custom_target.view();
        self.post_processor.process_post_lighting(&mut self.backend, &self.settings.post, hdr)?;
        report.stages.push(FrameStage::PostLightingPost);

        // 12.
        let final_source = self.custom_post_process_pass(&mut report);
        report.stages.push(FrameStage::CustomPostProcess);

        // 13.
        self.fps.update();
        let fps = self.fps.fps_or(self.settings.post.target_fps);
        self.post_processor.blit(&mut self.backend, &self.settings.post, final_source, &self.gbuffer, None, fps);
        report.stages.push(FrameStage::FinalBlit);

        // 14.
        self.prev_view_projection = camera.view_projection();
        self.end_frame_state();
        report.stages.push(FrameStage::EndFrame);

        stage::validate_stage_order(&report.stages)?;
        Ok(report)
    }

    fn end_frame_state(&mut self) {
        self.command_buffer.clear();
        self.custom_targets.clear();
        self.current_target = None;
        self.directional_lights.clear();
        self.point_lights.clear();
        self.warned_directional_cap = false;
        self.warned_point_cap = false;
        self.frame_index += 1;
    }

    fn geometry_pass(&mut self, frustum: &Frustum, report: &mut FrameReport) {
        let (w, h) = (self.width, self.height);
        self.backend.bind_framebuffer(Some(self.gbuffer.framebuffer()), w, h);
        self.backend.set_draw_buffers(GBUFFER_ATTACHMENTS);
        self.backend.clear(
            ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
            self.settings.clear_color(),
        );
        self.backend.apply_state(&RenderState::default());
        if self.settings.wireframe {
            self.backend.set_wireframe(true);
        }

        let all = self.command_buffer.deferred_render_commands(None).len();
        let visible = self.command_buffer.deferred_render_commands(Some(frustum));
        report.culled_commands += all - visible.len();

        for command in &visible {
            if draw_command(&mut self.backend, &self.material_library, command, false) {
                report.deferred_draws += 1;
            }
        }

        if self.settings.wireframe {
            self.backend.set_wireframe(false);
        }
        self.backend.set_draw_buffers(1);
    }

    /// Renders shadow casters for up to [`MAX_SHADOW_CASTERS`] shadow-casting
    /// directional lights. Returns `(light index, shadow map, light space)`.
    fn shadow_pass(&mut self, report: &mut FrameReport) -> Vec<(usize, TextureId, Mat4)> {
        let casters = self.command_buffer.shadow_cast_render_commands();
        report.shadow_casters = casters.len();

        let lights: Vec<(usize, Vec3)> = self
            .directional_lights
            .iter()
            .enumerate()
            .filter(|(_, light)| light.cast_shadows)
            .map(|(i, light)| (i, light.direction))
            .take(MAX_SHADOW_CASTERS)
            .collect();

        let mut maps = Vec::with_capacity(lights.len());
        for (slot, (light_index, direction)) in lights.into_iter().enumerate() {
            let Some(target) = self.shadows.target(slot) else {
                break;
            };
            let light_space = light_space_matrix(direction);

            let material = &mut self.material_library.internal_mut().dir_shadow;
            material.set_mat4("lightSpace", light_space);

            self.backend.bind_framebuffer(Some(target.framebuffer), target.width, target.height);
            self.backend.clear(ClearFlags::DEPTH, wgpu::Color::WHITE);
            self.backend.apply_state(&material.state);
            self.backend.set_cull_face(wgpu::Face::Front);

            for command in &casters {
                let Some(mesh) = command.mesh.as_ref() else {
                    continue;
                };
                self.backend.draw(&DrawCall {
                    mesh,
                    material: &*material,
                    model: command.transform,
                    prev_model: command.prev_transform,
                });
            }
            maps.push((light_index, target.texture, light_space));
        }

        self.backend.set_cull_face(wgpu::Face::Back);
        report.shadow_maps = maps.len();
        maps
    }

    fn lighting_pass(&mut self, frustum: &Frustum, shadow_maps: &[(usize, TextureId, Mat4)], report: &mut FrameReport) {
        let (w, h) = (self.width, self.height);
        self.backend.bind_framebuffer(Some(self.custom_target.framebuffer()), w, h);
        self.backend.clear(
            ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
            self.settings.clear_color(),
        );

        let brdf_lut = self.pbr.brdf_lut();
        let ssao = self.post_processor.ssao_target().texture;
        let internal = self.material_library.internal_mut();
        for material in [
            &mut internal.ambient,
            &mut internal.irradiance,
            &mut internal.directional,
            &mut internal.point,
        ] {
            bind_gbuffer(material, &self.gbuffer);
            material.set_bool("SSAO", report.ssao);
        }

        // Ambient: probe volumes once any probe is baked, otherwise the sky
        if !self.settings.irradiance_gi || self.pbr.probes().is_empty() {
            let material = &mut internal.ambient;
            bind_capture(material, &self.pbr.sky_capture(), brdf_lut, ssao);
            self.backend.draw_fullscreen(&self.meshes.quad, material);
        } else {
            let probes: Vec<PBRCapture> = self
                .pbr
                .probes()
                .iter()
                .filter(|p| frustum.intersects_sphere(p.position, p.radius))
                .copied()
                .collect();
            let material = &mut internal.irradiance;
            for probe in &probes {
                bind_capture(material, probe, brdf_lut, ssao);
                material.set_vec3("probePos", probe.position);
                material.set_float("probeRadius", probe.radius);
                let model = sphere_model(probe.position, probe.radius);
                self.backend.apply_state(&material.state);
                self.backend.draw(&DrawCall {
                    mesh: &self.meshes.light_sphere,
                    material: &*material,
                    model,
                    prev_model: model,
                });
            }
            report.ambient_volumes = probes.len();
        }

        if !self.settings.lights {
            return;
        }

        // Directional
        let material = &mut internal.directional;
        for (i, light) in self.directional_lights.iter().enumerate() {
            material.set_vec3("lightDir", light.direction);
            material.set_vec3("lightColor", light.radiance());
            match shadow_maps.iter().find(|(index, _, _)| *index == i) {
                Some((_, map, light_space)) => {
                    material.set_bool("ShadowsEnabled", true);
                    material.set_texture("lightShadowMap", *map, UNIT_SHADOW_MAP);
                    material.set_mat4("lightShadowViewProjection", *light_space);
                }
                None => material.set_bool("ShadowsEnabled", false),
            }
            self.backend.draw_fullscreen(&self.meshes.quad, material);
            report.lights_drawn += 1;
        }

        // Point
        let material = &mut internal.point;
        for light in &self.point_lights {
            if !frustum.intersects_sphere(light.position, light.radius) {
                continue;
            }
            material.set_vec3("lightPos", light.position);
            material.set_float("lightRadius", light.radius);
            material.set_vec3("lightColor", light.radiance());
            let model = sphere_model(light.position, light.radius);
            self.backend.apply_state(&material.state);
            self.backend.draw(&DrawCall {
                mesh: &self.meshes.light_sphere,
                material: &*material,
                model,
                prev_model: model,
            });
            report.lights_drawn += 1;
        }
    }

    /// Renders every registered custom target, then the default target into
    /// the HDR buffer without clearing it.
    fn forward_pass(&mut self, camera: &Camera, globals: &GlobalUniforms, report: &mut FrameReport) {
        let targets = std::mem::take(&mut self.custom_targets);
        for target in &targets {
            let target_camera = camera.with_aspect(target.width as f32 / target.height.max(1) as f32);
            let target_globals = GlobalUniforms::build(
                &target_camera,
                self.prev_view_projection,
                &self.directional_lights,
                &self.point_lights,
            );
            self.backend.upload_globals(&target_globals);
            self.backend.bind_framebuffer(Some(target.framebuffer), target.width, target.height);
            self.backend.clear(ClearFlags::COLOR | ClearFlags::DEPTH, self.settings.clear_color());

            for command in &self.command_buffer.custom_render_commands(Some(target.framebuffer), None) {
                if draw_command(&mut self.backend, &self.material_library, command, true) {
                    report.forward_draws += 1;
                }
            }
        }
        report.custom_targets = targets.len();
        self.custom_targets = targets;

        // Default target draws into the lit HDR buffer on top of the deferred output
        self.backend.upload_globals(globals);
        self.backend.bind_framebuffer(Some(self.custom_target.framebuffer()), self.width, self.height);
        let frustum = *camera.frustum();
        for command in &self.command_buffer.custom_render_commands(None, Some(&frustum)) {
            if draw_command(&mut self.backend, &self.material_library, command, true) {
                report.forward_draws += 1;
            }
        }
    }

    fn alpha_pass(&mut self, frustum: &Frustum, report: &mut FrameReport) {
        let all = self.command_buffer.alpha_render_commands(None).len();
        let visible = self.command_buffer.alpha_render_commands(Some(frustum));
        report.culled_commands += all - visible.len();

        for command in &visible {
            if draw_command(&mut self.backend, &self.material_library, command, true) {
                report.alpha_draws += 1;
            }
        }
    }

    fn light_debug_pass(&mut self, frustum: &Frustum) {
        let material = &mut self.material_library.internal_mut().debug_light;

        if self.settings.render_lights {
            for light in &self.point_lights {
                if !light.visible || !frustum.intersects_sphere(light.position, DEBUG_LIGHT_SCALE) {
                    continue;
                }
                material.set_vec3("color", light.radiance());
                let model = sphere_model(light.position, DEBUG_LIGHT_SCALE);
                self.backend.apply_state(&material.state);
                self.backend.draw(&DrawCall {
                    mesh: &self.meshes.light_sphere,
                    material: &*material,
                    model,
                    prev_model: model,
                });
            }
        }

        if self.settings.light_volumes {
            self.backend.set_wireframe(true);
            for light in &self.point_lights {
                if !light.visible || !frustum.intersects_sphere(light.position, light.radius) {
                    continue;
                }
                material.set_vec3("color", light.color);
                let model = sphere_model(light.position, light.radius);
                self.backend.apply_state(&material.state);
                self.backend.draw(&DrawCall {
                    mesh: &self.meshes.light_sphere,
                    material: &*material,
                    model,
                    prev_model: model,
                });
            }
            self.backend.set_wireframe(false);
        }

        if self.settings.render_probes {
            self.pbr.render_probes(&mut self.backend);
        }
    }

    /// Runs user post-process materials, alternating between the HDR target
    /// and the scratch target. Returns the texture holding the result.
    fn custom_post_process_pass(&mut self, report: &mut FrameReport) -> TextureId {
        let mut commands = self.command_buffer.post_processing_render_commands();
        commands.retain(|c| {
            let live = self.material_library.contains(c.material);
            if !live {
                log::debug!("Skipping released post-process material");
            }
            live
        });
        let custom = self.custom_target.view();
        let scratch = self.post_process_target.view();

        for (i, command) in commands.iter().enumerate() {
            let (src, dst) = if i % 2 == 0 { (custom, scratch) } else { (scratch, custom) };
            let Some(material) = self.material_library.get_mut(command.material) else {
                continue;
            };
            material.set_texture("TexSrc", src.texture, 0);

            self.backend.bind_framebuffer(Some(dst.framebuffer), dst.width, dst.height);
            let mesh = command.mesh.unwrap_or(self.meshes.quad);
            self.backend.draw_fullscreen(&mesh, material);
        }
        report.post_process_materials = commands.len();

        if commands.len() % 2 == 0 { custom.texture } else { scratch.texture }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[must_use]
    pub fn material_library(&self) -> &MaterialLibrary {
        &self.material_library
    }

    pub fn material_library_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.material_library
    }

    #[must_use]
    pub fn post_processor(&self) -> &PostProcessor {
        &self.post_processor
    }

    pub fn post_processor_mut(&mut self) -> &mut PostProcessor {
        &mut self.post_processor
    }

    #[must_use]
    pub fn pbr(&self) -> &PBR {
        &self.pbr
    }

    pub fn pbr_mut(&mut self) -> &mut PBR {
        &mut self.pbr
    }

    #[must_use]
    pub fn gbuffer(&self) -> &RenderTarget {
        &self.gbuffer
    }

    /// The lit HDR target the forward and alpha passes draw into.
    #[must_use]
    pub fn custom_target(&self) -> TargetView {
        self.custom_target.view()
    }

    #[must_use]
    pub fn post_process_target(&self) -> TargetView {
        self.post_process_target.view()
    }

    #[must_use]
    pub fn shadow_map(&self, slot: usize) -> Option<TargetView> {
        self.shadows.target(slot)
    }

    #[must_use]
    pub fn previous_view_projection(&self) -> Mat4 {
        self.prev_view_projection
    }

    /// Custom targets registered for the current frame, in order.
    #[must_use]
    pub fn registered_targets(&self) -> &[TargetView] {
        &self.custom_targets
    }

    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}
