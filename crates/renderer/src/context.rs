//! The aggregate that owns every GPU object of the renderer.
//!
//! [`RenderContext`] is built once per window and implements both
//! [`FrameBackend`] and [`SwapchainChain`], so the frame orchestrator and
//! the resize handler drive it without knowing about Vulkan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use inflight_core::{Config, GeometryKind, PresentModePreference, Timer};
use inflight_platform::{FramebufferSignal, Surface, Window};
use inflight_resources::{GeometrySource, TextureData};
use inflight_rhi::attachment::{FrameAttachments, max_usable_sample_count, pick_depth_format};
use inflight_rhi::command::CommandPool;
use inflight_rhi::descriptor::{DescriptorSetLayout, mesh_bindings};
use inflight_rhi::device::Device;
use inflight_rhi::framebuffer::Framebuffers;
use inflight_rhi::instance::Instance;
use inflight_rhi::physical_device::{PresentTarget, select_physical_device};
use inflight_rhi::pipeline::{
    CompareOp, CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
    full_scissor, full_viewport,
};
use inflight_rhi::render_pass::{RenderPass, clear_values};
use inflight_rhi::shader::{Shader, ShaderStage};
use inflight_rhi::swapchain::{
    Swapchain, SwapchainSupportDetails, choose_surface_format, negotiate,
};
use inflight_rhi::texture::Texture;
use inflight_rhi::vertex::Vertex;
use inflight_scene::{Camera, Spin};

use crate::error::{RendererError, RendererResult};
use crate::frame::{AcquireOutcome, FrameBackend, PresentOutcome};
use crate::frame_slots::{FrameSlot, FrameSlots};
use crate::mesh::GpuMesh;
use crate::resize::{RebuildOutcome, ResizeHandler, SwapchainChain};
use crate::ubo::MvpUbo;

/// Maps the configured preference onto a Vulkan present mode.
pub fn preferred_present_mode(preference: PresentModePreference) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
    }
}

/// Geometry strategy selected by the scene configuration.
pub fn geometry_source(config: &Config) -> GeometrySource {
    match config.scene.geometry {
        GeometryKind::Quad => GeometrySource::StaticQuad,
        GeometryKind::Model => GeometrySource::Model(config.scene.model_path.clone()),
    }
}

/// SPIR-V files the pipeline is built from.
#[derive(Clone, Debug)]
struct ShaderPaths {
    vertex: PathBuf,
    fragment: PathBuf,
}

/// Every GPU object the renderer owns.
///
/// Fields drop in declaration order, which is the teardown order: frame
/// slots, geometry and texture, descriptors, pipeline, render pass,
/// framebuffers, attachments, swapchain, command pool, device, surface,
/// instance. [`Drop`] only waits for the device to go idle first.
pub struct RenderContext {
    slots: FrameSlots,
    mesh: GpuMesh,
    texture: Texture,
    descriptor_layout: DescriptorSetLayout,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    render_pass: RenderPass,
    /// `None` only between `destroy_chain` and `create_framebuffers`
    framebuffers: Option<Framebuffers>,
    attachments: Option<FrameAttachments>,
    swapchain: Option<Swapchain>,
    command_pool: CommandPool,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,

    size: FramebufferSignal,
    resize_handler: ResizeHandler,
    shader_paths: ShaderPaths,
    present_mode: vk::PresentModeKHR,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
    fence_timeout_ns: u64,
    clear_color: [f32; 4],
    camera: Camera,
    spin: Spin,
    timer: Timer,
}

impl RenderContext {
    /// Creates every GPU object for `window`.
    ///
    /// `size` must be the signal the window's event handler notifies.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: no usable GPU, a missing format or
    /// feature, unreadable assets, or a failed creation call.
    pub fn new(window: &Window, size: FramebufferSignal, config: &Config) -> RendererResult<Self> {
        let renderer = &config.renderer;
        let frames_in_flight = renderer.frames_in_flight;
        if frames_in_flight == 0 {
            return Err(RendererError::Config(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let instance = Instance::new(
            c"inflight",
            renderer.validation,
            Some(window.raw_display_handle()?),
        )?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device = select_physical_device(
            instance.handle(),
            Some(PresentTarget {
                surface: surface.handle(),
                loader: surface.loader(),
            }),
        )?;
        let device = Device::new(&instance, &physical_device, true)?;
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;

        let present_mode = preferred_present_mode(renderer.present_mode);
        let resize_handler = ResizeHandler::default();
        let swapchain = match resize_handler.drawable_size(&size) {
            Some(drawable) => Some(create_swapchain(
                &instance,
                &device,
                &surface,
                drawable,
                present_mode,
            )?),
            None => {
                info!("Window has no drawable size yet, deferring swapchain creation");
                None
            }
        };
        let color_format = match &swapchain {
            Some(swapchain) => swapchain.format(),
            None => surface_color_format(&device, &surface)?,
        };

        let depth_format =
            pick_depth_format(|format| instance.format_properties(device.physical_device(), format))?;
        let samples = if renderer.msaa {
            max_usable_sample_count(device.limits())
        } else {
            vk::SampleCountFlags::TYPE_1
        };
        info!(
            "Attachments: depth {:?}, {:?} sample(s)",
            depth_format, samples
        );

        let render_pass = RenderPass::new(device.clone(), color_format, depth_format, samples)?;
        let (attachments, framebuffers) = match &swapchain {
            Some(swapchain) => {
                let attachments = FrameAttachments::new(
                    device.clone(),
                    swapchain.extent(),
                    swapchain.format(),
                    depth_format,
                    samples,
                )?;
                let framebuffers = Framebuffers::new(
                    device.clone(),
                    render_pass.handle(),
                    swapchain.image_views(),
                    &attachments,
                    swapchain.extent(),
                )?;
                (Some(attachments), Some(framebuffers))
            }
            None => (None, None),
        };

        let descriptor_layout = DescriptorSetLayout::new(device.clone(), &mesh_bindings())?;
        let pipeline_layout = PipelineLayout::new(device.clone(), &[descriptor_layout.handle()])?;

        let shader_paths = ShaderPaths {
            vertex: config.scene.vertex_shader.clone(),
            fragment: config.scene.fragment_shader.clone(),
        };
        let pipeline = build_pipeline(
            &device,
            &shader_paths,
            &pipeline_layout,
            &render_pass,
        )?;

        let geometry = geometry_source(config);
        info!("Loading geometry: {}", geometry.describe());
        let mesh = GpuMesh::upload(&device, &command_pool, &geometry.load()?)?;

        let pixels = TextureData::load_or_checkerboard(config.scene.texture_path.as_deref())?;
        let texture = Texture::from_rgba8(
            &instance,
            device.clone(),
            &command_pool,
            pixels.width,
            pixels.height,
            &pixels.pixels,
        )?;

        let slots = FrameSlots::new(
            device.clone(),
            &command_pool,
            &descriptor_layout,
            &texture,
            frames_in_flight,
        )?;

        if slots.descriptor_set_capacity() as usize != frames_in_flight {
            return Err(RendererError::Config(format!(
                "descriptor pool holds {} sets for {} frame slots",
                slots.descriptor_set_capacity(),
                frames_in_flight
            )));
        }

        info!("Render context ready ({} frames in flight)", slots.len());

        Ok(Self {
            slots,
            mesh,
            texture,
            descriptor_layout,
            pipeline,
            pipeline_layout,
            render_pass,
            framebuffers,
            attachments,
            swapchain,
            command_pool,
            device,
            surface,
            instance,
            size,
            resize_handler,
            shader_paths,
            present_mode,
            depth_format,
            samples,
            fence_timeout_ns: renderer.fence_timeout_ns(),
            clear_color: renderer.clear_color,
            camera: Camera::default(),
            spin: Spin::default(),
            timer: Timer::new(),
        })
    }

    /// Number of frame slots.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Current swapchain extent, or zero while the chain is torn down.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map(Swapchain::extent)
            .unwrap_or_default()
    }

    /// True once a swapchain exists. False while the window has been
    /// minimized since startup.
    #[inline]
    pub fn has_swapchain(&self) -> bool {
        self.swapchain.is_some()
    }

    /// Current swapchain image count, or zero while the chain is torn down.
    pub fn image_count(&self) -> u32 {
        self.swapchain
            .as_ref()
            .map(Swapchain::image_count)
            .unwrap_or(0)
    }

    /// Blocks until the device has finished all queued work.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> RendererResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }

    fn slot(&self, slot: usize) -> RendererResult<&FrameSlot> {
        self.slots
            .get(slot)
            .ok_or_else(|| RendererError::Config(format!("frame slot {} out of range", slot)))
    }

    fn swapchain(&self) -> RendererResult<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or(RendererError::MissingSwapchain("swapchain"))
    }
}

impl FrameBackend for RenderContext {
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()> {
        if self.slot(slot)?.in_flight().wait(self.fence_timeout_ns)? {
            Ok(())
        } else {
            error!("Fence for frame slot {} timed out", slot);
            Err(RendererError::DeviceLost {
                slot,
                timeout_ns: self.fence_timeout_ns,
            })
        }
    }

    fn acquire_image(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.image_available().handle();

        match self.swapchain()?.acquire_next_image(semaphore, u64::MAX) {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(RendererError::Rhi(e.into())),
        }
    }

    fn reset_slot(&mut self, slot: usize) -> RendererResult<()> {
        let frame = self.slot(slot)?;
        frame.in_flight().reset()?;
        frame.command_buffer().reset()?;
        Ok(())
    }

    fn update_uniforms(&mut self, slot: usize) -> RendererResult<()> {
        let extent = self.extent();
        let ubo = MvpUbo::animated(
            &self.camera,
            &self.spin,
            self.timer.elapsed_secs(),
            extent.width,
            extent.height,
        );
        self.slot(slot)?.write_uniforms(&ubo)
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
        let frame = self.slot(slot)?;
        let framebuffers = self
            .framebuffers
            .as_ref()
            .ok_or(RendererError::MissingSwapchain("framebuffers"))?;
        let framebuffer = framebuffers.get(image_index).ok_or_else(|| {
            RendererError::Config(format!("no framebuffer for image {}", image_index))
        })?;
        let extent = framebuffers.extent();

        let cmd = frame.command_buffer();
        cmd.begin()?;

        let clear = clear_values(self.clear_color);
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(full_scissor(extent))
            .clear_values(&clear);

        cmd.begin_render_pass(&begin_info);
        cmd.bind_graphics_pipeline(self.pipeline.handle());
        cmd.set_viewport(&full_viewport(extent));
        cmd.set_scissor(&full_scissor(extent));
        cmd.bind_descriptor_sets(self.pipeline_layout.handle(), 0, &[frame.descriptor_set()]);
        self.mesh.draw(cmd);
        cmd.end_render_pass();

        cmd.end()?;
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> RendererResult<()> {
        let frame = self.slot(slot)?;

        let wait_semaphores = [frame.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished().handle()];
        let command_buffers = [frame.command_buffer().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // The slot's fence was reset after its wait and the acquire
        // semaphore has a pending signal from this frame's acquire.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.in_flight().handle())?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
        let wait = self.slot(slot)?.render_finished().handle();

        match self
            .swapchain()?
            .present(self.device.present_queue(), image_index, wait)
        {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(RendererError::Rhi(e.into())),
        }
    }

    fn rebuild_swapchain(&mut self) -> RendererResult<RebuildOutcome> {
        let size = self.size.clone();
        let handler = self.resize_handler;
        handler.rebuild(self, &size)
    }
}

impl SwapchainChain for RenderContext {
    fn wait_idle(&mut self) -> RendererResult<()> {
        RenderContext::wait_idle(self)
    }

    fn destroy_chain(&mut self) {
        self.framebuffers = None;
        self.attachments = None;
        self.swapchain = None;
        debug!("Swapchain chain destroyed");
    }

    fn create_swapchain(&mut self, size: (u32, u32)) -> RendererResult<vk::Format> {
        let swapchain = create_swapchain(
            &self.instance,
            &self.device,
            &self.surface,
            size,
            self.present_mode,
        )?;
        let format = swapchain.format();
        self.swapchain = Some(swapchain);
        Ok(format)
    }

    fn pipeline_format(&self) -> vk::Format {
        self.render_pass.color_format()
    }

    fn rebuild_pipeline(&mut self, format: vk::Format) -> RendererResult<()> {
        let render_pass =
            RenderPass::new(self.device.clone(), format, self.depth_format, self.samples)?;
        let pipeline = build_pipeline(
            &self.device,
            &self.shader_paths,
            &self.pipeline_layout,
            &render_pass,
        )?;

        self.pipeline = pipeline;
        self.render_pass = render_pass;
        Ok(())
    }

    fn create_framebuffers(&mut self) -> RendererResult<()> {
        let (format, extent, views) = {
            let swapchain = self.swapchain()?;
            (swapchain.format(), swapchain.extent(), swapchain.image_views().to_vec())
        };

        let attachments = FrameAttachments::new(
            self.device.clone(),
            extent,
            format,
            self.depth_format,
            self.samples,
        )?;
        let framebuffers = Framebuffers::new(
            self.device.clone(),
            self.render_pass.handle(),
            &views,
            &attachments,
            extent,
        )?;

        self.attachments = Some(attachments);
        self.framebuffers = Some(framebuffers);
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during context drop: {:?}", e);
        }
        info!("Render context destroyed");
    }
}

/// Negotiates against the surface's current support and creates a swapchain.
fn create_swapchain(
    instance: &Instance,
    device: &Arc<Device>,
    surface: &Surface,
    framebuffer_size: (u32, u32),
    present_mode: vk::PresentModeKHR,
) -> RendererResult<Swapchain> {
    let support = SwapchainSupportDetails::query(
        device.physical_device(),
        surface.handle(),
        surface.loader(),
    )?;
    let config = negotiate(&support, framebuffer_size, present_mode)?;
    Ok(Swapchain::new(instance, device.clone(), surface.handle(), &config)?)
}

/// Color format a swapchain on `surface` would use, without creating one.
fn surface_color_format(device: &Arc<Device>, surface: &Surface) -> RendererResult<vk::Format> {
    let support = SwapchainSupportDetails::query(
        device.physical_device(),
        surface.handle(),
        surface.loader(),
    )?;
    Ok(choose_surface_format(&support.formats).format)
}

/// Builds the mesh pipeline against `render_pass`.
fn build_pipeline(
    device: &Arc<Device>,
    paths: &ShaderPaths,
    layout: &PipelineLayout,
    render_pass: &RenderPass,
) -> RendererResult<Pipeline> {
    let vertex_shader = load_shader(device, &paths.vertex, ShaderStage::Vertex)?;
    let fragment_shader = load_shader(device, &paths.fragment, ShaderStage::Fragment)?;

    let pipeline = GraphicsPipelineBuilder::new()
        .vertex_shader(&vertex_shader)
        .fragment_shader(&fragment_shader)
        .vertex_binding(Vertex::binding_description())
        .vertex_attributes(&Vertex::attribute_descriptions())
        .cull_mode(CullMode::Back)
        .front_face(FrontFace::CounterClockwise)
        .rasterization_samples(render_pass.samples())
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(CompareOp::Less)
        .render_pass(render_pass.handle(), 0)
        .build(device.clone(), layout)?;

    info!(
        "Mesh pipeline built for {:?}, {:?} sample(s)",
        render_pass.color_format(),
        render_pass.samples()
    );
    Ok(pipeline)
}

fn load_shader(device: &Arc<Device>, path: &Path, stage: ShaderStage) -> RendererResult<Shader> {
    Ok(Shader::from_spirv_file(device.clone(), path, stage, "main")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_mapping() {
        assert_eq!(
            preferred_present_mode(PresentModePreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            preferred_present_mode(PresentModePreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_geometry_source_from_config() {
        let mut config = Config::default();
        assert_eq!(geometry_source(&config), GeometrySource::StaticQuad);

        config.scene.geometry = GeometryKind::Model;
        config.scene.model_path = PathBuf::from("assets/model.obj");
        assert_eq!(
            geometry_source(&config),
            GeometrySource::Model(PathBuf::from("assets/model.obj"))
        );
    }
}
