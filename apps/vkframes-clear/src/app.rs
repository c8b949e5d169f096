//! Animated clear sample: dynamic rendering into an offscreen target, blitted
//! to the swapchain.

use std::sync::Arc;

use ash::vk;
use glam::Vec3;
use tracing::{error, info};
use winit::event::ElementState;
use winit::keyboard::{KeyCode, PhysicalKey};

use vkframes_app::{AppContext, FrameContext, FrameRecorder, SampleApp, WindowEvent};
use vkframes_gpu::memory::color_subresource_range;
use vkframes_gpu::{GpuContext, GpuImage, Swapchain};

/// Present modes Space cycles through, in order.
const PRESENT_MODE_CYCLE: [vk::PresentModeKHR; 4] = [
    vk::PresentModeKHR::FIFO,
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::IMMEDIATE,
    vk::PresentModeKHR::FIFO_RELAXED,
];

/// Hue rotation speed in radians per second.
const CYCLE_SPEED: f32 = 0.8;

/// Clear colour at `time` seconds: three phase-shifted sines, each in `[0, 1]`.
pub fn clear_color(time: f32) -> [f32; 4] {
    let phase = Vec3::new(0.0, 2.094, 4.189) + Vec3::splat(time * CYCLE_SPEED);
    let rgb = Vec3::new(phase.x.sin(), phase.y.sin(), phase.z.sin()) * 0.5 + Vec3::splat(0.5);
    [rgb.x, rgb.y, rgb.z, 1.0]
}

/// The mode after `current` in [`PRESENT_MODE_CYCLE`]. Unknown modes restart at FIFO.
pub fn next_present_mode(current: vk::PresentModeKHR) -> vk::PresentModeKHR {
    PRESENT_MODE_CYCLE
        .iter()
        .position(|&mode| mode == current)
        .map_or(PRESENT_MODE_CYCLE[0], |i| {
            PRESENT_MODE_CYCLE[(i + 1) % PRESENT_MODE_CYCLE.len()]
        })
}

pub struct ClearApp {
    gpu: Arc<GpuContext>,
    /// Sized to the swapchain, rebuilt on every recreate.
    target: Option<GpuImage>,
    time: f32,
    /// Last mode requested with Space.
    present_mode: vk::PresentModeKHR,
}

impl ClearApp {
    fn create_target(&mut self, extent: vk::Extent2D, format: vk::Format) -> anyhow::Result<()> {
        let mut allocator = self.gpu.allocator().lock();
        if let Some(mut old) = self.target.take() {
            allocator.free_image(&mut old)?;
        }
        let target = allocator.create_color_image(
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            "clear target",
        )?;
        self.target = Some(target);
        Ok(())
    }

    fn record_clear(&self, device: &ash::Device, cmd: vk::CommandBuffer, target: &GpuImage) {
        let to_attachment = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
            .src_access_mask(vk::AccessFlags2::TRANSFER_READ)
            .dst_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .image(target.image)
            .subresource_range(color_subresource_range());

        let attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(target.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color(self.time),
                },
            })];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: target.extent,
            })
            .layer_count(1)
            .color_attachments(&attachments);

        // SAFETY: The command buffer is recording and the target outlives the frame.
        unsafe {
            device.cmd_pipeline_barrier2(
                cmd,
                &vk::DependencyInfo::default()
                    .image_memory_barriers(std::slice::from_ref(&to_attachment)),
            );
            device.cmd_begin_rendering(cmd, &rendering_info);
            device.cmd_end_rendering(cmd);
        }
    }

    fn record_blit(&self, device: &ash::Device, frame: &FrameContext, target: &GpuImage) {
        let cmd = frame.command_buffer;

        let target_barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::BLIT)
            .dst_access_mask(vk::AccessFlags2::TRANSFER_READ)
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .image(target.image)
            .subresource_range(color_subresource_range());

        // Chains with the acquire semaphore wait at COLOR_ATTACHMENT_OUTPUT.
        let swapchain_barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags2::NONE)
            .dst_stage_mask(vk::PipelineStageFlags2::BLIT)
            .dst_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .image(frame.swapchain_image)
            .subresource_range(color_subresource_range());

        let layers = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let blit = vk::ImageBlit {
            src_subresource: layers,
            src_offsets: [vk::Offset3D::default(), far_corner(target.extent)],
            dst_subresource: layers,
            dst_offsets: [vk::Offset3D::default(), far_corner(frame.extent)],
        };

        let present_barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::BLIT)
            .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE)
            .dst_access_mask(vk::AccessFlags2::NONE)
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .image(frame.swapchain_image)
            .subresource_range(color_subresource_range());

        let barriers = [target_barrier, swapchain_barrier];
        // SAFETY: The command buffer is recording; the swapchain image was acquired.
        unsafe {
            device.cmd_pipeline_barrier2(
                cmd,
                &vk::DependencyInfo::default().image_memory_barriers(&barriers),
            );
            device.cmd_blit_image(
                cmd,
                target.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                frame.swapchain_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::NEAREST,
            );
            device.cmd_pipeline_barrier2(
                cmd,
                &vk::DependencyInfo::default()
                    .image_memory_barriers(std::slice::from_ref(&present_barrier)),
            );
        }
    }
}

fn far_corner(extent: vk::Extent2D) -> vk::Offset3D {
    vk::Offset3D {
        x: i32::try_from(extent.width).unwrap_or(i32::MAX),
        y: i32::try_from(extent.height).unwrap_or(i32::MAX),
        z: 1,
    }
}

impl FrameRecorder for ClearApp {
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn record(&mut self, frame: &FrameContext) -> anyhow::Result<()> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("offscreen target missing"))?;
        let device = self.gpu.device();

        self.record_clear(device, frame.command_buffer, target);
        self.record_blit(device, frame, target);
        Ok(())
    }

    fn on_swapchain_recreated(&mut self, swapchain: &Swapchain) -> anyhow::Result<()> {
        let extent = swapchain.extent();
        self.create_target(extent, swapchain.format())?;
        info!("Offscreen target rebuilt at {}x{}", extent.width, extent.height);
        Ok(())
    }
}

impl SampleApp for ClearApp {
    fn init(ctx: &AppContext) -> anyhow::Result<Self> {
        let mut app = Self {
            gpu: Arc::clone(&ctx.gpu),
            target: None,
            time: 0.0,
            present_mode: ctx.present_mode(),
        };
        app.create_target(ctx.extent(), ctx.swapchain_format())?;
        info!(
            "Clear sample ready: {}x{}, {:?}, {} frames in flight",
            ctx.width(),
            ctx.height(),
            ctx.present_mode(),
            ctx.frames_in_flight()
        );
        info!("Space cycles the present mode, Escape exits");
        Ok(app)
    }

    fn update(&mut self, _ctx: &AppContext, dt: f32) {
        self.time += dt;
    }

    fn on_event(&mut self, ctx: &mut AppContext, event: &WindowEvent) -> bool {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return false;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return false;
        }

        match event.physical_key {
            PhysicalKey::Code(KeyCode::Space) => {
                self.present_mode = next_present_mode(self.present_mode);
                info!("Requesting present mode {:?}", self.present_mode);
                ctx.request_present_mode(self.present_mode);
                true
            }
            PhysicalKey::Code(KeyCode::Escape) => {
                ctx.request_exit();
                true
            }
            _ => false,
        }
    }

    fn cleanup(&mut self, _ctx: &AppContext) {
        if let Some(mut target) = self.target.take() {
            if let Err(e) = self.gpu.allocator().lock().free_image(&mut target) {
                error!("Failed to free offscreen target: {e}");
            }
        }
    }
}
