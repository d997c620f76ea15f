// SPDX-License-Identifier: CEPL-1.0
use std::mem::size_of;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::vk;
use orbit_assets::{MeshData, TextureData};
use orbit_render::{
    Acquire, FrameDevice, FrameSlot, FrameUniforms, ImageIndex, Present, RenderSize, SurfaceInfo,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use crate::descriptors::Descriptors;
use crate::device::DeviceContext;
use crate::frame::{VkFrame, VkImageSignal};
use crate::instance::{InstanceContext, Surface};
use crate::memory::{MemoryAllocator, UsageHint};
use crate::mesh::MeshBuffer;
use crate::pipeline::Pipeline;
use crate::swapchain::{color_subresource, Swapchain};
use crate::sync::{CommandPool, Fence, Semaphore};
use crate::targets::RenderTargets;
use crate::texture::Texture;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VkConfig {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    /// Requested MSAA sample count; clamped to what the device supports.
    pub msaa_samples: u32,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.2, 1.0],
            vsync: true,
            msaa_samples: 4,
        }
    }
}

/// Vulkan implementation of [`FrameDevice`].
///
/// Fields are declared in reverse creation order so they drop that way.
pub struct VkFrameDevice {
    pipeline: Pipeline,
    texture_set: vk::DescriptorSet,
    descriptors: Descriptors,
    texture: Texture,
    mesh: MeshBuffer,
    pool: CommandPool,
    targets: RenderTargets,
    swapchain: Swapchain,
    allocator: Arc<MemoryAllocator>,
    device: Arc<DeviceContext>,
    _surface: Arc<Surface>,
    clear: [vk::ClearValue; 2],
}

impl VkFrameDevice {
    // STRICT ORDER (setup):
    // 1) instance (+ debug messenger)
    // 2) surface: device selection needs it for the present-support query
    // 3) device + queue
    // 4) allocator
    // 5) swapchain
    // 6) render targets, command pool, mesh, texture, descriptors
    // 7) pipeline (needs swapchain + depth formats and the set layouts)
    pub fn new<W>(
        window: &W,
        size: RenderSize,
        config: VkConfig,
        mesh: &MeshData,
        texture: &TextureData,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        let instance = Arc::new(InstanceContext::new(window)?);
        let surface = Arc::new(Surface::new(Arc::clone(&instance), window, window)?);
        let device = Arc::new(DeviceContext::new(instance, &surface)?);
        let allocator = Arc::new(MemoryAllocator::new(Arc::clone(&device))?);

        let swapchain = Swapchain::new(Arc::clone(&device), Arc::clone(&surface), size, config.vsync)?;

        let samples = device.sample_count(config.msaa_samples);
        let depth_format = unsafe { device.pick_depth_format()? };
        let targets = RenderTargets::new(
            &allocator,
            swapchain.format,
            depth_format,
            swapchain.extent,
            samples,
        )?;

        let pool = CommandPool::new(Arc::clone(&device))?;
        let mesh = MeshBuffer::new(&allocator, mesh)?;
        let texture = Texture::upload(&allocator, &pool, texture)?;
        let descriptors = Descriptors::new(Arc::clone(&device))?;
        let texture_set = descriptors.texture_set(&texture)?;

        let pipeline = Pipeline::new(
            Arc::clone(&device),
            &[descriptors.frame_layout, descriptors.texture_layout],
            swapchain.format,
            depth_format,
            samples,
        )?;

        info!(
            "vulkan renderer ready: {} samples={samples:?} vsync={}",
            swapchain.size(),
            config.vsync
        );
        Ok(Self {
            pipeline,
            texture_set,
            descriptors,
            texture,
            mesh,
            pool,
            targets,
            swapchain,
            allocator,
            device,
            _surface: surface,
            clear: [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: config.clear_color,
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ],
        })
    }

    fn image(&self, image: ImageIndex) -> Result<(vk::Image, vk::ImageView)> {
        let i = image.as_usize();
        match (self.swapchain.images.get(i), self.swapchain.views.get(i)) {
            (Some(&img), Some(&view)) => Ok((img, view)),
            _ => Err(anyhow!(
                "{image} out of range for {} swapchain images",
                self.swapchain.images.len()
            )),
        }
    }

    fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.swapchain.extent,
        }
    }

    #[inline]
    unsafe fn transition_to_attachments(&self, cmd: vk::CommandBuffer, image: vk::Image) {
        let barriers = [
            // MSAA color target, shared by every slot.
            vk::ImageMemoryBarrier2 {
                s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
                src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                dst_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                dst_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags2::COLOR_ATTACHMENT_READ,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                image: self.targets.color.image.handle,
                subresource_range: self.targets.color.range,
                ..Default::default()
            },
            vk::ImageMemoryBarrier2 {
                s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
                src_stage_mask: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                src_access_mask: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_stage_mask: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                dst_access_mask: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                image: self.targets.depth.image.handle,
                subresource_range: self.targets.depth.range,
                ..Default::default()
            },
            // Swapchain image as resolve target. The source stage matches the
            // acquired semaphore's wait stage.
            vk::ImageMemoryBarrier2 {
                s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
                src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: vk::AccessFlags2::empty(),
                dst_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                dst_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                image,
                subresource_range: color_subresource(),
                ..Default::default()
            },
        ];
        let dep = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            image_memory_barrier_count: barriers.len() as u32,
            p_image_memory_barriers: barriers.as_ptr(),
            ..Default::default()
        };
        self.device.device.cmd_pipeline_barrier2(cmd, &dep);
    }

    #[inline]
    unsafe fn begin_rendering(&self, cmd: vk::CommandBuffer, image_view: vk::ImageView) {
        let multisampled = self.targets.samples != vk::SampleCountFlags::TYPE_1;
        let color_att = if multisampled {
            vk::RenderingAttachmentInfo {
                s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
                image_view: self.targets.color.view,
                image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                resolve_mode: vk::ResolveModeFlags::AVERAGE,
                resolve_image_view: image_view,
                resolve_image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                clear_value: self.clear[0],
                ..Default::default()
            }
        } else {
            vk::RenderingAttachmentInfo {
                s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
                image_view,
                image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                clear_value: self.clear[0],
                ..Default::default()
            }
        };
        let depth_att = vk::RenderingAttachmentInfo {
            s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
            image_view: self.targets.depth.view,
            image_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: self.clear[1],
            ..Default::default()
        };
        let rendering_info = vk::RenderingInfo {
            s_type: vk::StructureType::RENDERING_INFO,
            render_area: self.render_area(),
            layer_count: 1,
            color_attachment_count: 1,
            p_color_attachments: &color_att,
            p_depth_attachment: &depth_att,
            ..Default::default()
        };
        self.device.device.cmd_begin_rendering(cmd, &rendering_info);
    }

    #[inline]
    unsafe fn bind_draw_geometry(&self, cmd: vk::CommandBuffer, frame: &VkFrame) {
        let d = &self.device.device;
        let extent = self.swapchain.extent;

        let vp = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        d.cmd_set_viewport(cmd, 0, std::slice::from_ref(&vp));
        let sc = self.render_area();
        d.cmd_set_scissor(cmd, 0, std::slice::from_ref(&sc));

        d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle);
        d.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.layout,
            0,
            &[frame.set, self.texture_set],
            &[],
        );
        self.mesh.bind(d, cmd);
        d.cmd_draw_indexed(cmd, self.mesh.index_count, 1, 0, 0, 0);
    }

    #[inline]
    unsafe fn transition_to_present(&self, cmd: vk::CommandBuffer, image: vk::Image) {
        let post_barrier = vk::ImageMemoryBarrier2 {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
            src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            dst_stage_mask: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            dst_access_mask: vk::AccessFlags2::empty(),
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            image,
            subresource_range: color_subresource(),
            ..Default::default()
        };
        let dep_post = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            image_memory_barrier_count: 1,
            p_image_memory_barriers: &post_barrier,
            ..Default::default()
        };
        self.device.device.cmd_pipeline_barrier2(cmd, &dep_post);
    }

    unsafe fn record_one_command(
        &self,
        frame: &VkFrame,
        image: vk::Image,
        image_view: vk::ImageView,
    ) -> Result<()> {
        let d = &self.device.device;
        let cmd = frame.cmd;

        // reset + begin
        d.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        d.begin_command_buffer(cmd, &begin)?;

        // body
        self.transition_to_attachments(cmd, image);
        self.begin_rendering(cmd, image_view);
        self.bind_draw_geometry(cmd, frame);
        d.cmd_end_rendering(cmd);
        self.transition_to_present(cmd, image);

        // end
        d.end_command_buffer(cmd)?;
        Ok(())
    }
}

impl FrameDevice for VkFrameDevice {
    type Frame = VkFrame;
    type ImageSignal = VkImageSignal;

    fn create_frame(&mut self, slot: FrameSlot) -> Result<VkFrame> {
        let cmd = self.pool.allocate()?;
        let fence = Fence::new(Arc::clone(&self.device), true)?;
        let acquired = Semaphore::new(Arc::clone(&self.device))?;
        let uniforms = self.allocator.create_buffer(
            &format!("uniforms {slot}"),
            size_of::<FrameUniforms>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            UsageHint::HostSequentialWrite,
        )?;
        let set = self.descriptors.frame_set(&uniforms)?;
        debug!("{slot} created");
        Ok(VkFrame {
            cmd,
            set,
            uniforms,
            acquired,
            fence,
        })
    }

    fn create_image_signal(&mut self, _image: ImageIndex) -> Result<VkImageSignal> {
        Semaphore::new(Arc::clone(&self.device))
    }

    fn surface(&self) -> SurfaceInfo {
        SurfaceInfo {
            extent: self.swapchain.size(),
            image_count: self.swapchain.image_count(),
        }
    }

    fn wait(&mut self, frame: &VkFrame) -> Result<()> {
        frame.fence.wait()
    }

    fn acquire(&mut self, frame: &VkFrame) -> Result<Acquire> {
        let result = unsafe {
            self.device.swapchain_loader.acquire_next_image(
                self.swapchain.handle,
                u64::MAX,
                frame.acquired.handle,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok(Acquire::Image {
                index: ImageIndex::new(index),
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(e) => Err(e).context("acquire_next_image"),
        }
    }

    fn reset(&mut self, frame: &VkFrame) -> Result<()> {
        frame.fence.reset()
    }

    fn write_uniforms(&mut self, frame: &mut VkFrame, uniforms: &FrameUniforms) -> Result<()> {
        frame.uniforms.write(0, bytemuck::bytes_of(uniforms))
    }

    fn record(&mut self, frame: &mut VkFrame, image: ImageIndex) -> Result<()> {
        let (img, view) = self.image(image)?;
        unsafe { self.record_one_command(frame, img, view) }
    }

    fn submit(&mut self, frame: &VkFrame, signal: &VkImageSignal) -> Result<()> {
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &frame.acquired.handle,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &frame.cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &signal.handle,
            ..Default::default()
        };
        unsafe {
            self.device.device.queue_submit(
                self.device.queue,
                std::slice::from_ref(&submit),
                frame.fence.handle,
            )
        }
        .context("queue_submit")
    }

    fn present(&mut self, image: ImageIndex, signal: &VkImageSignal) -> Result<Present> {
        let index = image.get();
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &signal.handle,
            swapchain_count: 1,
            p_swapchains: &self.swapchain.handle,
            p_image_indices: &index,
            ..Default::default()
        };
        match unsafe {
            self.device
                .swapchain_loader
                .queue_present(self.device.queue, &present)
        } {
            Ok(false) => Ok(Present::Presented),
            Ok(true) => Ok(Present::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Present::OutOfDate),
            Err(e) => Err(e).context("queue_present"),
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }

    fn recreate_surface(&mut self, size: RenderSize) -> Result<SurfaceInfo> {
        if !self.swapchain.recreate(size)? {
            return Ok(SurfaceInfo {
                extent: RenderSize::default(),
                image_count: self.swapchain.image_count(),
            });
        }
        self.targets = RenderTargets::new(
            &self.allocator,
            self.swapchain.format,
            self.targets.depth_format,
            self.swapchain.extent,
            self.targets.samples,
        )?;
        Ok(self.surface())
    }
}
