// Render context - the Vulkan side of the frame orchestrator
//
// Owns the long-lived objects that survive swapchain recreation (command
// pool, pipeline layout) and builds the short-lived ones (swapchain,
// pipeline) on request. Command encoding goes straight to ash.

use anyhow::{Context, Result};
use ash::vk;
use std::path::PathBuf;
use std::sync::Arc;

use super::pipeline::{Pipeline, PipelineLayout, PUSH_CONSTANT_STAGES};
use super::shader::ShaderModule;
use super::swapchain::{Swapchain, SwapchainConfig};
use super::VulkanDevice;
use crate::render::{
    CommandRecorder, DeviceContext, Extent, PushConstantData, RenderPassBegin,
};

/// SPIR-V files for the single graphics pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

/// Command pool whose buffers can be reset individually
pub struct CommandPool {
    handle: vk::CommandPool,
    device: Arc<VulkanDevice>,
}

impl CommandPool {
    pub fn new(device: &Arc<VulkanDevice>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            .flags(
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                    | vk::CommandPoolCreateFlags::TRANSIENT,
            );

        let handle = unsafe { device.device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        Ok(Self {
            handle,
            device: device.clone(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_command_pool(self.handle, None) };
    }
}

/// IMPORTANT: field order is drop order; the device goes last.
pub struct RenderContext {
    command_pool: CommandPool,
    pipeline_layout: PipelineLayout,
    shaders: ShaderPaths,
    swapchain_config: SwapchainConfig,
    device: Arc<VulkanDevice>,
}

impl RenderContext {
    pub fn new(
        device: Arc<VulkanDevice>,
        shaders: ShaderPaths,
        swapchain_config: SwapchainConfig,
    ) -> Result<Self> {
        let command_pool = CommandPool::new(&device)?;
        let pipeline_layout = PipelineLayout::new(&device)?;

        log::info!(
            "Render context ready (present mode {:?}, {} frames in flight)",
            swapchain_config.present_mode,
            swapchain_config.frames_in_flight
        );

        Ok(Self {
            command_pool,
            pipeline_layout,
            shaders,
            swapchain_config,
            device,
        })
    }

    #[inline]
    fn raw(&self) -> &ash::Device {
        &self.device.device
    }
}

impl DeviceContext for RenderContext {
    type Chain = Swapchain;
    type Pipeline = Pipeline;

    fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    fn allocate_command_buffers(&self, count: usize) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        unsafe { self.raw().allocate_command_buffers(&alloc_info) }
            .context("vkAllocateCommandBuffers failed")
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe {
            self.raw()
                .free_command_buffers(self.command_pool.handle(), buffers)
        };
    }

    fn create_presentation_chain(
        &self,
        extent: Extent,
        previous: Option<Swapchain>,
    ) -> Result<Swapchain> {
        Swapchain::new(self.device.clone(), extent, self.swapchain_config, previous)
    }

    /// Shaders are re-read from disk on every call
    fn create_pipeline(&self, render_pass: vk::RenderPass) -> Result<Pipeline> {
        let vert = ShaderModule::from_path(&self.device, &self.shaders.vertex)?;
        let frag = ShaderModule::from_path(&self.device, &self.shaders.fragment)?;

        // Modules can be destroyed once the pipeline exists
        Pipeline::new(&self.device, render_pass, &self.pipeline_layout, &vert, &frag)
    }
}

impl CommandRecorder for RenderContext {
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe { self.raw().begin_command_buffer(cmd, &begin_info) }
            .context("vkBeginCommandBuffer failed")
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { self.raw().end_command_buffer(cmd) }.context("vkEndCommandBuffer failed")
    }

    fn begin_render_pass(&self, cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: begin.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: begin.clear_depth,
                    stencil: begin.clear_stencil,
                },
            },
        ];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: begin.extent.into(),
            })
            .clear_values(&clear_values);

        unsafe {
            self.raw()
                .cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE)
        };
    }

    fn end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.raw().cmd_end_render_pass(cmd) };
    }

    fn set_viewport(&self, cmd: vk::CommandBuffer, extent: Extent) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        unsafe { self.raw().cmd_set_viewport(cmd, 0, &[viewport]) };
    }

    fn set_scissor(&self, cmd: vk::CommandBuffer, extent: Extent) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: extent.into(),
        };
        unsafe { self.raw().cmd_set_scissor(cmd, 0, &[scissor]) };
    }

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.raw()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
    }

    fn push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        data: &PushConstantData,
    ) {
        unsafe {
            self.raw().cmd_push_constants(
                cmd,
                layout,
                PUSH_CONSTANT_STAGES,
                0,
                bytemuck::bytes_of(data),
            )
        };
    }

    fn bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe { self.raw().cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]) };
    }

    fn draw(&self, cmd: vk::CommandBuffer, vertex_count: u32) {
        unsafe { self.raw().cmd_draw(cmd, vertex_count, 1, 0, 0) };
    }
}
