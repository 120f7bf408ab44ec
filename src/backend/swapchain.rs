// Swapchain - Window presentation
//
// Owns the chain of images we render to and present to the screen, plus
// everything that has to match them: image views, depth attachments, the
// render pass, one framebuffer per image and the frame synchronization.
//
// A Swapchain never changes after construction. On resize a new one is built,
// seeded with the old handle, and the old one is dropped afterwards.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use std::sync::Arc;

use super::buffer::{create_depth_buffer, DEPTH_FORMAT};
use super::sync::{FrameSync, Semaphore};
use super::VulkanDevice;
use crate::render::{Extent, PresentStatus, PresentationChain};

/// Knobs fixed for the lifetime of the renderer
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    pub present_mode: vk::PresentModeKHR,
    pub frames_in_flight: usize,
}

/// Per-image depth image + memory + view
struct DepthAttachment {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    device: Arc<VulkanDevice>,
}

impl DepthAttachment {
    fn new(device: &Arc<VulkanDevice>, extent: vk::Extent2D) -> Result<Self> {
        let (image, memory, view) = create_depth_buffer(device, extent)?;
        Ok(Self {
            image,
            memory,
            view,
            device: device.clone(),
        })
    }
}

impl Drop for DepthAttachment {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_image_view(self.view, None);
            self.device.device.destroy_image(self.image, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    depth_attachments: Vec<DepthAttachment>,

    /// One per frame in flight
    frame_sync: Vec<FrameSync>,
    /// One per image, so a semaphore is never re-signaled before present consumed it
    render_finished: Vec<Semaphore>,
    /// Fence of the frame that last used each image (null if none yet)
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,

    device: Arc<VulkanDevice>,
}

impl Swapchain {
    pub fn new(
        device: Arc<VulkanDevice>,
        requested: Extent,
        config: SwapchainConfig,
        previous: Option<Swapchain>,
    ) -> Result<Self> {
        log::info!("Creating swapchain: {}x{}", requested.width, requested.height);

        let surface = device.surface;
        let surface_loader = &device.surface_loader;

        // Query surface capabilities
        let surface_caps = unsafe {
            surface_loader.get_physical_device_surface_capabilities(device.physical_device, surface)
        }
        .context("Failed to query surface capabilities")?;

        // Query supported formats
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
        }
        .context("Failed to query surface formats")?;

        // Query supported present modes
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(device.physical_device, surface)
        }
        .context("Failed to query present modes")?;

        let surface_format = choose_surface_format(&formats).context("No suitable surface format")?;
        let present_mode = choose_present_mode(&present_modes, config.present_mode);
        let extent = choose_extent(&surface_caps, requested.into());
        let image_count = choose_image_count(&surface_caps);

        log::info!("Present mode: {:?}", present_mode);

        let swapchain_loader = khr::Swapchain::new(&device.instance, &device.device);

        // Everything below is filled in step by step. If a step fails, Drop
        // releases whatever was already created (destroying null handles is a no-op).
        let mut chain = Self {
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            image_views: Vec::new(),
            format: surface_format.format,
            extent,
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            depth_attachments: Vec::new(),
            frame_sync: Vec::new(),
            render_finished: Vec::new(),
            images_in_flight: Vec::new(),
            current_frame: 0,
            device: device.clone(),
        };

        let old_swapchain = previous
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |p| p.swapchain);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        chain.swapchain = unsafe { chain.swapchain_loader.create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;

        // The new swapchain exists, the old one can go
        if let Some(previous) = previous {
            if previous.format != chain.format {
                log::warn!(
                    "Swapchain format changed from {:?} to {:?}",
                    previous.format,
                    chain.format
                );
            }
            drop(previous);
        }

        chain.images = unsafe { chain.swapchain_loader.get_swapchain_images(chain.swapchain) }
            .context("Failed to get swapchain images")?;

        log::info!("Created swapchain with {} images", chain.images.len());

        // Create image views
        for &image in &chain.images {
            let view = create_color_view(&device, image, chain.format)?;
            chain.image_views.push(view);
        }

        chain.render_pass = create_render_pass(&device, chain.format)?;

        for _ in 0..chain.images.len() {
            chain.depth_attachments.push(DepthAttachment::new(&device, extent)?);
        }

        for (&color, depth) in chain.image_views.iter().zip(&chain.depth_attachments) {
            let attachments = [color, depth.view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(chain.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe { device.device.create_framebuffer(&framebuffer_info, None) }
                .context("Failed to create framebuffer")?;
            chain.framebuffers.push(framebuffer);
        }

        // Synchronization primitives
        for _ in 0..config.frames_in_flight.max(1) {
            chain.frame_sync.push(FrameSync::new(&device)?);
        }
        for _ in 0..chain.images.len() {
            chain.render_finished.push(Semaphore::new(&device)?);
        }
        chain.images_in_flight = vec![vk::Fence::null(); chain.images.len()];

        Ok(chain)
    }
}

impl PresentationChain for Swapchain {
    /// Acquire next image for rendering
    fn acquire_next_image(&mut self) -> Result<(u32, PresentStatus)> {
        let sync = &self.frame_sync[self.current_frame];

        // Wait for the frame that last used this sync slot
        sync.in_flight.wait()?;

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available.handle(),
                vk::Fence::null(),
            )
        };

        let (image_index, status) = match result {
            Ok((index, false)) => (index, PresentStatus::Success),
            Ok((index, true)) => (index, PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok((0, PresentStatus::OutOfDate)),
            Err(e) => return Err(e).context("vkAcquireNextImageKHR failed"),
        };

        // The command buffer for this image may still be executing for an
        // older frame slot
        let image_fence = self.images_in_flight[image_index as usize];
        if image_fence != vk::Fence::null() {
            unsafe {
                self.device
                    .device
                    .wait_for_fences(&[image_fence], true, u64::MAX)
            }
            .context("Failed to wait for image fence")?;
        }
        self.images_in_flight[image_index as usize] = sync.in_flight.handle();

        Ok((image_index, status))
    }

    /// Submit the recorded commands and present the image
    fn submit_and_present(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
    ) -> Result<PresentStatus> {
        let sync = &self.frame_sync[self.current_frame];

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[image_index as usize].handle()];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        sync.in_flight.reset()?;
        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                sync.in_flight.handle(), // Signal this fence when GPU is done
            )
        }
        .context("vkQueueSubmit failed")?;

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.device.graphics_queue, &present_info)
        };

        self.current_frame = (self.current_frame + 1) % self.frame_sync.len();

        match result {
            Ok(false) => Ok(PresentStatus::Success),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(e).context("vkQueuePresentKHR failed"),
        }
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    fn extent(&self) -> Extent {
        self.extent.into()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.device.destroy_render_pass(self.render_pass, None);
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        // Depth attachments and sync objects drop with their fields
    }
}

/// Prefer SRGB, otherwise whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Use the preferred mode when available. FIFO is always supported.
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: requested
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: requested
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        caps.max_image_count
    } else {
        image_count
    }
}

fn create_color_view(
    device: &VulkanDevice,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.device.create_image_view(&create_info, None) }
        .context("Failed to create image view")
}

/// Create a render pass for color (presented) + depth
pub fn create_render_pass(device: &VulkanDevice, format: vk::Format) -> Result<vk::RenderPass> {
    // Color attachment (the swapchain image)
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    // Depth attachment
    let depth_attachment = vk::AttachmentDescription::builder()
        .format(DEPTH_FORMAT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let depth_attachment_ref = vk::AttachmentReference::builder()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments)
        .depth_stencil_attachment(&depth_attachment_ref)
        .build();

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .build();

    let attachments = &[color_attachment, depth_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    unsafe { device.device.create_render_pass(&render_pass_info, None) }
        .context("Failed to create render pass")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            min_image_count: min_count,
            max_image_count: max_count,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_srgb_surface_format() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let format = |formats: &[vk::SurfaceFormatKHR]| {
            choose_surface_format(formats).map(|f| f.format)
        };
        assert_eq!(format(&[unorm, srgb]), Some(vk::Format::B8G8R8A8_SRGB));
        assert_eq!(format(&[unorm]), Some(vk::Format::B8G8R8A8_UNORM));
        assert_eq!(format(&[]), None);
    }

    #[test]
    fn unsupported_present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn surface_extent_wins_unless_undefined() {
        let requested = vk::Extent2D {
            width: 10_000,
            height: 10,
        };
        assert_eq!(
            choose_extent(&caps((800, 600), 2, 3), requested),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        assert_eq!(
            choose_extent(&caps((u32::MAX, u32::MAX), 2, 3), requested),
            vk::Extent2D {
                width: 4096,
                height: 64
            }
        );
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        assert_eq!(choose_image_count(&caps((1, 1), 2, 0)), 3);
        assert_eq!(choose_image_count(&caps((1, 1), 2, 8)), 3);
        assert_eq!(choose_image_count(&caps((1, 1), 3, 3)), 3);
    }
}
