// Render core - frame orchestration and the collaborator seams it drives
//
// The orchestrator never talks to Vulkan directly. It sees the window, the
// device and the swapchain only through the traits below, which keeps the
// acquire -> record -> submit -> present sequence and the recreate protocol
// testable without a GPU.
//
// Handles are plain `vk::*` values: they are just u64 ids, so stubs can mint
// them with `Handle::from_raw` and the Vulkan backend passes them through as-is.

pub mod orchestrator;

#[cfg(test)]
pub(crate) mod stub;

use anyhow::Result;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat2, Vec2, Vec3};

pub use orchestrator::{FrameOrchestrator, FrameOutcome, FrameSettings};

/// Drawable size in pixels. Zero in either dimension means "not presentable".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when the surface has no area (minimized or mid-resize)
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<vk::Extent2D> for Extent {
    fn from(extent: vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }
}

impl From<Extent> for vk::Extent2D {
    fn from(extent: Extent) -> Self {
        vk::Extent2D {
            width: extent.width,
            height: extent.height,
        }
    }
}

/// Outcome of acquire/present that is not fatal.
///
/// Anything outside this set is returned as an `Err` by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Success,
    /// Still presentable, but no longer matches the surface exactly
    Suboptimal,
    /// The chain can no longer present to the surface
    OutOfDate,
}

impl PresentStatus {
    /// Whether this status requires the chain to be rebuilt
    pub fn is_stale(self) -> bool {
        matches!(self, PresentStatus::Suboptimal | PresentStatus::OutOfDate)
    }
}

/// Per-draw constant block, laid out for a std430 push-constant block:
///
/// ```glsl
/// layout(push_constant) uniform Push {
///     mat2 transform;
///     vec2 offset;
///     vec3 color;
/// } push;
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PushConstantData {
    pub transform: Mat2,
    pub offset: Vec2,
    _pad0: [f32; 2],
    pub color: Vec3,
    _pad1: f32,
}

impl PushConstantData {
    pub fn new(transform: Mat2, offset: Vec2, color: Vec3) -> Self {
        Self {
            transform,
            offset,
            _pad0: [0.0; 2],
            color,
            _pad1: 0.0,
        }
    }
}

/// Clear values and target for one render pass instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: Extent,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

/// The window side of the world
pub trait SurfaceProvider {
    /// Current drawable size; may be zero while minimized
    fn extent(&self) -> Extent;

    /// Drain pending platform events, dispatching handlers synchronously
    fn poll_events(&mut self);

    /// Like `poll_events`, but may block until at least one event arrives
    fn wait_events(&mut self) {
        self.poll_events();
    }

    /// Sticky flag set by resize events until explicitly reset
    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    fn should_close(&self) -> bool;
}

/// Command encoding. Every call records into `cmd`, which must be in the
/// recording state for all methods except `begin_command_buffer`.
pub trait CommandRecorder {
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;
    fn begin_render_pass(&self, cmd: vk::CommandBuffer, begin: &RenderPassBegin);
    fn end_render_pass(&self, cmd: vk::CommandBuffer);
    fn set_viewport(&self, cmd: vk::CommandBuffer, extent: Extent);
    fn set_scissor(&self, cmd: vk::CommandBuffer, extent: Extent);
    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        data: &PushConstantData,
    );
    fn bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer);
    fn draw(&self, cmd: vk::CommandBuffer, vertex_count: u32);
}

/// Logical device plus the factories the recreate protocol needs.
pub trait DeviceContext: CommandRecorder {
    type Chain: PresentationChain;
    type Pipeline: GraphicsPipeline;

    /// Block until all submitted GPU work has completed
    fn wait_idle(&self) -> Result<()>;

    fn allocate_command_buffers(&self, count: usize) -> Result<Vec<vk::CommandBuffer>>;

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]);

    /// Build a chain for `extent`. `previous` is a hint for a smoother hand-off
    /// and is released by the callee once the new chain exists.
    fn create_presentation_chain(
        &self,
        extent: Extent,
        previous: Option<Self::Chain>,
    ) -> Result<Self::Chain>;

    fn create_pipeline(&self, render_pass: vk::RenderPass) -> Result<Self::Pipeline>;
}

/// Swapchain images, their framebuffers and the render pass they agree on.
///
/// Immutable once built: a resize produces a new instance.
pub trait PresentationChain {
    fn acquire_next_image(&mut self) -> Result<(u32, PresentStatus)>;

    fn submit_and_present(&mut self, cmd: vk::CommandBuffer, image_index: u32)
        -> Result<PresentStatus>;

    fn image_count(&self) -> usize;
    fn render_pass(&self) -> vk::RenderPass;
    fn framebuffer(&self, index: usize) -> vk::Framebuffer;
    fn extent(&self) -> Extent;
}

/// Compiled shaders plus fixed-function state for one render pass.
pub trait GraphicsPipeline {
    fn handle(&self) -> vk::Pipeline;
    fn layout(&self) -> vk::PipelineLayout;

    fn bind(&self, recorder: &dyn CommandRecorder, cmd: vk::CommandBuffer) {
        recorder.bind_pipeline(cmd, self.handle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_extent_is_not_presentable() {
        assert!(Extent::new(0, 600).is_zero());
        assert!(Extent::new(800, 0).is_zero());
        assert!(!Extent::new(800, 600).is_zero());
    }

    #[test]
    fn push_constant_block_matches_std430() {
        assert_eq!(std::mem::size_of::<PushConstantData>(), 48);
        assert_eq!(std::mem::offset_of!(PushConstantData, offset), 16);
        assert_eq!(std::mem::offset_of!(PushConstantData, color), 32);
    }

    #[test]
    fn only_suboptimal_and_out_of_date_are_stale() {
        assert!(!PresentStatus::Success.is_stale());
        assert!(PresentStatus::Suboptimal.is_stale());
        assert!(PresentStatus::OutOfDate.is_stale());
    }
}
