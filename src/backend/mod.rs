// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics
// Every handle is owned by an RAII type holding an Arc<VulkanDevice>, so the
// device is always destroyed last.

pub mod buffer;
pub mod context;
pub mod device;
pub mod model;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use context::{RenderContext, ShaderPaths};
pub use device::VulkanDevice;
pub use model::{Vertex, VertexModel};
pub use swapchain::{Swapchain, SwapchainConfig};
