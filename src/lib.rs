// =============================================================================
// LUMEN2D - Vulkan 2D renderer core
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  platform::AppWindow (winit, input handlers)                    │
// │    └── render::FrameOrchestrator (acquire/record/present loop)  │
// │          ├── backend::RenderContext (pool, layout, recording)   │
// │          │     └── backend::Swapchain / Pipeline (per resize)   │
// │          └── scene::SceneState (objects, shared models)         │
// └─────────────────────────────────────────────────────────────────┘
//
// The orchestrator only sees traits (render::SurfaceProvider,
// render::DeviceContext, ...), so the frame logic runs against stubs in tests.
//
// =============================================================================

pub mod backend;
pub mod config;
pub mod platform;
pub mod render;
pub mod scene;
