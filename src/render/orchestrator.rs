// Frame orchestrator - one present cycle per loop iteration
//
// FRAME FLOW:
// 1. Acquire the next image from the presentation chain
// 2. Record the command buffer that belongs to that image
// 3. Submit it and present
// 4. On staleness (or a pending resize) rebuild chain, command buffers and
//    pipeline before the next frame
//
// Everything here runs on one thread. The GPU side is asynchronous, but the
// chain hides its fences and semaphores behind acquire/submit/present.

use anyhow::{bail, Context, Result};
use ash::vk;
use std::sync::Arc;

use super::{
    CommandRecorder, DeviceContext, GraphicsPipeline, PresentStatus, PresentationChain,
    PushConstantData, RenderPassBegin, SurfaceProvider,
};
use crate::scene::{GameObject, ObjectId, SceneState};

/// Fixed per-frame parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    pub clear_color: [f32; 4],
    /// Per-object rotation increment (radians), scaled by 1-based position
    pub rotation_step: f32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            // Alpha stays 1.0: the cleared frame is opaque
            clear_color: [0.01, 0.01, 0.01, 1.0],
            rotation_step: 0.00001,
        }
    }
}

/// What a single `draw_frame` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Image acquired, recorded, submitted and presented
    Presented,
    /// Acquisition reported out-of-date; chain rebuilt, nothing drawn
    Skipped,
    /// Frame presented, then the chain was rebuilt for the next one
    Recreated,
}

/// Owns the presentation chain, pipeline and per-image command buffers, and
/// keeps the three consistent across resizes.
///
/// IMPORTANT: field order is drop order. GPU objects go before the device
/// context, and the device context goes before the surface it was created from.
pub struct FrameOrchestrator<S: SurfaceProvider, D: DeviceContext> {
    pipeline: Option<D::Pipeline>,
    chain: Option<D::Chain>,
    /// One per image of the current chain
    command_buffers: Vec<vk::CommandBuffer>,
    scene: SceneState,
    settings: FrameSettings,
    device: Arc<D>,
    surface: S,
}

impl<S: SurfaceProvider, D: DeviceContext> FrameOrchestrator<S, D> {
    /// Build the first chain, command buffers and pipeline.
    ///
    /// This is the only way to get an orchestrator, and it cannot be cloned,
    /// so there is never a second one racing for the same surface.
    pub fn new(
        surface: S,
        device: Arc<D>,
        scene: SceneState,
        settings: FrameSettings,
    ) -> Result<Self> {
        let mut orchestrator = Self {
            pipeline: None,
            chain: None,
            command_buffers: Vec::new(),
            scene,
            settings,
            device,
            surface,
        };
        orchestrator.recreate_swapchain()?;
        Ok(orchestrator)
    }

    /// Drive frames until the surface asks to close, then wait for the GPU.
    pub fn run(&mut self) -> Result<()> {
        self.run_with(|_, _| {})
    }

    /// Like `run`, calling `on_frame` after every iteration
    pub fn run_with<F>(&mut self, mut on_frame: F) -> Result<()>
    where
        F: FnMut(&mut S, FrameOutcome),
    {
        while !self.surface.should_close() {
            self.surface.poll_events();
            if self.surface.should_close() {
                break;
            }
            let outcome = self.draw_frame()?;
            on_frame(&mut self.surface, outcome);
        }

        self.device
            .wait_idle()
            .context("Failed to wait for device idle on shutdown")
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Render a single frame, rebuilding the chain when it has gone stale.
    ///
    /// A stale acquisition drops the frame; a stale present lets the submitted
    /// work finish and defers only the next frame.
    pub fn draw_frame(&mut self) -> Result<FrameOutcome> {
        let (image_index, status) = self
            .chain_mut()?
            .acquire_next_image()
            .context("Failed to acquire swap chain image")?;

        if status == PresentStatus::OutOfDate {
            log::debug!("Swap chain out of date on acquire, recreating");
            self.recreate_swapchain()?;
            return Ok(FrameOutcome::Skipped);
        }

        self.record_command_buffer(image_index as usize)?;

        let cmd = self.command_buffers[image_index as usize];
        let status = self
            .chain_mut()?
            .submit_and_present(cmd, image_index)
            .context("Failed to submit command buffer")?;

        if status.is_stale() || self.surface.was_resized() {
            log::debug!(
                "Recreating swap chain after present (status {:?}, resized {})",
                status,
                self.surface.was_resized()
            );
            self.surface.reset_resized_flag();
            self.recreate_swapchain()?;
            return Ok(FrameOutcome::Recreated);
        }

        Ok(FrameOutcome::Presented)
    }

    // =========================================================================
    // RECREATE PROTOCOL
    // =========================================================================

    /// Rebuild chain, command buffers and pipeline for the current surface size.
    ///
    /// Blocks while the surface has zero area, then waits for the device to go
    /// idle before anything the old chain references is released. A close
    /// request while blocked returns early and leaves the current chain as is.
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        let mut extent = self.surface.extent();
        while extent.is_zero() {
            self.surface.wait_events();
            if self.surface.should_close() {
                log::debug!("Close requested while the surface has no area");
                return Ok(());
            }
            extent = self.surface.extent();
        }

        self.device
            .wait_idle()
            .context("Failed to wait for device idle before recreating swap chain")?;

        let previous = self.chain.take();
        let chain = self
            .device
            .create_presentation_chain(extent, previous)
            .context("Failed to create swap chain")?;
        let image_count = chain.image_count();

        if image_count != self.command_buffers.len() {
            self.free_command_buffers();
            self.command_buffers = self
                .device
                .allocate_command_buffers(image_count)
                .context("Failed to allocate command buffers")?;
            log::info!("Allocated {} command buffers", image_count);
        }

        // No render pass compatibility check: always rebuild against the new pass
        self.pipeline = None;
        self.pipeline = Some(
            self.device
                .create_pipeline(chain.render_pass())
                .context("Failed to create graphics pipeline")?,
        );

        log::info!(
            "Swap chain ready: {}x{}, {} images",
            extent.width,
            extent.height,
            image_count
        );
        self.chain = Some(chain);
        Ok(())
    }

    fn free_command_buffers(&mut self) {
        if !self.command_buffers.is_empty() {
            self.device.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
        }
    }

    // =========================================================================
    // COMMAND RECORDING
    // =========================================================================

    /// Record the full frame into the command buffer for `image_index`.
    pub fn record_command_buffer(&mut self, image_index: usize) -> Result<()> {
        if image_index >= self.command_buffers.len() {
            bail!(
                "Image index {} out of range for {} command buffers",
                image_index,
                self.command_buffers.len()
            );
        }
        let cmd = self.command_buffers[image_index];

        let chain = self.chain.as_ref().context("Swap chain not initialized")?;
        let extent = chain.extent();
        let begin = RenderPassBegin {
            render_pass: chain.render_pass(),
            framebuffer: chain.framebuffer(image_index),
            extent,
            clear_color: self.settings.clear_color,
            clear_depth: 1.0,
            clear_stencil: 0,
        };

        let device = &*self.device;
        device
            .begin_command_buffer(cmd)
            .context("Failed to begin recording command buffer")?;

        device.begin_render_pass(cmd, &begin);
        // Viewport and scissor are dynamic state, so a resize alone never
        // needs a new pipeline for them
        device.set_viewport(cmd, extent);
        device.set_scissor(cmd, extent);

        self.render_game_objects(cmd)?;

        self.device.end_render_pass(cmd);
        self.device
            .end_command_buffer(cmd)
            .context("Failed to end recording command buffer")
    }

    /// Animate, then draw every object in scene order with its own push block.
    pub fn render_game_objects(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        self.scene.advance_rotations(self.settings.rotation_step);

        let pipeline = self.pipeline.as_ref().context("Pipeline not initialized")?;
        let recorder: &dyn CommandRecorder = &*self.device;
        pipeline.bind(recorder, cmd);

        for object in self.scene.iter() {
            let push = PushConstantData::new(
                object.transform.mat2(),
                object.transform.translation,
                object.color,
            );
            recorder.push_constants(cmd, pipeline.layout(), &push);
            object.model.bind(recorder, cmd);
            object.model.draw(recorder, cmd);
        }

        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    fn chain_mut(&mut self) -> Result<&mut D::Chain> {
        self.chain.as_mut().context("Swap chain not initialized")
    }

    pub fn chain(&self) -> Option<&D::Chain> {
        self.chain.as_ref()
    }

    pub fn pipeline(&self) -> Option<&D::Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.command_buffers
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// Scene mutation happens between frames only; `&mut self` guarantees it
    pub fn scene_mut(&mut self) -> &mut SceneState {
        &mut self.scene
    }

    /// Remove an object once the GPU can no longer be reading its model
    pub fn remove_object(&mut self, id: ObjectId) -> Result<Option<GameObject>> {
        if self.scene.get(id).is_none() {
            return Ok(None);
        }
        self.device
            .wait_idle()
            .context("Failed to wait for device idle before removing object")?;
        Ok(self.scene.remove(id))
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<S: SurfaceProvider, D: DeviceContext> Drop for FrameOrchestrator<S, D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during cleanup: {:?}", e);
        }
        self.free_command_buffers();
    }
}
