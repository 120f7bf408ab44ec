// Test doubles for the render seams.
//
// Every stub shares one `Shared` block: a script the test fills in ahead of
// time, and a log the test inspects afterwards.

use anyhow::{bail, Result};
use ash::vk::{self, Handle};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::{
    CommandRecorder, DeviceContext, Extent, GraphicsPipeline, PresentStatus, PresentationChain,
    PushConstantData, RenderPassBegin, SurfaceProvider,
};
use crate::scene::Model;

const DEFAULT_IMAGE_COUNT: usize = 3;

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Begin(vk::CommandBuffer),
    End(vk::CommandBuffer),
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: Extent,
        clear_depth: f32,
    },
    EndRenderPass,
    SetViewport(Extent),
    SetScissor(Extent),
    BindPipeline(vk::Pipeline),
    PushConstants(PushConstantData),
    BindVertexBuffer(vk::Buffer),
    Draw(u32),
}

/// Device-level events, in the order they happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    WaitIdle,
    ChainCreated,
    ChainDropped,
    ModelDropped,
}

/// Responses handed out in order; an empty queue means "all good"
#[derive(Default)]
pub(crate) struct Script {
    pub acquire: VecDeque<Result<(u32, PresentStatus)>>,
    pub present: VecDeque<Result<PresentStatus>>,
    pub image_counts: VecDeque<usize>,
    pub fail_chain_creation: bool,
    pub fail_begin: bool,
}

#[derive(Default)]
pub(crate) struct Log {
    pub calls: Vec<Call>,
    pub lifecycle: Vec<Lifecycle>,
    /// Extent of each chain built, and whether it was seeded from a previous one
    pub chains_created: Vec<(Extent, bool)>,
    pub chains_dropped: usize,
    pub allocations: Vec<usize>,
    pub frees: Vec<Vec<vk::CommandBuffer>>,
    pub pipelines_created: Vec<vk::RenderPass>,
    pub wait_idle: usize,
    pub presents: usize,
}

pub(crate) struct Shared {
    pub script: RefCell<Script>,
    pub log: RefCell<Log>,
    next_handle: Cell<u64>,
}

impl Shared {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            script: RefCell::new(Script::default()),
            log: RefCell::new(Log::default()),
            next_handle: Cell::new(1),
        })
    }

    fn handle(&self) -> u64 {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        handle
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().calls.push(call);
    }

    fn lifecycle(&self, event: Lifecycle) {
        self.log.borrow_mut().lifecycle.push(event);
    }
}

pub(crate) struct StubDevice {
    shared: Rc<Shared>,
}

impl StubDevice {
    pub fn new(shared: Rc<Shared>) -> Self {
        Self { shared }
    }
}

impl CommandRecorder for StubDevice {
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        if self.shared.script.borrow().fail_begin {
            bail!("ERROR_OUT_OF_HOST_MEMORY");
        }
        self.shared.record(Call::Begin(cmd));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.shared.record(Call::End(cmd));
        Ok(())
    }

    fn begin_render_pass(&self, _cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        self.shared.record(Call::BeginRenderPass {
            render_pass: begin.render_pass,
            framebuffer: begin.framebuffer,
            extent: begin.extent,
            clear_depth: begin.clear_depth,
        });
    }

    fn end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.shared.record(Call::EndRenderPass);
    }

    fn set_viewport(&self, _cmd: vk::CommandBuffer, extent: Extent) {
        self.shared.record(Call::SetViewport(extent));
    }

    fn set_scissor(&self, _cmd: vk::CommandBuffer, extent: Extent) {
        self.shared.record(Call::SetScissor(extent));
    }

    fn bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.shared.record(Call::BindPipeline(pipeline));
    }

    fn push_constants(
        &self,
        _cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        data: &PushConstantData,
    ) {
        self.shared.record(Call::PushConstants(*data));
    }

    fn bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        self.shared.record(Call::BindVertexBuffer(buffer));
    }

    fn draw(&self, _cmd: vk::CommandBuffer, vertex_count: u32) {
        self.shared.record(Call::Draw(vertex_count));
    }
}

impl DeviceContext for StubDevice {
    type Chain = StubChain;
    type Pipeline = StubPipeline;

    fn wait_idle(&self) -> Result<()> {
        self.shared.log.borrow_mut().wait_idle += 1;
        self.shared.lifecycle(Lifecycle::WaitIdle);
        Ok(())
    }

    fn allocate_command_buffers(&self, count: usize) -> Result<Vec<vk::CommandBuffer>> {
        self.shared.log.borrow_mut().allocations.push(count);
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(self.shared.handle()))
            .collect())
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        self.shared.log.borrow_mut().frees.push(buffers.to_vec());
    }

    fn create_presentation_chain(
        &self,
        extent: Extent,
        previous: Option<StubChain>,
    ) -> Result<StubChain> {
        if self.shared.script.borrow().fail_chain_creation {
            bail!("ERROR_SURFACE_LOST_KHR");
        }
        self.shared
            .log
            .borrow_mut()
            .chains_created
            .push((extent, previous.is_some()));
        self.shared.lifecycle(Lifecycle::ChainCreated);

        let image_count = self
            .shared
            .script
            .borrow_mut()
            .image_counts
            .pop_front()
            .unwrap_or(DEFAULT_IMAGE_COUNT);
        let chain = StubChain {
            shared: self.shared.clone(),
            extent,
            render_pass: vk::RenderPass::from_raw(self.shared.handle()),
            framebuffers: (0..image_count)
                .map(|_| vk::Framebuffer::from_raw(self.shared.handle()))
                .collect(),
        };
        drop(previous);
        Ok(chain)
    }

    fn create_pipeline(&self, render_pass: vk::RenderPass) -> Result<StubPipeline> {
        self.shared.log.borrow_mut().pipelines_created.push(render_pass);
        Ok(StubPipeline {
            handle: vk::Pipeline::from_raw(self.shared.handle()),
            layout: vk::PipelineLayout::from_raw(self.shared.handle()),
        })
    }
}

pub(crate) struct StubChain {
    shared: Rc<Shared>,
    extent: Extent,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl PresentationChain for StubChain {
    fn acquire_next_image(&mut self) -> Result<(u32, PresentStatus)> {
        self.shared
            .script
            .borrow_mut()
            .acquire
            .pop_front()
            .unwrap_or(Ok((0, PresentStatus::Success)))
    }

    fn submit_and_present(
        &mut self,
        _cmd: vk::CommandBuffer,
        _image_index: u32,
    ) -> Result<PresentStatus> {
        self.shared.log.borrow_mut().presents += 1;
        self.shared
            .script
            .borrow_mut()
            .present
            .pop_front()
            .unwrap_or(Ok(PresentStatus::Success))
    }

    fn image_count(&self) -> usize {
        self.framebuffers.len()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    fn extent(&self) -> Extent {
        self.extent
    }
}

impl Drop for StubChain {
    fn drop(&mut self) {
        self.shared.log.borrow_mut().chains_dropped += 1;
        self.shared.lifecycle(Lifecycle::ChainDropped);
    }
}

pub(crate) struct StubPipeline {
    handle: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline for StubPipeline {
    fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

/// Surface whose extent follows a queue: each poll advances it by one entry,
/// and the last entry sticks.
pub(crate) struct StubSurface {
    extents: VecDeque<Extent>,
    pub polls: usize,
    pub waits: usize,
    pub resized: bool,
    pub close_after_polls: Option<usize>,
}

impl StubSurface {
    pub fn new(extents: impl IntoIterator<Item = Extent>) -> Self {
        let mut surface = Self {
            extents: VecDeque::new(),
            polls: 0,
            waits: 0,
            resized: false,
            close_after_polls: None,
        };
        surface.queue_extents(extents);
        surface
    }

    pub fn queue_extents(&mut self, extents: impl IntoIterator<Item = Extent>) {
        self.extents = extents.into_iter().collect();
        assert!(!self.extents.is_empty(), "stub surface needs an extent");
    }

    pub fn set_extent(&mut self, extent: Extent) {
        self.queue_extents([extent]);
    }
}

impl SurfaceProvider for StubSurface {
    fn extent(&self) -> Extent {
        self.extents[0]
    }

    fn poll_events(&mut self) {
        self.polls += 1;
        if self.extents.len() > 1 {
            self.extents.pop_front();
        }
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        self.poll_events();
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn should_close(&self) -> bool {
        self.close_after_polls
            .map_or(false, |limit| self.polls >= limit)
    }
}

pub(crate) struct StubModel {
    buffer: vk::Buffer,
    vertex_count: u32,
    shared: Option<Rc<Shared>>,
}

impl StubModel {
    pub fn new(buffer: u64, vertex_count: u32) -> Self {
        Self {
            buffer: vk::Buffer::from_raw(buffer),
            vertex_count,
            shared: None,
        }
    }

    /// A model that logs `ModelDropped` when its last owner lets go
    pub fn tracked(shared: &Rc<Shared>, buffer: u64, vertex_count: u32) -> Self {
        Self {
            buffer: vk::Buffer::from_raw(buffer),
            vertex_count,
            shared: Some(shared.clone()),
        }
    }
}

impl Drop for StubModel {
    fn drop(&mut self) {
        if let Some(shared) = &self.shared {
            shared.lifecycle(Lifecycle::ModelDropped);
        }
    }
}

impl Model for StubModel {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.buffer
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}
