// Model - shared geometry drawn by scene objects

use ash::vk;

use crate::render::CommandRecorder;

/// A vertex buffer and the number of vertices to draw from it.
///
/// Implementations reject fewer than three vertices at construction time.
pub trait Model {
    fn vertex_buffer(&self) -> vk::Buffer;
    fn vertex_count(&self) -> u32;

    fn bind(&self, recorder: &dyn CommandRecorder, cmd: vk::CommandBuffer) {
        recorder.bind_vertex_buffer(cmd, self.vertex_buffer());
    }

    fn draw(&self, recorder: &dyn CommandRecorder, cmd: vk::CommandBuffer) {
        recorder.draw(cmd, self.vertex_count());
    }
}
