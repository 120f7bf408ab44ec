// Vertex model - static vertex list in a host-visible buffer

use anyhow::{ensure, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::mem::offset_of;
use std::sync::Arc;

use super::buffer::create_buffer_with_data;
use super::VulkanDevice;
use crate::scene::Model;

/// Interleaved 2D position + color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec2,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(position: Vec2, color: Vec3) -> Self {
        Self { position, color }
    }

    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()]
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            // Position (location 0)
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(Vertex, position) as u32)
                .build(),
            // Color (location 1)
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, color) as u32)
                .build(),
        ]
    }
}

/// Vertex buffer owned by one or more scene objects (through `Rc`)
pub struct VertexModel {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    vertex_count: u32,
    device: Arc<VulkanDevice>,
}

impl VertexModel {
    pub fn new(device: Arc<VulkanDevice>, vertices: &[Vertex]) -> Result<Self> {
        validate_vertex_count(vertices.len())?;

        let (buffer, memory) =
            create_buffer_with_data(&device, vk::BufferUsageFlags::VERTEX_BUFFER, vertices)?;

        Ok(Self {
            buffer,
            memory,
            vertex_count: vertices.len() as u32,
            device,
        })
    }

    /// The single triangle every demo object shares
    pub fn triangle(device: Arc<VulkanDevice>) -> Result<Self> {
        Self::new(
            device,
            &[
                Vertex::new(Vec2::new(0.0, -0.5), Vec3::new(1.0, 0.0, 0.0)),
                Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
                Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
            ],
        )
    }
}

/// A drawable model needs at least one triangle
pub fn validate_vertex_count(count: usize) -> Result<()> {
    ensure!(count >= 3, "Model needs at least 3 vertices, got {}", count);
    Ok(())
}

impl Model for VertexModel {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.buffer
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl Drop for VertexModel {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.buffer, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);

        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 8);
        assert_eq!(Vertex::binding_descriptions()[0].stride, 20);
    }

    #[test]
    fn fewer_than_three_vertices_are_rejected() {
        let err = validate_vertex_count(0).unwrap_err();
        assert_eq!(err.to_string(), "Model needs at least 3 vertices, got 0");
        assert!(validate_vertex_count(2).is_err());
        assert!(validate_vertex_count(3).is_ok());
    }
}
