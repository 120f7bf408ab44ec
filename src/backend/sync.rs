// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync. Each wrapper destroys its
// handle on drop.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::VulkanDevice;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: Semaphore,
    pub in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: &Arc<VulkanDevice>) -> Result<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?, // Start signaled
        })
    }
}

/// A binary semaphore
pub struct Semaphore {
    handle: vk::Semaphore,
    device: Arc<VulkanDevice>,
}

impl Semaphore {
    pub fn new(device: &Arc<VulkanDevice>) -> Result<Self> {
        let info = vk::SemaphoreCreateInfo::builder();
        let handle = unsafe { device.device.create_semaphore(&info, None) }
            .context("Failed to create semaphore")?;

        Ok(Self {
            handle,
            device: device.clone(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_semaphore(self.handle, None) };
    }
}

pub struct Fence {
    handle: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl Fence {
    pub fn new(device: &Arc<VulkanDevice>, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        let handle = unsafe { device.device.create_fence(&info, None) }
            .context("Failed to create fence")?;

        Ok(Self {
            handle,
            device: device.clone(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }

    /// Block until the fence is signaled
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device
                .device
                .wait_for_fences(&[self.handle], true, u64::MAX)
        }
        .context("Failed to wait for fence")
    }

    pub fn reset(&self) -> Result<()> {
        unsafe { self.device.device.reset_fences(&[self.handle]) }
            .context("Failed to reset fence")
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_fence(self.handle, None) };
    }
}
