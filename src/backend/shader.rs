// Shader module loading
//
// Vulkan consumes SPIR-V bytecode. Shaders are compiled by build.rs and read
// from disk when a pipeline is built, so a rebuilt .spv is picked up on the
// next swapchain recreation without restarting.

use anyhow::{Context, Result};
use ash::vk;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use super::VulkanDevice;

/// Shader module destroyed on drop (it is only needed until the pipeline exists)
pub struct ShaderModule {
    handle: vk::ShaderModule,
    device: Arc<VulkanDevice>,
}

impl ShaderModule {
    /// Load a SPIR-V file and create a shader module
    pub fn from_path(device: &Arc<VulkanDevice>, path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open shader {}", path.display()))?;
        let code = read_spirv(&mut file)
            .with_context(|| format!("Invalid SPIR-V in {}", path.display()))?;

        Self::from_words(device, &code)
    }

    pub fn from_words(device: &Arc<VulkanDevice>, code: &[u32]) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let handle = unsafe { device.device.create_shader_module(&create_info, None) }
            .context("Failed to create shader module")?;

        Ok(Self {
            handle,
            device: device.clone(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_shader_module(self.handle, None) };
    }
}

/// Read SPIR-V words (ash takes care of alignment and byte order)
pub fn read_spirv<R: std::io::Read + std::io::Seek>(reader: &mut R) -> Result<Vec<u32>> {
    let words = ash::util::read_spv(reader)?;
    anyhow::ensure!(!words.is_empty(), "SPIR-V file is empty");
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn reads_aligned_words() {
        let mut bytes = Vec::new();
        for word in [SPIRV_MAGIC, 0x0001_0000, 7] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }

        let words = read_spirv(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000, 7]);
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = vec![0x03, 0x02, 0x23, 0x07, 0x00];
        assert!(read_spirv(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(read_spirv(&mut Cursor::new(Vec::<u8>::new())).is_err());
    }
}
