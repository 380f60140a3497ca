//! The Vulkan entry points images and views are built on.
//!
//! Everything in this crate talks to the driver through [`NativeDevice`], so
//! that image and view construction can run against [`AshDevice`] in
//! production and against a recording device in tests.
//!
//! [`AshDevice`]: ash_device::AshDevice

use ash::vk;

use crate::arena::ExternalMemory;
use crate::image::ImageCreateInfo;

pub(crate) mod ash_device;

/// A platform handle for cross-process memory sharing: a file descriptor on
/// unix, a `HANDLE` on windows.
pub type RawShareHandle = isize;

/// Memory requirements of an image, including the dedicated allocation hints
/// from `VkMemoryDedicatedRequirements`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryRequirements {
    pub requirements: vk::MemoryRequirements,
    pub prefers_dedicated: bool,
    pub requires_dedicated: bool,
}

/// Parameters for a single `vkAllocateMemory` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryAllocateRequest {
    pub size: vk::DeviceSize,
    pub memory_type_index: u32,
    /// Set for dedicated allocations, chained as `VkMemoryDedicatedAllocateInfo`.
    pub dedicated_image: Option<vk::Image>,
    /// Chained as `VkExportMemoryAllocateInfo` or an import info struct.
    pub external: Option<ExternalMemory>,
    /// Chained as `VkMemoryPriorityAllocateInfoEXT`.
    pub priority: Option<f32>,
}

/// Parameters for a single `vkCreateImageView` call.
#[derive(Clone, Copy, Debug)]
pub struct NativeViewCreateInfo {
    pub image: vk::Image,
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub components: vk::ComponentMapping,
    pub subresource_range: vk::ImageSubresourceRange,
    /// Chained as `VkImageViewUsageCreateInfo`.
    pub usage: vk::ImageUsageFlags,
}

pub trait NativeDevice {
    /// Creates the image described by `info`. The format list is chained if
    /// `info.view_formats` is not empty, and `external_handle_types` is
    /// chained as `VkExternalMemoryImageCreateInfo` if not empty.
    fn create_image(
        &self,
        info: &ImageCreateInfo,
        external_handle_types: vk::ExternalMemoryHandleTypeFlags,
    ) -> Result<vk::Image, vk::Result>;
    fn destroy_image(&self, image: vk::Image);
    fn image_memory_requirements(&self, image: vk::Image) -> MemoryRequirements;

    fn allocate_memory(&self, request: &MemoryAllocateRequest) -> Result<vk::DeviceMemory, vk::Result>;
    fn free_memory(&self, memory: vk::DeviceMemory);
    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> Result<(), vk::Result>;
    /// Exports `memory` as a platform handle of type `handle_type`.
    fn memory_share_handle(
        &self,
        memory: vk::DeviceMemory,
        handle_type: vk::ExternalMemoryHandleTypeFlags,
    ) -> Result<RawShareHandle, vk::Result>;

    fn create_image_view(&self, info: &NativeViewCreateInfo) -> Result<vk::ImageView, vk::Result>;
    fn destroy_image_view(&self, image_view: vk::ImageView);
}
