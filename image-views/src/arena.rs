//! The device memory allocator interface images are created against.
use ash::vk;

use crate::native::RawShareHandle;

pub(crate) mod pool;

#[derive(thiserror::Error, Debug)]
pub enum AllocationError {
    #[error("no memory type with the required flags (type bits: {0:#b}, flags: {1:?})")]
    MissingMemoryType(u32, vk::MemoryPropertyFlags),
    #[error("no heap with specified flags has enough memory (flags: {0:?}, size: {1})")]
    HeapsOutOfMemory(vk::MemoryPropertyFlags, crate::Bytes),
    #[error("vulkan memory allocation failed (type index: {1}, size: {2})")]
    Allocate(#[source] vk::Result, u32, crate::Bytes),
}

/// The dedicated allocation hints of a resource, after any overrides by the
/// caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DedicatedRequirements {
    pub prefers_dedicated: bool,
    pub requires_dedicated: bool,
}

/// Memory to be shared with another process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExternalMemory {
    /// Allocate new memory that can be exported as `handle_type`.
    Export { handle_type: vk::ExternalMemoryHandleTypeFlags },
    /// Back the allocation with memory another process exported.
    Import {
        handle_type: vk::ExternalMemoryHandleTypeFlags,
        handle: RawShareHandle,
    },
}

impl ExternalMemory {
    pub fn handle_type(&self) -> vk::ExternalMemoryHandleTypeFlags {
        match *self {
            ExternalMemory::Export { handle_type } | ExternalMemory::Import { handle_type, .. } => handle_type,
        }
    }
}

/// What a dedicated allocation would be dedicated to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedicatedAllocation {
    pub image: vk::Image,
    /// Only ever set together with a dedicated allocation, since the
    /// allocation itself is what gets shared.
    pub external: Option<ExternalMemory>,
}

/// A range of device memory handed out by a [`MemoryAllocator`]. Must be
/// given back with [`MemoryAllocator::free`].
#[derive(Debug, PartialEq, Eq)]
pub struct Allocation {
    pub memory: vk::DeviceMemory,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
    /// True if `memory` was allocated for this resource alone.
    pub dedicated: bool,
}

pub trait MemoryAllocator {
    /// Allocates memory fulfilling `requirements` with the property `flags`.
    /// `priority` is a hint between 0.0 and 1.0.
    fn alloc(
        &self,
        requirements: &vk::MemoryRequirements,
        dedicated: DedicatedRequirements,
        dedicated_info: &DedicatedAllocation,
        flags: vk::MemoryPropertyFlags,
        priority: f32,
    ) -> Result<Allocation, AllocationError>;

    fn free(&self, allocation: Allocation);

    /// The granularity at which linear and non-linear resources may not share
    /// memory pages.
    fn buffer_image_granularity(&self) -> vk::DeviceSize;

    /// Whether memory can be exported to and imported from other processes.
    fn supports_resource_sharing(&self) -> bool;
}
