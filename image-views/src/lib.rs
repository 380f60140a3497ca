//! Image, memory and image view management for translating a legacy 3D API's
//! resource views onto Vulkan.
//!
//! The three main pieces are [`Image`] (creation and memory binding),
//! [`ImageView`] (the set of native views a single legacy view needs), and
//! the descriptor resolvers in [`descriptors`], which turn partially
//! specified legacy view descriptors into fully resolved ones.

extern crate alloc;

// public-facing modules:

mod vram_usage {
    use core::sync::atomic::{AtomicU64, Ordering};
    pub(crate) static ALLOCATED: AtomicU64 = AtomicU64::new(0);
    pub(crate) static IN_USE: AtomicU64 = AtomicU64::new(0);
    pub(crate) static ALLOCATED_PEAK: AtomicU64 = AtomicU64::new(0);

    pub fn get_allocated_vram() -> u64 {
        ALLOCATED.load(Ordering::Relaxed)
    }
    pub fn get_allocated_vram_in_use() -> u64 {
        IN_USE.load(Ordering::Relaxed)
    }
    pub fn get_allocated_vram_peak() -> u64 {
        ALLOCATED_PEAK.load(Ordering::Relaxed)
    }

    pub(crate) fn add_allocated(size: u64) {
        let allocated = ALLOCATED.fetch_add(size, Ordering::Relaxed) + size;
        ALLOCATED_PEAK.fetch_max(allocated, Ordering::Relaxed);
    }
}
pub use vram_usage::{get_allocated_vram, get_allocated_vram_in_use, get_allocated_vram_peak};

mod display_utils {
    use core::fmt::{Display, Formatter, Result};

    /// Wrapper around u64 for pretty-printing byte amount with the appropriate
    /// size prefix (KiB, MiB, etc.).
    #[derive(Debug)]
    pub struct Bytes(pub u64);

    impl Display for Bytes {
        fn fmt(&self, fmt: &mut Formatter) -> Result {
            const KIBI: u64 = 1_024;
            const MEBI: u64 = KIBI * KIBI;
            const GIBI: u64 = MEBI * KIBI;
            const TIBI: u64 = GIBI * KIBI;
            match self.0 {
                bytes if bytes < KIBI => write!(fmt, "{:.0} bytes", bytes as f32),
                bytes if bytes < MEBI => write!(fmt, "{:.2} KiB", bytes as f32 / KIBI as f32),
                bytes if bytes < GIBI => write!(fmt, "{:.2} MiB", bytes as f32 / MEBI as f32),
                bytes if bytes < TIBI => write!(fmt, "{:.2} GiB", bytes as f32 / GIBI as f32),
                bytes => write!(fmt, "{:.3} TiB", bytes as f32 / TIBI as f32),
            }
        }
    }
}
pub use display_utils::*;

pub use ash::vk;

mod native;
pub use native::ash_device::AshDevice;
pub use native::{MemoryAllocateRequest, MemoryRequirements, NativeDevice, NativeViewCreateInfo, RawShareHandle};

mod arena;
pub use arena::pool::{ArenaAllocator, ArenaAllocatorSettings, DeviceMemoryInfo};
pub use arena::{Allocation, AllocationError, DedicatedAllocation, DedicatedRequirements, ExternalMemory, MemoryAllocator};

mod image;
pub use image::{Image, ImageBacking, ImageCreateInfo, ImageDiagnostic, ImageError, SharingInfo};

mod image_view;
pub use image_view::{ImageView, ImageViewCreateInfo, ImageViewError, NativeView, NativeViewType};

pub mod descriptors;

#[cfg(test)]
mod test_device;
