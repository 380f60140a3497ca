use alloc::rc::Rc;
use core::fmt::{self, Display, Formatter};
use core::mem;

use ash::vk;

use crate::arena::{Allocation, AllocationError, DedicatedAllocation, DedicatedRequirements, ExternalMemory, MemoryAllocator};
use crate::native::{NativeDevice, RawShareHandle};

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("failed to create {info} (probably out of host or device memory, or unsupported parameters)")]
    ImageCreation {
        #[source]
        source: vk::Result,
        info: String,
    },
    #[error("failed to allocate memory for image")]
    Allocation(#[source] AllocationError),
    #[error("failed to bind image to device memory (probably out of host or device memory)")]
    MemoryBinding(#[source] vk::Result),
}

/// Non-fatal conditions encountered while creating an [`Image`]. The image is
/// fully usable, just without cross-process sharing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageDiagnostic {
    /// Sharing was requested, but the allocator does not support it, so a
    /// regular image was created instead.
    SharingUnsupported,
    /// The memory was allocated as exportable, but the driver did not hand
    /// out a handle for it.
    ShareHandleUnavailable {
        handle_type: vk::ExternalMemoryHandleTypeFlags,
        result: vk::Result,
    },
}

impl Display for ImageDiagnostic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ImageDiagnostic::SharingUnsupported => write!(f, "resource sharing is not supported, created a non-shared image"),
            ImageDiagnostic::ShareHandleUnavailable { handle_type, result } => {
                write!(f, "failed to get a {handle_type:?} handle for the image's memory: {result}")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SharingInfo {
    #[default]
    None,
    /// Allocate the image's memory so that it can be exported as `handle_type`.
    Export { handle_type: vk::ExternalMemoryHandleTypeFlags },
    /// Bind the image to memory exported by another process.
    Import {
        handle_type: vk::ExternalMemoryHandleTypeFlags,
        handle: RawShareHandle,
    },
}

impl SharingInfo {
    pub fn is_shared(&self) -> bool {
        !matches!(self, SharingInfo::None)
    }

    pub fn handle_type(&self) -> vk::ExternalMemoryHandleTypeFlags {
        self.external_memory().map_or(vk::ExternalMemoryHandleTypeFlags::empty(), |external| external.handle_type())
    }

    pub fn external_memory(&self) -> Option<ExternalMemory> {
        match *self {
            SharingInfo::None => None,
            SharingInfo::Export { handle_type } => Some(ExternalMemory::Export { handle_type }),
            SharingInfo::Import { handle_type, handle } => Some(ExternalMemory::Import { handle_type, handle }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    pub image_type: vk::ImageType,
    pub flags: vk::ImageCreateFlags,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    /// Formats views of this image may use, passed to the driver as a format
    /// list so it can keep compression enabled.
    pub view_formats: Vec<vk::Format>,
    pub sharing: SharingInfo,
}

impl Default for ImageCreateInfo {
    fn default() -> Self {
        ImageCreateInfo {
            image_type: vk::ImageType::TYPE_2D,
            flags: vk::ImageCreateFlags::empty(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::empty(),
            view_formats: Vec::new(),
            sharing: SharingInfo::None,
        }
    }
}

impl Display for ImageCreateInfo {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let vk::Extent3D { width, height, depth } = self.extent;
        write!(
            f,
            "{:?} image ({:?}, {width}x{height}x{depth}, {} mips, {} layers, {:?} samples, usage {:?}, {:?} tiling)",
            self.image_type, self.format, self.mip_levels, self.array_layers, self.samples, self.usage, self.tiling,
        )
    }
}

/// Who is responsible for an image's memory.
pub enum ImageBacking {
    /// Created by [`Image::create`]: the image handle and its memory are
    /// released when the image is dropped.
    Owned {
        allocation: Allocation,
        allocator: Rc<dyn MemoryAllocator>,
    },
    /// Created by [`Image::wrap`]: someone else owns the handle and its
    /// memory.
    Foreign,
}

impl fmt::Debug for ImageBacking {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ImageBacking::Owned { allocation, .. } => f.debug_struct("Owned").field("allocation", allocation).finish_non_exhaustive(),
            ImageBacking::Foreign => write!(f, "Foreign"),
        }
    }
}

const GPU_WRITABLE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::STORAGE.as_raw()
        | vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw()
        | vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT.as_raw(),
);

pub struct Image {
    handle: vk::Image,
    info: ImageCreateInfo,
    memory_flags: vk::MemoryPropertyFlags,
    backing: ImageBacking,
    share_handle: Option<RawShareHandle>,
    device: Rc<dyn NativeDevice>,
}

impl Drop for Image {
    fn drop(&mut self) {
        if let ImageBacking::Owned { allocation, allocator } = mem::replace(&mut self.backing, ImageBacking::Foreign) {
            profiling::scope!("vk::destroy_image");
            log::trace!("vk::destroy_image({:?})", self.handle);
            self.device.destroy_image(self.handle);
            allocator.free(allocation);
        }
    }
}

impl Image {
    /// Creates an image and binds freshly allocated (or, with
    /// [`SharingInfo::Import`], imported) memory to it.
    ///
    /// Any [`ImageDiagnostic`] returned alongside the image describes a
    /// sharing request that could not be honored.
    #[profiling::function]
    pub fn create(
        device: &Rc<dyn NativeDevice>,
        allocator: &Rc<dyn MemoryAllocator>,
        info: ImageCreateInfo,
        memory_flags: vk::MemoryPropertyFlags,
    ) -> Result<(Image, Option<ImageDiagnostic>), ImageError> {
        let sharing_supported = allocator.supports_resource_sharing();
        let shared = sharing_supported && info.sharing.is_shared();
        let mut diagnostic = None;
        if info.sharing.is_shared() && !sharing_supported {
            diagnostic = Some(ImageDiagnostic::SharingUnsupported);
        }

        let external_handle_types = if shared { info.sharing.handle_type() } else { vk::ExternalMemoryHandleTypeFlags::empty() };
        let handle = {
            profiling::scope!("vk::create_image");
            log::trace!("vk::create_image({info})");
            device
                .create_image(&info, external_handle_types)
                .map_err(|source| ImageError::ImageCreation { source, info: info.to_string() })?
        };

        let memory_requirements = device.image_memory_requirements(handle);
        let mut requirements = memory_requirements.requirements;
        let mut dedicated = DedicatedRequirements {
            prefers_dedicated: memory_requirements.prefers_dedicated,
            requires_dedicated: memory_requirements.requires_dedicated,
        };
        if shared {
            // The allocation is the unit that gets shared, it can't be a sub-range of a pooled block.
            dedicated.prefers_dedicated = true;
            dedicated.requires_dedicated = true;
        }

        // Non-linear images must not share a bufferImageGranularity-sized page
        // with linear resources, which the plain alignment may not guarantee.
        if info.tiling != vk::ImageTiling::LINEAR {
            let granularity = allocator.buffer_image_granularity().max(1);
            requirements.size = requirements.size.next_multiple_of(granularity);
            requirements.alignment = requirements.alignment.next_multiple_of(granularity);
        }

        let priority = if info.usage.intersects(GPU_WRITABLE_USAGE) { 1.0 } else { 0.5 };
        let dedicated_info = DedicatedAllocation {
            image: handle,
            external: if shared { info.sharing.external_memory() } else { None },
        };

        let allocation = match allocator.alloc(&requirements, dedicated, &dedicated_info, memory_flags, priority) {
            Ok(allocation) => allocation,
            Err(err) => {
                device.destroy_image(handle);
                return Err(ImageError::Allocation(err));
            }
        };

        log::trace!("vk::bind_image_memory({:?}, {:?}, offset {})", handle, allocation.memory, allocation.offset);
        if let Err(err) = device.bind_image_memory(handle, allocation.memory, allocation.offset) {
            allocator.free(allocation);
            device.destroy_image(handle);
            return Err(ImageError::MemoryBinding(err));
        }

        let mut share_handle = None;
        if let (true, SharingInfo::Export { handle_type }) = (shared, info.sharing) {
            match device.memory_share_handle(allocation.memory, handle_type) {
                Ok(handle) => share_handle = Some(handle),
                Err(result) => diagnostic = Some(ImageDiagnostic::ShareHandleUnavailable { handle_type, result }),
            }
        }

        let image = Image {
            handle,
            info,
            memory_flags,
            backing: ImageBacking::Owned {
                allocation,
                allocator: allocator.clone(),
            },
            share_handle,
            device: device.clone(),
        };
        Ok((image, diagnostic))
    }

    /// Wraps an image someone else created and bound memory for, e.g. a
    /// swapchain image. The handle is not destroyed when this is dropped.
    pub fn wrap(device: &Rc<dyn NativeDevice>, info: ImageCreateInfo, handle: vk::Image) -> Image {
        Image {
            handle,
            info,
            memory_flags: vk::MemoryPropertyFlags::empty(),
            backing: ImageBacking::Foreign,
            share_handle: None,
            device: device.clone(),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn info(&self) -> &ImageCreateInfo {
        &self.info
    }

    pub fn memory_flags(&self) -> vk::MemoryPropertyFlags {
        self.memory_flags
    }

    pub fn backing(&self) -> &ImageBacking {
        &self.backing
    }

    pub fn allocation(&self) -> Option<&Allocation> {
        match &self.backing {
            ImageBacking::Owned { allocation, .. } => Some(allocation),
            ImageBacking::Foreign => None,
        }
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self.backing, ImageBacking::Foreign)
    }

    /// The exported handle, if the image was created with
    /// [`SharingInfo::Export`] and the driver provided one.
    pub fn share_handle(&self) -> Option<RawShareHandle> {
        self.share_handle
    }

    pub(crate) fn device(&self) -> &Rc<dyn NativeDevice> {
        &self.device
    }

    /// The extent of the given mip level.
    pub fn mip_level_extent(&self, level: u32) -> vk::Extent3D {
        let shrink = |size: u32| size.checked_shr(level).unwrap_or(0).max(1);
        let vk::Extent3D { width, height, depth } = self.info.extent;
        vk::Extent3D {
            width: shrink(width),
            height: shrink(height),
            depth: shrink(depth),
        }
    }
}
