//! Recording stand-ins for the driver and the memory allocator.

use core::cell::{Cell, RefCell};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ash::vk::{self, Handle};

use crate::arena::{Allocation, AllocationError, DedicatedAllocation, DedicatedRequirements, MemoryAllocator};
use crate::image::ImageCreateInfo;
use crate::native::{MemoryAllocateRequest, MemoryRequirements, NativeDevice, NativeViewCreateInfo, RawShareHandle};

static VRAM_COUNTERS: Mutex<()> = Mutex::new(());

/// Tests that allocate device-local memory through the arena allocator hold
/// this, so the process-wide vram counters only change under one of them.
pub(crate) fn lock_vram_counters() -> MutexGuard<'static, ()> {
    VRAM_COUNTERS.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub(crate) struct MockDevice {
    next_handle: Cell<u64>,
    pub created_images: RefCell<Vec<(vk::Image, ImageCreateInfo, vk::ExternalMemoryHandleTypeFlags)>>,
    pub destroyed_images: RefCell<Vec<vk::Image>>,
    pub allocations: RefCell<Vec<(vk::DeviceMemory, MemoryAllocateRequest)>>,
    pub freed_memory: RefCell<Vec<vk::DeviceMemory>>,
    pub bindings: RefCell<Vec<(vk::Image, vk::DeviceMemory, vk::DeviceSize)>>,
    pub share_handle_requests: RefCell<Vec<(vk::DeviceMemory, vk::ExternalMemoryHandleTypeFlags)>>,
    pub created_views: RefCell<Vec<(vk::ImageView, NativeViewCreateInfo)>>,
    pub destroyed_views: RefCell<Vec<vk::ImageView>>,

    pub requirements: Cell<MemoryRequirements>,
    pub fail_image_creation: Cell<Option<vk::Result>>,
    pub fail_allocation: Cell<Option<vk::Result>>,
    pub fail_binding: Cell<Option<vk::Result>>,
    pub fail_share_handle: Cell<Option<vk::Result>>,
    /// Number of view creations that succeed before the rest fail.
    pub fail_view_creation_after: Cell<Option<usize>>,
}

impl MockDevice {
    pub fn with_requirements(size: vk::DeviceSize, alignment: vk::DeviceSize) -> MockDevice {
        let device = MockDevice::default();
        device.requirements.set(MemoryRequirements {
            requirements: vk::MemoryRequirements {
                size,
                alignment,
                memory_type_bits: !0,
            },
            prefers_dedicated: false,
            requires_dedicated: false,
        });
        device
    }

    fn next_raw_handle(&self) -> u64 {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        handle
    }

    pub fn live_images(&self) -> usize {
        self.created_images.borrow().len() - self.destroyed_images.borrow().len()
    }

    pub fn live_views(&self) -> usize {
        self.created_views.borrow().len() - self.destroyed_views.borrow().len()
    }

    pub fn live_memory(&self) -> usize {
        self.allocations.borrow().len() - self.freed_memory.borrow().len()
    }
}

impl NativeDevice for MockDevice {
    fn create_image(
        &self,
        info: &ImageCreateInfo,
        external_handle_types: vk::ExternalMemoryHandleTypeFlags,
    ) -> Result<vk::Image, vk::Result> {
        if let Some(err) = self.fail_image_creation.get() {
            return Err(err);
        }
        let image = vk::Image::from_raw(self.next_raw_handle());
        self.created_images.borrow_mut().push((image, info.clone(), external_handle_types));
        Ok(image)
    }

    fn destroy_image(&self, image: vk::Image) {
        self.destroyed_images.borrow_mut().push(image);
    }

    fn image_memory_requirements(&self, _image: vk::Image) -> MemoryRequirements {
        self.requirements.get()
    }

    fn allocate_memory(&self, request: &MemoryAllocateRequest) -> Result<vk::DeviceMemory, vk::Result> {
        if let Some(err) = self.fail_allocation.get() {
            return Err(err);
        }
        let memory = vk::DeviceMemory::from_raw(self.next_raw_handle());
        self.allocations.borrow_mut().push((memory, *request));
        Ok(memory)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.freed_memory.borrow_mut().push(memory);
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> Result<(), vk::Result> {
        if let Some(err) = self.fail_binding.get() {
            return Err(err);
        }
        self.bindings.borrow_mut().push((image, memory, offset));
        Ok(())
    }

    fn memory_share_handle(
        &self,
        memory: vk::DeviceMemory,
        handle_type: vk::ExternalMemoryHandleTypeFlags,
    ) -> Result<RawShareHandle, vk::Result> {
        self.share_handle_requests.borrow_mut().push((memory, handle_type));
        match self.fail_share_handle.get() {
            Some(err) => Err(err),
            None => Ok(memory.as_raw() as RawShareHandle + 1000),
        }
    }

    fn create_image_view(&self, info: &NativeViewCreateInfo) -> Result<vk::ImageView, vk::Result> {
        if let Some(successes) = self.fail_view_creation_after.get() {
            if self.created_views.borrow().len() >= successes {
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
        }
        let view = vk::ImageView::from_raw(self.next_raw_handle());
        self.created_views.borrow_mut().push((view, *info));
        Ok(view)
    }

    fn destroy_image_view(&self, image_view: vk::ImageView) {
        self.destroyed_views.borrow_mut().push(image_view);
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct AllocRequest {
    pub requirements: vk::MemoryRequirements,
    pub dedicated: DedicatedRequirements,
    pub dedicated_info: DedicatedAllocation,
    pub flags: vk::MemoryPropertyFlags,
    pub priority: f32,
}

pub(crate) struct MockAllocator {
    next_handle: Cell<u64>,
    pub granularity: vk::DeviceSize,
    pub sharing: bool,
    pub fail: Cell<bool>,
    pub requests: RefCell<Vec<AllocRequest>>,
    pub freed: RefCell<Vec<vk::DeviceMemory>>,
}

impl MockAllocator {
    pub fn new(granularity: vk::DeviceSize, sharing: bool) -> MockAllocator {
        MockAllocator {
            next_handle: Cell::new(0x1000),
            granularity,
            sharing,
            fail: Cell::new(false),
            requests: RefCell::new(Vec::new()),
            freed: RefCell::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> AllocRequest {
        *self.requests.borrow().last().expect("no allocation was requested")
    }
}

impl MemoryAllocator for MockAllocator {
    fn alloc(
        &self,
        requirements: &vk::MemoryRequirements,
        dedicated: DedicatedRequirements,
        dedicated_info: &DedicatedAllocation,
        flags: vk::MemoryPropertyFlags,
        priority: f32,
    ) -> Result<Allocation, AllocationError> {
        self.requests.borrow_mut().push(AllocRequest {
            requirements: *requirements,
            dedicated,
            dedicated_info: *dedicated_info,
            flags,
            priority,
        });
        if self.fail.get() {
            return Err(AllocationError::Allocate(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, 0, crate::Bytes(requirements.size)));
        }
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        Ok(Allocation {
            memory: vk::DeviceMemory::from_raw(handle),
            offset: 0,
            size: requirements.size,
            dedicated: dedicated.requires_dedicated,
        })
    }

    fn free(&self, allocation: Allocation) {
        self.freed.borrow_mut().push(allocation.memory);
    }

    fn buffer_image_granularity(&self) -> vk::DeviceSize {
        self.granularity
    }

    fn supports_resource_sharing(&self) -> bool {
        self.sharing
    }
}
