use alloc::rc::Rc;
use core::cell::RefCell;
use core::sync::atomic::Ordering;

use ash::vk;
use hashbrown::HashMap;

use crate::arena::{Allocation, AllocationError, DedicatedAllocation, DedicatedRequirements, MemoryAllocator};
use crate::native::{MemoryAllocateRequest, NativeDevice};

/// The physical device properties the allocator needs.
#[derive(Clone, Copy, Debug)]
pub struct DeviceMemoryInfo {
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub buffer_image_granularity: vk::DeviceSize,
}

impl DeviceMemoryInfo {
    pub fn from_physical_device(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> DeviceMemoryInfo {
        profiling::scope!("query device memory properties");
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        DeviceMemoryInfo {
            memory_properties,
            buffer_image_granularity: properties.limits.buffer_image_granularity,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ArenaAllocatorSettings {
    /// Size of each block of device memory pooled allocations are made from.
    pub arena_size: vk::DeviceSize,
    /// Allocations larger than this always get their own memory.
    pub dedicated_threshold: vk::DeviceSize,
    /// Set if `VK_EXT_memory_priority` is enabled on the device.
    pub memory_priority: bool,
    /// Set if the external memory extensions are enabled on the device.
    pub resource_sharing: bool,
}

impl Default for ArenaAllocatorSettings {
    fn default() -> Self {
        const MEBI: vk::DeviceSize = 1024 * 1024;
        ArenaAllocatorSettings {
            arena_size: 64 * MEBI,
            dedicated_threshold: 32 * MEBI,
            memory_priority: false,
            resource_sharing: false,
        }
    }
}

struct MemoryArena {
    memory: vk::DeviceMemory,
    memory_type_index: u32,
    high_priority: bool,
    total_size: vk::DeviceSize,
    offset: vk::DeviceSize,
    live_allocations: usize,
    device_local: bool,
}

impl MemoryArena {
    fn fits(&self, size: vk::DeviceSize, alignment: vk::DeviceSize) -> bool {
        let offset = self.offset.next_multiple_of(alignment);
        offset <= self.total_size && self.total_size - offset >= size
    }
}

#[derive(Default)]
struct Arenas {
    arenas: Vec<MemoryArena>,
    by_memory: HashMap<vk::DeviceMemory, usize>,
    /// Sizes of dedicated allocations, and whether they are device local.
    dedicated: HashMap<vk::DeviceMemory, (vk::DeviceSize, bool)>,
}

/// Hands out dedicated allocations, and bump-allocates everything else from
/// arenas of device memory, one set of arenas per memory type and priority
/// class. An arena rewinds once every allocation made from it is freed.
pub struct ArenaAllocator {
    device: Rc<dyn NativeDevice>,
    memory_info: DeviceMemoryInfo,
    settings: ArenaAllocatorSettings,
    state: RefCell<Arenas>,
}

impl Drop for ArenaAllocator {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.dedicated.is_empty() {
            log::debug!("arena allocator dropped with {} dedicated allocations still alive", state.dedicated.len());
        }
        for (&memory, &(size, device_local)) in &state.dedicated {
            self.device.free_memory(memory);
            if device_local {
                crate::vram_usage::IN_USE.fetch_sub(size, Ordering::Relaxed);
                crate::vram_usage::ALLOCATED.fetch_sub(size, Ordering::Relaxed);
            }
        }
        for arena in &state.arenas {
            log::trace!("vk::free_memory({} bytes, index {})", arena.total_size, arena.memory_type_index);
            self.device.free_memory(arena.memory);
            if arena.device_local {
                crate::vram_usage::IN_USE.fetch_sub(arena.offset, Ordering::Relaxed);
                crate::vram_usage::ALLOCATED.fetch_sub(arena.total_size, Ordering::Relaxed);
            }
        }
    }
}

impl ArenaAllocator {
    pub fn new(device: Rc<dyn NativeDevice>, memory_info: DeviceMemoryInfo, settings: ArenaAllocatorSettings) -> ArenaAllocator {
        ArenaAllocator {
            device,
            memory_info,
            settings,
            state: RefCell::new(Arenas::default()),
        }
    }

    pub fn arena_count(&self) -> usize {
        self.state.borrow().arenas.len()
    }

    /// Bytes currently handed out from arenas, including alignment padding.
    pub fn pooled_memory_in_use(&self) -> vk::DeviceSize {
        self.state.borrow().arenas.iter().map(|arena| arena.offset).sum()
    }

    fn memory_type_index(
        &self,
        requirements: &vk::MemoryRequirements,
        flags: vk::MemoryPropertyFlags,
    ) -> Result<(u32, vk::MemoryPropertyFlags), AllocationError> {
        let props = &self.memory_info.memory_properties;
        let types = &props.memory_types[..props.memory_type_count as usize];
        let heaps = &props.memory_heaps[..props.memory_heap_count as usize];
        // Falling back to system memory beats failing outright.
        let fallback = flags & !vk::MemoryPropertyFlags::DEVICE_LOCAL;
        let mut valid_type_found = false;
        for wanted_flags in [flags, fallback] {
            for (i, memory_type) in types.iter().enumerate() {
                if requirements.memory_type_bits & (1 << i) == 0 || !memory_type.property_flags.contains(wanted_flags) {
                    continue;
                }
                valid_type_found = true;
                if heaps[memory_type.heap_index as usize].size >= requirements.size {
                    return Ok((i as u32, memory_type.property_flags));
                }
            }
        }

        if valid_type_found {
            Err(AllocationError::HeapsOutOfMemory(flags, crate::Bytes(requirements.size)))
        } else {
            Err(AllocationError::MissingMemoryType(requirements.memory_type_bits, flags))
        }
    }

    fn heap_size(&self, memory_type_index: u32) -> vk::DeviceSize {
        let props = &self.memory_info.memory_properties;
        let heap_index = props.memory_types[memory_type_index as usize].heap_index;
        props.memory_heaps[heap_index as usize].size
    }

    fn alloc_dedicated(
        &self,
        requirements: &vk::MemoryRequirements,
        dedicated_info: &DedicatedAllocation,
        memory_type_index: u32,
        device_local: bool,
        priority: f32,
    ) -> Result<Allocation, AllocationError> {
        let size = requirements.size;
        let request = MemoryAllocateRequest {
            size,
            memory_type_index,
            dedicated_image: Some(dedicated_info.image),
            external: dedicated_info.external,
            priority: self.settings.memory_priority.then_some(priority),
        };
        let memory = {
            profiling::scope!("vk::allocate_memory");
            log::trace!("vk::allocate_memory({} bytes, index {}, dedicated)", size, memory_type_index);
            self.device
                .allocate_memory(&request)
                .map_err(|err| AllocationError::Allocate(err, memory_type_index, crate::Bytes(size)))?
        };
        if device_local {
            crate::vram_usage::add_allocated(size);
            crate::vram_usage::IN_USE.fetch_add(size, Ordering::Relaxed);
        }
        self.state.borrow_mut().dedicated.insert(memory, (size, device_local));
        Ok(Allocation {
            memory,
            offset: 0,
            size,
            dedicated: true,
        })
    }

    fn alloc_pooled(
        &self,
        requirements: &vk::MemoryRequirements,
        memory_type_index: u32,
        device_local: bool,
        priority: f32,
    ) -> Result<Allocation, AllocationError> {
        let size = requirements.size;
        let alignment = requirements.alignment.max(1);
        let high_priority = priority > 0.5;
        let mut state = self.state.borrow_mut();

        let existing = state.arenas.iter().position(|arena| {
            arena.memory_type_index == memory_type_index && arena.high_priority == high_priority && arena.fits(size, alignment)
        });
        let arena_index = match existing {
            Some(index) => index,
            None => {
                let total_size = self.settings.arena_size;
                let request = MemoryAllocateRequest {
                    size: total_size,
                    memory_type_index,
                    dedicated_image: None,
                    external: None,
                    priority: self.settings.memory_priority.then_some(priority),
                };
                let memory = {
                    profiling::scope!("vk::allocate_memory");
                    log::trace!("vk::allocate_memory({} bytes, index {})", total_size, memory_type_index);
                    self.device
                        .allocate_memory(&request)
                        .map_err(|err| AllocationError::Allocate(err, memory_type_index, crate::Bytes(total_size)))?
                };
                log::debug!("opened a new {} arena for memory type {}", crate::Bytes(total_size), memory_type_index);
                if device_local {
                    crate::vram_usage::add_allocated(total_size);
                }
                let index = state.arenas.len();
                state.arenas.push(MemoryArena {
                    memory,
                    memory_type_index,
                    high_priority,
                    total_size,
                    offset: 0,
                    live_allocations: 0,
                    device_local,
                });
                state.by_memory.insert(memory, index);
                index
            }
        };

        let arena = &mut state.arenas[arena_index];
        let offset = arena.offset.next_multiple_of(alignment);
        let new_offset = offset + size;
        if arena.device_local {
            crate::vram_usage::IN_USE.fetch_add(new_offset - arena.offset, Ordering::Relaxed);
        }
        arena.offset = new_offset;
        arena.live_allocations += 1;

        Ok(Allocation {
            memory: arena.memory,
            offset,
            size,
            dedicated: false,
        })
    }
}

impl MemoryAllocator for ArenaAllocator {
    fn alloc(
        &self,
        requirements: &vk::MemoryRequirements,
        dedicated: DedicatedRequirements,
        dedicated_info: &DedicatedAllocation,
        flags: vk::MemoryPropertyFlags,
        priority: f32,
    ) -> Result<Allocation, AllocationError> {
        profiling::scope!("device memory allocation");
        let (memory_type_index, memory_flags) = self.memory_type_index(requirements, flags)?;
        let device_local = memory_flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL);

        // A heap that can't hold a whole arena still fits requests of their own size.
        let use_dedicated = dedicated.requires_dedicated
            || dedicated.prefers_dedicated
            || dedicated_info.external.is_some()
            || requirements.size > self.settings.dedicated_threshold
            || requirements.size > self.settings.arena_size
            || self.heap_size(memory_type_index) < self.settings.arena_size;
        if use_dedicated {
            self.alloc_dedicated(requirements, dedicated_info, memory_type_index, device_local, priority)
        } else {
            self.alloc_pooled(requirements, memory_type_index, device_local, priority)
        }
    }

    fn free(&self, allocation: Allocation) {
        let mut state = self.state.borrow_mut();
        if allocation.dedicated {
            let Some((_, device_local)) = state.dedicated.remove(&allocation.memory) else {
                log::error!("tried to free a dedicated allocation ({:?}) that was not made by this allocator", allocation.memory);
                return;
            };
            log::trace!("vk::free_memory({} bytes, dedicated)", allocation.size);
            self.device.free_memory(allocation.memory);
            if device_local {
                crate::vram_usage::IN_USE.fetch_sub(allocation.size, Ordering::Relaxed);
                crate::vram_usage::ALLOCATED.fetch_sub(allocation.size, Ordering::Relaxed);
            }
            return;
        }

        let Some(&index) = state.by_memory.get(&allocation.memory) else {
            log::error!("tried to free an allocation ({:?}) that was not made by this allocator", allocation.memory);
            return;
        };
        let arena = &mut state.arenas[index];
        arena.live_allocations = arena.live_allocations.saturating_sub(1);
        if arena.live_allocations == 0 {
            // Everything created from this arena no longer exists, so none of the memory is in use anymore.
            if arena.device_local {
                crate::vram_usage::IN_USE.fetch_sub(arena.offset, Ordering::Relaxed);
            }
            arena.offset = 0;
        }
    }

    fn buffer_image_granularity(&self) -> vk::DeviceSize {
        self.memory_info.buffer_image_granularity.max(1)
    }

    fn supports_resource_sharing(&self) -> bool {
        self.settings.resource_sharing
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;

    use ash::vk::{self, Handle};

    use super::{ArenaAllocator, ArenaAllocatorSettings, DeviceMemoryInfo};
    use crate::arena::{Allocation, AllocationError, DedicatedAllocation, DedicatedRequirements, ExternalMemory, MemoryAllocator};
    use crate::native::NativeDevice;
    use crate::test_device::{lock_vram_counters, MockDevice};
    use crate::{get_allocated_vram, get_allocated_vram_in_use, get_allocated_vram_peak};

    const DEVICE_LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST_VISIBLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;

    /// Type 0: device local on a 256 MiB heap, type 1: host visible on a 1 GiB heap.
    fn memory_info() -> DeviceMemoryInfo {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            memory_heap_count: 2,
            ..Default::default()
        };
        memory_properties.memory_types[0] = vk::MemoryType {
            property_flags: DEVICE_LOCAL,
            heap_index: 0,
        };
        memory_properties.memory_types[1] = vk::MemoryType {
            property_flags: HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            heap_index: 1,
        };
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: 256 << 20,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        memory_properties.memory_heaps[1] = vk::MemoryHeap {
            size: 1 << 30,
            flags: vk::MemoryHeapFlags::empty(),
        };
        DeviceMemoryInfo {
            memory_properties,
            buffer_image_granularity: 1024,
        }
    }

    fn allocator(settings: ArenaAllocatorSettings) -> (Rc<MockDevice>, ArenaAllocator) {
        let device = Rc::new(MockDevice::default());
        let native: Rc<dyn NativeDevice> = device.clone();
        (device, ArenaAllocator::new(native, memory_info(), settings))
    }

    fn requirements(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size,
            alignment,
            memory_type_bits: 0b11,
        }
    }

    fn not_dedicated() -> DedicatedAllocation {
        DedicatedAllocation {
            image: vk::Image::null(),
            external: None,
        }
    }

    #[test]
    fn pooled_allocations_share_an_arena() {
        let _vram = lock_vram_counters();
        let (device, allocator) = allocator(ArenaAllocatorSettings::default());
        let no_hints = DedicatedRequirements::default();
        let a = allocator.alloc(&requirements(1000, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        let b = allocator.alloc(&requirements(1000, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert_eq!(a.memory, b.memory);
        assert_eq!(0, a.offset);
        assert_eq!(1024, b.offset);
        assert!(!a.dedicated);
        assert_eq!(1, allocator.arena_count());
        assert_eq!(1, device.allocations.borrow().len());
        assert_eq!(0, device.allocations.borrow()[0].1.memory_type_index);
    }

    #[test]
    fn priority_classes_use_separate_arenas() {
        let _vram = lock_vram_counters();
        let (_device, allocator) = allocator(ArenaAllocatorSettings::default());
        let no_hints = DedicatedRequirements::default();
        let low = allocator.alloc(&requirements(64, 64), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        let high = allocator.alloc(&requirements(64, 64), no_hints, &not_dedicated(), DEVICE_LOCAL, 1.0).unwrap();
        assert_ne!(low.memory, high.memory);
        assert_eq!(2, allocator.arena_count());
    }

    #[test]
    fn arena_rewinds_when_everything_is_freed() {
        let _vram = lock_vram_counters();
        let (_device, allocator) = allocator(ArenaAllocatorSettings::default());
        let no_hints = DedicatedRequirements::default();
        let a = allocator.alloc(&requirements(4096, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        let b = allocator.alloc(&requirements(4096, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        allocator.free(a);
        assert_eq!(8192, allocator.pooled_memory_in_use());
        allocator.free(b);
        assert_eq!(0, allocator.pooled_memory_in_use());
        let c = allocator.alloc(&requirements(4096, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert_eq!(0, c.offset);
    }

    #[test]
    fn full_arena_opens_another() {
        let _vram = lock_vram_counters();
        let settings = ArenaAllocatorSettings {
            arena_size: 4096,
            dedicated_threshold: 4096,
            ..Default::default()
        };
        let (device, allocator) = allocator(settings);
        let no_hints = DedicatedRequirements::default();
        let a = allocator.alloc(&requirements(3000, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        let b = allocator.alloc(&requirements(3000, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert_ne!(a.memory, b.memory);
        assert_eq!(2, allocator.arena_count());
        drop(allocator);
        assert_eq!(0, device.live_memory());
    }

    #[test]
    fn dedicated_hints_get_their_own_memory() {
        let _vram = lock_vram_counters();
        let (device, allocator) = allocator(ArenaAllocatorSettings::default());
        let image = vk::Image::from_raw(42);
        let dedicated_info = DedicatedAllocation { image, external: None };
        let hints = DedicatedRequirements {
            prefers_dedicated: true,
            requires_dedicated: false,
        };
        let allocation = allocator.alloc(&requirements(4096, 256), hints, &dedicated_info, DEVICE_LOCAL, 1.0).unwrap();
        assert!(allocation.dedicated);
        assert_eq!(0, allocator.arena_count());
        let request = device.allocations.borrow()[0].1;
        assert_eq!(Some(image), request.dedicated_image);
        assert_eq!(4096, request.size);
        assert_eq!(None, request.priority);
        let memory = allocation.memory;
        allocator.free(allocation);
        assert_eq!(vec![memory], *device.freed_memory.borrow());
    }

    #[test]
    fn external_memory_is_always_dedicated() {
        let _vram = lock_vram_counters();
        let settings = ArenaAllocatorSettings {
            memory_priority: true,
            resource_sharing: true,
            ..Default::default()
        };
        let (device, allocator) = allocator(settings);
        let external = ExternalMemory::Export {
            handle_type: vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD,
        };
        let dedicated_info = DedicatedAllocation {
            image: vk::Image::null(),
            external: Some(external),
        };
        let allocation = allocator
            .alloc(&requirements(256, 256), DedicatedRequirements::default(), &dedicated_info, DEVICE_LOCAL, 1.0)
            .unwrap();
        assert!(allocation.dedicated);
        let request = device.allocations.borrow()[0].1;
        assert_eq!(Some(external), request.external);
        assert_eq!(Some(1.0), request.priority);
        assert!(allocator.supports_resource_sharing());
    }

    #[test]
    fn falls_back_to_host_memory_when_device_local_is_not_allowed() {
        let _vram = lock_vram_counters();
        let (device, allocator) = allocator(ArenaAllocatorSettings::default());
        let reqs = vk::MemoryRequirements {
            size: 256,
            alignment: 256,
            memory_type_bits: 0b10,
        };
        allocator.alloc(&reqs, DedicatedRequirements::default(), &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert_eq!(1, device.allocations.borrow()[0].1.memory_type_index);
    }

    #[test]
    fn memory_type_errors() {
        let _vram = lock_vram_counters();
        let (_device, allocator) = allocator(ArenaAllocatorSettings::default());
        let no_type = vk::MemoryRequirements {
            size: 256,
            alignment: 256,
            memory_type_bits: 0b100,
        };
        let result = allocator.alloc(&no_type, DedicatedRequirements::default(), &not_dedicated(), DEVICE_LOCAL, 0.5);
        assert!(matches!(result, Err(AllocationError::MissingMemoryType(0b100, _))));

        let too_big = requirements(4 << 30, 256);
        let result = allocator.alloc(&too_big, DedicatedRequirements::default(), &not_dedicated(), DEVICE_LOCAL, 0.5);
        assert!(matches!(result, Err(AllocationError::HeapsOutOfMemory(..))));
    }

    #[test]
    fn allocation_failure_is_reported() {
        let _vram = lock_vram_counters();
        let (device, allocator) = allocator(ArenaAllocatorSettings::default());
        device.fail_allocation.set(Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        let result = allocator.alloc(&requirements(256, 256), DedicatedRequirements::default(), &not_dedicated(), DEVICE_LOCAL, 0.5);
        assert!(matches!(result, Err(AllocationError::Allocate(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, 0, _))));
        assert_eq!(0, allocator.arena_count());
    }

    #[test]
    fn heaps_smaller_than_an_arena_get_dedicated_memory() {
        let _vram = lock_vram_counters();
        let device = Rc::new(MockDevice::default());
        let native: Rc<dyn NativeDevice> = device.clone();
        let mut info = memory_info();
        info.memory_properties.memory_heaps[0].size = 16 << 20;
        let allocator = ArenaAllocator::new(native, info, ArenaAllocatorSettings::default());
        let no_hints = DedicatedRequirements::default();
        let allocation = allocator.alloc(&requirements(1 << 20, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert!(allocation.dedicated);
        assert_eq!(0, allocator.arena_count());
        let request = device.allocations.borrow()[0].1;
        assert_eq!(0, request.memory_type_index);
        assert_eq!(1 << 20, request.size);
    }

    #[test]
    fn vram_counters_follow_device_local_memory() {
        let _vram = lock_vram_counters();
        let counters = || (get_allocated_vram(), get_allocated_vram_in_use());
        let (allocated, in_use) = counters();
        let arena_size = ArenaAllocatorSettings::default().arena_size;
        let (_device, allocator) = allocator(ArenaAllocatorSettings::default());
        let no_hints = DedicatedRequirements::default();

        let pooled = allocator.alloc(&requirements(1000, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert_eq!((allocated + arena_size, in_use + 1000), counters());

        let hints = DedicatedRequirements {
            prefers_dedicated: true,
            requires_dedicated: false,
        };
        let dedicated = allocator.alloc(&requirements(4096, 256), hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert_eq!((allocated + arena_size + 4096, in_use + 1000 + 4096), counters());
        assert!(get_allocated_vram_peak() >= allocated + arena_size + 4096);

        allocator.free(pooled);
        assert_eq!((allocated + arena_size + 4096, in_use + 4096), counters());
        allocator.free(dedicated);
        assert_eq!((allocated + arena_size, in_use), counters());

        // Host memory is not counted.
        let host_only = vk::MemoryRequirements {
            memory_type_bits: 0b10,
            ..requirements(2048, 256)
        };
        allocator.alloc(&host_only, no_hints, &not_dedicated(), HOST_VISIBLE, 0.5).unwrap();
        allocator.alloc(&requirements(512, 256), no_hints, &not_dedicated(), DEVICE_LOCAL, 0.5).unwrap();
        assert_eq!((allocated + arena_size, in_use + 512), counters());

        drop(allocator);
        assert_eq!((allocated, in_use), counters());
    }

    #[test]
    fn freeing_unknown_dedicated_memory_is_ignored() {
        let _vram = lock_vram_counters();
        let (device, allocator) = allocator(ArenaAllocatorSettings::default());
        let counters = (get_allocated_vram(), get_allocated_vram_in_use());
        allocator.free(Allocation {
            memory: vk::DeviceMemory::from_raw(0xbeef),
            offset: 0,
            size: 4096,
            dedicated: true,
        });
        assert!(device.freed_memory.borrow().is_empty());
        assert_eq!(counters, (get_allocated_vram(), get_allocated_vram_in_use()));
        drop(allocator);
        assert!(device.freed_memory.borrow().is_empty());
    }

    #[test]
    fn granularity_is_at_least_one() {
        let device: Rc<dyn NativeDevice> = Rc::new(MockDevice::default());
        let info = DeviceMemoryInfo {
            buffer_image_granularity: 0,
            ..memory_info()
        };
        let allocator = ArenaAllocator::new(device, info, ArenaAllocatorSettings::default());
        assert_eq!(1, allocator.buffer_image_granularity());
    }
}
