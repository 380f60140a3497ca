use core::ops::Deref;

use ash::vk;

#[cfg(unix)]
use ash::khr::external_memory_fd as external_memory;
#[cfg(windows)]
use ash::khr::external_memory_win32 as external_memory;

use crate::arena::ExternalMemory;
use crate::image::ImageCreateInfo;
use crate::native::{MemoryAllocateRequest, MemoryRequirements, NativeDevice, NativeViewCreateInfo, RawShareHandle};

#[cfg(unix)]
type ImportMemoryInfo = vk::ImportMemoryFdInfoKHR<'static>;
#[cfg(windows)]
type ImportMemoryInfo = vk::ImportMemoryWin32HandleInfoKHR<'static>;

/// Owns an [`ash::Device`] and implements [`NativeDevice`] with it. The
/// device is destroyed when this is dropped, which can only happen after
/// every image, view and allocator holding on to it is gone.
pub struct AshDevice {
    device: ash::Device,
    external_memory: Option<external_memory::Device>,
}

impl Drop for AshDevice {
    fn drop(&mut self) {
        profiling::scope!("vk::destroy_device");
        log::trace!("vk::destroy_device({:?})", self.device.handle());
        unsafe { self.device.destroy_device(None) };
    }
}

impl Deref for AshDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl AshDevice {
    /// Takes ownership of `device`. Set `external_memory_enabled` if the platform's
    /// external memory extension (`VK_KHR_external_memory_fd` on unix,
    /// `VK_KHR_external_memory_win32` on windows) was enabled for it.
    pub fn new(instance: &ash::Instance, device: ash::Device, external_memory_enabled: bool) -> AshDevice {
        let external_memory = external_memory_enabled.then(|| external_memory::Device::new(instance, &device));
        AshDevice { device, external_memory }
    }

    pub fn supports_external_memory(&self) -> bool {
        self.external_memory.is_some()
    }
}

#[cfg(unix)]
fn import_memory_info(handle_type: vk::ExternalMemoryHandleTypeFlags, handle: RawShareHandle) -> Result<ImportMemoryInfo, vk::Result> {
    let fd = i32::try_from(handle).map_err(|_| vk::Result::ERROR_INVALID_EXTERNAL_HANDLE)?;
    Ok(vk::ImportMemoryFdInfoKHR::default().handle_type(handle_type).fd(fd))
}

#[cfg(windows)]
fn import_memory_info(handle_type: vk::ExternalMemoryHandleTypeFlags, handle: RawShareHandle) -> Result<ImportMemoryInfo, vk::Result> {
    Ok(vk::ImportMemoryWin32HandleInfoKHR::default()
        .handle_type(handle_type)
        .handle(handle as vk::HANDLE))
}

impl NativeDevice for AshDevice {
    fn create_image(
        &self,
        info: &ImageCreateInfo,
        external_handle_types: vk::ExternalMemoryHandleTypeFlags,
    ) -> Result<vk::Image, vk::Result> {
        let mut format_list = vk::ImageFormatListCreateInfo::default().view_formats(&info.view_formats);
        let mut external_info = vk::ExternalMemoryImageCreateInfo::default().handle_types(external_handle_types);
        let mut create_info = vk::ImageCreateInfo::default()
            .flags(info.flags)
            .image_type(info.image_type)
            .format(info.format)
            .extent(info.extent)
            .mip_levels(info.mip_levels)
            .array_layers(info.array_layers)
            .samples(info.samples)
            .tiling(info.tiling)
            .usage(info.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if !info.view_formats.is_empty() {
            create_info = create_info.push_next(&mut format_list);
        }
        if !external_handle_types.is_empty() {
            create_info = create_info.push_next(&mut external_info);
        }
        unsafe { self.device.create_image(&create_info, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) };
    }

    fn image_memory_requirements(&self, image: vk::Image) -> MemoryRequirements {
        let mut dedicated = vk::MemoryDedicatedRequirements::default();
        let mut requirements2 = vk::MemoryRequirements2::default().push_next(&mut dedicated);
        let info = vk::ImageMemoryRequirementsInfo2::default().image(image);
        unsafe { self.device.get_image_memory_requirements2(&info, &mut requirements2) };
        let requirements = requirements2.memory_requirements;
        MemoryRequirements {
            requirements,
            prefers_dedicated: dedicated.prefers_dedicated_allocation == vk::TRUE,
            requires_dedicated: dedicated.requires_dedicated_allocation == vk::TRUE,
        }
    }

    fn allocate_memory(&self, request: &MemoryAllocateRequest) -> Result<vk::DeviceMemory, vk::Result> {
        if request.external.is_some() && self.external_memory.is_none() {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        }

        let mut dedicated_info = vk::MemoryDedicatedAllocateInfo::default();
        let mut export_info = vk::ExportMemoryAllocateInfo::default();
        let mut import_info: ImportMemoryInfo;
        let mut priority_info = vk::MemoryPriorityAllocateInfoEXT::default();
        let mut allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(request.size)
            .memory_type_index(request.memory_type_index);

        if let Some(image) = request.dedicated_image {
            dedicated_info = dedicated_info.image(image);
            allocate_info = allocate_info.push_next(&mut dedicated_info);
        }
        match request.external {
            Some(ExternalMemory::Export { handle_type }) => {
                export_info = export_info.handle_types(handle_type);
                allocate_info = allocate_info.push_next(&mut export_info);
            }
            Some(ExternalMemory::Import { handle_type, handle }) => {
                import_info = import_memory_info(handle_type, handle)?;
                allocate_info = allocate_info.push_next(&mut import_info);
            }
            None => {}
        }
        if let Some(priority) = request.priority {
            priority_info = priority_info.priority(priority);
            allocate_info = allocate_info.push_next(&mut priority_info);
        }

        unsafe { self.device.allocate_memory(&allocate_info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) };
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> Result<(), vk::Result> {
        unsafe { self.device.bind_image_memory(image, memory, offset) }
    }

    #[cfg(unix)]
    fn memory_share_handle(
        &self,
        memory: vk::DeviceMemory,
        handle_type: vk::ExternalMemoryHandleTypeFlags,
    ) -> Result<RawShareHandle, vk::Result> {
        let external_memory = self.external_memory.as_ref().ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        let info = vk::MemoryGetFdInfoKHR::default().memory(memory).handle_type(handle_type);
        log::trace!("vk::get_memory_fd({:?}, {:?})", memory, handle_type);
        let fd = unsafe { external_memory.get_memory_fd(&info) }?;
        Ok(fd as RawShareHandle)
    }

    #[cfg(windows)]
    fn memory_share_handle(
        &self,
        memory: vk::DeviceMemory,
        handle_type: vk::ExternalMemoryHandleTypeFlags,
    ) -> Result<RawShareHandle, vk::Result> {
        let external_memory = self.external_memory.as_ref().ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        let info = vk::MemoryGetWin32HandleInfoKHR::default().memory(memory).handle_type(handle_type);
        log::trace!("vk::get_memory_win32_handle({:?}, {:?})", memory, handle_type);
        let handle = unsafe { external_memory.get_memory_win32_handle(&info) }?;
        Ok(handle as RawShareHandle)
    }

    fn create_image_view(&self, info: &NativeViewCreateInfo) -> Result<vk::ImageView, vk::Result> {
        let mut usage_info = vk::ImageViewUsageCreateInfo::default().usage(info.usage);
        let create_info = vk::ImageViewCreateInfo::default()
            .image(info.image)
            .view_type(info.view_type)
            .format(info.format)
            .components(info.components)
            .subresource_range(info.subresource_range)
            .push_next(&mut usage_info);
        unsafe { self.device.create_image_view(&create_info, None) }
    }

    fn destroy_image_view(&self, image_view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(image_view, None) };
    }
}
