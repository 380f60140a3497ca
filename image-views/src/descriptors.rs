//! Legacy view descriptors, and resolving them against the resource they
//! view.
//!
//! Applications may leave a descriptor out entirely, leave its format
//! unspecified ([`vk::Format::UNDEFINED`]), or ask for more mips and layers
//! than the resource has. [`srv`] and [`dsv`] turn these into complete
//! descriptors whose ranges fit the resource. Overruns are narrowed, not
//! rejected: `u32::MAX` is a common way of saying "all the rest".

use ash::vk;

use crate::image::Image;

pub mod dsv;
pub mod srv;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("no default view for {0:?} resources")]
    UnsupportedResourceDimension(ResourceDimension),
    #[error("{view} view is not compatible with {resource:?} resources")]
    IncompatibleViewDimension { resource: ResourceDimension, view: &'static str },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceDimension {
    Unknown,
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub format: vk::Format,
    pub mip_levels: u32,
    /// Always 1 for 3D textures.
    pub array_size: u32,
    pub sample_count: u32,
}

/// What a view descriptor needs to know about the resource it views.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceDesc {
    Unknown,
    Buffer { byte_width: u32 },
    Texture1D(TextureDesc),
    Texture2D(TextureDesc),
    Texture3D(TextureDesc),
}

impl ResourceDesc {
    pub fn dimension(&self) -> ResourceDimension {
        match self {
            ResourceDesc::Unknown => ResourceDimension::Unknown,
            ResourceDesc::Buffer { .. } => ResourceDimension::Buffer,
            ResourceDesc::Texture1D(_) => ResourceDimension::Texture1D,
            ResourceDesc::Texture2D(_) => ResourceDimension::Texture2D,
            ResourceDesc::Texture3D(_) => ResourceDimension::Texture3D,
        }
    }
}

/// Read-only introspection of a resource that views are created for.
pub trait Resource {
    fn resource_desc(&self) -> ResourceDesc;
}

impl Resource for ResourceDesc {
    fn resource_desc(&self) -> ResourceDesc {
        *self
    }
}

impl Resource for Image {
    fn resource_desc(&self) -> ResourceDesc {
        let info = self.info();
        let texture = TextureDesc {
            format: info.format,
            mip_levels: info.mip_levels,
            array_size: info.array_layers,
            sample_count: info.samples.as_raw(),
        };
        match info.image_type {
            vk::ImageType::TYPE_1D => ResourceDesc::Texture1D(texture),
            vk::ImageType::TYPE_2D => ResourceDesc::Texture2D(texture),
            vk::ImageType::TYPE_3D => ResourceDesc::Texture3D(TextureDesc { array_size: 1, ..texture }),
            _ => ResourceDesc::Unknown,
        }
    }
}

/// The largest count that still fits in `bound` when starting at `first`,
/// or `count` if that is smaller. Never underflows, even if `first` itself
/// is out of bounds.
#[inline]
pub(crate) fn clamp_count(count: u32, bound: u32, first: u32) -> u32 {
    count.min(bound.saturating_sub(first))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipRange {
    pub most_detailed_mip: u32,
    pub mip_levels: u32,
}

impl MipRange {
    pub fn all(mip_levels: u32) -> MipRange {
        MipRange {
            most_detailed_mip: 0,
            mip_levels,
        }
    }

    fn clamped(self, mip_levels: u32) -> MipRange {
        MipRange {
            mip_levels: clamp_count(self.mip_levels, mip_levels, self.most_detailed_mip),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerRange {
    pub first_array_slice: u32,
    pub array_size: u32,
}

impl LayerRange {
    pub fn all(array_size: u32) -> LayerRange {
        LayerRange {
            first_array_slice: 0,
            array_size,
        }
    }

    fn clamped(self, array_size: u32) -> LayerRange {
        LayerRange {
            array_size: clamp_count(self.array_size, array_size, self.first_array_slice),
            ..self
        }
    }
}

/// The aspects an image view of `format` covers.
pub fn format_aspects(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

fn texture_desc(resource: &ResourceDesc) -> Option<&TextureDesc> {
    match resource {
        ResourceDesc::Texture1D(texture) | ResourceDesc::Texture2D(texture) | ResourceDesc::Texture3D(texture) => Some(texture),
        ResourceDesc::Unknown | ResourceDesc::Buffer { .. } => None,
    }
}
