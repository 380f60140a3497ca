use ash::vk;

use crate::descriptors::{format_aspects, texture_desc, DescriptorError, LayerRange, Resource, ResourceDesc};
use crate::image_view::ImageViewCreateInfo;

/// Depth-stencil views always target a single mip level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DsvDimension {
    Texture1D { mip_slice: u32 },
    Texture1DArray { mip_slice: u32, layers: LayerRange },
    Texture2D { mip_slice: u32 },
    Texture2DArray { mip_slice: u32, layers: LayerRange },
    Texture2DMs,
    Texture2DMsArray { layers: LayerRange },
}

impl DsvDimension {
    pub fn name(&self) -> &'static str {
        match self {
            DsvDimension::Texture1D { .. } => "Texture1D",
            DsvDimension::Texture1DArray { .. } => "Texture1DArray",
            DsvDimension::Texture2D { .. } => "Texture2D",
            DsvDimension::Texture2DArray { .. } => "Texture2DArray",
            DsvDimension::Texture2DMs => "Texture2DMS",
            DsvDimension::Texture2DMsArray { .. } => "Texture2DMSArray",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthStencilViewDesc {
    pub format: vk::Format,
    pub dimension: DsvDimension,
}

impl DepthStencilViewDesc {
    /// The view of the top mip level and every layer of `resource`. Only 1D
    /// and 2D textures can have depth-stencil views.
    pub fn from_resource(resource: &impl Resource) -> Result<DepthStencilViewDesc, DescriptorError> {
        let resource = resource.resource_desc();
        let dimension = match resource {
            ResourceDesc::Texture1D(texture) if texture.array_size == 1 => DsvDimension::Texture1D { mip_slice: 0 },
            ResourceDesc::Texture1D(texture) => DsvDimension::Texture1DArray {
                mip_slice: 0,
                layers: LayerRange::all(texture.array_size),
            },
            ResourceDesc::Texture2D(texture) => {
                let layers = LayerRange::all(texture.array_size);
                match (texture.sample_count > 1, texture.array_size == 1) {
                    (false, true) => DsvDimension::Texture2D { mip_slice: 0 },
                    (false, false) => DsvDimension::Texture2DArray { mip_slice: 0, layers },
                    (true, true) => DsvDimension::Texture2DMs,
                    (true, false) => DsvDimension::Texture2DMsArray { layers },
                }
            }
            ResourceDesc::Unknown | ResourceDesc::Buffer { .. } | ResourceDesc::Texture3D(_) => {
                return Err(DescriptorError::UnsupportedResourceDimension(resource.dimension()));
            }
        };
        let format = texture_desc(&resource).map_or(vk::Format::UNDEFINED, |texture| texture.format);
        Ok(DepthStencilViewDesc { format, dimension })
    }

    /// Checks that this view fits the kind of resource, and returns a copy
    /// with the format filled in and the layer ranges narrowed to what the
    /// resource has. The mip slice is left as is.
    pub fn normalize(&self, resource: &impl Resource) -> Result<DepthStencilViewDesc, DescriptorError> {
        use DsvDimension as D;
        let resource = resource.resource_desc();
        let texture = match resource {
            ResourceDesc::Unknown => return Err(DescriptorError::UnsupportedResourceDimension(resource.dimension())),
            ResourceDesc::Texture1D(texture) if matches!(self.dimension, D::Texture1D { .. } | D::Texture1DArray { .. }) => texture,
            ResourceDesc::Texture2D(texture)
                if matches!(
                    self.dimension,
                    D::Texture2D { .. } | D::Texture2DArray { .. } | D::Texture2DMs | D::Texture2DMsArray { .. }
                ) =>
            {
                texture
            }
            _ => {
                return Err(DescriptorError::IncompatibleViewDimension {
                    resource: resource.dimension(),
                    view: self.dimension.name(),
                })
            }
        };

        let dimension = match self.dimension {
            D::Texture1DArray { mip_slice, layers } => D::Texture1DArray {
                mip_slice,
                layers: layers.clamped(texture.array_size),
            },
            D::Texture2DArray { mip_slice, layers } => D::Texture2DArray {
                mip_slice,
                layers: layers.clamped(texture.array_size),
            },
            D::Texture2DMsArray { layers } => D::Texture2DMsArray {
                layers: layers.clamped(texture.array_size),
            },
            dimension @ (D::Texture1D { .. } | D::Texture2D { .. } | D::Texture2DMs) => dimension,
        };
        let format = if self.format == vk::Format::UNDEFINED { texture.format } else { self.format };

        let normalized = DepthStencilViewDesc { format, dimension };
        if normalized.dimension != self.dimension {
            log::debug!("narrowed depth-stencil view {:?} to {:?}", self.dimension, normalized.dimension);
        }
        Ok(normalized)
    }

    /// The image view to create for this (normalized) view.
    pub fn to_image_view_info(&self) -> ImageViewCreateInfo {
        use DsvDimension as D;
        let single_layer = LayerRange::all(1);
        let (view_type, mip_slice, layers) = match self.dimension {
            D::Texture1D { mip_slice } => (vk::ImageViewType::TYPE_1D, mip_slice, single_layer),
            D::Texture1DArray { mip_slice, layers } => (vk::ImageViewType::TYPE_1D_ARRAY, mip_slice, layers),
            D::Texture2D { mip_slice } => (vk::ImageViewType::TYPE_2D, mip_slice, single_layer),
            D::Texture2DArray { mip_slice, layers } => (vk::ImageViewType::TYPE_2D_ARRAY, mip_slice, layers),
            D::Texture2DMs => (vk::ImageViewType::TYPE_2D, 0, single_layer),
            D::Texture2DMsArray { layers } => (vk::ImageViewType::TYPE_2D_ARRAY, 0, layers),
        };
        ImageViewCreateInfo {
            view_type,
            format: self.format,
            swizzle: vk::ComponentMapping::default(),
            aspect: format_aspects(self.format),
            min_level: mip_slice,
            num_levels: 1,
            min_layer: layers.first_array_slice,
            num_layers: layers.array_size,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        }
    }
}
