use ash::vk;

use crate::descriptors::{format_aspects, texture_desc, DescriptorError, LayerRange, MipRange, Resource, ResourceDesc, ResourceDimension};
use crate::image_view::ImageViewCreateInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SrvDimension {
    /// Counted in 32-bit elements.
    Buffer { first_element: u32, num_elements: u32 },
    Texture1D { mips: MipRange },
    Texture1DArray { mips: MipRange, layers: LayerRange },
    Texture2D { mips: MipRange },
    Texture2DArray { mips: MipRange, layers: LayerRange },
    Texture2DMs,
    Texture2DMsArray { layers: LayerRange },
    Texture3D { mips: MipRange },
    TextureCube { mips: MipRange },
    TextureCubeArray {
        mips: MipRange,
        first_2d_array_face: u32,
        num_cubes: u32,
    },
}

impl SrvDimension {
    pub fn name(&self) -> &'static str {
        match self {
            SrvDimension::Buffer { .. } => "Buffer",
            SrvDimension::Texture1D { .. } => "Texture1D",
            SrvDimension::Texture1DArray { .. } => "Texture1DArray",
            SrvDimension::Texture2D { .. } => "Texture2D",
            SrvDimension::Texture2DArray { .. } => "Texture2DArray",
            SrvDimension::Texture2DMs => "Texture2DMS",
            SrvDimension::Texture2DMsArray { .. } => "Texture2DMSArray",
            SrvDimension::Texture3D { .. } => "Texture3D",
            SrvDimension::TextureCube { .. } => "TextureCube",
            SrvDimension::TextureCubeArray { .. } => "TextureCubeArray",
        }
    }
}

/// Describes a shader resource view. A format of [`vk::Format::UNDEFINED`]
/// means the resource's own format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderResourceViewDesc {
    pub format: vk::Format,
    pub dimension: SrvDimension,
}

impl ShaderResourceViewDesc {
    /// The view used when the application doesn't provide a descriptor: the
    /// whole resource, in its own format.
    pub fn from_resource(resource: &impl Resource) -> Result<ShaderResourceViewDesc, DescriptorError> {
        let (format, dimension) = match resource.resource_desc() {
            ResourceDesc::Buffer { byte_width } => {
                let num_elements = byte_width / 4;
                (vk::Format::UNDEFINED, SrvDimension::Buffer { first_element: 0, num_elements })
            }
            ResourceDesc::Texture1D(texture) => {
                let mips = MipRange::all(texture.mip_levels);
                let dimension = if texture.array_size == 1 {
                    SrvDimension::Texture1D { mips }
                } else {
                    SrvDimension::Texture1DArray {
                        mips,
                        layers: LayerRange::all(texture.array_size),
                    }
                };
                (texture.format, dimension)
            }
            ResourceDesc::Texture2D(texture) => {
                let mips = MipRange::all(texture.mip_levels);
                let layers = LayerRange::all(texture.array_size);
                let dimension = match (texture.sample_count > 1, texture.array_size == 1) {
                    (false, true) => SrvDimension::Texture2D { mips },
                    (false, false) => SrvDimension::Texture2DArray { mips, layers },
                    (true, true) => SrvDimension::Texture2DMs,
                    (true, false) => SrvDimension::Texture2DMsArray { layers },
                };
                (texture.format, dimension)
            }
            ResourceDesc::Texture3D(texture) => {
                let mips = MipRange::all(texture.mip_levels);
                (texture.format, SrvDimension::Texture3D { mips })
            }
            ResourceDesc::Unknown => return Err(DescriptorError::UnsupportedResourceDimension(ResourceDimension::Unknown)),
        };
        Ok(ShaderResourceViewDesc { format, dimension })
    }

    /// Checks that this view fits the kind of resource, and returns a copy
    /// with the format filled in and the ranges narrowed to what the
    /// resource has.
    pub fn normalize(&self, resource: &impl Resource) -> Result<ShaderResourceViewDesc, DescriptorError> {
        use SrvDimension as D;
        let resource = resource.resource_desc();
        let compatible = match resource {
            ResourceDesc::Unknown => return Err(DescriptorError::UnsupportedResourceDimension(ResourceDimension::Unknown)),
            ResourceDesc::Buffer { .. } => matches!(self.dimension, D::Buffer { .. }),
            ResourceDesc::Texture1D(_) => matches!(self.dimension, D::Texture1D { .. } | D::Texture1DArray { .. }),
            ResourceDesc::Texture2D(_) => matches!(
                self.dimension,
                D::Texture2D { .. }
                    | D::Texture2DArray { .. }
                    | D::Texture2DMs
                    | D::Texture2DMsArray { .. }
                    | D::TextureCube { .. }
                    | D::TextureCubeArray { .. }
            ),
            ResourceDesc::Texture3D(_) => matches!(self.dimension, D::Texture3D { .. }),
        };
        if !compatible {
            return Err(DescriptorError::IncompatibleViewDimension {
                resource: resource.dimension(),
                view: self.dimension.name(),
            });
        }

        let Some(texture) = texture_desc(&resource) else {
            return Ok(*self);
        };
        let (mip_levels, array_size) = (texture.mip_levels, texture.array_size);
        let dimension = match self.dimension {
            D::Texture1D { mips } => D::Texture1D { mips: mips.clamped(mip_levels) },
            D::Texture1DArray { mips, layers } => D::Texture1DArray {
                mips: mips.clamped(mip_levels),
                layers: layers.clamped(array_size),
            },
            D::Texture2D { mips } => D::Texture2D { mips: mips.clamped(mip_levels) },
            D::Texture2DArray { mips, layers } => D::Texture2DArray {
                mips: mips.clamped(mip_levels),
                layers: layers.clamped(array_size),
            },
            D::Texture2DMsArray { layers } => D::Texture2DMsArray {
                layers: layers.clamped(array_size),
            },
            D::Texture3D { mips } => D::Texture3D { mips: mips.clamped(mip_levels) },
            D::TextureCube { mips } => D::TextureCube { mips: mips.clamped(mip_levels) },
            D::TextureCubeArray {
                mips,
                first_2d_array_face,
                num_cubes,
            } => D::TextureCubeArray {
                mips: mips.clamped(mip_levels),
                first_2d_array_face,
                num_cubes: num_cubes.min(array_size.saturating_sub(first_2d_array_face) / 6),
            },
            dimension @ (D::Buffer { .. } | D::Texture2DMs) => dimension,
        };
        let format = if self.format == vk::Format::UNDEFINED { texture.format } else { self.format };

        let normalized = ShaderResourceViewDesc { format, dimension };
        if normalized.dimension != self.dimension {
            log::debug!("narrowed shader resource view {:?} to {:?}", self.dimension, normalized.dimension);
        }
        Ok(normalized)
    }

    /// The image view to create for this (normalized) view, or None for
    /// buffer views.
    pub fn to_image_view_info(&self) -> Option<ImageViewCreateInfo> {
        use SrvDimension as D;
        let single_level = MipRange::all(1);
        let single_layer = LayerRange::all(1);
        let (view_type, mips, layers) = match self.dimension {
            D::Buffer { .. } => return None,
            D::Texture1D { mips } => (vk::ImageViewType::TYPE_1D, mips, single_layer),
            D::Texture1DArray { mips, layers } => (vk::ImageViewType::TYPE_1D_ARRAY, mips, layers),
            D::Texture2D { mips } => (vk::ImageViewType::TYPE_2D, mips, single_layer),
            D::Texture2DArray { mips, layers } => (vk::ImageViewType::TYPE_2D_ARRAY, mips, layers),
            D::Texture2DMs => (vk::ImageViewType::TYPE_2D, single_level, single_layer),
            D::Texture2DMsArray { layers } => (vk::ImageViewType::TYPE_2D_ARRAY, single_level, layers),
            D::Texture3D { mips } => (vk::ImageViewType::TYPE_3D, mips, single_layer),
            D::TextureCube { mips } => (vk::ImageViewType::CUBE, mips, LayerRange::all(6)),
            D::TextureCubeArray {
                mips,
                first_2d_array_face,
                num_cubes,
            } => {
                let layers = LayerRange {
                    first_array_slice: first_2d_array_face,
                    array_size: num_cubes.saturating_mul(6),
                };
                (vk::ImageViewType::CUBE_ARRAY, mips, layers)
            }
        };

        // Depth-stencil images are sampled through their depth aspect.
        let mut aspect = format_aspects(self.format);
        if aspect.contains(vk::ImageAspectFlags::DEPTH) {
            aspect = vk::ImageAspectFlags::DEPTH;
        }

        Some(ImageViewCreateInfo {
            view_type,
            format: self.format,
            swizzle: vk::ComponentMapping::default(),
            aspect,
            min_level: mips.most_detailed_mip,
            num_levels: mips.mip_levels,
            min_layer: layers.first_array_slice,
            num_layers: layers.array_size,
            usage: vk::ImageUsageFlags::SAMPLED,
        })
    }
}
