//! Image views that carry every native view type a legacy view may be
//! reinterpreted as.
//!
//! A legacy view over a 2D array can be bound as a 2D texture, a 2D array or
//! a cube, and shaders decide which at draw time. Creating native views on
//! demand there would be expensive, so [`ImageView`] creates all of the
//! compatible native views up front and hands out the right one by
//! [`NativeViewType`].

use alloc::rc::Rc;

use arrayvec::ArrayVec;
use ash::vk;
use enum_map::{Enum, EnumMap};

use crate::image::Image;
use crate::native::NativeViewCreateInfo;

#[derive(thiserror::Error, Debug)]
pub enum ImageViewError {
    #[error("invalid image view type: {0:?}")]
    InvalidViewType(vk::ImageViewType),
    #[error("failed to create {view_type:?} view (format {format:?}, {subresources:?}) of {image}")]
    ViewCreation {
        #[source]
        source: vk::Result,
        view_type: NativeViewType,
        format: vk::Format,
        subresources: vk::ImageSubresourceRange,
        image: String,
    },
}

/// The native view types, in the order of their [`vk::ImageViewType`]
/// values.
#[derive(Enum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeViewType {
    Type1D,
    Type2D,
    Type3D,
    Cube,
    Type1DArray,
    Type2DArray,
    CubeArray,
}

impl NativeViewType {
    pub fn from_vk(view_type: vk::ImageViewType) -> Option<NativeViewType> {
        match view_type {
            vk::ImageViewType::TYPE_1D => Some(NativeViewType::Type1D),
            vk::ImageViewType::TYPE_2D => Some(NativeViewType::Type2D),
            vk::ImageViewType::TYPE_3D => Some(NativeViewType::Type3D),
            vk::ImageViewType::CUBE => Some(NativeViewType::Cube),
            vk::ImageViewType::TYPE_1D_ARRAY => Some(NativeViewType::Type1DArray),
            vk::ImageViewType::TYPE_2D_ARRAY => Some(NativeViewType::Type2DArray),
            vk::ImageViewType::CUBE_ARRAY => Some(NativeViewType::CubeArray),
            _ => None,
        }
    }

    pub fn to_vk(self) -> vk::ImageViewType {
        match self {
            NativeViewType::Type1D => vk::ImageViewType::TYPE_1D,
            NativeViewType::Type2D => vk::ImageViewType::TYPE_2D,
            NativeViewType::Type3D => vk::ImageViewType::TYPE_3D,
            NativeViewType::Cube => vk::ImageViewType::CUBE,
            NativeViewType::Type1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
            NativeViewType::Type2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
            NativeViewType::CubeArray => vk::ImageViewType::CUBE_ARRAY,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ImageViewCreateInfo {
    /// The view type the legacy view was declared as. Decides which family
    /// of native views gets created.
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub swizzle: vk::ComponentMapping,
    pub aspect: vk::ImageAspectFlags,
    pub min_level: u32,
    pub num_levels: u32,
    pub min_layer: u32,
    pub num_layers: u32,
    pub usage: vk::ImageUsageFlags,
}

impl Default for ImageViewCreateInfo {
    fn default() -> Self {
        ImageViewCreateInfo {
            view_type: vk::ImageViewType::TYPE_2D,
            format: vk::Format::UNDEFINED,
            swizzle: vk::ComponentMapping::default(),
            aspect: vk::ImageAspectFlags::COLOR,
            min_level: 0,
            num_levels: 1,
            min_layer: 0,
            num_layers: 1,
            usage: vk::ImageUsageFlags::empty(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NativeView {
    pub handle: vk::ImageView,
    pub subresources: vk::ImageSubresourceRange,
}

/// A set of native views over the same subresources of an [`Image`]. Keeps
/// the image alive, and destroys the native views when dropped.
pub struct ImageView {
    image: Rc<Image>,
    info: ImageViewCreateInfo,
    views: EnumMap<NativeViewType, Option<NativeView>>,
}

impl Drop for ImageView {
    fn drop(&mut self) {
        let device = self.image.device();
        for view in self.views.values().flatten() {
            device.destroy_image_view(view.handle);
        }
    }
}

/// The native views to create and the layer count of each. Four is enough
/// for the largest family (2D, 2D array, cube, cube array).
type ViewPlan = ArrayVec<(NativeViewType, u32), 4>;

fn plan_views(image: &Image, info: &ImageViewCreateInfo) -> Result<ViewPlan, ImageViewError> {
    let image_flags = image.info().flags;
    let mut plan = ViewPlan::new();
    match info.view_type {
        vk::ImageViewType::TYPE_1D | vk::ImageViewType::TYPE_1D_ARRAY => {
            plan.push((NativeViewType::Type1D, 1));
            plan.push((NativeViewType::Type1DArray, info.num_layers));
        }

        vk::ImageViewType::TYPE_2D
        | vk::ImageViewType::TYPE_2D_ARRAY
        | vk::ImageViewType::CUBE
        | vk::ImageViewType::CUBE_ARRAY => {
            plan.push((NativeViewType::Type2D, 1));
            plan.push((NativeViewType::Type2DArray, info.num_layers));
            let cube_count = info.num_layers / 6;
            if image_flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE) && cube_count > 0 {
                plan.push((NativeViewType::Cube, 6));
                plan.push((NativeViewType::CubeArray, 6 * cube_count));
            }
        }

        vk::ImageViewType::TYPE_3D => {
            plan.push((NativeViewType::Type3D, 1));
            // Depth slices can only be viewed as 2D array layers one mip level at a time.
            if image_flags.contains(vk::ImageCreateFlags::TYPE_2D_ARRAY_COMPATIBLE) && info.num_levels == 1 {
                plan.push((NativeViewType::Type2D, 1));
                plan.push((NativeViewType::Type2DArray, image.mip_level_extent(info.min_level).depth));
            }
        }

        view_type => return Err(ImageViewError::InvalidViewType(view_type)),
    }
    Ok(plan)
}

impl ImageView {
    /// Creates every native view `info.view_type` can be reinterpreted as,
    /// given the flags `image` was created with. Either all of them are
    /// created, or none are.
    #[profiling::function]
    pub fn new(image: Rc<Image>, info: ImageViewCreateInfo) -> Result<ImageView, ImageViewError> {
        let plan = plan_views(&image, &info)?;

        let components = if info.usage == vk::ImageUsageFlags::COLOR_ATTACHMENT {
            vk::ComponentMapping::default()
        } else {
            info.swizzle
        };

        let mut view = ImageView {
            image,
            info,
            views: EnumMap::default(),
        };
        let device = view.image.device().clone();
        for (view_type, layer_count) in plan {
            let subresources = vk::ImageSubresourceRange {
                aspect_mask: info.aspect,
                base_mip_level: info.min_level,
                level_count: info.num_levels,
                base_array_layer: info.min_layer,
                layer_count,
            };
            let create_info = NativeViewCreateInfo {
                image: view.image.handle(),
                view_type: view_type.to_vk(),
                format: info.format,
                components,
                subresource_range: subresources,
                usage: info.usage,
            };
            log::trace!("vk::create_image_view({:?}, {:?}, {:?})", view_type, info.format, subresources);
            // An early return drops `view`, which destroys the views created so far.
            let handle = device.create_image_view(&create_info).map_err(|source| ImageViewError::ViewCreation {
                source,
                view_type,
                format: info.format,
                subresources,
                image: view.image.info().to_string(),
            })?;
            view.views[view_type] = Some(NativeView { handle, subresources });
        }
        Ok(view)
    }

    pub fn image(&self) -> &Rc<Image> {
        &self.image
    }

    pub fn info(&self) -> &ImageViewCreateInfo {
        &self.info
    }

    pub fn handle(&self, view_type: NativeViewType) -> Option<vk::ImageView> {
        self.views[view_type].map(|view| view.handle)
    }

    /// The view matching the declared view type, if there is one.
    pub fn default_handle(&self) -> Option<vk::ImageView> {
        NativeViewType::from_vk(self.info.view_type).and_then(|view_type| self.handle(view_type))
    }

    pub fn subresources(&self, view_type: NativeViewType) -> Option<vk::ImageSubresourceRange> {
        self.views[view_type].map(|view| view.subresources)
    }

    /// The native views that were created, in [`NativeViewType`] order.
    pub fn native_views(&self) -> impl Iterator<Item = (NativeViewType, &NativeView)> {
        self.views.iter().filter_map(|(view_type, view)| Some((view_type, view.as_ref()?)))
    }
}
