//! Image parameter indirection.
//!
//! Image parameters do not pack pixel data into the parameter buffer; they
//! pack a 4-byte reference the shader uses to reach the image. Two protocols
//! exist for producing that reference, behind one [`ImageResolver`] seam:
//!
//! - [`BindlessResolver`] (default, `bindless` feature): the image's
//!   per-device bindless descriptor index is packed, and mirrored into a
//!   dedicated read-index constant slot when the shader declares one.
//! - [`RegistryResolver`]: the image is bound directly to an image slot;
//!   when the shader has no such slot, an external
//!   [`MaterialTextureRegistry`] hands out a registration index instead.

use std::sync::Arc;

use crate::device::DeviceIndex;

use super::bindings::BindingTable;
use super::layout::{ShaderParameterDescriptor, SrgInputSlot};

/// Read-index value packed for a null or unresolvable image.
pub const INVALID_READ_INDEX: i32 = -1;

/// A GPU image as seen by the material system.
///
/// Implemented by the engine's texture resources. Only the per-device
/// bindless descriptor index is needed here; image creation and upload are
/// out of scope.
pub trait MaterialImage: Send + Sync {
    /// Bindless descriptor heap slot for this image on `device`.
    fn bindless_read_index(&self, device: DeviceIndex) -> u32;

    /// Name for diagnostics.
    fn debug_name(&self) -> &str {
        ""
    }
}

/// External registry for the non-bindless fallback path.
///
/// A collaborator outside this crate; `register_material_texture` returns
/// the index the shader will use to look the texture up.
pub trait MaterialTextureRegistry: Send + Sync {
    /// Register `image` for a material instance and return its lookup index.
    fn register_material_texture(
        &self,
        material_type_index: i32,
        material_instance_index: i32,
        image: &Arc<dyn MaterialImage>,
    ) -> i32;
}

/// Per-device context for an image resolution.
#[derive(Debug, Clone, Copy)]
pub struct ImageResolveContext {
    /// Device the reference is being resolved for.
    pub device: DeviceIndex,
    /// Material type slot of the owning instance.
    pub material_type_index: i32,
    /// Material instance slot within the type.
    pub material_instance_index: i32,
}

/// Resolves an image to a shader-visible reference for one device.
///
/// Returns `Some(index)` when a 4-byte index should be packed into the
/// parameter buffer, or `None` when the image was bound directly and nothing
/// needs packing.
pub trait ImageResolver {
    /// Resolve `image` for the device in `ctx`, updating `table` as a side
    /// effect where a binding slot exists.
    fn resolve(
        &self,
        ctx: &ImageResolveContext,
        image: Option<&Arc<dyn MaterialImage>>,
        desc: &ShaderParameterDescriptor,
        table: Option<&BindingTable>,
    ) -> Option<i32>;
}

/// Bindless image resolution.
///
/// Packs the per-device bindless read index (`-1` for a null image). When
/// the descriptor is connected to a read-index constant slot the index is
/// mirrored there; when it is connected to an image slot instead, the image
/// object is bound directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct BindlessResolver;

impl ImageResolver for BindlessResolver {
    fn resolve(
        &self,
        ctx: &ImageResolveContext,
        image: Option<&Arc<dyn MaterialImage>>,
        desc: &ShaderParameterDescriptor,
        table: Option<&BindingTable>,
    ) -> Option<i32> {
        let read_index = image
            .map(|img| img.bindless_read_index(ctx.device) as i32)
            .unwrap_or(INVALID_READ_INDEX);

        if let Some(table) = table {
            // The shader interface declares at most one of the two slots for
            // a given name, so exactly one of these branches can apply.
            match desc.srg_input {
                SrgInputSlot::Constant(slot) => {
                    table.set_constant(slot, bytemuck::bytes_of(&read_index));
                }
                SrgInputSlot::Image(slot) => {
                    table.set_image(slot, image.cloned());
                }
                SrgInputSlot::None => {}
            }
        }
        Some(read_index)
    }
}

/// Non-bindless image resolution.
///
/// Binds the image directly when the shader declares an image slot; failing
/// that, asks the external registry for a lookup index to pack. A missing
/// registry resolves to [`INVALID_READ_INDEX`].
#[derive(Default, Clone)]
pub struct RegistryResolver {
    registry: Option<Arc<dyn MaterialTextureRegistry>>,
}

impl RegistryResolver {
    /// Create a resolver over an optional registry (the registry lookup may
    /// legitimately be unavailable).
    pub fn new(registry: Option<Arc<dyn MaterialTextureRegistry>>) -> Self {
        Self { registry }
    }
}

impl ImageResolver for RegistryResolver {
    fn resolve(
        &self,
        ctx: &ImageResolveContext,
        image: Option<&Arc<dyn MaterialImage>>,
        desc: &ShaderParameterDescriptor,
        table: Option<&BindingTable>,
    ) -> Option<i32> {
        if let (Some(table), SrgInputSlot::Image(slot)) = (table, desc.srg_input) {
            if table.set_image(slot, image.cloned()) {
                return None;
            }
        }
        let index = match (image, &self.registry) {
            (Some(image), Some(registry)) => registry.register_material_texture(
                ctx.material_type_index,
                ctx.material_instance_index,
                image,
            ),
            _ => INVALID_READ_INDEX,
        };
        Some(index)
    }
}

/// The resolver selected at build configuration time.
#[cfg(feature = "bindless")]
pub type DefaultImageResolver = BindlessResolver;

/// The resolver selected at build configuration time.
#[cfg(not(feature = "bindless"))]
pub type DefaultImageResolver = RegistryResolver;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::layout::ShaderParameterKind;

    use std::collections::HashMap;

    struct TestImage {
        read_indices: HashMap<DeviceIndex, u32>,
    }

    impl MaterialImage for TestImage {
        fn bindless_read_index(&self, device: DeviceIndex) -> u32 {
            *self.read_indices.get(&device).unwrap_or(&0)
        }

        fn debug_name(&self) -> &str {
            "test_image"
        }
    }

    fn image_descriptor(name: &str) -> ShaderParameterDescriptor {
        ShaderParameterDescriptor::new(name, ShaderParameterKind::Image, 4, 1, 0, false)
    }

    fn test_image(indices: &[(DeviceIndex, u32)]) -> Arc<dyn MaterialImage> {
        Arc::new(TestImage {
            read_indices: indices.iter().copied().collect(),
        })
    }

    #[test]
    fn test_bindless_null_image_resolves_to_invalid() {
        let ctx = ImageResolveContext {
            device: 0,
            material_type_index: 0,
            material_instance_index: 0,
        };
        let desc = image_descriptor("albedo_map");
        let resolved = BindlessResolver.resolve(&ctx, None, &desc, None);
        assert_eq!(resolved, Some(INVALID_READ_INDEX));
    }

    #[test]
    fn test_bindless_per_device_indices() {
        let image = test_image(&[(0, 7), (1, 42)]);
        let desc = image_descriptor("albedo_map");

        for (device, expected) in [(0, 7), (1, 42)] {
            let ctx = ImageResolveContext {
                device,
                material_type_index: 0,
                material_instance_index: 0,
            };
            let resolved = BindlessResolver.resolve(&ctx, Some(&image), &desc, None);
            assert_eq!(resolved, Some(expected));
        }
    }

    #[test]
    fn test_registry_fallback_when_no_image_slot() {
        struct CountingRegistry;
        impl MaterialTextureRegistry for CountingRegistry {
            fn register_material_texture(
                &self,
                material_type_index: i32,
                material_instance_index: i32,
                _image: &Arc<dyn MaterialImage>,
            ) -> i32 {
                material_type_index * 100 + material_instance_index
            }
        }

        let resolver = RegistryResolver::new(Some(Arc::new(CountingRegistry)));
        let image = test_image(&[(0, 7)]);
        let desc = image_descriptor("albedo_map");
        let ctx = ImageResolveContext {
            device: 0,
            material_type_index: 2,
            material_instance_index: 3,
        };

        // No binding table at all: registry index is packed.
        assert_eq!(resolver.resolve(&ctx, Some(&image), &desc, None), Some(203));
    }

    #[test]
    fn test_registry_unavailable_resolves_to_invalid() {
        let resolver = RegistryResolver::new(None);
        let image = test_image(&[(0, 7)]);
        let desc = image_descriptor("albedo_map");
        let ctx = ImageResolveContext {
            device: 0,
            material_type_index: 0,
            material_instance_index: 0,
        };
        assert_eq!(
            resolver.resolve(&ctx, Some(&image), &desc, None),
            Some(INVALID_READ_INDEX)
        );
    }
}
