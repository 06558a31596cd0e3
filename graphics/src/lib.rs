//! # Vermilion Graphics
//!
//! GPU-facing material parameter management for Vermilion.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ShaderParameterLayout`] - Packed-buffer layout compiled from a material
//!   type's parameter declarations
//! - [`ShaderParameterStore`] - Per-instance parameter values as ready-to-upload
//!   bytes, replicated per device
//! - [`MaterialSystem`] - Dense type/instance slot allocation and the
//!   dirty-tracked compile pass
//! - Bindless and registry-based image parameter resolution
//!
//! ## Example
//!
//! ```ignore
//! use vermilion_graphics::{MaterialSystem, MaterialHandle, ShaderParameterValue};
//!
//! let mut system = MaterialSystem::new(devices, None)?;
//! let instance = system.register_material_instance(MaterialHandle(1), &definition)?;
//! instance
//!     .parameter_store
//!     .write()
//!     .set_parameter_by_name("metallic", &ShaderParameterValue::Float(0.8));
//! system.compile();
//! ```

pub mod device;
pub mod error;
pub mod materials;

// Re-export main types for convenience
pub use device::{DeviceIndex, DeviceSet, DEFAULT_DEVICE};
pub use error::MaterialError;
pub use materials::{
    BindingTable, DefaultImageResolver, MaterialHandle, MaterialImage, MaterialInstanceData,
    MaterialSystem, MaterialTypeDefinition, MaterialTypeId, ParameterIndex,
    ShaderParameterKind, ShaderParameterLayout, ShaderParameterStore, ShaderParameterValue,
    SrgLayout,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Vermilion Graphics v{} initialized", VERSION);
}
