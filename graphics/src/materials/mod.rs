//! Per-material shader parameter management.
//!
//! Material types declare named, typed parameters; this module compiles those
//! declarations into a packed buffer layout, stores per-instance parameter
//! values as ready-to-upload bytes, and coordinates dense shader-visible
//! slots for types and instances.
//!
//! The pieces, bottom up:
//! - [`layout`] - [`ShaderParameterLayout`]: offsets, sizes and SRG
//!   connections for one material type
//! - [`parameters`] - [`ShaderParameterStore`]: per-instance packed buffers
//!   with typed access, replicated per device
//! - [`bindings`] - [`SrgLayout`] / [`BindingTable`]: the shader-interface
//!   slots parameter writes mirror into
//! - [`image`] - image parameter indirection (bindless read indices or
//!   registry lookups)
//! - [`system`] - [`MaterialSystem`]: slot allocation, shared per-type
//!   buffers and the dirty-tracked compile pass

pub mod bindings;
pub mod image;
pub mod layout;
pub mod parameters;
pub mod system;

pub use bindings::{BindingTable, ConstantSlot, ImageSlot, SrgLayout};
pub use image::{
    BindlessResolver, DefaultImageResolver, ImageResolveContext, ImageResolver, MaterialImage,
    MaterialTextureRegistry, RegistryResolver, INVALID_READ_INDEX,
};
pub use layout::{
    BufferBinding, ParameterIndex, ShaderParameterDescriptor, ShaderParameterKind,
    ShaderParameterLayout, SrgInputSlot,
};
pub use parameters::{ShaderParameterStore, ShaderParameterValue};
pub use system::{
    MaterialHandle, MaterialInstanceData, MaterialSystem, MaterialTypeDefinition, MaterialTypeId,
};
