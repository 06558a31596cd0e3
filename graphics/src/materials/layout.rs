//! Parameter layout for material shader parameters.
//!
//! A [`ShaderParameterLayout`] is the binary-layout table for one material
//! type: an ordered, name-indexed list of [`ShaderParameterDescriptor`]s,
//! each placing one named parameter in the packed parameter buffer and
//! optionally connecting it to a shader binding slot.
//!
//! A layout is built incrementally while the material type loads (one `add_*`
//! call per declared property), connected to the type's SRG layout, then
//! finalized exactly once. After [`finalize`](ShaderParameterLayout::finalize)
//! it is read-only and shared by every instance of the type.

use std::collections::HashMap;

use super::bindings::{ConstantSlot, ImageSlot, SrgLayout};

/// Offset alignment for vector-register-sized values, in bytes.
const VECTOR_ALIGNMENT: usize = 16;

fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Dense handle into a [`ShaderParameterLayout`].
///
/// Stable only after the layout is finalized. Callers must check
/// [`is_valid`](Self::is_valid) before dereferencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterIndex(u32);

impl ParameterIndex {
    /// The invalid sentinel returned by failed lookups.
    pub const INVALID: ParameterIndex = ParameterIndex(u32::MAX);

    /// Whether this handle refers to a parameter.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for ParameterIndex {
    fn default() -> Self {
        Self::INVALID
    }
}

/// The closed set of value kinds a material parameter can hold.
///
/// Each kind fixes the canonical GPU byte layout of the parameter. `Opaque`
/// covers caller-sized values supplied by procedural property functors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderParameterKind {
    /// Boolean, stored as a 4-byte integer (0 or 1).
    Bool,
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    UInt,
    /// 32-bit float.
    Float,
    /// Two packed floats.
    Vector2,
    /// Three packed floats, 16-byte aligned.
    Vector3,
    /// Four packed floats.
    Vector4,
    /// 3x3 matrix as three padded row vectors (48 bytes).
    Matrix3,
    /// 4x4 matrix as 16 row-major floats (64 bytes).
    Matrix4,
    /// RGBA color as four floats.
    Color,
    /// Image reference, packed as a 4-byte read index.
    Image,
    /// Caller-sized value; byte layout supplied externally.
    Opaque,
}

impl ShaderParameterKind {
    /// Canonical element size in bytes. Zero for `Opaque` (caller-sized).
    pub fn element_size(self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::UInt | Self::Float | Self::Image => 4,
            Self::Vector2 => 8,
            Self::Vector3 => 12,
            Self::Vector4 | Self::Color => 16,
            Self::Matrix3 | Self::Matrix4 => 16,
            Self::Opaque => 0,
        }
    }

    /// Canonical element count: matrices occupy several padded vectors.
    pub fn element_count(self) -> usize {
        match self {
            Self::Matrix3 => 3,
            Self::Matrix4 => 4,
            _ => 1,
        }
    }

    /// Offset alignment within the packed buffer.
    pub fn alignment(self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::UInt | Self::Float | Self::Image => 4,
            Self::Vector2 => 8,
            Self::Vector3 | Self::Vector4 | Self::Color => VECTOR_ALIGNMENT,
            Self::Matrix3 | Self::Matrix4 => VECTOR_ALIGNMENT,
            Self::Opaque => 4,
        }
    }

    /// Shader-facing type name, for diagnostics and interface dumps.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Vector2 => "float2",
            Self::Vector3 => "float3",
            Self::Vector4 => "float4",
            Self::Matrix3 => "float3x3",
            Self::Matrix4 => "float4x4",
            Self::Color => "float4",
            Self::Image => "uint",
            Self::Opaque => "opaque",
        }
    }
}

/// Placement of one parameter within the packed parameter buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    /// Size of one element in bytes.
    pub element_size: usize,
    /// Number of elements.
    pub element_count: usize,
    /// Byte offset from the start of the buffer.
    pub offset: usize,
}

impl BufferBinding {
    /// Total byte size of the parameter.
    pub fn byte_size(&self) -> usize {
        self.element_size * self.element_count
    }

    /// One-past-the-end byte offset.
    pub fn end(&self) -> usize {
        self.offset + self.byte_size()
    }
}

/// SRG binding recorded on a descriptor after connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SrgInputSlot {
    /// The parameter is not bound to the shader resource group.
    #[default]
    None,
    /// Bound to a constant slot.
    Constant(ConstantSlot),
    /// Bound to an image slot.
    Image(ImageSlot),
}

impl SrgInputSlot {
    /// Whether any binding was recorded.
    pub fn is_some(self) -> bool {
        self != Self::None
    }
}

/// Static description of one named material parameter.
#[derive(Debug, Clone)]
pub struct ShaderParameterDescriptor {
    /// Parameter name, unique within the layout.
    pub name: String,
    /// Shader-facing type name, diagnostic only.
    pub type_name: String,
    /// Value kind driving encode/decode dispatch.
    pub kind: ShaderParameterKind,
    /// Placement in the packed buffer.
    pub buffer_binding: BufferBinding,
    /// SRG slot the parameter mirrors into, if connected.
    pub srg_input: SrgInputSlot,
    /// Whether the connected constant slot is a bindless read index.
    pub is_bindless_read_index: bool,
    /// Internal bookkeeping field, excluded from user-facing enumeration.
    pub is_pseudo_param: bool,
}

impl ShaderParameterDescriptor {
    pub(crate) fn new(
        name: &str,
        kind: ShaderParameterKind,
        element_size: usize,
        element_count: usize,
        offset: usize,
        is_pseudo_param: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            type_name: kind.type_name().to_string(),
            kind,
            buffer_binding: BufferBinding {
                element_size,
                element_count,
                offset,
            },
            srg_input: SrgInputSlot::None,
            is_bindless_read_index: false,
            is_pseudo_param,
        }
    }
}

/// Ordered, name-indexed parameter table for one material type.
#[derive(Debug, Default)]
pub struct ShaderParameterLayout {
    descriptors: Vec<ShaderParameterDescriptor>,
    names: HashMap<String, u32>,
    total_size: usize,
    finalized: bool,
    label: Option<String>,
}

impl ShaderParameterLayout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layout pre-seeded with the two bookkeeping pseudo-parameters
    /// every material instance carries: `material_type` and
    /// `material_instance`.
    pub fn with_instance_fields() -> Self {
        let mut layout = Self::new();
        layout.add_material_parameter("material_type", ShaderParameterKind::UInt, true, 1);
        layout.add_material_parameter("material_instance", ShaderParameterKind::UInt, true, 1);
        layout
    }

    fn end_offset(&self) -> usize {
        self.descriptors
            .last()
            .map(|d| d.buffer_binding.end())
            .unwrap_or(0)
    }

    fn push_descriptor(
        &mut self,
        name: &str,
        kind: ShaderParameterKind,
        element_size: usize,
        element_count: usize,
        alignment: usize,
        is_pseudo_param: bool,
    ) -> ParameterIndex {
        if self.finalized {
            log::error!("ShaderParameterLayout: cannot add '{name}' after finalization");
            return ParameterIndex::INVALID;
        }
        if self.names.contains_key(name) {
            log::error!("ShaderParameterLayout: duplicate parameter '{name}'");
            return ParameterIndex::INVALID;
        }
        let offset = align_up(self.end_offset(), alignment);
        let index = self.descriptors.len() as u32;
        self.descriptors.push(ShaderParameterDescriptor::new(
            name,
            kind,
            element_size,
            element_count,
            offset,
            is_pseudo_param,
        ));
        self.names.insert(name.to_string(), index);
        ParameterIndex(index)
    }

    /// Append a parameter with the canonical layout for `kind`.
    ///
    /// `count` multiplies the element count for array parameters. Returns
    /// [`ParameterIndex::INVALID`] after finalization or on a duplicate name.
    pub fn add_material_parameter(
        &mut self,
        name: &str,
        kind: ShaderParameterKind,
        is_pseudo_param: bool,
        count: usize,
    ) -> ParameterIndex {
        debug_assert!(kind != ShaderParameterKind::Opaque, "use add_typed_material_parameter");
        self.push_descriptor(
            name,
            kind,
            kind.element_size(),
            kind.element_count() * count,
            kind.alignment(),
            is_pseudo_param,
        )
    }

    /// Append a caller-sized parameter (procedural/functor-supplied values).
    ///
    /// `type_name` is recorded for diagnostics; `gpu_type_size` is the exact
    /// per-element byte size in the packed buffer.
    pub fn add_typed_material_parameter(
        &mut self,
        name: &str,
        type_name: &str,
        gpu_type_size: usize,
        is_pseudo_param: bool,
        count: usize,
    ) -> ParameterIndex {
        let alignment = if gpu_type_size >= VECTOR_ALIGNMENT {
            VECTOR_ALIGNMENT
        } else {
            4
        };
        let index = self.push_descriptor(
            name,
            ShaderParameterKind::Opaque,
            gpu_type_size,
            count,
            alignment,
            is_pseudo_param,
        );
        if let Some(desc) = self.descriptor_mut(index) {
            desc.type_name = type_name.to_string();
        }
        index
    }

    /// O(1) name lookup. Returns [`ParameterIndex::INVALID`] if absent.
    pub fn parameter_index(&self, name: &str) -> ParameterIndex {
        self.names
            .get(name)
            .map(|&i| ParameterIndex(i))
            .unwrap_or(ParameterIndex::INVALID)
    }

    /// Descriptor for a handle, or `None` for an invalid/out-of-range handle.
    pub fn descriptor(&self, index: ParameterIndex) -> Option<&ShaderParameterDescriptor> {
        if !index.is_valid() {
            return None;
        }
        self.descriptors.get(index.as_usize())
    }

    /// Mutable descriptor access; same bounds rules as [`descriptor`](Self::descriptor).
    pub fn descriptor_mut(
        &mut self,
        index: ParameterIndex,
    ) -> Option<&mut ShaderParameterDescriptor> {
        if !index.is_valid() {
            return None;
        }
        self.descriptors.get_mut(index.as_usize())
    }

    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> &[ShaderParameterDescriptor] {
        &self.descriptors
    }

    /// Count of descriptors excluding internal bookkeeping fields.
    ///
    /// For UI/debug enumeration, not for buffer sizing.
    pub fn non_pseudo_parameter_count(&self) -> usize {
        self.descriptors
            .iter()
            .filter(|d| !d.is_pseudo_param)
            .count()
    }

    /// Connect descriptors to matching slots of an SRG layout.
    ///
    /// A descriptor connects when a slot with the same name exists and the
    /// types are compatible: the declared byte sizes must match exactly,
    /// except a color may bind either a 3-float or 4-float slot, and an image
    /// connects to a 4-byte read-index constant or to an image slot. Returns
    /// the number of successful connections.
    pub fn connect_parameters_to_srg(&mut self, srg_layout: &SrgLayout) -> usize {
        let mut connected = 0;
        for desc in &mut self.descriptors {
            if connect_descriptor(desc, srg_layout) {
                connected += 1;
            }
        }
        connected
    }

    /// Lock in offsets and compute the total buffer size.
    ///
    /// Pads the total size to a 16-byte boundary. Idempotent; must be called
    /// before any parameter store is constructed against the layout.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.total_size = align_up(self.end_offset(), VECTOR_ALIGNMENT);
        self.finalized = true;
    }

    /// Whether [`finalize`](Self::finalize) has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Total packed buffer size.
    ///
    /// Final only after [`finalize`](Self::finalize); before that it reflects
    /// the current (still growing) end of the layout.
    pub fn total_size(&self) -> usize {
        if self.finalized {
            self.total_size
        } else {
            self.end_offset()
        }
    }

    /// Set a debug label, typically the material type's name.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// The layout label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Clear all descriptors and unlock the layout.
    ///
    /// The label survives; it names the material type, not the contents.
    pub fn reset(&mut self) {
        self.descriptors.clear();
        self.names.clear();
        self.total_size = 0;
        self.finalized = false;
    }
}

fn connect_descriptor(desc: &mut ShaderParameterDescriptor, srg_layout: &SrgLayout) -> bool {
    if desc.kind == ShaderParameterKind::Image {
        // Prefer the dedicated read-index constant; fall back to a direct
        // image binding. The shader interface declares at most one of the
        // two for a given name.
        if let Some(slot) = srg_layout.constant_slot(&desc.name) {
            if srg_layout.constant_byte_count(slot) == Some(4) {
                desc.srg_input = SrgInputSlot::Constant(slot);
                desc.is_bindless_read_index = true;
                return true;
            }
        }
        if let Some(slot) = srg_layout.image_slot(&desc.name) {
            desc.srg_input = SrgInputSlot::Image(slot);
            return true;
        }
        return false;
    }

    let Some(slot) = srg_layout.constant_slot(&desc.name) else {
        return false;
    };
    let Some(byte_count) = srg_layout.constant_byte_count(slot) else {
        return false;
    };
    let declared = desc.buffer_binding.byte_size();
    let compatible = byte_count == declared
        || (desc.kind == ShaderParameterKind::Color && byte_count == 12);
    if !compatible {
        log::error!(
            "ShaderParameterLayout: '{}' ({} bytes) is incompatible with SRG constant ({} bytes)",
            desc.name,
            declared,
            byte_count
        );
        return false;
    }
    desc.srg_input = SrgInputSlot::Constant(slot);
    true
}
