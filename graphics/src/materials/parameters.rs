//! Per-instance packed parameter storage.
//!
//! A [`ShaderParameterStore`] is the CPU-side mirror of one material
//! instance's slice of the GPU parameter buffer. It holds one packed byte
//! buffer per device (bindless indices legitimately differ across devices),
//! writes typed values at the offsets its [`ShaderParameterLayout`] computed,
//! and mirrors values into the instance's [`BindingTable`] where the layout
//! connected a slot.
//!
//! Typed access goes through [`ShaderParameterValue`], a closed tagged
//! variant with one encode and one decode per kind, dispatched on the
//! descriptor's recorded kind.

use std::collections::HashMap;
use std::sync::Arc;

use vermilion_core::color::Color;
use vermilion_core::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::device::{DeviceIndex, DeviceSet};
use crate::error::MaterialError;

use super::bindings::BindingTable;
use super::image::{ImageResolveContext, ImageResolver, MaterialImage};
use super::layout::{
    ParameterIndex, ShaderParameterDescriptor, ShaderParameterKind, ShaderParameterLayout,
    SrgInputSlot,
};

/// A typed material parameter value.
///
/// Images are not part of this enum; they follow a distinct per-device
/// protocol via [`ShaderParameterStore::set_image_parameter`]. Decoding an
/// image parameter yields its packed read index as [`Int`](Self::Int).
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderParameterValue {
    /// Boolean, encoded as a 4-byte integer (0 or 1).
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit unsigned integer.
    UInt(u32),
    /// 32-bit float.
    Float(f32),
    /// Two packed floats.
    Vector2(Vec2),
    /// Three packed floats.
    Vector3(Vec3),
    /// Four packed floats.
    Vector4(Vec4),
    /// 3x3 matrix, three padded row vectors.
    Matrix3(Mat3),
    /// 4x4 matrix, 16 row-major floats.
    Matrix4(Mat4),
    /// RGBA color, four packed floats.
    Color(Color),
}

impl ShaderParameterValue {
    /// The parameter kind this value encodes as.
    pub fn kind(&self) -> ShaderParameterKind {
        match self {
            Self::Bool(_) => ShaderParameterKind::Bool,
            Self::Int(_) => ShaderParameterKind::Int,
            Self::UInt(_) => ShaderParameterKind::UInt,
            Self::Float(_) => ShaderParameterKind::Float,
            Self::Vector2(_) => ShaderParameterKind::Vector2,
            Self::Vector3(_) => ShaderParameterKind::Vector3,
            Self::Vector4(_) => ShaderParameterKind::Vector4,
            Self::Matrix3(_) => ShaderParameterKind::Matrix3,
            Self::Matrix4(_) => ShaderParameterKind::Matrix4,
            Self::Color(_) => ShaderParameterKind::Color,
        }
    }

    /// Canonical byte encoding of the value.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Bool(b) => bytemuck::bytes_of(&(*b as u32)).to_vec(),
            Self::Int(v) => bytemuck::bytes_of(v).to_vec(),
            Self::UInt(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Float(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vector2(v) => bytemuck::cast_slice(v.as_slice()).to_vec(),
            Self::Vector3(v) => bytemuck::cast_slice(v.as_slice()).to_vec(),
            Self::Vector4(v) => bytemuck::cast_slice(v.as_slice()).to_vec(),
            Self::Matrix3(m) => {
                // Three row vectors, each padded to a full 16-byte register.
                let mut bytes = Vec::with_capacity(48);
                for row in 0..3 {
                    for col in 0..3 {
                        bytes.extend_from_slice(&m[(row, col)].to_ne_bytes());
                    }
                    bytes.extend_from_slice(&[0u8; 4]);
                }
                bytes
            }
            Self::Matrix4(m) => {
                let mut bytes = Vec::with_capacity(64);
                for row in 0..4 {
                    for col in 0..4 {
                        bytes.extend_from_slice(&m[(row, col)].to_ne_bytes());
                    }
                }
                bytes
            }
            Self::Color(c) => bytemuck::bytes_of(c).to_vec(),
        }
    }

    /// Decode `bytes` according to `kind`.
    ///
    /// Returns `None` when the byte count does not match the kind's canonical
    /// size, or for `Opaque` (which has no typed decoding). An image
    /// parameter decodes to its packed read index.
    pub fn decode(kind: ShaderParameterKind, bytes: &[u8]) -> Option<Self> {
        let expected = kind.element_size() * kind.element_count();
        if kind == ShaderParameterKind::Opaque || bytes.len() != expected {
            return None;
        }
        match kind {
            ShaderParameterKind::Bool => {
                let raw: u32 = bytemuck::pod_read_unaligned(bytes);
                if raw > 1 {
                    log::error!("GPU boolean contains illegal value {raw}");
                    debug_assert!(raw <= 1, "GPU boolean contains illegal value {raw}");
                }
                Some(Self::Bool(raw != 0))
            }
            ShaderParameterKind::Int | ShaderParameterKind::Image => {
                Some(Self::Int(bytemuck::pod_read_unaligned(bytes)))
            }
            ShaderParameterKind::UInt => Some(Self::UInt(bytemuck::pod_read_unaligned(bytes))),
            ShaderParameterKind::Float => Some(Self::Float(bytemuck::pod_read_unaligned(bytes))),
            ShaderParameterKind::Vector2 => {
                Some(Self::Vector2(Vec2::new(read_f32(bytes, 0), read_f32(bytes, 1))))
            }
            ShaderParameterKind::Vector3 => Some(Self::Vector3(Vec3::new(
                read_f32(bytes, 0),
                read_f32(bytes, 1),
                read_f32(bytes, 2),
            ))),
            ShaderParameterKind::Vector4 => Some(Self::Vector4(Vec4::new(
                read_f32(bytes, 0),
                read_f32(bytes, 1),
                read_f32(bytes, 2),
                read_f32(bytes, 3),
            ))),
            ShaderParameterKind::Matrix3 => {
                let mut m = Mat3::zeros();
                for row in 0..3 {
                    for col in 0..3 {
                        // Rows are stored at a 16-byte stride; the fourth
                        // float of each row is padding.
                        m[(row, col)] = read_f32(bytes, row * 4 + col);
                    }
                }
                Some(Self::Matrix3(m))
            }
            ShaderParameterKind::Matrix4 => {
                let mut m = Mat4::zeros();
                for row in 0..4 {
                    for col in 0..4 {
                        m[(row, col)] = read_f32(bytes, row * 4 + col);
                    }
                }
                Some(Self::Matrix4(m))
            }
            ShaderParameterKind::Color => Some(Self::Color(Color::new(
                read_f32(bytes, 0),
                read_f32(bytes, 1),
                read_f32(bytes, 2),
                read_f32(bytes, 3),
            ))),
            ShaderParameterKind::Opaque => None,
        }
    }
}

fn read_f32(bytes: &[u8], index: usize) -> f32 {
    bytemuck::pod_read_unaligned(&bytes[index * 4..index * 4 + 4])
}

/// Packed parameter storage for one material instance.
///
/// One instance of this type exists per material instance; its layout is
/// shared by every instance of the material type and must outlive the store.
/// Mutation is single-writer: the owning material's logic serializes `set_*`
/// calls externally.
pub struct ShaderParameterStore {
    layout: Arc<ShaderParameterLayout>,
    devices: DeviceSet,
    buffers: HashMap<DeviceIndex, Vec<u8>>,
    binding_table: Option<Arc<BindingTable>>,
    material_type_index: i32,
    material_instance_index: i32,
    change_id: u64,
}

impl ShaderParameterStore {
    /// Create a store against a finalized layout.
    ///
    /// Allocates one zero-filled buffer of the layout's total size per device
    /// and writes the `material_type` / `material_instance` bookkeeping
    /// parameters.
    pub fn new(
        material_type_index: i32,
        material_instance_index: i32,
        layout: Arc<ShaderParameterLayout>,
        binding_table: Option<Arc<BindingTable>>,
        devices: &DeviceSet,
    ) -> Result<Self, MaterialError> {
        if !layout.is_finalized() {
            return Err(MaterialError::LayoutNotFinalized(layout_name(&layout)));
        }
        if layout.descriptors().is_empty() {
            return Err(MaterialError::EmptyLayout(layout_name(&layout)));
        }
        if devices.is_empty() {
            return Err(MaterialError::NoDevices);
        }

        let buffers = devices
            .iter()
            .map(|device| (device, vec![0u8; layout.total_size()]))
            .collect();

        let mut store = Self {
            layout,
            devices: devices.clone(),
            buffers,
            binding_table,
            material_type_index,
            material_instance_index,
            change_id: 0,
        };

        let type_index = store.layout.parameter_index("material_type");
        if type_index.is_valid() {
            store.set_parameter(
                type_index,
                &ShaderParameterValue::UInt(material_type_index as u32),
            );
        }
        let instance_index = store.layout.parameter_index("material_instance");
        if instance_index.is_valid() {
            store.set_parameter(
                instance_index,
                &ShaderParameterValue::UInt(material_instance_index as u32),
            );
        }
        Ok(store)
    }

    /// The layout this store packs against.
    pub fn layout(&self) -> &Arc<ShaderParameterLayout> {
        &self.layout
    }

    /// The binding table values are mirrored into, if any.
    pub fn binding_table(&self) -> Option<&Arc<BindingTable>> {
        self.binding_table.as_ref()
    }

    /// Material type slot this store was constructed for.
    pub fn material_type_index(&self) -> i32 {
        self.material_type_index
    }

    /// Material instance slot within the type.
    pub fn material_instance_index(&self) -> i32 {
        self.material_instance_index
    }

    /// Monotonic counter bumped by every successful write.
    ///
    /// The material system compares this against its per-instance compiled
    /// change id to find stale instances.
    pub fn change_id(&self) -> u64 {
        self.change_id
    }

    /// Set a parameter by name.
    ///
    /// Returns `false` (with a diagnostic) if the name is unknown.
    pub fn set_parameter_by_name(&mut self, name: &str, value: &ShaderParameterValue) -> bool {
        let index = self.layout.parameter_index(name);
        if !index.is_valid() {
            log::error!("ShaderParameterStore: parameter '{name}' not found");
            return false;
        }
        self.set_parameter(index, value)
    }

    /// Set a parameter by handle.
    ///
    /// Writes the value's canonical encoding into every device buffer and
    /// mirrors it into the connected SRG slot, if any. The value's kind must
    /// match the descriptor's declared kind.
    pub fn set_parameter(&mut self, index: ParameterIndex, value: &ShaderParameterValue) -> bool {
        let layout = self.layout.clone();
        let Some(desc) = layout.descriptor(index) else {
            return false;
        };
        if desc.kind == ShaderParameterKind::Image {
            log::error!(
                "ShaderParameterStore: '{}' is an image parameter, use set_image_parameter",
                desc.name
            );
            debug_assert!(false, "image parameters use set_image_parameter");
            return false;
        }
        if desc.kind != value.kind() {
            log::error!(
                "ShaderParameterStore: kind mismatch for '{}': descriptor {}, value {}",
                desc.name,
                desc.type_name,
                value.kind().type_name()
            );
            debug_assert!(false, "parameter kind mismatch");
            return false;
        }

        let bytes = value.encode();
        debug_assert_eq!(
            bytes.len(),
            desc.buffer_binding.byte_size(),
            "encoded size mismatch for '{}'",
            desc.name
        );

        for device in self.devices.clone().iter() {
            self.write_device_bytes(desc.buffer_binding.offset, &bytes, device);
        }
        self.mirror_to_srg(desc, value, &bytes);
        self.change_id += 1;
        true
    }

    /// Set an image parameter through the configured resolver.
    ///
    /// Resolution is per device: each device's shader-visible reference is
    /// packed into that device's buffer only. A `None` image packs the
    /// invalid read index.
    pub fn set_image_parameter(
        &mut self,
        index: ParameterIndex,
        image: Option<&Arc<dyn MaterialImage>>,
        resolver: &dyn ImageResolver,
    ) -> bool {
        let layout = self.layout.clone();
        let Some(desc) = layout.descriptor(index) else {
            return false;
        };
        if desc.kind != ShaderParameterKind::Image {
            log::error!(
                "ShaderParameterStore: '{}' is not an image parameter",
                desc.name
            );
            debug_assert!(false, "not an image parameter");
            return false;
        }

        let binding_table = self.binding_table.clone();
        for device in self.devices.clone().iter() {
            let ctx = ImageResolveContext {
                device,
                material_type_index: self.material_type_index,
                material_instance_index: self.material_instance_index,
            };
            if let Some(read_index) =
                resolver.resolve(&ctx, image, desc, binding_table.as_deref())
            {
                self.write_device_bytes(
                    desc.buffer_binding.offset,
                    bytemuck::bytes_of(&read_index),
                    device,
                );
            }
        }
        self.change_id += 1;
        true
    }

    /// Write raw bytes at a parameter's offset, for every device.
    ///
    /// Bypasses typed encoding and SRG mirroring; the bytes are trusted to
    /// already be in canonical layout. No size validation is performed.
    pub fn set_parameter_raw(&mut self, index: ParameterIndex, bytes: &[u8]) -> bool {
        let layout = self.layout.clone();
        let Some(desc) = layout.descriptor(index) else {
            return false;
        };
        for device in self.devices.clone().iter() {
            self.write_device_bytes(desc.buffer_binding.offset, bytes, device);
        }
        self.change_id += 1;
        true
    }

    /// Single-device variant of [`set_parameter_raw`](Self::set_parameter_raw),
    /// for values that are inherently per-device (bindless read indices).
    pub fn set_parameter_raw_for_device(
        &mut self,
        index: ParameterIndex,
        bytes: &[u8],
        device: DeviceIndex,
    ) -> bool {
        let layout = self.layout.clone();
        let Some(desc) = layout.descriptor(index) else {
            return false;
        };
        self.write_device_bytes(desc.buffer_binding.offset, bytes, device);
        self.change_id += 1;
        true
    }

    /// Decode a parameter's current value from a device's packed buffer.
    ///
    /// Returns `None` for an unknown handle, a missing device, or an
    /// `Opaque` parameter.
    pub fn shader_parameter_data(
        &self,
        index: ParameterIndex,
        device: DeviceIndex,
    ) -> Option<ShaderParameterValue> {
        let desc = self.layout.descriptor(index)?;
        let raw = self.raw_buffer_parameter_data(desc, device);
        ShaderParameterValue::decode(desc.kind, raw)
    }

    /// Read-only view of a parameter's bytes in a device buffer.
    ///
    /// Empty when the device is absent from the store.
    pub fn raw_buffer_parameter_data(
        &self,
        desc: &ShaderParameterDescriptor,
        device: DeviceIndex,
    ) -> &[u8] {
        let Some(buffer) = self.buffers.get(&device) else {
            return &[];
        };
        let offset = desc.buffer_binding.offset;
        let end = desc.buffer_binding.end();
        if end > buffer.len() {
            return &[];
        }
        &buffer[offset..end]
    }

    /// Full packed buffer for a device.
    pub fn buffer_data(&self, device: DeviceIndex) -> Option<&[u8]> {
        self.buffers.get(&device).map(|b| b.as_slice())
    }

    /// Current byte size of a device's buffer.
    ///
    /// In steady state this equals the layout's total size for every device;
    /// out-of-range writes grow individual buffers past it.
    pub fn buffer_size(&self, device: DeviceIndex) -> Option<usize> {
        self.buffers.get(&device).map(|b| b.len())
    }

    /// The devices this store replicates across.
    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    fn write_device_bytes(&mut self, offset: usize, bytes: &[u8], device: DeviceIndex) {
        let Some(buffer) = self.buffers.get_mut(&device) else {
            return;
        };
        let end = offset + bytes.len();
        if buffer.len() < end {
            // Silent self-heal: grow zero-filled to fit. Divergence from the
            // layout's finalized size is observable via buffer_size().
            buffer.resize(end, 0);
        }
        buffer[offset..end].copy_from_slice(bytes);
    }

    fn mirror_to_srg(
        &self,
        desc: &ShaderParameterDescriptor,
        value: &ShaderParameterValue,
        bytes: &[u8],
    ) {
        let Some(table) = &self.binding_table else {
            return;
        };
        let SrgInputSlot::Constant(slot) = desc.srg_input else {
            return;
        };
        // A color may be bound to a 3-float slot; only RGB goes to the SRG
        // while the packed buffer keeps the full declared size.
        if matches!(value, ShaderParameterValue::Color(_))
            && table.layout().constant_byte_count(slot) == Some(12)
        {
            table.set_constant(slot, &bytes[..12]);
        } else {
            table.set_constant(slot, bytes);
        }
    }
}

impl std::fmt::Debug for ShaderParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderParameterStore")
            .field("material_type_index", &self.material_type_index)
            .field("material_instance_index", &self.material_instance_index)
            .field("device_count", &self.devices.len())
            .field("change_id", &self.change_id)
            .finish()
    }
}

static_assertions::assert_impl_all!(ShaderParameterStore: Send, Sync);

fn layout_name(layout: &ShaderParameterLayout) -> String {
    layout.label().unwrap_or("<unnamed>").to_string()
}
