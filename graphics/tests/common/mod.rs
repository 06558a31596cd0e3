//! Shared helpers for material integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use vermilion_graphics::materials::{
    MaterialImage, ShaderParameterKind, ShaderParameterLayout, SrgLayout,
};
use vermilion_graphics::{DeviceIndex, DeviceSet, MaterialTypeDefinition, MaterialTypeId};

/// Install a test logger. Safe to call from every test; only the first call
/// takes effect.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An image whose bindless read index differs per device, like a real
/// texture whose descriptor heap slot is device-local.
pub struct TestImage {
    read_indices: HashMap<DeviceIndex, u32>,
}

impl TestImage {
    pub fn with_base_index(devices: &DeviceSet, base: u32) -> Arc<dyn MaterialImage> {
        Arc::new(Self {
            read_indices: devices.iter().map(|d| (d, base + d)).collect(),
        })
    }
}

impl MaterialImage for TestImage {
    fn bindless_read_index(&self, device: DeviceIndex) -> u32 {
        *self.read_indices.get(&device).unwrap_or(&0)
    }

    fn debug_name(&self) -> &str {
        "test_image"
    }
}

/// A representative PBR-style parameter layout: scalars, a color, a vector
/// and an image, connected to a matching shader interface.
pub fn standard_pbr_srg() -> SrgLayout {
    SrgLayout::new()
        .with_constant("base_color", 12)
        .with_constant("metallic", 4)
        .with_constant("roughness", 4)
        .with_constant("albedo_map", 4)
        .with_label("standard_pbr_srg")
}

pub fn standard_pbr_layout(srg: &SrgLayout) -> ShaderParameterLayout {
    let mut layout = ShaderParameterLayout::with_instance_fields();
    layout.add_material_parameter("base_color", ShaderParameterKind::Color, false, 1);
    layout.add_material_parameter("metallic", ShaderParameterKind::Float, false, 1);
    layout.add_material_parameter("roughness", ShaderParameterKind::Float, false, 1);
    layout.add_material_parameter("uv_offset", ShaderParameterKind::Vector2, false, 1);
    layout.add_material_parameter("albedo_map", ShaderParameterKind::Image, false, 1);
    layout.connect_parameters_to_srg(srg);
    layout.set_label("standard_pbr");
    layout.finalize();
    layout
}

pub fn standard_pbr_definition(id: u64) -> MaterialTypeDefinition {
    let srg = standard_pbr_srg();
    let layout = standard_pbr_layout(&srg);
    MaterialTypeDefinition {
        id: MaterialTypeId(id),
        name: "standard_pbr".to_string(),
        layout: Arc::new(layout),
        srg_layout: Some(Arc::new(srg)),
    }
}

/// Read one float out of a packed byte slice.
pub fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_ne_bytes(raw)
}

/// Read one i32 out of a packed byte slice.
pub fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_ne_bytes(raw)
}
