//! Integration tests for the material parameter pipeline.
//!
//! These tests drive the full path a renderer takes: build a parameter layout
//! from a material type's declarations, register instances, write typed
//! values, run the compile pass and verify the packed bytes that would be
//! uploaded. Tests are parameterized over device counts using `rstest`
//! because parameter data is replicated per device.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{
    TestImage, init_test_logging, read_f32, read_i32, standard_pbr_definition,
    standard_pbr_layout, standard_pbr_srg,
};
use vermilion_core::color::Color;
use vermilion_core::math::Vec2;
use vermilion_graphics::materials::BindlessResolver;
use vermilion_graphics::{
    DeviceSet, MaterialHandle, MaterialSystem, ShaderParameterValue, DEFAULT_DEVICE,
};

// ============================================================================
// Layout / Store Round Trips
// ============================================================================

/// A value written through the store comes back identical from every device.
#[rstest]
#[case::single_device(1)]
#[case::dual_device(2)]
fn test_typed_write_visible_on_all_devices(#[case] device_count: u32) {
    init_test_logging();
    let devices = DeviceSet::with_count(device_count);
    let mut system = MaterialSystem::new(devices.clone(), None).unwrap();
    let def = standard_pbr_definition(1);

    let instance = system
        .register_material_instance(MaterialHandle(1), &def)
        .unwrap();

    let metallic = def.layout.parameter_index("metallic");
    let uv_offset = def.layout.parameter_index("uv_offset");
    {
        let mut store = instance.parameter_store.write();
        assert!(store.set_parameter(metallic, &ShaderParameterValue::Float(0.8)));
        assert!(store.set_parameter(
            uv_offset,
            &ShaderParameterValue::Vector2(Vec2::new(0.25, -0.5))
        ));
    }

    let store = instance.parameter_store.read();
    for device in devices.iter() {
        assert_eq!(
            store.shader_parameter_data(metallic, device),
            Some(ShaderParameterValue::Float(0.8))
        );
        assert_eq!(
            store.shader_parameter_data(uv_offset, device),
            Some(ShaderParameterValue::Vector2(Vec2::new(0.25, -0.5)))
        );
    }
}

/// Writing a color mirrors its RGB part into the 3-float shader constant
/// while the packed buffer keeps all four channels.
#[rstest]
#[case::single_device(1)]
#[case::dual_device(2)]
fn test_color_parameter_mirrors_rgb_to_srg(#[case] device_count: u32) {
    init_test_logging();
    let devices = DeviceSet::with_count(device_count);
    let mut system = MaterialSystem::new(devices, None).unwrap();
    let def = standard_pbr_definition(1);

    let instance = system
        .register_material_instance(MaterialHandle(1), &def)
        .unwrap();

    let base_color = def.layout.parameter_index("base_color");
    let color = Color::new(0.2, 0.4, 0.6, 0.8);
    instance
        .parameter_store
        .write()
        .set_parameter(base_color, &ShaderParameterValue::Color(color));

    let table = instance.binding_table.as_ref().unwrap();
    let slot = table.layout().constant_slot("base_color").unwrap();
    let bound = table.constant_bytes(slot).unwrap();
    assert_eq!(bound.len(), 12);
    assert_eq!(read_f32(&bound, 0), 0.2);
    assert_eq!(read_f32(&bound, 4), 0.4);
    assert_eq!(read_f32(&bound, 8), 0.6);

    let store = instance.parameter_store.read();
    assert_eq!(
        store.shader_parameter_data(base_color, DEFAULT_DEVICE),
        Some(ShaderParameterValue::Color(color))
    );
}

// ============================================================================
// Image Parameters
// ============================================================================

/// Image parameters pack a per-device bindless read index; a null image
/// packs -1 everywhere.
#[rstest]
#[case::single_device(1)]
#[case::quad_device(4)]
fn test_image_parameter_per_device_indices(#[case] device_count: u32) {
    init_test_logging();
    let devices = DeviceSet::with_count(device_count);
    let mut system = MaterialSystem::new(devices.clone(), None).unwrap();
    let def = standard_pbr_definition(1);

    let instance = system
        .register_material_instance(MaterialHandle(1), &def)
        .unwrap();

    let albedo = def.layout.parameter_index("albedo_map");
    let image = TestImage::with_base_index(&devices, 100);
    instance.parameter_store.write().set_image_parameter(
        albedo,
        Some(&image),
        &BindlessResolver,
    );

    {
        let store = instance.parameter_store.read();
        for device in devices.iter() {
            assert_eq!(
                store.shader_parameter_data(albedo, device),
                Some(ShaderParameterValue::Int(100 + device as i32))
            );
        }
    }

    // Unbinding packs the invalid index on every device.
    instance
        .parameter_store
        .write()
        .set_image_parameter(albedo, None, &BindlessResolver);
    let store = instance.parameter_store.read();
    for device in devices.iter() {
        assert_eq!(
            store.shader_parameter_data(albedo, device),
            Some(ShaderParameterValue::Int(-1))
        );
    }
}

// ============================================================================
// Compile Pass
// ============================================================================

/// The compile pass packs each instance's bytes at its slot in the type's
/// shared buffer, on every device.
#[rstest]
#[case::single_device(1)]
#[case::dual_device(2)]
fn test_compile_packs_instances_at_their_slots(#[case] device_count: u32) {
    init_test_logging();
    let devices = DeviceSet::with_count(device_count);
    let mut system = MaterialSystem::new(devices.clone(), None).unwrap();
    let def = standard_pbr_definition(1);

    let first = system
        .register_material_instance(MaterialHandle(1), &def)
        .unwrap();
    let second = system
        .register_material_instance(MaterialHandle(2), &def)
        .unwrap();
    assert_eq!(first.material_instance_index, 0);
    assert_eq!(second.material_instance_index, 1);

    let roughness = def.layout.parameter_index("roughness");
    first
        .parameter_store
        .write()
        .set_parameter(roughness, &ShaderParameterValue::Float(0.1));
    second
        .parameter_store
        .write()
        .set_parameter(roughness, &ShaderParameterValue::Float(0.9));
    assert_eq!(system.compile(), 2);

    let type_index = first.material_type_index;
    let stride = system.parameter_buffer_stride(type_index).unwrap();
    let offset = def
        .layout
        .descriptor(roughness)
        .unwrap()
        .buffer_binding
        .offset;
    for device in devices.iter() {
        let buffer = system.parameter_buffer_data(type_index, device).unwrap();
        assert_eq!(read_f32(buffer, offset), 0.1);
        assert_eq!(read_f32(buffer, stride + offset), 0.9);
    }
}

/// Compiling twice without writes in between uploads nothing the second time.
#[rstest]
#[case::single_device(1)]
#[case::dual_device(2)]
fn test_compile_is_idempotent(#[case] device_count: u32) {
    init_test_logging();
    let mut system = MaterialSystem::new(DeviceSet::with_count(device_count), None).unwrap();
    let def = standard_pbr_definition(1);

    let instance = system
        .register_material_instance(MaterialHandle(1), &def)
        .unwrap();
    assert_eq!(system.compile(), 1);
    assert_eq!(system.compile(), 0);

    let metallic = def.layout.parameter_index("metallic");
    instance
        .parameter_store
        .write()
        .set_parameter(metallic, &ShaderParameterValue::Float(0.5));
    assert_eq!(system.compile(), 1);
    assert_eq!(system.compile(), 0);
}

/// Instance bookkeeping fields land in the shared buffer where the shader
/// expects to find its own type and instance slots.
#[rstest]
#[case::single_device(1)]
fn test_compile_packs_bookkeeping_fields(#[case] device_count: u32) {
    init_test_logging();
    let mut system = MaterialSystem::new(DeviceSet::with_count(device_count), None).unwrap();
    let def = standard_pbr_definition(1);

    let _first = system
        .register_material_instance(MaterialHandle(1), &def)
        .unwrap();
    let second = system
        .register_material_instance(MaterialHandle(2), &def)
        .unwrap();
    system.compile();

    let type_index = second.material_type_index;
    let stride = system.parameter_buffer_stride(type_index).unwrap();
    let buffer = system
        .parameter_buffer_data(type_index, DEFAULT_DEVICE)
        .unwrap();

    let type_offset = def
        .layout
        .descriptor(def.layout.parameter_index("material_type"))
        .unwrap()
        .buffer_binding
        .offset;
    let instance_offset = def
        .layout
        .descriptor(def.layout.parameter_index("material_instance"))
        .unwrap()
        .buffer_binding
        .offset;

    assert_eq!(read_i32(buffer, stride + type_offset), type_index);
    assert_eq!(
        read_i32(buffer, stride + instance_offset),
        second.material_instance_index
    );
}

// ============================================================================
// Instance Lifecycle
// ============================================================================

/// Released instance slots are reused before the range grows, and releasing
/// the last instance of a type releases the type slot too.
#[rstest]
#[case::single_device(1)]
fn test_instance_lifecycle(#[case] device_count: u32) {
    init_test_logging();
    let mut system = MaterialSystem::new(DeviceSet::with_count(device_count), None).unwrap();
    let def = standard_pbr_definition(1);

    for i in 0..3 {
        system
            .register_material_instance(MaterialHandle(i), &def)
            .unwrap();
    }
    assert!(system.release_material_instance(MaterialHandle(1)));

    let replacement = system
        .register_material_instance(MaterialHandle(10), &def)
        .unwrap();
    assert_eq!(replacement.material_instance_index, 1);

    for handle in [0, 2, 10] {
        assert!(system.release_material_instance(MaterialHandle(handle)));
    }
    assert!(system.material_type_index(def.id).is_none());
}

/// Two material types compile independently into their own shared buffers.
#[rstest]
#[case::single_device(1)]
fn test_two_types_compile_independently(#[case] device_count: u32) {
    init_test_logging();
    let mut system = MaterialSystem::new(DeviceSet::with_count(device_count), None).unwrap();
    let pbr = standard_pbr_definition(1);
    let mut skin = standard_pbr_definition(2);
    skin.name = "skin".to_string();

    let a = system
        .register_material_instance(MaterialHandle(1), &pbr)
        .unwrap();
    let b = system
        .register_material_instance(MaterialHandle(2), &skin)
        .unwrap();
    assert_ne!(a.material_type_index, b.material_type_index);

    let metallic = pbr.layout.parameter_index("metallic");
    a.parameter_store
        .write()
        .set_parameter(metallic, &ShaderParameterValue::Float(0.3));
    assert_eq!(system.compile(), 2);

    let offset = pbr
        .layout
        .descriptor(metallic)
        .unwrap()
        .buffer_binding
        .offset;
    let a_buffer = system
        .parameter_buffer_data(a.material_type_index, DEFAULT_DEVICE)
        .unwrap();
    let b_buffer = system
        .parameter_buffer_data(b.material_type_index, DEFAULT_DEVICE)
        .unwrap();
    assert_eq!(read_f32(a_buffer, offset), 0.3);
    assert_eq!(read_f32(b_buffer, offset), 0.0);
}

// ============================================================================
// Scene Shader Interface
// ============================================================================

/// Types without their own shader interface share the scene binding table.
#[rstest]
#[case::single_device(1)]
fn test_scene_table_shared_across_types(#[case] device_count: u32) {
    init_test_logging();
    let scene_srg = Arc::new(standard_pbr_srg());
    let mut system =
        MaterialSystem::new(DeviceSet::with_count(device_count), Some(scene_srg.clone())).unwrap();

    let srg = standard_pbr_srg();
    let mut def = standard_pbr_definition(1);
    def.layout = Arc::new(standard_pbr_layout(&srg));
    def.srg_layout = None;

    let instance = system
        .register_material_instance(MaterialHandle(1), &def)
        .unwrap();
    let scene_table = system.scene_binding_table().unwrap();
    assert!(Arc::ptr_eq(
        instance.binding_table.as_ref().unwrap(),
        scene_table
    ));

    // Parameter writes land in the scene table.
    let metallic = def.layout.parameter_index("metallic");
    instance
        .parameter_store
        .write()
        .set_parameter(metallic, &ShaderParameterValue::Float(0.6));
    let slot = scene_srg.constant_slot("metallic").unwrap();
    assert_eq!(
        scene_table.constant_bytes(slot).unwrap(),
        0.6f32.to_ne_bytes()
    );
}
