//! Material instance coordination.
//!
//! [`MaterialSystem`] hands out dense slots for material types and their
//! instances, owns one shared packed parameter buffer per type, and runs the
//! per-frame [`compile`](MaterialSystem::compile) pass that copies dirty
//! instance data into those buffers.
//!
//! Slot allocation uses [`PersistentIndexAllocator`] at both levels so that
//! shader-visible indices stay dense and are reused before the range grows.
//! A material type's slot lives as long as at least one of its instances;
//! releasing the last instance releases the type slot too.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use vermilion_core::index_allocator::PersistentIndexAllocator;

use crate::device::{DeviceIndex, DeviceSet};
use crate::error::MaterialError;

use super::bindings::{BindingTable, SrgLayout};
use super::layout::ShaderParameterLayout;
use super::parameters::ShaderParameterStore;

/// Stable identity of a material type asset.
///
/// Two materials built from the same type asset share one
/// [`ShaderParameterLayout`] and one slot in the type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialTypeId(pub u64);

/// Caller-side identity of one registered material instance.
///
/// The system never interprets the value; it only has to be unique among
/// currently registered instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// Everything needed to register instances of a material type.
#[derive(Debug, Clone)]
pub struct MaterialTypeDefinition {
    /// Stable type identity.
    pub id: MaterialTypeId,
    /// Type name, for diagnostics.
    pub name: String,
    /// Finalized parameter layout shared by all instances.
    pub layout: Arc<ShaderParameterLayout>,
    /// Per-type shader interface. Instances of a type with no interface of
    /// its own share the scene-wide binding table instead.
    pub srg_layout: Option<Arc<SrgLayout>>,
}

/// Per-instance data returned by registration.
///
/// The caller keeps the store and writes parameters through it; the system
/// keeps its own reference for the compile pass.
#[derive(Clone)]
pub struct MaterialInstanceData {
    /// Slot of the owning type in the type table.
    pub material_type_index: i32,
    /// Slot of this instance within the type.
    pub material_instance_index: i32,
    /// The type's parameter layout.
    pub layout: Arc<ShaderParameterLayout>,
    /// Packed parameter storage for this instance.
    pub parameter_store: Arc<RwLock<ShaderParameterStore>>,
    /// Binding table parameter writes mirror into, if any.
    pub binding_table: Option<Arc<BindingTable>>,
}

struct InternalMaterialInstance {
    handle: MaterialHandle,
    store: Arc<RwLock<ShaderParameterStore>>,
    compiled_change_id: u64,
}

/// One packed buffer per device holding every instance of a type at
/// `stride`-byte slots.
struct SharedParameterBuffer {
    stride: usize,
    capacity: usize,
    buffers: HashMap<DeviceIndex, Vec<u8>>,
    read_indices: HashMap<DeviceIndex, i32>,
}

const INITIAL_INSTANCE_CAPACITY: usize = 4;

impl SharedParameterBuffer {
    fn new(stride: usize, devices: &DeviceSet) -> Self {
        let mut buffer = Self {
            stride,
            capacity: 0,
            buffers: devices.iter().map(|d| (d, Vec::new())).collect(),
            read_indices: HashMap::new(),
        };
        buffer.grow_to(INITIAL_INSTANCE_CAPACITY);
        buffer
    }

    /// Grow to hold at least `instance_count` slots. Returns `true` when a
    /// reallocation happened (the GPU-side buffer view must be re-registered).
    fn ensure_capacity(&mut self, instance_count: usize) -> bool {
        if instance_count <= self.capacity {
            return false;
        }
        self.grow_to(instance_count.next_power_of_two());
        true
    }

    fn grow_to(&mut self, capacity: usize) {
        self.capacity = capacity;
        let byte_size = capacity * self.stride;
        for buffer in self.buffers.values_mut() {
            buffer.resize(byte_size, 0);
        }
    }

    fn write_instance(&mut self, instance_index: usize, device: DeviceIndex, data: &[u8]) {
        let Some(buffer) = self.buffers.get_mut(&device) else {
            return;
        };
        let offset = instance_index * self.stride;
        // An instance buffer can outgrow the layout's finalized size through
        // raw writes; only the canonical stride reaches the shared buffer.
        let len = data.len().min(self.stride);
        buffer[offset..offset + len].copy_from_slice(&data[..len]);
    }
}

struct MaterialTypeData {
    id: MaterialTypeId,
    name: String,
    layout: Arc<ShaderParameterLayout>,
    srg_layout: Option<Arc<SrgLayout>>,
    instance_indices: PersistentIndexAllocator,
    instances: Vec<Option<InternalMaterialInstance>>,
    buffer: SharedParameterBuffer,
    buffer_read_indices_dirty: bool,
}

impl MaterialTypeData {
    fn live_instance_count(&self) -> usize {
        self.instance_indices.live_count()
    }
}

/// Central coordinator for material types and instances.
///
/// Single-owner mutation: registration, release and compile all take
/// `&mut self` and are serialized by the caller (the render frame). Instance
/// stores are shared out behind locks so gameplay code can write parameters
/// between compile passes.
pub struct MaterialSystem {
    devices: DeviceSet,
    scene_binding_table: Option<Arc<BindingTable>>,
    type_indices: PersistentIndexAllocator,
    types: Vec<Option<MaterialTypeData>>,
    type_index_by_id: HashMap<MaterialTypeId, i32>,
    handles: HashMap<MaterialHandle, (i32, i32)>,
    next_buffer_read_index: i32,
    total_uploads: u64,
}

impl MaterialSystem {
    /// Create a system for `devices`.
    ///
    /// `scene_srg_layout` describes the scene-wide shader interface; when
    /// present, instances of types without their own interface mirror
    /// parameters into one shared scene binding table.
    pub fn new(
        devices: DeviceSet,
        scene_srg_layout: Option<Arc<SrgLayout>>,
    ) -> Result<Self, MaterialError> {
        if devices.is_empty() {
            return Err(MaterialError::NoDevices);
        }
        let scene_binding_table = scene_srg_layout.map(|layout| Arc::new(BindingTable::new(layout)));
        Ok(Self {
            devices,
            scene_binding_table,
            type_indices: PersistentIndexAllocator::new(),
            types: Vec::new(),
            type_index_by_id: HashMap::new(),
            handles: HashMap::new(),
            next_buffer_read_index: 0,
            total_uploads: 0,
        })
    }

    /// The devices this system replicates parameter data across.
    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// The shared scene binding table, if the system was created with a scene
    /// shader interface.
    pub fn scene_binding_table(&self) -> Option<&Arc<BindingTable>> {
        self.scene_binding_table.as_ref()
    }

    /// Register one material instance of `definition`'s type.
    ///
    /// The type gets a slot on first registration; further instances of the
    /// same [`MaterialTypeId`] share it. Returns the slots, the store to
    /// write parameters through, and the binding table in use.
    pub fn register_material_instance(
        &mut self,
        handle: MaterialHandle,
        definition: &MaterialTypeDefinition,
    ) -> Result<MaterialInstanceData, MaterialError> {
        if self.handles.contains_key(&handle) {
            return Err(MaterialError::InvalidParameter(format!(
                "material handle {} is already registered",
                handle.0
            )));
        }
        if !definition.layout.is_finalized() {
            return Err(MaterialError::LayoutNotFinalized(definition.name.clone()));
        }
        if definition.layout.descriptors().is_empty() {
            return Err(MaterialError::EmptyLayout(definition.name.clone()));
        }

        let type_index = self.material_type_slot(definition);
        let slot = type_index as usize;
        let Some(type_data) = self.types[slot].as_mut() else {
            return Err(MaterialError::InvalidParameter(format!(
                "material type table slot {type_index} is empty"
            )));
        };

        // Types with their own shader interface get a fresh table per
        // instance; everything else mirrors into the shared scene table.
        let binding_table = match &type_data.srg_layout {
            Some(srg_layout) => Some(Arc::new(BindingTable::new(srg_layout.clone()))),
            None => self.scene_binding_table.clone(),
        };

        let instance_index = type_data.instance_indices.allocate();
        let store = ShaderParameterStore::new(
            type_index,
            instance_index,
            type_data.layout.clone(),
            binding_table.clone(),
            &self.devices,
        )?;
        let store = Arc::new(RwLock::new(store));

        let instance_slot = instance_index as usize;
        if type_data.instances.len() <= instance_slot {
            type_data.instances.resize_with(instance_slot + 1, || None);
        }
        type_data.instances[instance_slot] = Some(InternalMaterialInstance {
            handle,
            store: store.clone(),
            compiled_change_id: 0,
        });

        if type_data.buffer.ensure_capacity(instance_slot + 1) {
            Self::assign_buffer_read_indices(
                &mut type_data.buffer,
                &self.devices,
                &mut self.next_buffer_read_index,
            );
            type_data.buffer_read_indices_dirty = true;
        }

        let data = MaterialInstanceData {
            material_type_index: type_index,
            material_instance_index: instance_index,
            layout: type_data.layout.clone(),
            parameter_store: store,
            binding_table,
        };
        self.handles.insert(handle, (type_index, instance_index));
        log::debug!(
            "MaterialSystem: registered instance {instance_index} of type '{}' (slot {type_index})",
            definition.name
        );
        Ok(data)
    }

    /// Release a registered instance.
    ///
    /// Releasing the last instance of a type destroys the type's shared
    /// buffer and releases its slot. Returns `false` for an unknown handle.
    pub fn release_material_instance(&mut self, handle: MaterialHandle) -> bool {
        let Some((type_index, instance_index)) = self.handles.remove(&handle) else {
            log::error!("MaterialSystem: releasing unknown material handle {}", handle.0);
            return false;
        };
        let slot = type_index as usize;
        let Some(type_data) = self.types.get_mut(slot).and_then(Option::as_mut) else {
            return false;
        };

        type_data.instances[instance_index as usize] = None;
        type_data.instance_indices.release(instance_index);

        if type_data.live_instance_count() == 0 {
            log::debug!(
                "MaterialSystem: last instance released, destroying type '{}' (slot {type_index})",
                type_data.name
            );
            self.type_index_by_id.remove(&type_data.id);
            self.types[slot] = None;
            self.type_indices.release(type_index);
        }
        true
    }

    /// The type table slot for a registered type id.
    pub fn material_type_index(&self, id: MaterialTypeId) -> Option<i32> {
        self.type_index_by_id.get(&id).copied()
    }

    /// The parameter store of a registered instance.
    pub fn instance_store(
        &self,
        handle: MaterialHandle,
    ) -> Option<Arc<RwLock<ShaderParameterStore>>> {
        let (type_index, instance_index) = *self.handles.get(&handle)?;
        let type_data = self.types.get(type_index as usize)?.as_ref()?;
        let instance = type_data.instances.get(instance_index as usize)?.as_ref()?;
        Some(instance.store.clone())
    }

    /// Number of live instances of a type. Zero for an unoccupied slot.
    pub fn live_instance_count(&self, type_index: i32) -> usize {
        self.types
            .get(type_index as usize)
            .and_then(Option::as_ref)
            .map(|t| t.live_instance_count())
            .unwrap_or(0)
    }

    /// The shared packed buffer of a type for one device.
    pub fn parameter_buffer_data(&self, type_index: i32, device: DeviceIndex) -> Option<&[u8]> {
        let type_data = self.types.get(type_index as usize)?.as_ref()?;
        type_data.buffer.buffers.get(&device).map(|b| b.as_slice())
    }

    /// Per-instance slot size of a type's shared buffer.
    pub fn parameter_buffer_stride(&self, type_index: i32) -> Option<usize> {
        let type_data = self.types.get(type_index as usize)?.as_ref()?;
        Some(type_data.buffer.stride)
    }

    /// Shader-visible read index of a type's shared buffer on one device.
    ///
    /// Reassigned whenever the buffer reallocates.
    pub fn parameter_buffer_read_index(
        &self,
        type_index: i32,
        device: DeviceIndex,
    ) -> Option<i32> {
        let type_data = self.types.get(type_index as usize)?.as_ref()?;
        type_data.buffer.read_indices.get(&device).copied()
    }

    /// Total instance uploads performed by all compile passes so far.
    pub fn total_uploads(&self) -> u64 {
        self.total_uploads
    }

    /// Copy every dirty instance's packed data into its type's shared buffer.
    ///
    /// Idempotent: an instance is uploaded only when its store changed since
    /// it was last compiled, so a second pass with no writes in between does
    /// nothing. Returns the number of instances uploaded this pass.
    pub fn compile(&mut self) -> u64 {
        let devices = self.devices.clone();
        let mut uploads = 0u64;

        for type_data in self.types.iter_mut().flatten() {
            if type_data.buffer_read_indices_dirty {
                log::debug!(
                    "MaterialSystem: parameter buffer of type '{}' reallocated, new read indices in effect",
                    type_data.name
                );
                type_data.buffer_read_indices_dirty = false;
            }

            for instance in type_data.instances.iter_mut().flatten() {
                let store = instance.store.read();
                if store.change_id() == instance.compiled_change_id {
                    continue;
                }
                for device in devices.iter() {
                    if let Some(data) = store.buffer_data(device) {
                        type_data.buffer.write_instance(
                            store.material_instance_index() as usize,
                            device,
                            data,
                        );
                    }
                }
                instance.compiled_change_id = store.change_id();
                uploads += 1;
            }
        }

        self.total_uploads += uploads;
        uploads
    }

    /// Log a summary of every registered type and its live instances.
    pub fn debug_print_material_instances(&self) {
        log::debug!("MaterialSystem: {} registered type(s)", self.type_index_by_id.len());
        for (type_index, type_data) in self.types.iter().enumerate() {
            let Some(type_data) = type_data else {
                continue;
            };
            log::debug!(
                "  [{}] '{}': {} instance(s), stride {} bytes, capacity {}",
                type_index,
                type_data.name,
                type_data.live_instance_count(),
                type_data.buffer.stride,
                type_data.buffer.capacity,
            );
            for instance in type_data.instances.iter().flatten() {
                let store = instance.store.read();
                log::debug!(
                    "    instance {} (handle {}): change id {}, compiled {}",
                    store.material_instance_index(),
                    instance.handle.0,
                    store.change_id(),
                    instance.compiled_change_id,
                );
            }
        }
    }

    fn material_type_slot(&mut self, definition: &MaterialTypeDefinition) -> i32 {
        if let Some(&index) = self.type_index_by_id.get(&definition.id) {
            return index;
        }
        let index = self.type_indices.allocate();
        let slot = index as usize;
        if self.types.len() <= slot {
            self.types.resize_with(slot + 1, || None);
        }

        let mut buffer =
            SharedParameterBuffer::new(definition.layout.total_size(), &self.devices);
        Self::assign_buffer_read_indices(&mut buffer, &self.devices, &mut self.next_buffer_read_index);

        self.types[slot] = Some(MaterialTypeData {
            id: definition.id,
            name: definition.name.clone(),
            layout: definition.layout.clone(),
            srg_layout: definition.srg_layout.clone(),
            instance_indices: PersistentIndexAllocator::new(),
            instances: Vec::new(),
            buffer,
            buffer_read_indices_dirty: false,
        });
        self.type_index_by_id.insert(definition.id, index);
        index
    }

    fn assign_buffer_read_indices(
        buffer: &mut SharedParameterBuffer,
        devices: &DeviceSet,
        next_read_index: &mut i32,
    ) {
        for device in devices.iter() {
            buffer.read_indices.insert(device, *next_read_index);
            *next_read_index += 1;
        }
    }
}

impl std::fmt::Debug for MaterialSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialSystem")
            .field("device_count", &self.devices.len())
            .field("type_count", &self.type_index_by_id.len())
            .field("instance_count", &self.handles.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(MaterialSystem: Send, Sync);
