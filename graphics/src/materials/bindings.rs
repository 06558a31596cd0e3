//! Shader binding tables for material parameters.
//!
//! An [`SrgLayout`] describes the named slots a shader's resource group
//! exposes: sized constants and images. A [`BindingTable`] is the
//! corresponding per-draw object the material system writes values into.
//!
//! GPU resource-group construction is outside this crate; [`BindingTable`]
//! holds the CPU-side slot contents that a backend uploads. Tables are shared
//! via `Arc` — many material instances can point at one scene-wide table.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::image::MaterialImage;

/// Handle to a constant slot within an [`SrgLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantSlot(pub u32);

/// Handle to an image slot within an [`SrgLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSlot(pub u32);

#[derive(Debug, Clone)]
struct ConstantSlotDesc {
    name: String,
    byte_count: usize,
}

/// Named slot layout of a shader resource group.
///
/// Built once per shader interface and shared via `Arc` between every
/// [`BindingTable`] created against it.
#[derive(Debug, Clone, Default)]
pub struct SrgLayout {
    constants: Vec<ConstantSlotDesc>,
    images: Vec<String>,
    constant_names: HashMap<String, u32>,
    image_names: HashMap<String, u32>,
    label: Option<String>,
}

impl SrgLayout {
    /// Create a new empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant slot holding `byte_count` bytes.
    pub fn with_constant(mut self, name: impl Into<String>, byte_count: usize) -> Self {
        let name = name.into();
        let slot = self.constants.len() as u32;
        self.constant_names.insert(name.clone(), slot);
        self.constants.push(ConstantSlotDesc { name, byte_count });
        self
    }

    /// Add an image slot.
    pub fn with_image(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let slot = self.images.len() as u32;
        self.image_names.insert(name.clone(), slot);
        self.images.push(name);
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Look up a constant slot by name.
    pub fn constant_slot(&self, name: &str) -> Option<ConstantSlot> {
        self.constant_names.get(name).map(|&i| ConstantSlot(i))
    }

    /// Look up an image slot by name.
    pub fn image_slot(&self, name: &str) -> Option<ImageSlot> {
        self.image_names.get(name).map(|&i| ImageSlot(i))
    }

    /// Declared byte size of a constant slot.
    pub fn constant_byte_count(&self, slot: ConstantSlot) -> Option<usize> {
        self.constants.get(slot.0 as usize).map(|d| d.byte_count)
    }

    /// Name of a constant slot.
    pub fn constant_name(&self, slot: ConstantSlot) -> Option<&str> {
        self.constants.get(slot.0 as usize).map(|d| d.name.as_str())
    }

    /// Number of constant slots.
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Number of image slots.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// The layout label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

struct BindingTableState {
    constants: Vec<Vec<u8>>,
    images: Vec<Option<Arc<dyn MaterialImage>>>,
}

/// CPU-side shader resource group the material system writes into.
///
/// Constants are stored at their declared byte size (zero-initialized);
/// images as optional shared references. Writes through `&self` so a table
/// can be shared between instances (the scene material table) — the inner
/// lock serializes slot updates, it is not a broader concurrency contract.
pub struct BindingTable {
    layout: Arc<SrgLayout>,
    state: RwLock<BindingTableState>,
}

impl BindingTable {
    /// Create a table with all slots empty.
    pub fn new(layout: Arc<SrgLayout>) -> Self {
        let constants = layout
            .constants
            .iter()
            .map(|d| vec![0u8; d.byte_count])
            .collect();
        let images = vec![None; layout.image_count()];
        Self {
            layout,
            state: RwLock::new(BindingTableState { constants, images }),
        }
    }

    /// The slot layout this table was created against.
    pub fn layout(&self) -> &Arc<SrgLayout> {
        &self.layout
    }

    /// Write `bytes` into a constant slot.
    ///
    /// Returns `false` if the slot is unknown or `bytes` does not match the
    /// slot's declared byte count.
    pub fn set_constant(&self, slot: ConstantSlot, bytes: &[u8]) -> bool {
        let mut state = self.state.write();
        let Some(dst) = state.constants.get_mut(slot.0 as usize) else {
            return false;
        };
        if dst.len() != bytes.len() {
            log::error!(
                "BindingTable: constant '{}' expects {} bytes, got {}",
                self.layout.constant_name(slot).unwrap_or("?"),
                dst.len(),
                bytes.len()
            );
            return false;
        }
        dst.copy_from_slice(bytes);
        true
    }

    /// Bind an image to an image slot.
    ///
    /// Returns `false` if the slot is unknown.
    pub fn set_image(&self, slot: ImageSlot, image: Option<Arc<dyn MaterialImage>>) -> bool {
        let mut state = self.state.write();
        let Some(dst) = state.images.get_mut(slot.0 as usize) else {
            return false;
        };
        *dst = image;
        true
    }

    /// Current bytes of a constant slot.
    pub fn constant_bytes(&self, slot: ConstantSlot) -> Option<Vec<u8>> {
        self.state.read().constants.get(slot.0 as usize).cloned()
    }

    /// Currently bound image for an image slot, if any.
    pub fn image(&self, slot: ImageSlot) -> Option<Arc<dyn MaterialImage>> {
        self.state
            .read()
            .images
            .get(slot.0 as usize)
            .and_then(|i| i.clone())
    }
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("label", &self.layout.label())
            .field("constant_count", &self.layout.constant_count())
            .field("image_count", &self.layout.image_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(BindingTable: Send, Sync);
