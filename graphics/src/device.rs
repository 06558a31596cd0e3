//! GPU device identification.
//!
//! Material parameter data is replicated per device because bindless
//! descriptor indices and binding tables are per-device resources. Rather
//! than querying a global GPU system for the device count, the set of
//! devices is threaded explicitly through construction and compile calls as
//! a [`DeviceSet`].

/// Index identifying one GPU device.
pub type DeviceIndex = u32;

/// The default device, used when a caller does not care which replica it
/// reads from.
pub const DEFAULT_DEVICE: DeviceIndex = 0;

/// An explicit, ordered set of GPU devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSet {
    indices: Vec<DeviceIndex>,
}

impl DeviceSet {
    /// A single-device set containing only [`DEFAULT_DEVICE`].
    pub fn single() -> Self {
        Self { indices: vec![DEFAULT_DEVICE] }
    }

    /// A set of `count` devices numbered `0..count`.
    pub fn with_count(count: u32) -> Self {
        Self {
            indices: (0..count).collect(),
        }
    }

    /// A set of explicit device indices.
    pub fn from_indices(indices: impl Into<Vec<DeviceIndex>>) -> Self {
        Self {
            indices: indices.into(),
        }
    }

    /// Iterate over the device indices in order.
    pub fn iter(&self) -> impl Iterator<Item = DeviceIndex> + '_ {
        self.indices.iter().copied()
    }

    /// Number of devices in the set.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether `device` is part of the set.
    pub fn contains(&self, device: DeviceIndex) -> bool {
        self.indices.contains(&device)
    }
}

impl Default for DeviceSet {
    fn default() -> Self {
        Self::single()
    }
}
