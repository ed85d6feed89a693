//! Tensor metadata captured for guard checks.
//!
//! The guard layer never inspects tensor storage: a compiled
//! specialization is valid for any tensor whose metadata (element type,
//! shape, device, layout) matches what the tracer observed. `TensorMeta`
//! is that portable metadata; `TensorValue` is the runtime value wrapping
//! it.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    /// 1-byte boolean
    Bool,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 16-bit IEEE float
    Float16,
    /// 32-bit IEEE float
    Float32,
    /// 64-bit IEEE float
    Float64,
}

impl DType {
    /// Size of one element in bytes.
    #[inline]
    pub fn size_of(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Float16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }
}

/// Device a tensor lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    /// Host memory
    Cpu,
    /// Accelerator, by device index
    Cuda(u8),
    /// Shape-only meta device (no storage)
    Meta,
}

/// Memory layout of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    /// Dense strided storage
    Strided,
    /// Sparse coordinate storage
    Sparse,
}

/// One capability bit in a [`DispatchKeySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKey {
    /// Dense strided kernels
    Dense,
    /// Sparse kernels
    Sparse,
    /// CPU backend
    Cpu,
    /// CUDA backend
    Cuda,
    /// Meta backend (shape inference only)
    Meta,
    /// Autograd wrapper
    Autograd,
    /// Functionalization wrapper
    Functionalize,
}

impl DispatchKey {
    #[inline]
    const fn bit(self) -> u32 {
        match self {
            Self::Dense => 1 << 0,
            Self::Sparse => 1 << 1,
            Self::Cpu => 1 << 2,
            Self::Cuda => 1 << 3,
            Self::Meta => 1 << 4,
            Self::Autograd => 1 << 5,
            Self::Functionalize => 1 << 6,
        }
    }
}

/// Set of dispatch keys associated with a value.
///
/// Determines which backend kernels a value dispatches to. Guards compare
/// whole sets: a specialization compiled against CPU kernels must not run
/// for a meta-device tensor even if both are dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DispatchKeySet(u32);

impl DispatchKeySet {
    /// The empty key set.
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A set containing a single key.
    #[inline]
    pub const fn single(key: DispatchKey) -> Self {
        Self(key.bit())
    }

    /// Return this set with `key` added.
    #[inline]
    #[must_use]
    pub const fn with(self, key: DispatchKey) -> Self {
        Self(self.0 | key.bit())
    }

    /// Check whether `key` is present.
    #[inline]
    pub const fn has(self, key: DispatchKey) -> bool {
        self.0 & key.bit() != 0
    }

    /// Check whether the set is empty.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Tensor shape, stored inline for the common low-rank case.
pub type Shape = SmallVec<[i64; 4]>;

/// Metadata under guard for tensor values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMeta {
    /// Element type
    pub dtype: DType,
    /// Dimension sizes, outermost first
    pub shape: Shape,
    /// Device the storage lives on
    pub device: Device,
    /// Storage layout
    pub layout: Layout,
}

impl TensorMeta {
    /// Metadata for a dense CPU tensor.
    pub fn strided(dtype: DType, shape: impl IntoIterator<Item = i64>) -> Self {
        Self {
            dtype,
            shape: shape.into_iter().collect(),
            device: Device::Cpu,
            layout: Layout::Strided,
        }
    }

    /// Return this metadata moved to `device`.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> i64 {
        self.shape.iter().product()
    }

    /// The dispatch key set implied by this metadata.
    pub fn dispatch_key_set(&self) -> DispatchKeySet {
        let layout_key = match self.layout {
            Layout::Strided => DispatchKey::Dense,
            Layout::Sparse => DispatchKey::Sparse,
        };
        let device_key = match self.device {
            Device::Cpu => DispatchKey::Cpu,
            Device::Cuda(_) => DispatchKey::Cuda,
            Device::Meta => DispatchKey::Meta,
        };
        DispatchKeySet::single(layout_key).with(device_key)
    }
}

/// A tensor runtime value.
///
/// Storage is opaque to the guard layer; only metadata is observable.
/// Identity (for ID_MATCH-style conditions) comes from the `Arc` the
/// value is shared through.
#[derive(Debug)]
pub struct TensorValue {
    meta: TensorMeta,
}

impl TensorValue {
    /// Wrap metadata as a runtime tensor value.
    pub fn new(meta: TensorMeta) -> Self {
        Self { meta }
    }

    /// The metadata under guard.
    #[inline]
    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_keys_distinguish_devices() {
        let cpu = TensorMeta::strided(DType::Float32, [3]);
        let meta = TensorMeta::strided(DType::Float32, [3]).with_device(Device::Meta);

        assert!(cpu.dispatch_key_set().has(DispatchKey::Cpu));
        assert!(!cpu.dispatch_key_set().has(DispatchKey::Meta));
        assert_ne!(cpu.dispatch_key_set(), meta.dispatch_key_set());
    }

    #[test]
    fn meta_equality_is_shape_and_dtype_sensitive() {
        let a = TensorMeta::strided(DType::Float32, [2]);
        let b = TensorMeta::strided(DType::Float32, [2]);
        let c = TensorMeta::strided(DType::Float32, [3]);
        let d = TensorMeta::strided(DType::Float64, [2]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn numel_and_rank() {
        let m = TensorMeta::strided(DType::Float32, [3, 4]);
        assert_eq!(m.rank(), 2);
        assert_eq!(m.numel(), 12);
    }
}
