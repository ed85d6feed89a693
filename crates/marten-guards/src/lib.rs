//! # Marten Guards
//!
//! Guard construction, evaluation, and serialization for the Marten
//! tracing JIT. A compiled specialization is valid only while the
//! runtime preconditions observed during tracing still hold; this crate
//! records those preconditions as [`GuardDescriptor`]s, compiles them
//! into a [`GuardManager`] tree for fast single-pass checking, and
//! persists/restores the serializable subset across process boundaries
//! so compiled artifacts can be reused without re-tracing.
//!
//! ## Design principles
//!
//! - **Independent predicates**: guards are standalone boolean checks,
//!   not a joint constraint system.
//! - **Fail precise, fail fast**: construction, save, and load each
//!   reject impossible guards immediately, naming the kind and reason.
//! - **Identity never crosses a process**: kinds that depend on
//!   addresses, mutation counters, aliasing, or weak-reference liveness
//!   check fine at runtime and refuse to serialize.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod check;
pub mod descriptor;
pub mod error;
mod evaluate;
pub mod manager;
pub mod state;

pub use check::{CheckFunctionManager, GuardFilter, KindFilter, TraceOutput};
pub use descriptor::{
    AccessStep, GuardDescriptor, GuardKind, GuardParams, GuardPath, Root, Serializability,
};
pub use error::{ConstructionError, LoadError, SaveError};
pub use manager::GuardManager;
pub use state::GuardsState;

/// Guards state format version
pub const GUARDS_STATE_VERSION: u32 = 1;

/// Magic bytes for guards state blobs
pub const GUARDS_STATE_MAGIC: [u8; 8] = *b"MRTNGS\0\0";
