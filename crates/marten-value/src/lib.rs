//! # Marten Value
//!
//! Runtime value model for the Marten tracing JIT. This crate defines the
//! dynamic values guard checks evaluate against (tensors as metadata,
//! insertion-ordered dictionaries, class instances, callables), plus the
//! explicit ambient transform context and the global scope registry used
//! to recover types by qualified name.
//!
//! Heap-backed values share storage through `Arc`: clones alias, which is
//! what gives identity-based conditions something to compare. Everything
//! here is `Send + Sync`; mutable innards sit behind `parking_lot` locks.

pub mod bindings;
pub mod dict;
pub mod object;
pub mod scope;
pub mod tensor;
pub mod transform;
pub mod value;

pub use bindings::Bindings;
pub use dict::{DictValue, MappingView};
pub use object::{CallableValue, NativeFn, ObjectValue, TypeObject, TypeObjectBuilder};
pub use scope::{GlobalScope, ScopeError};
pub use tensor::{Device, DispatchKey, DispatchKeySet, DType, Layout, Shape, TensorMeta, TensorValue};
pub use transform::{TransformKind, TransformState};
pub use value::{Value, WeakValue};
