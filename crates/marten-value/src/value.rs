//! Runtime values guards evaluate against.
//!
//! `Value` is the dynamic value of the traced runtime. Heap-backed
//! variants (tensors, dictionaries, objects, callables) share storage
//! through `Arc`, so clones alias and carry identity; primitives are
//! copied. The guard layer only ever reads values.

use std::sync::{Arc, Weak};

use crate::dict::{DictValue, MappingView};
use crate::object::{CallableValue, ObjectData, ObjectValue, TypeObject};
use crate::tensor::{DispatchKeySet, TensorMeta, TensorValue};

/// A runtime value of the traced language.
#[derive(Debug, Clone)]
pub enum Value {
    /// The none/null singleton
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Tensor (storage opaque to guards)
    Tensor(Arc<TensorValue>),
    /// Insertion-ordered dictionary
    Dict(DictValue),
    /// Read-only mapping view
    MappingProxy(MappingView),
    /// Class instance
    Object(ObjectValue),
    /// Callable with a mutable name field
    Callable(CallableValue),
    /// Class object
    Type(Arc<TypeObject>),
    /// Bare dispatch key set
    DispatchKeys(DispatchKeySet),
    /// Weak reference to a heap value
    WeakRef(WeakValue),
}

impl Value {
    /// The none value.
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    /// A boolean value.
    #[inline]
    pub fn boolean(b: bool) -> Self {
        Self::Bool(b)
    }

    /// An integer value.
    #[inline]
    pub fn int(n: i64) -> Self {
        Self::Int(n)
    }

    /// A float value.
    #[inline]
    pub fn float(n: f64) -> Self {
        Self::Float(n)
    }

    /// A string value.
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// A fresh tensor value with the given metadata.
    pub fn tensor(meta: TensorMeta) -> Self {
        Self::Tensor(Arc::new(TensorValue::new(meta)))
    }

    /// A dictionary value.
    #[inline]
    pub fn dict(dict: DictValue) -> Self {
        Self::Dict(dict)
    }

    /// A read-only mapping view over a dictionary.
    #[inline]
    pub fn mapping(dict: DictValue) -> Self {
        Self::MappingProxy(MappingView::new(dict))
    }

    /// An object value.
    #[inline]
    pub fn object(obj: ObjectValue) -> Self {
        Self::Object(obj)
    }

    /// A callable value.
    #[inline]
    pub fn callable(f: CallableValue) -> Self {
        Self::Callable(f)
    }

    /// A class object value.
    #[inline]
    pub fn type_object(ty: Arc<TypeObject>) -> Self {
        Self::Type(ty)
    }

    /// A bare dispatch key set value.
    #[inline]
    pub fn dispatch_keys(keys: DispatchKeySet) -> Self {
        Self::DispatchKeys(keys)
    }

    /// Check for the none value.
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Get as boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the tensor metadata, if this is a tensor.
    #[inline]
    pub fn tensor_meta(&self) -> Option<&TensorMeta> {
        match self {
            Self::Tensor(t) => Some(t.meta()),
            _ => None,
        }
    }

    /// Get as dictionary.
    #[inline]
    pub fn as_dict(&self) -> Option<&DictValue> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Get as read-only mapping view.
    #[inline]
    pub fn as_mapping(&self) -> Option<&MappingView> {
        match self {
            Self::MappingProxy(m) => Some(m),
            _ => None,
        }
    }

    /// Get as object.
    #[inline]
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get as callable.
    #[inline]
    pub fn as_callable(&self) -> Option<&CallableValue> {
        match self {
            Self::Callable(f) => Some(f),
            _ => None,
        }
    }

    /// Get as class object.
    #[inline]
    pub fn as_type(&self) -> Option<&Arc<TypeObject>> {
        match self {
            Self::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Get as weak reference.
    #[inline]
    pub fn as_weak(&self) -> Option<&WeakValue> {
        match self {
            Self::WeakRef(w) => Some(w),
            _ => None,
        }
    }

    /// The dispatch key set associated with this value: a tensor's is
    /// implied by its metadata, a bare key-set value compares directly.
    pub fn dispatch_key_set(&self) -> Option<DispatchKeySet> {
        match self {
            Self::Tensor(t) => Some(t.meta().dispatch_key_set()),
            Self::DispatchKeys(keys) => Some(*keys),
            _ => None,
        }
    }

    /// Stable identity of the value's shared storage, if it has any.
    ///
    /// Valid only within this process; never serialized.
    pub fn object_id(&self) -> Option<usize> {
        match self {
            Self::Tensor(t) => Some(Arc::as_ptr(t) as usize),
            Self::Dict(d) => Some(d.data_ptr()),
            Self::MappingProxy(m) => Some(m.data_ptr()),
            Self::Object(o) => Some(o.data_ptr()),
            Self::Callable(f) => Some(f.data_ptr()),
            Self::Type(t) => Some(Arc::as_ptr(t) as usize),
            _ => None,
        }
    }

    /// Check whether two values are the same heap object.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.object_id(), other.object_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Take a weak reference to this value, if its variant supports one.
    pub fn downgrade(&self) -> Option<WeakValue> {
        match self {
            Self::Object(o) => Some(WeakValue::Object(o.downgrade())),
            Self::Tensor(t) => Some(WeakValue::Tensor(Arc::downgrade(t))),
            _ => None,
        }
    }
}

/// Weak reference to a heap value.
///
/// Liveness is a transient runtime property: it can be checked, never
/// serialized.
#[derive(Clone)]
pub enum WeakValue {
    /// Weak reference to an object
    Object(Weak<ObjectData>),
    /// Weak reference to a tensor
    Tensor(Weak<TensorValue>),
}

impl WeakValue {
    /// Check whether the referent is still alive.
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Object(w) => w.strong_count() > 0,
            Self::Tensor(w) => w.strong_count() > 0,
        }
    }

    /// Recover the referent, if it is still alive.
    pub fn upgrade(&self) -> Option<Value> {
        match self {
            Self::Object(w) => w.upgrade().map(|data| Value::Object(ObjectValue::from_arc(data))),
            Self::Tensor(w) => w.upgrade().map(Value::Tensor),
        }
    }
}

impl std::fmt::Debug for WeakValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Object(_) => "object",
            Self::Tensor(_) => "tensor",
        };
        write!(f, "WeakValue({kind}, alive={})", self.is_alive())
    }
}
