//! Objects, classes, and callables.
//!
//! A [`TypeObject`] stands in for a class: a display name, an optional
//! qualified name (present only for classes reachable from global scope),
//! and the set of class-level attribute names. An [`ObjectValue`] is an
//! instance: a type reference plus an instance dictionary. Attribute
//! lookup checks the instance dictionary first, then the class.
//!
//! Callables carry a mutable name field. Guards that key on the name see
//! in-place mutations of that field, matching the traced language's
//! `__name__` semantics.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

use crate::dict::DictValue;
use crate::value::Value;

/// A class object, identified for guard purposes by its qualified name.
#[derive(Debug)]
pub struct TypeObject {
    name: String,
    qualified_name: Option<String>,
    attrs: Vec<String>,
}

impl TypeObject {
    /// Start building a type with the given display name.
    pub fn builder(name: impl Into<String>) -> TypeObjectBuilder {
        TypeObjectBuilder {
            name: name.into(),
            qualified_name: None,
            attrs: Vec::new(),
        }
    }

    /// Display name (the last path segment for global types).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualified name, if the type is reachable from global scope.
    ///
    /// `None` for types defined inside a function body; such types cannot
    /// be recovered by name in another process.
    #[inline]
    pub fn qualified_name(&self) -> Option<&str> {
        self.qualified_name.as_deref()
    }

    /// Check whether the class defines an attribute with this name.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a == name)
    }
}

/// Builder for [`TypeObject`].
pub struct TypeObjectBuilder {
    name: String,
    qualified_name: Option<String>,
    attrs: Vec<String>,
}

impl TypeObjectBuilder {
    /// Set the qualified name, marking the type as globally reachable.
    pub fn qualified(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = Some(qualified_name.into());
        self
    }

    /// Declare a class-level attribute (method or class variable).
    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.attrs.push(name.into());
        self
    }

    /// Finish, producing a shared type object.
    pub fn build(self) -> Arc<TypeObject> {
        Arc::new(TypeObject {
            name: self.name,
            qualified_name: self.qualified_name,
            attrs: self.attrs,
        })
    }
}

/// Shared backing storage of an [`ObjectValue`]. Opaque; exposed only so
/// weak references can point at it.
pub struct ObjectData {
    ty: Arc<TypeObject>,
    dict: DictValue,
}

/// An instance of a [`TypeObject`]: a type reference plus an instance
/// dictionary. Clones share the same instance (and identity).
#[derive(Clone)]
pub struct ObjectValue(Arc<ObjectData>);

impl ObjectValue {
    /// Create a fresh instance of `ty` with an empty instance dictionary.
    pub fn new(ty: Arc<TypeObject>) -> Self {
        Self(Arc::new(ObjectData {
            ty,
            dict: DictValue::new(),
        }))
    }

    /// The instance's class.
    #[inline]
    pub fn ty(&self) -> &Arc<TypeObject> {
        &self.0.ty
    }

    /// The instance dictionary (the "generic dict").
    #[inline]
    pub fn instance_dict(&self) -> &DictValue {
        &self.0.dict
    }

    /// Set an attribute on the instance, shadowing any class attribute.
    pub fn set_attr(&self, name: impl Into<String>, value: Value) {
        self.0.dict.insert(name, value);
    }

    /// Remove an instance attribute. Class attributes are unaffected.
    pub fn del_attr(&self, name: &str) -> Option<Value> {
        self.0.dict.remove(name)
    }

    /// Look up an instance attribute value. Class-level attributes carry
    /// no values in this model, only names; they are visible to
    /// [`has_attr`](Self::has_attr) but not navigable.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.0.dict.get(name)
    }

    /// Whether the attribute resolves on the instance or its class.
    pub fn has_attr(&self, name: &str) -> bool {
        self.0.dict.contains_key(name) || self.0.ty.has_attr(name)
    }

    /// Stable address of the shared instance, for identity conditions.
    #[inline]
    pub(crate) fn data_ptr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<ObjectData> {
        Arc::downgrade(&self.0)
    }

    #[inline]
    pub(crate) fn from_arc(data: Arc<ObjectData>) -> Self {
        Self(data)
    }
}

impl std::fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectValue")
            .field("type", &self.0.ty.name)
            .field("dict", &self.0.dict)
            .finish()
    }
}

/// Zero-argument native accessor attached to a callable.
///
/// Returning `None` means the accessor cannot produce a value; path
/// traversal through such a callable fails the guard.
pub type NativeFn = Arc<dyn Fn() -> Option<Value> + Send + Sync>;

struct CallableData {
    name: RwLock<String>,
    qualified_name: Option<String>,
    body: Option<NativeFn>,
}

/// A callable with a mutable name field.
#[derive(Clone)]
pub struct CallableValue(Arc<CallableData>);

impl CallableValue {
    /// Create a named callable with no body.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(CallableData {
            name: RwLock::new(name.into()),
            qualified_name: None,
            body: None,
        }))
    }

    /// Create a named callable backed by a zero-argument accessor.
    pub fn with_body(name: impl Into<String>, body: NativeFn) -> Self {
        Self(Arc::new(CallableData {
            name: RwLock::new(name.into()),
            qualified_name: None,
            body: Some(body),
        }))
    }

    /// Current value of the name field.
    pub fn name(&self) -> String {
        self.0.name.read().clone()
    }

    /// Mutate the name field in place. Identity is unchanged.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.0.name.write() = name.into();
    }

    /// Qualified name, if any.
    #[inline]
    pub fn qualified_name(&self) -> Option<&str> {
        self.0.qualified_name.as_deref()
    }

    /// Invoke the accessor, if the callable has one.
    pub fn call(&self) -> Option<Value> {
        self.0.body.as_ref().and_then(|body| body())
    }

    /// Stable address of the shared callable, for identity conditions.
    #[inline]
    pub(crate) fn data_ptr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl std::fmt::Debug for CallableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallableValue({:?})", self.0.name.read())
    }
}
