//! Global scope registry for qualified-name resolution.
//!
//! Serialized guards reference types by qualified name. On load, those
//! names are resolved against the scope the loading process provides;
//! identity of the resolved type object is then what guards compare.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::object::TypeObject;

/// Error registering a type into a [`GlobalScope`].
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The type has no qualified name and cannot be registered.
    #[error("type `{name}` has no qualified name; define it at global scope")]
    NotGlobal {
        /// Display name of the offending type
        name: String,
    },
    /// Another type is already registered under this qualified name.
    #[error("qualified name `{qualified_name}` is already registered")]
    Duplicate {
        /// The contested qualified name
        qualified_name: String,
    },
}

/// Mapping from qualified name to type object.
#[derive(Default)]
pub struct GlobalScope {
    types: FxHashMap<String, Arc<TypeObject>>,
}

impl GlobalScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a globally reachable type under its qualified name.
    pub fn register(&mut self, ty: Arc<TypeObject>) -> Result<(), ScopeError> {
        let Some(qualified_name) = ty.qualified_name() else {
            return Err(ScopeError::NotGlobal {
                name: ty.name().to_string(),
            });
        };
        if self.types.contains_key(qualified_name) {
            return Err(ScopeError::Duplicate {
                qualified_name: qualified_name.to_string(),
            });
        }
        self.types.insert(qualified_name.to_string(), ty);
        Ok(())
    }

    /// Resolve a qualified name to its type object.
    pub fn resolve(&self, qualified_name: &str) -> Option<&Arc<TypeObject>> {
        self.types.get(qualified_name)
    }

    /// Check whether a qualified name is registered.
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.types.contains_key(qualified_name)
    }
}

impl std::fmt::Debug for GlobalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalScope")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_types_are_rejected() {
        let mut scope = GlobalScope::new();
        let local = TypeObject::builder("LocalModule").build();
        assert!(matches!(
            scope.register(local),
            Err(ScopeError::NotGlobal { .. })
        ));
    }

    #[test]
    fn resolve_returns_the_registered_type() {
        let mut scope = GlobalScope::new();
        let ty = TypeObject::builder("GlobalModule")
            .qualified("tests.GlobalModule")
            .build();
        scope.register(ty.clone()).unwrap();

        let resolved = scope.resolve("tests.GlobalModule").unwrap();
        assert!(Arc::ptr_eq(resolved, &ty));
        assert!(scope.resolve("tests.Missing").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut scope = GlobalScope::new();
        let a = TypeObject::builder("A").qualified("m.A").build();
        let b = TypeObject::builder("A").qualified("m.A").build();
        scope.register(a).unwrap();
        assert!(matches!(
            scope.register(b),
            Err(ScopeError::Duplicate { .. })
        ));
    }
}
