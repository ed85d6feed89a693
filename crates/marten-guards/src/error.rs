//! Guard error taxonomy.
//!
//! Three failure surfaces, all immediate and all naming the guard kind
//! and reason: construction (the guard can never be built), save (the
//! guard is valid at runtime but forbidden from persisting), and load
//! (the blob cannot be turned back into a tree). The surrounding system
//! decides whether a failure means falling back to re-tracing; nothing
//! here retries.

use thiserror::Error;

use crate::descriptor::{GuardKind, GuardPath};

/// A guard cannot be built at all.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// TYPE_MATCH on a type with no stable qualified name.
    #[error(
        "TYPE_MATCH guard on `{type_name}` has no stable qualified name; \
         please define the class at global scope"
    )]
    TypeNotGlobal {
        /// Display name of the offending type
        type_name: String,
    },

    /// The kind and the accessor path root disagree (ambient kinds must
    /// use the ambient root, value kinds a binding root).
    #[error("{kind} guard cannot be attached to path `{path}`")]
    PathMismatch {
        /// The offending guard kind
        kind: GuardKind,
        /// The rejected path
        path: GuardPath,
    },
}

/// A guard set cannot be saved. No partial blob is ever produced.
#[derive(Debug, Error)]
pub enum SaveError {
    /// A never-serializable kind is present in the accepted set.
    #[error("{kind} guard cannot be serialized")]
    NotSerializable {
        /// The offending guard kind
        kind: GuardKind,
    },

    /// A captured type lost its qualified name. Cannot happen for
    /// descriptors built through [`GuardDescriptor::new`]
    /// (construction rejects them), but encoding refuses to guess.
    ///
    /// [`GuardDescriptor::new`]: crate::descriptor::GuardDescriptor::new
    #[error("type `{type_name}` has no qualified name")]
    UnnamedType {
        /// Display name of the offending type
        type_name: String,
    },

    /// The state payload failed to encode.
    #[error("failed to encode guards state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A guards-state blob cannot be loaded. No partial tree is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The blob does not start with the guards-state magic bytes.
    #[error("invalid magic bytes")]
    BadMagic,

    /// The blob was written by an incompatible codec version.
    #[error("unsupported guards state version: {0}")]
    UnsupportedVersion(u32),

    /// The payload is not valid encoded guards state.
    #[error("malformed guards state: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A qualified name in the blob is not registered in the provided
    /// scope.
    #[error("unresolved global `{qualified_name}` while loading guards")]
    UnresolvedGlobal {
        /// The name that failed to resolve
        qualified_name: String,
    },

    /// A decoded descriptor failed re-validation.
    #[error(transparent)]
    Invalid(#[from] ConstructionError),
}
