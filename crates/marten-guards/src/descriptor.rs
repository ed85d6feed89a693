//! Guard descriptors: kind, accessor path, and captured parameters.
//!
//! A descriptor is the tracer's record of one runtime precondition. It is
//! immutable once constructed; construction is where conditions that can
//! never be satisfied (a TYPE_MATCH on a type with no stable qualified
//! name) are rejected, so they fail before any save is attempted.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use marten_value::{DispatchKeySet, TensorMeta, TransformKind, TypeObject};

use crate::error::ConstructionError;

/// Closed set of guard kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardKind {
    /// Tensor metadata equality
    TensorMatch,
    /// Class identity, recovered by qualified name
    TypeMatch,
    /// Attribute absent from an instance dict
    NotPresentInGenericDict,
    /// Attribute presence matches a captured bool
    HasAttr,
    /// Key membership in a mapping
    DictContains,
    /// Exact ordered key sequence of a dict
    DictKeysMatch,
    /// Exact ordered key sequence of a mapping view
    MappingKeysCheck,
    /// Boolean literal identity
    BoolMatch,
    /// Identity to none
    NoneMatch,
    /// Dispatch key set equality
    DispatchKeySetMatch,
    /// Callable name field equality
    NameMatch,
    /// Ambient forward-AD dual level
    DualLevel,
    /// Ambient transform stack shape
    FunctorchStackMatch,
    /// Raw object identity (runtime only)
    IdMatch,
    /// Dict mutation counter (runtime only)
    DictVersion,
    /// Aliasing between two inputs (runtime only)
    DuplicateInput,
    /// Weak reference liveness (runtime only)
    WeakrefAlive,
}

/// Whether a guard kind may cross a save/load boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serializability {
    /// Always encodable from stable data
    Always,
    /// Encodable only when a side condition holds (checked at construction)
    Conditional,
    /// Depends on transient runtime identity; never encodable
    Never,
}

impl GuardKind {
    /// The fixed serializability policy for this kind.
    pub fn serializability(self) -> Serializability {
        match self {
            Self::TypeMatch => Serializability::Conditional,
            Self::IdMatch | Self::DictVersion | Self::DuplicateInput | Self::WeakrefAlive => {
                Serializability::Never
            }
            _ => Serializability::Always,
        }
    }

    /// Whether this kind checks ambient state rather than a bound value.
    pub fn is_ambient(self) -> bool {
        matches!(self, Self::DualLevel | Self::FunctorchStackMatch)
    }

    /// Canonical name, as it appears in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TensorMatch => "TENSOR_MATCH",
            Self::TypeMatch => "TYPE_MATCH",
            Self::NotPresentInGenericDict => "NOT_PRESENT_IN_GENERIC_DICT",
            Self::HasAttr => "HASATTR",
            Self::DictContains => "DICT_CONTAINS",
            Self::DictKeysMatch => "DICT_KEYS_MATCH",
            Self::MappingKeysCheck => "MAPPING_KEYS_CHECK",
            Self::BoolMatch => "BOOL_MATCH",
            Self::NoneMatch => "NONE_MATCH",
            Self::DispatchKeySetMatch => "DISPATCH_KEY_SET_MATCH",
            Self::NameMatch => "NAME_MATCH",
            Self::DualLevel => "DUAL_LEVEL",
            Self::FunctorchStackMatch => "FUNCTORCH_STACK_MATCH",
            Self::IdMatch => "ID_MATCH",
            Self::DictVersion => "DICT_VERSION",
            Self::DuplicateInput => "DUPLICATE_INPUT",
            Self::WeakrefAlive => "WEAKREF_ALIVE",
        }
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step along an accessor path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStep {
    /// Attribute access by name
    Attr(String),
    /// Subscript access by string key
    Key(String),
    /// Invoke a zero-argument accessor
    Call,
    /// Follow a weak reference to its referent
    Deref,
}

/// The root a path starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Root {
    /// A named binding in the check environment
    Binding(String),
    /// The ambient transform context
    Ambient,
}

/// Accessor path from a root to the guarded value.
///
/// Order is significant: it defines traversal order, and paths sharing a
/// prefix share traversal in the guard manager tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardPath {
    root: Root,
    steps: Vec<AccessStep>,
}

impl GuardPath {
    /// A path rooted at a named binding, with no steps yet.
    pub fn binding(name: impl Into<String>) -> Self {
        Self {
            root: Root::Binding(name.into()),
            steps: Vec::new(),
        }
    }

    /// The path of the ambient transform context.
    pub fn ambient() -> Self {
        Self {
            root: Root::Ambient,
            steps: Vec::new(),
        }
    }

    /// Append an attribute access.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.steps.push(AccessStep::Attr(name.into()));
        self
    }

    /// Append a subscript access.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.steps.push(AccessStep::Key(key.into()));
        self
    }

    /// Append a zero-argument accessor invocation.
    #[must_use]
    pub fn call(mut self) -> Self {
        self.steps.push(AccessStep::Call);
        self
    }

    /// Append a weak-reference dereference.
    #[must_use]
    pub fn deref(mut self) -> Self {
        self.steps.push(AccessStep::Deref);
        self
    }

    /// The path's root.
    #[inline]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The path's steps, in traversal order.
    #[inline]
    pub fn steps(&self) -> &[AccessStep] {
        &self.steps
    }
}

impl fmt::Display for GuardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Root::Binding(name) => f.write_str(name)?,
            Root::Ambient => f.write_str("<ambient>")?,
        }
        for step in &self.steps {
            match step {
                AccessStep::Attr(name) => write!(f, ".{name}")?,
                AccessStep::Key(key) => write!(f, "[{key:?}]")?,
                AccessStep::Call => f.write_str("()")?,
                AccessStep::Deref => f.write_str(".deref()")?,
            }
        }
        Ok(())
    }
}

/// Kind-specific captured parameters.
///
/// The variant is the kind: a descriptor's [`GuardKind`] is derived from
/// its params, so the two can never disagree.
#[derive(Debug, Clone)]
pub enum GuardParams {
    /// Captured tensor metadata
    TensorMatch {
        /// Metadata the value must match
        meta: TensorMeta,
    },
    /// Captured class, resolved again by qualified name after a load
    TypeMatch {
        /// The class the value must be an instance of
        ty: Arc<TypeObject>,
    },
    /// Attribute that must be absent from the instance dict
    NotPresentInGenericDict {
        /// Attribute name
        attr: String,
    },
    /// Attribute presence check
    HasAttr {
        /// Attribute name
        attr: String,
        /// Captured presence
        present: bool,
    },
    /// Key membership check
    DictContains {
        /// Key to probe
        key: String,
        /// Captured membership polarity
        contains: bool,
    },
    /// Exact ordered dict key sequence
    DictKeysMatch {
        /// Captured keys, in insertion order
        keys: Vec<String>,
    },
    /// Exact ordered mapping-view key sequence
    MappingKeysCheck {
        /// Captured keys, in insertion order
        keys: Vec<String>,
    },
    /// Boolean literal identity
    BoolMatch {
        /// Captured literal
        expected: bool,
    },
    /// Identity to none
    NoneMatch {
        /// Whether the captured value was none
        is_none: bool,
    },
    /// Dispatch key set equality
    DispatchKeySetMatch {
        /// Captured key set
        keys: DispatchKeySet,
    },
    /// Callable name field equality
    NameMatch {
        /// Captured name
        name: String,
    },
    /// Ambient dual level equality
    DualLevel {
        /// Captured level
        level: u64,
    },
    /// Ambient transform stack equality
    FunctorchStackMatch {
        /// Captured stack, outermost first
        stack: Vec<TransformKind>,
    },
    /// Raw identity equality (runtime only)
    IdMatch {
        /// Captured address
        id: usize,
    },
    /// Dict mutation counter equality (runtime only)
    DictVersion {
        /// Captured version
        version: u64,
    },
    /// Aliasing with the value at another path (runtime only)
    DuplicateInput {
        /// The path this value must alias
        other: GuardPath,
    },
    /// Weak reference liveness (runtime only)
    WeakrefAlive,
}

impl PartialEq for GuardParams {
    /// Structural equality over captured data. Captured types compare by
    /// qualified name (the identity notion that survives a save/load
    /// boundary), so a reference descriptor set and one reconstructed
    /// from a blob compare equal when they mean the same check.
    fn eq(&self, other: &Self) -> bool {
        use GuardParams::*;
        match (self, other) {
            (TensorMatch { meta: a }, TensorMatch { meta: b }) => a == b,
            (TypeMatch { ty: a }, TypeMatch { ty: b }) => {
                a.qualified_name().is_some() && a.qualified_name() == b.qualified_name()
            }
            (
                NotPresentInGenericDict { attr: a },
                NotPresentInGenericDict { attr: b },
            ) => a == b,
            (
                HasAttr { attr: a, present: pa },
                HasAttr { attr: b, present: pb },
            ) => a == b && pa == pb,
            (
                DictContains { key: a, contains: ca },
                DictContains { key: b, contains: cb },
            ) => a == b && ca == cb,
            (DictKeysMatch { keys: a }, DictKeysMatch { keys: b }) => a == b,
            (MappingKeysCheck { keys: a }, MappingKeysCheck { keys: b }) => a == b,
            (BoolMatch { expected: a }, BoolMatch { expected: b }) => a == b,
            (NoneMatch { is_none: a }, NoneMatch { is_none: b }) => a == b,
            (DispatchKeySetMatch { keys: a }, DispatchKeySetMatch { keys: b }) => a == b,
            (NameMatch { name: a }, NameMatch { name: b }) => a == b,
            (DualLevel { level: a }, DualLevel { level: b }) => a == b,
            (FunctorchStackMatch { stack: a }, FunctorchStackMatch { stack: b }) => a == b,
            (IdMatch { id: a }, IdMatch { id: b }) => a == b,
            (DictVersion { version: a }, DictVersion { version: b }) => a == b,
            (DuplicateInput { other: a }, DuplicateInput { other: b }) => a == b,
            (WeakrefAlive, WeakrefAlive) => true,
            _ => false,
        }
    }
}

impl GuardParams {
    /// The guard kind these parameters belong to.
    pub fn kind(&self) -> GuardKind {
        match self {
            Self::TensorMatch { .. } => GuardKind::TensorMatch,
            Self::TypeMatch { .. } => GuardKind::TypeMatch,
            Self::NotPresentInGenericDict { .. } => GuardKind::NotPresentInGenericDict,
            Self::HasAttr { .. } => GuardKind::HasAttr,
            Self::DictContains { .. } => GuardKind::DictContains,
            Self::DictKeysMatch { .. } => GuardKind::DictKeysMatch,
            Self::MappingKeysCheck { .. } => GuardKind::MappingKeysCheck,
            Self::BoolMatch { .. } => GuardKind::BoolMatch,
            Self::NoneMatch { .. } => GuardKind::NoneMatch,
            Self::DispatchKeySetMatch { .. } => GuardKind::DispatchKeySetMatch,
            Self::NameMatch { .. } => GuardKind::NameMatch,
            Self::DualLevel { .. } => GuardKind::DualLevel,
            Self::FunctorchStackMatch { .. } => GuardKind::FunctorchStackMatch,
            Self::IdMatch { .. } => GuardKind::IdMatch,
            Self::DictVersion { .. } => GuardKind::DictVersion,
            Self::DuplicateInput { .. } => GuardKind::DuplicateInput,
            Self::WeakrefAlive => GuardKind::WeakrefAlive,
        }
    }
}

/// Immutable record of one runtime precondition.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardDescriptor {
    path: GuardPath,
    params: GuardParams,
    derived_kinds: Vec<GuardKind>,
}

impl GuardDescriptor {
    /// Build a descriptor, validating kind/path agreement and the
    /// TYPE_MATCH global-scope condition.
    pub fn new(path: GuardPath, params: GuardParams) -> Result<Self, ConstructionError> {
        Self::with_derived(path, params, Vec::new())
    }

    /// Build a descriptor carrying derived-kind tags from the tracer.
    pub fn with_derived(
        path: GuardPath,
        params: GuardParams,
        derived_kinds: Vec<GuardKind>,
    ) -> Result<Self, ConstructionError> {
        let kind = params.kind();

        let rooted_at_ambient = matches!(path.root(), Root::Ambient);
        if kind.is_ambient() != rooted_at_ambient || (rooted_at_ambient && !path.steps().is_empty())
        {
            return Err(ConstructionError::PathMismatch { kind, path });
        }

        if let GuardParams::TypeMatch { ty } = &params {
            if ty.qualified_name().is_none() {
                return Err(ConstructionError::TypeNotGlobal {
                    type_name: ty.name().to_string(),
                });
            }
        }

        Ok(Self {
            path,
            params,
            derived_kinds,
        })
    }

    /// The guard kind, derived from the captured parameters.
    #[inline]
    pub fn kind(&self) -> GuardKind {
        self.params.kind()
    }

    /// The accessor path to the guarded value.
    #[inline]
    pub fn path(&self) -> &GuardPath {
        &self.path
    }

    /// The captured parameters.
    #[inline]
    pub fn params(&self) -> &GuardParams {
        &self.params
    }

    /// Derived-kind tags attached by the tracer.
    #[inline]
    pub fn derived_kinds(&self) -> &[GuardKind] {
        &self.derived_kinds
    }

    /// The serializability verdict for this descriptor's kind.
    pub fn serializability(&self) -> Serializability {
        self.kind().serializability()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marten_value::DType;

    #[test]
    fn kind_is_derived_from_params() {
        let desc = GuardDescriptor::new(
            GuardPath::binding("x"),
            GuardParams::TensorMatch {
                meta: TensorMeta::strided(DType::Float32, [2]),
            },
        )
        .unwrap();
        assert_eq!(desc.kind(), GuardKind::TensorMatch);
        assert_eq!(desc.serializability(), Serializability::Always);
    }

    #[test]
    fn local_scope_type_fails_at_construction() {
        let local = TypeObject::builder("LocalModule").build();
        let err = GuardDescriptor::new(
            GuardPath::binding("m"),
            GuardParams::TypeMatch { ty: local },
        )
        .unwrap_err();
        assert!(err.to_string().contains("global scope"));
    }

    #[test]
    fn ambient_kinds_must_use_the_ambient_root() {
        // Ambient guard on a binding path
        let err = GuardDescriptor::new(
            GuardPath::binding("x"),
            GuardParams::DualLevel { level: 0 },
        )
        .unwrap_err();
        assert!(matches!(err, ConstructionError::PathMismatch { .. }));

        // Value guard on the ambient root
        let err = GuardDescriptor::new(
            GuardPath::ambient(),
            GuardParams::BoolMatch { expected: true },
        )
        .unwrap_err();
        assert!(matches!(err, ConstructionError::PathMismatch { .. }));

        assert!(
            GuardDescriptor::new(GuardPath::ambient(), GuardParams::DualLevel { level: 0 })
                .is_ok()
        );
    }

    #[test]
    fn path_display_reads_like_an_expression() {
        let path = GuardPath::binding("m").attr("buffers").key("w").call();
        assert_eq!(path.to_string(), "m.buffers[\"w\"]()");
    }
}
