//! Evaluation environment for guard checks.

use rustc_hash::FxHashMap;

use crate::transform::TransformState;
use crate::value::Value;

/// The environment a check runs against: named runtime values plus the
/// ambient transform state in effect for the call.
#[derive(Debug, Default)]
pub struct Bindings {
    values: FxHashMap<String, Value>,
    transforms: TransformState,
}

impl Bindings {
    /// Create an empty environment with no active transforms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name, builder style.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Bind or rebind a name.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Look up a bound value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Attach an ambient transform state, builder style.
    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformState) -> Self {
        self.transforms = transforms;
        self
    }

    /// The ambient transform state in effect.
    #[inline]
    pub fn transforms(&self) -> &TransformState {
        &self.transforms
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether no names are bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
