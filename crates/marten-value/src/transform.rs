//! Ambient transform context.
//!
//! Layered functional transforms (vectorizing map, gradient, jvp,
//! functionalization) and forward-mode dual numbers are process-wide
//! nesting state in the traced runtime. Marten models that state as an
//! explicit [`TransformState`] passed to checks, with an
//! init/snapshot/compare lifecycle, instead of a hidden global. Callers
//! in a multi-threaded host must serialize access to the state they pass.

use serde::{Deserialize, Serialize};

/// One layer of the functional transform stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    /// Vectorizing map
    Vmap,
    /// Reverse-mode gradient
    Grad,
    /// Forward-mode jacobian-vector product
    Jvp,
    /// Functionalization of in-place ops
    Functionalize,
}

/// Ambient transform state: the transform stack plus the forward-AD dual
/// level. Cheap to clone; a clone is a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformState {
    stack: Vec<TransformKind>,
    dual_level: u64,
}

impl TransformState {
    /// State with no active transforms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a transform layer.
    pub fn push(&mut self, kind: TransformKind) {
        self.stack.push(kind);
    }

    /// Exit the innermost transform layer.
    pub fn pop(&mut self) -> Option<TransformKind> {
        self.stack.pop()
    }

    /// The active transform stack, outermost first.
    #[inline]
    pub fn stack(&self) -> &[TransformKind] {
        &self.stack
    }

    /// Nesting depth of the transform stack.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Enter a forward-AD dual level, returning the new level.
    pub fn enter_dual(&mut self) -> u64 {
        self.dual_level += 1;
        self.dual_level
    }

    /// Exit the innermost dual level.
    pub fn exit_dual(&mut self) {
        self.dual_level = self.dual_level.saturating_sub(1);
    }

    /// Current dual level (0 = no dual numbers active).
    #[inline]
    pub fn dual_level(&self) -> u64 {
        self.dual_level
    }

    /// Capture the current state for later comparison.
    pub fn snapshot(&self) -> TransformState {
        self.clone()
    }
}
