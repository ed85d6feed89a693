//! Check function management.
//!
//! One [`CheckFunctionManager`] exists per compiled specialization. It
//! consumes the tracer's guard output (or a previously saved guards
//! state), applies the caller's filter, compiles the accepted set into a
//! [`GuardManager`] tree, and exposes its `check`. The three entry
//! points are the three lifecycle modes: [`new`](CheckFunctionManager::new)
//! (normal), [`save`](CheckFunctionManager::save) (normal + produce a
//! portable guards state), and [`load`](CheckFunctionManager::load)
//! (rebuild from a guards state without re-tracing).

use std::sync::Arc;

use tracing::debug;

use marten_value::{Bindings, GlobalScope};

use crate::descriptor::{GuardDescriptor, GuardKind};
use crate::error::{LoadError, SaveError};
use crate::manager::GuardManager;
use crate::state;

/// Guard output consumed from the tracer.
#[derive(Debug, Default)]
pub struct TraceOutput {
    /// Descriptors in the order the tracer emitted them.
    pub guards: Vec<GuardDescriptor>,
}

impl TraceOutput {
    /// Wrap a descriptor sequence as tracer output.
    pub fn new(guards: Vec<GuardDescriptor>) -> Self {
        Self { guards }
    }
}

/// Caller-supplied selection over guard descriptors.
///
/// Implemented by any `Fn(&GuardDescriptor) -> bool`; a filter restricts
/// which guards take part in the compiled check.
pub trait GuardFilter {
    /// Whether this descriptor should be kept.
    fn accepts(&self, guard: &GuardDescriptor) -> bool;
}

impl<F: Fn(&GuardDescriptor) -> bool> GuardFilter for F {
    fn accepts(&self, guard: &GuardDescriptor) -> bool {
        self(guard)
    }
}

/// Filter selecting guards whose primary or derived kind matches.
#[derive(Debug, Clone, Copy)]
pub struct KindFilter(
    /// The kind to select
    pub GuardKind,
);

impl GuardFilter for KindFilter {
    fn accepts(&self, guard: &GuardDescriptor) -> bool {
        guard.kind() == self.0 || guard.derived_kinds().contains(&self.0)
    }
}

/// Guard lifecycle orchestrator for one compiled specialization.
#[derive(Debug)]
pub struct CheckFunctionManager {
    accepted: Vec<Arc<GuardDescriptor>>,
    guard_manager: GuardManager,
    guards_state: Option<Vec<u8>>,
}

impl CheckFunctionManager {
    /// Build the check for a fresh trace (normal mode).
    pub fn new(output: TraceOutput, filter: Option<&dyn GuardFilter>) -> Self {
        let accepted = accept(output, filter);
        let guard_manager = GuardManager::build(accepted.iter().cloned());
        debug!(guards = accepted.len(), "built check function");
        Self {
            accepted,
            guard_manager,
            guards_state: None,
        }
    }

    /// Build the check for a fresh trace and capture a portable guards
    /// state (save mode).
    ///
    /// Fails fast if any accepted guard is never-serializable; no
    /// partial state is produced.
    pub fn save(output: TraceOutput, filter: Option<&dyn GuardFilter>) -> Result<Self, SaveError> {
        let accepted = accept(output, filter);
        let guards_state = state::save_guards(&accepted)?;
        let guard_manager = GuardManager::build(accepted.iter().cloned());
        debug!(
            guards = accepted.len(),
            bytes = guards_state.len(),
            "built check function with guards state"
        );
        Ok(Self {
            accepted,
            guard_manager,
            guards_state: Some(guards_state),
        })
    }

    /// Rebuild the check from a previously saved guards state (load
    /// mode). No tracing is performed; qualified names in the state are
    /// resolved against `scope`.
    pub fn load(blob: &[u8], scope: &GlobalScope) -> Result<Self, LoadError> {
        let accepted: Vec<Arc<GuardDescriptor>> = state::load_guards(blob, scope)?
            .into_iter()
            .map(Arc::new)
            .collect();
        let guard_manager = GuardManager::build(accepted.iter().cloned());
        debug!(guards = accepted.len(), "rebuilt check function from state");
        Ok(Self {
            accepted,
            guard_manager,
            guards_state: None,
        })
    }

    /// Evaluate every accepted guard against the environment.
    pub fn check(&self, env: &Bindings) -> bool {
        self.guard_manager.check(env)
    }

    /// The compiled guard tree.
    #[inline]
    pub fn guard_manager(&self) -> &GuardManager {
        &self.guard_manager
    }

    /// The accepted descriptors, post-filter, in tracer order.
    pub fn guards(&self) -> &[Arc<GuardDescriptor>] {
        &self.accepted
    }

    /// The portable guards state, present only after
    /// [`save`](Self::save).
    pub fn guards_state(&self) -> Option<&[u8]> {
        self.guards_state.as_deref()
    }
}

fn accept(output: TraceOutput, filter: Option<&dyn GuardFilter>) -> Vec<Arc<GuardDescriptor>> {
    let emitted = output.guards.len();
    let accepted: Vec<Arc<GuardDescriptor>> = output
        .guards
        .into_iter()
        .filter(|g| filter.is_none_or(|f| f.accepts(g)))
        .map(Arc::new)
        .collect();
    if accepted.len() < emitted {
        debug!(
            emitted,
            accepted = accepted.len(),
            "filter dropped guards"
        );
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{GuardParams, GuardPath};
    use marten_value::{DType, TensorMeta, Value};

    fn tensor_guard(name: &str) -> GuardDescriptor {
        GuardDescriptor::new(
            GuardPath::binding(name),
            GuardParams::TensorMatch {
                meta: TensorMeta::strided(DType::Float32, [2]),
            },
        )
        .unwrap()
    }

    fn bool_guard(name: &str) -> GuardDescriptor {
        GuardDescriptor::new(
            GuardPath::binding(name),
            GuardParams::BoolMatch { expected: true },
        )
        .unwrap()
    }

    #[test]
    fn kind_filter_selects_by_primary_kind() {
        let output = TraceOutput::new(vec![tensor_guard("x"), bool_guard("b")]);
        let manager = CheckFunctionManager::new(output, Some(&KindFilter(GuardKind::BoolMatch)));

        assert_eq!(manager.guards().len(), 1);
        assert_eq!(manager.guards()[0].kind(), GuardKind::BoolMatch);

        // Only the bool guard remains, so x is not consulted at all
        let env = Bindings::new().bind("b", Value::boolean(true));
        assert!(manager.check(&env));
    }

    #[test]
    fn kind_filter_selects_by_derived_kind() {
        let tagged = GuardDescriptor::with_derived(
            GuardPath::binding("x"),
            GuardParams::TensorMatch {
                meta: TensorMeta::strided(DType::Float32, [2]),
            },
            vec![GuardKind::TypeMatch],
        )
        .unwrap();

        let filter = KindFilter(GuardKind::TypeMatch);
        let manager = CheckFunctionManager::new(TraceOutput::new(vec![tagged]), Some(&filter));
        assert_eq!(manager.guards().len(), 1);
    }

    #[test]
    fn closure_filters_work() {
        let output = TraceOutput::new(vec![tensor_guard("x"), bool_guard("b")]);
        let filter = |g: &GuardDescriptor| g.kind() == GuardKind::TensorMatch;
        let manager = CheckFunctionManager::new(output, Some(&filter));
        assert_eq!(manager.guards().len(), 1);
    }

    #[test]
    fn normal_mode_produces_no_guards_state() {
        let manager = CheckFunctionManager::new(TraceOutput::new(vec![bool_guard("b")]), None);
        assert!(manager.guards_state().is_none());
    }
}
