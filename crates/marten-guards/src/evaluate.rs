//! Per-kind guard predicates.
//!
//! Every evaluator is a pure function of the bound value and the check
//! environment, with no side effects and no retries. Any mismatch,
//! including a value of the wrong variant, is an immediate `false`.

use std::sync::Arc;

use marten_value::{Bindings, Value};

use crate::descriptor::{AccessStep, GuardDescriptor, GuardParams, GuardPath, Root};

/// Resolve one accessor step against a value.
///
/// `None` means the access itself failed (missing attribute or key, dead
/// weak reference, accessor with nothing to return); the check fails
/// immediately at that point.
pub(crate) fn apply_step(value: &Value, step: &AccessStep) -> Option<Value> {
    match step {
        AccessStep::Attr(name) => value.as_object()?.get_attr(name),
        AccessStep::Key(key) => match value {
            Value::Dict(d) => d.get(key),
            Value::MappingProxy(m) => m.get(key),
            _ => None,
        },
        AccessStep::Call => value.as_callable()?.call(),
        AccessStep::Deref => value.as_weak()?.upgrade(),
    }
}

/// Resolve a full path against the environment.
pub(crate) fn resolve_path(env: &Bindings, path: &GuardPath) -> Option<Value> {
    let Root::Binding(name) = path.root() else {
        return None;
    };
    let mut current = env.get(name)?.clone();
    for step in path.steps() {
        current = apply_step(&current, step)?;
    }
    Some(current)
}

/// Evaluate one leaf predicate against its bound value.
///
/// Ambient kinds ignore `value` and read the environment's transform
/// state instead.
pub(crate) fn eval_leaf(desc: &GuardDescriptor, value: &Value, env: &Bindings) -> bool {
    match desc.params() {
        GuardParams::TensorMatch { meta } => value.tensor_meta() == Some(meta),

        // Identity of the type object, recovered by qualified name at
        // load time; a subclass or a same-named local class fails.
        GuardParams::TypeMatch { ty } => match value.as_object() {
            Some(obj) => Arc::ptr_eq(obj.ty(), ty),
            None => false,
        },

        GuardParams::NotPresentInGenericDict { attr } => match value.as_object() {
            Some(obj) => !obj.instance_dict().contains_key(attr),
            None => false,
        },

        GuardParams::HasAttr { attr, present } => match value.as_object() {
            Some(obj) => obj.has_attr(attr) == *present,
            None => false,
        },

        GuardParams::DictContains { key, contains } => match value {
            Value::Dict(d) => d.contains_key(key) == *contains,
            Value::MappingProxy(m) => m.contains_key(key) == *contains,
            _ => false,
        },

        GuardParams::DictKeysMatch { keys } => match value.as_dict() {
            Some(d) => d.keys() == *keys,
            None => false,
        },

        GuardParams::MappingKeysCheck { keys } => match value.as_mapping() {
            Some(m) => m.keys() == *keys,
            None => false,
        },

        GuardParams::BoolMatch { expected } => value.as_bool() == Some(*expected),

        GuardParams::NoneMatch { is_none } => value.is_none() == *is_none,

        GuardParams::DispatchKeySetMatch { keys } => value.dispatch_key_set() == Some(*keys),

        GuardParams::NameMatch { name } => match value.as_callable() {
            Some(f) => f.name() == *name,
            None => false,
        },

        GuardParams::DualLevel { level } => env.transforms().dual_level() == *level,

        GuardParams::FunctorchStackMatch { stack } => env.transforms().stack() == stack.as_slice(),

        GuardParams::IdMatch { id } => value.object_id() == Some(*id),

        GuardParams::DictVersion { version } => match value.as_dict() {
            Some(d) => d.version() == *version,
            None => false,
        },

        GuardParams::DuplicateInput { other } => match resolve_path(env, other) {
            Some(other_value) => value.ptr_eq(&other_value),
            None => false,
        },

        GuardParams::WeakrefAlive => match value.as_weak() {
            Some(w) => w.is_alive(),
            None => false,
        },
    }
}
