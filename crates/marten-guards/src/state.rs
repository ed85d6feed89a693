//! Portable guards state.
//!
//! The codec turns an accepted descriptor set into an opaque, versioned
//! blob and back. Encoding captures only stable data (metadata, literal
//! values, ordered key sequences, qualified names), never addresses or
//! per-process counters. Kinds whose validity depends on transient
//! identity are rejected at save time; a blob is produced whole or not
//! at all.
//!
//! Blob layout: [`GUARDS_STATE_MAGIC`] followed by a JSON-encoded
//! [`GuardsState`] whose `version` field is checked against
//! [`GUARDS_STATE_VERSION`] on load.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use marten_value::{DispatchKeySet, GlobalScope, TensorMeta, TransformKind};

use crate::descriptor::{GuardDescriptor, GuardKind, GuardParams, GuardPath, Serializability};
use crate::error::{LoadError, SaveError};
use crate::{GUARDS_STATE_MAGIC, GUARDS_STATE_VERSION};

/// Portable snapshot of an accepted guard set.
#[derive(Debug, Serialize, Deserialize)]
pub struct GuardsState {
    /// Codec version that wrote this state.
    pub version: u32,
    /// Encoded descriptors, in tracer order.
    pub guards: Vec<EncodedGuard>,
}

/// One encoded descriptor.
#[derive(Debug, Serialize, Deserialize)]
pub struct EncodedGuard {
    path: GuardPath,
    params: EncodedParams,
    derived_kinds: Vec<GuardKind>,
}

/// Portable form of [`GuardParams`], restricted to serializable kinds.
/// Captured types are reduced to their qualified names.
#[derive(Debug, Serialize, Deserialize)]
enum EncodedParams {
    TensorMatch { meta: TensorMeta },
    TypeMatch { qualified_name: String },
    NotPresentInGenericDict { attr: String },
    HasAttr { attr: String, present: bool },
    DictContains { key: String, contains: bool },
    DictKeysMatch { keys: Vec<String> },
    MappingKeysCheck { keys: Vec<String> },
    BoolMatch { expected: bool },
    NoneMatch { is_none: bool },
    DispatchKeySetMatch { keys: DispatchKeySet },
    NameMatch { name: String },
    DualLevel { level: u64 },
    FunctorchStackMatch { stack: Vec<TransformKind> },
}

/// Serialize an accepted guard set into a portable blob.
pub(crate) fn save_guards(accepted: &[Arc<GuardDescriptor>]) -> Result<Vec<u8>, SaveError> {
    let mut guards = Vec::with_capacity(accepted.len());
    for descriptor in accepted {
        guards.push(encode(descriptor)?);
    }

    let state = GuardsState {
        version: GUARDS_STATE_VERSION,
        guards,
    };
    let payload = serde_json::to_vec(&state)?;

    let mut blob = Vec::with_capacity(GUARDS_STATE_MAGIC.len() + payload.len());
    blob.extend_from_slice(&GUARDS_STATE_MAGIC);
    blob.extend_from_slice(&payload);
    trace!(guards = accepted.len(), bytes = blob.len(), "saved guards state");
    Ok(blob)
}

/// Deserialize a blob back into descriptors, resolving qualified names
/// against `scope`.
pub(crate) fn load_guards(
    blob: &[u8],
    scope: &GlobalScope,
) -> Result<Vec<GuardDescriptor>, LoadError> {
    let payload = blob
        .strip_prefix(GUARDS_STATE_MAGIC.as_slice())
        .ok_or(LoadError::BadMagic)?;
    let state: GuardsState = serde_json::from_slice(payload)?;
    if state.version != GUARDS_STATE_VERSION {
        return Err(LoadError::UnsupportedVersion(state.version));
    }

    let mut guards = Vec::with_capacity(state.guards.len());
    for encoded in state.guards {
        guards.push(decode(encoded, scope)?);
    }
    trace!(guards = guards.len(), "loaded guards state");
    Ok(guards)
}

fn encode(descriptor: &GuardDescriptor) -> Result<EncodedGuard, SaveError> {
    if descriptor.serializability() == Serializability::Never {
        return Err(SaveError::NotSerializable {
            kind: descriptor.kind(),
        });
    }

    let params = match descriptor.params() {
        GuardParams::TensorMatch { meta } => EncodedParams::TensorMatch { meta: meta.clone() },
        GuardParams::TypeMatch { ty } => {
            let qualified_name = ty.qualified_name().ok_or_else(|| SaveError::UnnamedType {
                type_name: ty.name().to_string(),
            })?;
            EncodedParams::TypeMatch {
                qualified_name: qualified_name.to_string(),
            }
        }
        GuardParams::NotPresentInGenericDict { attr } => {
            EncodedParams::NotPresentInGenericDict { attr: attr.clone() }
        }
        GuardParams::HasAttr { attr, present } => EncodedParams::HasAttr {
            attr: attr.clone(),
            present: *present,
        },
        GuardParams::DictContains { key, contains } => EncodedParams::DictContains {
            key: key.clone(),
            contains: *contains,
        },
        GuardParams::DictKeysMatch { keys } => EncodedParams::DictKeysMatch { keys: keys.clone() },
        GuardParams::MappingKeysCheck { keys } => {
            EncodedParams::MappingKeysCheck { keys: keys.clone() }
        }
        GuardParams::BoolMatch { expected } => EncodedParams::BoolMatch {
            expected: *expected,
        },
        GuardParams::NoneMatch { is_none } => EncodedParams::NoneMatch { is_none: *is_none },
        GuardParams::DispatchKeySetMatch { keys } => {
            EncodedParams::DispatchKeySetMatch { keys: *keys }
        }
        GuardParams::NameMatch { name } => EncodedParams::NameMatch { name: name.clone() },
        GuardParams::DualLevel { level } => EncodedParams::DualLevel { level: *level },
        GuardParams::FunctorchStackMatch { stack } => EncodedParams::FunctorchStackMatch {
            stack: stack.clone(),
        },
        GuardParams::IdMatch { .. }
        | GuardParams::DictVersion { .. }
        | GuardParams::DuplicateInput { .. }
        | GuardParams::WeakrefAlive => {
            // Unreachable past the policy check above; refuse regardless.
            return Err(SaveError::NotSerializable {
                kind: descriptor.kind(),
            });
        }
    };

    Ok(EncodedGuard {
        path: descriptor.path().clone(),
        params,
        derived_kinds: descriptor.derived_kinds().to_vec(),
    })
}

fn decode(encoded: EncodedGuard, scope: &GlobalScope) -> Result<GuardDescriptor, LoadError> {
    let params = match encoded.params {
        EncodedParams::TensorMatch { meta } => GuardParams::TensorMatch { meta },
        EncodedParams::TypeMatch { qualified_name } => {
            let ty = scope
                .resolve(&qualified_name)
                .ok_or(LoadError::UnresolvedGlobal { qualified_name })?;
            GuardParams::TypeMatch { ty: ty.clone() }
        }
        EncodedParams::NotPresentInGenericDict { attr } => {
            GuardParams::NotPresentInGenericDict { attr }
        }
        EncodedParams::HasAttr { attr, present } => GuardParams::HasAttr { attr, present },
        EncodedParams::DictContains { key, contains } => {
            GuardParams::DictContains { key, contains }
        }
        EncodedParams::DictKeysMatch { keys } => GuardParams::DictKeysMatch { keys },
        EncodedParams::MappingKeysCheck { keys } => GuardParams::MappingKeysCheck { keys },
        EncodedParams::BoolMatch { expected } => GuardParams::BoolMatch { expected },
        EncodedParams::NoneMatch { is_none } => GuardParams::NoneMatch { is_none },
        EncodedParams::DispatchKeySetMatch { keys } => GuardParams::DispatchKeySetMatch { keys },
        EncodedParams::NameMatch { name } => GuardParams::NameMatch { name },
        EncodedParams::DualLevel { level } => GuardParams::DualLevel { level },
        EncodedParams::FunctorchStackMatch { stack } => GuardParams::FunctorchStackMatch { stack },
    };

    let descriptor = GuardDescriptor::with_derived(encoded.path, params, encoded.derived_kinds)?;
    Ok(descriptor)
}
