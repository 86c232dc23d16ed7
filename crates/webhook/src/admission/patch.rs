//! JSON Patch construction for sealed Secrets.
//!
//! The patch is minimal: it rewrites `data`, drops the write-only
//! `stringData`, and adds the sealing annotations. Labels, owner references and
//! unrelated annotations are never touched.
//!
//! Map keys that end up inside a JSON Pointer are escaped (`~` as `~0`, `/` as
//! `~1`); annotation keys such as `auto-seal.io/algorithm` rely on it.

use std::collections::BTreeMap;

use common::protocol::PatchType;
use json_patch::{AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use serde_json::Value;
use thiserror::Error;

use super::matcher::SealPolicy;
use crate::crypto::SealedPayload;

/// Errors produced while building a patch.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to serialise patch: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Build the patch for `secret`.
///
/// Returns `None` when there is nothing to seal, meaning "allow unchanged".
///
/// # Errors
///
/// Returns [`PatchError::Serialize`] if the patch document cannot be encoded.
pub fn build(
    secret: &Secret,
    sealed: Option<&SealedPayload>,
    policy: &SealPolicy,
) -> Result<Option<(PatchType, Vec<u8>)>, PatchError> {
    let Some(sealed) = sealed else {
        return Ok(None);
    };
    let patch = Patch(operations(secret, sealed, policy)?);
    Ok(Some((PatchType::JsonPatch, serde_json::to_vec(&patch)?)))
}

/// The ordered patch operations that seal `secret`.
fn operations(
    secret: &Secret,
    sealed: &SealedPayload,
    policy: &SealPolicy,
) -> Result<Vec<PatchOperation>, PatchError> {
    let mut ops = Vec::with_capacity(4);

    let data: BTreeMap<String, ByteString> = sealed
        .field_tokens()
        .into_iter()
        .map(|(k, token)| (k, ByteString(token.into_bytes())))
        .collect();
    let data = serde_json::to_value(data)?;
    let data_path = pointer(&["data"]);
    if secret.data.is_some() {
        ops.push(PatchOperation::Replace(ReplaceOperation {
            path: data_path,
            value: data,
        }));
    } else {
        ops.push(PatchOperation::Add(AddOperation {
            path: data_path,
            value: data,
        }));
    }

    if secret.string_data.is_some() {
        ops.push(PatchOperation::Remove(RemoveOperation {
            path: pointer(&["stringData"]),
        }));
    }

    let algorithm_key = policy.algorithm_annotation();
    let recipients_key = policy.recipients_annotation();
    let recipients = sealed.recipient_ids();
    if secret.metadata.annotations.is_some() {
        for (key, value) in [(&algorithm_key, sealed.algorithm.to_owned()), (&recipients_key, recipients)] {
            ops.push(PatchOperation::Add(AddOperation {
                path: pointer(&["metadata", "annotations", key.as_str()]),
                value: Value::String(value),
            }));
        }
    } else {
        let annotations = BTreeMap::from([
            (algorithm_key, sealed.algorithm.to_owned()),
            (recipients_key, recipients),
        ]);
        ops.push(PatchOperation::Add(AddOperation {
            path: pointer(&["metadata", "annotations"]),
            value: serde_json::to_value(annotations)?,
        }));
    }

    Ok(ops)
}

/// Build an escaped JSON Pointer from unescaped reference tokens.
fn pointer(tokens: &[&str]) -> PointerBuf {
    PointerBuf::from_tokens(tokens.iter().copied())
}
