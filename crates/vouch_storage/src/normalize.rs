//! Collapse backend reply shapes into one result type.

use crate::{BackendReply, BackendResult};

/// Normalize a reply that must carry a value.
///
/// A failed call, an envelope with `ok == false`, and an envelope that
/// claims success but carries no value all become `Err(message)`.
pub fn normalize<T>(outcome: BackendResult<T>) -> Result<T, String> {
    match outcome {
        Err(e) => Err(e.kind.to_string()),
        Ok(BackendReply::Value(value)) => Ok(value),
        Ok(BackendReply::Structured {
            ok: true,
            value: Some(value),
            ..
        }) => Ok(value),
        Ok(BackendReply::Structured {
            ok: true,
            value: None,
            ..
        }) => Err("backend reported success without a value".to_string()),
        Ok(BackendReply::Structured { ok: false, error, .. }) => Err(failure_message(error)),
    }
}

/// Normalize a reply for calls with nothing to return.
///
/// `{ ok: true }` without a value is a success here.
pub fn normalize_unit(outcome: BackendResult<()>) -> Result<(), String> {
    match outcome {
        Err(e) => Err(e.kind.to_string()),
        Ok(BackendReply::Value(())) => Ok(()),
        Ok(BackendReply::Structured { ok: true, .. }) => Ok(()),
        Ok(BackendReply::Structured { ok: false, error, .. }) => Err(failure_message(error)),
    }
}

fn failure_message(error: Option<String>) -> String {
    error.unwrap_or_else(|| "backend reported failure without a message".to_string())
}
