// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote half of the optimistic dual-write.
//!
//! Every mutation runs the same pipeline:
//! 1. Apply to in-memory state
//! 2. Persist to the Local Store
//! 3. Attempt the remote operation if identity, connectivity and a remote
//!    owning dog are all present
//! 4. On success, reconcile remote-assigned fields and clear the unsynced mark
//! 5. On a connectivity fault, keep state, raise the flag, show a notice
//! 6. On a rejection, log, keep state, raise the flag
//!
//! Steps 1, 2 and 4 live with the state owner (see
//! [`crate::services::collection::Collection`]); this module holds the remote
//! operation itself and the fault reporting shared by every domain.

use crate::db::{RemoteScope, RemoteStore, Table};
use crate::error::{AppError, FaultKind, Result};
use crate::services::env::{DeferReason, SyncEnv};
use crate::services::notices::Notice;
use crate::services::reachability::Reachability;
use serde_json::Value;

/// One remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    Insert { row: Value },
    Update { id: String, row: Value },
    Upsert { row: Value },
    Delete { id: String },
    /// Patch every other active row in scope. A provisional keep id has no
    /// remote row, so it is sent as `None`.
    DeactivateOthers { keep_id: Option<String>, patch: Value },
}

impl RemoteOp {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteOp::Insert { .. } => "insert",
            RemoteOp::Update { .. } => "update",
            RemoteOp::Upsert { .. } => "upsert",
            RemoteOp::Delete { .. } => "delete",
            RemoteOp::DeactivateOthers { .. } => "deactivate_others",
        }
    }
}

/// Run one remote operation. Returns the row the remote store sent back, if
/// the operation returns one.
pub async fn execute(
    remote: &dyn RemoteStore,
    table: Table,
    scope: RemoteScope,
    op: RemoteOp,
) -> Result<Option<Value>> {
    match op {
        RemoteOp::Insert { row } => remote.insert(table, scope, row).await.map(Some),
        RemoteOp::Update { id, row } => remote.update(table, scope, id, row).await.map(Some),
        RemoteOp::Upsert { row } => remote.upsert(table, scope, row).await.map(Some),
        RemoteOp::Delete { id } => remote.delete(table, scope, id).await.map(|()| None),
        RemoteOp::DeactivateOthers { keep_id, patch } => remote
            .deactivate_others(table, scope, keep_id, patch)
            .await
            .map(|()| None),
    }
}

/// Extract the remote-assigned id from a returned row.
pub fn returned_id(row: &Value) -> Result<String> {
    row.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::rejected("Remote row returned without id"))
}

/// Log a failed remote write and surface it the way its class demands.
///
/// The caller keeps its state and raises its unsynced flag.
pub fn record_fault(env: &SyncEnv, table: Table, id: &str, op: &str, err: &AppError) {
    match err.kind() {
        FaultKind::Connectivity => {
            tracing::warn!(%table, id, op, error = %err, "Remote write deferred, offline");
            env.network.set(Reachability::Offline);
            env.notifier.notify(Notice::OfflineWillSync);
        }
        _ => {
            tracing::error!(%table, id, op, error = %err, "Remote write rejected");
        }
    }
}

/// Log a mutation that stayed local because the remote write could not be
/// attempted.
pub fn record_deferred(env: &SyncEnv, table: Table, id: &str, reason: DeferReason) {
    tracing::debug!(%table, id, ?reason, "Remote write deferred");
    if reason == DeferReason::Offline {
        env.notifier.notify(Notice::OfflineWillSync);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_returned_id() {
        assert_eq!(returned_id(&json!({"id": "abc"})).unwrap(), "abc");
        assert!(returned_id(&json!({"name": "x"})).is_err());
    }

    #[test]
    fn test_op_names() {
        assert_eq!(RemoteOp::Delete { id: "x".into() }.name(), "delete");
        assert_eq!(
            RemoteOp::DeactivateOthers {
                keep_id: None,
                patch: json!({"is_active": false}),
            }
            .name(),
            "deactivate_others"
        );
    }
}
