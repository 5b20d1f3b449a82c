// Camera presence reconciliation
//
// One cycle: enumerate devices, read the inventory, diff, write the minimal
// set of identity-keyed upserts. plan() is pure; apply() does the writes.

pub mod worker;


use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::camera::{CameraPatch, CameraRecord, CameraStatus, InventoryStore};
use crate::error::{CamwatchError, Result};
use crate::probe::{DeviceEnumerator, Observations};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Persisted ACTIVE and observed with changed fields: refresh them
    Refresh,
    /// Persisted DISCONNECTED and observed again: refresh, mark ACTIVE
    Reconnect,
    /// Persisted ACTIVE but not observed: mark DISCONNECTED
    Disconnect,
    /// Observed with no persisted record: insert ACTIVE
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOp {
    pub identity_key: String,
    pub kind: OpKind,
    pub patch: CameraPatch,
}

/// Outcome of one applied cycle
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub observed: usize,
    pub created: usize,
    pub refreshed: usize,
    pub reconnected: usize,
    pub disconnected: usize,
    /// Persisted records the plan left alone (unchanged, DISCONNECTED or ERROR)
    pub untouched: usize,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Diff observations against persisted records.
///
/// Ops come out in record order (refreshes, reconnects and disconnects),
/// followed by creations in identity order. An observed record whose fields
/// already match gets no op. Records in DISCONNECTED or ERROR that were not
/// observed get no op at all. ERROR records that are observed are also left
/// alone: only an administrator clears ERROR.
pub fn plan(observations: &Observations, records: &[CameraRecord]) -> Vec<UpsertOp> {
    let mut unmatched: BTreeMap<&str, _> = observations
        .iter()
        .map(|(key, obs)| (key.as_str(), obs))
        .collect();
    let mut ops = Vec::new();

    for record in records {
        let key = record.device_id.as_str();
        match unmatched.remove(key) {
            Some(_) if record.status == CameraStatus::Error => {}
            Some(obs) => {
                let patch = CameraPatch::observed(obs);
                if patch.is_noop_for(record) {
                    continue;
                }
                let kind = if record.status == CameraStatus::Active {
                    OpKind::Refresh
                } else {
                    OpKind::Reconnect
                };
                ops.push(UpsertOp {
                    identity_key: key.to_string(),
                    kind,
                    patch,
                });
            }
            None if record.status == CameraStatus::Active => ops.push(UpsertOp {
                identity_key: key.to_string(),
                kind: OpKind::Disconnect,
                patch: CameraPatch::disconnected(),
            }),
            None => {}
        }
    }

    for (key, obs) in unmatched {
        ops.push(UpsertOp {
            identity_key: key.to_string(),
            kind: OpKind::Create,
            patch: CameraPatch::observed(obs),
        });
    }

    ops
}

/// Apply ops in order. Every op is attempted even after a failure; any
/// failure makes the whole call an error so the caller logs the cycle.
pub fn apply<S: InventoryStore + ?Sized>(store: &S, ops: &[UpsertOp]) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();
    let mut failed = 0usize;
    let mut first_error: Option<String> = None;

    for op in ops {
        match store.upsert_by_identity(&op.identity_key, &op.patch) {
            Ok(_) => match op.kind {
                OpKind::Create => {
                    log::info!("Camera connected (new): {}", op.identity_key);
                    summary.created += 1;
                }
                OpKind::Refresh => summary.refreshed += 1,
                OpKind::Reconnect => {
                    log::info!("Camera reconnected: {}", op.identity_key);
                    summary.reconnected += 1;
                }
                OpKind::Disconnect => {
                    log::info!("Camera disconnected: {}", op.identity_key);
                    summary.disconnected += 1;
                }
            },
            Err(e) => {
                log::warn!("Inventory write for {} failed: {}", op.identity_key, e);
                failed += 1;
                first_error.get_or_insert_with(|| format!("{}: {}", op.identity_key, e));
            }
        }
    }

    if let Some(first) = first_error {
        return Err(CamwatchError::PartialApply {
            failed,
            total: ops.len(),
            first,
        });
    }

    summary.finished_at = Some(Utc::now());
    Ok(summary)
}

/// One full probe-diff-apply pass.
pub fn reconcile_once<S, E>(store: &S, enumerator: &E) -> Result<ReconcileSummary>
where
    S: InventoryStore + ?Sized,
    E: DeviceEnumerator + ?Sized,
{
    let observations = enumerator.enumerate();
    let records = store.list_all()?;

    let ops = plan(&observations, &records);
    let mut summary = apply(store, &ops)?;

    summary.observed = observations.len();
    summary.untouched = records.len()
        - ops.iter().filter(|op| op.kind != OpKind::Create).count();

    Ok(summary)
}
