//! Activation tracking.
//!
//! Each federation object has one activation row, updated in place. Objects a
//! source stops reporting are closed by a sweep at the end of the pass.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use fedsync_model::{Activation, FederationObjectKind, FederationObjectRef};
use fedsync_storage::StoreTransaction;
use tracing::debug;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::report::Outcome;

/// Upserts the activation row of `object`.
///
/// A `deactivated_at` earlier than `activated_at` is clamped to it, so the
/// stored interval is never inverted.
///
/// ## Errors
///
/// Propagates storage failures.
pub async fn activate(
    tx: &mut dyn StoreTransaction,
    object: FederationObjectRef,
    activated_at: DateTime<Utc>,
    deactivated_at: Option<DateTime<Utc>>,
) -> SyncResult<Outcome> {
    let deactivated_at = deactivated_at.map(|end| end.max(activated_at));

    let Some(mut activation) = tx.find_activations(object).await?.into_iter().next() else {
        tx.insert_activation(&Activation::new(object, activated_at, deactivated_at))
            .await?;
        return Ok(Outcome::Created);
    };

    if activation.activated_at == activated_at && activation.deactivated_at == deactivated_at {
        return Ok(Outcome::Unchanged);
    }
    activation.activated_at = activated_at;
    activation.deactivated_at = deactivated_at;
    activation.updated_at = Utc::now();
    tx.update_activation(&activation).await?;
    Ok(Outcome::Updated)
}

/// Opens an activation at `now` unless `object` already has an open one.
///
/// ## Errors
///
/// Propagates storage failures.
pub async fn ensure_active(
    tx: &mut dyn StoreTransaction,
    object: FederationObjectRef,
    now: DateTime<Utc>,
) -> SyncResult<Outcome> {
    let open = tx
        .find_activations(object)
        .await?
        .iter()
        .any(|a| a.is_open_at(now));
    if open {
        Ok(Outcome::Unchanged)
    } else {
        activate(tx, object, now, None).await
    }
}

/// Closes every open activation of `kind` whose object is not in `touched`.
///
/// Returns the number of activations closed.
///
/// ## Errors
///
/// Propagates storage failures.
pub async fn sweep(
    tx: &mut dyn StoreTransaction,
    kind: FederationObjectKind,
    touched: &BTreeSet<Uuid>,
    now: DateTime<Utc>,
) -> SyncResult<usize> {
    let mut closed = 0;
    for mut activation in tx.list_open_activations(kind, now).await? {
        if touched.contains(&activation.federation_object.id) {
            continue;
        }
        activation.deactivated_at = Some(now.max(activation.activated_at));
        activation.updated_at = Utc::now();
        tx.update_activation(&activation).await?;
        debug!(object = %activation.federation_object, "deactivated");
        closed += 1;
    }
    Ok(closed)
}
