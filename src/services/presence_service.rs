//! Presence tracking driven by connection lifecycle, request activity, and a
//! periodic staleness sweep.
//!
//! Every operation here is best-effort: presence is advisory state, so storage
//! failures are logged and never propagated to the code path that triggered
//! the update.

use tracing::{debug, info, warn};

use crate::{
    auth::Identity,
    dao::{
        models::{DeviceEntity, DeviceStatus},
        store::Store,
    },
    services::unix_now,
    state::SharedState,
};

/// Record a device coming online as part of a connection opening.
pub async fn connection_opened(state: &SharedState, identity: &Identity) {
    let Some(store) = state.store().await else {
        return;
    };
    let now = unix_now();

    if let Some(device_id) = identity.device_id.clone() {
        let device = DeviceEntity {
            id: device_id,
            user_id: identity.user_id.clone(),
            last_seen: now,
            status: DeviceStatus::Online,
            user_agent: identity.user_agent.clone(),
        };
        if let Err(err) = store.upsert_device(device).await {
            warn!(user = %identity.user_id, error = %err, "failed to mark device online");
        }
    }

    if let Err(err) = store.touch_user(identity.user_id.clone(), now).await {
        warn!(user = %identity.user_id, error = %err, "failed to touch user last-seen");
    }
}

/// Record a device going offline as part of a connection closing.
pub async fn connection_closed(state: &SharedState, identity: &Identity) {
    let Some(device_id) = identity.device_id.clone() else {
        return;
    };
    let Some(store) = state.store().await else {
        return;
    };

    if let Err(err) = store.mark_device_offline(device_id, unix_now()).await {
        warn!(user = %identity.user_id, error = %err, "failed to mark device offline");
    }
}

/// Refresh last-seen for the caller's user and device, detached from the request.
pub fn touch(state: &SharedState, identity: &Identity) {
    let state = state.clone();
    let identity = identity.clone();
    tokio::spawn(async move {
        connection_opened(&state, &identity).await;
    });
}

/// Force every device offline, discarding flags from a previous incarnation.
///
/// Run once per process start, right after a storage backend comes up.
pub async fn reset_devices(state: &SharedState) {
    let Some(store) = state.store().await else {
        return;
    };
    match store.reset_devices().await {
        Ok(reset) if reset > 0 => info!(reset, "reset stale online devices from previous run"),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "failed to reset device presence"),
    }
}

/// Periodically mark devices offline when no activity was seen within the
/// staleness threshold. Recovers devices whose close hook never ran.
pub async fn run_sweeper(state: SharedState) {
    let mut ticker = tokio::time::interval(state.config().sweep_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(store) = state.store().await else {
            debug!("presence sweep skipped; storage unavailable");
            continue;
        };

        let cutoff = unix_now() - state.config().stale_after().as_secs() as i64;
        match store.sweep_stale_devices(cutoff).await {
            Ok(swept) if swept > 0 => info!(swept, "marked stale devices offline"),
            Ok(_) => debug!("presence sweep found no stale devices"),
            Err(err) => warn!(error = %err, "presence sweep failed"),
        }
    }
}
