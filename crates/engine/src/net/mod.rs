//! Network monitoring.
//!
//! Tracks connectivity as a three-way status derived from host-provided
//! link hints, publishes a composite [`NetworkState`] over a watch channel,
//! and drives the sync manager on transitions: a debounced sync pass when
//! connectivity returns, cancellation when it drops.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::sync::{SyncManager, SyncStatus};

/// A raw connectivity observation from the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkHint {
    pub connected: bool,
    pub rtt_ms: Option<u64>,
    pub downlink_kbps: Option<u64>,
    /// Host already judged the link as low grade (e.g. 2g-class).
    pub low_grade: bool,
}

/// Connectivity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkStatus {
    Online,
    Slow,
    Offline,
}

/// Composite network state published to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub status: NetworkStatus,
    pub last_online: Option<DateTime<Utc>>,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_changes: u64,
    pub rtt_ms: Option<u64>,
    pub downlink_kbps: Option<u64>,
}

impl NetworkState {
    pub fn is_offline(&self) -> bool {
        self.status == NetworkStatus::Offline
    }
}

/// Connectivity input for the monitor: the state at startup plus a stream
/// of subsequent observations.
pub struct ConnectivitySignal {
    pub initial: LinkHint,
    pub hints: mpsc::Receiver<LinkHint>,
}

impl ConnectivitySignal {
    /// A signal pair whose sender half is handed to the host platform.
    pub fn channel(initial: LinkHint) -> (mpsc::Sender<LinkHint>, Self) {
        let (tx, rx) = mpsc::channel(32);
        (tx, Self { initial, hints: rx })
    }
}

/// Derives [`NetworkStatus`] from link hints and owns the state channel.
pub struct NetworkMonitor {
    state_tx: watch::Sender<NetworkState>,
    slow_rtt_ms: u64,
    slow_downlink_kbps: u64,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

fn classify(hint: &LinkHint, slow_rtt_ms: u64, slow_downlink_kbps: u64) -> NetworkStatus {
    if !hint.connected {
        return NetworkStatus::Offline;
    }
    let slow_rtt = hint.rtt_ms.is_some_and(|rtt| rtt >= slow_rtt_ms);
    let slow_downlink = hint.downlink_kbps.is_some_and(|kbps| kbps < slow_downlink_kbps);
    if hint.low_grade || slow_rtt || slow_downlink { NetworkStatus::Slow } else { NetworkStatus::Online }
}

impl NetworkMonitor {
    pub fn new(initial: &LinkHint, slow_rtt_ms: u64, slow_downlink_kbps: u64) -> Self {
        let status = classify(initial, slow_rtt_ms, slow_downlink_kbps);
        let (state_tx, _) = watch::channel(NetworkState {
            status,
            last_online: (status != NetworkStatus::Offline).then(Utc::now),
            last_sync: None,
            pending_changes: 0,
            rtt_ms: initial.rtt_ms,
            downlink_kbps: initial.downlink_kbps,
        });
        Self { state_tx, slow_rtt_ms, slow_downlink_kbps, task: std::sync::Mutex::new(None) }
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state_tx.subscribe()
    }

    pub fn current(&self) -> NetworkState {
        self.state_tx.borrow().clone()
    }

    /// Spawn the monitor loop. Subsequent link hints update the published
    /// state; an offline-to-online transition schedules a debounced sync
    /// pass, an online-to-offline transition cancels any in-flight pass.
    pub fn start(&self, mut hints: mpsc::Receiver<LinkHint>, sync: Arc<SyncManager>, debounce: Duration) {
        let state_tx = self.state_tx.clone();
        let slow_rtt_ms = self.slow_rtt_ms;
        let slow_downlink_kbps = self.slow_downlink_kbps;

        let handle = tokio::spawn(async move {
            let mut reports = sync.subscribe_reports();
            let mut pending = sync.pending_watch();
            let mut debounced: Option<JoinHandle<()>> = None;

            loop {
                tokio::select! {
                    hint = hints.recv() => {
                        let Some(hint) = hint else { break };
                        let status = classify(&hint, slow_rtt_ms, slow_downlink_kbps);
                        let prev = state_tx.borrow().status;
                        state_tx.send_modify(|s| {
                            s.status = status;
                            s.rtt_ms = hint.rtt_ms;
                            s.downlink_kbps = hint.downlink_kbps;
                            if status != NetworkStatus::Offline {
                                s.last_online = Some(Utc::now());
                            }
                        });
                        if prev == NetworkStatus::Offline && status != NetworkStatus::Offline {
                            tracing::info!(?status, "connectivity restored, scheduling sync");
                            if let Some(t) = debounced.take() {
                                t.abort();
                            }
                            let sync = sync.clone();
                            debounced = Some(tokio::spawn(async move {
                                tokio::time::sleep(debounce).await;
                                sync.sync_now().await;
                            }));
                        } else if prev != NetworkStatus::Offline && status == NetworkStatus::Offline {
                            tracing::info!("connectivity lost");
                            if let Some(t) = debounced.take() {
                                t.abort();
                            }
                            sync.cancel();
                        }
                    }
                    changed = pending.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let n = *pending.borrow_and_update();
                        state_tx.send_modify(|s| s.pending_changes = n);
                    }
                    report = reports.recv() => {
                        match report {
                            Ok(r) if r.status == SyncStatus::Completed => {
                                state_tx.send_modify(|s| s.last_sync = Some(Utc::now()));
                            }
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(handle);
        }
    }

    pub fn stop(&self) {
        if let Ok(mut slot) = self.task.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_disconnected_is_offline() {
        let hint = LinkHint { connected: false, rtt_ms: Some(50), downlink_kbps: Some(10_000), low_grade: false };
        assert_eq!(classify(&hint, 2_000, 500), NetworkStatus::Offline);
    }

    #[test]
    fn test_classify_fast_link_is_online() {
        let hint = LinkHint { connected: true, rtt_ms: Some(80), downlink_kbps: Some(10_000), low_grade: false };
        assert_eq!(classify(&hint, 2_000, 500), NetworkStatus::Online);
    }

    #[test]
    fn test_classify_slow_signals() {
        let high_rtt = LinkHint { connected: true, rtt_ms: Some(2_500), downlink_kbps: None, low_grade: false };
        assert_eq!(classify(&high_rtt, 2_000, 500), NetworkStatus::Slow);

        let thin_downlink = LinkHint { connected: true, rtt_ms: None, downlink_kbps: Some(200), low_grade: false };
        assert_eq!(classify(&thin_downlink, 2_000, 500), NetworkStatus::Slow);

        let low_grade = LinkHint { connected: true, rtt_ms: None, downlink_kbps: None, low_grade: true };
        assert_eq!(classify(&low_grade, 2_000, 500), NetworkStatus::Slow);
    }

    #[test]
    fn test_classify_no_metrics_is_online() {
        let hint = LinkHint { connected: true, rtt_ms: None, downlink_kbps: None, low_grade: false };
        assert_eq!(classify(&hint, 2_000, 500), NetworkStatus::Online);
    }

    #[test]
    fn test_initial_state_from_hint() {
        let monitor = NetworkMonitor::new(&LinkHint { connected: false, ..Default::default() }, 2_000, 500);
        let state = monitor.current();
        assert_eq!(state.status, NetworkStatus::Offline);
        assert!(state.last_online.is_none());
        assert_eq!(state.pending_changes, 0);
    }
}
