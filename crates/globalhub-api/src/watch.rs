//! Polling watch streams.
//!
//! The store has no change feed, so a watch re-runs the same snapshot a
//! plain GET would produce every poll interval and writes it to the client
//! as one JSON document per line. Only the latest snapshot matters; ticks
//! missed while the client is slow to read are dropped.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use globalhub_core::error::{HubError, HubResult};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;

/// Lifecycle of one watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Connected,
    Streaming,
    ClientClosed,
    TimedOut,
    Terminated,
}

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ClientClosed,
    TimedOut,
    Shutdown,
    StoreUnavailable,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::ClientClosed => "client closed",
            StopReason::TimedOut => "timed out",
            StopReason::Shutdown => "server shutdown",
            StopReason::StoreUnavailable => "store unavailable",
        })
    }
}

/// Produces the current snapshot of the watched resource.
pub type SnapshotFn = Arc<dyn Fn() -> BoxFuture<'static, HubResult<Value>> + Send + Sync>;

/// Body chunks of a watch response.
pub type WatchStream = ReceiverStream<Result<Bytes, Infallible>>;

/// A running watch: the body stream plus handles to observe the task.
pub struct WatchHandle {
    pub stream: WatchStream,
    pub state: watch::Receiver<WatchState>,
    pub task: JoinHandle<StopReason>,
}

/// Spawns watch tasks sharing one configuration and shutdown token.
#[derive(Clone)]
pub struct WatchController {
    config: WatchConfig,
    shutdown: CancellationToken,
}

impl WatchController {
    pub fn new(config: WatchConfig, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Starts streaming snapshots from `producer`.
    ///
    /// The task ends when the returned stream is dropped, the idle
    /// ceiling passes, the shutdown token fires or the store is lost.
    pub fn spawn(&self, name: impl Into<String>, producer: SnapshotFn) -> WatchHandle {
        // A single slot: a slow reader sees the newest snapshot, not a backlog.
        let (tx, rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(WatchState::Connected);
        let task = tokio::spawn(run(
            name.into(),
            self.config,
            self.shutdown.clone(),
            producer,
            tx,
            state_tx,
        ));
        WatchHandle {
            stream: ReceiverStream::new(rx),
            state: state_rx,
            task,
        }
    }
}

async fn run(
    name: String,
    config: WatchConfig,
    shutdown: CancellationToken,
    producer: SnapshotFn,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    state: watch::Sender<WatchState>,
) -> StopReason {
    state.send_replace(WatchState::Streaming);
    debug!(watch = %name, "Watch streaming");

    let deadline = tokio::time::sleep(config.idle_timeout);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reason = loop {
        tokio::select! {
            biased;
            _ = tx.closed() => break StopReason::ClientClosed,
            _ = shutdown.cancelled() => break StopReason::Shutdown,
            _ = &mut deadline => break StopReason::TimedOut,
            _ = ticker.tick() => {}
        }

        let snapshot = tokio::select! {
            biased;
            _ = tx.closed() => break StopReason::ClientClosed,
            _ = shutdown.cancelled() => break StopReason::Shutdown,
            snapshot = producer() => snapshot,
        };

        let document = match snapshot {
            Ok(document) => document,
            Err(HubError::StoreUnavailable(err)) => {
                warn!(watch = %name, error = %err, "Store lost, closing watch");
                break StopReason::StoreUnavailable;
            }
            Err(err) => {
                warn!(watch = %name, error = %err, "Snapshot failed, skipping tick");
                continue;
            }
        };

        let mut line = match serde_json::to_vec(&document) {
            Ok(line) => line,
            Err(err) => {
                warn!(watch = %name, error = %err, "Snapshot not serializable, skipping tick");
                continue;
            }
        };
        line.push(b'\n');

        // A reader that stops reading blocks here; every stop source applies.
        tokio::select! {
            biased;
            _ = tx.closed() => break StopReason::ClientClosed,
            _ = shutdown.cancelled() => break StopReason::Shutdown,
            _ = &mut deadline => break StopReason::TimedOut,
            sent = tx.send(Ok(Bytes::from(line))) => {
                if sent.is_err() {
                    break StopReason::ClientClosed;
                }
            }
        }
    };

    match reason {
        StopReason::ClientClosed => {
            state.send_replace(WatchState::ClientClosed);
        }
        StopReason::TimedOut => {
            state.send_replace(WatchState::TimedOut);
        }
        StopReason::Shutdown | StopReason::StoreUnavailable => {}
    }
    // Dropping the sender ends the response body.
    drop(tx);
    state.send_replace(WatchState::Terminated);
    info!(watch = %name, reason = %reason, "Watch terminated");
    reason
}
