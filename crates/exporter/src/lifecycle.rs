//! Exporter lifecycle: Fresh → Started → Stopped
//!
//! Two independent one-shot gates guard the transport's `start` and `stop`;
//! the state itself lives behind a reader/writer lock. The state turns
//! `Started` as soon as the start attempt begins, before the transport has
//! answered, so a failed start is still followed by a real `stop` on shutdown.

use std::fmt;
use std::future::Future;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use contracts::{ExportError, TransportError};

use crate::gate::{GateOutcome, OneShotGate};

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Never started
    #[default]
    Fresh,
    /// Start attempted (successfully or not), not yet stopped
    Started,
    /// Transport stop has run; terminal
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Fresh => f.write_str("fresh"),
            LifecycleState::Started => f.write_str("started"),
            LifecycleState::Stopped => f.write_str("stopped"),
        }
    }
}

type GateResult = Result<(), ExportError>;

pub(crate) struct Lifecycle {
    transport: String,
    state: RwLock<LifecycleState>,
    start_gate: OneShotGate<GateResult>,
    stop_gate: OneShotGate<GateResult>,
}

impl Lifecycle {
    pub(crate) fn new(transport: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            state: RwLock::new(LifecycleState::Fresh),
            start_gate: OneShotGate::new(),
            stop_gate: OneShotGate::new(),
        }
    }

    pub(crate) async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// Result of the start attempt, once it has completed
    #[cfg(test)]
    pub(crate) fn start_result(&self) -> Option<GateResult> {
        self.start_gate.get()
    }

    /// Run `start_transport` once for the lifetime of the exporter.
    ///
    /// The caller that runs it gets the transport's result; every other
    /// caller waits for that attempt and gets [`ExportError::AlreadyStarted`].
    pub(crate) async fn start<F, Fut>(&self, start_transport: F) -> GateResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let state = &self.state;
        let transport = self.transport.as_str();

        let outcome = self
            .start_gate
            .pass(
                move || async move {
                    *state.write().await = LifecycleState::Started;
                    let result = start_transport().await;
                    match &result {
                        Ok(()) => {
                            observability::record_lifecycle(transport, "start");
                            info!(transport, "Exporter started");
                        }
                        Err(e) => {
                            observability::record_lifecycle(transport, "start_failed");
                            warn!(transport, error = %e, "Transport start failed");
                        }
                    }
                    result.map_err(ExportError::from)
                },
                || Err(ExportError::Interrupted { operation: "start" }),
            )
            .await;

        match outcome {
            GateOutcome::Executed(result) => result,
            GateOutcome::Observed(_) => {
                debug!(transport = %self.transport, "Start already attempted");
                Err(ExportError::AlreadyStarted)
            }
        }
    }

    /// Run `stop_transport` once, if the exporter was ever started.
    ///
    /// Never-started (or already stopped) exporters return `Ok(())` without
    /// touching the transport. Concurrent callers all receive the result of
    /// the single stop attempt.
    pub(crate) async fn shutdown<F, Fut>(&self, stop_transport: F) -> GateResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        if *self.state.read().await != LifecycleState::Started {
            return Ok(());
        }

        let state = &self.state;
        let transport = self.transport.as_str();

        self.stop_gate
            .pass(
                move || async move {
                    let result = stop_transport().await;
                    *state.write().await = LifecycleState::Stopped;
                    match &result {
                        Ok(()) => {
                            observability::record_lifecycle(transport, "stop");
                            info!(transport, "Exporter stopped");
                        }
                        Err(e) => {
                            observability::record_lifecycle(transport, "stop_failed");
                            warn!(transport, error = %e, "Transport stop failed");
                        }
                    }
                    result.map_err(ExportError::from)
                },
                || Err(ExportError::Interrupted { operation: "shutdown" }),
            )
            .await
            .into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_state_transitions() {
        let lifecycle = Lifecycle::new("test");
        assert_eq!(lifecycle.state().await, LifecycleState::Fresh);
        assert_eq!(lifecycle.start_result(), None);

        lifecycle.start(|| async { Ok(()) }).await.unwrap();
        assert_eq!(lifecycle.state().await, LifecycleState::Started);
        assert_eq!(lifecycle.start_result(), Some(Ok(())));

        lifecycle.shutdown(|| async { Ok(()) }).await.unwrap();
        assert_eq!(lifecycle.state().await, LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_state_is_started_while_transport_starts() {
        let lifecycle = Lifecycle::new("test");
        let lifecycle_ref = &lifecycle;

        lifecycle
            .start(move || async move {
                // The flag is already set when the transport is asked to start
                assert_eq!(lifecycle_ref.state().await, LifecycleState::Started);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_fast_path_skips_transport() {
        let lifecycle = Lifecycle::new("test");
        let stops = AtomicUsize::new(0);
        let stops_ref = &stops;

        let result = lifecycle
            .shutdown(move || async move {
                stops_ref.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(lifecycle.state().await, LifecycleState::Fresh);
    }

    #[tokio::test]
    async fn test_failed_start_still_stops() {
        let lifecycle = Lifecycle::new("test");
        let refused = TransportError::connection("test", "refused");

        let err = lifecycle
            .start(|| async { Err(TransportError::connection("test", "refused")) })
            .await
            .unwrap_err();
        assert_eq!(err, ExportError::Transport(refused));
        assert_eq!(lifecycle.state().await, LifecycleState::Started);

        let stops = AtomicUsize::new(0);
        let stops_ref = &stops;
        lifecycle
            .shutdown(move || async move {
                stops_ref.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_after_shutdown_is_rejected() {
        let lifecycle = Lifecycle::new("test");
        lifecycle.start(|| async { Ok(()) }).await.unwrap();
        lifecycle.shutdown(|| async { Ok(()) }).await.unwrap();

        assert_eq!(
            lifecycle.start(|| async { Ok(()) }).await,
            Err(ExportError::AlreadyStarted)
        );
        assert_eq!(lifecycle.state().await, LifecycleState::Stopped);
        // Second shutdown takes the fast path
        assert_eq!(
            lifecycle
                .shutdown(|| async { Err(TransportError::not_connected("test")) })
                .await,
            Ok(())
        );
    }
}
