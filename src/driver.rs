//! The top-level driver (§6): ties the GCS Adapter, Event Intake, Roster,
//! and Event Dispatcher together behind the registration-table shape the
//! host daemon expects — `{name, init, local_addr, join, leave, notify,
//! block, unblock}` — plus a `pump()` entry point that drives intake and
//! dispatch from whatever the host's event loop observed on the GCS
//! readiness descriptor.

use backon::{BlockingRetryable, ConstantBuilder};
use bytes::Bytes;
use tracing::error;

use crate::codec::{self, WireEnvelope};
use crate::config::DriverConfig;
use crate::dispatch;
use crate::error::{DriverError, DriverResult};
use crate::intake;
use crate::metrics::DriverMetrics;
use crate::roster::Roster;
use crate::transport::{GroupEvent, GroupTransport, InitError, LocalIdentity, SendError};
use crate::types::{JoinResult, MessageKind, NodeInfo};
use crate::upcall::ClusterHandler;
use crate::state::DriverState;

/// Name this driver registers under (§6): `"corosync"`, naming the GCS
/// backend a production [`GroupTransport`] would bind to.
pub const DRIVER_NAME: &str = "corosync";

/// Escape hatch for a condition this driver treats as unrecoverable (§7
/// tier 3): logs at `error` and never returns. The default
/// [`ProcessExitSink`] calls `std::process::exit(1)`; tests substitute
/// [`test_support::PanicFatalSink`] so the fatal path can be asserted
/// without tearing down the test process.
pub trait FatalSink {
    /// Report `msg` as the cause of an unrecoverable condition and diverge.
    fn fatal(&self, msg: &str) -> !;
}

/// Production [`FatalSink`]: logs then exits the process with status 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExitSink;

impl FatalSink for ProcessExitSink {
    fn fatal(&self, msg: &str) -> ! {
        error!(reason = msg, "fatal driver condition, terminating process");
        std::process::exit(1);
    }
}

/// A running driver instance: owns the transport, the host's handler, and
/// all local state threaded between intake and dispatch.
pub struct ClusterDriver<T: GroupTransport, H: ClusterHandler> {
    transport: T,
    handler: H,
    state: DriverState,
    config: DriverConfig,
    metrics: DriverMetrics,
    fatal: Box<dyn FatalSink>,
}

impl<T: GroupTransport, H: ClusterHandler> std::fmt::Debug for ClusterDriver<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterDriver")
            .field("this_node", &self.state.this_node)
            .field("roster_len", &self.state.roster.len())
            .field("join_finished", &self.state.join_finished)
            .finish_non_exhaustive()
    }
}

impl<T: GroupTransport, H: ClusterHandler> ClusterDriver<T, H> {
    /// Join the group named by `config.group_name` and learn this node's
    /// identity (§4.1). Retries `init_retry_count` times with
    /// `init_retry_backoff` between attempts on transient unavailability;
    /// returns [`DriverError::GcsInitFailed`] once the budget is exhausted.
    pub fn init(mut transport: T, handler: H, config: DriverConfig) -> DriverResult<Self> {
        config.validate()?;

        let identity = init_with_retry(&mut transport, &config)?;
        let state = DriverState::new(identity.id, config.max_nodes);

        Ok(Self {
            transport,
            handler,
            state,
            config,
            metrics: DriverMetrics::new(),
            fatal: Box::new(ProcessExitSink),
        })
    }

    /// Replace the fatal-exit sink (production code never needs this; it
    /// exists for tests that must assert a fatal path fires without
    /// killing the test process).
    #[must_use]
    pub fn with_fatal_sink(mut self, sink: Box<dyn FatalSink>) -> Self {
        self.fatal = sink;
        self
    }

    /// This process's local address (§4.1).
    #[must_use]
    pub fn local_addr(&self) -> [u8; 16] {
        self.transport.local_addr()
    }

    /// The current agreed roster.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.state.roster
    }

    /// Current metrics, for exposing via a host-owned `/metrics` endpoint.
    #[must_use]
    pub fn metrics(&self) -> &DriverMetrics {
        &self.metrics
    }

    /// Borrow the host-supplied handler, e.g. to inspect state it recorded
    /// from upcalls.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Announce this node's intent to join, carrying an opaque `payload`
    /// (host-defined descriptor bytes).
    pub fn join(&mut self, payload: &[u8]) -> DriverResult<()> {
        self.send(MessageKind::JoinRequest, payload)
    }

    /// Announce this node's departure.
    pub fn leave(&mut self) -> DriverResult<()> {
        self.send(MessageKind::Leave, &[])
    }

    /// Request a cluster-wide serialized operation.
    pub fn block(&mut self) -> DriverResult<()> {
        self.send(MessageKind::Block, &[])
    }

    /// Cancel this node's outstanding `Block`.
    pub fn unblock(&mut self, payload: &[u8]) -> DriverResult<()> {
        self.send(MessageKind::Unblock, payload)
    }

    /// Multicast an application-level notification.
    pub fn notify(&mut self, payload: &[u8]) -> DriverResult<()> {
        self.send(MessageKind::Notify, payload)
    }

    fn send(&mut self, kind: MessageKind, payload: &[u8]) -> DriverResult<()> {
        let env = WireEnvelope {
            sender: NodeInfo::unresolved(self.state.this_node),
            sender_gone: false,
            kind,
            result: JoinResult::Success,
            nodes: Vec::new(),
            payload: payload.to_vec(),
        };
        let (header, body) = codec::encode(&env, self.config.max_nodes);
        mcast_with_retry(&mut self.transport, header, body, &self.config)
    }

    /// Drain every group event the transport currently has pending into
    /// Event Intake, running the Event Dispatcher after each one (§4.3
    /// step 5, §4.5 "entry point `dispatch()` is called after every
    /// intake"). Call this whenever the host's event loop observes the
    /// GCS readiness descriptor become readable.
    pub fn pump(&mut self) {
        while let Some(event) = self.transport.next_event() {
            match event {
                GroupEvent::Deliver { header, payload } => {
                    match codec::decode_or_drop(&header, &payload, self.config.max_nodes) {
                        Some(env) => intake::on_deliver(&mut self.state, env, &self.metrics),
                        None => self.metrics.record_malformed_frame(),
                    }
                }
                GroupEvent::ConfigChange { member, joined, left } => {
                    intake::on_config_change(
                        &mut self.state,
                        &member,
                        &joined,
                        &left,
                        self.fatal.as_ref(),
                        &self.metrics,
                    );
                }
                GroupEvent::TransportLost => {
                    self.metrics.record_fatal();
                    self.fatal.fatal("GCS connection lost (HUP)");
                }
            }

            dispatch::dispatch(
                &mut self.state,
                &mut self.transport,
                &mut self.handler,
                self.fatal.as_ref(),
                &self.metrics,
            );
            self.metrics.set_roster_len(self.state.roster.len());
        }
    }
}

fn init_with_retry<T: GroupTransport>(transport: &mut T, config: &DriverConfig) -> DriverResult<LocalIdentity> {
    let backoff = ConstantBuilder::default()
        .with_delay(config.init_retry_backoff)
        .with_max_times(config.init_retry_count as usize);

    (|| transport.init(config.group_name))
        .retry(&backoff)
        .when(|err: &InitError| matches!(err, InitError::TryAgain))
        .call()
        .map_err(|err| {
            error!(error = ?err, "GCS init failed after exhausting retry budget");
            DriverError::GcsInitFailed
        })
}

fn mcast_with_retry<T: GroupTransport>(
    transport: &mut T,
    header: Bytes,
    payload: Bytes,
    config: &DriverConfig,
) -> DriverResult<()> {
    let backoff = ConstantBuilder::default()
        .with_delay(config.send_retry_backoff)
        .without_max_times();

    (|| transport.mcast(header.clone(), payload.clone()))
        .retry(&backoff)
        .when(|err: &SendError| matches!(err, SendError::TryAgain))
        .call()
        .map_err(|err| match err {
            SendError::TryAgain => {
                DriverError::Internal("retry loop exited despite unbounded backoff".into())
            }
            SendError::Denied(msg) | SendError::Other(msg) => DriverError::SendFailed(msg),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::FatalSink;

    /// A [`FatalSink`] that panics instead of exiting, so tests can assert
    /// that a fatal path fires with `#[should_panic]`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct PanicFatalSink;

    impl FatalSink for PanicFatalSink {
        fn fatal(&self, msg: &str) -> ! {
            panic!("{msg}");
        }
    }
}
