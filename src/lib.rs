//! # sheepdog-cluster-driver
//!
//! Cluster membership and totally-ordered messaging driver for a
//! distributed storage daemon. The driver sits above a group-communication
//! service (GCS) that provides virtually-synchronous, totally-ordered
//! multicast and group-membership notifications, and reconciles those two
//! asynchronous streams into a single deterministic sequence of high-level
//! cluster events delivered to the host through five upcalls.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Host daemon                          │
//! │              (ClusterHandler: the five upcalls)               │
//! └───────────────────────────▲────────────────────────────────┘
//!                              │ check_join / join_completed /
//!                              │ leave_completed / block_requested /
//!                              │ notify_received
//! ┌───────────────────────────┴────────────────────────────────┐
//! │                        Event Dispatcher                      │
//! │   drains block_queue / nonblock_queue, gates on join_finished │
//! └───────────▲─────────────────────────────────▲───────────────┘
//!             │                                 │
//! ┌───────────┴──────────┐           ┌──────────┴───────────┐
//! │      Event Intake      │           │  Roster & Election   │
//! │ deliver / confchg → Event│◄─────────┤  first non-gone entry│
//! └───────────▲──────────┘           └──────────────────────┘
//!             │ decode
//! ┌───────────┴──────────┐
//! │    GroupTransport      │  (GCS adapter boundary)
//! └────────────────────────┘
//! ```
//!
//! ## Core components
//!
//! - [`types`] — node identity, wire message kinds, join results (§3).
//! - [`roster`] — the agreed member list and the first-non-gone master rule
//!   (§4.4).
//! - [`event`] / [`state`] — the two FIFO queues and the local state threaded
//!   between intake and dispatch (§3, §4.5).
//! - [`codec`] — the packed little-endian wire envelope (§4.2).
//! - [`transport`] — the `GroupTransport` trait a real GCS binding
//!   implements, plus an in-memory `LoopbackTransport` reference
//!   implementation used for tests and demos (§4.1, §6).
//! - [`intake`] — turns GCS callbacks into queued cluster events (§4.3).
//! - [`dispatch`] — drains the queues and invokes the upcalls (§4.5).
//! - [`upcall`] — the five callbacks the host implements (§4.6).
//! - [`driver`] — [`driver::ClusterDriver`], the top-level type tying
//!   everything together behind the `{init, local_addr, join, leave,
//!   notify, block, unblock}` registration shape (§6).
//!
//! ## Ambient stack
//!
//! - [`config`] — `DriverConfig`, a builder over the tunables spec.md leaves
//!   as named constants (`MAX_NODES`, `CPG_INIT_RETRY_CNT`, backoffs).
//! - [`error`] — `DriverError`/`DriverResult`, the recoverable-error tier;
//!   fatal conditions go through [`driver::FatalSink`] instead.
//! - [`metrics`] — `DriverMetrics`, atomic counters plus a Prometheus text
//!   exporter.
//!
//! ## Usage
//!
//! ```rust
//! use sheepdog_cluster_driver::config::DriverConfig;
//! use sheepdog_cluster_driver::driver::ClusterDriver;
//! use sheepdog_cluster_driver::transport::{ipv4_mapped, LoopbackBus, LoopbackTransport};
//! use sheepdog_cluster_driver::types::{JoinResult, NodeId};
//! use sheepdog_cluster_driver::upcall::ClusterHandler;
//! use sheepdog_cluster_driver::roster::Roster;
//!
//! struct Logger;
//! impl ClusterHandler for Logger {
//!     fn check_join(&mut self, _sender: NodeId, _payload: &[u8]) -> JoinResult {
//!         JoinResult::Success
//!     }
//!     fn join_completed(&mut self, _sender: NodeId, _roster: &Roster, _result: JoinResult, _payload: &[u8]) {}
//!     fn leave_completed(&mut self, _sender: NodeId, _roster: &Roster) {}
//!     fn block_requested(&mut self, _sender: NodeId) -> bool { true }
//!     fn notify_received(&mut self, _sender: NodeId, _payload: &[u8]) {}
//! }
//!
//! let bus = LoopbackBus::new();
//! let transport = LoopbackTransport::new(bus, NodeId::new(1, 100), ipv4_mapped([127, 0, 0, 1]));
//! let config = DriverConfig::builder().max_nodes(8).build().unwrap();
//! let mut driver = ClusterDriver::init(transport, Logger, config).unwrap();
//!
//! driver.pump();
//! driver.join(b"127.0.0.1:7000").unwrap();
//! driver.pump();
//! assert_eq!(driver.roster().len(), 1);
//! ```

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod event;
pub mod intake;
pub mod metrics;
pub mod roster;
pub mod state;
pub mod transport;
pub mod types;
pub mod upcall;

pub use config::DriverConfig;
pub use driver::ClusterDriver;
pub use error::{DriverError, DriverResult};
pub use roster::Roster;
pub use types::{EventKind, JoinResult, MessageKind, NodeId, NodeInfo};
pub use upcall::ClusterHandler;
