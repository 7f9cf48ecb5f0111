//! Single-process walkthrough of a three-node cluster forming over the
//! in-memory `LoopbackTransport`, for anyone wiring a real GCS binding
//! against this crate and wanting to see the expected event sequence
//! without standing up corosync.
//!
//! Run with: `cargo run --example loopback_demo`

use sheepdog_cluster_driver::config::DriverConfig;
use sheepdog_cluster_driver::driver::ClusterDriver;
use sheepdog_cluster_driver::roster::Roster;
use sheepdog_cluster_driver::transport::{ipv4_mapped, LoopbackBus, LoopbackTransport};
use sheepdog_cluster_driver::types::{JoinResult, NodeId};
use sheepdog_cluster_driver::upcall::ClusterHandler;

struct LoggingHandler {
    name: &'static str,
}

impl ClusterHandler for LoggingHandler {
    fn check_join(&mut self, sender: NodeId, payload: &[u8]) -> JoinResult {
        tracing::info!(node = self.name, %sender, descriptor = ?String::from_utf8_lossy(payload), "adjudicating join");
        JoinResult::Success
    }

    fn join_completed(&mut self, sender: NodeId, roster: &Roster, result: JoinResult, _payload: &[u8]) {
        tracing::info!(node = self.name, %sender, ?result, roster_len = roster.len(), "join completed");
    }

    fn leave_completed(&mut self, sender: NodeId, roster: &Roster) {
        tracing::info!(node = self.name, %sender, roster_len = roster.len(), "leave completed");
    }

    fn block_requested(&mut self, sender: NodeId) -> bool {
        tracing::info!(node = self.name, %sender, "block requested");
        true
    }

    fn notify_received(&mut self, sender: NodeId, payload: &[u8]) {
        tracing::info!(node = self.name, %sender, bytes = payload.len(), "notification received");
    }
}

fn spawn(
    bus: &std::rc::Rc<std::cell::RefCell<LoopbackBus>>,
    name: &'static str,
    nodeid: u32,
    last_octet: u8,
) -> ClusterDriver<LoopbackTransport, LoggingHandler> {
    let id = NodeId::new(nodeid, nodeid * 100);
    let transport = LoopbackTransport::new(std::rc::Rc::clone(bus), id, ipv4_mapped([127, 0, 0, last_octet]));
    let config = DriverConfig::builder().max_nodes(8).build().expect("valid demo config");
    ClusterDriver::init(transport, LoggingHandler { name }, config).expect("loopback init never fails")
}

fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let bus = LoopbackBus::new();

    let mut a = spawn(&bus, "a", 1, 1);
    a.pump();
    a.join(b"127.0.0.1:7000").expect("mcast never fails on loopback");
    a.pump();

    let mut b = spawn(&bus, "b", 2, 2);
    a.pump();
    b.pump();
    b.join(b"127.0.0.1:7001").expect("mcast never fails on loopback");
    a.pump();
    b.pump();

    let mut c = spawn(&bus, "c", 3, 3);
    a.pump();
    b.pump();
    c.pump();
    c.join(b"127.0.0.1:7002").expect("mcast never fails on loopback");
    a.pump();
    b.pump();
    c.pump();

    tracing::info!(roster_len = a.roster().len(), "cluster converged");
    for entry in a.roster().iter() {
        tracing::info!(member = %entry.info.id, gone = entry.gone, "roster entry");
    }

    c.notify(b"hello from c").expect("mcast never fails on loopback");
    a.pump();
    b.pump();
    c.pump();
}
