//! Concurrency for a running bridge.
//!
//! One task owns the [`Switch`] and applies every state change in the order commands arrive.
//! The ingress loop and the announcer reach it only through a [`BridgeHandle`], so a BPDU
//! transition, a forwarding decision or a tick is never observed half done.

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    network::{
        device::{bpdu::BpduFrame, cable::Inbox, cable::Link, stp::StpSnapshot, switch::Switch},
        ethernet::{format_mac, MacAddress},
    },
    tick::{Announcer, Tickable},
};

/// Bounded so a slow switch pushes back on the ingress loop.
const COMMAND_QUEUE_DEPTH: usize = 64;

enum Command {
    Deliver {
        port: usize,
        bytes: Vec<u8>,
    },
    Tick,
    ApplyBpdu {
        port: usize,
        bpdu: BpduFrame,
    },
    Snapshot(oneshot::Sender<StpSnapshot>),
    Lookup {
        address: MacAddress,
        reply: oneshot::Sender<Option<usize>>,
    },
    InterfaceName {
        port: usize,
        reply: oneshot::Sender<Option<String>>,
    },
}

/// Cloneable access to a bridge owned by another task.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Command>,
}

impl BridgeHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::BridgeStopped)
    }

    /// Hands a received frame to the bridge.
    pub async fn deliver(&self, port: usize, bytes: Vec<u8>) -> Result<()> {
        self.send(Command::Deliver { port, bytes }).await
    }

    /// Originates BPDUs if the bridge is currently root.
    pub async fn tick(&self) -> Result<()> {
        self.send(Command::Tick).await
    }

    pub async fn apply_bpdu(&self, port: usize, bpdu: BpduFrame) -> Result<()> {
        self.send(Command::ApplyBpdu { port, bpdu }).await
    }

    /// The spanning tree state after every previously sent command has been applied.
    pub async fn snapshot(&self) -> Result<StpSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| Error::BridgeStopped)
    }

    pub async fn lookup(&self, address: MacAddress) -> Result<Option<usize>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Lookup { address, reply }).await?;
        rx.await.map_err(|_| Error::BridgeStopped)
    }

    /// Configured name of a port; None if the bridge has no such port.
    pub async fn interface_name(&self, port: usize) -> Result<Option<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::InterfaceName { port, reply }).await?;
        rx.await.map_err(|_| Error::BridgeStopped)
    }
}

/// Moves the switch into its own task. The task ends once every handle is dropped.
pub fn spawn_owner<L>(mut switch: Switch<L>) -> (BridgeHandle, JoinHandle<()>)
where
    L: Link + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Deliver { port, bytes } => switch.receive(port, bytes),
                Command::Tick => switch.tick(),
                Command::ApplyBpdu { port, bpdu } => switch.apply_bpdu(port, &bpdu),
                Command::Snapshot(reply) => {
                    let _ = reply.send(switch.snapshot());
                }
                Command::Lookup { address, reply } => {
                    let _ = reply.send(switch.lookup(&address));
                }
                Command::InterfaceName { port, reply } => {
                    let _ = reply.send(switch.interface_name(port).map(str::to_string));
                }
            }
        }
        debug!(bridge_id = switch.bridge_id(), "Bridge owner exiting");
    });

    (BridgeHandle { tx }, task)
}

/// Delivers frames from the inbox one at a time, in arrival order.
pub async fn run_ingress(mut inbox: Inbox, handle: BridgeHandle) {
    while let Some((port, bytes)) = inbox.receive().await {
        if handle.deliver(port, bytes).await.is_err() {
            return;
        }
    }
}

/// The tasks of one running bridge.
pub struct RunningBridge {
    pub handle: BridgeHandle,
    owner: JoinHandle<()>,
    ingress: JoinHandle<()>,
    announcer: JoinHandle<()>,
}

impl RunningBridge {
    /// Stops the announcer and the ingress loop, then waits for the owner to drain its queue.
    pub async fn shutdown(self) {
        self.announcer.abort();
        self.ingress.abort();
        let _ = self.announcer.await;
        let _ = self.ingress.await;

        // The owner exits once the last handle is gone
        drop(self.handle);
        let _ = self.owner.await;
    }
}

/// Starts the state owner, the ingress loop and the announcer for a switch.
/// * `period` - Time between announcer ticks.
pub fn start<L>(switch: Switch<L>, inbox: Inbox, period: Duration) -> RunningBridge
where
    L: Link + Send + 'static,
{
    info!(
        bridge_id = switch.bridge_id(),
        mac = %format_mac(&switch.mac_address()),
        ports = switch.ports().len(),
        "Starting bridge"
    );

    let (handle, owner) = spawn_owner(switch);
    let ingress = tokio::spawn(run_ingress(inbox, handle.clone()));
    let announcer = tokio::spawn(Announcer::with_period(handle.clone(), period).run());

    RunningBridge {
        handle,
        owner,
        ingress,
        announcer,
    }
}
