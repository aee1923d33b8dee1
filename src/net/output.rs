use crate::net::sink::ClientSink;
use crate::protocol::{ConnectionId, ServerFrame};
use crate::router::Delivery;
use dashmap::DashMap;
use tokio::sync::mpsc;

const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Clonable sender side of one connection's outbound queue.
#[derive(Clone)]
pub struct OutboundHandle {
    tx: mpsc::Sender<ServerFrame>,
}

impl OutboundHandle {
    pub async fn send(&self, frame: ServerFrame) {
        let _ = self.tx.send(frame).await;
    }
}

/// Receiver side, drained by the connection's writer task.
pub struct ConnectionOut {
    rx: mpsc::Receiver<ServerFrame>,
}

impl ConnectionOut {
    pub async fn run<C>(mut self, mut client: C) -> anyhow::Result<()>
    where
        C: ClientSink,
    {
        while let Some(frame) = self.rx.recv().await {
            client.send_frame(frame).await?;
        }
        Ok(())
    }
}

pub fn outbound_channel() -> (OutboundHandle, ConnectionOut) {
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
    (OutboundHandle { tx }, ConnectionOut { rx })
}

/// Delivery map from connection id to that connection's outbound queue.
///
/// Delivery is fire-and-forget: a destination that has already disconnected
/// (or whose queue is gone) just drops the frame.
#[derive(Default)]
pub struct Peers {
    queues: DashMap<ConnectionId, OutboundHandle>,
}

impl Peers {
    pub fn new() -> Self {
        Self { queues: DashMap::new() }
    }

    pub fn attach(&self, connection_id: &ConnectionId, handle: OutboundHandle) {
        self.queues.insert(connection_id.clone(), handle);
    }

    pub fn detach(&self, connection_id: &ConnectionId) {
        self.queues.remove(connection_id);
    }

    pub async fn deliver(&self, delivery: Delivery) {
        let handle = self.queues.get(&delivery.to).map(|entry| entry.value().clone());
        match handle {
            Some(handle) => handle.send(delivery.frame).await,
            None => {
                tracing::debug!(to = %delivery.to, "dropping frame for vanished connection");
            }
        }
    }
}
