use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::Arc,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use crate::{
    coord::{ConnectionId, Coordinator, Envelope, Target},
    protocol::{ClientEvent, ServerEvent},
};

pub type Tx = mpsc::UnboundedSender<ServerEvent>;

/* ------------ WebSocket 連線中樞 ------------ */
/// The coordinator plus one outlet per open socket. Everything runs under a
/// single lock, so envelopes leave in the order operations were applied.
#[derive(Default)]
pub struct Hub {
    coordinator: Coordinator,
    outlets: HashMap<ConnectionId, Tx>,
}
pub type SharedHub = Arc<Mutex<Hub>>;

impl Hub {
    pub fn shared() -> SharedHub {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn attach(&mut self, conn: ConnectionId, tx: Tx) {
        self.outlets.insert(conn, tx);
    }

    pub fn handle(&mut self, conn: ConnectionId, event: ClientEvent) {
        let out = self.coordinator.handle(conn, event);
        self.dispatch(out);
    }

    /// Socket gone: drop its outlet first, then let the others know.
    pub fn detach(&mut self, conn: ConnectionId) {
        self.outlets.remove(&conn);
        let out = self.coordinator.disconnect(conn);
        self.dispatch(out);
    }

    pub fn users(&self) -> Vec<String> {
        self.coordinator.users()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn connections(&self) -> usize {
        self.outlets.len()
    }

    fn dispatch(&self, envelopes: Vec<Envelope>) {
        for Envelope { target, event } in envelopes {
            match target {
                Target::Connection(conn) => match self.outlets.get(&conn) {
                    Some(tx) => {
                        if tx.send(event).is_err() {
                            debug!(%conn, "outlet closed, event dropped");
                        }
                    }
                    None => debug!(%conn, "no outlet for connection"),
                },
                Target::Everyone => {
                    for tx in self.outlets.values() {
                        tx.send(event.clone()).ok();
                    }
                }
            }
        }
    }
}

/* ------------ 上傳媒體清單 -------------- */
#[derive(Clone, Debug)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub size: u64,
}
pub type MediaLog = Arc<RwLock<VecDeque<MediaEntry>>>;
