//! Server-side authority over connections, rooms and calls.
//!
//! ```text
//!   ClientEvent ──► Coordinator::handle ──► Vec<Envelope> ──► Hub outlets
//!                        │
//!       ┌────────────────┼────────────────┬──────────────┐
//!       ▼                ▼                ▼              ▼
//!   Registry         RoomStore      CallCoordinator    relay
//! ```
//!
//! Every operation is a plain `&mut self` call returning the envelopes it
//! produced, so a single lock around the coordinator gives one global
//! ordering. Requests that are malformed or unauthorized are dropped without
//! an envelope; there is no error channel back to the client.

pub mod calls;
pub mod registry;
pub mod relay;
pub mod rooms;

use chrono::Local;
use tracing::{debug, info};

use crate::protocol::{ClientEvent, MessageKind, ServerEvent};

pub use calls::CallCoordinator;
pub use registry::{ConnectionId, Registry};
pub use rooms::{Room, RoomStore};

/// Who an outbound event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Connection(ConnectionId),
    /// Every open socket, registered or not.
    Everyone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: Target,
    pub event: ServerEvent,
}

impl Envelope {
    pub fn to(conn: ConnectionId, event: ServerEvent) -> Self {
        Self { target: Target::Connection(conn), event }
    }
}

/// Collects the envelopes of one operation.
///
/// Room-list refreshes are only recorded here; they are rendered once per
/// user after the operation finished mutating state.
pub struct Outbox<'a> {
    registry: &'a Registry,
    envelopes: Vec<Envelope>,
    stale: Vec<String>,
}

impl<'a> Outbox<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry, envelopes: Vec::new(), stale: Vec::new() }
    }

    pub fn to_connection(&mut self, conn: ConnectionId, event: ServerEvent) {
        self.envelopes.push(Envelope::to(conn, event));
    }

    /// Queue `event` for every live connection of `username`. Returns how
    /// many connections it reached; zero means the user is offline and the
    /// event was dropped.
    pub fn to_user(&mut self, username: &str, event: &ServerEvent) -> usize {
        let conns = self.registry.resolve(username);
        for conn in &conns {
            self.envelopes.push(Envelope::to(*conn, event.clone()));
        }
        conns.len()
    }

    pub fn to_everyone(&mut self, event: ServerEvent) {
        self.envelopes.push(Envelope { target: Target::Everyone, event });
    }

    /// Mark `username`'s room list as needing a `roomsUpdated`.
    pub fn refresh(&mut self, username: &str) {
        if !self.stale.iter().any(|u| u == username) {
            self.stale.push(username.to_owned());
        }
    }

    pub fn refresh_all<'u>(&mut self, usernames: impl IntoIterator<Item = &'u String>) {
        for username in usernames {
            self.refresh(username);
        }
    }

    fn into_parts(self) -> (Vec<Envelope>, Vec<String>) {
        (self.envelopes, self.stale)
    }
}

#[derive(Debug, Default)]
pub struct Coordinator {
    registry: Registry,
    rooms: RoomStore,
    calls: CallCoordinator,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn calls(&self) -> &CallCoordinator {
        &self.calls
    }

    /// Every username ever registered.
    pub fn users(&self) -> Vec<String> {
        self.registry.users()
    }

    /// Apply one inbound envelope from `conn`.
    pub fn handle(&mut self, conn: ConnectionId, event: ClientEvent) -> Vec<Envelope> {
        if let ClientEvent::RegisterUser(username) = event {
            return self.register(conn, &username);
        }
        let Some(username) = self.registry.username(conn).map(str::to_owned) else {
            debug!(%conn, "event from unregistered connection dropped");
            return Vec::new();
        };

        let now = Local::now();
        let mut out = Outbox::new(&self.registry);
        match event {
            ClientEvent::RegisterUser(_) => {}
            ClientEvent::CreateRoom(req) => {
                self.rooms.create_room(req, now, &mut out);
            }
            ClientEvent::JoinRoom(room_id) => {
                self.rooms.join_room(conn, &username, &room_id, &mut out);
            }
            ClientEvent::SendMessage(msg) => {
                self.rooms
                    .send_message(&username, &msg.room_id, msg.text, MessageKind::Text, now, &mut out);
            }
            ClientEvent::SendImageMessage(msg) => {
                self.rooms.send_message(
                    &username,
                    &msg.room_id,
                    msg.image_url,
                    MessageKind::Image,
                    now,
                    &mut out,
                );
            }
            ClientEvent::ReadRoom(room_id) => {
                self.rooms.mark_read(&username, &room_id, &mut out);
            }
            ClientEvent::JoinCall(req) => {
                self.calls
                    .join(&self.rooms, conn, &username, &req.room_id, req.media_type, &mut out);
            }
            ClientEvent::RejectCall(target) => {
                calls::reject_call(&mut out, &username, &target);
            }
            ClientEvent::LeaveCall(room_id) => {
                self.calls.leave(&self.rooms, &username, &room_id, &mut out);
            }
            ClientEvent::SendOffer(req) => {
                relay::relay_offer(&mut out, &username, req);
            }
            ClientEvent::SendAnswer(req) => {
                relay::relay_answer(&mut out, &username, req);
            }
            ClientEvent::SendIceCandidate(req) => {
                relay::relay_candidate(&mut out, &username, req);
            }
        }
        self.finish(out)
    }

    /// Bind `conn` to `username` and announce the updated user list.
    pub fn register(&mut self, conn: ConnectionId, username: &str) -> Vec<Envelope> {
        if username.is_empty() {
            debug!(%conn, "empty username rejected");
            return Vec::new();
        }
        let displaced = self.registry.register(conn, username);
        info!(%conn, username, "user registered");

        let mut out = Outbox::new(&self.registry);
        out.to_everyone(ServerEvent::UsersUpdated(self.registry.users()));
        out.refresh(username);
        if let Some(old) = displaced.as_deref() {
            out.refresh(old);
        }
        self.finish(out)
    }

    /// Transport-level disconnect: forget the connection and pull its user
    /// out of every call it was in.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Vec<Envelope> {
        let Some(username) = self.registry.unregister(conn) else {
            debug!(%conn, "unknown connection closed");
            return Vec::new();
        };
        info!(%conn, username, "user disconnected");

        let mut out = Outbox::new(&self.registry);
        self.calls.disconnect(&self.rooms, &username, &mut out);
        out.to_everyone(ServerEvent::UsersUpdated(self.registry.users()));
        out.refresh(&username);
        self.finish(out)
    }

    fn finish(&self, out: Outbox<'_>) -> Vec<Envelope> {
        let (mut envelopes, stale) = out.into_parts();
        for username in stale {
            let conns = self.registry.resolve(&username);
            if conns.is_empty() {
                continue;
            }
            let rooms = self
                .rooms
                .visible_rooms(&username, |room_id| self.calls.size(room_id));
            for conn in conns {
                envelopes.push(Envelope::to(conn, ServerEvent::RoomsUpdated(rooms.clone())));
            }
        }
        envelopes
    }
}
