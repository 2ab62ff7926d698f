//! Connection ↔ username bookkeeping.
//!
//! A username may own several live connections (tabs, devices). The
//! registry is the only place that turns a username into deliverable
//! connection ids.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

pub type ConnectionId = Uuid;

#[derive(Debug, Default)]
pub struct Registry {
    by_connection: HashMap<ConnectionId, String>,
    by_user: HashMap<String, BTreeSet<ConnectionId>>,
    /// Every name ever registered. Never shrinks.
    known: BTreeSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `username` to `conn`. Registering the same connection again
    /// replaces its previous name; the displaced name is returned.
    pub fn register(&mut self, conn: ConnectionId, username: &str) -> Option<String> {
        let previous = self.by_connection.insert(conn, username.to_owned());
        if let Some(old) = previous.as_deref() {
            if old != username {
                self.detach(old, conn);
            }
        }
        self.by_user
            .entry(username.to_owned())
            .or_default()
            .insert(conn);
        self.known.insert(username.to_owned());
        previous.filter(|old| old != username)
    }

    /// Drop `conn`. Other connections of the same user stay registered.
    pub fn unregister(&mut self, conn: ConnectionId) -> Option<String> {
        let username = self.by_connection.remove(&conn)?;
        self.detach(&username, conn);
        Some(username)
    }

    fn detach(&mut self, username: &str, conn: ConnectionId) {
        if let Some(conns) = self.by_user.get_mut(username) {
            conns.remove(&conn);
            if conns.is_empty() {
                self.by_user.remove(username);
            }
        }
    }

    pub fn username(&self, conn: ConnectionId) -> Option<&str> {
        self.by_connection.get(&conn).map(String::as_str)
    }

    /// Live connections of `username`; empty when offline.
    pub fn resolve(&self, username: &str) -> Vec<ConnectionId> {
        self.by_user
            .get(username)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.by_user.contains_key(username)
    }

    pub fn users(&self) -> Vec<String> {
        self.known.iter().cloned().collect()
    }
}
