//! Per-room call membership.
//!
//! A room is either in no call (no entry in the index) or in an active call
//! (a non-empty member set). The coordinator never tracks ringing: for a 1:1
//! room it only tells the joiner who the other side is, and the callee's
//! accept/reject happens client-side.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use super::{ConnectionId, Outbox, RoomStore};
use crate::protocol::{CallMembers, CallRejected, MediaType, NewPeer, RemovePeer, ServerEvent};

#[derive(Debug, Default)]
pub struct CallCoordinator {
    /// room id → users currently in that room's call. Never holds an empty set.
    members: HashMap<String, BTreeSet<String>>,
}

impl CallCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self, room_id: &str) -> Option<&BTreeSet<String>> {
        self.members.get(room_id)
    }

    pub fn size(&self, room_id: &str) -> usize {
        self.members.get(room_id).map_or(0, BTreeSet::len)
    }

    pub fn is_in_call(&self, room_id: &str, username: &str) -> bool {
        self.members
            .get(room_id)
            .is_some_and(|m| m.contains(username))
    }

    /// Number of rooms with an active call.
    pub fn active_calls(&self) -> usize {
        self.members.len()
    }

    /// Put `username` into `room_id`'s call.
    ///
    /// Group rooms: the joiner gets the current members on `conn`, and every
    /// existing member gets a `newPeer` for the joiner. 1:1 rooms: the joiner
    /// gets the other participant, unless both are already in the call.
    pub fn join(
        &mut self,
        rooms: &RoomStore,
        conn: ConnectionId,
        username: &str,
        room_id: &str,
        media_type: MediaType,
        out: &mut Outbox<'_>,
    ) -> bool {
        let Some(room) = rooms.member_room(room_id, username) else {
            debug!(room_id, username, "joinCall from non-member ignored");
            return false;
        };
        let members = self.members.entry(room_id.to_owned()).or_default();
        members.insert(username.to_owned());

        if room.is_group() {
            let others: Vec<String> = members.iter().filter(|u| *u != username).cloned().collect();
            let arrival = ServerEvent::NewPeer(NewPeer { username: username.to_owned(), media_type });
            for other in &others {
                out.to_user(other, &arrival);
            }
            out.to_connection(
                conn,
                ServerEvent::CallMembers(CallMembers { other_users: others, media_type }),
            );
        } else if room.participants().iter().all(|p| members.contains(p)) {
            debug!(room_id, username, "both sides already in call");
        } else {
            let others = room
                .participants()
                .iter()
                .filter(|p| *p != username)
                .cloned()
                .collect();
            out.to_connection(
                conn,
                ServerEvent::CallMembers(CallMembers { other_users: others, media_type }),
            );
        }

        info!(room_id, username, size = members.len(), ?media_type, "joined call");
        out.refresh_all(room.participants());
        true
    }

    /// Take `username` out of `room_id`'s call and tell whoever is left.
    pub fn leave(
        &mut self,
        rooms: &RoomStore,
        username: &str,
        room_id: &str,
        out: &mut Outbox<'_>,
    ) -> bool {
        let Some(members) = self.members.get_mut(room_id) else {
            debug!(room_id, username, "leaveCall without an active call");
            return false;
        };
        if !members.remove(username) {
            debug!(room_id, username, "leaveCall from a non-member of the call");
            return false;
        }
        let remaining: Vec<String> = members.iter().cloned().collect();
        if remaining.is_empty() {
            self.members.remove(room_id);
        }

        let notice = ServerEvent::RemovePeer(RemovePeer { username: username.to_owned() });
        for user in &remaining {
            out.to_user(user, &notice);
        }
        if let Some(room) = rooms.get(room_id) {
            out.refresh_all(room.participants());
        }
        info!(room_id, username, remaining = remaining.len(), "left call");
        true
    }

    /// Leave every call `username` is in. Returns the affected room ids.
    pub fn disconnect(
        &mut self,
        rooms: &RoomStore,
        username: &str,
        out: &mut Outbox<'_>,
    ) -> Vec<String> {
        let mut affected: Vec<String> = self
            .members
            .iter()
            .filter(|(_, m)| m.contains(username))
            .map(|(id, _)| id.clone())
            .collect();
        affected.sort();
        for room_id in &affected {
            self.leave(rooms, username, room_id, out);
        }
        affected
    }
}

/// Tell every device of `target` that `from` declined the call.
pub fn reject_call(out: &mut Outbox<'_>, from: &str, target: &str) -> usize {
    let delivered = out.to_user(
        target,
        &ServerEvent::CallRejected(CallRejected { from: from.to_owned() }),
    );
    info!(from, target, delivered, "call rejected");
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{Envelope, Registry, Target};
    use crate::protocol::CreateRoom;
    use chrono::Local;
    use uuid::Uuid;

    struct Fixture {
        reg: Registry,
        rooms: RoomStore,
        calls: CallCoordinator,
        conns: HashMap<String, ConnectionId>,
    }

    impl Fixture {
        fn new(users: &[&str]) -> Self {
            let mut reg = Registry::new();
            let mut conns = HashMap::new();
            for u in users {
                let conn = Uuid::new_v4();
                reg.register(conn, u);
                conns.insert(u.to_string(), conn);
            }
            Self { reg, rooms: RoomStore::new(), calls: CallCoordinator::new(), conns }
        }

        fn room(&mut self, is_group: bool, members: &[&str]) -> String {
            let req = CreateRoom {
                is_group,
                room_name: String::new(),
                participants: members.iter().map(|m| m.to_string()).collect(),
            };
            self.rooms
                .create_room(req, Local::now(), &mut Outbox::new(&self.reg))
                .unwrap()
        }

        fn join(&mut self, user: &str, room_id: &str) -> (bool, Vec<Envelope>) {
            let mut out = Outbox::new(&self.reg);
            let ok = self.calls.join(
                &self.rooms,
                self.conns[user],
                user,
                room_id,
                MediaType::Video,
                &mut out,
            );
            (ok, out.into_parts().0)
        }

        fn leave(&mut self, user: &str, room_id: &str) -> (bool, Vec<Envelope>) {
            let mut out = Outbox::new(&self.reg);
            let ok = self.calls.leave(&self.rooms, user, room_id, &mut out);
            (ok, out.into_parts().0)
        }

        fn inbox<'e>(&self, envelopes: &'e [Envelope], user: &str) -> Vec<&'e ServerEvent> {
            let conn = self.conns[user];
            envelopes
                .iter()
                .filter(|e| e.target == Target::Connection(conn))
                .map(|e| &e.event)
                .collect()
        }
    }

    fn members_event(others: &[&str]) -> ServerEvent {
        ServerEvent::CallMembers(CallMembers {
            other_users: others.iter().map(|s| s.to_string()).collect(),
            media_type: MediaType::Video,
        })
    }

    fn peer_event(user: &str) -> ServerEvent {
        ServerEvent::NewPeer(NewPeer { username: user.into(), media_type: MediaType::Video })
    }

    #[test]
    fn group_join_introduces_everyone_already_present() {
        let mut fx = Fixture::new(&["alice", "bob", "carol", "dave", "erin"]);
        let room = fx.room(true, &["alice", "bob", "carol", "dave", "erin"]);
        for u in ["bob", "carol", "dave"] {
            fx.join(u, &room);
        }

        let (ok, out) = fx.join("alice", &room);
        assert!(ok);
        assert_eq!(fx.inbox(&out, "alice"), vec![&members_event(&["bob", "carol", "dave"])]);
        for u in ["bob", "carol", "dave"] {
            assert_eq!(fx.inbox(&out, u), vec![&peer_event("alice")]);
        }
        // room members outside the call hear nothing
        assert!(fx.inbox(&out, "erin").is_empty());
        assert_eq!(fx.calls.size(&room), 4);
    }

    #[test]
    fn second_group_joiner_sees_first() {
        let mut fx = Fixture::new(&["alice", "bob", "carol"]);
        let room = fx.room(true, &["alice", "bob", "carol"]);

        let (_, out) = fx.join("alice", &room);
        assert_eq!(fx.inbox(&out, "alice"), vec![&members_event(&[])]);

        let (_, out) = fx.join("bob", &room);
        assert_eq!(fx.inbox(&out, "alice"), vec![&peer_event("bob")]);
        assert_eq!(fx.inbox(&out, "bob"), vec![&members_event(&["alice"])]);
    }

    #[test]
    fn direct_join_reports_other_side_until_both_joined() {
        let mut fx = Fixture::new(&["alice", "bob"]);
        let room = fx.room(false, &["alice", "bob"]);

        let (_, out) = fx.join("alice", &room);
        assert_eq!(fx.inbox(&out, "alice"), vec![&members_event(&["bob"])]);
        assert!(fx.inbox(&out, "bob").is_empty());

        let (ok, out) = fx.join("bob", &room);
        assert!(ok);
        assert!(out.is_empty());
        assert_eq!(fx.calls.size(&room), 2);

        // re-join after both are in stays quiet
        let (_, out) = fx.join("alice", &room);
        assert!(out.is_empty());
    }

    #[test]
    fn non_member_cannot_join() {
        let mut fx = Fixture::new(&["alice", "bob", "mallory"]);
        let room = fx.room(true, &["alice", "bob"]);
        let (ok, out) = fx.join("mallory", &room);
        assert!(!ok);
        assert!(out.is_empty());
        assert!(fx.calls.members(&room).is_none());
        assert!(!fx.join("alice", "room_404").0);
    }

    #[test]
    fn leaving_notifies_the_rest_and_drops_empty_calls() {
        let mut fx = Fixture::new(&["alice", "bob", "carol"]);
        let room = fx.room(true, &["alice", "bob", "carol"]);
        fx.join("alice", &room);
        fx.join("bob", &room);

        let (ok, out) = fx.leave("alice", &room);
        assert!(ok);
        assert_eq!(
            fx.inbox(&out, "bob"),
            vec![&ServerEvent::RemovePeer(RemovePeer { username: "alice".into() })]
        );
        assert!(fx.inbox(&out, "carol").is_empty());

        let (ok, out) = fx.leave("bob", &room);
        assert!(ok);
        assert!(out.is_empty());
        assert!(fx.calls.members(&room).is_none());
        assert_eq!(fx.calls.active_calls(), 0);

        assert!(!fx.leave("bob", &room).0);
    }

    #[test]
    fn leave_by_outsider_changes_nothing() {
        let mut fx = Fixture::new(&["alice", "bob"]);
        let room = fx.room(true, &["alice", "bob"]);
        fx.join("alice", &room);
        let (ok, out) = fx.leave("bob", &room);
        assert!(!ok);
        assert!(out.is_empty());
        assert!(fx.calls.is_in_call(&room, "alice"));
    }

    #[test]
    fn disconnect_leaves_every_call() {
        let mut fx = Fixture::new(&["alice", "bob", "carol", "dave"]);
        let r1 = fx.room(true, &["alice", "bob", "carol"]);
        let r2 = fx.room(true, &["alice", "dave"]);
        let r3 = fx.room(true, &["bob", "dave"]);
        fx.join("alice", &r1);
        fx.join("bob", &r1);
        fx.join("carol", &r1);
        fx.join("alice", &r2);
        fx.join("dave", &r2);
        fx.join("dave", &r3);

        let mut out = Outbox::new(&fx.reg);
        let affected = fx.calls.disconnect(&fx.rooms, "alice", &mut out);
        let envelopes = out.into_parts().0;

        let mut expected = vec![r1.clone(), r2.clone()];
        expected.sort();
        assert_eq!(affected, expected);
        let removed = ServerEvent::RemovePeer(RemovePeer { username: "alice".into() });
        assert_eq!(fx.inbox(&envelopes, "bob"), vec![&removed]);
        assert_eq!(fx.inbox(&envelopes, "carol"), vec![&removed]);
        assert_eq!(fx.inbox(&envelopes, "dave"), vec![&removed]);
        assert!(!fx.calls.is_in_call(&r1, "alice"));
        assert!(!fx.calls.is_in_call(&r2, "alice"));
        assert_eq!(fx.calls.size(&r3), 1);
    }

    #[test]
    fn reject_goes_to_every_device_of_target() {
        let mut fx = Fixture::new(&["alice", "bob"]);
        let second = Uuid::new_v4();
        fx.reg.register(second, "alice");

        let mut out = Outbox::new(&fx.reg);
        assert_eq!(reject_call(&mut out, "bob", "alice"), 2);
        assert_eq!(reject_call(&mut out, "bob", "nobody"), 0);
        let envelopes = out.into_parts().0;
        assert_eq!(envelopes.len(), 2);
        assert!(envelopes
            .iter()
            .all(|e| e.event == ServerEvent::CallRejected(CallRejected { from: "bob".into() })));
        assert!(fx.calls.active_calls() == 0);
    }
}
