//! Room records: membership, message log and per-user read cursors.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use super::{ConnectionId, Outbox};
use crate::protocol::{ChatMessage, CreateRoom, MessageKind, RoomSummary, ServerEvent};

/// Name given to group rooms created without one.
pub const DEFAULT_GROUP_NAME: &str = "未命名群組";
/// Room-list preview shown for image messages.
pub const IMAGE_PREVIEW: &str = "[圖片]";

const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct Room {
    id: String,
    name: String,
    is_group: bool,
    participants: Vec<String>,
    messages: Vec<ChatMessage>,
    /// Read cursor per participant, always within `0..=messages.len()`.
    last_read: HashMap<String, usize>,
    last_message: String,
    /// Milliseconds since the Unix epoch.
    last_update: i64,
    seq: u64,
}

impl Room {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    pub fn is_member(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p == username)
    }

    pub fn read_cursor(&self, username: &str) -> Option<usize> {
        self.last_read.get(username).copied()
    }

    pub fn unread_count(&self, username: &str) -> usize {
        let read = self.read_cursor(username).unwrap_or(0);
        self.messages.len().saturating_sub(read)
    }

    fn catch_up(&mut self, username: &str) {
        self.last_read.insert(username.to_owned(), self.messages.len());
    }

    fn summary(&self, username: &str, call_count: usize) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            is_group: self.is_group,
            last_message: self.last_message.clone(),
            last_update_time: self.last_update,
            unread_count: self.unread_count(username),
            in_call: call_count > 0,
            call_count,
        }
    }
}

#[derive(Debug)]
pub struct RoomStore {
    rooms: HashMap<String, Room>,
    next_id: u64,
}

impl Default for RoomStore {
    fn default() -> Self {
        Self { rooms: HashMap::new(), next_id: 1 }
    }
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// The room `room_id`, but only when `username` belongs to it.
    pub fn member_room(&self, room_id: &str, username: &str) -> Option<&Room> {
        self.rooms.get(room_id).filter(|r| r.is_member(username))
    }

    fn member_room_mut(&mut self, room_id: &str, username: &str) -> Option<&mut Room> {
        let room = self.rooms.get_mut(room_id).filter(|r| r.is_member(username));
        if room.is_none() {
            debug!(room_id, username, "unknown room or not a member");
        }
        room
    }

    fn find_direct(&self, a: &str, b: &str) -> Option<&Room> {
        self.rooms.values().find(|r| {
            !r.is_group && r.participants.len() == 2 && r.is_member(a) && r.is_member(b)
        })
    }

    /// Create a room and refresh every participant's list.
    ///
    /// Returns `None` without side effects for an empty participant list, a
    /// 1:1 request that does not name exactly two users, or a 1:1 pair that
    /// already has a room.
    pub fn create_room(
        &mut self,
        req: CreateRoom,
        now: DateTime<Local>,
        out: &mut Outbox<'_>,
    ) -> Option<String> {
        let mut participants: Vec<String> = Vec::with_capacity(req.participants.len());
        for p in req.participants {
            if !p.is_empty() && !participants.contains(&p) {
                participants.push(p);
            }
        }
        if participants.is_empty() {
            debug!("createRoom without participants ignored");
            return None;
        }

        let name = if req.is_group {
            if req.room_name.trim().is_empty() {
                DEFAULT_GROUP_NAME.to_owned()
            } else {
                req.room_name
            }
        } else {
            let [a, b] = participants.as_slice() else {
                debug!(count = participants.len(), "1:1 room needs exactly two participants");
                return None;
            };
            if let Some(existing) = self.find_direct(a, b) {
                info!(room_id = %existing.id, "1:1 room already exists, not creating another");
                return None;
            }
            format!("{a} & {b}")
        };

        let seq = self.next_id;
        self.next_id += 1;
        let id = format!("room_{seq}");
        let last_read = participants.iter().map(|p| (p.clone(), 0)).collect();
        let room = Room {
            id: id.clone(),
            name,
            is_group: req.is_group,
            participants,
            messages: Vec::new(),
            last_read,
            last_message: String::new(),
            last_update: now.timestamp_millis(),
            seq,
        };
        info!(room_id = %id, participants = ?room.participants, "room created");
        out.refresh_all(&room.participants);
        self.rooms.insert(id.clone(), room);
        Some(id)
    }

    /// Open a room on `conn`: mark history read and send it the whole log.
    pub fn join_room(
        &mut self,
        conn: ConnectionId,
        username: &str,
        room_id: &str,
        out: &mut Outbox<'_>,
    ) -> bool {
        let Some(room) = self.member_room_mut(room_id, username) else {
            return false;
        };
        room.catch_up(username);
        out.to_connection(conn, ServerEvent::RoomMessages(room.messages.clone()));
        out.refresh(username);
        debug!(room_id, username, "joined room");
        true
    }

    /// Append a message and fan it out to every participant.
    pub fn send_message(
        &mut self,
        sender: &str,
        room_id: &str,
        text: String,
        kind: MessageKind,
        now: DateTime<Local>,
        out: &mut Outbox<'_>,
    ) -> bool {
        let Some(room) = self.member_room_mut(room_id, sender) else {
            return false;
        };
        let message = ChatMessage {
            sender: sender.to_owned(),
            text,
            time: now.format(TIME_FORMAT).to_string(),
            kind,
        };
        room.last_message = match kind {
            MessageKind::Text => message.text.clone(),
            MessageKind::Image => IMAGE_PREVIEW.to_owned(),
        };
        room.last_update = now.timestamp_millis();
        room.messages.push(message.clone());
        room.catch_up(sender);

        let event = ServerEvent::NewMessage(message);
        for user in &room.participants {
            out.to_user(user, &event);
        }
        out.refresh_all(&room.participants);
        true
    }

    pub fn mark_read(&mut self, username: &str, room_id: &str, out: &mut Outbox<'_>) -> bool {
        let Some(room) = self.member_room_mut(room_id, username) else {
            return false;
        };
        room.catch_up(username);
        out.refresh(username);
        true
    }

    /// Rooms containing `username`, most recently active first.
    pub fn visible_rooms(
        &self,
        username: &str,
        call_count: impl Fn(&str) -> usize,
    ) -> Vec<RoomSummary> {
        let mut rooms: Vec<&Room> = self.rooms.values().filter(|r| r.is_member(username)).collect();
        rooms.sort_by(|a, b| b.last_update.cmp(&a.last_update).then(a.seq.cmp(&b.seq)));
        rooms
            .into_iter()
            .map(|r| r.summary(username, call_count(&r.id)))
            .collect()
    }
}
