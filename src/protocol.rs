//! Wire envelopes exchanged over the `/ws` socket.
//!
//! Every text frame is `{"event": "<name>", "data": <payload>}`. Inbound
//! frames decode into [`ClientEvent`], outbound ones are [`ServerEvent`].
//! SDP blobs and ICE candidates travel as opaque JSON values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque SDP offer/answer as produced by the browser.
pub type SessionDescription = Value;
/// Opaque ICE candidate as produced by the browser.
pub type IceCandidate = Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    #[default]
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

/// One entry of a room's message log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    /// Body for text messages, URL for image messages.
    pub text: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// Per-user view of a room, as shown in the room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub is_group: bool,
    pub last_message: String,
    /// Milliseconds since the Unix epoch.
    pub last_update_time: i64,
    pub unread_count: usize,
    pub in_call: bool,
    pub call_count: usize,
}

/* ------------ client → server ------------ */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    RegisterUser(String),
    CreateRoom(CreateRoom),
    JoinRoom(String),
    SendMessage(SendText),
    SendImageMessage(SendImage),
    ReadRoom(String),
    JoinCall(JoinCall),
    RejectCall(String),
    LeaveCall(String),
    SendOffer(SendOffer),
    SendAnswer(SendAnswer),
    #[serde(rename = "sendICECandidate")]
    SendIceCandidate(SendIceCandidate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, alias = "name")]
    pub room_name: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendText {
    pub room_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendImage {
    pub room_id: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCall {
    pub room_id: String,
    #[serde(default, alias = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOffer {
    pub target_user: String,
    pub room_id: String,
    pub offer: SessionDescription,
    #[serde(default, alias = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAnswer {
    pub target_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub answer: SessionDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendIceCandidate {
    pub target_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub candidate: IceCandidate,
}

/* ------------ server → client ------------ */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    UsersUpdated(Vec<String>),
    RoomsUpdated(Vec<RoomSummary>),
    RoomMessages(Vec<ChatMessage>),
    NewMessage(ChatMessage),
    CallMembers(CallMembers),
    NewPeer(NewPeer),
    RemovePeer(RemovePeer),
    CallRejected(CallRejected),
    ReceiveOffer(ReceiveOffer),
    ReceiveAnswer(ReceiveAnswer),
    #[serde(rename = "receiveICECandidate")]
    ReceiveIceCandidate(ReceiveIceCandidate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMembers {
    pub other_users: Vec<String>,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPeer {
    pub username: String,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePeer {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRejected {
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveOffer {
    pub from: String,
    pub offer: SessionDescription,
    pub room_id: String,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveAnswer {
    pub from: String,
    pub answer: SessionDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveIceCandidate {
    pub from: String,
    pub candidate: IceCandidate,
}
