#![allow(dead_code)]

use std::collections::HashMap;

use mesh_chat::peer::{EngineError, MediaEngine};
use mesh_chat::protocol::{IceCandidate, MediaType, SessionDescription};
use serde_json::{json, Value};

/// In-memory media stack that records what the agent asked of it.
#[derive(Default)]
pub struct ScriptedEngine {
    pub deny_capture: bool,
    pub deny_answer: bool,
    pub capturing: Option<MediaType>,
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    /// Candidates successfully applied, per remote.
    pub applied: HashMap<String, Vec<Value>>,
}

pub struct FakeLink {
    pub remote: String,
    pub local_desc: Option<Value>,
    pub remote_desc: Option<Value>,
}

impl ScriptedEngine {
    pub fn open_links(&self) -> usize {
        self.opened.len() - self.closed.len()
    }

    pub fn applied_to(&self, remote: &str) -> usize {
        self.applied.get(remote).map_or(0, Vec::len)
    }
}

impl MediaEngine for ScriptedEngine {
    type Link = FakeLink;

    fn capture(&mut self, media_type: MediaType) -> Result<(), EngineError> {
        if self.deny_capture {
            return Err(EngineError("permission denied".into()));
        }
        self.capturing = Some(media_type);
        Ok(())
    }

    fn release_capture(&mut self) {
        self.capturing = None;
    }

    fn open_link(&mut self, remote: &str) -> Result<FakeLink, EngineError> {
        self.opened.push(remote.to_owned());
        Ok(FakeLink { remote: remote.to_owned(), local_desc: None, remote_desc: None })
    }

    fn attach_local_media(&mut self, _link: &mut FakeLink) -> Result<(), EngineError> {
        Ok(())
    }

    fn create_offer(&mut self, link: &mut FakeLink) -> Result<SessionDescription, EngineError> {
        Ok(json!({ "type": "offer", "sdp": format!("offer-{}", link.remote) }))
    }

    fn create_answer(&mut self, link: &mut FakeLink) -> Result<SessionDescription, EngineError> {
        if self.deny_answer || link.remote_desc.is_none() {
            return Err(EngineError("answer without remote offer".into()));
        }
        Ok(json!({ "type": "answer", "sdp": format!("answer-{}", link.remote) }))
    }

    fn set_local_description(
        &mut self,
        link: &mut FakeLink,
        description: &SessionDescription,
    ) -> Result<(), EngineError> {
        link.local_desc = Some(description.clone());
        Ok(())
    }

    fn set_remote_description(
        &mut self,
        link: &mut FakeLink,
        description: &SessionDescription,
    ) -> Result<(), EngineError> {
        link.remote_desc = Some(description.clone());
        Ok(())
    }

    fn add_ice_candidate(
        &mut self,
        link: &mut FakeLink,
        candidate: &IceCandidate,
    ) -> Result<(), EngineError> {
        if link.remote_desc.is_none() {
            return Err(EngineError("no remote description".into()));
        }
        self.applied.entry(link.remote.clone()).or_default().push(candidate.clone());
        Ok(())
    }

    fn close_link(&mut self, link: FakeLink) {
        self.closed.push(link.remote);
    }
}

pub fn candidate(n: u32) -> Value {
    json!({ "candidate": format!("candidate:{n} 1 udp 2122260223 10.0.0.{n} 5000{n} typ host"), "sdpMid": "0", "sdpMLineIndex": 0 })
}
