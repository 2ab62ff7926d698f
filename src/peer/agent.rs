use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use super::engine::{EngineError, MediaEngine};
use super::link::{LinkRole, NegotiationState, PeerLink};
use super::{group_role, NegotiationError};
use crate::protocol::{
    ClientEvent, IceCandidate, JoinCall, MediaType, ReceiveAnswer, ReceiveIceCandidate,
    ReceiveOffer, SendAnswer, SendIceCandidate, SendOffer, ServerEvent, SessionDescription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// 1:1 room: the caller always offers, the callee accepts or rejects.
    Direct,
    /// Group room: offers follow [`group_role`].
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCall {
    pub room_id: String,
    pub kind: CallKind,
    pub media_type: MediaType,
}

/// An offer that arrived while we were not in that room's call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    pub from: String,
    pub room_id: String,
    pub media_type: MediaType,
    offer: SessionDescription,
}

/// Local call runtime of one participant.
///
/// Every method returns the envelopes to send to the server, in order.
pub struct CallAgent<E: MediaEngine> {
    username: String,
    engine: E,
    captured: Option<MediaType>,
    call: Option<ActiveCall>,
    members: BTreeSet<String>,
    links: HashMap<String, PeerLink<E::Link>>,
    /// Remote candidates that arrived before their remote description.
    pending: HashMap<String, Vec<IceCandidate>>,
    invites: HashMap<String, Invite>,
}

impl<E: MediaEngine> CallAgent<E> {
    pub fn new(username: impl Into<String>, engine: E) -> Self {
        Self {
            username: username.into(),
            engine,
            captured: None,
            call: None,
            members: BTreeSet::new(),
            links: HashMap::new(),
            pending: HashMap::new(),
            invites: HashMap::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn call(&self) -> Option<&ActiveCall> {
        self.call.as_ref()
    }

    /// Other users currently in our call.
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    pub fn invite(&self, from: &str) -> Option<&Invite> {
        self.invites.get(from)
    }

    pub fn has_local_media(&self) -> bool {
        self.captured.is_some()
    }

    pub fn link(&self, remote: &str) -> Option<&PeerLink<E::Link>> {
        self.links.get(remote)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn state(&self, remote: &str) -> NegotiationState {
        match self.links.get(remote) {
            Some(link) => link.state,
            None if self.captured.is_some() => NegotiationState::HasLocalMedia,
            None => NegotiationState::Idle,
        }
    }

    pub fn pending_candidates(&self, remote: &str) -> usize {
        self.pending.get(remote).map_or(0, Vec::len)
    }

    /// Capture media if needed, then announce ourselves in `room_id`'s call.
    pub fn join_call(
        &mut self,
        room_id: &str,
        kind: CallKind,
        media_type: MediaType,
    ) -> Result<Vec<ClientEvent>, NegotiationError> {
        if let Some(call) = &self.call {
            if call.room_id == room_id {
                return Ok(Vec::new());
            }
            return Err(NegotiationError::AlreadyInCall(call.room_id.clone()));
        }
        if self.captured.is_none() {
            self.engine
                .capture(media_type)
                .map_err(NegotiationError::Capture)?;
            self.captured = Some(media_type);
        }
        self.call = Some(ActiveCall { room_id: room_id.to_owned(), kind, media_type });
        info!(user = %self.username, room_id, ?kind, "joining call");
        Ok(vec![ClientEvent::JoinCall(JoinCall { room_id: room_id.to_owned(), media_type })])
    }

    /// Leave the current call: close every link and stop local capture.
    pub fn leave_call(&mut self) -> Vec<ClientEvent> {
        let remotes: Vec<String> = self.links.keys().cloned().collect();
        for remote in remotes {
            self.teardown(&remote);
        }
        self.members.clear();
        let invites = &self.invites;
        self.pending.retain(|from, _| invites.contains_key(from));
        if self.captured.take().is_some() {
            self.engine.release_capture();
        }
        match self.call.take() {
            Some(call) => {
                info!(user = %self.username, room_id = %call.room_id, "left call");
                vec![ClientEvent::LeaveCall(call.room_id)]
            }
            None => Vec::new(),
        }
    }

    /// Accept an incoming 1:1 call: join it, then answer the offer.
    pub fn accept_call(&mut self, from: &str) -> Result<Vec<ClientEvent>, NegotiationError> {
        let Some(invite) = self.invites.remove(from) else {
            return Err(NegotiationError::NoInvite(from.to_owned()));
        };
        let current = self.call.as_ref().map(|c| c.room_id.clone());
        let mut sent = match current {
            Some(room_id) if room_id == invite.room_id => Vec::new(),
            Some(room_id) => {
                self.invites.insert(from.to_owned(), invite);
                return Err(NegotiationError::AlreadyInCall(room_id));
            }
            None => match self.join_call(&invite.room_id, CallKind::Direct, invite.media_type) {
                Ok(sent) => sent,
                Err(e) => {
                    self.pending.remove(from);
                    return Err(e);
                }
            },
        };
        self.members.clear();
        self.members.insert(from.to_owned());
        sent.extend(self.answer(from, invite.offer, invite.room_id));
        Ok(sent)
    }

    /// Decline an incoming call. No link is created.
    pub fn reject_call(&mut self, from: &str) -> Vec<ClientEvent> {
        self.invites.remove(from);
        self.pending.remove(from);
        info!(user = %self.username, from, "rejecting call");
        vec![ClientEvent::RejectCall(from.to_owned())]
    }

    /// React to one server envelope.
    pub fn handle(&mut self, event: ServerEvent) -> Vec<ClientEvent> {
        match event {
            ServerEvent::CallMembers(members) => self.introduce_all(members.other_users),
            ServerEvent::NewPeer(peer) => self.introduce_all(vec![peer.username]),
            ServerEvent::RemovePeer(peer) => {
                self.members.remove(&peer.username);
                self.teardown(&peer.username);
                Vec::new()
            }
            ServerEvent::ReceiveOffer(offer) => self.on_offer(offer),
            ServerEvent::ReceiveAnswer(answer) => {
                self.on_answer(answer);
                Vec::new()
            }
            ServerEvent::ReceiveIceCandidate(candidate) => {
                self.on_remote_candidate(candidate);
                Vec::new()
            }
            ServerEvent::CallRejected(rejected) => self.on_rejected(&rejected.from),
            ServerEvent::UsersUpdated(_)
            | ServerEvent::RoomsUpdated(_)
            | ServerEvent::RoomMessages(_)
            | ServerEvent::NewMessage(_) => Vec::new(),
        }
    }

    /// A candidate gathered locally for the link to `remote`.
    pub fn on_local_candidate(
        &mut self,
        remote: &str,
        candidate: IceCandidate,
    ) -> Option<ClientEvent> {
        let call = self.call.as_ref()?;
        if !self.links.contains_key(remote) {
            return None;
        }
        Some(ClientEvent::SendIceCandidate(SendIceCandidate {
            target_user: remote.to_owned(),
            room_id: Some(call.room_id.clone()),
            candidate,
        }))
    }

    /// The engine reports media flowing on the link to `remote`.
    pub fn on_link_connected(&mut self, remote: &str) {
        if let Some(link) = self.links.get_mut(remote) {
            if link.state == NegotiationState::RemoteSet {
                link.state = NegotiationState::Connected;
                info!(user = %self.username, remote, "peer connected");
            }
        }
    }

    fn introduce_all(&mut self, remotes: Vec<String>) -> Vec<ClientEvent> {
        let Some(call) = self.call.clone() else {
            debug!(user = %self.username, "peer introduction outside a call ignored");
            return Vec::new();
        };
        let mut sent = Vec::new();
        for remote in remotes {
            if remote == self.username {
                continue;
            }
            self.members.insert(remote.clone());
            let role = match call.kind {
                CallKind::Direct => LinkRole::Initiator,
                CallKind::Group => group_role(&self.username, &remote),
            };
            if !self.open_link(&remote, role) {
                continue;
            }
            if role == LinkRole::Initiator {
                sent.extend(self.offer(&remote, &call));
            }
        }
        sent
    }

    fn on_offer(&mut self, offer: ReceiveOffer) -> Vec<ClientEvent> {
        let ReceiveOffer { from, offer, room_id, media_type } = offer;
        let in_room_call = self.call.as_ref().is_some_and(|c| c.room_id == room_id);
        if !in_room_call {
            info!(user = %self.username, %from, %room_id, "incoming call awaiting decision");
            self.invites
                .insert(from.clone(), Invite { from, room_id, media_type, offer });
            return Vec::new();
        }
        self.members.insert(from.clone());
        self.answer(&from, offer, room_id)
    }

    fn on_answer(&mut self, answer: ReceiveAnswer) {
        let ReceiveAnswer { from, answer } = answer;
        if self.state(&from) != NegotiationState::OfferSent {
            debug!(user = %self.username, %from, "answer without an outstanding offer ignored");
            return;
        }
        let applied = self.drive(&from, |engine, link| {
            engine.set_remote_description(&mut link.handle, &answer)?;
            link.state = NegotiationState::RemoteSet;
            Ok(())
        });
        if applied.is_some() {
            self.flush_candidates(&from);
        }
    }

    fn on_remote_candidate(&mut self, candidate: ReceiveIceCandidate) {
        let ReceiveIceCandidate { from, candidate } = candidate;
        if self.state(&from).has_remote_description() {
            self.apply_candidate(&from, &candidate);
        } else if self.call.is_some() || self.invites.contains_key(&from) {
            self.pending.entry(from).or_default().push(candidate);
        } else {
            debug!(user = %self.username, %from, "candidate outside any call dropped");
        }
    }

    fn on_rejected(&mut self, from: &str) -> Vec<ClientEvent> {
        info!(user = %self.username, from, "call rejected by peer");
        self.members.remove(from);
        self.teardown(from);
        let direct = self
            .call
            .as_ref()
            .is_some_and(|c| c.kind == CallKind::Direct);
        if direct {
            self.leave_call()
        } else {
            Vec::new()
        }
    }

    /// Open a link and attach local tracks. Refuses a second link to the
    /// same remote.
    fn open_link(&mut self, remote: &str, role: LinkRole) -> bool {
        if self.links.contains_key(remote) {
            warn!(user = %self.username, remote, "link already exists, not creating another");
            return false;
        }
        let mut handle = match self.engine.open_link(remote) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(user = %self.username, remote, error = %e, "could not open link");
                return false;
            }
        };
        if let Err(e) = self.engine.attach_local_media(&mut handle) {
            warn!(user = %self.username, remote, error = %e, "could not attach local media");
            self.engine.close_link(handle);
            return false;
        }
        debug!(user = %self.username, remote, ?role, "link created");
        self.links.insert(remote.to_owned(), PeerLink::new(remote, role, handle));
        true
    }

    fn offer(&mut self, remote: &str, call: &ActiveCall) -> Vec<ClientEvent> {
        let offer = self.drive(remote, |engine, link| {
            let offer = engine.create_offer(&mut link.handle)?;
            engine.set_local_description(&mut link.handle, &offer)?;
            link.state = NegotiationState::OfferSent;
            Ok(offer)
        });
        offer
            .map(|offer| {
                ClientEvent::SendOffer(SendOffer {
                    target_user: remote.to_owned(),
                    room_id: call.room_id.clone(),
                    offer,
                    media_type: call.media_type,
                })
            })
            .into_iter()
            .collect()
    }

    /// Apply a remote offer and answer it, creating the link as responder
    /// when none exists yet.
    fn answer(
        &mut self,
        remote: &str,
        offer: SessionDescription,
        room_id: String,
    ) -> Vec<ClientEvent> {
        if !self.links.contains_key(remote) && !self.open_link(remote, LinkRole::Responder) {
            return Vec::new();
        }
        let applied = self.drive(remote, |engine, link| {
            engine.set_remote_description(&mut link.handle, &offer)?;
            link.state = NegotiationState::AwaitingLocalAnswer;
            Ok(())
        });
        if applied.is_none() {
            return Vec::new();
        }
        self.flush_candidates(remote);

        let answer = self.drive(remote, |engine, link| {
            let answer = engine.create_answer(&mut link.handle)?;
            engine.set_local_description(&mut link.handle, &answer)?;
            link.state = NegotiationState::RemoteSet;
            Ok(answer)
        });
        answer
            .map(|answer| {
                ClientEvent::SendAnswer(SendAnswer {
                    target_user: remote.to_owned(),
                    room_id: Some(room_id),
                    answer,
                })
            })
            .into_iter()
            .collect()
    }

    /// Run one negotiation step on `remote`'s link; a failing step closes it.
    fn drive<T>(
        &mut self,
        remote: &str,
        step: impl FnOnce(&mut E, &mut PeerLink<E::Link>) -> Result<T, EngineError>,
    ) -> Option<T> {
        let link = self.links.get_mut(remote)?;
        let before = link.state;
        match step(&mut self.engine, link) {
            Ok(value) => {
                if let Some(link) = self.links.get(remote) {
                    debug!(user = %self.username, remote, from = %before, to = %link.state, "negotiation step");
                }
                Some(value)
            }
            Err(e) => {
                warn!(user = %self.username, remote, state = %before, error = %e, "negotiation failed");
                self.members.remove(remote);
                self.teardown(remote);
                None
            }
        }
    }

    fn flush_candidates(&mut self, remote: &str) {
        let Some(queued) = self.pending.remove(remote) else {
            return;
        };
        debug!(user = %self.username, remote, count = queued.len(), "applying queued candidates");
        for candidate in &queued {
            self.apply_candidate(remote, candidate);
        }
    }

    fn apply_candidate(&mut self, remote: &str, candidate: &IceCandidate) {
        if let Some(link) = self.links.get_mut(remote) {
            if let Err(e) = self.engine.add_ice_candidate(&mut link.handle, candidate) {
                warn!(user = %self.username, remote, error = %e, "candidate rejected");
            }
        }
    }

    fn teardown(&mut self, remote: &str) {
        self.pending.remove(remote);
        if let Some(link) = self.links.remove(remote) {
            debug!(
                user = %self.username,
                remote,
                from = %link.state,
                to = %NegotiationState::Closed,
                "closing link"
            );
            self.engine.close_link(link.handle);
        }
    }
}
