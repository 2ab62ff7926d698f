use std::fmt;

/// Which side creates the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Initiator,
    Responder,
}

/// Where negotiation with one remote user stands.
///
/// `Idle` and `HasLocalMedia` describe a remote with no link yet; the rest
/// belong to an open [`PeerLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    HasLocalMedia,
    LinkCreated,
    OfferSent,
    AwaitingLocalAnswer,
    RemoteSet,
    Connected,
    Closed,
}

impl NegotiationState {
    /// Whether a remote description has been applied, so ICE candidates can
    /// go straight to the link.
    pub fn has_remote_description(self) -> bool {
        matches!(self, Self::AwaitingLocalAnswer | Self::RemoteSet | Self::Connected)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::HasLocalMedia => "has-local-media",
            Self::LinkCreated => "link-created",
            Self::OfferSent => "offer-sent",
            Self::AwaitingLocalAnswer => "awaiting-local-answer",
            Self::RemoteSet => "remote-set",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// One open link to a remote participant.
pub struct PeerLink<L> {
    pub(crate) remote: String,
    pub(crate) role: LinkRole,
    pub(crate) state: NegotiationState,
    pub(crate) handle: L,
}

impl<L> PeerLink<L> {
    pub(crate) fn new(remote: &str, role: LinkRole, handle: L) -> Self {
        Self { remote: remote.to_owned(), role, state: NegotiationState::LinkCreated, handle }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }
}
