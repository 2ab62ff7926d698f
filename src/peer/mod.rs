//! Client-side negotiation of mesh calls.
//!
//! Each participant runs one [`CallAgent`], which keeps a [`PeerLink`] per
//! remote user in the call and turns relayed `receiveOffer` /
//! `receiveAnswer` / `receiveICECandidate` envelopes into calls on a
//! [`MediaEngine`]. Media never passes through the server.
//!
//! ```text
//!   initiator                           responder
//!   ─────────                           ─────────
//!   LinkCreated ── offer ──────────────► LinkCreated
//!   OfferSent                            AwaitingLocalAnswer
//!            ◄──────────────── answer ── RemoteSet
//!   RemoteSet
//!        ╲                              ╱
//!         ╲── ICE candidates both ways ╱──► Connected
//! ```

mod agent;
mod engine;
mod link;

use thiserror::Error;

pub use agent::{ActiveCall, CallAgent, CallKind, Invite};
pub use engine::{EngineError, MediaEngine};
pub use link::{LinkRole, NegotiationState, PeerLink};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    /// Local media could not be captured; the call was not joined.
    #[error("media capture failed: {0}")]
    Capture(EngineError),

    #[error("already in the call of {0}")]
    AlreadyInCall(String),

    #[error("no pending call from {0}")]
    NoInvite(String),
}

/// Role of `local` towards `remote` in a group call: the lexicographically
/// smaller name sends the offer.
pub fn group_role(local: &str, remote: &str) -> LinkRole {
    if local < remote {
        LinkRole::Initiator
    } else {
        LinkRole::Responder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_is_symmetric() {
        let names = ["alice", "bob", "Bob", "carol", "al", "alice2", "ülf"];
        for x in names {
            for y in names {
                if x == y {
                    continue;
                }
                let x_offers = group_role(x, y) == LinkRole::Initiator;
                let y_offers = group_role(y, x) == LinkRole::Initiator;
                assert!(x_offers ^ y_offers, "{x} vs {y}");
                assert_eq!(x_offers, x < y);
            }
        }
    }

    #[test]
    fn only_remote_description_unlocks_candidates() {
        use NegotiationState::*;
        for state in [Idle, HasLocalMedia, LinkCreated, OfferSent, Closed] {
            assert!(!state.has_remote_description(), "{state}");
        }
        for state in [AwaitingLocalAnswer, RemoteSet, Connected] {
            assert!(state.has_remote_description(), "{state}");
        }
    }
}
