//! Offer / answer / ICE forwarding between two named users.
//!
//! Payloads are passed through untouched. A target with no live connection
//! means the envelope is dropped; nothing is queued for later.

use tracing::debug;

use super::Outbox;
use crate::protocol::{
    ReceiveAnswer, ReceiveIceCandidate, ReceiveOffer, SendAnswer, SendIceCandidate, SendOffer,
    ServerEvent,
};

pub fn relay_offer(out: &mut Outbox<'_>, from: &str, req: SendOffer) -> usize {
    let SendOffer { target_user, room_id, offer, media_type } = req;
    let event = ServerEvent::ReceiveOffer(ReceiveOffer {
        from: from.to_owned(),
        offer,
        room_id,
        media_type,
    });
    forward(out, from, &target_user, &event, "offer")
}

pub fn relay_answer(out: &mut Outbox<'_>, from: &str, req: SendAnswer) -> usize {
    let event = ServerEvent::ReceiveAnswer(ReceiveAnswer { from: from.to_owned(), answer: req.answer });
    forward(out, from, &req.target_user, &event, "answer")
}

pub fn relay_candidate(out: &mut Outbox<'_>, from: &str, req: SendIceCandidate) -> usize {
    let event = ServerEvent::ReceiveIceCandidate(ReceiveIceCandidate {
        from: from.to_owned(),
        candidate: req.candidate,
    });
    forward(out, from, &req.target_user, &event, "candidate")
}

fn forward(out: &mut Outbox<'_>, from: &str, target: &str, event: &ServerEvent, kind: &str) -> usize {
    let delivered = out.to_user(target, event);
    if delivered == 0 {
        debug!(from, target, kind, "relay target offline, dropped");
    } else {
        debug!(from, target, kind, delivered, "relayed");
    }
    delivered
}
