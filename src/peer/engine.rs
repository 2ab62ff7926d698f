use thiserror::Error;

use crate::protocol::{IceCandidate, MediaType, SessionDescription};

/// Failure reported by the media stack.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

/// The local WebRTC stack as seen by [`CallAgent`](super::CallAgent).
///
/// One engine serves every link of a participant: local capture is shared,
/// each remote user gets its own `Link`.
pub trait MediaEngine {
    type Link;

    /// Start capturing local audio (and video for [`MediaType::Video`]).
    fn capture(&mut self, media_type: MediaType) -> Result<(), EngineError>;

    /// Stop every local track.
    fn release_capture(&mut self);

    fn open_link(&mut self, remote: &str) -> Result<Self::Link, EngineError>;

    fn attach_local_media(&mut self, link: &mut Self::Link) -> Result<(), EngineError>;

    fn create_offer(&mut self, link: &mut Self::Link) -> Result<SessionDescription, EngineError>;

    fn create_answer(&mut self, link: &mut Self::Link) -> Result<SessionDescription, EngineError>;

    fn set_local_description(
        &mut self,
        link: &mut Self::Link,
        description: &SessionDescription,
    ) -> Result<(), EngineError>;

    fn set_remote_description(
        &mut self,
        link: &mut Self::Link,
        description: &SessionDescription,
    ) -> Result<(), EngineError>;

    fn add_ice_candidate(
        &mut self,
        link: &mut Self::Link,
        candidate: &IceCandidate,
    ) -> Result<(), EngineError>;

    /// Release everything the link holds.
    fn close_link(&mut self, link: Self::Link);
}
