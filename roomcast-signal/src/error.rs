use thiserror::Error;

use crate::types::{MediaKind, PeerId, RoomId};

#[derive(Error, Debug)]
pub enum Error {
    #[error("router NOT READY")]
    RouterNotReady,

    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("room is full: {0}")]
    RoomFull(RoomId),

    #[error("maximum number of rooms reached")]
    TooManyRooms,

    #[error("peer not connected: {0}")]
    PeerNotConnected(PeerId),

    #[error("producer transport not found for peer {0}")]
    ProducerTransportNotFound(PeerId),

    #[error("consumer transport not found for peer {0}")]
    ConsumerTransportNotFound(PeerId),

    #[error("producer not found for peer {peer} kind {kind}")]
    ProducerNotFound { peer: PeerId, kind: MediaKind },

    #[error("consumer not found for remote peer {remote} kind {kind}")]
    ConsumerNotFound { remote: PeerId, kind: MediaKind },

    #[error("router cannot consume producer of peer {peer} kind {kind}")]
    CannotConsume { peer: PeerId, kind: MediaKind },

    #[error("media engine error: {0}")]
    Engine(#[from] anyhow::Error),
}

impl Error {
    /// Wire-level error text, the string an event-channel adapter puts in
    /// the `(error, null)` callback slot.
    #[must_use]
    pub fn reject_text(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_not_ready_wire_text() {
        // Historic wire string, clients match on it.
        assert_eq!(Error::RouterNotReady.reject_text(), "router NOT READY");
    }
}
