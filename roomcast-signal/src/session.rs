//! Per-connection session state

use chrono::{DateTime, Utc};

use crate::types::{PeerId, RoomId};

/// Explicit per-connection session: which peer this channel belongs to and
/// which room it is currently in. Every peer starts in the default room and
/// moves on `prepare_room`.
#[derive(Debug, Clone)]
pub struct PeerSession {
    pub peer_id: PeerId,
    pub room_id: RoomId,
    pub connected_at: DateTime<Utc>,
}

impl PeerSession {
    pub fn new(peer_id: PeerId, room_id: RoomId) -> Self {
        Self {
            peer_id,
            room_id,
            connected_at: Utc::now(),
        }
    }
}
