//! Cascade cleanup for a peer's session state
//!
//! Runs on peer disconnect and on transport close signals. The closing order
//! is fixed and dependency-respecting: consumers first, then the consumer
//! transport, then producers, then the producer transport. Every step is an
//! idempotent registry remove, so a disconnect racing an explicit transport
//! close is safe in either order.
//!
//! Closing a producer here fires the `producer closed` hooks registered on
//! every consumer attached to it (see the gateway's `consume_add`), which is
//! how remote peers learn their consumer just went away.

use tracing::{debug, info};

use crate::room::Room;
use crate::types::{MediaKind, PeerId};

/// Full teardown of a peer's state in a room.
pub(crate) fn clean_up_peer(room: &Room, peer: &PeerId) {
    let closed = room.close_all_consumers_for(peer);
    if !closed.is_empty() {
        debug!(
            room_id = %room.id,
            peer_id = %peer,
            count = closed.len(),
            "closed consumers for peer"
        );
    }

    if let Some(transport) = room.remove_consumer_transport(peer) {
        transport.close();
    }

    for kind in MediaKind::ALL {
        if let Some(producer) = room.remove_producer(peer, kind) {
            producer.close();
        }
    }

    if let Some(transport) = room.remove_producer_transport(peer) {
        transport.close();
    }

    info!(room_id = %room.id, peer_id = %peer, "peer cleaned up");
}

/// Cascade for a producer transport's close signal: close that peer's
/// producers, then deregister the transport.
pub(crate) fn producer_transport_closed(room: &Room, peer: &PeerId) {
    for kind in MediaKind::ALL {
        if let Some(producer) = room.remove_producer(peer, kind) {
            producer.close();
        }
    }
    room.remove_producer_transport(peer);
    debug!(room_id = %room.id, peer_id = %peer, "producer transport closed");
}

/// Cascade for a consumer transport's close signal: close every consumer the
/// peer owns, then deregister the transport.
pub(crate) fn consumer_transport_closed(room: &Room, peer: &PeerId) {
    room.close_all_consumers_for(peer);
    room.remove_consumer_transport(peer);
    debug!(room_id = %room.id, peer_id = %peer, "consumer transport closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{stub_consumer, stub_producer, stub_room, stub_transport};

    #[test]
    fn test_clean_up_peer_empties_all_registries() {
        let room = stub_room("r1");
        let peer = PeerId::from("p1");

        room.set_producer_transport(&peer, stub_transport());
        room.set_consumer_transport(&peer, stub_transport());
        room.set_producer(&peer, MediaKind::Video, stub_producer(MediaKind::Video));
        room.set_producer(&peer, MediaKind::Audio, stub_producer(MediaKind::Audio));
        room.set_consumer(
            &peer,
            &PeerId::from("other"),
            MediaKind::Video,
            stub_consumer(MediaKind::Video),
        );

        clean_up_peer(&room, &peer);
        assert!(!room.peer_has_state(&peer));

        // Re-running against empty state is a no-op.
        clean_up_peer(&room, &peer);
        assert!(!room.peer_has_state(&peer));
    }

    #[test]
    fn test_transport_close_cascades_are_idempotent() {
        let room = stub_room("r1");
        let peer = PeerId::from("p1");

        room.set_producer_transport(&peer, stub_transport());
        room.set_producer(&peer, MediaKind::Video, stub_producer(MediaKind::Video));

        producer_transport_closed(&room, &peer);
        assert!(!room.peer_has_state(&peer));
        producer_transport_closed(&room, &peer);

        room.set_consumer_transport(&peer, stub_transport());
        consumer_transport_closed(&room, &peer);
        assert!(!room.peer_has_state(&peer));
        consumer_transport_closed(&room, &peer);
    }
}
