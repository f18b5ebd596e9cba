//! Room state: one router plus the per-peer registries
//!
//! A [`Room`] owns its router handle and four registries: producer and
//! consumer transports keyed by peer, producers keyed by (peer, kind), and
//! consumers keyed by (local peer, remote peer, kind). The registries are the
//! single source of truth for object liveness; handles are never queried
//! directly.
//!
//! Every `remove_*` is idempotent because cleanup paths race with explicit
//! closes. Removal happens under the state lock but the returned handle is
//! closed by the caller after the guard drops: engine `close()` calls may fire
//! close hooks synchronously, and those hooks re-enter the registries.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::{Consumer, Producer, Router, Transport};
use crate::types::{MediaKind, PeerId, RoomId};

#[derive(Default)]
struct RoomState {
    producer_transports: HashMap<PeerId, Arc<dyn Transport>>,
    consumer_transports: HashMap<PeerId, Arc<dyn Transport>>,
    producers: HashMap<(PeerId, MediaKind), Arc<dyn Producer>>,
    consumers: HashMap<(PeerId, PeerId, MediaKind), Arc<dyn Consumer>>,
}

pub struct Room {
    pub id: RoomId,
    router: Arc<dyn Router>,
    state: RwLock<RoomState>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Room {
    pub fn new(id: RoomId, router: Arc<dyn Router>) -> Self {
        Self {
            id,
            router,
            state: RwLock::new(RoomState::default()),
        }
    }

    #[must_use]
    pub fn router(&self) -> Arc<dyn Router> {
        Arc::clone(&self.router)
    }

    // --- producer transports ---

    pub fn set_producer_transport(&self, peer: &PeerId, transport: Arc<dyn Transport>) {
        let mut state = self.state.write();
        if state
            .producer_transports
            .insert(peer.clone(), transport)
            .is_some()
        {
            warn!(room_id = %self.id, peer_id = %peer, "replaced existing producer transport");
        }
        debug!(
            room_id = %self.id,
            count = state.producer_transports.len(),
            "producer transports"
        );
    }

    #[must_use]
    pub fn producer_transport(&self, peer: &PeerId) -> Option<Arc<dyn Transport>> {
        self.state.read().producer_transports.get(peer).cloned()
    }

    pub fn remove_producer_transport(&self, peer: &PeerId) -> Option<Arc<dyn Transport>> {
        let mut state = self.state.write();
        let removed = state.producer_transports.remove(peer);
        debug!(
            room_id = %self.id,
            count = state.producer_transports.len(),
            "producer transports"
        );
        removed
    }

    // --- consumer transports ---

    pub fn set_consumer_transport(&self, peer: &PeerId, transport: Arc<dyn Transport>) {
        let mut state = self.state.write();
        if state
            .consumer_transports
            .insert(peer.clone(), transport)
            .is_some()
        {
            warn!(room_id = %self.id, peer_id = %peer, "replaced existing consumer transport");
        }
        debug!(
            room_id = %self.id,
            count = state.consumer_transports.len(),
            "consumer transports"
        );
    }

    #[must_use]
    pub fn consumer_transport(&self, peer: &PeerId) -> Option<Arc<dyn Transport>> {
        self.state.read().consumer_transports.get(peer).cloned()
    }

    pub fn remove_consumer_transport(&self, peer: &PeerId) -> Option<Arc<dyn Transport>> {
        let mut state = self.state.write();
        let removed = state.consumer_transports.remove(peer);
        debug!(
            room_id = %self.id,
            count = state.consumer_transports.len(),
            "consumer transports"
        );
        removed
    }

    // --- producers ---

    pub fn set_producer(&self, peer: &PeerId, kind: MediaKind, producer: Arc<dyn Producer>) {
        let mut state = self.state.write();
        if state
            .producers
            .insert((peer.clone(), kind), producer)
            .is_some()
        {
            warn!(room_id = %self.id, peer_id = %peer, %kind, "replaced existing producer");
        }
        debug!(room_id = %self.id, count = state.producers.len(), "producers");
    }

    #[must_use]
    pub fn producer(&self, peer: &PeerId, kind: MediaKind) -> Option<Arc<dyn Producer>> {
        self.state.read().producers.get(&(peer.clone(), kind)).cloned()
    }

    pub fn remove_producer(&self, peer: &PeerId, kind: MediaKind) -> Option<Arc<dyn Producer>> {
        let mut state = self.state.write();
        let removed = state.producers.remove(&(peer.clone(), kind));
        debug!(room_id = %self.id, count = state.producers.len(), "producers");
        removed
    }

    /// Peers currently producing `kind` in this room, excluding the caller.
    /// Answers "what can I consume right now".
    #[must_use]
    pub fn list_other_producer_peers(&self, kind: MediaKind, exclude: &PeerId) -> Vec<PeerId> {
        self.state
            .read()
            .producers
            .keys()
            .filter(|(peer, k)| *k == kind && peer != exclude)
            .map(|(peer, _)| peer.clone())
            .collect()
    }

    // --- consumers ---

    pub fn set_consumer(
        &self,
        local: &PeerId,
        remote: &PeerId,
        kind: MediaKind,
        consumer: Arc<dyn Consumer>,
    ) {
        let mut state = self.state.write();
        state
            .consumers
            .insert((local.clone(), remote.clone(), kind), consumer);
        debug!(
            room_id = %self.id,
            local_id = %local,
            remote_id = %remote,
            %kind,
            count = state.consumers.len(),
            "consumers"
        );
    }

    #[must_use]
    pub fn consumer(
        &self,
        local: &PeerId,
        remote: &PeerId,
        kind: MediaKind,
    ) -> Option<Arc<dyn Consumer>> {
        self.state
            .read()
            .consumers
            .get(&(local.clone(), remote.clone(), kind))
            .cloned()
    }

    pub fn remove_consumer(
        &self,
        local: &PeerId,
        remote: &PeerId,
        kind: MediaKind,
    ) -> Option<Arc<dyn Consumer>> {
        let mut state = self.state.write();
        let removed = state
            .consumers
            .remove(&(local.clone(), remote.clone(), kind));
        debug!(room_id = %self.id, count = state.consumers.len(), "consumers");
        removed
    }

    /// Close and remove every consumer owned by `local`, returning the
    /// (remote peer, kind) pairs that were closed.
    pub fn close_all_consumers_for(&self, local: &PeerId) -> Vec<(PeerId, MediaKind)> {
        let removed: Vec<_> = {
            let mut state = self.state.write();
            let keys: Vec<_> = state
                .consumers
                .keys()
                .filter(|(l, _, _)| l == local)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| state.consumers.remove(&key).map(|c| (key, c)))
                .collect()
        };

        let mut closed = Vec::with_capacity(removed.len());
        for ((_, remote, kind), consumer) in removed {
            consumer.close();
            closed.push((remote, kind));
        }
        closed
    }

    /// Whether any registry still references `peer` (consumers by local key).
    #[must_use]
    pub fn peer_has_state(&self, peer: &PeerId) -> bool {
        let state = self.state.read();
        state.producer_transports.contains_key(peer)
            || state.consumer_transports.contains_key(peer)
            || state.producers.keys().any(|(p, _)| p == peer)
            || state.consumers.keys().any(|(l, _, _)| l == peer)
    }

    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.state.read().consumers.len()
    }

    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.state.read().producers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{stub_consumer, stub_producer, stub_room, stub_transport};

    #[test]
    fn test_remove_is_idempotent() {
        let room = stub_room("r1");
        let peer = PeerId::from("p1");

        assert!(room.remove_producer_transport(&peer).is_none());
        assert!(room.remove_consumer_transport(&peer).is_none());
        assert!(room.remove_producer(&peer, MediaKind::Video).is_none());
        assert!(room
            .remove_consumer(&peer, &PeerId::from("p2"), MediaKind::Audio)
            .is_none());

        room.set_producer_transport(&peer, stub_transport());
        assert!(room.remove_producer_transport(&peer).is_some());
        assert!(room.remove_producer_transport(&peer).is_none());
    }

    #[test]
    fn test_list_other_producer_peers_excludes_caller() {
        let room = stub_room("r1");
        let a = PeerId::from("a");
        let b = PeerId::from("b");
        let c = PeerId::from("c");

        room.set_producer(&a, MediaKind::Video, stub_producer(MediaKind::Video));
        room.set_producer(&b, MediaKind::Video, stub_producer(MediaKind::Video));
        room.set_producer(&c, MediaKind::Audio, stub_producer(MediaKind::Audio));

        let mut video = room.list_other_producer_peers(MediaKind::Video, &a);
        video.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(video, vec![b.clone()]);
        assert!(room
            .list_other_producer_peers(MediaKind::Audio, &c)
            .is_empty());
    }

    #[test]
    fn test_close_all_consumers_for_returns_closed_pairs() {
        let room = stub_room("r1");
        let local = PeerId::from("local");
        let other = PeerId::from("other");

        room.set_consumer(
            &local,
            &PeerId::from("a"),
            MediaKind::Video,
            stub_consumer(MediaKind::Video),
        );
        room.set_consumer(
            &local,
            &PeerId::from("a"),
            MediaKind::Audio,
            stub_consumer(MediaKind::Audio),
        );
        room.set_consumer(
            &other,
            &PeerId::from("a"),
            MediaKind::Video,
            stub_consumer(MediaKind::Video),
        );

        let mut closed = room.close_all_consumers_for(&local);
        closed.sort_by_key(|(_, kind)| kind.as_str());
        assert_eq!(
            closed,
            vec![
                (PeerId::from("a"), MediaKind::Audio),
                (PeerId::from("a"), MediaKind::Video),
            ]
        );
        assert!(!room.peer_has_state(&local));
        assert_eq!(room.consumer_count(), 1);

        // Second pass is a no-op.
        assert!(room.close_all_consumers_for(&local).is_empty());
    }

    #[test]
    fn test_peer_has_state_tracks_all_registries() {
        let room = stub_room("r1");
        let peer = PeerId::from("p");
        assert!(!room.peer_has_state(&peer));

        room.set_consumer_transport(&peer, stub_transport());
        assert!(room.peer_has_state(&peer));
        room.remove_consumer_transport(&peer);
        assert!(!room.peer_has_state(&peer));
    }
}
