//! Process-wide room registry
//!
//! Rooms are created lazily on first use and live for the process lifetime;
//! there is no teardown path. Router allocation suspends, so `get_or_create`
//! serializes its slow path behind an async mutex: two peers preparing the
//! same not-yet-existing room must end up with one room and one router.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::MediaEngine;
use crate::error::{Error, Result};
use crate::room::Room;
use crate::types::RoomId;

pub struct RoomRegistry {
    engine: Arc<dyn MediaEngine>,
    rooms: DashMap<RoomId, Arc<Room>>,
    create_lock: Mutex<()>,
    /// Maximum number of rooms (0 = unlimited).
    max_rooms: usize,
}

impl RoomRegistry {
    pub fn new(engine: Arc<dyn MediaEngine>, max_rooms: usize) -> Self {
        Self {
            engine,
            rooms: DashMap::new(),
            create_lock: Mutex::new(()),
            max_rooms,
        }
    }

    /// Look up an existing room.
    pub fn get(&self, id: &RoomId) -> Result<Arc<Room>> {
        self.rooms
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::RoomNotFound(id.clone()))
    }

    /// Return the existing room or create it, allocating a fresh router.
    ///
    /// The fast path is lock-free; creation takes the registry-wide creation
    /// lock and re-checks under it, so concurrent calls for the same new id
    /// allocate exactly one router.
    pub async fn get_or_create(&self, id: &RoomId) -> Result<Arc<Room>> {
        if let Some(room) = self.rooms.get(id) {
            debug!(room_id = %id, "room already exists");
            return Ok(Arc::clone(room.value()));
        }

        let _guard = self.create_lock.lock().await;
        if let Some(room) = self.rooms.get(id) {
            return Ok(Arc::clone(room.value()));
        }

        if self.max_rooms > 0 && self.rooms.len() >= self.max_rooms {
            warn!(
                current_rooms = self.rooms.len(),
                max_rooms = self.max_rooms,
                "room limit reached"
            );
            return Err(Error::TooManyRooms);
        }

        let router = self.engine.create_router().await?;
        let room = Arc::new(Room::new(id.clone(), router));
        self.rooms.insert(id.clone(), Arc::clone(&room));

        info!(
            room_id = %id,
            total_rooms = self.rooms.len(),
            "created room"
        );
        Ok(room)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::stub_engine;

    #[tokio::test]
    async fn test_get_or_create_returns_same_room() {
        let registry = RoomRegistry::new(stub_engine(), 0);
        let id = RoomId::from("test-room");

        let room = registry.get_or_create(&id).await.unwrap();
        let room2 = registry.get_or_create(&id).await.unwrap();
        assert!(Arc::ptr_eq(&room, &room2));
        assert_eq!(registry.room_count(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_room() {
        let registry = RoomRegistry::new(stub_engine(), 0);
        let err = registry.get(&RoomId::from("nope")).unwrap_err();
        assert!(matches!(err, Error::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_room_limit() {
        let registry = RoomRegistry::new(stub_engine(), 2);
        registry.get_or_create(&RoomId::from("r1")).await.unwrap();
        registry.get_or_create(&RoomId::from("r2")).await.unwrap();

        let err = registry.get_or_create(&RoomId::from("r3")).await.unwrap_err();
        assert!(matches!(err, Error::TooManyRooms));

        // Existing rooms are still returned at the limit.
        assert!(registry.get_or_create(&RoomId::from("r1")).await.is_ok());
    }
}
