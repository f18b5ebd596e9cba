//! Session gateway: typed request dispatch per connected peer
//!
//! The gateway receives one typed [`Request`] at a time from a peer's event
//! channel, validates preconditions against the room registries, calls into
//! the media engine, mutates registry state on success, and returns a typed
//! [`Response`]. Production and producer-close events fan out to other peers
//! in the room as [`ServerEvent`]s over per-peer channels.
//!
//! Requests from one peer are handled in issue order; handlers from different
//! peers interleave at engine await points. The two races that matter — room
//! creation and consume-while-producer-closing — are handled in the room
//! registry and in `consume_add` respectively.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cleanup;
use crate::config::SignalConfig;
use crate::engine::{
    DtlsParameters, MediaEngine, RtpCapabilities, RtpParameters, TransportParams,
};
use crate::error::{Error, Result};
use crate::registry::RoomRegistry;
use crate::room::Room;
use crate::session::PeerSession;
use crate::types::{ConsumerId, MediaKind, PeerId, ProducerId, RoomId};

/// Requests a peer can issue over its event channel. Tag and field names
/// match the wire protocol of existing signaling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    GetRouterRtpCapabilities,
    #[serde(rename = "prepare_room")]
    PrepareRoom { room_id: RoomId },
    CreateProducerTransport,
    ConnectProducerTransport { dtls_parameters: DtlsParameters },
    Produce {
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },
    CreateConsumerTransport,
    ConnectConsumerTransport { dtls_parameters: DtlsParameters },
    GetCurrentProducers { local_id: PeerId },
    ConsumeAdd {
        remote_id: PeerId,
        kind: MediaKind,
        rtp_capabilities: RtpCapabilities,
    },
    ResumeAdd { remote_id: PeerId, kind: MediaKind },
}

/// Success payloads, serialized bare (no tag) exactly as the callback-style
/// protocol expects.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Response {
    RouterRtpCapabilities(RtpCapabilities),
    TransportCreated(TransportParams),
    Produced { id: ProducerId },
    CurrentProducers {
        remote_video_ids: Vec<PeerId>,
        remote_audio_ids: Vec<PeerId>,
    },
    ConsumerCreated {
        producer_id: ProducerId,
        id: ConsumerId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        #[serde(rename = "type")]
        consumer_type: String,
        producer_paused: bool,
    },
    RoomPrepared { room_id: RoomId },
    Connected {},
    Resumed {},
}

/// Asynchronous events pushed to a peer's channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent once on connect with the peer's assigned id.
    Welcome { id: PeerId },
    /// Another peer in the room started producing.
    NewProducer {
        socket_id: PeerId,
        producer_id: ProducerId,
        kind: MediaKind,
    },
    /// A producer this peer was consuming closed; the consumer is gone.
    ProducerClosed {
        local_id: PeerId,
        remote_id: PeerId,
        kind: MediaKind,
    },
}

struct PeerLink {
    session: RwLock<PeerSession>,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

fn notify(peers: &DashMap<PeerId, PeerLink>, peer: &PeerId, event: ServerEvent) {
    if let Some(link) = peers.get(peer) {
        // A closed receiver means the peer is mid-disconnect; nothing to do.
        let _ = link.tx.send(event);
    }
}

pub struct SessionGateway {
    config: SignalConfig,
    default_room: RoomId,
    rooms: RoomRegistry,
    peers: Arc<DashMap<PeerId, PeerLink>>,
}

impl SessionGateway {
    /// Create the gateway and eagerly allocate the default room so peers that
    /// never send `prepare_room` have a router from the start.
    pub async fn new(engine: Arc<dyn MediaEngine>, config: SignalConfig) -> Result<Self> {
        let rooms = RoomRegistry::new(engine, config.max_rooms);
        let default_room = RoomId::from(config.default_room.clone());
        rooms.get_or_create(&default_room).await?;

        info!(default_room = %default_room, "session gateway initialized");
        Ok(Self {
            config,
            default_room,
            rooms,
            peers: Arc::new(DashMap::new()),
        })
    }

    /// Register a peer's event channel. The peer starts in the default room
    /// and immediately receives a `welcome` event carrying its id.
    pub fn connect(&self, peer_id: PeerId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = PeerSession::new(peer_id.clone(), self.default_room.clone());
        let link = PeerLink {
            session: RwLock::new(session),
            tx: tx.clone(),
        };
        if self.peers.insert(peer_id.clone(), link).is_some() {
            warn!(peer_id = %peer_id, "replaced existing peer connection");
        }

        let _ = tx.send(ServerEvent::Welcome {
            id: peer_id.clone(),
        });
        info!(peer_id = %peer_id, total_peers = self.peers.len(), "peer connected");
        rx
    }

    /// Drop the peer's channel and cascade-close everything it owned. Safe to
    /// call more than once and safe against whatever partial state an
    /// in-flight request left behind.
    pub fn disconnect(&self, peer_id: &PeerId) {
        let Some((_, link)) = self.peers.remove(peer_id) else {
            debug!(peer_id = %peer_id, "disconnect for unknown peer");
            return;
        };
        let room_id = link.session.read().room_id.clone();
        info!(
            peer_id = %peer_id,
            room_id = %room_id,
            total_peers = self.peers.len(),
            "peer disconnected"
        );

        if let Ok(room) = self.rooms.get(&room_id) {
            cleanup::clean_up_peer(&room, peer_id);
        }
    }

    /// Handle one request from a connected peer.
    pub async fn handle(&self, peer_id: &PeerId, request: Request) -> Result<Response> {
        match request {
            Request::GetRouterRtpCapabilities => self.get_router_rtp_capabilities(peer_id),
            Request::PrepareRoom { room_id } => self.prepare_room(peer_id, room_id).await,
            Request::CreateProducerTransport => self.create_producer_transport(peer_id).await,
            Request::ConnectProducerTransport { dtls_parameters } => {
                self.connect_producer_transport(peer_id, dtls_parameters).await
            }
            Request::Produce {
                kind,
                rtp_parameters,
            } => self.produce(peer_id, kind, rtp_parameters).await,
            Request::CreateConsumerTransport => self.create_consumer_transport(peer_id).await,
            Request::ConnectConsumerTransport { dtls_parameters } => {
                self.connect_consumer_transport(peer_id, dtls_parameters).await
            }
            Request::GetCurrentProducers { local_id } => {
                self.get_current_producers(peer_id, &local_id)
            }
            Request::ConsumeAdd {
                remote_id,
                kind,
                rtp_capabilities,
            } => self.consume_add(peer_id, remote_id, kind, rtp_capabilities).await,
            Request::ResumeAdd { remote_id, kind } => {
                self.resume_add(peer_id, remote_id, kind).await
            }
        }
    }

    #[must_use]
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    // --- handlers ---

    fn get_router_rtp_capabilities(&self, peer_id: &PeerId) -> Result<Response> {
        let room = match self.session_room(peer_id) {
            Ok(room) => room,
            Err(Error::RoomNotFound(_)) => return Err(Error::RouterNotReady),
            Err(e) => return Err(e),
        };
        Ok(Response::RouterRtpCapabilities(
            room.router().rtp_capabilities(),
        ))
    }

    async fn prepare_room(&self, peer_id: &PeerId, room_id: RoomId) -> Result<Response> {
        if self.config.max_peers_per_room > 0
            && self.peers_in_room(&room_id) >= self.config.max_peers_per_room
        {
            warn!(
                room_id = %room_id,
                max_peers = self.config.max_peers_per_room,
                "peer limit reached for room"
            );
            return Err(Error::RoomFull(room_id));
        }

        self.rooms.get_or_create(&room_id).await?;

        let link = self
            .peers
            .get(peer_id)
            .ok_or_else(|| Error::PeerNotConnected(peer_id.clone()))?;
        link.session.write().room_id = room_id.clone();

        info!(peer_id = %peer_id, room_id = %room_id, "peer joined room");
        Ok(Response::RoomPrepared { room_id })
    }

    async fn create_producer_transport(&self, peer_id: &PeerId) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let transport = room.router().create_transport().await?;
        let params = transport.params();
        room.set_producer_transport(peer_id, Arc::clone(&transport));

        // Engine-side close cascades this peer's producers before dropping
        // the transport registration.
        let hook_room = Arc::clone(&room);
        let hook_peer = peer_id.clone();
        transport.on_close(Box::new(move || {
            cleanup::producer_transport_closed(&hook_room, &hook_peer);
        }));

        debug!(
            room_id = %room.id,
            peer_id = %peer_id,
            transport_id = %params.id,
            "created producer transport"
        );
        Ok(Response::TransportCreated(params))
    }

    async fn connect_producer_transport(
        &self,
        peer_id: &PeerId,
        dtls_parameters: DtlsParameters,
    ) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let transport = room
            .producer_transport(peer_id)
            .ok_or_else(|| Error::ProducerTransportNotFound(peer_id.clone()))?;
        transport.connect(dtls_parameters).await?;
        Ok(Response::Connected {})
    }

    async fn produce(
        &self,
        peer_id: &PeerId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let transport = room
            .producer_transport(peer_id)
            .ok_or_else(|| Error::ProducerTransportNotFound(peer_id.clone()))?;

        let producer = transport.produce(kind, rtp_parameters).await?;
        let producer_id = producer.id();
        room.set_producer(peer_id, kind, producer);

        info!(
            room_id = %room.id,
            peer_id = %peer_id,
            %kind,
            producer_id = %producer_id,
            "new producer"
        );
        self.broadcast_to_room(
            &room.id,
            peer_id,
            &ServerEvent::NewProducer {
                socket_id: peer_id.clone(),
                producer_id: producer_id.clone(),
                kind,
            },
        );

        Ok(Response::Produced { id: producer_id })
    }

    async fn create_consumer_transport(&self, peer_id: &PeerId) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let transport = room.router().create_transport().await?;
        let params = transport.params();
        room.set_consumer_transport(peer_id, Arc::clone(&transport));

        let hook_room = Arc::clone(&room);
        let hook_peer = peer_id.clone();
        transport.on_close(Box::new(move || {
            cleanup::consumer_transport_closed(&hook_room, &hook_peer);
        }));

        debug!(
            room_id = %room.id,
            peer_id = %peer_id,
            transport_id = %params.id,
            "created consumer transport"
        );
        Ok(Response::TransportCreated(params))
    }

    async fn connect_consumer_transport(
        &self,
        peer_id: &PeerId,
        dtls_parameters: DtlsParameters,
    ) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let transport = room
            .consumer_transport(peer_id)
            .ok_or_else(|| Error::ConsumerTransportNotFound(peer_id.clone()))?;
        transport.connect(dtls_parameters).await?;
        Ok(Response::Connected {})
    }

    fn get_current_producers(&self, peer_id: &PeerId, local_id: &PeerId) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let remote_video_ids = room.list_other_producer_peers(MediaKind::Video, local_id);
        let remote_audio_ids = room.list_other_producer_peers(MediaKind::Audio, local_id);
        debug!(
            room_id = %room.id,
            peer_id = %peer_id,
            video = remote_video_ids.len(),
            audio = remote_audio_ids.len(),
            "current producers"
        );
        Ok(Response::CurrentProducers {
            remote_video_ids,
            remote_audio_ids,
        })
    }

    async fn consume_add(
        &self,
        peer_id: &PeerId,
        remote_id: PeerId,
        kind: MediaKind,
        rtp_capabilities: RtpCapabilities,
    ) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let transport = room
            .consumer_transport(peer_id)
            .ok_or_else(|| Error::ConsumerTransportNotFound(peer_id.clone()))?;
        let producer = room.producer(&remote_id, kind).ok_or_else(|| {
            Error::ProducerNotFound {
                peer: remote_id.clone(),
                kind,
            }
        })?;
        let producer_id = producer.id();

        if !room.router().can_consume(&producer_id, &rtp_capabilities) {
            warn!(
                room_id = %room.id,
                peer_id = %peer_id,
                remote_id = %remote_id,
                %kind,
                "router cannot consume producer with given capabilities"
            );
            return Err(Error::CannotConsume {
                peer: remote_id,
                kind,
            });
        }

        let paused = self.config.pause_video_on_consume && kind == MediaKind::Video;
        let consumer = transport
            .consume(&producer_id, rtp_capabilities, paused)
            .await?;

        // The producer may have closed while `consume` was suspended; never
        // register a consumer for a vanished producer.
        if room.producer(&remote_id, kind).is_none() {
            consumer.close();
            return Err(Error::ProducerNotFound {
                peer: remote_id,
                kind,
            });
        }

        room.set_consumer(peer_id, &remote_id, kind, Arc::clone(&consumer));

        // When the source producer closes, drop the registry entry and tell
        // this peer. The remove gate keeps the notification to exactly one
        // even if a cleanup pass races the signal.
        let hook_room = Arc::clone(&room);
        let hook_peers = Arc::clone(&self.peers);
        let local = peer_id.clone();
        let remote = remote_id.clone();
        consumer.on_producer_close(Box::new(move || {
            if let Some(orphaned) = hook_room.remove_consumer(&local, &remote, kind) {
                orphaned.close();
                notify(
                    &hook_peers,
                    &local,
                    ServerEvent::ProducerClosed {
                        local_id: local.clone(),
                        remote_id: remote,
                        kind,
                    },
                );
            }
        }));

        debug!(
            room_id = %room.id,
            local_id = %peer_id,
            remote_id = %remote_id,
            %kind,
            "consumer ready"
        );
        Ok(Response::ConsumerCreated {
            producer_id,
            id: consumer.id(),
            kind: consumer.kind(),
            rtp_parameters: consumer.rtp_parameters(),
            consumer_type: consumer.consumer_type(),
            producer_paused: consumer.producer_paused(),
        })
    }

    async fn resume_add(
        &self,
        peer_id: &PeerId,
        remote_id: PeerId,
        kind: MediaKind,
    ) -> Result<Response> {
        let room = self.session_room(peer_id)?;
        let consumer = room.consumer(peer_id, &remote_id, kind).ok_or_else(|| {
            Error::ConsumerNotFound {
                remote: remote_id.clone(),
                kind,
            }
        })?;
        consumer.resume().await?;
        debug!(room_id = %room.id, local_id = %peer_id, remote_id = %remote_id, %kind, "consumer resumed");
        Ok(Response::Resumed {})
    }

    // --- helpers ---

    fn session_room(&self, peer_id: &PeerId) -> Result<Arc<Room>> {
        let room_id = {
            let link = self
                .peers
                .get(peer_id)
                .ok_or_else(|| Error::PeerNotConnected(peer_id.clone()))?;
            let room_id = link.session.read().room_id.clone();
            room_id
        };
        self.rooms.get(&room_id)
    }

    fn peers_in_room(&self, room_id: &RoomId) -> usize {
        self.peers
            .iter()
            .filter(|entry| entry.value().session.read().room_id == *room_id)
            .count()
    }

    fn broadcast_to_room(&self, room_id: &RoomId, except: &PeerId, event: &ServerEvent) {
        for entry in self.peers.iter() {
            if entry.key() == except {
                continue;
            }
            let in_room = entry.value().session.read().room_id == *room_id;
            if in_room {
                let _ = entry.value().tx.send(event.clone());
            }
        }
    }
}
