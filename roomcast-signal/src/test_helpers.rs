//! Test helpers and fixtures for roomcast-signal unit tests
//!
//! Inert engine stubs: they hand out handles with random ids and accept every
//! call, but propagate no close signals. Tests that need signal propagation
//! live in `tests/` with a full mock engine.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::engine::{
    CloseHook, Consumer, DtlsParameters, IceCandidates, IceParameters, MediaEngine, Producer,
    Router, RtpCapabilities, RtpParameters, Transport, TransportParams,
};
use crate::error::Result;
use crate::room::Room;
use crate::types::{ConsumerId, MediaKind, ProducerId, RoomId, TransportId};

pub struct StubEngine;

#[async_trait]
impl MediaEngine for StubEngine {
    async fn create_router(&self) -> Result<Arc<dyn Router>> {
        Ok(Arc::new(StubRouter))
    }
}

pub struct StubRouter;

#[async_trait]
impl Router for StubRouter {
    fn rtp_capabilities(&self) -> RtpCapabilities {
        RtpCapabilities(json!({ "codecs": [] }))
    }

    async fn create_transport(&self) -> Result<Arc<dyn Transport>> {
        Ok(stub_transport())
    }

    fn can_consume(&self, _producer_id: &ProducerId, _rtp_capabilities: &RtpCapabilities) -> bool {
        true
    }
}

pub struct StubTransport {
    id: TransportId,
}

#[async_trait]
impl Transport for StubTransport {
    fn id(&self) -> TransportId {
        self.id.clone()
    }

    fn params(&self) -> TransportParams {
        TransportParams {
            id: self.id.clone(),
            ice_parameters: IceParameters(json!({})),
            ice_candidates: IceCandidates(json!([])),
            dtls_parameters: DtlsParameters(json!({})),
        }
    }

    async fn connect(&self, _dtls_parameters: DtlsParameters) -> Result<()> {
        Ok(())
    }

    async fn produce(
        &self,
        kind: MediaKind,
        _rtp_parameters: RtpParameters,
    ) -> Result<Arc<dyn Producer>> {
        Ok(stub_producer(kind))
    }

    async fn consume(
        &self,
        _producer_id: &ProducerId,
        _rtp_capabilities: RtpCapabilities,
        _paused: bool,
    ) -> Result<Arc<dyn Consumer>> {
        Ok(stub_consumer(MediaKind::Video))
    }

    fn close(&self) {}

    fn on_close(&self, _hook: CloseHook) {}
}

pub struct StubProducer {
    id: ProducerId,
    kind: MediaKind,
}

impl Producer for StubProducer {
    fn id(&self) -> ProducerId {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn close(&self) {}
}

pub struct StubConsumer {
    id: ConsumerId,
    kind: MediaKind,
}

#[async_trait]
impl Consumer for StubConsumer {
    fn id(&self) -> ConsumerId {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn rtp_parameters(&self) -> RtpParameters {
        RtpParameters(json!({ "codecs": [] }))
    }

    fn consumer_type(&self) -> String {
        "simple".to_string()
    }

    fn producer_paused(&self) -> bool {
        false
    }

    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}

    fn on_producer_close(&self, _hook: CloseHook) {}
}

pub fn stub_engine() -> Arc<dyn MediaEngine> {
    Arc::new(StubEngine)
}

pub fn stub_room(id: &str) -> Room {
    Room::new(RoomId::from(id), Arc::new(StubRouter))
}

pub fn stub_transport() -> Arc<dyn Transport> {
    Arc::new(StubTransport {
        id: TransportId::new(nanoid::nanoid!(8)),
    })
}

pub fn stub_producer(kind: MediaKind) -> Arc<dyn Producer> {
    Arc::new(StubProducer {
        id: ProducerId::new(nanoid::nanoid!(8)),
        kind,
    })
}

pub fn stub_consumer(kind: MediaKind) -> Arc<dyn Consumer> {
    Arc::new(StubConsumer {
        id: ConsumerId::new(nanoid::nanoid!(8)),
        kind,
    })
}
