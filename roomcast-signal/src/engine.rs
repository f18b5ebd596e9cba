//! Media engine boundary
//!
//! The signaling layer never touches RTP itself. It drives an external SFU
//! engine through the object graph declared here: a [`MediaEngine`] allocates
//! [`Router`]s, a router allocates [`Transport`]s, and transports create the
//! [`Producer`]/[`Consumer`] handles the registries track. Codec and RTP
//! parameter payloads are opaque JSON values forwarded verbatim between the
//! engine and the remote client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::types::{ConsumerId, MediaKind, ProducerId, TransportId};

/// Router RTP capability set, forwarded to clients unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RtpCapabilities(pub serde_json::Value);

/// RTP parameters of a track, forwarded to the engine unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RtpParameters(pub serde_json::Value);

/// DTLS handshake parameters supplied by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DtlsParameters(pub serde_json::Value);

/// ICE parameters of an engine transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IceParameters(pub serde_json::Value);

/// ICE candidate list of an engine transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IceCandidates(pub serde_json::Value);

/// Negotiation payload a client needs to connect to a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParams {
    pub id: TransportId,
    pub ice_parameters: IceParameters,
    pub ice_candidates: IceCandidates,
    pub dtls_parameters: DtlsParameters,
}

/// One-shot callback fired when an engine object closes.
pub type CloseHook = Box<dyn FnOnce() + Send + 'static>;

/// Entry point into the external SFU engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Allocate a fresh router. Called once per room, never again for its
    /// lifetime.
    async fn create_router(&self) -> Result<Arc<dyn Router>>;
}

/// A codec scope within the engine; one per room.
#[async_trait]
pub trait Router: Send + Sync {
    /// Static capability set of this router.
    fn rtp_capabilities(&self) -> RtpCapabilities;

    /// Create a WebRTC transport on this router.
    async fn create_transport(&self) -> Result<Arc<dyn Transport>>;

    /// Whether this router can feed the given producer to a client with the
    /// given capabilities.
    fn can_consume(&self, producer_id: &ProducerId, rtp_capabilities: &RtpCapabilities) -> bool;
}

/// A negotiated network path. Closing a transport must fire its registered
/// `on_close` hooks exactly once; `close` is idempotent.
#[async_trait]
pub trait Transport: Send + Sync {
    fn id(&self) -> TransportId;

    /// Negotiation payload for the client side of this transport.
    fn params(&self) -> TransportParams;

    /// Complete the DTLS handshake with client-supplied parameters.
    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<()>;

    /// Register an outbound track on this transport.
    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Arc<dyn Producer>>;

    /// Create a consumer feeding the given producer over this transport.
    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: RtpCapabilities,
        paused: bool,
    ) -> Result<Arc<dyn Consumer>>;

    fn close(&self);

    /// Register a hook fired when the transport closes, whether by `close`
    /// or from the engine side.
    fn on_close(&self, hook: CloseHook);
}

/// An outbound media track registered with a router. Closing a producer must
/// fire `on_producer_close` on every consumer attached to it.
pub trait Producer: Send + Sync {
    fn id(&self) -> ProducerId;
    fn kind(&self) -> MediaKind;
    fn close(&self);
}

/// An inbound handle onto another peer's producer.
#[async_trait]
pub trait Consumer: Send + Sync {
    fn id(&self) -> ConsumerId;
    fn kind(&self) -> MediaKind;

    /// Negotiated RTP parameters for the client side of this consumer.
    fn rtp_parameters(&self) -> RtpParameters;

    /// Engine consumer type ("simple", "simulcast", ...), informational.
    fn consumer_type(&self) -> String;

    /// Whether the source producer is currently paused.
    fn producer_paused(&self) -> bool;

    /// Resume a consumer created paused.
    async fn resume(&self) -> Result<()>;

    fn close(&self);

    /// Register a hook fired at most once when the source producer closes.
    fn on_producer_close(&self, hook: CloseHook);
}
