//! Roomcast signaling layer
//!
//! This crate coordinates WebRTC media sessions among multiple peers through
//! a Selective Forwarding Unit. Clients connect over a bidirectional event
//! channel, fetch router capabilities, create transports, and produce or
//! consume audio and video tracks; the gateway maps those requests onto SFU
//! primitives (router, transport, producer, consumer) and tracks who is
//! producing and consuming what.
//!
//! ## Architecture
//!
//! - **`SessionGateway`**: per-peer request dispatch and event fan-out
//! - **`RoomRegistry`**: process-wide room lookup with race-free creation
//! - **`Room`**: one router plus the transport/producer/consumer registries
//! - **`MediaEngine`** and friends: the boundary traits the external SFU
//!   engine is driven through
//!
//! The registries are the single source of truth for object liveness, and
//! disconnect runs a fixed-order cascade: consumers, consumer transport,
//! producers, producer transport. Peers consuming a disconnected producer
//! get a `producerClosed` event.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roomcast_signal::{PeerId, Request, SessionGateway, SignalConfig};
//!
//! let gateway = SessionGateway::new(engine, SignalConfig::default()).await?;
//! let mut events = gateway.connect(PeerId::from("alice"));
//! let response = gateway
//!     .handle(&PeerId::from("alice"), Request::CreateProducerTransport)
//!     .await?;
//! ```

mod cleanup;
mod config;
mod engine;
mod error;
mod gateway;
mod logging;
mod registry;
mod room;
mod session;
mod types;

#[cfg(test)]
pub mod test_helpers;

pub use config::{LoggingConfig, SignalConfig};
pub use engine::{
    CloseHook, Consumer, DtlsParameters, IceCandidates, IceParameters, MediaEngine, Producer,
    Router, RtpCapabilities, RtpParameters, Transport, TransportParams,
};
pub use error::{Error, Result};
pub use gateway::{Request, Response, ServerEvent, SessionGateway};
pub use logging::init_logging;
pub use registry::RoomRegistry;
pub use room::Room;
pub use session::PeerSession;
pub use types::{ConsumerId, MediaKind, PeerId, ProducerId, RoomId, TransportId};
