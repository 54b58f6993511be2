//! Live viewer connections: sessions, the registry that owns them, and the
//! transports they run over.

pub mod registry;
pub mod session;
pub mod transport;
pub mod websocket;

pub use registry::{ConnectionRegistry, RegistryConfig};
pub use websocket::WsTransport;
