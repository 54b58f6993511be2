use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Other(String),
}

/// Receiving half of a viewer connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next frame. `Ok(None)` means the peer closed the connection.
    async fn read_frame(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Sending half of a viewer connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A duplex, message framed connection handed over to a session.
pub trait Transport: Send + 'static {
    type Source: FrameSource + 'static;
    type Sink: FrameSink + 'static;

    fn split(self) -> (Self::Source, Self::Sink);
}
