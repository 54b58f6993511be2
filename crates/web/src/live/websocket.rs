use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use super::transport::{FrameSink, FrameSource, Transport, TransportError};

/// [`Transport`] over an upgraded axum WebSocket.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Transport for WsTransport {
    type Source = WsSource;
    type Sink = WsSink;

    fn split(self) -> (Self::Source, Self::Sink) {
        let (sink, stream) = self.socket.split();
        (WsSource(stream), WsSink(sink))
    }
}

pub struct WsSource(SplitStream<WebSocket>);

pub struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSource for WsSource {
    async fn read_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.0.next().await {
            None | Some(Ok(Message::Close(_))) => Ok(None),
            Some(Ok(message)) => Ok(Some(Bytes::from(message.into_data()))),
            Some(Err(e)) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let message = match String::from_utf8(frame.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        };
        self.0.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::features::leaderboard::LeaderboardService;
    use crate::features::leaderboard::services::tests::{FELICIA, roster};
    use crate::live::{ConnectionRegistry, RegistryConfig};
    use crate::routes;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use futures::StreamExt;
    use std::time::Duration;
    use storage::services::leaderboard::Leaderboard;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message as ClientMessage};
    use tower::ServiceExt;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn next_json(client: &mut Client) -> serde_json::Value {
        let frame = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        match frame {
            ClientMessage::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_live_feed_over_websocket() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let service = LeaderboardService::new(Leaderboard::new(roster()).unwrap(), registry.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes::app(service.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        let snapshot = next_json(&mut client).await;
        assert_eq!(snapshot.as_array().unwrap().len(), 4);
        assert_eq!(snapshot[0]["first_name"], "John");
        assert_eq!(registry.session_count().await, 1);

        let update = serde_json::json!({
            "chip_id": FELICIA,
            "timing_point_id": "finish_line",
            "clock_time": "00:02:00.250"
        });
        let response = routes::app(service.clone())
            .oneshot(
                Request::post("/update")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(update.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let delta = next_json(&mut client).await;
        assert_eq!(delta["first_name"], "Felicia");
        assert_eq!(delta["timings"]["finish_line"], "00:02:00.25");
        assert_eq!(delta["timings"]["finish_corridor"], "");

        client.close(None).await.unwrap();
        timeout(Duration::from_secs(2), async {
            while registry.session_count().await != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("closed viewer was not reclaimed");
    }
}
