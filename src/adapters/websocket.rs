use crate::domain::ports::Connection;
use crate::utils::error::{EnvError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const SHOWDOWN_WEBSOCKET_URL: &str = "wss://sim.smogon.com/showdown/websocket";

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsConnection {
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::info!("Connecting to {}", url);
        let (stream, response) = connect_async(url).await?;
        tracing::debug!("WebSocket handshake status: {}", response.status());
        Ok(Self { stream })
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, message: &str) -> Result<()> {
        tracing::debug!(">> {}", message);
        self.stream.send(Message::Text(message.to_string())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => return Ok(text),
                Message::Ping(payload) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Message::Close(frame) => {
                    tracing::warn!("Server closed the connection: {:?}", frame);
                    return Err(EnvError::ConnectionClosed);
                }
                _ => {}
            }
        }
        Err(EnvError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        tracing::info!("Connection closed");
        Ok(())
    }
}
