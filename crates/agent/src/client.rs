// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection client: URL mapping, TLS, dial, and the registration payload.

use crate::ip;
use async_trait::async_trait;
use fc_wire::{
    Connection, Frame, FrameSink, FrameStream, Message, MessageType, RegisterData, TransportError,
    MAX_FRAME_SIZE,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

/// Errors from the connection client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid cloud URL: {0}")]
    InvalidUrl(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to register: {0}")]
    Register(String),
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct ClientSink(SplitSink<WsStream, WsMessage>);

#[async_trait]
impl FrameSink for ClientSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let msg = match frame {
            Frame::Text(text) => WsMessage::Text(text),
            Frame::Binary(bytes) => WsMessage::Binary(bytes),
            Frame::Ping(bytes) => WsMessage::Ping(bytes),
            Frame::Pong(bytes) => WsMessage::Pong(bytes),
            Frame::Close => WsMessage::Close(None),
        };
        self.0
            .send(msg)
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0
            .close()
            .await
            .map_err(|e| TransportError(e.to_string()))
    }
}

struct ClientStream(SplitStream<WsStream>);

#[async_trait]
impl FrameStream for ClientStream {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>> {
        let item = self.0.next().await?;
        Some(match item {
            Ok(WsMessage::Text(text)) => Ok(Frame::Text(text)),
            Ok(WsMessage::Binary(bytes)) => Ok(Frame::Binary(bytes)),
            Ok(WsMessage::Ping(bytes)) => Ok(Frame::Ping(bytes)),
            Ok(WsMessage::Pong(bytes)) => Ok(Frame::Pong(bytes)),
            Ok(WsMessage::Close(_)) => Ok(Frame::Close),
            Ok(WsMessage::Frame(_)) => Ok(Frame::Binary(Vec::new())),
            Err(e) => Err(TransportError(e.to_string())),
        })
    }
}

/// Dials the cloud and produces registered connections.
pub struct Client {
    cloud_url: String,
    agent_id: String,
    agent_name: String,
}

impl Client {
    pub fn new(cloud_url: &str, agent_id: &str, agent_name: &str) -> Self {
        Self {
            cloud_url: cloud_url.to_string(),
            agent_id: agent_id.to_string(),
            agent_name: agent_name.to_string(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Dial the cloud's `/ws` endpoint and spawn the connection pumps.
    pub async fn connect(&self) -> Result<Arc<Connection>, ClientError> {
        let url = websocket_url(&self.cloud_url)?;
        let secure = url.starts_with("wss://");

        let connector = if secure {
            let skip_verify = skip_tls_verify();
            if skip_verify {
                tracing::info!("wss: skipping certificate verification (self-signed certificates)");
            }
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(skip_verify)
                .build()
                .map_err(|e| ClientError::Connect(format!("tls setup failed: {}", e)))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(MAX_FRAME_SIZE);
        config.max_frame_size = Some(MAX_FRAME_SIZE);

        let (stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
            url.as_str(),
            Some(config),
            false,
            connector,
        )
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;

        let (sink, source) = stream.split();
        let protocol = if secure { "wss" } else { "ws" };
        let conn = Connection::spawn(ClientSink(sink), ClientStream(source), protocol);

        tracing::info!(%url, "connected to cloud");
        Ok(conn)
    }

    /// Register over a fresh connection.
    pub async fn register(&self, conn: &Arc<Connection>) -> Result<(), ClientError> {
        let data = self.register_data().await;
        let msg = Message::new(MessageType::AgentRegister, &data)
            .map_err(|e| ClientError::Register(e.to_string()))?;
        conn.write(msg)
            .map_err(|e| ClientError::Register(e.to_string()))
    }

    /// Build the registration payload: identity, addressing, environment.
    pub async fn register_data(&self) -> RegisterData {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();

        let env = std::env::var("K8S_CLUSTER_NAME")
            .or_else(|_| std::env::var("CLUSTER_NAME"))
            .unwrap_or_default();

        let mut metadata = HashMap::new();
        metadata.insert("os".to_string(), std::env::consts::OS.to_string());

        RegisterData {
            agent_id: self.agent_id.clone(),
            name: self.agent_name.clone(),
            hostname,
            ip: ip::discover_ip().await,
            version: env!("CARGO_PKG_VERSION").to_string(),
            env,
            metadata,
        }
    }
}

/// Map a cloud URL onto the WebSocket endpoint: `http(s)` becomes
/// `ws(s)`, bare `ws(s)` passes through, and an empty path becomes `/ws`.
pub fn websocket_url(cloud_url: &str) -> Result<String, ClientError> {
    let (scheme, rest) = cloud_url
        .split_once("://")
        .ok_or_else(|| ClientError::InvalidUrl(cloud_url.to_string()))?;

    let scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(ClientError::InvalidUrl(cloud_url.to_string())),
    };

    if rest.is_empty() {
        return Err(ClientError::InvalidUrl(cloud_url.to_string()));
    }

    let (host, path) = match rest.split_once('/') {
        Some((host, path)) => (host, format!("/{path}")),
        None => (rest, String::new()),
    };
    let path = if path.is_empty() || path == "/" {
        "/ws".to_string()
    } else {
        path
    };

    Ok(format!("{scheme}://{host}{path}"))
}

/// `WS_SKIP_VERIFY` controls certificate verification for wss; unset
/// defaults to skipping, for self-signed deployments.
fn skip_tls_verify() -> bool {
    match std::env::var("WS_SKIP_VERIFY") {
        Ok(value) => value.parse::<bool>().unwrap_or(true),
        Err(_) => true,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
