// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/ws` ingress: upgrade handling and per-connection message routing.
//!
//! Each upgraded socket gets a pumped [`Connection`]; this module owns the
//! loop that reads decoded frames and dispatches them to the registry and
//! task manager. The same framed channel serves agents and human log
//! subscribers — both roles can coexist on one connection.

use crate::server::AppCtx;
use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use fc_wire::{
    Connection, Frame, FrameSink, FrameStream, HeartbeatData, Message, MessageType, RegisterAck,
    SubscribeAck, SubscribeLogsData, TaskCompleteData, TaskLogData, TransportError, MAX_FRAME_SIZE,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

/// Adapter: axum WebSocket halves as wire transport.
pub struct AxumSink(SplitSink<WebSocket, WsMessage>);

#[async_trait]
impl FrameSink for AxumSink {
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

pub struct AxumStream(SplitStream<WebSocket>);

#[async_trait]
impl FrameStream for AxumStream {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>> {
        let item = self.0.next().await?;
        Some(match item {
            Ok(WsMessage::Text(text)) => Ok(Frame::Text(text)),
            Ok(WsMessage::Binary(bytes)) => Ok(Frame::Binary(bytes)),
            Ok(WsMessage::Ping(bytes)) => Ok(Frame::Ping(bytes)),
            Ok(WsMessage::Pong(bytes)) => Ok(Frame::Pong(bytes)),
            Ok(WsMessage::Close(_)) => Ok(Frame::Close),
            Err(e) => Err(TransportError(e.to_string())),
        })
    }
}

/// Upgrade handler for `/ws`.
pub async fn ws_handler(State(ctx): State<Arc<AppCtx>>, ws: WebSocketUpgrade) -> Response {
    // The serving protocol is decided at startup (TLS listener or not).
    let protocol = if ctx.tls { "wss" } else { "ws" };
    ws.max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            let conn = Connection::spawn(AxumSink(sink), AxumStream(stream), protocol);
            ingress_loop(conn, ctx).await;
        })
}

/// Read decoded frames until the connection dies, dispatching by type.
///
/// On exit the agent (if one registered here) is unregistered — but only if
/// this socket is still its live connection — and any log subscriptions held
/// by the socket are dropped.
pub async fn ingress_loop(conn: Arc<Connection>, ctx: Arc<AppCtx>) {
    let mut registered: Option<String> = None;

    while let Some(msg) = conn.read().await {
        route_message(&ctx, &conn, msg, &mut registered);
    }

    conn.close();
    if let Some(agent_id) = registered {
        ctx.registry.unregister_connection(&agent_id, &conn);
    }
    ctx.tasks.drop_subscriber(&conn);
}

fn route_message(
    ctx: &Arc<AppCtx>,
    conn: &Arc<Connection>,
    msg: Message,
    registered: &mut Option<String>,
) {
    match msg.msg_type {
        MessageType::AgentRegister => handle_register(ctx, conn, &msg, registered),
        MessageType::AgentHeartbeat => handle_heartbeat(ctx, &msg),
        MessageType::TaskLog => handle_task_log(ctx, msg),
        MessageType::TaskComplete => handle_task_complete(ctx, conn, &msg),
        MessageType::TaskSubscribeLogs => handle_subscribe(ctx, conn, &msg),
        other => {
            tracing::debug!(msg_type = %other, "unsupported inbound message");
            let _ = conn.write(Message::error(
                format!("unknown message type: {}", other),
                msg.request_id,
            ));
        }
    }
}

fn handle_register(
    ctx: &Arc<AppCtx>,
    conn: &Arc<Connection>,
    msg: &Message,
    registered: &mut Option<String>,
) {
    let data = match msg.parse_data::<fc_wire::RegisterData>() {
        Ok(data) => data,
        Err(e) => {
            let _ = conn.write(Message::error(e.to_string(), msg.request_id.clone()));
            return;
        }
    };

    match ctx
        .registry
        .register(Arc::clone(conn), &data, conn.protocol())
    {
        Ok(agent_id) => {
            *registered = Some(agent_id.clone());
            let ack = RegisterAck {
                status: "registered".to_string(),
                agent_id,
            };
            let mut reply = match Message::new(MessageType::AgentStatus, &ack) {
                Ok(reply) => reply,
                Err(e) => Message::error(e.to_string(), msg.request_id.clone()),
            };
            reply.request_id = msg.request_id.clone();
            let _ = conn.write(reply);
        }
        Err(e) => {
            let _ = conn.write(Message::error(e.to_string(), msg.request_id.clone()));
        }
    }
}

fn handle_heartbeat(ctx: &Arc<AppCtx>, msg: &Message) {
    let Ok(data) = msg.parse_data::<HeartbeatData>() else {
        return;
    };
    ctx.registry.heartbeat(&data.agent_id);
}

fn handle_task_log(ctx: &Arc<AppCtx>, msg: Message) {
    // The read pump stamps zero timestamps, so `timestamp` is receipt time
    // at worst by the time the payload is parsed.
    let mut data = match msg.parse_data::<TaskLogData>() {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "malformed task.log payload");
            return;
        }
    };
    if data.timestamp == 0 {
        data.timestamp = msg.timestamp;
    }
    if let Err(e) = ctx.tasks.save_log(&data) {
        tracing::warn!(task_id = %data.task_id, error = %e, "log persist failed");
    }
}

fn handle_task_complete(ctx: &Arc<AppCtx>, conn: &Arc<Connection>, msg: &Message) {
    let data = match msg.parse_data::<TaskCompleteData>() {
        Ok(data) => data,
        Err(e) => {
            let _ = conn.write(Message::error(e.to_string(), msg.request_id.clone()));
            return;
        }
    };
    if let Err(e) = ctx.tasks.complete_task(&data) {
        tracing::warn!(task_id = %data.task_id, error = %e, "completion persist failed");
    }
}

fn handle_subscribe(ctx: &Arc<AppCtx>, conn: &Arc<Connection>, msg: &Message) {
    let data = match msg.parse_data::<SubscribeLogsData>() {
        Ok(data) => data,
        Err(e) => {
            let _ = conn.write(Message::error(e.to_string(), msg.request_id.clone()));
            return;
        }
    };
    if data.task_id.is_empty() {
        let _ = conn.write(Message::error("task_id is required", msg.request_id.clone()));
        return;
    }

    // Ack first, then history, then live tail.
    let ack = SubscribeAck {
        task_id: data.task_id.clone(),
        status: "subscribed".to_string(),
    };
    if let Ok(mut reply) = Message::new(MessageType::TaskSubscribeLogs, &ack) {
        reply.request_id = msg.request_id.clone();
        let _ = conn.write(reply);
    }

    match ctx.tasks.subscribe_logs(&data.task_id, Arc::clone(conn)) {
        Ok(replayed) => {
            tracing::debug!(task_id = %data.task_id, replayed, "log subscriber attached");
        }
        Err(e) => {
            let _ = conn.write(Message::error(e.to_string(), msg.request_id.clone()));
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
