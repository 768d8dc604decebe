// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pumped full-duplex connection over a WebSocket transport.
//!
//! The transport is abstracted behind [`FrameSink`]/[`FrameStream`] so the
//! same connection drives server sockets on the cloud and client sockets on
//! the agent. Invariants:
//!
//! - one write pump owns the sink; one read pump owns the stream
//! - both queues are bounded at [`QUEUE_CAPACITY`]
//! - `write` never blocks: a full outbound queue drops the frame
//! - `close` is one-shot; the cancellation token wakes the peer pump

use crate::message::Message;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Deadline for a single transport write.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Read deadline; rearmed by any inbound traffic (pongs included).
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping interval: 9/10 of the pong wait so pings land before the deadline.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Frames larger than this terminate the connection.
pub const MAX_FRAME_SIZE: usize = 512 * 1024;

/// Capacity of the inbound and outbound queues.
pub const QUEUE_CAPACITY: usize = 256;

/// Errors surfaced by [`Connection`] operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    /// The sentinel: the connection is closed, or the frame was dropped
    /// because the outbound queue was full.
    #[error("connection closed")]
    Closed,
}

/// Error from the underlying transport.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// One WebSocket frame as seen by the pumps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Write half of a transport.
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a transport. `None` means the peer is gone.
#[async_trait]
pub trait FrameStream: Send + 'static {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>>;
}

struct Shared {
    cancel: CancellationToken,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// A live framed connection with read/write pumps.
pub struct Connection {
    outbound: mpsc::Sender<Message>,
    inbound: tokio::sync::Mutex<mpsc::Receiver<Message>>,
    shared: Arc<Shared>,
    protocol: String,
}

impl Connection {
    /// Spawn the pumps over a transport and return the connection handle.
    ///
    /// `protocol` is recorded at upgrade time (`ws` or `wss`).
    pub fn spawn<S, R>(sink: S, stream: R, protocol: &str) -> Arc<Self>
    where
        S: FrameSink,
        R: FrameStream,
    {
        let (out_tx, out_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(QUEUE_CAPACITY);
        let shared = Arc::new(Shared {
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        });

        tokio::spawn(write_pump(sink, out_rx, Arc::clone(&shared)));
        tokio::spawn(read_pump(stream, in_tx, Arc::clone(&shared)));

        Arc::new(Self {
            outbound: out_tx,
            inbound: tokio::sync::Mutex::new(in_rx),
            shared,
            protocol: protocol.to_string(),
        })
    }

    /// Enqueue a message for the write pump. Never blocks.
    ///
    /// Returns [`WireError::Closed`] when the connection is closed, and also
    /// when the outbound queue is full — the frame is dropped rather than
    /// stalling the producer. The durable store, not this queue, is the
    /// source of truth for logs.
    pub fn write(&self, msg: Message) -> Result<(), WireError> {
        if self.is_closed() {
            return Err(WireError::Closed);
        }
        match self.outbound.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                Err(WireError::Closed)
            }
            Err(TrySendError::Closed(_)) => {
                self.shared.closed.store(true, Ordering::SeqCst);
                Err(WireError::Closed)
            }
        }
    }

    /// Receive the next inbound message. `None` means end-of-stream.
    pub async fn read(&self) -> Option<Message> {
        self.inbound.lock().await.recv().await
    }

    /// Close the connection. Idempotent: the first call releases resources,
    /// later calls are no-ops.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Connection protocol recorded at upgrade time (`ws` or `wss`).
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Frames dropped by `write` due to a full outbound queue.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Completes when the connection is closed.
    pub async fn closed(&self) {
        self.shared.cancel.cancelled().await;
    }

    /// Identity for subscriber bookkeeping: two handles are the same
    /// connection iff they share pump state.
    pub fn same_as(self: &Arc<Self>, other: &Arc<Self>) -> bool {
        Arc::ptr_eq(self, other)
    }
}

async fn write_pump<S: FrameSink>(mut sink: S, mut rx: mpsc::Receiver<Message>, shared: Arc<Shared>) {
    let start = tokio::time::Instant::now() + PING_PERIOD;
    let mut ping = tokio::time::interval_at(start, PING_PERIOD);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "unserializable outbound frame dropped");
                        continue;
                    }
                };
                match tokio::time::timeout(WRITE_WAIT, sink.send(Frame::Text(text))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "write pump: transport error");
                        break;
                    }
                    Err(_) => {
                        tracing::debug!("write pump: write deadline exceeded");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match tokio::time::timeout(WRITE_WAIT, sink.send(Frame::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }

    let _ = tokio::time::timeout(WRITE_WAIT, sink.send(Frame::Close)).await;
    let _ = sink.close().await;
    shared.closed.store(true, Ordering::SeqCst);
    shared.cancel.cancel();
}

async fn read_pump<R: FrameStream>(mut stream: R, tx: mpsc::Sender<Message>, shared: Arc<Shared>) {
    loop {
        let frame = tokio::select! {
            _ = shared.cancel.cancelled() => break,
            res = tokio::time::timeout(PONG_WAIT, stream.next()) => match res {
                // No traffic within the pong wait: the peer is gone.
                Err(_) => {
                    tracing::debug!("read pump: read deadline exceeded");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!(error = %e, "read pump: transport error");
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            }
        };

        match frame {
            Frame::Text(text) => {
                if text.len() > MAX_FRAME_SIZE {
                    tracing::warn!(size = text.len(), "oversized frame; closing connection");
                    break;
                }
                let mut msg: Message = match serde_json::from_str(&text) {
                    Ok(msg) => msg,
                    // Parse errors drop the frame, not the connection.
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping unparsable frame");
                        continue;
                    }
                };
                if msg.timestamp == 0 {
                    msg.timestamp = fc_core::epoch_secs_now();
                }
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    res = tx.send(msg) => {
                        if res.is_err() {
                            break;
                        }
                    }
                }
            }
            // Keepalive traffic rearms the read deadline by reaching the
            // next loop iteration; pongs need no reply, pings are answered
            // by the transport layer.
            Frame::Ping(_) | Frame::Pong(_) => {}
            Frame::Binary(_) => {
                tracing::debug!("ignoring binary frame on JSON channel");
            }
            Frame::Close => break,
        }
    }

    shared.closed.store(true, Ordering::SeqCst);
    shared.cancel.cancel();
    // Dropping tx delivers end-of-stream to pending readers.
}

#[cfg(test)]
#[path = "conn_tests.rs"]
mod tests;
