// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel-backed transports for driving a [`Connection`] in tests.

use crate::conn::{Connection, Frame, FrameSink, FrameStream, TransportError};
use crate::message::Message;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sink half writing frames into an unbounded channel.
pub struct ChanSink(pub mpsc::UnboundedSender<Frame>);

#[async_trait]
impl FrameSink for ChanSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.0
            .send(frame)
            .map_err(|_| TransportError("sink gone".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Stream half reading frames from an unbounded channel.
pub struct ChanStream(pub mpsc::UnboundedReceiver<Frame>);

#[async_trait]
impl FrameStream for ChanStream {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>> {
        self.0.recv().await.map(Ok)
    }
}

/// Handles to drive and observe a fabricated connection.
pub struct TestPeer {
    /// Frames the connection's write pump produced.
    pub sink_rx: mpsc::UnboundedReceiver<Frame>,
    /// Feed frames into the connection's read pump.
    pub stream_tx: mpsc::UnboundedSender<Frame>,
}

impl TestPeer {
    /// Next JSON message written by the connection, skipping keepalive.
    pub async fn next_message(&mut self) -> Message {
        loop {
            match tokio::time::timeout(Duration::from_secs(5), self.sink_rx.recv())
                .await
                .expect("frame within deadline")
                .expect("transport open")
            {
                Frame::Text(text) => {
                    return serde_json::from_str(&text).expect("valid frame json")
                }
                _ => continue,
            }
        }
    }

    /// Inject an already-encoded message into the connection.
    pub fn push(&self, msg: &Message) {
        let text = serde_json::to_string(msg).expect("encodable message");
        self.stream_tx.send(Frame::Text(text)).expect("stream open");
    }
}

/// Build a connection whose transport both sides of a test can drive.
pub fn connection(protocol: &str) -> (Arc<Connection>, TestPeer) {
    let (sink_tx, sink_rx) = mpsc::unbounded_channel();
    let (stream_tx, stream_rx) = mpsc::unbounded_channel();
    let conn = Connection::spawn(ChanSink(sink_tx), ChanStream(stream_rx), protocol);
    (conn, TestPeer { sink_rx, stream_tx })
}
