// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for cloud ↔ agent communication.
//!
//! Frames are UTF-8 JSON messages over a full-duplex WebSocket channel.
//! Each side runs a [`Connection`] with two pumps: a read pump feeding a
//! bounded inbound queue and a write pump draining a bounded outbound queue
//! with protocol-level ping/pong keepalive.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod conn;
mod message;
mod payload;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use conn::{
    Connection, Frame, FrameSink, FrameStream, TransportError, WireError, MAX_FRAME_SIZE,
    PING_PERIOD, PONG_WAIT, QUEUE_CAPACITY, WRITE_WAIT,
};
pub use message::{Message, MessageType};
pub use payload::{
    FileDistributeData, HeartbeatData, RegisterAck, RegisterData, SubscribeAck, SubscribeLogsData,
    TaskCancelData, TaskCompleteData, TaskCreateData, TaskLogData,
};
