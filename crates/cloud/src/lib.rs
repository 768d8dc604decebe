// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fc-cloud: the central dispatch service.
//!
//! Holds the agent registry and per-agent connections, creates and tracks
//! tasks, persists and fans out task logs, stores uploaded files, and serves
//! the `/ws` full-duplex endpoint plus the `/api/v1` REST surface.

pub mod files;
pub mod http;
pub mod registry;
pub mod server;
pub mod tasks;
pub mod ws;

pub use registry::{AgentRegistry, RegistryError};
pub use server::{AppCtx, ServerConfig};
pub use tasks::{DispatchError, TaskManager};
