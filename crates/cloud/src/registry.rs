// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: canonical identity, connection table, liveness.
//!
//! One reader-writer lock guards both maps. Send paths take the read lock
//! just long enough to fetch the connection and write outside it
//! (`Connection::write` is internally lock-safe and never blocks).

use fc_core::{canonical_agent_id, epoch_ms_now, AgentRecord, AgentStatus};
use fc_storage::{Store, StoreError};
use fc_wire::{Connection, Message, RegisterData};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("agent not connected: {0}")]
    NotConnected(String),

    #[error("agent connection closed: {0}")]
    ConnectionClosed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Default)]
struct Inner {
    /// agent id → live connection (at most one per id)
    connections: HashMap<String, Arc<Connection>>,
    /// agent id → in-memory record
    agents: HashMap<String, AgentRecord>,
}

/// Registry of known agents and their live connections.
pub struct AgentRegistry {
    store: Arc<Store>,
    inner: RwLock<Inner>,
}

impl AgentRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register an agent, returning its canonical id.
    ///
    /// The id is derived from `(env, hostname)`: an existing row wins,
    /// otherwise `env-hostname` (or bare hostname). A previous connection
    /// for the id is closed before the replacement is installed; the
    /// critical section serializes concurrent registrations so the later
    /// one wins.
    pub fn register(
        &self,
        conn: Arc<Connection>,
        data: &RegisterData,
        protocol: &str,
    ) -> Result<String, RegistryError> {
        let now = epoch_ms_now();
        let mut inner = self.inner.write();

        let agent = match self.store.get_agent_by_env_hostname(&data.env, &data.hostname)? {
            Some(mut agent) => {
                agent.name = data.name.clone();
                agent.hostname = data.hostname.clone();
                agent.ip = data.ip.clone();
                agent.version = data.version.clone();
                agent.env = data.env.clone();
                agent.protocol = protocol.to_string();
                agent.status = AgentStatus::Online;
                agent.last_seen_ms = Some(now);
                agent.metadata = data.metadata.clone();
                self.store.update_agent(&agent)?;
                agent
            }
            None => {
                let id = canonical_agent_id(&data.env, &data.hostname);
                let agent = AgentRecord {
                    id,
                    name: data.name.clone(),
                    hostname: data.hostname.clone(),
                    ip: data.ip.clone(),
                    version: data.version.clone(),
                    env: data.env.clone(),
                    protocol: protocol.to_string(),
                    status: AgentStatus::Online,
                    last_seen_ms: Some(now),
                    tags: Vec::new(),
                    metadata: data.metadata.clone(),
                    created_at_ms: now,
                    updated_at_ms: now,
                };
                self.store.create_agent(&agent)?;
                agent
            }
        };

        let agent_id = agent.id.clone();
        if let Some(old) = inner.connections.insert(agent_id.clone(), conn) {
            tracing::info!(%agent_id, "closing displaced connection");
            old.close();
        }
        inner.agents.insert(agent_id.clone(), agent);

        tracing::info!(%agent_id, protocol, "agent registered");
        Ok(agent_id)
    }

    /// Refresh last-seen on a heartbeat and flip the agent online.
    pub fn heartbeat(&self, agent_id: &str) {
        let now = epoch_ms_now();
        let mut inner = self.inner.write();
        if let Some(agent) = inner.agents.get_mut(agent_id) {
            agent.last_seen_ms = Some(now);
            agent.status = AgentStatus::Online;
            if let Err(e) = self.store.update_agent_status(agent_id, AgentStatus::Online) {
                tracing::warn!(%agent_id, error = %e, "heartbeat persist failed");
            }
        } else {
            tracing::debug!(%agent_id, "heartbeat from unregistered agent");
        }
    }

    /// Drop the agent's connection and mark it offline.
    pub fn unregister(&self, agent_id: &str) {
        let mut inner = self.inner.write();
        if let Some(conn) = inner.connections.remove(agent_id) {
            conn.close();
        }
        if let Some(agent) = inner.agents.get_mut(agent_id) {
            agent.status = AgentStatus::Offline;
        }
        inner.agents.remove(agent_id);
        drop(inner);
        if let Err(e) = self.store.update_agent_status(agent_id, AgentStatus::Offline) {
            tracing::warn!(%agent_id, error = %e, "offline persist failed");
        }
        tracing::info!(%agent_id, "agent unregistered");
    }

    /// Unregister only if `conn` is still the installed connection for the
    /// id. Used by the ingress loop on socket close so a replacement
    /// registration is never clobbered by its displaced predecessor.
    pub fn unregister_connection(&self, agent_id: &str, conn: &Arc<Connection>) {
        let is_current = {
            let inner = self.inner.read();
            inner
                .connections
                .get(agent_id)
                .map(|c| Arc::ptr_eq(c, conn))
                .unwrap_or(false)
        };
        if is_current {
            self.unregister(agent_id);
        }
    }

    /// Remove the agent everywhere: connection, memory, persistent store.
    pub fn delete(&self, agent_id: &str) -> Result<(), RegistryError> {
        {
            let mut inner = self.inner.write();
            if let Some(conn) = inner.connections.remove(agent_id) {
                conn.close();
            }
            inner.agents.remove(agent_id);
        }
        self.store.delete_agent(agent_id)?;
        tracing::info!(%agent_id, "agent deleted");
        Ok(())
    }

    pub fn get_connection(&self, agent_id: &str) -> Option<Arc<Connection>> {
        self.inner.read().connections.get(agent_id).cloned()
    }

    /// Live status as the dispatcher sees it.
    pub fn status(&self, agent_id: &str) -> AgentStatus {
        let inner = self.inner.read();
        match inner.agents.get(agent_id) {
            Some(agent) => agent.status,
            None => AgentStatus::Offline,
        }
    }

    /// Send a message to an agent. A closed connection unregisters the
    /// agent and reports it.
    pub fn send(&self, agent_id: &str, msg: Message) -> Result<(), RegistryError> {
        let conn = self
            .get_connection(agent_id)
            .ok_or_else(|| RegistryError::NotConnected(agent_id.to_string()))?;

        if conn.is_closed() {
            self.unregister(agent_id);
            return Err(RegistryError::ConnectionClosed(agent_id.to_string()));
        }

        conn.write(msg)
            .map_err(|_| RegistryError::ConnectionClosed(agent_id.to_string()))
    }

    /// Materialized snapshot with status computed from connection presence
    /// and the online window.
    pub fn list(&self) -> Result<Vec<AgentRecord>, RegistryError> {
        let mut agents = self.store.list_agents()?;
        let now = epoch_ms_now();
        let inner = self.inner.read();
        for agent in &mut agents {
            if agent.protocol.is_empty() {
                agent.protocol = "ws".to_string();
            }
            let connected = inner
                .connections
                .get(&agent.id)
                .map(|c| !c.is_closed())
                .unwrap_or(false);
            agent.status = if connected || agent.seen_recently(now) {
                AgentStatus::Online
            } else {
                AgentStatus::Offline
            };
        }
        Ok(agents)
    }

    /// Replace an agent's tags, persisting the change.
    pub fn update_tags(&self, agent_id: &str, tags: Vec<String>) -> Result<AgentRecord, RegistryError> {
        let mut inner = self.inner.write();
        let mut agent = match inner.agents.get(agent_id) {
            Some(agent) => agent.clone(),
            None => self.store.get_agent(agent_id)?,
        };
        agent.tags = tags;
        self.store.update_agent(&agent)?;
        inner.agents.insert(agent_id.to_string(), agent.clone());
        Ok(agent)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
