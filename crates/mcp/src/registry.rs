//! Multi-server remote tool registry.
//!
//! Each connected server keeps one session and a cache of its tools' input
//! schemas. Proxies for those tools live in a shared [`ToolRegistry`] under
//! namespaced names, next to whatever local tools the registry already holds.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use clawflow_core::tool::SharedToolRegistry;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{McpError, McpResult};
use crate::proxy::RemoteTool;
use crate::server_id::ServerId;
use crate::session::{RemoteSession, RemoteToolSpec};

/// Capability drift found by a refresh. Names are namespaced and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolDrift {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl ToolDrift {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn merge(&mut self, other: ToolDrift) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.changed.extend(other.changed);
        self.added.sort();
        self.removed.sort();
        self.changed.sort();
    }

    /// Human-readable notices, one per non-empty category.
    pub fn notices(&self) -> Vec<String> {
        let mut notices = Vec::new();
        if !self.added.is_empty() {
            notices.push(format!("New tools available: {}", self.added.join(", ")));
        }
        if !self.removed.is_empty() {
            notices.push(format!("Tools no longer available: {}", self.removed.join(", ")));
        }
        if !self.changed.is_empty() {
            notices.push(format!("Tool schemas changed: {}", self.changed.join(", ")));
        }
        notices
    }
}

struct ServerEntry {
    session: Arc<dyn RemoteSession>,
    /// Original tool name -> input schema for the tools this server
    /// registered. Names that collided with another tool are left out.
    schemas: BTreeMap<String, serde_json::Value>,
}

pub struct RemoteToolRegistry {
    tools: SharedToolRegistry,
    servers: Mutex<HashMap<ServerId, ServerEntry>>,
}

impl RemoteToolRegistry {
    /// Manage remote proxies inside `tools`.
    pub fn new(tools: SharedToolRegistry) -> Self {
        Self {
            tools,
            servers: Mutex::new(HashMap::new()),
        }
    }

    pub fn tools(&self) -> &SharedToolRegistry {
        &self.tools
    }

    /// Register `session` under `id`, replacing any previous session with that id.
    pub async fn connect_session(
        &self,
        id: ServerId,
        session: Arc<dyn RemoteSession>,
    ) -> McpResult<Vec<String>> {
        self.disconnect(&id).await;

        let specs = session.list_tools().await?;
        let mut entry = ServerEntry {
            session,
            schemas: BTreeMap::new(),
        };
        let drift = self.reconcile(&id, &mut entry, specs).await;
        info!(server_id = %id, tools = ?drift.added, "Remote server connected");
        self.servers.lock().await.insert(id, entry);
        Ok(drift.added)
    }

    /// Spawn a server process and connect to it over stdio.
    #[cfg(feature = "mcp")]
    pub async fn connect_stdio(
        &self,
        id: ServerId,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> McpResult<Vec<String>> {
        let session = crate::rmcp_session::McpSession::spawn_stdio(command, args, env).await?;
        self.connect_session(id, Arc::new(session)).await
    }

    /// Connect to a server at an HTTP URL. The session speaks streamable
    /// HTTP, which servers configured as `sse` endpoints also answer.
    #[cfg(feature = "mcp")]
    pub async fn connect_sse(&self, id: ServerId, url: &str) -> McpResult<Vec<String>> {
        info!(server_id = %id, url, "Connecting to remote server over HTTP");
        let session = crate::rmcp_session::McpSession::connect_url(url).await?;
        self.connect_session(id, Arc::new(session)).await
    }

    #[cfg(not(feature = "mcp"))]
    pub async fn connect_sse(&self, id: ServerId, url: &str) -> McpResult<Vec<String>> {
        warn!(server_id = %id, url, "Built without the mcp feature");
        Err(McpError::UnsupportedTransport {
            transport: "sse".into(),
            detail: format!("cannot reach {url} without the mcp feature"),
        })
    }

    /// Re-list one server's tools and reconcile the registry against them.
    pub async fn refresh(&self, id: &ServerId) -> McpResult<ToolDrift> {
        let mut servers = self.servers.lock().await;
        let entry = servers
            .get_mut(id)
            .ok_or_else(|| McpError::ServerNotFound { id: id.to_string() })?;
        let specs = entry.session.list_tools().await?;
        Ok(self.reconcile(id, entry, specs).await)
    }

    /// Refresh every server. A server whose listing fails is treated as
    /// having lost its session: all of its tools are reported removed.
    pub async fn refresh_all(&self) -> ToolDrift {
        let mut servers = self.servers.lock().await;
        let mut drift = ToolDrift::default();
        for (id, entry) in servers.iter_mut() {
            let specs = match entry.session.list_tools().await {
                Ok(specs) => specs,
                Err(e) => {
                    warn!(server_id = %id, error = %e, "Listing remote tools failed, treating session as lost");
                    Vec::new()
                }
            };
            drift.merge(self.reconcile(id, entry, specs).await);
        }
        drift
    }

    async fn reconcile(
        &self,
        id: &ServerId,
        entry: &mut ServerEntry,
        specs: Vec<RemoteToolSpec>,
    ) -> ToolDrift {
        let current: BTreeMap<String, RemoteToolSpec> =
            specs.into_iter().map(|s| (s.name.clone(), s)).collect();
        let mut drift = ToolDrift::default();
        let mut registry = self.tools.write().await;

        for name in entry.schemas.keys() {
            if !current.contains_key(name) {
                let qualified = id.qualify(name);
                registry.unregister(&qualified);
                drift.removed.push(qualified);
            }
        }
        let mut owned = BTreeMap::new();
        for (name, spec) in current {
            let qualified = id.qualify(&name);
            match entry.schemas.get(&name) {
                None if registry.contains(&qualified) => {
                    warn!(server_id = %id, tool = %qualified, "Remote tool name already taken, skipping");
                    continue;
                }
                None => drift.added.push(qualified),
                Some(old) if *old != spec.input_schema => drift.changed.push(qualified),
                Some(_) => {
                    owned.insert(name, spec.input_schema);
                    continue;
                }
            }
            registry.register(Arc::new(RemoteTool::new(id, &spec, &entry.session)));
            owned.insert(name, spec.input_schema);
        }
        entry.schemas = owned;

        if !drift.added.is_empty() {
            info!(server_id = %id, tools = ?drift.added, "Remote tools added");
        }
        if !drift.removed.is_empty() {
            info!(server_id = %id, tools = ?drift.removed, "Remote tools removed");
        }
        if !drift.changed.is_empty() {
            info!(server_id = %id, tools = ?drift.changed, "Remote tool schemas changed");
        }
        drift
    }

    /// Close one server's session and drop only its tools.
    pub async fn disconnect(&self, id: &ServerId) -> bool {
        let Some(entry) = self.servers.lock().await.remove(id) else {
            return false;
        };
        if let Err(e) = entry.session.close().await {
            warn!(server_id = %id, error = %e, "Error while closing remote session");
        }
        let mut registry = self.tools.write().await;
        for name in entry.schemas.keys() {
            registry.unregister(&id.qualify(name));
        }
        info!(server_id = %id, "Remote server disconnected");
        true
    }

    pub async fn disconnect_all(&self) {
        for id in self.server_ids().await {
            self.disconnect(&id).await;
        }
    }

    pub async fn server_ids(&self) -> Vec<ServerId> {
        let mut ids: Vec<ServerId> = self.servers.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Namespaced names of every remote tool currently registered.
    pub async fn remote_tool_names(&self) -> Vec<String> {
        let servers = self.servers.lock().await;
        let mut names: Vec<String> = servers
            .iter()
            .flat_map(|(id, entry)| entry.schemas.keys().map(move |name| id.qualify(name)))
            .collect();
        names.sort();
        names
    }

    /// True when no remote tools are registered, whether or not any server is connected.
    pub async fn is_empty(&self) -> bool {
        self.servers
            .lock()
            .await
            .values()
            .all(|entry| entry.schemas.is_empty())
    }
}
