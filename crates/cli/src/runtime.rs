//! Wiring shared by every command: provider, tools, remote servers, agents.

use std::collections::HashMap;
use std::sync::Arc;

use clawflow_agent::{Agent, AgentBuilder, AgentStrategy};
use clawflow_config::{AppConfig, McpServerConfig, StrategyKind};
use clawflow_core::provider::Provider;
use clawflow_core::tool::SharedToolRegistry;
use clawflow_mcp::{RemoteToolRegistry, ServerId};
use clawflow_memory::BoundedMemory;
use clawflow_tools::{PlanHandle, default_registry};
use tracing::{info, warn};

pub struct Runtime {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub plans: PlanHandle,
    pub tools: SharedToolRegistry,
    pub remote: Arc<RemoteToolRegistry>,
}

impl Runtime {
    /// Load the config and build the configured provider.
    pub fn from_config(config: AppConfig) -> Self {
        let provider = clawflow_providers::build_from_config(&config.provider);
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: AppConfig, provider: Arc<dyn Provider>) -> Self {
        let plans = PlanHandle::spawn();
        let tools = default_registry(plans.clone()).into_shared();
        let remote = Arc::new(RemoteToolRegistry::new(tools.clone()));
        Self {
            config,
            provider,
            plans,
            tools,
            remote,
        }
    }

    /// Connect every configured server. Failures are logged and skipped so
    /// one broken server does not keep the others from loading.
    pub async fn connect_servers(&self) -> usize {
        let mut connected = 0;
        for (name, server) in &self.config.mcp.servers {
            let id = match ServerId::parse(name) {
                Ok(id) => id,
                Err(e) => {
                    warn!(server_id = %name, error = %e, "Skipping server");
                    continue;
                }
            };
            let result = match server {
                McpServerConfig::Stdio { command, args, env } => {
                    let env: HashMap<String, String> =
                        env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    self.remote.connect_stdio(id.clone(), command, args, &env).await
                }
                McpServerConfig::Sse { url } => self.remote.connect_sse(id.clone(), url).await,
            };
            match result {
                Ok(tools) => {
                    info!(server_id = %id, tools = tools.len(), "Server ready");
                    connected += 1;
                }
                Err(e) => warn!(server_id = %id, error = %e, "Failed to connect server"),
            }
        }
        connected
    }

    /// An agent configured from `[provider]` and `[agent]`. The remote
    /// registry is only attached when a server is actually connected.
    pub async fn agent_builder(&self, name: &str) -> AgentBuilder {
        let agent = &self.config.agent;
        let strategy = match agent.strategy {
            StrategyKind::ToolCalling => AgentStrategy::ToolCalling,
            StrategyKind::Summarizing => AgentStrategy::Summarizing,
        };
        let mut builder = Agent::builder(name, self.provider.clone())
            .model(self.config.provider.model.clone())
            .temperature(self.config.provider.temperature)
            .max_tokens(self.config.provider.max_tokens)
            .tools(self.tools.clone())
            .memory(Box::new(BoundedMemory::new(agent.memory_max_messages)))
            .tool_choice(agent.tool_choice)
            .max_steps(agent.max_steps)
            .duplicate_threshold(agent.duplicate_threshold)
            .max_observe(agent.max_observe)
            .strategy(strategy)
            .remote_refresh_interval(agent.remote_refresh_interval);
        if !self.remote.is_empty().await {
            builder = builder.remote(self.remote.clone());
        }
        builder
    }

    pub async fn shutdown(&self) {
        self.remote.disconnect_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawflow_agent::test_helpers::SequentialMockProvider;

    #[tokio::test]
    async fn agents_follow_config() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 7;
        config.agent.strategy = StrategyKind::Summarizing;
        let runtime =
            Runtime::with_provider(config, Arc::new(SequentialMockProvider::new(vec![])));

        let agent = runtime.agent_builder("tester").await.build();
        assert_eq!(agent.max_steps(), 7);
        assert_eq!(agent.strategy(), AgentStrategy::Summarizing);
        assert!(agent.remote().is_none());
        assert!(runtime.tools.read().await.contains("planning"));
    }

    #[tokio::test]
    async fn unreachable_url_servers_are_skipped() {
        let mut config = AppConfig::default();
        config.mcp.servers.insert(
            "web".into(),
            McpServerConfig::Sse {
                url: "http://localhost:9/sse".into(),
            },
        );
        let runtime =
            Runtime::with_provider(config, Arc::new(SequentialMockProvider::new(vec![])));
        assert_eq!(runtime.connect_servers().await, 0);
        assert!(runtime.remote.is_empty().await);
    }
}
