use std::sync::Arc;

use clawflow_core::agent::AgentState;
use clawflow_core::memory::Memory;
use clawflow_core::provider::{Provider, ToolChoice};
use clawflow_core::tool::{SharedToolRegistry, ToolRegistry};
use clawflow_mcp::RemoteToolRegistry;
use clawflow_memory::BoundedMemory;
use clawflow_tools::{TERMINATE_TOOL_NAME, TerminateTool};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::agent::{Agent, AgentStrategy};
use crate::prompts::{
    REMOTE_SYSTEM_PROMPT, SUMMARY_NEXT_STEP_PROMPT, SUMMARY_SYSTEM_PROMPT,
    TOOL_CALLING_NEXT_STEP_PROMPT, TOOL_CALLING_SYSTEM_PROMPT,
};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_STEPS: usize = 30;
pub const DEFAULT_DUPLICATE_THRESHOLD: usize = 2;
pub const DEFAULT_REMOTE_REFRESH_INTERVAL: usize = 5;

/// Builder for [`Agent`].
///
/// Prompts left unset fall back to the strategy's defaults; set a prompt to
/// an empty string to disable it. Without an explicit registry the agent
/// gets one holding only `terminate`, or the remote registry's tools when
/// one is attached.
pub struct AgentBuilder {
    name: String,
    description: String,
    system_prompt: Option<String>,
    next_step_prompt: Option<String>,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Option<SharedToolRegistry>,
    memory: Option<Box<dyn Memory>>,
    tool_choice: ToolChoice,
    max_steps: usize,
    duplicate_threshold: usize,
    max_observe: Option<usize>,
    special_tools: Vec<String>,
    strategy: AgentStrategy,
    remote: Option<Arc<RemoteToolRegistry>>,
    remote_refresh_interval: usize,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: None,
            next_step_prompt: None,
            provider,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: None,
            tools: None,
            memory: None,
            tool_choice: ToolChoice::Auto,
            max_steps: DEFAULT_MAX_STEPS,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            max_observe: None,
            special_tools: vec![TERMINATE_TOOL_NAME.to_string()],
            strategy: AgentStrategy::ToolCalling,
            remote: None,
            remote_refresh_interval: DEFAULT_REMOTE_REFRESH_INTERVAL,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn tools(mut self, tools: SharedToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn memory(mut self, memory: Box<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Clamped to at least 1.
    pub fn duplicate_threshold(mut self, threshold: usize) -> Self {
        self.duplicate_threshold = threshold.max(1);
        self
    }

    pub fn max_observe(mut self, max_observe: Option<usize>) -> Self {
        self.max_observe = max_observe;
        self
    }

    /// Tools that finish the agent once the step calling them completes.
    pub fn special_tools(mut self, names: Vec<String>) -> Self {
        self.special_tools = names;
        self
    }

    pub fn strategy(mut self, strategy: AgentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn remote(mut self, remote: Arc<RemoteToolRegistry>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Steps between remote refreshes; 0 refreshes only on the first step.
    pub fn remote_refresh_interval(mut self, interval: usize) -> Self {
        self.remote_refresh_interval = interval;
        self
    }

    pub fn build(self) -> Agent {
        let (default_system, default_next) = match self.strategy {
            AgentStrategy::Summarizing => (SUMMARY_SYSTEM_PROMPT, SUMMARY_NEXT_STEP_PROMPT),
            AgentStrategy::ToolCalling if self.remote.is_some() => {
                (REMOTE_SYSTEM_PROMPT, TOOL_CALLING_NEXT_STEP_PROMPT)
            }
            AgentStrategy::ToolCalling => {
                (TOOL_CALLING_SYSTEM_PROMPT, TOOL_CALLING_NEXT_STEP_PROMPT)
            }
        };
        let prompt = |set: Option<String>, default: &str| {
            Some(set.unwrap_or_else(|| default.to_string())).filter(|p| !p.is_empty())
        };

        let tools = match (self.tools, &self.remote) {
            (Some(tools), Some(remote)) => {
                if !Arc::ptr_eq(&tools, remote.tools()) {
                    warn!(agent = %self.name, "Remote tools live in a different registry than the agent's");
                }
                tools
            }
            (Some(tools), None) => tools,
            (None, Some(remote)) => remote.tools().clone(),
            (None, None) => {
                let mut registry = ToolRegistry::new();
                registry.register(Arc::new(TerminateTool));
                registry.into_shared()
            }
        };

        Agent {
            name: self.name,
            description: self.description,
            system_prompt: prompt(self.system_prompt, default_system),
            next_step_prompt: prompt(self.next_step_prompt, default_next),
            provider: self.provider,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
            memory: self
                .memory
                .unwrap_or_else(|| Box::new(BoundedMemory::default())),
            tool_choice: self.tool_choice,
            max_steps: self.max_steps,
            duplicate_threshold: self.duplicate_threshold,
            max_observe: self.max_observe,
            special_tools: self.special_tools,
            strategy: self.strategy,
            remote: self.remote,
            remote_refresh_interval: self.remote_refresh_interval,
            state: AgentState::Idle,
            current_step: 0,
            request: String::new(),
            pending_calls: Vec::new(),
            finish_requested: false,
            cancel: CancellationToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;

    fn provider() -> Arc<dyn Provider> {
        Arc::new(SequentialMockProvider::new(vec![]))
    }

    #[tokio::test]
    async fn defaults() {
        let agent = AgentBuilder::new("agent", provider()).build();
        assert_eq!(agent.state(), AgentState::Idle);
        assert_eq!(agent.max_steps(), DEFAULT_MAX_STEPS);
        assert_eq!(agent.strategy(), AgentStrategy::ToolCalling);
        assert_eq!(agent.next_step_prompt(), Some(TOOL_CALLING_NEXT_STEP_PROMPT));
        assert_eq!(agent.tools().read().await.names(), vec!["terminate"]);
        assert!(agent.memory().is_empty());
    }

    #[test]
    fn summarizing_uses_summary_prompts_and_empty_disables() {
        let agent = AgentBuilder::new("agent", provider())
            .strategy(AgentStrategy::Summarizing)
            .build();
        assert_eq!(agent.system_prompt.as_deref(), Some(SUMMARY_SYSTEM_PROMPT));
        assert_eq!(agent.next_step_prompt(), Some(SUMMARY_NEXT_STEP_PROMPT));

        let agent = AgentBuilder::new("agent", provider())
            .system_prompt("")
            .next_step_prompt("")
            .duplicate_threshold(0)
            .build();
        assert!(agent.system_prompt.is_none());
        assert!(agent.next_step_prompt().is_none());
        assert_eq!(agent.duplicate_threshold, 1);
    }

    #[test]
    fn remote_registry_supplies_tools() {
        let shared = ToolRegistry::new().into_shared();
        let remote = Arc::new(RemoteToolRegistry::new(shared.clone()));
        let agent = AgentBuilder::new("agent", provider()).remote(remote).build();
        assert!(Arc::ptr_eq(agent.tools(), &shared));
        assert_eq!(agent.system_prompt.as_deref(), Some(REMOTE_SYSTEM_PROMPT));
    }
}
