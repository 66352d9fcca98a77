//! The agent state machine and its ReAct step loop.
//!
//! One step is `think` (ask the model, record its answer) followed by `act`
//! (run the requested tools) when the answer warrants action. The loop runs
//! until the step budget is spent or a special tool finishes the agent.
//!
//! ```text
//! IDLE ──run──▶ RUNNING ──budget spent / cancelled──▶ IDLE
//!                  │ ──special tool / token limit──▶ FINISHED
//!                  └ ──step failure──────────────────▶ ERROR
//! ```

use std::sync::Arc;

use clawflow_core::agent::{AgentResult, AgentResultStream, AgentState};
use clawflow_core::memory::Memory;
use clawflow_core::message::{Message, MessageToolCall, Role};
use clawflow_core::provider::{Provider, ProviderRequest, ToolChoice};
use clawflow_core::stream::{RUN_BUFFER, RunEvent, StepEvent, emit_single, open_phase};
use clawflow_core::tool::SharedToolRegistry;
use clawflow_mcp::{RemoteSession, RemoteToolRegistry, ServerId};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::builder::AgentBuilder;
use crate::chat::{self, ChatOutput};
use crate::dispatch::{self, NO_TOOL_CALLS};
use crate::error::AgentError;
use crate::prompts::{STUCK_PROMPT, summarize_prompt};

/// An agent shared between a caller and its streaming runs.
pub type SharedAgent = Arc<Mutex<Agent>>;

pub const REMOTE_SHUTDOWN_NOTICE: &str = "Remote service has shut down; ending the interaction.";

/// How an agent turns its step trace into the run's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgentStrategy {
    /// The per-step results are the output.
    #[default]
    ToolCalling,
    /// One extra chat call after the loop writes the user-facing answer.
    Summarizing,
}

/// Handle to a streaming run.
#[derive(Debug)]
pub struct RunStream {
    pub events: mpsc::Receiver<RunEvent>,
    /// Cancels the run at its next suspension point.
    pub cancel: CancellationToken,
}

/// What `think` decided.
#[derive(Debug)]
struct Thought {
    thinking: String,
    content: String,
    should_act: bool,
}

pub struct Agent {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) system_prompt: Option<String>,
    pub(crate) next_step_prompt: Option<String>,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) model: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) tools: SharedToolRegistry,
    pub(crate) memory: Box<dyn Memory>,
    pub(crate) tool_choice: ToolChoice,
    pub(crate) max_steps: usize,
    pub(crate) duplicate_threshold: usize,
    pub(crate) max_observe: Option<usize>,
    pub(crate) special_tools: Vec<String>,
    pub(crate) strategy: AgentStrategy,
    pub(crate) remote: Option<Arc<RemoteToolRegistry>>,
    pub(crate) remote_refresh_interval: usize,
    pub(crate) state: AgentState,
    pub(crate) current_step: usize,
    pub(crate) request: String,
    pub(crate) pending_calls: Vec<MessageToolCall>,
    pub(crate) finish_requested: bool,
    pub(crate) cancel: CancellationToken,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("state", &self.state)
            .field("current_step", &self.current_step)
            .field("max_steps", &self.max_steps)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn builder(name: impl Into<String>, provider: Arc<dyn Provider>) -> AgentBuilder {
        AgentBuilder::new(name, provider)
    }

    pub fn into_shared(self) -> SharedAgent {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn strategy(&self) -> AgentStrategy {
        self.strategy
    }

    pub fn next_step_prompt(&self) -> Option<&str> {
        self.next_step_prompt.as_deref()
    }

    pub fn memory(&self) -> &dyn Memory {
        self.memory.as_ref()
    }

    pub fn memory_mut(&mut self) -> &mut dyn Memory {
        self.memory.as_mut()
    }

    pub fn tools(&self) -> &SharedToolRegistry {
        &self.tools
    }

    pub fn remote(&self) -> Option<&Arc<RemoteToolRegistry>> {
        self.remote.as_ref()
    }

    /// Token for the current (or next) run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Return to IDLE from any state, ready for another run. Memory is kept.
    pub fn reset(&mut self) {
        debug!(agent = %self.name, from = %self.state, "Resetting agent");
        self.state = AgentState::Idle;
        self.current_step = 0;
        self.pending_calls.clear();
        self.finish_requested = false;
        self.cancel = CancellationToken::new();
    }

    /// Disconnect every remote server attached to this agent.
    pub async fn cleanup(&mut self) {
        if let Some(remote) = &self.remote {
            remote.disconnect_all().await;
            info!(agent = %self.name, "Remote servers disconnected");
        }
    }

    /// Connect a remote server over stdio and tell the model about its tools.
    pub async fn connect_stdio(
        &mut self,
        server_id: &str,
        command: &str,
        args: &[String],
    ) -> Result<Vec<String>, AgentError> {
        let remote = self.require_remote()?;
        let id = ServerId::parse(server_id)?;
        let added = remote
            .connect_stdio(id.clone(), command, args, &Default::default())
            .await?;
        self.announce_connection(&id, &added);
        Ok(added)
    }

    /// Connect an already established remote session.
    pub async fn connect_session(
        &mut self,
        server_id: &str,
        session: Arc<dyn RemoteSession>,
    ) -> Result<Vec<String>, AgentError> {
        let remote = self.require_remote()?;
        let id = ServerId::parse(server_id)?;
        let added = remote.connect_session(id.clone(), session).await?;
        self.announce_connection(&id, &added);
        Ok(added)
    }

    fn require_remote(&self) -> Result<Arc<RemoteToolRegistry>, AgentError> {
        self.remote
            .clone()
            .ok_or_else(|| AgentError::Remote("no remote tool registry attached".into()))
    }

    fn announce_connection(&mut self, id: &ServerId, tools: &[String]) {
        self.ensure_system_prompt();
        self.memory.add(Message::system(format!(
            "Connected to remote server '{id}'. Available tools: {}",
            tools.join(", ")
        )));
    }

    /// True when the latest assistant text repeats at least
    /// `duplicate_threshold` earlier assistant messages verbatim.
    pub fn is_stuck(&self) -> bool {
        let texts: Vec<&str> = self
            .memory
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.as_str())
            .collect();
        let Some((last, earlier)) = texts.split_last() else {
            return false;
        };
        let duplicates = earlier.iter().filter(|text| *text == last).count();
        duplicates >= self.duplicate_threshold
    }

    fn handle_stuck(&mut self) {
        warn!(agent = %self.name, step = self.current_step, "Agent detected stuck state, adding corrective prompt");
        self.next_step_prompt = Some(match self.next_step_prompt.take() {
            Some(prompt) if prompt.starts_with(STUCK_PROMPT) => prompt,
            Some(prompt) if !prompt.is_empty() => format!("{STUCK_PROMPT}\n{prompt}"),
            _ => STUCK_PROMPT.to_string(),
        });
    }

    /// Run to completion and return the per-step results, or the single
    /// summary under [`AgentStrategy::Summarizing`].
    pub async fn run(&mut self, request: impl Into<String>) -> Result<Vec<AgentResult>, AgentError> {
        self.begin(request.into())?;

        let mut results = Vec::new();
        let outcome = loop {
            if self.current_step >= self.max_steps || self.state == AgentState::Finished {
                break Ok(());
            }
            if self.cancel.is_cancelled() {
                break Err(AgentError::Cancelled);
            }
            self.current_step += 1;
            info!(agent = %self.name, step = self.current_step, max_steps = self.max_steps, "Executing step");

            match self.step().await {
                Ok(result) => results.push(result),
                Err(e) => break Err(e),
            }
            self.after_step();
        };

        if let Err(e) = outcome {
            self.fail(&e);
            return Err(e);
        }
        if let Some(notice) = self.conclude() {
            results.push(notice);
        }
        if self.strategy == AgentStrategy::Summarizing {
            return Ok(vec![self.summarize().await]);
        }
        info!(agent = %self.name, steps = results.len(), state = %self.state, "Agent run finished");
        Ok(results)
    }

    /// Start a run in the background and return its event stream.
    ///
    /// Fails with [`AgentError::NotIdle`] without touching the agent when it
    /// is busy with another run or not IDLE.
    pub fn run_stream(agent: &SharedAgent, request: impl Into<String>) -> Result<RunStream, AgentError> {
        let mut guard = agent
            .clone()
            .try_lock_owned()
            .map_err(|_| AgentError::NotIdle {
                state: AgentState::Running,
            })?;
        guard.begin(request.into())?;

        let cancel = guard.cancel.clone();
        let (tx, rx) = mpsc::channel(RUN_BUFFER);
        tokio::spawn(async move {
            guard.drive_stream(tx).await;
        });
        Ok(RunStream { events: rx, cancel })
    }

    fn begin(&mut self, request: String) -> Result<(), AgentError> {
        if self.state != AgentState::Idle {
            return Err(AgentError::NotIdle { state: self.state });
        }
        if !request.is_empty() {
            self.memory.add(Message::user(request.clone()));
        }
        self.request = request;
        self.state = AgentState::Running;
        info!(agent = %self.name, model = %self.model, max_steps = self.max_steps, "Agent run started");
        Ok(())
    }

    fn after_step(&mut self) {
        if self.finish_requested {
            self.finish_requested = false;
            self.state = AgentState::Finished;
        }
        if self.is_stuck() {
            self.handle_stuck();
        }
    }

    /// Settle the state after the loop; returns the budget notice if the
    /// budget ran out.
    fn conclude(&mut self) -> Option<AgentResult> {
        if self.state == AgentState::Finished {
            info!(agent = %self.name, step = self.current_step, "Agent finished");
            return None;
        }
        warn!(agent = %self.name, max_steps = self.max_steps, "Step budget exhausted");
        self.current_step = 0;
        self.state = AgentState::Idle;
        Some(AgentResult::new(
            "",
            format!("Terminated: Reached max steps ({})", self.max_steps),
        ))
    }

    fn fail(&mut self, error: &AgentError) {
        match error {
            AgentError::Cancelled => {
                info!(agent = %self.name, step = self.current_step, "Agent run cancelled");
                self.current_step = 0;
                self.state = AgentState::Idle;
                self.pending_calls.clear();
                self.finish_requested = false;
                self.cancel = CancellationToken::new();
            }
            // The token-limit path already recorded its notice and finished.
            AgentError::TokenLimit(_) => self.state = AgentState::Finished,
            other => {
                warn!(agent = %self.name, error = %other, "Agent step failed");
                self.state = AgentState::Error;
            }
        }
    }

    async fn step(&mut self) -> Result<AgentResult, AgentError> {
        let thought = match self.prepare_request().await {
            Some(request) => {
                let output =
                    chat::complete(self.provider.as_ref(), request, &self.cancel.clone()).await;
                let output = self.check_token_limit(output)?;
                self.absorb(output)
            }
            None => Thought::remote_shutdown(),
        };
        let content = if thought.should_act {
            self.act().await
        } else {
            thought.content
        };
        Ok(AgentResult::new(thought.thinking, content))
    }

    /// Build the chat request for `think`, or `None` when there is nothing
    /// left to think about because every remote tool has gone away.
    async fn prepare_request(&mut self) -> Option<ProviderRequest> {
        if let Some(remote) = self.remote.clone() {
            let due = self.current_step == 1
                || (self.remote_refresh_interval > 0
                    && self.current_step % self.remote_refresh_interval == 0);
            if due {
                for notice in remote.refresh_all().await.notices() {
                    info!(agent = %self.name, %notice, "Remote tool drift");
                    self.memory.add(Message::system(notice));
                }
            }
            if remote.is_empty().await {
                info!(agent = %self.name, "Remote service has shut down, finishing");
                self.state = AgentState::Finished;
                return None;
            }
        }

        self.ensure_system_prompt();
        if let Some(prompt) = self.next_step_prompt.clone() {
            self.memory.add(Message::user(prompt));
        }

        let tools = self.tools.read().await.to_schema_list();
        Some(self.request_for(self.memory.messages().to_vec()).with_tools(tools, self.tool_choice))
    }

    fn ensure_system_prompt(&mut self) {
        if !self.memory.has_system() {
            if let Some(prompt) = self.system_prompt.clone() {
                self.memory.add_system(Message::system(prompt));
            }
        }
    }

    fn request_for(&self, messages: Vec<Message>) -> ProviderRequest {
        let mut request = ProviderRequest::new(self.model.clone(), messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    fn check_token_limit(
        &mut self,
        output: Result<ChatOutput, AgentError>,
    ) -> Result<ChatOutput, AgentError> {
        if let Err(AgentError::TokenLimit(detail)) = &output {
            warn!(agent = %self.name, %detail, "Token limit reached");
            self.memory.add(Message::assistant(format!(
                "Maximum token limit reached, cannot continue execution: {detail}"
            )));
            self.state = AgentState::Finished;
        }
        output
    }

    /// Record the model's answer and decide whether to act on it.
    fn absorb(&mut self, output: ChatOutput) -> Thought {
        let ChatOutput {
            thinking,
            content,
            tool_calls,
        } = output;
        if !thinking.is_empty() {
            debug!(agent = %self.name, %thinking, "Model thinking");
        }
        info!(agent = %self.name, tools = tool_calls.len(), "Model selected tools");

        let should_act = match self.tool_choice {
            ToolChoice::None => {
                if !tool_calls.is_empty() {
                    warn!(agent = %self.name, "Model requested tools while tool choice is none");
                }
                self.pending_calls.clear();
                if !content.is_empty() {
                    self.memory
                        .add(Message::assistant(content.clone()).with_sender(self.name.clone()));
                }
                false
            }
            choice => {
                let message = if tool_calls.is_empty() {
                    Message::assistant(content.clone())
                } else {
                    Message::assistant_with_tools(content.clone(), tool_calls.clone())
                };
                self.memory.add(message.with_sender(self.name.clone()));
                self.pending_calls = tool_calls;
                choice == ToolChoice::Required || !self.pending_calls.is_empty()
            }
        };

        Thought {
            thinking,
            content,
            should_act,
        }
    }

    /// Execute the pending calls in order and join their observations.
    async fn act(&mut self) -> String {
        let calls = std::mem::take(&mut self.pending_calls);
        if calls.is_empty() {
            return NO_TOOL_CALLS.to_string();
        }
        let mut observations = Vec::with_capacity(calls.len());
        for call in &calls {
            observations.push(self.execute_call(call).await);
        }
        observations.join("\n\n")
    }

    async fn execute_call(&mut self, call: &MessageToolCall) -> String {
        let outcome = dispatch::execute_tool(&self.tools, call, &self.special_tools).await;
        if outcome.finishes {
            self.finish_requested = true;
        }
        let observation = dispatch::truncate_observation(outcome.observation, self.max_observe);
        debug!(agent = %self.name, tool = %call.name, %observation, "Tool observation");
        self.memory.add(
            Message::tool_result(call.id.clone(), call.name.clone(), observation.clone())
                .with_attachment(outcome.attachment),
        );
        observation
    }

    async fn summarize(&mut self) -> AgentResult {
        let mut messages = self.memory.messages().to_vec();
        messages.push(Message::user(summarize_prompt(&self.request)));
        let request = self.request_for(messages);
        info!(agent = %self.name, "Generating conversation summary");
        match chat::complete(self.provider.as_ref(), request, &self.cancel.clone()).await {
            Ok(output) => AgentResult::new(output.thinking, output.content),
            Err(e) => {
                warn!(agent = %self.name, error = %e, "Summary generation failed");
                AgentResult::content(format!("Unable to generate summary: {e}"))
            }
        }
    }

    async fn drive_stream(&mut self, tx: mpsc::Sender<RunEvent>) {
        let outcome = loop {
            if self.current_step >= self.max_steps || self.state == AgentState::Finished {
                break Ok(());
            }
            if self.cancel.is_cancelled() {
                break Err(AgentError::Cancelled);
            }
            self.current_step += 1;
            info!(agent = %self.name, step = self.current_step, max_steps = self.max_steps, "Executing step");

            if let Err(e) = self.step_streaming(&tx).await {
                break Err(e);
            }
            self.after_step();
        };

        match outcome {
            Ok(()) => {
                if let Some(notice) = self.conclude() {
                    emit_single(&tx, AgentResultStream::content(notice.content)).await;
                }
                if self.strategy == AgentStrategy::Summarizing {
                    self.summarize_streaming(&tx).await;
                }
            }
            Err(AgentError::Cancelled) => {
                self.fail(&AgentError::Cancelled);
                emit_single(&tx, AgentResultStream::content("Cancelled")).await;
            }
            Err(e) => {
                emit_single(&tx, AgentResultStream::content(format!("Error: {e}"))).await;
                self.fail(&e);
            }
        }
        let _ = tx.send(RunEvent::RunDone).await;
        info!(agent = %self.name, state = %self.state, "Agent stream finished");
    }

    /// A step whose think and act phases are streamed onto `tx`.
    async fn step_streaming(&mut self, tx: &mpsc::Sender<RunEvent>) -> Result<(), AgentError> {
        let phase = self.open_or_cancel(tx).await?;
        let thought = match self.prepare_request().await {
            Some(request) => {
                let output =
                    chat::stream(self.provider.as_ref(), request, &self.cancel.clone(), &phase)
                        .await;
                self.check_token_limit(output).map(|output| self.absorb(output))
            }
            None => {
                let thought = Thought::remote_shutdown();
                let _ = phase
                    .send(StepEvent::Increment(AgentResultStream::content(
                        thought.content.clone(),
                    )))
                    .await;
                Ok(thought)
            }
        };
        let _ = phase.send(StepEvent::StepDone).await;
        if !thought?.should_act {
            return Ok(());
        }

        let phase = self.open_or_cancel(tx).await?;
        let calls = std::mem::take(&mut self.pending_calls);
        if calls.is_empty() {
            let _ = phase
                .send(StepEvent::Increment(AgentResultStream::content(NO_TOOL_CALLS)))
                .await;
        }
        for call in &calls {
            let observation = self.execute_call(call).await;
            let _ = phase
                .send(StepEvent::Increment(AgentResultStream::content(observation)))
                .await;
        }
        let _ = phase.send(StepEvent::StepDone).await;
        Ok(())
    }

    /// Open a phase; a consumer that went away cancels the run.
    async fn open_or_cancel(
        &mut self,
        tx: &mpsc::Sender<RunEvent>,
    ) -> Result<mpsc::Sender<StepEvent>, AgentError> {
        match open_phase(tx).await {
            Some(phase) => Ok(phase),
            None => {
                debug!(agent = %self.name, "Stream consumer dropped, cancelling run");
                self.cancel.cancel();
                Err(AgentError::Cancelled)
            }
        }
    }

    async fn summarize_streaming(&mut self, tx: &mpsc::Sender<RunEvent>) {
        let Some(phase) = open_phase(tx).await else {
            return;
        };
        let mut messages = self.memory.messages().to_vec();
        messages.push(Message::user(summarize_prompt(&self.request)));
        let request = self.request_for(messages);
        info!(agent = %self.name, "Streaming conversation summary");
        if let Err(e) =
            chat::stream(self.provider.as_ref(), request, &self.cancel.clone(), &phase).await
        {
            warn!(agent = %self.name, error = %e, "Summary generation failed");
            let _ = phase
                .send(StepEvent::Increment(AgentResultStream::content(format!(
                    "Unable to generate summary: {e}"
                ))))
                .await;
        }
        let _ = phase.send(StepEvent::StepDone).await;
    }
}

impl Thought {
    fn remote_shutdown() -> Self {
        Self {
            thinking: String::new(),
            content: REMOTE_SHUTDOWN_NOTICE.to_string(),
            should_act: false,
        }
    }
}
