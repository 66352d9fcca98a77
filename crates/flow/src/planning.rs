//! The planning flow.

use std::sync::Arc;

use clawflow_agent::{Agent, AgentError, SharedAgent};
use clawflow_core::agent::{AgentResult, AgentResultStream, AgentState};
use clawflow_core::message::Message;
use clawflow_core::provider::{Provider, ProviderRequest, ToolChoice};
use clawflow_core::stream::{PHASE_BUFFER, RUN_BUFFER, StepEvent};
use clawflow_core::tool::Tool;
use clawflow_tools::{PLANNING_TOOL_NAME, PlanHandle, PlanStepStatus, PlanningTool};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::FlowError;
use crate::event::FlowEvent;

pub const DEFAULT_PLAN_STEPS: [&str; 3] = ["Analyze request", "Execute task", "Verify results"];

const PLANNER_SYSTEM_PROMPT: &str = "You are a planning assistant. Create a concise, actionable plan with clear steps. \
Focus on key milestones rather than detailed sub-steps. Optimize for clarity and efficiency.
Assign each step to a suitable agent by starting the step with [agent_name].";

const FINALIZE_SYSTEM_PROMPT: &str =
    "You are a planning assistant. Your task is to summarize the completed plan.";

const SUMMARY_FAILED: &str = "Plan completed. Error generating summary.";

/// Runs a request as a plan of steps, one executor agent per step.
///
/// Agents are kept in insertion order; the first one is the primary agent
/// unless [`with_primary`](Self::with_primary) says otherwise. Plans live in
/// the shared [`PlanHandle`], so executors holding the `planning` tool see
/// the same plan the flow drives.
#[derive(Clone)]
pub struct PlanningFlow {
    agents: Vec<(String, SharedAgent)>,
    provider: Arc<dyn Provider>,
    model: String,
    plans: PlanHandle,
    executor_keys: Vec<String>,
    primary_key: String,
    plan_id: String,
}

impl std::fmt::Debug for PlanningFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.agents.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("PlanningFlow")
            .field("agents", &keys)
            .field("model", &self.model)
            .field("executor_keys", &self.executor_keys)
            .field("primary_key", &self.primary_key)
            .field("plan_id", &self.plan_id)
            .finish_non_exhaustive()
    }
}

/// `[name] rest of step` → `name`.
fn step_agent_tag(step: &str) -> Option<&str> {
    let (tag, _) = step.trim_start().strip_prefix('[')?.split_once(']')?;
    let tag = tag.trim();
    (!tag.is_empty()).then_some(tag)
}

fn fallback_title(request: &str) -> String {
    let head: String = request.chars().take(50).collect();
    let ellipsis = if request.chars().count() > 50 { "..." } else { "" };
    format!("Plan for: {head}{ellipsis}")
}

fn summary_request(plan_text: &str) -> String {
    format!(
        "The plan has been completed. Here is the final plan status:\n\n{plan_text}\n\n\
         Please provide a summary of what was accomplished and any final thoughts."
    )
}

impl PlanningFlow {
    pub fn new(
        agents: Vec<(String, SharedAgent)>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        plans: PlanHandle,
    ) -> Result<Self, FlowError> {
        let primary_key = agents.first().map(|(k, _)| k.clone()).ok_or(FlowError::NoAgents)?;
        let executor_keys = agents.iter().map(|(k, _)| k.clone()).collect();
        Ok(Self {
            agents,
            provider,
            model: model.into(),
            plans,
            executor_keys,
            primary_key,
            plan_id: format!("plan_{}", chrono::Utc::now().timestamp()),
        })
    }

    /// Agents tried, in order, for steps without a usable `[agent]` tag.
    pub fn with_executor_keys(mut self, keys: Vec<String>) -> Self {
        self.executor_keys = keys;
        self
    }

    pub fn with_primary(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    pub fn with_plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = plan_id.into();
        self
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn plans(&self) -> &PlanHandle {
        &self.plans
    }

    fn find(&self, key: &str) -> Option<(&str, &SharedAgent)> {
        self.agents
            .iter()
            .find(|(k, _)| k == key)
            .map(|(k, a)| (k.as_str(), a))
    }

    fn primary(&self) -> (&str, &SharedAgent) {
        // `new` guarantees at least one agent.
        self.find(&self.primary_key)
            .unwrap_or_else(|| (self.agents[0].0.as_str(), &self.agents[0].1))
    }

    /// The step's tagged agent, else the first executor key present, else
    /// the primary agent.
    fn executor_for(&self, step: &str) -> (&str, &SharedAgent) {
        if let Some(tag) = step_agent_tag(step) {
            if let Some((k, a)) = self.agents.iter().find(|(k, _)| k.eq_ignore_ascii_case(tag)) {
                return (k.as_str(), a);
            }
            debug!(tag, "Step names an unknown agent");
        }
        self.executor_keys
            .iter()
            .find_map(|key| self.find(key))
            .unwrap_or_else(|| self.primary())
    }

    async fn plan_exists(&self) -> bool {
        self.plans.get(Some(self.plan_id.clone())).await.is_ok()
    }

    async fn plan_text(&self) -> String {
        match self.plans.get(Some(self.plan_id.clone())).await {
            Ok(plan) => plan.render(),
            Err(e) => {
                error!(plan_id = %self.plan_id, error = %e, "Failed to read plan");
                format!("Error: Plan ID {} not found", self.plan_id)
            }
        }
    }

    /// Create the plan for `request` unless this flow's plan already exists.
    async fn prepare_plan(&self, request: &str) -> Result<(), FlowError> {
        if !request.is_empty() && !self.plan_exists().await {
            self.create_initial_plan(request).await?;
        }
        if !self.plan_exists().await {
            error!(plan_id = %self.plan_id, "Plan not found after creation");
            return Err(FlowError::PlanCreation(format!(
                "plan {} was not created for: {request}",
                self.plan_id
            )));
        }
        Ok(())
    }

    async fn create_initial_plan(&self, request: &str) -> Result<(), FlowError> {
        info!(plan_id = %self.plan_id, "Creating initial plan");

        let mut roster = String::new();
        for (key, agent) in &self.agents {
            let description = agent.lock().await.description().to_string();
            roster.push_str(&format!("- {key}: {description}\n"));
        }
        let messages = vec![
            Message::system(format!("{PLANNER_SYSTEM_PROMPT}\nAvailable agents:\n{roster}")),
            Message::user(format!(
                "Create a reasonable plan with clear steps to accomplish the task: {request}"
            )),
        ];
        let tool = PlanningTool::new(self.plans.clone());
        let chat = ProviderRequest::new(self.model.clone(), messages)
            .with_tools(vec![tool.to_definition()], ToolChoice::Auto);

        match self.provider.complete(chat).await {
            Ok(response) => {
                for call in response
                    .message
                    .tool_calls
                    .iter()
                    .filter(|c| c.name == PLANNING_TOOL_NAME)
                {
                    let mut args: serde_json::Value = match serde_json::from_str(&call.arguments) {
                        Ok(args) => args,
                        Err(e) => {
                            error!(error = %e, arguments = %call.arguments, "Failed to parse planning arguments");
                            continue;
                        }
                    };
                    let Some(object) = args.as_object_mut() else {
                        continue;
                    };
                    object.insert("plan_id".into(), serde_json::json!(self.plan_id));

                    match tool.execute(args).await {
                        Ok(result) => {
                            info!(plan_id = %self.plan_id, "Plan created");
                            debug!(output = %result.output, "Planning tool output");
                        }
                        Err(e) => warn!(error = %e, "Planning tool rejected the plan"),
                    }
                    if self.plan_exists().await {
                        return Ok(());
                    }
                }
            }
            Err(e) => warn!(error = %e, "Plan creation request failed"),
        }

        warn!(plan_id = %self.plan_id, "Creating default plan");
        self.plans
            .create(
                self.plan_id.clone(),
                fallback_title(request),
                DEFAULT_PLAN_STEPS.iter().map(|s| s.to_string()).collect(),
            )
            .await?;
        Ok(())
    }

    async fn step_prompt(&self, index: usize, step: &str) -> String {
        let plan_text = self.plan_text().await;
        format!(
            "CURRENT PLAN STATUS:\n{plan_text}\n\n\
             YOUR CURRENT TASK:\n\
             You are now working on step {index}: \"{step}\"\n\n\
             Please execute this step using the appropriate tools. You only need to complete \
             the current step, not the whole plan. When you are done, provide a summary of \
             what you accomplished."
        )
    }

    async fn mark(&self, index: usize, status: PlanStepStatus, notes: Option<String>) {
        match self
            .plans
            .mark_step(Some(self.plan_id.clone()), index as i64, Some(status), notes)
            .await
        {
            Ok(_) => info!(plan_id = %self.plan_id, step = index, %status, "Marked plan step"),
            Err(e) => warn!(plan_id = %self.plan_id, step = index, error = %e, "Failed to update plan step"),
        }
    }

    async fn prepare_executor(executor: &SharedAgent) {
        let mut agent = executor.lock().await;
        if matches!(agent.state(), AgentState::Error | AgentState::Finished) {
            agent.reset();
        }
    }

    /// Run the whole flow and return every step result followed by the
    /// summary.
    pub async fn execute(&self, request: &str) -> Result<Vec<AgentResult>, FlowError> {
        self.prepare_plan(request).await?;

        let mut results = Vec::new();
        while let Some((index, step)) = self.plans.current_step(self.plan_id.clone()).await? {
            let (key, executor) = self.executor_for(&step);
            info!(plan_id = %self.plan_id, step = index, executor = %key, "Executing plan step");
            let prompt = self.step_prompt(index, &step).await;

            Self::prepare_executor(executor).await;
            let mut agent = executor.lock().await;
            match agent.run(prompt).await {
                Ok(step_results) => {
                    results.extend(step_results);
                    self.mark(index, PlanStepStatus::Completed, None).await;
                }
                Err(AgentError::Cancelled) => return Err(AgentError::Cancelled.into()),
                Err(e) => {
                    let text = format!("Error executing step {index}: {e}");
                    error!(plan_id = %self.plan_id, step = index, error = %e, "Plan step failed");
                    self.mark(index, PlanStepStatus::Blocked, Some(text.clone())).await;
                    results.push(AgentResult::content(text));
                }
            }

            if agent.state() == AgentState::Finished {
                info!(plan_id = %self.plan_id, executor = %key, "Executor finished, stopping flow");
                break;
            }
        }

        results.push(self.finalize().await);
        Ok(results)
    }

    /// Summarize the finished plan with the flow's model, falling back to
    /// the primary agent.
    async fn finalize(&self) -> AgentResult {
        let plan_text = self.plan_text().await;
        let chat = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(FINALIZE_SYSTEM_PROMPT),
                Message::user(summary_request(&plan_text)),
            ],
        );
        match self.provider.complete(chat).await {
            Ok(response) => {
                info!(plan_id = %self.plan_id, "Plan finalized");
                AgentResult::new(
                    response.thinking,
                    format!("Plan completed:\n\n{}", response.message.content),
                )
            }
            Err(e) => {
                error!(plan_id = %self.plan_id, error = %e, "Failed to summarize plan, asking the primary agent");
                let (key, primary) = self.primary();
                Self::prepare_executor(primary).await;
                let mut agent = primary.lock().await;
                match agent.run(summary_request(&plan_text)).await {
                    Ok(summary) => {
                        let text: Vec<&str> = summary.iter().map(|r| r.content.as_str()).collect();
                        AgentResult::content(format!("Plan completed:\n\n{}", text.join("\n")))
                    }
                    Err(e) => {
                        error!(agent = %key, error = %e, "Primary agent failed to summarize plan");
                        AgentResult::content(SUMMARY_FAILED)
                    }
                }
            }
        }
    }

    /// Run the flow in the background, streaming every phase.
    pub fn execute_stream(&self, request: impl Into<String>) -> mpsc::Receiver<FlowEvent> {
        let (tx, rx) = mpsc::channel(RUN_BUFFER);
        let flow = self.clone();
        let request = request.into();
        tokio::spawn(async move {
            flow.drive_stream(&request, &tx).await;
            let _ = tx.send(FlowEvent::FlowDone).await;
            info!(plan_id = %flow.plan_id, "Flow stream finished");
        });
        rx
    }

    async fn drive_stream(&self, request: &str, tx: &mpsc::Sender<FlowEvent>) {
        let created = self.prepare_plan(request).await;
        let creation_text = match &created {
            Ok(()) => self.plan_text().await,
            Err(e) => e.to_string(),
        };
        if !emit_phase(tx, AgentResultStream::content(creation_text)).await || created.is_err() {
            return;
        }

        loop {
            let (index, step) = match self.plans.current_step(self.plan_id.clone()).await {
                Ok(Some(current)) => current,
                Ok(None) => break,
                Err(e) => {
                    error!(plan_id = %self.plan_id, error = %e, "Failed to read current step");
                    break;
                }
            };
            let (key, executor) = self.executor_for(&step);
            info!(plan_id = %self.plan_id, step = index, executor = %key, "Streaming plan step");
            let prompt = self.step_prompt(index, &step).await;

            Self::prepare_executor(executor).await;
            let stream = match Agent::run_stream(executor, prompt) {
                Ok(stream) => stream,
                Err(e) => {
                    let text = format!("Error executing step {index}: {e}");
                    error!(plan_id = %self.plan_id, step = index, error = %e, "Plan step failed");
                    self.mark(index, PlanStepStatus::Blocked, Some(text.clone())).await;
                    if !emit_phase(tx, AgentResultStream::content(text)).await {
                        return;
                    }
                    continue;
                }
            };
            let cancel = stream.cancel.clone();
            let forwarded = tx
                .send(FlowEvent::Executor {
                    step_index: index,
                    events: stream.events,
                })
                .await;
            if forwarded.is_err() {
                cancel.cancel();
                return;
            }

            // The run holds the agent until it ends.
            let state = executor.lock().await.state();
            match state {
                AgentState::Error => {
                    let text = format!("Error executing step {index}: executor ended in {state}");
                    self.mark(index, PlanStepStatus::Blocked, Some(text)).await;
                }
                _ => self.mark(index, PlanStepStatus::Completed, None).await,
            }
            if state == AgentState::Finished {
                info!(plan_id = %self.plan_id, executor = %key, "Executor finished, stopping flow");
                break;
            }
        }

        let summary = self.finalize().await;
        emit_phase(tx, AgentResultStream {
            reasoning: summary.reasoning,
            content: summary.content,
            tool_calls: None,
        })
        .await;
    }
}

/// Emit a single-increment phase on the flow stream.
async fn emit_phase(tx: &mpsc::Sender<FlowEvent>, item: AgentResultStream) -> bool {
    let (phase_tx, phase_rx) = mpsc::channel(PHASE_BUFFER);
    if tx.send(FlowEvent::Phase(phase_rx)).await.is_err() {
        return false;
    }
    let _ = phase_tx.send(StepEvent::Increment(item)).await;
    phase_tx.send(StepEvent::StepDone).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DrainedFlowPhase, drain_flow};
    use clawflow_agent::test_helpers::{
        SequentialMockProvider, make_text_response, make_tool_call, make_tool_call_response,
    };
    use clawflow_core::error::ProviderError;
    use clawflow_core::tool::ToolRegistry;
    use clawflow_tools::TerminateTool;
    use serde_json::json;

    fn executor(name: &str, provider: Arc<SequentialMockProvider>) -> (String, SharedAgent) {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(TerminateTool));
        let agent = Agent::builder(name, provider)
            .description(format!("{name} agent"))
            .tools(tools.into_shared())
            .system_prompt("")
            .next_step_prompt("")
            .max_steps(1)
            .build();
        (name.to_string(), agent.into_shared())
    }

    fn create_plan_call(steps: &[&str]) -> clawflow_core::ProviderResponse {
        make_tool_call_response(
            vec![make_tool_call(
                "planning",
                json!({"command": "create", "plan_id": "ignored", "title": "Two steps", "steps": steps}),
            )],
            "",
        )
    }

    async fn statuses(flow: &PlanningFlow) -> Vec<PlanStepStatus> {
        flow.plans()
            .get(Some(flow.plan_id().to_string()))
            .await
            .unwrap()
            .step_statuses
    }

    #[tokio::test]
    async fn runs_every_step_then_finalizes_once() {
        let planner = Arc::new(SequentialMockProvider::new(vec![
            create_plan_call(&["Analyze", "Report"]),
            make_text_response("Everything went fine."),
        ]));
        let worker = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("analyzed"),
            make_text_response("reported"),
        ]));
        let flow = PlanningFlow::new(
            vec![executor("worker", worker.clone())],
            planner.clone(),
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap()
        .with_plan_id("plan_test");

        let results = flow.execute("analyze then report").await.unwrap();

        assert_eq!(
            results.last().unwrap().content,
            "Plan completed:\n\nEverything went fine."
        );
        assert_eq!(planner.call_count(), 2);
        assert_eq!(
            statuses(&flow).await,
            vec![PlanStepStatus::Completed, PlanStepStatus::Completed]
        );
        assert_eq!(flow.plans().current_step("plan_test").await.unwrap(), None);

        let requests = worker.requests();
        let first = &requests[0].messages.last().unwrap().content;
        assert!(first.contains("You are now working on step 0: \"Analyze\""));
        assert!(first.starts_with("CURRENT PLAN STATUS:\nPlan: Two steps (ID: plan_test)"));
        let second = &requests[1].messages.last().unwrap().content;
        assert!(second.contains("You are now working on step 1: \"Report\""));
    }

    #[tokio::test]
    async fn falls_back_to_default_plan() {
        let planner = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("I would rather not call tools"),
            make_text_response("done"),
        ]));
        let worker = Arc::new(SequentialMockProvider::repeating(make_text_response("ok")));
        let request = "x".repeat(60);
        let flow = PlanningFlow::new(
            vec![executor("worker", worker)],
            planner,
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap();

        flow.execute(&request).await.unwrap();
        let plan = flow.plans().get(Some(flow.plan_id().to_string())).await.unwrap();
        assert_eq!(plan.title, format!("Plan for: {}...", "x".repeat(50)));
        assert_eq!(plan.steps, DEFAULT_PLAN_STEPS.map(String::from).to_vec());
        assert!(plan.is_complete());
    }

    #[tokio::test]
    async fn failed_step_is_blocked_and_flow_continues() {
        let planner = Arc::new(SequentialMockProvider::new(vec![
            create_plan_call(&["Fetch", "Write"]),
            make_text_response("summary"),
        ]));
        let worker = Arc::new(SequentialMockProvider::from_results(vec![
            Err(ProviderError::Network("offline".into())),
            Ok(make_text_response("written")),
        ]));
        let flow = PlanningFlow::new(
            vec![executor("worker", worker)],
            planner,
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap();

        let results = flow.execute("fetch and write").await.unwrap();
        assert!(results[0].content.starts_with("Error executing step 0: "));
        assert_eq!(
            statuses(&flow).await,
            vec![PlanStepStatus::Blocked, PlanStepStatus::Completed]
        );
        let plan = flow.plans().get(Some(flow.plan_id().to_string())).await.unwrap();
        assert!(plan.step_notes[0].contains("offline"));
    }

    #[tokio::test]
    async fn finished_executor_stops_the_flow() {
        let planner = Arc::new(SequentialMockProvider::new(vec![
            create_plan_call(&["Only this", "Never reached"]),
            make_text_response("stopped early"),
        ]));
        let worker = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
            vec![make_tool_call("terminate", json!({"status": "success"}))],
            "",
        )]));
        let flow = PlanningFlow::new(
            vec![executor("worker", worker)],
            planner,
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap();

        let results = flow.execute("short").await.unwrap();
        assert_eq!(results.last().unwrap().content, "Plan completed:\n\nstopped early");
        assert_eq!(
            statuses(&flow).await,
            vec![PlanStepStatus::Completed, PlanStepStatus::NotStarted]
        );
    }

    #[tokio::test]
    async fn tagged_steps_pick_their_executor() {
        let planner = Arc::new(SequentialMockProvider::new(vec![
            create_plan_call(&["[Writer] Draft", "Review"]),
            make_text_response("done"),
        ]));
        let researcher = Arc::new(SequentialMockProvider::single_text("reviewed"));
        let writer = Arc::new(SequentialMockProvider::single_text("drafted"));
        let flow = PlanningFlow::new(
            vec![
                executor("researcher", researcher.clone()),
                executor("writer", writer.clone()),
            ],
            planner,
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap();

        flow.execute("write something").await.unwrap();
        assert_eq!(writer.call_count(), 1);
        assert_eq!(researcher.call_count(), 1);
        assert!(writer.requests()[0].messages.last().unwrap().content.contains("Draft"));
    }

    #[tokio::test]
    async fn summary_falls_back_to_primary_then_to_fixed_text() {
        let planner = Arc::new(SequentialMockProvider::from_results(vec![
            Ok(create_plan_call(&["One"])),
            Err(ProviderError::Timeout("60s".into())),
        ]));
        let worker = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("did one"),
            make_text_response("we did one thing"),
        ]));
        let flow = PlanningFlow::new(
            vec![executor("worker", worker)],
            planner,
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap();
        let results = flow.execute("one thing").await.unwrap();
        assert!(results
            .last()
            .unwrap()
            .content
            .starts_with("Plan completed:\n\nwe did one thing"));

        let planner = Arc::new(SequentialMockProvider::from_results(vec![
            Ok(create_plan_call(&["One"])),
            Err(ProviderError::Timeout("60s".into())),
        ]));
        let worker = Arc::new(SequentialMockProvider::from_results(vec![
            Ok(make_text_response("did one")),
            Err(ProviderError::Network("gone".into())),
        ]));
        let flow = PlanningFlow::new(
            vec![executor("worker", worker)],
            planner,
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap();
        let results = flow.execute("one thing").await.unwrap();
        assert_eq!(results.last().unwrap().content, SUMMARY_FAILED);
    }

    #[tokio::test]
    async fn existing_plan_is_reused_without_planning_call() {
        let plans = PlanHandle::spawn();
        plans
            .create("plan_existing", "Existing", vec!["Do it".into()])
            .await
            .unwrap();
        let planner = Arc::new(SequentialMockProvider::new(vec![make_text_response("done")]));
        let worker = Arc::new(SequentialMockProvider::single_text("did it"));
        let flow = PlanningFlow::new(vec![executor("worker", worker)], planner.clone(), "mock", plans)
            .unwrap()
            .with_plan_id("plan_existing");

        flow.execute("").await.unwrap();
        assert_eq!(planner.call_count(), 1);
        assert_eq!(statuses(&flow).await, vec![PlanStepStatus::Completed]);
    }

    #[tokio::test]
    async fn missing_plan_without_request_fails() {
        let planner = Arc::new(SequentialMockProvider::new(vec![]));
        let worker = Arc::new(SequentialMockProvider::new(vec![]));
        let flow = PlanningFlow::new(vec![executor("worker", worker)], planner, "mock", PlanHandle::spawn())
            .unwrap();
        assert!(matches!(flow.execute("").await, Err(FlowError::PlanCreation(_))));
    }

    #[tokio::test]
    async fn no_agents_is_an_error() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let err = PlanningFlow::new(vec![], provider, "mock", PlanHandle::spawn());
        assert!(matches!(err, Err(FlowError::NoAgents)));
    }

    #[test]
    fn tag_parsing() {
        assert_eq!(step_agent_tag("[writer] Draft"), Some("writer"));
        assert_eq!(step_agent_tag("  [ a ]x"), Some("a"));
        assert_eq!(step_agent_tag("[] nothing"), None);
        assert_eq!(step_agent_tag("plain"), None);
        assert_eq!(fallback_title("short"), "Plan for: short");
    }

    #[tokio::test]
    async fn streamed_flow_nests_three_levels() {
        let planner = Arc::new(SequentialMockProvider::new(vec![
            create_plan_call(&["Analyze", "Report"]),
            make_text_response("All good."),
        ]));
        let worker = Arc::new(
            SequentialMockProvider::new(vec![
                make_text_response("analysis done"),
                make_text_response("report done"),
            ])
            .chunked(),
        );
        let flow = PlanningFlow::new(
            vec![executor("worker", worker)],
            planner,
            "mock",
            PlanHandle::spawn(),
        )
        .unwrap();

        let drained = drain_flow(flow.execute_stream("analyze then report")).await;
        assert_eq!(drained.done_markers, 1);
        assert!(drained.fully_terminated());
        assert_eq!(drained.executor_steps(), vec![0, 1]);
        assert!(matches!(drained.phases.first(), Some(DrainedFlowPhase::Phase(_))));
        assert_eq!(
            drained.last_phase_content(),
            Some("Plan completed:\n\nAll good.")
        );
        assert_eq!(
            statuses(&flow).await,
            vec![PlanStepStatus::Completed, PlanStepStatus::Completed]
        );
    }
}
