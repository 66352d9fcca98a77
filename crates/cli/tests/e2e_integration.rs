//! End-to-end tests for the clawflow runtime.
//!
//! These exercise whole runs: the ReAct loop against real built-in tools,
//! planning flows over executor agents, and the multi-server remote registry,
//! with scripted chat responses standing in for the model.

use std::sync::Arc;

use clawflow_agent::test_helpers::{
    SequentialMockProvider, StalledProvider, make_text_response, make_tool_call,
    make_tool_call_response,
};
use clawflow_agent::{Agent, AgentError};
use clawflow_core::agent::AgentState;
use clawflow_core::message::Role;
use clawflow_core::stream::drain_run;
use clawflow_core::tool::{Tool, ToolRegistry};
use clawflow_flow::{PlanningFlow, drain_flow};
use clawflow_mcp::{
    McpResult, RemoteCallResult, RemoteContent, RemoteSession, RemoteToolRegistry,
    RemoteToolSpec, ServerId,
};
use clawflow_tools::{PlanHandle, PlanStepStatus, default_registry};
use serde_json::json;

// ── Fixtures ─────────────────────────────────────────────────────────────

fn builtin_agent(provider: Arc<SequentialMockProvider>, max_steps: usize) -> Agent {
    Agent::builder("e2e", provider)
        .tools(default_registry(PlanHandle::spawn()).into_shared())
        .max_steps(max_steps)
        .build()
}

/// A remote server exposing one `status` tool that reports its own id.
struct StatusServer {
    id: &'static str,
}

#[async_trait::async_trait]
impl RemoteSession for StatusServer {
    async fn list_tools(&self) -> McpResult<Vec<RemoteToolSpec>> {
        Ok(vec![RemoteToolSpec {
            name: "status".into(),
            description: "Report server status".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }])
    }

    async fn call_tool(&self, name: &str, _args: serde_json::Value) -> McpResult<RemoteCallResult> {
        Ok(RemoteCallResult {
            content: vec![RemoteContent::Text(format!("{} {name}: healthy", self.id))],
            is_error: false,
        })
    }

    async fn close(&self) -> McpResult<()> {
        Ok(())
    }
}

// ── Scenario A: a tool call, then terminate ──────────────────────────────

#[tokio::test]
async fn e2e_list_directory_then_terminate() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    let path = dir.path().to_string_lossy().into_owned();

    let provider = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call("list_directory", json!({ "path": path }))],
            "Let me look.",
        ),
        make_tool_call_response(
            vec![make_tool_call("terminate", json!({"status": "success"}))],
            "",
        ),
    ]));
    let mut agent = builtin_agent(provider.clone(), 10);

    let results = agent.run("list files").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].content,
        "Observed output of cmd `list_directory` executed:\nnotes.txt\nsrc/"
    );
    assert!(results[1].content.contains("The interaction has been completed with status: success"));
    assert_eq!(agent.state(), AgentState::Finished);
    assert_eq!(provider.call_count(), 2);

    let tool_messages: Vec<_> = agent
        .memory()
        .messages()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.name.clone().unwrap_or_default())
        .collect();
    assert_eq!(tool_messages, vec!["list_directory", "terminate"]);

    // A finished agent refuses another run and leaves memory untouched.
    let before = agent.memory().len();
    let err = agent.run("again").await.unwrap_err();
    assert!(matches!(err, AgentError::NotIdle { state: AgentState::Finished }));
    assert_eq!(agent.memory().len(), before);
}

// ── Scenario B: budget exhaustion ────────────────────────────────────────

#[tokio::test]
async fn e2e_budget_exhaustion_resets_to_idle() {
    let provider = Arc::new(SequentialMockProvider::repeating(make_text_response(
        "I think the answer is 42.",
    )));
    let mut agent = builtin_agent(provider, 1);

    let results = agent.run("what is the answer?").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "I think the answer is 42.");
    assert_eq!(results[1].content, "Terminated: Reached max steps (1)");
    assert_eq!(agent.state(), AgentState::Idle);
    assert_eq!(agent.current_step(), 0);

    // Idle again, so the agent can take the next request.
    let results = agent.run("and now?").await.unwrap();
    assert_eq!(results.len(), 2);
}

// ── Scenario C: planning flow ────────────────────────────────────────────

#[tokio::test]
async fn e2e_planning_flow_runs_steps_in_order() {
    let planner = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call(
                "planning",
                json!({"command": "create", "title": "Analyze and report", "steps": ["Analyze", "Report"]}),
            )],
            "",
        ),
        make_text_response("Both steps are done."),
    ]));
    let worker = Arc::new(SequentialMockProvider::new(vec![
        make_text_response("analysis complete"),
        make_text_response("report written"),
    ]));
    let plans = PlanHandle::spawn();
    let executor = Agent::builder("executor", worker.clone())
        .max_steps(1)
        .build()
        .into_shared();
    let flow = PlanningFlow::new(
        vec![("executor".to_string(), executor)],
        planner.clone(),
        "mock",
        plans.clone(),
    )
    .unwrap();

    let results = flow.execute("analyze then report").await.unwrap();

    assert_eq!(plans.current_step(flow.plan_id()).await.unwrap(), None);
    // One planning call plus exactly one finalization.
    assert_eq!(planner.call_count(), 2);
    assert_eq!(
        results.last().unwrap().content,
        "Plan completed:\n\nBoth steps are done."
    );
    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    let analyze = contents.iter().position(|c| *c == "analysis complete").unwrap();
    let report = contents.iter().position(|c| *c == "report written").unwrap();
    assert!(analyze < report);

    let plan = plans.get(Some(flow.plan_id().to_string())).await.unwrap();
    assert_eq!(plan.steps, vec!["Analyze", "Report"]);
    assert!(plan.step_statuses.iter().all(|s| *s == PlanStepStatus::Completed));
}

// ── Scenario D: two remote servers ───────────────────────────────────────

#[tokio::test]
async fn e2e_remote_servers_are_namespaced() {
    let tools = ToolRegistry::new().into_shared();
    let remote = RemoteToolRegistry::new(tools.clone());

    let alpha = ServerId::parse("alpha").unwrap();
    let beta = ServerId::parse("beta").unwrap();
    remote
        .connect_session(alpha.clone(), Arc::new(StatusServer { id: "alpha" }))
        .await
        .unwrap();
    remote
        .connect_session(beta.clone(), Arc::new(StatusServer { id: "beta" }))
        .await
        .unwrap();

    assert_eq!(tools.read().await.names(), vec!["alpha_status", "beta_status"]);

    assert!(remote.disconnect(&alpha).await);
    assert_eq!(tools.read().await.names(), vec!["beta_status"]);

    let beta_status = tools.read().await.get("beta_status").unwrap();
    let result = beta_status.execute(json!({})).await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, "beta status: healthy");
}

#[tokio::test]
async fn e2e_agent_calls_remote_tool_by_namespaced_name() {
    let provider = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(vec![make_tool_call("beta_status", json!({}))], ""),
        make_tool_call_response(
            vec![make_tool_call("terminate", json!({"status": "success"}))],
            "",
        ),
    ]));
    let tools = default_registry(PlanHandle::spawn()).into_shared();
    let mut agent = Agent::builder("remote", provider.clone())
        .tools(tools.clone())
        .remote(Arc::new(RemoteToolRegistry::new(tools)))
        .build();
    agent
        .connect_session("beta", Arc::new(StatusServer { id: "beta" }))
        .await
        .unwrap();

    let results = agent.run("how is beta?").await.unwrap();
    assert_eq!(
        results[0].content,
        "Observed output of cmd `beta_status` executed:\nbeta status: healthy"
    );
    assert_eq!(agent.state(), AgentState::Finished);

    // The offered schema list included the remote tool.
    let offered: Vec<String> = provider.requests()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert!(offered.contains(&"beta_status".to_string()));

    agent.cleanup().await;
    assert!(agent.remote().unwrap().is_empty().await);
}

// ── Termination properties ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_unknown_tool_is_an_observation() {
    let provider = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
        vec![make_tool_call("launch_rockets", json!({}))],
        "",
    )]));
    let mut agent = builtin_agent(provider, 1);

    let results = agent.run("go").await.unwrap();
    assert_eq!(results[0].content, "Error: Unknown tool 'launch_rockets'");
    assert_eq!(agent.state(), AgentState::Idle);
}

#[tokio::test]
async fn e2e_streamed_run_terminates_at_every_level() {
    let provider = Arc::new(
        SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("list_directory", json!({"path": "/definitely/missing"}))],
                "Checking the directory",
            ),
            make_text_response("The directory does not exist."),
        ])
        .chunked(),
    );
    let agent = builtin_agent(provider, 2).into_shared();

    let stream = Agent::run_stream(&agent, "list /definitely/missing").unwrap();
    let run = drain_run(stream.events).await;

    assert_eq!(run.done_markers, 1);
    assert!(run.all_phases_terminated());
    let contents = run.contents();
    assert_eq!(contents[0], "Checking the directory");
    assert!(contents[1].contains("Failed to list directory '/definitely/missing'"));
    assert_eq!(contents.last().unwrap(), "Terminated: Reached max steps (2)");

    let agent = agent.lock().await;
    assert_eq!(agent.state(), AgentState::Idle);
    assert_eq!(agent.current_step(), 0);
}

#[tokio::test]
async fn e2e_busy_agent_rejects_second_stream_and_cancel_ends_run() {
    let agent = Agent::builder("slow", Arc::new(StalledProvider))
        .max_steps(3)
        .build()
        .into_shared();

    let stream = Agent::run_stream(&agent, "wait forever").unwrap();
    let err = Agent::run_stream(&agent, "me too").unwrap_err();
    assert!(matches!(err, AgentError::NotIdle { .. }));

    stream.cancel.cancel();
    let run = drain_run(stream.events).await;
    assert_eq!(run.done_markers, 1);
    assert!(run.all_phases_terminated());

    let agent = agent.lock().await;
    assert_eq!(agent.state(), AgentState::Idle);
    assert!(!agent.cancellation_token().is_cancelled());
    // Only the original request reached memory.
    let users: Vec<_> = agent
        .memory()
        .messages()
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .collect();
    assert!(users.contains(&"wait forever".to_string()));
    assert!(!users.contains(&"me too".to_string()));
}

#[tokio::test]
async fn e2e_streamed_flow_terminates_at_every_level() {
    let planner = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call(
                "planning",
                json!({"command": "create", "title": "Two", "steps": ["[writer] Draft", "Review"]}),
            )],
            "",
        ),
        make_text_response("Drafted and reviewed."),
    ]));
    let writer = Arc::new(SequentialMockProvider::single_text("draft ready").chunked());
    let reviewer = Arc::new(SequentialMockProvider::single_text("looks good").chunked());
    let agents = vec![
        (
            "reviewer".to_string(),
            Agent::builder("reviewer", reviewer.clone()).max_steps(1).build().into_shared(),
        ),
        (
            "writer".to_string(),
            Agent::builder("writer", writer.clone()).max_steps(1).build().into_shared(),
        ),
    ];
    let plans = PlanHandle::spawn();
    let flow = PlanningFlow::new(agents, planner, "mock", plans.clone()).unwrap();

    let drained = drain_flow(flow.execute_stream("draft then review")).await;

    assert_eq!(drained.done_markers, 1);
    assert!(drained.fully_terminated());
    assert_eq!(drained.executor_steps(), vec![0, 1]);
    assert_eq!(
        drained.last_phase_content(),
        Some("Plan completed:\n\nDrafted and reviewed.")
    );
    assert_eq!(writer.call_count(), 1);
    assert_eq!(reviewer.call_count(), 1);

    let plan = plans.get(Some(flow.plan_id().to_string())).await.unwrap();
    assert!(plan.step_statuses.iter().all(|s| *s == PlanStepStatus::Completed));
}

#[tokio::test]
async fn e2e_planning_tool_is_usable_by_an_agent() {
    let plans = PlanHandle::spawn();
    let provider = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call(
                "planning",
                json!({"command": "create", "plan_id": "trip", "title": "Trip", "steps": ["Book", "Pack"]}),
            )],
            "",
        ),
        make_tool_call_response(
            vec![
                make_tool_call(
                    "planning",
                    json!({"command": "mark_step", "plan_id": "trip", "step_index": 0, "step_status": "completed"}),
                ),
                make_tool_call("terminate", json!({"status": "success"})),
            ],
            "",
        ),
    ]));
    let mut agent = Agent::builder("planner", provider)
        .tools(default_registry(plans.clone()).into_shared())
        .build();

    let results = agent.run("plan my trip").await.unwrap();
    assert!(results[0].content.contains("Plan created successfully with ID: trip"));
    assert_eq!(agent.state(), AgentState::Finished);

    let plan = plans.get(Some("trip".into())).await.unwrap();
    assert_eq!(
        plan.step_statuses,
        vec![PlanStepStatus::Completed, PlanStepStatus::NotStarted]
    );
}
