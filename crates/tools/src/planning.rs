//! Planning tool: lets the model create and manage plans in the plan store.

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::{Tool, ToolResult};
use serde::Deserialize;

use crate::plan::{PlanError, PlanStepStatus};
use crate::plan_store::PlanHandle;

pub const PLANNING_TOOL_NAME: &str = "planning";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Command {
    Create,
    Update,
    List,
    Get,
    SetActive,
    MarkStep,
    Delete,
}

#[derive(Debug, Deserialize)]
struct PlanningArgs {
    command: Command,
    #[serde(default)]
    plan_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    steps: Option<Vec<String>>,
    #[serde(default)]
    step_index: Option<i64>,
    #[serde(default)]
    step_status: Option<String>,
    #[serde(default)]
    step_notes: Option<String>,
}

/// Exposes a [`PlanHandle`] to the model as the `planning` tool.
#[derive(Debug, Clone)]
pub struct PlanningTool {
    store: PlanHandle,
}

impl PlanningTool {
    pub fn new(store: PlanHandle) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PlanHandle {
        &self.store
    }

    async fn run(&self, args: PlanningArgs) -> Result<String, PlanError> {
        let require_id = |command: &'static str| {
            args.plan_id
                .clone()
                .filter(|id| !id.is_empty())
                .ok_or(PlanError::MissingParameter { param: "plan_id", command })
        };

        match args.command {
            Command::Create => {
                let plan_id = require_id("create")?;
                let title = args.title.clone().unwrap_or_default();
                let steps = args.steps.clone().unwrap_or_default();
                let plan = self.store.create(plan_id.clone(), title, steps).await?;
                Ok(format!(
                    "Plan created successfully with ID: {plan_id}\n\n{}",
                    plan.render()
                ))
            }
            Command::Update => {
                let plan_id = require_id("update")?;
                let plan = self
                    .store
                    .update(plan_id.clone(), args.title.clone(), args.steps.clone())
                    .await?;
                Ok(format!("Plan updated successfully: {plan_id}\n\n{}", plan.render()))
            }
            Command::List => {
                let plans = self.store.list().await?;
                if plans.is_empty() {
                    return Ok("No plans available. Create a plan with the 'create' command.".into());
                }
                let mut out = String::from("Available plans:\n");
                for p in plans {
                    let marker = if p.active { " (active)" } else { "" };
                    out.push_str(&format!(
                        "• {}{marker}: {} - {}/{} steps completed\n",
                        p.plan_id, p.title, p.completed, p.total
                    ));
                }
                Ok(out)
            }
            Command::Get => Ok(self.store.get(args.plan_id.clone()).await?.render()),
            Command::SetActive => {
                let plan_id = require_id("set_active")?;
                let plan = self.store.set_active(plan_id.clone()).await?;
                Ok(format!(
                    "Plan '{plan_id}' is now the active plan.\n\n{}",
                    plan.render()
                ))
            }
            Command::MarkStep => {
                let index = args.step_index.ok_or(PlanError::MissingParameter {
                    param: "step_index",
                    command: "mark_step",
                })?;
                let status = args
                    .step_status
                    .as_deref()
                    .map(str::parse::<PlanStepStatus>)
                    .transpose()?;
                let plan = self
                    .store
                    .mark_step(args.plan_id.clone(), index, status, args.step_notes.clone())
                    .await?;
                Ok(format!(
                    "Step {index} updated in plan '{}'.\n\n{}",
                    plan.plan_id,
                    plan.render()
                ))
            }
            Command::Delete => {
                let plan_id = require_id("delete")?;
                self.store.delete(plan_id.clone()).await?;
                Ok(format!("Plan '{plan_id}' has been deleted."))
            }
        }
    }
}

#[async_trait]
impl Tool for PlanningTool {
    fn name(&self) -> &str {
        PLANNING_TOOL_NAME
    }

    fn description(&self) -> &str {
        "A planning tool that allows the agent to create and manage plans for solving complex tasks. \
         The tool provides functionality for creating plans, updating plan steps, and tracking progress."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "description": "The command to execute. Available commands: create, update, list, get, set_active, mark_step, delete.",
                    "enum": ["create", "update", "list", "get", "set_active", "mark_step", "delete"],
                    "type": "string"
                },
                "plan_id": {
                    "description": "Unique identifier for the plan. Required for create, update, set_active, and delete. Optional for get and mark_step (the active plan is used if omitted).",
                    "type": "string"
                },
                "title": {
                    "description": "Title for the plan. Required for create, optional for update.",
                    "type": "string"
                },
                "steps": {
                    "description": "List of plan steps. Required for create, optional for update. A step may start with [agent_name] to suggest its executor.",
                    "type": "array",
                    "items": { "type": "string" }
                },
                "step_index": {
                    "description": "Index of the step to update (0-based). Required for mark_step.",
                    "type": "integer"
                },
                "step_status": {
                    "description": "Status to set for a step. Used with mark_step.",
                    "enum": ["not_started", "in_progress", "completed", "blocked"],
                    "type": "string"
                },
                "step_notes": {
                    "description": "Additional notes for a step. Optional for mark_step.",
                    "type": "string"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: PlanningArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("planning: {e}")))?;

        match self.run(args).await {
            Ok(output) => Ok(ToolResult::ok(output)),
            Err(PlanError::StoreClosed) => Err(ToolError::ExecutionFailed {
                tool_name: PLANNING_TOOL_NAME.into(),
                reason: PlanError::StoreClosed.to_string(),
            }),
            Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
        }
    }
}
