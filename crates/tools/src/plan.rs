//! Plan model: ordered steps with parallel status and note vectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Parameter `{param}` is required for command: {command}")]
    MissingParameter {
        param: &'static str,
        command: &'static str,
    },

    #[error("A plan with ID '{0}' already exists. Use 'update' to modify existing plans.")]
    AlreadyExists(String),

    #[error("No plan found with ID: {0}")]
    NotFound(String),

    #[error("No active plan. Please specify a plan_id or set an active plan.")]
    NoActivePlan,

    #[error("Invalid step_index: {index}. Valid indices range from 0 to {max}.")]
    InvalidStepIndex { index: i64, max: i64 },

    #[error(
        "Invalid step_status: {0}. Valid statuses are: not_started, in_progress, completed, blocked"
    )]
    InvalidStatus(String),

    #[error("Step {index} is completed and cannot be moved back to {status}")]
    StatusRegression { index: usize, status: PlanStepStatus },

    #[error("Parameter `steps` must be a non-empty list of strings for command: create")]
    EmptySteps,

    #[error("Plan store is no longer running")]
    StoreClosed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl PlanStepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    pub fn mark(&self) -> &'static str {
        match self {
            Self::NotStarted => "[ ]",
            Self::InProgress => "[→]",
            Self::Completed => "[✓]",
            Self::Blocked => "[!]",
        }
    }

    /// Statuses that still need work from the flow.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::NotStarted | Self::InProgress)
    }
}

impl fmt::Display for PlanStepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStepStatus {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            other => Err(PlanError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub title: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub step_statuses: Vec<PlanStepStatus>,
    #[serde(default)]
    pub step_notes: Vec<String>,
}

impl Plan {
    pub fn new(plan_id: impl Into<String>, title: impl Into<String>, steps: Vec<String>) -> Self {
        let n = steps.len();
        Self {
            plan_id: plan_id.into(),
            title: title.into(),
            steps,
            step_statuses: vec![PlanStepStatus::NotStarted; n],
            step_notes: vec![String::new(); n],
        }
    }

    /// Pad statuses and notes up to the number of steps. Never truncates.
    pub fn normalize(&mut self) {
        let n = self.steps.len();
        if self.step_statuses.len() < n {
            self.step_statuses.resize(n, PlanStepStatus::NotStarted);
        }
        if self.step_notes.len() < n {
            self.step_notes.resize(n, String::new());
        }
    }

    /// Replace the step list, keeping status and notes wherever the step at
    /// the same index is unchanged.
    pub fn replace_steps(&mut self, steps: Vec<String>) {
        self.normalize();
        let mut statuses = Vec::with_capacity(steps.len());
        let mut notes = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if self.steps.get(i) == Some(step) {
                statuses.push(self.step_statuses[i]);
                notes.push(self.step_notes[i].clone());
            } else {
                statuses.push(PlanStepStatus::NotStarted);
                notes.push(String::new());
            }
        }
        self.steps = steps;
        self.step_statuses = statuses;
        self.step_notes = notes;
    }

    pub fn count(&self, status: PlanStepStatus) -> usize {
        self.step_statuses.iter().filter(|s| **s == status).count()
    }

    /// Index of the first step that still needs work.
    pub fn first_active(&self) -> Option<usize> {
        self.step_statuses
            .iter()
            .take(self.steps.len())
            .position(PlanStepStatus::is_active)
    }

    pub fn is_complete(&self) -> bool {
        self.first_active().is_none()
    }

    /// Human-readable rendering used in prompts and tool output.
    pub fn render(&self) -> String {
        let mut plan = self.clone();
        plan.normalize();

        let header = format!("Plan: {} (ID: {})", plan.title, plan.plan_id);
        let mut out = format!("{header}\n{}\n\n", "=".repeat(header.chars().count()));

        let total = plan.steps.len();
        let completed = plan.count(PlanStepStatus::Completed);
        if total > 0 {
            let pct = completed as f64 / total as f64 * 100.0;
            out.push_str(&format!(
                "Progress: {completed}/{total} steps completed ({pct:.1}%)\n"
            ));
        } else {
            out.push_str(&format!("Progress: {completed}/{total} steps completed (0%)\n"));
        }
        out.push_str(&format!(
            "Status: {completed} completed, {} in progress, {} blocked, {} not started\n\n",
            plan.count(PlanStepStatus::InProgress),
            plan.count(PlanStepStatus::Blocked),
            plan.count(PlanStepStatus::NotStarted),
        ));

        out.push_str("Steps:\n");
        for (i, step) in plan.steps.iter().enumerate() {
            out.push_str(&format!("{i}. {} {step}\n", plan.step_statuses[i].mark()));
            if !plan.step_notes[i].is_empty() {
                out.push_str(&format!("   Notes: {}\n", plan.step_notes[i]));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_pads_and_never_truncates() {
        let mut plan = Plan {
            plan_id: "p".into(),
            title: "t".into(),
            steps: steps(&["a", "b", "c"]),
            step_statuses: vec![PlanStepStatus::Completed],
            step_notes: vec![],
        };
        plan.normalize();
        assert_eq!(plan.step_statuses.len(), 3);
        assert_eq!(plan.step_statuses[0], PlanStepStatus::Completed);
        assert_eq!(plan.step_statuses[2], PlanStepStatus::NotStarted);
        assert_eq!(plan.step_notes, vec!["", "", ""]);

        plan.step_statuses.push(PlanStepStatus::Blocked);
        plan.normalize();
        assert_eq!(plan.step_statuses.len(), 4);
    }

    #[test]
    fn replace_steps_keeps_unchanged_positions() {
        let mut plan = Plan::new("p", "t", steps(&["a", "b"]));
        plan.step_statuses[0] = PlanStepStatus::Completed;
        plan.step_notes[0] = "done".into();
        plan.step_statuses[1] = PlanStepStatus::InProgress;

        plan.replace_steps(steps(&["a", "x", "c"]));
        assert_eq!(plan.step_statuses[0], PlanStepStatus::Completed);
        assert_eq!(plan.step_notes[0], "done");
        assert_eq!(plan.step_statuses[1], PlanStepStatus::NotStarted);
        assert_eq!(plan.step_statuses[2], PlanStepStatus::NotStarted);
    }

    #[test]
    fn render_format() {
        let mut plan = Plan::new("plan_1", "Demo", steps(&["Analyze", "Report"]));
        plan.step_statuses[0] = PlanStepStatus::Completed;
        plan.step_notes[0] = "looked".into();

        let text = plan.render();
        let header = "Plan: Demo (ID: plan_1)";
        assert!(text.starts_with(&format!("{header}\n{}\n\n", "=".repeat(header.len()))));
        assert!(text.contains("Progress: 1/2 steps completed (50.0%)"));
        assert!(text.contains("Status: 1 completed, 0 in progress, 0 blocked, 1 not started"));
        assert!(text.contains("0. [✓] Analyze\n   Notes: looked\n"));
        assert!(text.contains("1. [ ] Report\n"));
    }

    #[test]
    fn render_empty_plan() {
        let plan = Plan::new("p", "Empty", vec![]);
        assert!(plan.render().contains("Progress: 0/0 steps completed (0%)"));
        assert!(plan.is_complete());
    }

    #[test]
    fn status_parsing() {
        assert_eq!("blocked".parse::<PlanStepStatus>().unwrap(), PlanStepStatus::Blocked);
        assert!(matches!(
            "done".parse::<PlanStepStatus>(),
            Err(PlanError::InvalidStatus(_))
        ));
        assert!(PlanStepStatus::InProgress.is_active());
        assert!(!PlanStepStatus::Blocked.is_active());
    }
}
