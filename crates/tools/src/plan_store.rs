//! Single-writer plan store.
//!
//! One task owns every plan and the active plan id. Everything else talks to
//! it through a cloneable [`PlanHandle`] that sends commands over mpsc and
//! awaits a oneshot reply, so reads and updates are serialized without locks.
//! The task exits when the last handle is dropped.

use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::plan::{Plan, PlanError, PlanStepStatus};

const COMMAND_BUFFER: usize = 32;

/// One line of `list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub plan_id: String,
    pub title: String,
    pub completed: usize,
    pub total: usize,
    pub active: bool,
}

type Reply<T> = oneshot::Sender<Result<T, PlanError>>;

enum PlanCommand {
    Create {
        plan_id: String,
        title: String,
        steps: Vec<String>,
        reply: Reply<Plan>,
    },
    Update {
        plan_id: String,
        title: Option<String>,
        steps: Option<Vec<String>>,
        reply: Reply<Plan>,
    },
    List {
        reply: Reply<Vec<PlanSummary>>,
    },
    Get {
        plan_id: Option<String>,
        reply: Reply<Plan>,
    },
    SetActive {
        plan_id: String,
        reply: Reply<Plan>,
    },
    MarkStep {
        plan_id: Option<String>,
        index: i64,
        status: Option<PlanStepStatus>,
        notes: Option<String>,
        reply: Reply<Plan>,
    },
    Delete {
        plan_id: String,
        reply: Reply<()>,
    },
    CurrentStep {
        plan_id: String,
        reply: Reply<Option<(usize, String)>>,
    },
}

#[derive(Default)]
struct PlanStore {
    plans: BTreeMap<String, Plan>,
    active: Option<String>,
}

impl PlanStore {
    fn resolve(&self, plan_id: Option<String>) -> Result<String, PlanError> {
        match plan_id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(id),
            None => self.active.clone().ok_or(PlanError::NoActivePlan),
        }
    }

    fn plan_mut(&mut self, plan_id: &str) -> Result<&mut Plan, PlanError> {
        let plan = self
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;
        plan.normalize();
        Ok(plan)
    }

    fn create(&mut self, plan_id: String, title: String, steps: Vec<String>) -> Result<Plan, PlanError> {
        if plan_id.is_empty() {
            return Err(PlanError::MissingParameter { param: "plan_id", command: "create" });
        }
        if self.plans.contains_key(&plan_id) {
            return Err(PlanError::AlreadyExists(plan_id));
        }
        if title.is_empty() {
            return Err(PlanError::MissingParameter { param: "title", command: "create" });
        }
        if steps.is_empty() {
            return Err(PlanError::EmptySteps);
        }
        let plan = Plan::new(plan_id.clone(), title, steps);
        info!(plan_id = %plan_id, steps = plan.steps.len(), "Plan created");
        self.plans.insert(plan_id.clone(), plan.clone());
        self.active = Some(plan_id);
        Ok(plan)
    }

    fn update(
        &mut self,
        plan_id: String,
        title: Option<String>,
        steps: Option<Vec<String>>,
    ) -> Result<Plan, PlanError> {
        let plan = self.plan_mut(&plan_id)?;
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            plan.title = title;
        }
        if let Some(steps) = steps.filter(|s| !s.is_empty()) {
            plan.replace_steps(steps);
        }
        Ok(plan.clone())
    }

    fn list(&self) -> Vec<PlanSummary> {
        self.plans
            .values()
            .map(|p| PlanSummary {
                plan_id: p.plan_id.clone(),
                title: p.title.clone(),
                completed: p.count(PlanStepStatus::Completed),
                total: p.steps.len(),
                active: self.active.as_deref() == Some(p.plan_id.as_str()),
            })
            .collect()
    }

    fn mark_step(
        &mut self,
        plan_id: Option<String>,
        index: i64,
        status: Option<PlanStepStatus>,
        notes: Option<String>,
    ) -> Result<Plan, PlanError> {
        let plan_id = self.resolve(plan_id)?;
        let plan = self.plan_mut(&plan_id)?;
        let len = plan.steps.len() as i64;
        if index < 0 || index >= len {
            return Err(PlanError::InvalidStepIndex { index, max: len - 1 });
        }
        let i = index as usize;
        if let Some(status) = status {
            if plan.step_statuses[i] == PlanStepStatus::Completed && status.is_active() {
                return Err(PlanError::StatusRegression { index: i, status });
            }
            plan.step_statuses[i] = status;
        }
        if let Some(notes) = notes.filter(|n| !n.is_empty()) {
            plan.step_notes[i] = notes;
        }
        debug!(plan_id = %plan_id, step = i, status = %plan.step_statuses[i], "Step marked");
        Ok(plan.clone())
    }

    fn delete(&mut self, plan_id: String) -> Result<(), PlanError> {
        if self.plans.remove(&plan_id).is_none() {
            return Err(PlanError::NotFound(plan_id));
        }
        if self.active.as_deref() == Some(plan_id.as_str()) {
            self.active = None;
        }
        info!(plan_id = %plan_id, "Plan deleted");
        Ok(())
    }

    fn current_step(&mut self, plan_id: String) -> Result<Option<(usize, String)>, PlanError> {
        let plan = self.plan_mut(&plan_id)?;
        let Some(i) = plan.first_active() else {
            return Ok(None);
        };
        plan.step_statuses[i] = PlanStepStatus::InProgress;
        Ok(Some((i, plan.steps[i].clone())))
    }

    fn handle(&mut self, cmd: PlanCommand) {
        match cmd {
            PlanCommand::Create { plan_id, title, steps, reply } => {
                let _ = reply.send(self.create(plan_id, title, steps));
            }
            PlanCommand::Update { plan_id, title, steps, reply } => {
                let _ = reply.send(self.update(plan_id, title, steps));
            }
            PlanCommand::List { reply } => {
                let _ = reply.send(Ok(self.list()));
            }
            PlanCommand::Get { plan_id, reply } => {
                let result = self
                    .resolve(plan_id)
                    .and_then(|id| self.plan_mut(&id).map(|p| p.clone()));
                let _ = reply.send(result);
            }
            PlanCommand::SetActive { plan_id, reply } => {
                let result = self.plan_mut(&plan_id).map(|p| p.clone());
                if result.is_ok() {
                    self.active = Some(plan_id);
                }
                let _ = reply.send(result);
            }
            PlanCommand::MarkStep { plan_id, index, status, notes, reply } => {
                let _ = reply.send(self.mark_step(plan_id, index, status, notes));
            }
            PlanCommand::Delete { plan_id, reply } => {
                let _ = reply.send(self.delete(plan_id));
            }
            PlanCommand::CurrentStep { plan_id, reply } => {
                let _ = reply.send(self.current_step(plan_id));
            }
        }
    }
}

/// Cloneable client of the plan store task.
#[derive(Debug, Clone)]
pub struct PlanHandle {
    tx: mpsc::Sender<PlanCommand>,
}

impl PlanHandle {
    /// Spawn the store task. Must be called inside a tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(async move {
            let mut store = PlanStore::default();
            while let Some(cmd) = rx.recv().await {
                store.handle(cmd);
            }
            debug!("Plan store stopped");
        });
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> PlanCommand,
    ) -> Result<T, PlanError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| PlanError::StoreClosed)?;
        rx.await.map_err(|_| PlanError::StoreClosed)?
    }

    /// Create a plan and make it active.
    pub async fn create(
        &self,
        plan_id: impl Into<String>,
        title: impl Into<String>,
        steps: Vec<String>,
    ) -> Result<Plan, PlanError> {
        let (plan_id, title) = (plan_id.into(), title.into());
        self.request(|reply| PlanCommand::Create { plan_id, title, steps, reply })
            .await
    }

    pub async fn update(
        &self,
        plan_id: impl Into<String>,
        title: Option<String>,
        steps: Option<Vec<String>>,
    ) -> Result<Plan, PlanError> {
        let plan_id = plan_id.into();
        self.request(|reply| PlanCommand::Update { plan_id, title, steps, reply })
            .await
    }

    pub async fn list(&self) -> Result<Vec<PlanSummary>, PlanError> {
        self.request(|reply| PlanCommand::List { reply }).await
    }

    /// Fetch a plan, or the active plan when `plan_id` is `None`.
    pub async fn get(&self, plan_id: Option<String>) -> Result<Plan, PlanError> {
        self.request(|reply| PlanCommand::Get { plan_id, reply }).await
    }

    pub async fn set_active(&self, plan_id: impl Into<String>) -> Result<Plan, PlanError> {
        let plan_id = plan_id.into();
        self.request(|reply| PlanCommand::SetActive { plan_id, reply })
            .await
    }

    pub async fn mark_step(
        &self,
        plan_id: Option<String>,
        index: i64,
        status: Option<PlanStepStatus>,
        notes: Option<String>,
    ) -> Result<Plan, PlanError> {
        self.request(|reply| PlanCommand::MarkStep { plan_id, index, status, notes, reply })
            .await
    }

    pub async fn delete(&self, plan_id: impl Into<String>) -> Result<(), PlanError> {
        let plan_id = plan_id.into();
        self.request(|reply| PlanCommand::Delete { plan_id, reply }).await
    }

    /// Find the first step still needing work and mark it in progress, in a
    /// single store turn. `None` means the plan is complete.
    pub async fn current_step(
        &self,
        plan_id: impl Into<String>,
    ) -> Result<Option<(usize, String)>, PlanError> {
        let plan_id = plan_id.into();
        self.request(|reply| PlanCommand::CurrentStep { plan_id, reply })
            .await
    }
}
