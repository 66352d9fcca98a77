//! The outer level of a streamed flow.
//!
//! A flow stream yields one [`FlowEvent`] per phase: plan creation and the
//! final summary as plain phases, each plan step as the executor's own run
//! stream. It is closed by exactly one [`FlowEvent::FlowDone`].

use clawflow_core::stream::{DrainedPhase, DrainedRun, RunEvent, StepEvent, drain_run, drain_step};
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum FlowEvent {
    Phase(mpsc::Receiver<StepEvent>),
    Executor {
        step_index: usize,
        events: mpsc::Receiver<RunEvent>,
    },
    FlowDone,
}

#[derive(Debug)]
pub enum DrainedFlowPhase {
    Phase(DrainedPhase),
    Executor { step_index: usize, run: DrainedRun },
}

#[derive(Debug, Default)]
pub struct DrainedFlow {
    pub phases: Vec<DrainedFlowPhase>,
    pub done_markers: usize,
}

impl DrainedFlow {
    /// Every nested stream reached its own end marker.
    pub fn fully_terminated(&self) -> bool {
        self.phases.iter().all(|phase| match phase {
            DrainedFlowPhase::Phase(p) => p.terminated,
            DrainedFlowPhase::Executor { run, .. } => {
                run.done_markers == 1 && run.all_phases_terminated()
            }
        })
    }

    pub fn executor_steps(&self) -> Vec<usize> {
        self.phases
            .iter()
            .filter_map(|phase| match phase {
                DrainedFlowPhase::Executor { step_index, .. } => Some(*step_index),
                DrainedFlowPhase::Phase(_) => None,
            })
            .collect()
    }

    /// Final content of the last plain phase, usually the flow summary.
    pub fn last_phase_content(&self) -> Option<&str> {
        self.phases.iter().rev().find_map(|phase| match phase {
            DrainedFlowPhase::Phase(p) => p.last().map(|i| i.content.as_str()),
            DrainedFlowPhase::Executor { .. } => None,
        })
    }
}

/// Drain a flow stream, every nested level to its marker.
pub async fn drain_flow(mut rx: mpsc::Receiver<FlowEvent>) -> DrainedFlow {
    let mut flow = DrainedFlow::default();
    while let Some(event) = rx.recv().await {
        match event {
            FlowEvent::Phase(mut phase) => {
                flow.phases
                    .push(DrainedFlowPhase::Phase(drain_step(&mut phase).await));
            }
            FlowEvent::Executor { step_index, events } => {
                let run = drain_run(events).await;
                flow.phases.push(DrainedFlowPhase::Executor { step_index, run });
            }
            FlowEvent::FlowDone => {
                flow.done_markers += 1;
                break;
            }
        }
    }
    flow
}
