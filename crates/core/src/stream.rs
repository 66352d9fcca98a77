//! The hierarchical streaming protocol.
//!
//! A streamed run is a channel of [`RunEvent`]s. Each `Step` carries the
//! receiver of one phase, which yields [`StepEvent::Increment`]s and is
//! closed by exactly one [`StepEvent::StepDone`]. The run itself is closed by
//! exactly one [`RunEvent::RunDone`]. Consumers drain every phase to its
//! marker before treating it as finished; a channel that closes without its
//! marker means the producer went away.

use tokio::sync::mpsc;

use crate::agent::AgentResultStream;

/// Buffer size of a single phase channel.
pub const PHASE_BUFFER: usize = 64;

/// Buffer size of an outer run or flow channel.
pub const RUN_BUFFER: usize = 128;

#[derive(Debug)]
pub enum StepEvent {
    Increment(AgentResultStream),
    StepDone,
}

#[derive(Debug)]
pub enum RunEvent {
    Step(mpsc::Receiver<StepEvent>),
    RunDone,
}

/// Open a new phase on `outer` and return its sender.
///
/// Returns `None` if the consumer has dropped the outer receiver.
pub async fn open_phase(outer: &mpsc::Sender<RunEvent>) -> Option<mpsc::Sender<StepEvent>> {
    let (tx, rx) = mpsc::channel(PHASE_BUFFER);
    outer.send(RunEvent::Step(rx)).await.ok()?;
    Some(tx)
}

/// Emit a complete phase holding a single increment.
pub async fn emit_single(outer: &mpsc::Sender<RunEvent>, item: AgentResultStream) -> bool {
    let Some(tx) = open_phase(outer).await else {
        return false;
    };
    let _ = tx.send(StepEvent::Increment(item)).await;
    tx.send(StepEvent::StepDone).await.is_ok()
}

/// The increments of one drained phase.
#[derive(Debug, Default)]
pub struct DrainedPhase {
    pub increments: Vec<AgentResultStream>,
    /// Whether the phase was closed by `StepDone` rather than a dropped sender.
    pub terminated: bool,
}

impl DrainedPhase {
    /// The final increment, which carries the full text of the phase.
    pub fn last(&self) -> Option<&AgentResultStream> {
        self.increments.last()
    }
}

/// Read a phase until its `StepDone` marker.
pub async fn drain_step(rx: &mut mpsc::Receiver<StepEvent>) -> DrainedPhase {
    let mut drained = DrainedPhase::default();
    while let Some(event) = rx.recv().await {
        match event {
            StepEvent::Increment(item) => drained.increments.push(item),
            StepEvent::StepDone => {
                drained.terminated = true;
                break;
            }
        }
    }
    drained
}

/// A fully drained run.
#[derive(Debug, Default)]
pub struct DrainedRun {
    pub phases: Vec<DrainedPhase>,
    /// Number of `RunDone` markers seen. Always 1 for a well-formed run.
    pub done_markers: usize,
}

impl DrainedRun {
    /// Final content of every phase, in order.
    pub fn contents(&self) -> Vec<String> {
        self.phases
            .iter()
            .filter_map(|p| p.last().map(|i| i.content.clone()))
            .collect()
    }

    pub fn all_phases_terminated(&self) -> bool {
        self.phases.iter().all(|p| p.terminated)
    }
}

/// Drain a run: every phase to its marker, then until `RunDone`.
pub async fn drain_run(mut rx: mpsc::Receiver<RunEvent>) -> DrainedRun {
    let mut run = DrainedRun::default();
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::Step(mut phase) => run.phases.push(drain_step(&mut phase).await),
            RunEvent::RunDone => {
                run.done_markers += 1;
                break;
            }
        }
    }
    run
}
