//! # clawflow Flow
//!
//! [`PlanningFlow`] breaks a request into a plan, then hands each step to an
//! executor agent until the plan is complete, and finally asks the model to
//! summarize what was done.
//!
//! ```text
//! request ─▶ create plan ─▶ ┌ current step ─▶ executor.run ─▶ mark completed ┐
//!                           └──────────────────────◀───────────────────────────┘
//!                                   no step left ─▶ finalize
//! ```

pub mod error;
pub mod event;
pub mod planning;

pub use error::FlowError;
pub use event::{DrainedFlow, DrainedFlowPhase, FlowEvent, drain_flow};
pub use planning::{DEFAULT_PLAN_STEPS, PlanningFlow};
