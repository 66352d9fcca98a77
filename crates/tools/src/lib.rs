//! Built-in tool implementations for clawflow.
//!
//! - `terminate`: ends an interaction; agents treat it as a special tool.
//! - `planning`: manages plans held by the single-writer [`PlanHandle`].
//! - `list_directory`: a read-only filesystem probe.
//! - `bash`: runs a command line with a timeout.

pub mod bash;
pub mod list_directory;
pub mod plan;
pub mod plan_store;
pub mod planning;
pub mod terminate;

use std::sync::Arc;

use clawflow_core::tool::ToolRegistry;

pub use bash::{BASH_TOOL_NAME, BashTool};
pub use list_directory::ListDirectoryTool;
pub use plan::{Plan, PlanError, PlanStepStatus};
pub use plan_store::{PlanHandle, PlanSummary};
pub use planning::{PLANNING_TOOL_NAME, PlanningTool};
pub use terminate::{TERMINATE_TOOL_NAME, TerminateTool};

/// A registry holding every built-in tool, with plans kept in `plans`.
pub fn default_registry(plans: PlanHandle) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(TerminateTool));
    registry.register(Arc::new(PlanningTool::new(plans)));
    registry.register(Arc::new(ListDirectoryTool));
    registry.register(Arc::new(BashTool::new()));
    registry
}
