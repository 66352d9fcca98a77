//! `clawflow tools`: list every registered tool, local and remote.

use std::io::Write;

use clawflow_config::AppConfig;
use clawflow_core::tool::Tool;

use crate::runtime::Runtime;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let runtime = Runtime::from_config(config);
    let servers = runtime.connect_servers().await;

    let mut stdout = std::io::stdout();
    list(&runtime, &mut stdout).await?;
    writeln!(stdout, "\n{servers} remote server(s) connected")?;

    runtime.shutdown().await;
    Ok(())
}

async fn list(runtime: &Runtime, out: &mut impl Write) -> std::io::Result<()> {
    let remote = runtime.remote.remote_tool_names().await;
    let registry = runtime.tools.read().await;
    for name in registry.names() {
        let Some(tool) = registry.get(&name) else {
            continue;
        };
        let origin = if remote.contains(&name) { "remote" } else { "local" };
        writeln!(out, "{name:<28} {origin:<7} {}", tool.description())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawflow_agent::test_helpers::SequentialMockProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn lists_builtin_tools() {
        let runtime = Runtime::with_provider(
            AppConfig::default(),
            Arc::new(SequentialMockProvider::new(vec![])),
        );
        let mut out = Vec::new();
        list(&runtime, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let names: Vec<&str> = text.lines().filter_map(|l| l.split_whitespace().next()).collect();
        assert_eq!(names, vec!["bash", "list_directory", "planning", "terminate"]);
        assert!(text.lines().all(|l| l.contains(" local ")));
    }
}
