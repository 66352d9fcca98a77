//! `clawflow plan`: a planning flow over one or more executor agents.

use clawflow_config::AppConfig;
use clawflow_flow::PlanningFlow;

use crate::render;
use crate::runtime::Runtime;

pub async fn run(config: AppConfig, request: String, stream: bool) -> anyhow::Result<()> {
    let runtime = Runtime::from_config(config);
    runtime.connect_servers().await;

    let names = runtime.config.flow.executor_names();
    let mut agents = Vec::with_capacity(names.len());
    for name in &names {
        let agent = runtime
            .agent_builder(name)
            .await
            .description(format!("Executor agent '{name}'"))
            .build()
            .into_shared();
        agents.push((name.clone(), agent));
    }

    let mut flow = PlanningFlow::new(
        agents,
        runtime.provider.clone(),
        runtime.config.provider.model.clone(),
        runtime.plans.clone(),
    )?
    .with_executor_keys(names);
    if let Some(primary) = &runtime.config.flow.primary {
        flow = flow.with_primary(primary.clone());
    }

    let mut stdout = std::io::stdout();
    let outcome = if stream {
        render::print_flow(&mut stdout, flow.execute_stream(request))
            .await
            .map_err(Into::into)
    } else {
        match flow.execute(&request).await {
            Ok(results) => render::print_results(&mut stdout, &results).map_err(Into::into),
            Err(e) => Err(e.into()),
        }
    };

    runtime.shutdown().await;
    outcome
}
