//! `clawflow run`: one tool-calling agent on one request.

use clawflow_agent::{Agent, AgentStrategy};
use clawflow_config::AppConfig;

use crate::render;
use crate::runtime::Runtime;

pub struct RunArgs {
    pub request: String,
    pub stream: bool,
    pub summarize: bool,
    pub max_steps: Option<usize>,
}

pub async fn run(config: AppConfig, args: RunArgs) -> anyhow::Result<()> {
    let runtime = Runtime::from_config(config);
    runtime.connect_servers().await;

    let mut builder = runtime
        .agent_builder("clawflow")
        .await
        .description("A versatile agent that can solve various tasks using multiple tools");
    if args.summarize {
        builder = builder.strategy(AgentStrategy::Summarizing);
    }
    if let Some(max_steps) = args.max_steps {
        builder = builder.max_steps(max_steps);
    }
    let agent = builder.build().into_shared();

    let mut stdout = std::io::stdout();
    let outcome = if args.stream {
        let stream = Agent::run_stream(&agent, args.request)?;
        let cancel = stream.cancel.clone();
        tokio::select! {
            printed = render::print_run(&mut stdout, stream.events) => printed.map_err(Into::into),
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                eprintln!("Run cancelled");
                Ok(())
            }
        }
    } else {
        let results = agent.lock().await.run(args.request).await;
        match results {
            Ok(results) => render::print_results(&mut stdout, &results).map_err(Into::into),
            Err(e) => Err(e.into()),
        }
    };

    agent.lock().await.cleanup().await;
    runtime.shutdown().await;
    outcome
}
