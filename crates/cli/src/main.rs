//! clawflow CLI: the main entry point.
//!
//! Commands:
//! - `run`    Run one tool-calling agent on a request
//! - `plan`   Plan a request and execute it step by step
//! - `tools`  List local and remote tools
//! - `config` Show or initialize the configuration

use clap::{Parser, Subcommand};
use clawflow_config::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;
mod runtime;

#[derive(Parser)]
#[command(
    name = "clawflow",
    about = "clawflow: ReAct agents and planning flows over local and remote tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single agent on a request
    Run {
        request: String,

        /// Print output as it is generated
        #[arg(long)]
        stream: bool,

        /// Finish with one summarizing answer instead of per-step results
        #[arg(long)]
        summarize: bool,

        /// Override agent.max_steps
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Create a plan for a request and execute it
    Plan {
        request: String,

        /// Print output as it is generated
        #[arg(long)]
        stream: bool,
    },

    /// List every available tool
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration, secrets redacted
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Commands::Config {
        action: ConfigAction::Init { force },
    } = cli.command
    {
        return commands::config_cmd::init(force);
    }

    let config = AppConfig::load()?;
    match cli.command {
        Commands::Run {
            request,
            stream,
            summarize,
            max_steps,
        } => {
            let args = commands::run::RunArgs {
                request,
                stream,
                summarize,
                max_steps,
            };
            commands::run::run(config, args).await?
        }
        Commands::Plan { request, stream } => commands::plan::run(config, request, stream).await?,
        Commands::Tools => commands::tools::run(config).await?,
        Commands::Config { action: ConfigAction::Show } => commands::config_cmd::show(&config),
        Commands::Config { .. } => {}
    }

    Ok(())
}
