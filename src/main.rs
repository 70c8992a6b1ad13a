use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use iq_agent::config::LoggingSettings;
use iq_agent::{Agent, AgentError, Configuration, logging};

/// Host agent: reports vitals and journal errors, runs queued shell commands.
#[derive(Parser)]
#[command(name = "iq-agent", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "/etc/iq-agent/agent.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let agent = match bootstrap(&args) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("iq-agent: {e}");
            return ExitCode::FAILURE;
        }
    };

    match agent.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(label = e.as_label(), "{e}");
            ExitCode::FAILURE
        }
    }
}

fn bootstrap(args: &Args) -> Result<Agent, AgentError> {
    let cfg = Configuration::load(&args.config)?;
    logging::init(&LoggingSettings::read(&cfg)?)?;
    Agent::from_configuration(&cfg)
}
