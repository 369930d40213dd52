//! Command-line front-end: run a machine definition file to completion.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use parley_engine::{DecisionCycleOrchestrator, DeliberationStore};
use parley_mcp::load_machine;

#[derive(Parser, Debug)]
#[command(
    name = "parley",
    author,
    version,
    about = "Run a decision-cycle session from a machine definition file"
)]
struct Args {
    /// Path to the machine definition JSON file
    machine: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let machine = match load_machine(&args.machine) {
        Ok(machine) => machine,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    let store = DeliberationStore::new().shared();
    match DecisionCycleOrchestrator::new(store).run_session(machine).await {
        Ok(session) => {
            println!("Machine:       {}", session.machine_name);
            println!("Initial state: {}", session.machine.initial_state);
            println!("Goal state:    {}", session.machine.default_state);
            println!("Final state:   {}", session.current_state);
            println!("Session ID:    {}", session.session_id);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Session failed:");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
