mod handlers;
mod server;
mod setup;
mod simulate;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "rollop",
    about = "Rollop: leader-mediated locks for rolling operations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an HTTP server driving an in-memory peer group
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3200")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Protocol instance name (the operation being rolled)
        #[arg(long, default_value = "restart", env = "ROLLOP_LOCK_NAME")]
        name: String,

        /// Callback override key registered on every node; repeatable
        #[arg(long = "override")]
        overrides: Vec<String>,
    },

    /// Run a JSON simulation plan (stdin) to quiescence and print what ran
    Simulate,

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            port,
            host,
            name,
            mut overrides,
        } => {
            overrides.sort();
            overrides.dedup();
            server::run(&host, port, &name, overrides).await
        }
        Commands::Simulate => simulate_from_stdin(),
        Commands::Version => {
            println!("rollop {}", env!("CARGO_PKG_VERSION"));
            println!("Leader-mediated locks for rolling operations");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn simulate_from_stdin() -> Result<(), String> {
    eprintln!("Reading simulation plan from stdin...");
    let mut input = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)
        .map_err(|e| format!("failed to read stdin: {}", e))?;

    let plan: simulate::SimulationPlan =
        serde_json::from_str(&input).map_err(|e| format!("invalid JSON plan: {}", e))?;

    let outcome = simulate::run(&plan).map_err(|e| e.to_string())?;

    let output = serde_json::to_string_pretty(&outcome)
        .map_err(|e| format!("failed to encode outcome: {}", e))?;
    println!("{}", output);
    Ok(())
}
