//! # netspel - Main Entry Point
//!
//! Runs one side of a throughput test. Start `netspel read` in one process
//! and `netspel write` in another with matching scheme and transport
//! settings; each side reports its own statistics.
//!
//! 1. **Parse arguments** and install logging at the requested level
//! 2. **Register** the built-in schemes and transports
//! 3. **Resolve the config** from the optional file and command-line overrides
//! 4. **Run** the selected side until it finishes or Ctrl-C is pressed
//!
//! Any failure before traffic starts prints the error followed by usage and
//! exits with status 1.

use clap::{CommandFactory, Parser};
use netspel::{cli::Args, config::Config, logging, registry, runner, shutdown};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(args.log_level());

    if let Err(e) = run(&args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}\n", e);
        let _ = Args::command().print_help();
        eprintln!(
            "\nRegistered schemes: {}\nRegistered writers: {}\nRegistered readers: {}",
            registry::schemes().names().join(", "),
            registry::writers().names().join(", "),
            registry::readers().names().join(", "),
        );
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    registry::register_builtins()?;
    let config = Config::resolve(&args.overrides())?;

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, finishing current run");
                trigger.trigger();
            }
            Err(e) => warn!("Unable to listen for interrupts: {}", e),
        }
    });

    runner::run(args.role(), &config, shutdown).await?;
    Ok(())
}
