//! # Run Orchestration
//!
//! Resolves the configured scheme and transport half by name, initializes
//! both, and hands control to the scheme for exactly one run. Every failure
//! here happens before traffic starts and is fatal to the process.

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::registry::{self, Registry};
use crate::scheme::Scheme;
use crate::shutdown::Shutdown;
use crate::stats::{Role, StatsSnapshot};
use crate::transport::{Reader, Writer};

/// Human readable summary of what a run is about to do.
struct RunDisplay<'a> {
    role: Role,
    transport: &'a str,
    config: &'a Config,
}

impl<'a> std::fmt::Display for RunDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting netspel {}", self.role)?;
        writeln!(f, "  Scheme:             {}", self.config.scheme_type())?;
        writeln!(f, "  Transport:          {}", self.transport)?;
        for (key, value) in self.config.additional().iter() {
            writeln!(f, "  {:<20}{}", format!("{}:", key), value)?;
        }
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Run one side of a test using the process-wide registries.
///
/// [`registry::register_builtins`] must have been called first.
pub async fn run(role: Role, config: &Config, shutdown: Shutdown) -> Result<StatsSnapshot> {
    run_with(
        registry::writers(),
        registry::readers(),
        registry::schemes(),
        role,
        config,
        shutdown,
    )
    .await
}

/// Run one side of a test, resolving components from the given registries.
pub async fn run_with(
    writers: &Registry<dyn Writer>,
    readers: &Registry<dyn Reader>,
    schemes: &Registry<dyn Scheme>,
    role: Role,
    config: &Config,
    shutdown: Shutdown,
) -> Result<StatsSnapshot> {
    let mut scheme = schemes.create(config.scheme_type())?;
    scheme
        .init(config)
        .with_context(|| format!("Failed to initialize {} scheme", scheme.name()))?;

    let snapshot = match role {
        Role::Writer => {
            let mut writer = writers.create(config.writer_type())?;
            writer
                .init(config)
                .await
                .with_context(|| format!("Failed to initialize {} writer", writer.name()))?;
            info!(
                "\n{}",
                RunDisplay {
                    role,
                    transport: writer.name(),
                    config,
                }
            );
            scheme.run_writer(writer.as_mut(), shutdown).await
        }
        Role::Reader => {
            let mut reader = readers.create(config.reader_type())?;
            reader
                .init(config)
                .await
                .with_context(|| format!("Failed to initialize {} reader", reader.name()))?;
            info!(
                "\n{}",
                RunDisplay {
                    role,
                    transport: reader.name(),
                    config,
                }
            );
            scheme.run_reader(reader.as_mut(), shutdown).await
        }
    };

    info!("{} run complete", role);
    Ok(snapshot)
}
