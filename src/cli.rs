use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::stats::Role;

/// netspel - measure message throughput, loss and reordering between a
/// writer and a reader process
#[derive(Parser, Debug)]
#[clap(name = "netspel", version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the sending side of a test
    #[clap(visible_alias = "w")]
    Write {
        #[clap(flatten)]
        common: CommonArgs,

        /// Registered writer transport (e.g. udp, tcp)
        #[clap(short = 'w', long, help_heading = "Core Options")]
        writer: Option<String>,
    },

    /// Run the receiving side of a test
    #[clap(visible_alias = "r")]
    Read {
        #[clap(flatten)]
        common: CommonArgs,

        /// Registered reader transport (e.g. udp, tcp)
        #[clap(short = 'r', long, help_heading = "Core Options")]
        reader: Option<String>,
    },
}

/// Options shared by both sides of a test.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CommonArgs {
    /// JSON config file
    #[clap(short = 'c', long = "config", help_heading = "Core Options")]
    pub config: Option<PathBuf>,

    /// Registered scheme (e.g. simple, streaming)
    #[clap(short = 's', long, help_heading = "Core Options")]
    pub scheme: Option<String>,

    /// Set a string setting, as key=value (repeatable)
    #[clap(long = "config-string", value_name = "KEY=VALUE")]
    pub config_strings: Vec<String>,

    /// Set an integer setting, as key=value (repeatable)
    #[clap(long = "config-int", value_name = "KEY=VALUE")]
    pub config_ints: Vec<String>,

    /// Log level: error, warn, info, debug or trace. RUST_LOG takes precedence.
    #[clap(short = 'l', long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn role(&self) -> Role {
        match self.command {
            Command::Write { .. } => Role::Writer,
            Command::Read { .. } => Role::Reader,
        }
    }

    pub fn common(&self) -> &CommonArgs {
        match &self.command {
            Command::Write { common, .. } | Command::Read { common, .. } => common,
        }
    }

    pub fn log_level(&self) -> &str {
        &self.common().log_level
    }

    /// Command-line settings in the form [`crate::config::Config::resolve`]
    /// applies on top of the config file.
    pub fn overrides(&self) -> ConfigOverrides {
        let common = self.common();
        let (writer_type, reader_type) = match &self.command {
            Command::Write { writer, .. } => (writer.clone(), None),
            Command::Read { reader, .. } => (None, reader.clone()),
        };
        ConfigOverrides {
            config_path: common.config.clone(),
            scheme_type: common.scheme.clone(),
            writer_type,
            reader_type,
            strings: common.config_strings.clone(),
            ints: common.config_ints.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_command() {
        let args = Args::try_parse_from([
            "netspel",
            "write",
            "-s",
            "streaming",
            "-w",
            "tcp",
            "--config-int",
            "streaming.messages_per_second=500",
            "--config-int",
            "tcp.port=9000",
            "--config-string",
            "tcp.host=localhost",
        ])
        .unwrap();

        assert_eq!(args.role(), Role::Writer);
        let overrides = args.overrides();
        assert_eq!(overrides.scheme_type.as_deref(), Some("streaming"));
        assert_eq!(overrides.writer_type.as_deref(), Some("tcp"));
        assert_eq!(overrides.reader_type, None);
        assert_eq!(
            overrides.ints,
            vec!["streaming.messages_per_second=500", "tcp.port=9000"]
        );
        assert_eq!(overrides.strings, vec!["tcp.host=localhost"]);
        assert_eq!(args.log_level(), "info");
    }

    #[test]
    fn test_read_alias_and_short_flags() {
        let args = Args::try_parse_from([
            "netspel", "r", "-c", "run.json", "-r", "udp", "-l", "debug",
        ])
        .unwrap();

        assert_eq!(args.role(), Role::Reader);
        assert_eq!(args.log_level(), "debug");
        let overrides = args.overrides();
        assert_eq!(overrides.config_path, Some(PathBuf::from("run.json")));
        assert_eq!(overrides.reader_type.as_deref(), Some("udp"));
        assert_eq!(overrides.writer_type, None);
    }

    #[test]
    fn test_write_alias() {
        let args = Args::try_parse_from(["netspel", "w"]).unwrap();
        assert_eq!(args.role(), Role::Writer);
        assert!(args.overrides().scheme_type.is_none());
    }

    #[test]
    fn test_reader_flag_rejected_on_write() {
        assert!(Args::try_parse_from(["netspel", "write", "-r", "udp"]).is_err());
        assert!(Args::try_parse_from(["netspel"]).is_err());
    }
}
