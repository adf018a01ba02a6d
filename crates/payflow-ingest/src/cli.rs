//! Command line interface of the ingest daemon

use crate::config::{parse_time_of_day, IngestConfig, ENV_INBOUND_DIR, ENV_OUTPUT_DIR};
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "payflow-ingest")]
#[command(author, version, about = "Payment record ingestion daemon")]
#[command(long_about = "Watches an inbound directory for payment record files, converts valid \
records to JSON in per-day output directories and retires processed sources. Type 'exit' on \
standard input or send Ctrl+C to stop.")]
pub struct Cli {
    /// Inbound directory to watch
    #[arg(short, long, env = "PAYFLOW_INBOUND_DIR")]
    pub inbound: Option<PathBuf>,

    /// Root directory for daily output directories
    #[arg(short, long, env = "PAYFLOW_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// What to do with processed source files (rename or delete)
    #[arg(long, env = "PAYFLOW_RETIRE_MODE")]
    pub retire_mode: Option<String>,

    /// Local time of day for daily rotation (HH:MM or HH:MM:SS)
    #[arg(long, env = "PAYFLOW_ROTATE_AT")]
    pub rotate_at: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Environment configuration with the given flags laid over it, validated
    pub fn load_config(&self) -> Result<IngestConfig> {
        let flag = |path: &Option<PathBuf>| path.as_ref().map(|p| p.to_string_lossy().into_owned());

        let mut config = IngestConfig::from_lookup(|key| match key {
            ENV_INBOUND_DIR => flag(&self.inbound).or_else(|| std::env::var(key).ok()),
            ENV_OUTPUT_DIR => flag(&self.output).or_else(|| std::env::var(key).ok()),
            _ => std::env::var(key).ok(),
        })?;
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut IngestConfig) -> Result<()> {
        if let Some(inbound) = &self.inbound {
            config.inbound_dir = inbound.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(mode) = &self.retire_mode {
            config.retire_mode = mode.parse()?;
        }
        if let Some(at) = &self.rotate_at {
            config.rotate_at = parse_time_of_day(at)?;
        }
        Ok(())
    }
}
