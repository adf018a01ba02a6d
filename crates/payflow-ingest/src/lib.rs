//! Payflow Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns loosely structured payment record files into JSON output.
//!
//! # Pipeline
//!
//! - **Scanning**: [`scanner::DirectoryScanner`] picks eligible inbound files
//! - **Validation and extraction**: [`extractor::RecordExtractor`] applies the
//!   grammars of [`catalog::PatternCatalog`] line by line
//! - **Assembly**: the builders in [`builder`] nest fields into
//!   [`models::PaymentRecord`]
//! - **Serialization**: [`serializer::BatchSerializer`] renders a file's records
//! - **Lifecycle**: [`lifecycle::FileLifecycleManager`] writes output and retires
//!   the source
//! - **Workers**: [`orchestrator::Orchestrator`] runs the scan loop next to the
//!   [`rotation::RotationScheduler`] and [`commands::CommandListener`]
//!
//! # Example
//!
//! ```no_run
//! use payflow_ingest::{IngestConfig, Orchestrator};
//! use tokio::io::BufReader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::new("./inbound", "./output");
//!     let orchestrator = Orchestrator::new(config)?;
//!     let summary = orchestrator
//!         .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
//!         .await?;
//!     println!("{} records written", summary.records_written);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod extractor;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod rotation;
pub mod scanner;
pub mod serializer;
pub mod state;

pub use cli::Cli;
pub use config::IngestConfig;
pub use error::{ExtractionError, IngestError, Result};
pub use models::{PayerRecord, PaymentRecord, ServiceRecord};
pub use orchestrator::{Orchestrator, RunSummary};
