//! Ingest orchestrator
//!
//! Owns the cancellation token and the shared state, starts the command
//! listener and the rotation scheduler, and drives the scan loop on the
//! calling task until cancellation. The meta log is flushed exactly once,
//! after every worker has stopped.

use crate::catalog::PatternCatalog;
use crate::commands::CommandListener;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::extractor::RecordExtractor;
use crate::lifecycle::{FileLifecycleManager, FileOutcome, Retirer, SkipReason};
use crate::rotation::{Clock, LocalClock, RotationScheduler};
use crate::scanner::DirectoryScanner;
use crate::serializer::BatchSerializer;
use crate::state::{with_state_blocking, IngestState, SharedState};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Totals over one or more scan cycles
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    /// Files whose output was written
    pub files_written: u64,
    /// Files that stopped before being written
    pub files_skipped: u64,
    pub records_written: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        if outcome.skip == Some(SkipReason::Unchanged) {
            return;
        }
        if outcome.output.is_some() {
            self.files_written += 1;
            self.records_written += outcome.accepted as u64;
        } else {
            self.files_skipped += 1;
        }
    }

    fn merge(&mut self, other: RunSummary) {
        self.cycles += other.cycles;
        self.files_written += other.files_written;
        self.files_skipped += other.files_skipped;
        self.records_written += other.records_written;
    }
}

pub struct Orchestrator {
    config: IngestConfig,
    clock: Arc<dyn Clock>,
    token: CancellationToken,
    state: SharedState,
    scanner: DirectoryScanner,
    lifecycle: FileLifecycleManager,
}

impl Orchestrator {
    /// Validate `config` and create today's daily directory
    pub fn new(config: IngestConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(LocalClock))
    }

    pub fn with_clock(config: IngestConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(PatternCatalog::new()?);
        let state = IngestState::open(&config.output_dir, clock.now().date())?.into_shared();

        let scanner = DirectoryScanner::new(&config.extensions, config.retired_marker.clone());
        let serializer = BatchSerializer::new(RecordExtractor::new(catalog), config.output_format);
        let retirer = Retirer::new(config.retire_mode, config.retired_marker.clone());
        let lifecycle = FileLifecycleManager::new(serializer, retirer, state.clone());

        Ok(Self {
            config,
            clock,
            token: CancellationToken::new(),
            state,
            scanner,
            lifecycle,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Scan the inbound directory once and process every eligible file
    ///
    /// Stops between files once cancellation is requested. Only a fatal
    /// error is returned.
    pub async fn run_cycle(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary {
            cycles: 1,
            ..RunSummary::default()
        };

        let scan = match self.scanner.scan(&self.config.inbound_dir) {
            Ok(scan) => scan,
            Err(e) => {
                warn!(
                    dir = %self.config.inbound_dir.display(),
                    error = %e,
                    "Failed to scan inbound directory"
                );
                return Ok(summary);
            },
        };

        if !scan.ineligible.is_empty() {
            let mut state = self.state.lock().await;
            for entry in &scan.ineligible {
                if state.record_invalid_file(&entry.path) {
                    info!(path = %entry.path.display(), "Ineligible file listed as invalid");
                }
            }
        }

        self.lifecycle.forget_missing(&scan.eligible);

        for entry in &scan.eligible {
            if self.token.is_cancelled() {
                break;
            }
            let outcome = self.lifecycle.process(entry).await?;
            summary.record(&outcome);
        }

        Ok(summary)
    }

    /// Run until cancelled by `exit`, an external cancel, or a fatal error
    pub async fn run<R, W>(mut self, commands: R, replies: W) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(
            inbound = %self.config.inbound_dir.display(),
            output = %self.config.output_dir.display(),
            "Ingest orchestrator started"
        );

        let listener = tokio::spawn(CommandListener::new(commands, replies, self.token.clone()).run());
        let rotation = tokio::spawn(
            RotationScheduler::new(
                self.state.clone(),
                self.clock.clone(),
                self.config.rotate_at,
                self.config.rotation_poll(),
            )
            .run(self.token.clone()),
        );

        let result = self.ingest_loop().await;
        if let Err(e) = &result {
            error!(error = %e, "Fatal ingest error, shutting down");
            self.token.cancel();
        }

        if let Err(e) = rotation.await {
            error!(error = %e, "Rotation scheduler task failed");
        }
        match listener.await {
            Ok(Ok(exit)) => info!(?exit, "Command listener stopped"),
            Ok(Err(e)) => warn!(error = %e, "Command listener failed"),
            Err(e) => error!(error = %e, "Command listener task failed"),
        }

        let flushed = with_state_blocking(&self.state, |state| state.flush_meta_log()).await;

        let summary = result?;
        flushed?;

        info!(
            cycles = summary.cycles,
            files_written = summary.files_written,
            files_skipped = summary.files_skipped,
            records_written = summary.records_written,
            "Ingest orchestrator stopped"
        );
        Ok(summary)
    }

    async fn ingest_loop(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        while !self.token.is_cancelled() {
            summary.merge(self.run_cycle().await?);

            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.config.scan_interval()) => {},
            }
        }

        Ok(summary)
    }
}
