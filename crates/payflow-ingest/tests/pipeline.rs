//! End-to-end tests driving the orchestrator against temporary directories
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{NaiveDate, NaiveDateTime};
use payflow_ingest::lifecycle::RetireMode;
use payflow_ingest::rotation::Clock;
use payflow_ingest::serializer::OutputFormat;
use payflow_ingest::{IngestConfig, Orchestrator, PaymentRecord, Result, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

const SAMPLE: &str =
    r#"John, Smith, "123 Example St, Unit 4", 250.75, 2024-03-15, 998877, Electricity"#;
const MALFORMED: &str = "garbage,not,a,record";

struct TestClock(Mutex<NaiveDateTime>);

impl TestClock {
    fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

struct Harness {
    tmp: TempDir,
    config: IngestConfig,
    clock: Arc<TestClock>,
}

impl Harness {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let inbound = tmp.path().join("inbound");
        std::fs::create_dir(&inbound).unwrap();
        let mut config = IngestConfig::new(inbound, tmp.path().join("output"));
        config.scan_interval_ms = 10;
        config.rotation_poll_ms = 10;
        Self {
            tmp,
            config,
            clock: Arc::new(TestClock(Mutex::new(at(15, 12, 0, 0)))),
        }
    }

    fn inbound(&self) -> &Path {
        &self.config.inbound_dir
    }

    fn daily(&self, day: u32) -> PathBuf {
        self.config.output_dir.join(format!("2024-03-{day:02}"))
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::with_clock(self.config.clone(), self.clock.clone()).unwrap()
    }

    /// Start the orchestrator; returns the console end and the run handle
    fn start(&self, orchestrator: Orchestrator) -> (DuplexStream, JoinHandle<Result<RunSummary>>) {
        let (console, commands) = tokio::io::duplex(256);
        let handle = tokio::spawn(orchestrator.run(BufReader::new(commands), tokio::io::sink()));
        (console, handle)
    }
}

async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn send_exit(console: &mut DuplexStream) {
    console.write_all(b"exit\n").await.unwrap();
}

fn records(path: &Path) -> Vec<PaymentRecord> {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::Deserializer::from_str(&text)
        .into_iter::<PaymentRecord>()
        .collect::<std::result::Result<_, _>>()
        .unwrap()
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let h = Harness::new();
    let input = h.inbound().join("payments.txt");
    std::fs::write(&input, format!("{SAMPLE}\n{MALFORMED}\n")).unwrap();

    let (mut console, handle) = h.start(h.orchestrator());
    let retired = h.inbound().join("Source1.txt");
    wait_for("source retirement", || retired.exists()).await;
    send_exit(&mut console).await;
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.files_written, 1);
    assert_eq!(summary.records_written, 1);
    assert!(!input.exists());

    let output = h.daily(15).join("Output1.txt");
    let written = records(&output);
    assert_eq!(written.len(), 1);
    let record = &written[0];
    assert_eq!(record.city, "123 Example St, Unit 4");
    assert_eq!(record.service.name, "Electricity");
    assert_eq!(record.service.payer.name, "John Smith");
    assert_eq!(record.service.payer.payment, 250);
    assert_eq!(record.service.payer.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    assert_eq!(record.service.payer.account_number, 998877);

    // Retired file carries the marker, so later scans list it as invalid
    let meta = std::fs::read_to_string(h.daily(15).join("meta.log")).unwrap();
    assert!(meta.starts_with("found_errors: 1\ninvalid files:\n"), "{meta}");
}

#[tokio::test]
async fn test_existing_output_is_never_overwritten() {
    let mut h = Harness::new();
    h.config.output_format = OutputFormat::Compact;
    h.config.retire_mode = RetireMode::Delete;
    let orchestrator = h.orchestrator();
    std::fs::write(h.daily(15).join("Output1.txt"), "from an earlier run\n").unwrap();

    std::fs::write(h.inbound().join("a.txt"), SAMPLE).unwrap();
    let (mut console, handle) = h.start(orchestrator);
    let second = h.daily(15).join("Output2.txt");
    wait_for("first output", || second.exists()).await;

    std::fs::write(h.inbound().join("b.csv"), SAMPLE).unwrap();
    let third = h.daily(15).join("Output3.txt");
    wait_for("second output", || third.exists()).await;
    send_exit(&mut console).await;
    handle.await.unwrap().unwrap();

    assert_eq!(
        std::fs::read_to_string(h.daily(15).join("Output1.txt")).unwrap(),
        "from an earlier run\n"
    );
    assert_eq!(records(&second).len(), 1);
    assert_eq!(records(&third).len(), 1);
}

#[tokio::test]
async fn test_source_survives_failed_write() {
    let h = Harness::new();
    let orchestrator = h.orchestrator();
    let input = h.inbound().join("payments.txt");
    std::fs::write(&input, SAMPLE).unwrap();

    // Replace the output root with a plain file
    std::fs::remove_dir_all(&h.config.output_dir).unwrap();
    std::fs::write(&h.config.output_dir, "not a directory").unwrap();

    let (_console, handle) = h.start(orchestrator);
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();

    assert!(result.unwrap_err().is_fatal());
    assert_eq!(std::fs::read_to_string(&input).unwrap(), SAMPLE);
    assert!(!h.inbound().join("Source1.txt").exists());
}

#[tokio::test]
async fn test_rotation_moves_output_to_next_day() {
    let mut h = Harness::new();
    h.config.retire_mode = RetireMode::Delete;
    h.clock.set(at(15, 23, 59, 59));
    let orchestrator = h.orchestrator();
    let state = orchestrator.state();
    std::fs::write(h.inbound().join("junk.txt"), MALFORMED).unwrap();
    std::fs::write(h.inbound().join("a.txt"), SAMPLE).unwrap();

    let (mut console, handle) = h.start(orchestrator);
    wait_for("first day output", || h.daily(15).join("Output1.txt").exists()).await;
    let junk = h.inbound().join("junk.txt");
    wait_for("junk listed as invalid", || {
        state
            .try_lock()
            .map(|state| state.invalid_files().contains(&junk))
            .unwrap_or(false)
    })
    .await;

    h.clock.set(at(16, 0, 0, 1));
    wait_for("rotation", || h.daily(16).is_dir()).await;

    std::fs::write(h.inbound().join("b.txt"), SAMPLE).unwrap();
    wait_for("second day output", || h.daily(16).join("Output1.txt").exists()).await;
    send_exit(&mut console).await;
    handle.await.unwrap().unwrap();

    let first_day = std::fs::read_to_string(h.daily(15).join("meta.log")).unwrap();
    assert_eq!(
        first_day,
        format!("found_errors: 1\ninvalid files:\n{}\n", junk.display())
    );

    // Counters restarted with the new day
    let second_day = std::fs::read_to_string(h.daily(16).join("meta.log")).unwrap();
    assert_eq!(second_day, "found_errors: 0\ninvalid files:\n");

    // Nothing was written for it, so it stays for the operator
    assert_eq!(std::fs::read_to_string(&junk).unwrap(), MALFORMED);
}

#[tokio::test]
async fn test_unknown_command_keeps_running() {
    let h = Harness::new();
    let (mut console, handle) = h.start(h.orchestrator());

    console.write_all(b"status\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    send_exit(&mut console).await;
    let summary = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(summary.cycles >= 1);
    assert!(h.tmp.path().join("output").join("2024-03-15").join("meta.log").exists());
}
