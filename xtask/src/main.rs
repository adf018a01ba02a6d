//! Build automation tasks for Payflow
//!
//! - Generating the ingest daemon's CLI reference from its clap definition

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for Payflow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the payflow-ingest CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<payflow_ingest::Cli>();

    let content = format!(
        r#"# payflow-ingest CLI Reference

Generated from the CLI source code on {}.

## Overview

`payflow-ingest` watches an inbound directory for payment record files
(`.txt`, `.csv`), writes every valid record as JSON into
`<output>/<YYYY-MM-DD>/Output<N>.txt`, and retires each processed source.
Output rotates into a new daily directory at the configured time of day;
`meta.log` in each daily directory lists the error count and invalid files.

Type `exit` on standard input, or send Ctrl+C / SIGTERM, to stop.

## Commands

{}

## Environment Variables

- `PAYFLOW_INBOUND_DIR` - Inbound directory (required unless `--inbound` is given)
- `PAYFLOW_OUTPUT_DIR` - Output root (required unless `--output` is given)
- `PAYFLOW_EXTENSIONS` - Allowed extensions (default: `txt,csv`)
- `PAYFLOW_RETIRED_MARKER` - Name marker of retired sources (default: `Source`)
- `PAYFLOW_RETIRE_MODE` - `rename` or `delete` (default: `rename`)
- `PAYFLOW_OUTPUT_FORMAT` - `pretty` or `compact` (default: `pretty`)
- `PAYFLOW_SCAN_INTERVAL_MS` - Pause between scans (default: `1000`)
- `PAYFLOW_ROTATION_POLL_MS` - Rotation clock poll interval (default: `1000`)
- `PAYFLOW_ROTATE_AT` - Local rotation time, `HH:MM[:SS]` (default: `00:00`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - Diagnostic logging

## Input Format

One record per line:

```text
John, Smith, "123 Example St, Unit 4", 250.75, 2024-03-15, 998877, Electricity
```

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
