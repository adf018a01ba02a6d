//! Batch serialization of validated lines into output text

use crate::builder::RecordAssembler;
use crate::error::{ExtractionError, IngestError, Result};
use crate::extractor::RecordExtractor;
use crate::models::PaymentRecord;
use std::str::FromStr;

/// Layout of each JSON object in an output file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Indented, one field per line
    #[default]
    Pretty,
    /// One object per line
    Compact,
}

impl FromStr for OutputFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "compact" => Ok(OutputFormat::Compact),
            other => Err(IngestError::config(format!(
                "Invalid output format '{}': expected pretty or compact",
                other
            ))),
        }
    }
}

/// Result of serializing one file's valid lines
#[derive(Debug, Default)]
pub struct BatchOutput {
    /// Concatenated JSON objects, each followed by a newline
    pub text: String,
    /// Number of records written into `text`
    pub records: usize,
    /// Lines that passed validation but failed extraction
    pub dropped: Vec<ExtractionError>,
}

impl BatchOutput {
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Turns validated lines into output text
///
/// Holds one builder triad, so a serializer belongs to a single worker.
#[derive(Debug)]
pub struct BatchSerializer {
    extractor: RecordExtractor,
    assembler: RecordAssembler,
    format: OutputFormat,
}

impl BatchSerializer {
    pub fn new(extractor: RecordExtractor, format: OutputFormat) -> Self {
        Self {
            extractor,
            assembler: RecordAssembler::new(),
            format,
        }
    }

    pub fn extractor(&self) -> &RecordExtractor {
        &self.extractor
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Extract, assemble and serialize every line
    ///
    /// A line whose extraction fails is dropped and reported in
    /// [`BatchOutput::dropped`]; the rest of the batch is unaffected.
    pub fn serialize_batch<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<BatchOutput> {
        let mut output = BatchOutput::default();

        for line in lines {
            let line = line.as_ref();
            match self.extractor.extract_with(line, &mut self.assembler) {
                Ok(record) => {
                    self.push_record(&mut output.text, &record)?;
                    output.records += 1;
                },
                Err(e) => {
                    tracing::warn!(stage = ?e.stage(), error = %e, "Dropping record");
                    output.dropped.push(e);
                },
            }
        }

        Ok(output)
    }

    fn push_record(&self, buf: &mut String, record: &PaymentRecord) -> Result<()> {
        let json = match self.format {
            OutputFormat::Pretty => serde_json::to_string_pretty(record)?,
            OutputFormat::Compact => serde_json::to_string(record)?,
        };
        buf.push_str(&json);
        buf.push('\n');
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{PatternCatalog, Stage};
    use std::sync::Arc;

    const SAMPLE: &str =
        r#"John, Smith, "123 Example St, Unit 4", 250.75, 2024-03-15, 998877, Electricity"#;

    fn serializer(format: OutputFormat) -> BatchSerializer {
        let catalog = Arc::new(PatternCatalog::new().unwrap());
        BatchSerializer::new(RecordExtractor::new(catalog), format)
    }

    #[test]
    fn test_compact_batch_is_one_object_per_line() {
        let second = r#"Ann, Lee, "7 Main Rd", 10.50, 2023-01-02, 42, Water"#;
        let mut ser = serializer(OutputFormat::Compact);

        let out = ser.serialize_batch(&[SAMPLE, second]).unwrap();

        assert_eq!(out.records, 2);
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["City"], "123 Example St, Unit 4");
        assert_eq!(first["Services"]["Payers"]["Date"], "2024-03-15");
        let second: PaymentRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.service.payer.name, "Ann Lee");
    }

    #[test]
    fn test_pretty_output_parses_back() {
        let mut ser = serializer(OutputFormat::Pretty);

        let out = ser.serialize_batch(&[SAMPLE]).unwrap();

        assert!(out.text.contains("\n  \"Services\": {"));
        assert!(out.text.ends_with("}\n"));
        let record: PaymentRecord = serde_json::from_str(&out.text).unwrap();
        assert_eq!(record.service.payer.account_number, 998877);
    }

    #[test]
    fn test_failed_extraction_is_dropped_not_emitted() {
        let bad_date = r#"John, Smith, "1 A St", 1.00, 2024-02-30, 1, Gas"#;
        let mut ser = serializer(OutputFormat::Compact);

        let out = ser.serialize_batch(&[bad_date, SAMPLE]).unwrap();

        assert_eq!(out.records, 1);
        assert_eq!(out.text.lines().count(), 1);
        assert_eq!(out.dropped.len(), 1);
        assert_eq!(out.dropped[0].stage(), Some(Stage::Date));
    }

    #[test]
    fn test_empty_batch() {
        let mut ser = serializer(OutputFormat::Pretty);
        let out = ser.serialize_batch::<&str>(&[]).unwrap();
        assert!(out.is_empty());
        assert!(out.text.is_empty());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("Pretty".parse::<OutputFormat>().unwrap(), OutputFormat::Pretty);
        assert_eq!(" compact ".parse::<OutputFormat>().unwrap(), OutputFormat::Compact);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
