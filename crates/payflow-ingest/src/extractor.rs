//! Line validation and field extraction
//!
//! Extraction threads the unconsumed remainder of a line through every
//! [`Stage`] in order. Each stage takes the leftmost match of its pattern,
//! removes exactly that span from the remainder and hands the rest on:
//!
//! ```text
//! John, Smith, "123 Example St, Unit 4", 250.75, 2024-03-15, 998877, Electricity
//!   address  -> John, Smith, , 250.75, 2024-03-15, 998877, Electricity
//!   name     -> 250.75, 2024-03-15, 998877, Electricity
//!   total    -> , 2024-03-15, 998877, Electricity
//!   date     -> , , 998877, Electricity
//!   account  -> , , , Electricity
//!   service  -> , , ,
//! ```
//!
//! A stage with no match fails the whole record with a tagged
//! [`ExtractionError`]; nothing partial is ever produced.

use crate::builder::RecordAssembler;
use crate::catalog::{PatternCatalog, Stage};
use crate::error::ExtractionError;
use crate::models::PaymentRecord;
use chrono::NaiveDate;
use std::sync::Arc;

const ADDRESS_QUOTES: [char; 3] = ['"', '“', '”'];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Converted field values of one line, ready for assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub city: String,
    pub payer_name: String,
    pub payment: i64,
    pub date: NaiveDate,
    pub account_number: i64,
    pub service_name: String,
}

/// Lines of one file after grammar validation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineBatch {
    /// Lines that matched the record grammar, trimmed, in file order
    pub valid: Vec<String>,
    /// Non-empty lines that failed the grammar
    pub rejected: usize,
}

impl LineBatch {
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }
}

/// Applies the pattern catalog to raw lines
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    catalog: Arc<PatternCatalog>,
}

impl RecordExtractor {
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    /// Check one line against the whole-record grammar
    ///
    /// Surrounding whitespace, including a trailing `\r`, is ignored.
    pub fn validate(&self, line: &str) -> bool {
        self.catalog.is_record(line.trim())
    }

    /// Split file text on newlines and sort the lines into valid and rejected
    ///
    /// Blank segments are skipped and count as neither.
    pub fn partition(&self, text: &str) -> LineBatch {
        let mut batch = LineBatch::default();

        for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
            if self.catalog.is_record(line) {
                batch.valid.push(line.to_string());
            } else {
                tracing::debug!(line = %line, "Line rejected by record grammar");
                batch.rejected += 1;
            }
        }

        batch
    }

    /// Run the ordered stripping pipeline and convert every field
    pub fn fields(&self, line: &str) -> Result<ExtractedFields, ExtractionError> {
        let remaining = line.trim().to_string();

        let (address, remaining) = self.take(Stage::Address, &remaining)?;
        let (name, remaining) = self.take(Stage::FullName, &remaining)?;
        let (total, remaining) = self.take(Stage::Total, &remaining)?;
        let (date, remaining) = self.take(Stage::Date, &remaining)?;
        let (account, remaining) = self.take(Stage::AccountNumber, &remaining)?;
        let (service, _) = self.take(Stage::ServiceName, &remaining)?;

        Ok(ExtractedFields {
            city: address.trim_matches(&ADDRESS_QUOTES[..]).to_string(),
            payer_name: parse_full_name(&name)?,
            payment: parse_whole_units(&total)?,
            date: parse_date(&date)?,
            account_number: parse_account(&account)?,
            service_name: service,
        })
    }

    /// Extract and assemble one record with a fresh builder triad
    pub fn extract(&self, line: &str) -> Result<PaymentRecord, ExtractionError> {
        let mut assembler = RecordAssembler::new();
        self.extract_with(line, &mut assembler)
    }

    /// Extract and assemble one record, reusing the caller's builders
    pub fn extract_with(
        &self,
        line: &str,
        assembler: &mut RecordAssembler,
    ) -> Result<PaymentRecord, ExtractionError> {
        let fields = self.fields(line)?;
        assembler.assemble(fields)
    }

    /// Remove the leftmost match of `stage` from `remaining`
    fn take(&self, stage: Stage, remaining: &str) -> Result<(String, String), ExtractionError> {
        let found = self
            .catalog
            .stage_pattern(stage)
            .find(remaining)
            .ok_or_else(|| ExtractionError::NoMatch {
                stage,
                remaining: remaining.to_string(),
            })?;

        let mut rest = String::with_capacity(remaining.len() - found.len());
        rest.push_str(&remaining[..found.start()]);
        rest.push_str(&remaining[found.end()..]);

        Ok((found.as_str().to_string(), rest))
    }
}

fn parse_full_name(raw: &str) -> Result<String, ExtractionError> {
    let name = raw.replace(',', "");
    let name = name.trim();
    if name.is_empty() {
        return Err(ExtractionError::InvalidValue {
            stage: Stage::FullName,
            value: raw.to_string(),
            reason: "no name characters".to_string(),
        });
    }
    Ok(name.to_string())
}

/// Integer part of a decimal amount; the fraction is dropped, not rounded
fn parse_whole_units(raw: &str) -> Result<i64, ExtractionError> {
    let whole = raw.split('.').next().unwrap_or(raw);
    whole.parse().map_err(|e: std::num::ParseIntError| ExtractionError::InvalidValue {
        stage: Stage::Total,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, ExtractionError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| ExtractionError::InvalidValue {
        stage: Stage::Date,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_account(raw: &str) -> Result<i64, ExtractionError> {
    raw.parse().map_err(|e: std::num::ParseIntError| ExtractionError::InvalidValue {
        stage: Stage::AccountNumber,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str =
        r#"John, Smith, "123 Example St, Unit 4", 250.75, 2024-03-15, 998877, Electricity"#;

    fn extractor() -> RecordExtractor {
        RecordExtractor::new(Arc::new(PatternCatalog::new().unwrap()))
    }

    #[test]
    fn test_extract_sample_line() {
        let record = extractor().extract(SAMPLE).unwrap();

        assert_eq!(record.city, "123 Example St, Unit 4");
        assert_eq!(record.total, 250);
        assert_eq!(record.service.name, "Electricity");
        assert_eq!(record.service.total, 250);
        assert_eq!(record.service.payer.name, "John Smith");
        assert_eq!(record.service.payer.payment, 250);
        assert_eq!(
            record.service.payer.date,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert_eq!(record.service.payer.account_number, 998877);
    }

    #[test]
    fn test_payment_is_truncated_not_rounded() {
        let line = r#"Ann, Lee, "7 Main Rd", 10.99, 2023-01-02, 42, Water"#;
        let fields = extractor().fields(line).unwrap();
        assert_eq!(fields.payment, 10);
    }

    #[test]
    fn test_address_digits_do_not_leak_into_later_stages() {
        // The address holds digits and a comma-separated word run that looks
        // like a name; it must be consumed before the name and account stages
        let line = r#"Ann, Lee, "45 Baker St, Flat 2", 99.10, 2022-07-01, 31337, Water"#;

        let fields = extractor().fields(line).unwrap();

        assert_eq!(fields.city, "45 Baker St, Flat 2");
        assert_eq!(fields.payer_name, "Ann Lee");
        assert_eq!(fields.payment, 99);
        assert_eq!(fields.account_number, 31337);
        assert_eq!(fields.service_name, "Water");
    }

    #[test]
    fn test_curly_quotes_and_quoted_account() {
        let line = "Ann, Lee, “7 Main Rd”, 10.5, 2023-01-02, “42”, Water";

        let fields = extractor().fields(line).unwrap();

        assert_eq!(fields.city, "7 Main Rd");
        assert_eq!(fields.account_number, 42);
    }

    #[test]
    fn test_validate_ignores_carriage_return() {
        let ex = extractor();
        assert!(ex.validate(&format!("{SAMPLE}\r")));
        assert!(!ex.validate("garbage,not,a,record"));
    }

    #[test]
    fn test_partition_counts_each_invalid_line_once() {
        let text = format!("{SAMPLE}\r\ngarbage,not,a,record\n\n   \n{SAMPLE}\n");

        let batch = extractor().partition(&text);

        assert_eq!(batch.valid.len(), 2);
        assert_eq!(batch.rejected, 1);
        assert_eq!(batch.valid[0], SAMPLE);
    }

    #[test]
    fn test_missing_stage_reports_stage() {
        // Bypasses validation: no address to strip
        let err = extractor()
            .fields("John, Smith, 250.75, 2024-03-15, 998877, Electricity")
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Address));
    }

    #[test]
    fn test_impossible_date_is_invalid_value() {
        let line = r#"John, Smith, "1 A St", 1.00, 2024-13-45, 1, Gas"#;
        assert!(extractor().validate(line));

        let err = extractor().fields(line).unwrap_err();

        assert!(matches!(
            err,
            ExtractionError::InvalidValue { stage: Stage::Date, .. }
        ));
    }

    #[test]
    fn test_account_overflow_is_invalid_value() {
        let line = r#"John, Smith, "1 A St", 1.00, 2024-01-01, 99999999999999999999999, Gas"#;
        let err = extractor().fields(line).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::AccountNumber));
    }

    #[test]
    fn test_extract_with_reuses_assembler() {
        let ex = extractor();
        let mut assembler = RecordAssembler::new();
        let second_line = r#"Bob, Ray, "9 Elm Ave", 5.00, 2021-05-05, 7, Gas"#;

        let first = ex.extract_with(SAMPLE, &mut assembler).unwrap();
        let second = ex.extract_with(second_line, &mut assembler).unwrap();

        assert_eq!(first.service.payer.name, "John Smith");
        assert_eq!(second.service.payer.name, "Bob Ray");
        assert_eq!(second.city, "9 Elm Ave");
    }

    fn word() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{0,9}"
    }

    fn address() -> impl Strategy<Value = String> {
        "[0-9]{1,4}( [A-Za-z0-9]{1,8}){1,3}(, [A-Za-z]{1,6} [0-9]{1,3})?"
    }

    proptest! {
        #[test]
        fn prop_valid_lines_extract_every_field(
            first in word(),
            last in word(),
            addr in address(),
            whole in 0u32..1_000_000,
            cents in 0u32..100,
            (year, month, day) in (1000i32..=9999, 1u32..=12, 1u32..=28),
            account in 0u32..u32::MAX,
            service in word(),
        ) {
            let line = format!(
                "{first}, {last}, \"{addr}\", {whole}.{cents:02}, \
                 {year:04}-{month:02}-{day:02}, {account}, {service}"
            );
            let ex = extractor();
            prop_assert!(ex.validate(&line));

            let fields = ex.fields(&line).unwrap();

            prop_assert_eq!(fields.city, addr);
            prop_assert_eq!(fields.payer_name, format!("{first} {last}"));
            prop_assert_eq!(fields.payment, i64::from(whole));
            prop_assert_eq!(fields.date, NaiveDate::from_ymd_opt(year, month, day).unwrap());
            prop_assert_eq!(fields.account_number, i64::from(account));
            prop_assert_eq!(fields.service_name, service);
        }

        #[test]
        fn prop_unquoted_address_is_always_rejected(
            first in word(),
            last in word(),
            addr in address(),
            service in word(),
        ) {
            let line = format!("{first}, {last}, {addr}, 1.00, 2020-01-01, 1, {service}");
            let batch = extractor().partition(&line);
            prop_assert!(batch.valid.is_empty());
            prop_assert_eq!(batch.rejected, 1);
        }
    }
}
