//! Recognition grammars for inbound payment lines
//!
//! A line is structurally valid when it matches [`RECORD_PATTERN`]:
//!
//! ```text
//! Name, Name, "Address text", Decimal.Decimal, YYYY-MM-DD, Digits, ServiceWord
//! ```
//!
//! Field extraction then applies one pattern per [`Stage`], in
//! [`Stage::ORDER`], each against the text left over by the previous stage.
//! The field patterns are deliberately broad (the full-name pattern accepts
//! any run of letters, commas and spaces), so they are only correct on the
//! stripped remainder, never on the original line.

use crate::error::Result;
use regex::Regex;

/// Whole-line grammar; the address may use straight or curly quotes and the
/// account number may be quoted
pub const RECORD_PATTERN: &str = concat!(
    r#"^[A-Za-z]+,\s+[A-Za-z]+,\s+["“”][A-Za-z0-9,\s]+["“”],\s+"#,
    r#"\d+\.\d{1,2},\s+\d{4}-\d{2}-\d{2},\s+["“”]?\d+["“”]?,\s+[A-Za-z]+$"#,
);

pub const ADDRESS_PATTERN: &str = r#"["“”][A-Za-z0-9,\s]+["“”]"#;
pub const FULL_NAME_PATTERN: &str = r"[A-Za-z,\s]+";
pub const TOTAL_PATTERN: &str = r"\d+\.\d{1,2}";
pub const DATE_PATTERN: &str = r"\d{4}-\d{2}-\d{2}";
pub const ACCOUNT_NUMBER_PATTERN: &str = r"\d+";
pub const SERVICE_NAME_PATTERN: &str = r"[A-Za-z]+";

/// One step of the destructive extraction pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Address,
    FullName,
    Total,
    Date,
    AccountNumber,
    ServiceName,
}

impl Stage {
    /// Extraction order. Changing it changes which text each pattern sees.
    pub const ORDER: [Stage; 6] = [
        Stage::Address,
        Stage::FullName,
        Stage::Total,
        Stage::Date,
        Stage::AccountNumber,
        Stage::ServiceName,
    ];

    pub fn pattern(self) -> &'static str {
        match self {
            Stage::Address => ADDRESS_PATTERN,
            Stage::FullName => FULL_NAME_PATTERN,
            Stage::Total => TOTAL_PATTERN,
            Stage::Date => DATE_PATTERN,
            Stage::AccountNumber => ACCOUNT_NUMBER_PATTERN,
            Stage::ServiceName => SERVICE_NAME_PATTERN,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Address => "address",
            Stage::FullName => "full name",
            Stage::Total => "total amount",
            Stage::Date => "date",
            Stage::AccountNumber => "account number",
            Stage::ServiceName => "service name",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled grammars, built once at startup and shared read-only
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    record: Regex,
    stages: [Regex; 6],
}

impl PatternCatalog {
    /// Compile the record grammar and every stage pattern
    pub fn new() -> Result<Self> {
        Ok(Self {
            record: Regex::new(RECORD_PATTERN)?,
            stages: [
                Regex::new(Stage::Address.pattern())?,
                Regex::new(Stage::FullName.pattern())?,
                Regex::new(Stage::Total.pattern())?,
                Regex::new(Stage::Date.pattern())?,
                Regex::new(Stage::AccountNumber.pattern())?,
                Regex::new(Stage::ServiceName.pattern())?,
            ],
        })
    }

    /// Test a single line against the record grammar
    pub fn is_record(&self, line: &str) -> bool {
        self.record.is_match(line)
    }

    pub fn stage_pattern(&self, stage: Stage) -> &Regex {
        &self.stages[stage.index()]
    }
}
