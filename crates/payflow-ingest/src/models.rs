// Payment record data model
//
// Field names on the wire follow the output contract consumed downstream:
// { "City", "Services": { "Name", "Payers": { "Name", "Payment", "Date",
// "Account_Number" }, "Total" }, "Total" }

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Payment (outer record)
// ============================================================================

/// One extracted payment, nesting exactly one service and one payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Address text without its quote delimiters
    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "Services")]
    pub service: ServiceRecord,

    /// Whole currency units; fractional cents are truncated
    #[serde(rename = "Total")]
    pub total: i64,
}

// ============================================================================
// Service (sub-record)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Service name (e.g., "Electricity")
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Payers")]
    pub payer: PayerRecord,

    #[serde(rename = "Total")]
    pub total: i64,
}

// ============================================================================
// Payer (leaf fields)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerRecord {
    /// First and last name joined by a space (e.g., "John Smith")
    #[serde(rename = "Name")]
    pub name: String,

    /// Whole currency units; fractional cents are truncated
    #[serde(rename = "Payment")]
    pub payment: i64,

    /// Serialized as ISO 8601 (YYYY-MM-DD)
    #[serde(rename = "Date")]
    pub date: NaiveDate,

    #[serde(rename = "Account_Number")]
    pub account_number: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape_uses_contract_names() {
        let record = PaymentRecord {
            city: "123 Example St, Unit 4".to_string(),
            service: ServiceRecord {
                name: "Electricity".to_string(),
                payer: PayerRecord {
                    name: "John Smith".to_string(),
                    payment: 250,
                    date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                    account_number: 998877,
                },
                total: 250,
            },
            total: 250,
        };

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["City"], "123 Example St, Unit 4");
        assert_eq!(json["Total"], 250);
        assert_eq!(json["Services"]["Name"], "Electricity");
        assert_eq!(json["Services"]["Total"], 250);
        assert_eq!(json["Services"]["Payers"]["Name"], "John Smith");
        assert_eq!(json["Services"]["Payers"]["Payment"], 250);
        assert_eq!(json["Services"]["Payers"]["Date"], "2024-03-15");
        assert_eq!(json["Services"]["Payers"]["Account_Number"], 998877);
    }

    #[test]
    fn test_field_order_matches_contract() {
        let record = PaymentRecord {
            city: "A".to_string(),
            service: ServiceRecord {
                name: "Gas".to_string(),
                payer: PayerRecord {
                    name: "B C".to_string(),
                    payment: 1,
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    account_number: 7,
                },
                total: 1,
            },
            total: 1,
        };

        let text = serde_json::to_string(&record).unwrap();

        assert!(text.starts_with(r#"{"City":"A","Services":{"Name":"Gas","Payers":{"Name""#));
        assert!(text.ends_with(r#""Account_Number":7},"Total":1},"Total":1}"#));
    }
}
