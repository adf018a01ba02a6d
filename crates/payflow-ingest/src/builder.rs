//! Record assembly
//!
//! Three builders accumulate the nested record one level at a time: payer
//! first, then the service wrapping it, then the payment wrapping both.
//! `build()` consumes the builder, so a builder can never leak fields from
//! one record into the next; reuse goes through [`RecordAssembler`], which
//! resets its builders before every record and takes them when building.
//!
//! Builders are not shared between tasks. One assembler serves one worker,
//! one record at a time.

use crate::error::ExtractionError;
use crate::extractor::ExtractedFields;
use crate::models::{PayerRecord, PaymentRecord, ServiceRecord};
use chrono::NaiveDate;

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ExtractionError> {
    value.ok_or(ExtractionError::MissingField { field })
}

/// Builder for the outer payment record
#[derive(Debug, Default)]
pub struct PaymentBuilder {
    city: Option<String>,
    service: Option<ServiceRecord>,
    total: i64,
}

impl PaymentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(&mut self, city: impl Into<String>) -> &mut Self {
        self.city = Some(city.into());
        self
    }

    pub fn service(&mut self, service: ServiceRecord) -> &mut Self {
        self.service = Some(service);
        self
    }

    pub fn total(&mut self, total: i64) -> &mut Self {
        self.total = total;
        self
    }

    /// Discard everything set so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Produce the record; city and service are required
    pub fn build(self) -> Result<PaymentRecord, ExtractionError> {
        Ok(PaymentRecord {
            city: require(self.city, "City")?,
            service: require(self.service, "Services")?,
            total: self.total,
        })
    }
}

/// Builder for the service sub-record
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    name: Option<String>,
    payer: Option<PayerRecord>,
    total: i64,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn payer(&mut self, payer: PayerRecord) -> &mut Self {
        self.payer = Some(payer);
        self
    }

    pub fn total(&mut self, total: i64) -> &mut Self {
        self.total = total;
        self
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn build(self) -> Result<ServiceRecord, ExtractionError> {
        Ok(ServiceRecord {
            name: require(self.name, "Services.Name")?,
            payer: require(self.payer, "Services.Payers")?,
            total: self.total,
        })
    }
}

/// Builder for the payer leaf record
#[derive(Debug, Default)]
pub struct PayerBuilder {
    name: Option<String>,
    payment: Option<i64>,
    date: Option<NaiveDate>,
    account_number: Option<i64>,
}

impl PayerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn payment(&mut self, payment: i64) -> &mut Self {
        self.payment = Some(payment);
        self
    }

    pub fn date(&mut self, date: NaiveDate) -> &mut Self {
        self.date = Some(date);
        self
    }

    pub fn account_number(&mut self, account_number: i64) -> &mut Self {
        self.account_number = Some(account_number);
        self
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn build(self) -> Result<PayerRecord, ExtractionError> {
        Ok(PayerRecord {
            name: require(self.name, "Payers.Name")?,
            payment: require(self.payment, "Payers.Payment")?,
            date: require(self.date, "Payers.Date")?,
            account_number: require(self.account_number, "Payers.Account_Number")?,
        })
    }
}

/// Reusable builder triad for one worker
#[derive(Debug, Default)]
pub struct RecordAssembler {
    payment: PaymentBuilder,
    service: ServiceBuilder,
    payer: PayerBuilder,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all three builders
    pub fn reset(&mut self) {
        self.payment.reset();
        self.service.reset();
        self.payer.reset();
    }

    /// Nest extracted fields into a payment record
    ///
    /// Both totals carry the single payer's payment rather than staying at
    /// zero; with one payer per record the sum is that payment.
    pub fn assemble(&mut self, fields: ExtractedFields) -> Result<PaymentRecord, ExtractionError> {
        self.reset();

        self.payer
            .name(fields.payer_name)
            .payment(fields.payment)
            .date(fields.date)
            .account_number(fields.account_number);
        let payer = std::mem::take(&mut self.payer).build()?;

        self.service
            .name(fields.service_name)
            .payer(payer)
            .total(fields.payment);
        let service = std::mem::take(&mut self.service).build()?;

        self.payment
            .city(fields.city)
            .service(service)
            .total(fields.payment);
        std::mem::take(&mut self.payment).build()
    }
}
