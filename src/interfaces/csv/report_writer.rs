use crate::domain::reconcile::{FeeStructureSnapshot, PaymentSummary};
use crate::error::Result;
use std::io::Write;

/// Writes fee snapshots and payment summaries as CSV tables.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_fee_structure(&mut self, snapshot: &FeeStructureSnapshot) -> Result<()> {
        self.writer
            .write_record(["item", "amount", "frequency", "scope"])?;
        for item in &snapshot.items {
            self.writer.write_record([
                item.name.clone(),
                item.amount.to_string(),
                item.frequency.to_string(),
                item.residence_scope.to_string(),
            ])?;
        }
        self.writer.write_record([
            "TOTAL".to_string(),
            snapshot.total.to_string(),
            String::new(),
            snapshot.residence.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    /// One row per billing item, then unattributed and total rows.
    pub fn write_summary(&mut self, summary: &PaymentSummary) -> Result<()> {
        self.writer
            .write_record(["billing_type", "required", "paid", "remaining"])?;
        for line in &summary.breakdown {
            self.writer.write_record([
                line.billing_type.clone(),
                line.required.to_string(),
                line.paid.to_string(),
                line.remaining.to_string(),
            ])?;
        }
        if !summary.unattributed_paid.is_zero() {
            self.writer.write_record([
                "UNATTRIBUTED".to_string(),
                String::new(),
                summary.unattributed_paid.to_string(),
                String::new(),
            ])?;
        }
        self.writer.write_record([
            "TOTAL".to_string(),
            summary.total_required.to_string(),
            summary.total_paid.to_string(),
            summary.balance.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}
