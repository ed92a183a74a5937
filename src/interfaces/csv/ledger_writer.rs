use crate::domain::party::{BusinessId, UserId};
use crate::domain::transaction::{Transaction, TransactionId, TransactionStatus};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One exported row of the transaction ledger.
#[derive(Debug, Serialize)]
struct LedgerRow {
    transaction: TransactionId,
    customer: UserId,
    business: BusinessId,
    status: TransactionStatus,
    items: usize,
    total: Decimal,
    initiated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<&Transaction> for LedgerRow {
    fn from(transaction: &Transaction) -> Self {
        Self {
            transaction: transaction.id,
            customer: transaction.customer_id,
            business: transaction.business_id,
            status: transaction.status,
            items: transaction.items.len(),
            total: transaction.total,
            initiated_at: transaction.initiated_at,
            completed_at: transaction.completed_at,
        }
    }
}

/// Writes the final transaction state as CSV, one row per transaction.
pub struct LedgerWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
        }
    }

    pub fn write_transactions(&mut self, transactions: &[Transaction]) -> Result<()> {
        for transaction in transactions {
            self.writer.serialize(LedgerRow::from(transaction))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
