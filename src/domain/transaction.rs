use super::money::{Price, Quantity};
use super::party::{BusinessId, SellableId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type TransactionId = u64;

/// Lifecycle states of a transaction.
///
/// `Finished` is declared in the schema but no transition produces it; it is
/// carried for compatibility only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Completed,
    Incomplete,
    Finished,
}

/// A party's role relative to one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyRole {
    Customer,
    Owner,
}

/// The full transition table. Anything not listed here is illegal, for every
/// actor: customers accept and then confirm or contest fulfillment, owners
/// flip a completion claim both ways.
pub fn transition_allowed(
    role: PartyRole,
    from: TransactionStatus,
    to: TransactionStatus,
) -> bool {
    use TransactionStatus::*;
    matches!(
        (role, from, to),
        (PartyRole::Customer, Pending, Approved)
            | (PartyRole::Customer, Approved, Completed)
            | (PartyRole::Customer, Approved, Incomplete)
            | (PartyRole::Owner, Completed, Incomplete)
            | (PartyRole::Owner, Incomplete, Completed)
    )
}

/// One line of a transaction. Quantity and price are fixed at creation; the
/// price is the caller-supplied (negotiated) one, not the sellable's live
/// price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub sellable_id: SellableId,
    pub quantity: Quantity,
    pub price: Price,
}

impl TransactionItem {
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity.value()) * self.price.value()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: UserId,
    pub business_id: BusinessId,
    pub status: TransactionStatus,
    pub items: Vec<TransactionItem>,
    /// Sum of item subtotals at creation time; never recomputed.
    pub total: Decimal,
    pub notes: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub customer_id: UserId,
    pub business_id: BusinessId,
    pub items: Vec<TransactionItem>,
    pub notes: Option<String>,
}

impl NewTransaction {
    pub fn total(&self) -> Decimal {
        self.items.iter().map(TransactionItem::subtotal).sum()
    }
}

/// A status mutation, applied by the store under an expected-status guard.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub to: TransactionStatus,
    /// Appended to the transaction's notes, separated by a blank line.
    pub append_note: Option<String>,
}

/// A caller-supplied item as it arrives at the boundary, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInput {
    pub sellable_id: SellableId,
    pub quantity: u32,
    pub price: Decimal,
}
