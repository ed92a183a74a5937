use serde_json::{Value, json};
use std::fmt::Write as _;
use std::io::Write as _;
use tempfile::NamedTempFile;

/// Builds a JSON-lines command script for the binary. Ids are allocated
/// sequentially per table by the store, so scripts reference them by
/// literal.
#[derive(Default)]
pub struct Script {
    lines: String,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, line: Value) -> Self {
        writeln!(self.lines, "{line}").unwrap();
        self
    }

    pub fn push_raw(mut self, line: &str) -> Self {
        writeln!(self.lines, "{line}").unwrap();
        self
    }

    pub fn into_temp_file(self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(self.lines.as_bytes()).unwrap();
        file
    }
}

/// Owner is user 1, customer user 2, admin user 3; business 1 with
/// sellable 1 priced 100.
pub fn seeded() -> Script {
    Script::new()
        .push(json!({
            "op": "register_user",
            "name": "Olive Owner",
            "email": "olive@example.com",
            "role": "BUSINESS_OWNER"
        }))
        .push(json!({
            "op": "register_user",
            "name": "Cass Customer",
            "email": "cass@example.com",
            "role": "CUSTOMER"
        }))
        .push(json!({
            "op": "register_user",
            "name": "Ada Admin",
            "email": "ada@example.com",
            "role": "ADMIN"
        }))
        .push(json!({
            "op": "register_business",
            "actor": 1,
            "name": "Olive's Oddities",
            "description": "curios and oddments",
            "category": "Antiques"
        }))
        .push(json!({
            "op": "add_sellable",
            "actor": 1,
            "business_id": 1,
            "name": "Widget",
            "kind": "PRODUCT",
            "price": "100"
        }))
}

/// The owner proposes a two-widget transaction to the customer; this lands
/// as transaction 1 and lazily creates conversation 1.
pub fn create_transaction_line() -> Value {
    json!({
        "op": "create_transaction",
        "actor": 1,
        "customer_id": 2,
        "business_id": 1,
        "items": [{"sellable_id": 1, "quantity": 2, "price": "100"}]
    })
}

pub fn status_line(actor: u64, transaction: u64, status: &str, reason: Option<&str>) -> Value {
    match reason {
        Some(reason) => json!({
            "op": "update_transaction_status",
            "actor": actor,
            "transaction_id": transaction,
            "status": status,
            "reason": reason
        }),
        None => json!({
            "op": "update_transaction_status",
            "actor": actor,
            "transaction_id": transaction,
            "status": status
        }),
    }
}
