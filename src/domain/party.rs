use super::money::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type BusinessId = u64;
pub type SellableId = u64;
pub type LocationId = u64;
pub type ReviewId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Customer,
    BusinessOwner,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location_id: Option<LocationId>,
    pub verified: bool,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SellableKind {
    Product,
    Service,
}

/// A product or service offered by a business. `price` is the live asking
/// price; transactions capture their own copy per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sellable {
    pub id: SellableId,
    pub business_id: BusinessId,
    pub name: String,
    pub kind: SellableKind,
    pub price: Price,
    pub description: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBusiness {
    pub user_id: UserId,
    pub business_id: BusinessId,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub customer_id: UserId,
    pub business_id: BusinessId,
    pub rating: u8,
    pub body: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location_id: Option<LocationId>,
}

#[derive(Debug, Clone)]
pub struct NewSellable {
    pub business_id: BusinessId,
    pub name: String,
    pub kind: SellableKind,
    pub price: Price,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub customer_id: UserId,
    pub business_id: BusinessId,
    pub rating: u8,
    pub body: Option<String>,
}

/// Directory listing filters. All fields are conjunctive; `None` means
/// "don't care". The price bounds match a business when any of its sellables
/// falls inside the range.
#[derive(Clone, Debug, Default)]
pub struct BusinessFilter {
    pub category: Option<String>,
    pub location_id: Option<LocationId>,
    pub verified: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Case-insensitive substring over name and description.
    pub query: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SellableFilter {
    pub kind: Option<SellableKind>,
    pub business_id: Option<BusinessId>,
    pub category: Option<String>,
    pub location_id: Option<LocationId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Case-insensitive substring over name and description.
    pub query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(
            serde_json::to_string(&UserRole::BusinessOwner).unwrap(),
            "\"BUSINESS_OWNER\""
        );
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"ADMIN\"");
        let role: UserRole = serde_json::from_str("\"CUSTOMER\"").unwrap();
        assert_eq!(role, UserRole::Customer);
    }
}
