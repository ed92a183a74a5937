use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-negative monetary value.
///
/// Item prices are captured at transaction creation time and never re-derived
/// from the sellable's live price, so the engine only enforces shape here.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::Validation(
                "price must not be negative".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// A per-item quantity, at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, EngineError> {
        if value >= 1 {
            Ok(Self(value))
        } else {
            Err(EngineError::Validation(
                "quantity must be at least 1".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quantity {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_rejects_negative() {
        assert!(Price::new(dec!(-0.01)).is_err());
        assert!(Price::new(Decimal::ZERO).is_ok());
        assert_eq!(Price::new(dec!(19.99)).unwrap().value(), dec!(19.99));
    }

    #[test]
    fn test_quantity_rejects_zero() {
        assert!(Quantity::new(0).is_err());
        assert_eq!(Quantity::new(3).unwrap().value(), 3);
    }

    #[test]
    fn test_price_serializes_transparently() {
        let price = Price::new(dec!(100.5)).unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"100.5\"");
    }
}
