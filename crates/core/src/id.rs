//! Strongly-typed identifiers used across the domain.
//!
//! Batch and order references are opaque strings assigned by upstream systems
//! (purchasing, order intake). A SKU is the product code shared by order lines
//! and the batches that can satisfy them.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a batch (entity identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchReference(String);

/// Identifier of the order an order line belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderReference(String);

/// Stock-keeping unit: the product code a batch supplies and a line demands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw value without validation.
            ///
            /// Intended for values coming back from storage or already validated
            /// upstream. Use `str::parse` for untrusted input.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Create a fresh random identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// when the value matters.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                if s.trim() != s {
                    return Err(DomainError::invalid_id(format!(
                        "{}: surrounding whitespace in {s:?}",
                        $name
                    )));
                }
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_string_newtype!(BatchReference, "BatchReference");
impl_string_newtype!(OrderReference, "OrderReference");
impl_string_newtype!(Sku, "Sku");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_plain_values() {
        let sku: Sku = "RED-CHAIR".parse().unwrap();
        assert_eq!(sku.as_str(), "RED-CHAIR");
        assert_eq!(sku.to_string(), "RED-CHAIR");
    }

    #[test]
    fn parse_rejects_empty_and_padded_values() {
        assert!(matches!(
            "".parse::<BatchReference>(),
            Err(DomainError::InvalidId(msg)) if msg.starts_with("BatchReference")
        ));
        assert!(matches!(
            " order-1".parse::<OrderReference>(),
            Err(DomainError::InvalidId(_))
        ));
    }

    #[test]
    fn generated_references_are_unique() {
        assert_ne!(BatchReference::generate(), BatchReference::generate());
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&Sku::new("LAMP")).unwrap();
        assert_eq!(json, "\"LAMP\"");
        let back: Sku = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Sku::new("LAMP"));
    }
}
