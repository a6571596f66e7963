//! # Payment Settlement
//!
//! Turns what the customer handed over into the payment fields of a bill.
//!
//! ```text
//! Tender::Cash { tendered: ₹500 }   total ₹420  →  Cash, tendered ₹500, change ₹80
//! Tender::Cash { tendered: ₹400 }   total ₹420  →  InsufficientPayment
//! Tender::Upi  { reference }        total ₹420  →  Upi, reference kept as given
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentMethod;

/// How the customer is paying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Tender {
    Cash { tendered: Money },
    /// `reference` is the UTR/transaction id shown in the payer's app, if noted.
    Upi { reference: Option<String> },
}

impl Tender {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Tender::Cash { .. } => PaymentMethod::Cash,
            Tender::Upi { .. } => PaymentMethod::Upi,
        }
    }
}

/// Payment fields stored on a bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub method: PaymentMethod,
    pub tendered: Option<Money>,
    pub change: Option<Money>,
    pub upi_reference: Option<String>,
}

/// Settles `total` with `tender`.
///
/// ```rust
/// use tiffin_core::money::Money;
/// use tiffin_core::payment::{settle, Tender};
///
/// let s = settle(Money::from_paise(42000), &Tender::Cash { tendered: Money::from_paise(50000) }).unwrap();
/// assert_eq!(s.change, Some(Money::from_paise(8000)));
/// ```
pub fn settle(total: Money, tender: &Tender) -> CoreResult<Settlement> {
    match tender {
        Tender::Cash { tendered } => {
            if *tendered < total {
                return Err(CoreError::InsufficientPayment {
                    total: total.to_string(),
                    tendered: tendered.to_string(),
                });
            }
            Ok(Settlement {
                method: PaymentMethod::Cash,
                tendered: Some(*tendered),
                change: Some(*tendered - total),
                upi_reference: None,
            })
        }
        Tender::Upi { reference } => {
            let reference = reference
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty());
            if let Some(r) = reference {
                if r.len() > 64 || !r.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(ValidationError::InvalidFormat {
                        field: "UPI reference".to_string(),
                        reason: "must be up to 64 letters or digits".to_string(),
                    }
                    .into());
                }
            }
            Ok(Settlement {
                method: PaymentMethod::Upi,
                tendered: None,
                change: None,
                upi_reference: reference.map(str::to_string),
            })
        }
    }
}
