//! # UPI Payment Links
//!
//! Builds `upi://pay` deep links that any UPI app can open (or a QR code can
//! carry). Only the link is produced here; rendering is left to the caller.
//!
//! ```text
//! upi://pay?pa=annapurna%40okaxis&pn=Annapurna+Tiffin&am=149.50&cu=INR&tn=Table+4
//!           │                     │                   │         │      │
//!           payee address         payee name          amount    INR    note
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::validate_vpa;

/// Who receives the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpiPayee {
    /// Virtual payment address, `handle@provider`.
    pub vpa: String,
    pub payee_name: String,
}

impl UpiPayee {
    pub fn new(vpa: &str, payee_name: &str) -> CoreResult<Self> {
        let vpa = validate_vpa(vpa)?;
        let payee_name = payee_name.trim();
        if payee_name.is_empty() {
            return Err(ValidationError::Required {
                field: "payee name".to_string(),
            }
            .into());
        }

        Ok(UpiPayee {
            vpa,
            payee_name: payee_name.to_string(),
        })
    }
}

/// Builds the payment link for `amount`.
///
/// ## Example
/// ```rust
/// use tiffin_core::money::Money;
/// use tiffin_core::upi::{upi_payment_link, UpiPayee};
///
/// let payee = UpiPayee::new("annapurna@okaxis", "Annapurna").unwrap();
/// let link = upi_payment_link(&payee, Money::from_paise(14950), "Table 4").unwrap();
/// assert_eq!(
///     link,
///     "upi://pay?pa=annapurna%40okaxis&pn=Annapurna&am=149.50&cu=INR&tn=Table+4"
/// );
/// ```
pub fn upi_payment_link(payee: &UpiPayee, amount: Money, note: &str) -> CoreResult<String> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }

    let amount = amount.to_decimal_string();
    let url = Url::parse_with_params(
        "upi://pay",
        &[
            ("pa", payee.vpa.as_str()),
            ("pn", payee.payee_name.as_str()),
            ("am", amount.as_str()),
            ("cu", "INR"),
            ("tn", note.trim()),
        ],
    )
    .map_err(|e| {
        CoreError::Validation(ValidationError::InvalidFormat {
            field: "UPI link".to_string(),
            reason: e.to_string(),
        })
    })?;

    Ok(url.to_string())
}
