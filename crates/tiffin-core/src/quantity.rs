//! # Quantities and Units
//!
//! Stock and recipe amounts for ingredients.
//!
//! ## Representation
//! A [`Quantity`] is an integer count of **thousandths of the base unit** of
//! its dimension:
//!
//! ```text
//! ┌────────────┬────────────┬──────────────────────────────────────────┐
//! │ Dimension  │ Base unit  │ Accepted units (milli-base per unit)     │
//! ├────────────┼────────────┼──────────────────────────────────────────┤
//! │ Mass       │ g          │ g (1_000), kg (1_000_000)                │
//! │ Volume     │ ml         │ ml (1_000), l (1_000_000)                │
//! │ Count      │ pcs        │ pcs (1_000)                              │
//! └────────────┴────────────┴──────────────────────────────────────────┘
//! ```
//!
//! So 0.25 kg of paneer is `Quantity(250_000)` and 12.5 g of salt is
//! `Quantity(12_500)`. Multiplying by an order quantity is exact integer math.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::error::ValidationError;

// =============================================================================
// Dimension & Unit
// =============================================================================

/// Physical dimension of a unit. Conversion is only allowed within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Mass,
    Volume,
    Count,
}

/// Unit an ingredient is stocked in or a recipe is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum Unit {
    #[serde(rename = "g")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "g"))]
    Gram,
    #[serde(rename = "kg")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "kg"))]
    Kilogram,
    #[serde(rename = "ml")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ml"))]
    Millilitre,
    #[serde(rename = "l")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "l"))]
    Litre,
    #[serde(rename = "pcs")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "pcs"))]
    Piece,
}

impl Unit {
    /// All units, in display order.
    pub const ALL: [Unit; 5] = [
        Unit::Gram,
        Unit::Kilogram,
        Unit::Millilitre,
        Unit::Litre,
        Unit::Piece,
    ];

    pub const fn dimension(&self) -> Dimension {
        match self {
            Unit::Gram | Unit::Kilogram => Dimension::Mass,
            Unit::Millilitre | Unit::Litre => Dimension::Volume,
            Unit::Piece => Dimension::Count,
        }
    }

    /// Number of milli-base units in one of this unit.
    pub const fn milli_per_unit(&self) -> i64 {
        match self {
            Unit::Gram | Unit::Millilitre | Unit::Piece => 1_000,
            Unit::Kilogram | Unit::Litre => 1_000_000,
        }
    }

    /// Short symbol used in storage and output.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Millilitre => "ml",
            Unit::Litre => "l",
            Unit::Piece => "pcs",
        }
    }

    /// Whether amounts in `self` can be expressed in `other`.
    pub fn converts_to(&self, other: Unit) -> bool {
        self.dimension() == other.dimension()
    }

    /// Parses a unit symbol or common spelling.
    ///
    /// ```rust
    /// use tiffin_core::quantity::Unit;
    ///
    /// assert_eq!(Unit::parse("KG").unwrap(), Unit::Kilogram);
    /// assert_eq!(Unit::parse("litre").unwrap(), Unit::Litre);
    /// assert!(Unit::parse("cup").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Unit, ValidationError> {
        match input.trim().to_lowercase().as_str() {
            "g" | "gm" | "gram" | "grams" => Ok(Unit::Gram),
            "kg" | "kgs" | "kilogram" | "kilograms" => Ok(Unit::Kilogram),
            "ml" | "millilitre" | "milliliter" | "millilitres" | "milliliters" => {
                Ok(Unit::Millilitre)
            }
            "l" | "ltr" | "litre" | "liter" | "litres" | "liters" => Ok(Unit::Litre),
            "pc" | "pcs" | "piece" | "pieces" | "nos" => Ok(Unit::Piece),
            _ => Err(ValidationError::NotAllowed {
                field: "unit".to_string(),
                allowed: Unit::ALL.iter().map(|u| u.symbol().to_string()).collect(),
            }),
        }
    }

    /// Number of decimal places representable in this unit.
    const fn decimals(&self) -> usize {
        match self {
            Unit::Gram | Unit::Millilitre | Unit::Piece => 3,
            Unit::Kilogram | Unit::Litre => 6,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// An ingredient amount in milli-base units. See the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    /// Largest stock or recipe amount: a million kg, litres or pieces.
    pub const MAX: Quantity = Quantity(1_000_000_000_000);

    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    /// Whole amount in a unit, e.g. `Quantity::of(2, Unit::Kilogram)`.
    #[inline]
    pub const fn of(amount: i64, unit: Unit) -> Self {
        Quantity(amount * unit.milli_per_unit())
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parses a decimal amount expressed in `unit`.
    ///
    /// ```rust
    /// use tiffin_core::quantity::{Quantity, Unit};
    ///
    /// let q = Quantity::parse("0.25", Unit::Kilogram).unwrap();
    /// assert_eq!(q, Quantity::parse("250", Unit::Gram).unwrap());
    /// ```
    pub fn parse(input: &str, unit: Unit) -> Result<Quantity, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason,
        };

        let input = input.trim();
        let (negative, digits) = match input.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, input),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        if (whole.is_empty() && frac.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid(format!("'{}' is not a number", input)));
        }

        let decimals = unit.decimals();
        if frac.len() > decimals {
            return Err(invalid(format!(
                "at most {} decimal places in {}",
                decimals, unit
            )));
        }

        let scale = unit.milli_per_unit();
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| invalid("quantity is too large".to_string()))?
        };
        let padded = format!("{:0<width$}", frac, width = decimals);
        let frac_value: i64 = if padded.is_empty() {
            0
        } else {
            padded
                .parse()
                .map_err(|_| invalid("bad fraction".to_string()))?
        };

        let milli = whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac_value))
            .filter(|m| *m <= Quantity::MAX.0)
            .ok_or_else(|| invalid(format!("at most {}", Quantity::MAX.format_in(unit))))?;

        Ok(Quantity(if negative { -milli } else { milli }))
    }

    /// Formats the amount in `unit`, trimming trailing zeros ("0.25 kg").
    pub fn format_in(&self, unit: Unit) -> String {
        let scale = unit.milli_per_unit();
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / scale as u64;
        let frac = abs % scale as u64;

        if frac == 0 {
            return format!("{}{} {}", sign, whole, unit);
        }

        let frac_str = format!("{:0width$}", frac, width = unit.decimals());
        format!(
            "{}{}.{} {}",
            sign,
            whole,
            frac_str.trim_end_matches('0'),
            unit
        )
    }

    #[inline]
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    #[inline]
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }

    #[inline]
    pub fn checked_mul(self, n: i64) -> Option<Quantity> {
        self.0.checked_mul(n).map(Quantity)
    }

    /// Percentage of `full` this quantity represents (0 when `full` is not positive).
    pub fn percentage_of(&self, full: Quantity) -> i64 {
        if full.0 <= 0 {
            return 0;
        }
        ((self.0 as i128 * 100) / full.0 as i128) as i64
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

impl Mul<i64> for Quantity {
    type Output = Self;

    #[inline]
    fn mul(self, n: i64) -> Self {
        Quantity(self.0 * n)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_dimensions() {
        assert!(Unit::Gram.converts_to(Unit::Kilogram));
        assert!(Unit::Litre.converts_to(Unit::Millilitre));
        assert!(!Unit::Gram.converts_to(Unit::Millilitre));
        assert!(!Unit::Piece.converts_to(Unit::Gram));
    }

    #[test]
    fn test_parse_converts_to_base() {
        assert_eq!(
            Quantity::parse("1.5", Unit::Kilogram).unwrap(),
            Quantity::of(1500, Unit::Gram)
        );
        assert_eq!(
            Quantity::parse("0.2", Unit::Litre).unwrap(),
            Quantity::of(200, Unit::Millilitre)
        );
        assert_eq!(Quantity::parse("12.5", Unit::Gram).unwrap().milli(), 12_500);
        assert_eq!(Quantity::parse("-2", Unit::Piece).unwrap().milli(), -2_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Quantity::parse("", Unit::Gram).is_err());
        assert!(Quantity::parse("abc", Unit::Gram).is_err());
        assert!(Quantity::parse("1.2345", Unit::Gram).is_err());
        assert!(Quantity::parse("1.1234567", Unit::Kilogram).is_err());
    }

    #[test]
    fn test_parse_stops_at_max() {
        assert_eq!(Quantity::parse("1000000", Unit::Kilogram).unwrap(), Quantity::MAX);
        assert_eq!(Quantity::parse("-1000000", Unit::Litre).unwrap(), -Quantity::MAX);
        assert!(Quantity::parse("1000000.001", Unit::Kilogram).is_err());
        assert!(Quantity::parse("9000000000000", Unit::Kilogram).is_err());
        assert!(Quantity::parse("99999999999999999999", Unit::Gram).is_err());

        assert_eq!(Quantity::MAX.checked_mul(2), Some(Quantity::from_milli(2_000_000_000_000)));
        assert_eq!(Quantity::from_milli(i64::MAX).checked_mul(2), None);
        assert_eq!(Quantity::from_milli(i64::MIN).checked_sub(Quantity::of(1, Unit::Gram)), None);
    }

    #[test]
    fn test_format_in() {
        let q = Quantity::of(250, Unit::Gram);
        assert_eq!(q.format_in(Unit::Gram), "250 g");
        assert_eq!(q.format_in(Unit::Kilogram), "0.25 kg");
        assert_eq!((-q).format_in(Unit::Kilogram), "-0.25 kg");
        assert_eq!(Quantity::of(3, Unit::Piece).format_in(Unit::Piece), "3 pcs");
    }

    #[test]
    fn test_percentage_of() {
        let full = Quantity::of(10, Unit::Kilogram);
        assert_eq!(Quantity::of(2500, Unit::Gram).percentage_of(full), 25);
        assert_eq!(Quantity::of(1, Unit::Gram).percentage_of(Quantity::zero()), 0);
        assert_eq!(Quantity::of(-1, Unit::Kilogram).percentage_of(full), -10);
    }

    #[test]
    fn test_multiplication_is_exact() {
        // 0.1 kg per plate × 3 plates, a classic float trap
        let per_plate = Quantity::parse("0.1", Unit::Kilogram).unwrap();
        assert_eq!(per_plate * 3, Quantity::parse("0.3", Unit::Kilogram).unwrap());
    }
}
