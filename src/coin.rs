use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// A tracked holding. `name` is the key in the portfolio, `id` the key used
/// for quote lookups.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Coin {
    pub id: String,
    pub name: String,
    pub amount: Decimal,
}

impl Coin {
    pub fn new(id: &str, name: &str, amount: Decimal) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            amount,
        }
    }

    /// `amount * price`, `None` when it does not fit a `Decimal`.
    pub fn value_at(&self, price: Decimal) -> Option<Decimal> {
        self.amount.checked_mul(price)
    }
}

impl Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.amount, self.name, self.id)
    }
}

/// Parses the amount field of the form. An empty field is the form default, zero.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let input = input.trim();
    if input.is_empty() {
        return Some(Decimal::ZERO);
    }
    Decimal::from_str(input)
        .or_else(|_| Decimal::from_scientific(input))
        .ok()
}
