use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use colored::Colorize;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{coin::Coin, portfolio::Portfolio};

/// Last known closing price of a holding.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Valuation {
    pub price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Value of a holding after a price update.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HoldingValuation {
    pub name: String,
    pub price: Decimal,
    pub value: Decimal,
}

/// A holding as displayed: `value` is `None` until a price was fetched once.
#[derive(Clone, Debug, PartialEq)]
pub struct HoldingRow {
    pub coin: Coin,
    pub price: Option<Decimal>,
    pub value: Option<Decimal>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct State {
    pub portfolio: Portfolio,
    pub valuations: HashMap<String, Valuation>,
}

impl State {
    pub fn new(portfolio: Portfolio) -> Self {
        Self {
            portfolio,
            valuations: HashMap::new(),
        }
    }

    /// Records a fetched price. Ignored for names that are not held.
    ///
    /// The price is kept even when the holding's value overflows; the
    /// holding then has no value and no valuation is returned.
    pub fn set_price(&mut self, name: &str, price: Decimal) -> Option<HoldingValuation> {
        let coin = self.portfolio.get(name)?;
        let value = coin.value_at(price);
        if value.is_none() {
            error!("Value of {} at {} overflows", coin, price);
        }
        self.valuations.insert(
            name.to_string(),
            Valuation {
                price,
                updated_at: Utc::now(),
            },
        );
        Some(HoldingValuation {
            name: name.to_string(),
            price,
            value: value?,
        })
    }

    pub fn holding_value(&self, name: &str) -> Option<Decimal> {
        let coin = self.portfolio.get(name)?;
        let valuation = self.valuations.get(name)?;
        coin.value_at(valuation.price)
    }

    /// Sum of `amount * price` over holdings with a known value, saturating
    /// at `Decimal::MAX`.
    pub fn total_value(&self) -> Decimal {
        self.portfolio
            .coins
            .keys()
            .filter_map(|name| self.holding_value(name))
            .fold(dec!(0), |acc, value| acc.saturating_add(value))
    }

    pub fn rows(&self) -> Vec<HoldingRow> {
        self.portfolio
            .sorted()
            .into_iter()
            .map(|coin| HoldingRow {
                coin: coin.clone(),
                price: self.valuations.get(&coin.name).map(|v| v.price),
                value: self.holding_value(&coin.name),
            })
            .collect()
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: Vec<String> = self
            .rows()
            .iter()
            .map(|row| {
                format!(
                    "{}: {} (~{})",
                    row.coin.name,
                    row.coin.amount.to_string().purple(),
                    row.value
                        .map_or("?".to_string(), |value| value.round_dp(2).to_string())
                )
            })
            .collect();
        write!(
            f,
            "~{} : {}",
            self.total_value().round_dp(2).to_string().yellow(),
            s.join(" / ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State {
        State::new(Portfolio::from(HashMap::from([
            (
                "Bitcoin".to_string(),
                Coin::new("btc-bitcoin", "Bitcoin", dec!(2)),
            ),
            (
                "Ethereum".to_string(),
                Coin::new("eth-ethereum", "Ethereum", dec!(10)),
            ),
        ])))
    }

    #[test]
    fn test_set_price() {
        let mut state = state();
        let valuation = state.set_price("Bitcoin", dec!(50000)).unwrap();
        assert_eq!(valuation.value, dec!(100000));
        assert_eq!(state.holding_value("Bitcoin"), Some(dec!(100000)));
        assert_eq!(state.holding_value("Ethereum"), None);

        assert!(state.set_price("Dogecoin", dec!(0.1)).is_none());
        assert!(!state.valuations.contains_key("Dogecoin"));
    }

    #[test]
    fn test_total_value_skips_unpriced() {
        let mut state = state();
        assert_eq!(state.total_value(), dec!(0));

        state.set_price("Bitcoin", dec!(50000));
        assert_eq!(state.total_value(), dec!(100000));

        state.set_price("Ethereum", dec!(3000.5));
        assert_eq!(state.total_value(), dec!(130005));

        // last price wins
        state.set_price("Ethereum", dec!(3000));
        assert_eq!(state.total_value(), dec!(130000));
    }

    #[test]
    fn test_value_follows_amount() {
        let mut state = state();
        state.set_price("Bitcoin", dec!(50000));
        if let Some(coin) = state.portfolio.coins.get_mut("Bitcoin") {
            coin.amount += dec!(3);
        }
        assert_eq!(state.holding_value("Bitcoin"), Some(dec!(250000)));
    }

    #[test]
    fn test_value_overflow_has_no_value() {
        let mut state = state();
        state.set_price("Bitcoin", dec!(50000));
        if let Some(coin) = state.portfolio.coins.get_mut("Ethereum") {
            coin.amount = Decimal::from_scientific("1e25").unwrap();
        }

        assert!(state.set_price("Ethereum", dec!(50000)).is_none());
        assert_eq!(state.valuations["Ethereum"].price, dec!(50000));
        assert_eq!(state.holding_value("Ethereum"), None);
        assert_eq!(state.total_value(), dec!(100000));
        assert_eq!(state.rows()[1].value, None);

        // a total above the largest decimal saturates
        if let Some(coin) = state.portfolio.coins.get_mut("Ethereum") {
            coin.amount = Decimal::MAX;
        }
        state.set_price("Ethereum", dec!(1));
        assert_eq!(state.total_value(), Decimal::MAX);
    }

    #[test]
    fn test_rows_are_sorted() {
        let mut state = state();
        state.set_price("Ethereum", dec!(3000));
        let rows = state.rows();
        assert_eq!(rows[0].coin.name, "Bitcoin");
        assert_eq!(rows[0].value, None);
        assert_eq!(rows[1].price, Some(dec!(3000)));
        assert_eq!(rows[1].value, Some(dec!(30000)));
    }
}
