use std::collections::HashMap;

use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{coin::Coin, marketplace::CoinListing};

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid coin name")]
    InvalidCoinName,
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Failed to save holdings: {0:#}")]
    Storage(anyhow::Error),
}

/// Holdings keyed by coin name.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Portfolio {
    pub coins: HashMap<String, Coin>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self {
            coins: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Coin> {
        self.coins.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    /// Coins ordered by name.
    pub fn sorted(&self) -> Vec<&Coin> {
        self.coins
            .values()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }

    /// Merges a submission into a copy of the portfolio.
    ///
    /// `self` is never modified, so a caller only publishes the returned
    /// portfolio once it has been persisted. The name is checked before the
    /// amount, and an existing holding keeps its id. A sum that does not fit a
    /// `Decimal` is an invalid amount.
    pub fn reconciled(
        &self,
        name: &str,
        amount: Decimal,
        index: &[CoinListing],
    ) -> Result<(Portfolio, Coin), SubmitError> {
        let listing = index
            .iter()
            .find(|listing| listing.name == name)
            .ok_or(SubmitError::InvalidCoinName)?;

        if amount < Decimal::ZERO {
            return Err(SubmitError::InvalidAmount);
        }

        let coin = match self.coins.get(name) {
            Some(coin) => {
                let total = coin
                    .amount
                    .checked_add(amount)
                    .ok_or(SubmitError::InvalidAmount)?;
                Coin::new(&coin.id, name, total)
            }
            None => Coin::new(&listing.id, name, amount),
        };

        let mut portfolio = self.clone();
        portfolio.coins.insert(name.to_string(), coin.clone());

        Ok((portfolio, coin))
    }
}

impl From<HashMap<String, Coin>> for Portfolio {
    fn from(coins: HashMap<String, Coin>) -> Self {
        Self { coins }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn index() -> Vec<CoinListing> {
        vec![
            CoinListing::new("btc-bitcoin", "Bitcoin"),
            CoinListing::new("eth-ethereum", "Ethereum"),
            CoinListing::new("btc-bitcoin-fork", "Bitcoin"),
        ]
    }

    #[test]
    fn test_new_holding_uses_first_matching_id() {
        let portfolio = Portfolio::new();
        let (portfolio, coin) = portfolio.reconciled("Bitcoin", dec!(2), &index()).unwrap();

        assert_eq!(coin, Coin::new("btc-bitcoin", "Bitcoin", dec!(2)));
        assert_eq!(
            portfolio,
            Portfolio::from(HashMap::from([(
                "Bitcoin".to_string(),
                Coin::new("btc-bitcoin", "Bitcoin", dec!(2))
            )]))
        );
    }

    #[test]
    fn test_repeat_submission_adds_amount() {
        let (portfolio, _) = Portfolio::new()
            .reconciled("Bitcoin", dec!(2), &index())
            .unwrap();
        let (portfolio, coin) = portfolio.reconciled("Bitcoin", dec!(3), &index()).unwrap();

        assert_eq!(coin.amount, dec!(5));
        assert_eq!(coin.id, "btc-bitcoin");
        assert_eq!(portfolio.len(), 1);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let (portfolio, _) = Portfolio::new()
            .reconciled("Bitcoin", dec!(2), &index())
            .unwrap();

        let res = portfolio.reconciled("bitcoin", dec!(1), &index());
        assert!(matches!(res, Err(SubmitError::InvalidCoinName)));
        assert_eq!(res.unwrap_err().to_string(), "Invalid coin name");

        // an empty index rejects every name
        let res = portfolio.reconciled("Bitcoin", dec!(1), &[]);
        assert!(matches!(res, Err(SubmitError::InvalidCoinName)));
        assert_eq!(portfolio.get("Bitcoin").unwrap().amount, dec!(2));
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let portfolio = Portfolio::new();
        let res = portfolio.reconciled("Ethereum", dec!(-0.1), &index());
        assert!(matches!(res, Err(SubmitError::InvalidAmount)));
        assert_eq!(res.unwrap_err().to_string(), "Invalid amount");
        assert!(portfolio.is_empty());

        // name is checked first
        let res = portfolio.reconciled("Dogecoin", dec!(-1), &index());
        assert!(matches!(res, Err(SubmitError::InvalidCoinName)));
    }

    #[test]
    fn test_amount_overflow_is_rejected() {
        let amount = Decimal::from_scientific("7e28").unwrap();
        let (portfolio, _) = Portfolio::new()
            .reconciled("Bitcoin", amount, &index())
            .unwrap();

        let res = portfolio.reconciled("Bitcoin", amount, &index());
        assert!(matches!(res, Err(SubmitError::InvalidAmount)));
        assert_eq!(portfolio.get("Bitcoin").unwrap().amount, amount);
    }

    #[test]
    fn test_zero_amount_creates_holding() {
        let (portfolio, coin) = Portfolio::new()
            .reconciled("Ethereum", dec!(0), &index())
            .unwrap();
        assert_eq!(coin.amount, dec!(0));
        assert_eq!(portfolio.sorted().len(), 1);
    }
}
