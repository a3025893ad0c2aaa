use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod coinpaprika;
pub mod simulation;

/// Entry of the coin index.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CoinListing {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub rank: u64,
    #[serde(default)]
    pub is_active: bool,
}

impl CoinListing {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            symbol: String::new(),
            rank: 0,
            is_active: true,
        }
    }
}

/// One entry of a coin's OHLCV series.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct QuoteCandle {
    #[serde(default)]
    pub time_open: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_close: Option<DateTime<Utc>>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub open: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub high: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub low: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub volume: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub market_cap: Option<Decimal>,
}

/// Closing price of the day, taken from the first entry of the series.
pub fn closing_price(quotes: &[QuoteCandle]) -> Option<Decimal> {
    quotes.first().map(|quote| quote.close)
}

pub trait Marketplace: Clone + Send + Sync + 'static {
    /// Every coin the marketplace knows, in index order.
    fn get_coins(&self) -> impl Future<Output = Result<Vec<CoinListing>>> + Send;

    /// Today's OHLCV series for a coin id.
    fn get_today_quotes(
        &self,
        coin_id: &str,
    ) -> impl Future<Output = Result<Vec<QuoteCandle>>> + Send;
}
