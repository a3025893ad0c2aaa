use coin::Coin;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use state::HoldingValuation;

pub mod coin;
pub mod marketplace;
pub mod persistence;
pub mod portfolio;
pub mod settings;
pub mod state;
pub mod tracker;
pub mod tui;
pub mod valuation;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum AppEvent {
    Holding(Coin),
    Valuation(HoldingValuation),
    Total(Decimal),
}
