use anyhow::{Context, Result};
use reqwest::Client;

use crate::marketplace::{CoinListing, Marketplace, QuoteCandle};
use crate::settings::Settings;

mod coins_api;
mod ohlcv_api;

pub const ENDPOINT: &str = "https://api.coinpaprika.com/v1";

#[derive(Debug, Clone)]
pub struct CoinPaprika {
    client: Client,
    endpoint: String,
    quote: String,
}

impl CoinPaprika {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build http client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            quote: settings.quote.clone(),
        })
    }
}

impl Marketplace for CoinPaprika {
    async fn get_coins(&self) -> Result<Vec<CoinListing>> {
        self.get_coin_index().await
    }

    async fn get_today_quotes(&self, coin_id: &str) -> Result<Vec<QuoteCandle>> {
        self.get_ohlcv_today(coin_id).await
    }
}
