use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use crate::marketplace::{CoinListing, Marketplace, QuoteCandle};

/// In-memory marketplace with settable prices and outage injection.
#[derive(Debug, Clone, Default)]
pub struct SimulationMarketplace {
    coins: Arc<RwLock<Vec<CoinListing>>>,
    prices: Arc<RwLock<HashMap<String, Decimal>>>,
    offline: Arc<RwLock<bool>>,
    quote_requests: Arc<RwLock<usize>>,
}

impl SimulationMarketplace {
    pub fn new(coins: Vec<CoinListing>) -> Self {
        Self {
            coins: Arc::new(RwLock::new(coins)),
            ..Default::default()
        }
    }

    /// A few well known coins with fixed prices, for dry runs.
    pub async fn demo() -> Self {
        let marketplace = Self::new(vec![
            CoinListing::new("btc-bitcoin", "Bitcoin"),
            CoinListing::new("eth-ethereum", "Ethereum"),
            CoinListing::new("sol-solana", "Solana"),
            CoinListing::new("usdt-tether", "Tether"),
        ]);
        marketplace.set_price("btc-bitcoin", dec!(50000)).await;
        marketplace.set_price("eth-ethereum", dec!(3000)).await;
        marketplace.set_price("sol-solana", dec!(150)).await;
        marketplace.set_price("usdt-tether", dec!(1)).await;
        marketplace
    }

    pub async fn set_price(&self, coin_id: &str, price: Decimal) {
        let mut prices = self.prices.write().await;
        prices.insert(coin_id.to_owned(), price);
    }

    pub async fn set_offline(&self, offline: bool) {
        let mut current = self.offline.write().await;
        *current = offline;
    }

    pub async fn quote_requests(&self) -> usize {
        *self.quote_requests.read().await
    }
}

impl Marketplace for SimulationMarketplace {
    async fn get_coins(&self) -> anyhow::Result<Vec<CoinListing>> {
        if *self.offline.read().await {
            return Err(anyhow!("Simulated outage"));
        }
        let coins = self.coins.read().await;
        Ok(coins.clone())
    }

    async fn get_today_quotes(&self, coin_id: &str) -> anyhow::Result<Vec<QuoteCandle>> {
        {
            let mut requests = self.quote_requests.write().await;
            *requests += 1;
        }
        if *self.offline.read().await {
            return Err(anyhow!("Simulated outage"));
        }
        let prices = self.prices.read().await;
        Ok(prices
            .get(coin_id)
            .map(|price| {
                vec![QuoteCandle {
                    close: *price,
                    ..Default::default()
                }]
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_quotes() {
        let marketplace = SimulationMarketplace::demo().await;
        let quotes = marketplace.get_today_quotes("btc-bitcoin").await.unwrap();
        assert_eq!(quotes[0].close, dec!(50000));
        assert!(marketplace
            .get_today_quotes("doge-dogecoin")
            .await
            .unwrap()
            .is_empty());

        marketplace.set_offline(true).await;
        assert!(marketplace.get_coins().await.is_err());
        assert!(marketplace.get_today_quotes("btc-bitcoin").await.is_err());
        assert_eq!(marketplace.quote_requests().await, 3);
    }
}
