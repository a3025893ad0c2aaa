use anyhow::{Context, Result};
use tracing::debug;

use crate::marketplace::coinpaprika::CoinPaprika;
use crate::marketplace::CoinListing;

impl CoinPaprika {
    pub async fn get_coin_index(&self) -> Result<Vec<CoinListing>> {
        let url = format!("{}/coins", self.endpoint);
        debug!("{}", url);

        let r = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .context("Coin index request failed")?;
        let coins: Vec<CoinListing> = r.json().await.context("Invalid coin index")?;

        debug!("Coin index has {} entries", coins.len());

        Ok(coins)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_coin_index_from_json() {
        let json = json!([
            {
                "id": "btc-bitcoin",
                "name": "Bitcoin",
                "symbol": "BTC",
                "rank": 1,
                "is_new": false,
                "is_active": true,
                "type": "coin"
            },
            {
                "id": "usdt-tether",
                "name": "Tether",
                "symbol": "USDT",
                "rank": 3,
                "is_new": false,
                "is_active": true,
                "type": "token"
            }
        ]);
        let res = serde_json::from_value::<Vec<CoinListing>>(json);
        assert!(res.is_ok());
        let coins = res.unwrap();
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].id, "btc-bitcoin");
        assert_eq!(coins[1].name, "Tether");
        assert_eq!(coins[1].rank, 3);
    }

    #[test]
    fn test_coin_index_minimal_entry() {
        let json = json!([{ "id": "eth-ethereum", "name": "Ethereum" }]);
        let coins = serde_json::from_value::<Vec<CoinListing>>(json).unwrap();
        assert_eq!(coins[0].symbol, "");
        assert!(!coins[0].is_active);
    }
}
