use anyhow::{Context, Result};
use reqwest::Url;
use tracing::debug;

use crate::marketplace::coinpaprika::CoinPaprika;
use crate::marketplace::QuoteCandle;

impl CoinPaprika {
    pub async fn get_ohlcv_today(&self, coin_id: &str) -> Result<Vec<QuoteCandle>> {
        let url = Url::parse_with_params(
            format!("{}/coins/{}/ohlcv/today", self.endpoint, coin_id).as_str(),
            [("quote", self.quote.as_str())],
        )?;
        debug!("{}", url);

        let r = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("Quote request for {} failed", coin_id))?;
        let quotes: Vec<QuoteCandle> = r
            .json()
            .await
            .with_context(|| format!("Invalid quote series for {}", coin_id))?;

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::marketplace::closing_price;

    #[test]
    fn test_ohlcv_from_json() {
        let json = json!([
            {
                "time_open": "2024-05-01T00:00:00Z",
                "time_close": "2024-05-01T13:45:00Z",
                "open": 60609.49,
                "high": 60780.5,
                "low": 56552.82,
                "close": 57321.12,
                "volume": 36482312345_u64,
                "market_cap": 1129432054400_u64
            }
        ]);
        let res = serde_json::from_value::<Vec<QuoteCandle>>(json);
        assert!(res.is_ok());
        let quotes = res.unwrap();
        assert_eq!(quotes[0].high, Some(dec!(60780.5)));
        assert_eq!(closing_price(&quotes), Some(dec!(57321.12)));
    }

    #[test]
    fn test_ohlcv_with_missing_fields() {
        let json = json!([{ "close": 50000, "volume": null }]);
        let quotes = serde_json::from_value::<Vec<QuoteCandle>>(json).unwrap();
        assert_eq!(quotes[0].close, dec!(50000));
        assert_eq!(quotes[0].volume, None);
        assert_eq!(quotes[0].time_open, None);
    }

    #[test]
    fn test_ohlcv_without_close_is_rejected() {
        let json = json!([{ "open": 1.0 }]);
        assert!(serde_json::from_value::<Vec<QuoteCandle>>(json).is_err());
    }
}
