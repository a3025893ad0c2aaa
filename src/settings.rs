use std::{path::PathBuf, time::Duration};

use crate::marketplace::coinpaprika::ENDPOINT;

#[derive(Clone, Debug)]
pub struct Settings {
    pub endpoint: String,
    pub quote: String,
    pub quote_interval: Duration,
    pub total_interval: Duration,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: ENDPOINT.to_string(),
            quote: String::from("usd"),
            quote_interval: Duration::from_secs(60),
            total_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            data_dir: PathBuf::from("."),
        }
    }
}
