use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use tokio::sync::{broadcast::Sender, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, trace};

use crate::{
    coin::Coin,
    marketplace::{closing_price, Marketplace},
    state::{HoldingValuation, State},
    AppEvent,
};

/// Owns a background task and aborts it when dropped.
#[derive(Debug)]
pub struct TaskHandle {
    label: String,
    task: JoinHandle<()>,
}

impl TaskHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancel(self) {
        debug!("Cancelling {}", self.label);
        // abort happens in drop
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fetches the day's closing price of `coin` and records it.
///
/// Failures are logged and leave the previous price in place.
pub async fn refresh_price<M: Marketplace>(
    state: &RwLock<State>,
    marketplace: &M,
    coin: &Coin,
    tx_app: &Sender<AppEvent>,
) -> Option<HoldingValuation> {
    let price = marketplace
        .get_today_quotes(&coin.id)
        .await
        .and_then(|quotes| closing_price(&quotes).context("Empty quote series"));

    match price {
        Ok(price) => {
            let valuation = {
                let mut state = state.write().await;
                state.set_price(&coin.name, price)
            };
            if let Some(valuation) = &valuation {
                debug!(
                    "{} @ {} = {}",
                    valuation.name, valuation.price, valuation.value
                );
                let _ = tx_app.send(AppEvent::Valuation(valuation.clone()));
            }
            valuation
        }
        Err(err) => {
            error!("Failed to fetch quote for {} ({}) : {:#}", coin.name, coin.id, err);
            None
        }
    }
}

/// Polls the price of one holding every `period`, first poll immediately.
pub fn spawn_price_poller<M: Marketplace>(
    state: Arc<RwLock<State>>,
    marketplace: M,
    coin: Coin,
    period: Duration,
    tx_app: Sender<AppEvent>,
) -> TaskHandle {
    let label = format!("price poller {} ({})", coin.name, coin.id);
    debug!("Starting {}", label);

    let task = tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // a slow request pushes the schedule back instead of bursting
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            refresh_price(&state, &marketplace, &coin, &tx_app).await;
        }
    });

    TaskHandle { label, task }
}

/// Publishes the portfolio total every `period`.
pub fn spawn_totalizer(
    state: Arc<RwLock<State>>,
    period: Duration,
    tx_total: watch::Sender<Decimal>,
    tx_app: Sender<AppEvent>,
) -> TaskHandle {
    let task = tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let total = { state.read().await.total_value() };
            let changed = tx_total.send_if_modified(|current| {
                if *current != total {
                    *current = total;
                    true
                } else {
                    false
                }
            });
            if changed {
                trace!("Total {}", total);
                let _ = tx_app.send(AppEvent::Total(total));
            }
        }
    });

    TaskHandle {
        label: String::from("totalizer"),
        task,
    }
}
