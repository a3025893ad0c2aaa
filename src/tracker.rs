use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info};

use crate::{
    coin::Coin,
    marketplace::Marketplace,
    persistence::{Snapshot, SnapshotStore},
    portfolio::{Portfolio, SubmitError},
    settings::Settings,
    state::{HoldingRow, HoldingValuation, State},
    valuation::{refresh_price, spawn_price_poller, spawn_totalizer, TaskHandle},
    AppEvent,
};

/// Holdings, their price pollers and the totalizer.
pub struct Tracker<M, S> {
    state: Arc<RwLock<State>>,
    marketplace: M,
    store: S,
    settings: Settings,
    pollers: HashMap<String, TaskHandle>,
    totalizer: Option<TaskHandle>,
    tx_app: broadcast::Sender<AppEvent>,
    tx_total: watch::Sender<Decimal>,
}

impl<M: Marketplace, S: SnapshotStore> Tracker<M, S> {
    /// Restores the last snapshot, if any. Nothing runs until [`Tracker::start`].
    pub async fn load(marketplace: M, store: S, settings: Settings) -> Result<Self> {
        let portfolio = match store
            .load()
            .await
            .context("Failed to restore holdings")?
        {
            Some(snapshot) => snapshot.into_portfolio(),
            None => {
                info!("No saved holdings, starting empty");
                Portfolio::new()
            }
        };

        let (tx_app, _) = broadcast::channel::<AppEvent>(1000);
        let (tx_total, _) = watch::channel(dec!(0));

        Ok(Self {
            state: Arc::new(RwLock::new(State::new(portfolio))),
            marketplace,
            store,
            settings,
            pollers: HashMap::new(),
            totalizer: None,
            tx_app,
            tx_total,
        })
    }

    pub fn state(&self) -> Arc<RwLock<State>> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx_app.subscribe()
    }

    pub fn total_receiver(&self) -> watch::Receiver<Decimal> {
        self.tx_total.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.totalizer.is_some()
    }

    pub fn is_polling(&self, name: &str) -> bool {
        self.pollers.contains_key(name)
    }

    pub async fn holdings(&self) -> Vec<HoldingRow> {
        self.state.read().await.rows()
    }

    pub async fn total(&self) -> Decimal {
        self.state.read().await.total_value()
    }

    /// Adds `amount` of the coin called `name`.
    ///
    /// The coin index is fetched on every submission; if that fails the
    /// index is empty and the name is rejected. The new holdings become
    /// visible only after they were saved.
    pub async fn submit(&mut self, name: &str, amount: Decimal) -> Result<Coin, SubmitError> {
        let index = match self.marketplace.get_coins().await {
            Ok(index) => index,
            Err(err) => {
                error!("Failed to fetch coin index : {:#}", err);
                vec![]
            }
        };

        let current = { self.state.read().await.portfolio.clone() };
        let (portfolio, coin) = current.reconciled(name, amount, &index)?;

        self.persist(&portfolio)
            .await
            .map_err(SubmitError::Storage)?;

        {
            let mut state = self.state.write().await;
            state.portfolio = portfolio;
        }
        info!("Holding {}", coin);
        let _ = self.tx_app.send(AppEvent::Holding(coin.clone()));

        if self.is_running() {
            self.track(&coin);
        }

        Ok(coin)
    }

    async fn persist(&self, portfolio: &Portfolio) -> Result<()> {
        if portfolio.is_empty() {
            return Ok(());
        }
        self.store.save(&Snapshot::new(portfolio)).await
    }

    /// Starts a price poller per holding and the totalizer.
    pub async fn start(&mut self) {
        let coins: Vec<Coin> = {
            let state = self.state.read().await;
            state.portfolio.sorted().into_iter().cloned().collect()
        };
        for coin in coins.iter() {
            self.track(coin);
        }

        if self.totalizer.is_none() {
            self.totalizer = Some(spawn_totalizer(
                self.state.clone(),
                self.settings.total_interval,
                self.tx_total.clone(),
                self.tx_app.clone(),
            ));
        }
        info!("Tracking {} holdings", self.pollers.len());
    }

    fn track(&mut self, coin: &Coin) {
        if self.pollers.contains_key(&coin.name) {
            return;
        }
        let handle = spawn_price_poller(
            self.state.clone(),
            self.marketplace.clone(),
            coin.clone(),
            self.settings.quote_interval,
            self.tx_app.clone(),
        );
        self.pollers.insert(coin.name.clone(), handle);
    }

    /// Fetches every holding's price once.
    pub async fn refresh_all(&self) -> Vec<HoldingValuation> {
        let coins: Vec<Coin> = {
            let state = self.state.read().await;
            state.portfolio.sorted().into_iter().cloned().collect()
        };
        let mut valuations = vec![];
        for coin in coins.iter() {
            if let Some(valuation) =
                refresh_price(&self.state, &self.marketplace, coin, &self.tx_app).await
            {
                valuations.push(valuation);
            }
        }
        valuations
    }

    /// Cancels every poller and the totalizer.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.pollers.drain() {
            debug!("Stopping {}", handle.label());
            handle.cancel();
        }
        if let Some(handle) = self.totalizer.take() {
            handle.cancel();
        }
    }
}
