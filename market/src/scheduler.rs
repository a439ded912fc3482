use crate::config::SchedulerConfig;
use crate::engine::MarketEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest accepted period; `interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Periodic refresh of the coin list, the watchlist and the global snapshot,
/// each on its own timer. The watchlist shares the coin list's period. Ticks
/// go through the engine's re-entrancy guards, so a slow refresh is never
/// doubled up.
pub struct AutoRefresh {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl AutoRefresh {
    pub fn start(engine: Arc<MarketEngine>, config: &SchedulerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        info!(
            "Starting auto-refresh: coins every {:?}, global every {:?}",
            config.coin_interval, config.global_interval
        );

        let coins = {
            let engine = Arc::clone(&engine);
            spawn_loop("coins", config.coin_interval, shutdown.subscribe(), move || {
                let engine = Arc::clone(&engine);
                async move {
                    let outcome = engine.refresh().await;
                    debug!("Scheduled coin refresh: {:?}", outcome);
                }
            })
        };

        let watchlist = {
            let engine = Arc::clone(&engine);
            spawn_loop("watchlist", config.coin_interval, shutdown.subscribe(), move || {
                let engine = Arc::clone(&engine);
                async move {
                    let outcome = engine.refresh_watchlist().await;
                    debug!("Scheduled watchlist refresh: {:?}", outcome);
                }
            })
        };

        let global = spawn_loop("global", config.global_interval, shutdown.subscribe(), move || {
            let engine = Arc::clone(&engine);
            async move {
                let outcome = engine.refresh_global().await;
                debug!("Scheduled global refresh: {:?}", outcome);
            }
        });

        Self {
            shutdown,
            tasks: vec![coins, watchlist, global],
        }
    }

    /// Stops every timer and waits for an in-progress tick to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Refresh loop ended abnormally: {}", e);
            }
        }
        info!("Auto-refresh stopped");
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    if period < MIN_PERIOD {
        warn!("{} refresh period {:?} too short, using {:?}", name, period, MIN_PERIOD);
    }
    let period = period.max(MIN_PERIOD);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // a late tick is dropped rather than replayed in a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("{} refresh loop shutting down", name);
                        break;
                    }
                }
            }
        }
    })
}
