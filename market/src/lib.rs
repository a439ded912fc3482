pub mod config;
pub mod derive;
pub mod engine;
pub mod events;
pub mod fetcher;
pub mod scheduler;
pub mod state;

pub use config::{DerivationRules, MarketConfig, SchedulerConfig};
pub use engine::MarketEngine;
pub use events::{MarketEvent, RefreshOutcome, Resource};
pub use fetcher::{Fetched, MarketFetcher};
pub use scheduler::AutoRefresh;
pub use state::{LoadStatus, MarketSnapshot};
