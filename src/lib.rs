//! # AgileView - Octopus Agile tariff and consumption dashboard
//!
//! Backend for a browser dashboard that charts half-hourly Agile unit
//! prices, smart-meter consumption and the resulting cost, one civil day at
//! a time, and suggests the cheapest time to run household appliances.
//!
//! ## Architecture
//!
//! - `timewindow`: civil-day windows in the reference timezone
//! - `series`: series identities, regions and point normalization
//! - `fetcher`: provider seam and credentials
//! - `octopus`: Octopus Energy REST client
//! - `store`: series cache (SQLite or in-memory)
//! - `sync`: cache-first day synchronizer with directional widening
//! - `metrics`: extremes, cost and cheapest-window calculations
//! - `appliance`: appliance scheduling
//! - `session`: per-session navigation state
//! - `dashboard`: graph bundles and gauges
//! - `web`: HTTP API
//! - `config`, `logging`, `error`: ambient plumbing

pub mod appliance;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod metrics;
#[cfg(feature = "octopus")]
pub mod octopus;
pub mod series;
pub mod session;
pub mod store;
pub mod sync;
pub mod timewindow;
pub mod web;


// Re-export commonly used types
pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{AgileViewError, Result};
pub use sync::DaySynchronizer;
