//! Octopus Energy REST integration
//!
//! Unit rates and the alternate tariff are public; consumption, standing
//! charges and account lookups carry the configured credential.

pub mod client;
pub mod types;

pub use client::OctopusClient;
pub use types::MeterId;
