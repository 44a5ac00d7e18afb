//! Remote series fetching seam
//!
//! The synchronizer only knows [`SeriesFetcher`]. The Octopus REST client is
//! one implementation; tests supply their own.

use crate::error::Result;
use crate::series::{RawPoint, SeriesKey};
use crate::timewindow::DayWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Period requested from the provider, `[period_from, period_to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FetchRange {
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
}

impl FetchRange {
    pub const fn new(period_from: DateTime<Utc>, period_to: DateTime<Utc>) -> Self {
        Self {
            period_from,
            period_to,
        }
    }
}

impl From<DayWindow> for FetchRange {
    fn from(window: DayWindow) -> Self {
        Self::new(window.start, window.end)
    }
}

/// Source of raw points for one series
#[async_trait::async_trait]
pub trait SeriesFetcher: Send + Sync {
    /// Records for `key` overlapping `range`. Any failure is an `Err`; the
    /// caller decides how to recover.
    async fn fetch(&self, key: &SeriesKey, range: FetchRange) -> Result<Vec<RawPoint>>;
}

/// Credential attached to authenticated requests
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Account API key, sent as the basic-auth user name
    ApiKey(String),
    /// Short-lived token, sent verbatim in the Authorization header
    Bearer(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

/// Supplies credentials on demand. Refreshing them is the provider's concern.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Option<Credential>;
}

/// Fixed credential from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticCredential {
    credential: Option<Credential>,
}

impl StaticCredential {
    pub const fn new(credential: Option<Credential>) -> Self {
        Self { credential }
    }

    /// API-key credential, absent when the key is blank
    pub fn api_key(key: &str) -> Self {
        let key = key.trim();
        if key.is_empty() {
            Self::default()
        } else {
            Self::new(Some(Credential::ApiKey(key.to_string())))
        }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticCredential {
    async fn credential(&self) -> Option<Credential> {
        self.credential.clone()
    }
}
