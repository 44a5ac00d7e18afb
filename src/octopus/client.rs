use crate::config::OctopusConfig;
use crate::error::{AgileViewError, Result};
use crate::fetcher::{Credential, CredentialProvider, FetchRange, SeriesFetcher};
use crate::logging::{StructuredLogger, get_logger};
use crate::octopus::types::{AccountDocument, MeterId, Page};
use crate::series::{RawPoint, SeriesKey, tariff_code};
use chrono::SecondsFormat;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on `next` links followed for one fetch
const MAX_PAGES: usize = 8;

/// Octopus Energy REST client
pub struct OctopusClient {
    http: reqwest::Client,
    base_url: String,
    product_code: String,
    alt_product_code: String,
    page_size: u32,
    meter: Option<MeterId>,
    credentials: Arc<dyn CredentialProvider>,
    logger: StructuredLogger,
}

impl OctopusClient {
    /// Create a client from configuration. A meter given in configuration
    /// is used as is; otherwise call [`Self::discover_meter`].
    pub fn new(cfg: &OctopusConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds.max(1)))
            .build()?;
        let meter = (!cfg.mpan.trim().is_empty() && !cfg.serial_number.trim().is_empty()).then(
            || MeterId {
                mpan: cfg.mpan.trim().to_string(),
                serial_number: cfg.serial_number.trim().to_string(),
            },
        );
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            product_code: cfg.product_code.clone(),
            alt_product_code: cfg.alt_product_code.clone(),
            page_size: cfg.page_size,
            meter,
            credentials,
            logger: get_logger("octopus"),
        })
    }

    pub const fn meter(&self) -> Option<&MeterId> {
        self.meter.as_ref()
    }

    pub fn set_meter(&mut self, meter: MeterId) {
        self.meter = Some(meter);
    }

    /// Resolve the account's primary electricity meter and remember it
    pub async fn discover_meter(&mut self, account_number: &str) -> Result<MeterId> {
        let account = account_number.trim();
        if account.is_empty() || !account.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(AgileViewError::validation(
                "octopus.account_number",
                "Account number must be alphanumeric",
            ));
        }
        let url = format!("{}/accounts/{}/", self.base_url, account);
        let request = self.authorize(self.http.get(&url), true).await?;
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(AgileViewError::api(format!(
                "account lookup failed: {}",
                resp.status()
            )));
        }
        let doc: AccountDocument = resp.json().await?;
        let meter = doc
            .primary_meter()
            .ok_or_else(|| AgileViewError::api("account has no electricity meter"))?;
        self.logger
            .info(&format!("Using meter {} / {}", meter.mpan, meter.serial_number));
        self.meter = Some(meter.clone());
        Ok(meter)
    }

    /// Endpoint URL for a series and whether the credential is attached
    pub fn endpoint(&self, key: &SeriesKey) -> Result<(String, bool)> {
        match key {
            SeriesKey::Price(region) => Ok((
                self.unit_rates_url(&self.product_code, &tariff_code(&self.product_code, *region)),
                false,
            )),
            SeriesKey::AltTariff(region) => Ok((
                self.unit_rates_url(
                    &self.alt_product_code,
                    &tariff_code(&self.alt_product_code, *region),
                ),
                false,
            )),
            SeriesKey::Standing(tariff) => {
                let product = product_of_tariff(tariff).unwrap_or(self.product_code.as_str());
                Ok((
                    format!(
                        "{}/products/{}/electricity-tariffs/{}/standing-charges/",
                        self.base_url, product, tariff
                    ),
                    true,
                ))
            }
            SeriesKey::Consumption => {
                let meter = self.meter.as_ref().ok_or_else(|| {
                    AgileViewError::config("consumption requested but no meter is known")
                })?;
                Ok((
                    format!(
                        "{}/electricity-meter-points/{}/meters/{}/consumption/",
                        self.base_url, meter.mpan, meter.serial_number
                    ),
                    true,
                ))
            }
        }
    }

    fn unit_rates_url(&self, product: &str, tariff: &str) -> String {
        format!(
            "{}/products/{}/electricity-tariffs/{}/standard-unit-rates/",
            self.base_url, product, tariff
        )
    }

    /// Query string shared by every list endpoint
    pub fn query(&self, range: FetchRange) -> Vec<(&'static str, String)> {
        vec![
            ("page_size", self.page_size.to_string()),
            (
                "period_from",
                range.period_from.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "period_to",
                range.period_to.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ]
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        authenticated: bool,
    ) -> Result<reqwest::RequestBuilder> {
        let request = request
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("agileview/", env!("CARGO_PKG_VERSION")));
        if !authenticated {
            return Ok(request);
        }
        match self.credentials.credential().await {
            Some(Credential::ApiKey(key)) => Ok(request.basic_auth(key, Some(""))),
            Some(Credential::Bearer(token)) => Ok(request.header(AUTHORIZATION, token)),
            // the API answers 401 where a credential is mandatory
            None => {
                self.logger.debug("No credential configured; sending request anonymously");
                Ok(request)
            }
        }
    }
}

/// Product code embedded in a tariff code such as `E-1R-AGILE-24-10-01-A`
fn product_of_tariff(tariff: &str) -> Option<&str> {
    let rest = tariff
        .strip_prefix("E-1R-")
        .or_else(|| tariff.strip_prefix("E-2R-"))?;
    rest.rsplit_once('-').map(|(product, _)| product)
}

#[async_trait::async_trait]
impl SeriesFetcher for OctopusClient {
    async fn fetch(&self, key: &SeriesKey, range: FetchRange) -> Result<Vec<RawPoint>> {
        let (url, authenticated) = self.endpoint(key)?;
        let mut request = self.http.get(&url).query(&self.query(range));
        let mut results = Vec::new();

        for _ in 0..MAX_PAGES {
            let resp = self.authorize(request, authenticated).await?.send().await?;
            if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(AgileViewError::auth(format!("{} rejected the credential", key)));
            }
            if !resp.status().is_success() {
                return Err(AgileViewError::api(format!(
                    "{} returned {}",
                    key,
                    resp.status()
                )));
            }
            let page: Page = resp.json().await?;
            results.extend(page.results);
            match page.next {
                Some(next) if !next.is_empty() => request = self.http.get(next),
                _ => {
                    self.logger.debug(&format!(
                        "Fetched {} records for {} ({} .. {})",
                        results.len(),
                        key,
                        range.period_from,
                        range.period_to
                    ));
                    return Ok(results);
                }
            }
        }

        self.logger.warn(&format!(
            "Stopped following pages for {} after {} pages",
            key, MAX_PAGES
        ));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::StaticCredential;
    use crate::series::Region;
    use chrono::{DateTime, Utc};

    fn client() -> OctopusClient {
        let cfg = OctopusConfig::default();
        OctopusClient::new(&cfg, Arc::new(StaticCredential::default())).unwrap()
    }

    #[test]
    fn unit_rate_endpoint_uses_region_tariff() {
        let (url, auth) = client().endpoint(&SeriesKey::Price(Region::C)).unwrap();
        assert_eq!(
            url,
            "https://api.octopus.energy/v1/products/AGILE-24-10-01/electricity-tariffs/E-1R-AGILE-24-10-01-C/standard-unit-rates/"
        );
        assert!(!auth);
    }

    #[test]
    fn standing_endpoint_recovers_product() {
        let (url, auth) = client()
            .endpoint(&SeriesKey::Standing("E-1R-GO-VAR-22-10-14-N".into()))
            .unwrap();
        assert!(url.contains("/products/GO-VAR-22-10-14/electricity-tariffs/E-1R-GO-VAR-22-10-14-N/standing-charges/"));
        assert!(auth);
    }

    #[test]
    fn consumption_needs_a_meter() {
        let mut c = client();
        assert!(c.endpoint(&SeriesKey::Consumption).is_err());
        c.set_meter(MeterId {
            mpan: "1200000000000".into(),
            serial_number: "21L000000".into(),
        });
        let (url, auth) = c.endpoint(&SeriesKey::Consumption).unwrap();
        assert!(url.ends_with("/electricity-meter-points/1200000000000/meters/21L000000/consumption/"));
        assert!(auth);
    }

    #[test]
    fn query_carries_page_size_and_utc_period() {
        let from = DateTime::parse_from_rfc3339("2025-07-01T23:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let to = DateTime::parse_from_rfc3339("2025-07-05T23:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let q = client().query(FetchRange::new(from, to));
        assert_eq!(q[0], ("page_size", "25000".to_string()));
        assert_eq!(q[1], ("period_from", "2025-07-01T23:00:00Z".to_string()));
        assert_eq!(q[2], ("period_to", "2025-07-05T23:00:00Z".to_string()));
    }

    #[test]
    fn primary_meter_takes_last_installed_meter() {
        let doc: AccountDocument = serde_json::from_str(
            r#"{"number": "A-1234", "properties": [{"electricity_meter_points": [
                {"mpan": "1900000000000", "meters": [
                    {"serial_number": "OLD"}, {"serial_number": "NEW"}]}
            ]}]}"#,
        )
        .unwrap();
        let meter = doc.primary_meter().unwrap();
        assert_eq!(meter.mpan, "1900000000000");
        assert_eq!(meter.serial_number, "NEW");
    }
}
