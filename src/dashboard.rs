//! Chart-ready bundles for the browser
//!
//! [`Dashboard`] owns the session state and turns synchronized windows into
//! the series and gauges each graph shows.

use crate::appliance::{Appliance, ApplianceBook, ApplianceEstimate, estimate};
use crate::config::Config;
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::metrics::{consumption_summary, cost, cost_summary, extremes};
use crate::series::{SeriesKey, TimePoint, tariff_code};
use crate::session::{GraphKind, SessionContext};
use crate::sync::{DaySynchronizer, Direction, NoDataKind, SyncOutcome, SyncRequest};
use crate::timewindow::DayWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// One KPI gauge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

impl Gauge {
    const fn new(label: &'static str, value: f64, unit: &'static str) -> Self {
        Self { label, value, unit }
    }
}

/// Everything one graph needs to render a day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphBundle {
    pub graph: GraphKind,
    pub window: DayWindow,
    pub times: Vec<DateTime<Utc>>,
    /// Same instants as local wall-clock strings
    pub local_times: Vec<String>,
    pub values: Vec<f64>,
    pub gauges: Vec<Gauge>,
    /// Alternate tariff for the same slots, unit graph only
    pub alt_tariff: Vec<f64>,
    /// Daily standing charge in pence
    pub standing_charge: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphResponse {
    Bundle(Box<GraphBundle>),
    NoData { no_data: NoDataKind },
}

pub struct Dashboard {
    sync: Arc<DaySynchronizer>,
    session: SessionContext,
    appliances: ApplianceBook,
    product_code: String,
    day_intervals: usize,
    logger: StructuredLogger,
}

impl Dashboard {
    pub fn new(sync: Arc<DaySynchronizer>, session: SessionContext, product_code: &str) -> Self {
        let day_intervals = sync.config().day_intervals;
        Self {
            sync,
            session,
            appliances: ApplianceBook::default(),
            product_code: product_code.to_string(),
            day_intervals,
            logger: get_logger("dashboard"),
        }
    }

    /// Dashboard seeded with the configured region and appliances
    pub fn from_config(cfg: &Config, sync: Arc<DaySynchronizer>) -> Result<Self> {
        let mut dashboard = Self::new(
            sync,
            SessionContext::new(cfg.default_region()?),
            &cfg.octopus.product_code,
        );
        for a in &cfg.appliances {
            dashboard.add_appliance(Appliance::new(&a.name, a.power_w, a.hours, a.minutes)?)?;
        }
        Ok(dashboard)
    }

    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    pub const fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    /// Load the current day, as a first load when the session asks for one
    pub async fn load(&mut self, direction: Direction) -> Result<GraphResponse> {
        let initial = self.session.take_initial();
        self.graph(initial, direction).await
    }

    /// Move one day and load it
    pub async fn navigate(&mut self, direction: Direction) -> Result<GraphResponse> {
        self.session.step(direction)?;
        self.load(direction).await
    }

    /// Synchronise what the selected graph needs and build its bundle
    pub async fn graph(&mut self, initial: bool, direction: Direction) -> Result<GraphResponse> {
        let window = self.sync.window(self.session.offset())?;
        let region = self.session.region();
        let graph = self.session.graph();

        let mut bundle = GraphBundle {
            graph,
            window,
            times: Vec::new(),
            local_times: Vec::new(),
            values: Vec::new(),
            gauges: Vec::new(),
            alt_tariff: Vec::new(),
            standing_charge: None,
        };

        match graph {
            GraphKind::Unit => {
                let points = self
                    .fetch(SeriesKey::Price(region), window, initial, direction)
                    .await?
                    .into_points();
                bundle.values = points.iter().map(|p| p.value).collect();
                self.set_times(&mut bundle, &points);
                if let Some(e) = extremes(&bundle.values) {
                    bundle.gauges = vec![
                        Gauge::new("Minimum price", e.min, "p"),
                        Gauge::new("Average price", e.mean, "p"),
                        Gauge::new("Maximum price", e.max, "p"),
                    ];
                }
                bundle.alt_tariff = self
                    .fetch(SeriesKey::AltTariff(region), window, initial, direction)
                    .await?
                    .values();
                bundle.standing_charge = self.standing_charge(window, initial, direction).await?;
            }
            GraphKind::Consumption => {
                let used = match self
                    .fetch(SeriesKey::Consumption, window, initial, direction)
                    .await?
                {
                    SyncOutcome::NoData(kind) => return Ok(GraphResponse::NoData { no_data: kind }),
                    SyncOutcome::Points(points) => points,
                };
                bundle.values = used.iter().map(|p| p.value).collect();
                self.set_times(&mut bundle, &used);
                if let Some(s) = consumption_summary(&bundle.values) {
                    bundle.gauges = vec![
                        Gauge::new("Total consumption", s.total_kwh, "kWh"),
                        Gauge::new("Average consumption", s.average_w, "W"),
                        Gauge::new("Maximum consumption", s.max_w, "W"),
                    ];
                }
            }
            GraphKind::Cost => {
                let used = match self
                    .fetch(SeriesKey::Consumption, window, initial, direction)
                    .await?
                {
                    SyncOutcome::NoData(kind) => return Ok(GraphResponse::NoData { no_data: kind }),
                    SyncOutcome::Points(points) => points,
                };
                let unit = self
                    .fetch(SeriesKey::Price(region), window, initial, direction)
                    .await?
                    .values();
                let kwh: Vec<f64> = used.iter().map(|p| p.value).collect();
                let intervals = self.day_intervals.max(window.slot_count());
                let mut costs = cost(&unit, &kwh, intervals)?;
                // padding stops at the last metered slot
                costs.truncate(used.len());
                bundle.values = costs;
                self.set_times(&mut bundle, &used);
                let standing = self.standing_charge(window, initial, direction).await?;
                bundle.standing_charge = standing;
                if let Some(s) = cost_summary(&bundle.values, standing.unwrap_or(0.0)) {
                    bundle.gauges = vec![
                        Gauge::new("Total cost", s.total_pounds, "£"),
                        Gauge::new("Min half-hour cost", s.min_slot, "p"),
                        Gauge::new("Max half-hour cost", s.max_slot, "p"),
                    ];
                }
            }
        }

        let available = self.sync.next_available(region).await?;
        self.session.set_next_available(available);
        Ok(GraphResponse::Bundle(Box::new(bundle)))
    }

    async fn fetch(
        &self,
        key: SeriesKey,
        window: DayWindow,
        initial: bool,
        direction: Direction,
    ) -> Result<SyncOutcome> {
        self.sync
            .sync(&SyncRequest::new(key, window, initial, direction))
            .await
    }

    async fn standing_charge(
        &self,
        window: DayWindow,
        initial: bool,
        direction: Direction,
    ) -> Result<Option<f64>> {
        let tariff = tariff_code(&self.product_code, self.session.region());
        let points = self
            .fetch(SeriesKey::Standing(tariff), window, initial, direction)
            .await?
            .into_points();
        // the charge in force at the start of the day
        Ok(points
            .iter()
            .rev()
            .find(|p| p.valid_from <= window.start)
            .or_else(|| points.first())
            .map(|p| p.value))
    }

    fn set_times(&self, bundle: &mut GraphBundle, points: &[TimePoint]) {
        let tz = self.sync.tz();
        bundle.times = points.iter().map(|p| p.valid_from).collect();
        bundle.local_times = points
            .iter()
            .map(|p| p.valid_from.with_timezone(&tz).to_rfc3339())
            .collect();
    }

    pub fn appliances(&self) -> &[Appliance] {
        self.appliances.list()
    }

    pub fn add_appliance(&mut self, appliance: Appliance) -> Result<()> {
        self.logger.info(&format!(
            "Adding appliance {} ({} W)",
            appliance.name, appliance.power_w
        ));
        self.appliances.add(appliance)
    }

    pub fn remove_appliance(&mut self, id: Uuid) -> bool {
        self.appliances.remove(id)
    }

    /// Cheapest run of every appliance within today's and tomorrow's prices
    pub async fn estimate_appliances(&mut self) -> Result<Vec<ApplianceEstimate>> {
        let region = self.session.region();
        let now = self.sync.now();
        let mut upcoming = Vec::new();
        for offset in 0..=1 {
            let window = self.sync.window(offset)?;
            let points = self
                .fetch(SeriesKey::Price(region), window, false, Direction::Right)
                .await?
                .into_points();
            upcoming.extend(points.into_iter().filter(|p| p.valid_from >= now));
        }
        let available = self.sync.next_available(region).await?;
        self.session.set_next_available(available);

        let tz = self.sync.tz();
        let estimates: Vec<ApplianceEstimate> = self
            .appliances
            .list()
            .iter()
            .filter_map(|a| estimate(a, &upcoming, now, tz, available))
            .collect();
        if estimates.len() < self.appliances.list().len() {
            self.logger.warn(&format!(
                "Only {} upcoming price slots; some appliances have no estimate",
                upcoming.len()
            ));
        }
        Ok(estimates)
    }
}
