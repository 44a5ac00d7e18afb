//! Series identity, stored points and wire normalisation
//!
//! Every cached value belongs to exactly one [`SeriesKey`]. The key also
//! selects a [`SeriesProfile`], which is the only place where price,
//! consumption, alternate-tariff and standing-charge series differ.

use crate::error::{AgileViewError, Result};
use crate::fetcher::FetchRange;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// UK distribution network region of a tariff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    J,
    K,
    L,
    M,
    N,
    P,
}

impl Region {
    pub const ALL: [Self; 14] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::J,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::P,
    ];

    /// Single-letter region code used in tariff codes
    pub const fn code(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
            Self::H => "H",
            Self::J => "J",
            Self::K => "K",
            Self::L => "L",
            Self::M => "M",
            Self::N => "N",
            Self::P => "P",
        }
    }

    /// Human-readable area name
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "Eastern England",
            Self::B => "East Midlands",
            Self::C => "London",
            Self::D => "Merseyside & Northern Wales",
            Self::E => "West Midlands",
            Self::F => "North Eastern England",
            Self::G => "North Western England",
            Self::H => "Southern England",
            Self::J => "South Eastern England",
            Self::K => "Southern Wales",
            Self::L => "South Western England",
            Self::M => "Yorkshire",
            Self::N => "Southern Scotland",
            Self::P => "Northern Scotland",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = AgileViewError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|r| r.code() == code)
            .ok_or_else(|| AgileViewError::validation("region", &format!("unknown region {}", s)))
    }
}

/// Full tariff code of a single-register product in `region`
pub fn tariff_code(product_code: &str, region: Region) -> String {
    format!("E-1R-{}-{}", product_code, region)
}

/// Identifier of one independent cached series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesKey {
    /// Half-hourly unit price of the main tariff
    Price(Region),
    /// Unit price of the comparison tariff, expanded to half hours
    AltTariff(Region),
    /// Half-hourly metered consumption
    Consumption,
    /// Daily standing charge of a tariff code
    Standing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    HalfHour,
    Daily,
}

/// How a cached window is judged complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SufficiencyRule {
    /// Count-based, tolerant of today's tail and of unpublished days
    Rolling,
    /// Anything cached is enough; never refreshed
    ZeroOnly,
}

/// Per-kind behaviour of the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesProfile {
    pub granularity: Granularity,
    pub rule: SufficiencyRule,
    pub expand_half_hours: bool,
    pub reports_no_data: bool,
}

const HALF_HOURLY: SeriesProfile = SeriesProfile {
    granularity: Granularity::HalfHour,
    rule: SufficiencyRule::Rolling,
    expand_half_hours: false,
    reports_no_data: false,
};

impl SeriesKey {
    /// Partition name in the cache store
    pub fn storage_key(&self) -> String {
        match self {
            Self::Price(region) => region.code().to_string(),
            Self::AltTariff(region) => format!("Go:{}", region),
            Self::Consumption => "consumption".to_string(),
            Self::Standing(tariff) => format!("standing:{}", tariff),
        }
    }

    pub const fn profile(&self) -> SeriesProfile {
        match self {
            Self::Price(_) => HALF_HOURLY,
            Self::AltTariff(_) => SeriesProfile {
                expand_half_hours: true,
                ..HALF_HOURLY
            },
            Self::Consumption => SeriesProfile {
                reports_no_data: true,
                ..HALF_HOURLY
            },
            Self::Standing(_) => SeriesProfile {
                granularity: Granularity::Daily,
                rule: SufficiencyRule::ZeroOnly,
                expand_half_hours: false,
                reports_no_data: false,
            },
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// One stored interval value
///
/// `valid_to` is `None` for open-ended periods (a standing charge that is
/// still current).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub value: f64,
}

/// Record as returned by the provider, before timestamps are parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    #[serde(alias = "interval_start")]
    pub valid_from: String,
    #[serde(alias = "interval_end", default)]
    pub valid_to: Option<String>,
    #[serde(alias = "value_inc_vat", alias = "consumption")]
    pub value: f64,
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s.trim())?.with_timezone(&Utc))
}

impl RawPoint {
    fn parse(&self) -> Result<TimePoint> {
        let valid_from = parse_instant(&self.valid_from)?;
        let valid_to = match self.valid_to.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(parse_instant(s)?),
            _ => None,
        };
        Ok(TimePoint {
            valid_from,
            valid_to,
            value: self.value,
        })
    }
}

/// Result of turning provider records into storable points
#[derive(Debug, Default)]
pub struct Normalized {
    pub points: Vec<TimePoint>,
    pub skipped: usize,
}

/// Parse provider records for `key`, expanding long periods into half-hour
/// slots when the series profile asks for it. Output is sorted by
/// `valid_from` with duplicates collapsed (last record wins).
pub fn normalize(key: &SeriesKey, raw: &[RawPoint], range: &FetchRange) -> Normalized {
    let mut out = Normalized::default();
    let expand = key.profile().expand_half_hours;

    for record in raw {
        let Ok(point) = record.parse() else {
            out.skipped += 1;
            continue;
        };
        if expand {
            expand_into_slots(&point, range, &mut out.points);
        } else {
            out.points.push(point);
        }
    }

    out.points.sort_by_key(|p| p.valid_from);
    // keep the later of two records for the same start
    out.points.reverse();
    out.points.dedup_by_key(|p| p.valid_from);
    out.points.reverse();
    out
}

fn expand_into_slots(point: &TimePoint, range: &FetchRange, sink: &mut Vec<TimePoint>) {
    let slot = TimeDelta::minutes(crate::timewindow::SLOT_MINUTES);
    let end = point
        .valid_to
        .map_or(range.period_to, |t| t.min(range.period_to));
    let mut cursor = point.valid_from.max(range.period_from);
    while cursor < end {
        sink.push(TimePoint {
            valid_from: cursor,
            valid_to: Some(cursor + slot),
            value: point.value,
        });
        cursor += slot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn raw(from: &str, to: Option<&str>, value: f64) -> RawPoint {
        RawPoint {
            valid_from: from.to_string(),
            valid_to: to.map(str::to_string),
            value,
        }
    }

    #[test]
    fn region_parsing_and_names() {
        assert_eq!("c".parse::<Region>().unwrap(), Region::C);
        assert_eq!(Region::C.name(), "London");
        assert!("I".parse::<Region>().is_err());
        assert!("O".parse::<Region>().is_err());
        assert_eq!(Region::ALL.len(), 14);
    }

    #[test]
    fn storage_keys_partition_series() {
        assert_eq!(SeriesKey::Price(Region::A).storage_key(), "A");
        assert_eq!(SeriesKey::AltTariff(Region::A).storage_key(), "Go:A");
        assert_eq!(SeriesKey::Consumption.storage_key(), "consumption");
        let tariff = tariff_code("AGILE-24-10-01", Region::A);
        assert_eq!(tariff, "E-1R-AGILE-24-10-01-A");
        assert_eq!(
            SeriesKey::Standing(tariff).storage_key(),
            "standing:E-1R-AGILE-24-10-01-A"
        );
    }

    #[test]
    fn profiles_differ_only_where_expected() {
        assert_eq!(SeriesKey::Price(Region::B).profile(), HALF_HOURLY);
        assert!(SeriesKey::Consumption.profile().reports_no_data);
        assert!(SeriesKey::AltTariff(Region::B).profile().expand_half_hours);
        let standing = SeriesKey::Standing("X".into()).profile();
        assert_eq!(standing.granularity, Granularity::Daily);
        assert_eq!(standing.rule, SufficiencyRule::ZeroOnly);
    }

    #[test]
    fn wire_aliases_are_accepted() {
        let unit: RawPoint = serde_json::from_str(
            r#"{"value_exc_vat": 20.0, "value_inc_vat": 21.0,
                "valid_from": "2025-01-15T00:00:00Z", "valid_to": "2025-01-15T00:30:00Z",
                "payment_method": null}"#,
        )
        .unwrap();
        assert_eq!(unit.value, 21.0);

        let usage: RawPoint = serde_json::from_str(
            r#"{"consumption": 0.25, "interval_start": "2025-01-15T00:00:00+00:00",
                "interval_end": "2025-01-15T00:30:00+00:00"}"#,
        )
        .unwrap();
        assert_eq!(usage.value, 0.25);

        let standing: RawPoint = serde_json::from_str(
            r#"{"value_inc_vat": 48.5, "valid_from": "2024-10-01T00:00:00Z", "valid_to": null}"#,
        )
        .unwrap();
        assert!(standing.valid_to.is_none());
    }

    #[test]
    fn normalize_sorts_skips_and_dedups() {
        let range = FetchRange::new(utc("2025-01-15T00:00:00Z"), utc("2025-01-16T00:00:00Z"));
        let records = vec![
            raw("2025-01-15T00:30:00Z", Some("2025-01-15T01:00:00Z"), 2.0),
            raw("garbage", None, 9.0),
            raw("2025-01-15T00:00:00Z", Some("2025-01-15T00:30:00Z"), 1.0),
            raw("2025-01-15T00:30:00Z", Some("2025-01-15T01:00:00Z"), 3.0),
        ];
        let out = normalize(&SeriesKey::Price(Region::A), &records, &range);
        assert_eq!(out.skipped, 1);
        let values: Vec<f64> = out.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[test]
    fn alternate_tariff_is_expanded_and_clipped() {
        let range = FetchRange::new(utc("2025-01-15T00:00:00Z"), utc("2025-01-15T06:00:00Z"));
        let records = vec![
            raw("2025-01-14T04:30:00Z", Some("2025-01-15T00:30:00Z"), 25.0),
            raw("2025-01-15T00:30:00Z", Some("2025-01-15T04:30:00Z"), 8.5),
            raw("2025-01-15T04:30:00Z", None, 25.0),
        ];
        let out = normalize(&SeriesKey::AltTariff(Region::A), &records, &range);
        assert_eq!(out.points.len(), 12);
        assert_eq!(out.points[0].valid_from, range.period_from);
        assert_eq!(out.points[0].value, 25.0);
        assert_eq!(out.points[1].value, 8.5);
        assert_eq!(out.points[8].value, 8.5);
        assert_eq!(out.points[9].value, 25.0);
        assert_eq!(
            out.points[11].valid_to,
            Some(utc("2025-01-15T06:00:00Z"))
        );
    }
}
