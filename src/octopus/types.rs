use crate::series::RawPoint;
use serde::{Deserialize, Serialize};

/// One page of a paginated list endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountDocument {
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Property {
    #[serde(default)]
    pub electricity_meter_points: Vec<MeterPoint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeterPoint {
    pub mpan: String,
    #[serde(default)]
    pub meters: Vec<Meter>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Meter {
    pub serial_number: String,
}

/// Electricity meter addressed by consumption requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterId {
    pub mpan: String,
    pub serial_number: String,
}

impl AccountDocument {
    /// First property, its first electricity meter point, and that point's
    /// most recently installed meter
    pub(crate) fn primary_meter(&self) -> Option<MeterId> {
        let point = self.properties.first()?.electricity_meter_points.first()?;
        let meter = point.meters.last()?;
        Some(MeterId {
            mpan: point.mpan.clone(),
            serial_number: meter.serial_number.clone(),
        })
    }
}
