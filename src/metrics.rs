//! Derived metrics over a synchronized window
//!
//! Plain functions over `f64` slices. Rounding follows the dashboard's
//! display conventions: values are nudged by `f64::EPSILON` before
//! rounding so that representable halves round up.

use crate::error::{AgileViewError, Result};
use serde::Serialize;

const EPS: f64 = f64::EPSILON;

/// Round to two decimals, halves away from zero
pub fn round2(x: f64) -> f64 {
    (x * 100.0 + EPS).round() / 100.0
}

/// Round to the nearest integer, exact halves to the even neighbour
pub fn round_half_even(x: f64) -> f64 {
    x.round_ties_even()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremes {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Minimum, maximum and mean, each rounded to two decimals.
/// `None` for an empty slice.
pub fn extremes(values: &[f64]) -> Option<Extremes> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(Extremes {
        min: round2(min),
        max: round2(max),
        mean: round2(mean),
    })
}

/// Per-slot cost in pence: price times consumption rounded half-to-even.
///
/// Both series are zero-padded to `intervals` first. Series that still
/// differ in length afterwards (one longer than `intervals`) are rejected.
pub fn cost(unit: &[f64], consumption: &[f64], intervals: usize) -> Result<Vec<f64>> {
    let unit = pad(unit, intervals);
    let consumption = pad(consumption, intervals);
    if unit.len() != consumption.len() {
        return Err(AgileViewError::validation(
            "cost",
            &format!(
                "price and consumption lengths differ ({} vs {})",
                unit.len(),
                consumption.len()
            ),
        ));
    }
    Ok(unit
        .iter()
        .zip(&consumption)
        .map(|(price, used)| price * round_half_even(*used))
        .collect())
}

fn pad(values: &[f64], len: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    if out.len() < len {
        out.resize(len, 0.0);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheapestWindow {
    pub start_index: usize,
    pub sum: f64,
}

/// Contiguous run of `count` values with the smallest sum; the earliest
/// run wins ties. `None` when `count` is zero or exceeds the slice.
pub fn cheapest_window(values: &[f64], count: usize) -> Option<CheapestWindow> {
    if count == 0 || count > values.len() {
        return None;
    }
    let mut sum: f64 = values[..count].iter().sum();
    let mut best = CheapestWindow { start_index: 0, sum };
    for i in count..values.len() {
        sum += values[i] - values[i - count];
        if sum < best.sum {
            best = CheapestWindow {
                start_index: i + 1 - count,
                sum,
            };
        }
    }
    Some(best)
}

/// Gauges of the consumption graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionSummary {
    /// kWh over the day
    pub total_kwh: f64,
    /// Mean draw in watts
    pub average_w: f64,
    /// Peak half-hour draw in watts
    pub max_w: f64,
}

pub fn consumption_summary(kwh: &[f64]) -> Option<ConsumptionSummary> {
    if kwh.is_empty() {
        return None;
    }
    let total: f64 = kwh.iter().sum();
    let max = kwh.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(ConsumptionSummary {
        total_kwh: total,
        average_w: (total / kwh.len() as f64 * 1000.0 + EPS).round(),
        // kWh per half hour doubled is the mean kW over that slot
        max_w: (max * 2000.0 + EPS).round(),
    })
}

/// Gauges of the cost graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSummary {
    /// Day total including the standing charge, in pounds
    pub total_pounds: f64,
    pub min_slot: f64,
    pub max_slot: f64,
}

/// Summarise slot costs (pence) plus a daily standing charge (pence)
pub fn cost_summary(slot_costs: &[f64], standing_pence: f64) -> Option<CostSummary> {
    if slot_costs.is_empty() {
        return None;
    }
    let total: f64 = slot_costs.iter().sum::<f64>() + standing_pence;
    let min = slot_costs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = slot_costs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(CostSummary {
        total_pounds: round2(total / 100.0),
        min_slot: (min + EPS).round(),
        max_slot: (max + EPS).round(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheapest_window_examples() {
        assert_eq!(
            cheapest_window(&[5.0, 1.0, 1.0, 5.0], 2),
            Some(CheapestWindow {
                start_index: 1,
                sum: 2.0
            })
        );
        assert_eq!(
            cheapest_window(&[3.0, 3.0, 3.0], 1),
            Some(CheapestWindow {
                start_index: 0,
                sum: 3.0
            })
        );
    }

    #[test]
    fn cheapest_window_rejects_bad_counts() {
        assert_eq!(cheapest_window(&[1.0, 2.0], 3), None);
        assert_eq!(cheapest_window(&[1.0, 2.0], 0), None);
        let whole = cheapest_window(&[1.0, 2.0], 2).unwrap();
        assert_eq!(whole.start_index, 0);
        assert_eq!(whole.sum, 3.0);
    }

    #[test]
    fn cheapest_window_finds_late_minimum() {
        let prices = [20.0, 18.0, 25.0, 9.0, 4.0, 30.0];
        let w = cheapest_window(&prices, 2).unwrap();
        assert_eq!(w.start_index, 3);
        assert_eq!(w.sum, 13.0);
    }

    #[test]
    fn cost_rounds_consumption_half_to_even() {
        assert_eq!(cost(&[10.0], &[2.5], 1).unwrap(), vec![20.0]);
        assert_eq!(cost(&[10.0], &[3.5], 1).unwrap(), vec![40.0]);
    }

    #[test]
    fn cost_pads_short_series() {
        let c = cost(&[10.0, 20.0], &[1.0], 48).unwrap();
        assert_eq!(c.len(), 48);
        assert_eq!(c[0], 10.0);
        assert!(c[1..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn cost_rejects_mismatch_beyond_padding() {
        let unit = vec![1.0; 50];
        let used = vec![1.0; 48];
        assert!(cost(&unit, &used, 48).is_err());
        assert_eq!(cost(&unit, &unit, 48).unwrap().len(), 50);
    }

    #[test]
    fn extremes_round_to_two_decimals() {
        let e = extremes(&[10.004, 20.006]).unwrap();
        assert_eq!(e.min, 10.0);
        assert_eq!(e.max, 20.01);
        // the mean is exactly 1500.5 hundredths after the epsilon nudge
        assert_eq!(e.mean, 15.01);
        assert!(extremes(&[]).is_none());
    }

    #[test]
    fn round_helpers() {
        assert_eq!(round2(1.005 + 1e-12), 1.01);
        assert_eq!(round_half_even(0.5), 0.0);
        assert_eq!(round_half_even(1.5), 2.0);
        assert_eq!(round_half_even(2.4), 2.0);
    }

    #[test]
    fn consumption_gauges() {
        let s = consumption_summary(&[0.25, 0.5, 0.75, 0.5]).unwrap();
        assert_eq!(s.total_kwh, 2.0);
        assert_eq!(s.average_w, 500.0);
        assert_eq!(s.max_w, 1500.0);
    }

    #[test]
    fn cost_gauges_include_standing_charge() {
        let s = cost_summary(&[10.4, 20.6, 0.0], 50.0).unwrap();
        assert_eq!(s.total_pounds, 0.81);
        assert_eq!(s.min_slot, 0.0);
        assert_eq!(s.max_slot, 21.0);
    }
}
