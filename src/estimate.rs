use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::errors::{EstimateError, RateLookupError};
use crate::tariff::TariffModel;
use crate::usage::UsageSeries;

/// How often the tariff's standing charge is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StandingChargeBasis {
    /// Once for the whole estimate.
    #[default]
    PerRun,
    /// Once for every calendar day present in the usage series.
    PerDay,
}

// Always written with a numeric offset, "+00:00" rather than "Z"
fn rfc3339<S: Serializer>(
    timestamp: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<FixedOffset>,
    pub consumption: Decimal,
    pub band: String,
    pub rate: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandTotal {
    pub band: String,
    pub rate: Decimal,
    pub consumption: Decimal,
    pub cost: Decimal,
}

/// Unrounded result of one estimation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub tariff_name: String,
    pub total_cost: Decimal,
    pub consumption_cost: Decimal,
    pub standing_charge: Decimal,
    pub total_consumption: Decimal,
    pub days: usize,
    pub band_totals: Vec<BandTotal>,
    pub line_items: Vec<LineItem>,
}

/// Price a usage series against a tariff, charging the standing charge once.
pub fn estimate_cost(
    model: &TariffModel,
    series: &UsageSeries,
) -> Result<CostBreakdown, EstimateError> {
    estimate_cost_with(model, series, StandingChargeBasis::PerRun)
}

// Each sample is priced by the slot its start falls in; a sample is assumed
// not to straddle a change of rate.
pub fn estimate_cost_with(
    model: &TariffModel,
    series: &UsageSeries,
    basis: StandingChargeBasis,
) -> Result<CostBreakdown, EstimateError> {
    let granularity = model.granularity();
    let mut band_totals: Vec<BandTotal> = model
        .bands()
        .iter()
        .map(|band| BandTotal {
            band: band.label.clone(),
            rate: band.rate_per_unit,
            consumption: Decimal::ZERO,
            cost: Decimal::ZERO,
        })
        .collect();

    let mut consumption_cost = Decimal::ZERO;
    let mut total_consumption = Decimal::ZERO;
    let mut line_items = Vec::with_capacity(series.len());

    for sample in series.iter() {
        let slot = granularity.slot_of(sample.minute_of_day());
        let (index, band) = model.band_of_slot(slot).ok_or_else(|| RateLookupError {
            row: sample.row,
            timestamp: sample.timestamp.to_rfc3339(),
            slot: granularity.slot_key(slot),
        })?;
        let overflow = || EstimateError::Overflow { row: sample.row };
        let cost = sample
            .consumption
            .checked_mul(band.rate_per_unit)
            .ok_or_else(overflow)?;

        consumption_cost = consumption_cost.checked_add(cost).ok_or_else(overflow)?;
        total_consumption = total_consumption
            .checked_add(sample.consumption)
            .ok_or_else(overflow)?;
        let total = &mut band_totals[index];
        total.consumption = total
            .consumption
            .checked_add(sample.consumption)
            .ok_or_else(overflow)?;
        total.cost = total.cost.checked_add(cost).ok_or_else(overflow)?;

        line_items.push(LineItem {
            timestamp: sample.timestamp,
            consumption: sample.consumption,
            band: band.label.clone(),
            rate: band.rate_per_unit,
            cost,
        });
    }

    let days = series.days();
    let standing_charge = match basis {
        StandingChargeBasis::PerRun => Some(model.standing_charge),
        StandingChargeBasis::PerDay => model.standing_charge.checked_mul(Decimal::from(days)),
    };
    let (standing_charge, total_cost) = standing_charge
        .and_then(|charge| Some((charge, consumption_cost.checked_add(charge)?)))
        .ok_or(EstimateError::StandingChargeOverflow { days })?;

    Ok(CostBreakdown {
        tariff_name: model.name.clone(),
        total_cost,
        consumption_cost,
        standing_charge,
        total_consumption,
        days,
        band_totals,
        line_items,
    })
}
