use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::estimate::{BandTotal, CostBreakdown, LineItem};

// Money is rounded here and nowhere else
fn round(value: Decimal, precision: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(precision);
    rounded
}

/// A cost breakdown with costs rounded for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub tariff_name: String,
    pub total_cost: Decimal,
    pub consumption_cost: Decimal,
    pub standing_charge: Decimal,
    pub total_consumption: Decimal,
    pub days: usize,
    pub band_totals: Vec<BandTotal>,
    pub line_items: Vec<LineItem>,
}

impl Report {
    pub fn new(breakdown: &CostBreakdown, precision: u32) -> Self {
        Self {
            tariff_name: breakdown.tariff_name.clone(),
            total_cost: round(breakdown.total_cost, precision),
            consumption_cost: round(breakdown.consumption_cost, precision),
            standing_charge: round(breakdown.standing_charge, precision),
            total_consumption: breakdown.total_consumption.normalize(),
            days: breakdown.days,
            band_totals: breakdown
                .band_totals
                .iter()
                .map(|t| BandTotal {
                    consumption: t.consumption.normalize(),
                    cost: round(t.cost, precision),
                    ..t.clone()
                })
                .collect(),
            line_items: breakdown
                .line_items
                .iter()
                .map(|item| LineItem {
                    cost: round(item.cost, precision),
                    ..item.clone()
                })
                .collect(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("cannot write report to {}", path.display()))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tariff {}", self.tariff_name)?;
        for t in &self.band_totals {
            writeln!(f, "  {}: {} kWh @ {}/kWh = {}", t.band, t.consumption, t.rate, t.cost)?;
        }
        writeln!(
            f,
            "Consumption {} kWh over {} days, Energy {}, Standing charge {}",
            self.total_consumption, self.days, self.consumption_cost, self.standing_charge
        )?;
        writeln!(f, "Total {}", self.total_cost)
    }
}
