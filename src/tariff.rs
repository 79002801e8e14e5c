use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::errors::{PeriodError, TariffConflictError, TariffError, TariffFormatError};
use crate::numeric::decimal_from_json;
use crate::time_of_day::{Granularity, TimePeriod};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateBand {
    pub label: String,
    pub rate_per_unit: Decimal, // per kWh
    pub time_periods: Vec<TimePeriod>,
}

/// A tariff expanded to one rate band per time-of-day slot. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffModel {
    pub name: String,
    pub standing_charge: Decimal,
    granularity: Granularity,
    bands: Vec<RateBand>,
    slots: Vec<Option<usize>>, // index into bands, one entry per slot of the day
}

impl TariffModel {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn bands(&self) -> &[RateBand] {
        &self.bands
    }

    /// The band covering `slot` together with its position in `bands()`.
    pub fn band_of_slot(&self, slot: usize) -> Option<(usize, &RateBand)> {
        self.slots
            .get(slot)
            .copied()
            .flatten()
            .map(|i| (i, &self.bands[i]))
    }

    #[cfg(test)]
    pub fn rate_of_slot(&self, slot: usize) -> Option<Decimal> {
        self.band_of_slot(slot).map(|(_, b)| b.rate_per_unit)
    }

    pub fn uncovered_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, band)| band.is_none())
            .map(|(slot, _)| slot)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

fn format_error(field: impl Into<String>, reason: impl Into<String>) -> TariffFormatError {
    TariffFormatError {
        field: field.into(),
        reason: reason.into(),
    }
}

fn join(path: &str, key: &str) -> String {
    match path {
        "" => key.to_string(),
        _ => format!("{}.{}", path, key),
    }
}

fn required<'a>(
    object: &'a Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<&'a Value, TariffFormatError> {
    object
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| format_error(join(path, key), "missing required field"))
}

fn required_decimal(
    object: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<Decimal, TariffFormatError> {
    decimal_from_json(required(object, path, key)?)
        .ok_or_else(|| format_error(join(path, key), "expected a decimal number"))
}

fn parse_period(
    raw: &Value,
    field: String,
    granularity: Granularity,
) -> Result<TimePeriod, TariffFormatError> {
    let text = raw
        .as_str()
        .ok_or_else(|| format_error(&field, "expected a \"HH:MM-HH:MM\" string"))?;
    text.parse::<TimePeriod>()
        .and_then(|period| period.check_aligned(granularity).map(|_| period))
        .map_err(|e: PeriodError| format_error(&field, e.to_string()))
}

fn parse_band(
    label: &str,
    raw: &Value,
    granularity: Granularity,
) -> Result<RateBand, TariffFormatError> {
    let path = join("rates", label);
    let band = raw
        .as_object()
        .ok_or_else(|| format_error(&path, "expected an object"))?;
    let rate_per_unit = required_decimal(band, &path, "rate_per_kwh")?;

    let periods_path = join(&path, "time_periods");
    let raw_periods = required(band, &path, "time_periods")?
        .as_array()
        .filter(|periods| !periods.is_empty())
        .ok_or_else(|| format_error(&periods_path, "expected a non-empty list of periods"))?;
    let time_periods = raw_periods
        .iter()
        .enumerate()
        .map(|(i, p)| parse_period(p, format!("{}[{}]", periods_path, i), granularity))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RateBand {
        label: label.to_string(),
        rate_per_unit,
        time_periods,
    })
}

/// Expand a raw tariff (`tariff_name`, `standing_charge`, `rates`) into a per-slot rate table.
///
/// Bands are taken in label order. A slot claimed twice, whether by two bands or by
/// overlapping periods of one band, fails with [`TariffConflictError`]. Slots no band claims
/// are left uncovered.
pub fn build_tariff_model(
    raw: &Value,
    granularity: Granularity,
) -> Result<TariffModel, TariffError> {
    let root = raw
        .as_object()
        .ok_or_else(|| format_error("", "tariff must be an object"))?;
    let name = required(root, "", "tariff_name")?
        .as_str()
        .ok_or_else(|| format_error("tariff_name", "expected a string"))?
        .to_string();
    let standing_charge = required_decimal(root, "", "standing_charge")?;
    if standing_charge < Decimal::ZERO {
        return Err(format_error("standing_charge", "must not be negative").into());
    }
    let rates = required(root, "", "rates")?
        .as_object()
        .filter(|rates| !rates.is_empty())
        .ok_or_else(|| format_error("rates", "expected a non-empty object of rate bands"))?;
    let bands = rates
        .iter()
        .map(|(label, band)| parse_band(label, band, granularity))
        .collect::<Result<Vec<_>, _>>()?;

    let mut slots = vec![None; granularity.slots_per_day()];
    for (index, band) in bands.iter().enumerate() {
        for slot in band.time_periods.iter().flat_map(|p| p.slots(granularity)) {
            if let Some(owner) = slots[slot] {
                let first: &RateBand = &bands[owner];
                return Err(TariffConflictError {
                    slot: granularity.slot_key(slot),
                    first: first.label.clone(),
                    second: band.label.clone(),
                }
                .into());
            }
            slots[slot] = Some(index);
        }
    }

    Ok(TariffModel {
        name,
        standing_charge,
        granularity,
        bands,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn tariff(rates: Value) -> Value {
        json!({
            "tariff_name": "Test",
            "standing_charge": 0.05,
            "rates": rates,
        })
    }

    fn format_field(result: Result<TariffModel, TariffError>) -> Option<String> {
        match result {
            Err(TariffError::Format(e)) => Some(e.field),
            _ => None,
        }
    }

    #[test]
    fn test_flat_tariff_covers_every_slot() -> Result<()> {
        let raw = tariff(json!({"flat": {"rate_per_kwh": 0.10, "time_periods": ["00:00-24:00"]}}));
        let model = build_tariff_model(&raw, Granularity::HALF_HOUR)?;
        assert_eq!(model.name, "Test");
        assert_eq!(model.standing_charge, Decimal::new(5, 2));
        assert!(model.is_complete());
        for slot in 0..48 {
            assert_eq!(model.rate_of_slot(slot), Some(Decimal::new(10, 2)));
        }
        assert_eq!(model.rate_of_slot(48), None);
        Ok(())
    }

    #[test]
    fn test_overnight_period_wraps() -> Result<()> {
        let raw = tariff(json!({"night": {"rate_per_kwh": "0.08", "time_periods": ["23:00-01:00"]}}));
        let model = build_tariff_model(&raw, Granularity::HALF_HOUR)?;
        let rate = Some(Decimal::new(8, 2));
        for slot in [46, 47, 0, 1] {
            assert_eq!(model.rate_of_slot(slot), rate, "slot {}", slot);
        }
        assert_eq!(model.rate_of_slot(2), None);
        assert_eq!(model.rate_of_slot(45), None);
        assert_eq!(model.uncovered_slots().len(), 44);
        assert!(!model.is_complete());
        Ok(())
    }

    #[test]
    fn test_day_night_tariff() -> Result<()> {
        let raw = tariff(json!({
            "day": {"rate_per_kwh": 0.30, "time_periods": ["07:00-23:00"]},
            "night": {"rate_per_kwh": 0.12, "time_periods": ["23:00-07:00"]},
        }));
        let model = build_tariff_model(&raw, Granularity::HALF_HOUR)?;
        assert!(model.is_complete());
        assert_eq!(model.band_of_slot(13).map(|(_, b)| b.label.as_str()), Some("night"));
        assert_eq!(model.band_of_slot(14).map(|(_, b)| b.label.as_str()), Some("day"));
        assert_eq!(model.band_of_slot(45).map(|(_, b)| b.label.as_str()), Some("day"));
        assert_eq!(model.band_of_slot(46).map(|(_, b)| b.label.as_str()), Some("night"));
        assert_eq!(model.band_of_slot(46).map(|(i, _)| i), Some(1));
        assert_eq!(model.band_of_slot(48), None);
        Ok(())
    }

    #[test]
    fn test_multiple_periods_and_hourly_slots() -> Result<()> {
        let raw = tariff(json!({
            "peak": {"rate_per_kwh": 0.40, "time_periods": ["08:00-11:00", "17:00-20:00"]},
            "offpeak": {"rate_per_kwh": 0.20, "time_periods": ["20:00-08:00", "11:00-17:00"]},
        }));
        let hourly = Granularity::new(60).ok_or_else(|| anyhow::anyhow!("bad granularity"))?;
        let model = build_tariff_model(&raw, hourly)?;
        assert!(model.is_complete());
        assert_eq!(model.rate_of_slot(9), Some(Decimal::new(40, 2)));
        assert_eq!(model.rate_of_slot(12), Some(Decimal::new(20, 2)));
        assert_eq!(model.rate_of_slot(18), Some(Decimal::new(40, 2)));
        assert_eq!(model.rate_of_slot(2), Some(Decimal::new(20, 2)));
        Ok(())
    }

    #[test]
    fn test_json_text_rates_are_exact() -> Result<()> {
        let raw: Value = serde_json::from_str(
            r#"{
                "tariff_name": "Precise",
                "standing_charge": 0.12345678901234567891,
                "rates": {"flat": {"rate_per_kwh": 0.30000000000000000001, "time_periods": ["00:00-24:00"]}}
            }"#,
        )?;
        let model = build_tariff_model(&raw, Granularity::HALF_HOUR)?;
        assert_eq!(model.standing_charge.to_string(), "0.12345678901234567891");
        assert_eq!(model.rate_of_slot(0).map(|r| r.to_string()), Some("0.30000000000000000001".to_string()));
        Ok(())
    }

    #[test]
    fn test_overlapping_bands_rejected() {
        let raw = tariff(json!({
            "a": {"rate_per_kwh": 0.30, "time_periods": ["08:00-09:00"]},
            "b": {"rate_per_kwh": 0.20, "time_periods": ["07:00-08:30"]},
        }));
        let expected = Err(TariffError::Conflict(TariffConflictError {
            slot: "08:00".to_string(),
            first: "a".to_string(),
            second: "b".to_string(),
        }));
        assert_eq!(build_tariff_model(&raw, Granularity::HALF_HOUR), expected);
        assert_eq!(build_tariff_model(&raw, Granularity::HALF_HOUR), expected);
    }

    #[test]
    fn test_overlap_within_band_rejected() {
        let raw = tariff(json!({"a": {"rate_per_kwh": 0.30, "time_periods": ["08:00-10:00", "09:30-11:00"]}}));
        assert!(matches!(
            build_tariff_model(&raw, Granularity::HALF_HOUR),
            Err(TariffError::Conflict(TariffConflictError { ref slot, .. })) if slot == "09:30"
        ));
    }

    #[test]
    fn test_zero_length_period_contributes_nothing() -> Result<()> {
        let raw = tariff(json!({
            "flat": {"rate_per_kwh": 0.10, "time_periods": ["00:00-24:00"]},
            "unused": {"rate_per_kwh": 0.99, "time_periods": ["12:00-12:00"]},
        }));
        let model = build_tariff_model(&raw, Granularity::HALF_HOUR)?;
        assert!(model.is_complete());
        assert_eq!(model.rate_of_slot(24), Some(Decimal::new(10, 2)));
        Ok(())
    }

    #[test]
    fn test_build_is_idempotent() -> Result<()> {
        let raw = tariff(json!({
            "day": {"rate_per_kwh": 0.30, "time_periods": ["07:30-00:30"]},
            "night": {"rate_per_kwh": 0.12, "time_periods": ["00:30-07:30"]},
        }));
        let first = build_tariff_model(&raw, Granularity::HALF_HOUR)?;
        let second = build_tariff_model(&raw, Granularity::HALF_HOUR)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_malformed_periods_rejected() {
        let field = "rates.flat.time_periods[0]".to_string();
        for period in ["1200-1300", "25:00-26:00", "07:15-08:00", ""] {
            let raw = tariff(json!({"flat": {"rate_per_kwh": 0.10, "time_periods": [period]}}));
            assert_eq!(
                format_field(build_tariff_model(&raw, Granularity::HALF_HOUR)),
                Some(field.clone()),
                "period '{}'",
                period
            );
        }
        let raw = tariff(json!({"flat": {"rate_per_kwh": 0.10, "time_periods": ["00:00-12:00", 1200]}}));
        assert_eq!(
            format_field(build_tariff_model(&raw, Granularity::HALF_HOUR)),
            Some("rates.flat.time_periods[1]".to_string())
        );
    }

    #[test]
    fn test_missing_fields_rejected() {
        let band = json!({"flat": {"rate_per_kwh": 0.10, "time_periods": ["00:00-24:00"]}});
        let cases = [
            (json!({"standing_charge": 0.05, "rates": band.clone()}), "tariff_name"),
            (json!({"tariff_name": "T", "rates": band.clone()}), "standing_charge"),
            (json!({"tariff_name": "T", "standing_charge": 0.05}), "rates"),
            (json!({"tariff_name": "T", "standing_charge": 0.05, "rates": {}}), "rates"),
            (json!({"tariff_name": "T", "standing_charge": "n/a", "rates": band.clone()}), "standing_charge"),
            (json!({"tariff_name": "T", "standing_charge": -1, "rates": band.clone()}), "standing_charge"),
            (tariff(json!({"flat": {"time_periods": ["00:00-24:00"]}})), "rates.flat.rate_per_kwh"),
            (tariff(json!({"flat": {"rate_per_kwh": 0.1}})), "rates.flat.time_periods"),
            (tariff(json!({"flat": {"rate_per_kwh": 0.1, "time_periods": []}})), "rates.flat.time_periods"),
            (tariff(json!({"flat": 0.1})), "rates.flat"),
        ];
        for (raw, field) in cases {
            assert_eq!(
                format_field(build_tariff_model(&raw, Granularity::HALF_HOUR)),
                Some(field.to_string())
            );
        }
        assert_eq!(format_field(build_tariff_model(&json!([]), Granularity::HALF_HOUR)), Some(String::new()));
    }
}
