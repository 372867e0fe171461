//! Sensor catalog
//!
//! Read-only projection of the latest tick: the parsed records plus the two
//! derived energy sensors. Records are replaced wholesale on every tick.

use chrono::{DateTime, Local};

use crate::derived::DerivedSensor;
use crate::enpal::SensorRecord;
use crate::poller::Freshness;

#[derive(Debug, Default)]
pub struct SensorCatalog {
    records: Vec<SensorRecord>,
    cumulative: Option<DerivedSensor>,
    daily: Option<DerivedSensor>,
    freshness: Option<Freshness>,
    available: bool,
    updated_at: Option<DateTime<Local>>,
}

impl SensorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &mut self,
        records: Vec<SensorRecord>,
        freshness: Freshness,
        cumulative: DerivedSensor,
        daily: DerivedSensor,
        now: DateTime<Local>,
    ) {
        self.records = records;
        self.cumulative = Some(cumulative);
        self.daily = Some(daily);
        self.freshness = Some(freshness);
        self.available = true;
        self.updated_at = Some(now);
    }

    /// Cold start failure: nothing to show yet.
    pub fn mark_unavailable(&mut self) {
        self.available = false;
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn freshness(&self) -> Option<Freshness> {
        self.freshness
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }

    pub fn records(&self) -> &[SensorRecord] {
        &self.records
    }

    /// Records from enabled groups only.
    pub fn enabled_records(&self) -> impl Iterator<Item = &SensorRecord> {
        self.records.iter().filter(|r| r.enabled)
    }

    pub fn get(&self, identifier: &str) -> Option<&SensorRecord> {
        self.records.iter().find(|r| r.identifier == identifier)
    }

    pub fn cumulative(&self) -> Option<&DerivedSensor> {
        self.cumulative.as_ref()
    }

    pub fn daily(&self) -> Option<&DerivedSensor> {
        self.daily.as_ref()
    }

    pub fn derived(&self) -> impl Iterator<Item = &DerivedSensor> {
        self.cumulative.iter().chain(self.daily.iter())
    }

    pub fn cumulative_energy_kwh(&self) -> Option<f64> {
        self.cumulative.as_ref().map(|s| s.value)
    }

    pub fn daily_energy_kwh(&self) -> Option<f64> {
        self.daily.as_ref().map(|s| s.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::{CumulativeEnergy, DailyEnergy};
    use crate::enpal::{DeviceClass, Unit};
    use std::time::Duration;

    fn record(identifier: &str, enabled: bool) -> SensorRecord {
        SensorRecord {
            name: identifier.to_string(),
            identifier: identifier.to_string(),
            value: "1".to_string(),
            unit: Some(Unit::Watt),
            device_class: Some(DeviceClass::Power),
            enabled,
            last_update: None,
            group: "Inverter".to_string(),
        }
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = SensorCatalog::new();
        assert!(!catalog.is_available());
        assert!(catalog.records().is_empty());
        assert_eq!(catalog.cumulative_energy_kwh(), None);
        assert_eq!(catalog.derived().count(), 0);
    }

    #[test]
    fn test_update_replaces_records() {
        let cumulative = CumulativeEnergy::new(["x"], Duration::from_secs(60), None);
        let daily = DailyEnergy::new(None);
        let mut catalog = SensorCatalog::new();

        catalog.update(
            vec![record("a", true), record("b", false)],
            Freshness::Fresh,
            cumulative.sensor(),
            daily.sensor(),
            Local::now(),
        );
        assert!(catalog.is_available());
        assert_eq!(catalog.enabled_records().count(), 1);
        assert!(catalog.get("b").is_some());

        catalog.update(
            vec![record("c", true)],
            Freshness::Stale,
            cumulative.sensor(),
            daily.sensor(),
            Local::now(),
        );
        assert!(catalog.get("a").is_none());
        assert_eq!(catalog.records().len(), 1);
        assert_eq!(catalog.freshness(), Some(Freshness::Stale));
        assert_eq!(catalog.cumulative_energy_kwh(), Some(0.0));
        assert_eq!(catalog.derived().count(), 2);
    }
}
