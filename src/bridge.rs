//! One tick of the device pipeline
//!
//! poll → cumulative energy → daily energy → catalog → persist

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, warn};

use crate::catalog::SensorCatalog;
use crate::derived::{CumulativeEnergy, DailyEnergy};
use crate::enpal::SensorRecord;
use crate::errors::{PollError, StateError};
use crate::poller::{Poller, Source};
use crate::state::{PersistedState, StateStore};

pub struct Bridge<S: Source<Output = Vec<SensorRecord>>> {
    poller: Poller<S>,
    cumulative: CumulativeEnergy,
    daily: DailyEnergy,
    catalog: SensorCatalog,
    store: StateStore,
}

impl<S: Source<Output = Vec<SensorRecord>>> Bridge<S> {
    /// Restores the derived sensors from `store`.
    pub fn new<I, N>(source: S, candidates: I, interval: Duration, store: StateStore) -> Self
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let restored = store.load();
        Self {
            poller: Poller::new(source),
            cumulative: CumulativeEnergy::new(candidates, interval, restored.cumulative),
            daily: DailyEnergy::new(restored.daily),
            catalog: SensorCatalog::new(),
            store,
        }
    }

    pub fn poller(&self) -> &Poller<S> {
        &self.poller
    }

    pub fn cumulative(&self) -> &CumulativeEnergy {
        &self.cumulative
    }

    pub fn daily(&self) -> &DailyEnergy {
        &self.daily
    }

    pub fn catalog(&self) -> &SensorCatalog {
        &self.catalog
    }

    /// Run one tick.
    ///
    /// Errors only on a cold start failure; the catalog is then marked
    /// unavailable. Save failures are logged and do not fail the tick.
    pub fn tick(&mut self, now: DateTime<Local>) -> Result<&SensorCatalog, PollError> {
        let polled = match self.poller.tick() {
            Ok(polled) => polled,
            Err(e) => {
                self.catalog.mark_unavailable();
                return Err(e);
            }
        };

        self.cumulative
            .update(polled.data, now.with_timezone(&Utc));
        self.daily
            .update(self.cumulative.value(), now.date_naive());

        self.catalog.update(
            polled.data.clone(),
            polled.freshness,
            self.cumulative.sensor(),
            self.daily.sensor(),
            now,
        );
        debug!(
            "{} records ({:?}), total {:.3} kWh, today {:.3} kWh",
            self.catalog.records().len(),
            polled.freshness,
            self.cumulative.value(),
            self.daily.value()
        );

        if let Err(e) = self.persist() {
            warn!("Failed to save state: {}", e);
        }
        Ok(&self.catalog)
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            cumulative: Some(self.cumulative.snapshot()),
            daily: self.daily.snapshot(),
        }
    }

    pub fn persist(&self) -> Result<(), StateError> {
        self.store.save(&self.persisted_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enpal::normalize::make_identifier;
    use crate::enpal::{DeviceClass, Unit};
    use crate::errors::FetchError;
    use crate::poller::Freshness;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct Scripted {
        results: RefCell<VecDeque<Result<Vec<SensorRecord>, FetchError>>>,
    }

    impl Source for Scripted {
        type Output = Vec<SensorRecord>;

        fn name(&self) -> &str {
            "Scripted"
        }

        fn fetch(&self) -> Result<Self::Output, FetchError> {
            self.results
                .borrow_mut()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn scripted(results: Vec<Result<Vec<SensorRecord>, FetchError>>) -> Scripted {
        Scripted {
            results: RefCell::new(results.into()),
        }
    }

    fn dc_power(watts: &str) -> Vec<SensorRecord> {
        let name = "Inverter: Power DC Total (Huawei)";
        vec![SensorRecord {
            name: name.to_string(),
            identifier: make_identifier(name),
            value: watts.to_string(),
            unit: Some(Unit::Watt),
            device_class: Some(DeviceClass::Power),
            enabled: true,
            last_update: None,
            group: "Inverter".to_string(),
        }]
    }

    fn unreachable() -> FetchError {
        FetchError::Transport {
            url: "http://device".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    const CANDIDATES: [&str; 1] = ["Inverter: Power DC Total (Huawei)"];

    #[test]
    fn test_cold_start_failure_marks_unavailable() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut bridge = Bridge::new(
            scripted(vec![Err(unreachable())]),
            CANDIDATES,
            Duration::from_secs(3600),
            store,
        );

        assert!(matches!(bridge.tick(at(1, 10)), Err(PollError::NoPriorData(_))));
        assert!(!bridge.catalog().is_available());
        assert!(!dir.path().join("state.json").exists());
    }

    #[test]
    fn test_ticks_feed_derived_sensors() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut bridge = Bridge::new(
            scripted(vec![
                Ok(dc_power("1000")),
                Ok(dc_power("2000")),
                Err(unreachable()),
            ]),
            CANDIDATES,
            Duration::from_secs(3600),
            store,
        );

        let catalog = bridge.tick(at(1, 10)).unwrap();
        assert_eq!(catalog.cumulative_energy_kwh(), Some(1.0));
        assert_eq!(catalog.daily_energy_kwh(), Some(0.0));

        let catalog = bridge.tick(at(1, 11)).unwrap();
        assert_eq!(catalog.cumulative_energy_kwh(), Some(3.0));
        assert_eq!(catalog.daily_energy_kwh(), Some(2.0));

        // Stale data keeps the last records and keeps integrating
        let catalog = bridge.tick(at(1, 12)).unwrap();
        assert_eq!(catalog.freshness(), Some(Freshness::Stale));
        assert_eq!(catalog.records()[0].value, "2000");
        assert_eq!(catalog.cumulative_energy_kwh(), Some(5.0));
        assert_eq!(catalog.daily_energy_kwh(), Some(4.0));
    }

    #[test]
    fn test_restart_restores_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut bridge = Bridge::new(
            scripted(vec![Ok(dc_power("1500")), Ok(dc_power("500"))]),
            CANDIDATES,
            Duration::from_secs(3600),
            StateStore::new(&path),
        );
        bridge.tick(at(2, 8)).unwrap();
        bridge.tick(at(2, 9)).unwrap();
        assert_eq!(bridge.cumulative().value(), 2.0);

        let mut restarted = Bridge::new(
            scripted(vec![Ok(dc_power("1000"))]),
            CANDIDATES,
            Duration::from_secs(3600),
            StateStore::new(&path),
        );
        assert_eq!(restarted.cumulative().value(), 2.0);
        assert_eq!(restarted.daily().value(), 0.5);

        let catalog = restarted.tick(at(2, 10)).unwrap();
        assert_eq!(catalog.cumulative_energy_kwh(), Some(3.0));
        assert_eq!(catalog.daily_energy_kwh(), Some(1.5));
    }
}
