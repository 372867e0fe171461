//! Energy produced today
//!
//! Follows the cumulative counter and reports the part accumulated since the
//! first reading of the current local day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::DerivedSensor;
use crate::enpal::normalize::round;
use crate::enpal::{DeviceClass, StateClass, Unit};
use crate::state::SNAPSHOT_VERSION;

pub const NAME: &str = "Inverter: Energy produced today (DC)";
pub const IDENTIFIER: &str = "daily_energy_produced_dc_kwh";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyDeltaState {
    pub today_start_value: Option<f64>,
    pub value: f64,
    pub last_reset_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub version: u32,
    pub value: f64,
    #[serde(default)]
    pub today_start_value: Option<f64>,
    pub last_reset_date: NaiveDate,
}

impl DailySnapshot {
    pub fn is_valid(&self) -> bool {
        self.version == SNAPSHOT_VERSION
            && self.value.is_finite()
            && self.today_start_value.map_or(true, f64::is_finite)
    }
}

#[derive(Debug, Default)]
pub struct DailyEnergy {
    state: DailyDeltaState,
}

impl DailyEnergy {
    pub fn new(restored: Option<DailySnapshot>) -> Self {
        let state = match restored {
            Some(snapshot) => {
                info!(
                    "Recovered daily energy: {:.3} kWh since {} (baseline {:?})",
                    snapshot.value, snapshot.last_reset_date, snapshot.today_start_value
                );
                DailyDeltaState {
                    today_start_value: snapshot.today_start_value,
                    value: snapshot.value,
                    last_reset_date: Some(snapshot.last_reset_date),
                }
            }
            None => DailyDeltaState::default(),
        };
        Self { state }
    }

    pub fn state(&self) -> &DailyDeltaState {
        &self.state
    }

    pub fn value(&self) -> f64 {
        round(self.state.value, 3)
    }

    /// Feed the current cumulative reading (kWh) observed on `today`.
    pub fn update(&mut self, cumulative: f64, today: NaiveDate) -> f64 {
        let start = match self.state.today_start_value {
            Some(start) if self.state.last_reset_date == Some(today) => start,
            _ => {
                info!(
                    "New day {}: daily energy baseline set to {:.3} kWh",
                    today, cumulative
                );
                self.state = DailyDeltaState {
                    today_start_value: Some(cumulative),
                    value: 0.0,
                    last_reset_date: Some(today),
                };
                return 0.0;
            }
        };

        self.state.value = (cumulative - start).max(0.0);
        debug!(
            "Daily energy: {:.3} kWh (current {:.3}, start {:.3})",
            self.state.value, cumulative, start
        );
        self.state.value
    }

    /// `None` until a baseline has been captured.
    pub fn snapshot(&self) -> Option<DailySnapshot> {
        self.state.last_reset_date.map(|date| DailySnapshot {
            version: SNAPSHOT_VERSION,
            value: self.state.value,
            today_start_value: self.state.today_start_value,
            last_reset_date: date,
        })
    }

    pub fn sensor(&self) -> DerivedSensor {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "last_reset",
            self.state
                .last_reset_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "Not set".to_string()),
        );
        attributes.insert(
            "start_value",
            self.state
                .today_start_value
                .map(|v| round(v, 3).to_string())
                .unwrap_or_else(|| "Not set".to_string()),
        );

        DerivedSensor {
            name: NAME,
            identifier: IDENTIFIER,
            value: self.value(),
            unit: Unit::KiloWattHour,
            device_class: DeviceClass::Energy,
            state_class: StateClass::Total,
            attributes,
        }
    }
}
