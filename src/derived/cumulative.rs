//! Cumulative DC energy
//!
//! Many inverters expose no lifetime production counter, only instantaneous
//! DC power. This sensor integrates that power over the polling interval
//! into a kWh total that survives restarts.
//!
//! The power source is picked once, on the first tick where any usable DC
//! power sensor exists, and then kept for the lifetime of the process.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::DerivedSensor;
use crate::enpal::normalize::{make_identifier, round};
use crate::enpal::{DeviceClass, SensorRecord, StateClass, Unit};
use crate::state::SNAPSHOT_VERSION;

pub const NAME: &str = "Inverter: Energy produced total (DC)";
pub const IDENTIFIER: &str = "cumulative_energy_produced_dc_kwh";

/// Plain DC power total reported by most inverter families.
pub const GENERIC_DC_POWER: &str = "inverter_power_dc_total";
/// DC power total computed by the device itself; least accurate.
pub const CALCULATED_DC_POWER: &str = "inverter_power_dc_total_calculated";

/// Default ordered candidate list (display names).
pub const DEFAULT_CANDIDATES: [&str; 1] = ["Inverter: Power DC Total (Huawei)"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    Unresolved,
    Resolved(String),
}

/// How a source was found, in decreasing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTier {
    Candidate,
    VendorSpecific,
    Generic,
    Calculated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeEnergyState {
    pub accumulated_kwh: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeSnapshot {
    pub version: u32,
    pub accumulated_kwh: f64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CumulativeSnapshot {
    pub fn is_valid(&self) -> bool {
        self.version == SNAPSHOT_VERSION
            && self.accumulated_kwh.is_finite()
            && self.accumulated_kwh >= 0.0
    }
}

/// Pick the DC power source from the records of one tick.
///
/// Order: configured candidates (in the given order), any vendor specific
/// `inverter_power_dc_total_*`, the generic total, the calculated total.
pub fn select_source(
    candidates: &[String],
    records: &[SensorRecord],
) -> Option<(String, SourceTier)> {
    let has = |id: &str| records.iter().any(|r| r.identifier == id);

    if let Some(id) = candidates.iter().find(|id| has(id.as_str())) {
        return Some((id.clone(), SourceTier::Candidate));
    }

    let vendor_prefix = format!("{}_", GENERIC_DC_POWER);
    if let Some(record) = records
        .iter()
        .find(|r| r.identifier.starts_with(&vendor_prefix) && r.identifier != CALCULATED_DC_POWER)
    {
        return Some((record.identifier.clone(), SourceTier::VendorSpecific));
    }

    if has(GENERIC_DC_POWER) {
        return Some((GENERIC_DC_POWER.to_string(), SourceTier::Generic));
    }

    if has(CALCULATED_DC_POWER) {
        return Some((CALCULATED_DC_POWER.to_string(), SourceTier::Calculated));
    }

    None
}

fn power_identifiers(records: &[SensorRecord]) -> Vec<&str> {
    records
        .iter()
        .filter(|r| r.identifier.contains("power"))
        .map(|r| r.identifier.as_str())
        .collect()
}

/// Integrates DC power (W) into energy (kWh)
#[derive(Debug)]
pub struct CumulativeEnergy {
    candidates: Vec<String>,
    interval: Duration,
    state: CumulativeEnergyState,
    selection: SourceSelection,
    unresolved_warned: bool,
}

impl CumulativeEnergy {
    /// `candidates` are display names in priority order.
    pub fn new<I, S>(candidates: I, interval: Duration, restored: Option<CumulativeSnapshot>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let state = match restored {
            Some(snapshot) => {
                info!("Recovered energy value: {:.3} kWh", snapshot.accumulated_kwh);
                CumulativeEnergyState {
                    accumulated_kwh: snapshot.accumulated_kwh,
                    last_updated: snapshot.last_updated,
                }
            }
            None => CumulativeEnergyState {
                accumulated_kwh: 0.0,
                last_updated: None,
            },
        };

        Self {
            candidates: candidates
                .into_iter()
                .map(|name| make_identifier(name.as_ref()))
                .collect(),
            interval,
            state,
            selection: SourceSelection::Unresolved,
            unresolved_warned: false,
        }
    }

    pub fn selection(&self) -> &SourceSelection {
        &self.selection
    }

    pub fn state(&self) -> &CumulativeEnergyState {
        &self.state
    }

    /// Accumulated energy in kWh, rounded for display.
    pub fn value(&self) -> f64 {
        round(self.state.accumulated_kwh, 3)
    }

    /// Feed one tick's records. Returns the accumulated energy.
    pub fn update(&mut self, records: &[SensorRecord], now: DateTime<Utc>) -> f64 {
        let source = match &self.selection {
            SourceSelection::Resolved(id) => id.clone(),
            SourceSelection::Unresolved => match self.resolve(records) {
                Some(id) => id,
                None => return self.state.accumulated_kwh,
            },
        };

        let Some(record) = records.iter().find(|r| r.identifier == source) else {
            debug!("DC power source {} missing in this update", source);
            return self.state.accumulated_kwh;
        };

        let Some(power_watt) = record.numeric_value() else {
            warn!(
                "Error in energy calculation: {} has non-numeric value '{}'",
                source, record.value
            );
            return self.state.accumulated_kwh;
        };

        // Negative readings would make the lifetime counter go backwards
        let power_watt = power_watt.max(0.0);
        let energy_kwh = power_watt * (self.interval.as_secs_f64() / 3600.0) / 1000.0;
        self.state.accumulated_kwh += energy_kwh;
        self.state.last_updated = Some(now);

        debug!(
            "+{:.5} kWh -> Total: {:.3} kWh",
            energy_kwh, self.state.accumulated_kwh
        );
        self.state.accumulated_kwh
    }

    fn resolve(&mut self, records: &[SensorRecord]) -> Option<String> {
        match select_source(&self.candidates, records) {
            Some((id, tier)) => {
                match tier {
                    SourceTier::Calculated => warn!(
                        "Using calculated DC power sensor {} as last resort. Available power sensors: {:?}",
                        id,
                        power_identifiers(records)
                    ),
                    _ => info!("Using DC power sensor {} ({:?})", id, tier),
                }
                self.selection = SourceSelection::Resolved(id.clone());
                Some(id)
            }
            None => {
                if !self.unresolved_warned {
                    warn!(
                        "No suitable DC power sensor found. Available power sensors: {:?}",
                        power_identifiers(records)
                    );
                    self.unresolved_warned = true;
                } else {
                    debug!("No suitable DC power sensor found");
                }
                None
            }
        }
    }

    pub fn snapshot(&self) -> CumulativeSnapshot {
        CumulativeSnapshot {
            version: SNAPSHOT_VERSION,
            accumulated_kwh: self.state.accumulated_kwh,
            last_updated: self.state.last_updated,
        }
    }

    pub fn sensor(&self) -> DerivedSensor {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "source_sensor",
            match &self.selection {
                SourceSelection::Resolved(id) => id.clone(),
                SourceSelection::Unresolved => "Not determined".to_string(),
            },
        );
        if let Some(last_updated) = self.state.last_updated {
            attributes.insert("last_updated", last_updated.to_rfc3339());
        }

        DerivedSensor {
            name: NAME,
            identifier: IDENTIFIER,
            value: self.value(),
            unit: Unit::KiloWattHour,
            device_class: DeviceClass::Energy,
            state_class: StateClass::TotalIncreasing,
            attributes,
        }
    }
}
