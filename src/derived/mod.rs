//! Derived energy sensors layered on top of the parsed records

pub mod cumulative;
pub mod daily;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::enpal::{DeviceClass, StateClass, Unit};

pub use cumulative::{CumulativeEnergy, CumulativeSnapshot, SourceSelection};
pub use daily::{DailyEnergy, DailySnapshot};

/// Read-only view of a derived sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSensor {
    pub name: &'static str,
    pub identifier: &'static str,
    pub value: f64,
    pub unit: Unit,
    pub device_class: DeviceClass,
    pub state_class: StateClass,
    pub attributes: BTreeMap<&'static str, String>,
}
