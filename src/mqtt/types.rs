use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::SensorCatalog;
use crate::derived::DerivedSensor;
use crate::enpal::{DeviceClass, SensorRecord, StateClass, Timestamp, Unit};
use crate::errors::MqttError;
use crate::poller::Freshness;

/// Published form of one parsed record: `sensor/{identifier}/...`
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub identifier: String,
    pub value: String,
    /// JSON document
    pub attributes: String,
}

#[derive(Serialize)]
struct SensorAttributes<'a> {
    name: &'a str,
    unit: Option<Unit>,
    device_class: Option<DeviceClass>,
    state_class: Option<StateClass>,
    enabled: bool,
    last_update: Option<&'a Timestamp>,
    group: &'a str,
}

impl Sensor {
    pub fn from_record(record: &SensorRecord) -> Result<Self, MqttError> {
        let attributes = SensorAttributes {
            name: &record.name,
            unit: record.unit,
            device_class: record.device_class,
            state_class: record.state_class(),
            enabled: record.enabled,
            last_update: record.last_update.as_ref(),
            group: &record.group,
        };
        Ok(Self {
            identifier: record.identifier.clone(),
            value: record.value.clone(),
            attributes: serde_json::to_string(&attributes)
                .map_err(|error| MqttError::SerializationError { error })?,
        })
    }
}

/// Published form of a derived sensor: `derived/{identifier}/...`
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub identifier: &'static str,
    pub value: f64,
    pub attributes: String,
}

#[derive(Serialize)]
struct DerivedAttributes<'a> {
    name: &'a str,
    unit: Unit,
    device_class: DeviceClass,
    state_class: StateClass,
    #[serde(flatten)]
    extra: &'a BTreeMap<&'static str, String>,
}

impl Derived {
    pub fn from_sensor(sensor: &DerivedSensor) -> Result<Self, MqttError> {
        let attributes = DerivedAttributes {
            name: sensor.name,
            unit: sensor.unit,
            device_class: sensor.device_class,
            state_class: sensor.state_class,
            extra: &sensor.attributes,
        };
        Ok(Self {
            identifier: sensor.identifier,
            value: sensor.value,
            attributes: serde_json::to_string(&attributes)
                .map_err(|error| MqttError::SerializationError { error })?,
        })
    }
}

/// Catalog level state: `status/...`
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStatus {
    pub available: bool,
    pub stale: bool,
    pub records: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CatalogStatus {
    pub fn from_catalog(catalog: &SensorCatalog) -> Self {
        Self {
            available: catalog.is_available(),
            stale: catalog.freshness() == Some(Freshness::Stale),
            records: catalog.records().len() as u64,
            updated_at: catalog.updated_at().map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// Everything the catalog publishes, in publishable form.
pub fn sensors_from_catalog(catalog: &SensorCatalog) -> Result<Vec<Sensor>, MqttError> {
    catalog.records().iter().map(Sensor::from_record).collect()
}

pub fn derived_from_catalog(catalog: &SensorCatalog) -> Result<Vec<Derived>, MqttError> {
    catalog.derived().map(Derived::from_sensor).collect()
}
