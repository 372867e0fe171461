//! Data types for parsed Enpal sensor rows
//!
//! One record shape for every sensor; per-sensor behavior comes from the
//! lookup tables at the bottom of this module.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Timestamp format used in the third column of the device table.
pub const ENPAL_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Groups (card headings) the device is known to render.
pub const KNOWN_GROUPS: [&str; 7] = [
    "Wallbox",
    "Battery",
    "Inverter",
    "Site Data",
    "IoTEdgeDevice",
    "PowerSensor",
    "Heatpump",
];

/// Groups parsed when the configuration does not name any.
pub const DEFAULT_GROUPS: [&str; 6] = [
    "Wallbox",
    "Battery",
    "Inverter",
    "Site Data",
    "IoTEdgeDevice",
    "PowerSensor",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Watt,
    KiloWatt,
    WattHour,
    KiloWattHour,
    Volt,
    Ampere,
    Hertz,
    Celsius,
    Percent,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Watt => "W",
            Unit::KiloWatt => "kW",
            Unit::WattHour => "Wh",
            Unit::KiloWattHour => "kWh",
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Hertz => "Hz",
            Unit::Celsius => "°C",
            Unit::Percent => "%",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Semantic tag describing the physical quantity of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Energy,
    Power,
    Voltage,
    Current,
    Frequency,
    Temperature,
    Battery,
    EnergyStorage,
    Humidity,
    Pressure,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Energy => "energy",
            DeviceClass::Power => "power",
            DeviceClass::Voltage => "voltage",
            DeviceClass::Current => "current",
            DeviceClass::Frequency => "frequency",
            DeviceClass::Temperature => "temperature",
            DeviceClass::Battery => "battery",
            DeviceClass::EnergyStorage => "energy_storage",
            DeviceClass::Humidity => "humidity",
            DeviceClass::Pressure => "pressure",
        }
    }

    /// Whether values of this class are always numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DeviceClass::Energy
                | DeviceClass::Power
                | DeviceClass::Voltage
                | DeviceClass::Current
                | DeviceClass::Temperature
                | DeviceClass::Frequency
                | DeviceClass::Battery
                | DeviceClass::Humidity
                | DeviceClass::Pressure
        )
    }

    /// Unit assumed when the raw value carries none.
    pub fn default_unit(&self) -> Option<Unit> {
        DEFAULT_UNITS
            .iter()
            .find(|(class, _)| class == self)
            .map(|(_, unit)| *unit)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

/// Source timestamp of a row.
///
/// Rows whose timestamp does not match [`ENPAL_TIMESTAMP_FORMAT`] keep the
/// original text instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Parsed(NaiveDateTime),
    Raw(String),
}

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        match NaiveDateTime::parse_from_str(raw, ENPAL_TIMESTAMP_FORMAT) {
            Ok(dt) => Timestamp::Parsed(dt),
            Err(_) => Timestamp::Raw(raw.to_string()),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Parsed(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Timestamp::Raw(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single sensor reading, rebuilt on every poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRecord {
    pub name: String,
    /// Stable slug of `name`, the only key that joins records across polls.
    pub identifier: String,
    pub value: String,
    pub unit: Option<Unit>,
    pub device_class: Option<DeviceClass>,
    pub enabled: bool,
    pub last_update: Option<Timestamp>,
    pub group: String,
}

impl SensorRecord {
    pub fn state_class(&self) -> Option<StateClass> {
        if let Some(class) = state_class_override(&self.identifier) {
            return Some(class);
        }
        match self.device_class {
            Some(DeviceClass::Energy) => Some(StateClass::TotalIncreasing),
            Some(class) if class.is_numeric() => Some(StateClass::Measurement),
            _ => None,
        }
    }

    /// The value as a finite number, if it is one.
    ///
    /// `inf` and `NaN` parse as floats but are never sensor readings.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}

/// Suffix → device class table, scanned in order.
///
/// Longer suffixes come first: "kWh" also ends in "Wh", "kW" also ends in "W".
pub const UNIT_DEVICE_CLASS_MAP: [(Unit, Option<DeviceClass>); 9] = [
    (Unit::KiloWattHour, Some(DeviceClass::Energy)),
    (Unit::WattHour, Some(DeviceClass::Energy)),
    (Unit::KiloWatt, Some(DeviceClass::Power)),
    (Unit::Watt, Some(DeviceClass::Power)),
    (Unit::Volt, Some(DeviceClass::Voltage)),
    (Unit::Ampere, Some(DeviceClass::Current)),
    (Unit::Hertz, Some(DeviceClass::Frequency)),
    (Unit::Celsius, Some(DeviceClass::Temperature)),
    (Unit::Percent, None),
];

pub const DEFAULT_UNITS: [(DeviceClass, Unit); 6] = [
    (DeviceClass::Power, Unit::Watt),
    (DeviceClass::Energy, Unit::KiloWattHour),
    (DeviceClass::Voltage, Unit::Volt),
    (DeviceClass::Current, Unit::Ampere),
    (DeviceClass::Temperature, Unit::Celsius),
    (DeviceClass::Frequency, Unit::Hertz),
];

/// Battery charge levels are reported in "%" but are not plain percentages.
const DEVICE_CLASS_OVERRIDES: [(&str, DeviceClass); 5] = [
    ("energy_battery_charge_level", DeviceClass::Battery),
    ("energy_battery_charge_level_unit_1", DeviceClass::Battery),
    ("energy_battery_charge_level_unit_2", DeviceClass::Battery),
    ("energy_battery_charge_level_absolute", DeviceClass::Battery),
    ("energy_battery_charge_load", DeviceClass::Battery),
];

const STATE_CLASS_OVERRIDES: [(&str, StateClass); 5] = [
    ("energy_battery_charge_level", StateClass::Measurement),
    ("energy_battery_charge_level_unit_1", StateClass::Measurement),
    ("energy_battery_charge_level_unit_2", StateClass::Measurement),
    ("energy_battery_charge_level_absolute", StateClass::Measurement),
    ("energy_battery_charge_load", StateClass::Measurement),
];

pub fn device_class_override(identifier: &str) -> Option<DeviceClass> {
    DEVICE_CLASS_OVERRIDES
        .iter()
        .find(|(id, _)| *id == identifier)
        .map(|(_, class)| *class)
}

pub fn state_class_override(identifier: &str) -> Option<StateClass> {
    STATE_CLASS_OVERRIDES
        .iter()
        .find(|(id, _)| *id == identifier)
        .map(|(_, class)| *class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(identifier: &str, device_class: Option<DeviceClass>) -> SensorRecord {
        SensorRecord {
            name: identifier.to_string(),
            identifier: identifier.to_string(),
            value: "1".to_string(),
            unit: None,
            device_class,
            enabled: true,
            last_update: None,
            group: "Battery".to_string(),
        }
    }

    #[test]
    fn test_timestamp_parse_and_display() {
        let ts = Timestamp::parse("06/05/2025 10:12:01");
        let expected = NaiveDate::from_ymd_opt(2025, 6, 5)
            .unwrap()
            .and_hms_opt(10, 12, 1)
            .unwrap();
        assert_eq!(ts, Timestamp::Parsed(expected));
        assert_eq!(ts.to_string(), "2025-06-05T10:12:01");
    }

    #[test]
    fn test_timestamp_keeps_unparseable_text() {
        let ts = Timestamp::parse("06.06.2025 08:42");
        assert_eq!(ts, Timestamp::Raw("06.06.2025 08:42".to_string()));
        assert_eq!(ts.to_string(), "06.06.2025 08:42");
    }

    #[test]
    fn test_state_class_heuristics() {
        assert_eq!(
            record("inverter_energy_total", Some(DeviceClass::Energy)).state_class(),
            Some(StateClass::TotalIncreasing)
        );
        assert_eq!(
            record("inverter_voltage", Some(DeviceClass::Voltage)).state_class(),
            Some(StateClass::Measurement)
        );
        assert_eq!(record("wallbox_status", None).state_class(), None);
        // Override wins over the device class heuristic
        assert_eq!(
            record("energy_battery_charge_level", Some(DeviceClass::Energy)).state_class(),
            Some(StateClass::Measurement)
        );
    }

    #[test]
    fn test_numeric_value_rejects_non_finite() {
        let mut rec = record("inverter_power_dc_total", Some(DeviceClass::Power));
        assert_eq!(rec.numeric_value(), Some(1.0));

        for raw in ["inf", "-infinity", "NaN", "n/a", ""] {
            rec.value = raw.to_string();
            assert_eq!(rec.numeric_value(), None, "{raw}");
        }
    }

    #[test]
    fn test_default_units() {
        assert_eq!(DeviceClass::Power.default_unit(), Some(Unit::Watt));
        assert_eq!(DeviceClass::Energy.default_unit(), Some(Unit::KiloWattHour));
        assert_eq!(DeviceClass::Battery.default_unit(), None);
    }

    #[test]
    fn test_serialized_record_uses_display_strings() {
        let mut rec = record("inverter_power", Some(DeviceClass::EnergyStorage));
        rec.unit = Some(Unit::Celsius);
        rec.last_update = Some(Timestamp::Raw("n/a".to_string()));
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["unit"], "°C");
        assert_eq!(json["device_class"], "energy_storage");
        assert_eq!(json["last_update"], "n/a");
    }
}
