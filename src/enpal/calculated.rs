//! Calculated sensors
//!
//! The power sensor reports power and voltage per phase but no current.
//! Current is derived as `I = P / U`.

use tracing::debug;

use super::normalize::{make_identifier, round};
use super::types::{DeviceClass, SensorRecord, Unit};

const POWER_SENSOR_GROUP: &str = "PowerSensor";
const PHASES: [char; 3] = ['A', 'B', 'C'];

/// Append one `Current Phase (X)` record per phase where power and a
/// non-zero voltage are both available.
pub fn add_calculated_currents(mut records: Vec<SensorRecord>) -> Vec<SensorRecord> {
    let mut calculated = Vec::new();

    for phase in PHASES {
        let power_id = make_identifier(&format!("{}: Power AC Phase ({})", POWER_SENSOR_GROUP, phase));
        let voltage_id = make_identifier(&format!("{}: Voltage Phase ({})", POWER_SENSOR_GROUP, phase));
        let name = format!("{}: Current Phase ({})", POWER_SENSOR_GROUP, phase);
        let identifier = make_identifier(&name);

        if records.iter().any(|r| r.identifier == identifier) {
            continue;
        }

        let find = |id: &str| {
            records
                .iter()
                .find(|r| r.group == POWER_SENSOR_GROUP && r.identifier == id)
        };
        let (Some(power), Some(voltage)) = (find(&power_id), find(&voltage_id)) else {
            continue;
        };
        let (Some(watts), Some(volts)) = (power.numeric_value(), voltage.numeric_value()) else {
            continue;
        };
        if volts == 0.0 {
            debug!("Skipping current for phase {}: voltage is zero", phase);
            continue;
        }

        let amps = round(watts / volts, 2);
        debug!("Calculated current phase {}: {} W / {} V = {} A", phase, watts, volts, amps);

        calculated.push(SensorRecord {
            name,
            identifier,
            value: amps.to_string(),
            unit: Some(Unit::Ampere),
            device_class: Some(DeviceClass::Current),
            enabled: power.enabled,
            last_update: power.last_update.clone(),
            group: POWER_SENSOR_GROUP.to_string(),
        });
    }

    records.extend(calculated);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(group: &str, name: &str, value: &str, unit: Unit) -> SensorRecord {
        SensorRecord {
            name: name.to_string(),
            identifier: make_identifier(name),
            value: value.to_string(),
            unit: Some(unit),
            device_class: None,
            enabled: true,
            last_update: None,
            group: group.to_string(),
        }
    }

    fn value_of(records: &[SensorRecord], name: &str) -> Option<f64> {
        records
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.numeric_value())
    }

    #[test]
    fn test_calculates_all_three_phases() {
        let records = vec![
            rec("PowerSensor", "PowerSensor: Power AC Phase (A)", "-61", Unit::Watt),
            rec("PowerSensor", "PowerSensor: Voltage Phase (A)", "231.1", Unit::Volt),
            rec("PowerSensor", "PowerSensor: Power AC Phase (B)", "-19", Unit::Watt),
            rec("PowerSensor", "PowerSensor: Voltage Phase (B)", "230.1", Unit::Volt),
            rec("PowerSensor", "PowerSensor: Power AC Phase (C)", "77", Unit::Watt),
            rec("PowerSensor", "PowerSensor: Voltage Phase (C)", "230.3", Unit::Volt),
        ];
        let result = add_calculated_currents(records);
        assert_eq!(result.len(), 9);

        let a = value_of(&result, "PowerSensor: Current Phase (A)").unwrap();
        let b = value_of(&result, "PowerSensor: Current Phase (B)").unwrap();
        let c = value_of(&result, "PowerSensor: Current Phase (C)").unwrap();
        assert!((a - -0.26).abs() < 0.01);
        assert!((b - -0.08).abs() < 0.01);
        assert!((c - 0.33).abs() < 0.01);

        let current = result
            .iter()
            .find(|r| r.identifier == "powersensor_current_phase_a")
            .unwrap();
        assert_eq!(current.unit, Some(Unit::Ampere));
        assert_eq!(current.device_class, Some(DeviceClass::Current));
        assert_eq!(current.group, "PowerSensor");
    }

    #[test]
    fn test_missing_voltage_adds_nothing() {
        let records = vec![rec(
            "PowerSensor",
            "PowerSensor: Power AC Phase (A)",
            "-61",
            Unit::Watt,
        )];
        assert_eq!(add_calculated_currents(records).len(), 1);
    }

    #[test]
    fn test_zero_voltage_adds_nothing() {
        let records = vec![
            rec("PowerSensor", "PowerSensor: Power AC Phase (A)", "-61", Unit::Watt),
            rec("PowerSensor", "PowerSensor: Voltage Phase (A)", "0", Unit::Volt),
        ];
        let result = add_calculated_currents(records);
        assert_eq!(result.len(), 2);
        assert!(!result.iter().any(|r| r.name.contains("Current Phase")));
    }

    #[test]
    fn test_other_groups_are_ignored() {
        let records = vec![
            rec("Inverter", "Inverter: Power AC Phase (A)", "100", Unit::Watt),
            rec("Inverter", "Inverter: Voltage Phase (A)", "230", Unit::Volt),
        ];
        assert_eq!(add_calculated_currents(records).len(), 2);
    }
}
