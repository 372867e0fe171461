//! Value normalization helpers
//!
//! Pure functions that turn the loosely formatted cell text of the device
//! page into numbers, units and identifiers.

use std::sync::OnceLock;

use regex::Regex;

use super::types::{DeviceClass, Unit};

fn number_regex() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").unwrap())
}

fn strict_number_regex() -> &'static Regex {
    static STRICT_NUMBER: OnceLock<Regex> = OnceLock::new();
    STRICT_NUMBER.get_or_init(|| Regex::new(r"^[-+]?\d+(?:\.\d+)?$").unwrap())
}

fn non_word_regex() -> &'static Regex {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new(r"\W+").unwrap())
}

/// Extract the first signed decimal number, accepting `,` as decimal separator.
///
/// Returns `raw` unchanged when it contains no number.
pub fn extract_numeric(raw: &str) -> String {
    let normalized = raw.replace(',', ".");
    match number_regex().find(&normalized) {
        Some(m) => m.as_str().to_string(),
        None => raw.to_string(),
    }
}

/// True if the whole (trimmed) string is a plain decimal number.
pub fn is_strict_number(raw: &str) -> bool {
    strict_number_regex().is_match(&raw.trim().replace(',', "."))
}

/// Detect unit and device class from the suffix of a value string.
///
/// The first table entry whose unit is a suffix of the trimmed value wins.
pub fn infer_unit_and_class(
    raw: &str,
    unit_table: &[(Unit, Option<DeviceClass>)],
) -> (Option<Unit>, Option<DeviceClass>) {
    let trimmed = raw.trim();
    unit_table
        .iter()
        .find(|(unit, _)| trimmed.ends_with(unit.as_str()))
        .map(|(unit, class)| (Some(*unit), *class))
        .unwrap_or((None, None))
}

/// Normalize a raw value given its detected unit and device class.
///
/// Free text (no unit, non-numeric class, not a number) passes through
/// untouched. Numeric values are extracted, Wh is rescaled to kWh and a
/// missing unit is filled from `default_units` when the class is known.
pub fn normalize(
    raw_value: &str,
    unit: Option<Unit>,
    device_class: Option<DeviceClass>,
    default_units: &[(DeviceClass, Unit)],
) -> (String, Option<Unit>) {
    let numeric_context = unit.is_some()
        || device_class.map_or(false, |class| class.is_numeric())
        || is_strict_number(raw_value);

    if !numeric_context {
        return (raw_value.to_string(), None);
    }

    let mut value = extract_numeric(raw_value);
    let mut unit_out = unit;

    if unit == Some(Unit::WattHour) {
        if let Ok(wh) = value.parse::<f64>() {
            value = round(wh / 1000.0, 3).to_string();
            unit_out = Some(Unit::KiloWattHour);
        }
    }

    if unit_out.is_none() {
        if let Some(class) = device_class {
            unit_out = default_units
                .iter()
                .find(|(c, _)| *c == class)
                .map(|(_, u)| *u);
        }
    }

    (value, unit_out)
}

/// Slug used as the stable identifier of a sensor name.
pub fn make_identifier(name: &str) -> String {
    let lower = name.to_lowercase();
    non_word_regex()
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

/// Human readable sensor name from a group and a dotted field path.
///
/// A single uppercase letter segment is a phase suffix of the segment
/// before it: `Voltage.Phase.A` becomes `Voltage Phase (A)`.
pub fn friendly_name(group: &str, field_path: &str) -> String {
    let parts: Vec<&str> = field_path.split('.').collect();
    let mut label: Vec<String> = Vec::with_capacity(parts.len());
    let mut i = 0;

    while i < parts.len() {
        match parts.get(i + 1) {
            Some(next) if is_phase_letter(next) => {
                label.push(format!("{} ({})", parts[i], next));
                i += 2;
            }
            _ => {
                label.push(parts[i].to_string());
                i += 1;
            }
        }
    }

    let full_label = label.join(" ");
    if full_label.to_lowercase().contains(&group.to_lowercase()) {
        full_label
    } else {
        format!("{}: {}", group, full_label)
    }
}

fn is_phase_letter(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
}

pub(crate) fn round(value: f64, decimals: i32) -> f64 {
    let multiplier = 10_f64.powi(decimals);
    (value * multiplier).round() / multiplier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enpal::types::{DEFAULT_UNITS, UNIT_DEVICE_CLASS_MAP};

    #[test]
    fn test_make_identifier() {
        assert_eq!(make_identifier("Hallo Welt"), "hallo_welt");
        assert_eq!(make_identifier("  Mehr_Fach  Test123"), "mehr_fach_test123");
        assert_eq!(
            make_identifier("Inverter: Power DC Total (Huawei)"),
            "inverter_power_dc_total_huawei"
        );
    }

    #[test]
    fn test_make_identifier_collapses_variants() {
        assert_eq!(make_identifier("A-B-C"), "a_b_c");
        assert_eq!(make_identifier("a_b_c"), "a_b_c");
        assert_eq!(make_identifier("  A  B  C "), "a_b_c");
    }

    #[test]
    fn test_make_identifier_is_idempotent() {
        for name in ["Battery: Charge Level (Unit 1)", "  x--y ", "Kapazität %", "__"] {
            let once = make_identifier(name);
            assert_eq!(make_identifier(&once), once);
        }
    }

    #[test]
    fn test_extract_numeric() {
        assert_eq!(extract_numeric("42,5 kWh"), "42.5");
        assert_eq!(extract_numeric("7.89A"), "7.89");
        assert_eq!(extract_numeric("-61 W"), "-61");
        assert_eq!(extract_numeric("n/a"), "n/a");
    }

    #[test]
    fn test_is_strict_number() {
        assert!(is_strict_number(" 3 "));
        assert!(is_strict_number("-1,5"));
        assert!(!is_strict_number("3 W"));
        assert!(!is_strict_number("Charging"));
    }

    #[test]
    fn test_infer_unit_and_class() {
        assert_eq!(
            infer_unit_and_class("1234 kWh", &UNIT_DEVICE_CLASS_MAP),
            (Some(Unit::KiloWattHour), Some(DeviceClass::Energy))
        );
        assert_eq!(
            infer_unit_and_class("5.5 V", &UNIT_DEVICE_CLASS_MAP),
            (Some(Unit::Volt), Some(DeviceClass::Voltage))
        );
        assert_eq!(
            infer_unit_and_class("3.2 kW ", &UNIT_DEVICE_CLASS_MAP),
            (Some(Unit::KiloWatt), Some(DeviceClass::Power))
        );
        assert_eq!(
            infer_unit_and_class("51°C", &UNIT_DEVICE_CLASS_MAP),
            (Some(Unit::Celsius), Some(DeviceClass::Temperature))
        );
        assert_eq!(
            infer_unit_and_class("98 %", &UNIT_DEVICE_CLASS_MAP),
            (Some(Unit::Percent), None)
        );
        assert_eq!(
            infer_unit_and_class("17 bananas", &UNIT_DEVICE_CLASS_MAP),
            (None, None)
        );
    }

    #[test]
    fn test_normalize_rescales_wh() {
        let (value, unit) = normalize(
            "1200 Wh",
            Some(Unit::WattHour),
            Some(DeviceClass::Energy),
            &DEFAULT_UNITS,
        );
        assert_eq!(value, "1.2");
        assert_eq!(unit, Some(Unit::KiloWattHour));
    }

    #[test]
    fn test_normalize_whole_kwh_has_no_fraction() {
        let (value, unit) = normalize(
            "1000 Wh",
            Some(Unit::WattHour),
            Some(DeviceClass::Energy),
            &DEFAULT_UNITS,
        );
        assert_eq!(value, "1");
        assert_eq!(unit, Some(Unit::KiloWattHour));
    }

    #[test]
    fn test_normalize_keeps_explicit_unit() {
        let (value, unit) = normalize(
            "3.7 V",
            Some(Unit::Volt),
            Some(DeviceClass::Voltage),
            &DEFAULT_UNITS,
        );
        assert_eq!(value, "3.7");
        assert_eq!(unit, Some(Unit::Volt));
    }

    #[test]
    fn test_normalize_fills_default_unit() {
        let (value, unit) = normalize("99", None, Some(DeviceClass::Power), &DEFAULT_UNITS);
        assert_eq!(value, "99");
        assert_eq!(unit, Some(Unit::Watt));
    }

    #[test]
    fn test_normalize_passes_free_text_through() {
        let (value, unit) = normalize("Charging 3 phases", None, None, &DEFAULT_UNITS);
        assert_eq!(value, "Charging 3 phases");
        assert_eq!(unit, None);
    }

    #[test]
    fn test_normalize_bare_number_without_unit() {
        let (value, unit) = normalize("3", None, None, &DEFAULT_UNITS);
        assert_eq!(value, "3");
        assert_eq!(unit, None);
    }

    #[test]
    fn test_friendly_name() {
        assert_eq!(
            friendly_name("PowerSensor", "Voltage.Phase.A"),
            "PowerSensor: Voltage Phase (A)"
        );
        assert_eq!(
            friendly_name("Inverter", "Power.DC.Total"),
            "Inverter: Power DC Total"
        );
        assert_eq!(friendly_name("Wallbox", "Wallbox.Status"), "Wallbox Status");
        assert_eq!(
            friendly_name("Heatpump", "Heatpump.DomesticHotWater.Temperature"),
            "Heatpump DomesticHotWater Temperature"
        );
        assert_eq!(friendly_name("Batterie", "Kapazität"), "Batterie: Kapazität");
    }

    #[test]
    fn test_friendly_name_group_match_is_case_insensitive() {
        assert_eq!(
            friendly_name("Site Data", "site data.Energy.Consumption"),
            "site data Energy Consumption"
        );
    }
}
