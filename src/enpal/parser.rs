//! Parser for the device status page
//!
//! The page is a list of cards (`div.card`), each with an `h2` heading naming
//! the group and a table whose first row is a header. Every following row
//! holds `field path | value | timestamp`.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

use super::normalize::{friendly_name, infer_unit_and_class, make_identifier, normalize};
use super::types::{
    device_class_override, SensorRecord, Timestamp, DEFAULT_UNITS, UNIT_DEVICE_CLASS_MAP,
};

struct Selectors {
    card: Selector,
    heading: Selector,
    row: Selector,
    cell: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        card: Selector::parse("div.card").unwrap(),
        heading: Selector::parse("h2").unwrap(),
        row: Selector::parse("tr").unwrap(),
        cell: Selector::parse("td").unwrap(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse all cards whose heading is in `enabled_groups`.
///
/// Cards of other groups are skipped without looking at their rows. Never
/// fails: malformed rows are dropped, odd values pass through as text.
pub fn parse(document: &str, enabled_groups: &BTreeSet<String>) -> Vec<SensorRecord> {
    let html = Html::parse_document(document);
    let sel = selectors();
    let mut records = Vec::new();
    let mut cards = 0;

    for card in html.select(&sel.card) {
        cards += 1;
        let Some(group) = card.select(&sel.heading).next().map(element_text) else {
            trace!("Skipping card without heading");
            continue;
        };
        if group.is_empty() || !enabled_groups.contains(&group) {
            trace!("Skipping card '{}'", group);
            continue;
        }
        records.extend(parse_card_rows(card, &group, enabled_groups));
    }

    debug!("Parsed {} sensor(s) from {} card(s)", records.len(), cards);
    records
}

fn parse_card_rows(
    card: ElementRef<'_>,
    group: &str,
    enabled_groups: &BTreeSet<String>,
) -> Vec<SensorRecord> {
    let sel = selectors();

    card.select(&sel.row)
        .skip(1)
        .filter_map(|row| {
            let cols: Vec<String> = row.select(&sel.cell).map(element_text).collect();
            if cols.len() < 2 {
                return None;
            }
            Some(build_record(
                group,
                &cols[0],
                &cols[1],
                cols.get(2).map(String::as_str),
                enabled_groups.contains(group),
            ))
        })
        .collect()
}

fn build_record(
    group: &str,
    field_path: &str,
    value_raw: &str,
    timestamp_raw: Option<&str>,
    enabled: bool,
) -> SensorRecord {
    let (unit, device_class) = infer_unit_and_class(value_raw, &UNIT_DEVICE_CLASS_MAP);
    let (value, unit) = normalize(value_raw, unit, device_class, &DEFAULT_UNITS);
    let name = friendly_name(group, field_path);
    let identifier = make_identifier(&name);
    let device_class = device_class_override(&identifier).or(device_class);
    let last_update = timestamp_raw
        .filter(|raw| !raw.is_empty())
        .map(Timestamp::parse);

    trace!("{} = {} {:?} ({:?})", identifier, value, unit, device_class);

    SensorRecord {
        name,
        identifier,
        value,
        unit,
        device_class,
        enabled,
        last_update,
        group: group.to_string(),
    }
}
