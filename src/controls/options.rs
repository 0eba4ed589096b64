use std::collections::BTreeMap;

use tracing::warn;

use crate::config::{BoundedOption, EnumOption, Feature};

/// Reduce a configuration key to the identifier form used for control keys and option names.
///
/// `+` becomes `plus`, everything outside `[a-z0-9_-]` is dropped after lower-casing, and a
/// trailing `_` is removed.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name
        .to_lowercase()
        .replace('+', "plus")
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-'))
        .collect::<String>();
    if normalized.ends_with('_') {
        normalized.pop();
    }
    normalized
}

fn unit_for_key(key: &str) -> Option<&'static str> {
    let key = key.to_lowercase();
    if key.contains("temp") {
        Some("°C")
    } else if key.contains("spin") {
        Some("rpm")
    } else {
        None
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract().abs() < 1e-9 { format!("{}", value.round() as i64) } else { value.to_string() }
}

/// Wire value ↔ option name table of an enumerated control, ordered by wire value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionTable {
    entries: BTreeMap<u8, String>,
}

impl OptionTable {
    pub fn from_enum_options<'a>(options: impl IntoIterator<Item = (u8, &'a str)>) -> Self {
        let mut table = Self::default();
        for (value, name) in options {
            table.insert(value, normalize_name(name));
        }
        table
    }

    /// Enumerated values first, then one entry per step of every bounded range whose wire value
    /// is not already taken.
    pub fn from_feature(key: &str, feature: &Feature) -> Self {
        let enum_values = feature.enum_values.iter().flatten();
        let mut table =
            Self::from_enum_options(enum_values.map(|o: &EnumOption| {
                (o.wifi_array_value, o.str_key.as_str())
            }));
        for bounds in feature.bounded_values.iter().flatten() {
            table.extend_bounded(key, bounds);
        }
        table
    }

    /// Synthesize one named entry per value of a bounded range.
    pub fn from_bounds(key: &str, bounds: &BoundedOption) -> Self {
        let mut table = Self::default();
        table.extend_bounded(key, bounds);
        table
    }

    fn extend_bounded(&mut self, key: &str, bounds: &BoundedOption) {
        let unit = unit_for_key(key);
        for value in bounds.values() {
            let wire = (value / bounds.factor).round();
            if !(0.0..=255.0).contains(&wire) {
                warn!(key, value, wire, "bounded value does not fit in a telegram byte");
                continue;
            }
            let wire = wire as u8;
            if self.entries.contains_key(&wire) {
                continue;
            }
            let name = match unit {
                Some(unit) => format!("{} {unit}", format_number(value)),
                None => format_number(value),
            };
            self.insert(wire, normalize_name(&name));
        }
    }

    fn insert(&mut self, value: u8, name: String) {
        if self.entries.contains_key(&value) {
            return;
        }
        let name = if self.value_of(&name).is_some() { format!("{name}_{value}") } else { name };
        self.entries.insert(value, name);
    }

    pub fn name_of(&self, value: u8) -> Option<&str> {
        self.entries.get(&value).map(String::as_str)
    }

    pub fn value_of(&self, name: &str) -> Option<u8> {
        self.entries.iter().find(|(_, n)| *n == name).map(|(v, _)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.entries.iter().map(|(v, n)| (*v, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
