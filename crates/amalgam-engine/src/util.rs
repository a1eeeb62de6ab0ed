//! Small value helpers shared by the engine

use crate::config::MergeSite;
use crate::value::{Array, Date, Record, Value};

/// Upper-case the first character
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-case the first character
pub fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name of the apply hook for a config or applier method for a processor
pub fn applier_name(name: &str) -> String {
    format!("apply{}", capitalize(name))
}

/// Name of the update hook for a config
pub fn updater_name(name: &str) -> String {
    format!("update{}", capitalize(name))
}

/// Deep clone of arrays, records and dates. Every other value is shared.
pub fn clone(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            Value::Array(Array::from_vec(items.to_vec().iter().map(clone).collect()))
        }
        Value::Record(record) => Value::Record(
            record
                .entries()
                .into_iter()
                .map(|(k, v)| {
                    let v = clone(&v);
                    (k, v)
                })
                .collect(),
        ),
        Value::Date(date) => Value::Date(Date::new(date.time())),
        other => other.clone(),
    }
}

/// Default config merge policy
///
/// A value arriving from a mixin never replaces the target's value. Two plain
/// records merge key-wise (recursively) into a fresh record; in every other
/// case the new value replaces the old one.
pub fn merge(old: &Value, new: &Value, site: &MergeSite) -> Value {
    if site.mixin.is_some() {
        return old.clone();
    }
    merge_values(old, new)
}

fn merge_values(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Record(old), Value::Record(new)) => {
            let merged = match clone(&Value::Record(old.clone())) {
                Value::Record(r) => r,
                _ => Record::new(),
            };
            for (key, value) in new.entries() {
                let current = merged.get(&key).unwrap_or_default();
                merged.insert(key, merge_values(&current, &value));
            }
            Value::Record(merged)
        }
        _ => new.clone(),
    }
}

/// Normalize a single value or array into a list; nullish yields nothing
pub fn to_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Array(items) => items.to_vec(),
        other => vec![other.clone()],
    }
}
