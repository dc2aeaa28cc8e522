//! Bidirectional time transforms between wire and widget representations.
//!
//! Picker widgets operate on rich date objects; wire payloads use flat
//! strings for query-string/API compatibility. A range field's `name` holds
//! the two flat wire keys joined by a comma (`"begin,end"`); in widget form
//! those collapse into one two-element date pair under the combined key.
//!
//! Both transforms are pure and idempotence-friendly: values that are
//! already plain strings pass through `to_wire_form` unchanged.

use chrono::{NaiveDate, NaiveDateTime};

use formflow_types::{FieldValue, FormItem, TimeFormat, ValueMap, WidgetKind};

/// Default wire format for single date fields.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Default wire format for a range's start (start of day).
pub const DEFAULT_RANGE_START_FORMAT: &str = "%Y-%m-%d 00:00:00";
/// Default wire format for a range's end (end of day).
pub const DEFAULT_RANGE_END_FORMAT: &str = "%Y-%m-%d 23:59:59";

/// Schema items whose values pass through the transform layer.
pub fn time_items(items: &[FormItem]) -> Vec<FormItem> {
    items.iter().filter(|item| item.widget_kind().is_temporal()).cloned().collect()
}

/// Lenient wire-side datetime parsing: full datetime, ISO datetime, or a
/// bare date at midnight.
pub fn parse_wire_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DEFAULT_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn as_datetime(value: &FieldValue) -> Option<NaiveDateTime> {
    match value {
        FieldValue::DateTime(datetime) => Some(*datetime),
        FieldValue::Text(text) if !text.is_empty() => parse_wire_datetime(text),
        _ => None,
    }
}

/// Wire form -> widget form.
///
/// Range fields: when both flat keys carry parseable values, a two-element
/// date pair is synthesized under the combined key; the flat keys are
/// removed either way. Date fields: the flat value is parsed in place; an
/// absent value falls back to the schema `default_value`, and the returned
/// flag reports that a change was synthesized so callers can propagate the
/// default upstream.
pub fn to_widget_form(time_items: &[FormItem], mut value: ValueMap) -> (ValueMap, bool) {
    let mut changed = false;
    for item in time_items {
        let Some(name) = item.name.as_deref() else { continue };
        match item.widget_kind() {
            WidgetKind::RangePicker => {
                let parts: Vec<&str> = name.split(',').collect();
                if parts.len() != 2 {
                    continue;
                }
                let start = value.get(parts[0]).and_then(as_datetime);
                let end = value.get(parts[1]).and_then(as_datetime);
                if let (Some(start), Some(end)) = (start, end) {
                    value.insert(
                        name.to_string(),
                        FieldValue::List(vec![FieldValue::DateTime(start), FieldValue::DateTime(end)]),
                    );
                }
                value.shift_remove(parts[0]);
                value.shift_remove(parts[1]);
            }
            WidgetKind::DatePicker => {
                if let Some(current) = value.get(name) {
                    if let Some(datetime) = as_datetime(current) {
                        value.insert(name.to_string(), FieldValue::DateTime(datetime));
                    }
                } else if let Some(default) = &item.default_value {
                    if let Some(datetime) = as_datetime(default) {
                        value.insert(name.to_string(), FieldValue::DateTime(datetime));
                        changed = true;
                    }
                }
            }
            _ => {}
        }
    }
    (value, changed)
}

fn range_formats(item: &FormItem) -> (String, String) {
    match &item.time_format {
        Some(TimeFormat::Single(format)) => (format.clone(), format.clone()),
        Some(TimeFormat::Pair(start, end)) => (start.clone(), end.clone()),
        None => (DEFAULT_RANGE_START_FORMAT.to_string(), DEFAULT_RANGE_END_FORMAT.to_string()),
    }
}

fn format_end(value: Option<&FieldValue>, format: &str) -> Option<FieldValue> {
    match value {
        // Already wire form, pass through untouched.
        Some(FieldValue::Text(text)) => Some(FieldValue::Text(text.clone())),
        Some(FieldValue::DateTime(datetime)) => Some(FieldValue::Text(datetime.format(format).to_string())),
        _ => None,
    }
}

/// Widget form -> wire form. The inverse of [`to_widget_form`]; plain
/// strings pass through unchanged.
pub fn to_wire_form(time_items: &[FormItem], mut value: ValueMap) -> ValueMap {
    for item in time_items {
        let Some(name) = item.name.as_deref() else { continue };
        match item.widget_kind() {
            WidgetKind::RangePicker => {
                let parts: Vec<&str> = name.split(',').collect();
                if parts.len() != 2 {
                    continue;
                }
                let Some(combined) = value.shift_remove(name) else { continue };
                let (start_format, end_format) = range_formats(item);
                let ends = match &combined {
                    FieldValue::List(items) => (items.first(), items.get(1)),
                    _ => (None, None),
                };
                if let Some(start) = format_end(ends.0, &start_format) {
                    value.insert(parts[0].to_string(), start);
                }
                if let Some(end) = format_end(ends.1, &end_format) {
                    value.insert(parts[1].to_string(), end);
                }
            }
            WidgetKind::DatePicker => {
                if let Some(FieldValue::DateTime(datetime)) = value.get(name) {
                    let format = match &item.time_format {
                        Some(TimeFormat::Single(format)) => format.clone(),
                        Some(TimeFormat::Pair(start, _)) => start.clone(),
                        None => DEFAULT_DATE_FORMAT.to_string(),
                    };
                    let formatted = datetime.format(&format).to_string();
                    value.insert(name.to_string(), FieldValue::Text(formatted));
                }
            }
            _ => {}
        }
    }
    value
}
