//! Conversion of native results into wire-safe forms
//!
//! Pure functions, no I/O and no locking. The absence-safety contract:
//! an absent native result always marshals to the type's explicit empty
//! form (empty string, empty list, empty-payload series descriptor), so
//! wire consumers only ever branch on zero-length payloads, never on a
//! missing container.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::module::{FieldMap, FieldValue, Record};

/// Symbol enumeration is chunked at this many records per transport
/// message; totals beyond it are delivered as consecutive chunks with
/// the overall count reported separately.
pub const SYMBOL_CHUNK_SIZE: usize = 500;

/// Flatten a single record, if present.
///
/// Each name in `nested_fields` whose value is itself a record is
/// flattened in place, e.g. the `request` embedded in an order-check
/// result.
pub fn materialize_single(
    result: Option<Arc<dyn Record>>,
    func: &str,
    nested_fields: &[&str],
) -> Option<FieldMap> {
    let record = match result {
        Some(record) => record,
        None => {
            debug!("{func}: result=None");
            return None;
        }
    };

    let mut map = record.fields();
    for (name, value) in map.iter_mut() {
        if nested_fields.contains(&name.as_str()) {
            if let FieldValue::Record(nested) = value {
                *value = FieldValue::Map(nested.fields());
            }
        }
    }
    Some(map)
}

/// Flatten an ordered collection of records, if present, preserving
/// order.
pub fn materialize_sequence(
    result: Option<Vec<Arc<dyn Record>>>,
    func: &str,
) -> Option<Vec<FieldMap>> {
    let records = match result {
        Some(records) => records,
        None => {
            debug!("{func}: result=None");
            return None;
        }
    };

    let maps: Vec<FieldMap> = records.iter().map(|r| r.fields()).collect();
    debug!("{func}: returned {} items", maps.len());
    Some(maps)
}

fn value_of(field: &FieldValue) -> Value {
    match field {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::UInt(u) => Value::from(*u),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Record(nested) => field_map_to_value(&nested.fields()),
        FieldValue::Map(map) => field_map_to_value(map),
        FieldValue::Array(items) => Value::Array(items.iter().map(value_of).collect()),
    }
}

/// A field map as a JSON object value. Nested records are flattened
/// recursively; array-like values become plain lists.
pub fn field_map_to_value(map: &FieldMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(name, value)| (name.clone(), value_of(value)))
            .collect(),
    )
}

/// Serialize a field map to transport text. An empty source yields an
/// empty string rather than `"{}"`.
pub fn wire_text(map: &FieldMap) -> String {
    if map.is_empty() {
        return String::new();
    }
    field_map_to_value(map).to_string()
}

/// Serialize an optional field map; absent maps to the empty string.
pub fn wire_text_opt(map: Option<&FieldMap>) -> String {
    map.map(wire_text).unwrap_or_default()
}

/// Serialize each item to its own transport text line.
pub fn wire_text_items(items: &[FieldMap]) -> Vec<String> {
    items.iter().map(|m| field_map_to_value(m).to_string()).collect()
}

/// Split an already-materialized sequence into consecutive chunks of
/// `chunk_size` and serialize each chunk to one transport text. The
/// caller reports the original total alongside so partial delivery is
/// detectable without re-counting.
pub fn chunk_wire_text(items: &[FieldMap], chunk_size: usize) -> Vec<String> {
    items
        .chunks(chunk_size)
        .map(|chunk| Value::Array(chunk.iter().map(field_map_to_value).collect()).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{field_map, MapRecord};

    fn symbol_map(name: &str) -> FieldMap {
        field_map(&[("name", FieldValue::from(name)), ("digits", FieldValue::Int(5))])
    }

    #[test]
    fn absent_single_is_absent() {
        assert!(materialize_single(None, "test", &[]).is_none());
        assert_eq!(wire_text_opt(None), "");
    }

    #[test]
    fn absent_sequence_is_absent() {
        assert!(materialize_sequence(None, "test").is_none());
    }

    #[test]
    fn empty_map_serializes_to_empty_string() {
        assert_eq!(wire_text(&FieldMap::new()), "");
    }

    #[test]
    fn nested_field_is_flattened_in_place() {
        let request = Arc::new(MapRecord(field_map(&[
            ("symbol", FieldValue::from("EURUSD")),
            ("volume", FieldValue::Float(0.1)),
        ])));
        let result = Arc::new(MapRecord(field_map(&[
            ("retcode", FieldValue::Int(10009)),
            ("request", FieldValue::Record(request)),
        ])));

        let map = materialize_single(Some(result), "order_check", &["request"]).unwrap();
        let json: Value = serde_json::from_str(&wire_text(&map)).unwrap();
        assert_eq!(json["retcode"], 10009);
        assert_eq!(json["request"]["symbol"], "EURUSD");
    }

    #[test]
    fn unlisted_nested_records_still_flatten_in_wire_text() {
        let nested = Arc::new(MapRecord(field_map(&[("bid", FieldValue::Float(1.1))])));
        let map = field_map(&[("tick", FieldValue::Record(nested))]);
        let json: Value = serde_json::from_str(&wire_text(&map)).unwrap();
        assert_eq!(json["tick"]["bid"], 1.1);
    }

    #[test]
    fn array_values_become_plain_lists() {
        let map = field_map(&[(
            "levels",
            FieldValue::Array(vec![FieldValue::Int(1), FieldValue::Int(2)]),
        )]);
        let json: Value = serde_json::from_str(&wire_text(&map)).unwrap();
        assert_eq!(json["levels"], serde_json::json!([1, 2]));
    }

    #[test]
    fn sequence_preserves_order() {
        let records: Vec<Arc<dyn Record>> = vec![
            Arc::new(MapRecord(symbol_map("AAA"))),
            Arc::new(MapRecord(symbol_map("BBB"))),
        ];
        let maps = materialize_sequence(Some(records), "test").unwrap();
        let first: Value = serde_json::from_str(&wire_text(&maps[0])).unwrap();
        let second: Value = serde_json::from_str(&wire_text(&maps[1])).unwrap();
        assert_eq!(first["name"], "AAA");
        assert_eq!(second["name"], "BBB");
    }

    #[test]
    fn chunking_covers_every_element() {
        let items: Vec<FieldMap> = (0..9001).map(|i| symbol_map(&format!("S{i}"))).collect();

        let chunks = chunk_wire_text(&items, SYMBOL_CHUNK_SIZE);
        assert_eq!(chunks.len(), 19);

        let mut counted = 0;
        for chunk in &chunks {
            let parsed: Value = serde_json::from_str(chunk).unwrap();
            counted += parsed.as_array().unwrap().len();
        }
        assert_eq!(counted, items.len());
    }

    #[test]
    fn chunking_small_sequence_yields_one_chunk() {
        let items: Vec<FieldMap> = (0..3).map(|i| symbol_map(&format!("S{i}"))).collect();
        let chunks = chunk_wire_text(&items, SYMBOL_CHUNK_SIZE);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunking_empty_sequence_yields_no_chunks() {
        assert!(chunk_wire_text(&[], SYMBOL_CHUNK_SIZE).is_empty());
    }
}
