//! Tolerant decoding helpers for snapshots written by other clients.
//!
//! Snapshots arrive from browsers, older app versions and hand-edited
//! backups. Nulls are treated as absent, timestamps and amounts may be
//! encoded as numbers or numeric strings, and a field of the wrong shape
//! decodes as its default. A record that is not an object is dropped from
//! its collection. Only a snapshot that is not a JSON object fails.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use super::Millis;

/// Removes every `null` object member, recursively.
///
/// Run before typed decoding so that `#[serde(default)]` applies to fields
/// that were sent as `null`.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                strip_nulls(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                strip_nulls(v);
            }
        }
        _ => {}
    }
}

/// Deserializes an epoch-millisecond timestamp from any numeric encoding.
///
/// Unparseable values decode as 0 so the record loses every tie instead of
/// failing the whole snapshot.
pub fn millis<'de, D>(deserializer: D) -> Result<Millis, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => number_to_millis(&n),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    };
    Ok(parsed.unwrap_or(0))
}

fn number_to_millis(n: &Number) -> Option<Millis> {
    n.as_i64()
        .or_else(|| n.as_u64().map(|v| i64::try_from(v).unwrap_or(i64::MAX)))
        .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Deserializes an amount or quantity; numeric strings are parsed, anything
/// else is 0.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|f| f.is_finite()).unwrap_or(0.0))
}

/// Deserializes a string, rendering numbers and booleans as text.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

/// Like [`text`], but arrays and objects decode as `None`.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decodes a record collection one element at a time, dropping elements
/// that cannot be decoded. A non-array decodes as empty.
pub fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        other => {
            tracing::warn!("expected a record list, found {}", kind(&other));
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("skipping malformed record: {}", e);
                None
            }
        })
        .collect())
}

/// Decodes an object keyed by parseable keys, dropping entries whose key or
/// value cannot be decoded. A non-object decodes as empty.
pub fn keyed<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
{
    let Value::Object(map) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };

    Ok(map
        .into_iter()
        .filter_map(|(raw_key, value)| {
            let key = serde_json::from_value(Value::String(raw_key.clone()));
            match (key, serde_json::from_value(value)) {
                (Ok(key), Ok(value)) => Some((key, value)),
                _ => {
                    tracing::warn!(key = %raw_key, "skipping malformed entry");
                    None
                }
            }
        })
        .collect())
}

/// Falls back to `T::default()` when the value has the wrong shape.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!("replacing malformed field with default: {}", e);
        T::default()
    }))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToothPosition;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Stamp {
        #[serde(deserialize_with = "millis")]
        at: Millis,
    }

    fn stamp(v: Value) -> Millis {
        serde_json::from_value::<Stamp>(json!({ "at": v })).unwrap().at
    }

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "number")]
        amount: f64,
        #[serde(deserialize_with = "text")]
        name: String,
        #[serde(deserialize_with = "opt_text")]
        note: Option<String>,
    }

    fn row(v: Value) -> Row {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_millis_accepts_numeric_encodings() {
        assert_eq!(stamp(json!(1700000000000_i64)), 1700000000000);
        assert_eq!(stamp(json!(1700000000000.0)), 1700000000000);
        assert_eq!(stamp(json!("1700000000000")), 1700000000000);
        assert_eq!(stamp(json!("garbage")), 0);
        assert_eq!(stamp(json!({"seconds": 5})), 0);
        assert_eq!(stamp(json!(u64::MAX)), i64::MAX);
    }

    #[test]
    fn test_number_text_and_opt_text() {
        let r = row(json!({"amount": "50", "name": 770123, "note": true}));
        assert_eq!(r.amount, 50.0);
        assert_eq!(r.name, "770123");
        assert_eq!(r.note.as_deref(), Some("true"));

        let r = row(json!({"amount": "lots", "name": ["x"], "note": {"a": 1}}));
        assert_eq!(r.amount, 0.0);
        assert_eq!(r.name, "");
        assert_eq!(r.note, None);

        assert_eq!(row(json!({"amount": 2.5, "name": "n", "note": "t"})).amount, 2.5);
    }

    #[test]
    fn test_records_and_keyed_drop_bad_entries() {
        #[derive(Deserialize)]
        struct Lists {
            #[serde(deserialize_with = "records")]
            items: Vec<u32>,
            #[serde(deserialize_with = "keyed")]
            map: BTreeMap<ToothPosition, u32>,
        }

        let lists: Lists = serde_json::from_value(json!({
            "items": [1, "two", 3],
            "map": {"11": 1, "abc": 2, "12": "x"}
        }))
        .unwrap();
        assert_eq!(lists.items, vec![1, 3]);
        assert_eq!(
            lists.map.into_iter().collect::<Vec<_>>(),
            vec![(ToothPosition(11), 1)]
        );

        let lists: Lists =
            serde_json::from_value(json!({"items": "x", "map": [1, 2]})).unwrap();
        assert!(lists.items.is_empty());
        assert!(lists.map.is_empty());
    }

    #[test]
    fn test_strip_nulls_nested() {
        let mut v = json!({"a": null, "b": [{"c": null, "d": 1}], "e": {"f": null}});
        strip_nulls(&mut v);
        assert_eq!(v, json!({"b": [{"d": 1}], "e": {}}));
    }
}
