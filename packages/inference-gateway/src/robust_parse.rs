//! Lenient JSON parsing for `extract_claims` responses.
//!
//! The first attempt parses strictly as an array. If that fails, a
//! single retry wraps bare objects into a singleton array and unwraps
//! the common `{"claims": [...]}` / `{"objects": [...]}` envelopes
//! before giving up and recording an extraction error.

use serde::de::DeserializeOwned;
use serde_json::Value;

const ENVELOPE_KEYS: &[&str] = &["claims", "objects", "items", "results"];

/// Parse `body` into `Vec<T>`, tolerating a few common deviations from
/// a bare JSON array.
pub fn parse_array_lenient<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, String> {
    if let Ok(parsed) = serde_json::from_str::<Vec<T>>(body) {
        return Ok(parsed);
    }

    let value: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;

    let candidate = match &value {
        Value::Array(_) => value.clone(),
        Value::Object(map) => {
            let unwrapped = ENVELOPE_KEYS
                .iter()
                .find_map(|key| map.get(*key))
                .cloned();
            match unwrapped {
                Some(Value::Array(items)) => Value::Array(items),
                Some(other) => Value::Array(vec![other]),
                None => Value::Array(vec![value.clone()]),
            }
        }
        other => Value::Array(vec![other.clone()]),
    };

    serde_json::from_value(candidate).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn parses_bare_array() {
        let items: Vec<Item> = parse_array_lenient(r#"[{"name":"a"}]"#).unwrap();
        assert_eq!(items, vec![Item { name: "a".into() }]);
    }

    #[test]
    fn wraps_single_object() {
        let items: Vec<Item> = parse_array_lenient(r#"{"name":"a"}"#).unwrap();
        assert_eq!(items, vec![Item { name: "a".into() }]);
    }

    #[test]
    fn unwraps_claims_envelope() {
        let items: Vec<Item> = parse_array_lenient(r#"{"claims":[{"name":"a"},{"name":"b"}]}"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn rejects_garbage() {
        let result: Result<Vec<Item>, String> = parse_array_lenient("not json");
        assert!(result.is_err());
    }
}
