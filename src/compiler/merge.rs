//! Array-diff merge.
//!
//! Two dictionaries merge key by key with the override winning, even when
//! its value is falsy. Two lists append. Anything else is replaced.

use serde_json::Value;

/// Merge `override_value` into `base`.
pub fn merge_array_diff(base: &mut Value, override_value: Value) {
    match (base, override_value) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(&key) {
                    Some(existing) => merge_array_diff(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(over)) => base.extend(over),
        (base, over) => *base = over,
    }
}

/// Merge into a copy of `base`.
pub fn merged(base: &Value, override_value: Value) -> Value {
    let mut out = base.clone();
    merge_array_diff(&mut out, override_value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_override_wins() {
        let result = merged(&json!({"a": true, "b": 0}), json!({"b": false}));
        assert_eq!(result, json!({"a": true, "b": false}));
    }

    #[test]
    fn test_lists_append() {
        let mut value = json!({});
        merge_array_diff(&mut value, json!({"x": [1]}));
        merge_array_diff(&mut value, json!({"x": [2]}));
        assert_eq!(value, json!({"x": [1, 2]}));
    }

    #[test]
    fn test_nested_dictionaries() {
        let result = merged(
            &json!({"groups": {"user": {"edit": true, "move": true}}}),
            json!({"groups": {"user": {"move": false}, "sysop": {"delete": true}}}),
        );
        assert_eq!(
            result,
            json!({"groups": {"user": {"edit": true, "move": false}, "sysop": {"delete": true}}})
        );
    }

    #[test]
    fn test_shape_mismatch_replaces() {
        assert_eq!(merged(&json!([1, 2]), json!({"a": 1})), json!({"a": 1}));
        assert_eq!(merged(&json!({"a": 1}), json!("flat")), json!("flat"));
    }
}
