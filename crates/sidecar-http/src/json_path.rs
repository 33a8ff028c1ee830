use serde_json::Value;

/// Walks a dotted path through nested JSON objects. Returns the empty
/// string if any segment is missing, or if an intermediate segment isn't an
/// object. A string leaf is returned verbatim; any other leaf is rendered
/// via its JSON text form with surrounding quotes stripped.
pub fn get_json_value(value: &Value, path: &str) -> String {
    let mut current = value;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn follows_a_nested_dotted_path() {
        let value = json!({"a": {"b": "c"}});
        assert_eq!(get_json_value(&value, "a.b"), "c");
    }

    #[test]
    fn missing_segment_returns_empty_string() {
        let value = json!({"a": {"b": "c"}});
        assert_eq!(get_json_value(&value, "a.missing"), "");
        assert_eq!(get_json_value(&value, "x.y"), "");
    }

    #[test]
    fn non_object_intermediate_segment_returns_empty_string() {
        let value = json!({"a": "not an object"});
        assert_eq!(get_json_value(&value, "a.b"), "");
    }

    #[test]
    fn numeric_leaf_renders_without_quotes() {
        let value = json!({"a": {"id": 42}});
        assert_eq!(get_json_value(&value, "a.id"), "42");
    }
}
