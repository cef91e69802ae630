//! Template resolver — substitutes `{{name}}` references in request data and
//! pulls values out of a response by dot-notation path.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::VolleyError;

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Replace every `{{name}}` placeholder in `input` with the string form of
/// the corresponding variable.
///
/// A placeholder referencing a variable that is not in `variables` is an
/// error naming the variable — missing references must never pass through
/// silently into a request. An unclosed `{{` is treated as literal text.
pub fn substitute_str(
    input: &str,
    variables: &HashMap<String, Value>,
) -> Result<String, VolleyError> {
    // Fast path: nothing to substitute.
    if !input.contains("{{") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let name = &after_open[..close];
                match variables.get(name) {
                    Some(value) => result.push_str(&value_to_string(value)),
                    None => return Err(VolleyError::Template(name.to_string())),
                }
                rest = &after_open[close + 2..];
            }
            None => {
                // Unclosed braces — keep the remainder verbatim.
                result.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);

    Ok(result)
}

/// Recursively substitute placeholders in an arbitrary JSON value.
///
/// A string that is exactly one placeholder (`"{{n}}"` with nothing else)
/// substitutes the raw typed variable value, so a body field can become a
/// number or object rather than a string fragment. Object keys are left
/// untouched.
pub fn substitute_value(
    value: &Value,
    variables: &HashMap<String, Value>,
) -> Result<Value, VolleyError> {
    match value {
        Value::String(s) => {
            if let Some(name) = whole_placeholder(s) {
                return match variables.get(name) {
                    Some(v) => Ok(v.clone()),
                    None => Err(VolleyError::Template(name.to_string())),
                };
            }
            Ok(Value::String(substitute_str(s, variables)?))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute_value(item, variables)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), substitute_value(item, variables)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Substitute placeholders in both keys and values of a string map
/// (headers, query parameters).
pub fn substitute_string_map(
    map: &HashMap<String, String>,
    variables: &HashMap<String, Value>,
) -> Result<HashMap<String, String>, VolleyError> {
    let mut out = HashMap::with_capacity(map.len());
    for (key, value) in map {
        out.insert(
            substitute_str(key, variables)?,
            substitute_str(value, variables)?,
        );
    }
    Ok(out)
}

/// Return the variable name if `s` is exactly one placeholder.
fn whole_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.is_empty() || inner.contains('{') || inner.contains('}') {
        return None;
    }
    Some(inner)
}

/// Render a JSON value as a plain string for embedding into text.
///
/// Strings are returned without surrounding quotes; other values use their
/// JSON representation.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Pull a value out of a response by dot-notation path.
///
/// The root segment selects `status` (the HTTP status code, terminal) or
/// `body` (the parsed response body). Subsequent segments index objects by
/// key and arrays by numeric position.
pub fn extract(status: u16, body: &Value, path: &str) -> Result<Value, VolleyError> {
    let err = |reason: String| VolleyError::Extraction {
        path: path.to_string(),
        reason,
    };

    let mut segments = path.split('.');
    let root = segments.next().unwrap_or("");

    let mut current: &Value = match root {
        "status" => {
            if segments.next().is_some() {
                return Err(err("'status' is a scalar and cannot be indexed".to_string()));
            }
            return Ok(Value::from(status));
        }
        "body" => body,
        other => {
            return Err(err(format!(
                "path must start with 'status' or 'body', got '{other}'"
            )))
        }
    };

    for segment in segments {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| err(format!("key '{segment}' not found")))?,
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| err(format!("'{segment}' is not a valid array index")))?;
                items
                    .get(index)
                    .ok_or_else(|| err(format!("index {index} out of range")))?
            }
            _ => return Err(err(format!("cannot index a scalar with '{segment}'"))),
        };
    }

    Ok(current.clone())
}

/// Configuration-time syntax check for a dot-notation path.
///
/// Catches malformed paths before any request is issued; resolvability
/// against an actual response is a runtime concern.
pub fn validate_path(path: &str) -> Result<(), VolleyError> {
    if path.is_empty() {
        return Err(VolleyError::Configuration(
            "field path must not be empty".to_string(),
        ));
    }
    let mut segments = path.split('.');
    match segments.next() {
        Some("status") | Some("body") => {}
        Some(other) => {
            return Err(VolleyError::Configuration(format!(
                "field path must start with 'status' or 'body', got '{other}'"
            )))
        }
        None => unreachable!("split always yields at least one segment"),
    }
    for segment in segments {
        if segment.is_empty() {
            return Err(VolleyError::Configuration(format!(
                "field path '{path}' contains an empty segment"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // substitute_str
    // -----------------------------------------------------------------------

    #[test]
    fn substitute_simple_variable() {
        let v = vars(&[("user_id", json!(42))]);
        let result = substitute_str("/api/users/{{user_id}}", &v).unwrap();
        assert_eq!(result, "/api/users/42");
    }

    #[test]
    fn substitute_multiple_variables() {
        let v = vars(&[("version", json!("v2")), ("id", json!(7))]);
        let result = substitute_str("/api/{{version}}/items/{{id}}", &v).unwrap();
        assert_eq!(result, "/api/v2/items/7");
    }

    #[test]
    fn substitute_no_placeholders_is_identity() {
        let v = vars(&[("unused", json!("x"))]);
        let result = substitute_str("/api/users", &v).unwrap();
        assert_eq!(result, "/api/users");
    }

    #[test]
    fn substitute_is_idempotent_without_placeholders() {
        let v = HashMap::new();
        let once = substitute_str("plain text", &v).unwrap();
        let twice = substitute_str(&once, &v).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn substitute_missing_variable_is_an_error() {
        let v = HashMap::new();
        let err = substitute_str("/api/{{missing}}", &v).unwrap_err();
        assert!(matches!(err, VolleyError::Template(ref name) if name == "missing"));
    }

    #[test]
    fn substitute_unclosed_braces_are_literal() {
        let v = vars(&[("a", json!("x"))]);
        let result = substitute_str("path/{{a}}/{{unclosed", &v).unwrap();
        assert_eq!(result, "path/x/{{unclosed");
    }

    #[test]
    fn substitute_string_value_embeds_without_quotes() {
        let v = vars(&[("name", json!("alice"))]);
        let result = substitute_str("hello {{name}}", &v).unwrap();
        assert_eq!(result, "hello alice");
    }

    // -----------------------------------------------------------------------
    // substitute_value
    // -----------------------------------------------------------------------

    #[test]
    fn whole_placeholder_substitutes_typed_value() {
        let v = vars(&[("n", json!(5))]);
        let result = substitute_value(&json!("{{n}}"), &v).unwrap();
        assert_eq!(result, json!(5));
    }

    #[test]
    fn whole_placeholder_substitutes_object_value() {
        let v = vars(&[("payload", json!({"a": 1, "b": [true]}))]);
        let result = substitute_value(&json!("{{payload}}"), &v).unwrap();
        assert_eq!(result, json!({"a": 1, "b": [true]}));
    }

    #[test]
    fn partial_placeholder_stays_a_string() {
        let v = vars(&[("n", json!(5))]);
        let result = substitute_value(&json!("id-{{n}}"), &v).unwrap();
        assert_eq!(result, json!("id-5"));
    }

    #[test]
    fn adjacent_placeholders_are_string_substituted() {
        // "{{a}}{{b}}" starts and ends with braces but is not a single
        // placeholder, so it goes down the string path.
        let v = vars(&[("a", json!(1)), ("b", json!(2))]);
        let result = substitute_value(&json!("{{a}}{{b}}"), &v).unwrap();
        assert_eq!(result, json!("12"));
    }

    #[test]
    fn substitution_recurses_into_nested_structures() {
        let v = vars(&[("token", json!("abc")), ("count", json!(3))]);
        let body = json!({
            "auth": {"token": "{{token}}"},
            "items": ["{{count}}", "literal"]
        });
        let result = substitute_value(&body, &v).unwrap();
        assert_eq!(
            result,
            json!({
                "auth": {"token": "abc"},
                "items": [3, "literal"]
            })
        );
    }

    #[test]
    fn substitution_leaves_non_strings_untouched() {
        let v = HashMap::new();
        assert_eq!(substitute_value(&json!(10), &v).unwrap(), json!(10));
        assert_eq!(substitute_value(&json!(null), &v).unwrap(), json!(null));
        assert_eq!(substitute_value(&json!(true), &v).unwrap(), json!(true));
    }

    #[test]
    fn nested_missing_variable_is_an_error() {
        let v = HashMap::new();
        let body = json!({"deep": [{"field": "{{gone}}"}]});
        let err = substitute_value(&body, &v).unwrap_err();
        assert!(matches!(err, VolleyError::Template(ref name) if name == "gone"));
    }

    #[test]
    fn substitute_string_map_resolves_keys_and_values() {
        let v = vars(&[("h", json!("X-Trace")), ("id", json!("abc"))]);
        let mut map = HashMap::new();
        map.insert("{{h}}".to_string(), "{{id}}".to_string());
        let result = substitute_string_map(&map, &v).unwrap();
        assert_eq!(result["X-Trace"], "abc");
    }

    // -----------------------------------------------------------------------
    // extract
    // -----------------------------------------------------------------------

    #[test]
    fn extract_status() {
        let value = extract(201, &json!({}), "status").unwrap();
        assert_eq!(value, json!(201));
    }

    #[test]
    fn extract_whole_body() {
        let body = json!({"a": 1});
        let value = extract(200, &body, "body").unwrap();
        assert_eq!(value, body);
    }

    #[test]
    fn extract_nested_key() {
        let body = json!({"user": {"id": 42}});
        let value = extract(200, &body, "body.user.id").unwrap();
        assert_eq!(value, json!(42));
    }

    #[test]
    fn extract_array_index() {
        let body = json!({"items": [{"id": 7}]});
        let value = extract(200, &body, "body.items.0.id").unwrap();
        assert_eq!(value, json!(7));
    }

    #[test]
    fn extract_missing_key_fails() {
        let body = json!({"a": 1});
        let err = extract(200, &body, "body.missing").unwrap_err();
        assert!(matches!(err, VolleyError::Extraction { .. }));
        assert!(err.to_string().contains("'missing' not found"));
    }

    #[test]
    fn extract_index_out_of_range_fails() {
        let body = json!({"items": [1]});
        let err = extract(200, &body, "body.items.5").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn extract_non_numeric_index_into_array_fails() {
        let body = json!({"items": [1]});
        let err = extract(200, &body, "body.items.first").unwrap_err();
        assert!(err.to_string().contains("not a valid array index"));
    }

    #[test]
    fn extract_indexing_scalar_fails() {
        let body = json!({"count": 3});
        let err = extract(200, &body, "body.count.deeper").unwrap_err();
        assert!(err.to_string().contains("cannot index a scalar"));
    }

    #[test]
    fn extract_status_cannot_be_indexed() {
        let err = extract(200, &json!({}), "status.code").unwrap_err();
        assert!(err.to_string().contains("cannot be indexed"));
    }

    #[test]
    fn extract_unknown_root_fails() {
        let err = extract(200, &json!({}), "headers.x").unwrap_err();
        assert!(err.to_string().contains("must start with 'status' or 'body'"));
    }

    // -----------------------------------------------------------------------
    // validate_path
    // -----------------------------------------------------------------------

    #[test]
    fn validate_path_accepts_status_and_body_paths() {
        assert!(validate_path("status").is_ok());
        assert!(validate_path("body").is_ok());
        assert!(validate_path("body.items.0.id").is_ok());
    }

    #[test]
    fn validate_path_rejects_empty() {
        assert!(validate_path("").is_err());
    }

    #[test]
    fn validate_path_rejects_unknown_root() {
        let err = validate_path("response.body").unwrap_err();
        assert!(matches!(err, VolleyError::Configuration(_)));
    }

    #[test]
    fn validate_path_rejects_empty_segment() {
        assert!(validate_path("body..id").is_err());
    }

    // -----------------------------------------------------------------------
    // value_to_string
    // -----------------------------------------------------------------------

    #[test]
    fn value_to_string_renders_scalars() {
        assert_eq!(value_to_string(&json!("abc")), "abc");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(null)), "null");
    }

    #[test]
    fn value_to_string_renders_structures_as_json() {
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
        assert_eq!(value_to_string(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
