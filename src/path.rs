//! Parameter path resolution and numeric coercion (§4.1), shared by the
//! constraint evaluator and the aggregate accountant.

use serde_json::Value;

/// Resolve a dot-separated path (optionally prefixed `params.`) against a
/// request's params map. Returns `None` when any segment is absent or the
/// current value stops being a map before the path is exhausted — this is
/// *absent*, distinguishable from an explicit JSON `null`.
pub fn resolve<'a>(path: &str, params: &'a Value) -> Option<&'a Value> {
    let path = path.strip_prefix("params.").unwrap_or(path);
    let mut current = params;
    for segment in path.split('.') {
        match current.as_object() {
            Some(map) => current = map.get(segment)?,
            None => return None,
        }
    }
    Some(current)
}

/// Coerce a resolved JSON value into an `f64` for ordering comparisons.
/// Integers and floats are accepted verbatim; strings are accepted only if
/// they parse as a finite number. Any other shape is an error.
pub fn to_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| "value cannot be compared numerically".to_string()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| "value cannot be compared numerically".to_string()),
        _ => Err("value cannot be compared numerically".to_string()),
    }
}

/// Render a JSON value the way constraint-rejection messages expect:
/// strings unquoted, everything else via its JSON form.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a single observed value the way §8's golden messages quote it:
/// strings wrapped in single quotes, everything else unquoted.
pub fn display_quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

/// Render a list of allowed/blocked values as `[a,b,c]` — unquoted,
/// comma-joined, matching §8's `not in allowed values [A,B]` format.
pub fn display_list(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(display_value).collect();
    format!("[{}]", items.join(","))
}
