pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};
use std::io::{self, Write};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = match format {
        OutputFormat::Json => json::write_json(&mut out, value),
        OutputFormat::Table => table::write_table(&mut out, value),
        OutputFormat::Csv => csv_out::write_csv(&mut out, value),
        OutputFormat::Minimal => minimal::write_minimal(&mut out, value),
    };
    if let Err(e) = written.and_then(|_| out.flush()) {
        eprintln!("failed to write output: {}", e);
    }
}

/// The `result` object of a computation envelope, or the value itself.
pub(crate) fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// Flatten nested objects into dotted keys (`weights.SPY`), leaving arrays intact.
pub(crate) fn flatten(map: &Map<String, Value>) -> Vec<(String, &Value)> {
    let mut rows = Vec::new();
    flatten_into("", map, &mut rows);
    rows
}

fn flatten_into<'a>(
    prefix: &str,
    map: &'a Map<String, Value>,
    rows: &mut Vec<(String, &'a Value)>,
) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&name, inner, rows),
            _ => rows.push((name, val)),
        }
    }
}

/// Numeric arrays sharing one length, keyed by field name. These are the
/// period-indexed series (`indices`, `periodic_returns`, `cumulative_returns`).
pub(crate) fn parallel_series(map: &Map<String, Value>) -> Option<Vec<(&str, &Vec<Value>)>> {
    let series: Vec<(&str, &Vec<Value>)> = map
        .iter()
        .filter_map(|(k, v)| match v {
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_number) => {
                Some((k.as_str(), items))
            }
            _ => None,
        })
        .collect();
    let len = series.first()?.1.len();
    if series.len() >= 2 && series.iter().all(|(_, items)| items.len() == len) {
        Some(series)
    } else {
        None
    }
}

pub(crate) fn scalar_text(value: &Value, null: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => null.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|v| scalar_text(v, null))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_weight_map() {
        let v = json!({ "success": true, "weights": { "A": 51.0, "B": 49.0 } });
        let rows = flatten(v.as_object().unwrap());
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["success", "weights.A", "weights.B"]);
    }

    #[test]
    fn test_parallel_series_detection() {
        let v = json!({
            "indices": [0, 1, 2],
            "periodic_returns": [1.0, -0.5, 2.0],
            "cumulative_returns": [0.0, 1.0, 0.495],
        });
        assert_eq!(parallel_series(v.as_object().unwrap()).unwrap().len(), 3);

        let ragged = json!({ "a": [1.0, 2.0], "b": [1.0] });
        assert!(parallel_series(ragged.as_object().unwrap()).is_none());
    }
}
