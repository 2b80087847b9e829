use serde_json::{Map, Value};
use std::io::{self, Write};
use tabled::{builder::Builder, Table};

use super::{flatten, parallel_series, result_of, scalar_text};

/// Render a result as tables: period series column-wise, everything else
/// as field/value rows, followed by warnings and methodology.
pub fn write_table<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    match result_of(value) {
        Value::Object(result) => write_result(out, result)?,
        other => writeln!(out, "{}", scalar_text(other, "null"))?,
    }

    if let Some(envelope) = value.as_object().filter(|m| m.contains_key("result")) {
        write_notes(out, envelope)?;
    }
    Ok(())
}

fn write_result<W: Write>(out: &mut W, result: &Map<String, Value>) -> io::Result<()> {
    let series = parallel_series(result);
    let series_keys: Vec<&str> = series
        .as_ref()
        .map(|s| s.iter().map(|(k, _)| *k).collect())
        .unwrap_or_default();

    let mut fields = Builder::default();
    fields.push_record(["Field", "Value"]);
    let mut has_fields = false;
    for (key, val) in flatten(result) {
        if series_keys.contains(&key.as_str()) {
            continue;
        }
        fields.push_record([key, scalar_text(val, "null")]);
        has_fields = true;
    }
    if has_fields {
        writeln!(out, "{}", Table::from(fields))?;
    }

    if let Some(series) = series {
        let mut rows = Builder::default();
        rows.push_record(series.iter().map(|(k, _)| k.to_string()));
        let len = series[0].1.len();
        for i in 0..len {
            rows.push_record(series.iter().map(|(_, items)| scalar_text(&items[i], "")));
        }
        writeln!(out, "{}", Table::from(rows))?;
    }
    Ok(())
}

fn write_notes<W: Write>(out: &mut W, envelope: &Map<String, Value>) -> io::Result<()> {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            writeln!(out, "\nWarnings:")?;
            for w in warnings.iter().filter_map(Value::as_str) {
                writeln!(out, "  - {}", w)?;
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        writeln!(out, "\nMethodology: {}", meth)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: Value) -> String {
        let mut buf = Vec::new();
        write_table(&mut buf, &value).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_weights_render_as_rows() {
        let text = render(json!({
            "result": { "weights": { "A": 51.0, "B": 49.0 }, "iterations": 10 },
            "warnings": ["Optimization failed: boom"],
            "methodology": "Local search",
        }));
        assert!(text.contains("weights.A"));
        assert!(text.contains("Warnings:"));
        assert!(text.contains("Methodology: Local search"));
    }

    #[test]
    fn test_series_render_column_wise() {
        let text = render(json!({
            "result": {
                "indices": [0, 1],
                "periodic_returns": [1.5, -0.5],
                "cumulative_returns": [0.0, 1.5],
            }
        }));
        assert!(text.contains("periodic_returns"));
        assert!(text.contains("-0.5"));
        assert!(!text.contains("Field"));
    }
}
