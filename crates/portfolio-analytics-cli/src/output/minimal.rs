use serde_json::Value;
use std::io::{self, Write};

use super::{result_of, scalar_text};

/// Headline field per command, in priority order: optimizer score, Sharpe
/// ratio, detected frequency, normalized weights, return series.
const PRIORITY_KEYS: [&str; 6] = [
    "final_metric",
    "sharpe",
    "periods_per_year",
    "weights",
    "cumulative_returns",
    "periodic_returns",
];

/// Print just the headline value of a result.
pub fn write_minimal<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    let result = result_of(value);

    if let Value::Object(map) = result {
        for key in PRIORITY_KEYS {
            match map.get(key) {
                Some(Value::Object(weights)) => {
                    for (id, w) in weights {
                        writeln!(out, "{} {}", id, scalar_text(w, "null"))?;
                    }
                    return Ok(());
                }
                Some(val) if !val.is_null() => return writeln!(out, "{}", scalar_text(val, "null")),
                _ => {}
            }
        }

        if let Some((key, val)) = map.iter().next() {
            return writeln!(out, "{}: {}", key, scalar_text(val, "null"));
        }
    }

    writeln!(out, "{}", scalar_text(result, "null"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: Value) -> String {
        let mut buf = Vec::new();
        write_minimal(&mut buf, &value).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_optimizer_score_wins() {
        let v = json!({ "result": { "final_metric": 0.42, "weights": { "A": 100.0 } } });
        assert_eq!(render(v), "0.42\n");
    }

    #[test]
    fn test_weights_one_per_line() {
        let v = json!({ "result": { "weights": { "A": 60.0, "B": 40.0 }, "original_total": 5.0 } });
        assert_eq!(render(v), "A 60.0\nB 40.0\n");
    }

    #[test]
    fn test_fallback_to_first_field() {
        assert_eq!(render(json!({ "name": "weekly" })), "name: weekly\n");
    }
}
