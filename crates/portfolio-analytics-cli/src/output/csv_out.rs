use serde_json::{Map, Value};
use std::io::{self, Write};

use super::{flatten, parallel_series, result_of, scalar_text};

/// Write a result as CSV. Period series become one row per period; other
/// results become `field,value` rows with weight maps flattened.
pub fn write_csv<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    match result_of(value) {
        Value::Object(result) => match parallel_series(result) {
            Some(series) => write_series(&mut wtr, &series)?,
            None => write_fields(&mut wtr, result)?,
        },
        Value::Array(items) => {
            wtr.write_record(["index", "value"])?;
            for (i, item) in items.iter().enumerate() {
                wtr.write_record([i.to_string(), scalar_text(item, "")])?;
            }
        }
        other => wtr.write_record([scalar_text(other, "")])?,
    }

    wtr.flush()
}

fn write_series<W: Write>(
    wtr: &mut csv::Writer<W>,
    series: &[(&str, &Vec<Value>)],
) -> csv::Result<()> {
    wtr.write_record(series.iter().map(|(k, _)| *k))?;
    let len = series[0].1.len();
    for i in 0..len {
        wtr.write_record(series.iter().map(|(_, items)| scalar_text(&items[i], "")))?;
    }
    Ok(())
}

fn write_fields<W: Write>(
    wtr: &mut csv::Writer<W>,
    result: &Map<String, Value>,
) -> csv::Result<()> {
    wtr.write_record(["field", "value"])?;
    for (key, val) in flatten(result) {
        wtr.write_record([key, scalar_text(val, "")])?;
    }
    Ok(())
}
