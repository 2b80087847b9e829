pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Load a typed command input from `--input <file>` or, failing that, piped stdin.
pub fn load<T: DeserializeOwned>(
    path: Option<&str>,
    command: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json(path);
    }
    match stdin::read_stdin()? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Err(format!(
            "--input <file.json> or JSON on stdin required for {}",
            command
        )
        .into()),
    }
}
