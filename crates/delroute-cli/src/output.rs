use std::io::{self, Write};

use serde::Serialize;

use crate::error::CliError;

/// Writes `value` as one compact JSON line on stdout.
pub fn write_json_line<T: Serialize>(value: &T) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, value)?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}
