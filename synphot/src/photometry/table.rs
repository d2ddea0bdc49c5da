//! Reader for whitespace-delimited two-column text tables
//!
//! Throughput curves and SEDs share one on-disk format: one record per line,
//! wavelength in the first column and the tabulated quantity in the second.
//! Lines starting with `#` and blank lines are skipped; columns beyond the
//! second are ignored.

use std::fs;
use std::path::Path;

use super::error::{PhotometryError, Result};

/// Wavelength and value columns read from a table file
#[derive(Debug, Clone, PartialEq)]
pub struct TwoColumnTable {
    pub wavelengths: Vec<f64>,
    pub values: Vec<f64>,
}

/// Read a two-column table from `path`
pub fn read_two_column(path: &Path) -> Result<TwoColumnTable> {
    let text = fs::read_to_string(path).map_err(|e| PhotometryError::io(path, e))?;
    parse_two_column(&text, path)
}

/// Parse table text; `origin` is only used in error messages
pub fn parse_two_column(text: &str, origin: &Path) -> Result<TwoColumnTable> {
    let mut wavelengths = Vec::new();
    let mut values = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(w), Some(v)) = (fields.next(), fields.next()) else {
            return Err(PhotometryError::Parse {
                path: origin.to_path_buf(),
                line: idx + 1,
                message: "expected at least two columns".to_string(),
            });
        };

        let parse = |field: &str| {
            field.parse::<f64>().map_err(|e| PhotometryError::Parse {
                path: origin.to_path_buf(),
                line: idx + 1,
                message: format!("'{field}': {e}"),
            })
        };

        wavelengths.push(parse(w)?);
        values.push(parse(v)?);
    }

    if wavelengths.len() < 2 {
        return Err(PhotometryError::Parse {
            path: origin.to_path_buf(),
            line: 0,
            message: format!("need at least 2 records, found {}", wavelengths.len()),
        });
    }

    Ok(TwoColumnTable {
        wavelengths,
        values,
    })
}
