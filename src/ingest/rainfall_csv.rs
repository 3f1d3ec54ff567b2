/// Daily historical rainfall parser
///
/// Parses the delimited daily-rainfall history used for training.
/// Format: one header line, then one row per day, in chronological order.
///
/// Columns are located by header name, so extra columns (station number,
/// product code, measurement period, quality flag, ...) are ignored and may
/// appear in any order. Required columns:
/// - `Year`
/// - `Month`
/// - `Day`
/// - `Rainfall amount (millimetres)`
///
/// Fields may be double-quoted, and a quoted field may contain the delimiter.
/// Header names must match exactly after trimming whitespace and removing
/// quotes. A UTF-8 byte-order mark on the first line is stripped.

use std::collections::HashMap;

use crate::model::{FEATURE_NAMES, InputValidationError, RainfallRecord};

pub const COL_YEAR: &str = "Year";
pub const COL_MONTH: &str = "Month";
pub const COL_DAY: &str = "Day";
pub const COL_RAINFALL: &str = FEATURE_NAMES[0];

/// Parser behaviour knobs, normally taken from `[training]` config.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    /// Field delimiter.
    pub delimiter: char,
    /// Treat an empty rainfall cell as 0 mm instead of rejecting the row.
    pub missing_rainfall_as_zero: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            missing_rainfall_as_zero: false,
        }
    }
}

/// Splits one line into trimmed fields.
///
/// A delimiter inside double quotes does not end the field, and `""` inside
/// quotes is a literal quote. The quotes themselves are dropped.
fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn field_at(fields: &[String], idx: usize, row: usize, width: usize) -> Result<&str, InputValidationError> {
    fields.get(idx).map(String::as_str).ok_or(InputValidationError::RowArity {
        row,
        expected: width,
        found: fields.len(),
    })
}

/// Parse rainfall history text into records, in file order.
///
/// Blank lines are skipped. Row numbers in errors are 1-based line numbers
/// of the input text.
pub fn parse_rainfall_csv(text: &str, options: &CsvOptions) -> Result<Vec<RainfallRecord>, InputValidationError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    // First non-blank line: column headers
    let (_, header_line) = lines.next().ok_or(InputValidationError::MissingHeader)?;
    let header_line = header_line.trim_start_matches('\u{feff}');

    let col_map: HashMap<String, usize> = split_fields(header_line, options.delimiter)
        .into_iter()
        .enumerate()
        .map(|(idx, name)| (name, idx))
        .collect();

    let column = |name: &str| -> Result<usize, InputValidationError> {
        col_map
            .get(name)
            .copied()
            .ok_or_else(|| InputValidationError::MissingColumn(name.to_string()))
    };

    let year_idx = column(COL_YEAR)?;
    let month_idx = column(COL_MONTH)?;
    let day_idx = column(COL_DAY)?;
    let rain_idx = column(COL_RAINFALL)?;
    let width = col_map.values().max().map(|m| m + 1).unwrap_or(0);

    let mut records = Vec::new();
    for (row, line) in lines {
        let fields = split_fields(line, options.delimiter);

        let field = |idx: usize| field_at(&fields, idx, row, width);

        let invalid = |column: &str, value: &str| InputValidationError::InvalidNumber {
            row,
            column: column.to_string(),
            value: value.to_string(),
        };

        let year_str = field(year_idx)?;
        let year = year_str.parse::<i32>().map_err(|_| invalid(COL_YEAR, year_str))?;

        let month_str = field(month_idx)?;
        let month = month_str.parse::<u32>().map_err(|_| invalid(COL_MONTH, month_str))?;

        let day_str = field(day_idx)?;
        let day = day_str.parse::<u32>().map_err(|_| invalid(COL_DAY, day_str))?;

        let rain_str = field(rain_idx)?;
        let rainfall_mm = if rain_str.is_empty() && options.missing_rainfall_as_zero {
            0.0
        } else {
            rain_str.parse::<f64>().map_err(|_| invalid(COL_RAINFALL, rain_str))?
        };

        let record = RainfallRecord::new(year, month, day, rainfall_mm);
        record.validate(row)?;
        records.push(record);
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
