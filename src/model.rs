/// Core data types for the rainfall flood-severity service.
///
/// This module defines the shared domain model imported by the feature
/// deriver, the trainer and the prediction endpoint. It contains no I/O;
/// the only logic is row validation, since every entry point (CSV history,
/// JSON request body) must reject the same malformed rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Feature layout
// ---------------------------------------------------------------------------

/// Number of model input features per day.
pub const FEATURE_COUNT: usize = 6;

/// Feature column names, in matrix column order.
///
/// The first name doubles as the rainfall column header of the historical
/// CSV. The order is part of the artifact contract: the scaler and the forest
/// are both indexed by position in this list.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Rainfall amount (millimetres)",
    "Cumulative_3_days",
    "Cumulative_5_days",
    "Cumulative_7_days",
    "Cumulative_10_days",
    "Cumulative_14_days",
];

/// One row of the feature matrix.
pub type FeatureRow = [f64; FEATURE_COUNT];

// ---------------------------------------------------------------------------
// Rainfall records
// ---------------------------------------------------------------------------

/// A single day of observed rainfall.
///
/// Sequences of records are assumed to be chronological with no gaps. Neither
/// property is checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainfallRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub rainfall_mm: f64,
}

impl RainfallRecord {
    pub fn new(year: i32, month: u32, day: u32, rainfall_mm: f64) -> Self {
        Self { year, month, day, rainfall_mm }
    }

    /// Calendar date of the record, if year/month/day form a real date.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// `YYYY-MM-DD` label used in prediction responses.
    pub fn date_label(&self) -> String {
        match self.date() {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => format!("{}-{:02}-{:02}", self.year, self.month, self.day),
        }
    }

    /// Checks the record against the data model.
    ///
    /// `row` is the caller's position for the record (file line number for
    /// CSV input, array index for JSON input) and only appears in the error.
    pub fn validate(&self, row: usize) -> Result<(), InputValidationError> {
        if !self.rainfall_mm.is_finite() {
            return Err(InputValidationError::NonFiniteRainfall { row });
        }
        if self.rainfall_mm < 0.0 {
            return Err(InputValidationError::NegativeRainfall {
                row,
                value: self.rainfall_mm,
            });
        }
        if self.date().is_none() {
            return Err(InputValidationError::InvalidDate {
                row,
                year: self.year,
                month: self.month,
                day: self.day,
            });
        }
        Ok(())
    }

    /// Parses one `[year, month, day, rainfall_mm]` row of a request body.
    ///
    /// Date parts must be JSON integers; rainfall may be any JSON number.
    pub fn from_json_row(row: usize, value: &serde_json::Value) -> Result<Self, InputValidationError> {
        let fields = value
            .as_array()
            .ok_or(InputValidationError::RowNotArray { row })?;

        if fields.len() != 4 {
            return Err(InputValidationError::RowArity {
                row,
                expected: 4,
                found: fields.len(),
            });
        }

        let integer = |idx: usize, column: &str| -> Result<i64, InputValidationError> {
            fields[idx].as_i64().ok_or_else(|| InputValidationError::InvalidNumber {
                row,
                column: column.to_string(),
                value: fields[idx].to_string(),
            })
        };

        let year = integer(0, "Year")?;
        let month = integer(1, "Month")?;
        let day = integer(2, "Day")?;
        let rainfall_mm = fields[3].as_f64().ok_or_else(|| InputValidationError::InvalidNumber {
            row,
            column: FEATURE_NAMES[0].to_string(),
            value: fields[3].to_string(),
        })?;

        let out_of_range = || InputValidationError::InvalidDate {
            row,
            year: year.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            month: month.clamp(0, u32::MAX as i64) as u32,
            day: day.clamp(0, u32::MAX as i64) as u32,
        };

        let record = RainfallRecord {
            year: i32::try_from(year).map_err(|_| out_of_range())?,
            month: u32::try_from(month).map_err(|_| out_of_range())?,
            day: u32::try_from(day).map_err(|_| out_of_range())?,
            rainfall_mm,
        };
        record.validate(row)?;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Derived features
// ---------------------------------------------------------------------------

/// Model inputs derived for a single day. See `analysis::features`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub rainfall_mm: f64,
    pub cumulative_3: f64,
    pub cumulative_5: f64,
    pub cumulative_7: f64,
    pub cumulative_10: f64,
    pub cumulative_14: f64,
}

impl FeatureVector {
    /// Matrix row in `FEATURE_NAMES` order.
    pub fn to_row(&self) -> FeatureRow {
        [
            self.rainfall_mm,
            self.cumulative_3,
            self.cumulative_5,
            self.cumulative_7,
            self.cumulative_10,
            self.cumulative_14,
        ]
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Flood severity levels, in ascending order of severity.
///
/// Serialized as the bare integer code (0-3), which is what the prediction
/// endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FloodSeverity {
    None = 0,
    Minor = 1,
    Moderate = 2,
    Major = 3,
}

impl FloodSeverity {
    /// Number of severity classes the classifier distinguishes.
    pub const COUNT: usize = 4;

    pub const ALL: [FloodSeverity; Self::COUNT] = [
        FloodSeverity::None,
        FloodSeverity::Minor,
        FloodSeverity::Moderate,
        FloodSeverity::Major,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Class index used by the classifier.
    pub fn class_index(self) -> usize {
        self as usize
    }

    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FloodSeverity::None => "none",
            FloodSeverity::Minor => "minor",
            FloodSeverity::Moderate => "moderate",
            FloodSeverity::Major => "major",
        }
    }
}

impl From<FloodSeverity> for u8 {
    fn from(severity: FloodSeverity) -> u8 {
        severity.code()
    }
}

impl TryFrom<u8> for FloodSeverity {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_class_index(code as usize)
            .ok_or_else(|| format!("Invalid flood severity code: {}", code))
    }
}

impl fmt::Display for FloodSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Malformed rainfall input, from either the historical CSV or a request body.
///
/// `row` is a 1-based line number for CSV input and a 0-based array index for
/// JSON input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValidationError {
    /// The input had no header line.
    MissingHeader,
    /// A required column is absent from the header.
    MissingColumn(String),
    /// A required top-level field is absent from a request body.
    MissingField(String),
    /// The request body is not valid JSON or has the wrong shape.
    MalformedBody(String),
    /// A request row is not a JSON array.
    RowNotArray { row: usize },
    /// A row has the wrong number of fields.
    RowArity { row: usize, expected: usize, found: usize },
    /// A field that must be numeric could not be parsed.
    InvalidNumber { row: usize, column: String, value: String },
    /// Rainfall is NaN or infinite.
    NonFiniteRainfall { row: usize },
    /// Rainfall is below zero.
    NegativeRainfall { row: usize, value: f64 },
    /// Year/month/day do not form a calendar date.
    InvalidDate { row: usize, year: i32, month: u32, day: u32 },
}

impl fmt::Display for InputValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValidationError::MissingHeader => write!(f, "No header line found in rainfall data"),
            InputValidationError::MissingColumn(col) => write!(f, "Missing required column '{}'", col),
            InputValidationError::MissingField(field) => write!(f, "Missing required field '{}'", field),
            InputValidationError::MalformedBody(msg) => write!(f, "Malformed request body: {}", msg),
            InputValidationError::RowNotArray { row } => {
                write!(f, "Row {}: expected [year, month, day, rainfall_mm]", row)
            }
            InputValidationError::RowArity { row, expected, found } => {
                write!(f, "Row {}: expected {} fields, found {}", row, expected, found)
            }
            InputValidationError::InvalidNumber { row, column, value } => {
                write!(f, "Row {}: invalid {} value '{}'", row, column, value)
            }
            InputValidationError::NonFiniteRainfall { row } => {
                write!(f, "Row {}: rainfall must be a finite number", row)
            }
            InputValidationError::NegativeRainfall { row, value } => {
                write!(f, "Row {}: rainfall must not be negative (got {})", row, value)
            }
            InputValidationError::InvalidDate { row, year, month, day } => {
                write!(f, "Row {}: invalid date {}-{:02}-{:02}", row, year, month, day)
            }
        }
    }
}

impl std::error::Error for InputValidationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
