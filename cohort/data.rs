//! # Applicant Tables
//!
//! Reads applicant TSV files into validated `ndarray` columns and writes
//! applicant and decision tables back out.
//!
//! The schema is fixed: `race`, `sex`, `gpa` and `lsat` are always required.
//! `first_year` is only needed to train the unaware policy and `ability` is
//! only used by audits, so both are optional. A `sample_id` column is carried
//! through to the outputs when present; otherwise 1-based row numbers are used.

use ndarray::{Array1, ArrayView1};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

const REQUIRED_COLUMNS: [&str; 4] = ["race", "sex", "gpa", "lsat"];

/// Applicant columns, one entry per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Applicants {
    pub sample_ids: Vec<String>,
    pub race: Array1<f64>,
    pub sex: Array1<f64>,
    pub gpa: Array1<f64>,
    pub lsat: Array1<f64>,
    pub first_year: Option<Array1<f64>>,
    pub ability: Option<Array1<f64>>,
}

impl Applicants {
    pub fn len(&self) -> usize {
        self.gpa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gpa.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to write TSV output: {0}")]
    CsvError(#[from] csv::Error),

    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),

    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },

    #[error("Missing or null values were found in the column '{0}'.")]
    MissingValuesFound(String),

    #[error("Non-finite values (NaN or Infinity) were found in the column '{0}'.")]
    NonFiniteValuesFound(String),

    #[error("The protected attribute '{column}' must be coded 0 or 1, but row {row} holds {value}.")]
    NonBinaryValue {
        column: &'static str,
        row: usize,
        value: f64,
    },

    #[error("The input file contains no data rows.")]
    NoRows,

    #[error("Column '{column}' has {found} rows, but the table has {expected}.")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Loads and validates an applicant table from a tab-separated file.
pub fn load_applicants(path: &str) -> Result<Applicants, DataError> {
    let df = CsvReader::new(File::open(Path::new(path))?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::NoRows);
    }

    let columns: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for name in REQUIRED_COLUMNS {
        if !columns.contains(name) {
            return Err(DataError::ColumnNotFound(name.to_string()));
        }
    }

    let race = Array1::from_vec(extract_binary_column(&df, "race")?);
    let sex = Array1::from_vec(extract_binary_column(&df, "sex")?);
    let gpa = Array1::from_vec(extract_numeric_column(&df, "gpa")?);
    let lsat = Array1::from_vec(extract_numeric_column(&df, "lsat")?);

    let optional = |name: &str| -> Result<Option<Array1<f64>>, DataError> {
        if columns.contains(name) {
            Ok(Some(Array1::from_vec(extract_numeric_column(&df, name)?)))
        } else {
            Ok(None)
        }
    };
    let first_year = optional("first_year")?;
    let ability = optional("ability")?;

    let sample_ids = if columns.contains("sample_id") {
        read_sample_ids(&df)?
    } else {
        sequential_ids(df.height())
    };

    log::info!(
        "Loaded {} applicants from '{}' (first_year: {}, ability: {})",
        df.height(),
        path,
        if first_year.is_some() { "present" } else { "absent" },
        if ability.is_some() { "present" } else { "absent" },
    );

    Ok(Applicants {
        sample_ids,
        race,
        sex,
        gpa,
        lsat,
        first_year,
        ability,
    })
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: format!("{:?}", series.dtype()),
    };
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let values: Vec<f64> = casted.f64()?.rechunk().into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

fn extract_binary_column(df: &DataFrame, column: &'static str) -> Result<Vec<f64>, DataError> {
    let values = extract_numeric_column(df, column)?;
    if let Some((row, &value)) = values
        .iter()
        .enumerate()
        .find(|&(_, &v)| v != 0.0 && v != 1.0)
    {
        return Err(DataError::NonBinaryValue {
            column,
            row: row + 1,
            value,
        });
    }
    Ok(values)
}

fn read_sample_ids(df: &DataFrame) -> Result<Vec<String>, DataError> {
    let casted = df.column("sample_id")?.cast(&DataType::String)?;
    let ids = casted
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => (i + 1).to_string(),
        })
        .collect();
    Ok(ids)
}

fn sequential_ids(n: usize) -> Vec<String> {
    (1..=n).map(|i| i.to_string()).collect()
}

/// Writes an applicant table in the layout [`load_applicants`] reads.
pub fn write_applicants(path: &str, applicants: &Applicants) -> Result<(), DataError> {
    let n = applicants.len();
    check_length("sample_id", n, applicants.sample_ids.len())?;
    check_length("race", n, applicants.race.len())?;
    check_length("sex", n, applicants.sex.len())?;
    check_length("lsat", n, applicants.lsat.len())?;

    let mut header = vec!["sample_id", "race", "sex", "gpa", "lsat"];
    let mut extra: Vec<ArrayView1<f64>> = Vec::new();
    if let Some(first_year) = &applicants.first_year {
        check_length("first_year", n, first_year.len())?;
        header.push("first_year");
        extra.push(first_year.view());
    }
    if let Some(ability) = &applicants.ability {
        check_length("ability", n, ability.len())?;
        header.push("ability");
        extra.push(ability.view());
    }

    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(&header)?;
    for row in 0..n {
        let mut record = vec![
            applicants.sample_ids[row].clone(),
            applicants.race[row].to_string(),
            applicants.sex[row].to_string(),
            applicants.gpa[row].to_string(),
            applicants.lsat[row].to_string(),
        ];
        record.extend(extra.iter().map(|column| column[row].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one line per applicant: id, policy score, 1-based rank and the
/// admission decision (`1` or `0`).
pub fn write_decisions(
    path: &str,
    sample_ids: &[String],
    scores: ArrayView1<f64>,
    ranks: &[usize],
    accepted: ArrayView1<bool>,
) -> Result<(), DataError> {
    let n = sample_ids.len();
    check_length("score", n, scores.len())?;
    check_length("rank", n, ranks.len())?;
    check_length("admitted", n, accepted.len())?;

    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["sample_id", "score", "rank", "admitted"])?;
    for row in 0..n {
        writer.write_record([
            sample_ids[row].clone(),
            scores[row].to_string(),
            ranks[row].to_string(),
            u8::from(accepted[row]).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn check_length(column: &'static str, expected: usize, found: usize) -> Result<(), DataError> {
    if expected != found {
        return Err(DataError::LengthMismatch {
            column,
            expected,
            found,
        });
    }
    Ok(())
}
