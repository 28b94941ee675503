// src/record/mod.rs
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

pub mod date_parser;

/// Column names of the provinces feed, in source order.
pub const COLUMNS: [&str; 10] = [
    "data",
    "stato",
    "codice_regione",
    "denominazione_regione",
    "codice_provincia",
    "denominazione_provincia",
    "sigla_provincia",
    "lat",
    "long",
    "totale_casi",
];

/// Minimum number of fields a data row must carry.
pub const MIN_FIELDS: usize = COLUMNS.len();

const DATE: usize = 0;
const STATE: usize = 1;
const REGION_ID: usize = 2;
const REGION_NAME: usize = 3;
const PROVINCE_ID: usize = 4;
const PROVINCE_NAME: usize = 5;
const PROVINCE_CODE: usize = 6;
const LATITUDE: usize = 7;
const LONGITUDE: usize = 8;
const TOTAL_CASES: usize = 9;

/// One observation: cumulative cases of a province as of `date`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub date: NaiveDateTime,
    pub state: String,
    pub region_id: i64,
    pub region_name: String,
    pub province_id: i64,
    pub province_name: String,
    pub province_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_cases: u64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    /// Row too short to hold every column.
    #[error("malformed row: expected at least {expected} fields, found {found}")]
    Malformed { expected: usize, found: usize },

    /// A single field failed conversion to its column type.
    #[error("field {index} ({name}) could not be parsed from {value:?}: {reason}")]
    FieldParse {
        index: usize,
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl RecordError {
    fn field(index: usize, value: &str, reason: impl ToString) -> Self {
        RecordError::FieldParse {
            index,
            name: COLUMNS[index],
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parse one raw row (fields in [`COLUMNS`] order) into a [`Record`].
///
/// Extra trailing fields are ignored. The whole row is rejected on the first bad field.
pub fn parse_record<S: AsRef<str>>(fields: &[S]) -> Result<Record, RecordError> {
    if fields.len() < MIN_FIELDS {
        return Err(RecordError::Malformed {
            expected: MIN_FIELDS,
            found: fields.len(),
        });
    }
    let get = move |i: usize| fields[i].as_ref();

    let date = date_parser::parse_source_datetime(get(DATE)).ok_or_else(|| {
        RecordError::field(
            DATE,
            get(DATE),
            format!("expected layout {}", date_parser::SOURCE_FORMAT),
        )
    })?;

    Ok(Record {
        date,
        state: get(STATE).to_string(),
        region_id: parse_field(fields, REGION_ID)?,
        region_name: get(REGION_NAME).to_string(),
        province_id: parse_field(fields, PROVINCE_ID)?,
        province_name: get(PROVINCE_NAME).to_string(),
        province_code: get(PROVINCE_CODE).to_string(),
        latitude: parse_field(fields, LATITUDE)?,
        longitude: parse_field(fields, LONGITUDE)?,
        total_cases: parse_field(fields, TOTAL_CASES)?,
    })
}

fn parse_field<T, S>(fields: &[S], index: usize) -> Result<T, RecordError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    S: AsRef<str>,
{
    let raw = fields[index].as_ref();
    raw.parse::<T>().map_err(|e| RecordError::field(index, raw, e))
}
