// src/pivot/mod.rs
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::{catalog::Catalog, record::date_parser::format_source_datetime};

/// Label of the trailing row-sum column.
pub const TOTAL_LABEL: &str = "Total";

/// One spreadsheet cell of a pivot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Label(String),
    /// No observation for this province on this date. Not the same as zero.
    Absent,
    Value(u64),
}

impl Cell {
    pub fn label(s: impl Into<String>) -> Self {
        Cell::Label(s.into())
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            Cell::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// Absent cells are written as empty strings so that stale values get cleared.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Label(s) => serializer.serialize_str(s),
            Cell::Absent => serializer.serialize_str(""),
            Cell::Value(v) => serializer.serialize_u64(*v),
        }
    }
}

/// Date-by-province matrix of cumulative cases for one region.
///
/// Row 0 is the header `["", <provinces sorted>..., "Total"]`; every other row is
/// `[<date>, <one cell per province>..., <sum of present cells>]`, dates ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    region: String,
    provinces: Vec<String>,
    dates: Vec<NaiveDateTime>,
    rows: Vec<Vec<Cell>>,
}

impl PivotTable {
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Column order, lexicographic.
    pub fn provinces(&self) -> &[String] {
        &self.provinces
    }

    /// Row order, ascending.
    pub fn dates(&self) -> &[NaiveDateTime] {
        &self.dates
    }

    /// Header followed by data rows.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn header(&self) -> &[Cell] {
        &self.rows[0]
    }

    pub fn data_rows(&self) -> &[Vec<Cell>] {
        &self.rows[1..]
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Width of every row: date column, provinces, total.
    pub fn width(&self) -> usize {
        self.provinces.len() + 2
    }

    pub fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows
    }
}

/// Build the pivot of `region_name`. An unknown region yields a header-only table.
#[instrument(level = "debug", skip(catalog))]
pub fn build_pivot(catalog: &Catalog, region_name: &str) -> PivotTable {
    let mut columns: Vec<(&str, i64)> = catalog
        .region(region_name)
        .map(|provinces| {
            provinces
                .keys()
                .filter_map(|&id| catalog.province_name(id).map(|name| (name, id)))
                .collect()
        })
        .unwrap_or_default();
    // ties only happen on malformed data; the id keeps them deterministic
    columns.sort();

    let width = columns.len();
    let mut row_of: HashMap<NaiveDateTime, usize> = HashMap::new();
    let mut grid: Vec<(NaiveDateTime, Vec<Cell>)> = Vec::new();

    if let Some(provinces) = catalog.region(region_name) {
        for (col, &(_, id)) in columns.iter().enumerate() {
            let Some(history) = provinces.get(&id) else {
                continue;
            };
            for record in history.iter() {
                let idx = *row_of.entry(record.date).or_insert_with(|| {
                    grid.push((record.date, vec![Cell::Absent; width]));
                    grid.len() - 1
                });
                // later records for the same date overwrite earlier ones
                grid[idx].1[col] = Cell::Value(record.total_cases);
            }
        }
    }

    grid.sort_by(|a, b| a.0.cmp(&b.0));

    let provinces: Vec<String> = columns.iter().map(|(name, _)| name.to_string()).collect();

    let mut rows = Vec::with_capacity(grid.len() + 1);
    let mut header = Vec::with_capacity(width + 2);
    header.push(Cell::label(""));
    header.extend(provinces.iter().cloned().map(Cell::Label));
    header.push(Cell::label(TOTAL_LABEL));
    rows.push(header);

    let mut dates = Vec::with_capacity(grid.len());
    for (date, cells) in grid {
        let total: u64 = cells.iter().filter_map(Cell::value).sum();
        let mut row = Vec::with_capacity(width + 2);
        row.push(Cell::Label(format_source_datetime(&date)));
        row.extend(cells);
        row.push(Cell::Value(total));
        rows.push(row);
        dates.push(date);
    }

    debug!(
        region = region_name,
        provinces = provinces.len(),
        dates = dates.len(),
        "pivot built"
    );

    PivotTable {
        region: region_name.to_string(),
        provinces,
        dates,
        rows,
    }
}

/// Build the pivots of several regions in parallel. Output order follows `regions`.
#[instrument(level = "info", skip_all, fields(regions = regions.len()))]
pub fn build_pivots<S: AsRef<str> + Sync>(catalog: &Catalog, regions: &[S]) -> Vec<PivotTable> {
    regions
        .par_iter()
        .map(|region| build_pivot(catalog, region.as_ref()))
        .collect()
}
