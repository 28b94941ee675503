// src/catalog/mod.rs
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::record::{parse_record, Record, RecordError};

/// Province names starting with this are rows the source could not attribute to a province.
pub const UNDETERMINED_PROVINCE_PREFIX: &str = "In fase di definizione";

/// The records of one province, in ingestion order. Shared between the province
/// and region indices; each record is also shared with `all_records`.
pub type ProvinceHistory = Arc<Vec<Arc<Record>>>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    /// `row` is the position in the raw input, the header being row 0.
    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: RecordError,
    },
}

/// Immutable indices over every usable record of a single ingestion pass.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    all_records: Vec<Arc<Record>>,
    provinces: HashMap<i64, ProvinceHistory>,
    regions: HashMap<String, BTreeMap<i64, ProvinceHistory>>,
    province_name_to_id: HashMap<String, i64>,
    province_id_to_name: HashMap<i64, String>,
    region_names: Vec<String>,
}

impl Catalog {
    /// Build the catalog from raw rows. Row 0 is the header and is never parsed.
    ///
    /// All-or-nothing: the first row that fails to parse aborts the build.
    #[instrument(level = "info", skip(rows), fields(rows = rows.len()))]
    pub fn from_rows<R, S>(rows: &[R]) -> Result<Self, CatalogError>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut all_records = Vec::with_capacity(rows.len().saturating_sub(1));
        let mut histories: HashMap<i64, Vec<Arc<Record>>> = HashMap::new();
        let mut members: HashMap<String, BTreeSet<i64>> = HashMap::new();
        let mut province_name_to_id = HashMap::new();
        let mut province_id_to_name = HashMap::new();
        let mut region_names = Vec::new();
        let mut undetermined = 0usize;

        for (row, fields) in rows.iter().enumerate().skip(1) {
            let record = Arc::new(
                parse_record(fields.as_ref()).map_err(|source| CatalogError::Row { row, source })?,
            );

            if record.province_name.starts_with(UNDETERMINED_PROVINCE_PREFIX) {
                undetermined += 1;
                continue;
            }

            if !members.contains_key(&record.region_name) {
                debug!(region = %record.region_name, row, "new region");
                region_names.push(record.region_name.clone());
            }
            members
                .entry(record.region_name.clone())
                .or_default()
                .insert(record.province_id);
            province_name_to_id.insert(record.province_name.clone(), record.province_id);
            province_id_to_name.insert(record.province_id, record.province_name.clone());
            histories
                .entry(record.province_id)
                .or_default()
                .push(Arc::clone(&record));
            all_records.push(record);
        }

        region_names.sort();

        let provinces: HashMap<i64, ProvinceHistory> = histories
            .into_iter()
            .map(|(id, records)| (id, Arc::new(records)))
            .collect();

        let regions = members
            .into_iter()
            .map(|(region, ids)| {
                let by_id = ids
                    .into_iter()
                    .filter_map(|id| provinces.get(&id).map(|h| (id, Arc::clone(h))))
                    .collect();
                (region, by_id)
            })
            .collect();

        info!(
            records = all_records.len(),
            provinces = provinces.len(),
            regions = region_names.len(),
            undetermined,
            "catalog built"
        );

        Ok(Catalog {
            all_records,
            provinces,
            regions,
            province_name_to_id,
            province_id_to_name,
            region_names,
        })
    }

    /// Every retained record, in ingestion order.
    pub fn all_records(&self) -> &[Arc<Record>] {
        &self.all_records
    }

    pub fn province(&self, province_id: i64) -> Option<&ProvinceHistory> {
        self.provinces.get(&province_id)
    }

    pub fn provinces(&self) -> &HashMap<i64, ProvinceHistory> {
        &self.provinces
    }

    /// Provinces of `region_name`, keyed by province id.
    pub fn region(&self, region_name: &str) -> Option<&BTreeMap<i64, ProvinceHistory>> {
        self.regions.get(region_name)
    }

    pub fn province_id(&self, province_name: &str) -> Option<i64> {
        self.province_name_to_id.get(province_name).copied()
    }

    pub fn province_name(&self, province_id: i64) -> Option<&str> {
        self.province_id_to_name.get(&province_id).map(String::as_str)
    }

    /// Distinct region names, byte-wise ascending.
    pub fn region_names(&self) -> &[String] {
        &self.region_names
    }
}
