// src/publish/mod.rs
use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::{
    catalog::Catalog,
    pivot::{build_pivots, PivotTable},
    sheets::SheetSink,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub regions: usize,
    pub rows: usize,
}

/// Regions to publish, in catalog order. Empty `only` means every region.
///
/// Regions with an empty name have no usable sheet title and are skipped.
pub fn select_regions(catalog: &Catalog, only: &[String]) -> Vec<String> {
    for wanted in only {
        if !catalog.region_names().contains(wanted) {
            warn!(region = %wanted, "requested region not in data");
        }
    }
    catalog
        .region_names()
        .iter()
        .filter(|name| !name.is_empty())
        .filter(|name| only.is_empty() || only.contains(name))
        .cloned()
        .collect()
}

/// Build every selected pivot, then hand them to `sink` one region at a time.
///
/// Stops at the first region the sink fails to take.
#[instrument(level = "info", skip_all, fields(regions = regions.len()))]
pub async fn publish_regions<S: SheetSink>(
    catalog: &Catalog,
    sink: &S,
    regions: &[String],
) -> Result<PublishSummary> {
    let pivots = build_pivots(catalog, regions);
    let mut summary = PublishSummary::default();

    for pivot in &pivots {
        info!(region = pivot.region(), "updating");
        sink.write_region(pivot.region(), pivot)
            .await
            .with_context(|| format!("while writing region {}", pivot.region()))?;
        summary.regions += 1;
        summary.rows += pivot.data_rows().len();
    }

    info!(regions = summary.regions, rows = summary.rows, "published");
    Ok(summary)
}

/// Log the shape of each pivot instead of publishing it.
pub fn describe(pivots: &[PivotTable]) {
    for pivot in pivots {
        info!(
            region = pivot.region(),
            provinces = pivot.provinces().len(),
            dates = pivot.dates().len(),
            first = ?pivot.dates().first(),
            last = ?pivot.dates().last(),
            "dry run"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{init_test_logging, raw, with_header};
    use crate::pivot::Cell;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        written: Mutex<Vec<(String, Vec<Vec<Cell>>)>>,
        fail_on: Option<String>,
    }

    impl SheetSink for Recorder {
        async fn write_region(&self, region: &str, table: &PivotTable) -> Result<()> {
            if self.fail_on.as_deref() == Some(region) {
                anyhow::bail!("quota exceeded");
            }
            self.written
                .lock()
                .unwrap()
                .push((region.to_string(), table.rows().to_vec()));
            Ok(())
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_rows(&with_header(vec![
            raw("2020-02-24", "Toscana", 48, "Firenze", 5),
            raw("2020-02-25", "Toscana", 48, "Firenze", 8),
            raw("2020-02-24", "Lombardia", 98, "Lodi", 50),
            raw("2020-02-24", "", 0, "Ignota", 1),
            raw("2020-02-24", "Veneto", 28, "Padova", 7),
        ]))
        .unwrap()
    }

    #[test]
    fn selects_all_named_regions_by_default() {
        assert_eq!(
            select_regions(&catalog(), &[]),
            ["Lombardia", "Toscana", "Veneto"]
        );
    }

    #[test]
    fn selection_is_filtered_and_keeps_catalog_order() {
        let only = vec!["Veneto".to_string(), "Atlantide".into(), "Lombardia".into()];
        assert_eq!(select_regions(&catalog(), &only), ["Lombardia", "Veneto"]);
    }

    #[tokio::test]
    async fn publishes_each_region_in_order() -> Result<()> {
        init_test_logging();
        let cat = catalog();
        let sink = Recorder::default();
        let regions = select_regions(&cat, &[]);
        let summary = publish_regions(&cat, &sink, &regions).await?;

        assert_eq!(summary, PublishSummary { regions: 3, rows: 4 });
        let written = sink.written.lock().unwrap();
        let names: Vec<&str> = written.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(names, ["Lombardia", "Toscana", "Veneto"]);
        assert_eq!(written[1].1.len(), 3);
        assert_eq!(written[1].1[2].last(), Some(&Cell::Value(8)));
        Ok(())
    }

    #[tokio::test]
    async fn stops_at_first_failing_region() {
        init_test_logging();
        let cat = catalog();
        let sink = Recorder {
            fail_on: Some("Toscana".into()),
            ..Default::default()
        };
        let regions = select_regions(&cat, &[]);
        let err = publish_regions(&cat, &sink, &regions).await.unwrap_err();

        assert!(format!("{:#}", err).contains("Toscana"));
        assert_eq!(sink.written.lock().unwrap().len(), 1);
    }
}
