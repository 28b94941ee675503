// src/sheets/mod.rs
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use url::Url;

use crate::pivot::{Cell, PivotTable};

pub mod auth;

pub use auth::{load_client_secret, Authenticator};

pub const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

const MAX_ATTEMPTS: usize = 3;

/// Supplies bearer tokens for the Sheets API.
#[allow(async_fn_in_trait)]
pub trait TokenSource {
    async fn access_token(&self) -> Result<String>;
}

/// Destination of the per-region pivot tables.
#[allow(async_fn_in_trait)]
pub trait SheetSink {
    async fn write_region(&self, region: &str, table: &PivotTable) -> Result<()>;
}

/// A fixed token, for service setups that mint tokens out of band.
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<Cell>],
}

/// A1 range starting at the top-left cell of `sheet`.
pub fn a1_range(sheet: &str) -> String {
    format!("'{}'!A1", sheet.replace('\'', "''"))
}

/// Writes pivot tables into one spreadsheet, one sheet per region.
pub struct SheetsClient<T> {
    http: Client,
    tokens: T,
    spreadsheet_id: String,
    base: Url,
}

impl<T: TokenSource> SheetsClient<T> {
    pub fn new(http: Client, tokens: T, spreadsheet_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http,
            tokens,
            spreadsheet_id: spreadsheet_id.into(),
            base: Url::parse(SHEETS_API)?,
        })
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        self.base = Url::parse(base).with_context(|| format!("invalid base url {}", base))?;
        Ok(self)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("base url {} cannot carry a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = self.endpoint(&[self.spreadsheet_id.as_str(), "values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        Ok(url)
    }

    fn batch_update_url(&self) -> Result<Url> {
        let target = format!("{}:batchUpdate", self.spreadsheet_id);
        self.endpoint(&[target.as_str()])
    }

    async fn update_values(&self, range: &str, values: &[Vec<Cell>]) -> Result<()> {
        let token = self.tokens.access_token().await?;
        self.http
            .put(self.values_url(range)?)
            .bearer_auth(token)
            .json(&ValueRange {
                range,
                major_dimension: "ROWS",
                values,
            })
            .send()
            .await
            .with_context(|| format!("PUT values {}", range))?
            .error_for_status()?;
        Ok(())
    }

    async fn add_sheet(&self, title: &str) -> Result<()> {
        let token = self.tokens.access_token().await?;
        self.http
            .post(self.batch_update_url()?)
            .bearer_auth(token)
            .json(&json!({
                "requests": [{ "addSheet": { "properties": { "title": title } } }]
            }))
            .send()
            .await
            .with_context(|| format!("adding sheet {}", title))?
            .error_for_status()?;
        Ok(())
    }
}

impl<T: TokenSource> SheetSink for SheetsClient<T> {
    /// Overwrite the sheet named after `region`, creating it when the write fails.
    #[instrument(level = "info", skip(self, table), fields(rows = table.rows().len()))]
    async fn write_region(&self, region: &str, table: &PivotTable) -> Result<()> {
        let range = a1_range(region);
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.update_values(&range, table.rows()).await {
                Ok(()) => {
                    info!(attempt, "sheet updated");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "update failed, attempting to create sheet");
                    if let Err(create_err) = self.add_sheet(region).await {
                        last_err = Some(create_err.context(e.to_string()));
                    } else {
                        last_err = Some(e);
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| anyhow::anyhow!("no attempt made"));
        Err(err.context(format!(
            "unable to write sheet {} after {} attempts",
            region, MAX_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        tests::{raw, with_header},
        Catalog,
    };
    use crate::pivot::build_pivot;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(id: &str) -> SheetsClient<StaticToken> {
        SheetsClient::new(Client::new(), StaticToken("t".into()), id).unwrap()
    }

    #[test]
    fn ranges_quote_sheet_names() {
        assert_eq!(a1_range("Toscana"), "'Toscana'!A1");
        assert_eq!(a1_range("Valle d'Aosta"), "'Valle d''Aosta'!A1");
    }

    #[test]
    fn values_url_escapes_the_range() -> Result<()> {
        let url = client("abc123").values_url(&a1_range("Emilia Romagna"))?;
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'Emilia%20Romagna'!A1?valueInputOption=RAW"
        );
        Ok(())
    }

    #[test]
    fn batch_update_url() -> Result<()> {
        let url = client("abc123").batch_update_url()?;
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123:batchUpdate"
        );
        Ok(())
    }

    #[test]
    fn base_url_can_be_replaced() -> Result<()> {
        let url = client("x")
            .with_base_url("http://localhost:8080/sheets")?
            .batch_update_url()?;
        assert_eq!(url.as_str(), "http://localhost:8080/sheets/x:batchUpdate");
        Ok(())
    }

    #[test]
    fn body_carries_rows() -> Result<()> {
        let cat = Catalog::from_rows(&with_header(vec![
            raw("2020-02-24", "Toscana", 48, "Firenze", 5),
            raw("2020-02-25", "Toscana", 50, "Pisa", 2),
        ]))?;
        let pivot = build_pivot(&cat, "Toscana");
        let body = serde_json::to_value(ValueRange {
            range: "'Toscana'!A1",
            major_dimension: "ROWS",
            values: pivot.rows(),
        })?;
        assert_eq!(
            body,
            json!({
                "range": "'Toscana'!A1",
                "majorDimension": "ROWS",
                "values": [
                    ["", "Firenze", "Pisa", "Total"],
                    ["2020-02-24 18:00:00", 5, "", 5],
                    ["2020-02-25 18:00:00", "", 2, 2],
                ]
            })
        );
        Ok(())
    }

    /// Counts token requests and refuses every one of them.
    #[derive(Default)]
    struct RevokedToken {
        calls: AtomicUsize,
    }

    impl TokenSource for RevokedToken {
        async fn access_token(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("token revoked")
        }
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() -> Result<()> {
        let sheets = SheetsClient::new(Client::new(), RevokedToken::default(), "x")?;
        let cat = Catalog::default();
        let err = sheets
            .write_region("Toscana", &build_pivot(&cat, "Toscana"))
            .await
            .unwrap_err();

        let msg = format!("{:#}", err);
        assert!(msg.contains("after 3 attempts"), "{}", msg);
        assert!(msg.contains("token revoked"), "{}", msg);
        // one update and one create per attempt
        assert_eq!(sheets.tokens.calls.load(Ordering::SeqCst), 2 * MAX_ATTEMPTS);
        Ok(())
    }
}
