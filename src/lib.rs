/// Per-province and per-region indices over one ingestion pass.
pub mod catalog;
/// Command-line arguments and default file locations.
pub mod config;
/// Downloading, caching and splitting the provinces CSV.
pub mod fetch;
/// Region pivots: one row per date, one column per province plus a total.
pub mod pivot;
/// Region selection and the build-then-write publishing loop.
pub mod publish;
/// Typed province records parsed from raw CSV fields.
pub mod record;
/// Google Sheets values client and OAuth token handling.
pub mod sheets;
