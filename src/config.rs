// src/config.rs
use clap::Parser;
use std::path::PathBuf;

use crate::fetch::PROVINCES_CSV_URL;

const CACHE_FILE_NAME: &str = "dpc-covid19-ita-province.csv";
const CREDENTIALS_FILE_NAME: &str = "credentials.json";
const TOKEN_FILE_NAME: &str = "covid19-sheet-token.json";

/// Feed cache inside the user cache directory, or the working directory when there is none.
pub fn default_cache_file() -> PathBuf {
    dirs::cache_dir().unwrap_or_default().join(CACHE_FILE_NAME)
}

/// `name` inside the user config directory, or the working directory when there is none.
fn in_config_dir(name: &str) -> PathBuf {
    dirs::config_dir().unwrap_or_default().join(name)
}

pub fn default_credentials_file() -> PathBuf {
    in_config_dir(CREDENTIALS_FILE_NAME)
}

pub fn default_token_file() -> PathBuf {
    in_config_dir(TOKEN_FILE_NAME)
}

/// Publish per-region pivots of the Italian provinces COVID-19 feed to Google Sheets.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Download fresh data instead of using the local cache
    #[arg(long)]
    pub update: bool,

    /// Source CSV
    #[arg(long, default_value = PROVINCES_CSV_URL)]
    pub data_url: String,

    /// Local copy of the source CSV
    #[arg(long, default_value_os_t = default_cache_file())]
    pub cache_file: PathBuf,

    /// Target spreadsheet id
    #[arg(long, env = "COVID_GOOGLESHEET", required_unless_present = "dry_run")]
    pub spreadsheet_id: Option<String>,

    /// OAuth client secret file
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", default_value_os_t = default_credentials_file())]
    pub credentials: PathBuf,

    /// Where the OAuth token is cached between runs
    #[arg(long, default_value_os_t = default_token_file())]
    pub token_file: PathBuf,

    /// Only publish these regions (repeatable); all regions by default
    #[arg(long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// Build the pivots without writing anything
    #[arg(long)]
    pub dry_run: bool,
}
