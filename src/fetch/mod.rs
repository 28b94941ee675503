// src/fetch/mod.rs
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use reqwest::Client;
use std::{path::Path, time::Duration};
use tokio::{fs, time::sleep};
use tracing::{info, instrument, warn};

/// Provinces feed of the Italian Civil Protection department.
pub const PROVINCES_CSV_URL: &str =
    "https://raw.githubusercontent.com/pcm-dpc/COVID-19/master/dati-province/dpc-covid19-ita-province.csv";

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Download the CSV at `url` and refresh the cache at `cache_path` with it.
#[instrument(level = "info", skip(client, cache_path), fields(cache = %cache_path.as_ref().display()))]
pub async fn fetch_csv(client: &Client, url: &str, cache_path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let mut attempt = 0;

    // retry loop
    let bytes = loop {
        attempt += 1;

        let resp = client.get(url).send().await;
        match resp {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(body) => break body.to_vec(),
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(attempt, error = %e, "reading body failed, retrying");
                    sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e).with_context(|| format!("reading body from {}", url)),
            },
            Ok(resp) => anyhow::bail!("bad response from {}: {}", url, resp.status()),
            Err(e) if attempt < MAX_RETRIES => {
                warn!(attempt, error = %e, "request failed, retrying");
                sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e).with_context(|| format!("GET {}", url)),
        }
    };

    let cache_path = cache_path.as_ref();
    if let Some(dir) = cache_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating cache directory {}", dir.display()))?;
    }
    fs::write(cache_path, &bytes)
        .await
        .with_context(|| format!("writing cached data file {}", cache_path.display()))?;
    info!(bytes = bytes.len(), attempts = attempt, "fetched and cached");
    Ok(bytes)
}

/// Read the previously cached CSV.
pub async fn read_cache(cache_path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let cache_path = cache_path.as_ref();
    let bytes = fs::read(cache_path)
        .await
        .with_context(|| format!("reading cached data file {}", cache_path.display()))?;
    info!(path = %cache_path.display(), bytes = bytes.len(), "loaded cache");
    Ok(bytes)
}

/// Fetch fresh data when `update` is set, otherwise use the cache.
pub async fn load_csv(
    client: &Client,
    update: bool,
    url: &str,
    cache_path: impl AsRef<Path>,
) -> Result<Vec<u8>> {
    if update {
        fetch_csv(client, url, cache_path).await
    } else {
        read_cache(cache_path).await
    }
}

/// Split CSV bytes into raw string rows, header included.
///
/// Field counts may vary between rows; short rows are rejected later by the record parser.
pub fn rows_from_csv(data: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
