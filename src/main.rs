use anyhow::{Context, Result};
use clap::Parser;
use covidsheet::{
    catalog::Catalog,
    config::Args,
    fetch,
    pivot::build_pivots,
    publish::{describe, publish_regions, select_regions},
    sheets::{load_client_secret, Authenticator, SheetsClient},
};
use reqwest::Client;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    let args = Args::parse();
    let start = Instant::now();
    let client = Client::new();

    // ─── 2) load raw rows ────────────────────────────────────────────
    let data = fetch::load_csv(&client, args.update, &args.data_url, &args.cache_file).await?;
    let rows = fetch::rows_from_csv(&data)?;
    info!(rows = rows.len(), "read source rows");

    // ─── 3) build the catalog ────────────────────────────────────────
    let catalog = Catalog::from_rows(&rows).context("while building catalog")?;
    let regions = select_regions(&catalog, &args.regions);

    if args.dry_run {
        describe(&build_pivots(&catalog, &regions));
        info!(elapsed = ?start.elapsed(), "dry run done");
        return Ok(());
    }

    // ─── 4) authenticate ─────────────────────────────────────────────
    let spreadsheet_id = args
        .spreadsheet_id
        .clone()
        .context("no spreadsheet id; set COVID_GOOGLESHEET or pass --spreadsheet-id")?;
    let secret = load_client_secret(&args.credentials).await?;
    let auth = Authenticator::new(secret, &args.token_file).await?;
    let sheets = SheetsClient::new(client, auth, &spreadsheet_id)?;

    // ─── 5) publish one sheet per region ─────────────────────────────
    let summary = publish_regions(&catalog, &sheets, &regions)
        .await
        .with_context(|| format!("while writing to google sheet (id:{})", spreadsheet_id))?;

    info!(
        regions = summary.regions,
        rows = summary.rows,
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}
