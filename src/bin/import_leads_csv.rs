//! Script to bulk-import leads from a CSV file on disk.
//!
//! Usage: import_leads_csv <path.csv> [leader_id]
//!
//! Rows with an invalid Indian mobile are still imported and flagged in the
//! report, matching the HTTP import endpoint. Scores are left unset; run
//! `rescore_leads` afterwards.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;
use uuid::Uuid;

use fleet_backoffice_api::import::parse_leads_csv;
use fleet_backoffice_api::storage::LeadStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let path = args.next().ok_or("usage: import_leads_csv <path.csv> [leader_id]")?;
    let leader_id: Option<Uuid> = match args.next() {
        Some(raw) => Some(raw.parse()?),
        None => None,
    };

    // Database connection
    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .expect("DB_URL or DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let data = tokio::fs::read(&path).await?;
    tracing::info!("Read {} bytes from {}", data.len(), path);

    // No row cap for the offline path
    let parsed = parse_leads_csv(&data, usize::MAX)?;
    tracing::info!(
        "Parsed {} rows: {} importable, {} rejected, {} flagged invalid mobile",
        parsed.total_rows,
        parsed.rows.len(),
        parsed.errors.len(),
        parsed.flagged_invalid_mobile
    );
    for err in &parsed.errors {
        tracing::warn!("Row {}: {}", err.row, err.error);
    }

    let store = LeadStore::new(pool);
    let mut imported = 0u64;
    for mut row in parsed.rows {
        if row.leader_id.is_none() {
            row.leader_id = leader_id;
        }
        let lead = store.insert(&row).await?;
        tracing::debug!("Imported lead #{} {}", lead.seq_no, lead.rider_name);
        imported += 1;
    }

    tracing::info!("Import complete. {} leads imported.", imported);

    Ok(())
}
