//! Script to recompute classification-derived scores for all stored leads.
//!
//! Run after bulk imports or after changing the scoring weights. Categories
//! are always derived at read time; only the score column is persisted.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

use fleet_backoffice_api::classify::{classify_leads, score_lead};
use fleet_backoffice_api::storage::{LeadStore, RiderStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Database connection
    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .expect("DB_URL or DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database. Rescoring all leads...");

    let lead_store = LeadStore::new(pool.clone());
    let rider_store = RiderStore::new(pool);

    let leads = lead_store.list(None, None, false).await?;
    let population = lead_store.all_mobiles(false).await?;
    let rider_mobiles = rider_store.all_mobiles().await?;

    let classification = classify_leads(&leads, &population, &rider_mobiles);
    tracing::info!(
        "Classified {} leads: {} genuine, {} duplicate, {} matched",
        leads.len(),
        classification.summary.genuine,
        classification.summary.duplicate,
        classification.summary.matched
    );

    let mut updated = 0u64;
    for lead in &leads {
        let score = classification
            .category_of(&lead.id)
            .map(|category| score_lead(lead, category));
        if score != lead.score {
            lead_store.set_score(lead.id, score).await?;
            updated += 1;
        }
    }

    tracing::info!("Rescore complete. {} leads updated.", updated);

    Ok(())
}
