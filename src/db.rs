use sqlx::{postgres::PgPoolOptions, Executor, PgPool};

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    // All application tables live in the fleet schema
                    conn.execute("SET search_path = fleet, public").await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        // Fail fast when the fleet schema has not been provisioned
        let schema_present: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = 'fleet')",
        )
        .fetch_one(&pool)
        .await?;
        if !schema_present {
            anyhow::bail!(
                "Database is missing the fleet schema; run the provisioning SQL before starting"
            );
        }

        Ok(Self { pool })
    }
}
