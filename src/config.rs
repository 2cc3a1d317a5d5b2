use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Token required on mutating back-office endpoints (X-Api-Token header).
    pub api_token: String,
    /// Token required on the hard-delete path (X-Admin-Token header).
    pub admin_token: String,
    /// Optional webhook that receives notification pushes.
    pub notify_webhook_url: Option<String>,
    /// Optional bearer token for the notification webhook.
    pub notify_webhook_token: Option<String>,
    /// Upper bound on rows accepted per CSV import request.
    pub import_max_rows: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_token: std::env::var("API_TOKEN")
                .map_err(|_| anyhow::anyhow!("API_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("API_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            admin_token: std::env::var("ADMIN_TOKEN")
                .map_err(|_| anyhow::anyhow!("ADMIN_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("ADMIN_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("NOTIFY_WEBHOOK_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
            notify_webhook_token: std::env::var("NOTIFY_WEBHOOK_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            import_max_rows: std::env::var("IMPORT_MAX_ROWS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("IMPORT_MAX_ROWS must be a positive number"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        if let Some(ref url) = config.notify_webhook_url {
            tracing::info!("Notification webhook configured: {}", url);
        } else {
            tracing::warn!("NOTIFY_WEBHOOK_URL not set; notifications are stored but not pushed");
        }
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Import row limit: {}", config.import_max_rows);

        Ok(config)
    }
}
