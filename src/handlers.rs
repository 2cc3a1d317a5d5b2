use crate::classify::{classify_leads, score_lead, validate_in_mobile, Classification, LeadCategory, LeadSummary};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::notifier::{spawn_notification_job, NotifyClient};
use crate::storage::{LeadStore, NotificationStore, RiderStore};
use crate::summary_cache::SealedEntry;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bigdecimal::BigDecimal;
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Client pushing notifications to the external webhook (optional).
    pub notify_client: Option<NotifyClient>,
    /// Dashboard summary cache. Key: "summary:all" or "summary:{leader_id}",
    /// value: checksummed JSON (see `summary_cache`). Invalidated whole on
    /// any lead or rider mutation; classification is recomputed from scratch
    /// rather than updated incrementally.
    pub summary_cache: Cache<String, String>,
}

/// Require a valid X-Api-Token header on mutating endpoints.
pub fn require_api_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    check_token(headers, "X-Api-Token", &state.config.api_token)
}

/// Require a valid X-Admin-Token header on the hard-delete path.
pub fn require_admin_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    check_token(headers, "X-Admin-Token", &state.config.admin_token)
}

fn check_token(headers: &HeaderMap, header_name: &str, expected: &str) -> Result<(), AppError> {
    let token = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", header_name)))?;

    // Constant-time comparison to prevent timing attacks
    if !constant_time_compare(token, expected) {
        tracing::warn!("Invalid {} received", header_name);
        return Err(AppError::Unauthorized(format!("Invalid {}", header_name)));
    }

    Ok(())
}

/// Constant-time string comparison (basic implementation)
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "fleet-backoffice-api",
            "version": "0.1.0"
        })),
    )
}

/// Run one classification pass for a working set against the global
/// populations.
///
/// Lead frequency and rider match sets are always built system-wide: a lead
/// already captured by another sourcer is still a duplicate for the current
/// viewer, and a number held by any rider is a match regardless of who owns
/// the rider. `include_deleted` must mirror the listing being classified so
/// soft-deleted leads in the admin view count toward duplicate detection.
async fn classify_scope(
    state: &AppState,
    working: &[Lead],
    include_deleted: bool,
) -> Result<Classification, AppError> {
    let population = LeadStore::new(state.db.clone())
        .all_mobiles(include_deleted)
        .await?;
    let rider_mobiles = RiderStore::new(state.db.clone()).all_mobiles().await?;
    Ok(classify_leads(working, &population, &rider_mobiles))
}

// ============ Lead Handlers ============

/// POST /api/v1/leads
///
/// Lead intake: stores the lead, classifies it against the current
/// populations, derives its score, and notifies the owning team leader in
/// the background.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewLeadRequest>,
) -> Result<(StatusCode, Json<LeadResponse>), AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("POST /leads - rider_name: {}", payload.rider_name);

    if payload.rider_name.trim().is_empty() {
        return Err(AppError::BadRequest("rider_name must not be empty".to_string()));
    }

    // Intake-side validation is advisory; an invalid number never blocks
    // intake or classification
    let mobile_valid = if payload.mobile_number.trim().is_empty() {
        false
    } else {
        let (valid, _) = validate_in_mobile(&payload.mobile_number);
        valid
    };

    let store = LeadStore::new(state.db.clone());
    let mut lead = store.insert(&payload).await?;

    let classification = classify_scope(&state, std::slice::from_ref(&lead), false).await?;
    let category = classification.category_of(&lead.id);

    let score = category.map(|c| score_lead(&lead, c));
    store.set_score(lead.id, score).await?;
    lead.score = score;

    state.summary_cache.invalidate_all();

    let category_label = category.map(|c| c.as_str()).unwrap_or("unclassified");
    spawn_notification_job(
        state.db.clone(),
        state.notify_client.clone(),
        "lead_created",
        format!(
            "New lead #{} {} captured ({})",
            lead.seq_no, lead.rider_name, category_label
        ),
        lead.leader_id,
        Some(lead.id),
    );

    tracing::info!(
        "Lead #{} stored: category={}, score={:?}",
        lead.seq_no,
        category_label,
        score
    );

    Ok((
        StatusCode::CREATED,
        Json(LeadResponse {
            lead,
            category,
            mobile_valid,
        }),
    ))
}

/// GET /api/v1/leads
///
/// Scoped lead listing with derived categories and aggregate counts. The
/// summary always covers the full working set; `?category=` then filters
/// the visible rows (click-to-filter).
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQueryParams>,
) -> Result<Json<LeadListResponse>, AppError> {
    tracing::info!("GET /leads - params: {:?}", params);

    let category_filter = match params.category.as_deref() {
        None => None,
        Some(raw) => Some(LeadCategory::from_param(raw).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Unknown category '{}': expected genuine, duplicate or match",
                raw
            ))
        })?),
    };

    if let Some(status) = params.status.as_deref() {
        if LeadStatus::parse(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status '{}'", status)));
        }
    }

    // Soft-deleted rows are an admin-only view
    let include_deleted = params.include_deleted.unwrap_or(false) && params.leader_id.is_none();

    let store = LeadStore::new(state.db.clone());
    let working = store
        .list(params.leader_id, params.status.as_deref(), include_deleted)
        .await?;

    // Population mirrors the listing: the deleted-inclusive view classifies
    // against deleted-inclusive frequencies
    let classification = classify_scope(&state, &working, include_deleted).await?;
    let summary = classification.summary;

    let leads: Vec<ClassifiedLead> = working
        .into_iter()
        .filter_map(|lead| {
            let category = classification.category_of(&lead.id);
            match category_filter {
                Some(filter) if category != Some(filter) => None,
                _ => Some(ClassifiedLead { lead, category }),
            }
        })
        .collect();

    Ok(Json(LeadListResponse { leads, summary }))
}

/// GET /api/v1/leads/summary
///
/// The three aggregate counts for the dashboard badges. Cached per scope;
/// every lead/rider mutation invalidates the cache, so a hit is at most one
/// mutation old.
pub async fn lead_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryQueryParams>,
) -> Result<Json<LeadSummary>, AppError> {
    let cache_key = match params.leader_id {
        Some(id) => format!("summary:{}", id),
        None => "summary:all".to_string(),
    };

    if let Some(sealed) = state.summary_cache.get(&cache_key).await {
        if let Some(summary) = SealedEntry::open::<LeadSummary>(&sealed) {
            tracing::debug!("Summary cache HIT for {}", cache_key);
            return Ok(Json(summary));
        }
        tracing::warn!("Summary cache entry invalid for {}, recomputing", cache_key);
    }

    let store = LeadStore::new(state.db.clone());
    let working = store.list(params.leader_id, None, false).await?;
    let classification = classify_scope(&state, &working, false).await?;
    let summary = classification.summary;

    if let Some(sealed) = SealedEntry::seal(&summary) {
        state.summary_cache.insert(cache_key, sealed).await;
    }

    Ok(Json(summary))
}

/// PATCH /api/v1/leads/:id/status
pub async fn update_lead_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<LeadStatusRequest>,
) -> Result<Json<Lead>, AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("PATCH /leads/{}/status -> {}", id, payload.status);

    let status = LeadStatus::parse(&payload.status).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Unknown status '{}': expected new, convert or not_convert",
            payload.status
        ))
    })?;

    let store = LeadStore::new(state.db.clone());
    let lead = store.update_status(id, status.as_str()).await?;

    state.summary_cache.invalidate_all();

    if status == LeadStatus::Convert {
        spawn_notification_job(
            state.db.clone(),
            state.notify_client.clone(),
            "lead_converted",
            format!("Lead #{} {} converted", lead.seq_no, lead.rider_name),
            lead.leader_id,
            Some(lead.id),
        );
    }

    Ok(Json(lead))
}

/// DELETE /api/v1/leads/:id
///
/// Soft delete: the row is flagged, not removed, and disappears from normal
/// listings and from classification populations.
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("DELETE /leads/{}", id);

    let store = LeadStore::new(state.db.clone());
    if !store.soft_delete(id).await? {
        return Err(AppError::NotFound(format!("Lead {} not found", id)));
    }

    state.summary_cache.invalidate_all();

    Ok(Json(json!({ "deleted": true, "mode": "soft", "id": id })))
}

/// DELETE /api/v1/leads/:id/hard
///
/// Physical removal; requires the admin token.
pub async fn hard_delete_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin_token(&state, &headers)?;
    tracing::warn!("DELETE /leads/{}/hard (admin)", id);

    let store = LeadStore::new(state.db.clone());
    if !store.hard_delete(id).await? {
        return Err(AppError::NotFound(format!("Lead {} not found", id)));
    }

    state.summary_cache.invalidate_all();

    Ok(Json(json!({ "deleted": true, "mode": "hard", "id": id })))
}

// ============ Rider Handlers ============

/// POST /api/v1/riders
pub async fn create_rider(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewRiderRequest>,
) -> Result<(StatusCode, Json<Rider>), AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("POST /riders - rider_code: {}", payload.rider_code);

    if payload.rider_code.trim().is_empty() || payload.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "rider_code and name must not be empty".to_string(),
        ));
    }
    if payload.mobile_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "mobile_number must not be empty".to_string(),
        ));
    }
    if let Some(ref balance) = payload.opening_balance {
        if balance < &BigDecimal::from(0) {
            return Err(AppError::BadRequest(
                "opening_balance must not be negative".to_string(),
            ));
        }
    }

    let (valid, _) = validate_in_mobile(&payload.mobile_number);
    if !valid {
        tracing::warn!(
            "Rider {} created with unvalidated mobile: {}",
            payload.rider_code,
            payload.mobile_number
        );
    }

    let store = RiderStore::new(state.db.clone());
    let rider = store.insert(&payload).await?;

    // A new rider number changes match detection everywhere
    state.summary_cache.invalidate_all();

    Ok((StatusCode::CREATED, Json(rider)))
}

/// GET /api/v1/riders
pub async fn list_riders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RiderQueryParams>,
) -> Result<Json<Vec<Rider>>, AppError> {
    tracing::info!("GET /riders - params: {:?}", params);

    if let Some(status) = params.status.as_deref() {
        if RiderStatus::parse(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status '{}'", status)));
        }
    }

    let include_deleted = params.include_deleted.unwrap_or(false) && params.leader_id.is_none();

    let store = RiderStore::new(state.db.clone());
    let riders = store
        .list(params.leader_id, params.status.as_deref(), include_deleted)
        .await?;

    Ok(Json(riders))
}

/// GET /api/v1/riders/:id
pub async fn get_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Rider>, AppError> {
    let store = RiderStore::new(state.db.clone());
    let rider = store
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rider {} not found", id)))?;

    Ok(Json(rider))
}

/// PATCH /api/v1/riders/:id
pub async fn update_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<RiderUpdateRequest>,
) -> Result<Json<Rider>, AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("PATCH /riders/{}", id);

    if let Some(status) = payload.status.as_deref() {
        match RiderStatus::parse(status) {
            Some(RiderStatus::Deleted) => {
                return Err(AppError::BadRequest(
                    "Use the delete endpoint to remove a rider".to_string(),
                ));
            }
            Some(_) => {}
            None => {
                return Err(AppError::BadRequest(format!("Unknown status '{}'", status)));
            }
        }
    }

    let store = RiderStore::new(state.db.clone());
    let rider = store.update(id, &payload).await?;

    // Mobile edits shift the match set
    if payload.mobile_number.is_some() {
        state.summary_cache.invalidate_all();
    }

    Ok(Json(rider))
}

/// POST /api/v1/riders/:id/wallet
///
/// Signed wallet adjustment; negative amounts debit. Overdrafts are
/// rejected.
pub async fn adjust_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<WalletAdjustRequest>,
) -> Result<Json<WalletAdjustResponse>, AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("POST /riders/{}/wallet - amount: {}", id, payload.amount);

    if payload.amount == BigDecimal::from(0) {
        return Err(AppError::BadRequest("amount must not be zero".to_string()));
    }

    let store = RiderStore::new(state.db.clone());
    let balance = store.adjust_wallet(id, &payload.amount).await?;

    let rider = store.find(id).await?;
    let leader_id = rider.as_ref().and_then(|r| r.leader_id);
    let rider_code = rider
        .map(|r| r.rider_code)
        .unwrap_or_else(|| id.to_string());

    spawn_notification_job(
        state.db.clone(),
        state.notify_client.clone(),
        "wallet_adjusted",
        format!(
            "Wallet of rider {} adjusted by {} ({}); balance now {}",
            rider_code,
            payload.amount,
            payload.reason.as_deref().unwrap_or("no reason given"),
            balance
        ),
        leader_id,
        None,
    );

    Ok(Json(WalletAdjustResponse {
        rider_id: id,
        balance,
    }))
}

/// DELETE /api/v1/riders/:id
pub async fn delete_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("DELETE /riders/{}", id);

    let store = RiderStore::new(state.db.clone());
    if !store.soft_delete(id).await? {
        return Err(AppError::NotFound(format!("Rider {} not found", id)));
    }

    // A removed rider number can turn former matches into duplicates
    state.summary_cache.invalidate_all();

    Ok(Json(json!({ "deleted": true, "mode": "soft", "id": id })))
}

// ============ Notification Handlers ============

/// GET /api/v1/notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NotificationQueryParams>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let store = NotificationStore::new(state.db.clone());
    let notifications = store
        .list(params.recipient_id, params.unread_only.unwrap_or(false))
        .await?;

    Ok(Json(notifications))
}

/// POST /api/v1/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_api_token(&state, &headers)?;

    let store = NotificationStore::new(state.db.clone());
    if !store.mark_read(id).await? {
        return Err(AppError::NotFound(format!(
            "Notification {} not found or already read",
            id
        )));
    }

    Ok(Json(json!({ "read": true, "id": id })))
}
