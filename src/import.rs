/// CSV import/export for leads and riders
///
/// Bulk exchange with the field teams happens over plain CSV. Imports are
/// forgiving at row level: a bad row is reported and skipped, an invalid
/// mobile number is flagged but stored, and only an unreadable file or a
/// malformed header rejects the whole request.
use crate::classify::{classify_leads, score_lead, validate_in_mobile};
use crate::errors::AppError;
use crate::handlers::{require_api_token, AppState};
use crate::models::{
    ImportReport, ImportRowError, Lead, LeadQueryParams, NewLeadRequest, NewRiderRequest,
    Rider, RiderQueryParams,
};
use crate::storage::{LeadStore, RiderStore};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// One data row of a lead import file.
#[derive(Debug, Deserialize)]
struct LeadCsvRow {
    rider_name: String,
    mobile_number: String,
    city: Option<String>,
    license_type: Option<String>,
    ev_type: Option<String>,
    client_interest: Option<String>,
    current_ev: Option<String>,
    source: Option<String>,
    remarks: Option<String>,
    leader_id: Option<String>,
}

/// One data row of a rider import file.
#[derive(Debug, Deserialize)]
struct RiderCsvRow {
    rider_code: String,
    name: String,
    mobile_number: String,
    chassis_number: Option<String>,
    client_name: Option<String>,
    opening_balance: Option<String>,
    leader_id: Option<String>,
}

/// Result of parsing an import file, before anything touches the database.
#[derive(Debug)]
pub struct ParsedImport<T> {
    pub rows: Vec<T>,
    pub errors: Vec<ImportRowError>,
    pub total_rows: usize,
    pub flagged_invalid_mobile: usize,
}

impl<T> Default for ParsedImport<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            errors: Vec::new(),
            total_rows: 0,
            flagged_invalid_mobile: 0,
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_leader_id(raw: Option<String>, row: usize) -> Result<Option<Uuid>, ImportRowError> {
    match blank_to_none(raw) {
        None => Ok(None),
        Some(s) => Uuid::parse_str(&s).map(Some).map_err(|_| ImportRowError {
            row,
            error: format!("leader_id is not a valid UUID: {}", s),
        }),
    }
}

/// Validate header cells: letters, marks, spaces, hyphen, underscore.
///
/// Catches binary uploads and spreadsheets exported with formula headers
/// before row parsing starts.
fn validate_header(headers: &csv::StringRecord) -> Result<(), AppError> {
    let header_re = Regex::new(r"^[\p{L}\p{M}\s\-_]+$")
        .map_err(|e| AppError::InternalError(format!("Header regex error: {}", e)))?;

    for cell in headers.iter() {
        let cell = cell.trim();
        if cell.is_empty() {
            return Err(AppError::ImportRejected(
                "CSV header cells must not be empty".to_string(),
            ));
        }
        if !header_re.is_match(cell) {
            return Err(AppError::ImportRejected(format!(
                "CSV header cell contains invalid characters: {}",
                cell
            )));
        }
    }
    Ok(())
}

/// Parse a lead import file. Pure: no database access.
pub fn parse_leads_csv(data: &[u8], max_rows: usize) -> Result<ParsedImport<NewLeadRequest>, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| AppError::ImportRejected(format!("Unreadable CSV header: {}", e)))?
        .clone();
    validate_header(&headers)?;

    let mut parsed = ParsedImport::default();

    for (idx, record) in reader.deserialize::<LeadCsvRow>().enumerate() {
        let row_no = idx + 1;
        parsed.total_rows += 1;

        if parsed.total_rows > max_rows {
            return Err(AppError::ImportRejected(format!(
                "Import exceeds the {} row limit",
                max_rows
            )));
        }

        let row = match record {
            Ok(row) => row,
            Err(e) => {
                parsed.errors.push(ImportRowError {
                    row: row_no,
                    error: format!("Malformed row: {}", e),
                });
                continue;
            }
        };

        if row.rider_name.trim().is_empty() {
            parsed.errors.push(ImportRowError {
                row: row_no,
                error: "rider_name must not be empty".to_string(),
            });
            continue;
        }

        let leader_id = match parse_leader_id(row.leader_id, row_no) {
            Ok(id) => id,
            Err(e) => {
                parsed.errors.push(e);
                continue;
            }
        };

        // Non-fatal: an invalid mobile is flagged, the row still imports and
        // classification stays permissive about it.
        let mobile = row.mobile_number.trim().to_string();
        if !mobile.is_empty() {
            let (valid, _) = validate_in_mobile(&mobile);
            if !valid {
                parsed.flagged_invalid_mobile += 1;
            }
        }

        parsed.rows.push(NewLeadRequest {
            rider_name: row.rider_name.trim().to_string(),
            mobile_number: mobile,
            city: blank_to_none(row.city),
            gps: None,
            license_type: blank_to_none(row.license_type),
            ev_type: blank_to_none(row.ev_type),
            client_interest: blank_to_none(row.client_interest),
            current_ev: blank_to_none(row.current_ev),
            source: blank_to_none(row.source),
            remarks: blank_to_none(row.remarks),
            created_by: None,
            leader_id,
        });
    }

    Ok(parsed)
}

/// Parse a rider import file. Pure: no database access.
pub fn parse_riders_csv(
    data: &[u8],
    max_rows: usize,
) -> Result<ParsedImport<NewRiderRequest>, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| AppError::ImportRejected(format!("Unreadable CSV header: {}", e)))?
        .clone();
    validate_header(&headers)?;

    let mut parsed = ParsedImport::default();

    for (idx, record) in reader.deserialize::<RiderCsvRow>().enumerate() {
        let row_no = idx + 1;
        parsed.total_rows += 1;

        if parsed.total_rows > max_rows {
            return Err(AppError::ImportRejected(format!(
                "Import exceeds the {} row limit",
                max_rows
            )));
        }

        let row = match record {
            Ok(row) => row,
            Err(e) => {
                parsed.errors.push(ImportRowError {
                    row: row_no,
                    error: format!("Malformed row: {}", e),
                });
                continue;
            }
        };

        if row.rider_code.trim().is_empty() || row.name.trim().is_empty() {
            parsed.errors.push(ImportRowError {
                row: row_no,
                error: "rider_code and name must not be empty".to_string(),
            });
            continue;
        }

        let mobile = row.mobile_number.trim().to_string();
        if mobile.is_empty() {
            parsed.errors.push(ImportRowError {
                row: row_no,
                error: "mobile_number must not be empty".to_string(),
            });
            continue;
        }
        let (valid, _) = validate_in_mobile(&mobile);
        if !valid {
            parsed.flagged_invalid_mobile += 1;
        }

        let leader_id = match parse_leader_id(row.leader_id, row_no) {
            Ok(id) => id,
            Err(e) => {
                parsed.errors.push(e);
                continue;
            }
        };

        let opening_balance = match blank_to_none(row.opening_balance) {
            None => None,
            Some(s) => match BigDecimal::from_str(&s) {
                Ok(b) => Some(b),
                Err(_) => {
                    parsed.errors.push(ImportRowError {
                        row: row_no,
                        error: format!("opening_balance is not a number: {}", s),
                    });
                    continue;
                }
            },
        };

        parsed.rows.push(NewRiderRequest {
            rider_code: row.rider_code.trim().to_string(),
            name: row.name.trim().to_string(),
            mobile_number: mobile,
            chassis_number: blank_to_none(row.chassis_number),
            client_name: blank_to_none(row.client_name),
            leader_id,
            opening_balance,
        });
    }

    Ok(parsed)
}

/// Render the scoped lead listing, categories included, as CSV.
pub fn leads_to_csv(leads: &[Lead], categories: &crate::classify::Classification) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "seq_no",
            "rider_name",
            "mobile_number",
            "city",
            "status",
            "category",
            "score",
            "license_type",
            "ev_type",
            "client_interest",
            "current_ev",
            "source",
            "remarks",
            "created_at",
        ])
        .map_err(|e| AppError::InternalError(format!("CSV write error: {}", e)))?;

    for lead in leads {
        let category = categories
            .category_of(&lead.id)
            .map(|c| c.as_str())
            .unwrap_or("");
        writer
            .write_record([
                lead.seq_no.to_string().as_str(),
                lead.rider_name.as_str(),
                lead.mobile_number.as_str(),
                lead.city.as_deref().unwrap_or(""),
                lead.status.as_str(),
                category,
                lead.score.map(|s| s.to_string()).unwrap_or_default().as_str(),
                lead.license_type.as_deref().unwrap_or(""),
                lead.ev_type.as_deref().unwrap_or(""),
                lead.client_interest.as_deref().unwrap_or(""),
                lead.current_ev.as_deref().unwrap_or(""),
                lead.source.as_deref().unwrap_or(""),
                lead.remarks.as_deref().unwrap_or(""),
                lead.created_at.to_rfc3339().as_str(),
            ])
            .map_err(|e| AppError::InternalError(format!("CSV write error: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV flush error: {}", e)))
}

/// Render the scoped rider listing as CSV.
pub fn riders_to_csv(riders: &[Rider]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "rider_code",
            "name",
            "mobile_number",
            "chassis_number",
            "client_name",
            "wallet_balance",
            "status",
            "created_at",
        ])
        .map_err(|e| AppError::InternalError(format!("CSV write error: {}", e)))?;

    for rider in riders {
        writer
            .write_record([
                rider.rider_code.as_str(),
                rider.name.as_str(),
                rider.mobile_number.as_str(),
                rider.chassis_number.as_deref().unwrap_or(""),
                rider.client_name.as_deref().unwrap_or(""),
                rider.wallet_balance.to_string().as_str(),
                rider.status.as_str(),
                rider.created_at.to_rfc3339().as_str(),
            ])
            .map_err(|e| AppError::InternalError(format!("CSV write error: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV flush error: {}", e)))
}

/// POST /api/v1/leads/import
///
/// Accepts a CSV body, imports row by row, then scores the imported leads
/// against the current populations. Returns the per-row report.
pub async fn import_leads(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportReport>, AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("POST /leads/import - {} bytes", body.len());

    let parsed = parse_leads_csv(&body, state.config.import_max_rows)?;
    let store = LeadStore::new(state.db.clone());

    let mut report = ImportReport {
        total_rows: parsed.total_rows,
        imported: 0,
        flagged_invalid_mobile: parsed.flagged_invalid_mobile,
        errors: parsed.errors,
    };

    let mut inserted: Vec<Lead> = Vec::with_capacity(parsed.rows.len());
    for row in &parsed.rows {
        match store.insert(row).await {
            Ok(lead) => {
                report.imported += 1;
                inserted.push(lead);
            }
            Err(e) => {
                tracing::error!("Failed to import lead row: {}", e);
                report.errors.push(ImportRowError {
                    row: 0,
                    error: format!("Database error for '{}': {}", row.rider_name, e),
                });
            }
        }
    }

    // Score the freshly imported leads in one classification pass
    if !inserted.is_empty() {
        let population = store.all_mobiles(false).await?;
        let rider_mobiles = RiderStore::new(state.db.clone()).all_mobiles().await?;
        let classification = classify_leads(&inserted, &population, &rider_mobiles);

        for lead in &inserted {
            let score = classification
                .category_of(&lead.id)
                .map(|category| score_lead(lead, category));
            store.set_score(lead.id, score).await?;
        }

        state.summary_cache.invalidate_all();
    }

    tracing::info!(
        "Lead import complete: {} rows, {} imported, {} errors, {} flagged",
        report.total_rows,
        report.imported,
        report.errors.len(),
        report.flagged_invalid_mobile
    );

    Ok(Json(report))
}

/// GET /api/v1/leads/export
///
/// Streams the scoped lead listing as a CSV attachment, derived categories
/// included.
pub async fn export_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQueryParams>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("GET /leads/export - leader_id: {:?}", params.leader_id);

    let store = LeadStore::new(state.db.clone());
    let leads = store
        .list(params.leader_id, params.status.as_deref(), false)
        .await?;

    let population = store.all_mobiles(false).await?;
    let rider_mobiles = RiderStore::new(state.db.clone()).all_mobiles().await?;
    let classification = classify_leads(&leads, &population, &rider_mobiles);

    let csv_bytes = leads_to_csv(&leads, &classification)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"leads.csv\"".to_string(),
            ),
        ],
        csv_bytes,
    ))
}

/// POST /api/v1/riders/import
pub async fn import_riders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportReport>, AppError> {
    require_api_token(&state, &headers)?;
    tracing::info!("POST /riders/import - {} bytes", body.len());

    let parsed = parse_riders_csv(&body, state.config.import_max_rows)?;
    let store = RiderStore::new(state.db.clone());

    let mut report = ImportReport {
        total_rows: parsed.total_rows,
        imported: 0,
        flagged_invalid_mobile: parsed.flagged_invalid_mobile,
        errors: parsed.errors,
    };

    for row in &parsed.rows {
        match store.insert(row).await {
            Ok(_) => report.imported += 1,
            Err(e) => {
                tracing::error!("Failed to import rider row: {}", e);
                report.errors.push(ImportRowError {
                    row: 0,
                    error: format!("Database error for '{}': {}", row.rider_code, e),
                });
            }
        }
    }

    // New riders change match detection for every lead view
    if report.imported > 0 {
        state.summary_cache.invalidate_all();
    }

    tracing::info!(
        "Rider import complete: {} rows, {} imported, {} errors",
        report.total_rows,
        report.imported,
        report.errors.len()
    );

    Ok(Json(report))
}

/// GET /api/v1/riders/export
pub async fn export_riders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RiderQueryParams>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("GET /riders/export - leader_id: {:?}", params.leader_id);

    let store = RiderStore::new(state.db.clone());
    let riders = store
        .list(params.leader_id, params.status.as_deref(), false)
        .await?;

    let csv_bytes = riders_to_csv(&riders)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"riders.csv\"".to_string(),
            ),
        ],
        csv_bytes,
    ))
}
