use crate::classify::{LeadCategory, LeadSummary};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============ Database Models ============

/// A prospective rider captured by a sourcing agent, pending conversion.
///
/// The category (genuine/duplicate/match) is derived at read time by the
/// classification engine and is intentionally absent here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    /// Unique identifier.
    pub id: Uuid,
    /// Display sequence number, assigned by the database.
    pub seq_no: i64,
    /// Name of the prospective rider.
    pub rider_name: String,
    /// Mobile number exactly as captured (raw input, possibly formatted).
    pub mobile_number: String,
    /// City of capture.
    pub city: Option<String>,
    /// GPS latitude at capture time.
    pub latitude: Option<f64>,
    /// GPS longitude at capture time.
    pub longitude: Option<f64>,
    /// GPS accuracy in meters.
    pub gps_accuracy_m: Option<f64>,
    /// When the GPS fix was taken.
    pub captured_at: Option<DateTime<Utc>>,
    /// Reverse-geocoded address, when available.
    pub geo_address: Option<String>,
    /// Driving license type held by the lead.
    pub license_type: Option<String>,
    /// EV type the lead is interested in.
    pub ev_type: Option<String>,
    /// Client (platform) the lead wants to ride for.
    pub client_interest: Option<String>,
    /// EV the lead currently uses, if any.
    pub current_ev: Option<String>,
    /// Acquisition source (field visit, referral, campaign...).
    pub source: Option<String>,
    /// Free-text remarks from the sourcing agent.
    pub remarks: Option<String>,
    /// Lifecycle status: "new", "convert" or "not_convert".
    pub status: String,
    /// Derived quality score, recomputed on every write.
    pub score: Option<i32>,
    /// Identity of the creating sourcer/agent.
    pub created_by: Option<Uuid>,
    /// Team leader who owns this lead.
    pub leader_id: Option<Uuid>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete marker; non-null rows are hidden from normal listings.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// An onboarded, contracted vehicle operator.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Rider {
    /// Unique identifier.
    pub id: Uuid,
    /// Human-readable rider code (e.g. "RID-00042").
    pub rider_code: String,
    /// Rider name.
    pub name: String,
    /// Mobile number, the join key against leads.
    pub mobile_number: String,
    /// Chassis number of the assigned vehicle.
    pub chassis_number: Option<String>,
    /// Client (platform) the rider operates for.
    pub client_name: Option<String>,
    /// Wallet balance.
    pub wallet_balance: BigDecimal,
    /// Lifecycle status: "active", "inactive" or "deleted".
    pub status: String,
    /// Team leader the rider reports to.
    pub leader_id: Option<Uuid>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A back-office notification row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier.
    pub id: Uuid,
    /// Recipient (team leader or admin); NULL means broadcast.
    pub recipient_id: Option<Uuid>,
    /// Kind of event: "lead_created", "lead_converted", "wallet_adjusted".
    pub kind: String,
    /// Human-readable notification body.
    pub body: String,
    /// Related lead, when the event concerns one.
    pub lead_id: Option<Uuid>,
    /// When the recipient marked it read.
    pub read_at: Option<DateTime<Utc>>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

// ============ Lifecycle Statuses ============

/// Lead lifecycle status. Persisted as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    New,
    Convert,
    NotConvert,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Convert => "convert",
            LeadStatus::NotConvert => "not_convert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Some(LeadStatus::New),
            "convert" => Some(LeadStatus::Convert),
            "not_convert" | "notconvert" => Some(LeadStatus::NotConvert),
            _ => None,
        }
    }
}

/// Rider lifecycle status. Persisted as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiderStatus {
    Active,
    Inactive,
    Deleted,
}

impl RiderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiderStatus::Active => "active",
            RiderStatus::Inactive => "inactive",
            RiderStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Some(RiderStatus::Active),
            "inactive" => Some(RiderStatus::Inactive),
            "deleted" => Some(RiderStatus::Deleted),
            _ => None,
        }
    }
}

// ============ API Request Models ============

/// GPS capture submitted with a new lead.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpsCapture {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy in meters as reported by the device.
    pub accuracy_m: Option<f64>,
    /// When the fix was taken; defaults to the server clock.
    pub captured_at: Option<DateTime<Utc>>,
    /// Reverse-geocoded address, when the client resolved one.
    pub address: Option<String>,
}

/// Request payload for lead intake.
#[derive(Debug, Deserialize)]
pub struct NewLeadRequest {
    pub rider_name: String,
    pub mobile_number: String,
    pub city: Option<String>,
    pub gps: Option<GpsCapture>,
    pub license_type: Option<String>,
    pub ev_type: Option<String>,
    pub client_interest: Option<String>,
    pub current_ev: Option<String>,
    pub source: Option<String>,
    pub remarks: Option<String>,
    /// Creating sourcer/agent.
    pub created_by: Option<Uuid>,
    /// Owning team leader.
    pub leader_id: Option<Uuid>,
}

/// Request payload for a lead status change.
#[derive(Debug, Deserialize)]
pub struct LeadStatusRequest {
    /// One of "new", "convert", "not_convert".
    pub status: String,
}

/// Request payload for rider creation.
#[derive(Debug, Deserialize)]
pub struct NewRiderRequest {
    pub rider_code: String,
    pub name: String,
    pub mobile_number: String,
    pub chassis_number: Option<String>,
    pub client_name: Option<String>,
    pub leader_id: Option<Uuid>,
    /// Initial wallet balance; defaults to zero.
    pub opening_balance: Option<BigDecimal>,
}

/// Request payload for a rider edit. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct RiderUpdateRequest {
    pub name: Option<String>,
    pub mobile_number: Option<String>,
    pub chassis_number: Option<String>,
    pub client_name: Option<String>,
    /// One of "active", "inactive".
    pub status: Option<String>,
    pub leader_id: Option<Uuid>,
}

/// Request payload for a wallet adjustment. Negative amounts debit.
#[derive(Debug, Deserialize)]
pub struct WalletAdjustRequest {
    pub amount: BigDecimal,
    pub reason: Option<String>,
}

// ============ API Response Models ============

/// A lead together with its derived category.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedLead {
    #[serde(flatten)]
    pub lead: Lead,
    /// None when the mobile number normalizes to empty (excluded from
    /// classification).
    pub category: Option<LeadCategory>,
}

/// Response payload for lead intake.
#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub lead: Lead,
    pub category: Option<LeadCategory>,
    /// Intake-side validity of the mobile number (non-fatal).
    pub mobile_valid: bool,
}

/// Response payload for the scoped lead listing.
#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub leads: Vec<ClassifiedLead>,
    /// Counts over the full working set, before any category filter.
    pub summary: LeadSummary,
}

/// Response payload for a wallet adjustment.
#[derive(Debug, Serialize)]
pub struct WalletAdjustResponse {
    pub rider_id: Uuid,
    pub balance: BigDecimal,
}

/// Per-request report of a CSV import.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    /// Data rows seen in the file (header excluded).
    pub total_rows: usize,
    /// Rows written to the database.
    pub imported: usize,
    /// Rows stored despite failing intake-side mobile validation.
    pub flagged_invalid_mobile: usize,
    /// Rows rejected outright, with the reason.
    pub errors: Vec<ImportRowError>,
}

/// A rejected CSV row.
#[derive(Debug, Serialize)]
pub struct ImportRowError {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub error: String,
}

// ============ Query Parameters ============

/// Query parameters for the lead listing.
///
/// The viewer scope is explicit: `leader_id` set means a team-leader view
/// over owned leads, absent means the admin view over everything.
#[derive(Debug, Default, Deserialize)]
pub struct LeadQueryParams {
    pub leader_id: Option<Uuid>,
    /// Click-to-filter: "genuine", "duplicate" or "match".
    pub category: Option<String>,
    /// Filter by lifecycle status.
    pub status: Option<String>,
    /// Include soft-deleted rows (admin views only).
    pub include_deleted: Option<bool>,
}

/// Query parameters for the rider listing.
#[derive(Debug, Default, Deserialize)]
pub struct RiderQueryParams {
    pub leader_id: Option<Uuid>,
    pub status: Option<String>,
    pub include_deleted: Option<bool>,
}

/// Query parameters for the notification listing.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationQueryParams {
    pub recipient_id: Option<Uuid>,
    pub unread_only: Option<bool>,
}

/// Query parameters for the summary endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQueryParams {
    pub leader_id: Option<Uuid>,
}
