use crate::errors::{AppError, ResultExt};
use crate::models::{
    Lead, NewLeadRequest, NewRiderRequest, Notification, Rider, RiderStatus, RiderUpdateRequest,
};
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Store for lead rows.
///
/// Listings are scoped by an explicit `leader_id`: `Some` restricts to the
/// leads owned by that team leader, `None` is the admin view. Mobile-number
/// listings for classification are always global, regardless of scope.
pub struct LeadStore {
    pool: PgPool,
}

impl LeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new lead. The display sequence number comes from the
    /// database; the score is filled in after classification.
    pub async fn insert(&self, new: &NewLeadRequest) -> Result<Lead, AppError> {
        let gps = new.gps.as_ref();

        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO fleet.leads (
                id, rider_name, mobile_number, city,
                latitude, longitude, gps_accuracy_m, captured_at, geo_address,
                license_type, ev_type, client_interest, current_ev, source,
                remarks, status, created_by, leader_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, 'new', $16, $17, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.rider_name)
        .bind(&new.mobile_number)
        .bind(&new.city)
        .bind(gps.map(|g| g.latitude))
        .bind(gps.map(|g| g.longitude))
        .bind(gps.and_then(|g| g.accuracy_m))
        .bind(gps.and_then(|g| g.captured_at))
        .bind(gps.and_then(|g| g.address.clone()))
        .bind(&new.license_type)
        .bind(&new.ev_type)
        .bind(&new.client_interest)
        .bind(&new.current_ev)
        .bind(&new.source)
        .bind(&new.remarks)
        .bind(new.created_by)
        .bind(new.leader_id)
        .fetch_one(&self.pool)
        .await
        .context("inserting lead")?;

        Ok(lead)
    }

    /// Scoped listing. Soft-deleted rows are hidden unless requested.
    pub async fn list(
        &self,
        leader_id: Option<Uuid>,
        status: Option<&str>,
        include_deleted: bool,
    ) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM fleet.leads
            WHERE ($1::uuid IS NULL OR leader_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::bool OR deleted_at IS NULL)
            ORDER BY seq_no DESC
            "#,
        )
        .bind(leader_id)
        .bind(status)
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;

        Ok(leads)
    }

    /// Mobile numbers of every non-deleted lead, system-wide.
    ///
    /// Duplicate detection must see leads outside the current viewer's
    /// ownership scope, so this is never filtered by leader.
    /// Mobile numbers of the whole lead population, for frequency counting.
    ///
    /// Must cover the same rows as the listing it classifies: the admin
    /// deleted-inclusive view passes `true` so soft-deleted leads still
    /// count toward duplicate detection there.
    pub async fn all_mobiles(&self, include_deleted: bool) -> Result<Vec<String>, AppError> {
        let mobiles = sqlx::query_scalar::<_, String>(
            "SELECT mobile_number FROM fleet.leads WHERE ($1::bool OR deleted_at IS NULL)",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;

        Ok(mobiles)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM fleet.leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lead)
    }

    pub async fn update_status(&self, id: Uuid, status: &str) -> Result<Lead, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE fleet.leads
            SET status = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;

        Ok(lead)
    }

    pub async fn set_score(&self, id: Uuid, score: Option<i32>) -> Result<(), AppError> {
        sqlx::query("UPDATE fleet.leads SET score = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(score)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Flag the lead as deleted without removing the row.
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE fleet.leads SET deleted_at = now(), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Physically remove the row. Admin path only.
    pub async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM fleet.leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Store for rider rows and their wallets.
pub struct RiderStore {
    pool: PgPool,
}

impl RiderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: &NewRiderRequest) -> Result<Rider, AppError> {
        let opening = new
            .opening_balance
            .clone()
            .unwrap_or_else(|| BigDecimal::from(0));

        let rider = sqlx::query_as::<_, Rider>(
            r#"
            INSERT INTO fleet.riders (
                id, rider_code, name, mobile_number, chassis_number,
                client_name, wallet_balance, status, leader_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.rider_code)
        .bind(&new.name)
        .bind(&new.mobile_number)
        .bind(&new.chassis_number)
        .bind(&new.client_name)
        .bind(opening)
        .bind(new.leader_id)
        .fetch_one(&self.pool)
        .await
        .context("inserting rider")?;

        Ok(rider)
    }

    pub async fn list(
        &self,
        leader_id: Option<Uuid>,
        status: Option<&str>,
        include_deleted: bool,
    ) -> Result<Vec<Rider>, AppError> {
        let riders = sqlx::query_as::<_, Rider>(
            r#"
            SELECT * FROM fleet.riders
            WHERE ($1::uuid IS NULL OR leader_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::bool OR deleted_at IS NULL)
            ORDER BY rider_code ASC
            "#,
        )
        .bind(leader_id)
        .bind(status)
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;

        Ok(riders)
    }

    /// Mobile numbers of every non-deleted rider, system-wide.
    ///
    /// A lead's value depends on whether *any* rider already holds the
    /// number, not just riders owned by the current viewer.
    pub async fn all_mobiles(&self) -> Result<Vec<String>, AppError> {
        let mobiles = sqlx::query_scalar::<_, String>(
            "SELECT mobile_number FROM fleet.riders WHERE deleted_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(mobiles)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Rider>, AppError> {
        let rider = sqlx::query_as::<_, Rider>("SELECT * FROM fleet.riders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(rider)
    }

    /// Partial update; absent fields keep their current value.
    pub async fn update(&self, id: Uuid, req: &RiderUpdateRequest) -> Result<Rider, AppError> {
        let rider = sqlx::query_as::<_, Rider>(
            r#"
            UPDATE fleet.riders
            SET name = COALESCE($2, name),
                mobile_number = COALESCE($3, mobile_number),
                chassis_number = COALESCE($4, chassis_number),
                client_name = COALESCE($5, client_name),
                status = COALESCE($6, status),
                leader_id = COALESCE($7, leader_id),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.mobile_number)
        .bind(&req.chassis_number)
        .bind(&req.client_name)
        .bind(&req.status)
        .bind(req.leader_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rider {} not found", id)))?;

        Ok(rider)
    }

    /// Apply a signed wallet adjustment. Debits that would take the balance
    /// negative are rejected without touching the row.
    pub async fn adjust_wallet(
        &self,
        id: Uuid,
        amount: &BigDecimal,
    ) -> Result<BigDecimal, AppError> {
        let balance = sqlx::query_scalar::<_, BigDecimal>(
            r#"
            UPDATE fleet.riders
            SET wallet_balance = wallet_balance + $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL AND wallet_balance + $2 >= 0
            RETURNING wallet_balance
            "#,
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        match balance {
            Some(balance) => Ok(balance),
            None => {
                // Distinguish a missing rider from an overdraft
                if self.find(id).await?.filter(|r| r.deleted_at.is_none()).is_some() {
                    Err(AppError::BadRequest(
                        "Adjustment would take the wallet balance below zero".to_string(),
                    ))
                } else {
                    Err(AppError::NotFound(format!("Rider {} not found", id)))
                }
            }
        }
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE fleet.riders
             SET deleted_at = now(), status = $2, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(RiderStatus::Deleted.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Store for notification rows.
pub struct NotificationStore {
    pool: PgPool,
}

impl NotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        kind: &str,
        body: &str,
        recipient_id: Option<Uuid>,
        lead_id: Option<Uuid>,
    ) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO fleet.notifications (id, recipient_id, kind, body, lead_id, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipient_id)
        .bind(kind)
        .bind(body)
        .bind(lead_id)
        .fetch_one(&self.pool)
        .await
        .context("inserting notification")?;

        Ok(notification)
    }

    /// Listing for one recipient plus broadcasts; newest first.
    pub async fn list(
        &self,
        recipient_id: Option<Uuid>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM fleet.notifications
            WHERE ($1::uuid IS NULL OR recipient_id = $1 OR recipient_id IS NULL)
              AND (NOT $2::bool OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT 200
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE fleet.notifications SET read_at = now() WHERE id = $1 AND read_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
