use std::env;
use uuid::Uuid;

use fleet_backoffice_api::classify::{classify_leads, LeadCategory};
use fleet_backoffice_api::db::Database;
use fleet_backoffice_api::errors::AppError;
use fleet_backoffice_api::models::{Lead, NewLeadRequest, NewRiderRequest};
use fleet_backoffice_api::storage::{LeadStore, RiderStore};
use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Integration smoke test for lead and rider storage.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn lead_and_rider_lifecycle_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;

    // Unique mobile to avoid conflicts on repeated runs
    let mobile = format!("9{:09}", Uuid::new_v4().as_u128() % 1_000_000_000);

    let lead_store = LeadStore::new(db.pool.clone());
    let lead = lead_store
        .insert(&NewLeadRequest {
            rider_name: "Smoke Test Lead".to_string(),
            mobile_number: mobile.clone(),
            city: Some("Pune".to_string()),
            gps: None,
            license_type: None,
            ev_type: None,
            client_interest: None,
            current_ev: None,
            source: Some("smoke_test".to_string()),
            remarks: None,
            created_by: None,
            leader_id: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(lead.seq_no > 0);
    assert_eq!(lead.status, "new");

    let updated = lead_store
        .update_status(lead.id, "convert")
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(updated.status, "convert");

    let rider_store = RiderStore::new(db.pool.clone());
    let rider = rider_store
        .insert(&NewRiderRequest {
            rider_code: format!("SMOKE-{}", &mobile[3..]),
            name: "Smoke Test Rider".to_string(),
            mobile_number: mobile,
            chassis_number: None,
            client_name: None,
            leader_id: None,
            opening_balance: Some(BigDecimal::from_str("100.00")?),
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(rider.status, "active");

    let balance = rider_store
        .adjust_wallet(rider.id, &BigDecimal::from_str("-25.00")?)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(balance, BigDecimal::from_str("75.00")?);

    // An overdraft debit is rejected and leaves the balance untouched
    let overdraft = rider_store
        .adjust_wallet(rider.id, &BigDecimal::from_str("-500.00")?)
        .await;
    assert!(matches!(overdraft, Err(AppError::BadRequest(_))));
    let after = rider_store
        .find(rider.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("rider still present");
    assert_eq!(after.wallet_balance, BigDecimal::from_str("75.00")?);

    // Cleanup: physical removal of the smoke rows
    assert!(lead_store
        .hard_delete(lead.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);
    sqlx::query("DELETE FROM fleet.riders WHERE id = $1")
        .bind(rider.id)
        .execute(&db.pool)
        .await?;

    Ok(())
}

/// Soft-deleted leads stay visible in the deleted-inclusive admin view, so
/// that view must classify against a population that still counts them:
/// two copies of a number where one is soft-deleted are both duplicates
/// there, not one genuine survivor.
#[tokio::test]
#[ignore]
async fn deleted_leads_count_toward_admin_view_duplicates() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let lead_store = LeadStore::new(db.pool.clone());

    let mobile = format!("8{:09}", Uuid::new_v4().as_u128() % 1_000_000_000);
    let new_lead = |name: &str| NewLeadRequest {
        rider_name: name.to_string(),
        mobile_number: mobile.clone(),
        city: None,
        gps: None,
        license_type: None,
        ev_type: None,
        client_interest: None,
        current_ev: None,
        source: Some("smoke_test".to_string()),
        remarks: None,
        created_by: None,
        leader_id: None,
    };

    let first = lead_store
        .insert(&new_lead("Smoke Duplicate A"))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let second = lead_store
        .insert(&new_lead("Smoke Duplicate B"))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert!(lead_store
        .soft_delete(first.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);

    // Normal population drops the deleted copy, the admin one keeps it
    let visible = lead_store
        .all_mobiles(false)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let admin = lead_store
        .all_mobiles(true)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(visible.iter().filter(|m| **m == mobile).count(), 1);
    assert_eq!(admin.iter().filter(|m| **m == mobile).count(), 2);

    // Classified against the admin population, both copies are duplicates
    let working: Vec<Lead> = lead_store
        .list(None, None, true)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .into_iter()
        .filter(|l| l.mobile_number == mobile)
        .collect();
    assert_eq!(working.len(), 2);

    let classification = classify_leads(&working, &admin, &[]);
    assert_eq!(
        classification.category_of(&first.id),
        Some(LeadCategory::Duplicate)
    );
    assert_eq!(
        classification.category_of(&second.id),
        Some(LeadCategory::Duplicate)
    );

    // Cleanup
    for id in [first.id, second.id] {
        lead_store
            .hard_delete(id)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    Ok(())
}
