/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs to the classification
/// engine
use chrono::Utc;
use fleet_backoffice_api::classify::{
    classify_leads, normalize_mobile, score_lead, validate_in_mobile, LeadCategory, MAX_SCORE,
};
use fleet_backoffice_api::models::Lead;
use proptest::prelude::*;
use uuid::Uuid;

fn lead_with_mobile(mobile: &str) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        seq_no: 0,
        rider_name: "prop".to_string(),
        mobile_number: mobile.to_string(),
        city: None,
        latitude: None,
        longitude: None,
        gps_accuracy_m: None,
        captured_at: None,
        geo_address: None,
        license_type: None,
        ev_type: None,
        client_interest: None,
        current_ev: None,
        source: None,
        remarks: None,
        status: "new".to_string(),
        score: None,
        created_by: None,
        leader_id: None,
        created_at: Utc::now(),
        updated_at: None,
        deleted_at: None,
    }
}

// Property: normalization should never panic and always yields a clean key
proptest! {
    #[test]
    fn normalize_never_panics(raw in "\\PC*") {
        let _ = normalize_mobile(&raw);
    }

    #[test]
    fn normalized_key_is_at_most_ten_ascii_digits(raw in "\\PC*") {
        let key = normalize_mobile(&raw);
        prop_assert!(key.len() <= 10);
        prop_assert!(key.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn normalization_is_idempotent(raw in "\\PC*") {
        let once = normalize_mobile(&raw);
        prop_assert_eq!(normalize_mobile(&once), once);
    }

    #[test]
    fn country_code_prefix_never_changes_the_key(number in 6000000000u64..=9999999999u64) {
        let bare = number.to_string();
        let prefixed = format!("+91{}", bare);
        prop_assert_eq!(normalize_mobile(&bare), normalize_mobile(&prefixed));
    }

    #[test]
    fn validation_never_panics(raw in "\\PC*") {
        let _ = validate_in_mobile(&raw);
    }
}

// Property: classification partitions the working set
proptest! {
    #[test]
    fn summary_partitions_leads_with_mobiles(
        lead_numbers in proptest::collection::vec(proptest::option::of(6000000000u64..=9999999999u64), 0..30),
        rider_numbers in proptest::collection::vec(6000000000u64..=9999999999u64, 0..10)
    ) {
        let leads: Vec<Lead> = lead_numbers
            .iter()
            .map(|n| lead_with_mobile(&n.map(|v| v.to_string()).unwrap_or_default()))
            .collect();
        let population: Vec<String> = leads.iter().map(|l| l.mobile_number.clone()).collect();
        let riders: Vec<String> = rider_numbers.iter().map(|n| n.to_string()).collect();

        let result = classify_leads(&leads, &population, &riders);

        let with_mobile = leads
            .iter()
            .filter(|l| !normalize_mobile(&l.mobile_number).is_empty())
            .count() as u64;
        prop_assert_eq!(result.summary.total(), with_mobile);
        prop_assert_eq!(result.categories.len() as u64, with_mobile);
    }

    #[test]
    fn rider_match_always_wins(number in 6000000000u64..=9999999999u64, copies in 1usize..5) {
        // However many times the number repeats among leads, a rider holding
        // it forces the match category
        let leads: Vec<Lead> = (0..copies)
            .map(|_| lead_with_mobile(&number.to_string()))
            .collect();
        let population: Vec<String> = leads.iter().map(|l| l.mobile_number.clone()).collect();
        let riders = vec![format!("+91{}", number)];

        let result = classify_leads(&leads, &population, &riders);

        for lead in &leads {
            prop_assert_eq!(result.category_of(&lead.id), Some(LeadCategory::Match));
        }
    }

    #[test]
    fn classification_is_deterministic(
        lead_numbers in proptest::collection::vec(6000000000u64..=9999999999u64, 0..20),
        rider_numbers in proptest::collection::vec(6000000000u64..=9999999999u64, 0..10)
    ) {
        let leads: Vec<Lead> = lead_numbers
            .iter()
            .map(|n| lead_with_mobile(&n.to_string()))
            .collect();
        let population: Vec<String> = leads.iter().map(|l| l.mobile_number.clone()).collect();
        let riders: Vec<String> = rider_numbers.iter().map(|n| n.to_string()).collect();

        let first = classify_leads(&leads, &population, &riders);
        let second = classify_leads(&leads, &population, &riders);

        prop_assert_eq!(first.summary, second.summary);
        prop_assert_eq!(first.categories, second.categories);
    }
}

// Property: scores stay within bounds for all field combinations
proptest! {
    #[test]
    fn score_stays_in_range(
        license in proptest::option::of("[a-z]{0,8}"),
        ev in proptest::option::of("[a-z]{0,8}"),
        interest in proptest::option::of("[a-z]{0,8}"),
        source in proptest::option::of("[a-z]{0,8}"),
        remarks in proptest::option::of("[a-z]{0,20}"),
        accuracy in proptest::option::of(0.0f64..1000.0),
        category_idx in 0usize..3
    ) {
        let mut lead = lead_with_mobile("9876543210");
        lead.license_type = license;
        lead.ev_type = ev;
        lead.client_interest = interest;
        lead.source = source;
        lead.remarks = remarks;
        lead.gps_accuracy_m = accuracy;

        let category = [
            LeadCategory::Genuine,
            LeadCategory::Duplicate,
            LeadCategory::Match,
        ][category_idx];

        let score = score_lead(&lead, category);
        prop_assert!((0..=MAX_SCORE).contains(&score));
    }

    #[test]
    fn genuine_never_scores_below_duplicate_or_match(
        license in proptest::option::of("[a-z]{1,8}"),
        accuracy in proptest::option::of(0.0f64..1000.0)
    ) {
        let mut lead = lead_with_mobile("9876543210");
        lead.license_type = license;
        lead.gps_accuracy_m = accuracy;

        let genuine = score_lead(&lead, LeadCategory::Genuine);
        let duplicate = score_lead(&lead, LeadCategory::Duplicate);
        let matched = score_lead(&lead, LeadCategory::Match);
        prop_assert!(genuine >= duplicate);
        prop_assert!(duplicate >= matched);
    }
}
