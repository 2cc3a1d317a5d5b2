/// Unit tests for CSV import parsing and export rendering
/// All pure: no database access
use chrono::Utc;
use fleet_backoffice_api::classify::classify_leads;
use fleet_backoffice_api::errors::AppError;
use fleet_backoffice_api::import::{leads_to_csv, parse_leads_csv, parse_riders_csv, riders_to_csv};
use fleet_backoffice_api::models::{Lead, Rider};
use bigdecimal::BigDecimal;
use std::str::FromStr;
use uuid::Uuid;

const LEAD_HEADER: &str =
    "rider_name,mobile_number,city,license_type,ev_type,client_interest,current_ev,source,remarks,leader_id";
const RIDER_HEADER: &str =
    "rider_code,name,mobile_number,chassis_number,client_name,opening_balance,leader_id";

fn sample_lead(seq_no: i64, mobile: &str) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        seq_no,
        rider_name: format!("Lead {}", seq_no),
        mobile_number: mobile.to_string(),
        city: Some("Pune".to_string()),
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
        score: Some(40),
        created_by: None,
        leader_id: None,
        created_at: Utc::now(),
        updated_at: None,
        deleted_at: None,
    }
}

#[cfg(test)]
mod lead_import_tests {
    use super::*;

    #[test]
    fn test_parses_well_formed_file() {
        let csv = format!(
            "{}\nAsha Kumari,9876543210,Pune,LMV,2W,Zomato,,field_visit,keen,\nRavi Patel,+919111111111,Mumbai,,,,,referral,,\n",
            LEAD_HEADER
        );

        let parsed = parse_leads_csv(csv.as_bytes(), 100).unwrap();

        assert_eq!(parsed.total_rows, 2);
        assert_eq!(parsed.rows.len(), 2);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.rows[0].rider_name, "Asha Kumari");
        assert_eq!(parsed.rows[0].mobile_number, "9876543210");
        assert_eq!(parsed.rows[0].license_type.as_deref(), Some("LMV"));
        assert_eq!(parsed.rows[1].city.as_deref(), Some("Mumbai"));
        assert!(parsed.rows[1].license_type.is_none());
    }

    #[test]
    fn test_invalid_mobile_flagged_not_rejected() {
        let csv = format!(
            "{}\nAsha Kumari,12345678,Pune,,,,,,,\nRavi Patel,9876543210,,,,,,,,\n",
            LEAD_HEADER
        );

        let parsed = parse_leads_csv(csv.as_bytes(), 100).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.flagged_invalid_mobile, 1);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_empty_rider_name_rejected_per_row() {
        let csv = format!(
            "{}\n,9876543210,Pune,,,,,,,\nRavi Patel,9111111111,,,,,,,,\n",
            LEAD_HEADER
        );

        let parsed = parse_leads_csv(csv.as_bytes(), 100).unwrap();

        assert_eq!(parsed.total_rows, 2);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].row, 1);
        assert!(parsed.errors[0].error.contains("rider_name"));
    }

    #[test]
    fn test_bad_leader_id_rejected_per_row() {
        let csv = format!(
            "{}\nAsha Kumari,9876543210,Pune,,,,,,,not-a-uuid\n",
            LEAD_HEADER
        );

        let parsed = parse_leads_csv(csv.as_bytes(), 100).unwrap();

        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].error.contains("leader_id"));
    }

    #[test]
    fn test_valid_leader_id_parsed() {
        let leader = Uuid::new_v4();
        let csv = format!(
            "{}\nAsha Kumari,9876543210,Pune,,,,,,,{}\n",
            LEAD_HEADER, leader
        );

        let parsed = parse_leads_csv(csv.as_bytes(), 100).unwrap();

        assert_eq!(parsed.rows[0].leader_id, Some(leader));
    }

    #[test]
    fn test_row_limit_rejects_whole_file() {
        let mut csv = format!("{}\n", LEAD_HEADER);
        for i in 0..5 {
            csv.push_str(&format!("Lead {},987654321{},,,,,,,,\n", i, i));
        }

        let result = parse_leads_csv(csv.as_bytes(), 3);
        assert!(matches!(result, Err(AppError::ImportRejected(_))));
    }

    #[test]
    fn test_numeric_header_rejected() {
        let csv = "123,456\nAsha,9876543210\n";
        let result = parse_leads_csv(csv.as_bytes(), 100);
        assert!(matches!(result, Err(AppError::ImportRejected(_))));
    }

    #[test]
    fn test_empty_file_yields_empty_report() {
        let csv = format!("{}\n", LEAD_HEADER);
        let parsed = parse_leads_csv(csv.as_bytes(), 100).unwrap();
        assert_eq!(parsed.total_rows, 0);
        assert!(parsed.rows.is_empty());
        assert!(parsed.errors.is_empty());
    }
}

#[cfg(test)]
mod rider_import_tests {
    use super::*;

    #[test]
    fn test_parses_well_formed_file() {
        let csv = format!(
            "{}\nRID-001,Asha Kumari,9876543210,CH123,Zomato,1500.50,\nRID-002,Ravi Patel,9111111111,,,,\n",
            RIDER_HEADER
        );

        let parsed = parse_riders_csv(csv.as_bytes(), 100).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.rows[0].rider_code, "RID-001");
        assert_eq!(
            parsed.rows[0].opening_balance,
            Some(BigDecimal::from_str("1500.50").unwrap())
        );
        assert!(parsed.rows[1].opening_balance.is_none());
    }

    #[test]
    fn test_missing_mobile_rejected_per_row() {
        let csv = format!(
            "{}\nRID-001,Asha Kumari,,,,,\nRID-002,Ravi Patel,9111111111,,,,\n",
            RIDER_HEADER
        );

        let parsed = parse_riders_csv(csv.as_bytes(), 100).unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].error.contains("mobile_number"));
    }

    #[test]
    fn test_bad_opening_balance_rejected_per_row() {
        let csv = format!(
            "{}\nRID-001,Asha Kumari,9876543210,,,lots,\n",
            RIDER_HEADER
        );

        let parsed = parse_riders_csv(csv.as_bytes(), 100).unwrap();

        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].error.contains("opening_balance"));
    }
}

#[cfg(test)]
mod export_tests {
    use super::*;

    #[test]
    fn test_lead_export_includes_categories() {
        let leads = vec![
            sample_lead(1, "9876543210"),
            sample_lead(2, "9876543210"),
            sample_lead(3, "9111111111"),
        ];
        let population: Vec<String> = leads.iter().map(|l| l.mobile_number.clone()).collect();
        let classification = classify_leads(&leads, &population, &[]);

        let bytes = leads_to_csv(&leads, &classification).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("seq_no,rider_name,mobile_number"));
        assert!(header.contains("category"));

        let body: Vec<&str> = lines.collect();
        assert_eq!(body.len(), 3);
        assert!(body[0].contains("duplicate"));
        assert!(body[1].contains("duplicate"));
        assert!(body[2].contains("genuine"));
    }

    #[test]
    fn test_lead_without_mobile_exports_empty_category() {
        let leads = vec![sample_lead(1, "")];
        let classification = classify_leads(&leads, &[], &[]);

        let bytes = leads_to_csv(&leads, &classification).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let row = text.lines().nth(1).unwrap();
        // seq_no,rider_name,mobile_number,city,status,category,...
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields[5], "");
    }

    #[test]
    fn test_rider_export_renders_balance() {
        let rider = Rider {
            id: Uuid::new_v4(),
            rider_code: "RID-001".to_string(),
            name: "Asha Kumari".to_string(),
            mobile_number: "9876543210".to_string(),
            chassis_number: Some("CH123".to_string()),
            client_name: None,
            wallet_balance: BigDecimal::from_str("250.75").unwrap(),
            status: "active".to_string(),
            leader_id: None,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };

        let bytes = riders_to_csv(&[rider]).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.lines().next().unwrap().starts_with("rider_code,name"));
        assert!(text.contains("250.75"));
        assert!(text.contains("RID-001"));
    }
}
