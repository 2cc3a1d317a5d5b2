/// Lead classification engine
///
/// Pure functions shared by the HTTP handlers, the CSV importer, and the
/// maintenance binaries:
/// 1. Normalize a mobile number to its canonical comparison key
/// 2. Classify a working set of leads against the rider and lead populations
/// 3. Derive a lead quality score from the category and evaluation fields
///
/// Classification is stateless and idempotent: it never mutates its inputs
/// and two runs over identical snapshots produce identical output. Category
/// is always recomputed from the current populations, never read back from
/// storage, because the populations can change between writes.
use crate::models::Lead;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Length of the national subscriber number used as the comparison key.
const SUBSCRIBER_DIGITS: usize = 10;

/// Reduce a mobile number to its canonical comparison key.
///
/// Strips every non-digit character; if more than 10 digits remain, keeps
/// only the last 10 (national subscriber number, assuming an E.164
/// `+<country><10-digit>` shape for this locale). Shorter digit strings pass
/// through unchanged so partially-entered data still classifies instead of
/// erroring, at the cost of possible false-negative matches.
pub fn normalize_mobile(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() > SUBSCRIBER_DIGITS {
        digits[digits.len() - SUBSCRIBER_DIGITS..].to_string()
    } else {
        digits
    }
}

/// Validate and format an Indian mobile number.
///
/// Uses the phonenumber library (port of Google's libphonenumber) to:
/// - Parse the number with the Indian region (IN)
/// - Check whether it is a valid Indian number
/// - Return the E.164 form (+919876543210)
///
/// Intake-side only: a failed validation flags the lead or import row but
/// never blocks classification, which stays permissive.
///
/// Returns: (is_valid, normalized_phone_or_error_msg)
pub fn validate_in_mobile(raw: &str) -> (bool, String) {
    // Skip empty or very short strings
    if raw.trim().is_empty() || raw.len() < 8 {
        return (false, "Mobile number too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::IN), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("Valid IN mobile: {} -> {}", raw, formatted);
                (true, formatted)
            } else {
                tracing::warn!("Invalid IN mobile number: {}", raw);
                (false, "Invalid Indian mobile number".to_string())
            }
        }
        Err(e) => {
            tracing::warn!("Failed to parse IN mobile '{}': {:?}", raw, e);
            (false, format!("Parse error: {:?}", e))
        }
    }
}

/// Derived category of a lead relative to the rider and lead populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadCategory {
    /// Matches no existing rider and no other lead.
    Genuine,
    /// Number appears more than once among leads, but not among riders.
    Duplicate,
    /// Number already belongs to an onboarded rider.
    Match,
}

impl LeadCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadCategory::Genuine => "genuine",
            LeadCategory::Duplicate => "duplicate",
            LeadCategory::Match => "match",
        }
    }

    /// Parse a query-parameter value into a category.
    pub fn from_param(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "genuine" => Some(LeadCategory::Genuine),
            "duplicate" => Some(LeadCategory::Duplicate),
            "match" => Some(LeadCategory::Match),
            _ => None,
        }
    }
}

/// Aggregate counts over the working set.
///
/// `genuine + duplicate + matched` always equals the number of working
/// leads with a non-empty normalized mobile number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub genuine: u64,
    pub duplicate: u64,
    pub matched: u64,
}

impl LeadSummary {
    pub fn total(&self) -> u64 {
        self.genuine + self.duplicate + self.matched
    }
}

/// Result of one classification run.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Category per working lead. Leads whose mobile normalizes to empty
    /// are absent from the map.
    pub categories: HashMap<Uuid, LeadCategory>,
    pub summary: LeadSummary,
}

impl Classification {
    pub fn category_of(&self, lead_id: &Uuid) -> Option<LeadCategory> {
        self.categories.get(lead_id).copied()
    }
}

/// Classify every lead in `working` against the full populations.
///
/// `population_mobiles` must cover the entire lead population the caller has
/// visibility into (the working set included): a lead already captured by
/// another sourcer is still a duplicate for the current viewer.
/// `rider_mobiles` is always the global rider population, regardless of
/// viewer scope, because a lead's value depends on whether *any* rider
/// already holds that number.
///
/// Decision rule per lead, first match wins:
/// 1. Normalized mobile present among riders -> `Match`
/// 2. Normalized mobile shared by more than one lead -> `Duplicate`
/// 3. Otherwise -> `Genuine`
///
/// Leads with an empty/unparseable mobile are excluded from the category
/// map and from all three counts.
pub fn classify_leads(
    working: &[Lead],
    population_mobiles: &[String],
    rider_mobiles: &[String],
) -> Classification {
    // Precompute once per run: O(n+m) total instead of O(n*m)
    let rider_set: HashSet<String> = rider_mobiles
        .iter()
        .map(|m| normalize_mobile(m))
        .filter(|m| !m.is_empty())
        .collect();

    let mut lead_freq: HashMap<String, u64> = HashMap::new();
    for mobile in population_mobiles {
        let key = normalize_mobile(mobile);
        if !key.is_empty() {
            *lead_freq.entry(key).or_insert(0) += 1;
        }
    }

    let mut categories = HashMap::with_capacity(working.len());
    let mut summary = LeadSummary::default();

    for lead in working {
        let key = normalize_mobile(&lead.mobile_number);
        if key.is_empty() {
            // Excluded: neither counted nor erroring
            continue;
        }

        let category = if rider_set.contains(&key) {
            LeadCategory::Match
        } else if lead_freq.get(&key).copied().unwrap_or(0) > 1 {
            LeadCategory::Duplicate
        } else {
            LeadCategory::Genuine
        };

        match category {
            LeadCategory::Genuine => summary.genuine += 1,
            LeadCategory::Duplicate => summary.duplicate += 1,
            LeadCategory::Match => summary.matched += 1,
        }
        categories.insert(lead.id, category);
    }

    Classification {
        categories,
        summary,
    }
}

/// Maximum lead score.
pub const MAX_SCORE: i32 = 100;

/// Derive a quality score for a lead from its category and how complete its
/// evaluation fields are.
///
/// The score ranks sourcing effort for the team-leader dashboards: a genuine
/// lead with a full evaluation and a tight GPS fix scores highest, a rider
/// match scores on completeness alone.
pub fn score_lead(lead: &Lead, category: LeadCategory) -> i32 {
    let mut score = match category {
        LeadCategory::Genuine => 40,
        LeadCategory::Duplicate => 10,
        LeadCategory::Match => 0,
    };

    if lead.license_type.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 10;
    }
    if lead.ev_type.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 10;
    }
    if lead
        .client_interest
        .as_deref()
        .is_some_and(|v| !v.is_empty())
    {
        score += 10;
    }
    if lead.source.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 5;
    }
    if lead.remarks.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 5;
    }

    // GPS capture quality: a fix within 50m is a verified field visit
    match lead.gps_accuracy_m {
        Some(acc) if acc <= 50.0 => score += 15,
        Some(_) => score += 5,
        None => {}
    }

    score.min(MAX_SCORE)
}
