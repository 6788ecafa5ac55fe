//! Lead qualification scoring
//!
//! A pure function from lead attributes and technical signals to a
//! 0-100 score and tier. Invoked at discovery time (contact and website
//! signals only) and again after website analysis; the second call
//! overwrites the first.

use crate::db::{Lead, LeadTier, WebsiteStatus};

/// Technical signals gathered by website analysis. `None` means the
/// signal was never measured and contributes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TechnicalSignals {
    pub has_ssl: Option<bool>,
    pub is_mobile_friendly: Option<bool>,
    pub website_speed_score: Option<i64>,
    pub has_social_presence: Option<bool>,
}

impl TechnicalSignals {
    /// Signals already stored on a lead row
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            has_ssl: lead.has_ssl,
            is_mobile_friendly: lead.is_mobile_friendly,
            website_speed_score: lead.website_speed_score,
            has_social_presence: lead.has_social_presence,
        }
    }
}

/// Tier thresholds: >= 70 hot, >= 40 warm, else cold
pub fn tier_for_score(score: i64) -> LeadTier {
    if score >= 70 {
        LeadTier::Hot
    } else if score >= 40 {
        LeadTier::Warm
    } else {
        LeadTier::Cold
    }
}

/// Compute a lead's score and tier. Deterministic and total: identical
/// inputs always produce identical output.
pub fn score_lead(lead: &Lead, signals: &TechnicalSignals) -> (i64, LeadTier) {
    let mut score: i64 = 0;

    // A status outside the known set contributes nothing
    match lead.get_website_status() {
        Ok(WebsiteStatus::None) => score += 40,
        Ok(WebsiteStatus::Broken) => score += 30,
        Ok(WebsiteStatus::Outdated) => score += 20,
        Err(_) => {}
    }

    if lead.email.is_some() {
        score += 15;
    }
    if lead.phone.is_some() {
        score += 5;
    }

    if signals.has_ssl == Some(false) {
        score += 10;
    }
    if signals.is_mobile_friendly == Some(false) {
        score += 10;
    }
    if matches!(signals.website_speed_score, Some(s) if s < 50) {
        score += 10;
    }
    if signals.has_social_presence == Some(false) {
        score += 5;
    }

    if matches!(lead.google_rating, Some(r) if r < 3.5) {
        score += 5;
    }
    if matches!(lead.review_count, Some(c) if c < 10) {
        score += 5;
    }

    let score = score.min(100);
    (score, tier_for_score(score))
}
