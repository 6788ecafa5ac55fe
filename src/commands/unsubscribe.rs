//! Unsubscribe command implementation

use crate::db::Db;
use crate::error::Result;
use serde::Serialize;
use tracing::info;

/// Outcome of suppressing an address
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeResult {
    pub email: String,
    pub leads_updated: u64,
    pub steps_cancelled: u64,
}

/// Suppress an address: no future send will reach it, matching leads
/// are marked unsubscribed, and their pending sequence steps are
/// cancelled. Safe to repeat.
pub async fn cmd_unsubscribe(db: &Db, email: &str, reason: &str) -> Result<UnsubscribeResult> {
    db.upsert_unsubscribe(email, reason).await?;

    let mut steps_cancelled = 0;
    for lead in db.leads_by_email(email).await? {
        steps_cancelled += db.cancel_pending_steps(&lead.id).await?;
    }
    let leads_updated = db.mark_unsubscribed_by_email(email).await?;

    info!(
        "Suppressed {}: {} lead(s) updated, {} step(s) cancelled",
        email, leads_updated, steps_cancelled
    );
    Ok(UnsubscribeResult {
        email: email.to_string(),
        leads_updated,
        steps_cancelled,
    })
}

/// Print unsubscribe confirmation to console
pub fn print_unsubscribe_result(result: &UnsubscribeResult) {
    println!("✓ {} will not receive further emails", result.email);
    println!("  Leads updated: {}", result.leads_updated);
    println!("  Pending steps cancelled: {}", result.steps_cancelled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Lead, LeadStatus};
    use crate::sequence::create_sequence;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unsubscribe_cascades() {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();

        let mut lead = Lead::new(
            "Acme".to_string(),
            "Roofing".to_string(),
            "Dallas".to_string(),
            "TX".to_string(),
        );
        lead.email = Some("joe@acme.com".to_string());
        db.insert_lead(&lead).await.unwrap();
        create_sequence(&db, &lead.id, None).await.unwrap();

        let result = cmd_unsubscribe(&db, "Joe@Acme.com", "user_requested")
            .await
            .unwrap();
        assert_eq!(result.leads_updated, 1);
        assert_eq!(result.steps_cancelled, 4);
        assert!(db.is_suppressed("joe@acme.com").await.unwrap());

        let lead = db.get_lead(&lead.id).await.unwrap().unwrap();
        assert_eq!(lead.get_status().unwrap(), LeadStatus::Unsubscribed);

        // Repeating is harmless
        let again = cmd_unsubscribe(&db, "joe@acme.com", "user_requested")
            .await
            .unwrap();
        assert_eq!(again.steps_cancelled, 0);
    }
}
