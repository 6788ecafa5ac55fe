//! Delivery event reconciliation
//!
//! Applies provider event batches (opens, clicks, bounces, spam
//! reports, unsubscribes) back onto the send log and the suppression
//! list. Events correlate by the message ID echoed back from dispatch;
//! when a provider strips custom arguments the recipient's most recent
//! log row is the fallback. Unknown event types are counted and
//! ignored, and re-applying a batch is harmless.

use crate::db::Db;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One provider webhook event
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryEvent {
    pub email: String,
    pub event: String,
    /// Unix seconds; missing timestamps fall back to now
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Custom argument echoed back from dispatch
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Counters for one reconciliation batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileStats {
    pub events: usize,
    pub opened: usize,
    pub clicked: usize,
    pub bounced: usize,
    pub spam: usize,
    pub unsubscribed: usize,
    /// Log-status events with no matching log row
    pub unmatched: usize,
    /// Event types this engine does not track
    pub ignored: usize,
}

/// Parse a provider webhook payload: a JSON array of events, or a
/// single event object.
pub fn parse_events(payload: &str) -> Result<Vec<DeliveryEvent>> {
    match serde_json::from_str::<Vec<DeliveryEvent>>(payload) {
        Ok(events) => Ok(events),
        Err(_) => Ok(vec![serde_json::from_str::<DeliveryEvent>(payload)?]),
    }
}

/// Apply a batch of events to the log and suppression list
pub async fn apply_events(db: &Db, events: &[DeliveryEvent]) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats {
        events: events.len(),
        ..Default::default()
    };

    for event in events {
        apply_event(db, event, &mut stats).await?;
    }

    info!(
        "Reconciled {} event(s): {} opened, {} clicked, {} bounced, {} spam, {} unsubscribed",
        stats.events, stats.opened, stats.clicked, stats.bounced, stats.spam, stats.unsubscribed
    );
    Ok(stats)
}

async fn apply_event(db: &Db, event: &DeliveryEvent, stats: &mut ReconcileStats) -> Result<()> {
    let timestamp = event
        .timestamp
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .unwrap_or_else(Utc::now)
        .to_rfc3339();

    // Suppression applies even when no log row matches
    match event.event.as_str() {
        "spamreport" => {
            db.upsert_unsubscribe(&event.email, "Marked as spam").await?;
        }
        "unsubscribe" | "group_unsubscribe" => {
            db.upsert_unsubscribe(&event.email, "user_requested").await?;
            let leads = db.mark_unsubscribed_by_email(&event.email).await?;
            debug!("Unsubscribe for {} touched {} lead(s)", event.email, leads);
            stats.unsubscribed += 1;
            return Ok(());
        }
        _ => {}
    }

    let log = match &event.message_id {
        Some(id) => db.log_by_message_id(id).await?,
        None => db.latest_log_for_email(&event.email).await?,
    };
    let log = match log {
        Some(log) => log,
        None => {
            warn!(
                "No send log matches {} event for {}",
                event.event, event.email
            );
            stats.unmatched += 1;
            return Ok(());
        }
    };

    match event.event.as_str() {
        "open" => {
            db.mark_log_opened(&log.id, &timestamp).await?;
            stats.opened += 1;
        }
        "click" => {
            db.mark_log_clicked(&log.id, &timestamp).await?;
            stats.clicked += 1;
        }
        "bounce" | "dropped" => {
            debug!(
                "Bounce for {}: {}",
                event.email,
                event.reason.as_deref().unwrap_or("no reason given")
            );
            db.mark_log_bounced(&log.id, &timestamp).await?;
            stats.bounced += 1;
        }
        "spamreport" => {
            db.mark_log_spam(&log.id).await?;
            stats.spam += 1;
        }
        other => {
            debug!("Ignoring untracked event type '{}'", other);
            stats.ignored += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EmailLog, Lead, LeadStatus};
    use tempfile::TempDir;

    async fn setup() -> (Db, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    fn event(email: &str, kind: &str, message_id: Option<&str>) -> DeliveryEvent {
        DeliveryEvent {
            email: email.to_string(),
            event: kind.to_string(),
            timestamp: Some(1_756_000_000),
            message_id: message_id.map(str::to_string),
            reason: None,
            url: None,
        }
    }

    async fn insert_log(db: &Db, email: &str, message_id: &str, sent_at: &str) -> EmailLog {
        let mut log = EmailLog::new(
            email.to_string(),
            "subject".to_string(),
            message_id.to_string(),
        );
        log.sent_at = sent_at.to_string();
        db.insert_log(&log).await.unwrap();
        log
    }

    #[test]
    fn test_parse_events_array_and_single() {
        let batch = parse_events(
            r#"[{"email":"a@x.com","event":"open","timestamp":1756000000,"message_id":"m1"}]"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].message_id.as_deref(), Some("m1"));

        let single = parse_events(r#"{"email":"a@x.com","event":"click"}"#).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].event, "click");
    }

    #[tokio::test]
    async fn test_open_correlates_by_message_id() {
        let (db, _tmp) = setup().await;
        // Two logs for the same address; the ID picks the older one
        insert_log(&db, "joe@acme.com", "m-old", "2024-01-01T00:00:00+00:00").await;
        insert_log(&db, "joe@acme.com", "m-new", "2024-02-01T00:00:00+00:00").await;

        let stats = apply_events(&db, &[event("joe@acme.com", "open", Some("m-old"))])
            .await
            .unwrap();
        assert_eq!(stats.opened, 1);

        let old = db.log_by_message_id("m-old").await.unwrap().unwrap();
        assert_eq!(old.status, "opened");
        assert!(old.opened_at.is_some());
        let new = db.log_by_message_id("m-new").await.unwrap().unwrap();
        assert_eq!(new.status, "sent");
    }

    #[tokio::test]
    async fn test_missing_message_id_falls_back_to_latest_log() {
        let (db, _tmp) = setup().await;
        insert_log(&db, "joe@acme.com", "m-old", "2024-01-01T00:00:00+00:00").await;
        insert_log(&db, "joe@acme.com", "m-new", "2024-02-01T00:00:00+00:00").await;

        let stats = apply_events(&db, &[event("Joe@Acme.com", "click", None)])
            .await
            .unwrap();
        assert_eq!(stats.clicked, 1);

        let new = db.log_by_message_id("m-new").await.unwrap().unwrap();
        assert_eq!(new.status, "clicked");
        let old = db.log_by_message_id("m-old").await.unwrap().unwrap();
        assert_eq!(old.status, "sent");
    }

    #[tokio::test]
    async fn test_bounce_and_unmatched() {
        let (db, _tmp) = setup().await;
        insert_log(&db, "joe@acme.com", "m1", "2024-01-01T00:00:00+00:00").await;

        let stats = apply_events(
            &db,
            &[
                event("joe@acme.com", "bounce", Some("m1")),
                event("stranger@other.com", "open", None),
            ],
        )
        .await
        .unwrap();
        assert_eq!(stats.bounced, 1);
        assert_eq!(stats.unmatched, 1);

        let log = db.log_by_message_id("m1").await.unwrap().unwrap();
        assert_eq!(log.status, "bounced");
        assert!(log.bounced_at.is_some());
    }

    #[tokio::test]
    async fn test_spam_report_suppresses_address() {
        let (db, _tmp) = setup().await;
        insert_log(&db, "joe@acme.com", "m1", "2024-01-01T00:00:00+00:00").await;

        let stats = apply_events(&db, &[event("joe@acme.com", "spamreport", Some("m1"))])
            .await
            .unwrap();
        assert_eq!(stats.spam, 1);
        assert!(db.is_suppressed("joe@acme.com").await.unwrap());
        let log = db.log_by_message_id("m1").await.unwrap().unwrap();
        assert_eq!(log.status, "spam");
    }

    #[tokio::test]
    async fn test_unsubscribe_suppresses_and_updates_leads() {
        let (db, _tmp) = setup().await;
        let mut lead = Lead::new(
            "Acme".to_string(),
            "Roofing".to_string(),
            "Dallas".to_string(),
            "TX".to_string(),
        );
        lead.email = Some("joe@acme.com".to_string());
        db.insert_lead(&lead).await.unwrap();

        let stats = apply_events(&db, &[event("joe@acme.com", "unsubscribe", None)])
            .await
            .unwrap();
        assert_eq!(stats.unsubscribed, 1);
        // No log row exists, but suppression still lands
        assert!(db.is_suppressed("joe@acme.com").await.unwrap());
        let lead = db.get_lead(&lead.id).await.unwrap().unwrap();
        assert_eq!(lead.get_status().unwrap(), LeadStatus::Unsubscribed);
    }

    #[tokio::test]
    async fn test_unknown_event_ignored_and_replay_is_idempotent() {
        let (db, _tmp) = setup().await;
        insert_log(&db, "joe@acme.com", "m1", "2024-01-01T00:00:00+00:00").await;

        let batch = [
            event("joe@acme.com", "open", Some("m1")),
            event("joe@acme.com", "delivered", Some("m1")),
        ];
        let stats = apply_events(&db, &batch).await.unwrap();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.ignored, 1);

        let first = db.log_by_message_id("m1").await.unwrap().unwrap();
        apply_events(&db, &batch).await.unwrap();
        let second = db.log_by_message_id("m1").await.unwrap().unwrap();
        assert_eq!(first.status, second.status);
        assert_eq!(first.opened_at, second.opened_at);
    }
}
