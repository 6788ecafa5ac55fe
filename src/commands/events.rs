//! Events command implementation

use crate::db::Db;
use crate::error::Result;
use crate::reconcile::{apply_events, parse_events, ReconcileStats};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Apply a provider event batch from a JSON file, or stdin when no
/// path is given.
pub async fn cmd_apply_events(db: &Db, path: Option<&Path>) -> Result<ReconcileStats> {
    let payload = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let events = parse_events(&payload)?;
    info!("Applying {} delivery event(s)", events.len());
    apply_events(db, &events).await
}

/// Print reconciliation stats to console
pub fn print_reconcile_stats(stats: &ReconcileStats) {
    println!("\n✓ Reconciled {} event(s)", stats.events);
    println!("  Opened: {}", stats.opened);
    println!("  Clicked: {}", stats.clicked);
    println!("  Bounced: {}", stats.bounced);
    println!("  Spam reports: {}", stats.spam);
    println!("  Unsubscribed: {}", stats.unsubscribed);
    if stats.unmatched > 0 {
        println!("  ⚠ Unmatched: {}", stats.unmatched);
    }
    if stats.ignored > 0 {
        println!("  Ignored (untracked types): {}", stats.ignored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EmailLog;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_apply_events_from_file() {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();
        db.insert_log(&EmailLog::new(
            "joe@acme.com".to_string(),
            "subject".to_string(),
            "m1".to_string(),
        ))
        .await
        .unwrap();

        let events_path = tmp.path().join("events.json");
        std::fs::write(
            &events_path,
            r#"[{"email":"joe@acme.com","event":"open","timestamp":1756000000,"message_id":"m1"}]"#,
        )
        .unwrap();

        let stats = cmd_apply_events(&db, Some(&events_path)).await.unwrap();
        assert_eq!(stats.opened, 1);
        let log = db.log_by_message_id("m1").await.unwrap().unwrap();
        assert_eq!(log.status, "opened");
    }
}
