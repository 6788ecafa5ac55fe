//! Daily send quota
//!
//! Per-account counter with lazy date-keyed rollover, gating every
//! dispatch. Reservation is a single conditional increment at the
//! storage layer, so concurrent senders cannot race past the cap; a
//! failed dispatch returns its slot.

use crate::db::{today_string, Db};
use crate::error::Result;
use tracing::debug;

/// Outcome of a reservation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied { limit: i64 },
}

/// Reserve one send slot for the account, creating the counter row on
/// first use and resetting it when a new calendar day is observed.
pub async fn reserve_slot(db: &Db, account_id: &str, default_limit: i64) -> Result<QuotaDecision> {
    db.ensure_quota_row(account_id, default_limit).await?;
    db.rollover_quota(account_id, &today_string()).await?;

    if db.try_reserve_slot(account_id).await? {
        return Ok(QuotaDecision::Allowed);
    }

    let limit = db
        .quota_row(account_id)
        .await?
        .map(|row| row.daily_limit)
        .unwrap_or(default_limit);
    debug!("Quota denied for {}: limit {}", account_id, limit);
    Ok(QuotaDecision::Denied { limit })
}

/// Return a reserved slot after a failed dispatch
pub async fn release_slot(db: &Db, account_id: &str) -> Result<()> {
    db.release_slot(account_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (Db, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    #[tokio::test]
    async fn test_limit_of_one() {
        let (db, _tmp) = setup().await;

        // Row is created lazily with the given default limit
        assert_eq!(
            reserve_slot(&db, "acct", 1).await.unwrap(),
            QuotaDecision::Allowed
        );
        let row = db.quota_row("acct").await.unwrap().unwrap();
        assert_eq!(row.sent_today, 1);

        // Same day: denied, carrying the limit
        assert_eq!(
            reserve_slot(&db, "acct", 1).await.unwrap(),
            QuotaDecision::Denied { limit: 1 }
        );

        // A stale reset date simulates the next calendar day; the first
        // attempt rolls the counter over and succeeds
        db.rollover_quota("acct", "2099-01-01").await.unwrap();
        assert_eq!(
            reserve_slot(&db, "acct", 1).await.unwrap(),
            QuotaDecision::Allowed
        );
    }

    #[tokio::test]
    async fn test_release_returns_slot() {
        let (db, _tmp) = setup().await;

        assert_eq!(
            reserve_slot(&db, "acct", 1).await.unwrap(),
            QuotaDecision::Allowed
        );
        release_slot(&db, "acct").await.unwrap();
        assert_eq!(
            reserve_slot(&db, "acct", 1).await.unwrap(),
            QuotaDecision::Allowed
        );
    }
}
