//! Status command implementation

use crate::config::Config;
use crate::db::{Db, GlobalStats, Lead, LeadStatus, LeadTier};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub account_id: String,
    pub daily_limit: i64,
    pub sent_today: i64,
    pub stats: GlobalStats,
}

/// Get engine status
pub async fn cmd_status(config: &Config, db: &Db) -> Result<StatusInfo> {
    info!("Getting status");

    let stats = db.global_stats().await?;
    let (daily_limit, sent_today) = match db.quota_row(&config.account_id).await? {
        Some(row) => (row.daily_limit, row.sent_today),
        None => (config.outreach.daily_limit, 0),
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        account_id: config.account_id.clone(),
        daily_limit,
        sent_today,
        stats,
    })
}

/// List leads, optionally filtered by tier or status
pub async fn cmd_list_leads(
    db: &Db,
    tier: Option<LeadTier>,
    status: Option<LeadStatus>,
) -> Result<Vec<Lead>> {
    let leads = match tier {
        Some(tier) => db.list_leads_by_tier(tier).await?,
        None => db.list_leads().await?,
    };
    Ok(match status {
        Some(status) => leads
            .into_iter()
            .filter(|l| l.status == status.to_string())
            .collect(),
        None => leads,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 prospector Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!(
        "\nDaily quota ({}): {}/{} sent today",
        status.account_id, status.sent_today, status.daily_limit
    );
    println!("\nLeads: {}", status.stats.lead_count);
    println!("  Hot: {}", status.stats.hot_leads);
    println!("  Warm: {}", status.stats.warm_leads);
    println!("  Cold: {}", status.stats.cold_leads);
    println!("\nSequences:");
    println!("  Pending steps: {}", status.stats.pending_steps);
    println!("  Sent steps: {}", status.stats.sent_steps);
    println!("  Failed steps: {}", status.stats.failed_steps);
    println!("\nEmail:");
    println!("  Sent: {}", status.stats.emails_sent);
    println!("  Opened: {}", status.stats.emails_opened);
    println!("  Suppressed addresses: {}", status.stats.suppressed);
}

/// Print leads list to console
pub fn print_leads(leads: &[Lead]) {
    println!("\n🎯 Leads\n");

    if leads.is_empty() {
        println!("No leads found. Use 'prospector discover' to find businesses.");
        return;
    }

    for lead in leads {
        println!(
            "• {} ({}, {}) [{} / {}]",
            lead.business_name, lead.city, lead.state, lead.lead_tier, lead.status
        );
        println!("  ID: {}", lead.id);
        println!("  Score: {}", lead.score);
        if let Some(email) = &lead.email {
            println!("  Email: {}", email);
        }
        if let Some(phone) = &lead.phone {
            println!("  Phone: {}", phone);
        }
        match &lead.website_url {
            Some(url) => println!("  Website: {} ({})", url, lead.website_status),
            None => println!("  Website: none"),
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_reflects_quota_and_counts() {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();
        let config = Config::default();

        let status = cmd_status(&config, &db).await.unwrap();
        assert_eq!(status.daily_limit, 100);
        assert_eq!(status.sent_today, 0);
        assert_eq!(status.stats.lead_count, 0);

        db.ensure_quota_row("default", 100).await.unwrap();
        db.try_reserve_slot("default").await.unwrap();
        let status = cmd_status(&config, &db).await.unwrap();
        assert_eq!(status.sent_today, 1);
    }

    #[tokio::test]
    async fn test_list_leads_filters() {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();

        let mut hot = Lead::new(
            "Hot Co".to_string(),
            "Plumbing".to_string(),
            "Austin".to_string(),
            "TX".to_string(),
        );
        hot.lead_tier = LeadTier::Hot.to_string();
        db.insert_lead(&hot).await.unwrap();

        let mut cold = Lead::new(
            "Cold Co".to_string(),
            "Plumbing".to_string(),
            "Austin".to_string(),
            "TX".to_string(),
        );
        cold.lead_tier = LeadTier::Cold.to_string();
        cold.status = LeadStatus::Contacted.to_string();
        db.insert_lead(&cold).await.unwrap();

        let hot_only = cmd_list_leads(&db, Some(LeadTier::Hot), None).await.unwrap();
        assert_eq!(hot_only.len(), 1);
        assert_eq!(hot_only[0].business_name, "Hot Co");

        let contacted = cmd_list_leads(&db, None, Some(LeadStatus::Contacted))
            .await
            .unwrap();
        assert_eq!(contacted.len(), 1);
        assert_eq!(contacted[0].business_name, "Cold Co");
    }
}
