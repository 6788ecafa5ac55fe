//! Analyze command implementation

use crate::analyze::WebsiteAnalyzer;
use crate::config::Config;
use crate::db::{Db, Lead, WebsiteStatus};
use crate::error::{Error, Result};
use crate::scoring::score_lead;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

/// One lead's re-qualification after a website fetch
#[derive(Debug, Clone, Serialize)]
pub struct LeadAnalysis {
    pub lead_id: String,
    pub business_name: String,
    pub reachable: bool,
    pub score_before: i64,
    pub score_after: i64,
    pub tier: String,
}

/// Analyze one lead's website and rescore it
pub async fn cmd_analyze_lead(config: &Config, db: &Db, lead_id: &str) -> Result<LeadAnalysis> {
    let lead = db
        .get_lead(lead_id)
        .await?
        .ok_or_else(|| Error::LeadNotFound(lead_id.to_string()))?;
    let analyzer = WebsiteAnalyzer::new(&config.analyze)?;
    analyze_one(db, &analyzer, lead).await
}

/// Analyze every lead that has a website
pub async fn cmd_analyze_all(config: &Config, db: &Db) -> Result<Vec<LeadAnalysis>> {
    let analyzer = WebsiteAnalyzer::new(&config.analyze)?;
    let leads = db.list_leads().await?;
    let candidates: Vec<Lead> = leads
        .into_iter()
        .filter(|l| l.website_url.is_some())
        .collect();
    info!("Analyzing {} website(s)", candidates.len());

    let progress = ProgressBar::new(candidates.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("[{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut results = Vec::with_capacity(candidates.len());
    for lead in candidates {
        progress.set_message(lead.business_name.clone());
        results.push(analyze_one(db, &analyzer, lead).await?);
        progress.inc(1);
    }
    progress.finish_and_clear();
    Ok(results)
}

async fn analyze_one(db: &Db, analyzer: &WebsiteAnalyzer, mut lead: Lead) -> Result<LeadAnalysis> {
    let url = lead
        .website_url
        .clone()
        .ok_or_else(|| Error::Other(format!("Lead {} has no website to analyze", lead.id)))?;

    let analysis = analyzer.analyze(&url).await;
    if !analysis.reachable {
        db.set_website_status(&lead.id, WebsiteStatus::Broken).await?;
        lead.website_status = WebsiteStatus::Broken.to_string();
    }

    // Measured signals supersede the provisional discovery score
    let score_before = lead.score;
    let (score, tier) = score_lead(&lead, &analysis.signals);
    db.apply_analysis(
        &lead.id,
        analysis.signals.has_ssl,
        analysis.signals.is_mobile_friendly,
        analysis.signals.website_speed_score,
        analysis.signals.has_social_presence,
        score,
        tier,
    )
    .await?;

    info!(
        "Analyzed {}: score {} -> {} ({})",
        lead.business_name, score_before, score, tier
    );
    Ok(LeadAnalysis {
        lead_id: lead.id,
        business_name: lead.business_name,
        reachable: analysis.reachable,
        score_before,
        score_after: score,
        tier: tier.to_string(),
    })
}

/// Print analysis results to console
pub fn print_analyses(results: &[LeadAnalysis]) {
    if results.is_empty() {
        println!("No leads with websites to analyze.");
        return;
    }

    println!("\n✓ Analyzed {} website(s)", results.len());
    for result in results {
        let marker = if result.reachable { "•" } else { "✗" };
        println!(
            "  {} {}: {} -> {} ({}){}",
            marker,
            result.business_name,
            result.score_before,
            result.score_after,
            result.tier,
            if result.reachable { "" } else { " [unreachable]" }
        );
    }
}
