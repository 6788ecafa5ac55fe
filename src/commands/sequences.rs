//! Sequence commands implementation

use crate::config::Config;
use crate::db::{Db, SequenceStep};
use crate::dispatch::{Dispatcher, SendgridClient};
use crate::error::Result;
use crate::sequence::{self, ProcessStats, SequenceProcessor};
use std::sync::Arc;

/// Enroll a lead in the outreach sequence
pub async fn cmd_start_sequence(
    db: &Db,
    lead_id: &str,
    campaign_id: Option<&str>,
) -> Result<Vec<SequenceStep>> {
    sequence::create_sequence(db, lead_id, campaign_id).await
}

/// Cancel a lead's pending steps
pub async fn cmd_cancel_sequence(db: &Db, lead_id: &str) -> Result<u64> {
    sequence::cancel_sequence(db, lead_id).await
}

/// List a lead's full timeline
pub async fn cmd_list_steps(db: &Db, lead_id: &str) -> Result<Vec<SequenceStep>> {
    db.steps_for_lead(lead_id).await
}

/// Process every due step once
pub async fn cmd_run_sequences(config: &Config, db: &Db) -> Result<ProcessStats> {
    let delivery = SendgridClient::new(
        &config.delivery.base_url,
        config.delivery_api_key()?,
        config.delivery.timeout_secs,
    )?;
    let dispatcher = Dispatcher::new(db.clone(), Arc::new(delivery), config)?;
    let processor = SequenceProcessor::new(db.clone(), dispatcher, &config.outreach);
    processor.process_due().await
}

/// Print a lead's timeline to console
pub fn print_steps(steps: &[SequenceStep]) {
    if steps.is_empty() {
        println!("No sequence steps. Use 'prospector sequence start' to enroll the lead.");
        return;
    }

    println!("\n📬 Sequence Timeline\n");
    for step in steps {
        println!(
            "  {}. {} [{}]",
            step.sequence_step, step.template_type, step.status
        );
        println!("     Scheduled: {}", step.scheduled_at);
        if let Some(sent) = &step.sent_at {
            println!("     Sent: {}", sent);
        }
        if step.attempts > 0 {
            println!("     Attempts: {}", step.attempts);
        }
    }
}

/// Print a processing pass summary to console
pub fn print_process_stats(stats: &ProcessStats) {
    println!("\n✓ Sequence pass complete");
    println!("  Due steps: {}", stats.due);
    println!("  Sent: {}", stats.sent);
    println!("  Skipped: {}", stats.skipped);
    println!("  Rescheduled: {}", stats.rescheduled);
    println!("  Failed permanently: {}", stats.failed);
    if stats.quota_exhausted {
        println!("  ⚠ Daily send limit reached; remaining steps stay pending");
    }
}
