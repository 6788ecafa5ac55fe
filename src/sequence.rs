//! Outreach sequence engine
//!
//! Every lead entering outreach gets the same fixed 4-step timeline:
//! first contact immediately, follow-ups at +48h and +96h, and a final
//! close at +7 days. A processing pass picks up due steps, skips leads
//! that responded or can no longer be mailed, and retries provider
//! failures with doubling backoff until the attempt cap.

use crate::config::OutreachConfig;
use crate::db::{Db, LeadStatus, SequenceStep, StepStatus};
use crate::dispatch::{Dispatcher, SendMeta};
use crate::error::{Error, Result};
use crate::templates::{personalize, sequence_template};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Step number, template type, and delay from sequence creation
const SEQUENCE_PLAN: [(i64, &str, i64); 4] = [
    (1, "first_contact", 0),
    (2, "followup_1", 48),
    (3, "followup_2", 96),
    (4, "final_close", 168),
];

/// Steps handled per processing pass
const BATCH_LIMIT: i64 = 50;

/// Schedule the full outreach timeline for a lead. Any pending steps
/// from an earlier enrollment are cancelled first, so a lead never has
/// two live timelines.
pub async fn create_sequence(
    db: &Db,
    lead_id: &str,
    campaign_id: Option<&str>,
) -> Result<Vec<SequenceStep>> {
    let lead = db
        .get_lead(lead_id)
        .await?
        .ok_or_else(|| Error::LeadNotFound(lead_id.to_string()))?;

    let replaced = db.cancel_pending_steps(&lead.id).await?;
    if replaced > 0 {
        info!(
            "Cancelled {} pending step(s) for {} before re-enrollment",
            replaced, lead.business_name
        );
    }

    let now = Utc::now();
    let mut steps = Vec::with_capacity(SEQUENCE_PLAN.len());
    for (number, template_type, offset_hours) in SEQUENCE_PLAN {
        let step = SequenceStep::new(
            lead.id.clone(),
            campaign_id.map(str::to_string),
            number,
            template_type.to_string(),
            now + Duration::hours(offset_hours),
        );
        db.insert_step(&step).await?;
        steps.push(step);
    }

    info!(
        "Enrolled {} in the {}-step sequence",
        lead.business_name,
        steps.len()
    );
    Ok(steps)
}

/// Cancel a lead's pending steps. Returns how many were cancelled.
pub async fn cancel_sequence(db: &Db, lead_id: &str) -> Result<u64> {
    if db.get_lead(lead_id).await?.is_none() {
        return Err(Error::LeadNotFound(lead_id.to_string()));
    }
    db.cancel_pending_steps(lead_id).await
}

/// Outcome counters for one processing pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessStats {
    pub due: usize,
    pub sent: usize,
    pub skipped: usize,
    pub rescheduled: usize,
    pub failed: usize,
    /// True when the pass stopped early on the daily limit; remaining
    /// steps stay pending for the next pass
    pub quota_exhausted: bool,
}

/// Due-step processor
pub struct SequenceProcessor {
    db: Db,
    dispatcher: Dispatcher,
    send_delay_ms: u64,
    max_attempts: i64,
    retry_backoff_secs: i64,
}

impl SequenceProcessor {
    pub fn new(db: Db, dispatcher: Dispatcher, outreach: &OutreachConfig) -> Self {
        Self {
            db,
            dispatcher,
            send_delay_ms: outreach.send_delay_ms,
            max_attempts: outreach.max_attempts,
            retry_backoff_secs: outreach.retry_backoff_secs,
        }
    }

    /// Handle one batch of due steps
    pub async fn process_due(&self) -> Result<ProcessStats> {
        let steps = self
            .db
            .due_steps(&Utc::now().to_rfc3339(), BATCH_LIMIT)
            .await?;
        let mut stats = ProcessStats {
            due: steps.len(),
            ..Default::default()
        };
        info!("{} sequence step(s) due", steps.len());

        for (i, step) in steps.iter().enumerate() {
            if i > 0 && self.send_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.send_delay_ms)).await;
            }
            if !self.process_step(step, &mut stats).await? {
                break;
            }
        }
        Ok(stats)
    }

    /// Returns false when the pass should stop (daily limit reached)
    async fn process_step(&self, step: &SequenceStep, stats: &mut ProcessStats) -> Result<bool> {
        let lead = match self.db.get_lead(&step.lead_id).await? {
            Some(lead) => lead,
            None => {
                warn!("Step {} references a missing lead, skipping", step.id);
                self.db.set_step_status(&step.id, StepStatus::Skipped).await?;
                stats.skipped += 1;
                return Ok(true);
            }
        };

        // A lead that responded exits the sequence entirely
        let status = lead.get_status()?;
        if matches!(status, LeadStatus::Converted | LeadStatus::Qualified) {
            self.db.set_step_status(&step.id, StepStatus::Skipped).await?;
            self.db.cancel_pending_steps(&lead.id).await?;
            stats.skipped += 1;
            return Ok(true);
        }

        let template = match sequence_template(&step.template_type) {
            Some(t) => t,
            None => {
                warn!(
                    "Step {} has unknown template type '{}', skipping",
                    step.id, step.template_type
                );
                self.db.set_step_status(&step.id, StepStatus::Skipped).await?;
                stats.skipped += 1;
                return Ok(true);
            }
        };
        let subject = personalize(template.subject, &lead);
        let body = personalize(template.content, &lead);

        let meta = SendMeta {
            campaign_id: step.campaign_id.as_deref(),
            template_id: None,
            step_id: Some(&step.id),
        };
        match self.dispatcher.send_to_lead(&lead, &subject, &body, meta).await {
            Ok(_) => {
                stats.sent += 1;
                Ok(true)
            }
            Err(Error::NoEmail(_)) | Err(Error::Suppressed(_)) => {
                self.db.set_step_status(&step.id, StepStatus::Skipped).await?;
                stats.skipped += 1;
                Ok(true)
            }
            Err(Error::QuotaExhausted(limit)) => {
                info!("Daily limit of {} reached, pass stops here", limit);
                stats.quota_exhausted = true;
                Ok(false)
            }
            Err(e) => {
                let attempts = step.attempts + 1;
                if attempts >= self.max_attempts {
                    warn!(
                        "Step {} failed permanently after {} attempts: {}",
                        step.id, attempts, e
                    );
                    self.db.set_step_status(&step.id, StepStatus::Failed).await?;
                    stats.failed += 1;
                } else {
                    let backoff = self.retry_backoff_secs * (1 << (attempts - 1));
                    let retry_at = (Utc::now() + Duration::seconds(backoff)).to_rfc3339();
                    warn!(
                        "Step {} attempt {} failed ({}), retrying at {}",
                        step.id, attempts, e, retry_at
                    );
                    self.db.reschedule_step(&step.id, attempts, &retry_at).await?;
                    stats.rescheduled += 1;
                }
                Ok(true)
            }
        }
    }
}
