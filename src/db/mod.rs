//! Engine state storage using SQLite
//!
//! This module handles all durable state including:
//! - Leads (discovered businesses and their qualification)
//! - Discovery jobs (one-shot and recurring collection runs)
//! - Email sequences (scheduled outreach steps)
//! - Email logs (send history, updated by reconciliation)
//! - Daily send limits and the unsubscribe suppression list

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Lead lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Unsubscribed,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadStatus::New => write!(f, "new"),
            LeadStatus::Contacted => write!(f, "contacted"),
            LeadStatus::Qualified => write!(f, "qualified"),
            LeadStatus::Converted => write!(f, "converted"),
            LeadStatus::Unsubscribed => write!(f, "unsubscribed"),
        }
    }
}

impl FromStr for LeadStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "qualified" => Ok(LeadStatus::Qualified),
            "converted" => Ok(LeadStatus::Converted),
            "unsubscribed" => Ok(LeadStatus::Unsubscribed),
            _ => Err(Error::Other(format!("Unknown lead status: {}", s))),
        }
    }
}

/// Coarse qualification bucket derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadTier {
    Hot,
    Warm,
    Cold,
}

impl std::fmt::Display for LeadTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadTier::Hot => write!(f, "hot"),
            LeadTier::Warm => write!(f, "warm"),
            LeadTier::Cold => write!(f, "cold"),
        }
    }
}

impl FromStr for LeadTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hot" => Ok(LeadTier::Hot),
            "warm" => Ok(LeadTier::Warm),
            "cold" => Ok(LeadTier::Cold),
            _ => Err(Error::Other(format!("Unknown lead tier: {}", s))),
        }
    }
}

/// Observed state of a lead's website. Every site-having lead starts
/// as `outdated` until analysis says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebsiteStatus {
    None,
    Outdated,
    Broken,
}

impl std::fmt::Display for WebsiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebsiteStatus::None => write!(f, "none"),
            WebsiteStatus::Outdated => write!(f, "outdated"),
            WebsiteStatus::Broken => write!(f, "broken"),
        }
    }
}

impl FromStr for WebsiteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(WebsiteStatus::None),
            "outdated" => Ok(WebsiteStatus::Outdated),
            "broken" => Ok(WebsiteStatus::Broken),
            _ => Err(Error::Other(format!("Unknown website status: {}", s))),
        }
    }
}

/// Discovery job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(Error::Other(format!("Unknown job status: {}", s))),
        }
    }
}

/// Sequence step status; everything but `pending` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Sent,
    Skipped,
    Cancelled,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Sent => write!(f, "sent"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Cancelled => write!(f, "cancelled"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for StepStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "sent" => Ok(StepStatus::Sent),
            "skipped" => Ok(StepStatus::Skipped),
            "cancelled" => Ok(StepStatus::Cancelled),
            "failed" => Ok(StepStatus::Failed),
            _ => Err(Error::Other(format!("Unknown step status: {}", s))),
        }
    }
}

/// Email log status, advanced by delivery events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Sent,
    Opened,
    Clicked,
    Bounced,
    Spam,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatus::Sent => write!(f, "sent"),
            LogStatus::Opened => write!(f, "opened"),
            LogStatus::Clicked => write!(f, "clicked"),
            LogStatus::Bounced => write!(f, "bounced"),
            LogStatus::Spam => write!(f, "spam"),
        }
    }
}

impl FromStr for LogStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sent" => Ok(LogStatus::Sent),
            "opened" => Ok(LogStatus::Opened),
            "clicked" => Ok(LogStatus::Clicked),
            "bounced" => Ok(LogStatus::Bounced),
            "spam" => Ok(LogStatus::Spam),
            _ => Err(Error::Other(format!("Unknown log status: {}", s))),
        }
    }
}

/// A discovered business with its qualification state
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub business_name: String,
    pub category: String,
    pub city: String,
    pub state: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website_url: Option<String>,
    pub source: String,
    pub website_status: String,
    pub score: i64,
    pub lead_tier: String,
    pub status: String,
    pub has_ssl: Option<bool>,
    pub is_mobile_friendly: Option<bool>,
    pub website_speed_score: Option<i64>,
    pub has_social_presence: Option<bool>,
    pub google_rating: Option<f64>,
    pub review_count: Option<i64>,
    pub last_analyzed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Lead {
    pub fn new(business_name: String, category: String, city: String, state: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            business_name,
            category,
            city,
            state,
            email: None,
            phone: None,
            website_url: None,
            source: "manual".to_string(),
            website_status: WebsiteStatus::None.to_string(),
            score: 0,
            lead_tier: LeadTier::Cold.to_string(),
            status: LeadStatus::New.to_string(),
            has_ssl: None,
            is_mobile_friendly: None,
            website_speed_score: None,
            has_social_presence: None,
            google_rating: None,
            review_count: None,
            last_analyzed_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn get_status(&self) -> Result<LeadStatus> {
        self.status.parse()
    }

    pub fn get_website_status(&self) -> Result<WebsiteStatus> {
        self.website_status.parse()
    }
}

/// A one-shot or daily-recurring discovery run
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub id: String,
    pub location: String,
    pub categories_json: String,
    pub is_recurring: bool,
    pub status: String,
    pub leads_found: i64,
    pub leads_saved: i64,
    pub last_run_at: Option<String>,
    pub next_run_at: Option<String>,
    pub created_at: String,
}

impl DiscoveryJob {
    pub fn new(location: String, categories: &[String], is_recurring: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            location,
            categories_json: serde_json::to_string(categories).unwrap_or_default(),
            is_recurring,
            status: JobStatus::Pending.to_string(),
            leads_found: 0,
            leads_saved: 0,
            last_run_at: None,
            next_run_at: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn categories(&self) -> Vec<String> {
        serde_json::from_str(&self.categories_json).unwrap_or_default()
    }
}

/// One scheduled step of a lead's outreach timeline
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SequenceStep {
    pub id: String,
    pub lead_id: String,
    pub campaign_id: Option<String>,
    pub sequence_step: i64,
    pub template_type: String,
    pub scheduled_at: String,
    pub sent_at: Option<String>,
    pub status: String,
    pub attempts: i64,
    pub created_at: String,
}

impl SequenceStep {
    pub fn new(
        lead_id: String,
        campaign_id: Option<String>,
        sequence_step: i64,
        template_type: String,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lead_id,
            campaign_id,
            sequence_step,
            template_type,
            scheduled_at: scheduled_at.to_rfc3339(),
            sent_at: None,
            status: StepStatus::Pending.to_string(),
            attempts: 0,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A sent email, updated in place by the reconciler
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: String,
    pub lead_id: Option<String>,
    pub campaign_id: Option<String>,
    pub template_id: Option<String>,
    pub message_id: Option<String>,
    pub to_email: String,
    pub subject: String,
    pub status: String,
    pub sent_at: String,
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub replied_at: Option<String>,
    pub bounced_at: Option<String>,
}

impl EmailLog {
    pub fn new(to_email: String, subject: String, message_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lead_id: None,
            campaign_id: None,
            template_id: None,
            message_id: Some(message_id),
            to_email,
            subject,
            status: LogStatus::Sent.to_string(),
            sent_at: Utc::now().to_rfc3339(),
            opened_at: None,
            clicked_at: None,
            replied_at: None,
            bounced_at: None,
        }
    }
}

/// Per-account daily send counter
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DailySendLimit {
    pub account_id: String,
    pub daily_limit: i64,
    pub sent_today: i64,
    pub last_reset_date: String,
}

/// A suppressed recipient address
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub id: String,
    pub email: String,
    pub reason: String,
    pub unsubscribed_at: String,
}

/// A reusable email template for direct sends
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub content: String,
    pub usage_count: i64,
    pub created_at: String,
}

impl Template {
    pub fn new(name: String, subject: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            subject,
            content,
            usage_count: 0,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Everything written in one transaction after a successful provider send
#[derive(Debug)]
pub struct SendOutcome<'a> {
    pub log: &'a EmailLog,
    /// Template whose usage counter should be bumped
    pub template_id: Option<&'a str>,
    /// Sequence step to mark sent
    pub step_id: Option<&'a str>,
    /// Lead to advance new -> contacted
    pub contact_lead_id: Option<&'a str>,
}

/// Today's date key for quota rollover
pub fn today_string() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Engine database handle
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open the database, creating the file and schema if needed
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='leads'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Lead Operations =====

    /// Insert a lead, absorbing duplicates on (business_name, city).
    /// Returns true if a row was written.
    pub async fn insert_lead(&self, lead: &Lead) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO leads (
                id, business_name, category, city, state, email, phone, website_url,
                source, website_status, score, lead_tier, status,
                has_ssl, is_mobile_friendly, website_speed_score, has_social_presence,
                google_rating, review_count, last_analyzed_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&lead.id)
        .bind(&lead.business_name)
        .bind(&lead.category)
        .bind(&lead.city)
        .bind(&lead.state)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.website_url)
        .bind(&lead.source)
        .bind(&lead.website_status)
        .bind(lead.score)
        .bind(&lead.lead_tier)
        .bind(&lead.status)
        .bind(lead.has_ssl)
        .bind(lead.is_mobile_friendly)
        .bind(lead.website_speed_score)
        .bind(lead.has_social_presence)
        .bind(lead.google_rating)
        .bind(lead.review_count)
        .bind(&lead.last_analyzed_at)
        .bind(&lead.created_at)
        .bind(&lead.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get lead by ID
    pub async fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    /// List all leads, newest first
    pub async fn list_leads(&self) -> Result<Vec<Lead>> {
        let leads = sqlx::query_as::<_, Lead>("SELECT * FROM leads ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(leads)
    }

    /// List leads filtered by tier
    pub async fn list_leads_by_tier(&self, tier: LeadTier) -> Result<Vec<Lead>> {
        let leads = sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE lead_tier = ? ORDER BY score DESC, created_at DESC",
        )
        .bind(tier.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(leads)
    }

    /// Update a lead's lifecycle status
    pub async fn set_lead_status(&self, id: &str, status: LeadStatus) -> Result<()> {
        sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update a lead's website status (e.g. broken after a failed fetch)
    pub async fn set_website_status(&self, id: &str, status: WebsiteStatus) -> Result<()> {
        sqlx::query("UPDATE leads SET website_status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite score and tier
    pub async fn set_score(&self, id: &str, score: i64, tier: LeadTier) -> Result<()> {
        sqlx::query("UPDATE leads SET score = ?, lead_tier = ?, updated_at = ? WHERE id = ?")
            .bind(score)
            .bind(tier.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite technical signals plus the superseding score and tier
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_analysis(
        &self,
        id: &str,
        has_ssl: Option<bool>,
        is_mobile_friendly: Option<bool>,
        website_speed_score: Option<i64>,
        has_social_presence: Option<bool>,
        score: i64,
        tier: LeadTier,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE leads SET
                has_ssl = ?,
                is_mobile_friendly = ?,
                website_speed_score = ?,
                has_social_presence = ?,
                score = ?,
                lead_tier = ?,
                last_analyzed_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(has_ssl)
        .bind(is_mobile_friendly)
        .bind(website_speed_score)
        .bind(has_social_presence)
        .bind(score)
        .bind(tier.to_string())
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Leads whose contact address matches, case-insensitively
    pub async fn leads_by_email(&self, email: &str) -> Result<Vec<Lead>> {
        let leads =
            sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE email = ? COLLATE NOCASE")
                .bind(email)
                .fetch_all(&self.pool)
                .await?;
        Ok(leads)
    }

    /// Mark every lead with this address unsubscribed. Returns rows changed.
    pub async fn mark_unsubscribed_by_email(&self, email: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE leads SET status = ?, updated_at = ? WHERE email = ? COLLATE NOCASE",
        )
        .bind(LeadStatus::Unsubscribed.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ===== Discovery Job Operations =====

    /// Insert a new discovery job
    pub async fn insert_job(&self, job: &DiscoveryJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO discovery_jobs (
                id, location, categories_json, is_recurring, status,
                leads_found, leads_saved, last_run_at, next_run_at, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.location)
        .bind(&job.categories_json)
        .bind(job.is_recurring)
        .bind(&job.status)
        .bind(job.leads_found)
        .bind(job.leads_saved)
        .bind(&job.last_run_at)
        .bind(&job.next_run_at)
        .bind(&job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get job by ID
    pub async fn get_job(&self, id: &str) -> Result<Option<DiscoveryJob>> {
        let job = sqlx::query_as::<_, DiscoveryJob>("SELECT * FROM discovery_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// List all jobs
    pub async fn list_jobs(&self) -> Result<Vec<DiscoveryJob>> {
        let jobs = sqlx::query_as::<_, DiscoveryJob>(
            "SELECT * FROM discovery_jobs ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// Jobs due to run: pending, or recurring with next_run_at in the past
    pub async fn due_jobs(&self, now: &str, limit: i64) -> Result<Vec<DiscoveryJob>> {
        let jobs = sqlx::query_as::<_, DiscoveryJob>(
            r#"
            SELECT * FROM discovery_jobs
            WHERE status = 'pending'
               OR (is_recurring = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?)
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// Set job status only
    pub async fn set_job_status(&self, id: &str, status: JobStatus) -> Result<()> {
        sqlx::query("UPDATE discovery_jobs SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a finished run, including the next schedule for recurring jobs
    pub async fn finish_job(
        &self,
        id: &str,
        status: JobStatus,
        leads_found: i64,
        leads_saved: i64,
        next_run_at: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE discovery_jobs SET
                status = ?,
                leads_found = ?,
                leads_saved = ?,
                last_run_at = ?,
                next_run_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.to_string())
        .bind(leads_found)
        .bind(leads_saved)
        .bind(Utc::now().to_rfc3339())
        .bind(next_run_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Sequence Operations =====

    /// Insert one scheduled step
    pub async fn insert_step(&self, step: &SequenceStep) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_sequences (
                id, lead_id, campaign_id, sequence_step, template_type,
                scheduled_at, sent_at, status, attempts, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&step.id)
        .bind(&step.lead_id)
        .bind(&step.campaign_id)
        .bind(step.sequence_step)
        .bind(&step.template_type)
        .bind(&step.scheduled_at)
        .bind(&step.sent_at)
        .bind(&step.status)
        .bind(step.attempts)
        .bind(&step.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cancel every pending step for a lead. Returns rows changed.
    pub async fn cancel_pending_steps(&self, lead_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE email_sequences SET status = 'cancelled' WHERE lead_id = ? AND status = 'pending'",
        )
        .bind(lead_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Pending steps whose scheduled time has passed
    pub async fn due_steps(&self, now: &str, limit: i64) -> Result<Vec<SequenceStep>> {
        let steps = sqlx::query_as::<_, SequenceStep>(
            r#"
            SELECT * FROM email_sequences
            WHERE status = 'pending' AND scheduled_at <= ?
            ORDER BY scheduled_at
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(steps)
    }

    /// All steps for a lead, in step order
    pub async fn steps_for_lead(&self, lead_id: &str) -> Result<Vec<SequenceStep>> {
        let steps = sqlx::query_as::<_, SequenceStep>(
            "SELECT * FROM email_sequences WHERE lead_id = ? ORDER BY sequence_step",
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(steps)
    }

    /// Set a step's terminal status
    pub async fn set_step_status(&self, id: &str, status: StepStatus) -> Result<()> {
        sqlx::query("UPDATE email_sequences SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Push a failed step into the future and bump its attempt counter
    pub async fn reschedule_step(&self, id: &str, attempts: i64, scheduled_at: &str) -> Result<()> {
        sqlx::query("UPDATE email_sequences SET attempts = ?, scheduled_at = ? WHERE id = ?")
            .bind(attempts)
            .bind(scheduled_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Email Log Operations =====

    /// Insert a log row outside of a send transaction (tests, imports)
    pub async fn insert_log(&self, log: &EmailLog) -> Result<()> {
        Self::insert_log_query(log).execute(&self.pool).await?;
        Ok(())
    }

    fn insert_log_query(
        log: &EmailLog,
    ) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO email_logs (
                id, lead_id, campaign_id, template_id, message_id, to_email, subject,
                status, sent_at, opened_at, clicked_at, replied_at, bounced_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.lead_id)
        .bind(&log.campaign_id)
        .bind(&log.template_id)
        .bind(&log.message_id)
        .bind(&log.to_email)
        .bind(&log.subject)
        .bind(&log.status)
        .bind(&log.sent_at)
        .bind(&log.opened_at)
        .bind(&log.clicked_at)
        .bind(&log.replied_at)
        .bind(&log.bounced_at)
    }

    /// Get log row by ID
    pub async fn get_log(&self, id: &str) -> Result<Option<EmailLog>> {
        let log = sqlx::query_as::<_, EmailLog>("SELECT * FROM email_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(log)
    }

    /// Find the log row carrying this provider message ID
    pub async fn log_by_message_id(&self, message_id: &str) -> Result<Option<EmailLog>> {
        let log = sqlx::query_as::<_, EmailLog>("SELECT * FROM email_logs WHERE message_id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(log)
    }

    /// Most recent log row for a recipient address
    pub async fn latest_log_for_email(&self, email: &str) -> Result<Option<EmailLog>> {
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            SELECT * FROM email_logs
            WHERE to_email = ? COLLATE NOCASE
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(log)
    }

    /// Record an open event
    pub async fn mark_log_opened(&self, id: &str, timestamp: &str) -> Result<()> {
        sqlx::query("UPDATE email_logs SET opened_at = ?, status = 'opened' WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a click event
    pub async fn mark_log_clicked(&self, id: &str, timestamp: &str) -> Result<()> {
        sqlx::query("UPDATE email_logs SET clicked_at = ?, status = 'clicked' WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a bounce or drop event
    pub async fn mark_log_bounced(&self, id: &str, timestamp: &str) -> Result<()> {
        sqlx::query("UPDATE email_logs SET bounced_at = ?, status = 'bounced' WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a spam report
    pub async fn mark_log_spam(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE email_logs SET status = 'spam' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Write everything that follows a successful provider send in one
    /// transaction: the log row, template usage, the step's sent status,
    /// and the first-contact lead advancement.
    pub async fn record_send(&self, outcome: SendOutcome<'_>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        Self::insert_log_query(outcome.log).execute(&mut *tx).await?;

        if let Some(template_id) = outcome.template_id {
            sqlx::query("UPDATE templates SET usage_count = usage_count + 1 WHERE id = ?")
                .bind(template_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(step_id) = outcome.step_id {
            sqlx::query("UPDATE email_sequences SET status = 'sent', sent_at = ? WHERE id = ?")
                .bind(&outcome.log.sent_at)
                .bind(step_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(lead_id) = outcome.contact_lead_id {
            sqlx::query(
                "UPDATE leads SET status = 'contacted', updated_at = ? WHERE id = ? AND status = 'new'",
            )
            .bind(&outcome.log.sent_at)
            .bind(lead_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ===== Daily Quota Operations =====

    /// Get the quota row for an account
    pub async fn quota_row(&self, account_id: &str) -> Result<Option<DailySendLimit>> {
        let row = sqlx::query_as::<_, DailySendLimit>(
            "SELECT * FROM daily_send_limits WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Create the quota row if missing
    pub async fn ensure_quota_row(&self, account_id: &str, daily_limit: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO daily_send_limits (account_id, daily_limit, sent_today, last_reset_date)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(account_id)
        .bind(daily_limit)
        .bind(today_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Lazy date rollover: zero the counter when the stored date is stale
    pub async fn rollover_quota(&self, account_id: &str, today: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE daily_send_limits
            SET sent_today = 0, last_reset_date = ?
            WHERE account_id = ? AND last_reset_date != ?
            "#,
        )
        .bind(today)
        .bind(account_id)
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically reserve one send slot. Returns false when the cap is hit.
    pub async fn try_reserve_slot(&self, account_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE daily_send_limits
            SET sent_today = sent_today + 1
            WHERE account_id = ? AND sent_today < daily_limit
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return a reserved slot after a failed dispatch
    pub async fn release_slot(&self, account_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE daily_send_limits
            SET sent_today = MAX(sent_today - 1, 0)
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Suppression Operations =====

    /// True iff the address is on the suppression list (case-insensitive)
    pub async fn is_suppressed(&self, email: &str) -> Result<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM unsubscribes WHERE email = ? COLLATE NOCASE")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Add an address to the suppression list; re-adding updates the reason
    pub async fn upsert_unsubscribe(&self, email: &str, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO unsubscribes (id, email, reason, unsubscribed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET reason = excluded.reason
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(reason)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Template Operations =====

    /// Insert a template
    pub async fn insert_template(&self, template: &Template) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, name, subject, content, usage_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.subject)
        .bind(&template.content)
        .bind(template.usage_count)
        .bind(&template.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get template by ID
    pub async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        let template = sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(template)
    }

    // ===== Statistics =====

    /// Global counts for the status command
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let lead_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;
        let hot: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE lead_tier = 'hot'")
            .fetch_one(&self.pool)
            .await?;
        let warm: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE lead_tier = 'warm'")
            .fetch_one(&self.pool)
            .await?;
        let cold: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE lead_tier = 'cold'")
            .fetch_one(&self.pool)
            .await?;
        let pending_steps: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM email_sequences WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        let sent_steps: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM email_sequences WHERE status = 'sent'")
                .fetch_one(&self.pool)
                .await?;
        let failed_steps: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM email_sequences WHERE status = 'failed'")
                .fetch_one(&self.pool)
                .await?;
        let emails_sent: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_logs")
            .fetch_one(&self.pool)
            .await?;
        let emails_opened: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM email_logs WHERE opened_at IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        let suppressed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unsubscribes")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            lead_count: lead_count as usize,
            hot_leads: hot as usize,
            warm_leads: warm as usize,
            cold_leads: cold as usize,
            pending_steps: pending_steps as usize,
            sent_steps: sent_steps as usize,
            failed_steps: failed_steps as usize,
            emails_sent: emails_sent as usize,
            emails_opened: emails_opened as usize,
            suppressed: suppressed as usize,
        })
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub lead_count: usize,
    pub hot_leads: usize,
    pub warm_leads: usize,
    pub cold_leads: usize,
    pub pending_steps: usize,
    pub sent_steps: usize,
    pub failed_steps: usize,
    pub emails_sent: usize,
    pub emails_opened: usize,
    pub suppressed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (Db, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    #[tokio::test]
    async fn test_lead_duplicate_absorbed() {
        let (db, _tmp) = setup_test_db().await;

        let lead = Lead::new(
            "Joe's Plumbing".to_string(),
            "Plumbing".to_string(),
            "Austin".to_string(),
            "TX".to_string(),
        );
        assert!(db.insert_lead(&lead).await.unwrap());

        // Same (name, city) key, different casing: absorbed, not an error
        let dup = Lead::new(
            "joe's plumbing".to_string(),
            "Plumbing".to_string(),
            "austin".to_string(),
            "TX".to_string(),
        );
        assert!(!db.insert_lead(&dup).await.unwrap());

        let leads = db.list_leads().await.unwrap();
        assert_eq!(leads.len(), 1);
    }

    #[tokio::test]
    async fn test_lead_status_updates() {
        let (db, _tmp) = setup_test_db().await;

        let mut lead = Lead::new(
            "Acme".to_string(),
            "Roofing".to_string(),
            "Dallas".to_string(),
            "TX".to_string(),
        );
        lead.email = Some("info@acme.com".to_string());
        db.insert_lead(&lead).await.unwrap();

        db.set_lead_status(&lead.id, LeadStatus::Qualified)
            .await
            .unwrap();
        let loaded = db.get_lead(&lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.get_status().unwrap(), LeadStatus::Qualified);

        let changed = db.mark_unsubscribed_by_email("INFO@ACME.COM").await.unwrap();
        assert_eq!(changed, 1);
        let loaded = db.get_lead(&lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.get_status().unwrap(), LeadStatus::Unsubscribed);
    }

    #[tokio::test]
    async fn test_suppression_case_insensitive() {
        let (db, _tmp) = setup_test_db().await;

        assert!(!db.is_suppressed("someone@example.com").await.unwrap());
        db.upsert_unsubscribe("Someone@Example.com", "user_requested")
            .await
            .unwrap();
        assert!(db.is_suppressed("someone@example.com").await.unwrap());

        // Re-adding is idempotent
        db.upsert_unsubscribe("someone@example.com", "Marked as spam")
            .await
            .unwrap();
        assert!(db.is_suppressed("SOMEONE@EXAMPLE.COM").await.unwrap());
    }

    #[tokio::test]
    async fn test_quota_reserve_and_release() {
        let (db, _tmp) = setup_test_db().await;

        db.ensure_quota_row("acct", 2).await.unwrap();
        assert!(db.try_reserve_slot("acct").await.unwrap());
        assert!(db.try_reserve_slot("acct").await.unwrap());
        assert!(!db.try_reserve_slot("acct").await.unwrap());

        db.release_slot("acct").await.unwrap();
        assert!(db.try_reserve_slot("acct").await.unwrap());

        let row = db.quota_row("acct").await.unwrap().unwrap();
        assert_eq!(row.sent_today, 2);
    }

    #[tokio::test]
    async fn test_quota_rollover() {
        let (db, _tmp) = setup_test_db().await;

        db.ensure_quota_row("acct", 1).await.unwrap();
        assert!(db.try_reserve_slot("acct").await.unwrap());
        assert!(!db.try_reserve_slot("acct").await.unwrap());

        // Same day: rollover is a no-op
        db.rollover_quota("acct", &today_string()).await.unwrap();
        assert!(!db.try_reserve_slot("acct").await.unwrap());

        // New day observed lazily: counter resets
        db.rollover_quota("acct", "2099-01-01").await.unwrap();
        assert!(db.try_reserve_slot("acct").await.unwrap());
    }

    #[tokio::test]
    async fn test_due_steps_and_cancel() {
        let (db, _tmp) = setup_test_db().await;

        let lead = Lead::new(
            "Acme".to_string(),
            "Roofing".to_string(),
            "Dallas".to_string(),
            "TX".to_string(),
        );
        db.insert_lead(&lead).await.unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        let future = Utc::now() + chrono::Duration::hours(48);
        let due = SequenceStep::new(lead.id.clone(), None, 1, "first_contact".to_string(), past);
        let later = SequenceStep::new(lead.id.clone(), None, 2, "followup_1".to_string(), future);
        db.insert_step(&due).await.unwrap();
        db.insert_step(&later).await.unwrap();

        let due_now = db.due_steps(&Utc::now().to_rfc3339(), 50).await.unwrap();
        assert_eq!(due_now.len(), 1);
        assert_eq!(due_now[0].id, due.id);

        let cancelled = db.cancel_pending_steps(&lead.id).await.unwrap();
        assert_eq!(cancelled, 2);
        assert!(db
            .due_steps(&Utc::now().to_rfc3339(), 50)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_record_send_transaction() {
        let (db, _tmp) = setup_test_db().await;

        let lead = Lead::new(
            "Acme".to_string(),
            "Roofing".to_string(),
            "Dallas".to_string(),
            "TX".to_string(),
        );
        db.insert_lead(&lead).await.unwrap();

        let step = SequenceStep::new(
            lead.id.clone(),
            None,
            1,
            "first_contact".to_string(),
            Utc::now(),
        );
        db.insert_step(&step).await.unwrap();

        let template = Template::new(
            "intro".to_string(),
            "Hello".to_string(),
            "Hi {{business_name}}".to_string(),
        );
        db.insert_template(&template).await.unwrap();

        let mut log = EmailLog::new(
            "info@acme.com".to_string(),
            "Hello".to_string(),
            "msg-1".to_string(),
        );
        log.lead_id = Some(lead.id.clone());
        log.template_id = Some(template.id.clone());

        db.record_send(SendOutcome {
            log: &log,
            template_id: Some(&template.id),
            step_id: Some(&step.id),
            contact_lead_id: Some(&lead.id),
        })
        .await
        .unwrap();

        let loaded = db.log_by_message_id("msg-1").await.unwrap().unwrap();
        assert_eq!(loaded.to_email, "info@acme.com");
        let steps = db.steps_for_lead(&lead.id).await.unwrap();
        assert_eq!(steps[0].status, "sent");
        assert!(steps[0].sent_at.is_some());
        let lead = db.get_lead(&lead.id).await.unwrap().unwrap();
        assert_eq!(lead.get_status().unwrap(), LeadStatus::Contacted);
        let template = db.get_template(&template.id).await.unwrap().unwrap();
        assert_eq!(template.usage_count, 1);
    }

    #[tokio::test]
    async fn test_latest_log_for_email() {
        let (db, _tmp) = setup_test_db().await;

        let mut older = EmailLog::new(
            "a@example.com".to_string(),
            "first".to_string(),
            "msg-a".to_string(),
        );
        older.sent_at = "2024-01-01T00:00:00+00:00".to_string();
        let mut newer = EmailLog::new(
            "A@Example.com".to_string(),
            "second".to_string(),
            "msg-b".to_string(),
        );
        newer.sent_at = "2024-02-01T00:00:00+00:00".to_string();
        db.insert_log(&older).await.unwrap();
        db.insert_log(&newer).await.unwrap();

        let latest = db.latest_log_for_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(latest.subject, "second");
    }
}
