//! SQLite schema definition

/// SQL schema for the engine database
pub const SCHEMA_SQL: &str = r#"
-- Leads: discovered businesses with qualification state
CREATE TABLE IF NOT EXISTS leads (
    id TEXT PRIMARY KEY,
    business_name TEXT NOT NULL,
    category TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    website_url TEXT,
    source TEXT NOT NULL,
    website_status TEXT NOT NULL DEFAULT 'none',
    score INTEGER NOT NULL DEFAULT 0,
    lead_tier TEXT NOT NULL DEFAULT 'cold',
    status TEXT NOT NULL DEFAULT 'new',
    has_ssl INTEGER,
    is_mobile_friendly INTEGER,
    website_speed_score INTEGER,
    has_social_presence INTEGER,
    google_rating REAL,
    review_count INTEGER,
    last_analyzed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(business_name COLLATE NOCASE, city COLLATE NOCASE)
);

-- Discovery jobs: one-shot or daily-recurring collection runs
CREATE TABLE IF NOT EXISTS discovery_jobs (
    id TEXT PRIMARY KEY,
    location TEXT NOT NULL,
    categories_json TEXT NOT NULL,
    is_recurring INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    leads_found INTEGER NOT NULL DEFAULT 0,
    leads_saved INTEGER NOT NULL DEFAULT 0,
    last_run_at TEXT,
    next_run_at TEXT,
    created_at TEXT NOT NULL
);

-- Email sequences: one row per scheduled step of the 4-step timeline
CREATE TABLE IF NOT EXISTS email_sequences (
    id TEXT PRIMARY KEY,
    lead_id TEXT NOT NULL REFERENCES leads(id),
    campaign_id TEXT,
    sequence_step INTEGER NOT NULL,
    template_type TEXT NOT NULL,
    scheduled_at TEXT NOT NULL,
    sent_at TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Email logs: append-only from dispatch, updated by reconciliation
CREATE TABLE IF NOT EXISTS email_logs (
    id TEXT PRIMARY KEY,
    lead_id TEXT,
    campaign_id TEXT,
    template_id TEXT,
    message_id TEXT,
    to_email TEXT NOT NULL,
    subject TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'sent',
    sent_at TEXT NOT NULL,
    opened_at TEXT,
    clicked_at TEXT,
    replied_at TEXT,
    bounced_at TEXT
);

-- Daily send limits: one row per account
CREATE TABLE IF NOT EXISTS daily_send_limits (
    account_id TEXT PRIMARY KEY,
    daily_limit INTEGER NOT NULL DEFAULT 100,
    sent_today INTEGER NOT NULL DEFAULT 0,
    last_reset_date TEXT NOT NULL
);

-- Unsubscribes: permanent suppression list
CREATE TABLE IF NOT EXISTS unsubscribes (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    reason TEXT NOT NULL,
    unsubscribed_at TEXT NOT NULL
);

-- Templates: reference data for direct sends
CREATE TABLE IF NOT EXISTS templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    subject TEXT NOT NULL,
    content TEXT NOT NULL,
    usage_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status);
CREATE INDEX IF NOT EXISTS idx_leads_tier ON leads(lead_tier);
CREATE INDEX IF NOT EXISTS idx_leads_email ON leads(email COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_sequences_lead ON email_sequences(lead_id);
CREATE INDEX IF NOT EXISTS idx_sequences_due ON email_sequences(status, scheduled_at);
CREATE INDEX IF NOT EXISTS idx_logs_email ON email_logs(to_email COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_logs_message ON email_logs(message_id);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON discovery_jobs(status);
"#;
