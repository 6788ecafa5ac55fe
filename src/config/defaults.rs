//! Default values for configuration

/// Default account identifier for the daily send quota
pub fn default_account_id() -> String {
    "default".to_string()
}

/// Default country filter for discovered businesses
pub fn default_country() -> String {
    "US".to_string()
}

/// Default business directory API base URL
pub fn default_directory_base_url() -> String {
    std::env::var("PROSPECTOR_DIRECTORY_URL")
        .unwrap_or_else(|_| "https://api.yelp.com/v3".to_string())
}

/// Default environment variable name for the directory API key
pub fn default_directory_api_key_env() -> String {
    "YELP_API_KEY".to_string()
}

/// Default directory request timeout in seconds
pub fn default_directory_timeout() -> u64 {
    15
}

/// Default per-category result cap (directory API maximum)
pub fn default_directory_limit() -> u32 {
    50
}

/// Default email discovery API base URL
pub fn default_enrich_base_url() -> String {
    std::env::var("PROSPECTOR_ENRICH_URL")
        .unwrap_or_else(|_| "https://api.hunter.io/v2".to_string())
}

/// Default environment variable name for the email discovery API key
pub fn default_enrich_api_key_env() -> String {
    "HUNTER_API_KEY".to_string()
}

/// Default email discovery request timeout in seconds
pub fn default_enrich_timeout() -> u64 {
    15
}

/// Minimum confidence for an email-finder result to be accepted
pub fn default_enrich_min_confidence() -> i64 {
    50
}

/// Default website analysis fetch timeout in seconds
pub fn default_analyze_timeout() -> u64 {
    10
}

/// Default user agent for website analysis fetches
pub fn default_analyze_user_agent() -> String {
    "Mozilla/5.0 (compatible; prospector/0.1)".to_string()
}

/// Default transactional email provider base URL
pub fn default_delivery_base_url() -> String {
    std::env::var("PROSPECTOR_DELIVERY_URL")
        .unwrap_or_else(|_| "https://api.sendgrid.com/v3".to_string())
}

/// Default environment variable name for the email provider API key
pub fn default_delivery_api_key_env() -> String {
    "SENDGRID_API_KEY".to_string()
}

/// Default email provider request timeout in seconds
pub fn default_delivery_timeout() -> u64 {
    30
}

/// Default sender display name
pub fn default_from_name() -> String {
    "Website Services".to_string()
}

/// Default delay between consecutive sends in one pass (milliseconds)
pub fn default_send_delay_ms() -> u64 {
    200
}

/// Default maximum dispatch attempts per sequence step
pub fn default_max_attempts() -> i64 {
    3
}

/// Default retry backoff base in seconds (doubled per attempt)
pub fn default_retry_backoff_secs() -> i64 {
    3600
}

/// Default daily send limit for a new account
pub fn default_daily_limit() -> i64 {
    100
}
