//! Email discovery enrichment
//!
//! Optional lookup of a contact address for a discovered business via a
//! Hunter-style API. Degrades gracefully: any failure here produces "no
//! email found", never an error, and a low-confidence generated guess
//! exists as a last resort for listings with a phone number.

use crate::config::EnrichConfig;
use crate::error::Result;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Generic inbox prefixes preferred over personal addresses
const GENERIC_PREFIXES: [&str; 4] = ["info@", "contact@", "hello@", "sales@"];

#[derive(Debug, Deserialize)]
struct DomainSearchResponse {
    #[serde(default)]
    data: Option<DomainSearchData>,
}

#[derive(Debug, Deserialize)]
struct DomainSearchData {
    #[serde(default)]
    emails: Vec<DomainEmail>,
}

#[derive(Debug, Deserialize)]
struct DomainEmail {
    value: String,
    #[serde(default)]
    confidence: i64,
}

#[derive(Debug, Deserialize)]
struct EmailFinderResponse {
    #[serde(default)]
    data: Option<EmailFinderData>,
}

#[derive(Debug, Deserialize)]
struct EmailFinderData {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    score: i64,
}

/// Email discovery client
pub struct EmailFinder {
    client: Client,
    base_url: String,
    api_key: String,
    min_confidence: i64,
}

impl EmailFinder {
    pub fn new(config: &EnrichConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            min_confidence: config.min_confidence,
        })
    }

    /// Best-confidence email for a business, or None. Errors are logged
    /// and swallowed; enrichment never fails a discovery run.
    pub async fn find_email(&self, business_name: &str, website_url: Option<&str>) -> Option<String> {
        match self.try_find_email(business_name, website_url).await {
            Ok(email) => email,
            Err(e) => {
                warn!("Email discovery failed for {}: {}", business_name, e);
                None
            }
        }
    }

    async fn try_find_email(
        &self,
        business_name: &str,
        website_url: Option<&str>,
    ) -> Result<Option<String>> {
        // Domain search against the business's own site first
        if let Some(url) = website_url {
            let domain = clean_domain(url);
            if let Some(email) = self.domain_search(&domain).await? {
                debug!("Found email via domain search for {}: {}", business_name, email);
                return Ok(Some(email));
            }
        }

        // Fall back to the email finder against a guessed domain
        let guessed_domain = format!("{}.com", slugify(business_name));
        let response = self
            .client
            .get(format!("{}/email-finder", self.base_url))
            .query(&[
                ("domain", guessed_domain.as_str()),
                ("first_name", "info"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let parsed: EmailFinderResponse = response.json().await?;
        if let Some(data) = parsed.data {
            if let Some(email) = data.email {
                if data.score > self.min_confidence {
                    return Ok(Some(email.to_lowercase()));
                }
            }
        }
        Ok(None)
    }

    async fn domain_search(&self, domain: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/domain-search", self.base_url))
            .query(&[("domain", domain), ("api_key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let parsed: DomainSearchResponse = response.json().await?;
        let emails = match parsed.data {
            Some(data) if !data.emails.is_empty() => data.emails,
            _ => return Ok(None),
        };

        // Prefer generic inboxes, then highest confidence
        if let Some(generic) = emails
            .iter()
            .find(|e| GENERIC_PREFIXES.iter().any(|p| e.value.starts_with(p)))
        {
            return Ok(Some(generic.value.to_lowercase()));
        }

        let best = emails
            .into_iter()
            .max_by_key(|e| e.confidence)
            .map(|e| e.value.to_lowercase());
        Ok(best)
    }
}

/// Low-confidence fallback: guess a generic inbox from the business name
pub fn guess_email(business_name: &str) -> String {
    let slug: String = slugify(business_name).chars().take(20).collect();
    format!("info@{}.com", slug)
}

/// Strip scheme, path, and www. from a URL to get a bare domain
fn clean_domain(url: &str) -> String {
    let re = Regex::new(r"^https?://").unwrap();
    let stripped = re.replace(url, "");
    let domain = stripped.split('/').next().unwrap_or("");
    domain.trim_start_matches("www.").to_string()
}

/// Lowercase, strip non-alphanumerics, collapse whitespace away
fn slugify(name: &str) -> String {
    let re = Regex::new(r"[^a-z0-9\s]").unwrap();
    let lowered = name.to_lowercase();
    let cleaned = re.replace_all(&lowered, "");
    cleaned.split_whitespace().collect()
}
