//! Lead discovery
//!
//! Turns directory search results into persisted leads: one search per
//! category, country filtering, optional email enrichment, in-memory
//! deduplication within the batch, then a single persistence pass where
//! the unique index absorbs anything already known. A failed category
//! never aborts the run.

use crate::config::Config;
use crate::db::{Db, DiscoveryJob, JobStatus, Lead, WebsiteStatus};
use crate::directory::DirectoryClient;
use crate::enrich::{guess_email, EmailFinder};
use crate::error::Result;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Provisional scores before any website analysis has run. A business
/// with no website at all is the strongest signal this outreach has.
const SCORE_NO_WEBSITE: i64 = 85;
const SCORE_HAS_WEBSITE: i64 = 50;

/// Outcome of one discovery run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryStats {
    /// Candidates passing the country filter, before deduplication
    pub found: usize,
    /// New rows actually written
    pub saved: usize,
    /// Absorbed within the batch or by the unique index
    pub duplicates: usize,
    /// Categories whose search failed and was skipped
    pub failed_categories: Vec<String>,
}

/// Discovery pipeline: directory search through lead persistence
pub struct Discoverer {
    db: Db,
    directory: DirectoryClient,
    finder: Option<EmailFinder>,
    country: String,
    limit: u32,
}

impl Discoverer {
    pub fn new(db: Db, config: &Config) -> Result<Self> {
        let directory = DirectoryClient::new(&config.directory, config.directory_api_key()?)?;
        let finder = match config.enrich_api_key() {
            Some(key) => Some(EmailFinder::new(&config.enrich, key)?),
            None => None,
        };
        Ok(Self {
            db,
            directory,
            finder,
            country: config.country.clone(),
            limit: config.directory.limit,
        })
    }

    /// Run discovery for one location across a list of categories
    pub async fn discover(&self, location: &str, categories: &[String]) -> Result<DiscoveryStats> {
        let mut stats = DiscoveryStats::default();
        // Batch-level dedup on (name, city), first listing wins
        let mut batch: HashMap<String, Lead> = HashMap::new();

        for category in categories {
            let businesses = match self.directory.search(location, category, self.limit).await {
                Ok(b) => b,
                Err(e) => {
                    warn!("Skipping category '{}': {}", category, e);
                    stats.failed_categories.push(category.clone());
                    continue;
                }
            };

            for business in businesses {
                let country = business
                    .location
                    .as_ref()
                    .and_then(|l| l.country.as_deref())
                    .unwrap_or_default();
                if !country.eq_ignore_ascii_case(&self.country) {
                    continue;
                }
                stats.found += 1;

                let lead = self.build_lead(&business, category).await;
                let key = format!(
                    "{}-{}",
                    lead.business_name.to_lowercase(),
                    lead.city.to_lowercase()
                );
                if batch.contains_key(&key) {
                    stats.duplicates += 1;
                } else {
                    batch.insert(key, lead);
                }
            }
        }

        for lead in batch.values() {
            if self.db.insert_lead(lead).await? {
                stats.saved += 1;
            } else {
                stats.duplicates += 1;
            }
        }

        info!(
            "Discovery for '{}': {} found, {} saved, {} duplicates",
            location, stats.found, stats.saved, stats.duplicates
        );
        Ok(stats)
    }

    async fn build_lead(
        &self,
        business: &crate::directory::DirectoryBusiness,
        fallback_category: &str,
    ) -> Lead {
        let website = business
            .external_website(self.directory.directory_host())
            .map(str::to_string);
        let category = business
            .categories
            .first()
            .map(|c| c.title.clone())
            .unwrap_or_else(|| fallback_category.to_string());
        let (city, state) = business
            .location
            .as_ref()
            .map(|l| {
                (
                    l.city.clone().unwrap_or_default(),
                    l.state.clone().unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        let phone = business.best_phone().map(str::to_string);

        let mut email = match &self.finder {
            Some(finder) => finder.find_email(&business.name, website.as_deref()).await,
            None => None,
        };
        // Last resort: a guessed generic inbox, only for listings real
        // enough to publish a phone number
        if email.is_none() && phone.is_some() {
            email = Some(guess_email(&business.name));
        }

        let mut lead = Lead::new(business.name.clone(), category, city, state);
        lead.source = "directory".to_string();
        lead.phone = phone;
        lead.email = email;
        if let Some(url) = website {
            lead.website_url = Some(url);
            lead.website_status = WebsiteStatus::Outdated.to_string();
            lead.score = SCORE_HAS_WEBSITE;
        } else {
            lead.website_status = WebsiteStatus::None.to_string();
            lead.score = SCORE_NO_WEBSITE;
        }
        lead.lead_tier = crate::scoring::tier_for_score(lead.score).to_string();
        debug!(
            "Candidate lead: {} ({}, score {})",
            lead.business_name, lead.lead_tier, lead.score
        );
        lead
    }

    /// Run one stored job, recording its outcome and the next schedule
    /// for recurring jobs.
    pub async fn run_job(&self, job: &DiscoveryJob) -> Result<DiscoveryStats> {
        self.db.set_job_status(&job.id, JobStatus::Running).await?;

        match self.discover(&job.location, &job.categories()).await {
            Ok(stats) => {
                let next_run_at = if job.is_recurring {
                    Some((Utc::now() + Duration::hours(24)).to_rfc3339())
                } else {
                    None
                };
                self.db
                    .finish_job(
                        &job.id,
                        JobStatus::Completed,
                        stats.found as i64,
                        stats.saved as i64,
                        next_run_at,
                    )
                    .await?;
                Ok(stats)
            }
            Err(e) => {
                self.db
                    .finish_job(&job.id, JobStatus::Failed, 0, 0, None)
                    .await?;
                Err(e)
            }
        }
    }

    /// Run everything that is due. One job's failure never stops the
    /// rest of the batch.
    pub async fn run_due_jobs(&self, limit: i64) -> Result<Vec<JobRunSummary>> {
        let due = self.db.due_jobs(&Utc::now().to_rfc3339(), limit).await?;
        info!("{} discovery job(s) due", due.len());

        let mut summaries = Vec::with_capacity(due.len());
        for job in due {
            match self.run_job(&job).await {
                Ok(stats) => summaries.push(JobRunSummary {
                    job_id: job.id,
                    location: job.location,
                    stats,
                    error: None,
                }),
                Err(e) => {
                    warn!("Discovery job {} failed: {}", job.id, e);
                    summaries.push(JobRunSummary {
                        job_id: job.id,
                        location: job.location,
                        stats: DiscoveryStats::default(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(summaries)
    }
}

/// One job's result within a scheduler pass
#[derive(Debug, Clone, Serialize)]
pub struct JobRunSummary {
    pub job_id: String,
    pub location: String,
    #[serde(flatten)]
    pub stats: DiscoveryStats,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(server: &MockServer) -> (Discoverer, Db, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = Db::new(&tmp.path().join("test.db")).await.unwrap();
        let mut config = Config::default();
        config.directory.base_url = server.uri();
        config.directory.api_key_env = "PROSPECTOR_TEST_DIRECTORY_KEY".to_string();
        config.enrich.api_key_env = "PROSPECTOR_TEST_UNSET".to_string();
        std::env::set_var("PROSPECTOR_TEST_DIRECTORY_KEY", "test-key");
        let discoverer = Discoverer::new(db.clone(), &config).unwrap();
        (discoverer, db, tmp)
    }

    fn business_json(name: &str, city: &str, country: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "url": null,
            "display_phone": "(512) 555-0100",
            "location": {"city": city, "state": "TX", "country": country},
            "categories": [{"title": "Plumbing"}]
        })
    }

    #[tokio::test]
    async fn test_discover_saves_and_scores_leads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/businesses/search"))
            .and(query_param("term", "plumbing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "businesses": [
                    business_json("Joe's Plumbing", "Austin", "US"),
                    {
                        "name": "Site Haver",
                        "url": "https://sitehaver.com",
                        "location": {"city": "Austin", "state": "TX", "country": "US"},
                        "categories": []
                    },
                    business_json("Maple Leaf Pipes", "Toronto", "CA"),
                ]
            })))
            .mount(&server)
            .await;

        let (discoverer, db, _tmp) = setup(&server).await;
        let stats = discoverer
            .discover("Austin, TX", &["plumbing".to_string()])
            .await
            .unwrap();

        // The Canadian listing is filtered out before counting
        assert_eq!(stats.found, 2);
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.duplicates, 0);

        let leads = db.list_leads().await.unwrap();
        let joes = leads
            .iter()
            .find(|l| l.business_name == "Joe's Plumbing")
            .unwrap();
        assert_eq!(joes.score, 85);
        assert_eq!(joes.lead_tier, "hot");
        assert_eq!(joes.website_url, None);
        // Phone present, so a guessed inbox fills in for enrichment
        assert_eq!(joes.email.as_deref(), Some("info@joesplumbing.com"));

        let haver = leads
            .iter()
            .find(|l| l.business_name == "Site Haver")
            .unwrap();
        assert_eq!(haver.score, 50);
        assert_eq!(haver.lead_tier, "warm");
        assert_eq!(haver.website_status, "outdated");
        // No phone and no enrichment: stays without an email
        assert_eq!(haver.email, None);
        // Listing had no category entries, the search term fills in
        assert_eq!(haver.category, "plumbing");
    }

    #[tokio::test]
    async fn test_discover_dedupes_across_categories() {
        let server = MockServer::start().await;
        for term in ["plumbing", "hvac"] {
            Mock::given(method("GET"))
                .and(path("/businesses/search"))
                .and(query_param("term", term))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "businesses": [business_json("Dual Listed Co", "Austin", "US")]
                })))
                .mount(&server)
                .await;
        }

        let (discoverer, db, _tmp) = setup(&server).await;
        let stats = discoverer
            .discover("Austin, TX", &["plumbing".to_string(), "hvac".to_string()])
            .await
            .unwrap();

        assert_eq!(stats.found, 2);
        assert_eq!(stats.saved, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(db.list_leads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_category_does_not_abort_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/businesses/search"))
            .and(query_param("term", "plumbing"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/businesses/search"))
            .and(query_param("term", "hvac"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "businesses": [business_json("Cool Air LLC", "Austin", "US")]
            })))
            .mount(&server)
            .await;

        let (discoverer, _db, _tmp) = setup(&server).await;
        let stats = discoverer
            .discover("Austin, TX", &["plumbing".to_string(), "hvac".to_string()])
            .await
            .unwrap();

        assert_eq!(stats.failed_categories, vec!["plumbing".to_string()]);
        assert_eq!(stats.saved, 1);
    }

    #[tokio::test]
    async fn test_run_job_records_outcome_and_reschedule() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/businesses/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "businesses": [business_json("Joe's Plumbing", "Austin", "US")]
            })))
            .mount(&server)
            .await;

        let (discoverer, db, _tmp) = setup(&server).await;
        let job = DiscoveryJob::new("Austin, TX".to_string(), &["plumbing".to_string()], true);
        db.insert_job(&job).await.unwrap();

        let summaries = discoverer.run_due_jobs(50).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].error.is_none());

        let job = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(job.status, "completed");
        assert_eq!(job.leads_found, 1);
        assert_eq!(job.leads_saved, 1);
        // Recurring jobs come back tomorrow
        assert!(job.next_run_at.is_some());
        assert!(job.last_run_at.is_some());
    }
}
