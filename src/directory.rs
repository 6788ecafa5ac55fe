//! Business directory search client
//!
//! Thin wrapper over the directory's `/businesses/search` endpoint.
//! One request per (location, category) pair; the collector owns
//! retries-across-categories and deduplication.

use crate::config::DirectoryConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A raw directory search hit
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryBusiness {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub display_phone: Option<String>,
    #[serde(default)]
    pub location: Option<BusinessLocation>,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessLocation {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<DirectoryBusiness>,
}

impl DirectoryBusiness {
    /// The listing's own website, if it has one independent of the
    /// directory. A missing URL or one pointing back at the directory's
    /// domain counts as "no website".
    pub fn external_website(&self, directory_host: &str) -> Option<&str> {
        let url = self.url.as_deref()?;
        if url.is_empty() || url.contains(directory_host) {
            None
        } else {
            Some(url)
        }
    }

    /// Best available phone number for display and email guessing
    pub fn best_phone(&self) -> Option<&str> {
        self.display_phone
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.phone.as_deref().filter(|p| !p.is_empty()))
    }
}

/// Directory search API client
pub struct DirectoryClient {
    client: Client,
    base_url: String,
    api_key: String,
    directory_host: String,
}

impl DirectoryClient {
    pub fn new(config: &DirectoryConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // The directory's own host doubles as the "no independent
        // website" signal when a listing URL points back at it.
        let directory_host = Url::parse(&config.base_url)?
            .host_str()
            .map(|h| h.trim_start_matches("api.").to_string())
            .unwrap_or_default();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            directory_host,
        })
    }

    pub fn directory_host(&self) -> &str {
        &self.directory_host
    }

    /// One search request for a (location, term) pair
    pub async fn search(
        &self,
        location: &str,
        term: &str,
        limit: u32,
    ) -> Result<Vec<DirectoryBusiness>> {
        let limit = limit.min(50);
        debug!("Directory search: location={}, term={}, limit={}", location, term, limit);

        let response = self
            .client
            .get(format!("{}/businesses/search", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[
                ("location", location),
                ("term", term),
                ("limit", &limit.to_string()),
                ("sort_by", "best_match"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Directory(format!(
                "search for '{}' failed with {}: {}",
                term, status, body
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.businesses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectoryConfig;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> DirectoryConfig {
        DirectoryConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_search_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/businesses/search"))
            .and(header("authorization", "Bearer test-key"))
            .and(query_param("term", "plumbing"))
            .and(query_param("sort_by", "best_match"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "businesses": [
                    {
                        "name": "Joe's Plumbing",
                        "url": "https://www.yelp.com/biz/joes-plumbing",
                        "display_phone": "(512) 555-0100",
                        "location": {"city": "Austin", "state": "TX", "country": "US"},
                        "categories": [{"alias": "plumbing", "title": "Plumbing"}]
                    },
                    {
                        "name": "Austin Pipe Pros",
                        "url": "https://austinpipepros.com",
                        "location": {"city": "Austin", "state": "TX", "country": "US"},
                        "categories": []
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = DirectoryClient::new(&test_config(&server.uri()), "test-key".to_string())
            .unwrap();
        let results = client.search("Austin, TX", "plumbing", 50).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Joe's Plumbing");
        assert_eq!(results[0].best_phone(), Some("(512) 555-0100"));
        assert_eq!(results[0].external_website("yelp.com"), None);
        assert_eq!(
            results[1].external_website("yelp.com"),
            Some("https://austinpipepros.com")
        );
    }

    #[tokio::test]
    async fn test_search_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/businesses/search"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client =
            DirectoryClient::new(&test_config(&server.uri()), "test-key".to_string()).unwrap();
        let err = client.search("Austin, TX", "plumbing", 50).await.unwrap_err();
        assert!(matches!(err, Error::Directory(_)));
    }

    #[test]
    fn test_missing_url_means_no_website() {
        let business = DirectoryBusiness {
            name: "No Site LLC".to_string(),
            url: None,
            phone: None,
            display_phone: None,
            location: None,
            categories: vec![],
        };
        assert_eq!(business.external_website("yelp.com"), None);
    }
}
