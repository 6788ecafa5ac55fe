//! Website technical analysis
//!
//! Fetches a lead's own website and derives the technical signals used
//! for re-scoring: SSL (scheme-based), mobile friendliness (viewport
//! meta tag heuristic), a load-time/size speed score, and social
//! presence. An unreachable site is a data signal (`broken`), never an
//! error.

use crate::config::AnalyzeConfig;
use crate::error::Result;
use crate::scoring::TechnicalSignals;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

const SOCIAL_DOMAINS: [&str; 5] = [
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
];

/// Outcome of one analysis fetch
#[derive(Debug, Clone)]
pub struct WebsiteAnalysis {
    /// False when the site errored or timed out; callers downgrade the
    /// lead's website status to broken
    pub reachable: bool,
    pub signals: TechnicalSignals,
}

/// Website analyzer
pub struct WebsiteAnalyzer {
    client: Client,
}

impl WebsiteAnalyzer {
    pub fn new(config: &AnalyzeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch and analyze one site
    pub async fn analyze(&self, website_url: &str) -> WebsiteAnalysis {
        let has_ssl = Some(website_url.starts_with("https://"));

        let start = Instant::now();
        let response = match self.client.get(website_url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("Website fetch failed for {}: {}", website_url, e);
                return WebsiteAnalysis {
                    reachable: false,
                    signals: TechnicalSignals {
                        has_ssl,
                        ..Default::default()
                    },
                };
            }
        };

        if !response.status().is_success() {
            return WebsiteAnalysis {
                reachable: false,
                signals: TechnicalSignals {
                    has_ssl,
                    ..Default::default()
                },
            };
        }

        let html = match response.text().await {
            Ok(h) => h,
            Err(e) => {
                debug!("Website body read failed for {}: {}", website_url, e);
                return WebsiteAnalysis {
                    reachable: false,
                    signals: TechnicalSignals {
                        has_ssl,
                        ..Default::default()
                    },
                };
            }
        };
        let load_time_ms = start.elapsed().as_millis();

        let is_mobile_friendly = Some(
            html.contains("viewport")
                && (html.contains("width=device-width") || html.contains("initial-scale")),
        );
        let has_social_presence = Some(SOCIAL_DOMAINS.iter().any(|d| html.contains(d)));

        WebsiteAnalysis {
            reachable: true,
            signals: TechnicalSignals {
                has_ssl,
                is_mobile_friendly,
                website_speed_score: Some(speed_score(load_time_ms, html.len())),
                has_social_presence,
            },
        }
    }
}

/// Speed score out of 100, penalizing slow loads and heavy pages
fn speed_score(load_time_ms: u128, html_size: usize) -> i64 {
    let mut score: i64 = 100;

    if load_time_ms > 3000 {
        score -= 30;
    } else if load_time_ms > 2000 {
        score -= 20;
    } else if load_time_ms > 1000 {
        score -= 10;
    }

    if html_size > 500_000 {
        score -= 20;
    } else if html_size > 200_000 {
        score -= 10;
    }

    score.max(0)
}
