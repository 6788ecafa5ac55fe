//! Email dispatch
//!
//! The single path every outbound email takes: suppression check, quota
//! reservation, compliance footer, provider handoff, then the one
//! post-send transaction. Sequence processing and direct sends both go
//! through [`Dispatcher::send_to_lead`].

use crate::config::Config;
use crate::db::{Db, EmailLog, Lead, SendOutcome};
use crate::error::{Error, Result};
use crate::quota::{self, QuotaDecision};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// A fully rendered email ready for the provider
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to_email: String,
    pub to_name: String,
    pub from_email: String,
    pub from_name: String,
    pub subject: String,
    pub html: String,
    /// Correlation ID passed to the provider and echoed back in
    /// delivery events
    pub message_id: String,
}

/// Transactional email provider seam
#[async_trait]
pub trait EmailDelivery: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    errors: Vec<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
}

/// SendGrid v3 mail client
pub struct SendgridClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SendgridClient {
    pub fn new(base_url: &str, api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl EmailDelivery for SendgridClient {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let payload = json!({
            "personalizations": [{
                "to": [{"email": email.to_email, "name": email.to_name}],
                "custom_args": {"message_id": email.message_id},
            }],
            "from": {"email": email.from_email, "name": email.from_name},
            "subject": email.subject,
            "content": [{"type": "text/html", "value": email.html}],
            "tracking_settings": {
                "click_tracking": {"enable": true},
                "open_tracking": {"enable": true},
            },
        });

        let response = self
            .client
            .post(format!("{}/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            debug!("Provider accepted message {}", email.message_id);
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ProviderErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.errors.into_iter().next())
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                format!(
                    "provider returned {}. Check your delivery configuration.",
                    status
                )
            });
        Err(Error::Delivery(message))
    }
}

/// Wrap a plain-text body in the compliance HTML frame: sender identity
/// and an unsubscribe link below a divider.
pub fn compose_html(
    body: &str,
    from_name: &str,
    unsubscribe_base_url: &str,
    to_email: &str,
) -> String {
    let body_html = body.replace('\n', "<br>\n");
    let unsubscribe = if unsubscribe_base_url.is_empty() {
        String::new()
    } else {
        let encoded: String = url::form_urlencoded::byte_serialize(to_email.as_bytes()).collect();
        format!(
            "<br>\n<a href=\"{}?email={}\" style=\"color: #666;\">Unsubscribe from future emails</a>",
            unsubscribe_base_url, encoded
        )
    };

    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\n\
         {}\n\
         <br><br>\n\
         <hr style=\"border: none; border-top: 1px solid #ddd;\">\n\
         <p style=\"font-size: 12px; color: #666;\">\n\
         {}<br>\n\
         You received this email because your business was identified as potentially benefiting from our services.{}\n\
         </p>\n\
         </div>",
        body_html, from_name, unsubscribe
    )
}

/// Metadata attached to one send, threaded into the log row
#[derive(Debug, Default)]
pub struct SendMeta<'a> {
    pub campaign_id: Option<&'a str>,
    /// Stored template to credit; builtin sequence templates have none
    pub template_id: Option<&'a str>,
    /// Sequence step to mark sent in the same transaction
    pub step_id: Option<&'a str>,
}

/// Guarded send path shared by sequence processing and direct sends
pub struct Dispatcher {
    db: Db,
    delivery: Arc<dyn EmailDelivery>,
    from_email: String,
    from_name: String,
    unsubscribe_base_url: String,
    account_id: String,
    daily_limit: i64,
}

impl Dispatcher {
    pub fn new(db: Db, delivery: Arc<dyn EmailDelivery>, config: &Config) -> Result<Self> {
        let (from_email, from_name) = config.sender()?;
        Ok(Self {
            db,
            delivery,
            from_email,
            from_name,
            unsubscribe_base_url: config.delivery.unsubscribe_base_url.clone(),
            account_id: config.account_id.clone(),
            daily_limit: config.outreach.daily_limit,
        })
    }

    /// Render and send one email to a lead. The subject and body are
    /// already personalized. On success the log row, template usage,
    /// step status, and first-contact advancement land in one
    /// transaction; on provider failure the quota slot is returned and
    /// the error propagates.
    pub async fn send_to_lead(
        &self,
        lead: &Lead,
        subject: &str,
        body: &str,
        meta: SendMeta<'_>,
    ) -> Result<EmailLog> {
        let to_email = lead
            .email
            .clone()
            .ok_or_else(|| Error::NoEmail(lead.id.clone()))?;

        if self.db.is_suppressed(&to_email).await? {
            return Err(Error::Suppressed(to_email));
        }

        match quota::reserve_slot(&self.db, &self.account_id, self.daily_limit).await? {
            QuotaDecision::Allowed => {}
            QuotaDecision::Denied { limit } => return Err(Error::QuotaExhausted(limit)),
        }

        let message_id = Uuid::new_v4().to_string();
        let email = OutboundEmail {
            to_email: to_email.clone(),
            to_name: lead.business_name.clone(),
            from_email: self.from_email.clone(),
            from_name: self.from_name.clone(),
            subject: subject.to_string(),
            html: compose_html(body, &self.from_name, &self.unsubscribe_base_url, &to_email),
            message_id: message_id.clone(),
        };

        if let Err(e) = self.delivery.send(&email).await {
            quota::release_slot(&self.db, &self.account_id).await?;
            return Err(e);
        }

        let mut log = EmailLog::new(to_email, subject.to_string(), message_id);
        log.lead_id = Some(lead.id.clone());
        log.campaign_id = meta.campaign_id.map(str::to_string);
        log.template_id = meta.template_id.map(str::to_string);

        self.db
            .record_send(SendOutcome {
                log: &log,
                template_id: meta.template_id,
                step_id: meta.step_id,
                contact_lead_id: Some(&lead.id),
            })
            .await?;

        info!("Sent '{}' to {}", log.subject, log.to_email);
        Ok(log)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Scripted provider double recording every accepted send
    pub struct MockDelivery {
        pub sent: Mutex<Vec<OutboundEmail>>,
        /// Fail the next N sends before succeeding
        pub failures_remaining: Mutex<u32>,
    }

    impl MockDelivery {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                failures_remaining: Mutex::new(0),
            })
        }

        pub fn failing(count: u32) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                failures_remaining: Mutex::new(count),
            })
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EmailDelivery for MockDelivery {
        async fn send(&self, email: &OutboundEmail) -> Result<()> {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Delivery("simulated provider outage".to_string()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }
}
