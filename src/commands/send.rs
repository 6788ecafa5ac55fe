//! Send command implementation

use crate::config::Config;
use crate::db::{Db, EmailLog};
use crate::dispatch::{Dispatcher, SendMeta, SendgridClient};
use crate::error::{Error, Result};
use crate::templates::personalize;
use std::sync::Arc;

/// What to send: a stored template, or an inline subject and body
#[derive(Debug, Clone)]
pub enum SendContent {
    Template(String),
    Inline { subject: String, body: String },
}

/// Send one email to a lead outside of the sequence
pub async fn cmd_send(
    config: &Config,
    db: &Db,
    lead_id: &str,
    content: SendContent,
    campaign_id: Option<&str>,
) -> Result<EmailLog> {
    let lead = db
        .get_lead(lead_id)
        .await?
        .ok_or_else(|| Error::LeadNotFound(lead_id.to_string()))?;

    let (subject, body, template_id) = match content {
        SendContent::Template(id) => {
            let template = db
                .get_template(&id)
                .await?
                .ok_or_else(|| Error::TemplateNotFound(id.clone()))?;
            (template.subject, template.content, Some(id))
        }
        SendContent::Inline { subject, body } => (subject, body, None),
    };
    let subject = personalize(&subject, &lead);
    let body = personalize(&body, &lead);

    let delivery = SendgridClient::new(
        &config.delivery.base_url,
        config.delivery_api_key()?,
        config.delivery.timeout_secs,
    )?;
    let dispatcher = Dispatcher::new(db.clone(), Arc::new(delivery), config)?;
    dispatcher
        .send_to_lead(
            &lead,
            &subject,
            &body,
            SendMeta {
                campaign_id,
                template_id: template_id.as_deref(),
                step_id: None,
            },
        )
        .await
}

/// Print send confirmation to console
pub fn print_send_result(log: &EmailLog) {
    println!("✓ Sent '{}' to {}", log.subject, log.to_email);
    if let Some(message_id) = &log.message_id {
        println!("  Message ID: {}", message_id);
    }
}
