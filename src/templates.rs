//! Builtin templates for the fixed 4-step outreach sequence, plus
//! variable substitution shared with direct sends.

use crate::db::Lead;

/// Template types, one per sequence step
pub const TEMPLATE_TYPES: [&str; 4] = ["first_contact", "followup_1", "followup_2", "final_close"];

/// A subject/body pair before substitution
#[derive(Debug, Clone, Copy)]
pub struct SequenceTemplate {
    pub subject: &'static str,
    pub content: &'static str,
}

/// Look up the builtin template for a sequence step's template type
pub fn sequence_template(template_type: &str) -> Option<SequenceTemplate> {
    match template_type {
        "first_contact" => Some(SequenceTemplate {
            subject: "Professional Website for {{business_name}}?",
            content: "Hi {{business_name}},\n\nI noticed your business in {{city}} and saw you don't yet have a website.\n\nI help local businesses like yours get professional websites that bring in more customers. A modern website can help you:\n\u{2022} Show up in Google searches\n\u{2022} Build trust with new customers\n\u{2022} Get more calls and bookings\n\nWould you like me to set one up for you? I'd be happy to show you some examples.\n\nBest regards",
        }),
        "followup_1" => Some(SequenceTemplate {
            subject: "Quick follow-up: Website for {{business_name}}",
            content: "Hi {{business_name}},\n\nI reached out a couple of days ago about creating a website for your business.\n\nI know you're busy running things, so I wanted to make this easy: I can have a custom design ready for you to review within 48 hours, completely free with no obligation.\n\nWould that be helpful?\n\nBest regards",
        }),
        "followup_2" => Some(SequenceTemplate {
            subject: "Last chance: Free website mockup for {{business_name}}",
            content: "Hi {{business_name}},\n\nI wanted to follow up one more time about your business website.\n\nMany businesses in {{category}} are seeing great results from having an online presence - more calls, more customers, more growth.\n\nIf timing isn't right now, no worries at all. But if you'd like to see what a professional website could look like for {{business_name}}, just reply and I'll put something together.\n\nBest regards",
        }),
        "final_close" => Some(SequenceTemplate {
            subject: "Closing the loop - {{business_name}} website",
            content: "Hi {{business_name}},\n\nThis will be my last email about this.\n\nIf you ever decide you'd like a professional website for your business, feel free to reach out. I'd be happy to help whenever you're ready.\n\nWishing you continued success with your business!\n\nBest regards",
        }),
        _ => None,
    }
}

/// Replace template variables with lead fields. An empty business name
/// falls back to a generic salutation.
pub fn personalize(text: &str, lead: &Lead) -> String {
    let business_name = if lead.business_name.is_empty() {
        "Business Owner"
    } else {
        &lead.business_name
    };
    text.replace("{{business_name}}", business_name)
        .replace("{{category}}", &lead.category)
        .replace("{{city}}", &lead.city)
        .replace("{{state}}", &lead.state)
}
