//! Local replies used when the assistant backend cannot answer

use crate::context::PageType;

pub const SUPPORT_REPLY: &str = "I'm here to help! I can assist you with technical issues, product questions, or general support. What would you like to know?";
pub const PAYMENT_REPLY: &str = "I understand you're having payment issues. Let me help you troubleshoot. Can you tell me more about what's happening?";
pub const TECHNICAL_REPLY: &str = "I see you're experiencing an issue. I've detected some technical problems on this page. Let me help you resolve them.";
pub const FEATURE_REPLY: &str = "Thank you for your feature request! I'll make sure this gets to our development team. Can you provide more details?";
pub const BUG_REPLY: &str = "I'm sorry to hear you're experiencing a bug. Let me help you report this issue. Can you describe what happened?";
pub const GENERIC_REPLY: &str = "Thank you for your message. I'm here to help improve your experience. Is there anything specific you'd like to discuss?";

/// Greeting used when the backend does not supply one
pub const DEFAULT_WELCOME: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Ordered keyword rules; the first rule with a matching keyword wins
const RULES: &[(&[&str], &str)] = &[
    (&["help", "support"], SUPPORT_REPLY),
    (&["payment", "billing"], PAYMENT_REPLY),
    (&["error", "problem"], TECHNICAL_REPLY),
    (&["feature", "request"], FEATURE_REPLY),
    (&["bug", "issue"], BUG_REPLY),
];

/// Canned reply for `message`, matched case-insensitively against [`RULES`]
#[must_use]
pub fn respond(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(GENERIC_REPLY, |&(_, reply)| reply)
}

/// Greeting for a conversation started on a page of the given type
#[must_use]
pub fn welcome(page_type: PageType) -> &'static str {
    match page_type {
        PageType::Payment => {
            "Hello! I'm here to help with your payment experience. How can I assist you today?"
        }
        PageType::Account => "Hello! I'm here to help with your account. What can I help you with?",
        PageType::Support => "Hello! I'm here to provide support. How can I help you?",
        PageType::General => DEFAULT_WELCOME,
    }
}
