use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::models::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DreamCompanyPosting,
    StatusChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub payload: Value,
}

impl NotificationEvent {
    pub fn dream_posting(company: &str, title: &str, url: &str, score: Option<u8>) -> Self {
        Self {
            kind: EventKind::DreamCompanyPosting,
            payload: json!({
                "company": company,
                "title": title,
                "url": url,
                "score": score,
            }),
        }
    }

    pub fn status_change(company: &str, title: &str, url: &str, from: Status, to: Status) -> Self {
        Self {
            kind: EventKind::StatusChange,
            payload: json!({
                "company": company,
                "title": title,
                "url": url,
                "from": from.to_string(),
                "to": to.to_string(),
            }),
        }
    }

    fn field(&self, name: &str) -> &str {
        self.payload.get(name).and_then(Value::as_str).unwrap_or("")
    }

    /// One-line human message, as a chat webhook would show it.
    pub fn message(&self) -> String {
        let mut text = match self.kind {
            EventKind::DreamCompanyPosting => format!(
                "🚀 New Dream Company Job! {} - {}",
                self.field("company"),
                self.field("title")
            ),
            EventKind::StatusChange => {
                let to = self.field("to");
                format!(
                    "{} Status Update: {} - {} → {}",
                    status_emoji(to),
                    self.field("company"),
                    self.field("title"),
                    to
                )
            }
        };
        let url = self.field("url");
        if !url.is_empty() {
            text.push(' ');
            text.push_str(url);
        }
        text
    }
}

fn status_emoji(status: &str) -> &'static str {
    match status {
        "Applied" => "📝",
        "OA" => "💻",
        "Phone" => "📞",
        "Technical" => "🔧",
        "Offer" => "🎉",
        "Rejected" => "❌",
        _ => "📋",
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

/// Writes notifications to the log instead of an external channel.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<()> {
        info!("{}", event.message());
        Ok(())
    }
}

/// Deliver and swallow any failure.
pub fn dispatch(notifier: &dyn Notifier, event: &NotificationEvent) {
    if let Err(e) = notifier.notify(event) {
        warn!("Notification delivery failed ({:?}): {:#}", event.kind, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&self, _event: &NotificationEvent) -> Result<()> {
            Err(anyhow!("webhook returned 500"))
        }
    }

    #[test]
    fn test_status_message() {
        let event = NotificationEvent::status_change(
            "Google",
            "SWE Intern",
            "https://jobs.example.com/google-swe",
            Status::Phone,
            Status::Offer,
        );
        assert_eq!(
            event.message(),
            "🎉 Status Update: Google - SWE Intern → Offer https://jobs.example.com/google-swe"
        );
    }

    #[test]
    fn test_dream_message_without_url() {
        let event = NotificationEvent::dream_posting("Meta", "PE Intern", "", Some(72));
        assert_eq!(event.message(), "🚀 New Dream Company Job! Meta - PE Intern");
        assert_eq!(event.payload["score"], 72);
    }

    #[test]
    fn test_dispatch_swallows_failures() {
        let event = NotificationEvent::dream_posting("Meta", "PE Intern", "", None);
        dispatch(&FailingNotifier, &event);
        dispatch(&LogNotifier, &event);
    }
}
