use regex::Regex;
use std::sync::LazyLock;

use crate::message::InboundMessage;

static SENSITIVE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b",
            "credit card number",
        ),
        (r"\b(?:\d{4}[-\s]?){3}\d{4}\b", "credit card format"),
        (
            r"(?i)(?:ssn|social.?security).{0,20}\d{3}[-\s]?\d{2}[-\s]?\d{4}\b",
            "SSN format",
        ),
        (
            r"(?i)(?:verification|security|one.?time|otp|2fa|mfa).{0,20}(?:code|pin).{0,10}[:\s]+\d{4,8}\b",
            "OTP/verification code",
        ),
        (
            r"(?i)(?:passcode|login.?code|access.?code).{0,10}[:\s]+\d{4,8}\b",
            "passcode/login code",
        ),
        (r"(?i)(?:reset|change|update).{0,20}password", "password reset"),
        (r"(?i)(?:temporary|temp).{0,10}password", "temporary password"),
        (
            r"(?i)(?:account|routing).{0,10}(?:number|#).{0,10}\d{8,17}\b",
            "bank account number",
        ),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).unwrap(), label))
    .collect()
});

/// Name of the first kind of sensitive content found, if any.
pub fn sensitive_content(message: &InboundMessage) -> Option<&'static str> {
    let content = format!("{}\n{}", message.subject, message.body);
    SENSITIVE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&content))
        .map(|(_, label)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str, body: &str) -> InboundMessage {
        InboundMessage {
            from: "recruiting@example.com".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_status_emails_pass() {
        let m = message(
            "Your application to Google",
            "Thank you for applying to the Software Engineering Intern role (Job ID 12345).",
        );
        assert_eq!(sensitive_content(&m), None);
    }

    #[test]
    fn test_detects_sensitive_content() {
        let cases = [
            ("Receipt", "Card 4111 1111 1111 1111 was charged", "credit card format"),
            ("Sign in", "Your verification code is: 482913", "OTP/verification code"),
            ("Security", "Click here to reset your password", "password reset"),
            ("Tax form", "SSN on file: 123-45-6789", "SSN format"),
            ("Direct deposit", "Routing number 021000021 confirmed", "bank account number"),
        ];
        for (subject, body, expected) in cases {
            assert_eq!(sensitive_content(&message(subject, body)), Some(expected), "{}", body);
        }
    }

    #[test]
    fn test_subject_is_scanned() {
        let m = message("Your temporary password", "See attached.");
        assert_eq!(sensitive_content(&m), Some("temporary password"));
    }
}
