use anyhow::{anyhow, Context, Result};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\f]+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl InboundMessage {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let parsed = parse_mail(raw).context("Failed to parse email")?;

        let from = parsed.headers.get_first_value("From").unwrap_or_default();
        let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
        let body = get_body_text(&parsed)?;

        Ok(Self {
            from,
            subject,
            body,
        })
    }
}

fn content_type(part: &ParsedMail) -> String {
    part.headers
        .get_first_value("Content-Type")
        .unwrap_or_default()
        .to_lowercase()
}

/// Plain text if the message has it, otherwise HTML reduced to text.
fn get_body_text(parsed: &ParsedMail) -> Result<String> {
    if parsed.subparts.is_empty() {
        let body = parsed.get_body()?;
        if parsed.ctype.mimetype.eq_ignore_ascii_case("text/html") {
            return Ok(html_to_text(&body));
        }
        return Ok(body);
    }

    for part in parsed.parts() {
        if content_type(part).contains("text/plain") {
            return Ok(part.get_body()?);
        }
    }

    for part in parsed.parts() {
        if content_type(part).contains("text/html") {
            return Ok(html_to_text(&part.get_body()?));
        }
    }

    Err(anyhow!("No email body found"))
}

fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?.value().as_element()?;
            (!matches!(parent.name(), "script" | "style")).then_some(&**text)
        })
        .collect::<Vec<_>>()
        .join(" ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_message() {
        let raw = b"From: Google Recruiting <no-reply@google.com>\r\n\
Subject: Thanks for applying to Google\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
We have received your application for Software Engineering Intern.\r\n";

        let message = InboundMessage::parse(raw).unwrap();
        assert_eq!(message.from, "Google Recruiting <no-reply@google.com>");
        assert_eq!(message.subject, "Thanks for applying to Google");
        assert!(message.body.contains("received your application"));
    }

    #[test]
    fn test_multipart_prefers_plain_text() {
        let raw = b"From: jobs@meta.com\r\n\
Subject: Next steps\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>HTML version</p>\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Plain version\r\n\
--XYZ--\r\n";

        let message = InboundMessage::parse(raw).unwrap();
        assert!(message.body.contains("Plain version"));
    }

    #[test]
    fn test_html_only_is_reduced_to_text() {
        let raw = b"From: jobs@example.com\r\n\
Subject: Invitation\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><style>p {color: red}</style><body><p>Please complete the <b>online assessment</b> &amp; reply.</p></body></html>\r\n";

        let message = InboundMessage::parse(raw).unwrap();
        assert_eq!(message.body, "Please complete the online assessment & reply.");
    }

    #[test]
    fn test_html_entities_are_decoded() {
        let raw = b"From: jobs@example.com\r\n\
Subject: Update\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>We&#39;re &quot;excited&quot; about next steps</p><script>var x = 1;</script>\r\n";

        let message = InboundMessage::parse(raw).unwrap();
        assert_eq!(message.body, "We're \"excited\" about next steps");
    }
}
