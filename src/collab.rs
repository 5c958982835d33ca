use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::PipelineError;
use crate::message::InboundMessage;
use crate::models::{CandidatePosting, SignalLabel};

/// Turns one raw extraction result into a validated posting.
pub trait Extractor {
    fn extract(&self, raw: &Value) -> Result<CandidatePosting, PipelineError>;
}

/// Reads postings already shaped as JSON objects. Missing optional fields are
/// "no requirement stated"; a missing URL or company is a failed extraction.
#[derive(Debug, Default)]
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn extract(&self, raw: &Value) -> Result<CandidatePosting, PipelineError> {
        let posting: CandidatePosting = serde_json::from_value(raw.clone())
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

        if posting.source_url.trim().is_empty() {
            return Err(PipelineError::ExtractionFailed("missing source_url".to_string()));
        }
        if posting.company.trim().is_empty() {
            return Err(PipelineError::ExtractionFailed(format!(
                "missing company for {}",
                posting.source_url
            )));
        }
        Ok(posting)
    }
}

/// Labels an inbound message. `None` means the message is not a status signal.
pub trait Classifier {
    fn classify(&self, message: &InboundMessage) -> Option<SignalLabel>;
}

static KEYWORD_RULES: LazyLock<Vec<(SignalLabel, Regex)>> = LazyLock::new(|| {
    [
        (
            SignalLabel::Rejection,
            r"unfortunately|not (?:be )?moving forward|decided to (?:move forward|proceed) with other|position has been filled|not selected|regret to inform",
        ),
        (
            SignalLabel::OfferLetter,
            r"pleased to (?:offer|extend)|offer letter|extend (?:you )?an offer|job offer",
        ),
        (
            SignalLabel::TechInvite,
            r"technical interview|onsite interview|on-site interview|final round|superday|virtual onsite",
        ),
        (
            SignalLabel::PhoneInvite,
            r"phone (?:screen|interview|call)|recruiter (?:call|screen)|schedule a (?:quick )?call",
        ),
        (
            SignalLabel::OAInvite,
            r"online assessment|coding (?:challenge|assessment)|hackerrank|codesignal|codility|take-home",
        ),
        (
            SignalLabel::Confirmation,
            r"thank(?:s| you) for (?:applying|your application|your interest)|received your application|application (?:has been )?received",
        ),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(&format!("(?i){}", pattern)).unwrap()))
    .collect()
});

/// Phrase-based classifier. Rules are checked most decisive first, so a
/// rejection that thanks the candidate for applying is still a rejection.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, message: &InboundMessage) -> Option<SignalLabel> {
        let content = format!("{}\n{}", message.subject, message.body);
        KEYWORD_RULES
            .iter()
            .find(|(_, pattern)| pattern.is_match(&content))
            .map(|(label, _)| *label)
    }
}
