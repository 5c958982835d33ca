use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collab::{Classifier, Extractor};
use crate::config::Config;
use crate::dedup::DedupStore;
use crate::error::{PipelineError, StoreError};
use crate::filters;
use crate::matcher;
use crate::message::InboundMessage;
use crate::models::{CandidatePosting, DecisionRecord, Eligibility, JobRecord, SignalLabel, Status};
use crate::normalize::normalize_url;
use crate::notify::{self, NotificationEvent, Notifier};
use crate::privacy;
use crate::scoring;
use crate::status::{self, Transition};
use crate::store::JobStore;

/// Attempts at a status write before giving up on a record that keeps changing.
const MAX_STATUS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Decided(DecisionRecord),
    /// Key already accepted (or claimed by a concurrent evaluation).
    Duplicate(String),
    /// Key rejected on an earlier run and not yet cleared.
    PreviouslyFiltered(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub key: String,
    pub company: String,
    pub title: String,
    pub from: Status,
    pub to: Status,
    pub changed: bool,
    pub notify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Message held back by the privacy gate; the string names what was found.
    Withheld(&'static str),
    NoSignal,
    Applied(StatusUpdate),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub listings_seen: usize,
    pub extraction_failures: usize,
    pub invalid_urls: usize,
    pub duplicates: usize,
    pub previously_filtered: usize,
    pub filtered_out: usize,
    pub accepted: usize,
    pub dream_hits: usize,
    pub errors: usize,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    dedup: &'a dyn DedupStore,
    notifier: &'a dyn Notifier,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, dedup: &'a dyn DedupStore, notifier: &'a dyn Notifier) -> Self {
        Self {
            config,
            dedup,
            notifier,
        }
    }

    /// Decide one posting. Each normalized key yields at most one decision
    /// across all runs until its filtered verdict is cleared.
    pub fn process_posting(&self, posting: &CandidatePosting) -> Result<Outcome, PipelineError> {
        self.decide(posting, None)
    }

    fn decide(
        &self,
        posting: &CandidatePosting,
        jobs: Option<&dyn JobStore>,
    ) -> Result<Outcome, PipelineError> {
        let key = normalize_url(&posting.source_url)?;

        if self.dedup.has_seen(&key)? {
            debug!("Skipping already processed {}", key);
            return Ok(Outcome::Duplicate(key));
        }
        if self.dedup.is_filtered(&key)? {
            debug!("Skipping previously filtered {}", key);
            return Ok(Outcome::PreviouslyFiltered(key));
        }

        let profile = &self.config.profile;
        let eligibility = filters::evaluate(profile, posting, &self.config.toggles);

        if let Eligibility::Fail { reason, detail } = &eligibility {
            if !self.dedup.mark_filtered(&key, *reason)? {
                return Ok(Outcome::Duplicate(key));
            }
            debug!("Filtered {} - {}: {} ({})", posting.company, posting.title, reason, detail);
            return Ok(Outcome::Decided(DecisionRecord {
                key,
                company: posting.company.clone(),
                title: posting.title.clone(),
                eligibility,
                score: None,
                dream_company: None,
                notify: false,
                decided_at: Utc::now(),
            }));
        }

        let fit = scoring::score(profile, posting, self.config.dream_threshold);
        let dream = matcher::best_match(
            &posting.company,
            &profile.target_companies,
            self.config.dream_threshold,
        );

        let decision = DecisionRecord {
            key,
            company: posting.company.clone(),
            title: posting.title.clone(),
            eligibility,
            score: Some(fit),
            notify: dream.is_some(),
            dream_company: dream.map(|d| d.target),
            decided_at: Utc::now(),
        };

        // insert-only, so a concurrent evaluation of the same key cannot clobber it
        if let Some(jobs) = jobs {
            jobs.put_job_record(&JobRecord::from_decision(posting, &decision))?;
        }

        if !self.dedup.mark_seen(&decision.key)? {
            return Ok(Outcome::Duplicate(decision.key));
        }

        let total = decision.score.as_ref().map_or(0, |s| s.total);
        info!(
            "Accepted {} - {} (score {}{})",
            posting.company,
            posting.title,
            total,
            if decision.notify { ", dream company" } else { "" }
        );

        if decision.notify {
            notify::dispatch(
                self.notifier,
                &NotificationEvent::dream_posting(
                    &posting.company,
                    &posting.title,
                    &posting.source_url,
                    Some(total),
                ),
            );
        }

        Ok(Outcome::Decided(decision))
    }

    /// Extract and decide every raw result. A failure on one item is counted
    /// and logged; it never stops the batch. Accepted postings are stored in
    /// `jobs` when given. The record is written before the key is claimed, so a
    /// failed write leaves the posting to be decided again on the next run.
    pub fn process_batch(
        &self,
        raws: &[Value],
        extractor: &dyn Extractor,
        jobs: Option<&dyn JobStore>,
    ) -> (Vec<DecisionRecord>, RunStats) {
        let mut stats = RunStats::default();
        let mut decisions = Vec::new();

        for raw in raws {
            stats.listings_seen += 1;

            let posting = match extractor.extract(raw) {
                Ok(posting) => posting,
                Err(e) => {
                    warn!("Skipping listing: {}", e);
                    stats.extraction_failures += 1;
                    continue;
                }
            };

            match self.decide(&posting, jobs) {
                Ok(Outcome::Decided(decision)) => {
                    if decision.eligibility.passed() {
                        stats.accepted += 1;
                        if decision.dream_company.is_some() {
                            stats.dream_hits += 1;
                        }
                    } else {
                        stats.filtered_out += 1;
                    }
                    decisions.push(decision);
                }
                Ok(Outcome::Duplicate(_)) => stats.duplicates += 1,
                Ok(Outcome::PreviouslyFiltered(_)) => stats.previously_filtered += 1,
                Err(e @ PipelineError::InvalidUrl { .. }) => {
                    warn!("{}", e);
                    stats.invalid_urls += 1;
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", posting.source_url, e);
                    stats.errors += 1;
                }
            }
        }

        (decisions, stats)
    }

    /// Forget every filtered verdict so those postings are judged again under
    /// the current profile.
    pub fn clear_filtered(&self) -> Result<usize, PipelineError> {
        let removed = self.dedup.clear_filtered()?;
        info!("Cleared {} filtered entries", removed);
        Ok(removed)
    }

    /// Apply a classified signal to the job at `url`. `None` is not a signal.
    pub fn apply_signal(
        &self,
        jobs: &dyn JobStore,
        url: &str,
        label: Option<SignalLabel>,
    ) -> Result<Option<StatusUpdate>, PipelineError> {
        let Some(label) = label else {
            return Ok(None);
        };
        let key = normalize_url(url)?;
        self.advance(jobs, &key, &label.to_string(), |current| {
            if current == Status::Ghosted {
                status::revive(status_before_ghosting(jobs, &key)?, label)
            } else {
                status::transition(current, label)
            }
        })
        .map(Some)
    }

    /// User action: the company went silent.
    pub fn mark_ghosted(&self, jobs: &dyn JobStore, url: &str) -> Result<StatusUpdate, PipelineError> {
        let key = normalize_url(url)?;
        self.advance(jobs, &key, "user", status::mark_ghosted)
    }

    /// Privacy gate, then classification, then the state machine.
    pub fn apply_message(
        &self,
        jobs: &dyn JobStore,
        url: &str,
        message: &InboundMessage,
        classifier: &dyn Classifier,
    ) -> Result<MessageOutcome, PipelineError> {
        if let Some(found) = privacy::sensitive_content(message) {
            info!("Message '{}' withheld: {}", message.subject, found);
            return Ok(MessageOutcome::Withheld(found));
        }

        match self.apply_signal(jobs, url, classifier.classify(message))? {
            Some(update) => Ok(MessageOutcome::Applied(update)),
            None => {
                debug!("No status signal in '{}'", message.subject);
                Ok(MessageOutcome::NoSignal)
            }
        }
    }

    fn advance<F>(
        &self,
        jobs: &dyn JobStore,
        key: &str,
        cause: &str,
        step: F,
    ) -> Result<StatusUpdate, PipelineError>
    where
        F: Fn(Status) -> Result<Transition, PipelineError>,
    {
        for _ in 0..MAX_STATUS_ATTEMPTS {
            let record = jobs
                .get_job_record(key)?
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

            let transition = step(record.status).inspect_err(|e| {
                warn!("{} - {}: {}", record.company, record.title, e);
            })?;

            let update = StatusUpdate {
                key: key.to_string(),
                company: record.company.clone(),
                title: record.title.clone(),
                from: transition.from,
                to: transition.to,
                changed: transition.changed,
                notify: transition.notify(),
            };

            if !transition.changed {
                debug!("{} already {}", key, record.status);
                return Ok(update);
            }

            if jobs.update_status(key, transition.from, transition.to, cause)? {
                info!(
                    "{} - {}: {} -> {}",
                    record.company, record.title, transition.from, transition.to
                );
                if update.notify {
                    notify::dispatch(
                        self.notifier,
                        &NotificationEvent::status_change(
                            &record.company,
                            &record.title,
                            &record.url,
                            transition.from,
                            transition.to,
                        ),
                    );
                }
                return Ok(update);
            }

            debug!("Status of {} changed underneath us, retrying", key);
        }

        Err(StoreError::Unavailable(format!("status of {} kept changing", key)).into())
    }
}

/// The state a ghosted job was in when the user gave up on it.
fn status_before_ghosting(jobs: &dyn JobStore, key: &str) -> Result<Option<Status>, StoreError> {
    Ok(jobs
        .status_history(key)?
        .iter()
        .rev()
        .find(|change| change.to == Status::Ghosted)
        .map(|change| change.from))
}
