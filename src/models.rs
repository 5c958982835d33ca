use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::filters::{ClassStanding, WorkAuthorization, YearMonth};
use crate::scoring::FitScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JobCategory {
    Internship,
    FullTime,
}

impl FromStr for JobCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace(['-', '_'], " ");
        match norm.as_str() {
            "internship" | "intern" | "co op" | "coop" => Ok(Self::Internship),
            "full time" | "fulltime" | "new grad" => Ok(Self::FullTime),
            _ => Err(format!("unknown job category '{}'", s)),
        }
    }
}

impl TryFrom<String> for JobCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobCategory> for String {
    fn from(value: JobCategory) -> Self {
        value.to_string()
    }
}

impl fmt::Display for JobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobCategory::Internship => f.pad("Internship"),
            JobCategory::FullTime => f.pad("Full-Time"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryPeriod {
    Hourly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub period: Option<SalaryPeriod>,
}

impl SalaryRange {
    /// Best hourly figure the posting advertises, if the period is known.
    pub fn hourly(&self) -> Option<f64> {
        let amount = self.max.or(self.min)?;
        match self.period? {
            SalaryPeriod::Hourly => Some(amount),
            SalaryPeriod::Monthly => Some(amount / 173.0),
            SalaryPeriod::Yearly => Some(amount / 2080.0),
        }
    }
}

/// One discovered posting, already validated by the extraction collaborator.
/// Every optional requirement field means "no requirement stated" when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidatePosting {
    pub source_url: String,
    pub company: String,
    pub title: String,
    pub locations: Vec<String>,
    pub is_remote: Option<bool>,
    pub category: Option<JobCategory>,
    pub season_year: Option<String>,
    pub salary: Option<SalaryRange>,
    pub required_skills: Vec<String>,
    pub required_majors: Vec<String>,
    pub min_gpa: Option<f64>,
    pub class_standing_req: Option<String>,
    pub grad_window_req: Option<String>,
    pub work_auth_req: Option<String>,
    pub sponsorship_available: Option<bool>,
    pub posted_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkModel {
    Remote,
    Hybrid,
    OnSite,
    #[default]
    Any,
}

impl FromStr for WorkModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace(['-', '_', ' '], "");
        match norm.as_str() {
            "remote" => Ok(Self::Remote),
            "hybrid" => Ok(Self::Hybrid),
            "onsite" | "inperson" => Ok(Self::OnSite),
            "" | "any" => Ok(Self::Any),
            _ => Err(format!("unknown work model '{}'", s)),
        }
    }
}

/// Read-only candidate profile the pipeline evaluates postings against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub class_standing: Option<ClassStanding>,
    pub graduation: Option<YearMonth>,
    pub majors: Vec<String>,
    pub gpa: Option<f64>,
    pub work_authorization: Option<WorkAuthorization>,
    /// `None` accepts both internships and full-time roles.
    pub target_job_type: Option<JobCategory>,
    pub target_season_year: Option<String>,
    pub preferred_locations: Vec<String>,
    pub work_model: WorkModel,
    pub min_salary_hourly: Option<f64>,
    pub skills: Vec<String>,
    pub target_companies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterReason {
    ClassStandingMismatch,
    GraduationTimelineMismatch,
    SeasonYearMismatch,
    WorkAuthorizationMismatch,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterReason::ClassStandingMismatch => "class standing mismatch",
            FilterReason::GraduationTimelineMismatch => "graduation timeline mismatch",
            FilterReason::SeasonYearMismatch => "season/year mismatch",
            FilterReason::WorkAuthorizationMismatch => "work authorization mismatch",
        };
        f.pad(label)
    }
}

impl FromStr for FilterReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ClassStandingMismatch" => Ok(Self::ClassStandingMismatch),
            "GraduationTimelineMismatch" => Ok(Self::GraduationTimelineMismatch),
            "SeasonYearMismatch" => Ok(Self::SeasonYearMismatch),
            "WorkAuthorizationMismatch" => Ok(Self::WorkAuthorizationMismatch),
            _ => Err(format!("unknown filter reason '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Eligibility {
    Pass,
    Fail { reason: FilterReason, detail: String },
}

impl Eligibility {
    pub fn passed(&self) -> bool {
        matches!(self, Eligibility::Pass)
    }
}

/// Verdict for one normalized URL. Produced once; never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub key: String,
    pub company: String,
    pub title: String,
    pub eligibility: Eligibility,
    pub score: Option<FitScore>,
    pub dream_company: Option<String>,
    pub notify: bool,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    New,
    Applied,
    OA,
    Phone,
    Technical,
    Offer,
    Rejected,
    Ghosted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::New => "New",
            Status::Applied => "Applied",
            Status::OA => "OA",
            Status::Phone => "Phone",
            Status::Technical => "Technical",
            Status::Offer => "Offer",
            Status::Rejected => "Rejected",
            Status::Ghosted => "Ghosted",
        };
        f.pad(label)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "applied" => Ok(Self::Applied),
            "oa" => Ok(Self::OA),
            "phone" => Ok(Self::Phone),
            "technical" => Ok(Self::Technical),
            "offer" => Ok(Self::Offer),
            "rejected" => Ok(Self::Rejected),
            "ghosted" => Ok(Self::Ghosted),
            _ => Err(format!("unknown status '{}'", s)),
        }
    }
}

/// Label produced by the email-classification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalLabel {
    Confirmation,
    OAInvite,
    PhoneInvite,
    TechInvite,
    OfferLetter,
    Rejection,
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalLabel::Confirmation => "Confirmation",
            SignalLabel::OAInvite => "OAInvite",
            SignalLabel::PhoneInvite => "PhoneInvite",
            SignalLabel::TechInvite => "TechInvite",
            SignalLabel::OfferLetter => "OfferLetter",
            SignalLabel::Rejection => "Rejection",
        };
        f.pad(label)
    }
}

impl FromStr for SignalLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "confirmation" => Ok(Self::Confirmation),
            "oainvite" | "oa" => Ok(Self::OAInvite),
            "phoneinvite" | "phone" => Ok(Self::PhoneInvite),
            "techinvite" | "technical" => Ok(Self::TechInvite),
            "offerletter" | "offer" => Ok(Self::OfferLetter),
            "rejection" => Ok(Self::Rejection),
            _ => Err(format!("unknown signal label '{}'", s)),
        }
    }
}

/// An accepted posting tracked through its application lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub key: String,
    pub company: String,
    pub title: String,
    pub url: String,
    pub status: Status,
    pub score: Option<u8>,
    pub dream_company: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Build the record a caller persists for an accepted decision.
    pub fn from_decision(posting: &CandidatePosting, decision: &DecisionRecord) -> Self {
        Self {
            key: decision.key.clone(),
            company: posting.company.clone(),
            title: posting.title.clone(),
            url: posting.source_url.clone(),
            status: Status::New,
            score: decision.score.as_ref().map(|s| s.total),
            dream_company: decision.dream_company.is_some(),
            created_at: decision.decided_at,
            updated_at: decision.decided_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_category_parsing() {
        assert_eq!("Internship".parse::<JobCategory>().unwrap(), JobCategory::Internship);
        assert_eq!("full-time".parse::<JobCategory>().unwrap(), JobCategory::FullTime);
        assert_eq!("Full Time".parse::<JobCategory>().unwrap(), JobCategory::FullTime);
        assert!("Contract".parse::<JobCategory>().is_err());
    }

    #[test]
    fn test_salary_hourly_conversion() {
        let yearly = SalaryRange {
            min: Some(100_000.0),
            max: Some(124_800.0),
            period: Some(SalaryPeriod::Yearly),
        };
        assert_eq!(yearly.hourly(), Some(60.0));

        let unknown_period = SalaryRange {
            min: Some(40.0),
            max: None,
            period: None,
        };
        assert_eq!(unknown_period.hourly(), None);
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            Status::New,
            Status::Applied,
            Status::OA,
            Status::Phone,
            Status::Technical,
            Status::Offer,
            Status::Rejected,
            Status::Ghosted,
        ] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn test_signal_label_aliases() {
        assert_eq!("oa".parse::<SignalLabel>().unwrap(), SignalLabel::OAInvite);
        assert_eq!("tech-invite".parse::<SignalLabel>().unwrap(), SignalLabel::TechInvite);
        assert_eq!("Rejection".parse::<SignalLabel>().unwrap(), SignalLabel::Rejection);
        assert!("none".parse::<SignalLabel>().is_err());
    }

    #[test]
    fn test_posting_deserializes_with_missing_fields() {
        let posting: CandidatePosting = serde_json::from_str(
            r#"{"source_url": "https://jobs.example.com/1", "company": "Google", "category": "Internship"}"#,
        )
        .unwrap();
        assert_eq!(posting.company, "Google");
        assert_eq!(posting.category, Some(JobCategory::Internship));
        assert!(posting.class_standing_req.is_none());
        assert!(posting.required_skills.is_empty());
    }
}
