use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{CandidatePosting, Eligibility, FilterReason, UserProfile};

// --- Class standing ---

/// Class standing levels, most junior first. Search order matters: the first
/// entry found in a requirement is taken as the minimum standing.
const CLASS_STANDING_LEVELS: &[(&str, u8)] = &[
    ("freshman", 1),
    ("first year", 1),
    ("first-year", 1),
    ("1st year", 1),
    ("sophomore", 2),
    ("second year", 2),
    ("second-year", 2),
    ("2nd year", 2),
    ("junior", 3),
    ("third year", 3),
    ("third-year", 3),
    ("3rd year", 3),
    ("senior", 4),
    ("fourth year", 4),
    ("fourth-year", 4),
    ("4th year", 4),
    ("graduate", 5),
    ("masters", 5),
    ("master's", 5),
    ("phd", 6),
    ("doctoral", 6),
];

static RISING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"rising\s+(\w+)").unwrap());
static ENTERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"entering\s+(?:(?:his|her|their|your)\s+)?(\w+)").unwrap());
static PENULTIMATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"penultimate\s+year").unwrap());
static FINAL_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"final\s+year").unwrap());
static UNDERGRADUATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(matriculated|enrolled|pursuing).{0,20}undergraduate").unwrap()
});
static CURRENT_STUDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"current\s+student|currently\s+(enrolled|a\s+student)").unwrap()
});

/// Academic standing as a numeric level (freshman = 1 .. doctoral = 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassStanding(pub u8);

impl ClassStanding {
    /// Minimum standing a requirement text asks for, if it names one.
    pub fn parse_requirement(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if CURRENT_STUDENT.is_match(&text) || UNDERGRADUATE.is_match(&text) {
            return Some(Self(1));
        }

        // "rising senior" / "entering junior year" describe the year *after* the
        // internship, so the student is currently one level below
        for pattern in [&*RISING, &*ENTERING] {
            if let Some(level) = pattern
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .and_then(|target| level_of(target.as_str()))
            {
                return Some(Self(level.saturating_sub(1).max(1)));
            }
        }

        if PENULTIMATE.is_match(&text) {
            return Some(Self(3));
        }
        if FINAL_YEAR.is_match(&text) {
            return Some(Self(4));
        }

        // "undergraduate" must not read as "graduate"
        let text = text.replace("undergraduate", "undergrad");
        CLASS_STANDING_LEVELS
            .iter()
            .find(|(name, _)| text.contains(name))
            .map(|(_, level)| Self(*level))
    }
}

fn level_of(word: &str) -> Option<u8> {
    CLASS_STANDING_LEVELS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, level)| *level)
}

impl FromStr for ClassStanding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_requirement(s).ok_or_else(|| format!("unknown class standing '{}'", s))
    }
}

// --- Graduation dates ---

const MONTH_PATTERN: &str = r"\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?,?\s+(\d{4})\b";
const SEASON_PATTERN: &str = r"\b(spring|summer|fall|autumn|winter)\s+(\d{4})\b";

static MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(MONTH_PATTERN).unwrap());
static SEASON_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(SEASON_PATTERN).unwrap());
static ANY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{}|{}", MONTH_PATTERN, SEASON_PATTERN)).unwrap()
});
static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})$").unwrap());
static ISO_YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").unwrap());
static FOUR_DIGIT_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());
static NOT_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"not\s+graduat\w*\s+before").unwrap());
static DEADLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bby\b|\bbefore\b|no later than|must graduate").unwrap());

/// Month-granularity date; ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// First date mentioned in `text`: "May 2026", "Spring 2026", or a bare "2026" (May).
    pub fn find(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if let Some(caps) = MONTH_YEAR.captures(&lower) {
            return Some(Self::new(caps[2].parse().ok()?, month_number(&caps[1])));
        }
        if let Some(caps) = SEASON_YEAR.captures(&lower) {
            return Some(Self::new(caps[2].parse().ok()?, season_month(&caps[1])));
        }
        BARE_YEAR
            .captures(&lower)
            .and_then(|caps| caps[1].parse().ok())
            .map(|year| Self::new(year, 5))
    }

    fn find_all(text: &str) -> Vec<Self> {
        ANY_DATE
            .find_iter(text)
            .filter_map(|m| Self::find(m.as_str()))
            .collect()
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(caps) = ISO_YEAR_MONTH.captures(s.trim()) {
            let month: u32 = caps[2].parse().map_err(|_| format!("bad month in '{}'", s))?;
            if (1..=12).contains(&month) {
                return Ok(Self::new(caps[1].parse().map_err(|_| format!("bad year in '{}'", s))?, month));
            }
        }
        Self::find(s).ok_or_else(|| format!("unrecognized graduation date '{}'", s))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn month_number(name: &str) -> u32 {
    match &name[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        _ => 12,
    }
}

fn season_month(season: &str) -> u32 {
    match season {
        "spring" => 5,
        "summer" => 8,
        _ => 12,
    }
}

/// Shape of a posting's graduation requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraduationWindow {
    /// Still enrolled during the period, i.e. graduating after it.
    EnrolledDuring(YearMonth),
    OnOrAfter(YearMonth),
    Between(YearMonth, YearMonth),
    Deadline(YearMonth),
}

impl GraduationWindow {
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }

        // a stated graduation date outranks the enrollment wording around it
        let mentions_graduation = lower.contains("graduat");
        if (lower.contains("enrolled") || lower.contains("pursuing")) && !mentions_graduation {
            return YearMonth::find(&lower).map(Self::EnrolledDuring);
        }

        if ["or later", "and later", "after", "no earlier than"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            return YearMonth::find(&lower).map(Self::OnOrAfter);
        }

        if lower.contains("between") {
            let dates = YearMonth::find_all(&lower);
            return match dates.as_slice() {
                [start, end, ..] => Some(Self::Between(*start.min(end), *start.max(end))),
                _ => None,
            };
        }

        if NOT_BEFORE.is_match(&lower) {
            return YearMonth::find(&lower).map(Self::OnOrAfter);
        }

        if DEADLINE.is_match(&lower) {
            return YearMonth::find(&lower).map(Self::Deadline);
        }

        YearMonth::find(&lower).map(Self::Deadline)
    }

    pub fn admits(&self, graduation: YearMonth) -> bool {
        match *self {
            Self::EnrolledDuring(period) => graduation > period,
            Self::OnOrAfter(min) => graduation >= min,
            Self::Between(min, max) => min <= graduation && graduation <= max,
            Self::Deadline(max) => graduation <= max,
        }
    }
}

// --- Work authorization ---

/// Candidate's authorization, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkAuthorization {
    NeedsSponsorship = 1,
    H1b = 2,
    StudentVisa = 3,
    PermanentResident = 4,
    Citizen = 5,
}

impl FromStr for WorkAuthorization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| !w.is_empty())
            .collect();

        if lower.contains("sponsorship") {
            Ok(Self::NeedsSponsorship)
        } else if lower.contains("citizen") {
            Ok(Self::Citizen)
        } else if lower.contains("green card") || lower.contains("permanent resident") {
            Ok(Self::PermanentResident)
        } else if words.iter().any(|w| matches!(*w, "opt" | "cpt" | "stem-opt" | "f-1" | "f1")) {
            Ok(Self::StudentVisa)
        } else if words.iter().any(|w| matches!(*w, "h1b" | "h-1b")) {
            Ok(Self::H1b)
        } else {
            Err(format!("unknown work authorization '{}'", s))
        }
    }
}

const NO_SPONSORSHIP_PHRASES: &[&str] = &[
    "no sponsorship",
    "not sponsor",
    "cannot sponsor",
    "won't sponsor",
    "will not sponsor",
    "unable to sponsor",
    "not able to sponsor",
    "without sponsorship",
    "not provide sponsorship",
];

// Only explicit restrictions count. "regardless of citizenship" or a plain list
// of accepted statuses must not read as citizens-only.
static PERMANENT_RESIDENTS_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:green\s+card\s+holders?|permanent\s+residen(?:ts?|cy))\s+(?:only|required)\b",
        r"|\bmust\s+(?:be|hold)\s+(?:an?\s+)?(?:u\.?s\.?\s+)?(?:green\s+card|permanent\s+resident)",
        r"|\b(?:only|must\s+be)\s+(?:an?\s+)?(?:u\.?s\.?\s+)?citizens?\s+(?:or|and|/)\s+(?:green\s+card|permanent\s+resident)",
        r"|\bcitizens?\s+(?:or|and|/)\s+(?:green\s+card\s+holders?|permanent\s+residents?)\s+only\b",
    ))
    .unwrap()
});
static CITIZENS_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:u\.?s\.?\s+)?citizen(?:s|ship)?\s+(?:only|(?:is\s+)?required)\b",
        r"|\bonly\s+(?:open\s+to\s+)?(?:u\.?s\.?\s+)?citizens\b",
        r"|\bmust\s+(?:be|hold)\s+(?:an?\s+)?(?:u\.?s\.?\s+)?citizen(?:s|ship)?\b",
        r"|\b(?:requires?|required|must\s+(?:have|hold|obtain)|active|current)\s+(?:an?\s+)?(?:active\s+)?security\s+clearance\b",
        r"|\bsecurity\s+clearance\s+(?:is\s+)?required\b",
    ))
    .unwrap()
});

/// Minimum authorization a requirement text restricts to, if it restricts by status.
fn required_authorization(requirement: &str) -> Option<WorkAuthorization> {
    if PERMANENT_RESIDENTS_ONLY.is_match(requirement) {
        Some(WorkAuthorization::PermanentResident)
    } else if CITIZENS_ONLY.is_match(requirement) {
        Some(WorkAuthorization::Citizen)
    } else {
        None
    }
}

// --- Engine ---

/// Per-run switches for the individual hard filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterToggles {
    pub class_standing: bool,
    pub graduation_timeline: bool,
    pub season_year: bool,
    pub work_authorization: bool,
}

impl Default for FilterToggles {
    fn default() -> Self {
        Self {
            class_standing: true,
            graduation_timeline: true,
            season_year: true,
            work_authorization: true,
        }
    }
}

pub type CheckResult = Result<(), String>;

pub fn check_class_standing(profile: &UserProfile, posting: &CandidatePosting) -> CheckResult {
    let Some(requirement) = posting.class_standing_req.as_deref() else {
        return Ok(());
    };
    // graduated candidates carry no standing and pass any student requirement
    let Some(standing) = profile.class_standing else {
        return Ok(());
    };
    match ClassStanding::parse_requirement(requirement) {
        Some(required) if standing < required => Err(format!(
            "standing level {} below required '{}'",
            standing.0, requirement
        )),
        Some(_) => Ok(()),
        None => {
            debug!("Unparsed class standing requirement: {}", requirement);
            Ok(())
        }
    }
}

pub fn check_graduation_timeline(profile: &UserProfile, posting: &CandidatePosting) -> CheckResult {
    let (Some(requirement), Some(graduation)) =
        (posting.grad_window_req.as_deref(), profile.graduation)
    else {
        return Ok(());
    };
    match GraduationWindow::parse(requirement) {
        Some(window) if !window.admits(graduation) => Err(format!(
            "graduating {} does not fit '{}'",
            graduation, requirement
        )),
        Some(_) => Ok(()),
        None => {
            debug!("Unparsed graduation requirement: {}", requirement);
            Ok(())
        }
    }
}

pub fn check_season_year(profile: &UserProfile, posting: &CandidatePosting) -> CheckResult {
    let (Some(target), Some(season)) = (
        profile.target_season_year.as_deref(),
        posting.season_year.as_deref(),
    ) else {
        return Ok(());
    };

    if target.trim().eq_ignore_ascii_case(season.trim()) {
        return Ok(());
    }

    // a posting with no year ("Summer") cannot be shown to mismatch
    let Some(posting_year) = FOUR_DIGIT_YEAR.find(season) else {
        return Ok(());
    };
    match FOUR_DIGIT_YEAR.find(target) {
        Some(target_year) if target_year.as_str() == posting_year.as_str() => Ok(()),
        _ => Err(format!("wants {}, posting is {}", target, season)),
    }
}

pub fn check_work_authorization(profile: &UserProfile, posting: &CandidatePosting) -> CheckResult {
    let Some(authorization) = profile.work_authorization else {
        return Ok(());
    };
    let requirement = posting
        .work_auth_req
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    let no_sponsorship = posting.sponsorship_available == Some(false)
        || NO_SPONSORSHIP_PHRASES.iter().any(|p| requirement.contains(p));

    if authorization == WorkAuthorization::NeedsSponsorship && no_sponsorship {
        return Err("candidate needs sponsorship, posting does not sponsor".to_string());
    }

    match required_authorization(&requirement) {
        Some(required) if authorization < required => Err(format!(
            "posting restricted to '{}'",
            posting.work_auth_req.as_deref().unwrap_or_default()
        )),
        _ => Ok(()),
    }
}

/// Evaluate the hard filters in fixed order and stop at the first failure.
/// A missing or unreadable requirement never fails a check.
pub fn evaluate(
    profile: &UserProfile,
    posting: &CandidatePosting,
    toggles: &FilterToggles,
) -> Eligibility {
    let checks: [(bool, FilterReason, fn(&UserProfile, &CandidatePosting) -> CheckResult); 4] = [
        (
            toggles.class_standing,
            FilterReason::ClassStandingMismatch,
            check_class_standing,
        ),
        (
            toggles.graduation_timeline,
            FilterReason::GraduationTimelineMismatch,
            check_graduation_timeline,
        ),
        (
            toggles.season_year,
            FilterReason::SeasonYearMismatch,
            check_season_year,
        ),
        (
            toggles.work_authorization,
            FilterReason::WorkAuthorizationMismatch,
            check_work_authorization,
        ),
    ];

    for (enabled, reason, check) in checks {
        if !enabled {
            continue;
        }
        if let Err(detail) = check(profile, posting) {
            debug!("{} failed {}: {}", posting.company, reason, detail);
            return Eligibility::Fail { reason, detail };
        }
    }

    Eligibility::Pass
}
