use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::matcher;
use crate::models::{CandidatePosting, UserProfile, WorkModel};

const CITY_ALIASES: &[(&str, &[&str])] = &[
    ("nyc", &["new york", "new york city", "manhattan"]),
    ("sf", &["san francisco", "san fran"]),
    ("la", &["los angeles"]),
    ("dc", &["washington dc", "washington d.c."]),
    ("chi", &["chicago"]),
    ("atl", &["atlanta"]),
    ("sea", &["seattle"]),
    ("bos", &["boston"]),
    ("aus", &["austin"]),
    ("den", &["denver"]),
];

const MAJOR_ALIASES: &[(&str, &str)] = &[
    ("cs", "computer science"),
    ("cse", "computer science and engineering"),
    ("ce", "computer engineering"),
    ("ee", "electrical engineering"),
    ("ece", "electrical and computer engineering"),
    ("me", "mechanical engineering"),
    ("is", "information systems"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreKind {
    CompanyCategory,
    Skills,
    Major,
    Location,
    Salary,
    Gpa,
}

impl ScoreKind {
    pub fn weight(self) -> u8 {
        match self {
            ScoreKind::CompanyCategory => 30,
            ScoreKind::Skills | ScoreKind::Major => 20,
            ScoreKind::Location | ScoreKind::Salary | ScoreKind::Gpa => 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    pub kind: ScoreKind,
    pub points: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitScore {
    pub total: u8,
    pub components: Vec<ScoreComponent>,
    pub notes: Vec<String>,
}

impl FitScore {
    pub fn points(&self, kind: ScoreKind) -> u8 {
        self.components
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.points)
            .unwrap_or(0)
    }
}

fn norm(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn score_company_category(
    profile: &UserProfile,
    posting: &CandidatePosting,
    dream_threshold: u8,
) -> u8 {
    let company_match =
        matcher::best_match(&posting.company, &profile.target_companies, dream_threshold).is_some();

    let category_match = match (posting.category, profile.target_job_type) {
        (Some(category), Some(target)) => category == target,
        (Some(_), None) => true,
        (None, _) => false,
    };
    let category_conflict = posting.category.is_some() && !category_match;

    match (company_match, category_match) {
        (true, _) if !category_conflict => 30,
        (true, _) | (false, true) => 20,
        (false, false) => 0,
    }
}

/// `20 * matched / required`, rounded down.
pub fn score_skills(profile: &UserProfile, posting: &CandidatePosting) -> u8 {
    let required: BTreeSet<String> = posting
        .required_skills
        .iter()
        .map(|s| norm(s))
        .filter(|s| !s.is_empty())
        .collect();
    let owned: BTreeSet<String> = profile.skills.iter().map(|s| norm(s)).collect();
    if required.is_empty() || owned.is_empty() {
        return 0;
    }

    let matched = required.intersection(&owned).count();
    let weight = ScoreKind::Skills.weight() as usize;
    (weight * matched / required.len()) as u8
}

fn expand_major(major: &str) -> String {
    let major = norm(major);
    MAJOR_ALIASES
        .iter()
        .find(|(short, _)| *short == major)
        .map(|(_, full)| full.to_string())
        .unwrap_or(major)
}

fn majors_overlap(a: &str, b: &str) -> bool {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.len() < 4 {
        return shorter == longer;
    }
    longer.contains(shorter)
}

pub fn score_major(profile: &UserProfile, posting: &CandidatePosting) -> u8 {
    if posting.required_majors.is_empty() || profile.majors.is_empty() {
        return 0;
    }

    let owned: Vec<String> = profile.majors.iter().map(|m| expand_major(m)).collect();
    let required: Vec<String> = posting.required_majors.iter().map(|m| expand_major(m)).collect();

    let direct = owned
        .iter()
        .any(|mine| required.iter().any(|req| majors_overlap(mine, req)));
    if direct {
        return ScoreKind::Major.weight();
    }

    // "or related field" / "or equivalent" leaves room for adjacent majors
    if required
        .iter()
        .any(|req| req.contains("related") || req.contains("equivalent"))
    {
        return ScoreKind::Major.weight() / 2;
    }

    0
}

fn is_remote(posting: &CandidatePosting) -> bool {
    posting.is_remote == Some(true)
        || posting.locations.iter().any(|l| norm(l).contains("remote"))
}

fn locations_match(mine: &str, theirs: &str) -> Option<u8> {
    if mine.contains(theirs) || theirs.contains(mine) {
        return Some(10);
    }

    for (abbrev, aliases) in CITY_ALIASES {
        let mine_is = mine == *abbrev || aliases.iter().any(|a| mine.contains(a));
        let theirs_is = theirs
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == *abbrev)
            || aliases.iter().any(|a| theirs.contains(a));
        if mine_is && theirs_is {
            return Some(10);
        }
    }

    // shared state or region token, e.g. "Austin, TX" vs "Dallas, TX"
    let their_parts: Vec<&str> = theirs.split(|c: char| c == ',' || c.is_whitespace()).collect();
    let shares_region = mine
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| p.len() > 1)
        .any(|p| their_parts.contains(&p));
    shares_region.then_some(7)
}

pub fn score_location(profile: &UserProfile, posting: &CandidatePosting) -> u8 {
    let has_preference =
        !profile.preferred_locations.is_empty() || profile.work_model != WorkModel::Any;
    if !has_preference {
        return 0;
    }

    if is_remote(posting) {
        return match profile.work_model {
            WorkModel::Remote | WorkModel::Any => 10,
            WorkModel::Hybrid | WorkModel::OnSite => 5,
        };
    }

    let mine: Vec<String> = profile.preferred_locations.iter().map(|l| norm(l)).collect();
    let theirs: Vec<String> = posting.locations.iter().map(|l| norm(l)).collect();

    let mut best = 0;
    for m in &mine {
        for t in &theirs {
            if let Some(points) = locations_match(m, t) {
                best = best.max(points);
            }
        }
    }
    best
}

pub fn score_salary(profile: &UserProfile, posting: &CandidatePosting) -> u8 {
    let Some(minimum) = profile.min_salary_hourly.filter(|m| *m > 0.0) else {
        return 0;
    };
    let Some(hourly) = posting.salary.as_ref().and_then(|s| s.hourly()) else {
        return 0;
    };

    if hourly >= minimum {
        10
    } else if hourly >= minimum * 0.8 {
        5
    } else {
        0
    }
}

pub fn score_gpa(profile: &UserProfile, posting: &CandidatePosting) -> u8 {
    let (Some(required), Some(gpa)) = (posting.min_gpa.filter(|g| *g > 0.0), profile.gpa) else {
        return 0;
    };

    if gpa >= required {
        10
    } else if gpa >= required - 0.3 {
        5
    } else {
        0
    }
}

fn notes(profile: &UserProfile, posting: &CandidatePosting, score: &FitScore) -> Vec<String> {
    let mut notes = Vec::new();

    if score.points(ScoreKind::Major) < ScoreKind::Major.weight() && !posting.required_majors.is_empty() {
        let majors: Vec<&str> = posting.required_majors.iter().take(2).map(String::as_str).collect();
        notes.push(format!("Major: requires {}", majors.join(", ")));
    }

    if score.points(ScoreKind::Location) < 5 && !posting.locations.is_empty() {
        let locations: Vec<&str> = posting.locations.iter().take(2).map(String::as_str).collect();
        notes.push(format!("Location: {}", locations.join(", ")));
    }

    if score.points(ScoreKind::Salary) == 0 {
        if let (Some(minimum), Some(hourly)) = (
            profile.min_salary_hourly,
            posting.salary.as_ref().and_then(|s| s.hourly()),
        ) {
            notes.push(format!("Salary: ${:.0}/hr (min ${:.0}/hr)", hourly, minimum));
        }
    }

    notes
}

/// Weighted fit score. Callers only invoke this for postings that passed the
/// hard filters.
pub fn score(profile: &UserProfile, posting: &CandidatePosting, dream_threshold: u8) -> FitScore {
    let components = vec![
        ScoreComponent {
            kind: ScoreKind::CompanyCategory,
            points: score_company_category(profile, posting, dream_threshold),
        },
        ScoreComponent {
            kind: ScoreKind::Skills,
            points: score_skills(profile, posting),
        },
        ScoreComponent {
            kind: ScoreKind::Major,
            points: score_major(profile, posting),
        },
        ScoreComponent {
            kind: ScoreKind::Location,
            points: score_location(profile, posting),
        },
        ScoreComponent {
            kind: ScoreKind::Salary,
            points: score_salary(profile, posting),
        },
        ScoreComponent {
            kind: ScoreKind::Gpa,
            points: score_gpa(profile, posting),
        },
    ];

    let total: u32 = components
        .iter()
        .map(|c| u32::from(c.points.min(c.kind.weight())))
        .sum();

    let mut fit = FitScore {
        total: total.min(100) as u8,
        components,
        notes: Vec::new(),
    };
    fit.notes = notes(profile, posting, &fit);

    debug!("Fit score for {} - {}: {}", posting.company, posting.title, fit.total);
    fit
}
