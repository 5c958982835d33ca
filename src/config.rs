use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::db::Database;
use crate::filters::{ClassStanding, FilterToggles, WorkAuthorization, YearMonth};
use crate::models::{JobCategory, UserProfile, WorkModel};

pub const DEFAULT_DREAM_THRESHOLD: u8 = 80;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a number, got '{value}'")]
    InvalidNumber { key: String, value: String },

    #[error("{key} has invalid value '{value}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Everything one run needs, fixed for the run's duration.
#[derive(Debug, Clone)]
pub struct Config {
    pub profile: UserProfile,
    pub dream_threshold: u8,
    pub toggles: FilterToggles,
    pub log_level: String,
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: UserProfile::default(),
            dream_threshold: DEFAULT_DREAM_THRESHOLD,
            toggles: FilterToggles::default(),
            log_level: "info".to_string(),
            db_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let class_standing = match vars.text("USER_CLASS_STANDING") {
            Some(v) if matches!(v.to_lowercase().as_str(), "graduated" | "none" | "alumni") => None,
            _ => vars.parsed::<ClassStanding>("USER_CLASS_STANDING")?,
        };

        let profile = UserProfile {
            class_standing,
            graduation: vars.parsed::<YearMonth>("USER_GRADUATION_DATE")?,
            majors: vars.list("USER_MAJOR"),
            gpa: vars.positive("USER_GPA")?,
            work_authorization: vars.parsed::<WorkAuthorization>("USER_WORK_AUTHORIZATION")?,
            target_job_type: match vars.text("USER_TARGET_JOB_TYPE") {
                Some(v) if matches!(v.to_lowercase().as_str(), "both" | "any") => None,
                _ => vars.parsed::<JobCategory>("USER_TARGET_JOB_TYPE")?,
            },
            target_season_year: vars.text("USER_TARGET_SEASON_YEAR"),
            preferred_locations: vars.list("USER_PREFERRED_LOCATIONS"),
            work_model: vars.parsed::<WorkModel>("USER_WORK_MODEL")?.unwrap_or_default(),
            min_salary_hourly: vars.positive("USER_MIN_SALARY_HOURLY")?,
            skills: vars.list("USER_SKILLS"),
            target_companies: vars.list("USER_TARGET_COMPANIES"),
        };

        if let Some(gpa) = profile.gpa {
            if gpa > 5.0 {
                return Err(ConfigError::InvalidValue {
                    key: "USER_GPA".to_string(),
                    value: gpa.to_string(),
                    reason: "expected a 0-5 scale".to_string(),
                });
            }
        }

        let dream_threshold = match vars.text("DREAM_COMPANY_MATCH_THRESHOLD") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: "DREAM_COMPANY_MATCH_THRESHOLD".to_string(),
                    value: raw.clone(),
                })?
                .clamp(0, 100) as u8,
            None => DEFAULT_DREAM_THRESHOLD,
        };

        let toggles = FilterToggles {
            class_standing: vars.flag("FILTER_CLASS_STANDING")?,
            graduation_timeline: vars.flag("FILTER_GRADUATION_TIMELINE")?,
            season_year: vars.flag("FILTER_SEASON_YEAR")?,
            work_authorization: vars.flag("FILTER_WORK_AUTHORIZATION")?,
        };

        Ok(Self {
            profile,
            dream_threshold,
            toggles,
            log_level: vars
                .text("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            db_path: vars.text("POTATO_DB").map(PathBuf::from),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(Database::default_path)
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset.
    fn text(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Comma-separated list. `any` means no preference.
    fn list(&self, key: &str) -> Vec<String> {
        match self.text(key) {
            Some(v) if !v.eq_ignore_ascii_case("any") => v
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr<Err = String>,
    {
        self.text(key)
            .map(|v| {
                v.parse::<T>().map_err(|reason| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: v.clone(),
                    reason,
                })
            })
            .transpose()
    }

    /// Non-negative number where 0 means unset.
    fn positive(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        let Some(raw) = self.text(key) else {
            return Ok(None);
        };
        let value = raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| ConfigError::InvalidNumber {
                key: key.to_string(),
                value: raw.clone(),
            })?;
        Ok((value > 0.0).then_some(value))
    }

    /// Boolean switch, on unless explicitly disabled.
    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        let Some(raw) = self.text(key) else {
            return Ok(true);
        };
        match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
                reason: "expected true or false".to_string(),
            }),
        }
    }
}
