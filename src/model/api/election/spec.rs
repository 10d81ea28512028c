use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    engine::lifecycle::derive_status,
    error::{Error, Result},
    model::{
        common::election::ElectionType,
        db::election::{AcademicYear, Candidate, ElectionMetadata, NewElection, DEFAULT_PROFILE_IMAGE},
        mongodb::Id,
    },
};

const TITLE_CHARS: (usize, usize) = (5, 200);
const DESCRIPTION_CHARS: (usize, usize) = (10, 1000);
const BIOGRAPHY_MAX_CHARS: usize = 1000;
const MIN_CANDIDATES: usize = 2;

fn default_public() -> bool {
    true
}

/// An election specification, as submitted by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub election_type: ElectionType,
    #[serde(default)]
    pub rules: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub candidates: Vec<CandidateSpec>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

impl ElectionSpec {
    /// Validate this spec and turn it into an election ready for insertion.
    ///
    /// Candidates get fresh IDs; all counters start at zero.
    pub fn into_election(
        self,
        created_by: Id,
        eligible_voter_count: u64,
        now: DateTime<Utc>,
    ) -> Result<NewElection> {
        validate_window(self.start_time, self.end_time, now)?;
        let candidates = candidates_from_specs(self.candidates)?;

        Ok(NewElection {
            metadata: ElectionMetadata {
                title: validate_length("title", &self.title, TITLE_CHARS)?,
                description: validate_length("description", &self.description, DESCRIPTION_CHARS)?,
                election_type: self.election_type,
                rules: clean_rules(self.rules),
                start_time: self.start_time,
                end_time: self.end_time,
                status: derive_status(now, self.start_time, self.end_time, None),
                status_override: None,
                eligible_voter_count,
                total_votes: 0,
                is_public: self.is_public,
                results_published: false,
                published_at: None,
                created_by,
                created_at: now,
                updated_at: now,
            },
            candidates,
            vote_ledger: Vec::new(),
        })
    }
}

/// A candidate specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub username: String,
    pub department: String,
    pub year: String,
    pub academic_year: AcademicYear,
    pub position: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub platform: Vec<String>,
    #[serde(default)]
    pub biography: Option<String>,
}

impl CandidateSpec {
    fn into_candidate(self) -> Result<Candidate> {
        let biography = self.biography.map(|b| b.trim().to_string());
        if let Some(ref biography) = biography {
            if biography.chars().count() > BIOGRAPHY_MAX_CHARS {
                return Err(Error::Validation(format!(
                    "Candidate biography cannot be more than {BIOGRAPHY_MAX_CHARS} characters"
                )));
            }
        }
        let profile_image = self
            .profile_image
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string());

        Ok(Candidate {
            id: Id::new(),
            name: require_non_empty("candidate name", &self.name)?,
            username: self.username,
            department: require_non_empty("candidate department", &self.department)?,
            year: self.year,
            academic_year: self.academic_year,
            position: require_non_empty("candidate position", &self.position)?,
            profile_image,
            platform: self.platform,
            biography,
            vote_count: 0,
        })
    }
}

/// A partial update to an election. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub election_type: Option<ElectionType>,
    #[serde(default)]
    pub rules: Option<Vec<String>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Replaces the whole candidate list.
    #[serde(default)]
    pub candidates: Option<Vec<CandidateSpec>>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl ElectionPatch {
    /// Apply this patch to an existing election, validating every changed
    /// field. Dates are checked against each other after merging, so changing
    /// only one of them is still validated against the stored other.
    pub fn apply(self, election: &mut NewElection, now: DateTime<Utc>) -> Result<()> {
        let metadata = &mut election.metadata;

        if self.start_time.is_some() || self.end_time.is_some() {
            let start_time = self.start_time.unwrap_or(metadata.start_time);
            let end_time = self.end_time.unwrap_or(metadata.end_time);
            if self.start_time.is_some() {
                validate_window(start_time, end_time, now)?;
            } else if end_time <= start_time {
                return Err(Error::Validation(
                    "End time must be after start time".to_string(),
                ));
            }
            metadata.start_time = start_time;
            metadata.end_time = end_time;
            metadata.status = derive_status(now, start_time, end_time, metadata.status_override);
        }
        if let Some(title) = self.title {
            metadata.title = validate_length("title", &title, TITLE_CHARS)?;
        }
        if let Some(description) = self.description {
            metadata.description =
                validate_length("description", &description, DESCRIPTION_CHARS)?;
        }
        if let Some(election_type) = self.election_type {
            metadata.election_type = election_type;
        }
        if let Some(rules) = self.rules {
            metadata.rules = clean_rules(rules);
        }
        if let Some(is_public) = self.is_public {
            metadata.is_public = is_public;
        }
        if let Some(candidates) = self.candidates {
            election.candidates = candidates_from_specs(candidates)?;
        }

        election.metadata.updated_at = now;
        Ok(())
    }
}

fn validate_window(start_time: DateTime<Utc>, end_time: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if start_time < now {
        return Err(Error::Validation(
            "Start time cannot be in the past".to_string(),
        ));
    }
    if end_time <= start_time {
        return Err(Error::Validation(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}

fn candidates_from_specs(specs: Vec<CandidateSpec>) -> Result<Vec<Candidate>> {
    if specs.len() < MIN_CANDIDATES {
        return Err(Error::Validation(format!(
            "An election needs at least {MIN_CANDIDATES} candidates"
        )));
    }
    specs.into_iter().map(CandidateSpec::into_candidate).collect()
}

/// Trim a field and check its length in characters.
fn validate_length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<String> {
    let value = value.trim();
    let len = value.chars().count();
    if len < min || len > max {
        return Err(Error::Validation(format!(
            "The {field} must be between {min} and {max} characters"
        )));
    }
    Ok(value.to_string())
}

fn require_non_empty(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("The {field} cannot be empty")));
    }
    Ok(value.to_string())
}

fn clean_rules(rules: Vec<String>) -> Vec<String> {
    rules
        .into_iter()
        .map(|rule| rule.trim().to_string())
        .filter(|rule| !rule.is_empty())
        .collect()
}
