use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use derive_more::Constructor;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::SecretString;
use strum_macros::{Display as StrumDisplay, EnumString};
use thiserror::Error;

use crate::rank::Rank;

/// Commit history lookback for owned repositories: 12 months of 30 days.
pub const LOOKBACK_DAYS: i64 = 12 * 30;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("Invalid owner affiliation: {0}")]
    InvalidAffiliation(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("API rate limit exceeded")]
    RateLimited,
    #[error("Bad credentials: {0}")]
    BadCredentials(String),
    #[error("Maximum retries exceeded after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<Error> },
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, StrumDisplay)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OwnerAffiliation {
    Owner,
    Collaborator,
    OrganizationMember,
}

/// Repository relationships counted towards repository and star totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipFilter(BTreeSet<OwnerAffiliation>);

impl OwnershipFilter {
    /// Parses caller supplied affiliations. Items may themselves be comma separated.
    /// Nothing specified means `OWNER`.
    pub fn parse<I, STR>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = STR>,
        STR: AsRef<str>,
    {
        let mut affiliations = BTreeSet::new();
        for item in items {
            for affiliation in item.as_ref().split(',').map(str::trim).filter(|a| !a.is_empty()) {
                let parsed = OwnerAffiliation::from_str(affiliation)
                    .map_err(|_| Error::InvalidAffiliation(affiliation.to_uppercase()))?;
                affiliations.insert(parsed);
            }
        }
        if affiliations.is_empty() {
            affiliations.insert(OwnerAffiliation::Owner);
        }
        Ok(OwnershipFilter(affiliations))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OwnerAffiliation> {
        self.0.iter()
    }

    pub fn contains(&self, affiliation: OwnerAffiliation) -> bool {
        self.0.contains(&affiliation)
    }
}

impl Default for OwnershipFilter {
    fn default() -> Self {
        OwnershipFilter(BTreeSet::from([OwnerAffiliation::Owner]))
    }
}

impl Display for OwnershipFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&names.join(","))
    }
}

/// Platform username syntax: alphanumerics or single hyphens, neither starting nor ending with a hyphen.
static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9]|-[A-Za-z0-9]){0,38}$").expect("Invalid username regex"));

const MAX_USERNAME_LEN: usize = 39;

pub fn is_valid_username(username: &str) -> bool {
    username.len() <= MAX_USERNAME_LEN && USERNAME.is_match(username)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsRequest {
    pub username: String,
    pub owner_affiliations: OwnershipFilter,
    pub count_private: bool,
    pub include_all_commits: bool,
}

impl StatsRequest {
    pub fn new(username: impl Into<String>, owner_affiliations: OwnershipFilter) -> Self {
        StatsRequest {
            username: username.into(),
            owner_affiliations,
            count_private: false,
            include_all_commits: false,
        }
    }

    pub fn with_count_private(mut self, count_private: bool) -> Self {
        self.count_private = count_private;
        self
    }

    pub fn with_include_all_commits(mut self, include_all_commits: bool) -> Self {
        self.include_all_commits = include_all_commits;
        self
    }
}

/// Variables of the profile and contributions query.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct ProfileQuery {
    pub login: String,
    pub owner_affiliations: OwnershipFilter,
}

/// Variables of the owned repositories commit history query.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct OwnedReposQuery {
    pub login: String,
    pub since: DateTime<Utc>,
}

impl OwnedReposQuery {
    pub fn with_lookback(login: impl Into<String>, now: DateTime<Utc>) -> Self {
        OwnedReposQuery::new(login.into(), now - Duration::days(LOOKBACK_DAYS))
    }
}

/// Structured query response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse<T> {
    pub data: Option<T>,
    pub errors: Vec<QueryError>,
}

impl<T> QueryResponse<T> {
    pub fn errors(errors: Vec<QueryError>) -> Self {
        QueryResponse { data: None, errors }
    }

    /// Any reported error fails the whole response, even with partial data present.
    pub fn into_result(self) -> Result<T> {
        if let Some(error) = self.errors.first() {
            let message = error
                .message
                .clone()
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "Could not fetch user".to_string());
            return Err(Error::UserNotFound(message));
        }
        self.data
            .ok_or_else(|| Error::UserNotFound("Could not fetch user".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryError {
    pub message: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitContributions {
    pub public: u64,
    pub restricted: u64,
}

/// First page of affiliated repositories, highest starred first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepositoryStars {
    /// Count of all matching repositories, not only the listed ones.
    pub total_count: u64,
    pub stargazers: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileSnapshot {
    pub name: Option<String>,
    pub login: String,
    pub commit_contributions: CommitContributions,
    pub contributed_to: u64,
    pub pull_requests: u64,
    pub open_issues: u64,
    pub closed_issues: u64,
    pub followers: u64,
    pub repositories: RepositoryStars,
}

#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct OwnedRepo {
    pub name: String,
    /// Default branch commits since the lookback date. `None` without a default branch.
    pub commits_since: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OwnedReposSnapshot {
    pub repositories: Vec<OwnedRepo>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateStats {
    pub name: String,
    pub total_prs: u64,
    pub total_commits: u64,
    pub total_issues: u64,
    pub total_stars: u64,
    pub contributed_to: u64,
    pub rank: Rank,
}

impl Display for AggregateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "total_commits: {}", self.total_commits)?;
        writeln!(f, "total_prs: {}", self.total_prs)?;
        writeln!(f, "total_issues: {}", self.total_issues)?;
        writeln!(f, "total_stars: {}", self.total_stars)?;
        writeln!(f, "contributed_to: {}", self.contributed_to)?;
        write!(f, "rank: {} ({:.2})", self.rank.level, self.rank.score)
    }
}

/// Access to the code hosting platform. Tokens are supplied per call by the retry collaborator.
#[async_trait]
pub trait StatsClient: Send + Sync {
    async fn user_profile(&self, token: &SecretString, query: &ProfileQuery) -> Result<QueryResponse<ProfileSnapshot>>;

    async fn owned_repos(
        &self,
        token: &SecretString,
        query: &OwnedReposQuery,
    ) -> Result<QueryResponse<OwnedReposSnapshot>>;

    /// Total count of commits authored by `login` reported by full-text commit search.
    async fn search_commit_count(&self, token: &SecretString, login: &str) -> Result<u64>;
}
