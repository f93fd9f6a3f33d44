use chrono::Utc;
use log::{debug, error, warn};

use crate::api::{
    is_valid_username, AggregateStats, Error, OwnedReposQuery, OwnedReposSnapshot, ProfileQuery, ProfileSnapshot,
    QueryResponse, Result, StatsClient, StatsRequest,
};
use crate::rank::{CalculatedRank, RankMetrics, RankScorer};
use crate::retry::Retry;

/// Repositories named with this prefix are anonymized private ones.
pub const ANONYMIZED_REPO_PREFIX: char = '_';

pub struct StatsFetcher<CLIENT, RETRY, RANK = CalculatedRank>
where
    CLIENT: StatsClient,
    RETRY: Retry,
    RANK: RankScorer,
{
    client: CLIENT,
    retry: RETRY,
    rank: RANK,
}

impl<CLIENT, RETRY> StatsFetcher<CLIENT, RETRY, CalculatedRank>
where
    CLIENT: StatsClient,
    RETRY: Retry,
{
    pub fn new(client: CLIENT, retry: RETRY) -> Self {
        StatsFetcher {
            client,
            retry,
            rank: CalculatedRank,
        }
    }
}

impl<CLIENT, RETRY, RANK> StatsFetcher<CLIENT, RETRY, RANK>
where
    CLIENT: StatsClient,
    RETRY: Retry,
    RANK: RankScorer,
{
    pub fn with_rank<SCORER: RankScorer>(self, rank: SCORER) -> StatsFetcher<CLIENT, RETRY, SCORER> {
        StatsFetcher {
            client: self.client,
            retry: self.retry,
            rank,
        }
    }

    /// Fetches profile and owned repositories (and commit search if requested) in sequence,
    /// then reconciles them into one ranked record.
    pub async fn fetch_stats(&self, request: &StatsRequest) -> Result<AggregateStats> {
        if request.username.is_empty() {
            return Err(Error::InvalidInput("Invalid username"));
        }
        let username = request.username.as_str();

        let profile_query = ProfileQuery::new(username.to_string(), request.owner_affiliations.clone());
        debug!("Fetching profile of {} ({})", username, request.owner_affiliations);
        let profile = self
            .retry
            .retry(|token| {
                let client = &self.client;
                let query = &profile_query;
                async move { client.user_profile(&token, query).await }
            })
            .await
            .and_then(log_query_errors)?;

        let owned_query = OwnedReposQuery::with_lookback(username, Utc::now());
        debug!("Fetching owned repositories of {} since {}", username, owned_query.since);
        let owned = self
            .retry
            .retry(|token| {
                let client = &self.client;
                let query = &owned_query;
                async move { client.owned_repos(&token, query).await }
            })
            .await
            .and_then(log_query_errors)?;

        let fallback_commits = if request.include_all_commits {
            Some(self.total_commits_fallback(username).await)
        } else {
            None
        };

        let mut stats = reconcile(&profile, &owned, fallback_commits, request.count_private);
        stats.rank = self.rank.score(&rank_metrics(&stats, &profile));
        Ok(stats)
    }

    /// Commit search count of `username`. Never fails: problems are logged and counted as 0.
    pub async fn total_commits_fallback(&self, username: &str) -> u64 {
        if !is_valid_username(username) {
            warn!("Invalid username {:?}. Not searching commits.", username);
            return 0;
        }
        let count = self
            .retry
            .retry(|token| {
                let client = &self.client;
                async move { client.search_commit_count(&token, username).await }
            })
            .await;
        count.unwrap_or_else(|err| {
            error!("Failed to search commits of {}: {}", username, err);
            0
        })
    }
}

fn log_query_errors<T>(response: QueryResponse<T>) -> Result<T> {
    if !response.errors.is_empty() {
        error!("Query errors: {:?}", response.errors);
    }
    response.into_result()
}

/// Combines fetched snapshots into stats without rank.
///
/// # Arguments
/// * `fallback_commits` - commit search count, replaces contribution counts when present
/// * `count_private` - adds restricted contributions, unless `fallback_commits` is present
pub fn reconcile(
    profile: &ProfileSnapshot,
    owned: &OwnedReposSnapshot,
    fallback_commits: Option<u64>,
    count_private: bool,
) -> AggregateStats {
    let contributions = &profile.commit_contributions;
    let base_commits = match fallback_commits {
        Some(commits) => commits,
        None if count_private => contributions.public + contributions.restricted,
        None => contributions.public,
    };

    AggregateStats {
        name: profile.name.clone().unwrap_or_else(|| profile.login.clone()),
        total_prs: profile.pull_requests,
        total_commits: base_commits + anonymized_commits(owned),
        total_issues: profile.open_issues + profile.closed_issues,
        total_stars: profile.repositories.stargazers.iter().sum(),
        contributed_to: profile.contributed_to,
        ..AggregateStats::default()
    }
}

/// Default branch commits of anonymized repositories. Missing history counts as 0.
pub fn anonymized_commits(owned: &OwnedReposSnapshot) -> u64 {
    owned
        .repositories
        .iter()
        .filter(|repo| repo.name.starts_with(ANONYMIZED_REPO_PREFIX))
        .filter_map(|repo| repo.commits_since)
        .sum()
}

fn rank_metrics(stats: &AggregateStats, profile: &ProfileSnapshot) -> RankMetrics {
    RankMetrics {
        total_commits: stats.total_commits,
        total_repos: profile.repositories.total_count,
        followers: profile.followers,
        contributions: stats.contributed_to,
        stargazers: stats.total_stars,
        prs: stats.total_prs,
        issues: stats.total_issues,
    }
}
