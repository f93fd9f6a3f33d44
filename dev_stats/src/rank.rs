//! Letter graded rank derived from aggregated activity.
//!
//! Score is a percentile: the lower, the better.

use derive_more::Constructor;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RankLevel {
    #[strum(serialize = "S+")]
    SPlus,
    #[strum(serialize = "S")]
    S,
    #[strum(serialize = "A++")]
    APlusPlus,
    #[strum(serialize = "A+")]
    APlus,
    #[strum(serialize = "B+")]
    BPlus,
    #[strum(serialize = "C")]
    C,
}

#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct Rank {
    pub level: RankLevel,
    pub score: f64,
}

impl Default for Rank {
    fn default() -> Self {
        Rank::new(RankLevel::C, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RankMetrics {
    pub total_commits: u64,
    /// All affiliated repositories, not only the first page.
    pub total_repos: u64,
    pub followers: u64,
    pub contributions: u64,
    pub stargazers: u64,
    pub prs: u64,
    pub issues: u64,
}

/// Scoring collaborator turning metrics into a rank. Assumed total.
pub trait RankScorer: Send + Sync {
    fn score(&self, metrics: &RankMetrics) -> Rank;
}

impl<F> RankScorer for F
where
    F: Fn(&RankMetrics) -> Rank + Send + Sync,
{
    fn score(&self, metrics: &RankMetrics) -> Rank {
        self(metrics)
    }
}

/// [`RankScorer`] backed by [`calculate_rank`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatedRank;

impl RankScorer for CalculatedRank {
    fn score(&self, metrics: &RankMetrics) -> Rank {
        calculate_rank(metrics)
    }
}

const COMMITS_OFFSET: f64 = 1.65;
const CONTRIBS_OFFSET: f64 = 1.65;
const ISSUES_OFFSET: f64 = 1.0;
const STARS_OFFSET: f64 = 0.75;
const PRS_OFFSET: f64 = 0.5;
const FOLLOWERS_OFFSET: f64 = 0.45;
const REPO_OFFSET: f64 = 1.0;

const ALL_OFFSETS: f64 = CONTRIBS_OFFSET + ISSUES_OFFSET + STARS_OFFSET + PRS_OFFSET + FOLLOWERS_OFFSET + REPO_OFFSET;

const RANK_S_VALUE: f64 = 1.0;
const RANK_DOUBLE_A_VALUE: f64 = 25.0;
const RANK_A2_VALUE: f64 = 45.0;
const RANK_A3_VALUE: f64 = 60.0;
const RANK_B_VALUE: f64 = 100.0;

const TOTAL_VALUES: f64 = RANK_S_VALUE + RANK_A2_VALUE + RANK_A3_VALUE + RANK_B_VALUE;

pub fn calculate_rank(metrics: &RankMetrics) -> Rank {
    let weighted = metrics.total_commits as f64 * COMMITS_OFFSET
        + metrics.contributions as f64 * CONTRIBS_OFFSET
        + metrics.issues as f64 * ISSUES_OFFSET
        + metrics.stargazers as f64 * STARS_OFFSET
        + metrics.prs as f64 * PRS_OFFSET
        + metrics.followers as f64 * FOLLOWERS_OFFSET
        + metrics.total_repos as f64 * REPO_OFFSET;
    let score = normal_cdf(weighted / 100.0, TOTAL_VALUES, ALL_OFFSETS) * 100.0;
    let level = match score {
        s if s < RANK_S_VALUE => RankLevel::SPlus,
        s if s < RANK_DOUBLE_A_VALUE => RankLevel::S,
        s if s < RANK_A2_VALUE => RankLevel::APlusPlus,
        s if s < RANK_A3_VALUE => RankLevel::APlus,
        _ => RankLevel::BPlus,
    };
    Rank::new(level, score)
}

/// Normal distribution CDF at `to`, with the Abramowitz and Stegun approximation of erf.
fn normal_cdf(mean: f64, sigma: f64, to: f64) -> f64 {
    let z = (to - mean) / (2.0 * sigma * sigma).sqrt();
    let t = 1.0 / (1.0 + 0.3275911 * z.abs());
    let (a1, a2, a3, a4, a5) = (0.254829592, -0.284496736, 1.421413741, -1.453152027, 1.061405429);
    let erf = 1.0 - ((((a5 * t + a4) * t + a3) * t + a2) * t + a1) * t * (-z * z).exp();
    let sign = if z < 0.0 { -1.0 } else { 1.0 };
    0.5 * (1.0 + sign * erf)
}

#[test]
fn no_activity_rank_test() {
    let rank = calculate_rank(&RankMetrics::default());
    assert_eq!(rank.level, RankLevel::APlus);
    assert!(rank.score > 50.0 && rank.score < 53.0, "score {}", rank.score);
}

#[test]
fn huge_activity_rank_test() {
    let metrics = RankMetrics {
        total_commits: 100_000,
        total_repos: 500,
        followers: 20_000,
        contributions: 1_000,
        stargazers: 200_000,
        prs: 5_000,
        issues: 3_000,
    };
    let rank = calculate_rank(&metrics);
    assert_eq!(rank.level, RankLevel::SPlus);
    assert!(rank.score < RANK_S_VALUE);
}

#[test]
fn more_activity_never_ranks_worse_test() {
    let mut previous = calculate_rank(&RankMetrics::default()).score;
    for commits in (0..5_000).step_by(250) {
        let metrics = RankMetrics {
            total_commits: commits,
            ..RankMetrics::default()
        };
        let score = calculate_rank(&metrics).score;
        assert!(score <= previous, "{} commits scored {} after {}", commits, score, previous);
        previous = score;
    }
}

#[test]
fn closure_scorer_test() {
    let scorer = |metrics: &RankMetrics| Rank::new(RankLevel::S, metrics.total_commits as f64);
    let metrics = RankMetrics {
        total_commits: 7,
        ..RankMetrics::default()
    };
    assert_eq!(scorer.score(&metrics), Rank::new(RankLevel::S, 7.0));
    assert_eq!(RankLevel::APlusPlus.to_string(), "A++");
}
