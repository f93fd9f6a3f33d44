//! Developer activity statistics
//!
//! # Overview
//!
//! Library aggregates a GitHub account's activity into a single ranked record.
//! Given a username and an ownership affiliation filter (`OWNER`, `COLLABORATOR`, `ORGANIZATION_MEMBER`),
//! it queries the user's profile and contributions, and the recent commit history of repositories the user owns.
//!
//! Commits are counted from public commit contributions. Restricted (private) contributions may be added,
//! or contribution counts may be replaced altogether by a commit search count.
//! Commits to anonymized repositories (named with a leading `_`) made during the last 360 days are always added.
//!
//! Stars are summed over the 100 most starred affiliated repositories only.
//! The resulting totals are graded with a letter rank (`S+` best, `B+` worst).

#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "fetcher")]
pub mod fetcher;
pub mod rank;
#[cfg(feature = "fetcher")]
pub mod retry;

#[cfg(feature = "fetcher")]
pub use fetcher::StatsFetcher;
