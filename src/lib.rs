mod args;

pub use args::Args;

use dev_stats::api::{AggregateStats, OwnershipFilter, Result, StatsRequest};
use dev_stats::retry::Retryer;
use dev_stats::StatsFetcher;
use github_client::GithubClientBuilder;
use log::info;
use std::time::Duration;

pub async fn fetch_stats(args: Args) -> Result<AggregateStats> {
    let owner_affiliations = OwnershipFilter::parse(&args.owner_affiliations)?;
    let request = StatsRequest::new(args.username, owner_affiliations)
        .with_count_private(args.count_private)
        .with_include_all_commits(args.include_all_commits);

    info!(
        "Fetching stats of {} from {} with {} API token(s)",
        request.username,
        args.api_url,
        args.api_token.len()
    );
    let client = GithubClientBuilder::default().with_github_url(args.api_url).build()?;
    let retryer = Retryer::new(args.api_token)?
        .with_max_retries(args.max_retries)
        .with_backoff(Duration::from_millis(args.retry_backoff_ms));

    StatsFetcher::new(client, retryer).fetch_stats(&request).await
}
