//! GraphQL documents sent to `/graphql`.

/// Profile, contribution totals and the 100 most starred affiliated repositories.
pub const USER_INFO: &str = r#"
query userInfo($login: String!, $ownerAffiliations: [RepositoryAffiliation]) {
  user(login: $login) {
    name
    login
    contributionsCollection {
      totalCommitContributions
      restrictedContributionsCount
    }
    repositoriesContributedTo(first: 1, contributionTypes: [COMMIT, ISSUE, PULL_REQUEST, REPOSITORY]) {
      totalCount
    }
    pullRequests(first: 1) {
      totalCount
    }
    openIssues: issues(states: OPEN) {
      totalCount
    }
    closedIssues: issues(states: CLOSED) {
      totalCount
    }
    followers {
      totalCount
    }
    repositories(first: 100, ownerAffiliations: $ownerAffiliations, orderBy: {direction: DESC, field: STARGAZERS}) {
      totalCount
      nodes {
        stargazers {
          totalCount
        }
      }
    }
  }
}
"#;

/// Default branch commit counts of owned, non-forked repositories since `$since`.
pub const PRIVATE_ANONYMOUS_INFO: &str = r#"
query privateAnonymousInfo($login: String!, $since: GitTimestamp!) {
  user(login: $login) {
    repositories(first: 100, ownerAffiliations: OWNER, isFork: false) {
      totalCount
      nodes {
        name
        defaultBranchRef {
          target {
            ... on Commit {
              history(first: 0, since: $since) {
                totalCount
              }
            }
          }
        }
      }
    }
  }
}
"#;
