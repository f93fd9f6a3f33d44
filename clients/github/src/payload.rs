use dev_stats::api::{
    CommitContributions, OwnedRepo, OwnedReposSnapshot, ProfileSnapshot, QueryError, QueryResponse, RepositoryStars,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
pub struct GraphQlRequest<V> {
    pub query: &'static str,
    pub variables: V,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileVariables<'a> {
    pub login: &'a str,
    pub owner_affiliations: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct OwnedReposVariables<'a> {
    pub login: &'a str,
    pub since: String,
}

#[derive(Deserialize, Debug)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Deserialize, Debug)]
pub struct GraphQlError {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl From<GraphQlError> for QueryError {
    fn from(error: GraphQlError) -> Self {
        QueryError {
            message: error.message,
            kind: error.kind,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct UserData<U> {
    pub user: Option<U>,
}

impl<U> GraphQlResponse<UserData<U>> {
    pub fn is_rate_limited(&self) -> bool {
        self.errors.iter().any(|error| error.kind.as_deref() == Some("RATE_LIMITED"))
    }

    pub fn into_query_response<T: From<U>>(self) -> QueryResponse<T> {
        QueryResponse {
            data: self.data.and_then(|data| data.user).map(T::from),
            errors: self.errors.into_iter().map(QueryError::from).collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUser {
    pub name: Option<String>,
    pub login: String,
    pub contributions_collection: ContributionsCollection,
    pub repositories_contributed_to: TotalCount,
    pub pull_requests: TotalCount,
    pub open_issues: TotalCount,
    pub closed_issues: TotalCount,
    pub followers: TotalCount,
    pub repositories: StarredRepos,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContributionsCollection {
    pub total_commit_contributions: u64,
    pub restricted_contributions_count: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StarredRepos {
    pub total_count: u64,
    #[serde(default)]
    pub nodes: Vec<Option<StarredRepo>>,
}

#[derive(Deserialize, Debug)]
pub struct StarredRepo {
    pub stargazers: TotalCount,
}

impl From<ProfileUser> for ProfileSnapshot {
    fn from(user: ProfileUser) -> Self {
        ProfileSnapshot {
            name: user.name.filter(|name| !name.is_empty()),
            login: user.login,
            commit_contributions: CommitContributions {
                public: user.contributions_collection.total_commit_contributions,
                restricted: user.contributions_collection.restricted_contributions_count,
            },
            contributed_to: user.repositories_contributed_to.total_count,
            pull_requests: user.pull_requests.total_count,
            open_issues: user.open_issues.total_count,
            closed_issues: user.closed_issues.total_count,
            followers: user.followers.total_count,
            repositories: RepositoryStars {
                total_count: user.repositories.total_count,
                stargazers: user
                    .repositories
                    .nodes
                    .into_iter()
                    .flatten()
                    .map(|repo| repo.stargazers.total_count)
                    .collect(),
            },
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct OwnedReposUser {
    pub repositories: OwnedRepos,
}

#[derive(Deserialize, Debug)]
pub struct OwnedRepos {
    #[serde(default)]
    pub nodes: Vec<Option<OwnedRepoNode>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OwnedRepoNode {
    pub name: String,
    pub default_branch_ref: Option<BranchRef>,
}

#[derive(Deserialize, Debug)]
pub struct BranchRef {
    pub target: Option<CommitTarget>,
}

/// Only commits carry `history`, other targets decode to `None`.
#[derive(Deserialize, Debug)]
pub struct CommitTarget {
    pub history: Option<TotalCount>,
}

impl From<OwnedRepoNode> for OwnedRepo {
    fn from(repo: OwnedRepoNode) -> Self {
        let commits_since = repo
            .default_branch_ref
            .and_then(|branch| branch.target)
            .and_then(|target| target.history)
            .map(|history| history.total_count);
        OwnedRepo::new(repo.name, commits_since)
    }
}

impl From<OwnedReposUser> for OwnedReposSnapshot {
    fn from(user: OwnedReposUser) -> Self {
        OwnedReposSnapshot {
            repositories: user.repositories.nodes.into_iter().flatten().map(OwnedRepo::from).collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct SearchCommits {
    pub total_count: u64,
}

#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_decode_test() -> anyhow::Result<()> {
        let body = r#"{
            "data": {
                "user": {
                    "name": null,
                    "login": "octocat",
                    "contributionsCollection": { "totalCommitContributions": 120, "restrictedContributionsCount": 30 },
                    "repositoriesContributedTo": { "totalCount": 4 },
                    "pullRequests": { "totalCount": 9 },
                    "openIssues": { "totalCount": 1 },
                    "closedIssues": { "totalCount": 2 },
                    "followers": { "totalCount": 77 },
                    "repositories": {
                        "totalCount": 150,
                        "nodes": [ { "stargazers": { "totalCount": 10 } }, null, { "stargazers": { "totalCount": 5 } } ]
                    }
                }
            }
        }"#;
        let response: GraphQlResponse<UserData<ProfileUser>> = serde_json::from_str(body)?;
        assert!(!response.is_rate_limited());
        let snapshot: ProfileSnapshot = response.into_query_response().into_result()?;
        assert_eq!(snapshot.name, None);
        assert_eq!(snapshot.login, "octocat");
        assert_eq!(snapshot.commit_contributions.public, 120);
        assert_eq!(snapshot.commit_contributions.restricted, 30);
        assert_eq!(snapshot.repositories.total_count, 150);
        assert_eq!(snapshot.repositories.stargazers, vec![10, 5]);
        Ok(())
    }

    #[test]
    fn owned_repos_decode_test() -> anyhow::Result<()> {
        let body = r#"{
            "data": {
                "user": {
                    "repositories": {
                        "nodes": [
                            { "name": "_anon1", "defaultBranchRef": { "target": { "history": { "totalCount": 7 } } } },
                            { "name": "_empty", "defaultBranchRef": null },
                            { "name": "_tagged", "defaultBranchRef": { "target": {} } },
                            { "name": "public1", "defaultBranchRef": { "target": { "history": { "totalCount": 9 } } } }
                        ]
                    }
                }
            }
        }"#;
        let response: GraphQlResponse<UserData<OwnedReposUser>> = serde_json::from_str(body)?;
        let snapshot: OwnedReposSnapshot = response.into_query_response().into_result()?;
        assert_eq!(
            snapshot.repositories,
            vec![
                OwnedRepo::new("_anon1".to_string(), Some(7)),
                OwnedRepo::new("_empty".to_string(), None),
                OwnedRepo::new("_tagged".to_string(), None),
                OwnedRepo::new("public1".to_string(), Some(9)),
            ]
        );
        Ok(())
    }

    #[test]
    fn errors_decode_test() -> anyhow::Result<()> {
        let body = r#"{
            "data": { "user": null },
            "errors": [ { "type": "NOT_FOUND", "path": ["user"], "message": "Could not resolve to a User with the login of 'nobody'." } ]
        }"#;
        let response: GraphQlResponse<UserData<ProfileUser>> = serde_json::from_str(body)?;
        let response: QueryResponse<ProfileSnapshot> = response.into_query_response();
        assert_eq!(response.data, None);
        assert_eq!(response.errors[0].kind.as_deref(), Some("NOT_FOUND"));

        let body = r#"{ "errors": [ { "type": "RATE_LIMITED", "message": "API rate limit exceeded" } ] }"#;
        let response: GraphQlResponse<UserData<ProfileUser>> = serde_json::from_str(body)?;
        assert!(response.is_rate_limited());
        Ok(())
    }

    #[test]
    fn profile_variables_encode_test() -> anyhow::Result<()> {
        let request = GraphQlRequest {
            query: "query",
            variables: ProfileVariables {
                login: "octocat",
                owner_affiliations: vec!["OWNER".to_string(), "COLLABORATOR".to_string()],
            },
        };
        assert_eq!(
            serde_json::to_string(&request)?,
            r#"{"query":"query","variables":{"login":"octocat","ownerAffiliations":["OWNER","COLLABORATOR"]}}"#
        );
        Ok(())
    }
}
