//! GitHub implementation of [`StatsClient`].
//!
//! Profile and repository data come from the GraphQL API, commit counts from the REST commit search.

mod builder;
mod limiter;
mod payload;
mod queries;

pub use builder::{GithubClientBuilder, DEFAULT_GITHUB_URL};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::SecondsFormat;
use dev_stats::api::{
    Error, OwnedReposQuery, OwnedReposSnapshot, ProfileQuery, ProfileSnapshot, QueryResponse, Result, StatsClient,
};
use limiter::RateLimiters;
use log::debug;
use payload::{
    ErrorBody, GraphQlRequest, GraphQlResponse, OwnedReposUser, OwnedReposVariables, ProfileUser, ProfileVariables,
    SearchCommits, UserData,
};
use reqwest::header;
use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

const ACCOUNT_SUSPENDED: &str = "Sorry. Your account was suspended.";

pub struct GithubClient {
    client: Client,
    github_url: Url,
    graphql_limiters: RateLimiters,
    search_limiters: RateLimiters,
}

impl GithubClient {
    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.github_url.join(path).map_err(anyhow::Error::from)?)
    }

    async fn graphql<V, U, T>(&self, token: &SecretString, query: &'static str, variables: V) -> Result<QueryResponse<T>>
    where
        V: Serialize,
        U: DeserializeOwned,
        T: From<U>,
    {
        let limiter = self.graphql_limiters.for_token(token).await;
        limiter.acquire().await?;
        let response = self
            .client
            .post(self.endpoint("graphql")?)
            .header(header::AUTHORIZATION, format!("bearer {}", token.expose_secret()))
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;
        if let Err(err) = limiter.reset_limiter(response.headers()).await {
            debug!("GraphQL rate limit not updated: {}", err);
        }
        let response = check_status(response).await?;
        let body = response.json::<GraphQlResponse<UserData<U>>>().await?;
        if body.is_rate_limited() {
            return Err(Error::RateLimited);
        }
        Ok(body.into_query_response())
    }
}

#[async_trait]
impl StatsClient for GithubClient {
    async fn user_profile(&self, token: &SecretString, query: &ProfileQuery) -> Result<QueryResponse<ProfileSnapshot>> {
        let variables = ProfileVariables {
            login: &query.login,
            owner_affiliations: query.owner_affiliations.iter().map(ToString::to_string).collect(),
        };
        self.graphql::<_, ProfileUser, _>(token, queries::USER_INFO, variables)
            .await
    }

    async fn owned_repos(
        &self,
        token: &SecretString,
        query: &OwnedReposQuery,
    ) -> Result<QueryResponse<OwnedReposSnapshot>> {
        let variables = OwnedReposVariables {
            login: &query.login,
            since: query.since.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.graphql::<_, OwnedReposUser, _>(token, queries::PRIVATE_ANONYMOUS_INFO, variables)
            .await
    }

    async fn search_commit_count(&self, token: &SecretString, login: &str) -> Result<u64> {
        let limiter = self.search_limiters.for_token(token).await;
        limiter.acquire().await?;
        let response = self
            .client
            .get(self.endpoint("search/commits")?)
            .query(&[("q", format!("author:{}", login))])
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/vnd.github.cloak-preview")
            .header(header::AUTHORIZATION, format!("token {}", token.expose_secret()))
            .send()
            .await?;
        if let Err(err) = limiter.reset_limiter(response.headers()).await {
            debug!("Search rate limit not updated: {}", err);
        }
        let response = check_status(response).await?;
        let body = response.json::<SearchCommits>().await?;
        debug!("Found {} commits of {}", body.total_count, login);
        Ok(body.total_count)
    }
}

/// Maps exhausted rate limits and rejected credentials to their own errors, so they can be retried with another token.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let limit_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|remaining| remaining.to_str().ok())
        .map_or(false, |remaining| remaining == "0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && limit_exhausted) {
        return Err(Error::RateLimited);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.to_string());
        if status == StatusCode::UNAUTHORIZED || message == ACCOUNT_SUSPENDED {
            return Err(Error::BadCredentials(message));
        }
        return Err(Error::Other(anyhow!("{}: {}", status, message)));
    }
    Ok(response.error_for_status()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dev_stats::api::OwnershipFilter;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token() -> SecretString {
        SecretString::new("secret".to_string())
    }

    fn client(server: &MockServer) -> GithubClient {
        GithubClientBuilder::default()
            .with_github_url(server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn owned_repos_request_test() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("Authorization", "bearer secret"))
            .and(body_string_contains("privateAnonymousInfo"))
            .and(body_string_contains(r#""since":"2022-01-05T12:00:00.000Z""#))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{ "data": { "user": { "repositories": { "nodes": [ { "name": "_a", "defaultBranchRef": null } ] } } } }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let since = Utc.with_ymd_and_hms(2022, 1, 5, 12, 0, 0).unwrap();
        let query = OwnedReposQuery::new("octocat".to_string(), since);
        let response = client(&server).owned_repos(&token(), &query).await.unwrap();
        assert_eq!(response.data.unwrap().repositories.len(), 1);
    }

    #[tokio::test]
    async fn rate_limited_graphql_test() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{ "errors": [ { "type": "RATE_LIMITED", "message": "API rate limit exceeded" } ] }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let query = ProfileQuery::new("octocat".to_string(), OwnershipFilter::default());
        let result = client(&server).user_profile(&token(), &query).await;
        assert!(matches!(result, Err(Error::RateLimited)));
    }

    #[tokio::test]
    async fn bad_credentials_test() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                r#"{ "message": "Bad credentials", "documentation_url": "https://docs.github.com/graphql" }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let query = ProfileQuery::new("octocat".to_string(), OwnershipFilter::default());
        match client(&server).user_profile(&token(), &query).await {
            Err(Error::BadCredentials(message)) => assert_eq!(message, "Bad credentials"),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn search_commits_test() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/commits"))
            .and(query_param("q", "author:octocat"))
            .and(header("Accept", "application/vnd.github.cloak-preview"))
            .and(header("Authorization", "token secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-ratelimit-limit", "30")
                    .insert_header("x-ratelimit-remaining", "29")
                    .insert_header("x-ratelimit-reset", "1700000000")
                    .set_body_raw(r#"{ "total_count": 500, "incomplete_results": false, "items": [] }"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let count = client(&server).search_commit_count(&token(), "octocat").await.unwrap();
        assert_eq!(count, 500);
    }

    #[tokio::test]
    async fn search_rate_limited_test() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/commits"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_raw(r#"{ "message": "API rate limit exceeded" }"#, "application/json"),
            )
            .mount(&server)
            .await;

        let result = client(&server).search_commit_count(&token(), "octocat").await;
        assert!(matches!(result, Err(Error::RateLimited)));
    }
}
