use crate::limiter::RateLimiters;
use crate::GithubClient;
use dev_stats::api::Result;
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::ClientBuilder;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com";

pub struct GithubClientBuilder {
    client_builder: ClientBuilder,
    github_url: String,
    headers: HeaderMap,
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::default();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("dev-stats"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        Self {
            client_builder: ClientBuilder::default().timeout(Duration::from_secs(30)),
            github_url: DEFAULT_GITHUB_URL.to_string(),
            headers,
        }
    }
}

impl GithubClientBuilder {
    pub fn try_with_user_agent<STR: AsRef<str>>(self, user_agent: STR) -> Result<GithubClientBuilder> {
        Ok(self.try_with_header(header::USER_AGENT, user_agent)?)
    }

    pub fn with_github_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.github_url = url.as_ref().to_string();
        self
    }

    fn try_with_header(mut self, key: HeaderName, val: impl AsRef<str>) -> anyhow::Result<GithubClientBuilder> {
        let val = HeaderValue::from_str(val.as_ref())?;
        self.headers.insert(key, val);
        Ok(self)
    }

    pub fn build(self) -> Result<GithubClient> {
        let client = self.client_builder.default_headers(self.headers).build()?;
        let github_url = base_url(&self.github_url)?;
        Ok(GithubClient {
            client,
            github_url,
            graphql_limiters: RateLimiters::default(),
            search_limiters: RateLimiters::default(),
        })
    }
}

/// Parses `url` so that relative endpoints are joined below its path.
fn base_url(url: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[test]
fn base_url_test() -> anyhow::Result<()> {
    assert_eq!(base_url("https://api.github.com")?.join("graphql")?.as_str(), "https://api.github.com/graphql");
    assert_eq!(
        base_url("https://example.com/api/v3")?.join("search/commits")?.as_str(),
        "https://example.com/api/v3/search/commits"
    );
    assert!(base_url("not a url").is_err());
    Ok(())
}

#[test]
fn invalid_user_agent_test() {
    assert!(GithubClientBuilder::default().try_with_user_agent("bad\nagent").is_err());
}
