use chrono::Utc;
use derive_more::Constructor;
use dev_stats::api;
use log::debug;
use log::info;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Header {0} not found")]
    Missing(&'static str),
    #[error("Header {0} is not a string: {1}")]
    NotString(&'static str, reqwest::header::ToStrError),
    #[error("Header {0} is not valid: {1}")]
    Invalid(&'static str, String),
}

#[derive(Constructor, Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    limit: u32,
    remaining: u32,
    reset: i64,
}

/// Tracks remaining request budget of one token on one API surface, as reported by `x-ratelimit-*` headers.
#[derive(Debug)]
pub struct RateLimiter {
    limit: Mutex<RateLimit>,
}

impl Default for RateLimiter {
    /// Nothing known until the first response arrives.
    fn default() -> Self {
        RateLimiter::new(RateLimit::new(u32::MAX, u32::MAX, 0))
    }
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        RateLimiter {
            limit: Mutex::new(limit),
        }
    }

    /// Takes one request from the budget. An exhausted budget fails with [`api::Error::RateLimited`]
    /// rather than waiting for the reset, so the retryer moves on to the next token.
    pub(crate) async fn acquire(&self) -> api::Result<()> {
        match self.time_to_wait().await {
            None => Ok(()),
            Some(delay) => {
                info!("Rate limit exhausted for another {} sec", delay.as_secs());
                Err(api::Error::RateLimited)
            }
        }
    }

    async fn time_to_wait(&self) -> Option<Duration> {
        let mut rate_limit = self.limit.lock().await;
        if rate_limit.remaining > 0 {
            debug!("Remaining limit {}. Not waiting.", rate_limit.remaining);
            rate_limit.remaining -= 1;
            return None;
        }
        let now = Utc::now().timestamp();
        if rate_limit.reset < now {
            debug!("Old reset. Resetting remaining to limit.");
            rate_limit.remaining = rate_limit.limit.saturating_sub(1);
            return None;
        }
        Some(Duration::from_secs((rate_limit.reset - now) as u64 + 1))
    }

    /// Updates the budget from response headers. Nothing changes unless all three headers are valid.
    pub(crate) async fn reset_limiter(&self, headers: &HeaderMap<HeaderValue>) -> Result<(), HeaderError> {
        let limit = read_header::<u32>(headers, "x-ratelimit-limit")?;
        let remaining = read_header::<u32>(headers, "x-ratelimit-remaining")?;
        let reset = read_header::<i64>(headers, "x-ratelimit-reset")?;
        let mut rate_limit = self.limit.lock().await;
        rate_limit.limit = limit;
        // Min `remaining` because a late response may arrive with old `remaining`
        rate_limit.remaining = std::cmp::min(remaining, rate_limit.remaining);
        // Max `reset` because a late response may arrive with old `reset`
        rate_limit.reset = std::cmp::max(reset, rate_limit.reset);
        debug!("Updated limits: {:?}", rate_limit);
        Ok(())
    }

    #[cfg(test)]
    async fn current(&self) -> RateLimit {
        *self.limit.lock().await
    }
}

/// One [`RateLimiter`] per API token, so an exhausted token never delays the others.
#[derive(Debug, Default)]
pub struct RateLimiters {
    limiters: Mutex<HashMap<u64, Arc<RateLimiter>>>,
}

impl RateLimiters {
    pub(crate) async fn for_token(&self, token: &SecretString) -> Arc<RateLimiter> {
        let mut hasher = DefaultHasher::new();
        token.expose_secret().hash(&mut hasher);
        let mut limiters = self.limiters.lock().await;
        limiters.entry(hasher.finish()).or_default().clone()
    }
}

fn read_header<T>(headers: &HeaderMap<HeaderValue>, header: &'static str) -> Result<T, HeaderError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    let value = headers
        .get(header)
        .ok_or(HeaderError::Missing(header))?
        .to_str()
        .map_err(|err| HeaderError::NotString(header, err))?;
    value
        .parse::<T>()
        .map_err(|err| HeaderError::Invalid(header, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(limit: &str, remaining: &str, reset: &str) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_str(limit)?);
        headers.insert("x-ratelimit-remaining", HeaderValue::from_str(remaining)?);
        headers.insert("x-ratelimit-reset", HeaderValue::from_str(reset)?);
        Ok(headers)
    }

    #[tokio::test]
    async fn remaining_budget_does_not_wait_test() {
        let limiter = RateLimiter::new(RateLimit::new(3, 1, Utc::now().timestamp() + 60));
        assert_eq!(limiter.time_to_wait().await, None);
        assert_eq!(limiter.current().await.remaining, 0);
    }

    #[tokio::test]
    async fn exhausted_budget_waits_until_reset_test() {
        let reset = Utc::now().timestamp() + 60;
        let limiter = RateLimiter::new(RateLimit::new(3, 0, reset));
        let delay = limiter.time_to_wait().await.expect("Limiter should wait");
        assert!(delay.as_secs() >= 59 && delay.as_secs() <= 61, "delay {:?}", delay);
    }

    #[tokio::test]
    async fn past_reset_restores_budget_test() {
        let limiter = RateLimiter::new(RateLimit::new(3, 0, Utc::now().timestamp() - 1));
        assert_eq!(limiter.time_to_wait().await, None);
        assert_eq!(limiter.current().await.remaining, 2);
    }

    #[tokio::test]
    async fn reset_from_headers_test() -> anyhow::Result<()> {
        let reset = Utc::now().timestamp() + 60;
        let limiter = RateLimiter::new(RateLimit::new(5000, 10, reset));

        limiter.reset_limiter(&headers("5000", "4", &(reset - 30).to_string())?).await?;
        assert_eq!(limiter.current().await, RateLimit::new(5000, 4, reset));

        limiter.reset_limiter(&headers("5000", "8", &(reset + 30).to_string())?).await?;
        assert_eq!(
            limiter.current().await,
            RateLimit::new(5000, 4, reset + 30),
            "Late response with higher remaining should be ignored"
        );
        Ok(())
    }

    #[tokio::test]
    async fn limiters_are_per_token_test() -> anyhow::Result<()> {
        let limiters = RateLimiters::default();
        let first = SecretString::new("first".to_string());
        let second = SecretString::new("second".to_string());

        let exhausted = limiters.for_token(&first).await;
        let reset = Utc::now().timestamp() + 3600;
        exhausted.reset_limiter(&headers("5000", "0", &reset.to_string())?).await?;

        assert!(Arc::ptr_eq(&exhausted, &limiters.for_token(&first).await));
        assert!(matches!(limiters.for_token(&first).await.acquire().await, Err(api::Error::RateLimited)));
        assert!(limiters.for_token(&second).await.acquire().await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn missing_headers_keep_limits_test() {
        let limiter = RateLimiter::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("60"));
        let result = limiter.reset_limiter(&headers).await;
        assert!(matches!(result, Err(HeaderError::Missing("x-ratelimit-remaining"))));
        assert_eq!(limiter.current().await, RateLimit::new(u32::MAX, u32::MAX, 0));
    }
}
