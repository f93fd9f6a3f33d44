use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::SecretString;

use crate::api::{Error, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 7;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Invokes an operation with an API token until it succeeds or retries are exhausted.
#[async_trait]
pub trait Retry: Send + Sync {
    async fn retry<T, F, FUT>(&self, operation: F) -> Result<T>
    where
        T: Send,
        F: Fn(SecretString) -> FUT + Send + Sync,
        FUT: Future<Output = Result<T>> + Send;
}

pub struct Retryer {
    tokens: Vec<SecretString>,
    max_retries: u32,
    backoff: Duration,
}

impl Retryer {
    /// Tokens are used in rotation, the first one for the first attempt.
    pub fn new(tokens: Vec<SecretString>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(Error::InvalidInput("At least one API token is required"));
        }
        Ok(Retryer {
            tokens,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff
            .checked_mul(1 << attempt.min(16))
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }
}

enum Outcome {
    RotateToken,
    Backoff,
    GiveUp,
}

fn classify(err: &Error) -> Outcome {
    match err {
        Error::RateLimited | Error::BadCredentials(_) => Outcome::RotateToken,
        Error::RequestError(err)
            if err.is_timeout() || err.is_connect() || err.status().map_or(false, |s| s.is_server_error()) =>
        {
            Outcome::Backoff
        }
        _ => Outcome::GiveUp,
    }
}

#[async_trait]
impl Retry for Retryer {
    async fn retry<T, F, FUT>(&self, operation: F) -> Result<T>
    where
        T: Send,
        F: Fn(SecretString) -> FUT + Send + Sync,
        FUT: Future<Output = Result<T>> + Send,
    {
        let mut attempt = 0;
        loop {
            let token = self.tokens[attempt as usize % self.tokens.len()].clone();
            let err = match operation(token).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            let outcome = classify(&err);
            if let Outcome::GiveUp = outcome {
                return Err(err);
            }
            if attempt >= self.max_retries {
                return Err(Error::RetryExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }
            match outcome {
                Outcome::RotateToken => warn!("Attempt {} failed: {}. Rotating API token.", attempt + 1, err),
                _ => {
                    let delay = self.backoff_delay(attempt);
                    debug!("Attempt {} failed: {}. Retrying in {} ms.", attempt + 1, err, delay.as_millis());
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }
}
