use clap::Parser;
use dev_stats::retry::DEFAULT_MAX_RETRIES;
use secrecy::SecretString;
use std::{fmt::Display, str::FromStr};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// GitHub username
    #[clap(env = "GITHUB_USERNAME")]
    pub username: String,

    /// Repository affiliations counted towards stars: OWNER, COLLABORATOR, ORGANIZATION_MEMBER
    #[clap(short, long, env, value_delimiter = ',')]
    pub owner_affiliations: Vec<String>,

    /// Add restricted (private) contributions to commits
    #[clap(short, long, env)]
    pub count_private: bool,

    /// Count commits with commit search instead of contributions
    #[clap(short, long, env)]
    pub include_all_commits: bool,

    /// API OAuth access tokens, used in rotation when rate limited
    #[clap(short, long, env, required = true, value_delimiter = ',')]
    pub api_token: Vec<SecretString>,

    /// Repository API URL
    #[clap(long, env, default_value = "https://api.github.com")]
    pub api_url: String,

    /// Maximal retries of a single API request
    #[clap(long, env, default_value_t = DEFAULT_MAX_RETRIES, parse(try_from_str=max_retries_in_range))]
    pub max_retries: u32,

    /// Initial delay in milliseconds before retrying a failed request, doubled on every retry
    #[clap(long, env, default_value_t = 500, parse(try_from_str=retry_backoff_in_range))]
    pub retry_backoff_ms: u64,
}

fn max_retries_in_range(value: &str) -> clap::Result<u32, String> {
    number_in_range(value, 0, 20, "max_retries".to_string())
}

fn retry_backoff_in_range(value: &str) -> clap::Result<u64, String> {
    number_in_range(value, 0, 60_000, "retry_backoff_ms".to_string())
}

fn number_in_range<T>(value: &str, min: T, max: T, name: String) -> clap::Result<T, String>
where
    T: FromStr + PartialOrd + Display,
    <T as FromStr>::Err: Display,
{
    value.parse::<T>().map_err(|err| format!("{}", err)).and_then(|value| {
        if value < min || value > max {
            return Err(format!("{} is not in range {} .. {}.", name, min, max));
        }
        Ok(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn parse_args_test() {
        let args = Args::try_parse_from([
            "dev_stats",
            "octocat",
            "--owner-affiliations",
            "owner,collaborator",
            "--count-private",
            "--api-token",
            "first,second",
            "--max-retries",
            "3",
        ])
        .unwrap();
        assert_eq!(args.username, "octocat");
        assert_eq!(args.owner_affiliations, vec!["owner", "collaborator"]);
        assert!(args.count_private);
        assert!(!args.include_all_commits);
        let tokens: Vec<&String> = args.api_token.iter().map(|token| token.expose_secret()).collect();
        assert_eq!(tokens, vec!["first", "second"]);
        assert_eq!(args.max_retries, 3);
        assert_eq!(args.retry_backoff_ms, 500);
    }

    #[test]
    fn max_retries_range_test() {
        assert_eq!(max_retries_in_range("0"), Ok(0));
        assert!(max_retries_in_range("21").is_err());
        assert!(max_retries_in_range("many").is_err());
    }
}
