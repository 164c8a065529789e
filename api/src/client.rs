use crate::paging::{records, FixturePage, FixtureRows, RawFixtures};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::wire::{WireLeague, WireTeam};
use crate::{FixtureQuery, FixtureRow, League, RawFixture, Team};
use log::{debug, error, info, warn};
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

pub const DEFAULT_BASE_URL: &str = "https://api.sportmonks.com/v3/football";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_PARAM: &str = "api_token";
const BODY_LOG_LIMIT: usize = 200;
const RETRYABLE_SERVER_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Connection settings for [`SportmonksApi`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Sent as the `api_token` query parameter on every request.
    pub api_token: Option<String>,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_token: None,
            retry: RetryPolicy::default(),
            user_agent: concat!("sportmonks-api/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ApiConfig {
    /// Defaults overridden by `SPORTMONKS_BASE_URL` and `SPORTMONKS_API_KEY`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(base_url) = non_empty("SPORTMONKS_BASE_URL") {
            config.base_url = base_url;
        }
        config.api_token = non_empty("SPORTMONKS_API_KEY");
        config
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error for {1}: {0}")]
    Network(#[source] reqwest::Error, String),
    #[error("API error for {url}: {status}: {body}")]
    Status { status: StatusCode, url: String, body: String },
    #[error("Rate limited by {url}, gave up after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },
    #[error("Parse error for {1}: {0}")]
    Parsing(#[source] serde_json::Error, String),
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// SportMonks football API client.
///
/// Requests are blocking and issued one at a time. Transient failures are
/// retried according to the configured [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct SportmonksApi {
    client: Client,
    config: ApiConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for SportmonksApi {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

impl SportmonksApi {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(config.user_agent.clone())
                .build()
                .unwrap_or_default(),
            config,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Fetch one page of fixtures along with its pagination metadata.
    pub fn get_fixtures_page(&self, query: &FixtureQuery, page: u32) -> ApiResult<FixturePage> {
        let payload = self.get("/fixtures", &query.params(page), query.timeout)?;
        Ok(FixturePage::from_payload(payload))
    }

    /// Raw fixtures of the query's start page only.
    pub fn get_fixtures(&self, query: &FixtureQuery) -> ApiResult<Vec<RawFixture>> {
        Ok(self.get_fixtures_page(query, query.start_page.max(1))?.fixtures)
    }

    /// Lazily walk every page matching `query`.
    pub fn fixtures(&self, query: FixtureQuery) -> RawFixtures<'_> {
        RawFixtures::new(self, query)
    }

    /// Lazily walk every page matching `query`, yielding normalized rows.
    pub fn fixture_rows(&self, query: FixtureQuery) -> FixtureRows<'_> {
        FixtureRows::new(self.fixtures(query))
    }

    /// Collect every normalized row matching `query`, in upstream order.
    pub fn fetch_fixture_rows(&self, query: FixtureQuery) -> ApiResult<Vec<FixtureRow>> {
        self.fixture_rows(query).collect()
    }

    pub fn get_team(&self, team_id: u64, includes: Option<&str>) -> ApiResult<Team> {
        let wire: WireTeam = self.get_record(&format!("/teams/{team_id}"), includes, "team")?;
        Ok(wire.into())
    }

    pub fn search_teams(&self, name: &str, per_page: u32) -> ApiResult<Vec<Team>> {
        let params = [("search", name.to_owned()), ("per_page", per_page.to_string())];
        let teams: Vec<WireTeam> = self.get_records("/teams/search", &params, "team")?;
        Ok(teams.into_iter().map(Team::from).collect())
    }

    /// One league by id. A plan without access to it answers with no data,
    /// which surfaces as [`ApiError::NotFound`].
    pub fn get_league(&self, league_id: u64, includes: Option<&str>) -> ApiResult<League> {
        let wire: WireLeague = self.get_record(&format!("/leagues/{league_id}"), includes, "league")?;
        Ok(wire.into())
    }

    pub fn search_leagues(&self, name: &str, per_page: u32) -> ApiResult<Vec<League>> {
        let params = [("search", name.to_owned()), ("per_page", per_page.to_string())];
        let leagues: Vec<WireLeague> = self.get_records("/leagues/search", &params, "league")?;
        Ok(leagues.into_iter().map(League::from).collect())
    }

    pub fn leagues_by_country(&self, country_id: u64) -> ApiResult<Vec<League>> {
        let path = format!("/leagues/countries/{country_id}");
        let leagues: Vec<WireLeague> = self.get_records(&path, &[], "league")?;
        Ok(leagues.into_iter().map(League::from).collect())
    }

    fn get_record<T: DeserializeOwned>(&self, path: &str, includes: Option<&str>, what: &str) -> ApiResult<T> {
        let params: Vec<(&str, String)> = includes
            .filter(|i| !i.is_empty())
            .map(|i| vec![("include", i.to_owned())])
            .unwrap_or_default();
        let mut payload = self.get(path, &params, DEFAULT_TIMEOUT)?;
        let not_found = || ApiError::NotFound(format!("{what} at {path}"));

        let data = ["data", "response"]
            .into_iter()
            .find_map(|key| payload.remove(key).filter(|v| !v.is_null()))
            .ok_or_else(not_found)?;
        // API-Football style responses wrap single records in a list.
        let data = match data {
            Value::Array(list) => list.into_iter().next().ok_or_else(not_found)?,
            other => other,
        };
        serde_json::from_value(data).map_err(|e| ApiError::Parsing(e, path.to_owned()))
    }

    fn get_records<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        what: &str,
    ) -> ApiResult<Vec<T>> {
        let payload = self.get(path, params, DEFAULT_TIMEOUT)?;
        let parsed = records(payload)
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<T>(v) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("skipping malformed {what} record: {e}");
                    None
                }
            })
            .collect();
        Ok(parsed)
    }

    /// GET `path` relative to the base URL and return the JSON object body.
    ///
    /// Connection failures and 5xx responses are retried up to
    /// `max_network_attempts`; 429 responses up to `max_rate_limit_attempts`.
    /// Any other non-success status fails immediately.
    pub fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> ApiResult<Map<String, Value>> {
        let endpoint = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let log_url = Url::parse_with_params(&endpoint, &query)
            .map_err(|e| ApiError::InvalidUrl(format!("{endpoint}: {e}")))?
            .to_string();
        if let Some(token) = self.config.api_token.as_deref() {
            query.push((TOKEN_PARAM, token));
        }
        let url = Url::parse_with_params(&endpoint, &query)
            .map_err(|e| ApiError::InvalidUrl(format!("{endpoint}: {e}")))?;

        let policy = &self.config.retry;
        let mut network_failures = 0u32;
        let mut rate_limited = 0u32;

        loop {
            debug!("GET {log_url}");
            let response = match self.client.get(url.clone()).timeout(timeout).send() {
                Ok(response) => response,
                Err(e) => {
                    network_failures += 1;
                    warn!("request to {log_url} failed (attempt {network_failures}): {e}");
                    if network_failures >= policy.max_network_attempts {
                        return Err(ApiError::Network(e, log_url));
                    }
                    self.sleeper.sleep(policy.network_delay(network_failures));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                if rate_limited >= policy.max_rate_limit_attempts {
                    error!("rate limited by {log_url} {rate_limited} times, giving up");
                    return Err(ApiError::RateLimited { url: log_url, attempts: rate_limited });
                }
                let retry_after = response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok());
                let wait = policy.rate_limit_delay(rate_limited, retry_after);
                info!("rate limited by {log_url}, waiting {wait:?} (attempt {rate_limited})");
                self.sleeper.sleep(wait);
                continue;
            }

            if RETRYABLE_SERVER_STATUSES.contains(&status.as_u16())
                && network_failures + 1 < policy.max_network_attempts
            {
                network_failures += 1;
                warn!("{log_url} answered {status} (attempt {network_failures}), retrying");
                self.sleeper.sleep(policy.network_delay(network_failures));
                continue;
            }

            let body = response.text().map_err(|e| ApiError::Network(e, log_url.clone()))?;
            if !status.is_success() {
                let body: String = body.chars().take(BODY_LOG_LIMIT).collect();
                error!("API error {status} for {log_url}: {body}");
                return Err(ApiError::Status { status, url: log_url, body });
            }

            return match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(payload)) => Ok(payload),
                Ok(other) => Err(ApiError::InvalidResponse {
                    url: log_url,
                    message: format!("expected a JSON object, got {}", json_kind(&other)),
                }),
                Err(e) => Err(ApiError::Parsing(e, log_url)),
            };
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
