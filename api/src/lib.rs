pub mod client;
pub mod normalize;
pub mod paging;
pub mod retry;
pub mod wire;

use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub use client::{ApiConfig, ApiError, ApiResult, SportmonksApi};
pub use normalize::normalize_fixture;
pub use paging::{FixturePage, FixtureRows, Pagination, RawFixtures};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};

/// Label used for the winner of a level match.
pub const DRAW: &str = "Draw";

// ---------------------------------------------------------------------------
// Domain types: independent of the SportMonks wire format
// ---------------------------------------------------------------------------

/// One fixture exactly as the upstream API returned it. Its shape depends on the
/// schema generation of the endpoint, so it stays untyped until normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFixture(Value);

impl RawFixture {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Upstream identifier, when the payload carries one.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

/// Canonical, schema-independent representation of a fixture.
///
/// The winner is not stored: it is always derived from the goal counts through
/// [`FixtureRow::winner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureRow {
    pub date: Option<NaiveDate>,
    pub round: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    pub status: Option<String>,
    pub venue: Option<String>,
}

impl FixtureRow {
    /// Result of the match, known only once both goal counts are present.
    pub fn outcome(&self) -> Option<Outcome> {
        let (home, away) = (self.home_goals?, self.away_goals?);
        Some(match home.cmp(&away) {
            std::cmp::Ordering::Greater => Outcome::HomeWin,
            std::cmp::Ordering::Less => Outcome::AwayWin,
            std::cmp::Ordering::Equal => Outcome::Draw,
        })
    }

    /// Winning team name, [`DRAW`] for a level score, `None` while a score is missing.
    pub fn winner(&self) -> Option<&str> {
        self.outcome().map(|outcome| match outcome {
            Outcome::HomeWin => self.home_team.as_str(),
            Outcome::AwayWin => self.away_team.as_str(),
            Outcome::Draw => DRAW,
        })
    }
}

impl fmt::Display for FixtureRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let goals = |g: Option<i64>| g.map(|g| g.to_string()).unwrap_or_else(|| "-".into());
        match self.date {
            Some(date) => write!(f, "{date}")?,
            None => f.write_str("????-??-??")?,
        }
        write!(
            f,
            " - {} {} x {} {}",
            self.home_team,
            goals(self.home_goals),
            goals(self.away_goals),
            self.away_team
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    HomeWin,
    AwayWin,
    Draw,
}

/// Filter for the `/fixtures` endpoint plus the paging limits of a traversal.
#[derive(Debug, Clone)]
pub struct FixtureQuery {
    pub league_id: Option<u64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<String>,
    pub per_page: u32,
    /// Comma-separated relations, e.g. `participants,scores`.
    pub includes: Option<String>,
    pub timeout: Duration,
    /// Stop after this many non-empty pages.
    pub max_pages: Option<u32>,
    /// First page to request; lets a traversal resume mid-way.
    pub start_page: u32,
}

impl Default for FixtureQuery {
    fn default() -> Self {
        Self {
            league_id: None,
            date_from: None,
            date_to: None,
            status: None,
            per_page: 100,
            includes: None,
            timeout: Duration::from_secs(10),
            max_pages: None,
            start_page: 1,
        }
    }
}

impl FixtureQuery {
    pub fn league(league_id: u64) -> Self {
        Self { league_id: Some(league_id), ..Self::default() }
    }

    /// Query parameters for one page of this query.
    pub fn params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("per_page", self.per_page.to_string()), ("page", page.to_string())];
        if let Some(league_id) = self.league_id {
            params.push(("league_id", league_id.to_string()));
        }
        if let Some(from) = self.date_from {
            params.push(("date_from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            params.push(("date_to", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            params.push(("status", status.to_owned()));
        }
        if let Some(includes) = self.includes.as_deref().filter(|s| !s.is_empty()) {
            params.push(("include", includes.to_owned()));
        }
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub short_code: Option<String>,
    pub country_id: Option<u64>,
    pub founded: Option<i32>,
    pub image_path: Option<String>,
}

/// A competition, flattened from either the SportMonks or the API-Football shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct League {
    pub id: u64,
    pub name: String,
    pub short_code: Option<String>,
    pub country: Option<String>,
    pub country_id: Option<u64>,
    /// `league`, `cup`, ...
    pub kind: Option<String>,
    pub current_season: Option<String>,
    pub image_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(home_goals: Option<i64>, away_goals: Option<i64>) -> FixtureRow {
        FixtureRow {
            home_team: "Palmeiras".into(),
            away_team: "Santos".into(),
            home_goals,
            away_goals,
            ..Default::default()
        }
    }

    #[test]
    fn winner_follows_goal_counts() {
        assert_eq!(row(Some(2), Some(1)).winner(), Some("Palmeiras"));
        assert_eq!(row(Some(0), Some(3)).winner(), Some("Santos"));
        assert_eq!(row(Some(1), Some(1)).winner(), Some(DRAW));
    }

    #[test]
    fn winner_is_absent_while_a_score_is_missing() {
        assert_eq!(row(None, Some(1)).winner(), None);
        assert_eq!(row(Some(1), None).winner(), None);
        assert_eq!(row(None, None).outcome(), None);
    }

    #[test]
    fn display_marks_missing_pieces() {
        let mut r = row(None, None);
        assert_eq!(r.to_string(), "????-??-?? - Palmeiras - x - Santos");
        r.date = NaiveDate::from_ymd_opt(2024, 5, 1);
        r.home_goals = Some(2);
        r.away_goals = Some(0);
        assert_eq!(r.to_string(), "2024-05-01 - Palmeiras 2 x 0 Santos");
    }

    #[test]
    fn raw_fixture_id_accepts_numbers_and_strings() {
        assert_eq!(RawFixture::new(json!({"id": 18535517})).id().as_deref(), Some("18535517"));
        assert_eq!(RawFixture::new(json!({"id": "abc"})).id().as_deref(), Some("abc"));
        assert_eq!(RawFixture::new(json!({"name": "x"})).id(), None);
    }

    #[test]
    fn query_params_skip_unset_filters() {
        let query = FixtureQuery {
            league_id: Some(71),
            date_from: NaiveDate::from_ymd_opt(2024, 4, 13),
            status: Some(String::new()),
            per_page: 50,
            ..Default::default()
        };
        let params = query.params(3);
        assert_eq!(
            params,
            vec![
                ("per_page", "50".to_string()),
                ("page", "3".to_string()),
                ("league_id", "71".to_string()),
                ("date_from", "2024-04-13".to_string()),
            ]
        );
    }
}
