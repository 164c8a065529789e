//! Maps raw fixtures of any supported payload generation onto [`FixtureRow`].
//!
//! Every field is resolved by trying named sources in a fixed priority order.
//! Team names and goal counts resolve per side, so a side found by an earlier
//! schema is never overwritten by a later one.
use crate::{FixtureRow, RawFixture};
use chrono::NaiveDate;
use log::debug;
use serde_json::{Map, Value};

/// Payload generations understood by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// SportMonks v3: `participants` with location metadata, `scores` entries.
    V3,
    /// SportMonks v2: `localTeam`/`visitorTeam` objects, keyed `scores` object.
    V2,
    /// API-Football: `teams.home`/`teams.away`, `goals`.
    ApiFootball,
    /// Loose exports with top-level `home_name`/`home_score` style fields.
    Flat,
}

const TEAM_PRIORITY: [Schema; 4] = [Schema::V3, Schema::V2, Schema::ApiFootball, Schema::Flat];
const SCORE_PRIORITY: [Schema; 4] = [Schema::V2, Schema::V3, Schema::ApiFootball, Schema::Flat];

const SCORE_CONTAINERS: [&str; 3] = ["scores", "score", "results"];
const HOME_SCORE_KEYS: [&str; 4] = ["localteam_score", "home_score", "home", "localteam"];
const AWAY_SCORE_KEYS: [&str; 4] = ["visitorteam_score", "away_score", "away", "visitorteam"];

const HOME_LOCATIONS: [&str; 2] = ["home", "local"];
const AWAY_LOCATIONS: [&str; 3] = ["away", "visitor", "visitante"];

const DATE_SOURCES: &[&[&str]] = &[
    &["starting_at"],
    &["time", "starting_at", "date_time"],
    &["time", "datetime"],
    &["fixture", "date"],
];
const ROUND_SOURCES: &[&[&str]] = &[
    &["round", "data", "name"],
    &["round", "name"],
    &["round_name"],
    &["league", "round"],
];
const STATUS_SOURCES: &[&[&str]] = &[
    &["status"],
    &["state", "short_name"],
    &["state", "state"],
    &["time", "status"],
    &["time", "status", "short"],
    &["fixture", "status", "short"],
];
const VENUE_SOURCES: &[&[&str]] = &[
    &["venue", "data", "name"],
    &["venue", "name"],
    &["venue_name"],
    &["fixture", "venue", "name"],
];

/// A value resolved independently for the home and away side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sides<T> {
    pub home: Option<T>,
    pub away: Option<T>,
}

impl<T> Default for Sides<T> {
    fn default() -> Self {
        Self { home: None, away: None }
    }
}

impl<T> Sides<T> {
    fn is_complete(&self) -> bool {
        self.home.is_some() && self.away.is_some()
    }

    /// Fill only the sides that are still missing.
    fn or(self, other: Sides<T>) -> Sides<T> {
        Sides { home: self.home.or(other.home), away: self.away.or(other.away) }
    }
}

impl Schema {
    fn teams(self, fixture: &Value) -> Sides<String> {
        match self {
            Schema::V3 => participant_teams(fixture),
            Schema::V2 => Sides {
                home: first_text(fixture, &[&["localTeam", "data", "name"], &["localteam", "data", "name"]]),
                away: first_text(
                    fixture,
                    &[&["visitorTeam", "data", "name"], &["visitorteam", "data", "name"]],
                ),
            },
            Schema::ApiFootball => Sides {
                home: first_text(fixture, &[&["teams", "home", "name"]]),
                away: first_text(fixture, &[&["teams", "away", "name"]]),
            },
            Schema::Flat => Sides {
                home: first_text(fixture, &[&["home_name"]]),
                away: first_text(fixture, &[&["away_name"]]),
            },
        }
    }

    fn goals(self, fixture: &Value) -> Sides<i64> {
        match self {
            Schema::V2 => keyed_scores(fixture),
            Schema::V3 => score_entries(fixture),
            Schema::ApiFootball => Sides {
                home: path(fixture, &["goals", "home"]).and_then(safe_int),
                away: path(fixture, &["goals", "away"]).and_then(safe_int),
            },
            Schema::Flat => Sides {
                home: first_int(fixture, &["localteam_score", "home_score"]),
                away: first_int(fixture, &["visitorteam_score", "away_score"]),
            },
        }
    }
}

/// Normalize one raw fixture. Returns `None` when either team cannot be identified.
pub fn normalize_fixture(raw: &RawFixture) -> Option<FixtureRow> {
    let fixture = raw.as_value();
    let teams = extract_teams(fixture);
    let (Some(home_team), Some(away_team)) = (teams.home, teams.away) else {
        debug!(
            "fixture {} has no identifiable participants, skipping",
            raw.id().unwrap_or_else(|| "<no id>".into())
        );
        return None;
    };
    let goals = extract_goals(fixture);

    Some(FixtureRow {
        date: normalize_date(first_text(fixture, DATE_SOURCES).as_deref()),
        round: first_text(fixture, ROUND_SOURCES),
        home_team,
        away_team,
        home_goals: goals.home,
        away_goals: goals.away,
        status: first_text(fixture, STATUS_SOURCES),
        venue: first_text(fixture, VENUE_SOURCES),
    })
}

pub fn extract_teams(fixture: &Value) -> Sides<String> {
    resolve(&TEAM_PRIORITY, |schema| schema.teams(fixture))
}

pub fn extract_goals(fixture: &Value) -> Sides<i64> {
    resolve(&SCORE_PRIORITY, |schema| schema.goals(fixture))
}

fn resolve<T>(order: &[Schema], mut extract: impl FnMut(Schema) -> Sides<T>) -> Sides<T> {
    let mut sides = Sides::default();
    for &schema in order {
        if sides.is_complete() {
            break;
        }
        sides = sides.or(extract(schema));
    }
    sides
}

/// Calendar date from a timestamp such as `2024-05-01T20:00:00+00:00`.
///
/// The time-zone suffix and time part are dropped and the 10-character date
/// prefix is parsed. Missing or malformed input yields `None`.
pub fn normalize_date(value: Option<&str>) -> Option<NaiveDate> {
    let spaced = value?.replace('T', " ");
    let without_zone = spaced.split(['+', 'Z']).next().unwrap_or_default();
    let prefix: String = without_zone.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&prefix, "%Y-%m-%d").ok()
}

/// Lenient integer coercion for goal counts.
///
/// Accepts integers, numeric strings and finite floats (truncated). Null, empty
/// strings, booleans and anything unparsable yield `None`.
pub fn safe_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate_float)),
        Value::String(s) => parse_int_text(s),
        _ => None,
    }
}

/// Home and away goals from a `"H-A"` display string, split on the first hyphen.
pub fn parse_display_score(text: &str) -> Option<(i64, i64)> {
    let (home, away) = text.split_once('-')?;
    Some((parse_int_text(home)?, parse_int_text(away)?))
}

fn parse_int_text(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(truncate_float))
}

fn truncate_float(f: f64) -> Option<i64> {
    let t = f.trunc();
    (t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64).then_some(t as i64)
}

fn participant_teams(fixture: &Value) -> Sides<String> {
    let participants = match fixture.get("participants") {
        Some(Value::Array(list)) => list,
        Some(Value::Object(wrapper)) => {
            match wrapper.get("data").or_else(|| wrapper.get("participants")) {
                Some(Value::Array(list)) => list,
                _ => return Sides::default(),
            }
        }
        _ => return Sides::default(),
    };

    let mut sides = Sides::default();
    let mut undeclared = Vec::new();
    for participant in participants.iter().filter(|p| p.is_object()) {
        let Some(name) = first_text(participant, &[&["name"], &["short_code"]]) else {
            continue;
        };
        let location = first_text(
            participant,
            &[&["meta", "location"], &["meta", "group"], &["pivot", "location"], &["pivot", "group"]],
        )
        .map(|l| l.to_lowercase());

        match location.as_deref() {
            Some(l) if HOME_LOCATIONS.contains(&l) => {
                sides.home.get_or_insert(name);
            }
            Some(l) if AWAY_LOCATIONS.contains(&l) => {
                sides.away.get_or_insert(name);
            }
            _ => undeclared.push(name),
        }
    }

    for name in undeclared {
        if sides.home.is_none() {
            sides.home = Some(name);
        } else if sides.away.is_none() {
            sides.away = Some(name);
        }
    }
    sides
}

fn keyed_scores(fixture: &Value) -> Sides<i64> {
    SCORE_CONTAINERS
        .iter()
        .filter_map(|key| fixture.get(*key).and_then(Value::as_object))
        .fold(Sides::default(), |sides, scores| {
            sides.or(Sides {
                home: keyed_score(scores, &HOME_SCORE_KEYS),
                away: keyed_score(scores, &AWAY_SCORE_KEYS),
            })
        })
}

fn keyed_score(scores: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| {
        let value = scores.get(*key)?;
        if value.is_object() {
            value
                .get("score")
                .and_then(safe_int)
                .or_else(|| path(value, &["data", "score"]).and_then(safe_int))
        } else {
            safe_int(value)
        }
    })
}

fn score_entries(fixture: &Value) -> Sides<i64> {
    let mut sides = Sides::default();
    let entries = SCORE_CONTAINERS
        .iter()
        .filter_map(|key| fixture.get(*key).and_then(Value::as_array))
        .flatten()
        .filter(|entry| entry.is_object());

    for entry in entries {
        if sides.is_complete() {
            break;
        }
        let display = first_text(entry, &[&["score"], &["display_score"]]);
        if let Some((home, away)) = display.as_deref().and_then(parse_display_score) {
            sides = sides.or(Sides { home: Some(home), away: Some(away) });
            continue;
        }
        if let Some(side) = current_participant_goals(entry) {
            sides = sides.or(side);
        }
    }
    sides
}

/// v3 entries such as `{"description": "CURRENT", "score": {"goals": 2, "participant": "home"}}`.
fn current_participant_goals(entry: &Value) -> Option<Sides<i64>> {
    let description = first_text(entry, &[&["description"]])?;
    if !description.eq_ignore_ascii_case("CURRENT") {
        return None;
    }
    let goals = path(entry, &["score", "goals"]).and_then(safe_int)?;
    let participant = first_text(entry, &[&["score", "participant"]])?.to_lowercase();
    if HOME_LOCATIONS.contains(&participant.as_str()) {
        Some(Sides { home: Some(goals), away: None })
    } else if AWAY_LOCATIONS.contains(&participant.as_str()) {
        Some(Sides { home: None, away: Some(goals) })
    } else {
        None
    }
}

fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |current, key| current.get(*key))
}

/// First non-empty string found among `sources`.
fn first_text(value: &Value, sources: &[&[&str]]) -> Option<String> {
    sources.iter().find_map(|keys| {
        path(value, keys)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

fn first_int(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| value.get(*key).and_then(safe_int))
}
