//! Serde shapes for the typed team and league endpoints. Fixtures stay untyped
//! (see `normalize.rs`); these records are stable enough to deserialize directly.
use crate::{League, Team};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct WireTeam {
    pub id: u64,
    pub name: Option<String>,
    pub short_code: Option<String>,
    pub country_id: Option<u64>,
    pub founded: Option<i32>,
    /// v3 name; v2 called it `logo_path`.
    #[serde(alias = "logo_path")]
    pub image_path: Option<String>,
}

impl From<WireTeam> for Team {
    fn from(wire: WireTeam) -> Self {
        Team {
            id: wire.id,
            name: wire.name.or_else(|| wire.short_code.clone()).unwrap_or_default(),
            short_code: wire.short_code,
            country_id: wire.country_id,
            founded: wire.founded,
            image_path: wire.image_path,
        }
    }
}

/// API-Football nests the league under `league`; SportMonks records are flat.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum WireLeague {
    ApiFootball(ApiFootballLeague),
    Sportmonks(SportmonksLeague),
}

#[derive(Debug, Deserialize, Clone)]
pub struct SportmonksLeague {
    pub id: u64,
    pub name: Option<String>,
    pub short_code: Option<String>,
    pub country_id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(alias = "logo_path")]
    pub image_path: Option<String>,
    /// Present with `include=country`.
    pub country: Option<WireCountry>,
    /// Present with `include=currentSeason`.
    #[serde(alias = "currentseason", alias = "currentSeason")]
    pub current_season: Option<WireSeason>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFootballLeague {
    pub league: ApiFootballLeagueInfo,
    pub country: Option<WireCountry>,
    #[serde(default)]
    pub seasons: Vec<ApiFootballSeason>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFootballLeagueInfo {
    pub id: u64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFootballSeason {
    pub year: i32,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireCountry {
    pub id: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireSeason {
    pub name: Option<String>,
}

impl From<WireLeague> for League {
    fn from(wire: WireLeague) -> Self {
        match wire {
            WireLeague::Sportmonks(l) => League {
                id: l.id,
                name: l.name.or_else(|| l.short_code.clone()).unwrap_or_default(),
                short_code: l.short_code,
                country: l.country.as_ref().and_then(|c| c.name.clone()),
                country_id: l.country_id.or_else(|| l.country.and_then(|c| c.id)),
                kind: l.kind,
                current_season: l.current_season.and_then(|s| s.name),
                image_path: l.image_path,
            },
            WireLeague::ApiFootball(l) => {
                // Seasons are listed oldest first; fall back to the latest one.
                let season = l
                    .seasons
                    .iter()
                    .find(|s| s.current)
                    .or_else(|| l.seasons.last())
                    .map(|s| s.year.to_string());
                League {
                    id: l.league.id,
                    name: l.league.name.unwrap_or_default(),
                    short_code: None,
                    country: l.country.as_ref().and_then(|c| c.name.clone()),
                    country_id: l.country.and_then(|c| c.id),
                    kind: l.league.kind,
                    current_season: season,
                    image_path: l.league.logo,
                }
            }
        }
    }
}
