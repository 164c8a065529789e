use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use sportmonks_api::FixtureQuery;
use std::path::PathBuf;

pub const DEFAULT_LEAGUE: u64 = 71;
pub const DIAGNOSE_INCLUDES: &str = "participants,league";
pub const EXPORT_INCLUDES: &str = "participants,round,stage,venue,league,scores";

#[derive(Debug, Parser)]
#[command(name = "smx", version, about = "SportMonks football fixtures from the terminal")]
pub struct Cli {
    /// SportMonks API token.
    #[arg(long, env = "SPORTMONKS_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Override the API base URL.
    #[arg(long, env = "SPORTMONKS_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Log verbosity (off, error, warn, info, debug, trace). Overrides RUST_LOG.
    #[arg(long, global = true, value_parser = parse_level)]
    pub log_level: Option<LevelFilter>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a small sample of fixtures to check connectivity and payload shape.
    Diagnose(DiagnoseArgs),
    /// Walk every matching page and write the normalized fixtures to CSV.
    Export(ExportArgs),
    /// Win/draw/loss table computed from the matching fixtures.
    Summary(SummaryArgs),
    /// Look up teams.
    Teams {
        #[command(subcommand)]
        command: TeamsCommand,
    },
    /// Look up leagues and check which ones the plan can access.
    Leagues {
        #[command(subcommand)]
        command: LeaguesCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TeamsCommand {
    /// Search teams by name.
    Search {
        name: String,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Show one team by id.
    Show {
        id: u64,
        #[arg(long)]
        includes: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LeaguesCommand {
    /// Search leagues by name.
    Search {
        name: String,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Show one league by id, reporting when the plan cannot access it.
    Show {
        #[arg(default_value_t = DEFAULT_LEAGUE)]
        id: u64,
        #[arg(long, default_value = "country;currentSeason")]
        includes: String,
    },
    /// List the leagues of one country.
    Country { id: u64 },
}

#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// League id (71 is the Brazilian Serie A on most plans).
    #[arg(long, default_value_t = DEFAULT_LEAGUE)]
    pub league: u64,
    /// First fixture date, YYYY-MM-DD.
    #[arg(long = "from")]
    pub date_from: Option<NaiveDate>,
    /// Last fixture date, YYYY-MM-DD.
    #[arg(long = "to")]
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Args)]
pub struct DiagnoseArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(long, default_value_t = 5)]
    pub per_page: u32,
    /// Fixture status, e.g. FT or NS.
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long, default_value = DIAGNOSE_INCLUDES)]
    pub includes: String,
    /// Fixtures printed from the sample.
    #[arg(long, default_value_t = 3)]
    pub sample: usize,
}

#[derive(Debug, Clone, Args)]
pub struct WalkArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(long, default_value_t = 200)]
    pub per_page: u32,
    /// Fixture status; pass an empty value to fetch every status.
    #[arg(long, default_value = "FT")]
    pub status: String,
    #[arg(long, default_value = EXPORT_INCLUDES)]
    pub includes: String,
    /// Stop after this many pages.
    #[arg(long)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Destination CSV file.
    pub output: PathBuf,
    #[command(flatten)]
    pub walk: WalkArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub walk: WalkArgs,
    /// Only print the first N teams.
    #[arg(long)]
    pub top: Option<usize>,
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value.parse().map_err(|_| format!("unknown log level `{value}`"))
}

impl FilterArgs {
    fn query(&self) -> FixtureQuery {
        FixtureQuery {
            date_from: self.date_from,
            date_to: self.date_to,
            ..FixtureQuery::league(self.league)
        }
    }
}

impl DiagnoseArgs {
    pub fn query(&self) -> FixtureQuery {
        FixtureQuery {
            per_page: self.per_page,
            status: self.status.clone(),
            includes: Some(self.includes.clone()),
            ..self.filter.query()
        }
    }
}

impl WalkArgs {
    pub fn query(&self) -> FixtureQuery {
        FixtureQuery {
            per_page: self.per_page,
            status: Some(self.status.clone()),
            includes: Some(self.includes.clone()),
            max_pages: self.max_pages,
            ..self.filter.query()
        }
    }
}
