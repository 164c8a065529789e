mod cli;
mod export;
mod settings;
mod summary;

use crate::cli::{Cli, Command, DiagnoseArgs, LeaguesCommand, SummaryArgs, TeamsCommand};
use crate::settings::AppSettings;
use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use sportmonks_api::{ApiError, League, RawFixture, SportmonksApi, Team, normalize_fixture};
use tracing_subscriber::EnvFilter;

const RAW_PREVIEW_CHARS: usize = 2000;

fn main() -> anyhow::Result<()> {
    let env_file = AppSettings::load_env_file();
    let cli = Cli::parse();

    better_panic::install();

    let settings = AppSettings::from_cli(&cli);
    setup_logging(&settings)?;
    if let Some(path) = env_file {
        info!("loaded environment from {}", path.display());
    }

    settings.require_token()?;
    let api = SportmonksApi::new(settings.api.clone());

    match cli.command {
        Command::Diagnose(args) => diagnose(&api, &args),
        Command::Export(args) => {
            let total = export::export_fixtures(&api, args.walk.query(), &args.output)?;
            println!("Saved {total} rows to {}", args.output.display());
            Ok(())
        }
        Command::Summary(args) => print_summary(&api, &args),
        Command::Teams { command } => teams(&api, command),
        Command::Leagues { command } => leagues(&api, command),
    }
}

fn setup_logging(settings: &AppSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(settings.log_directive()).context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}

fn diagnose(api: &SportmonksApi, args: &DiagnoseArgs) -> anyhow::Result<()> {
    let query = args.query();
    info!(
        "testing SportMonks (league_id={:?}, per_page={}, date_from={:?}, date_to={:?}, status={:?})",
        query.league_id, query.per_page, query.date_from, query.date_to, query.status
    );
    let fixtures = api.get_fixtures(&query).context("failed to reach the SportMonks API")?;
    if fixtures.is_empty() {
        warn!("the API answered but returned no fixtures for these filters");
        println!("No fixtures found for the given filters.");
        return Ok(());
    }

    println!("API answered with {} fixtures.", fixtures.len());
    for (idx, fixture) in fixtures.iter().take(args.sample).enumerate() {
        match normalize_fixture(fixture) {
            Some(row) => println!("{}. {row}", idx + 1),
            None => println!("{}. fixture {} could not be normalized", idx + 1, fixture_label(fixture)),
        }
    }
    println!("\nFirst fixture (raw JSON):");
    println!("{}", raw_preview(&fixtures[0])?);
    Ok(())
}

fn fixture_label(fixture: &RawFixture) -> String {
    fixture.id().unwrap_or_else(|| "without id".to_owned())
}

fn raw_preview(fixture: &RawFixture) -> anyhow::Result<String> {
    let pretty = serde_json::to_string_pretty(fixture.as_value())?;
    Ok(pretty.chars().take(RAW_PREVIEW_CHARS).collect())
}

fn print_summary(api: &SportmonksApi, args: &SummaryArgs) -> anyhow::Result<()> {
    let rows = api.fetch_fixture_rows(args.walk.query()).context("fetching fixtures")?;
    let (home, draws, away) = summary::outcome_split(&rows);
    let mut table = summary::standings(&rows);
    if let Some(top) = args.top {
        table.truncate(top);
    }
    println!("{} fixtures: {home} home wins, {draws} draws, {away} away wins\n", rows.len());
    print!("{}", summary::Table(&table));
    Ok(())
}

fn teams(api: &SportmonksApi, command: TeamsCommand) -> anyhow::Result<()> {
    match command {
        TeamsCommand::Search { name, per_page } => {
            let found = api.search_teams(&name, per_page).context("searching teams")?;
            if found.is_empty() {
                println!("No teams match \"{name}\".");
            }
            for team in &found {
                println!("{}", team_line(team));
            }
        }
        TeamsCommand::Show { id, includes } => {
            let team = api.get_team(id, includes.as_deref()).with_context(|| format!("loading team {id}"))?;
            println!("{}", team_line(&team));
            if let Some(founded) = team.founded {
                println!("  founded: {founded}");
            }
            if let Some(country) = team.country_id {
                println!("  country id: {country}");
            }
            if let Some(image) = &team.image_path {
                println!("  image: {image}");
            }
        }
    }
    Ok(())
}

fn team_line(team: &Team) -> String {
    match &team.short_code {
        Some(code) => format!("{:>8}  {} ({code})", team.id, team.name),
        None => format!("{:>8}  {}", team.id, team.name),
    }
}

fn leagues(api: &SportmonksApi, command: LeaguesCommand) -> anyhow::Result<()> {
    let listed = match command {
        LeaguesCommand::Show { id, includes } => {
            match api.get_league(id, Some(&includes)) {
                Ok(league) => {
                    println!("League available: {}", league_line(&league));
                    if let Some(kind) = &league.kind {
                        println!("  type: {kind}");
                    }
                    if let Some(image) = &league.image_path {
                        println!("  image: {image}");
                    }
                }
                Err(ApiError::NotFound(_)) => {
                    warn!("league {id} returned no data");
                    println!("League {id} is not available on this plan. Try `smx leagues country <id>`.");
                }
                Err(e) => return Err(e).with_context(|| format!("loading league {id}")),
            }
            return Ok(());
        }
        LeaguesCommand::Search { name, per_page } => {
            api.search_leagues(&name, per_page).context("searching leagues")?
        }
        LeaguesCommand::Country { id } => {
            api.leagues_by_country(id).with_context(|| format!("listing leagues of country {id}"))?
        }
    };
    if listed.is_empty() {
        println!("No leagues found.");
    }
    for league in &listed {
        println!("{}", league_line(league));
    }
    Ok(())
}

fn league_line(league: &League) -> String {
    let mut line = format!("{:>8}  {}", league.id, league.name);
    if let Some(country) = &league.country {
        line.push_str(&format!(" ({country})"));
    }
    if let Some(season) = &league.current_season {
        line.push_str(&format!(" | season {season}"));
    }
    line
}
