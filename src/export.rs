use anyhow::{Context, bail};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::info;
use serde::Serialize;
use sportmonks_api::{FixtureQuery, FixtureRow, SportmonksApi};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const SOURCE: &str = "SportMonks";
/// Spreadsheet tools use it to detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: Option<NaiveDate>,
    round: Option<&'a str>,
    home_team: &'a str,
    away_team: &'a str,
    home_goals: Option<i64>,
    away_goals: Option<i64>,
    winner: Option<&'a str>,
    status: Option<&'a str>,
    venue: Option<&'a str>,
    source: &'static str,
    extracted_at: &'a str,
}

impl<'a> CsvRow<'a> {
    fn new(row: &'a FixtureRow, extracted_at: &'a str) -> Self {
        Self {
            date: row.date,
            round: row.round.as_deref(),
            home_team: &row.home_team,
            away_team: &row.away_team,
            home_goals: row.home_goals,
            away_goals: row.away_goals,
            winner: row.winner(),
            status: row.status.as_deref(),
            venue: row.venue.as_deref(),
            source: SOURCE,
            extracted_at,
        }
    }
}

/// Chronological, undated rows last. Stable, so upstream order breaks ties.
pub fn sort_rows(rows: &mut [FixtureRow]) {
    rows.sort_by(|a, b| match (a.date, b.date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

pub fn write_csv<W: Write>(
    mut out: W,
    rows: &[FixtureRow],
    extracted_at: DateTime<Utc>,
) -> anyhow::Result<usize> {
    out.write_all(UTF8_BOM)?;
    let extracted_at = extracted_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(CsvRow::new(row, &extracted_at))?;
    }
    writer.flush()?;
    Ok(rows.len())
}

/// Walk every page of `query`, sort and write the rows to `path`.
pub fn export_fixtures(api: &SportmonksApi, query: FixtureQuery, path: &Path) -> anyhow::Result<usize> {
    let mut rows = api.fixture_rows(query);
    let mut collected = Vec::new();
    for row in rows.by_ref() {
        collected.push(row.context("fetching fixtures")?);
    }
    info!(
        "fetched {} fixtures over {} pages ({} rejected)",
        collected.len(),
        rows.pages_fetched(),
        rows.rejected()
    );
    if collected.is_empty() {
        bail!("no fixtures converted; adjust the filters or include 'scores'");
    }
    sort_rows(&mut collected);

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let written = write_csv(BufWriter::new(file), &collected, Utc::now())
        .with_context(|| format!("writing {}", path.display()))?;
    info!("exported {written} rows to {}", path.display());
    Ok(written)
}
