use sportmonks_api::{FixtureRow, Outcome};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamRecord {
    pub team: String,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: i64,
    pub goals_against: i64,
}

impl TeamRecord {
    pub fn points(&self) -> u32 {
        self.wins * 3 + self.draws
    }

    pub fn goal_difference(&self) -> i64 {
        self.goals_for - self.goals_against
    }

    fn record(&mut self, scored: i64, conceded: i64) {
        self.played += 1;
        self.goals_for += scored;
        self.goals_against += conceded;
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => self.wins += 1,
            std::cmp::Ordering::Equal => self.draws += 1,
            std::cmp::Ordering::Less => self.losses += 1,
        }
    }
}

/// Table over every row with a known result, best team first.
pub fn standings(rows: &[FixtureRow]) -> Vec<TeamRecord> {
    let mut table: HashMap<&str, TeamRecord> = HashMap::new();
    for row in rows {
        let (Some(home), Some(away)) = (row.home_goals, row.away_goals) else {
            continue;
        };
        for (team, scored, conceded) in [(&row.home_team, home, away), (&row.away_team, away, home)] {
            table
                .entry(team.as_str())
                .or_insert_with(|| TeamRecord { team: team.clone(), ..TeamRecord::default() })
                .record(scored, conceded);
        }
    }

    let mut records: Vec<_> = table.into_values().collect();
    records.sort_by(|a, b| {
        b.points()
            .cmp(&a.points())
            .then(b.goal_difference().cmp(&a.goal_difference()))
            .then(b.goals_for.cmp(&a.goals_for))
            .then_with(|| a.team.cmp(&b.team))
    });
    records
}

/// Counts of each outcome, as `(home wins, draws, away wins)`.
pub fn outcome_split(rows: &[FixtureRow]) -> (usize, usize, usize) {
    rows.iter().fold((0, 0, 0), |(h, d, a), row| match row.outcome() {
        Some(Outcome::HomeWin) => (h + 1, d, a),
        Some(Outcome::Draw) => (h, d + 1, a),
        Some(Outcome::AwayWin) => (h, d, a + 1),
        None => (h, d, a),
    })
}

/// Fixed-width text rendering of a standings table.
pub struct Table<'a>(pub &'a [TeamRecord]);

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.0.iter().map(|r| r.team.chars().count()).max().unwrap_or(4).max(4);
        writeln!(
            f,
            "{:>3}  {:<width$}  {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>4} {:>4}",
            "#", "Team", "P", "W", "D", "L", "GF", "GA", "GD", "Pts"
        )?;
        for (idx, r) in self.0.iter().enumerate() {
            writeln!(
                f,
                "{:>3}  {:<width$}  {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>+4} {:>4}",
                idx + 1,
                r.team,
                r.played,
                r.wins,
                r.draws,
                r.losses,
                r.goals_for,
                r.goals_against,
                r.goal_difference(),
                r.points()
            )?;
        }
        Ok(())
    }
}
