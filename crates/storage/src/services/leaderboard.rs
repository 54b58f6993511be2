use std::cmp::Ordering;

use uuid::Uuid;

use crate::error::LeaderboardError;
use crate::models::{ClockTime, Competitor, LeaderboardRow, TimingPoint};

/// In-memory ranked leaderboard.
///
/// Holds exactly one row per competitor for its whole lifetime. Rows are kept
/// sorted by [`compare_rows`] after every update. The type has no interior
/// synchronisation; callers sharing it between tasks wrap it in a lock.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    rows: Vec<LeaderboardRow>,
}

impl Leaderboard {
    /// Builds the initial leaderboard from the roster, keeping the roster's
    /// order (already start-number ordered by the repository).
    pub fn new(competitors: Vec<Competitor>) -> Result<Self, LeaderboardError> {
        if competitors.is_empty() {
            return Err(LeaderboardError::EmptyRoster);
        }

        let rows = competitors.into_iter().map(LeaderboardRow::new).collect();

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Point-in-time copy of the ranking.
    pub fn current_state(&self) -> Vec<LeaderboardRow> {
        self.rows.clone()
    }

    /// Records `clock_time` at `point` for the competitor carrying `chip_id`
    /// and re-ranks the board.
    ///
    /// Returns the updated row. Nothing is modified when the chip id is unknown.
    pub fn update(
        &mut self,
        chip_id: Uuid,
        point: TimingPoint,
        clock_time: ClockTime,
    ) -> Result<LeaderboardRow, LeaderboardError> {
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.competitor.chip_id == chip_id)
            .ok_or(LeaderboardError::CompetitorNotFound(chip_id))?;

        row.timings.set(point, clock_time);
        let updated = row.clone();

        self.sort();

        Ok(updated)
    }

    fn sort(&mut self) {
        // stable, so equal rows keep their previous relative order
        self.rows.sort_by(compare_rows);
    }
}

/// Ranking order: finish line, then finish corridor, then start number.
///
/// At each timing level a recorded time beats a missing one and an earlier
/// time beats a later one. Start numbers are assumed unique; rows sharing one
/// compare equal.
pub fn compare_rows(a: &LeaderboardRow, b: &LeaderboardRow) -> Ordering {
    compare_timing(a.timings.finish_line, b.timings.finish_line)
        .then_with(|| compare_timing(a.timings.finish_corridor, b.timings.finish_corridor))
        .then_with(|| a.competitor.start_number.cmp(&b.competitor.start_number))
}

fn compare_timing(a: Option<ClockTime>, b: Option<ClockTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
