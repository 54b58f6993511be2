use sqlx::PgPool;

use crate::dto::competitor::NewCompetitor;
use crate::error::{Result, StorageError};
use crate::models::Competitor;

pub struct CompetitorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CompetitorRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whole roster ordered by start number
    pub async fn find_all(&self) -> Result<Vec<Competitor>> {
        let competitors = sqlx::query_as::<_, Competitor>(
            r#"
            SELECT first_name, last_name, chip_id, start_number
            FROM competitors
            ORDER BY start_number, chip_id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(competitors)
    }

    /// Insert a competitor. Returns `false` when the chip id is already registered.
    pub async fn add(&self, competitor: &NewCompetitor) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO competitors (first_name, last_name, chip_id, start_number)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (chip_id) DO NOTHING
            "#,
        )
        .bind(&competitor.first_name)
        .bind(&competitor.last_name)
        .bind(competitor.chip_id)
        .bind(competitor.start_number)
        .execute(self.pool)
        .await
        .map_err(StorageError::from)
        .map_err(|e| {
            if e.is_check_violation() {
                StorageError::ConstraintViolation(format!(
                    "start number {} must be positive",
                    competitor.start_number
                ))
            } else {
                e
            }
        })?;

        Ok(result.rows_affected() == 1)
    }
}
