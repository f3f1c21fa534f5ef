use async_trait::async_trait;
use learn_core::model::{CompletionRecord, LabId, XpAward};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    map_award_row, map_completion_row, ser, total_from_i64, u64_to_i64,
};
use crate::repository::{ProgressRepository, ProgressSnapshot, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(&self) -> Result<ProgressSnapshot, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    lab_id, score, xp_earned, time_spent_secs,
                    completed_at, times_completed
                FROM lab_completions
                ORDER BY lab_id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let records = rows
            .iter()
            .map(map_completion_row)
            .collect::<Result<Vec<_>, _>>()?;

        let total_row = sqlx::query("SELECT total_xp FROM progress_totals WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        let total_xp = total_from_i64(total_row.try_get::<i64, _>("total_xp").map_err(ser)?)?;

        Ok(ProgressSnapshot { records, total_xp })
    }

    async fn commit_award(
        &self,
        record: &CompletionRecord,
        award: &XpAward,
    ) -> Result<(), StorageError> {
        let new_total = u64_to_i64("total_xp_after", award.total_xp_after)?;
        let old_total = u64_to_i64(
            "total_xp",
            award.total_xp_after.saturating_sub(u64::from(award.xp)),
        )?;
        let time_spent = u64_to_i64("time_spent_secs", record.time_spent_secs())?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let updated = sqlx::query(
            r"
                UPDATE progress_totals
                SET total_xp = ?1
                WHERE id = 1 AND total_xp = ?2
            ",
        )
        .bind(new_total)
        .bind(old_total)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        if updated.rows_affected() != 1 {
            return Err(StorageError::Conflict(format!(
                "stored total is not {old_total}"
            )));
        }

        sqlx::query(
            r"
                INSERT INTO lab_completions (
                    lab_id, score, xp_earned, time_spent_secs,
                    completed_at, times_completed
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(lab_id) DO UPDATE SET
                    score = excluded.score,
                    time_spent_secs = excluded.time_spent_secs,
                    completed_at = excluded.completed_at,
                    times_completed = excluded.times_completed
            ",
        )
        .bind(record.lab_id().as_str())
        .bind(i64::from(record.score().value()))
        .bind(i64::from(record.xp_earned()))
        .bind(time_spent)
        .bind(record.completed_at())
        .bind(i64::from(record.times_completed()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO xp_awards (
                    lab_id, kind, xp, score, total_xp_after, awarded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(award.lab_id.as_str())
        .bind(award.kind.as_str())
        .bind(i64::from(award.xp))
        .bind(i64::from(award.score.value()))
        .bind(new_total)
        .bind(award.awarded_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            lab_id = %award.lab_id,
            xp = award.xp,
            total_xp = award.total_xp_after,
            "persisted xp award"
        );
        Ok(())
    }

    async fn list_awards(
        &self,
        lab_id: Option<&LabId>,
        limit: u32,
    ) -> Result<Vec<XpAward>, StorageError> {
        let rows = match lab_id {
            Some(id) => {
                sqlx::query(
                    r"
                        SELECT lab_id, kind, xp, score, total_xp_after, awarded_at
                        FROM xp_awards
                        WHERE lab_id = ?1
                        ORDER BY id DESC
                        LIMIT ?2
                    ",
                )
                .bind(id.as_str())
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r"
                        SELECT lab_id, kind, xp, score, total_xp_after, awarded_at
                        FROM xp_awards
                        ORDER BY id DESC
                        LIMIT ?1
                    ",
                )
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(conn)?;

        rows.iter().map(map_award_row).collect()
    }
}
