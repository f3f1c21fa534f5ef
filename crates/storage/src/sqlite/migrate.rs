use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies pending schema versions in order.
///
/// Version 1 holds completion records, the append-only award log and the
/// single-row XP total.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lab_completions (
                    lab_id TEXT PRIMARY KEY,
                    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                    xp_earned INTEGER NOT NULL CHECK (xp_earned >= 0),
                    time_spent_secs INTEGER NOT NULL CHECK (time_spent_secs >= 0),
                    completed_at TEXT NOT NULL,
                    times_completed INTEGER NOT NULL CHECK (times_completed >= 1)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS xp_awards (
                    id INTEGER PRIMARY KEY,
                    lab_id TEXT NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('first_completion', 'replay')),
                    xp INTEGER NOT NULL CHECK (xp >= 0),
                    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                    total_xp_after INTEGER NOT NULL CHECK (total_xp_after >= 0),
                    awarded_at TEXT NOT NULL,
                    FOREIGN KEY (lab_id) REFERENCES lab_completions(lab_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress_totals (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    total_xp INTEGER NOT NULL CHECK (total_xp >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO progress_totals (id, total_xp)
                VALUES (1, 0)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_xp_awards_lab_awarded_at
                    ON xp_awards (lab_id, awarded_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied progress schema migration");
    }

    Ok(())
}
