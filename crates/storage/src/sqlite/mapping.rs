use learn_core::model::{AwardKind, CompletionRecord, LabId, Score, XpAward};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn score_from_i64(v: i64) -> Result<Score, StorageError> {
    Score::new(i64_to_u32("score", v)?).map_err(ser)
}

fn lab_id_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LabId, StorageError> {
    LabId::new(row.try_get::<String, _>("lab_id").map_err(ser)?).map_err(ser)
}

/// Inverse of `AwardKind::as_str`, which must stay in sync with the
/// `xp_awards.kind` check.
pub(crate) fn parse_award_kind(s: &str) -> Result<AwardKind, StorageError> {
    match s {
        "first_completion" => Ok(AwardKind::FirstCompletion),
        "replay" => Ok(AwardKind::Replay),
        _ => Err(StorageError::Serialization(format!("invalid award kind: {s}"))),
    }
}

pub(crate) fn map_completion_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CompletionRecord, StorageError> {
    CompletionRecord::from_persisted(
        lab_id_from_row(row)?,
        score_from_i64(row.try_get::<i64, _>("score").map_err(ser)?)?,
        i64_to_u32("xp_earned", row.try_get::<i64, _>("xp_earned").map_err(ser)?)?,
        i64_to_u64(
            "time_spent_secs",
            row.try_get::<i64, _>("time_spent_secs").map_err(ser)?,
        )?,
        row.try_get("completed_at").map_err(ser)?,
        i64_to_u32(
            "times_completed",
            row.try_get::<i64, _>("times_completed").map_err(ser)?,
        )?,
    )
    .map_err(ser)
}

pub(crate) fn map_award_row(row: &sqlx::sqlite::SqliteRow) -> Result<XpAward, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    Ok(XpAward {
        lab_id: lab_id_from_row(row)?,
        xp: i64_to_u32("xp", row.try_get::<i64, _>("xp").map_err(ser)?)?,
        kind: parse_award_kind(&kind)?,
        score: score_from_i64(row.try_get::<i64, _>("score").map_err(ser)?)?,
        total_xp_after: i64_to_u64(
            "total_xp_after",
            row.try_get::<i64, _>("total_xp_after").map_err(ser)?,
        )?,
        awarded_at: row.try_get("awarded_at").map_err(ser)?,
    })
}

pub(crate) fn total_from_i64(v: i64) -> Result<u64, StorageError> {
    i64_to_u64("total_xp", v)
}
