use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::params;

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, to_i64, to_u32, to_u64},
        migrations::run_migrations,
        models::FeedbackRecord,
    },
    error::StoreError,
    models::{FeedbackSample, IamSession, TelemetrySnapshot},
    sensing::FeedbackSink,
};

/// Rows returned by [`FeedbackRepository::get_all`].
pub const RECENT_FEEDBACK_LIMIT: usize = 10;

/// Append-only local copy of every captured feedback sample.
#[derive(Clone)]
pub struct FeedbackRepository {
    db: Database,
    schema_ready: Arc<AtomicBool>,
}

impl FeedbackRepository {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            schema_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates the table on first use. Concurrent callers are serialized by the
    /// database thread and the migration itself is idempotent.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        self.db
            .execute(|conn| run_migrations(conn))
            .await
            .context("failed to prepare feedback table")?;
        self.schema_ready.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn insert(
        &self,
        sample: &FeedbackSample,
        session: &IamSession,
    ) -> Result<(), StoreError> {
        let session_num = session.session_num.ok_or(StoreError::SessionNumberUnset)?;
        self.ensure_schema().await?;

        let student_name = session.username().to_string();
        let record = sample.clone();
        self.db
            .execute(move |conn| {
                let telemetry = &record.telemetry;
                conn.execute(
                    "INSERT INTO feedbacks (
                        student_name,
                        session_num,
                        seqnum,
                        captured_at,
                        screenshot,
                        is_focused,
                        num_mouse_clicks,
                        mouse_scroll_distance,
                        mouse_move_distance,
                        keyboard_strokes
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        student_name,
                        session_num,
                        record.seqnum,
                        record.captured_at.to_rfc3339(),
                        record.screenshot.to_string_lossy().into_owned(),
                        telemetry.is_focused,
                        to_i64(telemetry.num_mouse_clicks)?,
                        telemetry.mouse_scroll_distance,
                        telemetry.mouse_move_distance,
                        to_i64(telemetry.keyboard_strokes)?,
                    ],
                )
                .with_context(|| {
                    format!(
                        "failed to insert feedback {student_name}/{session_num}/{}",
                        record.seqnum
                    )
                })?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Most recent rows first.
    pub async fn get_all(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        self.ensure_schema().await?;

        let records = self
            .db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT
                        student_name,
                        session_num,
                        seqnum,
                        captured_at,
                        screenshot,
                        is_focused,
                        num_mouse_clicks,
                        mouse_scroll_distance,
                        mouse_move_distance,
                        keyboard_strokes
                    FROM feedbacks
                    ORDER BY rowid DESC
                    LIMIT ?1",
                )?;

                let mut rows = stmt.query(params![RECENT_FEEDBACK_LIMIT as i64])?;
                let mut records = Vec::new();
                while let Some(row) = rows.next()? {
                    let captured_at: String = row.get(3)?;
                    let screenshot: String = row.get(4)?;

                    records.push(FeedbackRecord {
                        student_name: row.get(0)?,
                        session_num: to_u32(row.get(1)?, "session_num")?,
                        sample: FeedbackSample {
                            seqnum: to_u32(row.get(2)?, "seqnum")?,
                            captured_at: parse_datetime(&captured_at, "captured_at")?,
                            screenshot: PathBuf::from(screenshot),
                            telemetry: TelemetrySnapshot {
                                is_focused: row.get(5)?,
                                num_mouse_clicks: to_u64(row.get(6)?, "num_mouse_clicks")?,
                                mouse_scroll_distance: row.get(7)?,
                                mouse_move_distance: row.get(8)?,
                                keyboard_strokes: to_u64(row.get(9)?, "keyboard_strokes")?,
                            },
                        },
                    });
                }
                Ok(records)
            })
            .await?;
        Ok(records)
    }
}

#[async_trait]
impl FeedbackSink for FeedbackRepository {
    async fn insert(&self, sample: &FeedbackSample, session: &IamSession) -> Result<(), StoreError> {
        FeedbackRepository::insert(self, sample, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use chrono::{TimeZone, Utc};

    fn repository(dir: &tempfile::TempDir) -> FeedbackRepository {
        FeedbackRepository::new(Database::new(dir.path().join("feedback.sqlite3")).unwrap())
    }

    fn session(session_num: Option<u32>) -> IamSession {
        IamSession {
            token: "token".into(),
            user: User {
                username: "ana".into(),
                password: None,
                role: Role::Student,
            },
            ip_address: "10.0.0.7".into(),
            session_num,
        }
    }

    fn sample(seqnum: u32) -> FeedbackSample {
        FeedbackSample {
            seqnum,
            captured_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, seqnum).unwrap(),
            telemetry: TelemetrySnapshot {
                is_focused: seqnum % 2 == 0,
                num_mouse_clicks: 4,
                mouse_scroll_distance: 12.5,
                mouse_move_distance: 300.25,
                keyboard_strokes: 42,
            },
            screenshot: PathBuf::from(format!("/tmp/shot-{seqnum}.png")),
        }
    }

    #[tokio::test]
    async fn insert_requires_session_number() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        let err = repo.insert(&sample(1), &session(None)).await.unwrap_err();
        assert!(matches!(err, StoreError::SessionNumberUnset));
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_rows_read_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        repo.insert(&sample(1), &session(Some(3))).await.unwrap();
        repo.insert(&sample(2), &session(Some(3))).await.unwrap();

        let rows = repo.get_all().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sample, sample(2));
        assert_eq!(rows[1].sample, sample(1));
        assert_eq!(rows[1].student_name, "ana");
        assert_eq!(rows[1].session_num, 3);
    }

    #[tokio::test]
    async fn duplicate_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        repo.insert(&sample(1), &session(Some(1))).await.unwrap();
        let err = repo.insert(&sample(1), &session(Some(1))).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        // Same seqnum under another session number is a different key.
        repo.insert(&sample(1), &session(Some(2))).await.unwrap();
        assert_eq!(repo.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_all_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        for seqnum in 1..=15 {
            repo.insert(&sample(seqnum), &session(Some(1))).await.unwrap();
        }

        let rows = repo.get_all().await.unwrap();
        assert_eq!(rows.len(), RECENT_FEEDBACK_LIMIT);
        assert_eq!(rows[0].sample.seqnum, 15);
        assert_eq!(rows[9].sample.seqnum, 6);
    }

    #[tokio::test]
    async fn concurrent_schema_setup_is_safe() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        let (a, b) = tokio::join!(repo.ensure_schema(), repo.ensure_schema());
        a.unwrap();
        b.unwrap();
        repo.ensure_schema().await.unwrap();
    }
}
