use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ivs_models::store_schema::{now, timestamp, STORE_DDL};
use ivs_models::{
    Claim, IdeaPayload, Report, StatusUpdate, Submission, SubmissionStatus, SynthesisResult,
};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::SubmissionStore;

const SUBMISSION_COLUMNS: &str =
    "id, owner_id, payload_json, status, error_detail, created_at, updated_at, completed_at";

/// SQLite-backed submission store.
///
/// `rusqlite::Connection` is not `Sync`, so access goes through a `Mutex`.
/// Each operation runs to completion under the lock, which makes every
/// multi-statement write a single transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file. Enables WAL so readers in other
    /// processes can query while a run writes.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(STORE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }
}

/// A raw submission row as read from SQLite.
struct SubmissionRow {
    id: String,
    owner_id: String,
    payload_json: String,
    status: String,
    error_detail: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl SubmissionRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            payload_json: row.get(2)?,
            status: row.get(3)?,
            error_detail: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Submission {
            id: parse_uuid(&row.id)?,
            owner_id: row.owner_id,
            payload: serde_json::from_str(&row.payload_json)?,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
            completed_at: row.completed_at.as_deref().map(parse_time).transpose()?,
            error_detail: row.error_detail,
        })
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad id {raw}: {e}")))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw}: {e}")))
}

fn fetch_submission(conn: &Connection, id: Uuid) -> Result<Option<Submission>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?1"),
            rusqlite::params![id.to_string()],
            SubmissionRow::read,
        )
        .optional()?;
    row.map(Submission::try_from).transpose()
}

/// Verify the claim still owns an `analyzing` submission.
fn ensure_claim_held(conn: &Connection, claim: &Claim) -> Result<(), StoreError> {
    let current: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT status, run_id FROM submissions WHERE id = ?1",
            rusqlite::params![claim.submission_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match current {
        None => Err(StoreError::NotFound(claim.submission_id)),
        Some((status, Some(run_id)))
            if status == SubmissionStatus::Analyzing.as_str()
                && run_id == claim.run_id.to_string() =>
        {
            Ok(())
        }
        Some(_) => Err(StoreError::ClaimLost(claim.submission_id)),
    }
}

#[async_trait]
impl SubmissionStore for SqliteStore {
    async fn create_submission(
        &self,
        owner_id: &str,
        payload: &IdeaPayload,
    ) -> Result<Submission, StoreError> {
        let created_at = now();
        let submission = Submission {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            payload: payload.clone(),
            status: SubmissionStatus::Pending,
            created_at,
            updated_at: created_at,
            completed_at: None,
            error_detail: None,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO submissions (id, owner_id, payload_json, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                submission.id.to_string(),
                submission.owner_id,
                serde_json::to_string(payload)?,
                submission.status.as_str(),
                timestamp(&created_at),
                timestamp(&created_at),
            ],
        )?;
        Ok(submission)
    }

    async fn begin_analysis(&self, id: Uuid) -> Result<Submission, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = fetch_submission(&tx, id)?.ok_or(StoreError::NotFound(id))?;
        if current.status == SubmissionStatus::Analyzing {
            return Err(StoreError::InvalidTransition {
                id,
                from: current.status,
                to: SubmissionStatus::Analyzing,
            });
        }

        let updated_at = now();
        tx.execute(
            "DELETE FROM reports WHERE submission_id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        tx.execute(
            "UPDATE submissions SET status = ?2, run_id = NULL, error_detail = NULL, \
             completed_at = NULL, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![
                id.to_string(),
                SubmissionStatus::Analyzing.as_str(),
                timestamp(&updated_at),
            ],
        )?;
        tx.commit()?;

        Ok(Submission {
            status: SubmissionStatus::Analyzing,
            updated_at,
            completed_at: None,
            error_detail: None,
            ..current
        })
    }

    async fn claim(&self, id: Uuid) -> Result<Claim, StoreError> {
        let claim = Claim::new(id);
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE submissions SET run_id = ?2, updated_at = ?3 \
             WHERE id = ?1 AND status = 'analyzing' AND run_id IS NULL",
            rusqlite::params![
                id.to_string(),
                claim.run_id.to_string(),
                timestamp(&now()),
            ],
        )?;
        if updated == 1 {
            return Ok(claim);
        }

        match fetch_submission(&conn, id)? {
            None => Err(StoreError::NotFound(id)),
            Some(s) if s.status != SubmissionStatus::Analyzing => Err(StoreError::NotAnalyzing {
                id,
                status: s.status,
            }),
            Some(_) => Err(StoreError::AlreadyClaimed(id)),
        }
    }

    async fn create_report(&self, claim: &Claim, report: &Report) -> Result<(), StoreError> {
        if report.submission_id != claim.submission_id {
            return Err(StoreError::Corrupt(format!(
                "report for {} written under claim on {}",
                report.submission_id, claim.submission_id
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        ensure_claim_held(&tx, claim)?;

        let inserted = tx.execute(
            "INSERT INTO reports \
             (id, submission_id, schema_version, analyses_json, synthesis_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                report.id.to_string(),
                report.submission_id.to_string(),
                report.schema_version,
                serde_json::to_string(&report.analyses)?,
                serde_json::to_string(&report.synthesis)?,
                timestamp(&report.created_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::ReportExists(claim.submission_id));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(())
    }

    async fn update_status(&self, claim: &Claim, update: StatusUpdate) -> Result<(), StoreError> {
        let id = claim.submission_id.to_string();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        ensure_claim_held(&tx, claim)?;

        match &update {
            StatusUpdate::Completed { completed_at } => {
                let has_report: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM reports WHERE submission_id = ?1)",
                    rusqlite::params![id],
                    |row| row.get(0),
                )?;
                if !has_report {
                    return Err(StoreError::ReportMissing(claim.submission_id));
                }
                tx.execute(
                    "UPDATE submissions SET status = ?2, completed_at = ?3, error_detail = NULL, \
                     run_id = NULL, updated_at = ?4 WHERE id = ?1",
                    rusqlite::params![
                        id,
                        update.status().as_str(),
                        timestamp(completed_at),
                        timestamp(&now()),
                    ],
                )?;
            }
            StatusUpdate::Failed { error_detail } => {
                tx.execute(
                    "DELETE FROM reports WHERE submission_id = ?1",
                    rusqlite::params![id],
                )?;
                tx.execute(
                    "UPDATE submissions SET status = ?2, error_detail = ?3, completed_at = NULL, \
                     run_id = NULL, updated_at = ?4 WHERE id = ?1",
                    rusqlite::params![
                        id,
                        update.status().as_str(),
                        error_detail,
                        timestamp(&now()),
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        let conn = self.lock()?;
        fetch_submission(&conn, id)
    }

    async fn get_report(&self, submission_id: Uuid) -> Result<Option<Report>, StoreError> {
        let conn = self.lock()?;
        let row: Option<(String, u32, String, String, String)> = conn
            .query_row(
                "SELECT id, schema_version, analyses_json, synthesis_json, created_at \
                 FROM reports WHERE submission_id = ?1",
                rusqlite::params![submission_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((id, schema_version, analyses_json, synthesis_json, created_at)) = row else {
            return Ok(None);
        };

        let synthesis: SynthesisResult = serde_json::from_str(&synthesis_json)?;
        Ok(Some(Report {
            id: parse_uuid(&id)?,
            schema_version,
            submission_id,
            analyses: serde_json::from_str(&analyses_json)?,
            synthesis,
            created_at: parse_time(&created_at)?,
        }))
    }

    async fn list_submissions(&self, owner_id: &str) -> Result<Vec<Submission>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE owner_id = ?1 \
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![owner_id], SubmissionRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Submission::try_from).collect()
    }

    async fn delete_submission(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM submissions WHERE id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    async fn fail_stale(
        &self,
        older_than: DateTime<Utc>,
        error_detail: &str,
    ) -> Result<Vec<Uuid>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let ids: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM submissions WHERE status = 'analyzing' AND updated_at < ?1",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![timestamp(&older_than)], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            rows
        };

        let updated_at = timestamp(&now());
        for id in &ids {
            tx.execute(
                "UPDATE submissions SET status = 'failed', error_detail = ?2, run_id = NULL, \
                 updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, error_detail, updated_at],
            )?;
        }
        tx.commit()?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }
}
