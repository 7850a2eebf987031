/// SQLite schema for submissions and their reports.
///
/// `reports.submission_id` is unique, so lookups go through the submission
/// id and at most one report exists per submission. Deleting a submission
/// cascades to its report (requires `PRAGMA foreign_keys = ON`).
///
/// `run_id` holds the claim ticket of the orchestrator run that currently
/// owns the `analyzing -> completed | failed` transition.
pub const STORE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS submissions (
    id            TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    payload_json  TEXT NOT NULL,
    status        TEXT NOT NULL,
    run_id        TEXT,
    error_detail  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    completed_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_submissions_owner ON submissions(owner_id);
CREATE INDEX IF NOT EXISTS idx_submissions_status ON submissions(status, updated_at);

CREATE TABLE IF NOT EXISTS reports (
    id              TEXT PRIMARY KEY,
    submission_id   TEXT NOT NULL UNIQUE REFERENCES submissions(id) ON DELETE CASCADE,
    schema_version  INTEGER NOT NULL,
    analyses_json   TEXT NOT NULL,
    synthesis_json  TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
";

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that
/// lexical comparison in SQL matches chronological order.
pub fn timestamp(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Current time truncated to the stored precision, so values written and
/// read back compare equal.
pub fn now() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(6)
}
