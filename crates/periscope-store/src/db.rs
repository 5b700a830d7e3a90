use rusqlite::Connection;

use crate::error::Result;

/// Initialise the periscope schema in `conn`. Safe to call on every
/// startup (idempotent).
///
/// `schedules` holds the recurrence rule plus current execution state;
/// `query_results` is the append-only audit trail. The `updated_at` index
/// keeps the reconciliation poll cheap, the `is_active` index the startup
/// load.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schedules (
            id              TEXT    NOT NULL PRIMARY KEY,
            query           TEXT    NOT NULL,
            model           TEXT    NOT NULL,
            frequency       TEXT    NOT NULL,   -- 'daily' | 'weekly'
            time            TEXT    NOT NULL,   -- HH:MM (US-Eastern)
            week_day        TEXT,               -- weekly only
            is_active       INTEGER NOT NULL DEFAULT 1,
            status          TEXT    NOT NULL DEFAULT 'scheduled',
            last_run        TEXT,               -- ISO-8601 or NULL
            next_run        TEXT,               -- ISO-8601 or NULL
            last_result     TEXT,
            last_error      TEXT,
            last_error_time TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_schedules_active
            ON schedules (is_active);
        -- Reconciliation poll: SELECT … WHERE updated_at > ?
        CREATE INDEX IF NOT EXISTS idx_schedules_updated
            ON schedules (updated_at);

        CREATE TABLE IF NOT EXISTS query_results (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            schedule_id TEXT,                       -- NULL for immediate queries
            query       TEXT    NOT NULL,
            result      TEXT    NOT NULL,
            model       TEXT    NOT NULL,
            citations   TEXT    NOT NULL DEFAULT '[]', -- JSON array of URLs
            created_at  TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_results_schedule
            ON query_results (schedule_id, created_at DESC);
        ",
    )?;
    Ok(())
}
