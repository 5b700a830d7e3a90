use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{types::ToSql, Connection};
use tracing::warn;

use periscope_core::{QueryModel, QueryResult, Recurrence, Schedule, SchedulePatch};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::store::{NewQueryResult, ScheduleStore};

/// SQLite-backed store. One `Connection` behind a mutex — callers on
/// timer tasks and the reconciliation loop serialise on it, which is fine
/// at the schedule volumes this system targets.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }
}

const SCHEDULE_COLS: &str = "id, query, model, frequency, time, week_day, is_active, status, \
     last_run, next_run, last_result, last_error, last_error_time, created_at, updated_at";

/// Raw row image before decoding into a [`Schedule`].
type RawSchedule = (
    String,         // id
    String,         // query
    String,         // model
    String,         // frequency
    String,         // time
    Option<String>, // week_day
    bool,           // is_active
    String,         // status
    Option<String>, // last_run
    Option<String>, // next_run
    Option<String>, // last_result
    Option<String>, // last_error
    Option<String>, // last_error_time
    String,         // created_at
    String,         // updated_at
);

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSchedule> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
    ))
}

fn parse_ts(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {s:?}: {e}"))
}

fn decode(raw: RawSchedule) -> std::result::Result<Schedule, String> {
    let (
        id,
        query,
        model,
        frequency,
        time,
        week_day,
        is_active,
        status,
        last_run,
        next_run,
        last_result,
        last_error,
        last_error_time,
        created_at,
        updated_at,
    ) = raw;

    let time = time.parse().map_err(|e| format!("bad time: {e}"))?;
    let recurrence = match frequency.as_str() {
        "daily" => Recurrence::Daily { time },
        "weekly" => {
            // Weekly rows MUST carry a week_day.
            let day = week_day
                .ok_or_else(|| "weekly schedule without week_day".to_string())?
                .parse()
                .map_err(|e: String| e)?;
            Recurrence::Weekly {
                time,
                week_day: day,
            }
        }
        other => return Err(format!("unknown frequency: {other}")),
    };

    Ok(Schedule {
        id,
        query,
        model: model.parse()?,
        recurrence,
        is_active,
        status: status.parse()?,
        last_run: last_run.as_deref().map(parse_ts).transpose()?,
        next_run: next_run.as_deref().map(parse_ts).transpose()?,
        last_result,
        last_error,
        last_error_time: last_error_time.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// Column values for a recurrence: (frequency, time, week_day).
fn recurrence_cols(r: &Recurrence) -> Result<(&'static str, String, Option<&'static str>)> {
    match r {
        Recurrence::Daily { time } => Ok(("daily", time.to_string(), None)),
        Recurrence::Weekly { time, week_day } => {
            Ok(("weekly", time.to_string(), Some(week_day.as_str())))
        }
        Recurrence::Immediate => Err(StoreError::ImmediateNotPersisted),
    }
}

impl SqliteStore {
    fn select_where(&self, clause: &str, params: &[&dyn ToSql]) -> Result<Vec<Schedule>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {SCHEDULE_COLS} FROM schedules {clause}");
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<RawSchedule> = stmt
            .query_map(params, read_raw)?
            .filter_map(|r| r.ok())
            .collect();

        // Undecodable rows are skipped, not fatal — one corrupt schedule
        // must not take the whole listing down.
        Ok(rows
            .into_iter()
            .filter_map(|raw| {
                let id = raw.0.clone();
                match decode(raw) {
                    Ok(s) => Some(s),
                    Err(reason) => {
                        warn!(schedule_id = %id, %reason, "skipping corrupt schedule row");
                        None
                    }
                }
            })
            .collect())
    }
}

impl ScheduleStore for SqliteStore {
    fn list_active(&self) -> Result<Vec<Schedule>> {
        self.select_where("WHERE is_active = 1 ORDER BY created_at", &[])
    }

    fn list_all(&self) -> Result<Vec<Schedule>> {
        self.select_where("ORDER BY created_at", &[])
    }

    fn get(&self, id: &str) -> Result<Option<Schedule>> {
        let mut rows = self.select_where("WHERE id = ?1", &[&id])?;
        Ok(rows.pop())
    }

    fn insert(&self, schedule: &Schedule) -> Result<()> {
        let (frequency, time, week_day) = recurrence_cols(&schedule.recurrence)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO schedules
             (id, query, model, frequency, time, week_day, is_active, status,
              last_run, next_run, last_result, last_error, last_error_time,
              created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            rusqlite::params![
                schedule.id,
                schedule.query,
                schedule.model.as_str(),
                frequency,
                time,
                week_day,
                schedule.is_active,
                schedule.status.to_string(),
                schedule.last_run.map(|t| t.to_rfc3339()),
                schedule.next_run.map(|t| t.to_rfc3339()),
                schedule.last_result,
                schedule.last_error,
                schedule.last_error_time.map(|t| t.to_rfc3339()),
                schedule.created_at.to_rfc3339(),
                schedule.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update(&self, id: &str, patch: &SchedulePatch) -> Result<()> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref q) = patch.query {
            sets.push("query = ?");
            values.push(Box::new(q.clone()));
        }
        if let Some(model) = patch.model {
            sets.push("model = ?");
            values.push(Box::new(model.as_str()));
        }
        if let Some(ref recurrence) = patch.recurrence {
            let (frequency, time, week_day) = recurrence_cols(recurrence)?;
            sets.push("frequency = ?");
            values.push(Box::new(frequency));
            sets.push("time = ?");
            values.push(Box::new(time));
            sets.push("week_day = ?");
            values.push(Box::new(week_day));
        }
        if let Some(active) = patch.is_active {
            sets.push("is_active = ?");
            values.push(Box::new(active));
        }
        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Box::new(status.to_string()));
        }
        if let Some(t) = patch.last_run {
            sets.push("last_run = ?");
            values.push(Box::new(t.to_rfc3339()));
        }
        if let Some(t) = patch.next_run {
            sets.push("next_run = ?");
            values.push(Box::new(t.to_rfc3339()));
        }
        if let Some(ref r) = patch.last_result {
            sets.push("last_result = ?");
            values.push(Box::new(r.clone()));
        }
        if let Some(ref e) = patch.last_error {
            sets.push("last_error = ?");
            values.push(Box::new(e.clone()));
        }
        if let Some(t) = patch.last_error_time {
            sets.push("last_error_time = ?");
            values.push(Box::new(t.to_rfc3339()));
        }

        // Always bump updated_at so the reconciliation poll sees the change.
        sets.push("updated_at = ?");
        values.push(Box::new(Utc::now().to_rfc3339()));
        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE schedules SET {} WHERE id = ?", sets.join(", "));
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            &sql,
            rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM schedules WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn list_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let since = since.to_rfc3339();
        self.select_where("WHERE updated_at > ?1 ORDER BY updated_at", &[&since])
    }

    fn insert_result(&self, result: &NewQueryResult) -> Result<i64> {
        let citations = serde_json::to_string(&result.citations)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO query_results
             (schedule_id, query, result, model, citations, created_at)
             VALUES (?1,?2,?3,?4,?5,?6)",
            rusqlite::params![
                result.schedule_id,
                result.query,
                result.result,
                result.model.as_str(),
                citations,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_results(&self, limit: u32) -> Result<Vec<QueryResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, schedule_id, query, result, model, citations, created_at
             FROM query_results ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows: Vec<(i64, Option<String>, String, String, String, String, String)> = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get(0)?, // id
                    row.get(1)?, // schedule_id
                    row.get(2)?, // query
                    row.get(3)?, // result
                    row.get(4)?, // model
                    row.get(5)?, // citations JSON
                    row.get(6)?, // created_at
                ))
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|(id, schedule_id, query, result, model, citations, created_at)| {
                let model: QueryModel = model.parse().ok()?;
                let citations: Vec<String> = serde_json::from_str(&citations).ok()?;
                let created_at = parse_ts(&created_at).ok()?;
                Some(QueryResult {
                    id,
                    schedule_id,
                    query,
                    result,
                    model,
                    citations,
                    created_at,
                })
            })
            .collect())
    }
}
