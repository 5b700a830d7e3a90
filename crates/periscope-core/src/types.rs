use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Closed set of supported remote research models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueryModel {
    /// Fast online model — the default for ad-hoc queries.
    #[default]
    #[serde(rename = "sonar")]
    Sonar,
    /// Larger model with a bigger completion budget.
    #[serde(rename = "sonar-pro")]
    SonarPro,
}

impl QueryModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryModel::Sonar => "sonar",
            QueryModel::SonarPro => "sonar-pro",
        }
    }

    /// Completion token budget sent with the research request.
    pub fn max_tokens(&self) -> u32 {
        match self {
            QueryModel::Sonar => 4000,
            QueryModel::SonarPro => 6000,
        }
    }
}

impl fmt::Display for QueryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sonar" => Ok(QueryModel::Sonar),
            "sonar-pro" => Ok(QueryModel::SonarPro),
            other => Err(format!("unknown model: {other}")),
        }
    }
}

/// A 24-hour wall-clock time, serialised as `"HH:MM"`.
///
/// Interpreted in the fixed US-Eastern reference zone everywhere a
/// recurrence is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
        let hour: u8 = h.parse().map_err(|_| format!("bad hour in {s:?}"))?;
        let minute: u8 = m.parse().map_err(|_| format!("bad minute in {s:?}"))?;
        if hour > 23 || minute > 59 {
            return Err(format!("time out of range: {s:?}"));
        }
        Ok(TimeOfDay { hour, minute })
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Day of the week for weekly recurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekDay {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl WeekDay {
    /// Cron day number: 0 = Sunday … 6 = Saturday.
    pub fn cron_index(&self) -> u8 {
        match self {
            WeekDay::Sunday => 0,
            WeekDay::Monday => 1,
            WeekDay::Tuesday => 2,
            WeekDay::Wednesday => 3,
            WeekDay::Thursday => 4,
            WeekDay::Friday => 5,
            WeekDay::Saturday => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeekDay::Sunday => "sunday",
            WeekDay::Monday => "monday",
            WeekDay::Tuesday => "tuesday",
            WeekDay::Wednesday => "wednesday",
            WeekDay::Thursday => "thursday",
            WeekDay::Friday => "friday",
            WeekDay::Saturday => "saturday",
        }
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeekDay {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sunday" => Ok(WeekDay::Sunday),
            "monday" => Ok(WeekDay::Monday),
            "tuesday" => Ok(WeekDay::Tuesday),
            "wednesday" => Ok(WeekDay::Wednesday),
            "thursday" => Ok(WeekDay::Thursday),
            "friday" => Ok(WeekDay::Friday),
            "saturday" => Ok(WeekDay::Saturday),
            other => Err(format!("unknown weekday: {other}")),
        }
    }
}

/// When a query should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "snake_case")]
pub enum Recurrence {
    /// Execute once, synchronously, never persisted as a Schedule.
    Immediate,
    /// Every day at the given wall-clock time.
    Daily { time: TimeOfDay },
    /// Every week on `week_day` at the given wall-clock time.
    Weekly { time: TimeOfDay, week_day: WeekDay },
}

impl Recurrence {
    pub fn frequency(&self) -> &'static str {
        match self {
            Recurrence::Immediate => "immediate",
            Recurrence::Daily { .. } => "daily",
            Recurrence::Weekly { .. } => "weekly",
        }
    }

    pub fn time(&self) -> Option<TimeOfDay> {
        match self {
            Recurrence::Immediate => None,
            Recurrence::Daily { time } | Recurrence::Weekly { time, .. } => Some(*time),
        }
    }

    pub fn week_day(&self) -> Option<WeekDay> {
        match self {
            Recurrence::Weekly { week_day, .. } => Some(*week_day),
            _ => None,
        }
    }
}

/// Lifecycle state of a schedule.
///
/// Transitions only along `scheduled → processing → {completed, error}`,
/// then back to `scheduled` when the trigger is re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Processing,
    Completed,
    Error,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Processing => "processing",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ScheduleStatus::Scheduled),
            "processing" => Ok(ScheduleStatus::Processing),
            "completed" => Ok(ScheduleStatus::Completed),
            "error" => Ok(ScheduleStatus::Error),
            other => Err(format!("unknown schedule status: {other}")),
        }
    }
}

/// A persisted recurring query plus its current execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// UUID v4 string — primary key.
    pub id: String,
    /// The research question sent to the remote model.
    pub query: String,
    pub model: QueryModel,
    /// Recurrence fields (`frequency`, `time`, `week_day`) are flattened
    /// into the schedule object on the wire.
    #[serde(flatten)]
    pub recurrence: Recurrence,
    /// Dormant schedules keep their row but get no trigger.
    pub is_active: bool,
    pub status: ScheduleStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_result: Option<String>,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Fresh active schedule in the `scheduled` state.
    pub fn new(query: impl Into<String>, model: QueryModel, recurrence: Recurrence) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.into(),
            model,
            recurrence,
            is_active: true,
            status: ScheduleStatus::Scheduled,
            last_run: None,
            next_run: None,
            last_result: None,
            last_error: None,
            last_error_time: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied to a persisted schedule.
///
/// `None` fields are left untouched; `updated_at` is always bumped by the
/// store so the reconciliation poll picks the change up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulePatch {
    pub query: Option<String>,
    pub model: Option<QueryModel>,
    #[serde(flatten)]
    pub recurrence: Option<Recurrence>,
    pub is_active: Option<bool>,
    pub status: Option<ScheduleStatus>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_result: Option<String>,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

impl SchedulePatch {
    pub fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.model.is_none()
            && self.recurrence.is_none()
            && self.is_active.is_none()
            && self.status.is_none()
            && self.last_run.is_none()
            && self.next_run.is_none()
            && self.last_result.is_none()
            && self.last_error.is_none()
            && self.last_error_time.is_none()
    }
}

/// Append-only record of one executed query. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Autoincrement row id.
    pub id: i64,
    /// Owning schedule, `None` for immediate queries.
    pub schedule_id: Option<String>,
    pub query: String,
    pub result: String,
    pub model: QueryModel,
    /// Citation URLs returned alongside the completion.
    pub citations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_parses_and_rejects() {
        let t: TimeOfDay = "09:05".parse().unwrap();
        assert_eq!((t.hour, t.minute), (9, 5));
        assert_eq!(t.to_string(), "09:05");

        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
        assert!("".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn recurrence_wire_format_is_flat() {
        let r = Recurrence::Weekly {
            time: "09:00".parse().unwrap(),
            week_day: WeekDay::Monday,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""frequency":"weekly""#));
        assert!(json.contains(r#""time":"09:00""#));
        assert!(json.contains(r#""week_day":"monday""#));

        let back: Recurrence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn schedule_json_flattens_recurrence() {
        let s = Schedule::new(
            "latest AI developments",
            QueryModel::SonarPro,
            Recurrence::Daily {
                time: "08:30".parse().unwrap(),
            },
        );
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["frequency"], "daily");
        assert_eq!(json["time"], "08:30");
        assert_eq!(json["model"], "sonar-pro");
        assert_eq!(json["status"], "scheduled");
    }

    #[test]
    fn model_token_budgets() {
        assert_eq!(QueryModel::Sonar.max_tokens(), 4000);
        assert_eq!(QueryModel::SonarPro.max_tokens(), 6000);
    }

    #[test]
    fn week_day_cron_indices() {
        assert_eq!(WeekDay::Sunday.cron_index(), 0);
        assert_eq!(WeekDay::Monday.cron_index(), 1);
        assert_eq!(WeekDay::Saturday.cron_index(), 6);
    }
}
