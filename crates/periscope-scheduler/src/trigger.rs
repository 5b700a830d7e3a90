use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use periscope_core::{Recurrence, TimeOfDay};

use crate::error::{Result, SchedulerError};

/// Fixed reference zone: every `HH:MM` in a recurrence is an Eastern
/// wall-clock time, regardless of where the process runs.
pub const REFERENCE_ZONE: Tz = chrono_tz::US::Eastern;

/// A periodic firing rule derived from a schedule's recurrence fields:
/// minute, hour, and (for weekly schedules) day-of-week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSpec {
    pub minute: u8,
    pub hour: u8,
    /// Cron day number, 0 = Sunday … 6 = Saturday. `None` fires daily.
    pub day_of_week: Option<u8>,
}

/// Derive the periodic trigger for a recurrence.
///
/// Fails with `InvalidRecurrence` for `immediate` — those queries execute
/// synchronously and are never installed.
pub fn trigger_spec(recurrence: &Recurrence) -> Result<TriggerSpec> {
    match recurrence {
        Recurrence::Daily { time } => Ok(TriggerSpec {
            minute: time.minute,
            hour: time.hour,
            day_of_week: None,
        }),
        Recurrence::Weekly { time, week_day } => Ok(TriggerSpec {
            minute: time.minute,
            hour: time.hour,
            day_of_week: Some(week_day.cron_index()),
        }),
        Recurrence::Immediate => Err(SchedulerError::InvalidRecurrence(
            "immediate queries are not installable".to_string(),
        )),
    }
}

impl TriggerSpec {
    /// Next firing instant strictly after `now`, cron semantics: the
    /// target time still ahead of `now` today fires today — including on
    /// a weekly trigger's target weekday.
    pub fn next_fire(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&REFERENCE_ZONE);
        let today = local.date_naive();

        let date = match self.day_of_week {
            None => {
                if zone_time(today, self.hour, self.minute) > local {
                    today
                } else {
                    today + Days::new(1)
                }
            }
            Some(target) => {
                let current = local.weekday().num_days_from_sunday();
                let mut ahead = (i64::from(target) - i64::from(current)).rem_euclid(7) as u64;
                if ahead == 0 && zone_time(today, self.hour, self.minute) <= local {
                    ahead = 7;
                }
                today + Days::new(ahead)
            }
        };

        zone_time(date, self.hour, self.minute).with_timezone(&Utc)
    }
}

/// Compute the `next_run` bookkeeping value for a recurrence, given `now`.
///
/// Daily: today at the target time when it has not yet passed, else
/// tomorrow. Weekly: the next occurrence of the target weekday — when
/// today IS the target weekday this always rolls to next week's
/// occurrence, even if the time has not passed yet. That boundary differs
/// from the trigger's own firing rule ([`TriggerSpec::next_fire`]) and is
/// kept as-is deliberately.
pub fn next_run_time(recurrence: &Recurrence, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let local = now.with_timezone(&REFERENCE_ZONE);
    let today = local.date_naive();

    let (time, date) = match recurrence {
        Recurrence::Daily { time } => {
            let date = if zone_time(today, time.hour, time.minute) > local {
                today
            } else {
                today + Days::new(1)
            };
            (time, date)
        }
        Recurrence::Weekly { time, week_day } => {
            let target = week_day.cron_index();
            let current = local.weekday().num_days_from_sunday();
            let mut ahead =
                (i64::from(target) - i64::from(current)).rem_euclid(7) as u64;
            // Same-day always rolls a full week.
            if ahead == 0 {
                ahead = 7;
            }
            (time, today + Days::new(ahead))
        }
        Recurrence::Immediate => {
            return Err(SchedulerError::InvalidRecurrence(
                "immediate queries have no next run".to_string(),
            ))
        }
    };

    Ok(zone_time(date, time.hour, time.minute).with_timezone(&Utc))
}

/// Eastern wall-clock instant for `date` at HH:MM.
///
/// Total over valid `TimeOfDay` inputs: an ambiguous local time (DST fall
/// back) resolves to the earlier instant, a nonexistent one (spring
/// forward gap) shifts one hour later.
fn zone_time(date: NaiveDate, hour: u8, minute: u8) -> DateTime<Tz> {
    let naive = date
        .and_hms_opt(u32::from(hour), u32::from(minute), 0)
        .expect("validated HH:MM");
    match REFERENCE_ZONE.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(first, _) => first,
        chrono::LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            REFERENCE_ZONE
                .from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(|| REFERENCE_ZONE.from_utc_datetime(&naive))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use periscope_core::WeekDay;

    /// 2026-01-05 is a Monday; Eastern is UTC-5 in January.
    fn eastern(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        REFERENCE_ZONE
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn daily_9am() -> Recurrence {
        Recurrence::Daily {
            time: TimeOfDay { hour: 9, minute: 0 },
        }
    }

    fn weekly_monday_9am() -> Recurrence {
        Recurrence::Weekly {
            time: TimeOfDay { hour: 9, minute: 0 },
            week_day: WeekDay::Monday,
        }
    }

    #[test]
    fn daily_before_target_runs_today() {
        let now = eastern(2026, 1, 5, 8, 0);
        let next = next_run_time(&daily_9am(), now).unwrap();
        assert_eq!(next, eastern(2026, 1, 5, 9, 0));
    }

    #[test]
    fn daily_after_target_runs_tomorrow() {
        let now = eastern(2026, 1, 5, 10, 0);
        let next = next_run_time(&daily_9am(), now).unwrap();
        assert_eq!(next, eastern(2026, 1, 6, 9, 0));
    }

    #[test]
    fn weekly_on_target_day_always_rolls_a_week() {
        // Monday 08:00, an hour BEFORE the target time — still rolls to
        // next Monday. Same-day never fires for the bookkeeping value.
        let now = eastern(2026, 1, 5, 8, 0);
        let next = next_run_time(&weekly_monday_9am(), now).unwrap();
        assert_eq!(next, eastern(2026, 1, 12, 9, 0));

        // After the time has passed it also rolls.
        let now = eastern(2026, 1, 5, 10, 0);
        let next = next_run_time(&weekly_monday_9am(), now).unwrap();
        assert_eq!(next, eastern(2026, 1, 12, 9, 0));
    }

    #[test]
    fn weekly_mid_week_lands_on_target_day() {
        // Wednesday the 7th → next Monday the 12th.
        let now = eastern(2026, 1, 7, 12, 0);
        let next = next_run_time(&weekly_monday_9am(), now).unwrap();
        assert_eq!(next, eastern(2026, 1, 12, 9, 0));
    }

    #[test]
    fn immediate_has_no_next_run() {
        assert!(matches!(
            next_run_time(&Recurrence::Immediate, Utc::now()),
            Err(SchedulerError::InvalidRecurrence(_))
        ));
        assert!(matches!(
            trigger_spec(&Recurrence::Immediate),
            Err(SchedulerError::InvalidRecurrence(_))
        ));
    }

    #[test]
    fn trigger_spec_day_indices() {
        let spec = trigger_spec(&weekly_monday_9am()).unwrap();
        assert_eq!(spec.day_of_week, Some(1));
        assert_eq!((spec.hour, spec.minute), (9, 0));

        let spec = trigger_spec(&daily_9am()).unwrap();
        assert_eq!(spec.day_of_week, None);
    }

    #[test]
    fn trigger_fires_same_day_when_time_is_ahead() {
        // Unlike next_run_time, the trigger itself follows cron semantics:
        // Monday 08:00 with a Monday 09:00 trigger fires today at 09:00.
        let spec = trigger_spec(&weekly_monday_9am()).unwrap();
        let now = eastern(2026, 1, 5, 8, 0);
        assert_eq!(spec.next_fire(now), eastern(2026, 1, 5, 9, 0));

        // Once 09:00 has passed it arms for next Monday.
        let now = eastern(2026, 1, 5, 9, 30);
        assert_eq!(spec.next_fire(now), eastern(2026, 1, 12, 9, 0));
    }

    #[test]
    fn daily_trigger_rolls_to_tomorrow_after_firing_time() {
        let spec = trigger_spec(&daily_9am()).unwrap();
        let now = eastern(2026, 1, 5, 9, 0);
        // Exactly at the firing instant the next fire is tomorrow.
        assert_eq!(spec.next_fire(now), eastern(2026, 1, 6, 9, 0));
    }
}
