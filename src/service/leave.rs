//! Leave bookkeeping driven by attendance marks.
//!
//! Marking a day as leave extends an adjacent period of the same type for the
//! same employee, or inserts a new single-day period when nothing touches it.

use crate::model::leave_period::{LEAVE_COLUMNS, LeavePeriod, LeaveType};
use chrono::{Days, NaiveDate};
use sqlx::MySqlConnection;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeavePlan {
    /// A period of this type already covers the day.
    AlreadyCovered { id: u64 },
    /// The period ending yesterday grows to end on `day`.
    ExtendPrevious { id: u64, to_date: NaiveDate },
    /// The period starting tomorrow grows to start on `day`.
    ExtendNext { id: u64, from_date: NaiveDate },
    /// The day joins two periods: `keep` absorbs `remove`.
    Bridge {
        keep: u64,
        to_date: NaiveDate,
        remove: u64,
    },
    Insert { day: NaiveDate },
}

/// Decides how a leave day changes the employee's periods.
///
/// `previous` must end the day before `day` and `next` must start the day
/// after; callers load them with exactly those predicates.
pub fn plan_leave_day(
    day: NaiveDate,
    covering: Option<&LeavePeriod>,
    previous: Option<&LeavePeriod>,
    next: Option<&LeavePeriod>,
) -> LeavePlan {
    if let Some(period) = covering {
        return LeavePlan::AlreadyCovered { id: period.id };
    }

    match (previous, next) {
        (Some(prev), Some(next)) => LeavePlan::Bridge {
            keep: prev.id,
            to_date: next.to_date,
            remove: next.id,
        },
        (Some(prev), None) => LeavePlan::ExtendPrevious {
            id: prev.id,
            to_date: day,
        },
        (None, Some(next)) => LeavePlan::ExtendNext {
            id: next.id,
            from_date: day,
        },
        (None, None) => LeavePlan::Insert { day },
    }
}

async fn find_period(
    conn: &mut MySqlConnection,
    employee_id: u64,
    leave_type: &str,
    predicate: &str,
    dates: &[NaiveDate],
) -> Result<Option<LeavePeriod>, sqlx::Error> {
    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_periods \
         WHERE employee_id = ? AND leave_type = ? AND {predicate} \
         ORDER BY id LIMIT 1"
    );
    let mut query = sqlx::query_as::<_, LeavePeriod>(&sql)
        .bind(employee_id)
        .bind(leave_type);
    for date in dates {
        query = query.bind(*date);
    }
    query.fetch_optional(&mut *conn).await
}

/// Applies a leave mark for `day`; run inside the caller's transaction.
pub async fn apply_leave_day(
    conn: &mut MySqlConnection,
    employee_id: u64,
    leave_type: LeaveType,
    day: NaiveDate,
) -> Result<LeavePlan, sqlx::Error> {
    let kind = leave_type.as_ref();

    let covering =
        find_period(conn, employee_id, kind, "from_date <= ? AND to_date >= ?", &[day, day])
            .await?;
    let (previous, next) = if covering.is_some() {
        (None, None)
    } else {
        let yesterday = day.checked_sub_days(Days::new(1)).unwrap_or(day);
        let tomorrow = day.checked_add_days(Days::new(1)).unwrap_or(day);
        (
            find_period(conn, employee_id, kind, "to_date = ?", &[yesterday]).await?,
            find_period(conn, employee_id, kind, "from_date = ?", &[tomorrow]).await?,
        )
    };

    let plan = plan_leave_day(day, covering.as_ref(), previous.as_ref(), next.as_ref());
    debug!(employee_id, leave_type = kind, %day, plan = ?plan, "Applying leave day");

    match &plan {
        LeavePlan::AlreadyCovered { .. } => {}
        LeavePlan::ExtendPrevious { id, to_date } => {
            sqlx::query("UPDATE leave_periods SET to_date = ? WHERE id = ?")
                .bind(to_date)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        LeavePlan::ExtendNext { id, from_date } => {
            sqlx::query("UPDATE leave_periods SET from_date = ? WHERE id = ?")
                .bind(from_date)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        LeavePlan::Bridge {
            keep,
            to_date,
            remove,
        } => {
            sqlx::query("DELETE FROM leave_periods WHERE id = ?")
                .bind(remove)
                .execute(&mut *conn)
                .await?;
            sqlx::query("UPDATE leave_periods SET to_date = ? WHERE id = ?")
                .bind(to_date)
                .bind(keep)
                .execute(&mut *conn)
                .await?;
        }
        LeavePlan::Insert { day } => {
            sqlx::query(
                "INSERT INTO leave_periods (employee_id, leave_type, from_date, to_date, reason) \
                 VALUES (?, ?, ?, ?, 'attendance')",
            )
            .bind(employee_id)
            .bind(kind)
            .bind(day)
            .bind(day)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(plan)
}

/// Days of `[from, to]` falling inside `[start, end]`, inclusive.
pub fn overlap_days(from: NaiveDate, to: NaiveDate, start: NaiveDate, end: NaiveDate) -> i64 {
    let lo = from.max(start);
    let hi = to.min(end);
    if hi < lo {
        0
    } else {
        (hi - lo).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn period(id: u64, from: NaiveDate, to: NaiveDate) -> LeavePeriod {
        LeavePeriod {
            id,
            employee_id: 7,
            leave_type: "sick".into(),
            from_date: from,
            to_date: to,
            reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn isolated_day_inserts_single_day_period() {
        assert_eq!(
            plan_leave_day(d(3, 10), None, None, None),
            LeavePlan::Insert { day: d(3, 10) }
        );
    }

    #[test]
    fn extends_period_ending_yesterday() {
        let prev = period(1, d(3, 7), d(3, 9));
        assert_eq!(
            plan_leave_day(d(3, 10), None, Some(&prev), None),
            LeavePlan::ExtendPrevious {
                id: 1,
                to_date: d(3, 10)
            }
        );
    }

    #[test]
    fn extends_period_starting_tomorrow() {
        let next = period(2, d(3, 11), d(3, 12));
        assert_eq!(
            plan_leave_day(d(3, 10), None, None, Some(&next)),
            LeavePlan::ExtendNext {
                id: 2,
                from_date: d(3, 10)
            }
        );
    }

    #[test]
    fn joining_day_bridges_both_periods() {
        let prev = period(1, d(3, 7), d(3, 9));
        let next = period(2, d(3, 11), d(3, 14));
        assert_eq!(
            plan_leave_day(d(3, 10), None, Some(&prev), Some(&next)),
            LeavePlan::Bridge {
                keep: 1,
                to_date: d(3, 14),
                remove: 2
            }
        );
    }

    #[test]
    fn covered_day_is_a_no_op() {
        let covering = period(5, d(3, 1), d(3, 31));
        assert_eq!(
            plan_leave_day(d(3, 10), Some(&covering), None, None),
            LeavePlan::AlreadyCovered { id: 5 }
        );
    }

    #[test]
    fn overlap_is_inclusive_and_clipped() {
        assert_eq!(overlap_days(d(2, 25), d(3, 3), d(3, 1), d(3, 31)), 3);
        assert_eq!(overlap_days(d(3, 5), d(3, 5), d(3, 1), d(3, 31)), 1);
        assert_eq!(overlap_days(d(4, 1), d(4, 2), d(3, 1), d(3, 31)), 0);
    }

    #[test]
    fn period_days_are_inclusive() {
        assert_eq!(period(1, d(3, 7), d(3, 9)).days(), 3);
    }
}
