//! Queries over the completion log.
//!
//! Entries are stored as UTC instants. Every day-based question is asked in a
//! caller-supplied time zone (the household's local time in practice), so
//! "completed today" means the same calendar day on the kitchen wall clock.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::models::{CompletedTask, FamilyMember, Period, Task};
use crate::recurrence::{tasks_for_day, week_start};
use crate::utils::{day_in, local_midnight};

/// Inclusive lower bound of `period`, anchored at `now`.
pub fn period_start<Tz: TimeZone>(period: Period, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let first_day = match period {
        Period::Day => today,
        Period::Week => week_start(today),
        Period::Month => today.with_day(1).unwrap_or(today),
        Period::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        Period::All => return DateTime::<Utc>::UNIX_EPOCH.with_timezone(&tz),
    };
    local_midnight(&tz, first_day)
}

/// Sum of points `member` earned in `[period_start(period, now), now]`.
pub fn points_for_member<Tz: TimeZone>(
    entries: &[CompletedTask],
    member: FamilyMember,
    period: Period,
    now: &DateTime<Tz>,
) -> i64 {
    let start = period_start(period, now).with_timezone(&Utc);
    let end = now.with_timezone(&Utc);
    entries
        .iter()
        .filter(|e| e.completed_by == member)
        .filter(|e| e.completed_at >= start && e.completed_at <= end)
        .map(|e| e.points_earned)
        .sum()
}

/// First entry for this task and member that falls on `day`.
pub fn find_completion_on_day<'a, Tz: TimeZone>(
    entries: &'a [CompletedTask],
    task_id: i64,
    member: FamilyMember,
    day: NaiveDate,
    tz: &Tz,
) -> Option<&'a CompletedTask> {
    entries.iter().find(|e| {
        e.task_id == task_id && e.completed_by == member && day_in(&e.completed_at, tz) == day
    })
}

pub fn is_completed_on_day<Tz: TimeZone>(
    entries: &[CompletedTask],
    task_id: i64,
    member: FamilyMember,
    day: NaiveDate,
    tz: &Tz,
) -> bool {
    find_completion_on_day(entries, task_id, member, day, tz).is_some()
}

/// Calendar view check: did any of the selected members finish the task that day.
pub fn is_completed_on_day_by_any<Tz: TimeZone>(
    entries: &[CompletedTask],
    task_id: i64,
    members: &[FamilyMember],
    day: NaiveDate,
    tz: &Tz,
) -> bool {
    members
        .iter()
        .any(|member| is_completed_on_day(entries, task_id, *member, day, tz))
}

fn entries_on_day<'a, Tz: TimeZone>(
    entries: &'a [CompletedTask],
    members: &'a [FamilyMember],
    day: NaiveDate,
    tz: &'a Tz,
) -> impl Iterator<Item = &'a CompletedTask> + 'a {
    entries
        .iter()
        .filter(move |e| members.contains(&e.completed_by) && day_in(&e.completed_at, tz) == day)
}

pub fn points_for_day<Tz: TimeZone>(
    entries: &[CompletedTask],
    members: &[FamilyMember],
    day: NaiveDate,
    tz: &Tz,
) -> i64 {
    entries_on_day(entries, members, day, tz).map(|e| e.points_earned).sum()
}

pub fn completed_count_for_day<Tz: TimeZone>(
    entries: &[CompletedTask],
    members: &[FamilyMember],
    day: NaiveDate,
    tz: &Tz,
) -> usize {
    entries_on_day(entries, members, day, tz).count()
}

/// One row of the week/month/year calendar views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    pub due: usize,
    pub completed: usize,
    pub points: i64,
}

pub fn summarize_day<Tz: TimeZone>(
    tasks: &[Task],
    entries: &[CompletedTask],
    members: &[FamilyMember],
    day: NaiveDate,
    tz: &Tz,
) -> DaySummary {
    DaySummary {
        date: day,
        due: tasks_for_day(tasks, day, members).len(),
        completed: completed_count_for_day(entries, members, day, tz),
        points: points_for_day(entries, members, day, tz),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodTotals {
    pub day: i64,
    pub week: i64,
    pub month: i64,
    pub year: i64,
    pub all: i64,
}

impl PeriodTotals {
    pub fn for_member<Tz: TimeZone>(entries: &[CompletedTask], member: FamilyMember, now: &DateTime<Tz>) -> Self {
        Self {
            day: points_for_member(entries, member, Period::Day, now),
            week: points_for_member(entries, member, Period::Week, now),
            month: points_for_member(entries, member, Period::Month, now),
            year: points_for_member(entries, member, Period::Year, now),
            all: points_for_member(entries, member, Period::All, now),
        }
    }

    pub fn get(&self, period: Period) -> i64 {
        match period {
            Period::Day => self.day,
            Period::Week => self.week,
            Period::Month => self.month,
            Period::Year => self.year,
            Period::All => self.all,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub member: FamilyMember,
    pub totals: PeriodTotals,
}

/// Every member ranked by all-time points, highest first. Ties keep the
/// household order.
pub fn leaderboard<Tz: TimeZone>(entries: &[CompletedTask], now: &DateTime<Tz>) -> Vec<LeaderboardEntry> {
    let mut rankings: Vec<LeaderboardEntry> = FamilyMember::ALL
        .iter()
        .map(|member| LeaderboardEntry {
            member: *member,
            totals: PeriodTotals::for_member(entries, *member, now),
        })
        .collect();
    rankings.sort_by(|a, b| b.totals.all.cmp(&a.totals.all));
    rankings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveTime};

    fn cet() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        cet().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn entry(task_id: i64, member: FamilyMember, points: i64, when: DateTime<FixedOffset>) -> CompletedTask {
        CompletedTask::new(task_id, member, points, when.with_timezone(&Utc))
    }

    #[test]
    fn period_starts_are_local_midnights() {
        // Thursday
        let now = at(2024, 5, 16, 15, 30);
        let expect = |y, m, d| at(y, m, d, 0, 0);

        assert_eq!(period_start(Period::Day, &now), expect(2024, 5, 16));
        assert_eq!(period_start(Period::Week, &now), expect(2024, 5, 12));
        assert_eq!(period_start(Period::Month, &now), expect(2024, 5, 1));
        assert_eq!(period_start(Period::Year, &now), expect(2024, 1, 1));
        assert_eq!(
            period_start(Period::All, &now).with_timezone(&Utc),
            DateTime::<Utc>::UNIX_EPOCH
        );
    }

    #[test]
    fn week_starting_on_sunday_starts_that_day() {
        let sunday_evening = at(2024, 5, 19, 20, 0);
        assert_eq!(period_start(Period::Week, &sunday_evening).time(), NaiveTime::MIN);
        assert_eq!(
            period_start(Period::Week, &sunday_evening).date_naive(),
            NaiveDate::from_ymd_opt(2024, 5, 19).unwrap()
        );
    }

    #[test]
    fn points_are_bucketed_by_period() {
        let now = at(2024, 5, 16, 15, 30);
        let son = FamilyMember::Son;
        let entries = vec![
            entry(1, son, 1, at(2024, 5, 16, 8, 0)),   // today
            entry(1, son, 2, at(2024, 5, 13, 8, 0)),   // this week
            entry(1, son, 4, at(2024, 5, 2, 8, 0)),    // this month
            entry(1, son, 8, at(2024, 2, 2, 8, 0)),    // this year
            entry(1, son, 16, at(2023, 11, 2, 8, 0)),  // before this year
            entry(1, FamilyMember::Mom, 100, at(2024, 5, 16, 9, 0)),
        ];

        assert_eq!(points_for_member(&entries, son, Period::Day, &now), 1);
        assert_eq!(points_for_member(&entries, son, Period::Week, &now), 3);
        assert_eq!(points_for_member(&entries, son, Period::Month, &now), 7);
        assert_eq!(points_for_member(&entries, son, Period::Year, &now), 15);
        assert_eq!(points_for_member(&entries, son, Period::All, &now), 31);
        assert_eq!(points_for_member(&entries, FamilyMember::Mom, Period::Day, &now), 100);
        assert_eq!(points_for_member(&entries, FamilyMember::Dad, Period::All, &now), 0);
    }

    #[test]
    fn period_bounds_include_start_and_exclude_future() {
        let now = at(2024, 5, 16, 15, 30);
        let son = FamilyMember::Son;
        let entries = vec![
            entry(1, son, 5, at(2024, 5, 16, 0, 0)),
            entry(1, son, 7, at(2024, 5, 15, 23, 59)),
            entry(1, son, 50, at(2024, 5, 16, 18, 0)),
        ];
        assert_eq!(points_for_member(&entries, son, Period::Day, &now), 5);
        assert_eq!(points_for_member(&entries, son, Period::All, &now), 12);
    }

    #[test]
    fn completion_day_uses_local_calendar() {
        let son = FamilyMember::Son;
        // 23:30 UTC on the 9th is already the 10th in CET
        let late = CompletedTask::new(3, son, 2, Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap());
        let entries = vec![late];
        let tenth = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let ninth = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert!(is_completed_on_day(&entries, 3, son, tenth, &cet()));
        assert!(!is_completed_on_day(&entries, 3, son, ninth, &cet()));
        assert!(is_completed_on_day(&entries, 3, son, ninth, &Utc));
        assert!(!is_completed_on_day(&entries, 4, son, tenth, &cet()));
        assert!(!is_completed_on_day(&entries, 3, FamilyMember::Dad, tenth, &cet()));
    }

    #[test]
    fn day_summaries_respect_member_selection() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 16).unwrap();
        let entries = vec![
            entry(1, FamilyMember::Son, 5, at(2024, 5, 16, 8, 0)),
            entry(2, FamilyMember::Mom, 3, at(2024, 5, 16, 9, 0)),
            entry(2, FamilyMember::Son, 3, at(2024, 5, 17, 9, 0)),
        ];
        let family = FamilyMember::ALL;

        assert_eq!(points_for_day(&entries, &family, day, &cet()), 8);
        assert_eq!(points_for_day(&entries, &[FamilyMember::Son], day, &cet()), 5);
        assert_eq!(completed_count_for_day(&entries, &family, day, &cet()), 2);
        assert!(is_completed_on_day_by_any(&entries, 2, &family, day, &cet()));
        assert!(!is_completed_on_day_by_any(&entries, 2, &[FamilyMember::Son], day, &cet()));
    }

    #[test]
    fn day_summary_counts_due_and_done() {
        use crate::models::{Recurrence, TaskCategory};

        let daily = Task::new("Brush teeth".to_string(), TaskCategory::Chores, 1, vec![FamilyMember::Son], Recurrence::Daily);
        let weekly = Task::new("Take out trash".to_string(), TaskCategory::Chores, 4, vec![FamilyMember::Dad], Recurrence::Weekly);
        let tasks = vec![daily, weekly];
        let entries = vec![entry(1, FamilyMember::Son, 1, at(2024, 5, 12, 7, 0))];

        // Sunday: both tasks are due
        let sunday = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
        let summary = summarize_day(&tasks, &entries, &FamilyMember::ALL, sunday, &cet());
        assert_eq!(summary, DaySummary { date: sunday, due: 2, completed: 1, points: 1 });

        let monday = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();
        let summary = summarize_day(&tasks, &entries, &[FamilyMember::Son], monday, &cet());
        assert_eq!(summary, DaySummary { date: monday, due: 1, completed: 0, points: 0 });
    }

    #[test]
    fn leaderboard_ranks_by_all_time_points() {
        let now = at(2024, 5, 16, 15, 30);
        let entries = vec![
            entry(1, FamilyMember::Dad, 10, at(2024, 5, 16, 8, 0)),
            entry(1, FamilyMember::Son, 25, at(2024, 1, 16, 8, 0)),
            entry(2, FamilyMember::Son, 5, at(2024, 5, 14, 8, 0)),
        ];
        let board = leaderboard(&entries, &now);
        let order: Vec<FamilyMember> = board.iter().map(|e| e.member).collect();
        assert_eq!(order, vec![FamilyMember::Son, FamilyMember::Dad, FamilyMember::Mom]);
        assert_eq!(board[0].totals.all, 30);
        assert_eq!(board[0].totals.week, 5);
        assert_eq!(board[1].totals.get(Period::Day), 10);
    }
}
