//! Decides which tasks are due on a given calendar day.
//!
//! Weeks start on Sunday, and weekly tasks are anchored to that first day.
//! Start/end times are display-only and never affect whether a task is due.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{FamilyMember, Recurrence, Task};

/// Day every weekly task falls on.
pub const WEEK_START: Weekday = Weekday::Sun;

/// Whether `task` is due on `date`, ignoring who it is assigned to.
pub fn is_active_on(task: &Task, date: NaiveDate) -> bool {
    match task.recurring {
        Recurrence::Daily => true,
        Recurrence::Weekly => date.weekday() == WEEK_START,
        Recurrence::Once => task.due_date == Some(date),
    }
}

/// Whether any of `members` is among the task's assignees.
pub fn is_assigned_to_any(task: &Task, members: &[FamilyMember]) -> bool {
    task.assigned_to.iter().any(|m| members.contains(m))
}

/// Tasks due on `day` for the selected members, in input order.
pub fn tasks_for_day<'a>(tasks: &'a [Task], day: NaiveDate, members: &[FamilyMember]) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| is_assigned_to_any(task, members))
        .filter(|task| is_active_on(task, day))
        .collect()
}

/// Most recent week start on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// The seven days of the week containing `date`, starting on Sunday.
pub fn week_days(date: NaiveDate) -> Vec<NaiveDate> {
    week_start(date).iter_days().take(7).collect()
}

/// Every day of the month containing `date`.
pub fn month_days(date: NaiveDate) -> Vec<NaiveDate> {
    let Some(first) = date.with_day(1) else {
        return vec![date];
    };
    first.iter_days().take_while(|d| d.month() == first.month()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskCategory;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(recurring: Recurrence, assigned_to: Vec<FamilyMember>) -> Task {
        Task::new("Water plants".to_string(), TaskCategory::Chores, 3, assigned_to, recurring)
    }

    #[test]
    fn week_days_start_on_sunday() {
        let days = week_days(date(2024, 5, 16));
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date(2024, 5, 12));
        assert_eq!(days[6], date(2024, 5, 18));
    }

    #[test]
    fn month_days_cover_the_whole_month() {
        assert_eq!(month_days(date(2024, 2, 14)).len(), 29);
        assert_eq!(month_days(date(2023, 2, 1)).len(), 28);
        let december = month_days(date(2024, 12, 31));
        assert_eq!(december.first(), Some(&date(2024, 12, 1)));
        assert_eq!(december.last(), Some(&date(2024, 12, 31)));
    }

    #[test]
    fn daily_task_is_always_active() {
        let t = task(Recurrence::Daily, vec![FamilyMember::Mom]);
        let start = date(2024, 1, 1);
        for offset in 0..400 {
            assert!(is_active_on(&t, start + chrono::Duration::days(offset)));
        }
    }

    #[test]
    fn weekly_task_is_active_on_sundays_only() {
        let t = task(Recurrence::Weekly, vec![FamilyMember::Son]);
        // 2024-01-07 is a Sunday
        let first_sunday = date(2024, 1, 7);
        assert_eq!(first_sunday.weekday(), Weekday::Sun);

        let mut active_days = 0;
        for offset in 0..(52 * 7) {
            let day = first_sunday + chrono::Duration::days(offset);
            let active = is_active_on(&t, day);
            assert_eq!(active, day.weekday() == Weekday::Sun, "{day}");
            if active {
                active_days += 1;
            }
        }
        assert_eq!(active_days, 52);
    }

    #[test]
    fn once_task_is_active_only_on_due_date() {
        let mut t = task(Recurrence::Once, vec![FamilyMember::Dad]);
        let due = date(2024, 5, 14);
        assert!(!is_active_on(&t, due), "no due date means never active");

        t.due_date = Some(due);
        assert!(is_active_on(&t, due));
        assert!(!is_active_on(&t, date(2024, 5, 13)));
        assert!(!is_active_on(&t, date(2024, 5, 15)));
        assert!(!is_active_on(&t, date(2025, 5, 14)));
    }

    #[test]
    fn tasks_for_day_applies_member_filter() {
        let tasks = vec![
            task(Recurrence::Daily, vec![FamilyMember::Son]),
            task(Recurrence::Daily, vec![FamilyMember::Mom, FamilyMember::Dad]),
            task(Recurrence::Weekly, vec![FamilyMember::Son]),
        ];
        let monday = date(2024, 1, 8);
        let sunday = date(2024, 1, 14);

        assert_eq!(tasks_for_day(&tasks, monday, &[FamilyMember::Son]).len(), 1);
        assert_eq!(tasks_for_day(&tasks, sunday, &[FamilyMember::Son]).len(), 2);
        assert_eq!(tasks_for_day(&tasks, sunday, &[FamilyMember::Dad]).len(), 1);
        assert!(tasks_for_day(&tasks, sunday, &[]).is_empty());
    }

    #[test]
    fn week_start_is_previous_sunday() {
        assert_eq!(week_start(date(2024, 1, 10)), date(2024, 1, 7));
        assert_eq!(week_start(date(2024, 1, 7)), date(2024, 1, 7));
        assert_eq!(week_start(date(2024, 1, 6)), date(2023, 12, 31));
    }
}
