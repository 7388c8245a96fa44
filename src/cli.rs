use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::debug;

use crate::banking::BankOperation;
use crate::database::{Database, DatabaseError};
use crate::goals::GoalProgress;
use crate::holidays;
use crate::ledger::{self, PeriodTotals};
use crate::models::{BigGoal, FamilyMember, Period, PointRule, Recurrence, Reward, Task, TaskCategory};
use crate::recurrence;
use crate::utils::parse_date;

#[derive(Parser)]
#[command(name = "famchart")]
#[command(about = "Family chore chart - tasks, points, rewards and a piggy bank")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the full household state as JSON
    State,
    /// Show the tasks due on a day
    Day {
        /// Day to show (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated members to show (defaults to everyone)
        #[arg(long, value_delimiter = ',')]
        members: Vec<FamilyMember>,
    },
    /// Per-day summary of a week, month or year
    Calendar {
        #[arg(value_enum, default_value = "week")]
        view: CalendarView,
        /// Any day inside the range (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated members to count (defaults to everyone)
        #[arg(long, value_delimiter = ',')]
        members: Vec<FamilyMember>,
    },
    /// Add a new task
    AddTask {
        /// Task title
        title: String,
        /// chores, homework, educational or dates
        #[arg(long, default_value = "chores")]
        category: TaskCategory,
        #[arg(long, default_value_t = 0)]
        points: i64,
        /// Comma-separated members (mom, dad, son)
        #[arg(long, value_delimiter = ',', required = true)]
        assign: Vec<FamilyMember>,
        /// daily, weekly or once
        #[arg(long, default_value = "daily")]
        recurring: Recurrence,
        /// Due date for one-off tasks (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Start time (HH:MM)
        #[arg(long)]
        start: Option<String>,
        /// End time (HH:MM)
        #[arg(long)]
        end: Option<String>,
    },
    /// Change fields of an existing task
    UpdateTask {
        id: i64,
        #[command(flatten)]
        changes: TaskChanges,
    },
    /// Delete a task (its completion history is kept)
    DeleteTask { id: i64 },
    /// Mark a task as done for a member
    Complete {
        task_id: i64,
        #[arg(long)]
        member: FamilyMember,
    },
    /// Undo a member's completion of a task
    Uncomplete {
        task_id: i64,
        #[arg(long)]
        member: FamilyMember,
        /// Day of the completion (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete a completion entry by ID
    DeleteCompletion { id: i64 },
    /// Add a point rule
    AddRule {
        description: String,
        #[arg(long)]
        points: i64,
        #[arg(long, default_value = "chores")]
        category: TaskCategory,
    },
    /// Replace a point rule
    UpdateRule {
        id: i64,
        description: String,
        #[arg(long)]
        points: i64,
        #[arg(long, default_value = "chores")]
        category: TaskCategory,
    },
    /// Delete a point rule
    DeleteRule { id: i64 },
    /// Add a reward
    AddReward {
        title: String,
        #[arg(long)]
        cost: i64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "🎁")]
        emoji: String,
    },
    /// Replace a reward
    UpdateReward {
        id: i64,
        title: String,
        #[arg(long)]
        cost: i64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "🎁")]
        emoji: String,
    },
    /// Delete a reward
    DeleteReward { id: i64 },
    /// Redeem a reward from the bank
    Redeem {
        reward_id: i64,
        #[arg(long, default_value = "son")]
        member: FamilyMember,
    },
    /// Deposit, withdraw or adjust lifetime points
    Bank {
        #[arg(value_enum)]
        action: BankAction,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Manage the big goal
    Goal {
        #[command(subcommand)]
        action: GoalCommand,
    },
    /// Show point totals for a member
    Points {
        #[arg(long, default_value = "son")]
        member: FamilyMember,
        /// day, week, month, year or all (defaults to every period)
        #[arg(long)]
        period: Option<Period>,
    },
    /// Rank the family by points
    Leaderboard,
    /// List the holidays of a year
    Holidays {
        #[arg(long)]
        year: Option<i32>,
    },
}

/// Field changes for `update-task`. Unset fields keep their value.
#[derive(Debug, Default, Args)]
pub struct TaskChanges {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub category: Option<TaskCategory>,
    #[arg(long)]
    pub points: Option<i64>,
    /// Replaces the whole assignment set
    #[arg(long, value_delimiter = ',')]
    pub assign: Option<Vec<FamilyMember>>,
    #[arg(long)]
    pub recurring: Option<Recurrence>,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long, conflicts_with = "clear_times")]
    pub start: Option<String>,
    #[arg(long, conflicts_with = "clear_times")]
    pub end: Option<String>,
    /// Remove the due date
    #[arg(long)]
    pub clear_due: bool,
    /// Remove start and end times
    #[arg(long)]
    pub clear_times: bool,
}

impl TaskChanges {
    pub fn apply_to(self, task: &mut Task) -> Result<(), CliError> {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(points) = self.points {
            task.points = points;
        }
        if let Some(assign) = self.assign {
            task.assigned_to = assign;
        }
        if let Some(recurring) = self.recurring {
            task.recurring = recurring;
        }
        if self.clear_due {
            task.due_date = None;
        } else if let Some(due) = parse_optional_date(self.due)? {
            task.due_date = Some(due);
        }
        if self.clear_times {
            task.start_time = None;
            task.end_time = None;
        }
        if self.start.is_some() {
            task.start_time = self.start;
        }
        if self.end.is_some() {
            task.end_time = self.end;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CalendarView {
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BankAction {
    Deposit,
    Withdraw,
    AdjustLifetime,
}

impl BankAction {
    pub fn with_amount(self, amount: i64) -> BankOperation {
        match self {
            BankAction::Deposit => BankOperation::Deposit(amount),
            BankAction::Withdraw => BankOperation::Withdraw(amount),
            BankAction::AdjustLifetime => BankOperation::AdjustLifetime(amount),
        }
    }
}

#[derive(Subcommand)]
pub enum GoalCommand {
    /// Set (or replace) the active goal
    Set {
        title: String,
        #[arg(long)]
        target: i64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "🎯")]
        emoji: String,
        /// Update this goal instead of creating a new one
        #[arg(long)]
        id: Option<i64>,
    },
    /// Remove the active goal
    Clear,
    /// Show progress towards the active goal
    Show,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Failed to serialize output: {0}")]
    SerializeError(#[from] serde_json::Error),
}

fn parse_optional_date(date: Option<String>) -> Result<Option<NaiveDate>, CliError> {
    date.map(|s| {
        parse_date(&s).map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", s, e)))
    })
    .transpose()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Handle the state command
pub fn handle_state(db: &Database) -> Result<(), CliError> {
    let state = db.load_state()?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// Handle the day command
pub fn handle_day(date: Option<String>, members: Vec<FamilyMember>, db: &Database) -> Result<(), CliError> {
    let day = parse_optional_date(date)?.unwrap_or_else(today);
    let members = if members.is_empty() { FamilyMember::ALL.to_vec() } else { members };
    let state = db.load_state()?;

    let mut heading = format!("{} {}", day.weekday(), day);
    if let Some(holiday) = holidays::holiday_for_date(day) {
        heading.push_str(&format!(" ({} / {})", holiday.name, holiday.name_en));
    }
    println!("{}", heading);

    let tasks = recurrence::tasks_for_day(&state.tasks, day, &members);
    if tasks.is_empty() {
        println!("  No tasks");
    }
    for task in tasks {
        let Some(id) = task.id else { continue };
        let done = ledger::is_completed_on_day_by_any(&state.completed_tasks, id, &members, day, &Local);
        let assignees: Vec<&str> = task.assigned_to.iter().map(|m| m.as_str()).collect();
        let time = match (&task.start_time, &task.end_time) {
            (Some(start), Some(end)) => format!(" {}-{}", start, end),
            (Some(start), None) => format!(" {}", start),
            _ => String::new(),
        };
        println!(
            "  [{}] #{}{} {} ({} pts) {}, {}",
            if done { "x" } else { " " },
            id,
            time,
            task.title,
            task.points,
            task.category.label(),
            assignees.join(", ")
        );
    }

    let points = ledger::points_for_day(&state.completed_tasks, &members, day, &Local);
    let count = ledger::completed_count_for_day(&state.completed_tasks, &members, day, &Local);
    println!("Points: {} ({} completed)", points, count);
    Ok(())
}

/// Handle the calendar command
pub fn handle_calendar(
    view: CalendarView,
    date: Option<String>,
    members: Vec<FamilyMember>,
    db: &Database,
) -> Result<(), CliError> {
    let anchor = parse_optional_date(date)?.unwrap_or_else(today);
    let members = if members.is_empty() { FamilyMember::ALL.to_vec() } else { members };
    let state = db.load_state()?;
    let summarize =
        |day: NaiveDate| ledger::summarize_day(&state.tasks, &state.completed_tasks, &members, day, &Local);

    let mut total = 0;
    match view {
        CalendarView::Week | CalendarView::Month => {
            let days = match view {
                CalendarView::Week => recurrence::week_days(anchor),
                _ => recurrence::month_days(anchor),
            };
            for day in days {
                let summary = summarize(day);
                total += summary.points;
                let holiday = holidays::holiday_for_date(day)
                    .map(|h| format!("  {}", h.name))
                    .unwrap_or_default();
                println!(
                    "{} {}  {}/{} done  {:>4} pts{}",
                    day.weekday(),
                    day,
                    summary.completed,
                    summary.due,
                    summary.points,
                    holiday
                );
            }
        }
        CalendarView::Year => {
            for month in 1..=12 {
                let Some(first) = NaiveDate::from_ymd_opt(anchor.year(), month, 1) else {
                    continue;
                };
                let rows: Vec<_> = recurrence::month_days(first).into_iter().map(&summarize).collect();
                let points: i64 = rows.iter().map(|r| r.points).sum();
                let completed: usize = rows.iter().map(|r| r.completed).sum();
                total += points;
                println!("{:<10} {:>4} done  {:>5} pts", first.format("%B"), completed, points);
            }
        }
    }
    println!("Total: {} pts", total);
    Ok(())
}

/// Handle the add-task command
#[allow(clippy::too_many_arguments)]
pub fn handle_add_task(
    title: String,
    category: TaskCategory,
    points: i64,
    assign: Vec<FamilyMember>,
    recurring: Recurrence,
    due: Option<String>,
    start: Option<String>,
    end: Option<String>,
    db: &Database,
) -> Result<(), CliError> {
    let mut task = Task::new(title, category, points, assign, recurring);
    task.due_date = parse_optional_date(due)?;
    task.start_time = start;
    task.end_time = end;

    let id = db.insert_task(&task)?;
    println!("Task created successfully (ID: {})", id);
    Ok(())
}

/// Handle the update-task command
pub fn handle_update_task(id: i64, changes: TaskChanges, db: &Database) -> Result<(), CliError> {
    let mut task = db.get_task(id)?;
    changes.apply_to(&mut task)?;
    db.update_task(&task)?;
    println!("Task {} updated", id);
    Ok(())
}

/// Handle the delete-task command
pub fn handle_delete_task(id: i64, db: &Database) -> Result<(), CliError> {
    db.delete_task(id)?;
    println!("Task {} deleted", id);
    Ok(())
}

/// Handle the complete command
pub fn handle_complete(task_id: i64, member: FamilyMember, db: &Database) -> Result<(), CliError> {
    let entry = db.complete_task(task_id, member, Utc::now(), &Local)?;
    println!(
        "{} {} earned {} points (completion ID: {})",
        member.emoji(),
        member.display_name(),
        entry.points_earned,
        entry.id.unwrap_or_default()
    );
    Ok(())
}

/// Handle the uncomplete command. Nothing to undo is not an error.
pub fn handle_uncomplete(task_id: i64, member: FamilyMember, date: Option<String>, db: &Database) -> Result<(), CliError> {
    let day = parse_optional_date(date)?.unwrap_or_else(today);
    match db.uncomplete_task(task_id, member, day, &Local)? {
        Some(entry) => println!(
            "Removed completion {} ({} points)",
            entry.id.unwrap_or_default(),
            entry.points_earned
        ),
        None => println!("Task {} was not completed by {} on {}", task_id, member.display_name(), day),
    }
    Ok(())
}

/// Handle the delete-completion command
pub fn handle_delete_completion(id: i64, db: &Database) -> Result<(), CliError> {
    let entry = db.delete_completion(id)?;
    println!("Removed completion {} ({} points)", id, entry.points_earned);
    Ok(())
}

/// Handle the add-rule command
pub fn handle_add_rule(description: String, points: i64, category: TaskCategory, db: &Database) -> Result<(), CliError> {
    let id = db.insert_point_rule(&PointRule::new(description, points, category))?;
    println!("Point rule created successfully (ID: {})", id);
    Ok(())
}

/// Handle the update-rule command
pub fn handle_update_rule(
    id: i64,
    description: String,
    points: i64,
    category: TaskCategory,
    db: &Database,
) -> Result<(), CliError> {
    let mut rule = PointRule::new(description, points, category);
    rule.id = Some(id);
    db.update_point_rule(&rule)?;
    println!("Point rule {} updated", id);
    Ok(())
}

/// Handle the delete-rule command
pub fn handle_delete_rule(id: i64, db: &Database) -> Result<(), CliError> {
    db.delete_point_rule(id)?;
    println!("Point rule {} deleted", id);
    Ok(())
}

fn build_reward(id: Option<i64>, title: String, cost: i64, description: String, emoji: String) -> Reward {
    Reward {
        id,
        description,
        emoji,
        ..Reward::new(title, cost)
    }
}

/// Handle the add-reward command
pub fn handle_add_reward(title: String, cost: i64, description: String, emoji: String, db: &Database) -> Result<(), CliError> {
    let id = db.insert_reward(&build_reward(None, title, cost, description, emoji))?;
    println!("Reward created successfully (ID: {})", id);
    Ok(())
}

/// Handle the update-reward command
pub fn handle_update_reward(
    id: i64,
    title: String,
    cost: i64,
    description: String,
    emoji: String,
    db: &Database,
) -> Result<(), CliError> {
    db.update_reward(&build_reward(Some(id), title, cost, description, emoji))?;
    println!("Reward {} updated", id);
    Ok(())
}

/// Handle the delete-reward command
pub fn handle_delete_reward(id: i64, db: &Database) -> Result<(), CliError> {
    db.delete_reward(id)?;
    println!("Reward {} deleted", id);
    Ok(())
}

/// Handle the redeem command
pub fn handle_redeem(reward_id: i64, member: FamilyMember, db: &Database) -> Result<(), CliError> {
    let reward = db.get_reward(reward_id)?;
    let record = db.redeem_reward(reward_id, member)?;
    println!(
        "{} Redeemed {} for {} points. Bank: {}",
        reward.emoji, reward.title, reward.points_cost, record.bank_points
    );
    Ok(())
}

/// Handle the bank command
pub fn handle_bank(action: BankAction, amount: i64, db: &Database) -> Result<(), CliError> {
    let op = action.with_amount(amount);
    let record = db.apply_bank_operation(op, &Local::now())?;
    println!("Bank: {} points, lifetime: {} points", record.bank_points, record.lifetime_points);
    Ok(())
}

/// Handle the goal subcommands
pub fn handle_goal(action: GoalCommand, db: &Database) -> Result<(), CliError> {
    match action {
        GoalCommand::Set {
            title,
            target,
            description,
            emoji,
            id,
        } => {
            let goal = BigGoal {
                id,
                description,
                emoji,
                ..BigGoal::new(title, target)
            };
            let id = db.set_active_goal(Some(&goal))?;
            println!("Big goal updated (ID: {})", id.unwrap_or_default());
        }
        GoalCommand::Clear => {
            db.set_active_goal(None)?;
            println!("Goal removed");
        }
        GoalCommand::Show => {
            let Some(goal) = db.get_active_goal()? else {
                println!("No active goal");
                return Ok(());
            };
            let record = db.get_bank_record()?;
            let summary = GoalProgress::new(goal, record.lifetime_points);
            println!(
                "{} {}: {} / {} lifetime points ({:.0}%)",
                summary.goal.emoji,
                summary.goal.title,
                summary.lifetime_points,
                summary.goal.target_points,
                summary.percent
            );
            if summary.reached {
                println!("🎉 Goal reached!");
            } else {
                println!("{} points to go", summary.remaining);
            }
        }
    }
    Ok(())
}

/// Handle the points command
pub fn handle_points(member: FamilyMember, period: Option<Period>, db: &Database) -> Result<(), CliError> {
    let entries = db.get_all_completions()?;
    let now = Local::now();
    let totals = PeriodTotals::for_member(&entries, member, &now);
    debug!(member = %member, ?totals, "computed point totals");

    let periods: Vec<Period> = match period {
        Some(period) => vec![period],
        None => Period::ALL.to_vec(),
    };
    println!("{} {}", member.emoji(), member.display_name());
    for period in periods {
        println!("  {:<6} {}", period.as_str(), totals.get(period));
    }

    if member.is_banking_member() {
        let record = db.get_bank_record()?;
        println!("  bank   {}", record.bank_points);
        println!("  lifetime {}", record.lifetime_points);
    }
    Ok(())
}

/// Handle the leaderboard command
pub fn handle_leaderboard(db: &Database) -> Result<(), CliError> {
    let entries = db.get_all_completions()?;
    let board = ledger::leaderboard(&entries, &Local::now());
    let medals = ["🥇", "🥈", "🥉"];
    for (rank, entry) in board.iter().enumerate() {
        println!(
            "{} {} {:<8} {:>5} pts  (week: {}, month: {})",
            medals.get(rank).copied().unwrap_or("⭐"),
            entry.member.emoji(),
            entry.member.display_name(),
            entry.totals.all,
            entry.totals.week,
            entry.totals.month
        );
    }
    Ok(())
}

/// Handle the holidays command
pub fn handle_holidays(year: Option<i32>) -> Result<(), CliError> {
    let year = year.unwrap_or_else(|| today().year());
    for holiday in holidays::holidays_for_year(year) {
        println!("{}  {} ({})", holiday.date, holiday.name, holiday.name_en);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_task_with_assignees() {
        let cli = Cli::try_parse_from([
            "famchart", "add-task", "Feed the cat", "--points", "3", "--assign", "son,mom", "--recurring", "weekly",
        ])
        .unwrap();
        match cli.command {
            Commands::AddTask {
                assign, recurring, points, category, ..
            } => {
                assert_eq!(assign, vec![FamilyMember::Son, FamilyMember::Mom]);
                assert_eq!(recurring, Recurrence::Weekly);
                assert_eq!(points, 3);
                assert_eq!(category, TaskCategory::Chores);
            }
            _ => panic!("expected add-task"),
        }
    }

    #[test]
    fn parses_negative_lifetime_adjustment() {
        let cli = Cli::try_parse_from(["famchart", "bank", "adjust-lifetime", "-5"]).unwrap();
        match cli.command {
            Commands::Bank { action, amount } => {
                assert_eq!(action.with_amount(amount), BankOperation::AdjustLifetime(-5));
            }
            _ => panic!("expected bank"),
        }
    }

    fn once_task_with_times(db: &Database) -> i64 {
        let mut task = Task::new(
            "Dentist".to_string(),
            TaskCategory::Dates,
            2,
            vec![FamilyMember::Mom, FamilyMember::Son],
            Recurrence::Once,
        );
        task.due_date = NaiveDate::from_ymd_opt(2024, 5, 20);
        task.start_time = Some("09:00".to_string());
        task.end_time = Some("10:00".to_string());
        db.insert_task(&task).unwrap()
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = once_task_with_times(&db);

        let changes = TaskChanges {
            points: Some(6),
            assign: Some(vec![FamilyMember::Dad]),
            ..TaskChanges::default()
        };
        handle_update_task(id, changes, &db).unwrap();

        let task = db.get_task(id).unwrap();
        assert_eq!(task.points, 6);
        assert_eq!(task.assigned_to, vec![FamilyMember::Dad]);
        assert_eq!(task.title, "Dentist");
        assert_eq!(task.category, TaskCategory::Dates);
        assert_eq!(task.recurring, Recurrence::Once);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 5, 20));
        assert_eq!(task.start_time.as_deref(), Some("09:00"));
    }

    #[test]
    fn update_can_clear_due_date_and_times() {
        let db = Database::open_in_memory().unwrap();
        let id = once_task_with_times(&db);

        let cli = Cli::try_parse_from([
            "famchart", "update-task", &id.to_string(), "--recurring", "daily", "--clear-due", "--clear-times",
        ])
        .unwrap();
        let Commands::UpdateTask { id, changes } = cli.command else {
            panic!("expected update-task");
        };
        handle_update_task(id, changes, &db).unwrap();

        let task = db.get_task(id).unwrap();
        assert_eq!(task.recurring, Recurrence::Daily);
        assert_eq!(task.due_date, None);
        assert_eq!(task.start_time, None);
        assert_eq!(task.end_time, None);
    }

    #[test]
    fn update_rejects_bad_date_and_missing_task() {
        let db = Database::open_in_memory().unwrap();
        let id = once_task_with_times(&db);

        let changes = TaskChanges {
            due: Some("20-05-2024".to_string()),
            ..TaskChanges::default()
        };
        assert!(matches!(
            handle_update_task(id, changes, &db),
            Err(CliError::DateParseError(_))
        ));
        assert!(matches!(
            handle_update_task(999, TaskChanges::default(), &db),
            Err(CliError::DatabaseError(DatabaseError::NotFound { .. }))
        ));
    }

    #[test]
    fn clear_flags_conflict_with_new_values() {
        let result = Cli::try_parse_from(["famchart", "update-task", "1", "--due", "2024-05-20", "--clear-due"]);
        assert!(result.is_err());
    }

    #[test]
    fn calendar_defaults_to_week() {
        let cli = Cli::try_parse_from(["famchart", "calendar"]).unwrap();
        assert!(matches!(cli.command, Commands::Calendar { view: CalendarView::Week, .. }));
    }

    #[test]
    fn rejects_unknown_member() {
        assert!(Cli::try_parse_from(["famchart", "complete", "1", "--member", "grandma"]).is_err());
    }
}
