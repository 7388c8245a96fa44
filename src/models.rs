use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::utils::parse_time_of_day;

/// Fixed key of the single bank record row.
pub const BANK_RECORD_ID: i64 = 1;

/// Longest title accepted for tasks, rewards and goals.
pub const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} must be less than {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: i64 },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },
    #[error("Task must be assigned to at least one family member")]
    NoAssignees,
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyMember {
    Mom,
    Dad,
    Son,
}

impl FamilyMember {
    pub const ALL: [FamilyMember; 3] = [FamilyMember::Mom, FamilyMember::Dad, FamilyMember::Son];

    /// The member whose completions feed the bank and the big goal.
    pub const BANKING: FamilyMember = FamilyMember::Son;

    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyMember::Mom => "mom",
            FamilyMember::Dad => "dad",
            FamilyMember::Son => "son",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FamilyMember::Mom => "Mom",
            FamilyMember::Dad => "Dad",
            FamilyMember::Son => "Vincent",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            FamilyMember::Mom => "👩",
            FamilyMember::Dad => "👨‍🦰",
            FamilyMember::Son => "🧒",
        }
    }

    pub fn is_banking_member(&self) -> bool {
        *self == Self::BANKING
    }
}

impl fmt::Display for FamilyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FamilyMember {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mom" => Ok(FamilyMember::Mom),
            "dad" => Ok(FamilyMember::Dad),
            // The banking member is known by name in the UI
            "son" | "vincent" => Ok(FamilyMember::Son),
            other => Err(ValidationError::UnknownValue {
                kind: "family member",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Chores,
    Homework,
    Educational,
    Dates,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Chores => "chores",
            TaskCategory::Homework => "homework",
            TaskCategory::Educational => "educational",
            TaskCategory::Dates => "dates",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskCategory::Chores => "Chores",
            TaskCategory::Homework => "Homework",
            TaskCategory::Educational => "Learning",
            TaskCategory::Dates => "Events",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chores" => Ok(TaskCategory::Chores),
            "homework" => Ok(TaskCategory::Homework),
            "educational" => Ok(TaskCategory::Educational),
            "dates" => Ok(TaskCategory::Dates),
            other => Err(ValidationError::UnknownValue {
                kind: "category",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Once,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Once => "once",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "once" => Ok(Recurrence::Once),
            other => Err(ValidationError::UnknownValue {
                kind: "recurrence",
                value: other.to_string(),
            }),
        }
    }
}

/// Aggregation window for point totals, always ending at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Period {
    pub const ALL: [Period; 5] = [Period::Day, Period::Week, Period::Month, Period::Year, Period::All];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::All => "all",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "today" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            "all" => Ok(Period::All),
            other => Err(ValidationError::UnknownValue {
                kind: "period",
                value: other.to_string(),
            }),
        }
    }
}

fn validate_title(field: &'static str, title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong { field, max: MAX_TITLE_LEN });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Option<i64>,
    pub title: String,
    pub category: TaskCategory,
    pub points: i64,
    pub assigned_to: Vec<FamilyMember>,
    pub recurring: Recurrence,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<String>, // HH:MM, display only
    #[serde(default)]
    pub end_time: Option<String>,
}

impl Task {
    pub fn new(
        title: String,
        category: TaskCategory,
        points: i64,
        assigned_to: Vec<FamilyMember>,
        recurring: Recurrence,
    ) -> Self {
        Self {
            id: None,
            title,
            category,
            points,
            assigned_to,
            recurring,
            due_date: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title("Title", &self.title)?;
        if self.points < 0 {
            return Err(ValidationError::Negative { field: "Points", value: self.points });
        }
        if self.assigned_to.is_empty() {
            return Err(ValidationError::NoAssignees);
        }
        for time in [&self.start_time, &self.end_time].into_iter().flatten() {
            parse_time_of_day(time).map_err(|_| ValidationError::InvalidTime(time.clone()))?;
        }
        Ok(())
    }

    /// Assignees in a stable order with duplicates removed.
    pub fn assignees(&self) -> Vec<FamilyMember> {
        let mut members = self.assigned_to.clone();
        members.sort();
        members.dedup();
        members
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub id: Option<i64>,
    pub task_id: i64,
    pub completed_by: FamilyMember,
    pub completed_at: DateTime<Utc>,
    pub points_earned: i64,
}

impl CompletedTask {
    pub fn new(task_id: i64, completed_by: FamilyMember, points_earned: i64, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            task_id,
            completed_by,
            completed_at,
            points_earned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRule {
    pub id: Option<i64>,
    pub description: String,
    pub points: i64,
    pub category: TaskCategory,
}

impl PointRule {
    pub fn new(description: String, points: i64, category: TaskCategory) -> Self {
        Self {
            id: None,
            description,
            points,
            category,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingField("Description"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub points_cost: i64,
    #[serde(default = "default_reward_emoji")]
    pub emoji: String,
}

fn default_reward_emoji() -> String {
    "🎁".to_string()
}

impl Reward {
    pub fn new(title: String, points_cost: i64) -> Self {
        Self {
            id: None,
            title,
            description: String::new(),
            points_cost,
            emoji: default_reward_emoji(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title("Title", &self.title)?;
        if self.points_cost <= 0 {
            return Err(ValidationError::NotPositive { field: "Point cost", value: self.points_cost });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigGoal {
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target_points: i64,
    #[serde(default = "default_goal_emoji")]
    pub emoji: String,
    #[serde(default)]
    pub is_active: bool,
}

fn default_goal_emoji() -> String {
    "🎯".to_string()
}

impl BigGoal {
    pub fn new(title: String, target_points: i64) -> Self {
        Self {
            id: None,
            title,
            description: String::new(),
            target_points,
            emoji: default_goal_emoji(),
            is_active: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title("Goal title", &self.title)?;
        if self.target_points <= 0 {
            return Err(ValidationError::NotPositive { field: "Target points", value: self.target_points });
        }
        Ok(())
    }
}

/// Persistent balances of the banking member. Mutated only through the
/// transitions in [`crate::banking`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankRecord {
    pub bank_points: i64,
    pub lifetime_points: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VincentData {
    pub bank_points: i64,
    pub lifetime_points: i64,
    pub big_goal: Option<BigGoal>,
}

impl VincentData {
    pub fn new(record: BankRecord, big_goal: Option<BigGoal>) -> Self {
        Self {
            bank_points: record.bank_points,
            lifetime_points: record.lifetime_points,
            big_goal,
        }
    }
}

/// Everything a client needs to render, fetched in one read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub tasks: Vec<Task>,
    pub completed_tasks: Vec<CompletedTask>,
    pub point_rules: Vec<PointRule>,
    pub rewards: Vec<Reward>,
    pub vincent_data: VincentData,
}
