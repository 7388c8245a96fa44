use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::banking::{BankOperation, BankingError};
use crate::ledger;
use crate::models::{
    BANK_RECORD_ID, BankRecord, BigGoal, CompletedTask, FamilyMember, Period, PointRule, Recurrence,
    Reward, StateSnapshot, Task, TaskCategory, ValidationError, VincentData,
};
use crate::utils::day_in;

/// Busy timeout applied to every connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Could not open database after {attempts} attempts: {source}")]
    ConnectFailed {
        attempts: u32,
        source: Box<DatabaseError>,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Cannot update {0} without an id")]
    MissingId(&'static str),
    #[error("Task {task_id} was already completed by {member} on {day}")]
    AlreadyCompleted {
        task_id: i64,
        member: FamilyMember,
        day: NaiveDate,
    },
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Banking(#[from] BankingError),
}

macro_rules! sql_text_enum {
    ($($ty:ty),*) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ValidationError| FromSqlError::Other(Box::new(e)))
            }
        }
    )*};
}

sql_text_enum!(FamilyMember, TaskCategory, Recurrence);

const TASK_COLUMNS: &str = "id, title, category, points, recurring, due_date, start_time, end_time";
const COMPLETION_COLUMNS: &str = "id, task_id, completed_by, completed_at, points_earned";
const GOAL_COLUMNS: &str = "id, title, description, target_points, emoji, is_active";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database, mostly useful for tests
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

        let db = Database { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Open the database, retrying a bounded number of times with a fixed
    /// delay. Gives up with [`DatabaseError::ConnectFailed`].
    pub fn connect_with_retry(path: &str, attempts: u32, delay: Duration) -> Result<Self, DatabaseError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::new(path) {
                Ok(db) => {
                    info!(path, attempt, "database ready");
                    return Ok(db);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        error = %e,
                        attempts_left = attempts - attempt,
                        "database not ready, retrying in {}s",
                        delay.as_secs_f32()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(DatabaseError::ConnectFailed {
                        attempts,
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                category        TEXT NOT NULL,
                points          INTEGER NOT NULL DEFAULT 0,
                recurring       TEXT NOT NULL,
                due_date        TEXT,
                start_time      TEXT,
                end_time        TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS task_assignments (
                task_id         INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                member_id       TEXT NOT NULL,
                PRIMARY KEY (task_id, member_id)
            )",
            [],
        )?;

        // No foreign key to tasks: history outlives the task it was earned on
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS completed_tasks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id         INTEGER NOT NULL,
                completed_by    TEXT NOT NULL,
                completed_at    TEXT NOT NULL,
                points_earned   INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS point_rules (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                description     TEXT NOT NULL,
                points          INTEGER NOT NULL,
                category        TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS rewards (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                points_cost     INTEGER NOT NULL,
                emoji           TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS bank_record (
                id              INTEGER PRIMARY KEY CHECK (id = 1),
                bank_points     INTEGER NOT NULL DEFAULT 0 CHECK (bank_points >= 0),
                lifetime_points INTEGER NOT NULL DEFAULT 0 CHECK (lifetime_points >= 0)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS big_goals (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                target_points   INTEGER NOT NULL,
                emoji           TEXT NOT NULL DEFAULT '',
                is_active       INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Create indexes
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_completed_tasks_member ON completed_tasks(completed_by, completed_at)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_completed_tasks_task ON completed_tasks(task_id)",
            [],
        )?;

        // At most one active goal
        self.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_big_goals_single_active ON big_goals(is_active) WHERE is_active = 1",
            [],
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO bank_record (id, bank_points, lifetime_points) VALUES (?1, 0, 0)",
            rusqlite::params![BANK_RECORD_ID],
        )?;

        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read the whole household state in one go
    pub fn load_state(&self) -> Result<StateSnapshot, DatabaseError> {
        let record = self.get_bank_record()?;
        let big_goal = self.get_active_goal()?;
        Ok(StateSnapshot {
            tasks: self.get_all_tasks()?,
            completed_tasks: self.get_all_completions()?,
            point_rules: self.get_all_point_rules()?,
            rewards: self.get_all_rewards()?,
            vincent_data: VincentData::new(record, big_goal),
        })
    }

    // --- Tasks ---

    /// Helper function to map a row to a Task (without assignments)
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        Ok(Task {
            id: Some(row.get(0)?),
            title: row.get(1)?,
            category: row.get(2)?,
            points: row.get(3)?,
            assigned_to: Vec::new(),
            recurring: row.get(4)?,
            due_date: row.get(5)?,
            start_time: row.get(6)?,
            end_time: row.get(7)?,
        })
    }

    fn insert_assignments(conn: &Connection, task_id: i64, task: &Task) -> Result<(), rusqlite::Error> {
        let mut stmt = conn.prepare("INSERT INTO task_assignments (task_id, member_id) VALUES (?1, ?2)")?;
        for member in task.assignees() {
            stmt.execute(rusqlite::params![task_id, member])?;
        }
        Ok(())
    }

    /// Insert a task with its assignments and return its ID
    pub fn insert_task(&self, task: &Task) -> Result<i64, DatabaseError> {
        task.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO tasks (title, category, points, recurring, due_date, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                task.title.trim(),
                task.category,
                task.points,
                task.recurring,
                task.due_date,
                task.start_time,
                task.end_time
            ],
        )?;
        let id = tx.last_insert_rowid();
        Self::insert_assignments(&tx, id, task)?;
        tx.commit()?;

        debug!(task_id = id, title = %task.title, "task created");
        Ok(id)
    }

    /// Get all tasks with resolved assignments, ordered by ID
    pub fn get_all_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id ASC"))?;
        let mut tasks = stmt
            .query_map([], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT task_id, member_id FROM task_assignments")?;
        let mut assignments: HashMap<i64, Vec<FamilyMember>> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, FamilyMember>(1)?)))?;
        for row in rows {
            let (task_id, member) = row?;
            assignments.entry(task_id).or_default().push(member);
        }

        for task in &mut tasks {
            if let Some(mut members) = task.id.and_then(|id| assignments.remove(&id)) {
                members.sort();
                task.assigned_to = members;
            }
        }
        Ok(tasks)
    }

    /// Get a single task by ID
    pub fn get_task(&self, id: i64) -> Result<Task, DatabaseError> {
        let mut task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_task,
            )
            .optional()?
            .ok_or(DatabaseError::NotFound { entity: "Task", id })?;

        let mut stmt = self
            .conn
            .prepare("SELECT member_id FROM task_assignments WHERE task_id = ?1")?;
        task.assigned_to = stmt
            .query_map(rusqlite::params![id], |row| row.get(0))?
            .collect::<Result<Vec<FamilyMember>, _>>()?;
        task.assigned_to.sort();
        Ok(task)
    }

    /// Update an existing task, replacing its assignment set
    pub fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let id = task.id.ok_or(DatabaseError::MissingId("task"))?;
        task.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET title = ?1, category = ?2, points = ?3, recurring = ?4,
             due_date = ?5, start_time = ?6, end_time = ?7 WHERE id = ?8",
            rusqlite::params![
                task.title.trim(),
                task.category,
                task.points,
                task.recurring,
                task.due_date,
                task.start_time,
                task.end_time,
                id
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "Task", id });
        }
        tx.execute("DELETE FROM task_assignments WHERE task_id = ?1", rusqlite::params![id])?;
        Self::insert_assignments(&tx, id, task)?;
        tx.commit()?;

        debug!(task_id = id, "task updated");
        Ok(())
    }

    /// Delete a task by ID. Completion history is kept.
    pub fn delete_task(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM task_assignments WHERE task_id = ?1", rusqlite::params![id])?;
        let changed = tx.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "Task", id });
        }
        tx.commit()?;

        debug!(task_id = id, "task deleted");
        Ok(())
    }

    // --- Completions ---

    fn row_to_completion(row: &rusqlite::Row) -> Result<CompletedTask, rusqlite::Error> {
        Ok(CompletedTask {
            id: Some(row.get(0)?),
            task_id: row.get(1)?,
            completed_by: row.get(2)?,
            completed_at: row.get(3)?,
            points_earned: row.get(4)?,
        })
    }

    /// Get every completion entry, oldest first
    pub fn get_all_completions(&self) -> Result<Vec<CompletedTask>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLETION_COLUMNS} FROM completed_tasks ORDER BY completed_at ASC, id ASC"
        ))?;
        let entries = stmt
            .query_map([], Self::row_to_completion)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get a single completion entry by ID
    pub fn get_completion(&self, id: i64) -> Result<CompletedTask, DatabaseError> {
        Self::find_completion(&self.conn, id)?.ok_or(DatabaseError::NotFound { entity: "Completion", id })
    }

    fn find_completion(conn: &Connection, id: i64) -> Result<Option<CompletedTask>, rusqlite::Error> {
        conn.query_row(
            &format!("SELECT {COMPLETION_COLUMNS} FROM completed_tasks WHERE id = ?1"),
            rusqlite::params![id],
            Self::row_to_completion,
        )
        .optional()
    }

    fn completions_for_member(conn: &Connection, member: FamilyMember) -> Result<Vec<CompletedTask>, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMPLETION_COLUMNS} FROM completed_tasks WHERE completed_by = ?1 ORDER BY completed_at ASC, id ASC"
        ))?;
        let entries = stmt
            .query_map(rusqlite::params![member], Self::row_to_completion)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Append a completion entry and credit the bank when the banking member
    /// completed it. A second entry for the same task, member and local day is
    /// rejected.
    pub fn record_completion<Tz: TimeZone>(&self, entry: &CompletedTask, tz: &Tz) -> Result<i64, DatabaseError> {
        if entry.points_earned < 0 {
            return Err(ValidationError::Negative { field: "Points", value: entry.points_earned }.into());
        }

        let tx = self.conn.unchecked_transaction()?;
        let task_exists = tx
            .query_row("SELECT 1 FROM tasks WHERE id = ?1", rusqlite::params![entry.task_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !task_exists {
            return Err(DatabaseError::NotFound { entity: "Task", id: entry.task_id });
        }

        let day = day_in(&entry.completed_at, tz);
        let history = Self::completions_for_member(&tx, entry.completed_by)?;
        if ledger::is_completed_on_day(&history, entry.task_id, entry.completed_by, day, tz) {
            return Err(DatabaseError::AlreadyCompleted {
                task_id: entry.task_id,
                member: entry.completed_by,
                day,
            });
        }

        tx.execute(
            "INSERT INTO completed_tasks (task_id, completed_by, completed_at, points_earned)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![entry.task_id, entry.completed_by, entry.completed_at, entry.points_earned],
        )?;
        let id = tx.last_insert_rowid();

        if entry.completed_by.is_banking_member() {
            let mut record = Self::load_bank_record(&tx)?;
            record.credit_completion(entry.points_earned);
            Self::store_bank_record(&tx, &record)?;
        }
        tx.commit()?;

        info!(
            completion_id = id,
            task_id = entry.task_id,
            member = %entry.completed_by,
            points = entry.points_earned,
            "task completed"
        );
        Ok(id)
    }

    /// Complete a task now, capturing its current point value
    pub fn complete_task<Tz: TimeZone>(
        &self,
        task_id: i64,
        member: FamilyMember,
        at: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<CompletedTask, DatabaseError> {
        let task = self.get_task(task_id)?;
        let mut entry = CompletedTask::new(task_id, member, task.points, at);
        entry.id = Some(self.record_completion(&entry, tz)?);
        Ok(entry)
    }

    /// Delete a completion entry and reverse its bank credit
    pub fn delete_completion(&self, id: i64) -> Result<CompletedTask, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let entry = Self::find_completion(&tx, id)?.ok_or(DatabaseError::NotFound { entity: "Completion", id })?;

        tx.execute("DELETE FROM completed_tasks WHERE id = ?1", rusqlite::params![id])?;
        if entry.completed_by.is_banking_member() {
            let mut record = Self::load_bank_record(&tx)?;
            record.reverse_completion(entry.points_earned);
            Self::store_bank_record(&tx, &record)?;
        }
        tx.commit()?;

        info!(
            completion_id = id,
            task_id = entry.task_id,
            member = %entry.completed_by,
            points = entry.points_earned,
            "completion removed"
        );
        Ok(entry)
    }

    /// Undo a member's completion of a task on the given local day. Returns
    /// `None` when there was nothing to undo.
    pub fn uncomplete_task<Tz: TimeZone>(
        &self,
        task_id: i64,
        member: FamilyMember,
        day: NaiveDate,
        tz: &Tz,
    ) -> Result<Option<CompletedTask>, DatabaseError> {
        let history = Self::completions_for_member(&self.conn, member)?;
        let Some(id) = ledger::find_completion_on_day(&history, task_id, member, day, tz).and_then(|e| e.id) else {
            debug!(task_id, member = %member, %day, "nothing to uncomplete");
            return Ok(None);
        };
        self.delete_completion(id).map(Some)
    }

    // --- Point rules ---

    fn row_to_point_rule(row: &rusqlite::Row) -> Result<PointRule, rusqlite::Error> {
        Ok(PointRule {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            points: row.get(2)?,
            category: row.get(3)?,
        })
    }

    /// Insert a point rule and return its ID
    pub fn insert_point_rule(&self, rule: &PointRule) -> Result<i64, DatabaseError> {
        rule.validate()?;
        self.conn.execute(
            "INSERT INTO point_rules (description, points, category) VALUES (?1, ?2, ?3)",
            rusqlite::params![rule.description.trim(), rule.points, rule.category],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get all point rules ordered by ID
    pub fn get_all_point_rules(&self) -> Result<Vec<PointRule>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, description, points, category FROM point_rules ORDER BY id ASC")?;
        let rules = stmt
            .query_map([], Self::row_to_point_rule)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Update an existing point rule
    pub fn update_point_rule(&self, rule: &PointRule) -> Result<(), DatabaseError> {
        let id = rule.id.ok_or(DatabaseError::MissingId("point rule"))?;
        rule.validate()?;
        let changed = self.conn.execute(
            "UPDATE point_rules SET description = ?1, points = ?2, category = ?3 WHERE id = ?4",
            rusqlite::params![rule.description.trim(), rule.points, rule.category, id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "Point rule", id });
        }
        Ok(())
    }

    /// Delete a point rule by ID
    pub fn delete_point_rule(&self, id: i64) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM point_rules WHERE id = ?1", rusqlite::params![id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "Point rule", id });
        }
        Ok(())
    }

    // --- Rewards ---

    fn row_to_reward(row: &rusqlite::Row) -> Result<Reward, rusqlite::Error> {
        Ok(Reward {
            id: Some(row.get(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            points_cost: row.get(3)?,
            emoji: row.get(4)?,
        })
    }

    /// Insert a reward and return its ID
    pub fn insert_reward(&self, reward: &Reward) -> Result<i64, DatabaseError> {
        reward.validate()?;
        self.conn.execute(
            "INSERT INTO rewards (title, description, points_cost, emoji) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![reward.title.trim(), reward.description, reward.points_cost, reward.emoji],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get all rewards ordered by cost, cheapest first
    pub fn get_all_rewards(&self) -> Result<Vec<Reward>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, points_cost, emoji FROM rewards ORDER BY points_cost ASC, id ASC",
        )?;
        let rewards = stmt
            .query_map([], Self::row_to_reward)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rewards)
    }

    /// Get a single reward by ID
    pub fn get_reward(&self, id: i64) -> Result<Reward, DatabaseError> {
        Self::find_reward(&self.conn, id)?.ok_or(DatabaseError::NotFound { entity: "Reward", id })
    }

    fn find_reward(conn: &Connection, id: i64) -> Result<Option<Reward>, rusqlite::Error> {
        conn.query_row(
            "SELECT id, title, description, points_cost, emoji FROM rewards WHERE id = ?1",
            rusqlite::params![id],
            Self::row_to_reward,
        )
        .optional()
    }

    /// Update an existing reward
    pub fn update_reward(&self, reward: &Reward) -> Result<(), DatabaseError> {
        let id = reward.id.ok_or(DatabaseError::MissingId("reward"))?;
        reward.validate()?;
        let changed = self.conn.execute(
            "UPDATE rewards SET title = ?1, description = ?2, points_cost = ?3, emoji = ?4 WHERE id = ?5",
            rusqlite::params![reward.title.trim(), reward.description, reward.points_cost, reward.emoji, id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "Reward", id });
        }
        Ok(())
    }

    /// Delete a reward by ID
    pub fn delete_reward(&self, id: i64) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM rewards WHERE id = ?1", rusqlite::params![id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "Reward", id });
        }
        Ok(())
    }

    // --- Bank ---

    fn load_bank_record(conn: &Connection) -> Result<BankRecord, rusqlite::Error> {
        conn.query_row(
            "SELECT bank_points, lifetime_points FROM bank_record WHERE id = ?1",
            rusqlite::params![BANK_RECORD_ID],
            |row| {
                Ok(BankRecord {
                    bank_points: row.get(0)?,
                    lifetime_points: row.get(1)?,
                })
            },
        )
    }

    fn store_bank_record(conn: &Connection, record: &BankRecord) -> Result<(), rusqlite::Error> {
        conn.execute(
            "UPDATE bank_record SET bank_points = ?1, lifetime_points = ?2 WHERE id = ?3",
            rusqlite::params![record.bank_points, record.lifetime_points, BANK_RECORD_ID],
        )?;
        Ok(())
    }

    /// Current balances of the banking member
    pub fn get_bank_record(&self) -> Result<BankRecord, DatabaseError> {
        Ok(Self::load_bank_record(&self.conn)?)
    }

    /// Apply a manual bank transaction and return the new balances.
    /// Deposits are limited to the banking member's all-time earned points
    /// as of `now`.
    pub fn apply_bank_operation<Tz: TimeZone>(
        &self,
        op: BankOperation,
        now: &DateTime<Tz>,
    ) -> Result<BankRecord, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut record = Self::load_bank_record(&tx)?;
        let earned = match op {
            BankOperation::Deposit(_) => {
                let history = Self::completions_for_member(&tx, FamilyMember::BANKING)?;
                ledger::points_for_member(&history, FamilyMember::BANKING, Period::All, now)
            }
            _ => 0,
        };
        record.apply(op, earned)?;
        Self::store_bank_record(&tx, &record)?;
        tx.commit()?;

        info!(?op, bank = record.bank_points, lifetime = record.lifetime_points, "bank transaction applied");
        Ok(record)
    }

    /// Redeem a reward from the bank and return the new balances
    pub fn redeem_reward(&self, reward_id: i64, member: FamilyMember) -> Result<BankRecord, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let reward = Self::find_reward(&tx, reward_id)?.ok_or(DatabaseError::NotFound {
            entity: "Reward",
            id: reward_id,
        })?;
        let mut record = Self::load_bank_record(&tx)?;
        record.redeem(member, reward.points_cost)?;
        Self::store_bank_record(&tx, &record)?;
        tx.commit()?;

        info!(reward_id, title = %reward.title, cost = reward.points_cost, "reward redeemed");
        Ok(record)
    }

    // --- Goals ---

    fn row_to_goal(row: &rusqlite::Row) -> Result<BigGoal, rusqlite::Error> {
        Ok(BigGoal {
            id: Some(row.get(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            target_points: row.get(3)?,
            emoji: row.get(4)?,
            is_active: row.get::<_, i64>(5)? != 0,
        })
    }

    /// The single active goal, if any
    pub fn get_active_goal(&self) -> Result<Option<BigGoal>, DatabaseError> {
        let goal = self
            .conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM big_goals WHERE is_active = 1 LIMIT 1"),
                [],
                Self::row_to_goal,
            )
            .optional()?;
        Ok(goal)
    }

    /// Every goal ever set, active or not, ordered by ID
    pub fn get_all_goals(&self) -> Result<Vec<BigGoal>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {GOAL_COLUMNS} FROM big_goals ORDER BY id ASC"))?;
        let goals = stmt
            .query_map([], Self::row_to_goal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    /// Replace the active goal. `None` only deactivates. A goal with an ID is
    /// updated in place and reactivated. Returns the ID of the active goal.
    pub fn set_active_goal(&self, goal: Option<&BigGoal>) -> Result<Option<i64>, DatabaseError> {
        if let Some(goal) = goal {
            goal.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE big_goals SET is_active = 0 WHERE is_active = 1", [])?;

        let active_id = match goal {
            None => None,
            Some(goal) => {
                tx.execute(
                    "INSERT INTO big_goals (id, title, description, target_points, emoji, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1)
                     ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        description = excluded.description,
                        target_points = excluded.target_points,
                        emoji = excluded.emoji,
                        is_active = 1",
                    rusqlite::params![goal.id, goal.title.trim(), goal.description, goal.target_points, goal.emoji],
                )?;
                Some(goal.id.unwrap_or_else(|| tx.last_insert_rowid()))
            }
        };
        tx.commit()?;

        info!(?active_id, "big goal updated");
        Ok(active_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("famchart.db");
        (dir, path)
    }

    #[test]
    fn new_creates_parent_directory_and_seeds_bank() {
        let (_dir, path) = temp_db_path();
        let db = Database::new(path.to_str().unwrap()).expect("open db");
        assert!(path.exists());
        assert_eq!(db.get_bank_record().unwrap(), BankRecord::default());

        let foreign_keys: i64 = db
            .conn()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn reopening_keeps_data() {
        let (_dir, path) = temp_db_path();
        let path = path.to_str().unwrap().to_string();
        {
            let db = Database::new(&path).unwrap();
            db.insert_reward(&Reward::new("Movie night".to_string(), 30)).unwrap();
        }
        let db = Database::new(&path).unwrap();
        assert_eq!(db.get_all_rewards().unwrap().len(), 1);
        assert_eq!(db.get_bank_record().unwrap(), BankRecord::default());
    }

    #[test]
    fn connect_with_retry_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let path = blocker.join("famchart.db");

        let err = Database::connect_with_retry(path.to_str().unwrap(), 2, Duration::ZERO)
            .err()
            .expect("opening below a file must fail");
        assert!(matches!(err, DatabaseError::ConnectFailed { attempts: 2, .. }));
    }

    #[test]
    fn bank_record_rejects_negative_balances_at_rest() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn().execute("UPDATE bank_record SET bank_points = -1 WHERE id = 1", []);
        assert!(result.is_err());
    }

    #[test]
    fn enums_round_trip_through_sql_text() {
        let db = Database::open_in_memory().unwrap();
        let mut task = Task::new(
            "Read a book".to_string(),
            TaskCategory::Educational,
            4,
            vec![FamilyMember::Son, FamilyMember::Dad],
            Recurrence::Weekly,
        );
        let id = db.insert_task(&task).unwrap();
        task.id = Some(id);
        task.assigned_to = task.assignees();

        assert_eq!(db.get_task(id).unwrap(), task);
        let stored: String = db
            .conn()
            .query_row("SELECT category FROM tasks WHERE id = ?1", [id], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "educational");
    }
}
