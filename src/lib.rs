pub mod banking;
pub mod cli;
pub mod config;
pub mod database;
pub mod goals;
pub mod holidays;
pub mod ledger;
pub mod models;
pub mod recurrence;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use models::{BigGoal, CompletedTask, FamilyMember, PointRule, Reward, StateSnapshot, Task};
pub use utils::Profile;
