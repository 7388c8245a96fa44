use std::env;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use famchart::cli::{self, Cli, Commands};
use famchart::{Config, Database, Profile};
use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env("FAMCHART_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("famchart={},warn", config.log_level)));

    let format = env::var("FAMCHART_LOG_FORMAT").unwrap_or_else(|_| config.log_format.clone());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
        }
    }
}

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // --dev keeps a separate config and database
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = match &cli.config {
        Some(path) => Config::load_from_path(&PathBuf::from(path))?,
        None => Config::load_with_profile(profile)?,
    };
    init_tracing(&config);

    let db_path = config.get_database_path(profile);
    let db_path = db_path
        .to_str()
        .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?;
    let db = match Database::connect_with_retry(db_path, config.connect_retries, config.connect_retry_delay()) {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, path = db_path, "could not open database");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::State => cli::handle_state(&db)?,
        Commands::Day { date, members } => cli::handle_day(date, members, &db)?,
        Commands::Calendar { view, date, members } => cli::handle_calendar(view, date, members, &db)?,
        Commands::AddTask {
            title,
            category,
            points,
            assign,
            recurring,
            due,
            start,
            end,
        } => cli::handle_add_task(title, category, points, assign, recurring, due, start, end, &db)?,
        Commands::UpdateTask { id, changes } => cli::handle_update_task(id, changes, &db)?,
        Commands::DeleteTask { id } => cli::handle_delete_task(id, &db)?,
        Commands::Complete { task_id, member } => cli::handle_complete(task_id, member, &db)?,
        Commands::Uncomplete { task_id, member, date } => cli::handle_uncomplete(task_id, member, date, &db)?,
        Commands::DeleteCompletion { id } => cli::handle_delete_completion(id, &db)?,
        Commands::AddRule {
            description,
            points,
            category,
        } => cli::handle_add_rule(description, points, category, &db)?,
        Commands::UpdateRule {
            id,
            description,
            points,
            category,
        } => cli::handle_update_rule(id, description, points, category, &db)?,
        Commands::DeleteRule { id } => cli::handle_delete_rule(id, &db)?,
        Commands::AddReward {
            title,
            cost,
            description,
            emoji,
        } => cli::handle_add_reward(title, cost, description, emoji, &db)?,
        Commands::UpdateReward {
            id,
            title,
            cost,
            description,
            emoji,
        } => cli::handle_update_reward(id, title, cost, description, emoji, &db)?,
        Commands::DeleteReward { id } => cli::handle_delete_reward(id, &db)?,
        Commands::Redeem { reward_id, member } => cli::handle_redeem(reward_id, member, &db)?,
        Commands::Bank { action, amount } => cli::handle_bank(action, amount, &db)?,
        Commands::Goal { action } => cli::handle_goal(action, &db)?,
        Commands::Points { member, period } => cli::handle_points(member, period, &db)?,
        Commands::Leaderboard => cli::handle_leaderboard(&db)?,
        Commands::Holidays { year } => cli::handle_holidays(year)?,
    }

    Ok(())
}
