//! Progress of the banking member towards the active big goal.

use serde::Serialize;

use crate::models::BigGoal;

/// Fraction of the target reached, capped at 1.0.
pub fn progress(goal: &BigGoal, lifetime_points: i64) -> f64 {
    if goal.target_points <= 0 {
        return 1.0;
    }
    let ratio = lifetime_points.max(0) as f64 / goal.target_points as f64;
    ratio.min(1.0)
}

/// Reaching the target never clears the goal; it stays active until it is
/// replaced or removed.
pub fn is_reached(goal: &BigGoal, lifetime_points: i64) -> bool {
    lifetime_points >= goal.target_points
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub goal: BigGoal,
    pub lifetime_points: i64,
    pub percent: f64,
    pub reached: bool,
    pub remaining: i64,
}

impl GoalProgress {
    pub fn new(goal: BigGoal, lifetime_points: i64) -> Self {
        let fraction = progress(&goal, lifetime_points);
        let reached = is_reached(&goal, lifetime_points);
        let remaining = (goal.target_points - lifetime_points).max(0);
        Self {
            goal,
            lifetime_points,
            percent: fraction * 100.0,
            reached,
            remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bike() -> BigGoal {
        BigGoal::new("New bike".to_string(), 100)
    }

    #[test]
    fn progress_is_a_capped_ratio() {
        let goal = bike();
        assert_eq!(progress(&goal, 0), 0.0);
        assert_eq!(progress(&goal, 25), 0.25);
        assert_eq!(progress(&goal, 100), 1.0);
        assert_eq!(progress(&goal, 250), 1.0);
    }

    #[test]
    fn reached_goal_reports_full_progress() {
        let summary = GoalProgress::new(bike(), 100);
        assert_eq!(summary.percent, 100.0);
        assert!(summary.reached);
        assert_eq!(summary.remaining, 0);
    }

    #[test]
    fn partial_progress_counts_remaining_points() {
        let summary = GoalProgress::new(bike(), 40);
        assert_eq!(summary.percent, 40.0);
        assert!(!summary.reached);
        assert_eq!(summary.remaining, 60);
    }
}
