//! Gamification stats: streaks, skill levels, monthly goals and study hours

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::model::Deadline;

/// Number of trailing days kept in `streak_days`
pub const STREAK_WINDOW_DAYS: i64 = 30;

/// Skill level seeded for a new subject
pub const INITIAL_SKILL_LEVEL: u8 = 5;

/// Skill gained when a notebook is completed
pub const NOTEBOOK_COMPLETION_BOOST: u32 = 20;

/// Maximum skill level
pub const MAX_SKILL_LEVEL: u8 = 100;

/// Weekday labels, Monday first
pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Proficiency in one subject (0-100)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLevel {
    pub skill: String,
    pub level: u8,
}

/// What drives a monthly goal's progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    /// +1 per submitted quiz
    QuizCount,
    /// + hours per logged study session
    StudyHours,
    /// +1 per completed notebook; target follows the notebook count
    NotebookCompletion,
    /// Only changed by explicit edits
    #[default]
    Freeform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyGoal {
    pub goal: String,
    pub current: f64,
    pub target: f64,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub kind: GoalKind,
}

impl MonthlyGoal {
    pub fn new(goal: impl Into<String>, target: f64, kind: GoalKind) -> Self {
        Self { goal: goal.into(), current: 0.0, target, editable: true, kind }
    }

    /// Completion ratio in [0, 1]
    pub fn ratio(&self) -> f64 {
        if self.target <= 0.0 { 0.0 } else { (self.current / self.target).clamp(0.0, 1.0) }
    }
}

/// Outcome of one streak update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Already active today
    Unchanged,
    /// Active yesterday, streak grew by one
    Extended,
    /// First activity or a gap of two days or more
    Reset,
}

/// Aggregate gamification state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub last_active_date: Option<NaiveDate>,
    /// Hours studied per weekday, Monday first
    pub weekly_hours: [f64; 7],
    /// Active dates within the trailing streak window
    pub streak_days: BTreeSet<NaiveDate>,
    pub skill_levels: Vec<SkillLevel>,
    pub monthly_goals: Vec<MonthlyGoal>,
    pub completed_notebooks: Vec<String>,
    pub custom_deadlines: Vec<Deadline>,
    pub unlocked_achievements: Vec<String>,
    pub total_quizzes_completed: u32,
    pub total_quiz_score: u64,
    pub total_quiz_questions: u64,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
            weekly_hours: [0.0; 7],
            streak_days: BTreeSet::new(),
            skill_levels: Vec::new(),
            monthly_goals: vec![
                MonthlyGoal::new("Complete 20 quizzes", 20.0, GoalKind::QuizCount),
                MonthlyGoal::new("Study 40 hours", 40.0, GoalKind::StudyHours),
                MonthlyGoal::new("Review all notebooks", 1.0, GoalKind::NotebookCompletion),
            ],
            completed_notebooks: Vec::new(),
            custom_deadlines: Vec::new(),
            unlocked_achievements: Vec::new(),
            total_quizzes_completed: 0,
            total_quiz_score: 0,
            total_quiz_questions: 0,
        }
    }
}

impl UserStats {
    /// Record activity on `today` and update the streak counters
    pub fn record_activity(&mut self, today: NaiveDate) -> StreakChange {
        let yesterday = today - Duration::days(1);

        let change = match self.last_active_date {
            Some(last) if last == today => StreakChange::Unchanged,
            Some(last) if last == yesterday => {
                self.current_streak += 1;
                StreakChange::Extended
            }
            _ => {
                self.current_streak = 1;
                StreakChange::Reset
            }
        };

        self.streak_days.insert(today);
        let cutoff = today - Duration::days(STREAK_WINDOW_DAYS);
        self.streak_days.retain(|d| *d >= cutoff);

        self.last_active_date = Some(today);
        self.longest_streak = self.longest_streak.max(self.current_streak);
        change
    }

    /// Seed a skill entry if the subject has none
    pub fn ensure_skill(&mut self, skill: &str) {
        if !skill.is_empty() && self.skill_level(skill).is_none() {
            self.skill_levels
                .push(SkillLevel { skill: skill.to_string(), level: INITIAL_SKILL_LEVEL });
        }
    }

    pub fn skill_level(&self, skill: &str) -> Option<u8> {
        self.skill_levels.iter().find(|s| s.skill == skill).map(|s| s.level)
    }

    /// Raise an existing skill, capped at 100. Unknown skills are left alone.
    pub fn boost_skill(&mut self, skill: &str, amount: u32) {
        if let Some(entry) = self.skill_levels.iter_mut().find(|s| s.skill == skill) {
            entry.level = clamp_skill(i64::from(entry.level) + i64::from(amount));
        }
    }

    /// Overwrite an existing skill level, clamped to [0, 100]
    pub fn set_skill(&mut self, skill: &str, level: i64) {
        if let Some(entry) = self.skill_levels.iter_mut().find(|s| s.skill == skill) {
            entry.level = clamp_skill(level);
        }
    }

    /// Add progress to every goal of this kind
    pub fn bump_goals(&mut self, kind: GoalKind, amount: f64) {
        for goal in self.monthly_goals.iter_mut().filter(|g| g.kind == kind) {
            goal.current += amount;
        }
    }

    /// Set the target of every goal of this kind
    pub fn retarget_goals(&mut self, kind: GoalKind, target: f64) {
        for goal in self.monthly_goals.iter_mut().filter(|g| g.kind == kind) {
            goal.target = target;
        }
    }

    /// Add hours to the weekday bucket of `date`
    pub fn log_hours(&mut self, date: NaiveDate, hours: f64) {
        let idx = date.weekday().num_days_from_monday() as usize;
        self.weekly_hours[idx] += hours;
    }

    /// Fold a quiz submission into the lifetime totals, returning the new accuracy
    pub fn record_quiz(&mut self, correct: u32, total: u32) -> f64 {
        self.total_quizzes_completed += 1;
        self.total_quiz_score += u64::from(correct);
        self.total_quiz_questions += u64::from(total);
        self.quiz_accuracy()
    }

    /// Lifetime quiz accuracy in [0, 1]
    pub fn quiz_accuracy(&self) -> f64 {
        if self.total_quiz_questions == 0 {
            0.0
        } else {
            (self.total_quiz_score as f64 / self.total_quiz_questions as f64).clamp(0.0, 1.0)
        }
    }
}

/// Skill gained from a quiz: `round(correct / total * 10)`
pub fn quiz_skill_boost(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let ratio = (f64::from(correct) / f64::from(total)).clamp(0.0, 1.0);
    (ratio * 10.0).round() as u32
}

/// Clamp a raw skill value into [0, 100]
pub fn clamp_skill(level: i64) -> u8 {
    level.clamp(0, i64::from(MAX_SKILL_LEVEL)) as u8
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_activity_starts_streak() {
        let mut stats = UserStats::default();
        assert_eq!(stats.record_activity(day(2024, 5, 1)), StreakChange::Reset);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 1);
        assert_eq!(stats.last_active_date, Some(day(2024, 5, 1)));
    }

    #[test]
    fn same_day_is_idempotent() {
        let mut stats = UserStats::default();
        let today = day(2024, 5, 1);
        stats.record_activity(today);
        let after_first = stats.clone();

        assert_eq!(stats.record_activity(today), StreakChange::Unchanged);
        assert_eq!(stats.record_activity(today), StreakChange::Unchanged);
        assert_eq!(stats, after_first);
        assert_eq!(stats.streak_days.iter().filter(|d| **d == today).count(), 1);
    }

    #[test]
    fn consecutive_day_extends() {
        let mut stats = UserStats {
            current_streak: 4,
            longest_streak: 4,
            last_active_date: Some(day(2024, 5, 1)),
            ..Default::default()
        };
        assert_eq!(stats.record_activity(day(2024, 5, 2)), StreakChange::Extended);
        assert_eq!(stats.current_streak, 5);
        assert_eq!(stats.longest_streak, 5);
    }

    #[test]
    fn extension_keeps_larger_longest() {
        let mut stats = UserStats {
            current_streak: 2,
            longest_streak: 9,
            last_active_date: Some(day(2024, 5, 1)),
            ..Default::default()
        };
        stats.record_activity(day(2024, 5, 2));
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.longest_streak, 9);
    }

    #[test]
    fn gap_resets_streak() {
        let mut stats = UserStats {
            current_streak: 6,
            longest_streak: 6,
            last_active_date: Some(day(2024, 5, 1)),
            ..Default::default()
        };
        assert_eq!(stats.record_activity(day(2024, 5, 3)), StreakChange::Reset);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 6);
    }

    #[test]
    fn streak_days_pruned_to_window() {
        let mut stats = UserStats::default();
        stats.streak_days.insert(day(2024, 3, 1));
        stats.streak_days.insert(day(2024, 4, 20));
        stats.record_activity(day(2024, 5, 1));

        let days: Vec<_> = stats.streak_days.iter().copied().collect();
        assert_eq!(days, vec![day(2024, 4, 20), day(2024, 5, 1)]);
    }

    #[test]
    fn ensure_skill_seeds_once() {
        let mut stats = UserStats::default();
        stats.ensure_skill("CS");
        stats.boost_skill("CS", 10);
        stats.ensure_skill("CS");
        stats.ensure_skill("");
        assert_eq!(stats.skill_levels, vec![SkillLevel { skill: "CS".into(), level: 15 }]);
    }

    #[test]
    fn boost_ignores_unknown_skill() {
        let mut stats = UserStats::default();
        stats.boost_skill("Art", 20);
        assert!(stats.skill_levels.is_empty());
    }

    #[test]
    fn quiz_boost_rounds() {
        assert_eq!(quiz_skill_boost(7, 10), 7);
        assert_eq!(quiz_skill_boost(5, 5), 10);
        assert_eq!(quiz_skill_boost(1, 3), 3);
        assert_eq!(quiz_skill_boost(1, 4), 3);
        assert_eq!(quiz_skill_boost(0, 0), 0);
    }

    #[test]
    fn goals_follow_their_kind() {
        let mut stats = UserStats::default();
        stats.monthly_goals.push(MonthlyGoal::new("Read papers", 4.0, GoalKind::Freeform));

        stats.bump_goals(GoalKind::QuizCount, 1.0);
        stats.bump_goals(GoalKind::StudyHours, 1.5);
        stats.retarget_goals(GoalKind::NotebookCompletion, 3.0);

        let currents: Vec<f64> = stats.monthly_goals.iter().map(|g| g.current).collect();
        assert_eq!(currents, vec![1.0, 1.5, 0.0, 0.0]);
        assert_eq!(stats.monthly_goals[2].target, 3.0);
        assert_eq!(stats.monthly_goals[3].target, 4.0);
    }

    #[test]
    fn hours_land_in_weekday_bucket() {
        let mut stats = UserStats::default();
        // 2024-05-01 was a Wednesday
        stats.log_hours(day(2024, 5, 1), 2.0);
        stats.log_hours(day(2024, 5, 6), 0.5);
        assert_eq!(stats.weekly_hours, [0.5, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn quiz_totals_accumulate() {
        let mut stats = UserStats::default();
        assert_eq!(stats.record_quiz(3, 4), 0.75);
        let accuracy = stats.record_quiz(5, 6);
        assert_eq!(stats.total_quiz_score, 8);
        assert_eq!(stats.total_quiz_questions, 10);
        assert_eq!(accuracy, 0.8);
    }

    #[test]
    fn legacy_goal_without_kind_is_freeform() {
        let json = r#"{"goal":"Write essay","current":1,"target":2}"#;
        let goal: MonthlyGoal = serde_json::from_str(json).unwrap();
        assert_eq!(goal.kind, GoalKind::Freeform);
        assert_eq!(goal.ratio(), 0.5);
    }

    proptest! {
        #[test]
        fn skill_stays_in_range(start in 0u8..=100, boosts in proptest::collection::vec(0u32..200, 0..10), set in any::<i64>()) {
            let mut stats = UserStats::default();
            stats.skill_levels.push(SkillLevel { skill: "Math".into(), level: start });
            for amount in boosts {
                stats.boost_skill("Math", amount);
                prop_assert!(stats.skill_level("Math").unwrap() <= MAX_SKILL_LEVEL);
            }
            stats.set_skill("Math", set);
            prop_assert!(stats.skill_level("Math").unwrap() <= MAX_SKILL_LEVEL);
        }

        #[test]
        fn streak_days_stay_deduplicated_and_bounded(offsets in proptest::collection::vec(0i64..90, 1..40)) {
            let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let mut days: Vec<_> = offsets.into_iter().map(|o| base + Duration::days(o)).collect();
            days.sort();
            let mut stats = UserStats::default();
            for d in &days {
                stats.record_activity(*d);
            }
            let last = *days.last().unwrap();
            prop_assert!(stats.streak_days.iter().all(|d| *d >= last - Duration::days(STREAK_WINDOW_DAYS)));
            prop_assert!(stats.longest_streak >= stats.current_streak);
        }
    }
}
