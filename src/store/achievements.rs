//! Achievement table
//!
//! Each achievement is gated by a predicate over aggregate stats. Unlocking
//! is one way: ids are added to the unlocked list and never removed.

/// Aggregate figures the achievement predicates look at
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AchievementInputs {
    pub current_streak: u32,
    pub quizzes_taken: u32,
    pub total_documents: usize,
    pub completed_notebooks: usize,
    pub time_spent_minutes: u64,
    pub average_quiz_accuracy: f64,
    pub completed_tasks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Achievement {
    DailyLearner,
    FirstQuiz,
    Bookworm,
    WeekWarrior,
    QuizMaster,
    Scholar,
    SpeedLearner,
    QuizPerfectionist,
    TaskMaster,
}

impl Achievement {
    /// Every achievement, in evaluation order
    pub const ALL: [Achievement; 9] = [
        Self::DailyLearner,
        Self::FirstQuiz,
        Self::Bookworm,
        Self::WeekWarrior,
        Self::QuizMaster,
        Self::Scholar,
        Self::SpeedLearner,
        Self::QuizPerfectionist,
        Self::TaskMaster,
    ];

    /// Stable id stored in the unlocked list
    pub fn id(&self) -> &'static str {
        match self {
            Self::DailyLearner => "daily-learner",
            Self::FirstQuiz => "first-quiz",
            Self::Bookworm => "bookworm",
            Self::WeekWarrior => "week-warrior",
            Self::QuizMaster => "quiz-master",
            Self::Scholar => "scholar",
            Self::SpeedLearner => "speed-learner",
            Self::QuizPerfectionist => "quiz-perfectionist",
            Self::TaskMaster => "task-master",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::DailyLearner => "Daily Learner",
            Self::FirstQuiz => "First Quiz",
            Self::Bookworm => "Bookworm",
            Self::WeekWarrior => "Week Warrior",
            Self::QuizMaster => "Quiz Master",
            Self::Scholar => "Scholar",
            Self::SpeedLearner => "Speed Learner",
            Self::QuizPerfectionist => "Quiz Perfectionist",
            Self::TaskMaster => "Task Master",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DailyLearner => "Study at least one day",
            Self::FirstQuiz => "Complete your first quiz",
            Self::Bookworm => "Upload 10 documents",
            Self::WeekWarrior => "Keep a 7-day streak",
            Self::QuizMaster => "Complete 5 quizzes",
            Self::Scholar => "Complete 3 notebooks",
            Self::SpeedLearner => "Study for 50 hours",
            Self::QuizPerfectionist => "Reach 90% average quiz accuracy",
            Self::TaskMaster => "Complete 10 study tasks",
        }
    }

    /// Look an achievement up by its stored id
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.id() == id)
    }

    /// Whether the achievement's condition holds for these figures
    pub fn is_met(&self, inputs: &AchievementInputs) -> bool {
        match self {
            Self::DailyLearner => inputs.current_streak >= 1,
            Self::FirstQuiz => inputs.quizzes_taken >= 1,
            Self::Bookworm => inputs.total_documents >= 10,
            Self::WeekWarrior => inputs.current_streak >= 7,
            Self::QuizMaster => inputs.quizzes_taken >= 5,
            Self::Scholar => inputs.completed_notebooks >= 3,
            Self::SpeedLearner => inputs.time_spent_minutes >= 3000,
            Self::QuizPerfectionist => inputs.average_quiz_accuracy >= 0.9,
            Self::TaskMaster => inputs.completed_tasks >= 10,
        }
    }
}

/// Add every newly satisfied achievement to `unlocked`, returning the new ones
pub fn unlock_new(unlocked: &mut Vec<String>, inputs: &AchievementInputs) -> Vec<Achievement> {
    let mut fresh = Vec::new();
    for achievement in Achievement::ALL {
        if achievement.is_met(inputs) && !unlocked.iter().any(|id| id == achievement.id()) {
            unlocked.push(achievement.id().to_string());
            fresh.push(achievement);
        }
    }
    fresh
}
