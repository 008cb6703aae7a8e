//! Store snapshot and its persisted subset
//!
//! Collections sit behind `Arc`s so a new snapshot shares every collection
//! an action did not touch. Consumers compare collections with
//! `Arc::ptr_eq` to see what changed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::achievements::{self, Achievement, AchievementInputs};
use super::model::{
    ChatMessage, CustomPlan, Document, Notebook, Quiz, QuizAnswer, StudyMetrics, StudyTask, User,
    clamp_ratio,
};
use super::stats::{StreakChange, UserStats};

/// Page/snippet highlighted in the document viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub page: Option<u32>,
    pub snippet: Option<String>,
}

/// One immutable snapshot of the application state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,

    pub notebooks: Arc<Vec<Notebook>>,
    /// Documents per notebook id, in upload order
    pub documents: Arc<BTreeMap<String, Vec<Document>>>,
    /// Chat transcript per notebook id
    pub chat_history: Arc<BTreeMap<String, Vec<ChatMessage>>>,
    pub quizzes: Arc<Vec<Quiz>>,
    pub study_tasks: Arc<Vec<StudyTask>>,
    pub study_metrics: Arc<StudyMetrics>,
    pub custom_plans: Arc<Vec<CustomPlan>>,
    pub user_stats: Arc<UserStats>,

    // Transient, never persisted
    pub current_notebook_id: Option<String>,
    pub current_quiz_id: Option<String>,
    pub quiz_answers: Arc<Vec<QuizAnswer>>,
    pub selected_document_id: Option<String>,
    pub highlight: Option<Highlight>,
    pub is_ai_loading: bool,
    pub study_session_start: Option<DateTime<Utc>>,
}

/// The whitelisted subset written to storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub notebooks: Vec<Notebook>,
    pub documents: BTreeMap<String, Vec<Document>>,
    pub chat_history: BTreeMap<String, Vec<ChatMessage>>,
    pub quizzes: Vec<Quiz>,
    pub study_tasks: Vec<StudyTask>,
    pub study_metrics: StudyMetrics,
    pub custom_plans: Vec<CustomPlan>,
    pub user_stats: UserStats,
}

impl From<PersistedState> for AppState {
    fn from(p: PersistedState) -> Self {
        Self {
            user: p.user,
            token: p.token,
            is_authenticated: p.is_authenticated,
            notebooks: Arc::new(p.notebooks),
            documents: Arc::new(p.documents),
            chat_history: Arc::new(p.chat_history),
            quizzes: Arc::new(p.quizzes),
            study_tasks: Arc::new(p.study_tasks),
            study_metrics: Arc::new(p.study_metrics),
            custom_plans: Arc::new(p.custom_plans),
            user_stats: Arc::new(p.user_stats),
            ..Default::default()
        }
    }
}

impl AppState {
    /// Copy out the persisted subset
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            user: self.user.clone(),
            token: self.token.clone(),
            is_authenticated: self.is_authenticated,
            notebooks: self.notebooks.to_vec(),
            documents: (*self.documents).clone(),
            chat_history: (*self.chat_history).clone(),
            quizzes: self.quizzes.to_vec(),
            study_tasks: self.study_tasks.to_vec(),
            study_metrics: (*self.study_metrics).clone(),
            custom_plans: self.custom_plans.to_vec(),
            user_stats: (*self.user_stats).clone(),
        }
    }

    pub fn find_notebook(&self, notebook_id: &str) -> Option<&Notebook> {
        self.notebooks.iter().find(|nb| nb.id == notebook_id)
    }

    pub fn find_quiz(&self, quiz_id: &str) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id == quiz_id)
    }

    pub fn current_notebook(&self) -> Option<&Notebook> {
        self.current_notebook_id.as_deref().and_then(|id| self.find_notebook(id))
    }

    pub fn current_quiz(&self) -> Option<&Quiz> {
        self.current_quiz_id.as_deref().and_then(|id| self.find_quiz(id))
    }

    pub fn notebook_documents(&self, notebook_id: &str) -> &[Document] {
        self.documents.get(notebook_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn notebook_chat(&self, notebook_id: &str) -> &[ChatMessage] {
        self.chat_history.get(notebook_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn notebook_tasks(&self, notebook_id: &str) -> Vec<&StudyTask> {
        self.study_tasks.iter().filter(|t| t.notebook_id == notebook_id).collect()
    }

    pub fn notebook_quizzes(&self, notebook_id: &str) -> Vec<&Quiz> {
        self.quizzes.iter().filter(|q| q.notebook_id == notebook_id).collect()
    }

    pub fn quiz_answer(&self, question_id: &str) -> Option<&QuizAnswer> {
        self.quiz_answers.iter().find(|a| a.question_id == question_id)
    }

    /// Documents across all notebooks
    pub fn total_documents(&self) -> usize {
        self.documents.values().map(|docs| docs.len()).sum()
    }

    pub fn completed_task_count(&self) -> usize {
        self.study_tasks.iter().filter(|t| t.completed).count()
    }

    /// Open tasks due on or before `until`, soonest first
    pub fn upcoming_tasks(&self, until: NaiveDate) -> Vec<&StudyTask> {
        let mut tasks: Vec<_> =
            self.study_tasks.iter().filter(|t| !t.completed && t.due_date <= until).collect();
        tasks.sort_by_key(|t| t.due_date);
        tasks
    }

    pub fn skill_level(&self, skill: &str) -> Option<u8> {
        self.user_stats.skill_level(skill)
    }

    pub(crate) fn achievement_inputs(&self) -> AchievementInputs {
        AchievementInputs {
            current_streak: self.user_stats.current_streak,
            quizzes_taken: self.study_metrics.quizzes_taken,
            total_documents: self.total_documents(),
            completed_notebooks: self.user_stats.completed_notebooks.len(),
            time_spent_minutes: self.study_metrics.time_spent_minutes,
            average_quiz_accuracy: self.study_metrics.average_quiz_accuracy,
            completed_tasks: self.completed_task_count(),
        }
    }

    /// Unlock newly satisfied achievements. Stats are only copied when
    /// something new unlocks.
    pub(crate) fn unlock_achievements(&mut self) -> Vec<Achievement> {
        let inputs = self.achievement_inputs();
        let pending = Achievement::ALL.iter().any(|a| {
            a.is_met(&inputs) && !self.user_stats.unlocked_achievements.iter().any(|id| id == a.id())
        });
        if !pending {
            return Vec::new();
        }
        let stats = Arc::make_mut(&mut self.user_stats);
        achievements::unlock_new(&mut stats.unlocked_achievements, &inputs)
    }

    /// Streak update followed by an achievement check
    pub(crate) fn record_activity(&mut self, today: NaiveDate) -> StreakChange {
        let change = Arc::make_mut(&mut self.user_stats).record_activity(today);
        self.unlock_achievements();
        change
    }

    /// Completed notebooks that still exist over all notebooks
    pub(crate) fn recompute_coverage(&mut self) {
        let total = self.notebooks.len();
        let completed = self
            .user_stats
            .completed_notebooks
            .iter()
            .filter(|id| self.notebooks.iter().any(|nb| &nb.id == *id))
            .count();
        let coverage = if total == 0 { 0.0 } else { clamp_ratio(completed as f64 / total as f64) };
        if self.study_metrics.overall_coverage != coverage {
            Arc::make_mut(&mut self.study_metrics).overall_coverage = coverage;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::model::{DocumentStatus, FileType};

    fn doc(id: &str) -> Document {
        Document {
            id: id.into(),
            name: format!("{id}.pdf"),
            file_type: FileType::Pdf,
            pages: 3,
            status: DocumentStatus::Indexed,
            content: None,
            url: None,
        }
    }

    #[test]
    fn persisted_round_trip_drops_transient_fields() {
        let mut state = AppState::default();
        state.is_authenticated = true;
        state.current_notebook_id = Some("nb1".into());
        state.is_ai_loading = true;
        Arc::make_mut(&mut state.documents).insert("nb1".into(), vec![doc("d1")]);

        let json = serde_json::to_string(&state.persisted()).unwrap();
        assert!(!json.contains("current_notebook_id"));
        assert!(!json.contains("is_ai_loading"));

        let restored: AppState = serde_json::from_str::<PersistedState>(&json).unwrap().into();
        assert!(restored.is_authenticated);
        assert_eq!(restored.current_notebook_id, None);
        assert!(!restored.is_ai_loading);
        assert_eq!(restored.total_documents(), 1);
    }

    #[test]
    fn empty_json_loads_defaults() {
        let state: PersistedState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, PersistedState::default());
        assert_eq!(state.user_stats.monthly_goals.len(), 3);
    }

    #[test]
    fn unchanged_achievements_keep_stats_shared() {
        let mut state = AppState::default();
        let before = Arc::clone(&state.user_stats);
        assert!(state.unlock_achievements().is_empty());
        assert!(Arc::ptr_eq(&before, &state.user_stats));
    }

    #[test]
    fn coverage_ignores_deleted_notebooks() {
        let mut state = AppState::default();
        let nb = |id: &str| Notebook {
            id: id.into(),
            title: id.into(),
            subject: "CS".into(),
            progress: 0.0,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            exam_date: None,
        };
        state.notebooks = Arc::new(vec![nb("a"), nb("b")]);
        Arc::make_mut(&mut state.user_stats).completed_notebooks = vec!["a".into(), "gone".into()];
        state.recompute_coverage();
        assert_eq!(state.study_metrics.overall_coverage, 0.5);
    }
}
