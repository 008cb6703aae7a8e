//! Application state store
//!
//! [`Store`] is the only mutation surface for notebooks, documents, chat,
//! quizzes, tasks and gamification stats. Every action is a synchronous
//! transition from one [`AppState`] snapshot to the next; derived metrics
//! are recomputed inside the same action, and the persisted subset is
//! flushed to the configured [`StateSink`] before the action returns.
//!
//! The store never fails for well-formed input. Actions naming unknown ids
//! are no-ops.

pub mod achievements;
pub mod clock;
pub mod model;
pub mod state;
pub mod stats;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};

pub use achievements::Achievement;
pub use clock::{Clock, ManualClock, SystemClock};
pub use model::*;
pub use state::{AppState, Highlight, PersistedState};
pub use stats::{GoalKind, MonthlyGoal, SkillLevel, StreakChange, UserStats};
pub use storage::{JsonFileSink, MemorySink, StateSink};

use stats::{NOTEBOOK_COMPLETION_BOOST, quiz_skill_boost};

/// Days until the default study task of a new notebook is due
const DEFAULT_TASK_DAYS: i64 = 7;

/// Mints `<prefix><millis>` ids that stay unique within a session even when
/// several are requested in the same millisecond
#[derive(Debug, Default)]
struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    fn next(&mut self, prefix: &str, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis().max(self.last + 1);
        self.last = millis;
        format!("{}{}", prefix, millis)
    }
}

/// The application state store
pub struct Store {
    state: Arc<AppState>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    sink: Option<Box<dyn StateSink>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("state", &self.state).finish_non_exhaustive()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Store {
    /// Empty store without persistence
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { state: Arc::new(AppState::default()), clock, ids: IdGenerator::default(), sink: None }
    }

    /// Rehydrate from a sink; later mutations flush back to it
    pub fn open(sink: Box<dyn StateSink>, clock: Arc<dyn Clock>) -> Result<Self> {
        let state = sink.load()?.map(AppState::from).unwrap_or_default();
        tracing::debug!(notebooks = state.notebooks.len(), "Store rehydrated");
        Ok(Self { state: Arc::new(state), clock, ids: IdGenerator::default(), sink: Some(sink) })
    }

    /// Current snapshot
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Shared handle to the current snapshot. Earlier handles stay valid and
    /// unchanged after later actions.
    pub fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Fresh collision-free id such as `msg1718000000000`
    pub fn next_id(&mut self, prefix: &str) -> String {
        let now = self.clock.now();
        self.ids.next(prefix, now)
    }

    /// Produce the next snapshot from a copy of the current one, then flush
    fn apply<R>(&mut self, action: &'static str, f: impl FnOnce(&mut AppState) -> R) -> R {
        let mut next = AppState::clone(&self.state);
        let out = f(&mut next);
        self.state = Arc::new(next);
        tracing::debug!(action, "State updated");
        self.flush();
        out
    }

    fn flush(&self) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.flush(&self.state.persisted()) {
                tracing::warn!("Failed to persist state: {:#}", e);
            }
        }
    }

    // ── Auth ────────────────────────────────────────────────────────────

    /// Sign in. Any non-empty email and password pair is accepted; there is
    /// no credential check.
    pub fn login(&mut self, email: &str, password: &str) -> bool {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return false;
        }
        let user = match &self.state.user {
            Some(user) if user.email == email => user.clone(),
            _ => User {
                id: self.next_id("user"),
                name: display_name_from_email(email),
                email: email.to_string(),
                avatar_url: None,
            },
        };
        let token = self.next_id("session-");
        let today = self.today();
        let now = self.now();

        self.apply("login", |state| {
            state.user = Some(user);
            state.token = Some(token);
            state.is_authenticated = true;
            state.study_session_start = Some(now);
            state.record_activity(today);
        });
        tracing::info!(email, "Signed in");
        true
    }

    /// Sign out, folding the open study session into the stats first.
    /// Returns the minutes logged for the session.
    pub fn logout(&mut self) -> u64 {
        let minutes = self.end_study_session();
        self.apply("logout", |state| {
            state.user = None;
            state.token = None;
            state.is_authenticated = false;
            state.current_notebook_id = None;
        });
        tracing::info!(minutes, "Signed out");
        minutes
    }

    pub fn update_user(&mut self, patch: UserPatch) {
        self.apply("update_user", |state| {
            if let Some(user) = state.user.as_mut() {
                if let Some(name) = patch.name {
                    user.name = name;
                }
                if let Some(email) = patch.email {
                    user.email = email;
                }
                if let Some(avatar_url) = patch.avatar_url {
                    user.avatar_url = avatar_url;
                }
            }
        });
    }

    // ── Notebooks ───────────────────────────────────────────────────────

    pub fn set_current_notebook(&mut self, notebook_id: Option<&str>) {
        let id = notebook_id.map(str::to_string);
        self.apply("set_current_notebook", |state| state.current_notebook_id = id);
    }

    /// Create a notebook along with its default reading task
    pub fn create_notebook(
        &mut self,
        title: &str,
        subject: &str,
        exam_date: Option<NaiveDate>,
    ) -> Notebook {
        let notebook = Notebook {
            id: self.next_id("nb"),
            title: title.to_string(),
            subject: subject.to_string(),
            progress: 0.0,
            last_updated: self.now(),
            exam_date,
        };
        let today = self.today();
        let task = StudyTask {
            id: self.next_id("task"),
            title: format!("Study: {}", title),
            notebook_id: notebook.id.clone(),
            task_type: TaskType::Read,
            due_date: exam_date.unwrap_or(today + Duration::days(DEFAULT_TASK_DAYS)),
            completed: false,
            priority: Some(Priority::Medium),
        };

        let created = notebook.clone();
        self.apply("create_notebook", |state| {
            Arc::make_mut(&mut state.notebooks).push(notebook);
            let count = state.notebooks.len() as f64;
            Arc::make_mut(&mut state.documents).insert(created.id.clone(), Vec::new());
            Arc::make_mut(&mut state.chat_history).insert(created.id.clone(), Vec::new());
            Arc::make_mut(&mut state.study_tasks).push(task);

            let stats = Arc::make_mut(&mut state.user_stats);
            stats.ensure_skill(subject);
            stats.retarget_goals(GoalKind::NotebookCompletion, count);

            state.recompute_coverage();
            state.record_activity(today);
        });
        tracing::info!(id = %created.id, title, "Notebook created");
        created
    }

    /// Delete a notebook with its documents, chat and tasks. Quizzes that
    /// point at it are kept.
    pub fn delete_notebook(&mut self, notebook_id: &str) {
        self.apply("delete_notebook", |state| {
            if state.find_notebook(notebook_id).is_none() {
                return;
            }
            Arc::make_mut(&mut state.notebooks).retain(|nb| nb.id != notebook_id);
            Arc::make_mut(&mut state.documents).remove(notebook_id);
            Arc::make_mut(&mut state.chat_history).remove(notebook_id);
            Arc::make_mut(&mut state.study_tasks).retain(|t| t.notebook_id != notebook_id);
            if state.current_notebook_id.as_deref() == Some(notebook_id) {
                state.current_notebook_id = None;
            }
            let count = state.notebooks.len() as f64;
            Arc::make_mut(&mut state.user_stats)
                .retarget_goals(GoalKind::NotebookCompletion, count.max(1.0));
            state.recompute_coverage();
        });
    }

    /// Mark a notebook complete. Completing twice has no further effect.
    pub fn complete_notebook(&mut self, notebook_id: &str) {
        let Some(notebook) = self.state.find_notebook(notebook_id).cloned() else {
            return;
        };
        if self.state.user_stats.completed_notebooks.iter().any(|id| id == notebook_id) {
            return;
        }
        let today = self.today();
        let now = self.now();

        self.apply("complete_notebook", |state| {
            for nb in Arc::make_mut(&mut state.notebooks).iter_mut() {
                if nb.id == notebook_id {
                    nb.progress = 1.0;
                    nb.last_updated = now;
                }
            }
            for task in Arc::make_mut(&mut state.study_tasks).iter_mut() {
                if task.notebook_id == notebook_id {
                    task.completed = true;
                }
            }

            let stats = Arc::make_mut(&mut state.user_stats);
            stats.completed_notebooks.push(notebook_id.to_string());
            stats.boost_skill(&notebook.subject, NOTEBOOK_COMPLETION_BOOST);
            stats.bump_goals(GoalKind::NotebookCompletion, 1.0);

            state.recompute_coverage();
            state.record_activity(today);
        });
        tracing::info!(id = notebook_id, "Notebook completed");
    }

    /// Set a notebook's progress, clamped to [0, 1]
    pub fn update_notebook_progress(&mut self, notebook_id: &str, progress: f64) {
        let now = self.now();
        self.apply("update_notebook_progress", |state| {
            if state.find_notebook(notebook_id).is_none() {
                return;
            }
            for nb in Arc::make_mut(&mut state.notebooks).iter_mut() {
                if nb.id == notebook_id {
                    nb.progress = clamp_ratio(progress);
                    nb.last_updated = now;
                }
            }
        });
    }

    // ── Documents ───────────────────────────────────────────────────────

    pub fn add_document(&mut self, notebook_id: &str, document: Document) {
        let today = self.today();
        self.apply("add_document", |state| {
            Arc::make_mut(&mut state.documents)
                .entry(notebook_id.to_string())
                .or_default()
                .push(document);
            state.record_activity(today);
        });
    }

    pub fn update_document(&mut self, notebook_id: &str, document_id: &str, patch: DocumentPatch) {
        self.apply("update_document", |state| {
            let exists = state.notebook_documents(notebook_id).iter().any(|d| d.id == document_id);
            if !exists {
                return;
            }
            if let Some(docs) = Arc::make_mut(&mut state.documents).get_mut(notebook_id) {
                if let Some(doc) = docs.iter_mut().find(|d| d.id == document_id) {
                    doc.apply(patch);
                }
            }
        });
    }

    pub fn delete_document(&mut self, notebook_id: &str, document_id: &str) {
        self.apply("delete_document", |state| {
            let exists = state.notebook_documents(notebook_id).iter().any(|d| d.id == document_id);
            if !exists {
                return;
            }
            if let Some(docs) = Arc::make_mut(&mut state.documents).get_mut(notebook_id) {
                docs.retain(|d| d.id != document_id);
            }
            if state.selected_document_id.as_deref() == Some(document_id) {
                state.selected_document_id = None;
            }
        });
    }

    pub fn set_selected_document(&mut self, document_id: Option<&str>) {
        let id = document_id.map(str::to_string);
        self.apply("set_selected_document", |state| state.selected_document_id = id);
    }

    pub fn set_highlight(&mut self, page: Option<u32>, snippet: Option<String>) {
        self.apply("set_highlight", |state| {
            state.highlight = match (page, snippet) {
                (None, None) => None,
                (page, snippet) => Some(Highlight { page, snippet }),
            };
        });
    }

    // ── Chat ────────────────────────────────────────────────────────────

    /// Append a message to a notebook's transcript
    pub fn add_chat_message(&mut self, notebook_id: &str, message: ChatMessage) {
        let today = self.today();
        self.apply("add_chat_message", |state| {
            Arc::make_mut(&mut state.chat_history)
                .entry(notebook_id.to_string())
                .or_default()
                .push(message);
            state.record_activity(today);
        });
    }

    pub fn set_ai_loading(&mut self, loading: bool) {
        self.apply("set_ai_loading", |state| state.is_ai_loading = loading);
    }

    // ── Quizzes ─────────────────────────────────────────────────────────

    pub fn create_quiz(&mut self, quiz: Quiz) {
        let today = self.today();
        self.apply("create_quiz", |state| {
            Arc::make_mut(&mut state.quizzes).push(quiz);
            state.record_activity(today);
        });
    }

    /// Select the active quiz (or none) and start a fresh answer set
    pub fn set_current_quiz(&mut self, quiz_id: Option<&str>) {
        let id = quiz_id.map(str::to_string);
        self.apply("set_current_quiz", |state| {
            state.current_quiz_id = id;
            state.quiz_answers = Arc::new(Vec::new());
        });
    }

    /// Record an answer, replacing any earlier answer to the same question
    pub fn set_quiz_answer(&mut self, answer: QuizAnswer) {
        self.apply("set_quiz_answer", |state| {
            let answers = Arc::make_mut(&mut state.quiz_answers);
            match answers.iter_mut().find(|a| a.question_id == answer.question_id) {
                Some(existing) => *existing = answer,
                None => answers.push(answer),
            }
        });
    }

    pub fn clear_quiz_answers(&mut self) {
        self.apply("clear_quiz_answers", |state| state.quiz_answers = Arc::new(Vec::new()));
    }

    /// Fold a graded attempt of the current quiz into the stats
    pub fn submit_quiz(&mut self, correct: u32, total: u32) {
        let subject = self
            .state
            .current_quiz()
            .and_then(|quiz| self.state.find_notebook(&quiz.notebook_id))
            .map(|nb| nb.subject.clone())
            .filter(|s| !s.is_empty());
        let today = self.today();

        self.apply("submit_quiz", |state| {
            let stats = Arc::make_mut(&mut state.user_stats);
            let accuracy = stats.record_quiz(correct, total);
            if let Some(subject) = &subject {
                stats.boost_skill(subject, quiz_skill_boost(correct, total));
            }
            stats.bump_goals(GoalKind::QuizCount, 1.0);

            let metrics = Arc::make_mut(&mut state.study_metrics);
            metrics.quizzes_taken += 1;
            metrics.average_quiz_accuracy = accuracy;

            state.record_activity(today);
        });
        tracing::info!(correct, total, "Quiz submitted");
    }

    // ── Tasks ───────────────────────────────────────────────────────────

    pub fn toggle_task_complete(&mut self, task_id: &str) {
        let today = self.today();
        self.apply("toggle_task_complete", |state| {
            if !state.study_tasks.iter().any(|t| t.id == task_id) {
                return;
            }
            for task in Arc::make_mut(&mut state.study_tasks).iter_mut() {
                if task.id == task_id {
                    task.completed = !task.completed;
                }
            }
            state.record_activity(today);
        });
    }

    /// Add a task; priority defaults to medium
    pub fn add_task(&mut self, mut task: StudyTask) {
        task.priority.get_or_insert(Priority::Medium);
        self.apply("add_task", |state| Arc::make_mut(&mut state.study_tasks).push(task));
    }

    pub fn update_task(&mut self, task_id: &str, patch: TaskPatch) {
        self.apply("update_task", |state| {
            if !state.study_tasks.iter().any(|t| t.id == task_id) {
                return;
            }
            if let Some(task) = Arc::make_mut(&mut state.study_tasks).iter_mut().find(|t| t.id == task_id) {
                task.apply(patch);
            }
        });
    }

    pub fn delete_task(&mut self, task_id: &str) {
        self.apply("delete_task", |state| {
            if state.study_tasks.iter().any(|t| t.id == task_id) {
                Arc::make_mut(&mut state.study_tasks).retain(|t| t.id != task_id);
            }
        });
    }

    // ── Custom plans ────────────────────────────────────────────────────

    /// Create a plan; its tasks also join the global task list
    pub fn create_custom_plan(&mut self, plan: NewPlan) -> CustomPlan {
        let plan = CustomPlan {
            id: self.next_id("plan"),
            title: plan.title,
            description: plan.description,
            tasks: plan.tasks,
            created_at: self.now(),
            target_date: plan.target_date,
        };
        let today = self.today();
        let created = plan.clone();
        self.apply("create_custom_plan", |state| {
            Arc::make_mut(&mut state.study_tasks).extend(plan.tasks.iter().cloned());
            Arc::make_mut(&mut state.custom_plans).push(plan);
            state.record_activity(today);
        });
        created
    }

    pub fn update_custom_plan(&mut self, plan_id: &str, patch: PlanPatch) {
        self.apply("update_custom_plan", |state| {
            if !state.custom_plans.iter().any(|p| p.id == plan_id) {
                return;
            }
            if let Some(plan) = Arc::make_mut(&mut state.custom_plans).iter_mut().find(|p| p.id == plan_id) {
                if let Some(title) = patch.title {
                    plan.title = title;
                }
                if let Some(description) = patch.description {
                    plan.description = Some(description);
                }
                if let Some(target_date) = patch.target_date {
                    plan.target_date = Some(target_date);
                }
            }
        });
    }

    /// Delete a plan and exactly the tasks it created
    pub fn delete_custom_plan(&mut self, plan_id: &str) {
        self.apply("delete_custom_plan", |state| {
            let Some(plan) = state.custom_plans.iter().find(|p| p.id == plan_id) else {
                return;
            };
            let task_ids: Vec<String> = plan.tasks.iter().map(|t| t.id.clone()).collect();
            Arc::make_mut(&mut state.custom_plans).retain(|p| p.id != plan_id);
            Arc::make_mut(&mut state.study_tasks).retain(|t| !task_ids.contains(&t.id));
        });
    }

    // ── Gamification ────────────────────────────────────────────────────

    /// Record activity for today and re-check achievements
    pub fn update_streak(&mut self) -> StreakChange {
        let today = self.today();
        self.apply("update_streak", |state| state.record_activity(today))
    }

    /// Overwrite a skill level, clamped to [0, 100]
    pub fn update_skill_level(&mut self, skill: &str, level: i64) {
        self.apply("update_skill_level", |state| {
            if state.user_stats.skill_level(skill).is_some() {
                Arc::make_mut(&mut state.user_stats).set_skill(skill, level);
            }
        });
    }

    /// Edit a goal by its list position
    pub fn update_monthly_goal(&mut self, index: usize, current: f64, target: Option<f64>) {
        self.apply("update_monthly_goal", |state| {
            if index >= state.user_stats.monthly_goals.len() {
                return;
            }
            let goal = &mut Arc::make_mut(&mut state.user_stats).monthly_goals[index];
            goal.current = current;
            if let Some(target) = target {
                goal.target = target;
            }
        });
    }

    /// Add a freeform goal
    pub fn add_monthly_goal(&mut self, goal: &str, target: f64) {
        let goal = MonthlyGoal::new(goal, target, GoalKind::Freeform);
        self.apply("add_monthly_goal", |state| {
            Arc::make_mut(&mut state.user_stats).monthly_goals.push(goal);
        });
    }

    pub fn delete_monthly_goal(&mut self, index: usize) {
        self.apply("delete_monthly_goal", |state| {
            if index < state.user_stats.monthly_goals.len() {
                Arc::make_mut(&mut state.user_stats).monthly_goals.remove(index);
            }
        });
    }

    /// Add studied minutes to the totals, today's weekday bucket and the
    /// study-hours goals
    pub fn log_study_time(&mut self, minutes: u64) {
        let today = self.today();
        let hours = minutes as f64 / 60.0;
        self.apply("log_study_time", |state| {
            Arc::make_mut(&mut state.study_metrics).time_spent_minutes += minutes;
            let stats = Arc::make_mut(&mut state.user_stats);
            stats.log_hours(today, hours);
            stats.bump_goals(GoalKind::StudyHours, hours);
            state.record_activity(today);
        });
    }

    // ── Deadlines ───────────────────────────────────────────────────────

    pub fn add_deadline(&mut self, deadline: NewDeadline) -> Deadline {
        let deadline = Deadline {
            id: self.next_id("deadline"),
            title: deadline.title,
            subject: deadline.subject,
            due_date: deadline.due_date,
            priority: deadline.priority,
            completed: false,
        };
        let created = deadline.clone();
        self.apply("add_deadline", |state| {
            Arc::make_mut(&mut state.user_stats).custom_deadlines.push(deadline);
        });
        created
    }

    pub fn update_deadline(&mut self, deadline_id: &str, patch: DeadlinePatch) {
        self.apply("update_deadline", |state| {
            if !state.user_stats.custom_deadlines.iter().any(|d| d.id == deadline_id) {
                return;
            }
            let stats = Arc::make_mut(&mut state.user_stats);
            if let Some(d) = stats.custom_deadlines.iter_mut().find(|d| d.id == deadline_id) {
                if let Some(title) = patch.title {
                    d.title = title;
                }
                if let Some(subject) = patch.subject {
                    d.subject = subject;
                }
                if let Some(due_date) = patch.due_date {
                    d.due_date = due_date;
                }
                if let Some(priority) = patch.priority {
                    d.priority = priority;
                }
                if let Some(completed) = patch.completed {
                    d.completed = completed;
                }
            }
        });
    }

    pub fn delete_deadline(&mut self, deadline_id: &str) {
        self.apply("delete_deadline", |state| {
            if state.user_stats.custom_deadlines.iter().any(|d| d.id == deadline_id) {
                Arc::make_mut(&mut state.user_stats).custom_deadlines.retain(|d| d.id != deadline_id);
            }
        });
    }

    pub fn complete_deadline(&mut self, deadline_id: &str) {
        let today = self.today();
        self.apply("complete_deadline", |state| {
            if !state.user_stats.custom_deadlines.iter().any(|d| d.id == deadline_id) {
                return;
            }
            let stats = Arc::make_mut(&mut state.user_stats);
            if let Some(d) = stats.custom_deadlines.iter_mut().find(|d| d.id == deadline_id) {
                d.completed = true;
            }
            state.record_activity(today);
        });
    }

    // ── Study sessions ──────────────────────────────────────────────────

    pub fn start_study_session(&mut self) {
        let now = self.now();
        self.apply("start_study_session", |state| state.study_session_start = Some(now));
    }

    /// Close the open session, logging its wall-clock minutes. Returns the
    /// minutes logged.
    pub fn end_study_session(&mut self) -> u64 {
        let minutes = self
            .state
            .study_session_start
            .map(|start| {
                let elapsed_ms = (self.now() - start).num_milliseconds().max(0);
                (elapsed_ms as f64 / 60_000.0).round() as u64
            })
            .unwrap_or(0);
        if minutes > 0 {
            self.log_study_time(minutes);
        }
        self.apply("end_study_session", |state| state.study_session_start = None);
        minutes
    }

    /// Unlock every newly satisfied achievement, returning the new ones
    pub fn check_and_unlock_achievements(&mut self) -> Vec<Achievement> {
        let fresh = self.apply("check_and_unlock_achievements", |state| state.unlock_achievements());
        for achievement in &fresh {
            tracing::info!(id = achievement.id(), "Achievement unlocked");
        }
        fresh
    }
}

/// "jane.doe@uni.edu" → "Jane Doe"
fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let words: Vec<String> = local
        .split(['.', '_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() { email.to_string() } else { words.join(" ") }
}
