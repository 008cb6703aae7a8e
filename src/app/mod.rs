//! Application shell and command dispatch

pub mod command;
pub mod workflows;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::export;
use crate::store::{
    Achievement, NewDeadline, NewPlan, PlanPatch, QuizAnswer, Role, Store, StudyTask, UserPatch,
    stats::WEEKDAYS,
};
pub use command::{Command, HELP, ParseResult, PlanItem, parse_command, parse_question};
use workflows::WorkflowError;

/// Width used when wrapping chat replies
const WRAP_WIDTH: usize = 80;

/// Days ahead covered by the upcoming list in `:stats`
const UPCOMING_DAYS: i64 = 7;

/// Follow-up line for a failure that may go away on its own
pub fn retry_hint(err: &anyhow::Error) -> Option<&'static str> {
    let api = match err.downcast_ref::<WorkflowError>() {
        Some(WorkflowError::Api(e)) => e,
        _ => err.downcast_ref::<ApiError>()?,
    };
    if api.is_connection_error() {
        Some("Is the backend running? Check :health or the configured api_url")
    } else if api.is_recoverable() {
        Some("The backend had a problem; try again in a moment")
    } else {
        None
    }
}

/// The main application
pub struct App {
    /// Application configuration
    config: Config,

    /// State store, owned for the lifetime of the app
    store: Store,

    /// Backend client
    api: ApiClient,
}

impl App {
    /// Create a new application instance around an opened store
    pub fn new(config: Config, store: Store) -> Result<Self> {
        let api = ApiClient::new(&config).context("Failed to build HTTP client")?;
        Ok(Self { config, store, api })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Run the interactive shell until `:q` or end of input
    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = std::io::stdout();
        writeln!(stdout, "Smart Study Hub. Type :help for commands, :q to quit.")?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            write!(stdout, "{}> ", self.prompt())?;
            stdout.flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match self.handle_line(&line, &mut stdout).await {
                Ok(true) => break, // Exit requested
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!("Command failed: {:#}", e);
                    writeln!(stdout, "Error: {:#}", e)?;
                    if let Some(hint) = retry_hint(&e) {
                        writeln!(stdout, "{}", hint)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        match self.store.state().current_notebook() {
            Some(nb) => format!("study-hub [{}]", nb.title),
            None => "study-hub".to_string(),
        }
    }

    /// Parse and execute one line of shell input, returns true if should exit
    pub async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<bool> {
        let command = match line.trim().strip_prefix(':') {
            Some(rest) => match parse_command(rest) {
                ParseResult::Ok(command) => command,
                ParseResult::UnknownCommand(cmd) => bail!("Unknown command: {} (try :help)", cmd),
                ParseResult::MissingArgument(cmd) => bail!("Missing argument for :{}", cmd),
                ParseResult::InvalidArgument(msg) => bail!(msg),
            },
            None if line.trim().is_empty() => Command::Nop,
            None => parse_question(line),
        };
        self.execute(command, out).await
    }

    fn current_notebook_id(&self) -> Result<String> {
        match self.store.state().current_notebook() {
            Some(nb) => Ok(nb.id.clone()),
            None => bail!("No notebook selected. Use :open <id> (see :notebooks)"),
        }
    }

    /// Make `notebook_id` current. Quiz and document selections belong to
    /// the previous notebook and are dropped.
    fn switch_notebook(&mut self, notebook_id: Option<&str>) {
        self.store.set_current_notebook(notebook_id);
        self.store.set_selected_document(None);
        if self.store.state().current_quiz_id.is_some() {
            self.store.set_current_quiz(None);
        }
    }

    fn requires_login(command: &Command) -> bool {
        !matches!(
            command,
            Command::Login { .. } | Command::Help | Command::Quit | Command::Nop | Command::Health
        )
    }

    /// Execute a command, writing its output to `out`. Returns true if the
    /// shell should exit.
    pub async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<bool> {
        if Self::requires_login(&command) && !self.store.state().is_authenticated {
            bail!("Please sign in first with :login <email> <password>");
        }

        match command {
            Command::Nop => {}
            Command::Quit => return Ok(true),
            Command::Help => writeln!(out, "{}", HELP)?,

            Command::Login { email, password } => {
                if !self.store.login(&email, &password) {
                    bail!("Email and password are required");
                }
                let name = self.store.state().user.as_ref().map(|u| u.name.clone());
                writeln!(out, "Welcome, {}!", name.unwrap_or(email))?;
            }
            Command::Logout => {
                let had_session = self.store.state().study_session_start.is_some();
                let minutes = self.store.logout();
                if had_session {
                    writeln!(out, "Signed out after {} minutes of study", minutes)?;
                } else {
                    writeln!(out, "Signed out")?;
                }
            }
            Command::UpdateProfile { name, email } => {
                let email = email.map(|e| e.trim().to_string());
                if email.as_deref().is_some_and(|e| !e.contains('@')) {
                    return Err(WorkflowError::Validation("Email must contain '@'".into()).into());
                }
                self.store.update_user(UserPatch { name, email, avatar_url: None });
                if let Some(user) = &self.store.state().user {
                    writeln!(out, "Profile: {} <{}>", user.name, user.email)?;
                }
            }

            Command::CreateNotebook { title, subject, exam_date } => {
                if title.trim().is_empty() {
                    return Err(WorkflowError::Validation("Title cannot be empty".into()).into());
                }
                let nb = self.store.create_notebook(&title, &subject, exam_date);
                self.switch_notebook(Some(&nb.id));
                writeln!(out, "Created notebook {} ({})", nb.title, nb.id)?;
            }
            Command::ListNotebooks => self.list_notebooks(out)?,
            Command::Open(id) => {
                let state = self.store.state();
                let Some(nb) = state.find_notebook(&id) else {
                    return Err(WorkflowError::NotFound { kind: "Notebook", id }.into());
                };
                let (title, docs) = (nb.title.clone(), state.notebook_documents(&id).len());
                self.switch_notebook(Some(&id));
                writeln!(out, "Opened {} ({} documents)", title, docs)?;
            }
            Command::DeleteNotebook(id) => {
                if self.store.state().find_notebook(&id).is_none() {
                    return Err(WorkflowError::NotFound { kind: "Notebook", id }.into());
                }
                let was_current =
                    self.store.state().current_notebook_id.as_deref() == Some(id.as_str());
                self.store.delete_notebook(&id);
                if was_current {
                    self.switch_notebook(None);
                }
                writeln!(out, "Deleted notebook {}", id)?;
            }
            Command::CompleteNotebook(id) => {
                let id = match id {
                    Some(id) => id,
                    None => self.current_notebook_id()?,
                };
                if self.store.state().find_notebook(&id).is_none() {
                    return Err(WorkflowError::NotFound { kind: "Notebook", id }.into());
                }
                self.store.complete_notebook(&id);
                let coverage = self.store.state().study_metrics.overall_coverage;
                writeln!(out, "Notebook complete. Coverage now {:.0}%", coverage * 100.0)?;
            }

            Command::Upload(path) => {
                let notebook_id = self.current_notebook_id()?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {:?}", path))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                writeln!(out, "Uploading {}...", file_name)?;
                let doc = workflows::upload_document(
                    &mut self.store,
                    &self.api,
                    &notebook_id,
                    &file_name,
                    bytes,
                )
                .await?;
                writeln!(out, "{} indexed ({} pages, id {})", doc.name, doc.pages, doc.id)?;
            }
            Command::AddUrl { url, name } => {
                let notebook_id = self.current_notebook_id()?;
                writeln!(out, "Analyzing content (scraping and summarizing can take a while)...")?;
                let doc = workflows::add_url(
                    &mut self.store,
                    &self.api,
                    &notebook_id,
                    &url,
                    name.as_deref(),
                )
                .await?;
                writeln!(out, "Added {} ({})", doc.name, doc.id)?;
                if let Some(message) = self.store.state().notebook_chat(&notebook_id).last() {
                    if message.role == Role::Assistant {
                        writeln!(out, "\n{}", textwrap::fill(&message.content, WRAP_WIDTH))?;
                    }
                }
            }
            Command::SelectDocument(id) => {
                let notebook_id = self.current_notebook_id()?;
                if let Some(id) = &id {
                    let known =
                        self.store.state().notebook_documents(&notebook_id).iter().any(|d| &d.id == id);
                    if !known {
                        return Err(WorkflowError::NotFound { kind: "Document", id: id.clone() }.into());
                    }
                }
                self.store.set_selected_document(id.as_deref());
                match id {
                    Some(id) => writeln!(out, "Questions now focus on {}", id)?,
                    None => writeln!(out, "Questions cover the whole notebook")?,
                }
            }
            Command::Ask(question) => {
                let notebook_id = self.current_notebook_id()?;
                let result =
                    workflows::ask(&mut self.store, &self.api, &notebook_id, &question).await;
                // A backend failure still leaves the fallback reply in the thread
                if matches!(result, Ok(_) | Err(WorkflowError::Api(_))) {
                    if let Some(reply) = self.store.state().notebook_chat(&notebook_id).last() {
                        writeln!(out, "{}", textwrap::fill(&reply.content, WRAP_WIDTH))?;
                    }
                }
                result?;
            }

            Command::GenerateQuiz { topic, difficulty } => {
                let notebook_id = self.current_notebook_id()?;
                writeln!(out, "Generating quiz...")?;
                let quiz = workflows::generate_quiz(
                    &mut self.store,
                    &self.api,
                    &notebook_id,
                    topic.as_deref(),
                    difficulty,
                    self.config.quiz_questions,
                )
                .await?;
                writeln!(
                    out,
                    "Quiz {} on {} ({})",
                    quiz.id,
                    quiz.topic.as_deref().unwrap_or("General"),
                    quiz.difficulty.as_str()
                )?;
                for (i, question) in quiz.questions.iter().enumerate() {
                    writeln!(out, "\n{}. {}", i + 1, question.text)?;
                    for option in &question.options {
                        writeln!(out, "   {}) {}", option.id, option.text)?;
                    }
                }
                writeln!(out, "\nAnswer with :answer <n> <option>, then :submit")?;
            }
            Command::ListQuizzes => {
                let notebook_id = self.current_notebook_id()?;
                let state = self.store.state();
                let quizzes = state.notebook_quizzes(&notebook_id);
                if quizzes.is_empty() {
                    writeln!(out, "No quizzes yet. Try :quiz")?;
                }
                for quiz in quizzes {
                    let marker = if state.current_quiz_id.as_deref() == Some(quiz.id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    writeln!(
                        out,
                        "{} {}  {}  {}  {} questions",
                        marker,
                        quiz.id,
                        quiz.topic.as_deref().unwrap_or("General"),
                        quiz.difficulty.as_str(),
                        quiz.questions.len()
                    )?;
                }
            }
            Command::Answer { question, option } => {
                let state = self.store.state();
                let Some(quiz) = state.current_quiz() else {
                    bail!("No quiz is in progress. Generate one with :quiz");
                };
                let Some(q) = question.checked_sub(1).and_then(|i| quiz.questions.get(i)) else {
                    bail!("Quiz has {} questions", quiz.questions.len());
                };
                let question_id = q.id.clone();
                self.store.set_quiz_answer(QuizAnswer::selected(question_id, option));
                let answered = self.store.state().quiz_answers.len();
                writeln!(out, "Answered {} so far", answered)?;
            }
            Command::Submit => {
                let result = workflows::submit_current_quiz(&mut self.store)?;
                writeln!(
                    out,
                    "Score: {}/{} ({:.0}%)",
                    result.correct,
                    result.total,
                    result.score * 100.0
                )?;
                for topic in &result.per_topic {
                    writeln!(out, "  {}: {}/{}", topic.topic, topic.correct, topic.total)?;
                }
                self.store.set_current_quiz(None);
                self.announce_achievements(out)?;
            }

            Command::AddTask { title, task_type, due_date, priority } => {
                let notebook_id = self.current_notebook_id()?;
                let task = StudyTask {
                    id: self.store.next_id("task"),
                    title,
                    notebook_id,
                    task_type,
                    due_date,
                    completed: false,
                    priority,
                };
                writeln!(out, "Added task {}", task.id)?;
                self.store.add_task(task);
            }
            Command::ToggleTask(id) => {
                if !self.store.state().study_tasks.iter().any(|t| t.id == id) {
                    return Err(WorkflowError::NotFound { kind: "Task", id }.into());
                }
                self.store.toggle_task_complete(&id);
                writeln!(out, "Toggled {}", id)?;
                self.announce_achievements(out)?;
            }
            Command::ListTasks => {
                let state = self.store.state();
                let tasks: Vec<_> = match state.current_notebook() {
                    Some(nb) => state.notebook_tasks(&nb.id),
                    None => state.study_tasks.iter().collect(),
                };
                for task in tasks {
                    writeln!(
                        out,
                        "[{}] {}  {}  due {}  {:?}",
                        if task.completed { "x" } else { " " },
                        task.id,
                        task.title,
                        task.due_date,
                        task.priority.unwrap_or_default()
                    )?;
                }
            }

            Command::AddDeadline { title, subject, due_date, priority } => {
                let deadline =
                    self.store.add_deadline(NewDeadline { title, subject, due_date, priority });
                writeln!(out, "Added deadline {} due {}", deadline.id, deadline.due_date)?;
            }
            Command::CompleteDeadline(id) => {
                let known = self.store.state().user_stats.custom_deadlines.iter().any(|d| d.id == id);
                if !known {
                    return Err(WorkflowError::NotFound { kind: "Deadline", id }.into());
                }
                self.store.complete_deadline(&id);
                writeln!(out, "Deadline {} done", id)?;
            }

            Command::CreatePlan { title, due_date, tasks } => {
                let notebook_id = self.current_notebook_id()?;
                if title.trim().is_empty() || tasks.is_empty() {
                    return Err(WorkflowError::Validation(
                        "A plan needs a title and at least one task".into(),
                    )
                    .into());
                }
                // Plan tasks share one timestamp: task<ms>-0, task<ms>-1, ...
                let base = self.store.next_id("task");
                let tasks = tasks
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| StudyTask {
                        id: format!("{}-{}", base, i),
                        title: item.title,
                        notebook_id: notebook_id.clone(),
                        task_type: item.task_type,
                        due_date,
                        completed: false,
                        priority: None,
                    })
                    .collect();
                let plan = self.store.create_custom_plan(NewPlan {
                    title,
                    description: None,
                    tasks,
                    target_date: Some(due_date),
                });
                writeln!(out, "Created plan {} with {} tasks", plan.id, plan.tasks.len())?;
            }
            Command::ListPlans => {
                let state = self.store.state();
                if state.custom_plans.is_empty() {
                    writeln!(out, "No plans yet. Create one with :plan")?;
                }
                for plan in state.custom_plans.iter() {
                    // Progress comes from the live task list, where toggles land
                    let done = plan
                        .tasks
                        .iter()
                        .filter(|t| state.study_tasks.iter().any(|s| s.id == t.id && s.completed))
                        .count();
                    let target = plan.target_date.map(|d| format!("  by {}", d)).unwrap_or_default();
                    writeln!(
                        out,
                        "{}  {}  {}/{} tasks done{}",
                        plan.id,
                        plan.title,
                        done,
                        plan.tasks.len(),
                        target
                    )?;
                }
            }
            Command::EditPlan { id, title, target_date } => {
                self.plan_exists(&id)?;
                self.store.update_custom_plan(&id, PlanPatch { title, description: None, target_date });
                writeln!(out, "Updated plan {}", id)?;
            }
            Command::DeletePlan(id) => {
                self.plan_exists(&id)?;
                self.store.delete_custom_plan(&id);
                writeln!(out, "Deleted plan {} and its tasks", id)?;
            }

            Command::AddGoal { goal, target } => {
                if goal.trim().is_empty() || target <= 0.0 {
                    return Err(WorkflowError::Validation(
                        "A goal needs a description and a positive target".into(),
                    )
                    .into());
                }
                self.store.add_monthly_goal(&goal, target);
                writeln!(out, "Added goal: {}", goal)?;
            }
            Command::UpdateGoal { index, current, target } => {
                self.goal_exists(index)?;
                self.store.update_monthly_goal(index, current, target);
                writeln!(out, "Updated goal {}", index)?;
            }
            Command::DeleteGoal(index) => {
                self.goal_exists(index)?;
                self.store.delete_monthly_goal(index);
                writeln!(out, "Deleted goal {}", index)?;
            }

            Command::Stats => self.show_stats(out)?,
            Command::Report => {
                write!(out, "{}", export::progress_report(self.store.state(), self.store.today()))?
            }
            Command::Export(dir) => {
                let dir = dir.unwrap_or_else(|| PathBuf::from("."));
                let path = export::write_export(self.store.state(), &dir, self.store.now())?;
                writeln!(out, "Exported to {}", path.display())?;
            }
            Command::Health => {
                let report = self.api.health_check().await?;
                writeln!(out, "Backend at {}", self.api.base_url())?;
                for (service, health) in &report.services {
                    writeln!(out, "  {:<18} {:<8} {}", service, health.status, health.message)?;
                }
            }
        }
        Ok(false)
    }

    fn plan_exists(&self, id: &str) -> Result<()> {
        if !self.store.state().custom_plans.iter().any(|p| p.id == id) {
            return Err(WorkflowError::NotFound { kind: "Plan", id: id.to_string() }.into());
        }
        Ok(())
    }

    fn goal_exists(&self, index: usize) -> Result<()> {
        let goals = self.store.state().user_stats.monthly_goals.len();
        if index >= goals {
            return Err(WorkflowError::NotFound { kind: "Goal", id: index.to_string() }.into());
        }
        Ok(())
    }

    fn announce_achievements<W: Write>(&mut self, out: &mut W) -> Result<()> {
        for achievement in self.store.check_and_unlock_achievements() {
            writeln!(out, "Achievement unlocked: {}!", achievement.title())?;
        }
        Ok(())
    }

    fn list_notebooks<W: Write>(&self, out: &mut W) -> Result<()> {
        let state = self.store.state();
        if state.notebooks.is_empty() {
            writeln!(out, "No notebooks yet. Create one with :new <title> | <subject>")?;
        }
        for nb in state.notebooks.iter() {
            let done = state.user_stats.completed_notebooks.contains(&nb.id);
            writeln!(
                out,
                "{} {}  {}  ({})  {} documents{}",
                if state.current_notebook_id.as_deref() == Some(nb.id.as_str()) { "*" } else { " " },
                nb.id,
                nb.title,
                nb.subject,
                state.notebook_documents(&nb.id).len(),
                if done { "  [complete]" } else { "" }
            )?;
        }
        Ok(())
    }

    fn show_stats<W: Write>(&self, out: &mut W) -> Result<()> {
        let state = self.store.state();
        let stats = &state.user_stats;
        let metrics = &state.study_metrics;

        writeln!(out, "Streak: {} days (longest {})", stats.current_streak, stats.longest_streak)?;
        writeln!(
            out,
            "Quizzes: {} taken, {:.0}% accuracy",
            metrics.quizzes_taken,
            metrics.average_quiz_accuracy * 100.0
        )?;
        writeln!(out, "Coverage: {:.0}%", metrics.overall_coverage * 100.0)?;
        writeln!(out, "Study time: {} minutes", metrics.time_spent_minutes)?;

        let week: Vec<String> = WEEKDAYS
            .iter()
            .zip(stats.weekly_hours.iter())
            .map(|(day, hours)| format!("{} {:.1}h", day, hours))
            .collect();
        writeln!(out, "This week: {}", week.join("  "))?;

        if !stats.skill_levels.is_empty() {
            writeln!(out, "\nSkills")?;
            for skill in &stats.skill_levels {
                writeln!(out, "  {:<24} {:>3}", skill.skill, skill.level)?;
            }
        }

        writeln!(out, "\nMonthly goals")?;
        for (i, goal) in stats.monthly_goals.iter().enumerate() {
            writeln!(
                out,
                "  {}. {}  {}/{} ({:.0}%)",
                i,
                goal.goal,
                goal.current,
                goal.target,
                goal.ratio() * 100.0
            )?;
        }

        let unlocked: Vec<&str> = stats
            .unlocked_achievements
            .iter()
            .filter_map(|id| Achievement::from_id(id))
            .map(|a| a.title())
            .collect();
        let unlocked = if unlocked.is_empty() { "none yet".to_string() } else { unlocked.join(", ") };
        writeln!(out, "\nAchievements: {}", unlocked)?;
        let locked = export::locked_achievements(state);
        if !locked.is_empty() {
            writeln!(out, "Still to earn:")?;
            for achievement in locked {
                writeln!(out, "  {}: {}", achievement.title(), achievement.description())?;
            }
        }

        let today = self.store.today();
        let upcoming = state.upcoming_tasks(today + chrono::Duration::days(UPCOMING_DAYS));
        if !upcoming.is_empty() {
            writeln!(out, "\nDue this week")?;
            for task in upcoming {
                writeln!(out, "  {}  {}  due {}", task.id, task.title, task.due_date)?;
            }
        }

        let mut deadlines: Vec<_> =
            stats.custom_deadlines.iter().filter(|d| !d.completed && d.due_date >= today).collect();
        deadlines.sort_by_key(|d| d.due_date);
        if !deadlines.is_empty() {
            writeln!(out, "\nUpcoming deadlines")?;
            for d in deadlines {
                writeln!(out, "  {}  {}  {}  due {}", d.id, d.title, d.subject, d.due_date)?;
            }
        }
        Ok(())
    }
}
