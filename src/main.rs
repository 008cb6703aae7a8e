use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use study_hub::app::{Command, PlanItem, retry_hint};
use study_hub::store::{Difficulty, JsonFileSink, Priority, SystemClock, TaskType};
use study_hub::{App, Config, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "study-hub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding state.json (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Backend URL, overriding config and STUDY_HUB_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Notebook to act on
    #[arg(short, long, global = true)]
    notebook: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login { email: String, password: String },
    /// Sign out
    Logout,
    /// Manage notebooks
    #[command(subcommand)]
    Notebook(NotebookCommand),
    /// Upload a document into --notebook
    Upload { path: PathBuf },
    /// Add a web page or `wikipedia:<topic>` into --notebook
    AddUrl {
        url: String,
        /// Display name (defaults to the host)
        #[arg(long)]
        name: Option<String>,
    },
    /// Ask a question about --notebook
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
        /// Restrict the answer to one document
        #[arg(long)]
        document: Option<String>,
    },
    /// Generate and list quizzes
    #[command(subcommand)]
    Quiz(QuizCommand),
    /// Manage study tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage deadlines
    #[command(subcommand)]
    Deadline(DeadlineCommand),
    /// Manage monthly goals
    #[command(subcommand)]
    Goal(GoalCommand),
    /// Manage study plans
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Edit your name or email
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Show streaks, skills, goals and achievements
    Stats,
    /// Print a progress report
    Report,
    /// Export your data as JSON
    Export {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Check backend services
    Health,
}

#[derive(Subcommand)]
enum NotebookCommand {
    /// Create a notebook
    Create {
        title: String,
        #[arg(long)]
        subject: String,
        /// YYYY-MM-DD
        #[arg(long)]
        exam_date: Option<NaiveDate>,
    },
    /// List notebooks
    List,
    /// Delete a notebook with its documents, chat and tasks
    Delete { id: String },
    /// Mark a notebook complete
    Complete { id: String },
}

#[derive(Subcommand)]
enum QuizCommand {
    /// Generate a quiz for --notebook
    Generate {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, default_value = "medium")]
        difficulty: Difficulty,
    },
    /// List quizzes of --notebook
    List,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Add a task to --notebook
    Add {
        title: String,
        /// review, quiz or read
        #[arg(long = "type", default_value = "read")]
        task_type: TaskType,
        /// YYYY-MM-DD
        #[arg(long)]
        due: NaiveDate,
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Toggle a task's completion
    Toggle { id: String },
    /// List tasks
    List,
}

#[derive(Subcommand)]
enum DeadlineCommand {
    /// Add a deadline
    Add {
        title: String,
        #[arg(long)]
        subject: String,
        /// YYYY-MM-DD
        #[arg(long)]
        due: NaiveDate,
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    /// Mark a deadline complete
    Complete { id: String },
}

#[derive(Subcommand)]
enum GoalCommand {
    /// Add a monthly goal
    Add {
        target: f64,
        #[arg(required = true)]
        goal: Vec<String>,
    },
    /// Set a goal's progress
    Update {
        index: usize,
        current: f64,
        #[arg(long)]
        target: Option<f64>,
    },
    /// Delete a goal
    Delete { index: usize },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Create a plan of tasks in --notebook
    Create {
        title: String,
        /// Target date for every task, YYYY-MM-DD
        #[arg(long)]
        due: NaiveDate,
        /// `[read|quiz|review:]<title>`, repeatable
        #[arg(long = "task", required = true)]
        tasks: Vec<PlanItem>,
    },
    /// List plans
    List,
    /// Rename or reschedule a plan
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        target_date: Option<NaiveDate>,
    },
    /// Delete a plan and the tasks it created
    Delete { id: String },
}

impl Commands {
    fn into_command(self) -> Command {
        match self {
            Commands::Login { email, password } => Command::Login { email, password },
            Commands::Logout => Command::Logout,
            Commands::Notebook(cmd) => match cmd {
                NotebookCommand::Create { title, subject, exam_date } => {
                    Command::CreateNotebook { title, subject, exam_date }
                }
                NotebookCommand::List => Command::ListNotebooks,
                NotebookCommand::Delete { id } => Command::DeleteNotebook(id),
                NotebookCommand::Complete { id } => Command::CompleteNotebook(Some(id)),
            },
            Commands::Upload { path } => Command::Upload(path),
            Commands::AddUrl { url, name } => Command::AddUrl { url, name },
            Commands::Ask { question, .. } => Command::Ask(question.join(" ")),
            Commands::Quiz(QuizCommand::Generate { topic, difficulty }) => {
                Command::GenerateQuiz { topic, difficulty }
            }
            Commands::Quiz(QuizCommand::List) => Command::ListQuizzes,
            Commands::Task(cmd) => match cmd {
                TaskCommand::Add { title, task_type, due, priority } => {
                    Command::AddTask { title, task_type, due_date: due, priority }
                }
                TaskCommand::Toggle { id } => Command::ToggleTask(id),
                TaskCommand::List => Command::ListTasks,
            },
            Commands::Deadline(DeadlineCommand::Add { title, subject, due, priority }) => {
                Command::AddDeadline { title, subject, due_date: due, priority }
            }
            Commands::Deadline(DeadlineCommand::Complete { id }) => Command::CompleteDeadline(id),
            Commands::Goal(cmd) => match cmd {
                GoalCommand::Add { target, goal } => Command::AddGoal { goal: goal.join(" "), target },
                GoalCommand::Update { index, current, target } => {
                    Command::UpdateGoal { index, current, target }
                }
                GoalCommand::Delete { index } => Command::DeleteGoal(index),
            },
            Commands::Plan(cmd) => match cmd {
                PlanCommand::Create { title, due, tasks } => {
                    Command::CreatePlan { title, due_date: due, tasks }
                }
                PlanCommand::List => Command::ListPlans,
                PlanCommand::Edit { id, title, target_date } => {
                    Command::EditPlan { id, title, target_date }
                }
                PlanCommand::Delete { id } => Command::DeletePlan(id),
            },
            Commands::Profile { name, email } => Command::UpdateProfile { name, email },
            Commands::Stats => Command::Stats,
            Commands::Report => Command::Report,
            Commands::Export { output } => Command::Export(Some(output)),
            Commands::Health => Command::Health,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "study_hub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let config = Config::load()?.with_api_url_override(cli.api_url);
    let sink = match cli.data_dir {
        Some(dir) => JsonFileSink::in_dir(&dir),
        None => JsonFileSink::default_location()?,
    };
    let store = Store::open(Box::new(sink), Arc::new(SystemClock))?;
    let mut app = App::new(config, store)?;

    match cli.command {
        Some(command) => {
            if let Some(id) = &cli.notebook {
                app.store_mut().set_current_notebook(Some(id));
            }
            if let Commands::Ask { document: Some(doc), .. } = &command {
                app.store_mut().set_selected_document(Some(doc));
            }
            let mut stdout = std::io::stdout();
            if let Err(e) = app.execute(command.into_command(), &mut stdout).await {
                if let Some(hint) = retry_hint(&e) {
                    eprintln!("{}", hint);
                }
                return Err(e);
            }
        }
        None => {
            // Interactive shell
            app.run().await?;
        }
    }

    Ok(())
}
