//! Command parsing for the interactive shell

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::store::{Difficulty, Priority, TaskType};

/// Parsed shell command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign in: :login <email> <password>
    Login { email: String, password: String },
    /// Sign out and log the session's study time: :logout
    Logout,
    /// Create a notebook: :new <title> | <subject> [| <exam-date>]
    CreateNotebook { title: String, subject: String, exam_date: Option<NaiveDate> },
    /// List notebooks: :notebooks
    ListNotebooks,
    /// Select a notebook: :open <notebook-id>
    Open(String),
    /// Delete a notebook and its material: :delete <notebook-id>
    DeleteNotebook(String),
    /// Mark a notebook finished, the current one by default: :complete [notebook-id]
    CompleteNotebook(Option<String>),
    /// Upload a file into the current notebook: :upload <path>
    Upload(PathBuf),
    /// Add a web page or wikipedia topic: :url <url> [| <name>]
    AddUrl { url: String, name: Option<String> },
    /// Select a document to focus questions on: :select [document-id]
    SelectDocument(Option<String>),
    /// Ask about the current notebook: :ask <question>, or plain text
    Ask(String),
    /// Generate a quiz: :quiz [easy|medium|hard] [topic]
    GenerateQuiz { topic: Option<String>, difficulty: Difficulty },
    /// List quizzes of the current notebook: :quizzes
    ListQuizzes,
    /// Answer a question of the current quiz: :answer <number> <option-id>
    Answer { question: usize, option: String },
    /// Grade the current quiz: :submit
    Submit,
    /// Add a task: :task <title> | <type> | <due-date> [| <priority>]
    AddTask { title: String, task_type: TaskType, due_date: NaiveDate, priority: Option<Priority> },
    /// Toggle a task: :toggle <task-id>
    ToggleTask(String),
    /// List tasks: :tasks
    ListTasks,
    /// Add a deadline: :deadline <title> | <subject> | <due-date> [| <priority>]
    AddDeadline { title: String, subject: String, due_date: NaiveDate, priority: Priority },
    /// Complete a deadline: :done <deadline-id>
    CompleteDeadline(String),
    /// Create a plan in the current notebook: :plan <title> | <due-date> | <task>; <task>...
    CreatePlan { title: String, due_date: NaiveDate, tasks: Vec<PlanItem> },
    /// List plans: :plans
    ListPlans,
    /// Rename or reschedule a plan: :plan-edit <plan-id> | [title] [| target-date]
    EditPlan { id: String, title: Option<String>, target_date: Option<NaiveDate> },
    /// Delete a plan and the tasks it created: :plan-rm <plan-id>
    DeletePlan(String),
    /// Edit the signed-in profile: :profile [name] [| email]
    UpdateProfile { name: Option<String>, email: Option<String> },
    /// Add a monthly goal: :goal <target> <description>
    AddGoal { goal: String, target: f64 },
    /// Set a goal's progress: :goal-set <index> <current> [target]
    UpdateGoal { index: usize, current: f64, target: Option<f64> },
    /// Remove a goal: :goal-rm <index>
    DeleteGoal(usize),
    /// Show streaks, skills, goals and achievements: :stats
    Stats,
    /// Print the progress report: :report
    Report,
    /// Export data as JSON: :export [dir]
    Export(Option<PathBuf>),
    /// Check backend services: :health
    Health,
    /// Quit the shell: :q or :quit
    Quit,
    /// Show help: :help or :h
    Help,
    /// Clear message: (empty command)
    Nop,
}

/// One task of a new plan, written `[type:] title` (type defaults to read)
#[derive(Debug, Clone, PartialEq)]
pub struct PlanItem {
    pub task_type: TaskType,
    pub title: String,
}

impl std::str::FromStr for PlanItem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (task_type, title) = match s.split_once(':') {
            Some((prefix, rest)) => match prefix.trim().parse::<TaskType>() {
                Ok(task_type) => (task_type, rest.trim()),
                Err(_) => (TaskType::Read, s),
            },
            None => (TaskType::Read, s),
        };
        if title.is_empty() {
            return Err(format!("Plan task needs a title: '{}'", s));
        }
        Ok(Self { task_type, title: title.to_string() })
    }
}

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum ParseResult {
    /// Successfully parsed command
    Ok(Command),
    /// Unknown command
    UnknownCommand(String),
    /// Command needs an argument
    MissingArgument(String),
    /// Argument present but malformed
    InvalidArgument(String),
}

pub const HELP: &str = "\
:login <email> <password>           sign in
:logout                             sign out
:new <title> | <subject> [| date]   create a notebook
:notebooks                          list notebooks
:open <id>                          select a notebook
:delete <id>                        delete a notebook
:complete [id]                      mark a notebook complete
:upload <path>                      upload a document
:url <url> [| name]                 add a web page (or wikipedia:<topic>)
:select [doc-id]                    focus questions on one document
:ask <question>                     ask about the notebook (plain text works too)
:quiz [easy|medium|hard] [topic]    generate a quiz
:quizzes                            list quizzes
:answer <n> <option>                answer question n of the current quiz
:submit                             grade the current quiz
:task <title> | <type> | <due> [| priority]
:tasks / :toggle <id>               list or toggle tasks
:deadline <title> | <subject> | <due> [| priority]
:done <id>                          complete a deadline
:plan <title> | <due> | <task>; ...  create a plan (tasks may start with quiz: or review:)
:plans / :plan-rm <id>              list or delete plans
:plan-edit <id> | [title] [| date]  rename or reschedule a plan
:profile [name] [| email]           edit your profile
:goal <target> <text>               add a monthly goal
:goal-set <i> <current> [target]    update a goal
:goal-rm <i>                        delete a goal
:stats / :report                    show progress
:export [dir]                       export data as JSON
:health                             check backend services
:q                                  quit";

/// Split `a | b | c` into trimmed fields
fn fields(args: &str) -> Vec<&str> {
    args.split('|').map(str::trim).collect()
}

fn parse_date(s: &str) -> Result<NaiveDate, ParseResult> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ParseResult::InvalidArgument(format!("Expected YYYY-MM-DD, got '{}'", s)))
}

fn parse_number<T: std::str::FromStr>(s: &str, what: &str) -> Result<T, ParseResult> {
    s.parse().map_err(|_| ParseResult::InvalidArgument(format!("Invalid {}: '{}'", what, s)))
}

fn optional(s: Option<&&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(|s| s.to_string())
}

/// Commands that take at least one argument
const ARG_COMMANDS: &[&str] = &[
    "login", "new", "open", "delete", "upload", "url", "ask", "answer", "task", "toggle",
    "deadline", "done", "goal", "goal-set", "goal-rm", "plan", "plan-edit", "plan-rm", "profile",
];

fn parse_with_args(cmd: &str, args: &str) -> Result<Command, ParseResult> {
    if !ARG_COMMANDS.contains(&cmd) {
        return Err(ParseResult::UnknownCommand(cmd.to_string()));
    }
    let missing = || ParseResult::MissingArgument(cmd.to_string());
    if args.is_empty() {
        return Err(missing());
    }

    match cmd {
        "login" => {
            let mut parts = args.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(email), Some(password)) => {
                    Ok(Command::Login { email: email.into(), password: password.into() })
                }
                _ => Err(missing()),
            }
        }
        "new" => {
            let f = fields(args);
            if f[0].is_empty() {
                return Err(missing());
            }
            let subject = f.get(1).filter(|s| !s.is_empty()).ok_or_else(missing)?;
            let exam_date = match f.get(2).filter(|s| !s.is_empty()) {
                Some(date) => Some(parse_date(date)?),
                None => None,
            };
            Ok(Command::CreateNotebook { title: f[0].into(), subject: subject.to_string(), exam_date })
        }
        "open" => Ok(Command::Open(args.into())),
        "delete" => Ok(Command::DeleteNotebook(args.into())),
        "upload" => Ok(Command::Upload(PathBuf::from(args))),
        "url" => {
            let f = fields(args);
            Ok(Command::AddUrl { url: f[0].into(), name: optional(f.get(1)) })
        }
        "ask" => Ok(Command::Ask(args.into())),
        "answer" => {
            let mut parts = args.split_whitespace();
            let (Some(n), Some(option)) = (parts.next(), parts.next()) else {
                return Err(missing());
            };
            let question: usize = parse_number(n, "question number")?;
            if question == 0 {
                return Err(ParseResult::InvalidArgument("Questions are numbered from 1".into()));
            }
            Ok(Command::Answer { question, option: option.into() })
        }
        "task" => {
            let f = fields(args);
            if f.len() < 3 {
                return Err(missing());
            }
            let task_type = f[1].parse().map_err(ParseResult::InvalidArgument)?;
            let due_date = parse_date(f[2])?;
            let priority = match f.get(3).filter(|s| !s.is_empty()) {
                Some(p) => Some(p.parse().map_err(ParseResult::InvalidArgument)?),
                None => None,
            };
            Ok(Command::AddTask { title: f[0].into(), task_type, due_date, priority })
        }
        "toggle" => Ok(Command::ToggleTask(args.into())),
        "deadline" => {
            let f = fields(args);
            if f.len() < 3 {
                return Err(missing());
            }
            let due_date = parse_date(f[2])?;
            let priority = match f.get(3).filter(|s| !s.is_empty()) {
                Some(p) => p.parse().map_err(ParseResult::InvalidArgument)?,
                None => Priority::Medium,
            };
            Ok(Command::AddDeadline {
                title: f[0].into(),
                subject: f[1].into(),
                due_date,
                priority,
            })
        }
        "done" => Ok(Command::CompleteDeadline(args.into())),
        "plan" => {
            let f = fields(args);
            if f.len() < 3 || f[0].is_empty() {
                return Err(missing());
            }
            let due_date = parse_date(f[1])?;
            let tasks = f[2]
                .split(';')
                .filter(|t| !t.trim().is_empty())
                .map(|t| t.parse().map_err(ParseResult::InvalidArgument))
                .collect::<Result<Vec<PlanItem>, _>>()?;
            if tasks.is_empty() {
                return Err(missing());
            }
            Ok(Command::CreatePlan { title: f[0].into(), due_date, tasks })
        }
        "plan-edit" => {
            let f = fields(args);
            let title = optional(f.get(1));
            let target_date = match f.get(2).filter(|s| !s.is_empty()) {
                Some(date) => Some(parse_date(date)?),
                None => None,
            };
            if f[0].is_empty() || (title.is_none() && target_date.is_none()) {
                return Err(missing());
            }
            Ok(Command::EditPlan { id: f[0].into(), title, target_date })
        }
        "plan-rm" => Ok(Command::DeletePlan(args.into())),
        "profile" => {
            let f = fields(args);
            let (name, email) = (optional(f.first()), optional(f.get(1)));
            if name.is_none() && email.is_none() {
                return Err(missing());
            }
            Ok(Command::UpdateProfile { name, email })
        }
        "goal" => {
            let (target, goal) = args.split_once(char::is_whitespace).ok_or_else(missing)?;
            let target = parse_number(target, "target")?;
            Ok(Command::AddGoal { goal: goal.trim().into(), target })
        }
        "goal-set" => {
            let parts: Vec<&str> = args.split_whitespace().collect();
            if parts.len() < 2 {
                return Err(missing());
            }
            let target = match parts.get(2) {
                Some(t) => Some(parse_number(t, "target")?),
                None => None,
            };
            Ok(Command::UpdateGoal {
                index: parse_number(parts[0], "goal index")?,
                current: parse_number(parts[1], "progress")?,
                target,
            })
        }
        "goal-rm" => Ok(Command::DeleteGoal(parse_number(args, "goal index")?)),
        _ => Err(ParseResult::UnknownCommand(cmd.to_string())),
    }
}

/// Parse a command string (without the leading :)
pub fn parse_command(input: &str) -> ParseResult {
    let input = input.trim();

    if input.is_empty() {
        return ParseResult::Ok(Command::Nop);
    }

    // Split into command and arguments
    let mut parts = input.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(|s| s.trim()).unwrap_or("");

    let command = match cmd.as_str() {
        "logout" => Command::Logout,
        "notebooks" | "ls" | "list" => Command::ListNotebooks,
        "complete" => Command::CompleteNotebook(optional(Some(&args))),
        "select" => Command::SelectDocument(optional(Some(&args))),
        "quiz" => parse_quiz(args),
        "quizzes" => Command::ListQuizzes,
        "submit" => Command::Submit,
        "tasks" => Command::ListTasks,
        "plans" => Command::ListPlans,
        "stats" => Command::Stats,
        "report" => Command::Report,
        "export" => Command::Export(optional(Some(&args)).map(PathBuf::from)),
        "health" => Command::Health,
        "quit" | "q" => Command::Quit,
        "help" | "h" | "?" => Command::Help,
        other => match parse_with_args(other, args) {
            Ok(command) => command,
            Err(result) => return result,
        },
    };
    ParseResult::Ok(command)
}

/// `quiz [difficulty] [topic]`
fn parse_quiz(args: &str) -> Command {
    let (first, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    let (difficulty, topic) = match first.parse::<Difficulty>() {
        Ok(difficulty) => (difficulty, rest.trim()),
        Err(_) => (Difficulty::Medium, args),
    };
    let topic = Some(topic).filter(|t| !t.is_empty()).map(str::to_string);
    Command::GenerateQuiz { topic, difficulty }
}

/// Plain text typed without a leading `:` is a question
pub fn parse_question(input: &str) -> Command {
    Command::Ask(input.trim().to_string())
}
