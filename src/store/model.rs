//! Entity model for the study hub
//!
//! These are the records the store keeps in its collections. All ids are
//! opaque strings, unique within their collection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address used to sign in
    pub email: String,
    /// Avatar image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Partial update for [`User`]
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<Option<String>>,
}

/// A notebook groups documents, chat and tasks around one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// Notebook identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Subject tag, also the key for skill levels
    pub subject: String,
    /// Progress ratio in [0, 1]
    pub progress: f64,
    /// Last time the notebook changed
    pub last_updated: DateTime<Utc>,
    /// Exam date, if the student set one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_date: Option<NaiveDate>,
}

/// Kind of uploaded material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Ppt,
    Docx,
    Txt,
    Url,
}

impl FileType {
    /// Guess the file type from a file name's extension, falling back to text
    pub fn from_file_name(name: &str) -> Self {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()).unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "ppt" => Self::Ppt,
            "docx" => Self::Docx,
            _ => Self::Txt,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Ppt => "ppt",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Url => "url",
        }
    }
}

/// Indexing status of a document. Only ever moves from processing to indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Indexed,
}

/// A piece of course material inside a notebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Material kind
    pub file_type: FileType,
    /// Page (or chunk) count
    pub pages: u32,
    /// Indexing status
    pub status: DocumentStatus,
    /// Extracted text, when the backend returned it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Source URL for web material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Partial update for [`Document`]
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub name: Option<String>,
    pub pages: Option<u32>,
    pub status: Option<DocumentStatus>,
    pub content: Option<String>,
    pub url: Option<String>,
}

impl Document {
    /// Apply a patch. The status never regresses from indexed to processing.
    pub fn apply(&mut self, patch: DocumentPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(pages) = patch.pages {
            self.pages = pages;
        }
        if let Some(status) = patch.status {
            self.status = self.status.max(status);
        }
        if let Some(content) = patch.content {
            self.content = Some(content);
        }
        if let Some(url) = patch.url {
            self.url = Some(url);
        }
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Citation from an answer back into a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub document_id: String,
    pub document_name: String,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// One message in a notebook's chat. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ups: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(id: impl Into<String>, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            follow_ups: Vec::new(),
            timestamp,
        }
    }

    /// Create an assistant message
    pub fn assistant(
        id: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { role: Role::Assistant, ..Self::user(id, content, timestamp) }
    }
}

/// Quiz difficulty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!("Unknown difficulty: {}. Options: easy, medium, hard", other)),
        }
    }
}

/// Kind of quiz question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    /// Map the backend's loose type labels onto a question type
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "tf" | "true_false" | "true-false" | "truefalse" => Self::TrueFalse,
            "short" | "short_answer" | "short-answer" => Self::ShortAnswer,
            _ => Self::MultipleChoice,
        }
    }
}

/// One answer option of a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

/// Where in the material a question came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    pub document_id: String,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuizOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocator>,
}

/// A generated quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    /// Owning notebook. May dangle after the notebook is deleted.
    pub notebook_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

/// The student's answer to one question of the active quiz attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizAnswer {
    pub question_id: String,
    pub selected_option_id: Option<String>,
    pub text_answer: Option<String>,
    pub flagged: bool,
}

impl QuizAnswer {
    /// Answer a question by choosing an option
    pub fn selected(question_id: impl Into<String>, option_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            selected_option_id: Some(option_id.into()),
            ..Default::default()
        }
    }
}

/// Score breakdown for one topic of a graded quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicScore {
    pub topic: String,
    pub correct: usize,
    pub total: usize,
}

/// Outcome of grading a quiz attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizResult {
    /// Ratio of correct answers in [0, 1]
    pub score: f64,
    pub correct: usize,
    pub total: usize,
    pub per_topic: Vec<TopicScore>,
    pub wrong_questions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Review,
    Quiz,
    Read,
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "review" => Ok(Self::Review),
            "quiz" => Ok(Self::Quiz),
            "read" => Ok(Self::Read),
            other => Err(format!("Unknown task type: {}. Options: review, quiz, read", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("Unknown priority: {}. Options: low, medium, high", other)),
        }
    }
}

/// A to-do item in the study plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyTask {
    pub id: String,
    pub title: String,
    pub notebook_id: String,
    pub task_type: TaskType,
    pub due_date: NaiveDate,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Partial update for [`StudyTask`]
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub task_type: Option<TaskType>,
    pub due_date: Option<NaiveDate>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
}

impl StudyTask {
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(task_type) = patch.task_type {
            self.task_type = task_type;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(priority) = patch.priority {
            self.priority = Some(priority);
        }
    }
}

/// A user-built plan of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPlan {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tasks: Vec<StudyTask>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
}

/// Input for creating a plan; the store fills in id and creation time
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub title: String,
    pub description: Option<String>,
    pub tasks: Vec<StudyTask>,
    pub target_date: Option<NaiveDate>,
}

/// Partial update for [`CustomPlan`]
#[derive(Debug, Clone, Default)]
pub struct PlanPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
}

/// A custom deadline, independent of notebooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub due_date: NaiveDate,
    pub priority: Priority,
    pub completed: bool,
}

/// Input for creating a deadline
#[derive(Debug, Clone)]
pub struct NewDeadline {
    pub title: String,
    pub subject: String,
    pub due_date: NaiveDate,
    pub priority: Priority,
}

/// Partial update for [`Deadline`]
#[derive(Debug, Clone, Default)]
pub struct DeadlinePatch {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
}

/// Headline study metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyMetrics {
    /// Completed notebooks over total notebooks, in [0, 1]
    pub overall_coverage: f64,
    /// Lifetime quiz score over lifetime quiz questions, in [0, 1]
    pub average_quiz_accuracy: f64,
    pub time_spent_minutes: u64,
    #[serde(default)]
    pub quizzes_taken: u32,
}

/// Clamp a ratio into [0, 1], mapping NaN to 0
pub fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_from_extension() {
        assert_eq!(FileType::from_file_name("lecture.PDF"), FileType::Pdf);
        assert_eq!(FileType::from_file_name("slides.ppt"), FileType::Ppt);
        assert_eq!(FileType::from_file_name("notes.docx"), FileType::Docx);
        assert_eq!(FileType::from_file_name("README"), FileType::Txt);
        assert_eq!(FileType::from_file_name("archive.tar.gz"), FileType::Txt);
    }

    #[test]
    fn document_status_never_regresses() {
        let mut doc = Document {
            id: "doc1".into(),
            name: "a.pdf".into(),
            file_type: FileType::Pdf,
            pages: 1,
            status: DocumentStatus::Indexed,
            content: None,
            url: None,
        };
        doc.apply(DocumentPatch {
            status: Some(DocumentStatus::Processing),
            pages: Some(12),
            ..Default::default()
        });
        assert_eq!(doc.status, DocumentStatus::Indexed);
        assert_eq!(doc.pages, 12);
    }

    #[test]
    fn question_type_labels() {
        assert_eq!(QuestionType::from_label("true_false"), QuestionType::TrueFalse);
        assert_eq!(QuestionType::from_label("tf"), QuestionType::TrueFalse);
        assert_eq!(QuestionType::from_label("short"), QuestionType::ShortAnswer);
        assert_eq!(QuestionType::from_label("mcq"), QuestionType::MultipleChoice);
        assert_eq!(QuestionType::from_label(""), QuestionType::MultipleChoice);
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn clamp_ratio_bounds() {
        assert_eq!(clamp_ratio(1.5), 1.0);
        assert_eq!(clamp_ratio(-0.1), 0.0);
        assert_eq!(clamp_ratio(f64::NAN), 0.0);
        assert_eq!(clamp_ratio(0.25), 0.25);
    }

    #[test]
    fn chat_message_serializes_without_empty_lists() {
        let msg = ChatMessage::assistant("m1", "Hello", DateTime::<Utc>::UNIX_EPOCH);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"assistant\""));
        assert!(!json.contains("sources"));
        assert!(!json.contains("follow_ups"));
    }
}
