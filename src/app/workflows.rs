//! Backend-assisted workflows
//!
//! Each workflow validates its input against the current snapshot, awaits the
//! backend, then applies the outcome to the store in plain synchronous
//! actions. A failed backend call leaves the store as it was, except for
//! chat, which records a fallback reply so the thread stays readable.

use reqwest::Url;
use thiserror::Error;

use crate::api::{ApiClient, ApiError, GenerateQuizRequest, GeneratedQuestion};
use crate::store::{
    ChatMessage, Difficulty, Document, DocumentStatus, FileType, QuestionType, Quiz, QuizAnswer,
    QuizQuestion, QuizResult, Store, TopicScore,
};

/// Assistant reply recorded when the backend cannot answer
pub const CHAT_FALLBACK_MESSAGE: &str =
    "I'm having trouble connecting to the brain (server). Please make sure the backend is running.";

/// Prefix that routes a "URL" to the backend's encyclopedia scraper
pub const WIKIPEDIA_PREFIX: &str = "wikipedia:";

/// Topic used when neither the user nor the notebook names one
const GENERAL_TOPIC: &str = "General";

/// Errors surfaced by workflows
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input rejected before anything was sent
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl WorkflowError {
    fn notebook(id: &str) -> Self {
        Self::NotFound { kind: "Notebook", id: id.to_string() }
    }
}

fn require_notebook(store: &Store, notebook_id: &str) -> Result<(), WorkflowError> {
    match store.state().find_notebook(notebook_id) {
        Some(_) => Ok(()),
        None => Err(WorkflowError::notebook(notebook_id)),
    }
}

/// Upload a local file and record it as an indexed document
pub async fn upload_document(
    store: &mut Store,
    api: &ApiClient,
    notebook_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<Document, WorkflowError> {
    require_notebook(store, notebook_id)?;
    if file_name.trim().is_empty() {
        return Err(WorkflowError::Validation("File name cannot be empty".into()));
    }

    let response = api.upload_pdf(file_name, bytes, Some(notebook_id)).await?;

    let document = Document {
        id: store.next_id("doc"),
        name: file_name.to_string(),
        file_type: FileType::from_file_name(file_name),
        pages: response.chunks.filter(|&n| n > 0).unwrap_or(1),
        status: DocumentStatus::Indexed,
        content: response.text,
        url: response.url,
    };
    store.add_document(notebook_id, document.clone());
    tracing::info!(id = %document.id, name = file_name, pages = document.pages, "Document indexed");
    Ok(document)
}

/// Normalize user input into something the URL endpoint accepts.
///
/// `wikipedia:` topics pass through; anything without a scheme gets `https://`.
pub fn normalize_url(input: &str) -> Result<String, WorkflowError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(WorkflowError::Validation("URL cannot be empty".into()));
    }

    let prefix_len = WIKIPEDIA_PREFIX.len();
    let is_wikipedia =
        input.get(..prefix_len).is_some_and(|p| p.eq_ignore_ascii_case(WIKIPEDIA_PREFIX));
    if is_wikipedia {
        let topic = input[prefix_len..].trim();
        if topic.is_empty() {
            return Err(WorkflowError::Validation("Wikipedia topic cannot be empty".into()));
        }
        return Ok(format!("{}{}", WIKIPEDIA_PREFIX, topic));
    }

    let url = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    Url::parse(&url).map_err(|e| WorkflowError::Validation(format!("Invalid URL {}: {}", url, e)))?;
    Ok(url)
}

/// Name shown for a URL document when the user gave none: the host, or the
/// topic of a wikipedia lookup
pub fn default_url_name(url: &str) -> String {
    if let Some(topic) = url.strip_prefix(WIKIPEDIA_PREFIX) {
        return topic.to_string();
    }
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Have the backend ingest a web resource, record it, and post its summary
/// to the notebook's chat
pub async fn add_url(
    store: &mut Store,
    api: &ApiClient,
    notebook_id: &str,
    raw_url: &str,
    name: Option<&str>,
) -> Result<Document, WorkflowError> {
    require_notebook(store, notebook_id)?;
    let url = normalize_url(raw_url)?;
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_url_name(&url));

    let response = api.upload_url(&url, Some(&name), Some(notebook_id)).await?;

    let document = Document {
        id: store.next_id("doc"),
        name: response.filename.clone().unwrap_or_else(|| name.clone()),
        file_type: FileType::Url,
        pages: 1,
        status: DocumentStatus::Indexed,
        content: response.text,
        url: Some(url.clone()),
    };
    store.add_document(notebook_id, document.clone());

    if let Some(summary) = response.summary.filter(|s| !s.trim().is_empty()) {
        let content = format!(
            "**Website Analysis: {}**\n\n{}\n\n*Source: [{}]({})*",
            name, summary, url, url
        );
        let message = ChatMessage::assistant(store.next_id("msg"), content, store.now());
        store.add_chat_message(notebook_id, message);
    }

    tracing::info!(id = %document.id, %url, "Link added");
    Ok(document)
}

/// Ask a question in a notebook's chat.
///
/// The question and the answer are both recorded. On backend failure the
/// fallback reply is recorded instead and the error is returned.
pub async fn ask(
    store: &mut Store,
    api: &ApiClient,
    notebook_id: &str,
    question: &str,
) -> Result<ChatMessage, WorkflowError> {
    require_notebook(store, notebook_id)?;
    let question = question.trim();
    if question.is_empty() {
        return Err(WorkflowError::Validation("Question cannot be empty".into()));
    }

    // Restrict retrieval to the selected document when it lives in this notebook
    let filter = store.state().selected_document_id.as_deref().and_then(|id| {
        store
            .state()
            .notebook_documents(notebook_id)
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.name.clone())
    });

    let user_message = ChatMessage::user(store.next_id("msg"), question, store.now());
    store.add_chat_message(notebook_id, user_message);
    store.set_ai_loading(true);
    store.update_streak();

    let result = api.ask(question, filter.as_deref()).await;

    let (content, outcome) = match result {
        Ok(response) => (response.answer, Ok(())),
        Err(e) => {
            tracing::error!("Ask failed: {}", e);
            (CHAT_FALLBACK_MESSAGE.to_string(), Err(e))
        }
    };
    let reply = ChatMessage::assistant(store.next_id("msg"), content, store.now());
    store.add_chat_message(notebook_id, reply.clone());
    store.set_ai_loading(false);

    outcome?;
    Ok(reply)
}

/// Topic sent to the generator: the user's topic, else the notebook's
/// subject or title. A selected document narrows an implicit topic.
fn quiz_topic(store: &Store, notebook_id: &str, topic: Option<&str>) -> (String, String) {
    let state = store.state();
    let notebook = state.find_notebook(notebook_id);
    let explicit = topic.map(str::trim).filter(|t| !t.is_empty());

    let search_topic = explicit
        .map(str::to_string)
        .or_else(|| notebook.map(|nb| nb.subject.clone()).filter(|s| !s.is_empty()))
        .or_else(|| notebook.map(|nb| nb.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| GENERAL_TOPIC.to_string());

    let selected = state.selected_document_id.as_deref().and_then(|id| {
        state.notebook_documents(notebook_id).iter().find(|d| d.id == id)
    });
    let request_topic = match (explicit, selected) {
        (None, Some(doc)) => format!("{} - {}", doc.name, search_topic),
        _ => search_topic.clone(),
    };

    (search_topic, request_topic)
}

/// Convert generated questions, giving each a `<base>-<index>` id
pub fn convert_questions(base_id: &str, generated: Vec<GeneratedQuestion>) -> Vec<QuizQuestion> {
    generated
        .into_iter()
        .enumerate()
        .map(|(i, q)| QuizQuestion {
            id: format!("{}-{}", base_id, i),
            question_type: q
                .question_type
                .as_deref()
                .map(QuestionType::from_label)
                .unwrap_or_default(),
            text: q.question_text,
            options: q.options.unwrap_or_default(),
            correct_option_id: q.correct_option_id,
            explanation: q.explanation,
            source: None,
        })
        .collect()
}

/// Generate a quiz for a notebook, store it and make it the current quiz
pub async fn generate_quiz(
    store: &mut Store,
    api: &ApiClient,
    notebook_id: &str,
    topic: Option<&str>,
    difficulty: Difficulty,
    num_questions: u32,
) -> Result<Quiz, WorkflowError> {
    require_notebook(store, notebook_id)?;
    if num_questions == 0 {
        return Err(WorkflowError::Validation("A quiz needs at least one question".into()));
    }
    let (search_topic, request_topic) = quiz_topic(store, notebook_id, topic);

    let request = GenerateQuizRequest {
        topic: request_topic,
        difficulty,
        notebook_id: Some(notebook_id.to_string()),
        num_questions,
    };
    let response = api.generate_quiz(&request).await?;

    let generated = match response.questions {
        Some(questions) if !questions.is_empty() => questions,
        _ => {
            let reason = response
                .error
                .unwrap_or_else(|| "Failed to generate valid quiz questions".to_string());
            tracing::error!(topic = %search_topic, "Quiz generation failed: {}", reason);
            return Err(ApiError::InvalidResponse(reason).into());
        }
    };

    let base_id = store.next_id("q");
    let quiz = Quiz {
        id: store.next_id("quiz"),
        notebook_id: notebook_id.to_string(),
        topic: Some(search_topic),
        difficulty,
        questions: convert_questions(&base_id, generated),
        created_at: store.now(),
    };
    store.create_quiz(quiz.clone());
    store.set_current_quiz(Some(&quiz.id));
    tracing::info!(id = %quiz.id, questions = quiz.questions.len(), "Quiz generated");
    Ok(quiz)
}

/// Grade answers against a quiz's answer key.
///
/// A question counts as correct when the chosen option is its correct option.
/// Unanswered questions and questions without a key count as wrong.
pub fn grade(quiz: &Quiz, answers: &[QuizAnswer]) -> QuizResult {
    let mut correct = 0;
    let mut wrong_questions = Vec::new();

    for question in &quiz.questions {
        let chosen = answers
            .iter()
            .find(|a| a.question_id == question.id)
            .and_then(|a| a.selected_option_id.as_deref());
        match (chosen, question.correct_option_id.as_deref()) {
            (Some(chosen), Some(key)) if chosen == key => correct += 1,
            _ => wrong_questions.push(question.id.clone()),
        }
    }

    let total = quiz.questions.len();
    let score = if total == 0 { 0.0 } else { correct as f64 / total as f64 };
    let topic = quiz.topic.clone().unwrap_or_else(|| GENERAL_TOPIC.to_string());
    let share = |n: usize, pct: usize| n * pct / 10;

    QuizResult {
        score,
        correct,
        total,
        per_topic: vec![
            TopicScore { topic, correct, total },
            TopicScore {
                topic: "Concepts".into(),
                correct: share(correct, 6),
                total: share(total, 6),
            },
            TopicScore {
                topic: "Applications".into(),
                correct: share(correct, 4),
                total: share(total, 4),
            },
        ],
        wrong_questions,
    }
}

/// Grade the current quiz attempt and fold it into the stats
pub fn submit_current_quiz(store: &mut Store) -> Result<QuizResult, WorkflowError> {
    let state = store.snapshot();
    let quiz = state.current_quiz().ok_or_else(|| {
        WorkflowError::Validation("No quiz is in progress".into())
    })?;

    let result = grade(quiz, &state.quiz_answers);
    store.submit_quiz(result.correct as u32, result.total as u32);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::{ManualClock, QuizOption};

    fn store() -> Store {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        Store::new(Arc::new(ManualClock::at_date(date)))
    }

    fn question(id: &str, key: Option<&str>) -> QuizQuestion {
        QuizQuestion {
            id: id.into(),
            question_type: QuestionType::MultipleChoice,
            text: format!("Question {}", id),
            options: vec![
                QuizOption { id: "a".into(), text: "A".into() },
                QuizOption { id: "b".into(), text: "B".into() },
            ],
            correct_option_id: key.map(str::to_string),
            explanation: None,
            source: None,
        }
    }

    fn quiz(questions: Vec<QuizQuestion>) -> Quiz {
        Quiz {
            id: "quiz1".into(),
            notebook_id: "nb1".into(),
            topic: Some("Sorting".into()),
            difficulty: Difficulty::Medium,
            questions,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn normalize_adds_scheme() {
        assert_eq!(normalize_url("example.com/a").unwrap(), "https://example.com/a");
        assert_eq!(normalize_url(" http://x.org ").unwrap(), "http://x.org");
    }

    #[test]
    fn normalize_passes_wikipedia_topics() {
        assert_eq!(normalize_url("wikipedia:Graph theory").unwrap(), "wikipedia:Graph theory");
        assert!(matches!(normalize_url("wikipedia:  "), Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn normalize_rejects_empty() {
        assert!(matches!(normalize_url("   "), Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn default_name_is_host_or_topic() {
        assert_eq!(default_url_name("https://docs.rs/serde/latest"), "docs.rs");
        assert_eq!(default_url_name("wikipedia:Entropy"), "Entropy");
    }

    #[test]
    fn grading_counts_matching_options() {
        let quiz = quiz(vec![
            question("q-0", Some("a")),
            question("q-1", Some("b")),
            question("q-2", Some("a")),
            question("q-3", None),
            question("q-4", Some("b")),
        ]);
        let answers = vec![
            QuizAnswer::selected("q-0", "a"),
            QuizAnswer::selected("q-1", "a"),
            QuizAnswer::selected("q-3", "a"),
            QuizAnswer::selected("q-4", "b"),
        ];

        let result = grade(&quiz, &answers);
        assert_eq!(result.correct, 2);
        assert_eq!(result.total, 5);
        assert_eq!(result.score, 0.4);
        assert_eq!(result.wrong_questions, vec!["q-1", "q-2", "q-3"]);
        assert_eq!(
            result.per_topic,
            vec![
                TopicScore { topic: "Sorting".into(), correct: 2, total: 5 },
                TopicScore { topic: "Concepts".into(), correct: 1, total: 3 },
                TopicScore { topic: "Applications".into(), correct: 0, total: 2 },
            ]
        );
    }

    #[test]
    fn grading_empty_quiz() {
        let result = grade(&quiz(Vec::new()), &[]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.total, 0);
        assert!(result.wrong_questions.is_empty());
    }

    #[test]
    fn converted_questions_get_indexed_ids() {
        let generated = vec![
            GeneratedQuestion {
                question_type: Some("true_false".into()),
                question_text: "Heaps are trees.".into(),
                options: None,
                correct_option_id: Some("true".into()),
                explanation: None,
            },
            GeneratedQuestion {
                question_type: None,
                question_text: "Pick one".into(),
                options: Some(vec![QuizOption { id: "a".into(), text: "A".into() }]),
                correct_option_id: Some("a".into()),
                explanation: Some("Because".into()),
            },
        ];
        let questions = convert_questions("q100", generated);
        assert_eq!(questions[0].id, "q100-0");
        assert_eq!(questions[0].question_type, QuestionType::TrueFalse);
        assert!(questions[0].options.is_empty());
        assert_eq!(questions[1].id, "q100-1");
        assert_eq!(questions[1].question_type, QuestionType::MultipleChoice);
    }

    #[test]
    fn quiz_topic_falls_back_to_subject_and_document() {
        let mut store = store();
        let nb = store.create_notebook("Algorithms", "Computer Science", None);
        assert_eq!(
            quiz_topic(&store, &nb.id, None),
            ("Computer Science".to_string(), "Computer Science".to_string())
        );

        let doc = Document {
            id: "doc1".into(),
            name: "lecture3.pdf".into(),
            file_type: FileType::Pdf,
            pages: 4,
            status: DocumentStatus::Indexed,
            content: None,
            url: None,
        };
        store.add_document(&nb.id, doc);
        store.set_selected_document(Some("doc1"));
        assert_eq!(
            quiz_topic(&store, &nb.id, None),
            ("Computer Science".to_string(), "lecture3.pdf - Computer Science".to_string())
        );
        assert_eq!(
            quiz_topic(&store, &nb.id, Some("Heaps")),
            ("Heaps".to_string(), "Heaps".to_string())
        );
    }

    #[test]
    fn submit_without_quiz_is_rejected() {
        let mut store = store();
        assert!(matches!(submit_current_quiz(&mut store), Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn submit_current_quiz_updates_stats() {
        let mut store = store();
        let nb = store.create_notebook("Algorithms", "Computer Science", None);
        let mut q = quiz(vec![question("q-0", Some("a")), question("q-1", Some("b"))]);
        q.notebook_id = nb.id.clone();
        store.create_quiz(q);
        store.set_current_quiz(Some("quiz1"));
        store.set_quiz_answer(QuizAnswer::selected("q-0", "a"));

        let result = submit_current_quiz(&mut store).unwrap();
        assert_eq!(result.correct, 1);
        assert_eq!(store.state().study_metrics.quizzes_taken, 1);
        assert_eq!(store.state().study_metrics.average_quiz_accuracy, 0.5);
    }
}
