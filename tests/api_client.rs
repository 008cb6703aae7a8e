//! Workflows against an in-process fake backend

use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use study_hub::api::{ApiClient, ApiError};
use study_hub::app::workflows::{self, CHAT_FALLBACK_MESSAGE, WorkflowError};
use study_hub::store::{
    Difficulty, DocumentStatus, FileType, ManualClock, QuestionType, QuizAnswer, Role, Store,
};
use study_hub::Config;

/// Requests the fake backend saw, as (endpoint, field, value)
#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<(String, String, String)>>>);

impl Seen {
    fn push(&self, endpoint: &str, field: &str, value: String) {
        self.0.lock().unwrap().push((endpoint.into(), field.into(), value));
    }

    fn fields(&self, endpoint: &str) -> Vec<(String, String)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _, _)| e == endpoint)
            .map(|(_, f, v)| (f.clone(), v.clone()))
            .collect()
    }
}

async fn record_multipart(seen: &Seen, endpoint: &str, mut multipart: Multipart) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name() {
            Some(file_name) => file_name.to_string(),
            None => field.text().await.unwrap(),
        };
        seen.push(endpoint, &name, value);
    }
}

async fn upload_pdf(State(seen): State<Seen>, multipart: Multipart) -> Json<Value> {
    record_multipart(&seen, "upload_pdf", multipart).await;
    Json(json!({"chunks": 3, "text": "Heaps are complete binary trees.", "url": "/files/heaps.pdf"}))
}

async fn upload_url(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.push("upload_url", "body", body.to_string());
    Json(json!({"text": "Scraped page", "summary": "Binary heaps support O(log n) insert."}))
}

async fn ask(State(seen): State<Seen>, multipart: Multipart) -> Json<Value> {
    record_multipart(&seen, "ask", multipart).await;
    Json(json!({"answer": "A heap is a tree where every parent orders before its children."}))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "services": {
            "llm_api": {"status": "healthy", "message": "ok"},
            "vector_db": {"status": "healthy", "message": "3 collections"},
            "web_scraper": {"status": "unknown", "message": "not checked"}
        }
    }))
}

async fn generate_quiz(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.push("generate_quiz", "body", body.to_string());
    Json(json!({
        "questions": [
            {
                "type": "mcq",
                "questionText": "What is the height of a heap with n nodes?",
                "options": [{"id": "a", "text": "O(log n)"}, {"id": "b", "text": "O(n)"}],
                "correctOptionId": "a",
                "explanation": "Heaps are complete trees."
            },
            {
                "type": "true_false",
                "questionText": "A max-heap keeps its maximum at the root.",
                "options": [{"id": "true", "text": "True"}, {"id": "false", "text": "False"}],
                "correctOptionId": "true"
            }
        ]
    }))
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn healthy_backend() -> (ApiClient, Seen) {
    let seen = Seen::default();
    let router = Router::new()
        .route("/upload_pdf", post(upload_pdf))
        .route("/upload_url", post(upload_url))
        .route("/ask", post(ask))
        .route("/health_check", get(health))
        .route("/generate_quiz", post(generate_quiz))
        .with_state(seen.clone());
    let base = spawn(router).await;
    let client = ApiClient::new(&Config { api_url: base, ..Default::default() }).unwrap();
    (client, seen)
}

async fn failing_backend() -> ApiClient {
    let router = Router::new()
        .route("/ask", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model offline") }))
        .route(
            "/generate_quiz",
            post(|| async { Json(json!({"error": "No content found for topic"})) }),
        )
        .route("/upload_pdf", post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "") }));
    let base = spawn(router).await;
    ApiClient::new(&Config { api_url: base, ..Default::default() }).unwrap()
}

fn store_with_notebook() -> (Store, String) {
    let clock = ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    let mut store = Store::new(Arc::new(clock));
    assert!(store.login("jane@uni.edu", "pw"));
    let nb = store.create_notebook("Data Structures", "Computer Science", None);
    (store, nb.id)
}

#[tokio::test]
async fn upload_records_indexed_document() {
    let (api, seen) = healthy_backend().await;
    let (mut store, nb) = store_with_notebook();

    let doc = workflows::upload_document(&mut store, &api, &nb, "heaps.pdf", b"%PDF-1.4".to_vec())
        .await
        .unwrap();

    assert_eq!(doc.file_type, FileType::Pdf);
    assert_eq!(doc.pages, 3);
    assert_eq!(doc.status, DocumentStatus::Indexed);
    assert_eq!(doc.url.as_deref(), Some("/files/heaps.pdf"));
    assert_eq!(store.state().notebook_documents(&nb), &[doc]);
    assert_eq!(
        seen.fields("upload_pdf"),
        vec![("pdf".to_string(), "heaps.pdf".to_string()), ("notebook_id".to_string(), nb)]
    );
}

#[tokio::test]
async fn add_url_posts_summary_to_chat() {
    let (api, seen) = healthy_backend().await;
    let (mut store, nb) = store_with_notebook();

    let doc = workflows::add_url(&mut store, &api, &nb, "en.wikipedia.org/wiki/Heap", None)
        .await
        .unwrap();

    assert_eq!(doc.name, "en.wikipedia.org");
    assert_eq!(doc.file_type, FileType::Url);
    assert_eq!(doc.url.as_deref(), Some("https://en.wikipedia.org/wiki/Heap"));

    let chat = store.state().notebook_chat(&nb);
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].role, Role::Assistant);
    assert!(chat[0].content.starts_with("**Website Analysis: en.wikipedia.org**"));
    assert!(chat[0].content.contains("Binary heaps support O(log n) insert."));

    let body: Value = serde_json::from_str(&seen.fields("upload_url")[0].1).unwrap();
    assert_eq!(body["url"], "https://en.wikipedia.org/wiki/Heap");
    assert_eq!(body["notebook_id"], nb.as_str());
}

#[tokio::test]
async fn ask_records_both_sides_of_the_exchange() {
    let (api, seen) = healthy_backend().await;
    let (mut store, nb) = store_with_notebook();

    let reply = workflows::ask(&mut store, &api, &nb, "What is a heap?").await.unwrap();

    let chat = store.state().notebook_chat(&nb);
    assert_eq!(chat.len(), 2);
    assert_eq!(chat[0].role, Role::User);
    assert_eq!(chat[1], reply);
    assert!(reply.content.starts_with("A heap is a tree"));
    assert!(!store.state().is_ai_loading);
    assert_eq!(seen.fields("ask"), vec![("question".to_string(), "What is a heap?".to_string())]);
}

#[tokio::test]
async fn ask_sends_selected_document_as_filter() {
    let (api, seen) = healthy_backend().await;
    let (mut store, nb) = store_with_notebook();
    let doc = workflows::upload_document(&mut store, &api, &nb, "heaps.pdf", Vec::new())
        .await
        .unwrap();
    store.set_selected_document(Some(&doc.id));

    workflows::ask(&mut store, &api, &nb, "Summarize").await.unwrap();

    assert!(seen.fields("ask").contains(&("filename".to_string(), "heaps.pdf".to_string())));
}

#[tokio::test]
async fn ask_failure_appends_fallback_reply() {
    let api = failing_backend().await;
    let (mut store, nb) = store_with_notebook();

    let err = workflows::ask(&mut store, &api, &nb, "What is a heap?").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Api(ApiError::Status { status: 500, .. })));

    let chat = store.state().notebook_chat(&nb);
    assert_eq!(chat.len(), 2);
    assert_eq!(chat[1].content, CHAT_FALLBACK_MESSAGE);
    assert!(!store.state().is_ai_loading);
}

#[tokio::test]
async fn failed_upload_leaves_store_untouched() {
    let api = failing_backend().await;
    let (mut store, nb) = store_with_notebook();
    let before = store.snapshot();

    let err = workflows::upload_document(&mut store, &api, &nb, "notes.txt", b"hi".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Api(ApiError::Status { status: 422, .. })));
    assert!(Arc::ptr_eq(&before, &store.snapshot()));
}

#[tokio::test]
async fn generated_quiz_can_be_taken() {
    let (api, seen) = healthy_backend().await;
    let (mut store, nb) = store_with_notebook();

    let quiz = workflows::generate_quiz(&mut store, &api, &nb, None, Difficulty::Hard, 5)
        .await
        .unwrap();

    assert_eq!(quiz.topic.as_deref(), Some("Computer Science"));
    assert_eq!(quiz.questions.len(), 2);
    assert_eq!(quiz.questions[1].question_type, QuestionType::TrueFalse);
    assert_eq!(store.state().current_quiz_id.as_deref(), Some(quiz.id.as_str()));

    let body: Value = serde_json::from_str(&seen.fields("generate_quiz")[0].1).unwrap();
    assert_eq!(body["topic"], "Computer Science");
    assert_eq!(body["difficulty"], "hard");
    assert_eq!(body["notebookId"], nb.as_str());
    assert_eq!(body["num_questions"], 5);

    store.set_quiz_answer(QuizAnswer::selected(quiz.questions[0].id.clone(), "a"));
    store.set_quiz_answer(QuizAnswer::selected(quiz.questions[1].id.clone(), "false"));
    let result = workflows::submit_current_quiz(&mut store).unwrap();

    assert_eq!((result.correct, result.total), (1, 2));
    assert_eq!(result.wrong_questions, vec![quiz.questions[1].id.clone()]);
    let state = store.state();
    assert_eq!(state.study_metrics.quizzes_taken, 1);
    assert_eq!(state.skill_level("Computer Science"), Some(10));
    assert_eq!(state.user_stats.monthly_goals[0].current, 1.0);
}

#[tokio::test]
async fn quiz_error_field_creates_nothing() {
    let api = failing_backend().await;
    let (mut store, nb) = store_with_notebook();

    let err = workflows::generate_quiz(&mut store, &api, &nb, Some("Tries"), Difficulty::Easy, 5)
        .await
        .unwrap_err();

    match err {
        WorkflowError::Api(ApiError::InvalidResponse(reason)) => {
            assert_eq!(reason, "No content found for topic")
        }
        other => panic!("Expected invalid response, got {:?}", other),
    }
    assert!(store.state().quizzes.is_empty());
    assert!(store.state().current_quiz_id.is_none());
}

#[tokio::test]
async fn validation_happens_before_any_request() {
    let api = failing_backend().await;
    let (mut store, nb) = store_with_notebook();

    assert!(matches!(
        workflows::ask(&mut store, &api, &nb, "   ").await,
        Err(WorkflowError::Validation(_))
    ));
    assert!(matches!(
        workflows::add_url(&mut store, &api, &nb, "", None).await,
        Err(WorkflowError::Validation(_))
    ));
    assert!(matches!(
        workflows::ask(&mut store, &api, "nb404", "hello").await,
        Err(WorkflowError::NotFound { kind: "Notebook", .. })
    ));
    assert!(store.state().notebook_chat(&nb).is_empty());
}

#[tokio::test]
async fn health_report_parses() {
    let (api, _) = healthy_backend().await;
    let report = api.health_check().await.unwrap();
    assert!(report.is_healthy("llm_api"));
    assert!(report.is_healthy("vector_db"));
    assert!(!report.is_healthy("web_scraper"));
    assert!(!report.all_healthy());
}

#[tokio::test]
async fn unreachable_backend_is_a_connection_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = ApiClient::new(&Config { api_url: format!("http://{}", addr), ..Default::default() })
        .unwrap();
    let err = api.health_check().await.unwrap_err();
    assert!(err.is_connection_error());
    assert!(err.is_recoverable());
}
