//! Request and response shapes of the study backend

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::model::{Difficulty, QuizOption};

/// Response of `POST /upload_pdf`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadPdfResponse {
    /// Number of indexed chunks, used as the page count
    #[serde(default)]
    pub chunks: Option<u32>,
    /// Extracted text
    #[serde(default)]
    pub text: Option<String>,
    /// Where the backend stored the file
    #[serde(default)]
    pub url: Option<String>,
}

/// Body of `POST /upload_url`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadUrlRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_id: Option<String>,
}

/// Response of `POST /upload_url`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadUrlResponse {
    #[serde(default)]
    pub filename: Option<String>,
    /// Scraped text
    #[serde(default)]
    pub text: Option<String>,
    /// AI summary of the page
    #[serde(default)]
    pub summary: Option<String>,
}

/// Response of `POST /ask`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

/// One service entry of the health report
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Response of `GET /health_check`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceHealth>,
}

impl HealthReport {
    /// Whether the named service reported healthy. Missing services are not.
    pub fn is_healthy(&self, service: &str) -> bool {
        self.services.get(service).is_some_and(ServiceHealth::is_healthy)
    }

    pub fn all_healthy(&self) -> bool {
        !self.services.is_empty() && self.services.values().all(ServiceHealth::is_healthy)
    }
}

/// Body of `POST /generate_quiz`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateQuizRequest {
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(rename = "notebookId", skip_serializing_if = "Option::is_none")]
    pub notebook_id: Option<String>,
    pub num_questions: u32,
}

/// A question as the backend generates it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedQuestion {
    /// Loose type label: "mcq", "true_false", "short", ...
    #[serde(rename = "type", default)]
    pub question_type: Option<String>,
    #[serde(rename = "questionText")]
    pub question_text: String,
    #[serde(default)]
    pub options: Option<Vec<QuizOption>>,
    #[serde(rename = "correctOptionId", default)]
    pub correct_option_id: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Response of `POST /generate_quiz`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateQuizResponse {
    #[serde(default)]
    pub questions: Option<Vec<GeneratedQuestion>>,
    #[serde(default)]
    pub error: Option<String>,
}
