//! Study backend integration
//!
//! Typed client for the external service that ingests documents, answers
//! questions over them and generates quizzes.

pub mod client;
pub mod error;
pub mod models;

pub use client::ApiClient;
pub use error::ApiError;
pub use models::{
    AskResponse, GenerateQuizRequest, GenerateQuizResponse, GeneratedQuestion, HealthReport,
    ServiceHealth, UploadPdfResponse, UploadUrlResponse,
};
