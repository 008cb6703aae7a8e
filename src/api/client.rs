//! HTTP client for the study backend

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::models::{
    AskResponse, GenerateQuizRequest, GenerateQuizResponse, HealthReport, UploadPdfResponse,
    UploadUrlRequest, UploadUrlResponse,
};
use crate::config::Config;

/// Client for document ingestion, question answering and quiz generation.
///
/// Build one at startup and pass it to whoever needs it. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
}

impl ApiClient {
    /// Create a client from configuration
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { client, base_url: config.api_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a document file for indexing
    pub async fn upload_pdf(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        notebook_id: Option<&str>,
    ) -> Result<UploadPdfResponse, ApiError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let mut form = Form::new().part("pdf", part);
        if let Some(id) = notebook_id {
            form = form.text("notebook_id", id.to_string());
        }

        let response = self.client.post(self.url("/upload_pdf")).multipart(form).send().await?;
        parse_json("upload_pdf", response).await
    }

    /// Have the backend scrape, index and summarize a web resource
    pub async fn upload_url(
        &self,
        url: &str,
        name: Option<&str>,
        notebook_id: Option<&str>,
    ) -> Result<UploadUrlResponse, ApiError> {
        let request = UploadUrlRequest {
            url: url.to_string(),
            name: name.map(str::to_string),
            notebook_id: notebook_id.map(str::to_string),
        };

        let response = self.client.post(self.url("/upload_url")).json(&request).send().await?;
        parse_json("upload_url", response).await
    }

    /// Ask a question, optionally restricted to one document
    pub async fn ask(&self, question: &str, filename: Option<&str>) -> Result<AskResponse, ApiError> {
        let mut form = Form::new().text("question", question.to_string());
        if let Some(filename) = filename {
            form = form.text("filename", filename.to_string());
        }

        let response = self.client.post(self.url("/ask")).multipart(form).send().await?;
        parse_json("ask", response).await
    }

    /// Status of the backend's services
    pub async fn health_check(&self) -> Result<HealthReport, ApiError> {
        let response = self.client.get(self.url("/health_check")).send().await?;
        parse_json("health_check", response).await
    }

    /// Generate quiz questions for a topic
    pub async fn generate_quiz(
        &self,
        request: &GenerateQuizRequest,
    ) -> Result<GenerateQuizResponse, ApiError> {
        let response = self.client.post(self.url("/generate_quiz")).json(request).send().await?;
        parse_json("generate_quiz", response).await
    }
}

/// Reject non-2xx responses, then decode the body
async fn parse_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            body
        };
        tracing::error!(operation, status = status.as_u16(), "Backend request failed");
        return Err(ApiError::Status { operation, status: status.as_u16(), message });
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_strips_trailing_slash() {
        let config = Config { api_url: "http://localhost:8000/".into(), ..Default::default() };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/ask"), "http://localhost:8000/ask");
    }
}
