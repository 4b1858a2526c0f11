use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::{HubError, Result};

const GENERATION_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the external text-generation service, used by the
/// interview-question and hint endpoints. Constructed only when an API
/// key is configured; endpoints report 503 otherwise.
pub struct TextGenClient {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl TextGenClient {
    /// Returns `None` when no API key is configured, mirroring the
    /// guarded initialization the rest of the service expects.
    pub fn from_config(config: &AiConfig) -> Option<Result<Self>> {
        let api_key = config.api_key.clone()?;

        Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(GENERATION_TIMEOUT_SECS))
                .build()
                .map_err(|e| HubError::internal(format!("Failed to create HTTP client: {}", e)))
                .map(|client| Self {
                    api_url: config.api_url.clone(),
                    api_key,
                    model: config.model.clone(),
                    client,
                }),
        )
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_url, self.model, self.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| HubError::generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(HubError::generation(format!(
                "Generation service returned {}: {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| HubError::generation(format!("Failed to parse response: {}", e)))?;

        Ok(extract_text(&body))
    }
}

/// Pull the generated text out of the first candidate, tolerating any
/// missing piece of the structure.
fn extract_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

pub fn hint_prompt(code: &str) -> String {
    format!(
        "You are an expert coding interviewer.\n\
         Here is the user's code:\n\
         \"\"\"{}\"\"\"\n\
         Provide a short conceptual hint (max 3 sentences). Do not provide full solution code.",
        code
    )
}

pub fn question_prompt(
    role: &str,
    topic: &str,
    experience: Option<&str>,
    description: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are an expert technical interviewer.\n\
         Generate a single well-formed interview question for:\n\
         Role: {}\n\
         Topic: {}\n\
         Experience: {} years.",
        role,
        topic,
        experience.unwrap_or("N/A")
    );

    if let Some(jd) = description {
        prompt.push_str(&format!(
            "\nJob Description: \"\"\"{}\"\"\"\nTailor the question to this JD.",
            jd
        ));
    }

    prompt
}

pub fn feedback_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are an expert interviewer.\n\
         Interview question: \"\"\"{}\"\"\"\n\
         Candidate's answer: \"\"\"{}\"\"\"\n\
         Evaluate the answer and provide short constructive feedback (max 4 sentences):\n\
         name one strength and one concrete improvement. Do not provide a full model answer.",
        question, answer
    )
}
