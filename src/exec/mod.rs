use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ExecConfig;
use crate::error::{HubError, Result};

/// Request body for a Piston-compatible execution service.
#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<FileContent<'a>>,
}

#[derive(Debug, Serialize)]
struct FileContent<'a> {
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ExecuteResponse {
    run: Option<RunStage>,
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RunStage {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    code: Option<i32>,
}

/// Outcome of one sandboxed run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Client for the external code-execution sandbox. The hub never runs
/// code itself; it forwards {language, source} and relays {stdout,
/// stderr} back.
pub struct ExecClient {
    config: ExecConfig,
    client: reqwest::Client,
}

impl ExecClient {
    pub fn new(config: ExecConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HubError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub async fn run(&self, language: &str, source: &str) -> Result<ExecOutcome> {
        let url = format!("{}/api/v2/piston/execute", self.config.api_url);

        let request = ExecuteRequest {
            language,
            // Let the service pick the latest installed toolchain.
            version: "*",
            files: vec![FileContent { content: source }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| HubError::execution(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(HubError::execution(format!(
                "Execution service returned {}: {}",
                status, error_text
            )));
        }

        let body: ExecuteResponse = response
            .json()
            .await
            .map_err(|e| HubError::ExecutionResponseInvalid(e.to_string()))?;

        let run = body.run.ok_or_else(|| {
            HubError::ExecutionResponseInvalid(
                body.message
                    .unwrap_or_else(|| "response carried no run stage".to_string()),
            )
        })?;

        tracing::info!(
            language = %language,
            exit_code = ?run.code,
            "Code execution completed"
        );

        Ok(ExecOutcome {
            stdout: run.stdout,
            stderr: run.stderr,
            exit_code: run.code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_request_wire_shape() {
        let request = ExecuteRequest {
            language: "python",
            version: "*",
            files: vec![FileContent { content: "print(1)" }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["language"], "python");
        assert_eq!(value["version"], "*");
        assert_eq!(value["files"][0]["content"], "print(1)");
    }

    #[test]
    fn test_execute_response_deserialize() {
        let json = r#"{
            "language": "python",
            "version": "3.10.0",
            "run": {"stdout": "1\n", "stderr": "", "code": 0, "signal": null, "output": "1\n"}
        }"#;
        let response: ExecuteResponse = serde_json::from_str(json).unwrap();
        let run = response.run.unwrap();
        assert_eq!(run.stdout, "1\n");
        assert_eq!(run.code, Some(0));
    }

    #[test]
    fn test_execute_response_without_run_stage() {
        let json = r#"{"message": "runtime not found"}"#;
        let response: ExecuteResponse = serde_json::from_str(json).unwrap();
        assert!(response.run.is_none());
        assert_eq!(response.message.as_deref(), Some("runtime not found"));
    }
}
