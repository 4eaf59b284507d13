//! HTTP grading service for delegated questions.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::challenge::Question;
use crate::grading::{GradeError, ProofGrader};

#[derive(Serialize)]
struct GradeRequest<'a> {
    prompt: &'a str,
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct GradeResponse {
    correct: bool,
}

/// `POST {base}/v1/grade` with `{"prompt","answer"}`, answered by
/// `{"correct": bool}`.
pub struct HttpProofGrader {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProofGrader {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ProofGrader for HttpProofGrader {
    async fn grade(&self, question: &Question, answer: &str) -> Result<bool, GradeError> {
        let resp = self
            .client
            .post(format!("{}/v1/grade", self.base_url))
            .timeout(self.timeout)
            .json(&GradeRequest {
                prompt: &question.prompt,
                answer,
            })
            .send()
            .await
            .map_err(|e| GradeError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GradeError::Unavailable(format!("HTTP {}", resp.status())));
        }
        let body: GradeResponse = resp
            .json()
            .await
            .map_err(|e| GradeError::InvalidResponse(e.to_string()))?;
        Ok(body.correct)
    }
}
