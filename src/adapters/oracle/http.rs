//! HTTP client for the SherlockBench oracle server.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, OracleError};
use crate::domain::models::{
    Prediction, ProblemSetCatalog, RunCompletion, StartRunRequest, StartedRun, Verdict,
    VerificationCase,
};
use crate::domain::ports::Oracle;

/// Oracle reached over HTTP JSON.
///
/// Every operation is a POST to `{base_url}/{operation}` carrying `run-id`
/// in the body once a run exists; the problem-set catalog is a GET.
pub struct HttpOracle {
    client: Client,
    base_url: String,
}

impl HttpOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), operation)
    }

    async fn post_text(&self, run_id: Option<Uuid>, operation: &str, body: Value) -> Result<String, OracleError> {
        let mut body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(run_id) = run_id {
            body.insert("run-id".to_string(), json!(run_id));
        }

        debug!(operation, "Oracle request");
        let response = self
            .client
            .post(self.url(operation))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(operation, &e))?;

        read_body(operation, response).await
    }

    async fn post(&self, run_id: Option<Uuid>, operation: &str, body: Value) -> Result<Value, OracleError> {
        let text = self.post_text(run_id, operation, body).await?;
        decode(operation, &text)
    }

    async fn post_as<T: DeserializeOwned>(
        &self,
        run_id: Option<Uuid>,
        operation: &str,
        body: Value,
    ) -> Result<T, OracleError> {
        let value = self.post(run_id, operation, body).await?;
        serde_json::from_value(value).map_err(|e| OracleError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}

fn transport(operation: &str, err: &reqwest::Error) -> OracleError {
    OracleError::Transport {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

async fn read_body(operation: &str, response: reqwest::Response) -> Result<String, OracleError> {
    let status = response.status();
    let text = response.text().await.map_err(|e| transport(operation, &e))?;

    if !status.is_success() {
        return Err(OracleError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

fn decode(operation: &str, text: &str) -> Result<Value, OracleError> {
    serde_json::from_str(text).map_err(|e| OracleError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

/// Null, false, empty containers and a null `next-verification` all mean
/// there are no more cases.
fn verification_case(value: Value) -> Result<Option<VerificationCase>, OracleError> {
    let exhausted = match &value {
        Value::Null | Value::Bool(false) => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty() || map.get("next-verification").map_or(true, Value::is_null),
        _ => false,
    };
    if exhausted {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| OracleError::Decode {
            operation: "next-verification".to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
impl Oracle for HttpOracle {
    #[instrument(skip(self, request))]
    async fn start_run(&self, request: &StartRunRequest) -> Result<StartedRun, OracleError> {
        let body = serde_json::to_value(request).map_err(|e| OracleError::Decode {
            operation: "start-run".to_string(),
            message: e.to_string(),
        })?;
        self.post_as(None, "start-run", body).await
    }

    async fn test_function(
        &self,
        run_id: Uuid,
        attempt_id: Uuid,
        args: &[Value],
    ) -> Result<Value, OracleError> {
        self.post(
            Some(run_id),
            "test-function",
            json!({"attempt-id": attempt_id, "args": args}),
        )
        .await
    }

    async fn next_verification(
        &self,
        run_id: Uuid,
        attempt_id: Uuid,
    ) -> Result<Option<VerificationCase>, OracleError> {
        let value = self
            .post(Some(run_id), "next-verification", json!({"attempt-id": attempt_id}))
            .await?;
        verification_case(value)
    }

    async fn attempt_verification(
        &self,
        run_id: Uuid,
        attempt_id: Uuid,
        prediction: &Prediction,
    ) -> Result<Verdict, OracleError> {
        let operation = "attempt-verification";
        let value = self
            .post(
                Some(run_id),
                operation,
                json!({"attempt-id": attempt_id, "prediction": prediction.expected_output}),
            )
            .await?;

        value
            .get("status")
            .and_then(Value::as_str)
            .map(Verdict::from_status)
            .ok_or_else(|| OracleError::MissingField {
                operation: operation.to_string(),
                field: "status".to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn complete_run(&self, run_id: Uuid) -> Result<RunCompletion, OracleError> {
        self.post_as(Some(run_id), "complete-run", json!({})).await
    }

    #[instrument(skip(self))]
    async fn reset_attempt(&self, run_id: Uuid, attempt_id: Uuid) -> Result<bool, OracleError> {
        let text = self
            .post_text(
                Some(run_id),
                "developer/reset-attempt",
                json!({"attempt-id": attempt_id}),
            )
            .await?;
        debug!(response = %text, "Reset attempt response");
        Ok(text.to_lowercase().contains("success"))
    }

    async fn problem_sets(&self) -> Result<ProblemSetCatalog, OracleError> {
        let operation = "problem-sets";
        let response = self
            .client
            .get(self.url(operation))
            .send()
            .await
            .map_err(|e| transport(operation, &e))?;

        let text = read_body(operation, response).await?;
        serde_json::from_str(&text).map_err(|e| OracleError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}
