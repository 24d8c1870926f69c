use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use super::domain::{
    InscricaoId, Inscription, PositionId, ProcessDefinition, ProcessId, SubmitReceipt,
};
use super::payload::AnswerPayload;
use crate::config::BackendConfig;

/// Body of `POST /processo/{id}/inscricao/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    #[serde(rename = "id_vaga")]
    pub position_id: PositionId,
    /// Candidate snapshot fields forwarded as-is.
    #[serde(flatten)]
    pub snapshot: Map<String, Value>,
}

/// Body of `POST .../respostas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAnswersRequest {
    #[serde(rename = "respostas")]
    pub answers: Vec<AnswerPayload>,
}

/// Backend operations the form engine depends on.
#[async_trait]
pub trait InscricaoApi: Send + Sync {
    async fn fetch_process(&self, process: &ProcessId) -> Result<ProcessDefinition, ApiError>;

    /// `Ok(None)` when the backend has no draft for this position yet.
    async fn find_draft(
        &self,
        process: &ProcessId,
        position: &PositionId,
    ) -> Result<Option<Inscription>, ApiError>;

    async fn create_draft(
        &self,
        process: &ProcessId,
        request: &CreateDraftRequest,
    ) -> Result<Inscription, ApiError>;

    async fn save_answers(
        &self,
        process: &ProcessId,
        inscricao: &InscricaoId,
        answers: &[AnswerPayload],
    ) -> Result<Inscription, ApiError>;

    async fn submit(
        &self,
        process: &ProcessId,
        inscricao: &InscricaoId,
    ) -> Result<SubmitReceipt, ApiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("access denied by the backend (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("{message}")]
    Conflict { message: String },
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("backend failure (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = error_message(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string()
        });

        match status {
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
                status: status.as_u16(),
            },
            StatusCode::CONFLICT => ApiError::Conflict { message },
            status if status.is_server_error() => ApiError::Server {
                status: status.as_u16(),
                message,
            },
            status => ApiError::Rejected {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether re-invoking the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Server { .. } => true,
            ApiError::Transport(err) => !err.is_decode(),
            _ => false,
        }
    }

    /// Text shown to the candidate.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotFound => "The requested record no longer exists.".to_string(),
            ApiError::Unauthorized { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiError::Conflict { message } | ApiError::Rejected { message, .. } => message.clone(),
            ApiError::Server { .. } => {
                "The server could not complete the request. Please try again.".to_string()
            }
            ApiError::Transport(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ApiError::Url(_) => "The service address is misconfigured.".to_string(),
        }
    }
}

/// Backend error bodies come as `{"message": …}` or `{"error": …}`.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(fields)) => ["message", "error", "detail"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Ok(Value::String(text)) => Some(text),
        _ => Some(trimmed.to_string()),
    }
}

/// `InscricaoApi` over HTTP with an optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpInscricaoApi {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpInscricaoApi {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("processo-seletivo/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "backend responded");

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

#[async_trait]
impl InscricaoApi for HttpInscricaoApi {
    async fn fetch_process(&self, process: &ProcessId) -> Result<ProcessDefinition, ApiError> {
        let url = self.endpoint(&["processo", process.as_str()])?;
        self.send(self.http.get(url)).await
    }

    async fn find_draft(
        &self,
        process: &ProcessId,
        position: &PositionId,
    ) -> Result<Option<Inscription>, ApiError> {
        let mut url = self.endpoint(&["processo", process.as_str(), "inscricao", "me"])?;
        url.query_pairs_mut().append_pair("vaga", position.as_str());

        match self.send(self.http.get(url)).await {
            Ok(draft) => Ok(Some(draft)),
            Err(ApiError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_draft(
        &self,
        process: &ProcessId,
        request: &CreateDraftRequest,
    ) -> Result<Inscription, ApiError> {
        let url = self.endpoint(&["processo", process.as_str(), "inscricao", "me"])?;
        self.send(self.http.post(url).json(request)).await
    }

    async fn save_answers(
        &self,
        process: &ProcessId,
        inscricao: &InscricaoId,
        answers: &[AnswerPayload],
    ) -> Result<Inscription, ApiError> {
        let url = self.endpoint(&[
            "processo",
            process.as_str(),
            "inscricao",
            inscricao.as_str(),
            "respostas",
        ])?;
        let body = SaveAnswersRequest {
            answers: answers.to_vec(),
        };
        self.send(self.http.post(url).json(&body)).await
    }

    async fn submit(
        &self,
        process: &ProcessId,
        inscricao: &InscricaoId,
    ) -> Result<SubmitReceipt, ApiError> {
        let url = self.endpoint(&[
            "processo",
            process.as_str(),
            "inscricao",
            inscricao.as_str(),
            "enviar",
        ])?;
        self.send(self.http.post(url)).await
    }
}
