//! Remote API contract and its HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;

use super::Session;
use crate::auth::{normalize_base_url, parse_api_error};
use crate::models::{AnyRecord, EntityKind, RecordId};

/// Failure of a single remote call, classified for the queue processor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport failure; retried with backoff
    #[error("Network error: {0}")]
    Network(String),
    /// 5xx; retried with backoff
    #[error("Server error: {message}")]
    Server { status: u16, message: String },
    /// 4xx other than 404; terminal
    #[error("Rejected by server: {message}")]
    Rejected { status: u16, message: String },
    /// 404: the record no longer exists on the server
    #[error("Record no longer exists on the server")]
    Gone,
    /// Response body could not be decoded; terminal
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = parse_api_error(status, body);
        if status == StatusCode::NOT_FOUND {
            Self::Gone
        } else if status.is_client_error() {
            Self::Rejected {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Server {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// Whether retrying later may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidPayload(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Server endpoints the engine talks to.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create a record; returns the canonical record carrying its server id.
    async fn create(&self, session: &Session, record: &AnyRecord) -> RemoteResult<AnyRecord>;

    /// Apply a partial update to an existing record.
    async fn update(
        &self,
        session: &Session,
        kind: EntityKind,
        id: &RecordId,
        patch: &Value,
    ) -> RemoteResult<()>;

    async fn delete(&self, session: &Session, kind: EntityKind, id: &RecordId) -> RemoteResult<()>;

    /// Full server snapshot of one kind.
    async fn fetch_all(&self, session: &Session, kind: EntityKind) -> RemoteResult<Vec<AnyRecord>>;
}

/// `RemoteApi` over HTTP with bearer authentication.
#[derive(Clone)]
pub struct HttpRemoteApi {
    base_url: String,
    client: Client,
}

impl HttpRemoteApi {
    pub fn new(base_url: impl AsRef<str>) -> crate::Result<Self> {
        let base_url = normalize_base_url(base_url.as_ref())?;
        let client = Client::builder()
            .build()
            .map_err(|error| RemoteError::Network(error.to_string()))?;
        Ok(Self { base_url, client })
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/v1/{}s", self.base_url, kind.as_str())
    }

    fn record_url(&self, kind: EntityKind, id: &RecordId) -> String {
        format!("{}/{}", self.collection_url(kind), id)
    }

    fn authorized(request: RequestBuilder, session: &Session) -> RequestBuilder {
        match session.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> RemoteResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_status(status, &body))
    }
}

fn decode_record(kind: EntityKind, value: Value) -> RemoteResult<AnyRecord> {
    let record = AnyRecord::from_json(kind, value)
        .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
    if record.header().id.is_temporary() {
        return Err(RemoteError::InvalidPayload(format!(
            "server returned a temporary id for {kind}: {}",
            record.header().id
        )));
    }
    Ok(record)
}

/// Outbound create body: every field except the local id.
fn create_body(record: &AnyRecord) -> RemoteResult<Value> {
    let mut body = serde_json::to_value(record)
        .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
    if let Some(object) = body.as_object_mut() {
        object.remove("id");
    }
    Ok(body)
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create(&self, session: &Session, record: &AnyRecord) -> RemoteResult<AnyRecord> {
        let kind = record.kind();
        let request = self.client.post(self.collection_url(kind)).json(&create_body(record)?);
        let response = Self::send(Self::authorized(request, session)).await?;
        let value = response.json::<Value>().await?;
        decode_record(kind, value)
    }

    async fn update(
        &self,
        session: &Session,
        kind: EntityKind,
        id: &RecordId,
        patch: &Value,
    ) -> RemoteResult<()> {
        let request = self.client.patch(self.record_url(kind, id)).json(patch);
        Self::send(Self::authorized(request, session)).await?;
        Ok(())
    }

    async fn delete(&self, session: &Session, kind: EntityKind, id: &RecordId) -> RemoteResult<()> {
        let request = self.client.delete(self.record_url(kind, id));
        Self::send(Self::authorized(request, session)).await?;
        Ok(())
    }

    async fn fetch_all(&self, session: &Session, kind: EntityKind) -> RemoteResult<Vec<AnyRecord>> {
        let request = self.client.get(self.collection_url(kind));
        let response = Self::send(Self::authorized(request, session)).await?;
        let values = response.json::<Vec<Value>>().await?;
        values
            .into_iter()
            .map(|value| decode_record(kind, value))
            .collect()
    }
}
